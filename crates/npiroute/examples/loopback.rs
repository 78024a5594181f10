//! Route one synchronous exchange and one async message over an in-process link.
//!
//! Run with:
//!   cargo run --example loopback

#[cfg(unix)]
fn main() -> Result<(), Box<dyn std::error::Error>> {
    use std::os::unix::net::UnixStream;
    use std::sync::{mpsc, Arc};

    use npiroute::frame::{FrameReader, FrameWriter, MessageClass};
    use npiroute::router::{MessageContainer, Router, RouterConfig};
    use npiroute::transport::{HostStream, StreamTransport};

    let (router_side, host_side) = UnixStream::pair()?;
    let router_side = HostStream::from_unix(router_side);

    let (to_stack, from_router) = mpsc::channel::<MessageContainer>();
    let mut router = Router::new(RouterConfig::default(), to_stack)?;
    let handle = router.handle();

    let mut transport = StreamTransport::spawn(
        router_side.try_clone()?,
        router_side,
        Arc::new(router.handle()),
    )?;

    // Stack side: answer requests, echo async traffic back to the host.
    let stack = std::thread::spawn(move || {
        for message in from_router.iter() {
            let payload = message.payload().to_vec();
            match (message.class(), message.transaction()) {
                (MessageClass::SyncRequest, Some(id)) => {
                    let mut reply = payload;
                    reply[0] = MessageClass::SyncResponse.apply_to(reply[0]);
                    if let Err(err) = handle.respond(id, &reply) {
                        eprintln!("response dropped: {err}");
                    }
                }
                _ => {
                    if let Err(err) = handle.post_from_stack(payload) {
                        eprintln!("echo dropped: {err}");
                    }
                }
            }
        }
    });

    let host = std::thread::spawn(move || -> Result<(), npiroute::frame::FrameError> {
        let mut writer = FrameWriter::new(host_side.try_clone()?);
        let mut reader = FrameReader::new(host_side);

        writer.send(0x21, 0x02, b"ping")?;
        let reply = reader.read_frame()?;
        eprintln!(
            "host got {} cmd0={:#04x} data={:?}",
            reply.class().map(|c| c.as_str()).unwrap_or("?"),
            reply.cmd0(),
            reply.data()
        );

        writer.send(0x41, 0x80, b"event")?;
        let echoed = reader.read_frame()?;
        eprintln!("host got echo cmd0={:#04x} data={:?}", echoed.cmd0(), echoed.data());
        Ok(())
        // Dropping the host stream closes the link and stops the router.
    });

    let summary = router.run(&mut transport)?;
    drop(router);
    transport.close();

    if let Ok(Err(err)) = host.join() {
        eprintln!("host failed: {err}");
    }
    let _ = stack.join();

    eprintln!(
        "router stopped after {} passes, {} frames written",
        summary.passes, summary.stats.frames_written
    );
    Ok(())
}

#[cfg(not(unix))]
fn main() {
    eprintln!("the loopback example needs unix domain sockets");
}
