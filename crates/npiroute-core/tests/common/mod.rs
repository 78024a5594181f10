#![allow(dead_code)]

use std::sync::mpsc;

use bytes::BytesMut;
use npiroute_core::{MessageContainer, Router, RouterConfig, RouterHandle};
use npiroute_frame::{decode_frame, encode_frame, Frame, DEFAULT_MAX_PAYLOAD};
use npiroute_transport::{SerialTransport, TransportCallbacks, TransportError};

/// In-memory transport that records every frame written.
///
/// With `hold_busy` set, each write keeps the transport busy until
/// [`MockTransport::complete`] reports TX done, like a real UART.
#[derive(Debug, Default)]
pub struct MockTransport {
    pub written: Vec<Frame>,
    pub busy: bool,
    pub hold_busy: bool,
    pub flow_control_calls: usize,
}

impl MockTransport {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn holding_busy() -> Self {
        Self {
            hold_busy: true,
            ..Self::default()
        }
    }

    /// Finish the in-flight write and tell the router.
    pub fn complete(&mut self, handle: &RouterHandle) {
        if self.busy {
            self.busy = false;
            handle.on_tx_done(self.written.last().map(Frame::wire_size).unwrap_or(0));
        }
    }

    /// `(cmd0, cmd1)` of each written frame, in order.
    pub fn commands(&self) -> Vec<(u8, u8)> {
        self.written.iter().map(|f| (f.cmd0(), f.cmd1())).collect()
    }
}

impl SerialTransport for MockTransport {
    fn write(&mut self, frame: &[u8]) -> Result<usize, TransportError> {
        if self.busy {
            return Err(TransportError::Busy);
        }
        let mut wire = BytesMut::from(frame);
        let decoded = decode_frame(&mut wire, DEFAULT_MAX_PAYLOAD)
            .expect("router wrote a malformed frame")
            .expect("router wrote a partial frame");
        assert!(wire.is_empty(), "router wrote trailing bytes");
        self.written.push(decoded);
        self.busy = self.hold_busy;
        Ok(frame.len())
    }

    fn is_busy(&self) -> bool {
        self.busy
    }

    fn handle_flow_control(&mut self) {
        self.flow_control_calls += 1;
    }

    fn transport_name(&self) -> &'static str {
        "mock"
    }
}

pub fn wire(cmd0: u8, cmd1: u8, data: &[u8]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    encode_frame(Frame::from_parts(cmd0, cmd1, data).message(), &mut buf).unwrap();
    buf.to_vec()
}

pub fn sync_request(cmd1: u8) -> Frame {
    Frame::from_parts(0x21, cmd1, &[])
}

pub fn async_message(cmd1: u8) -> Frame {
    Frame::from_parts(0x41, cmd1, &[])
}

pub type Stack = mpsc::Receiver<MessageContainer>;

pub fn router(config: RouterConfig) -> (Router<mpsc::Sender<MessageContainer>>, RouterHandle, Stack) {
    let (to_stack, stack) = mpsc::channel();
    let router = Router::new(config, to_stack).unwrap();
    let handle = router.handle();
    (router, handle, stack)
}

pub fn drain(stack: &Stack) -> Vec<MessageContainer> {
    stack.try_iter().collect()
}
