use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::error::{Result, TransportError};
use crate::traits::{SerialTransport, TransportCallbacks};

const READ_CHUNK_SIZE: usize = 256;

/// Adapts a byte stream to the serial transport contract.
///
/// Two driver threads stand in for the UART hardware:
/// - the reader forwards every received chunk to
///   [`TransportCallbacks::on_bytes_received`]
/// - the writer drains one frame at a time and reports
///   [`TransportCallbacks::on_tx_done`] once it is fully written
///
/// The transport is busy from [`SerialTransport::write`] until that frame's
/// TX-done callback.
pub struct StreamTransport {
    frames: Option<mpsc::Sender<Bytes>>,
    busy: Arc<AtomicBool>,
    writer: Option<JoinHandle<()>>,
    reader: Option<JoinHandle<()>>,
}

impl StreamTransport {
    /// Start the driver threads over separate read and write halves.
    pub fn spawn<R, W, C>(reader: R, writer: W, callbacks: Arc<C>) -> Result<Self>
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
        C: TransportCallbacks + ?Sized + 'static,
    {
        let busy = Arc::new(AtomicBool::new(false));
        let (frames, queued) = mpsc::channel::<Bytes>();

        let reader = {
            let callbacks = Arc::clone(&callbacks);
            std::thread::Builder::new()
                .name("npi-transport-rx".to_string())
                .spawn(move || read_loop(reader, callbacks.as_ref()))?
        };

        let writer = {
            let busy = Arc::clone(&busy);
            std::thread::Builder::new()
                .name("npi-transport-tx".to_string())
                .spawn(move || write_loop(writer, queued, &busy, callbacks.as_ref()))?
        };

        Ok(Self {
            frames: Some(frames),
            busy,
            writer: Some(writer),
            reader: Some(reader),
        })
    }

    /// Stop accepting writes and wait for the writer to drain.
    ///
    /// The reader thread ends on its own once the stream reports EOF.
    pub fn close(&mut self) {
        self.frames.take();
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
    }

    /// Whether the reader thread has observed EOF or an error.
    pub fn reader_finished(&self) -> bool {
        self.reader
            .as_ref()
            .map(|reader| reader.is_finished())
            .unwrap_or(true)
    }
}

impl SerialTransport for StreamTransport {
    fn write(&mut self, frame: &[u8]) -> Result<usize> {
        let frames = self.frames.as_ref().ok_or(TransportError::Shutdown)?;
        if self.busy.swap(true, Ordering::AcqRel) {
            return Err(TransportError::Busy);
        }
        if frames.send(Bytes::copy_from_slice(frame)).is_err() {
            self.busy.store(false, Ordering::Release);
            return Err(TransportError::Shutdown);
        }
        Ok(frame.len())
    }

    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn handle_flow_control(&mut self) {
        // A socket has no SRDY line to assert; the stream is always ready.
        trace!("flow control ready");
    }

    fn transport_name(&self) -> &'static str {
        "stream"
    }
}

impl Drop for StreamTransport {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for StreamTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamTransport")
            .field("busy", &self.is_busy())
            .finish()
    }
}

fn read_loop<R: Read, C: TransportCallbacks + ?Sized>(mut reader: R, callbacks: &C) {
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => {
                debug!("host stream closed");
                callbacks.on_closed();
                return;
            }
            Ok(n) => callbacks.on_bytes_received(&chunk[..n]),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut => {
                continue
            }
            Err(err) => {
                warn!(error = %err, "host stream read failed");
                callbacks.on_closed();
                return;
            }
        }
    }
}

fn write_loop<W: Write, C: TransportCallbacks + ?Sized>(
    mut writer: W,
    frames: mpsc::Receiver<Bytes>,
    busy: &AtomicBool,
    callbacks: &C,
) {
    for frame in frames {
        let written = match write_all(&mut writer, &frame) {
            Ok(()) => frame.len(),
            Err(err) => {
                warn!(error = %err, size = frame.len(), "host stream write failed");
                0
            }
        };
        busy.store(false, Ordering::Release);
        callbacks.on_tx_done(written);
    }
    debug!("transport writer stopped");
}

fn write_all<W: Write>(writer: &mut W, frame: &[u8]) -> std::io::Result<()> {
    let mut offset = 0usize;
    while offset < frame.len() {
        match writer.write(&frame[offset..]) {
            Ok(0) => return Err(std::io::Error::from(ErrorKind::WriteZero)),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    loop {
        match writer.flush() {
            Ok(()) => return Ok(()),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}
