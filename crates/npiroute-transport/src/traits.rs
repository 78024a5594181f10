use std::sync::Arc;

use crate::error::Result;

/// Outbound half of a serial transport, driven only by the router.
///
/// A write hands one complete frame to the driver. The driver stays busy
/// until it reports [`TransportCallbacks::on_tx_done`]; the router will not
/// start another write while [`SerialTransport::is_busy`] returns true.
pub trait SerialTransport: Send {
    /// Begin transmitting `frame`. Returns the number of bytes accepted.
    fn write(&mut self, frame: &[u8]) -> Result<usize>;

    /// Whether a previous write is still in flight.
    fn is_busy(&self) -> bool;

    /// Service a pending MRDY handshake from task context.
    fn handle_flow_control(&mut self) {}

    /// Short name for diagnostics.
    fn transport_name(&self) -> &'static str {
        "serial"
    }
}

impl<T: SerialTransport + ?Sized> SerialTransport for Box<T> {
    fn write(&mut self, frame: &[u8]) -> Result<usize> {
        (**self).write(frame)
    }

    fn is_busy(&self) -> bool {
        (**self).is_busy()
    }

    fn handle_flow_control(&mut self) {
        (**self).handle_flow_control()
    }

    fn transport_name(&self) -> &'static str {
        (**self).transport_name()
    }
}

/// Notifications raised by a transport driver.
///
/// These run in driver (interrupt-like) context: implementations must only
/// stage data, set flags and wake the consumer. They must never block.
pub trait TransportCallbacks: Send + Sync {
    /// Bytes were received from the host.
    fn on_bytes_received(&self, bytes: &[u8]);

    /// The last write finished; `count` bytes went out.
    fn on_tx_done(&self, count: usize);

    /// The host asserted MRDY and is ready for a transfer.
    fn on_flow_control_ready(&self);

    /// The host side of the link went away.
    fn on_closed(&self) {}
}

impl<T: TransportCallbacks + ?Sized> TransportCallbacks for Arc<T> {
    fn on_bytes_received(&self, bytes: &[u8]) {
        (**self).on_bytes_received(bytes)
    }

    fn on_tx_done(&self, count: usize) {
        (**self).on_tx_done(count)
    }

    fn on_flow_control_ready(&self) {
        (**self).on_flow_control_ready()
    }

    fn on_closed(&self) {
        (**self).on_closed()
    }
}
