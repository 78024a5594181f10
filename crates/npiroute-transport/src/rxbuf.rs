use bytes::BytesMut;

use crate::error::{Result, TransportError};

/// Default receive staging buffer size in bytes.
///
/// Room for one maximum-size frame at the default 4 KiB payload limit plus
/// the start of the next.
pub const DEFAULT_RX_BUFFER_SIZE: usize = 8 * 1024;

/// Fixed-capacity staging area between the transport and the frame collector.
///
/// The transport appends received bytes; the collector consumes complete
/// frames from the front. Partial frames stay in place until the rest
/// arrives.
#[derive(Debug)]
pub struct RxBuffer {
    buf: BytesMut,
    capacity: usize,
}

impl RxBuffer {
    /// Create an empty buffer holding at most `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
            capacity,
        }
    }

    /// Append received bytes.
    ///
    /// Fails with [`TransportError::RxOverflow`] and stages nothing when the
    /// bytes do not fit; the caller must treat the stream as unrecoverable.
    pub fn push(&mut self, bytes: &[u8]) -> Result<()> {
        let available = self.available();
        if bytes.len() > available {
            return Err(TransportError::RxOverflow {
                incoming: bytes.len(),
                available,
            });
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    /// Free space in bytes.
    pub fn available(&self) -> usize {
        self.capacity.saturating_sub(self.buf.len())
    }

    /// Bytes staged and not yet consumed.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Mutable access for the frame collector.
    pub fn bytes_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }
}

impl Default for RxBuffer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_RX_BUFFER_SIZE)
    }
}
