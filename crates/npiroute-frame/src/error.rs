/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame check sequence does not match the frame contents.
    #[error("frame check sequence mismatch (expected {expected:#04x}, got {actual:#04x})")]
    InvalidFcs { expected: u8, actual: u8 },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An unframed message must carry at least the two command bytes.
    #[error("message too short ({len} bytes, need at least 2 command bytes)")]
    MessageTooShort { len: usize },

    /// The command type bits do not name a known message class.
    #[error("unrecognized message class in cmd0 {cmd0:#04x}")]
    UnknownClass { cmd0: u8 },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;

/// Fold a transport error raised while configuring a host link.
#[cfg(unix)]
pub(crate) fn from_transport(err: npiroute_transport::TransportError) -> FrameError {
    use npiroute_transport::TransportError;
    match err {
        TransportError::Io(io) | TransportError::Accept(io) => FrameError::Io(io),
        TransportError::Bind { source, .. } | TransportError::Connect { source, .. } => {
            FrameError::Io(source)
        }
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
