use std::path::PathBuf;

use npiroute_frame::{FrameError, MessageClass};
use npiroute_transport::TransportError;

use crate::message::TransactionId;
use crate::queue::Channel;

/// Errors surfaced by the router and its public API.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// More bytes arrived than the receive buffer can hold.
    ///
    /// The byte stream can no longer be parsed; the link must be reset.
    #[error(
        "receive overflow ({incoming} bytes incoming, {available} available); \
         link must be reset or flow control enabled"
    )]
    RxOverflow { incoming: usize, available: usize },

    /// A bounded queue rejected the message.
    #[error("{channel} queue full (capacity {capacity})")]
    QueueFull { channel: Channel, capacity: usize },

    /// The stack inbox rejected the message.
    #[error("stack inbox full (capacity {capacity})")]
    InboxFull { capacity: usize },

    /// A synchronous response was submitted with no transaction outstanding.
    #[error("no synchronous transaction outstanding")]
    NoTransaction,

    /// A response was submitted for a transaction that already ended.
    #[error("stale response for transaction {id}")]
    StaleResponse { id: TransactionId },

    /// The host sent something other than ASYNC or a SYNC request.
    #[error("unexpected inbound message class in cmd0 {cmd0:#04x}")]
    UnexpectedInbound { cmd0: u8 },

    /// Only a synchronous response may answer a transaction.
    #[error("expected a SYNC_RSP message, got {class}")]
    NotAResponse { class: MessageClass },

    /// The router has been shut down.
    #[error("router shut down")]
    Shutdown,

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RouterError {
    /// Whether this error ends the run loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RxOverflow { .. })
    }
}

/// Errors raised while loading or validating router configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, RouterError>;
