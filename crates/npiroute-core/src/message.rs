use std::fmt;

use bytes::Bytes;
use npiroute_frame::{Frame, FramedMessage, MessageClass};

/// Generation number of one synchronous exchange.
///
/// Every transaction gets a fresh id, so a response that arrives after its
/// transaction timed out can be told apart from one for the next request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

impl TransactionId {
    pub(crate) fn new(generation: u64) -> Self {
        Self(generation)
    }

    pub fn generation(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One unit of traffic crossing the transport boundary.
///
/// Containers are move-only. Whoever holds one owns its buffer; dropping it
/// (or passing it to [`free_message`]) releases the buffer exactly once.
///
/// Inbound containers hold the unframed message (`cmd0 cmd1 data..`).
/// Outbound containers queued for the transport hold the framed bytes.
#[derive(Debug, PartialEq, Eq)]
pub struct MessageContainer {
    payload: Bytes,
    class: MessageClass,
    transaction: Option<TransactionId>,
}

impl MessageContainer {
    pub fn new(payload: impl Into<Bytes>, class: MessageClass) -> Self {
        Self {
            payload: payload.into(),
            class,
            transaction: None,
        }
    }

    pub(crate) fn inbound(frame: Frame, class: MessageClass) -> Self {
        Self::new(frame.into_message(), class)
    }

    pub(crate) fn outbound(framed: FramedMessage) -> Self {
        Self::new(framed.frame, framed.class)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn class(&self) -> MessageClass {
        self.class
    }

    /// The synchronous transaction this message belongs to, if any.
    pub fn transaction(&self) -> Option<TransactionId> {
        self.transaction
    }

    pub(crate) fn set_transaction(&mut self, id: TransactionId) {
        self.transaction = Some(id);
    }

    /// Take ownership of the buffer.
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

/// Release a container's buffer.
pub fn free_message(container: MessageContainer) {
    tracing::trace!(size = container.len(), class = %container.class(), "message released");
    drop(container);
}
