//! Hand-off to the stack task.

use std::sync::mpsc;

use crate::message::MessageContainer;

/// Identifies a destination task on the stack side.
pub type ServiceId = u8;

/// The stack side refused a message. The message is released.
#[derive(Debug, thiserror::Error)]
#[error("stack service {destination} rejected message: {reason}")]
pub struct StackSendError {
    pub destination: ServiceId,
    pub reason: String,
}

/// Destination for inbound messages once the router is done with them.
///
/// Ownership of the container passes to the sender. Failures are counted by
/// the router and never retried.
pub trait StackSender: Send {
    fn send(
        &mut self,
        destination: ServiceId,
        message: MessageContainer,
    ) -> Result<(), StackSendError>;
}

impl StackSender for mpsc::Sender<MessageContainer> {
    fn send(
        &mut self,
        destination: ServiceId,
        message: MessageContainer,
    ) -> Result<(), StackSendError> {
        mpsc::Sender::send(self, message).map_err(|_| StackSendError {
            destination,
            reason: "receiver disconnected".to_string(),
        })
    }
}

impl StackSender for mpsc::SyncSender<MessageContainer> {
    fn send(
        &mut self,
        destination: ServiceId,
        message: MessageContainer,
    ) -> Result<(), StackSendError> {
        self.try_send(message).map_err(|err| StackSendError {
            destination,
            reason: match err {
                mpsc::TrySendError::Full(_) => "stack queue full".to_string(),
                mpsc::TrySendError::Disconnected(_) => "receiver disconnected".to_string(),
            },
        })
    }
}

/// Adapts a closure to [`StackSender`].
pub struct StackFn<F>(pub F);

impl<F> StackSender for StackFn<F>
where
    F: FnMut(ServiceId, MessageContainer) -> Result<(), StackSendError> + Send,
{
    fn send(
        &mut self,
        destination: ServiceId,
        message: MessageContainer,
    ) -> Result<(), StackSendError> {
        (self.0)(destination, message)
    }
}

impl<T: StackSender + ?Sized> StackSender for Box<T> {
    fn send(
        &mut self,
        destination: ServiceId,
        message: MessageContainer,
    ) -> Result<(), StackSendError> {
        (**self).send(destination, message)
    }
}
