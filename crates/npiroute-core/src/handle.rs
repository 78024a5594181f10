use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use npiroute_frame::{Frame, FrameError, MessageClass};
use npiroute_transport::{TransportCallbacks, TransportError};
use tracing::{debug, error, info, trace, warn};

use crate::error::{Result, RouterError};
use crate::message::{MessageContainer, TransactionId};
use crate::queue::Channel;
use crate::reroute::{Direction, ReroutePolicy, Rerouted};
use crate::router::Shared;
use crate::stats::RouterStats;
use crate::wake::RouterEvent;

/// Producer-side access to a running [`Router`](crate::Router).
///
/// Cheap to clone and safe to use from any thread. The handle is also the
/// transport's [`TransportCallbacks`] sink: driver threads stage bytes and
/// post events through it without ever touching the queues.
#[derive(Clone)]
pub struct RouterHandle {
    shared: Arc<Shared>,
}

impl RouterHandle {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Observe or divert traffic from the host before it reaches the stack.
    ///
    /// Replaces any earlier inbound registration.
    pub fn register_inbound_callback<F>(&self, callback: F, policy: ReroutePolicy)
    where
        F: Fn(Rerouted<'_>) + Send + Sync + 'static,
    {
        self.register(Direction::Inbound, Arc::new(callback), policy);
    }

    /// Observe or divert messages from the stack before they are framed.
    ///
    /// Replaces any earlier outbound registration.
    pub fn register_outbound_callback<F>(&self, callback: F, policy: ReroutePolicy)
    where
        F: Fn(Rerouted<'_>) + Send + Sync + 'static,
    {
        self.register(Direction::Outbound, Arc::new(callback), policy);
    }

    pub fn clear_inbound_callback(&self) {
        self.shared.hooks.write().clear(Direction::Inbound);
    }

    pub fn clear_outbound_callback(&self) {
        self.shared.hooks.write().clear(Direction::Outbound);
    }

    fn register(
        &self,
        direction: Direction,
        callback: crate::reroute::RerouteCallback,
        policy: ReroutePolicy,
    ) {
        debug!(?direction, ?policy, "reroute hook registered");
        self.shared.hooks.write().register(direction, callback, policy);
    }

    /// Frame an unframed message and queue it for the host.
    ///
    /// A SYNC response goes to SYNC-TX and answers the outstanding
    /// transaction; anything else goes to ASYNC-TX. No reroute hook runs on
    /// this path. Returns the class the message was queued as.
    pub fn send_to_host(&self, message: &[u8]) -> Result<MessageClass> {
        self.ensure_running()?;
        let framed = self.frame(message)?;
        let class = framed.class();
        self.shared.enqueue_outbound(framed, None)?;
        Ok(class)
    }

    /// Answer a specific synchronous transaction.
    ///
    /// Fails with [`RouterError::StaleResponse`] if `transaction` already
    /// ended or timed out; the response is dropped rather than attributed to
    /// a newer request.
    pub fn respond(&self, transaction: TransactionId, message: &[u8]) -> Result<()> {
        self.ensure_running()?;
        let framed = self.frame(message)?;
        if framed.class() != MessageClass::SyncResponse {
            self.shared.count(|s| s.protocol_violations += 1);
            return Err(RouterError::NotAResponse {
                class: framed.class(),
            });
        }
        self.shared.enqueue_outbound(framed, Some(transaction))
    }

    /// Post a message from the stack side into the router's inbox.
    ///
    /// The router applies the outbound hook, frames it and queues it by
    /// class on its next pass.
    pub fn post_from_stack(&self, message: impl Into<Bytes>) -> Result<()> {
        self.ensure_running()?;
        let frame = Frame::new(message).inspect_err(|_| self.violation())?;
        let class = frame.class().ok_or_else(|| {
            self.violation();
            FrameError::UnknownClass { cmd0: frame.cmd0() }
        })?;

        {
            let mut state = self.shared.state.lock();
            let capacity = self.shared.config.inbox_capacity;
            if state.inbox.len() >= capacity {
                drop(state);
                self.shared.count(|s| s.queue_full_drops += 1);
                warn!(capacity, "stack inbox full; dropping message");
                return Err(RouterError::InboxFull { capacity });
            }
            state
                .inbox
                .push_back(MessageContainer::new(frame.into_message(), class));
        }

        self.shared.wake.post(RouterEvent::MessageEnqueued);
        Ok(())
    }

    /// Queue a complete inbound frame.
    ///
    /// For drivers that deframe in their own context instead of staging raw
    /// bytes through [`TransportCallbacks::on_bytes_received`].
    pub fn receive_frame(&self, frame: Frame) -> Result<Channel> {
        self.ensure_running()?;
        let channel = self.shared.enqueue_inbound(frame)?;
        self.shared.wake.post(RouterEvent::MessageEnqueued);
        Ok(channel)
    }

    /// Snapshot of the router counters.
    pub fn stats(&self) -> RouterStats {
        *self.shared.stats.lock()
    }

    /// The outstanding synchronous transaction, if any.
    pub fn transaction(&self) -> Option<TransactionId> {
        self.shared.state.lock().guard.current()
    }

    pub fn queue_len(&self, channel: Channel) -> usize {
        self.shared.state.lock().queues.len(channel)
    }

    /// Stop the router after its current pass.
    pub fn shutdown(&self) {
        if !self.shared.shutdown.swap(true, Ordering::AcqRel) {
            info!("router shutdown requested");
        }
        self.shared.wake.post(RouterEvent::Shutdown);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shared.shutdown.load(Ordering::Acquire)
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_shutdown() {
            return Err(RouterError::Shutdown);
        }
        Ok(())
    }

    fn frame(&self, message: &[u8]) -> Result<MessageContainer> {
        match self.shared.codec.frame_message(message) {
            Ok(framed) => Ok(MessageContainer::outbound(framed)),
            Err(err) => {
                self.violation();
                warn!(error = %err, size = message.len(), "outbound message failed to frame");
                Err(err.into())
            }
        }
    }

    fn violation(&self) {
        self.shared.count(|s| s.protocol_violations += 1);
    }
}

impl TransportCallbacks for RouterHandle {
    fn on_bytes_received(&self, bytes: &[u8]) {
        let staged = self.shared.rx.lock().push(bytes);
        match staged {
            Ok(()) => {
                trace!(size = bytes.len(), "bytes staged");
                self.shared.wake.post(RouterEvent::BytesAvailable);
            }
            Err(TransportError::RxOverflow {
                incoming,
                available,
            }) => {
                error!(incoming, available, "receive buffer overflow");
                self.shared
                    .raise_fatal(RouterError::RxOverflow { incoming, available });
            }
            Err(other) => self.shared.raise_fatal(other.into()),
        }
    }

    fn on_tx_done(&self, count: usize) {
        trace!(count, "tx done");
        self.shared.wake.post(RouterEvent::TxDone);
    }

    fn on_flow_control_ready(&self) {
        self.shared.wake.post(RouterEvent::FlowControlReady);
    }

    fn on_closed(&self) {
        info!("host link closed");
        self.shutdown();
    }
}

impl std::fmt::Debug for RouterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterHandle")
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}
