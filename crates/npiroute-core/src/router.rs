use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use npiroute_frame::{Frame, FrameCodec, MessageClass, NpiCodec};
use npiroute_transport::{RxBuffer, SerialTransport};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, error, info, trace, warn};

use crate::config::RouterConfig;
use crate::error::{Result, RouterError};
use crate::handle::RouterHandle;
use crate::message::{free_message, MessageContainer, TransactionId};
use crate::queue::{Channel, QueueFull, QueueSet};
use crate::reroute::{route, Direction, RerouteHooks, Routed};
use crate::stack::StackSender;
use crate::stats::RouterStats;
use crate::sync_guard::{EndOutcome, SyncGuard};
use crate::wake::{EventChannel, PendingEvents, RouterEvent, WakeSignal};

/// Upper bound on passes for one [`Router::run_until_idle`] call.
const MAX_IDLE_PASSES: usize = 10_000;

/// Everything mutated under the router's critical section.
#[derive(Debug)]
pub(crate) struct RouterState {
    pub(crate) queues: QueueSet,
    pub(crate) guard: SyncGuard,
    pub(crate) inbox: VecDeque<MessageContainer>,
}

/// State shared between the consumer loop and every [`RouterHandle`].
pub(crate) struct Shared {
    pub(crate) state: Mutex<RouterState>,
    pub(crate) rx: Mutex<RxBuffer>,
    pub(crate) hooks: RwLock<RerouteHooks>,
    pub(crate) stats: Mutex<RouterStats>,
    pub(crate) fatal: Mutex<Option<RouterError>>,
    pub(crate) shutdown: AtomicBool,
    pub(crate) wake: Arc<dyn WakeSignal>,
    pub(crate) codec: Arc<dyn FrameCodec>,
    pub(crate) config: RouterConfig,
}

impl Shared {
    pub(crate) fn count(&self, update: impl FnOnce(&mut RouterStats)) {
        update(&mut *self.stats.lock());
    }

    /// Record the first fatal error and wake the consumer so it can return it.
    pub(crate) fn raise_fatal(&self, err: RouterError) {
        {
            let mut slot = self.fatal.lock();
            if slot.is_none() {
                *slot = Some(err);
            }
        }
        self.wake.post(RouterEvent::Rearm);
    }

    /// Queue a framed outbound message on the TX channel for its class.
    ///
    /// A SYNC response is tagged with the outstanding transaction. With no
    /// transaction outstanding, or with `requested` naming one that already
    /// ended, the response is dropped.
    pub(crate) fn enqueue_outbound(
        &self,
        mut container: MessageContainer,
        requested: Option<TransactionId>,
    ) -> Result<()> {
        let channel = match container.class() {
            MessageClass::SyncResponse => Channel::SyncTx,
            MessageClass::Async | MessageClass::SyncRequest => Channel::AsyncTx,
        };

        let mut state = self.state.lock();
        if channel == Channel::SyncTx {
            let current = state.guard.current();
            if let Some(id) = requested.filter(|id| current != Some(*id)) {
                drop(state);
                free_message(container);
                self.count(|s| s.stale_responses += 1);
                warn!(transaction = %id, "dropping response for ended transaction");
                return Err(RouterError::StaleResponse { id });
            }
            let Some(current) = current else {
                drop(state);
                free_message(container);
                self.count(|s| s.protocol_violations += 1);
                warn!("dropping SYNC_RSP with no transaction outstanding");
                return Err(RouterError::NoTransaction);
            };
            container.set_transaction(current);
        }

        let size = container.len();
        let capacity = state.queues.capacity(channel);
        if let Err(QueueFull(rejected)) = state.queues.enqueue(channel, container) {
            drop(state);
            free_message(rejected);
            self.count(|s| s.queue_full_drops += 1);
            warn!(%channel, capacity, size, "queue full; dropping message");
            return Err(RouterError::QueueFull { channel, capacity });
        }
        drop(state);

        trace!(%channel, size, "outbound message queued");
        self.wake.post(RouterEvent::MessageEnqueued);
        Ok(())
    }

    /// Route one complete inbound frame to its RX channel.
    ///
    /// ASYNC goes to ASYNC-RX and a SYNC request to SYNC-RX. Anything else
    /// never comes from the host and is dropped.
    pub(crate) fn enqueue_inbound(&self, frame: Frame) -> Result<Channel> {
        let (class, channel) = match frame.class() {
            Some(MessageClass::Async) => (MessageClass::Async, Channel::AsyncRx),
            Some(MessageClass::SyncRequest) => (MessageClass::SyncRequest, Channel::SyncRx),
            other => {
                warn!(
                    cmd0 = frame.cmd0(),
                    class = ?other,
                    "dropping inbound frame with unexpected class"
                );
                self.count(|s| s.protocol_violations += 1);
                return Err(RouterError::UnexpectedInbound { cmd0: frame.cmd0() });
            }
        };

        let size = frame.message().len();
        let container = MessageContainer::inbound(frame, class);
        let mut state = self.state.lock();
        let capacity = state.queues.capacity(channel);
        if let Err(QueueFull(rejected)) = state.queues.enqueue(channel, container) {
            drop(state);
            free_message(rejected);
            self.count(|s| s.queue_full_drops += 1);
            warn!(%channel, capacity, size, "queue full; dropping inbound frame");
            return Err(RouterError::QueueFull { channel, capacity });
        }
        drop(state);

        trace!(%channel, %class, size, "inbound frame queued");
        Ok(channel)
    }
}

/// Result of one dispatch pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassOutcome {
    /// The pass left serviceable work and re-armed the wake signal.
    pub rearmed: bool,
    /// Shutdown was requested; no work was done.
    pub shutdown: bool,
}

/// Returned by [`Router::run`] after a clean shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub passes: u64,
    /// Messages still queued at shutdown, released without delivery.
    pub released: usize,
    pub stats: RouterStats,
}

/// The single consumer that drains the queue set.
///
/// Producers reach it through [`RouterHandle`]s. The router owns the stack
/// sender; the transport is lent to each pass so the transport can be built
/// around a handle first.
pub struct Router<S> {
    shared: Arc<Shared>,
    stack: S,
    passes: u64,
}

impl<S: StackSender> Router<S> {
    /// Create a router with the NPI codec and a condvar wake signal.
    pub fn new(config: RouterConfig, stack: S) -> Result<Self> {
        let codec = Arc::new(NpiCodec::new(config.frame_config()));
        Self::with_parts(config, codec, Arc::new(EventChannel::new()), stack)
    }

    /// Create a router over an explicit codec and wake primitive.
    pub fn with_parts(
        config: RouterConfig,
        codec: Arc<dyn FrameCodec>,
        wake: Arc<dyn WakeSignal>,
        stack: S,
    ) -> Result<Self> {
        config.validate()?;
        let state = RouterState {
            queues: QueueSet::new(config.queue_capacity),
            guard: SyncGuard::new(config.watchdog_timeout()),
            inbox: VecDeque::with_capacity(config.inbox_capacity),
        };
        let shared = Shared {
            state: Mutex::new(state),
            rx: Mutex::new(RxBuffer::with_capacity(config.rx_buffer_size)),
            hooks: RwLock::new(RerouteHooks::default()),
            stats: Mutex::new(RouterStats::default()),
            fatal: Mutex::new(None),
            shutdown: AtomicBool::new(false),
            wake,
            codec,
            config,
        };
        Ok(Self {
            shared: Arc::new(shared),
            stack,
            passes: 0,
        })
    }

    /// A producer-side handle. Also the transport's callback sink.
    pub fn handle(&self) -> RouterHandle {
        RouterHandle::new(Arc::clone(&self.shared))
    }

    pub fn config(&self) -> &RouterConfig {
        &self.shared.config
    }

    pub fn stats(&self) -> RouterStats {
        *self.shared.stats.lock()
    }

    /// Run one dispatch pass over whatever is pending, without blocking.
    pub fn poll<T: SerialTransport + ?Sized>(&mut self, transport: &mut T) -> Result<PassOutcome> {
        let events = self.shared.wake.take();
        self.pass(transport, events)
    }

    /// Run passes until nothing is left to service. Returns the pass count.
    pub fn run_until_idle<T: SerialTransport + ?Sized>(
        &mut self,
        transport: &mut T,
    ) -> Result<usize> {
        let mut passes = 0;
        loop {
            let outcome = self.poll(transport)?;
            passes += 1;
            if outcome.shutdown || !self.shared.wake.is_pending() || passes >= MAX_IDLE_PASSES {
                return Ok(passes);
            }
        }
    }

    /// Block on the wake signal and dispatch until shutdown or a fatal error.
    ///
    /// The wait is bounded by the watchdog deadline while a synchronous
    /// transaction is outstanding. Messages still queued when the loop ends
    /// are released.
    pub fn run<T: SerialTransport + ?Sized>(&mut self, transport: &mut T) -> Result<RunSummary> {
        info!(transport = transport.transport_name(), "router started");
        let result = loop {
            let deadline = self.shared.state.lock().guard.deadline();
            let events = self.shared.wake.wait(deadline);
            match self.pass(transport, events) {
                Ok(outcome) if outcome.shutdown => break Ok(()),
                Ok(_) => {}
                Err(err) => break Err(err),
            }
        };

        self.shared.shutdown.store(true, Ordering::Release);
        let released = self.release_all();

        match result {
            Ok(()) => {
                let summary = RunSummary {
                    passes: self.passes,
                    released,
                    stats: self.stats(),
                };
                info!(passes = summary.passes, released, "router stopped");
                Ok(summary)
            }
            Err(err) => {
                error!(error = %err, released, "router stopped on fatal error");
                Err(err)
            }
        }
    }

    fn pass<T: SerialTransport + ?Sized>(
        &mut self,
        transport: &mut T,
        events: PendingEvents,
    ) -> Result<PassOutcome> {
        self.passes += 1;
        if let Some(err) = self.shared.fatal.lock().take() {
            return Err(err);
        }
        if events.shutdown || self.shared.shutdown.load(Ordering::Acquire) {
            return Ok(PassOutcome {
                rearmed: false,
                shutdown: true,
            });
        }

        if events.flow_control_ready {
            self.service_flow_control(transport);
        }
        let now = Instant::now();
        let mut rearm = self.check_watchdog(now);
        rearm |= self.service_sync_tx(transport);
        rearm |= self.service_stack_inbox();
        rearm |= self.service_sync_rx(now);
        rearm |= self.service_async_tx(transport);
        rearm |= self.service_async_rx();
        if events.bytes_available {
            rearm |= self.collect_rx();
        }
        if events.tx_done {
            rearm |= self.tx_pending();
        }

        if rearm {
            self.shared.wake.post(RouterEvent::Rearm);
        }
        Ok(PassOutcome {
            rearmed: rearm,
            shutdown: false,
        })
    }

    fn check_watchdog(&mut self, now: Instant) -> bool {
        let mut state = self.shared.state.lock();
        let Some(id) = state.guard.expire_if_due(now) else {
            return false;
        };
        let purged = state
            .queues
            .remove_where(Channel::SyncTx, |m| m.transaction() == Some(id));
        let more = !state.queues.is_empty(Channel::SyncRx);
        drop(state);

        self.shared.count(|s| {
            s.watchdog_expiries += 1;
            s.stale_responses += purged as u64;
        });
        warn!(transaction = %id, purged, "sync transaction timed out; abandoning");
        more
    }

    fn service_flow_control<T: SerialTransport + ?Sized>(&mut self, transport: &mut T) {
        if self.shared.config.flow_control {
            trace!("servicing MRDY");
            transport.handle_flow_control();
        } else {
            trace!("flow control disabled; ignoring MRDY");
        }
    }

    fn service_sync_tx<T: SerialTransport + ?Sized>(&mut self, transport: &mut T) -> bool {
        let mut state = self.shared.state.lock();
        if !state.guard.in_progress() || transport.is_busy() {
            return false;
        }
        let Some(response) = state.queues.dequeue(Channel::SyncTx) else {
            return false;
        };

        if response.transaction() != state.guard.current() {
            drop(state);
            warn!(transaction = ?response.transaction(), "dropping stale SYNC_RSP");
            free_message(response);
            self.shared.count(|s| s.stale_responses += 1);
            return true;
        }

        let outcome = state.guard.end();
        let purged = match outcome {
            EndOutcome::Ended(id) => state
                .queues
                .remove_where(Channel::SyncTx, |m| m.transaction() == Some(id)),
            EndOutcome::Underflow => 0,
        };
        let more = !state.queues.is_empty(Channel::SyncRx);
        drop(state);

        match outcome {
            EndOutcome::Ended(id) => debug!(transaction = %id, "sync transaction complete"),
            EndOutcome::Underflow => {
                error!("sync transaction counter underflow; clamped to zero");
                self.shared.count(|s| s.counter_underflows += 1);
            }
        }
        if purged > 0 {
            warn!(purged, "dropping duplicate SYNC_RSP");
            self.shared.count(|s| s.stale_responses += purged as u64);
        }

        self.write(transport, response);
        more
    }

    fn service_stack_inbox(&mut self) -> bool {
        let Some(message) = self.shared.state.lock().inbox.pop_front() else {
            return false;
        };

        let registration = self.shared.hooks.read().get(Direction::Outbound);
        match route(registration.as_ref(), message) {
            Routed::Forward { message, echoed } => {
                if echoed {
                    self.shared.count(|s| s.echoed += 1);
                }
                match self.shared.codec.frame_message(message.payload()) {
                    Ok(framed) => {
                        free_message(message);
                        if let Err(err) = self
                            .shared
                            .enqueue_outbound(MessageContainer::outbound(framed), None)
                        {
                            debug!(error = %err, "stack message not queued");
                        }
                    }
                    Err(err) => {
                        warn!(error = %err, "dropping stack message that failed to frame");
                        free_message(message);
                        self.shared.count(|s| s.protocol_violations += 1);
                    }
                }
            }
            Routed::Intercepted => self.shared.count(|s| s.intercepted += 1),
        }

        !self.shared.state.lock().inbox.is_empty()
    }

    fn service_sync_rx(&mut self, now: Instant) -> bool {
        let (request, id) = {
            let mut state = self.shared.state.lock();
            if state.guard.in_progress() {
                return false;
            }
            let Some(mut request) = state.queues.dequeue(Channel::SyncRx) else {
                return false;
            };
            let id = state.guard.begin(now);
            request.set_transaction(id);
            (request, id)
        };

        self.shared.count(|s| s.sync_transactions += 1);
        debug!(transaction = %id, size = request.len(), "sync transaction started");
        self.deliver(request);
        false
    }

    fn service_async_tx<T: SerialTransport + ?Sized>(&mut self, transport: &mut T) -> bool {
        let frame = {
            let mut state = self.shared.state.lock();
            if state.guard.in_progress() || transport.is_busy() {
                return false;
            }
            match state.queues.dequeue(Channel::AsyncTx) {
                Some(frame) => frame,
                None => return false,
            }
        };

        self.write(transport, frame);
        !self.shared.state.lock().queues.is_empty(Channel::AsyncTx) && !transport.is_busy()
    }

    fn service_async_rx(&mut self) -> bool {
        let message = {
            let mut state = self.shared.state.lock();
            if state.guard.in_progress() {
                return false;
            }
            match state.queues.dequeue(Channel::AsyncRx) {
                Some(message) => message,
                None => return false,
            }
        };

        self.deliver(message);
        let state = self.shared.state.lock();
        !state.guard.in_progress() && !state.queues.is_empty(Channel::AsyncRx)
    }

    fn collect_rx(&mut self) -> bool {
        let mut frames = Vec::new();
        let collected = {
            let mut rx = self.shared.rx.lock();
            self.shared
                .codec
                .collect_frame_data(rx.bytes_mut(), &mut |frame| frames.push(frame))
        };
        self.shared.count(|s| {
            s.frames_received += collected.frames as u64;
            s.frames_rejected += collected.rejected as u64;
        });

        let mut enqueued = false;
        for frame in frames {
            enqueued |= self.shared.enqueue_inbound(frame).is_ok();
        }
        enqueued
    }

    /// Hand an inbound message to the stack, honouring the inbound hook.
    fn deliver(&mut self, message: MessageContainer) {
        let registration = self.shared.hooks.read().get(Direction::Inbound);
        match route(registration.as_ref(), message) {
            Routed::Forward { message, echoed } => {
                if echoed {
                    self.shared.count(|s| s.echoed += 1);
                }
                let destination = self.shared.config.stack_service_id;
                match self.stack.send(destination, message) {
                    Ok(()) => self.shared.count(|s| s.delivered_to_stack += 1),
                    Err(err) => {
                        warn!(error = %err, "stack send failed");
                        self.shared.count(|s| s.stack_send_failures += 1);
                    }
                }
            }
            Routed::Intercepted => self.shared.count(|s| s.intercepted += 1),
        }
    }

    fn write<T: SerialTransport + ?Sized>(&mut self, transport: &mut T, frame: MessageContainer) {
        match transport.write(frame.payload()) {
            Ok(written) => {
                trace!(class = %frame.class(), size = written, "frame written");
                self.shared.count(|s| s.frames_written += 1);
            }
            Err(err) => {
                warn!(error = %err, class = %frame.class(), "transport write failed");
                self.shared.count(|s| s.transport_write_failures += 1);
            }
        }
        free_message(frame);
    }

    fn tx_pending(&self) -> bool {
        let state = self.shared.state.lock();
        !state.queues.is_empty(Channel::SyncTx) || !state.queues.is_empty(Channel::AsyncTx)
    }

    fn release_all(&mut self) -> usize {
        let mut state = self.shared.state.lock();
        let mut released = state.inbox.len();
        state.inbox.clear();
        for channel in Channel::ALL {
            released += state.queues.clear(channel);
        }
        released
    }
}

impl<S> std::fmt::Debug for Router<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("config", &self.shared.config)
            .field("passes", &self.passes)
            .finish()
    }
}
