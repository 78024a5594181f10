//! The single wake primitive the router blocks on.

use std::time::Instant;

use parking_lot::{Condvar, Mutex};

/// Why the router was woken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouterEvent {
    /// The transport staged received bytes.
    BytesAvailable,
    /// The transport finished a write.
    TxDone,
    /// The host asserted MRDY.
    FlowControlReady,
    /// A producer queued a message.
    MessageEnqueued,
    /// A previous pass left serviceable work behind.
    Rearm,
    Shutdown,
}

/// Coalesced set of events posted since the last wake.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PendingEvents {
    pub bytes_available: bool,
    pub tx_done: bool,
    pub flow_control_ready: bool,
    pub message_enqueued: bool,
    pub rearm: bool,
    pub shutdown: bool,
}

impl PendingEvents {
    pub fn insert(&mut self, event: RouterEvent) {
        *self.flag(event) = true;
    }

    pub fn contains(&self, event: RouterEvent) -> bool {
        match event {
            RouterEvent::BytesAvailable => self.bytes_available,
            RouterEvent::TxDone => self.tx_done,
            RouterEvent::FlowControlReady => self.flow_control_ready,
            RouterEvent::MessageEnqueued => self.message_enqueued,
            RouterEvent::Rearm => self.rearm,
            RouterEvent::Shutdown => self.shutdown,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn flag(&mut self, event: RouterEvent) -> &mut bool {
        match event {
            RouterEvent::BytesAvailable => &mut self.bytes_available,
            RouterEvent::TxDone => &mut self.tx_done,
            RouterEvent::FlowControlReady => &mut self.flow_control_ready,
            RouterEvent::MessageEnqueued => &mut self.message_enqueued,
            RouterEvent::Rearm => &mut self.rearm,
            RouterEvent::Shutdown => &mut self.shutdown,
        }
    }
}

impl FromIterator<RouterEvent> for PendingEvents {
    fn from_iter<I: IntoIterator<Item = RouterEvent>>(iter: I) -> Self {
        let mut pending = Self::default();
        for event in iter {
            pending.insert(event);
        }
        pending
    }
}

/// Multi-producer, single-consumer wake signal.
///
/// Producers post from any thread (including transport driver threads) and
/// never block for longer than a short lock. Posting the same event twice
/// before the consumer wakes has the same effect as posting it once.
pub trait WakeSignal: Send + Sync {
    fn post(&self, event: RouterEvent);

    /// Block until something is posted or `deadline` passes, then take
    /// everything pending. Returns an empty set on timeout.
    fn wait(&self, deadline: Option<Instant>) -> PendingEvents;

    /// Take everything pending without blocking.
    fn take(&self) -> PendingEvents;

    fn is_pending(&self) -> bool;
}

/// [`WakeSignal`] backed by a mutex and condition variable.
#[derive(Debug, Default)]
pub struct EventChannel {
    pending: Mutex<PendingEvents>,
    ready: Condvar,
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WakeSignal for EventChannel {
    fn post(&self, event: RouterEvent) {
        self.pending.lock().insert(event);
        self.ready.notify_one();
    }

    fn wait(&self, deadline: Option<Instant>) -> PendingEvents {
        let mut pending = self.pending.lock();
        while pending.is_empty() {
            match deadline {
                Some(deadline) => {
                    if self.ready.wait_until(&mut pending, deadline).timed_out() {
                        break;
                    }
                }
                None => self.ready.wait(&mut pending),
            }
        }
        std::mem::take(&mut *pending)
    }

    fn take(&self) -> PendingEvents {
        std::mem::take(&mut *self.pending.lock())
    }

    fn is_pending(&self) -> bool {
        !self.pending.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn events_coalesce() {
        let channel = EventChannel::new();
        channel.post(RouterEvent::TxDone);
        channel.post(RouterEvent::TxDone);
        channel.post(RouterEvent::BytesAvailable);

        let pending = channel.take();
        assert_eq!(
            pending,
            [RouterEvent::TxDone, RouterEvent::BytesAvailable]
                .into_iter()
                .collect()
        );
        assert!(!channel.is_pending());
        assert!(channel.take().is_empty());
    }

    #[test]
    fn wait_times_out_empty() {
        let channel = EventChannel::new();
        let start = Instant::now();
        let pending = channel.wait(Some(start + Duration::from_millis(20)));
        assert!(pending.is_empty());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn wait_wakes_on_post_from_other_thread() {
        let channel = Arc::new(EventChannel::new());
        let poster = {
            let channel = Arc::clone(&channel);
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(10));
                channel.post(RouterEvent::FlowControlReady);
            })
        };

        let pending = channel.wait(Some(Instant::now() + Duration::from_secs(5)));
        assert!(pending.contains(RouterEvent::FlowControlReady));
        poster.join().unwrap();
    }
}
