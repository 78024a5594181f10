//! At-most-one outstanding synchronous exchange, with a watchdog.

use std::time::{Duration, Instant};

use crate::message::TransactionId;

/// Default watchdog duration for one synchronous exchange.
pub const DEFAULT_WATCHDOG_TIMEOUT: Duration = Duration::from_millis(500);

/// Result of ending a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOutcome {
    /// The outstanding transaction completed.
    Ended(TransactionId),
    /// No transaction was outstanding; the counter stayed clamped at zero.
    Underflow,
}

/// Transaction counter plus a one-shot watchdog deadline.
///
/// The deadline is armed and disarmed together with the counter, so they are
/// always consistent as long as the guard sits behind the same lock as the
/// queues.
#[derive(Debug)]
pub struct SyncGuard {
    count: i32,
    timeout: Duration,
    deadline: Option<Instant>,
    generation: u64,
    current: Option<TransactionId>,
}

impl SyncGuard {
    pub fn new(timeout: Duration) -> Self {
        Self {
            count: 0,
            timeout,
            deadline: None,
            generation: 0,
            current: None,
        }
    }

    /// Start a transaction and arm the watchdog.
    pub fn begin(&mut self, now: Instant) -> TransactionId {
        self.generation += 1;
        let id = TransactionId::new(self.generation);
        self.count += 1;
        self.current = Some(id);
        self.deadline = Some(now + self.timeout);
        id
    }

    /// Finish the outstanding transaction and disarm the watchdog.
    pub fn end(&mut self) -> EndOutcome {
        self.deadline = None;
        if self.count <= 0 {
            self.count = 0;
            self.current = None;
            return EndOutcome::Underflow;
        }
        self.count -= 1;
        match self.current.take() {
            Some(id) => EndOutcome::Ended(id),
            None => EndOutcome::Underflow,
        }
    }

    /// Abandon the outstanding transaction if its deadline has passed.
    pub fn expire_if_due(&mut self, now: Instant) -> Option<TransactionId> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.count = (self.count - 1).max(0);
                self.current.take()
            }
            _ => None,
        }
    }

    /// When the watchdog fires, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn in_progress(&self) -> bool {
        self.count > 0
    }

    pub fn current(&self) -> Option<TransactionId> {
        self.current
    }

    pub fn count(&self) -> i32 {
        self.count
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for SyncGuard {
    fn default() -> Self {
        Self::new(DEFAULT_WATCHDOG_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn begin_end_cycle() {
        let now = Instant::now();
        let mut guard = SyncGuard::default();

        let id = guard.begin(now);
        assert!(guard.in_progress());
        assert_eq!(guard.current(), Some(id));
        assert_eq!(guard.deadline(), Some(now + DEFAULT_WATCHDOG_TIMEOUT));

        assert_eq!(guard.end(), EndOutcome::Ended(id));
        assert!(!guard.in_progress());
        assert_eq!(guard.deadline(), None);
        assert_eq!(guard.current(), None);
    }

    #[test]
    fn end_without_begin_clamps() {
        let mut guard = SyncGuard::default();
        assert_eq!(guard.end(), EndOutcome::Underflow);
        assert_eq!(guard.count(), 0);
    }

    #[test]
    fn expiry_only_after_deadline() {
        let now = Instant::now();
        let mut guard = SyncGuard::new(Duration::from_millis(500));
        let id = guard.begin(now);

        assert_eq!(guard.expire_if_due(now + Duration::from_millis(499)), None);
        assert!(guard.in_progress());

        assert_eq!(guard.expire_if_due(now + Duration::from_millis(500)), Some(id));
        assert!(!guard.in_progress());
        assert_eq!(guard.deadline(), None);
        assert_eq!(guard.expire_if_due(now + Duration::from_secs(5)), None);
    }

    #[test]
    fn generations_are_distinct() {
        let now = Instant::now();
        let mut guard = SyncGuard::default();
        let first = guard.begin(now);
        guard.expire_if_due(now + DEFAULT_WATCHDOG_TIMEOUT);
        let second = guard.begin(now);
        assert_ne!(first, second);
        assert!(second > first);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Begin,
        End,
        Tick(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Begin),
            Just(Op::End),
            (0u64..1000).prop_map(Op::Tick),
        ]
    }

    proptest! {
        // The router only calls `begin` when nothing is in progress; under
        // that discipline the counter stays within 0..=1 for any sequence.
        #[test]
        fn prop_counter_stays_binary(ops in prop::collection::vec(op(), 0..64)) {
            let start = Instant::now();
            let mut elapsed = 0u64;
            let mut guard = SyncGuard::default();
            for op in ops {
                match op {
                    Op::Begin => {
                        if !guard.in_progress() {
                            guard.begin(start + Duration::from_millis(elapsed));
                        }
                    }
                    Op::End => {
                        guard.end();
                    }
                    Op::Tick(ms) => {
                        elapsed += ms;
                        guard.expire_if_due(start + Duration::from_millis(elapsed));
                    }
                }
                prop_assert!((0..=1).contains(&guard.count()));
                prop_assert_eq!(guard.in_progress(), guard.deadline().is_some());
                prop_assert_eq!(guard.in_progress(), guard.current().is_some());
            }
        }
    }
}
