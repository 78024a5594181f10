use serde::Serialize;

/// Counters for everything the router drops, recovers from or delivers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RouterStats {
    /// Complete frames pulled out of the receive buffer.
    pub frames_received: u64,
    /// Frames discarded for a bad check sequence or length.
    pub frames_rejected: u64,
    /// Inbound messages handed to the stack.
    pub delivered_to_stack: u64,
    /// Frames handed to the transport.
    pub frames_written: u64,
    pub sync_transactions: u64,
    pub queue_full_drops: u64,
    /// Unknown class, inbound SYNC response, response with no transaction.
    pub protocol_violations: u64,
    pub stale_responses: u64,
    pub watchdog_expiries: u64,
    pub counter_underflows: u64,
    pub stack_send_failures: u64,
    pub transport_write_failures: u64,
    pub echoed: u64,
    pub intercepted: u64,
}

impl RouterStats {
    /// Rows for tabular output.
    pub fn rows(&self) -> [(&'static str, u64); 14] {
        [
            ("frames_received", self.frames_received),
            ("frames_rejected", self.frames_rejected),
            ("delivered_to_stack", self.delivered_to_stack),
            ("frames_written", self.frames_written),
            ("sync_transactions", self.sync_transactions),
            ("queue_full_drops", self.queue_full_drops),
            ("protocol_violations", self.protocol_violations),
            ("stale_responses", self.stale_responses),
            ("watchdog_expiries", self.watchdog_expiries),
            ("counter_underflows", self.counter_underflows),
            ("stack_send_failures", self.stack_send_failures),
            ("transport_write_failures", self.transport_write_failures),
            ("echoed", self.echoed),
            ("intercepted", self.intercepted),
        ]
    }
}
