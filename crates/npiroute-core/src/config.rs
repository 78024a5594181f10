use std::path::Path;
use std::time::Duration;

use npiroute_frame::{FrameConfig, DEFAULT_MAX_PAYLOAD, FCS_SIZE, HEADER_SIZE};
use npiroute_transport::DEFAULT_RX_BUFFER_SIZE;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::queue::DEFAULT_QUEUE_CAPACITY;
use crate::stack::ServiceId;

/// Router tuning. Every field has a default; a JSON file may set any subset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RouterConfig {
    /// Capacity of each of the four channel queues.
    pub queue_capacity: usize,
    /// Capacity of the stack-to-host inbox.
    pub inbox_capacity: usize,
    /// Watchdog duration for one synchronous exchange, in milliseconds.
    pub watchdog_timeout_ms: u64,
    /// Receive staging buffer size in bytes.
    pub rx_buffer_size: usize,
    /// Largest accepted data length per frame.
    pub max_payload: usize,
    /// Service MRDY events through the transport.
    pub flow_control: bool,
    /// Destination id passed to the stack sender.
    pub stack_service_id: ServiceId,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            inbox_capacity: DEFAULT_QUEUE_CAPACITY,
            watchdog_timeout_ms: 500,
            rx_buffer_size: DEFAULT_RX_BUFFER_SIZE,
            max_payload: DEFAULT_MAX_PAYLOAD,
            flow_control: false,
            stack_service_id: 0,
        }
    }
}

impl RouterConfig {
    /// Load and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason| Err(ConfigError::Invalid { field, reason });
        if self.queue_capacity == 0 {
            return invalid("queue_capacity", "must be at least 1");
        }
        if self.inbox_capacity == 0 {
            return invalid("inbox_capacity", "must be at least 1");
        }
        if self.watchdog_timeout_ms == 0 {
            return invalid("watchdog_timeout_ms", "must be at least 1");
        }
        if self.rx_buffer_size == 0 {
            return invalid("rx_buffer_size", "must be at least 1");
        }
        if self.max_payload > u16::MAX as usize {
            return invalid("max_payload", "must fit the 16-bit length field");
        }
        if self.rx_buffer_size < self.max_frame_size() {
            return invalid(
                "rx_buffer_size",
                "must hold one frame carrying max_payload data bytes",
            );
        }
        Ok(())
    }

    /// Wire size of the largest frame this config accepts.
    pub fn max_frame_size(&self) -> usize {
        HEADER_SIZE + self.max_payload + FCS_SIZE
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }

    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_payload_size: self.max_payload,
            ..FrameConfig::default()
        }
    }
}
