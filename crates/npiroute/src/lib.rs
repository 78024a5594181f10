//! NPI message router between a serial host link and a protocol stack.
//!
//! # Crate Structure
//!
//! - [`transport`]: serial transport contract, receive staging, host socket
//! - [`frame`]: NPI frame codec and blocking frame reader/writer
//! - [`router`]: the router, its queues and the synchronous guard

/// Re-export transport types.
pub mod transport {
    pub use npiroute_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use npiroute_frame::*;
}

/// Re-export router types.
pub mod router {
    pub use npiroute_core::*;
}
