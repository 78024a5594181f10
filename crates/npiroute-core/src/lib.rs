//! The NPI message router.
//!
//! A single consumer bridges a byte-oriented serial transport to the stack
//! task. It owns four bounded queues (ASYNC-TX, ASYNC-RX, SYNC-TX, SYNC-RX)
//! and, on every wake, services them in a fixed priority order:
//!
//! 1. pending MRDY, regardless of any other state
//! 2. watchdog expiry, then the outstanding SYNC response
//! 3. one message from the stack inbox
//! 4. one SYNC request, only when no transaction is outstanding
//! 5. one ASYNC frame to the transport
//! 6. one ASYNC message to the stack
//! 7. newly received frames, and re-arming after TX done
//!
//! Synchronous traffic always preempts asynchronous traffic, and at most one
//! synchronous exchange is outstanding at a time.
//!
//! ```no_run
//! use std::sync::mpsc;
//! use npiroute_core::{Router, RouterConfig};
//!
//! # fn transport() -> Box<dyn npiroute_transport::SerialTransport> { unimplemented!() }
//! let (to_stack, from_router) = mpsc::channel();
//! let mut router = Router::new(RouterConfig::default(), to_stack)?;
//! let handle = router.handle();
//! let mut transport = transport();
//! std::thread::spawn(move || {
//!     for message in from_router.iter() {
//!         let _ = message;
//!     }
//!     handle.shutdown();
//! });
//! let summary = router.run(&mut transport)?;
//! # Ok::<(), npiroute_core::RouterError>(())
//! ```

pub mod config;
pub mod error;
pub mod handle;
pub mod message;
pub mod queue;
pub mod reroute;
pub mod router;
pub mod stack;
pub mod stats;
pub mod sync_guard;
pub mod wake;

pub use config::RouterConfig;
pub use error::{ConfigError, Result, RouterError};
pub use handle::RouterHandle;
pub use message::{free_message, MessageContainer, TransactionId};
pub use queue::{Channel, QueueFull, QueueSet, DEFAULT_QUEUE_CAPACITY};
pub use reroute::{Direction, RerouteCallback, ReroutePolicy, Rerouted};
pub use router::{PassOutcome, Router, RunSummary};
pub use stack::{ServiceId, StackFn, StackSendError, StackSender};
pub use stats::RouterStats;
pub use sync_guard::{EndOutcome, SyncGuard, DEFAULT_WATCHDOG_TIMEOUT};
pub use wake::{EventChannel, PendingEvents, RouterEvent, WakeSignal};
