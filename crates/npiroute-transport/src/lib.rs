//! Serial transport contract for the NPI router.
//!
//! The router never touches a UART or SPI driver directly. It talks to a
//! [`SerialTransport`] for writes and busy checks, and the transport reports
//! back through [`TransportCallbacks`]:
//! - bytes received (staged into an [`RxBuffer`])
//! - transmission done
//! - flow-control (MRDY) line ready
//!
//! [`StreamTransport`] adapts any byte stream (a Unix socket standing in for
//! the serial line) to that contract.

pub mod error;
pub mod rxbuf;
pub mod stream;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use rxbuf::{RxBuffer, DEFAULT_RX_BUFFER_SIZE};
pub use stream::StreamTransport;
pub use traits::{SerialTransport, TransportCallbacks};

#[cfg(unix)]
pub use uds::{HostSocket, HostStream};
