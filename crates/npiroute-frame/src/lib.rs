//! NPI frame codec.
//!
//! Every message on the serial line is framed as:
//! - a start-of-frame byte (`0xFE`) for stream synchronization
//! - a 2-byte little-endian data length
//! - the two command bytes (`cmd0`, `cmd1`) and the data
//! - a 1-byte XOR frame check sequence
//!
//! The type bits of `cmd0` carry the [`MessageClass`] the router dispatches on.

pub mod class;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use class::MessageClass;
pub use codec::{
    decode_frame, encode_frame, fcs, CollectStats, Frame, FrameCodec, FrameConfig, FramedMessage,
    NpiCodec, COMMAND_SIZE, DEFAULT_MAX_PAYLOAD, FCS_SIZE, HEADER_SIZE, SOF,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
