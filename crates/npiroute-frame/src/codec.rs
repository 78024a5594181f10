use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{trace, warn};

use crate::class::MessageClass;
use crate::error::{FrameError, Result};

/// Start-of-frame marker.
pub const SOF: u8 = 0xFE;

/// Frame header: SOF (1) + length (2) + cmd0 (1) + cmd1 (1) = 5 bytes.
pub const HEADER_SIZE: usize = 5;

/// Trailing frame check sequence.
pub const FCS_SIZE: usize = 1;

/// Number of command bytes at the start of every unframed message.
pub const COMMAND_SIZE: usize = 2;

/// Default maximum data length: 4 KiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 4 * 1024;

/// One unframed message: `cmd0 cmd1 data..`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    message: Bytes,
}

impl Frame {
    /// Wrap an unframed message. It must hold both command bytes.
    pub fn new(message: impl Into<Bytes>) -> Result<Self> {
        let message = message.into();
        if message.len() < COMMAND_SIZE {
            return Err(FrameError::MessageTooShort { len: message.len() });
        }
        Ok(Self { message })
    }

    /// Build a message from its command bytes and data.
    pub fn from_parts(cmd0: u8, cmd1: u8, data: &[u8]) -> Self {
        let mut message = BytesMut::with_capacity(COMMAND_SIZE + data.len());
        message.put_u8(cmd0);
        message.put_u8(cmd1);
        message.put_slice(data);
        Self {
            message: message.freeze(),
        }
    }

    pub fn cmd0(&self) -> u8 {
        self.message[0]
    }

    pub fn cmd1(&self) -> u8 {
        self.message[1]
    }

    /// The data following the command bytes.
    pub fn data(&self) -> &[u8] {
        &self.message[COMMAND_SIZE..]
    }

    /// Class from the type bits, `None` if unrecognized.
    pub fn class(&self) -> Option<MessageClass> {
        MessageClass::from_cmd0(self.cmd0())
    }

    /// The whole unframed message.
    pub fn message(&self) -> &Bytes {
        &self.message
    }

    pub fn into_message(self) -> Bytes {
        self.message
    }

    /// The total wire size of this message once framed.
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE - COMMAND_SIZE + self.message.len() + FCS_SIZE
    }
}

/// An outbound message after framing, ready for the transport.
#[derive(Debug)]
pub struct FramedMessage {
    pub class: MessageClass,
    pub frame: Bytes,
}

/// XOR of every byte.
pub fn fcs(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Encode an unframed message into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────┬───────────┬──────┬──────┬──────────────┬─────┐
/// │ SOF  │ Length    │ cmd0 │ cmd1 │ Data         │ FCS │
/// │ 0xFE │ (2B LE)   │      │      │ (Length B)   │     │
/// └──────┴───────────┴──────┴──────┴──────────────┴─────┘
/// ```
/// FCS is the XOR of every byte from Length through the last data byte.
pub fn encode_frame(message: &[u8], dst: &mut BytesMut) -> Result<()> {
    if message.len() < COMMAND_SIZE {
        return Err(FrameError::MessageTooShort { len: message.len() });
    }
    let data_len = message.len() - COMMAND_SIZE;
    if data_len > u16::MAX as usize {
        return Err(FrameError::PayloadTooLarge {
            size: data_len,
            max: u16::MAX as usize,
        });
    }

    dst.reserve(HEADER_SIZE + data_len + FCS_SIZE);
    let start = dst.len();
    dst.put_u8(SOF);
    dst.put_u16_le(data_len as u16);
    dst.put_slice(message);
    let check = fcs(&dst[start + 1..]);
    dst.put_u8(check);
    Ok(())
}

/// Decode one frame from the front of `src`.
///
/// Bytes before the next SOF are discarded. Returns `Ok(None)` until a whole
/// frame is buffered. A frame with a bad FCS is consumed and reported as
/// [`FrameError::InvalidFcs`]; an oversized length consumes only the SOF so
/// the next call resynchronizes.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    match src.iter().position(|&b| b == SOF) {
        Some(0) => {}
        Some(skip) => {
            trace!(skipped = skip, "discarding bytes before start of frame");
            src.advance(skip);
        }
        None => {
            if !src.is_empty() {
                trace!(skipped = src.len(), "no start of frame in buffer");
                src.clear();
            }
            return Ok(None);
        }
    }

    if src.len() < HEADER_SIZE {
        return Ok(None);
    }

    let data_len = u16::from_le_bytes([src[1], src[2]]) as usize;
    if data_len > max_payload {
        src.advance(1);
        return Err(FrameError::PayloadTooLarge {
            size: data_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + data_len + FCS_SIZE;
    if src.len() < total {
        return Ok(None);
    }

    let expected = fcs(&src[1..total - FCS_SIZE]);
    let actual = src[total - FCS_SIZE];
    if expected != actual {
        src.advance(total);
        return Err(FrameError::InvalidFcs { expected, actual });
    }

    src.advance(3);
    let message = src.split_to(COMMAND_SIZE + data_len).freeze();
    src.advance(FCS_SIZE);

    Ok(Some(Frame { message }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum data length in bytes. Default: 4 KiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking host-side operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking host-side operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

/// Outcome of one collection pass over the receive buffer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CollectStats {
    /// Complete frames handed to the callback.
    pub frames: usize,
    /// Frames dropped for a bad FCS or length.
    pub rejected: usize,
}

/// Frame codec contract consumed by the router.
pub trait FrameCodec: Send + Sync {
    /// Frame an unframed outbound message and classify it.
    fn frame_message(&self, message: &[u8]) -> Result<FramedMessage>;

    /// Pull every complete frame out of `rx`, calling `on_frame` for each.
    ///
    /// Partial frames stay in `rx`.
    fn collect_frame_data(&self, rx: &mut BytesMut, on_frame: &mut dyn FnMut(Frame))
        -> CollectStats;
}

/// The NPI frame codec.
#[derive(Debug, Clone, Default)]
pub struct NpiCodec {
    config: FrameConfig,
}

impl NpiCodec {
    pub fn new(config: FrameConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameCodec for NpiCodec {
    fn frame_message(&self, message: &[u8]) -> Result<FramedMessage> {
        if message.len() < COMMAND_SIZE {
            return Err(FrameError::MessageTooShort { len: message.len() });
        }
        let data_len = message.len() - COMMAND_SIZE;
        if data_len > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: data_len,
                max: self.config.max_payload_size,
            });
        }
        let class = MessageClass::from_cmd0(message[0])
            .ok_or(FrameError::UnknownClass { cmd0: message[0] })?;

        let mut frame = BytesMut::new();
        encode_frame(message, &mut frame)?;
        Ok(FramedMessage {
            class,
            frame: frame.freeze(),
        })
    }

    fn collect_frame_data(
        &self,
        rx: &mut BytesMut,
        on_frame: &mut dyn FnMut(Frame),
    ) -> CollectStats {
        let mut stats = CollectStats::default();
        loop {
            match decode_frame(rx, self.config.max_payload_size) {
                Ok(Some(frame)) => {
                    stats.frames += 1;
                    on_frame(frame);
                }
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "dropping malformed frame");
                    stats.rejected += 1;
                }
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn wire(message: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_frame(message, &mut buf).unwrap();
        buf
    }

    #[test]
    fn encode_layout() {
        let buf = wire(&[0x41, 0x02, 0xAA, 0xBB]);
        assert_eq!(buf[0], SOF);
        assert_eq!(&buf[1..3], &[0x02, 0x00]);
        assert_eq!(&buf[3..7], &[0x41, 0x02, 0xAA, 0xBB]);
        assert_eq!(buf[7], 0x02 ^ 0x00 ^ 0x41 ^ 0x02 ^ 0xAA ^ 0xBB);
        assert_eq!(buf.len(), Frame::from_parts(0x41, 0x02, &[0xAA, 0xBB]).wire_size());
    }

    #[test]
    fn decode_single_frame() {
        let mut buf = wire(&[0x21, 0x05, 1, 2, 3]);
        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame.cmd0(), 0x21);
        assert_eq!(frame.cmd1(), 0x05);
        assert_eq!(frame.data(), &[1, 2, 3]);
        assert_eq!(frame.class(), Some(MessageClass::SyncRequest));
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_incomplete_header() {
        let mut buf = BytesMut::from(&[SOF, 0x03, 0x00][..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn decode_incomplete_payload() {
        let mut buf = wire(&[0x41, 0x01, 9, 9, 9]);
        buf.truncate(HEADER_SIZE + 1);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
        assert_eq!(buf.len(), HEADER_SIZE + 1);
    }

    #[test]
    fn garbage_before_sof_is_skipped() {
        let mut buf = BytesMut::from(&[0x00, 0x13, 0x37][..]);
        buf.extend_from_slice(&wire(&[0x41, 0x01]));
        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame.message().as_ref(), &[0x41, 0x01]);
    }

    #[test]
    fn buffer_without_sof_is_discarded() {
        let mut buf = BytesMut::from(&[0x01, 0x02, 0x03][..]);
        assert!(decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap().is_none());
        assert!(buf.is_empty());
    }

    #[test]
    fn bad_fcs_consumes_frame() {
        let mut buf = wire(&[0x41, 0x01, 7]);
        let last = buf.len() - 1;
        buf[last] ^= 0xFF;
        buf.extend_from_slice(&wire(&[0x41, 0x02]));

        let err = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD).unwrap_err();
        assert!(matches!(err, FrameError::InvalidFcs { .. }));

        let next = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(next.cmd1(), 0x02);
    }

    #[test]
    fn oversized_length_resyncs() {
        let mut buf = BytesMut::from(&[SOF, 0xFF, 0xFF, 0x41, 0x01][..]);
        let err = decode_frame(&mut buf, 16).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 0xFFFF, max: 16 }));
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn encode_rejects_short_message() {
        let mut buf = BytesMut::new();
        let err = encode_frame(&[0x41], &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::MessageTooShort { len: 1 }));
        assert!(buf.is_empty());
    }

    #[test]
    fn codec_frames_and_classifies() {
        let codec = NpiCodec::default();
        let framed = codec.frame_message(&[0x61, 0x05, 0x00]).unwrap();
        assert_eq!(framed.class, MessageClass::SyncResponse);

        let mut buf = BytesMut::from(framed.frame.as_ref());
        let frame = decode_frame(&mut buf, DEFAULT_MAX_PAYLOAD)
            .unwrap()
            .unwrap();
        assert_eq!(frame.message().as_ref(), &[0x61, 0x05, 0x00]);
    }

    #[test]
    fn codec_rejects_unknown_class() {
        let codec = NpiCodec::default();
        let err = codec.frame_message(&[0x81, 0x00]).unwrap_err();
        assert!(matches!(err, FrameError::UnknownClass { cmd0: 0x81 }));
    }

    #[test]
    fn codec_enforces_max_payload() {
        let codec = NpiCodec::new(FrameConfig {
            max_payload_size: 2,
            ..FrameConfig::default()
        });
        let err = codec.frame_message(&[0x41, 0x00, 1, 2, 3]).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 3, max: 2 }));
    }

    #[test]
    fn collect_yields_frames_and_counts_rejects() {
        let codec = NpiCodec::default();
        let mut rx = wire(&[0x41, 0x01]);
        let mut corrupt = wire(&[0x41, 0x02]);
        let last = corrupt.len() - 1;
        corrupt[last] ^= 0x01;
        rx.extend_from_slice(&corrupt);
        rx.extend_from_slice(&wire(&[0x21, 0x03, 5]));
        let partial = wire(&[0x41, 0x04, 1, 2]);
        rx.extend_from_slice(&partial[..4]);

        let mut seen = Vec::new();
        let stats = codec.collect_frame_data(&mut rx, &mut |frame| seen.push(frame.cmd1()));

        assert_eq!(seen, vec![0x01, 0x03]);
        assert_eq!(stats, CollectStats { frames: 2, rejected: 1 });
        assert_eq!(rx.len(), 4, "partial frame stays buffered");
    }

    proptest! {
        #[test]
        fn prop_split_delivery_yields_same_frames(
            messages in prop::collection::vec(
                (0u8..=0xFF, 0u8..=0xFF, prop::collection::vec(any::<u8>(), 0..32)),
                1..8,
            ),
            split in 1usize..16,
        ) {
            let codec = NpiCodec::default();
            let mut stream = BytesMut::new();
            for (cmd0, cmd1, data) in &messages {
                encode_frame(Frame::from_parts(*cmd0, *cmd1, data).message(), &mut stream).unwrap();
            }

            let mut rx = BytesMut::new();
            let mut seen = Vec::new();
            for chunk in stream.chunks(split) {
                rx.extend_from_slice(chunk);
                codec.collect_frame_data(&mut rx, &mut |frame| seen.push(frame));
            }

            prop_assert!(rx.is_empty());
            prop_assert_eq!(seen.len(), messages.len());
            for (frame, (cmd0, cmd1, data)) in seen.iter().zip(&messages) {
                prop_assert_eq!(frame.cmd0(), *cmd0);
                prop_assert_eq!(frame.cmd1(), *cmd1);
                prop_assert_eq!(frame.data(), data.as_slice());
            }
        }
    }
}
