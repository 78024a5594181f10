use std::io::{ErrorKind, Read};

use bytes::BytesMut;

use crate::codec::{decode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 1024;
const READ_CHUNK_SIZE: usize = 512;

/// Reads complete NPI frames from any `Read` stream.
///
/// This is the host end of the link. Partial reads are buffered internally.
/// A frame that fails its check sequence is reported once and skipped, so the
/// next call resumes with the following frame.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = decode_frame(&mut self.buf, self.config.max_payload_size)? {
                return Ok(frame);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

#[cfg(unix)]
impl FrameReader<npiroute_transport::HostStream> {
    /// Create a reader over a host link and apply the read timeout from config.
    pub fn with_config_host(
        inner: npiroute_transport::HostStream,
        config: FrameConfig,
    ) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(crate::error::from_transport)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use bytes::{BufMut, BytesMut};

    use super::*;
    use crate::codec::{encode_frame, SOF};

    fn wire(messages: &[&[u8]]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for message in messages {
            encode_frame(message, &mut buf).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn read_multiple_frames() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[
            &[0x41, 0x01, b'a'],
            &[0x61, 0x02],
            &[0x41, 0x03, b'b', b'c'],
        ])));

        let f1 = reader.read_frame().unwrap();
        let f2 = reader.read_frame().unwrap();
        let f3 = reader.read_frame().unwrap();

        assert_eq!((f1.cmd1(), f1.data()), (0x01, b"a".as_ref()));
        assert_eq!((f2.cmd1(), f2.data()), (0x02, b"".as_ref()));
        assert_eq!((f3.cmd1(), f3.data()), (0x03, b"bc".as_ref()));
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: wire(&[&[0x61, 0x10, 1, 2, 3, 4]]),
            pos: 0,
        };
        let mut reader = FrameReader::new(byte_reader);

        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.cmd0(), 0x61);
        assert_eq!(frame.data(), &[1, 2, 3, 4]);
    }

    #[test]
    fn connection_closed_mid_frame() {
        let mut partial = BytesMut::new();
        partial.put_u8(SOF);
        partial.put_u16_le(8);
        partial.put_slice(&[0x41, 0x01, 0xAA]);

        let mut reader = FrameReader::new(Cursor::new(partial.to_vec()));
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn bad_fcs_is_reported_then_skipped() {
        let mut bytes = wire(&[&[0x41, 0x01]]);
        let last = bytes.len() - 1;
        bytes[last] ^= 0x55;
        bytes.extend_from_slice(&wire(&[&[0x41, 0x02]]));

        let mut reader = FrameReader::new(Cursor::new(bytes));
        assert!(matches!(
            reader.read_frame().unwrap_err(),
            FrameError::InvalidFcs { .. }
        ));
        assert_eq!(reader.read_frame().unwrap().cmd1(), 0x02);
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            interrupted: false,
            inner: Cursor::new(wire(&[&[0x41, 0x08, b'o', b'k']])),
        };
        let mut framed = FrameReader::new(reader);
        let frame = framed.read_frame().unwrap();
        assert_eq!(frame.data(), b"ok");
    }

    #[test]
    #[cfg(unix)]
    fn roundtrip_over_host_stream() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = crate::writer::FrameWriter::new(npiroute_transport::HostStream::from_unix(left));
        let cfg = FrameConfig {
            read_timeout: Some(std::time::Duration::from_secs(2)),
            ..FrameConfig::default()
        };
        let mut reader =
            FrameReader::with_config_host(npiroute_transport::HostStream::from_unix(right), cfg)
                .unwrap();

        writer.send(0x21, 0x05, b"ping").unwrap();
        let frame = reader.read_frame().unwrap();
        assert_eq!(frame.cmd0(), 0x21);
        assert_eq!(frame.data(), b"ping");
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        interrupted: bool,
        inner: Cursor<Vec<u8>>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            self.inner.read(buf)
        }
    }
}
