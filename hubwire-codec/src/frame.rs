//! Varint length-prefixed frame codec.

use std::ops::Range;

use hubwire_core::{CodecError, DEFAULT_MAX_FRAME_SIZE};
use ntex_bytes::{Buf, Bytes, BytesMut};
use ntex_codec::{Decoder, Encoder};

use crate::varint;

/// Length-prefixed frame codec.
///
/// Every hub message travels as one frame: a variable-length integer giving
/// the payload size, followed by the payload. Frames can be concatenated
/// back to back.
///
/// ## Frame Format
///
/// ```text
/// +--------------------+------------------+
/// | Length (varint, 1-5)| Payload (N bytes)|
/// +--------------------+------------------+
/// ```
///
/// ## Example
///
/// ```rust
/// use hubwire_codec::FrameCodec;
/// use ntex_bytes::BytesMut;
/// use ntex_codec::Decoder;
///
/// let codec = FrameCodec::new();
/// let mut buf = BytesMut::new();
///
/// codec.encode_slice(b"hello", &mut buf).unwrap();
/// assert_eq!(buf[0], 5);
///
/// let decoded = codec.decode(&mut buf).unwrap().unwrap();
/// assert_eq!(&decoded[..], b"hello");
/// ```
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    /// Create a new codec with default settings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Create a codec with a custom maximum frame size.
    ///
    /// Sizes above what the length prefix can express are clamped.
    #[inline]
    #[must_use]
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size: max_frame_size.min(varint::MAX_LENGTH),
        }
    }

    /// Get the maximum frame size.
    #[inline]
    #[must_use]
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Locate the payload of the first frame in `src`.
    ///
    /// Returns the payload's byte range within `src`; the frame ends where the
    /// range ends. Fails with `IncompleteFrame` if `src` does not yet hold the
    /// whole frame.
    pub fn frame_bounds(&self, src: &[u8]) -> Result<Range<usize>, CodecError> {
        let Some((len, prefix)) = varint::read_length(src)? else {
            return Err(CodecError::IncompleteFrame { needed: 1 });
        };

        if len > self.max_frame_size {
            return Err(CodecError::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }

        let total_len = prefix + len;
        if src.len() < total_len {
            return Err(CodecError::IncompleteFrame {
                needed: total_len - src.len(),
            });
        }

        Ok(prefix..total_len)
    }

    /// Decode a frame from a byte slice without copying.
    ///
    /// Returns `Ok(Some((payload, consumed)))` if a complete frame was decoded,
    /// where `consumed` is the number of bytes read from the input.
    /// Returns `Ok(None)` if more data is needed.
    pub fn decode_slice<'a>(&self, src: &'a [u8]) -> Result<Option<(&'a [u8], usize)>, CodecError> {
        match self.frame_bounds(src) {
            Ok(payload) => {
                let consumed = payload.end;
                Ok(Some((&src[payload], consumed)))
            }
            Err(CodecError::IncompleteFrame { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Encode a byte slice into the buffer.
    pub fn encode_slice(&self, item: &[u8], dst: &mut BytesMut) -> Result<(), CodecError> {
        let len = item.len();

        if len > self.max_frame_size {
            return Err(CodecError::FrameTooLarge {
                size: len,
                max: self.max_frame_size,
            });
        }

        dst.reserve(varint::prefix_len(len) + len);
        varint::write_length(len, dst)?;
        dst.extend_from_slice(item);

        Ok(())
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = CodecError;

    fn decode(&self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.frame_bounds(src) {
            Ok(payload) => {
                src.advance(payload.start);
                Ok(Some(src.split_to(payload.len()).freeze()))
            }
            Err(CodecError::IncompleteFrame { needed }) => {
                // Reserve space for the rest of the frame
                src.reserve(needed);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

impl Encoder for FrameCodec {
    type Item = Vec<u8>;
    type Error = CodecError;

    fn encode(&self, item: Self::Item, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.encode_slice(&item, dst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        let message = b"hello, world!";
        codec.encode_slice(message.as_slice(), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(&decoded[..], message);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_frame() {
        let codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        // 200 bytes needs a two byte prefix
        buf.extend_from_slice(&[0xc8]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&[0x01]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&[0xab; 150]);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&[0xab; 50]);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.len(), 200);
    }

    #[test]
    fn test_frame_bounds_reports_missing_bytes() {
        let codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode_slice(b"abcdef", &mut buf).unwrap();

        assert_eq!(codec.frame_bounds(&buf[..3]), Err(CodecError::IncompleteFrame { needed: 4 }));
        assert_eq!(codec.frame_bounds(&[]), Err(CodecError::IncompleteFrame { needed: 1 }));
        assert_eq!(codec.frame_bounds(&buf), Ok(1..7));
    }

    #[test]
    fn test_multiple_frames() {
        let codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        codec.encode_slice(b"first", &mut buf).unwrap();
        codec.encode_slice(b"second", &mut buf).unwrap();
        codec.encode_slice(b"third", &mut buf).unwrap();

        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], b"first");
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], b"second");
        assert_eq!(&codec.decode(&mut buf).unwrap().unwrap()[..], b"third");
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }

    #[test]
    fn test_decode_slice() {
        let codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode_slice(b"one", &mut buf).unwrap();
        codec.encode_slice(b"two", &mut buf).unwrap();

        let (payload, consumed) = codec.decode_slice(&buf).unwrap().unwrap();
        assert_eq!(payload, b"one");
        assert_eq!(consumed, 4);

        let (payload, _) = codec.decode_slice(&buf[consumed..]).unwrap().unwrap();
        assert_eq!(payload, b"two");

        assert!(codec.decode_slice(&buf[..2]).unwrap().is_none());
    }

    #[test]
    fn test_frame_too_large() {
        let codec = FrameCodec::with_max_frame_size(100);
        let mut buf = BytesMut::new();

        let large_data = vec![0u8; 200];
        let result = codec.encode_slice(&large_data, &mut buf);
        assert!(matches!(result, Err(CodecError::FrameTooLarge { .. })));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_oversized_frame() {
        let codec = FrameCodec::with_max_frame_size(100);
        let mut buf = BytesMut::new();

        // Prefix announcing 200 bytes
        buf.extend_from_slice(&[0xc8, 0x01]);
        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(CodecError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_empty_frame() {
        let codec = FrameCodec::new();
        let mut buf = BytesMut::new();

        codec.encode_slice(b"", &mut buf).unwrap();
        assert_eq!(&buf[..], [0x00]);
        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert!(decoded.is_empty());
    }
}
