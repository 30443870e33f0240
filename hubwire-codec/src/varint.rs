//! Variable-length frame length prefix.
//!
//! Seven bits per byte, least significant group first; the high bit marks a
//! continuation. At most five bytes, which caps a frame at `i32::MAX` bytes.

use hubwire_core::CodecError;
use ntex_bytes::BytesMut;

/// Longest possible length prefix.
pub const MAX_PREFIX_LEN: usize = 5;

/// Largest length a prefix can carry.
pub const MAX_LENGTH: usize = i32::MAX as usize;

/// Number of prefix bytes needed for `len`.
#[must_use]
pub fn prefix_len(len: usize) -> usize {
    let mut n = 1;
    let mut rest = len >> 7;
    while rest > 0 {
        n += 1;
        rest >>= 7;
    }
    n
}

/// Append the prefix for `len` to `dst`.
pub fn write_length(len: usize, dst: &mut BytesMut) -> Result<(), CodecError> {
    if len > MAX_LENGTH {
        return Err(CodecError::FrameTooLarge {
            size: len,
            max: MAX_LENGTH,
        });
    }

    let mut prefix = [0u8; MAX_PREFIX_LEN];
    let mut rest = len;
    let mut n = 0;
    loop {
        let mut byte = (rest & 0x7f) as u8;
        rest >>= 7;
        if rest > 0 {
            byte |= 0x80;
        }
        prefix[n] = byte;
        n += 1;
        if rest == 0 {
            break;
        }
    }

    dst.extend_from_slice(&prefix[..n]);
    Ok(())
}

/// Read a prefix from the start of `src`.
///
/// Returns `Ok(Some((length, prefix_len)))`, or `Ok(None)` if `src` ends
/// before the prefix does.
pub fn read_length(src: &[u8]) -> Result<Option<(usize, usize)>, CodecError> {
    let mut len = 0usize;
    for (i, &byte) in src.iter().take(MAX_PREFIX_LEN).enumerate() {
        if i == MAX_PREFIX_LEN - 1 && byte > 0x07 {
            return Err(CodecError::malformed(
                "length prefix exceeds the 2 GB frame limit",
            ));
        }

        len |= usize::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(Some((len, i + 1)));
        }
    }

    Ok(None)
}
