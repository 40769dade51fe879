//! Byte-level serialization over `bytes` buffers.
//!
//! Integers are fixed-width little-endian records; multi-precision and
//! backend-specific values use the backend's own codec. Readers validate
//! lengths before allocating.

use crate::error::MifeError;
use bytes::{Buf, BufMut};

/// A type that can be written to a byte buffer.
pub trait SerializeBytes {
    fn serialize(&self, buf: &mut impl BufMut) -> Result<(), MifeError>;
}

/// A type that can be reconstructed from a byte buffer.
pub trait DeserializeBytes: Sized {
    fn deserialize(buf: &mut impl Buf) -> Result<Self, MifeError>;
}

pub(crate) fn write_u64(buf: &mut impl BufMut, v: u64) -> Result<(), MifeError> {
    if buf.remaining_mut() < 8 {
        return Err(MifeError::Serialization("write buffer full"));
    }
    buf.put_u64_le(v);
    Ok(())
}

pub(crate) fn read_u64(buf: &mut impl Buf) -> Result<u64, MifeError> {
    if buf.remaining() < 8 {
        return Err(MifeError::Serialization("truncated input"));
    }
    Ok(buf.get_u64_le())
}

pub(crate) fn write_u32(buf: &mut impl BufMut, v: u32) -> Result<(), MifeError> {
    if buf.remaining_mut() < 4 {
        return Err(MifeError::Serialization("write buffer full"));
    }
    buf.put_u32_le(v);
    Ok(())
}

pub(crate) fn read_u32(buf: &mut impl Buf) -> Result<u32, MifeError> {
    if buf.remaining() < 4 {
        return Err(MifeError::Serialization("truncated input"));
    }
    Ok(buf.get_u32_le())
}

pub(crate) fn write_bool(buf: &mut impl BufMut, v: bool) -> Result<(), MifeError> {
    if buf.remaining_mut() < 1 {
        return Err(MifeError::Serialization("write buffer full"));
    }
    buf.put_u8(u8::from(v));
    Ok(())
}

pub(crate) fn read_bool(buf: &mut impl Buf) -> Result<bool, MifeError> {
    if buf.remaining() < 1 {
        return Err(MifeError::Serialization("truncated input"));
    }
    match buf.get_u8() {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(MifeError::Serialization("malformed boolean")),
    }
}

/// Read a length prefix and check it against what the buffer could possibly
/// hold, so a corrupt length never triggers a huge allocation.
pub(crate) fn read_len(buf: &mut impl Buf, elem_size: usize) -> Result<usize, MifeError> {
    let len = read_u64(buf)?;
    let len = usize::try_from(len).map_err(|_| MifeError::Serialization("length overflow"))?;
    if len.saturating_mul(elem_size) > buf.remaining() {
        return Err(MifeError::Serialization("length exceeds input"));
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn u64_roundtrip() {
        let mut buf = Vec::new();
        write_u64(&mut buf, 0xdead_beef_0123).unwrap();
        assert_eq!(read_u64(&mut buf.as_slice()).unwrap(), 0xdead_beef_0123);
    }

    #[test]
    fn truncated_read_is_an_error() {
        let buf = [1u8, 2, 3];
        assert_eq!(
            read_u64(&mut &buf[..]),
            Err(MifeError::Serialization("truncated input"))
        );
    }

    #[test]
    fn hostile_length_is_rejected() {
        let mut buf = Vec::new();
        write_u64(&mut buf, u64::MAX).unwrap();
        assert!(read_len(&mut buf.as_slice(), 8).is_err());
    }
}
