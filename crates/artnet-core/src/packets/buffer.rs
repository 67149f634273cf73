use std::ops::Range;

use super::error::PacketError;
use super::layout;

/// Fixed-capacity byte buffer backing every Art-Net packet model.
///
/// The capacity is set at construction and never grows. `len` is the number
/// of bytes that go on the wire and always satisfies `len <= capacity`.
/// Every accessor checks `offset + width` against the capacity before it
/// touches the bytes.
///
/// # Examples
/// ```
/// use artnet_core::packets::PacketBuffer;
///
/// let mut buffer = PacketBuffer::new(4);
/// buffer.set_u16_le(0, 0x1234).unwrap();
/// assert_eq!(buffer.u16_le(0).unwrap(), 0x1234);
/// assert!(buffer.set_u16_be(3, 1).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketBuffer {
    data: Box<[u8]>,
    len: usize,
}

impl PacketBuffer {
    /// Zeroed buffer whose wire length equals its capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            len: capacity,
        }
    }

    /// Buffer pre-filled with the Art-Net ID and `opcode`. Versioned packets
    /// carry the protocol version next, then `trailer`; unversioned packets
    /// continue with `trailer` right after the opcode.
    pub(crate) fn with_header(
        capacity: usize,
        len: usize,
        opcode: u16,
        versioned: bool,
        trailer: &[u8],
    ) -> Self {
        let mut prefix = Vec::with_capacity(layout::PROTOCOL_VERSION_RANGE.end + trailer.len());
        prefix.extend_from_slice(layout::ARTNET_ID);
        prefix.extend_from_slice(&opcode.to_le_bytes());
        if versioned {
            prefix.extend_from_slice(&layout::PROTOCOL_VERSION.to_be_bytes());
        }
        prefix.extend_from_slice(trailer);

        let mut data = vec![0u8; capacity.max(prefix.len())];
        data[..prefix.len()].copy_from_slice(&prefix);
        Self {
            len: len.min(data.len()),
            data: data.into_boxed_slice(),
        }
    }

    /// Copy of a received datagram; capacity and length both equal `bytes.len()`.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            data: bytes.into(),
            len: bytes.len(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn set_len(&mut self, len: usize) -> Result<(), PacketError> {
        self.check_write(0, len)?;
        self.len = len;
        Ok(())
    }

    /// Wire bytes, `0..len`.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn u8(&self, offset: usize) -> Result<u8, PacketError> {
        self.data
            .get(offset)
            .copied()
            .ok_or(PacketError::TooShort {
                needed: offset + 1,
                actual: self.capacity(),
            })
    }

    pub fn u16_le(&self, offset: usize) -> Result<u16, PacketError> {
        let bytes = self.slice(offset..offset + 2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn u16_be(&self, offset: usize) -> Result<u16, PacketError> {
        let bytes = self.slice(offset..offset + 2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn slice(&self, range: Range<usize>) -> Result<&[u8], PacketError> {
        self.data.get(range.clone()).ok_or(PacketError::TooShort {
            needed: range.end,
            actual: self.capacity(),
        })
    }

    /// Fixed-size copy out of `range`; the range width must equal `N`.
    pub fn array<const N: usize>(&self, range: Range<usize>) -> Result<[u8; N], PacketError> {
        let bytes = self.slice(range)?;
        let mut out = [0u8; N];
        if bytes.len() != N {
            return Err(PacketError::TooShort {
                needed: N,
                actual: bytes.len(),
            });
        }
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// NUL-terminated ASCII field, decoded lossily and trimmed.
    pub fn ascii(&self, range: Range<usize>) -> Result<String, PacketError> {
        let bytes = self.slice(range)?;
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).trim().to_string())
    }

    pub fn set_u8(&mut self, offset: usize, value: u8) -> Result<(), PacketError> {
        self.check_write(offset, 1)?;
        self.data[offset] = value;
        Ok(())
    }

    pub fn set_u16_le(&mut self, offset: usize, value: u16) -> Result<(), PacketError> {
        self.set_bytes(offset, &value.to_le_bytes())
    }

    pub fn set_u16_be(&mut self, offset: usize, value: u16) -> Result<(), PacketError> {
        self.set_bytes(offset, &value.to_be_bytes())
    }

    /// Block copy of `bytes` starting at `offset`.
    pub fn set_bytes(&mut self, offset: usize, bytes: &[u8]) -> Result<(), PacketError> {
        self.check_write(offset, bytes.len())?;
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Zero-fills `range`.
    pub fn clear(&mut self, range: Range<usize>) -> Result<(), PacketError> {
        self.check_write(range.start, range.len())?;
        self.data[range].fill(0);
        Ok(())
    }

    /// Writes `value` as ASCII into `range`, truncating so that at least one
    /// trailing NUL remains, and zero-fills the rest of the field.
    pub fn set_ascii(&mut self, range: Range<usize>, value: &str) -> Result<(), PacketError> {
        self.clear(range.clone())?;
        let max = range.len().saturating_sub(1);
        let bytes: Vec<u8> = value
            .bytes()
            .map(|b| if b.is_ascii() { b } else { b'?' })
            .take(max)
            .collect();
        self.set_bytes(range.start, &bytes)
    }

    fn check_write(&self, offset: usize, width: usize) -> Result<(), PacketError> {
        match offset.checked_add(width) {
            Some(end) if end <= self.capacity() => Ok(()),
            _ => Err(PacketError::OutOfBounds {
                offset,
                width,
                capacity: self.capacity(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PacketBuffer;
    use crate::packets::PacketError;

    #[test]
    fn writes_respect_both_byte_orders() {
        let mut buffer = PacketBuffer::new(4);
        buffer.set_u16_le(0, 0x1936).unwrap();
        buffer.set_u16_be(2, 0x1936).unwrap();
        assert_eq!(buffer.as_bytes(), &[0x36, 0x19, 0x19, 0x36]);
        assert_eq!(buffer.u16_le(0).unwrap(), 0x1936);
        assert_eq!(buffer.u16_be(2).unwrap(), 0x1936);
    }

    #[test]
    fn write_past_capacity_is_rejected_without_mutation() {
        let mut buffer = PacketBuffer::new(3);
        buffer.set_bytes(0, &[1, 2, 3]).unwrap();
        let err = buffer.set_u16_le(2, 0xffff).unwrap_err();
        assert_eq!(
            err,
            PacketError::OutOfBounds {
                offset: 2,
                width: 2,
                capacity: 3
            }
        );
        assert_eq!(buffer.as_bytes(), &[1, 2, 3]);
        assert!(buffer.set_u8(usize::MAX, 0).is_err());
    }

    #[test]
    fn read_past_capacity_reports_too_short() {
        let buffer = PacketBuffer::from_bytes(&[1, 2]);
        let msg = buffer.u16_be(1).unwrap_err().to_string();
        assert!(msg.contains("payload too short"));
    }

    #[test]
    fn len_never_exceeds_capacity() {
        let mut buffer = PacketBuffer::new(8);
        buffer.set_len(5).unwrap();
        assert_eq!(buffer.as_bytes().len(), 5);
        assert!(buffer.set_len(9).is_err());
        assert_eq!(buffer.len(), 5);
    }

    #[test]
    fn ascii_round_trips_and_keeps_terminator() {
        let mut buffer = PacketBuffer::new(6);
        buffer.set_ascii(0..6, "node-name").unwrap();
        assert_eq!(buffer.ascii(0..6).unwrap(), "node-");
        assert_eq!(buffer.u8(5).unwrap(), 0);
    }
}
