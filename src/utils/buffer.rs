use std::io::{Error as IoError, ErrorKind, Result as IoResult};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};

/// Growable byte buffer with a read cursor.
///
/// Reads never move the cursor past the end; a short read fails with
/// `UnexpectedEof` and leaves the cursor where it was.
pub struct ByteBuffer {
    buffer: Vec<u8>,
    cursor: usize,
}

impl ByteBuffer {
    /// Wrap existing bytes for reading
    pub fn new(data: Vec<u8>) -> Self {
        ByteBuffer {
            buffer: data,
            cursor: 0,
        }
    }

    /// Copy a slice into a new buffer for reading
    pub fn from_slice(data: &[u8]) -> Self {
        ByteBuffer::new(data.to_vec())
    }

    /// Create an empty buffer for writing
    pub fn with_capacity(capacity: usize) -> Self {
        ByteBuffer {
            buffer: Vec::with_capacity(capacity),
            cursor: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.cursor
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.cursor)
    }

    pub fn has_remaining(&self, n: usize) -> bool {
        self.remaining() >= n
    }

    /// Slice of the unread bytes
    fn unread(&self, len: usize) -> IoResult<&[u8]> {
        if !self.has_remaining(len) {
            return Err(IoError::new(
                ErrorKind::UnexpectedEof,
                format!("need {} bytes, {} left", len, self.remaining()),
            ));
        }
        Ok(&self.buffer[self.cursor..self.cursor + len])
    }

    /// Look at the next byte without consuming it
    pub fn peek_u8(&self) -> Option<u8> {
        self.buffer.get(self.cursor).copied()
    }

    /// Check whether the unread bytes start with `prefix`
    pub fn starts_with(&self, prefix: &[u8]) -> bool {
        self.buffer[self.cursor..].starts_with(prefix)
    }

    /// Advance the cursor, clamped to the end of the buffer
    pub fn skip(&mut self, n: usize) {
        self.cursor = (self.cursor + n).min(self.buffer.len());
    }

    pub fn read_bytes(&mut self, len: usize) -> IoResult<Vec<u8>> {
        let bytes = self.unread(len)?.to_vec();
        self.cursor += len;
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> IoResult<u8> {
        let value = self.unread(1)?[0];
        self.cursor += 1;
        Ok(value)
    }

    pub fn read_u16_be(&mut self) -> IoResult<u16> {
        let value = self.unread(2)?.read_u16::<BigEndian>()?;
        self.cursor += 2;
        Ok(value)
    }

    /// Read a 3-byte big-endian integer (chunk header timestamps and lengths)
    pub fn read_u24_be(&mut self) -> IoResult<u32> {
        let value = self.unread(3)?.read_u24::<BigEndian>()?;
        self.cursor += 3;
        Ok(value)
    }

    pub fn read_u32_be(&mut self) -> IoResult<u32> {
        let value = self.unread(4)?.read_u32::<BigEndian>()?;
        self.cursor += 4;
        Ok(value)
    }

    /// Read a 4-byte little-endian integer (message stream id)
    pub fn read_u32_le(&mut self) -> IoResult<u32> {
        let value = self.unread(4)?.read_u32::<LittleEndian>()?;
        self.cursor += 4;
        Ok(value)
    }

    pub fn read_f64_be(&mut self) -> IoResult<f64> {
        let value = self.unread(8)?.read_f64::<BigEndian>()?;
        self.cursor += 8;
        Ok(value)
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> IoResult<()> {
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> IoResult<()> {
        self.buffer.write_u8(value)
    }

    pub fn write_u16_be(&mut self, value: u16) -> IoResult<()> {
        self.buffer.write_u16::<BigEndian>(value)
    }

    /// Write the low 24 bits of `value` big-endian
    pub fn write_u24_be(&mut self, value: u32) -> IoResult<()> {
        self.buffer.write_u24::<BigEndian>(value & 0x00FF_FFFF)
    }

    pub fn write_u32_be(&mut self, value: u32) -> IoResult<()> {
        self.buffer.write_u32::<BigEndian>(value)
    }

    pub fn write_u32_le(&mut self, value: u32) -> IoResult<()> {
        self.buffer.write_u32::<LittleEndian>(value)
    }

    pub fn write_f64_be(&mut self, value: f64) -> IoResult<()> {
        self.buffer.write_f64::<BigEndian>(value)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the buffer and return everything written to it
    pub fn into_vec(self) -> Vec<u8> {
        self.buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u24_round_trip() {
        let mut buffer = ByteBuffer::with_capacity(3);
        buffer.write_u24_be(0x0A0B0C).unwrap();
        assert_eq!(buffer.as_slice(), &[0x0A, 0x0B, 0x0C]);

        let mut reader = ByteBuffer::new(buffer.into_vec());
        assert_eq!(reader.read_u24_be().unwrap(), 0x0A0B0C);
    }

    #[test]
    fn test_u24_truncates_high_byte() {
        let mut buffer = ByteBuffer::with_capacity(3);
        buffer.write_u24_be(0x1234_5678).unwrap();
        assert_eq!(buffer.as_slice(), &[0x34, 0x56, 0x78]);
    }

    #[test]
    fn test_stream_id_is_little_endian() {
        let mut buffer = ByteBuffer::with_capacity(4);
        buffer.write_u32_le(7).unwrap();
        assert_eq!(buffer.as_slice(), &[7, 0, 0, 0]);
        assert_eq!(ByteBuffer::new(buffer.into_vec()).read_u32_le().unwrap(), 7);
    }

    #[test]
    fn test_short_read_keeps_cursor() {
        let mut buffer = ByteBuffer::new(vec![1, 2, 3]);
        assert!(buffer.read_f64_be().is_err());
        assert_eq!(buffer.position(), 0);
        assert_eq!(buffer.read_u16_be().unwrap(), 0x0102);
        assert_eq!(buffer.remaining(), 1);
    }

    #[test]
    fn test_peek_and_skip() {
        let mut buffer = ByteBuffer::new(vec![0x00, 0x00, 0x09, 0x05]);
        assert!(buffer.starts_with(&[0x00, 0x00, 0x09]));
        buffer.skip(3);
        assert_eq!(buffer.peek_u8(), Some(0x05));
        buffer.skip(10);
        assert_eq!(buffer.remaining(), 0);
        assert_eq!(buffer.peek_u8(), None);
    }
}
