//! Binary reader for zero-copy parsing of byte slices.
//!
//! This module provides [`BinaryReader`], a cursor-like type that reads
//! binary data from a byte slice without copying. Little-endian helpers cover
//! the common case; the `*_as` variants take any [`byteorder::ByteOrder`].

use byteorder::{ByteOrder, LittleEndian};
use zerocopy::FromBytes;

use crate::{Error, Result};

/// A binary reader that provides zero-copy reading from a byte slice.
///
/// # Example
///
/// ```
/// use scs_common::BinaryReader;
///
/// let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
/// let mut reader = BinaryReader::new(&data);
///
/// assert_eq!(reader.read_u32().unwrap(), 0x04030201);
/// assert_eq!(reader.read_u32().unwrap(), 0x08070605);
/// assert!(reader.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BinaryReader<'a> {
    /// Create a new reader from a byte slice.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Create a new reader starting at a specific position.
    #[inline]
    pub const fn new_at(data: &'a [u8], position: usize) -> Self {
        Self { data, position }
    }

    /// Get the current position in the buffer.
    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Get the total length of the underlying buffer.
    #[inline]
    pub const fn len(&self) -> usize {
        self.data.len()
    }

    /// Get the number of bytes remaining to read.
    #[inline]
    pub const fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Check if there are no more bytes to read.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    /// The whole underlying buffer, independent of the cursor.
    #[inline]
    pub const fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Seek to an absolute position.
    #[inline]
    pub fn seek(&mut self, position: usize) {
        self.position = position;
    }

    /// Get the remaining bytes as a slice.
    #[inline]
    pub fn remaining_bytes(&self) -> &'a [u8] {
        &self.data[self.position.min(self.data.len())..]
    }

    /// Read `count` bytes and move past them.
    #[inline]
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if count > available {
            return Err(Error::UnexpectedEof {
                offset: self.position,
                needed: count,
                available,
            });
        }
        let bytes = &self.data[self.position..self.position + count];
        self.position += count;
        Ok(bytes)
    }

    /// Read a fixed-size byte array.
    #[inline]
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Read a plain-old-data struct (zero-copy layout).
    pub fn read_struct<T: FromBytes>(&mut self) -> Result<T> {
        let offset = self.position;
        let size = std::mem::size_of::<T>();
        let bytes = self.read_bytes(size)?;
        T::read_from_bytes(bytes).map_err(|_| Error::UnexpectedEof {
            offset,
            needed: size,
            available: bytes.len(),
        })
    }

    /// Read a single byte.
    #[inline]
    pub fn read_u8(&mut self) -> Result<u8> {
        self.read_bytes(1).map(|b| b[0])
    }

    /// Read a signed byte.
    #[inline]
    pub fn read_i8(&mut self) -> Result<i8> {
        self.read_u8().map(|b| b as i8)
    }

    /// Read a u16 in the given byte order.
    #[inline]
    pub fn read_u16_as<B: ByteOrder>(&mut self) -> Result<u16> {
        self.read_bytes(2).map(B::read_u16)
    }

    /// Read an i16 in the given byte order.
    #[inline]
    pub fn read_i16_as<B: ByteOrder>(&mut self) -> Result<i16> {
        self.read_bytes(2).map(B::read_i16)
    }

    /// Read a 24-bit unsigned integer in the given byte order.
    #[inline]
    pub fn read_u24_as<B: ByteOrder>(&mut self) -> Result<u32> {
        self.read_bytes(3).map(B::read_u24)
    }

    /// Read a u32 in the given byte order.
    #[inline]
    pub fn read_u32_as<B: ByteOrder>(&mut self) -> Result<u32> {
        self.read_bytes(4).map(B::read_u32)
    }

    /// Read an i32 in the given byte order.
    #[inline]
    pub fn read_i32_as<B: ByteOrder>(&mut self) -> Result<i32> {
        self.read_bytes(4).map(B::read_i32)
    }

    /// Read a u64 in the given byte order.
    #[inline]
    pub fn read_u64_as<B: ByteOrder>(&mut self) -> Result<u64> {
        self.read_bytes(8).map(B::read_u64)
    }

    /// Read an i64 in the given byte order.
    #[inline]
    pub fn read_i64_as<B: ByteOrder>(&mut self) -> Result<i64> {
        self.read_bytes(8).map(B::read_i64)
    }

    /// Read an f32 in the given byte order.
    #[inline]
    pub fn read_f32_as<B: ByteOrder>(&mut self) -> Result<f32> {
        self.read_bytes(4).map(B::read_f32)
    }

    /// Read an f64 in the given byte order.
    #[inline]
    pub fn read_f64_as<B: ByteOrder>(&mut self) -> Result<f64> {
        self.read_bytes(8).map(B::read_f64)
    }



    /// Read a little-endian u32.
    #[inline]
    pub fn read_u32(&mut self) -> Result<u32> {
        self.read_u32_as::<LittleEndian>()
    }


    /// Read a little-endian u64.
    #[inline]
    pub fn read_u64(&mut self) -> Result<u64> {
        self.read_u64_as::<LittleEndian>()
    }


    /// Read a null-terminated string.
    pub fn read_cstring(&mut self) -> Result<&'a str> {
        let start = self.position;
        let remaining = self.remaining_bytes();

        let null_pos =
            memchr::memchr(0, remaining).ok_or(Error::MissingNullTerminator(start))?;

        let string_bytes = &remaining[..null_pos];
        self.position = start + null_pos + 1; // Skip the null terminator

        std::str::from_utf8(string_bytes).map_err(|source| Error::Utf8 {
            offset: start,
            source,
        })
    }

    /// Read a string of a specific length.
    pub fn read_string(&mut self, length: usize) -> Result<&'a str> {
        let start = self.position;
        let bytes = self.read_bytes(length)?;
        std::str::from_utf8(bytes).map_err(|source| Error::Utf8 {
            offset: start,
            source,
        })
    }

    /// Read a string from a fixed-size buffer, stopping at the first null.
    pub fn read_string_in_buffer(&mut self, buffer_size: usize) -> Result<&'a str> {
        let start = self.position;
        let bytes = self.read_bytes(buffer_size)?;
        let null_pos = memchr::memchr(0, bytes).unwrap_or(buffer_size);
        std::str::from_utf8(&bytes[..null_pos]).map_err(|source| Error::Utf8 {
            offset: start,
            source,
        })
    }

    /// Expect specific magic bytes.
    pub fn expect_magic(&mut self, expected: &[u8]) -> Result<()> {
        let offset = self.position;
        let actual = self.read_bytes(expected.len())?;
        if actual != expected {
            return Err(Error::InvalidMagic {
                offset,
                expected: expected.to_vec(),
                actual: actual.to_vec(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::BigEndian;

    #[test]
    fn test_read_primitives() {
        let data = [
            0x01u8, 0x02, 0x03, 0x04, // u32: 0x04030201
            0xFF, 0xFF, 0xFF, 0xFF, // u32: 0xFFFFFFFF
        ];
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.read_u32().unwrap(), 0x04030201);
        assert_eq!(reader.read_u32().unwrap(), 0xFFFFFFFF);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_big_endian_and_u24() {
        let data = [0xc7, 0x2b, 0xb4, 0x52, 0x01, 0x02, 0x03];
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.read_u32_as::<BigEndian>().unwrap(), 0xc72bb452);
        assert_eq!(reader.read_u24_as::<LittleEndian>().unwrap(), 0x030201);
    }

    #[test]
    fn test_read_cstring() {
        let data = b"hello\0world\0";
        let mut reader = BinaryReader::new(data);

        assert_eq!(reader.read_cstring().unwrap(), "hello");
        assert_eq!(reader.read_cstring().unwrap(), "world");
    }

    #[test]
    fn test_eof_error_carries_offset() {
        let data = [0x01, 0x02, 0x03];
        let mut reader = BinaryReader::new(&data);
        reader.seek(2);

        let err = reader.read_u32().unwrap_err();
        assert_eq!(err.offset(), Some(2));
    }

    #[test]
    fn test_expect_magic() {
        let mut reader = BinaryReader::new(b"SCS#rest");
        assert!(reader.expect_magic(b"SCS#").is_ok());
        assert!(matches!(
            reader.expect_magic(b"SCS#"),
            Err(Error::InvalidMagic { offset: 4, .. })
        ));
    }
}
