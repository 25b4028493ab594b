//! Bounds-checked binary reader with cursor tracking.

use std::str;

use crate::BufferError;

/// A binary reader over a byte slice.
///
/// Every read is bounds-checked against `end` and leaves the cursor untouched
/// on failure.
///
/// # Example
///
/// ```
/// use ion_buffers::Reader;
///
/// let data = [0x81, 0x01, 0x80, 0xc1];
/// let mut reader = Reader::new(&data);
///
/// assert_eq!(reader.var_uint(), Ok(1));
/// assert_eq!(reader.var_uint(), Ok(128));
/// assert_eq!(reader.var_int(), Ok((true, 1)));
/// ```
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    /// The underlying byte slice.
    pub uint8: &'a [u8],
    /// Current cursor position.
    pub x: usize,
    /// End position (exclusive).
    pub end: usize,
}

impl<'a> Reader<'a> {
    /// Creates a new reader for the given byte slice.
    pub fn new(uint8: &'a [u8]) -> Self {
        let end = uint8.len();
        Self { uint8, x: 0, end }
    }

    /// Creates a reader over `uint8[x..end]`.
    pub fn from_slice(uint8: &'a [u8], x: usize, end: usize) -> Self {
        Self { uint8, x, end }
    }

    /// Returns the number of remaining bytes.
    pub fn size(&self) -> usize {
        self.end.saturating_sub(self.x)
    }

    #[inline]
    fn check(&self, n: usize) -> Result<(), BufferError> {
        match self.x.checked_add(n) {
            Some(to) if to <= self.end => Ok(()),
            _ => Err(BufferError::EndOfBuffer),
        }
    }

    /// Peeks at the current byte without advancing.
    pub fn peek(&self) -> Result<u8, BufferError> {
        self.check(1)?;
        Ok(self.uint8[self.x])
    }

    /// Advances the cursor by `length` bytes.
    pub fn skip(&mut self, length: usize) -> Result<(), BufferError> {
        self.check(length)?;
        self.x += length;
        Ok(())
    }

    /// Reads an unsigned 8-bit integer.
    #[inline]
    pub fn u8(&mut self) -> Result<u8, BufferError> {
        self.check(1)?;
        let val = self.uint8[self.x];
        self.x += 1;
        Ok(val)
    }

    /// Returns the next `size` bytes and advances the cursor.
    pub fn buf(&mut self, size: usize) -> Result<&'a [u8], BufferError> {
        self.check(size)?;
        let bin = &self.uint8[self.x..self.x + size];
        self.x += size;
        Ok(bin)
    }

    /// Reads a UTF-8 string of `size` bytes.
    pub fn utf8(&mut self, size: usize) -> Result<&'a str, BufferError> {
        self.check(size)?;
        let text = str::from_utf8(&self.uint8[self.x..self.x + size])
            .map_err(|_| BufferError::InvalidUtf8)?;
        self.x += size;
        Ok(text)
    }

    /// Reads a big-endian unsigned integer of `length` bytes (at most 8).
    pub fn uint(&mut self, length: usize) -> Result<u64, BufferError> {
        if length > 8 {
            return Err(BufferError::Overflow);
        }
        let bytes = self.buf(length)?;
        Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64))
    }

    /// Reads an Ion VarUInt.
    pub fn var_uint(&mut self) -> Result<u64, BufferError> {
        let mut result: u64 = 0;
        let mut x = self.x;
        loop {
            if x >= self.end {
                return Err(BufferError::EndOfBuffer);
            }
            let b = self.uint8[x];
            x += 1;
            if result > (u64::MAX >> 7) {
                return Err(BufferError::Overflow);
            }
            result = (result << 7) | (b & 0x7f) as u64;
            if b & 0x80 != 0 {
                self.x = x;
                return Ok(result);
            }
        }
    }

    /// Reads an Ion VarInt as `(negative, magnitude)`.
    ///
    /// Negative zero is reported as `(true, 0)`.
    pub fn var_int(&mut self) -> Result<(bool, u64), BufferError> {
        let first = self.peek()?;
        let negative = first & 0x40 != 0;
        let mut result: u64 = (first & 0x3f) as u64;
        let mut x = self.x + 1;
        if first & 0x80 == 0 {
            loop {
                if x >= self.end {
                    return Err(BufferError::EndOfBuffer);
                }
                let b = self.uint8[x];
                x += 1;
                if result > (u64::MAX >> 7) {
                    return Err(BufferError::Overflow);
                }
                result = (result << 7) | (b & 0x7f) as u64;
                if b & 0x80 != 0 {
                    break;
                }
            }
        }
        self.x = x;
        Ok((negative, result))
    }

    /// Reads an Ion signed-magnitude Int of `length` bytes.
    ///
    /// Returns the sign and the big-endian magnitude with the sign bit cleared.
    pub fn int(&mut self, length: usize) -> Result<(bool, Vec<u8>), BufferError> {
        let bytes = self.buf(length)?;
        let mut magnitude = bytes.to_vec();
        let negative = match magnitude.first_mut() {
            Some(first) => {
                let negative = *first & 0x80 != 0;
                *first &= 0x7f;
                negative
            }
            None => false,
        };
        Ok((negative, magnitude))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_u8() {
        let data = [0x01, 0x02];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.u8(), Ok(0x01));
        assert_eq!(reader.u8(), Ok(0x02));
        assert_eq!(reader.u8(), Err(BufferError::EndOfBuffer));
        assert_eq!(reader.x, 2);
    }

    #[test]
    fn test_uint() {
        let data = [0x01, 0x00, 0xff];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.uint(3), Ok(0x0100ff));
        assert_eq!(reader.uint(0), Ok(0));
        assert_eq!(reader.uint(9), Err(BufferError::Overflow));
    }

    #[test]
    fn test_var_uint_end_of_buffer() {
        let data = [0x01, 0x02];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.var_uint(), Err(BufferError::EndOfBuffer));
        // Cursor must not advance on error
        assert_eq!(reader.x, 0);
    }

    #[test]
    fn test_var_uint_overflow() {
        let data = [0x7f; 11];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.var_uint(), Err(BufferError::Overflow));
    }

    #[test]
    fn test_var_int() {
        let data = [0x00, 0xc0, 0xc0, 0xbf];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.var_int(), Ok((false, 64)));
        assert_eq!(reader.var_int(), Ok((true, 0)));
        assert_eq!(reader.var_int(), Ok((false, 63)));
    }

    #[test]
    fn test_int() {
        let data = [0x80, 0x01, 0x00, 0xff];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.int(2), Ok((true, vec![0x00, 0x01])));
        assert_eq!(reader.int(2), Ok((false, vec![0x00, 0xff])));
        assert_eq!(reader.int(0), Ok((false, vec![])));
    }

    #[test]
    fn test_utf8() {
        let data = b"hello\xff";
        let mut reader = Reader::new(data);
        assert_eq!(reader.utf8(5), Ok("hello"));
        assert_eq!(reader.utf8(1), Err(BufferError::InvalidUtf8));
    }

    #[test]
    fn test_bounded_by_end() {
        let data = [1, 2, 3, 4];
        let mut reader = Reader::from_slice(&data, 1, 3);
        assert_eq!(reader.size(), 2);
        assert_eq!(reader.buf(2), Ok(&data[1..3]));
        assert_eq!(reader.peek(), Err(BufferError::EndOfBuffer));
    }
}
