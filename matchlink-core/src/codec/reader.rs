use super::error::{CodecError, Result};
use super::preview;

/// Cursor-based little-endian reader over a borrowed buffer
///
/// A failed read leaves the cursor where it was.
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> BinaryReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if needed > available {
            return Err(CodecError::OutOfRange {
                needed,
                available,
                position: self.position,
            });
        }

        let start = self.position;
        self.position += needed;
        Ok(&self.buffer[start..self.position])
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(self.take(N)?);
        Ok(bytes)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_le_bytes(self.take_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.take_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.take_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take_array()?))
    }

    /// Any non-zero byte reads as `true`
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Read a `width`-byte string field, dropping the NUL padding
    pub fn read_fixed_string(&mut self, width: usize) -> Result<String> {
        let start = self.position;
        let raw = self.take(width)?;
        let end = raw.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);

        match std::str::from_utf8(&raw[..end]) {
            Ok(value) => Ok(value.to_string()),
            Err(_) => {
                self.position = start;
                Err(CodecError::InvalidUtf8)
            }
        }
    }

    /// Read a u16 length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> Result<String> {
        let start = self.position;
        let bytes = self.read_bytes()?;

        String::from_utf8(bytes).map_err(|_| {
            self.position = start;
            CodecError::InvalidUtf8
        })
    }

    /// Read a u16 length-prefixed byte range
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let start = self.position;
        let len = self.read_u16()? as usize;

        match self.take(len) {
            Ok(bytes) => Ok(bytes.to_vec()),
            Err(err) => {
                self.position = start;
                Err(err)
            }
        }
    }

    /// Consume everything left in the buffer
    pub fn read_remaining(&mut self) -> Vec<u8> {
        let rest = self.buffer[self.position..].to_vec();
        self.position = self.buffer.len();
        rest
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    pub fn preview(&self) -> String {
        preview::preview(self.buffer)
    }
}
