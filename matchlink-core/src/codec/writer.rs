use super::error::{CodecError, Result};
use super::preview;

/// Growable little-endian buffer writer
///
/// Every `write_*` call must be mirrored by the matching `read_*` call on
/// [`BinaryReader`](super::BinaryReader) in the same order. No type tags are
/// written; the command byte at the head of a message selects the layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryWriter {
    buffer: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn write_u8(&mut self, value: u8) -> &mut Self {
        self.buffer.push(value);
        self
    }

    pub fn write_u16(&mut self, value: u16) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_i8(&mut self, value: i8) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_i16(&mut self, value: i16) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_i32(&mut self, value: i32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_f32(&mut self, value: f32) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_f64(&mut self, value: f64) -> &mut Self {
        self.buffer.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn write_bool(&mut self, value: bool) -> &mut Self {
        self.buffer.push(u8::from(value));
        self
    }

    /// Write a string into exactly `width` bytes.
    ///
    /// Longer strings are cut at the last char boundary that fits, shorter
    /// ones are padded with NUL bytes.
    pub fn write_fixed_string(&mut self, value: &str, width: usize) -> &mut Self {
        let mut end = value.len().min(width);
        while !value.is_char_boundary(end) {
            end -= 1;
        }

        self.buffer.extend_from_slice(&value.as_bytes()[..end]);
        self.buffer.resize(self.buffer.len() + (width - end), 0);
        self
    }

    /// Write a u16 length prefix followed by the UTF-8 bytes
    pub fn write_string(&mut self, value: &str) -> Result<&mut Self> {
        self.write_bytes(value.as_bytes())
    }

    /// Write a u16 length prefix followed by the raw bytes
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<&mut Self> {
        let len = u16::try_from(value.len()).map_err(|_| CodecError::TooLong {
            len: value.len(),
            max: u16::MAX as usize,
        })?;

        self.write_u16(len);
        self.buffer.extend_from_slice(value);
        Ok(self)
    }

    /// Append bytes without a prefix (read back with `read_remaining`)
    pub fn write_raw(&mut self, value: &[u8]) -> &mut Self {
        self.buffer.extend_from_slice(value);
        self
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Render the final buffer, sized exactly to what was written
    pub fn into_bytes(self) -> Vec<u8> {
        let mut buffer = self.buffer;
        buffer.shrink_to_fit();
        buffer
    }

    pub fn preview(&self) -> String {
        preview::preview(&self.buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_layout() {
        let mut writer = BinaryWriter::new();
        writer.write_u16(0x0102).write_u32(0x0A0B0C0D);

        assert_eq!(writer.as_slice(), &[0x02, 0x01, 0x0D, 0x0C, 0x0B, 0x0A]);
    }

    #[test]
    fn test_fixed_string_padding() {
        let mut writer = BinaryWriter::new();
        writer.write_fixed_string("abc", 6);

        assert_eq!(writer.as_slice(), b"abc\0\0\0");
    }

    #[test]
    fn test_fixed_string_truncation() {
        let mut writer = BinaryWriter::new();
        writer.write_fixed_string("abcdefgh", 4);

        assert_eq!(writer.as_slice(), b"abcd");
    }

    #[test]
    fn test_fixed_string_truncates_on_char_boundary() {
        let mut writer = BinaryWriter::new();
        // 'é' is two bytes; a 2-byte field cannot hold "aé"
        writer.write_fixed_string("aé", 2);

        assert_eq!(writer.as_slice(), b"a\0");
        assert_eq!(writer.len(), 2);
    }

    #[test]
    fn test_length_prefixed_bytes() {
        let mut writer = BinaryWriter::new();
        writer.write_bytes(&[9, 8, 7]).unwrap();

        assert_eq!(writer.as_slice(), &[3, 0, 9, 8, 7]);
    }

    #[test]
    fn test_bytes_too_long() {
        let mut writer = BinaryWriter::new();
        let big = vec![0u8; u16::MAX as usize + 1];

        let result = writer.write_bytes(&big);
        assert!(matches!(result, Err(CodecError::TooLong { .. })));
        assert!(writer.is_empty());
    }

    #[test]
    fn test_bool_encoding() {
        let mut writer = BinaryWriter::new();
        writer.write_bool(true).write_bool(false);

        assert_eq!(writer.into_bytes(), vec![1, 0]);
    }
}
