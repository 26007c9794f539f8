/// Errors raised while encoding or decoding wire buffers
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Read out of range: needed {needed} bytes at position {position}, {available} available")]
    OutOfRange {
        needed: usize,
        available: usize,
        position: usize,
    },

    #[error("Value too long for length prefix: {len} bytes (max {max})")]
    TooLong { len: usize, max: usize },

    #[error("Invalid UTF-8 in string field")]
    InvalidUtf8,

    #[error("Invalid value {value} for {field}")]
    InvalidValue { field: &'static str, value: u8 },
}

pub type Result<T> = std::result::Result<T, CodecError>;
