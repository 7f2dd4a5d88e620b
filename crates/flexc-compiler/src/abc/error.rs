use thiserror::Error;

/// Malformed ABC input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of data at offset {offset}")]
    UnexpectedEof { offset: usize },

    #[error("variable-length integer at offset {offset} is too long")]
    IntegerTooLong { offset: usize },

    #[error("invalid UTF-8 string at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("{table} index {index} is out of range (size {size})")]
    IndexOutOfRange {
        table: &'static str,
        index: u32,
        size: usize,
    },

    #[error("unknown {what} kind 0x{kind:02x}")]
    UnknownKind { what: &'static str, kind: u8 },

    #[error("unsupported ABC version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    #[error("{count} trailing bytes after the last method body")]
    TrailingBytes { count: usize },
}
