/// Errors produced while encoding or decoding GraphBinary values.
///
/// Every deserialize subkind named in the wire grammar gets its own variant
/// so callers (and the protocol engine above this crate) can distinguish a
/// truncated buffer from a type mismatch from a malformed flag byte.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("buffer is missing: no bytes remain to read")]
    BufferMissing,

    #[error("buffer is empty: expected at least one byte")]
    BufferEmpty,

    #[error("unexpected type code: expected {expected:#04x}, found {found:#04x}")]
    UnexpectedTypeCode { expected: u8, found: u8 },

    #[error("unrecognized type code {0:#04x}")]
    UnrecognizedTypeCode(u8),

    #[error("value flag is missing: buffer exhausted before the flag byte")]
    ValueFlagMissing,

    #[error("unexpected value flag {0:#04x}: only bit 0x01 (null) is defined")]
    UnexpectedValueFlag(u8),

    #[error("unexpected value length {length}: {reason}")]
    UnexpectedValueLength { length: i64, reason: &'static str },

    #[error("value {0} is out of range for the target integer width")]
    SerializeRange(i128),

    #[error("no GraphBinary encoding is registered for this value")]
    SerializeUnknownType,

    #[error("null is not permitted in a non-nullable slot")]
    UnexpectedNull,

    #[error("invalid UTF-8 in GraphBinary string: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

pub type Result<T> = std::result::Result<T, CodecError>;
