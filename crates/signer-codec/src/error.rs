use thiserror::Error;

/// Failure modes for the self-describing structured codec (cursor + builder).
///
/// Mirrors the error taxonomy carried by the firmware's CBOR-like layer:
/// decode errors never panic, they surface as one of these and the caller
/// decides whether to drop silently (malformed wire data) or propagate.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("key or index not found")]
    NotFound,
    #[error("operation not valid for this value's type")]
    InvalidOperation,
    #[error("buffer overrun")]
    BufferOverrun,
    #[error("destination buffer too small for copy")]
    Truncated,
    #[error("unsupported wire type (indefinite-length or reserved major type)")]
    UnsupportedType,
    #[error("value exceeds representable range")]
    Overflow,
}

pub type CodecResult<T> = Result<T, CodecError>;
