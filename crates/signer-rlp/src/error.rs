use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RlpError {
    #[error("buffer overrun")]
    BufferOverrun,
    #[error("array item count overflowed the reserved header")]
    Overflow,
    #[error("array closed with {actual} items but {expected} were declared")]
    CountMismatch { expected: usize, actual: usize },
}

pub type RlpResult<T> = Result<T, RlpError>;
