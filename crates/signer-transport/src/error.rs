use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    #[error("unsupported protocol version")]
    UnsupportedVersion,
    #[error("unrecognized command byte")]
    BadCommand,
    #[error("payload exceeds the negotiated chunk size")]
    BufferOverrun,
    #[error("missing or out-of-sequence message")]
    MissingMessage,
    #[error("a message is already in flight")]
    Busy,
}

impl TransportError {
    pub fn status_byte(self) -> u8 {
        match self {
            TransportError::UnsupportedVersion => 0x81,
            TransportError::BadCommand => 0x82,
            TransportError::BufferOverrun => 0x84,
            TransportError::MissingMessage => 0x85,
            TransportError::Busy => 0x91,
        }
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
