use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("private key is zero or exceeds the group order")]
    InvalidPrivateKey,
    #[error("public key is not a valid point on the curve")]
    InvalidPublicKey,
    #[error("deterministic k candidates exhausted without a valid signature")]
    SigningFailed,
    #[error("malformed transaction payload")]
    MalformedTransaction,
    #[error("value does not fit the expected field width")]
    FieldOverflow,
}

pub type CryptoResult<T> = Result<T, CryptoError>;
