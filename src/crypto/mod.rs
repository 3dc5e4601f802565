/// Web Crypto 风格的加密垫片：摘要、随机数以及 subtle 的密钥操作
mod digest;
mod keys;
mod random;
mod subtle;

use thiserror::Error;

use crate::error::SandboxError;

pub use digest::{DigestAlgorithm, digest};
pub use keys::{CryptoKey, GeneratedKey, KeyAlgorithm, KeyType, NamedCurve};
pub use random::{MAX_RANDOM_VALUES_BYTES, OsRandom, RandomSource, get_random_values, random_uuid};
pub use subtle::{decrypt, encrypt, export_key, generate_key, import_key, sign, verify};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Algorithm not supported: {0}")]
    NotSupported(String),

    #[error("Invalid algorithm parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Key does not support the '{0}' operation")]
    InvalidAccess(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error(
        "Failed to execute 'getRandomValues': The ArrayBufferView's byte length ({0}) exceeds the number of bytes of entropy available via this API (65536)"
    )]
    QuotaExceeded(usize),
}

impl From<CryptoError> for SandboxError {
    fn from(err: CryptoError) -> Self {
        SandboxError::runtime(err.to_string())
    }
}
