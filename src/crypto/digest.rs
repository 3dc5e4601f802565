use serde_json::Value;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::crypto::CryptoError;

/// 支持的摘要算法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlgorithm {
    pub fn parse(name: &str) -> Result<Self, CryptoError> {
        match name.to_ascii_uppercase().as_str() {
            "SHA-1" => Ok(DigestAlgorithm::Sha1),
            "SHA-256" => Ok(DigestAlgorithm::Sha256),
            "SHA-384" => Ok(DigestAlgorithm::Sha384),
            "SHA-512" => Ok(DigestAlgorithm::Sha512),
            _ => Err(CryptoError::NotSupported(name.to_string())),
        }
    }

    /// 接受 `"SHA-256"` 或 `{ name: "SHA-256" }`
    pub fn from_value(value: &Value) -> Result<Self, CryptoError> {
        match value {
            Value::String(name) => Self::parse(name),
            Value::Object(map) => match map.get("name") {
                Some(Value::String(name)) => Self::parse(name),
                _ => Err(CryptoError::InvalidParameter(
                    "hash algorithm requires a name".to_string(),
                )),
            },
            _ => Err(CryptoError::InvalidParameter(
                "hash algorithm must be a string or an object".to_string(),
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "SHA-1",
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    pub fn output_len(&self) -> usize {
        match self {
            DigestAlgorithm::Sha1 => 20,
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha384 => 48,
            DigestAlgorithm::Sha512 => 64,
        }
    }

    /// HMAC 默认密钥长度（字节）
    pub fn block_len(&self) -> usize {
        match self {
            DigestAlgorithm::Sha1 | DigestAlgorithm::Sha256 => 64,
            DigestAlgorithm::Sha384 | DigestAlgorithm::Sha512 => 128,
        }
    }

    pub fn hash(&self, data: &[u8]) -> Vec<u8> {
        match self {
            DigestAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
            DigestAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            DigestAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            DigestAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }
}

/// `crypto.subtle.digest(algorithm, data)`
pub fn digest(algorithm: &Value, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    Ok(DigestAlgorithm::from_value(algorithm)?.hash(data))
}
