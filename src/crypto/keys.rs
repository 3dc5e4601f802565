use std::fmt;
use std::sync::Arc;

use serde_json::{Value, json};

use crate::crypto::CryptoError;
use crate::crypto::digest::DigestAlgorithm;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Secret,
    Public,
    Private,
}

impl KeyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyType::Secret => "secret",
            KeyType::Public => "public",
            KeyType::Private => "private",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedCurve {
    P256,
    P384,
}

impl NamedCurve {
    fn parse(name: &str) -> Result<Self, CryptoError> {
        match name {
            "P-256" => Ok(NamedCurve::P256),
            "P-384" => Ok(NamedCurve::P384),
            other => Err(CryptoError::NotSupported(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NamedCurve::P256 => "P-256",
            NamedCurve::P384 => "P-384",
        }
    }
}

/// 密钥所属的算法及其生成参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAlgorithm {
    AesGcm { length: usize },
    AesCbc { length: usize },
    AesCtr { length: usize },
    Hmac { hash: DigestAlgorithm, length: usize },
    RsaOaep { modulus_length: usize, public_exponent: Vec<u8>, hash: DigestAlgorithm },
    RsaPss { modulus_length: usize, public_exponent: Vec<u8>, hash: DigestAlgorithm },
    RsassaPkcs1 { modulus_length: usize, public_exponent: Vec<u8>, hash: DigestAlgorithm },
    Ecdsa { curve: NamedCurve },
}

impl KeyAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            KeyAlgorithm::AesGcm { .. } => "AES-GCM",
            KeyAlgorithm::AesCbc { .. } => "AES-CBC",
            KeyAlgorithm::AesCtr { .. } => "AES-CTR",
            KeyAlgorithm::Hmac { .. } => "HMAC",
            KeyAlgorithm::RsaOaep { .. } => "RSA-OAEP",
            KeyAlgorithm::RsaPss { .. } => "RSA-PSS",
            KeyAlgorithm::RsassaPkcs1 { .. } => "RSASSA-PKCS1-v1_5",
            KeyAlgorithm::Ecdsa { .. } => "ECDSA",
        }
    }

    /// 解析 `generateKey` / `importKey` 的算法参数
    ///
    /// `key_len` 是 importKey 时原始密钥的字节数，用来推出 AES/HMAC 的 length。
    pub fn from_params(params: &Value, key_len: Option<usize>) -> Result<Self, CryptoError> {
        let name = algorithm_name(params)?;
        let aes_length = || -> Result<usize, CryptoError> {
            let length = match key_len {
                Some(len) => len * 8,
                None => usize_param(params, "length")?.ok_or_else(|| {
                    CryptoError::InvalidParameter("AES key generation requires a length".to_string())
                })?,
            };
            match length {
                128 | 192 | 256 => Ok(length),
                other => Err(CryptoError::InvalidParameter(format!(
                    "AES key length must be 128, 192 or 256 bits, got {}",
                    other
                ))),
            }
        };
        let rsa = || -> Result<(usize, Vec<u8>, DigestAlgorithm), CryptoError> {
            let modulus_length = usize_param(params, "modulusLength")?.ok_or_else(|| {
                CryptoError::InvalidParameter("RSA key generation requires modulusLength".to_string())
            })?;
            let public_exponent = match params.get("publicExponent") {
                Some(value) => byte_array(value, "publicExponent")?,
                None => vec![1, 0, 1],
            };
            Ok((modulus_length, public_exponent, hash_param(params)?))
        };

        match name.to_ascii_uppercase().as_str() {
            "AES-GCM" => Ok(KeyAlgorithm::AesGcm { length: aes_length()? }),
            "AES-CBC" => Ok(KeyAlgorithm::AesCbc { length: aes_length()? }),
            "AES-CTR" => Ok(KeyAlgorithm::AesCtr { length: aes_length()? }),
            "HMAC" => {
                let hash = hash_param(params)?;
                let length = match (key_len, usize_param(params, "length")?) {
                    (Some(len), _) => len * 8,
                    (None, Some(bits)) if bits > 0 => bits,
                    (None, _) => hash.block_len() * 8,
                };
                Ok(KeyAlgorithm::Hmac { hash, length })
            }
            "RSA-OAEP" => {
                let (modulus_length, public_exponent, hash) = rsa()?;
                Ok(KeyAlgorithm::RsaOaep { modulus_length, public_exponent, hash })
            }
            "RSA-PSS" => {
                let (modulus_length, public_exponent, hash) = rsa()?;
                Ok(KeyAlgorithm::RsaPss { modulus_length, public_exponent, hash })
            }
            "RSASSA-PKCS1-V1_5" => {
                let (modulus_length, public_exponent, hash) = rsa()?;
                Ok(KeyAlgorithm::RsassaPkcs1 { modulus_length, public_exponent, hash })
            }
            "ECDSA" => {
                let curve = params
                    .get("namedCurve")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        CryptoError::InvalidParameter("ECDSA requires a namedCurve".to_string())
                    })?;
                Ok(KeyAlgorithm::Ecdsa { curve: NamedCurve::parse(curve)? })
            }
            _ => Err(CryptoError::NotSupported(name.to_string())),
        }
    }

    /// 脚本里 `key.algorithm` 看到的形式
    pub fn to_json(&self) -> Value {
        match self {
            KeyAlgorithm::AesGcm { length }
            | KeyAlgorithm::AesCbc { length }
            | KeyAlgorithm::AesCtr { length } => json!({ "name": self.name(), "length": length }),
            KeyAlgorithm::Hmac { hash, length } => json!({
                "name": self.name(),
                "hash": { "name": hash.name() },
                "length": length,
            }),
            KeyAlgorithm::RsaOaep { modulus_length, public_exponent, hash }
            | KeyAlgorithm::RsaPss { modulus_length, public_exponent, hash }
            | KeyAlgorithm::RsassaPkcs1 { modulus_length, public_exponent, hash } => json!({
                "name": self.name(),
                "modulusLength": modulus_length,
                "publicExponent": public_exponent,
                "hash": { "name": hash.name() },
            }),
            KeyAlgorithm::Ecdsa { curve } => json!({
                "name": self.name(),
                "namedCurve": curve.name(),
            }),
        }
    }

    /// 该算法允许的全部用途
    pub(crate) fn allowed_usages(&self) -> &'static [&'static str] {
        match self {
            KeyAlgorithm::AesGcm { .. }
            | KeyAlgorithm::AesCbc { .. }
            | KeyAlgorithm::AesCtr { .. }
            | KeyAlgorithm::RsaOaep { .. } => &["encrypt", "decrypt", "wrapKey", "unwrapKey"],
            KeyAlgorithm::Hmac { .. }
            | KeyAlgorithm::RsaPss { .. }
            | KeyAlgorithm::RsassaPkcs1 { .. }
            | KeyAlgorithm::Ecdsa { .. } => &["sign", "verify"],
        }
    }

    pub(crate) fn is_asymmetric(&self) -> bool {
        matches!(
            self,
            KeyAlgorithm::RsaOaep { .. }
                | KeyAlgorithm::RsaPss { .. }
                | KeyAlgorithm::RsassaPkcs1 { .. }
                | KeyAlgorithm::Ecdsa { .. }
        )
    }
}

/// 密钥本体，只在 crate 内可见
pub(crate) enum KeyMaterial {
    Symmetric(Vec<u8>),
    RsaPrivate(rsa::RsaPrivateKey),
    RsaPublic(rsa::RsaPublicKey),
    P256Signing(p256::ecdsa::SigningKey),
    P256Verifying(p256::ecdsa::VerifyingKey),
    P384Signing(p384::ecdsa::SigningKey),
    P384Verifying(p384::ecdsa::VerifyingKey),
}

/// 脚本持有的不透明密钥句柄
#[derive(Clone)]
pub struct CryptoKey {
    pub key_type: KeyType,
    pub algorithm: KeyAlgorithm,
    pub extractable: bool,
    pub usages: Vec<String>,
    pub(crate) material: Arc<KeyMaterial>,
}

impl CryptoKey {
    pub(crate) fn new(
        key_type: KeyType,
        algorithm: KeyAlgorithm,
        extractable: bool,
        usages: Vec<String>,
        material: KeyMaterial,
    ) -> Self {
        Self {
            key_type,
            algorithm,
            extractable,
            usages,
            material: Arc::new(material),
        }
    }

    pub fn has_usage(&self, usage: &str) -> bool {
        self.usages.iter().any(|u| u == usage)
    }

    pub(crate) fn require_usage(&self, usage: &str) -> Result<(), CryptoError> {
        if self.has_usage(usage) {
            Ok(())
        } else {
            Err(CryptoError::InvalidAccess(usage.to_string()))
        }
    }

    /// 操作参数里的算法名必须与密钥一致
    pub(crate) fn require_algorithm(&self, params: &Value) -> Result<(), CryptoError> {
        let name = algorithm_name(params)?;
        if name.eq_ignore_ascii_case(self.algorithm.name()) {
            Ok(())
        } else {
            Err(CryptoError::InvalidAccess(format!(
                "{} with a {} key",
                name,
                self.algorithm.name()
            )))
        }
    }
}

impl fmt::Debug for CryptoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoKey")
            .field("type", &self.key_type.as_str())
            .field("algorithm", &self.algorithm.name())
            .field("extractable", &self.extractable)
            .field("usages", &self.usages)
            .finish()
    }
}

/// generateKey 的结果：对称密钥或密钥对
#[derive(Debug, Clone)]
pub enum GeneratedKey {
    Secret(CryptoKey),
    Pair {
        public_key: CryptoKey,
        private_key: CryptoKey,
    },
}

/// 算法参数可以是字符串，也可以是带 name 的对象
pub(crate) fn algorithm_name(params: &Value) -> Result<&str, CryptoError> {
    match params {
        Value::String(name) => Ok(name),
        Value::Object(map) => map.get("name").and_then(Value::as_str).ok_or_else(|| {
            CryptoError::InvalidParameter("algorithm requires a name".to_string())
        }),
        _ => Err(CryptoError::InvalidParameter(
            "algorithm must be a string or an object".to_string(),
        )),
    }
}

pub(crate) fn hash_param(params: &Value) -> Result<DigestAlgorithm, CryptoError> {
    match params.get("hash") {
        Some(hash) => DigestAlgorithm::from_value(hash),
        None => Err(CryptoError::InvalidParameter("hash is required".to_string())),
    }
}

pub(crate) fn usize_param(params: &Value, field: &str) -> Result<Option<usize>, CryptoError> {
    match params.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| {
                CryptoError::InvalidParameter(format!("{} must be a non-negative integer", field))
            }),
    }
}

/// 数字数组 -> 字节
pub(crate) fn byte_array(value: &Value, field: &str) -> Result<Vec<u8>, CryptoError> {
    let invalid = || CryptoError::InvalidParameter(format!("{} must be an array of bytes", field));
    value
        .as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|item| {
            item.as_u64()
                .filter(|n| *n <= 255)
                .map(|n| n as u8)
                .ok_or_else(invalid)
        })
        .collect()
}

/// 可选的字节数组参数，缺省为空
pub(crate) fn optional_bytes(params: &Value, field: &str) -> Result<Vec<u8>, CryptoError> {
    match params.get(field) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(value) => byte_array(value, field),
    }
}

pub(crate) fn required_bytes(params: &Value, field: &str) -> Result<Vec<u8>, CryptoError> {
    match params.get(field) {
        None | Some(Value::Null) => Err(CryptoError::InvalidParameter(format!(
            "{} is required",
            field
        ))),
        Some(value) => byte_array(value, field),
    }
}
