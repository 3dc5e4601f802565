use rand::RngCore;
use rand::rngs::OsRng;
use uuid::{Builder, Uuid};

use crate::crypto::CryptoError;

/// 单次 getRandomValues 的上限
pub const MAX_RANDOM_VALUES_BYTES: usize = 65536;

/// 随机数来源
///
/// `native_uuid` 返回 `None` 表示宿主没有原生的 UUID 生成器，
/// 此时 [`random_uuid`] 会用 `fill` 的随机字节拼出 v4 UUID。
pub trait RandomSource: Send + Sync {
    fn fill(&self, buf: &mut [u8]);

    fn native_uuid(&self) -> Option<String> {
        None
    }
}

/// 操作系统随机源
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill(&self, buf: &mut [u8]) {
        OsRng.fill_bytes(buf);
    }

    fn native_uuid(&self) -> Option<String> {
        Some(Uuid::new_v4().to_string())
    }
}

pub fn get_random_values(source: &dyn RandomSource, len: usize) -> Result<Vec<u8>, CryptoError> {
    if len > MAX_RANDOM_VALUES_BYTES {
        return Err(CryptoError::QuotaExceeded(len));
    }
    let mut buf = vec![0u8; len];
    source.fill(&mut buf);
    Ok(buf)
}

pub fn random_uuid(source: &dyn RandomSource) -> String {
    if let Some(uuid) = source.native_uuid() {
        return uuid;
    }
    let mut bytes = [0u8; 16];
    source.fill(&mut bytes);
    Builder::from_random_bytes(bytes).into_uuid().to_string()
}
