//! HMAC-SHA-256 签名模块
//!
//! 对签名输入 `base64url(header) + "." + base64url(payload)` 计算
//! HMAC-SHA-256。验证时重新计算 MAC 并做常量时间比较，
//! 绝不使用逐字节短路比较。

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{CryptoError, Error, Result};
use crate::key::Key;
use crate::random::constant_time_compare;

type HmacSha256 = Hmac<Sha256>;

/// 计算签名
pub fn sign(key: &Key, input: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(key.secret())
        .map_err(|e| Error::Crypto(CryptoError::MacFailed(e.to_string())))?;
    mac.update(input);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// 验证签名
///
/// 重新计算 MAC 并与给定签名做常量时间比较。
pub fn verify(key: &Key, input: &[u8], signature: &[u8]) -> Result<bool> {
    let expected = sign(key, input)?;
    Ok(constant_time_compare(&expected, signature))
}
