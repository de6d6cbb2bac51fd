//! AES-256-GCM payload 加密模块
//!
//! 加密是可选能力：仅在启用 `aead` feature 时可用。
//! 调用 [`is_available`] 可以在签发前探测能力，
//! 也可以据此判断加密 token 的验证是否可能成功。
//!
//! 参数固定为 96 位随机 IV 与 128 位认证标签；
//! AAD 是编码后的 header 段（URL 安全 Base64 字符串），
//! 因此 header 无法被替换到另一个密文上。
//! 密钥取 secret 的前 32 字节，不足 32 字节时拒绝。

use crate::error::Result;
use crate::key::Key;

/// AES-GCM IV 长度（字节）
pub const IV_LEN: usize = 12;

/// AES-GCM 认证标签长度（字节）
pub const TAG_LEN: usize = 16;

/// 加密后的 payload 三元组
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPayload {
    /// 96 位随机 IV
    pub iv: Vec<u8>,
    /// 128 位认证标签
    pub tag: Vec<u8>,
    /// 密文
    pub ciphertext: Vec<u8>,
}

/// 当前构建是否支持 payload 加密
pub fn is_available() -> bool {
    cfg!(feature = "aead")
}

#[cfg(feature = "aead")]
mod imp {
    use aes_gcm::aead::{Aead, KeyInit, Payload};
    use aes_gcm::{Aes256Gcm, Nonce};

    use super::{IV_LEN, SealedPayload, TAG_LEN};
    use crate::error::{CryptoError, Error, Result};
    use crate::key::{AEAD_SECRET_LEN, Key};
    use crate::random::generate_random_bytes;

    fn cipher_for(key: &Key) -> Result<Aes256Gcm> {
        let secret = key.secret();
        if secret.len() < AEAD_SECRET_LEN {
            return Err(Error::Crypto(CryptoError::InvalidKey(format!(
                "aead requires at least {} bytes of secret, got {}",
                AEAD_SECRET_LEN,
                secret.len()
            ))));
        }
        Aes256Gcm::new_from_slice(&secret[..AEAD_SECRET_LEN])
            .map_err(|e| Error::Crypto(CryptoError::InvalidKey(e.to_string())))
    }

    pub fn encrypt(key: &Key, plaintext: &[u8], aad: &[u8]) -> Result<SealedPayload> {
        let cipher = cipher_for(key)?;
        let iv = generate_random_bytes(IV_LEN)?;

        let mut sealed = cipher
            .encrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|e| Error::Crypto(CryptoError::EncryptionFailed(e.to_string())))?;

        // aes-gcm 把标签追加在密文末尾
        let tag = sealed.split_off(sealed.len() - TAG_LEN);
        Ok(SealedPayload {
            iv,
            tag,
            ciphertext: sealed,
        })
    }

    pub fn decrypt(key: &Key, sealed: &SealedPayload, aad: &[u8]) -> Result<Vec<u8>> {
        let cipher = cipher_for(key)?;
        if sealed.iv.len() != IV_LEN || sealed.tag.len() != TAG_LEN {
            return Err(Error::Crypto(CryptoError::DecryptionFailed(
                "invalid iv or tag length".to_string(),
            )));
        }

        let mut msg = Vec::with_capacity(sealed.ciphertext.len() + TAG_LEN);
        msg.extend_from_slice(&sealed.ciphertext);
        msg.extend_from_slice(&sealed.tag);

        cipher
            .decrypt(Nonce::from_slice(&sealed.iv), Payload { msg: &msg, aad })
            .map_err(|e| Error::Crypto(CryptoError::DecryptionFailed(e.to_string())))
    }
}

#[cfg(not(feature = "aead"))]
mod imp {
    use super::SealedPayload;
    use crate::error::{CryptoError, Error, Result};
    use crate::key::Key;

    pub fn encrypt(_key: &Key, _plaintext: &[u8], _aad: &[u8]) -> Result<SealedPayload> {
        Err(Error::Crypto(CryptoError::CipherUnavailable))
    }

    pub fn decrypt(_key: &Key, _sealed: &SealedPayload, _aad: &[u8]) -> Result<Vec<u8>> {
        Err(Error::Crypto(CryptoError::CipherUnavailable))
    }
}

/// 加密 payload
///
/// # Errors
///
/// 构建不支持 AEAD、密钥短于 32 字节或底层加密失败时返回
/// `CryptoError`。
pub fn encrypt(key: &Key, plaintext: &[u8], aad: &[u8]) -> Result<SealedPayload> {
    imp::encrypt(key, plaintext, aad)
}

/// 解密 payload
///
/// AAD 必须与加密时一致（即编码后的 header 段）。
pub fn decrypt(key: &Key, sealed: &SealedPayload, aad: &[u8]) -> Result<Vec<u8>> {
    imp::decrypt(key, sealed, aad)
}
