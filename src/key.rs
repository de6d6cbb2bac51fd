//! 签名密钥与密钥集模块
//!
//! 提供不可变的密钥材料 [`Key`] 和支持轮换的 [`KeySet`]。
//!
//! ## 轮换语义
//!
//! - 签名总是选用「未过期密钥中 `created_at` 最大」的那一把
//! - 验证按 `kid` 精确查找，**包括已过期的密钥**：
//!   轮换前签发的 token 在自身 `exp` 之前必须仍然可验证
//!
//! ## 示例
//!
//! ```rust
//! use linkrs::key::{Key, KeySet};
//!
//! let mut keys = KeySet::new();
//! keys.add(Key::new("k1", [0x41u8; 32], 1000).unwrap());
//! keys.add(Key::new("k2", [0x42u8; 32], 2000).unwrap());
//!
//! // 签名使用最新的 k2
//! assert_eq!(keys.signing_key(3000).unwrap().kid(), "k2");
//!
//! // 旧密钥仍可查找
//! assert!(keys.find("k1").is_some());
//! ```

use std::collections::HashMap;

use crate::error::{CryptoError, Error, Result};

/// HMAC 密钥的最小长度（字节）
pub const MIN_SECRET_LEN: usize = 16;

/// AEAD 要求的最小密钥长度（字节）
pub const AEAD_SECRET_LEN: usize = 32;

/// 签名密钥
///
/// 由调用方创建，创建后不可变。核心永远不会持久化密钥材料。
#[derive(Debug, Clone)]
pub struct Key {
    kid: String,
    secret: Vec<u8>,
    created_at: i64,
    expires_at: Option<i64>,
}

impl Key {
    /// 创建新密钥
    ///
    /// # Errors
    ///
    /// - `kid` 为空
    /// - `created_at` 不是正数
    /// - `secret` 少于 16 字节
    pub fn new(kid: impl Into<String>, secret: impl Into<Vec<u8>>, created_at: i64) -> Result<Self> {
        let kid = kid.into();
        let secret = secret.into();

        if kid.is_empty() {
            return Err(Error::Crypto(CryptoError::InvalidKey(
                "kid must not be empty".to_string(),
            )));
        }
        if created_at <= 0 {
            return Err(Error::Crypto(CryptoError::InvalidKey(
                "created_at must be positive".to_string(),
            )));
        }
        if secret.len() < MIN_SECRET_LEN {
            return Err(Error::Crypto(CryptoError::InvalidKey(format!(
                "secret must be at least {} bytes, got {}",
                MIN_SECRET_LEN,
                secret.len()
            ))));
        }

        Ok(Self {
            kid,
            secret,
            created_at,
            expires_at: None,
        })
    }

    /// 设置过期时间
    ///
    /// `expires_at` 是该密钥可用于签名的最后一刻。
    pub fn with_expiry(mut self, expires_at: i64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// 密钥标识符
    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// 原始密钥材料
    pub fn secret(&self) -> &[u8] {
        &self.secret
    }

    /// 创建时间（秒）
    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    /// 过期时间（秒），未设置表示不过期
    pub fn expires_at(&self) -> Option<i64> {
        self.expires_at
    }

    /// 在给定时刻是否已过签名有效期
    pub fn is_expired(&self, now: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => now > expires_at,
            None => false,
        }
    }
}

/// 密钥集
///
/// 以 `kid` 为键的密钥集合。签发端和验证端共享同一个密钥集
/// （通常包在 `Arc<RwLock<_>>` 中）；添加密钥需要外部同步，
/// 密钥集从不隐式清除任何密钥。
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: HashMap<String, Key>,
}

impl KeySet {
    /// 创建空密钥集
    pub fn new() -> Self {
        Self::default()
    }

    /// 添加密钥；相同 `kid` 的旧密钥会被替换
    pub fn add(&mut self, key: Key) {
        self.keys.insert(key.kid.clone(), key);
    }

    /// 按 `kid` 查找密钥，包括已过期的密钥
    pub fn find(&self, kid: &str) -> Option<&Key> {
        self.keys.get(kid)
    }

    /// 选择签名密钥
    ///
    /// 在未过期的密钥中选择 `created_at` 最大者；
    /// `created_at` 相同时按 `kid` 码点序取最大，保证选择确定。
    ///
    /// # Errors
    ///
    /// 没有任何未过期密钥时返回 `CryptoError::NoSigningKey`。
    pub fn signing_key(&self, now: i64) -> Result<&Key> {
        self.keys
            .values()
            .filter(|key| !key.is_expired(now))
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.kid.cmp(&b.kid))
            })
            .ok_or(Error::Crypto(CryptoError::NoSigningKey))
    }

    /// 密钥数量
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// 密钥集是否为空
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(kid: &str, created_at: i64) -> Key {
        Key::new(kid, vec![0x4B; 32], created_at).unwrap()
    }

    #[test]
    fn test_key_validation() {
        assert!(Key::new("k", vec![0u8; 16], 1).is_ok());
        assert!(Key::new("", vec![0u8; 16], 1).is_err());
        assert!(Key::new("k", vec![0u8; 15], 1).is_err());
        assert!(Key::new("k", vec![0u8; 16], 0).is_err());
        assert!(Key::new("k", vec![0u8; 16], -5).is_err());
    }

    #[test]
    fn test_key_expiry() {
        let k = key("k", 100).with_expiry(200);
        assert!(!k.is_expired(150));
        // expires_at 是有效的最后一刻
        assert!(!k.is_expired(200));
        assert!(k.is_expired(201));

        let forever = key("k", 100);
        assert!(!forever.is_expired(i64::MAX));
    }

    #[test]
    fn test_signing_key_picks_newest_unexpired() {
        let mut keys = KeySet::new();
        keys.add(key("old", 1000));
        keys.add(key("new", 2000));
        keys.add(key("retired", 3000).with_expiry(2500));

        // retired 在 3000 时已过期，选 new
        assert_eq!(keys.signing_key(3000).unwrap().kid(), "new");
    }

    #[test]
    fn test_signing_key_tie_break_is_deterministic() {
        let mut keys = KeySet::new();
        keys.add(key("alpha", 1000));
        keys.add(key("beta", 1000));

        for _ in 0..10 {
            assert_eq!(keys.signing_key(2000).unwrap().kid(), "beta");
        }
    }

    #[test]
    fn test_signing_key_none_available() {
        let mut keys = KeySet::new();
        assert!(keys.signing_key(1000).is_err());

        keys.add(key("k", 100).with_expiry(500));
        assert!(keys.signing_key(1000).is_err());
    }

    #[test]
    fn test_find_includes_expired() {
        let mut keys = KeySet::new();
        keys.add(key("k", 100).with_expiry(200));

        assert!(keys.find("k").is_some());
        assert!(keys.find("missing").is_none());
    }

    #[test]
    fn test_add_replaces_same_kid() {
        let mut keys = KeySet::new();
        keys.add(key("k", 100));
        keys.add(key("k", 999));

        assert_eq!(keys.len(), 1);
        assert_eq!(keys.find("k").unwrap().created_at(), 999);
    }
}
