//! 统一错误类型模块
//!
//! 提供 linkrs 库中所有操作的错误类型定义。
//!
//! 注意：这里只包含「程序员错误」（配置错误、密钥材料无效等）。
//! 验证过程中对恶意输入的拒绝不会以错误形式抛出，
//! 而是通过 [`RejectReason`](crate::link::RejectReason) 在验证结果中返回。

use std::fmt;

/// linkrs 库的统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// linkrs 库的错误类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// 加密相关错误
    Crypto(CryptoError),

    /// 格式无效（非法 base64、非规范 JSON、无效的 base URL 等）
    InvalidFormat(String),
}

impl Error {
    /// 创建一个格式错误
    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Error::InvalidFormat(msg.into())
    }
}

/// 加密相关错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// 随机数生成失败
    RngFailed(String),
    /// 密钥无效
    InvalidKey(String),
    /// 密钥集中没有可用的签名密钥
    NoSigningKey,
    /// 当前构建不支持 payload 加密
    CipherUnavailable,
    /// 加密失败
    EncryptionFailed(String),
    /// 解密失败
    DecryptionFailed(String),
    /// MAC 计算失败
    MacFailed(String),
}

// ============================================================================
// Display 实现
// ============================================================================

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Crypto(e) => write!(f, "Crypto error: {}", e),
            Error::InvalidFormat(msg) => write!(f, "Invalid format: {}", msg),
        }
    }
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::RngFailed(msg) => write!(f, "random number generation failed: {}", msg),
            CryptoError::InvalidKey(msg) => write!(f, "invalid key: {}", msg),
            CryptoError::NoSigningKey => write!(f, "no usable signing key in key set"),
            CryptoError::CipherUnavailable => {
                write!(f, "payload encryption is not available in this build")
            }
            CryptoError::EncryptionFailed(msg) => write!(f, "encryption failed: {}", msg),
            CryptoError::DecryptionFailed(msg) => write!(f, "decryption failed: {}", msg),
            CryptoError::MacFailed(msg) => write!(f, "mac computation failed: {}", msg),
        }
    }
}

// ============================================================================
// std::error::Error 实现
// ============================================================================

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Crypto(e) => Some(e),
            Error::InvalidFormat(_) => None,
        }
    }
}

impl std::error::Error for CryptoError {}

// ============================================================================
// From 实现 - 方便错误转换
// ============================================================================

impl From<CryptoError> for Error {
    fn from(err: CryptoError) -> Self {
        Error::Crypto(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Crypto(CryptoError::NoSigningKey);
        assert_eq!(
            err.to_string(),
            "Crypto error: no usable signing key in key set"
        );
    }

    #[test]
    fn test_error_from_crypto() {
        let crypto_err = CryptoError::InvalidKey("too short".to_string());
        let err: Error = crypto_err.into();
        assert!(matches!(err, Error::Crypto(_)));
    }

    #[test]
    fn test_invalid_format_display() {
        let err = Error::invalid_format("bad base64");
        assert_eq!(err.to_string(), "Invalid format: bad base64");
    }
}
