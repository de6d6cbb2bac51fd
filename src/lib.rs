//! # LinkRS
//!
//! 一个依赖精简的魔法链接（Magic Link）库。
//!
//! 签发和验证紧凑的、可嵌入 URL 的加密保护 token，
//! 用于无密码登录、邮箱验证和限时一键操作。
//! token 编码主体、时间边界、可选受众、可选请求上下文绑定
//! 以及应用自定义的 claim 包。完整性保护（HMAC-SHA-256）是
//! 强制的；机密性（AES-256-GCM）是可选能力。
//!
//! ## 功能特性
//!
//! - **规范化序列化**: 键排序的确定性 JSON + 无填充 base64url
//! - **密钥轮换**: 按 `kid` 选择密钥，旧 token 在过期前仍可验证
//! - **严格验证流水线**: 解析 → 密码学 → 时间 → 绑定 → 防重放，
//!   失败原因恰好一个，副作用只发生在全部检查通过之后
//! - **防重放**: 单方法的 NonceStore 契约，内存实现开箱即用
//! - **上下文绑定**: 路径/主机/User-Agent/跳转白名单
//! - **可选加密**: AES-256-GCM，AAD 绑定 header 防止换头
//! - **审计事件**: 可插拔的安全事件记录
//!
//! ## Features
//!
//! - `aead` - 启用 AES-256-GCM payload 加密支持（默认启用）
//!
//! ## 签发与验证示例
//!
//! ```rust
//! use std::sync::{Arc, RwLock};
//! use linkrs::key::{Key, KeySet};
//! use linkrs::link::{CreateOptions, LinkBuilder, Verifier, VerifyOptions};
//!
//! // 密钥集由签发端和验证端共享
//! let mut keys = KeySet::new();
//! keys.add(Key::new("2024-06", [0x5Au8; 32], 1).unwrap());
//! let keys = Arc::new(RwLock::new(keys));
//!
//! let builder = LinkBuilder::new(keys.clone());
//! let verifier = Verifier::new(keys);
//!
//! // 签发并嵌入 URL
//! let opts = CreateOptions::new()
//!     .with_aud("signin")
//!     .with_ttl_seconds(600);
//! let token = builder.issue("user-42", &opts).unwrap();
//! let url = builder.create_url("https://app.test/login", &token).unwrap();
//!
//! // 从 URL 验证
//! let claims = verifier
//!     .verify_from_request(&url, None, &VerifyOptions::new().with_expected_aud("signin"))
//!     .unwrap();
//! assert_eq!(claims.sub, "user-42");
//!
//! // 一次性 token 的第二次验证会被拒绝
//! let second = verifier.verify_from_request(&url, None, &VerifyOptions::default());
//! assert_eq!(second.unwrap_err().as_str(), "replayed");
//! ```

pub mod audit;
pub mod claims;
pub mod clock;
pub mod crypto;
pub mod encoding;
pub mod error;
pub mod key;
pub mod link;
pub mod nonce;
pub mod random;

pub use error::{CryptoError, Error, Result};

// ============================================================================
// Token 相关导出
// ============================================================================

pub use claims::{APP_BIND_HOST, APP_BIND_PATH, APP_RETURN_TO, APP_UA_HASH, Claims, CompactToken};
pub use key::{Key, KeySet};

// ============================================================================
// 签发与验证导出
// ============================================================================

pub use link::{
    CreateOptions, LinkBuilder, RejectReason, RequestContext, Verifier, VerifyOptions,
    VerifyResult, ua_hash,
};

// ============================================================================
// 基础设施导出
// ============================================================================

pub use audit::{AuditLogger, EventSeverity, EventType, InMemoryAuditLogger, LinkEvent};
pub use clock::{Clock, FixedClock, SystemClock};
pub use nonce::{BlackholeNonceStore, InMemoryNonceStore, NonceStore};
