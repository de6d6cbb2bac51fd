//! 魔法链接签发与验证
//!
//! - [`builder`]: token 签发与 URL 组装
//! - [`verifier`]: 严格顺序的验证流水线
//!
//! 两端共享同一个 `Arc<RwLock<KeySet>>`，密钥轮换后旧 token
//! 在自身过期前仍可验证。

pub mod builder;
pub mod verifier;

pub use builder::{CreateOptions, DEFAULT_PARAM_NAME, DEFAULT_TTL_SECONDS, LinkBuilder};
pub use verifier::{
    DEFAULT_MAX_CLOCK_SKEW, RejectReason, RequestContext, ReturnToAllowlist, Verifier,
    VerifyOptions, VerifyResult, ua_hash,
};
