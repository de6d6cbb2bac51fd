//! 密码学原语模块
//!
//! - [`mac`]: 基于 HMAC-SHA-256 的签名与常量时间验证
//! - [`cipher`]: 可选的 AES-256-GCM payload 加密（`aead` feature）

pub mod cipher;
pub mod mac;

pub use cipher::{SealedPayload, is_available};
