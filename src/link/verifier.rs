//! 魔法链接验证模块
//!
//! [`Verifier`] 实现严格顺序的验证流水线：
//! 解析 → 密码学 → 时间 → 上下文绑定 → 防重放。
//! 任何一步失败立即返回对应的 [`RejectReason`]，后续步骤不再执行；
//! 特别地，只有在全部检查通过后才会触碰 NonceStore：
//! 伪造、过期或上下文不匹配的 token 绝不会消耗 nonce。
//!
//! 验证对恶意输入**从不**返回 `Err(Error)`：
//! 所有来自攻击者的解析失败都汇入 `malformed_*` 原因码。
//!
//! ## 示例
//!
//! ```rust
//! use std::sync::{Arc, RwLock};
//! use linkrs::key::{Key, KeySet};
//! use linkrs::link::{CreateOptions, LinkBuilder, RequestContext, Verifier, VerifyOptions};
//!
//! let mut keys = KeySet::new();
//! keys.add(Key::new("k1", [0x41u8; 32], 1).unwrap());
//! let keys = Arc::new(RwLock::new(keys));
//!
//! let builder = LinkBuilder::new(keys.clone());
//! let verifier = Verifier::new(keys);
//!
//! let token = builder.issue("user-42", &CreateOptions::default()).unwrap();
//! let claims = verifier
//!     .verify(&token, &RequestContext::default(), &VerifyOptions::default())
//!     .unwrap();
//! assert_eq!(claims.sub, "user-42");
//! ```

use std::fmt;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use sha2::{Digest, Sha256};
use url::Url;

use crate::claims::{APP_BIND_HOST, APP_BIND_PATH, APP_RETURN_TO, APP_UA_HASH, Claims, CompactToken};
use crate::clock::{Clock, SystemClock};
use crate::crypto::cipher::{self, SealedPayload};
use crate::crypto::mac;
use crate::encoding::{b64url_decode, b64url_encode, json_decode_object};
use crate::key::KeySet;
use crate::link::builder::DEFAULT_PARAM_NAME;
use crate::nonce::{InMemoryNonceStore, NonceStore};
use crate::random::constant_time_compare_str;

/// 默认允许的时钟偏差（秒）
pub const DEFAULT_MAX_CLOCK_SKEW: i64 = 120;

/// 验证失败的原因码
///
/// 每次失败恰好对应一个原因；`as_str` 给出稳定的 snake_case 代码。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// 不是三段式 token 或段不是合法 base64url
    MalformedToken,
    /// header 不是合法 JSON 对象或必要字段缺失/非法
    MalformedHeader,
    /// payload（或解密后的明文）形状非法
    MalformedPayload,
    /// header 中的 kid 在密钥集中不存在
    UnknownKid,
    /// HMAC 校验失败
    SignatureMismatch,
    /// token 已加密但当前构建不支持解密
    EncryptionUnavailable,
    /// AEAD 解密失败
    DecryptFailed,
    /// token 已过期
    TokenExpired,
    /// token 尚未生效（nbf）
    TokenEarly,
    /// 签发时间在未来（超出允许偏差）
    ClockSkew,
    /// 受众不匹配
    AudMismatch,
    /// 路径不匹配
    PathMismatch,
    /// 主机不匹配
    HostMismatch,
    /// User-Agent 哈希不匹配
    UaMismatch,
    /// 一次性 token 被重复使用
    Replayed,
    /// 要求一次性 token 但 jti 缺失
    OneTimeRequired,
    /// 跳转地址未通过白名单
    ReturnToDenied,
}

impl RejectReason {
    /// 稳定的原因码字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::MalformedToken => "malformed_token",
            RejectReason::MalformedHeader => "malformed_header",
            RejectReason::MalformedPayload => "malformed_payload",
            RejectReason::UnknownKid => "unknown_kid",
            RejectReason::SignatureMismatch => "signature_mismatch",
            RejectReason::EncryptionUnavailable => "encryption_unavailable",
            RejectReason::DecryptFailed => "decrypt_failed",
            RejectReason::TokenExpired => "token_expired",
            RejectReason::TokenEarly => "token_early",
            RejectReason::ClockSkew => "clock_skew",
            RejectReason::AudMismatch => "aud_mismatch",
            RejectReason::PathMismatch => "path_mismatch",
            RejectReason::HostMismatch => "host_mismatch",
            RejectReason::UaMismatch => "ua_mismatch",
            RejectReason::Replayed => "replayed",
            RejectReason::OneTimeRequired => "one_time_required",
            RejectReason::ReturnToDenied => "return_to_denied",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 验证结果：成功时返回 Claims，失败时返回原因码
pub type VerifyResult = std::result::Result<Claims, RejectReason>;

/// 请求上下文
///
/// 由调用方提供的实际请求属性，用于路径/主机/User-Agent 绑定检查。
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// 实际请求路径
    pub path: Option<String>,
    /// 实际请求主机
    pub host: Option<String>,
    /// 实际 User-Agent
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// 创建空上下文
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置路径
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// 设置主机
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// 设置 User-Agent
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }
}

/// 跳转地址白名单谓词
pub type ReturnToAllowlist = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// 验证选项
#[derive(Clone, Default)]
pub struct VerifyOptions {
    /// 期望的受众；设置后必须与 `claims.aud` 相等
    pub expected_aud: Option<String>,

    /// 期望的路径；支持空串精确匹配和尾部 `*` 前缀匹配
    pub expected_path: Option<String>,

    /// 期望的主机；常量时间相等比较
    pub expected_host: Option<String>,

    /// 要求 token 必须是一次性的
    pub require_one_time: bool,

    /// 允许的时钟偏差（秒）；`None` 时使用默认的 120 秒，负值按 0 处理
    pub max_clock_skew: Option<i64>,

    /// 强制校验 `app["uah"]` 与实际 User-Agent 的哈希
    pub enforce_ua_hash: bool,

    /// 跳转地址白名单；仅当 `app["return_to"]` 是字符串时调用
    pub return_to_allowlist: Option<ReturnToAllowlist>,
}

impl fmt::Debug for VerifyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifyOptions")
            .field("expected_aud", &self.expected_aud)
            .field("expected_path", &self.expected_path)
            .field("expected_host", &self.expected_host)
            .field("require_one_time", &self.require_one_time)
            .field("max_clock_skew", &self.max_clock_skew)
            .field("enforce_ua_hash", &self.enforce_ua_hash)
            .field(
                "return_to_allowlist",
                &self.return_to_allowlist.as_ref().map(|_| "<predicate>"),
            )
            .finish()
    }
}

impl VerifyOptions {
    /// 创建默认选项
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置期望受众
    pub fn with_expected_aud(mut self, aud: impl Into<String>) -> Self {
        self.expected_aud = Some(aud.into());
        self
    }

    /// 设置期望路径
    pub fn with_expected_path(mut self, path: impl Into<String>) -> Self {
        self.expected_path = Some(path.into());
        self
    }

    /// 设置期望主机
    pub fn with_expected_host(mut self, host: impl Into<String>) -> Self {
        self.expected_host = Some(host.into());
        self
    }

    /// 要求一次性 token
    pub fn with_require_one_time(mut self, require: bool) -> Self {
        self.require_one_time = require;
        self
    }

    /// 设置允许的时钟偏差（秒）
    pub fn with_max_clock_skew(mut self, skew: i64) -> Self {
        self.max_clock_skew = Some(skew);
        self
    }

    /// 启用 User-Agent 哈希校验
    pub fn with_enforce_ua_hash(mut self, enforce: bool) -> Self {
        self.enforce_ua_hash = enforce;
        self
    }

    /// 设置跳转地址白名单
    pub fn with_return_to_allowlist<F>(mut self, allowlist: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.return_to_allowlist = Some(Arc::new(allowlist));
        self
    }

    /// 严格预设
    ///
    /// - 要求一次性 token
    /// - 时钟偏差收紧到 30 秒
    /// - 强制 User-Agent 哈希校验
    pub fn strict() -> Self {
        Self {
            require_one_time: true,
            max_clock_skew: Some(30),
            enforce_ua_hash: true,
            ..Self::default()
        }
    }

    fn effective_skew(&self) -> i64 {
        self.max_clock_skew.unwrap_or(DEFAULT_MAX_CLOCK_SKEW).max(0)
    }
}

/// 计算 User-Agent 哈希
///
/// 签发端把 `ua_hash(ua)` 写入 `app["uah"]`，
/// 验证端用同一函数对实际 User-Agent 求值后常量时间比较。
pub fn ua_hash(user_agent: &str) -> String {
    b64url_encode(&Sha256::digest(user_agent.as_bytes()))
}

/// 路径匹配
///
/// - 期望为空串：仅匹配空串
/// - 期望以 `*` 结尾：对 `*` 之前的字面量做前缀匹配（无 glob 语义）
/// - 其余情况：常量时间精确相等
fn path_matches(expected: &str, actual: &str) -> bool {
    if expected.is_empty() {
        return actual.is_empty();
    }
    if let Some(prefix) = expected.strip_suffix('*') {
        return actual.starts_with(prefix);
    }
    constant_time_compare_str(expected, actual)
}

/// 魔法链接验证器
///
/// 与签发端共享密钥集；持有重放账本与时钟。
pub struct Verifier<S: NonceStore = InMemoryNonceStore, C: Clock = SystemClock> {
    keys: Arc<RwLock<KeySet>>,
    nonces: S,
    clock: C,
}

impl Verifier<InMemoryNonceStore, SystemClock> {
    /// 使用内存重放账本和系统时钟创建验证器
    pub fn new(keys: Arc<RwLock<KeySet>>) -> Self {
        Self::with_parts(keys, InMemoryNonceStore::new(), SystemClock)
    }
}

impl<S: NonceStore, C: Clock> Verifier<S, C> {
    /// 使用指定的重放账本和时钟创建验证器
    pub fn with_parts(keys: Arc<RwLock<KeySet>>, nonces: S, clock: C) -> Self {
        Self {
            keys,
            nonces,
            clock,
        }
    }

    /// 重放账本
    pub fn nonce_store(&self) -> &S {
        &self.nonces
    }

    /// 验证 token
    ///
    /// 按固定顺序执行全部检查；对恶意输入从不 panic 或返回
    /// `Error`，所有失败都以 [`RejectReason`] 表达。
    pub fn verify(&self, token: &str, ctx: &RequestContext, opts: &VerifyOptions) -> VerifyResult {
        // 1-2. 三段拆分与 base64url 解码
        let tok = CompactToken::parse(token).ok_or(RejectReason::MalformedToken)?;
        let header_bytes =
            b64url_decode(&tok.header).map_err(|_| RejectReason::MalformedToken)?;
        let payload_bytes =
            b64url_decode(&tok.payload).map_err(|_| RejectReason::MalformedToken)?;
        let signature =
            b64url_decode(&tok.signature).map_err(|_| RejectReason::MalformedToken)?;

        // 3-4. header 解码与校验
        let header =
            json_decode_object(&header_bytes).map_err(|_| RejectReason::MalformedHeader)?;
        if header.get("alg").and_then(Value::as_str) != Some("HS256") {
            return Err(RejectReason::MalformedHeader);
        }
        let kid = match header.get("kid").and_then(Value::as_str) {
            Some(kid) if !kid.is_empty() => kid.to_string(),
            _ => return Err(RejectReason::MalformedHeader),
        };

        // 5. 密钥查找（包括已过期密钥：轮换前签发的 token 仍需可验）
        let keys = self.keys.read().unwrap();
        let key = keys.find(&kid).ok_or(RejectReason::UnknownKid)?;

        // 6. MAC 校验，先于解密和任何 claims 解析
        let signing_input = tok.signing_input();
        let mac_ok = mac::verify(key, signing_input.as_bytes(), &signature)
            .unwrap_or(false);
        if !mac_ok {
            return Err(RejectReason::SignatureMismatch);
        }

        // 7. 加密分支
        let claims_object = match header.get("enc") {
            Some(enc) => {
                if enc.as_str() != Some("A256GCM") {
                    return Err(RejectReason::MalformedHeader);
                }
                if !cipher::is_available() {
                    return Err(RejectReason::EncryptionUnavailable);
                }
                let envelope = json_decode_object(&payload_bytes)
                    .map_err(|_| RejectReason::MalformedPayload)?;
                let iv = envelope
                    .get("iv")
                    .and_then(Value::as_str)
                    .and_then(|s| b64url_decode(s).ok())
                    .ok_or(RejectReason::MalformedPayload)?;
                let tag = envelope
                    .get("tag")
                    .and_then(Value::as_str)
                    .and_then(|s| b64url_decode(s).ok())
                    .ok_or(RejectReason::MalformedPayload)?;
                let ciphertext = envelope
                    .get("ct")
                    .and_then(Value::as_str)
                    .and_then(|s| b64url_decode(s).ok())
                    .ok_or(RejectReason::MalformedPayload)?;

                let sealed = SealedPayload {
                    iv,
                    tag,
                    ciphertext,
                };
                let plaintext = cipher::decrypt(key, &sealed, tok.header.as_bytes())
                    .map_err(|_| RejectReason::DecryptFailed)?;
                json_decode_object(&plaintext).map_err(|_| RejectReason::MalformedPayload)?
            }
            None => {
                json_decode_object(&payload_bytes).map_err(|_| RejectReason::MalformedPayload)?
            }
        };

        // 8. claims 形状检查
        let claims =
            Claims::from_object(&claims_object).ok_or(RejectReason::MalformedPayload)?;

        // 9. 时间检查
        let now = self.clock.now();
        let skew = opts.effective_skew();
        if claims.iat > now + skew {
            return Err(RejectReason::ClockSkew);
        }
        if let Some(nbf) = claims.nbf {
            if nbf > now + skew {
                return Err(RejectReason::TokenEarly);
            }
        }
        if claims.exp < now - skew {
            return Err(RejectReason::TokenExpired);
        }

        // 10. 受众
        if let Some(expected) = &opts.expected_aud {
            if claims.aud.as_deref() != Some(expected.as_str()) {
                return Err(RejectReason::AudMismatch);
            }
        }

        // 11. 路径：选项与 bind.path 两个来源独立生效
        if let Some(expected) = &opts.expected_path {
            match ctx.path.as_deref() {
                Some(actual) if path_matches(expected, actual) => {}
                _ => return Err(RejectReason::PathMismatch),
            }
        }
        if let Some(bound) = claims.app_claim(APP_BIND_PATH) {
            let bound = bound.as_str().ok_or(RejectReason::PathMismatch)?;
            match ctx.path.as_deref() {
                Some(actual) if path_matches(bound, actual) => {}
                _ => return Err(RejectReason::PathMismatch),
            }
        }

        // 12. 主机：与路径对称，常量时间相等
        if let Some(expected) = &opts.expected_host {
            match ctx.host.as_deref() {
                Some(actual) if constant_time_compare_str(expected, actual) => {}
                _ => return Err(RejectReason::HostMismatch),
            }
        }
        if let Some(bound) = claims.app_claim(APP_BIND_HOST) {
            let bound = bound.as_str().ok_or(RejectReason::HostMismatch)?;
            match ctx.host.as_deref() {
                Some(actual) if constant_time_compare_str(bound, actual) => {}
                _ => return Err(RejectReason::HostMismatch),
            }
        }

        // 13. User-Agent 哈希
        if opts.enforce_ua_hash {
            let stored = claims
                .app_claim(APP_UA_HASH)
                .and_then(Value::as_str)
                .ok_or(RejectReason::UaMismatch)?;
            let user_agent = ctx.user_agent.as_deref().ok_or(RejectReason::UaMismatch)?;
            if !constant_time_compare_str(stored, &ua_hash(user_agent)) {
                return Err(RejectReason::UaMismatch);
            }
        }

        // 14. 一次性要求
        if opts.require_one_time && claims.jti.is_none() {
            return Err(RejectReason::OneTimeRequired);
        }

        // 15. 跳转地址白名单
        if let Some(allowlist) = &opts.return_to_allowlist {
            if let Some(return_to) = claims.app_claim(APP_RETURN_TO).and_then(Value::as_str) {
                if !allowlist(return_to) {
                    return Err(RejectReason::ReturnToDenied);
                }
            }
        }

        // 16. 防重放：唯一的副作用，必须是最后一步
        if let Some(jti) = &claims.jti {
            if !self.nonces.consume(jti, claims.exp) {
                return Err(RejectReason::Replayed);
            }
        }

        // 17. 成功
        Ok(claims)
    }

    /// 从完整 URL 或原始 token 验证
    ///
    /// 参数含 `"://"` 时按 URL 解析：从默认参数 `ml` 提取 token，
    /// 路径和主机取自 URL；URL 解析失败返回 `malformed_token`。
    /// 查询串中没有该参数时，原始字符串整体按 token 重试
    /// （容忍调用方直接传入裸 token）。
    pub fn verify_from_request(
        &self,
        raw: &str,
        user_agent: Option<&str>,
        opts: &VerifyOptions,
    ) -> VerifyResult {
        self.verify_from_request_with_param(raw, DEFAULT_PARAM_NAME, user_agent, opts)
    }

    /// 同 [`verify_from_request`](Self::verify_from_request)，token 取自指定参数
    pub fn verify_from_request_with_param(
        &self,
        raw: &str,
        param_name: &str,
        user_agent: Option<&str>,
        opts: &VerifyOptions,
    ) -> VerifyResult {
        let mut ctx = RequestContext::new();
        if let Some(ua) = user_agent {
            ctx.user_agent = Some(ua.to_string());
        }

        if !raw.contains("://") {
            return self.verify(raw, &ctx, opts);
        }

        let url = Url::parse(raw).map_err(|_| RejectReason::MalformedToken)?;
        let token = url
            .query_pairs()
            .find(|(name, _)| name == param_name)
            .map(|(_, value)| value.into_owned());

        match token {
            Some(token) => {
                ctx.path = Some(url.path().to_string());
                ctx.host = url.host_str().map(str::to_string);
                self.verify(&token, &ctx, opts)
            }
            // 参数缺失：原始字符串按裸 token 重试
            None => self.verify(raw, &ctx, opts),
        }
    }
}
