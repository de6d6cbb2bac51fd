//! 魔法链接签发模块
//!
//! [`LinkBuilder`] 负责签发 token 并组装 URL。
//!
//! ## 签发流程
//!
//! 1. 从共享密钥集选出最新的未过期签名密钥
//! 2. 组装 Claims（`exp = now + max(1, ttl)`，一次性 token 生成 `jti`）
//! 3. header 与 payload 规范化 JSON 后 base64url 编码
//! 4. 可选：对 payload 做 AES-256-GCM 加密，AAD 绑定 header 段
//! 5. 对 `header.payload` 计算 HMAC-SHA-256 得到签名段
//!
//! ## 示例
//!
//! ```rust
//! use std::sync::{Arc, RwLock};
//! use linkrs::key::{Key, KeySet};
//! use linkrs::link::{CreateOptions, LinkBuilder};
//!
//! let mut keys = KeySet::new();
//! keys.add(Key::new("k1", [0x41u8; 32], 1).unwrap());
//! let keys = Arc::new(RwLock::new(keys));
//!
//! let builder = LinkBuilder::new(keys);
//! let token = builder.issue("user-42", &CreateOptions::default()).unwrap();
//! assert_eq!(token.matches('.').count(), 2);
//!
//! let url = builder
//!     .create_url("https://app.test/login?lang=en", &token)
//!     .unwrap();
//! assert!(url.contains("ml="));
//! assert!(url.contains("lang=en"));
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};
use url::Url;

use crate::claims::{APP_BIND_PATH, APP_RETURN_TO, Claims};
use crate::clock::{Clock, SystemClock};
use crate::crypto::{cipher, mac};
use crate::encoding::{b64url_encode, canonical_json};
use crate::error::{Error, Result};
use crate::key::KeySet;
use crate::random::generate_random_base64_url;

/// 默认的 token 有效期（秒）
pub const DEFAULT_TTL_SECONDS: i64 = 900;

/// 默认的 URL 查询参数名
pub const DEFAULT_PARAM_NAME: &str = "ml";

/// `jti` 的随机字节数
const JTI_BYTES: usize = 16;

/// 签发选项
#[derive(Debug, Clone, Default)]
pub struct CreateOptions {
    /// 受众（流程标识）
    pub aud: Option<String>,

    /// 有效期（秒）；`None` 时使用默认的 900 秒，最小钳到 1 秒
    pub ttl_seconds: Option<i64>,

    /// 是否签发为一次性 token（默认 true），为真时生成 `jti`
    pub one_time: Option<bool>,

    /// 是否加密 payload；构建不支持 AEAD 时签发失败
    pub encrypt_payload: bool,

    /// 路径绑定，存入 `app["bind.path"]`
    pub path_bind: Option<String>,

    /// 登录后跳转地址，存入 `app["return_to"]`
    pub return_to: Option<String>,

    /// 自由的应用 claim 包；保留键会被上述选项覆盖
    pub app: HashMap<String, Value>,
}

impl CreateOptions {
    /// 创建默认选项
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置受众
    pub fn with_aud(mut self, aud: impl Into<String>) -> Self {
        self.aud = Some(aud.into());
        self
    }

    /// 设置有效期（秒）
    pub fn with_ttl_seconds(mut self, ttl: i64) -> Self {
        self.ttl_seconds = Some(ttl);
        self
    }

    /// 设置是否一次性
    pub fn with_one_time(mut self, one_time: bool) -> Self {
        self.one_time = Some(one_time);
        self
    }

    /// 设置是否加密 payload
    pub fn with_encrypt_payload(mut self, encrypt: bool) -> Self {
        self.encrypt_payload = encrypt;
        self
    }

    /// 设置路径绑定
    pub fn with_path_bind(mut self, path: impl Into<String>) -> Self {
        self.path_bind = Some(path.into());
        self
    }

    /// 设置跳转地址
    pub fn with_return_to(mut self, return_to: impl Into<String>) -> Self {
        self.return_to = Some(return_to.into());
        self
    }

    /// 添加应用 claim
    pub fn with_app_claim(mut self, key: impl Into<String>, value: Value) -> Self {
        self.app.insert(key.into(), value);
        self
    }

    /// 高安全性预设
    ///
    /// - 5 分钟有效期
    /// - 一次性使用
    /// - payload 加密
    pub fn high_security() -> Self {
        Self {
            ttl_seconds: Some(5 * 60),
            one_time: Some(true),
            encrypt_payload: true,
            ..Self::default()
        }
    }

    /// 宽松预设（适用于开发/测试）
    ///
    /// - 1 小时有效期
    /// - 可重复使用
    pub fn relaxed() -> Self {
        Self {
            ttl_seconds: Some(60 * 60),
            one_time: Some(false),
            ..Self::default()
        }
    }

    fn effective_ttl(&self) -> i64 {
        self.ttl_seconds.unwrap_or(DEFAULT_TTL_SECONDS).max(1)
    }

    fn effective_one_time(&self) -> bool {
        self.one_time.unwrap_or(true)
    }
}

/// 魔法链接签发器
///
/// 与验证端共享同一个密钥集。
pub struct LinkBuilder<C: Clock = SystemClock> {
    keys: Arc<RwLock<KeySet>>,
    clock: C,
}

impl LinkBuilder<SystemClock> {
    /// 使用系统时钟创建签发器
    pub fn new(keys: Arc<RwLock<KeySet>>) -> Self {
        Self::with_clock(keys, SystemClock)
    }
}

impl<C: Clock> LinkBuilder<C> {
    /// 使用指定时钟创建签发器
    pub fn with_clock(keys: Arc<RwLock<KeySet>>, clock: C) -> Self {
        Self { keys, clock }
    }

    /// 签发 token
    ///
    /// # Errors
    ///
    /// - `subject` 为空：`InvalidFormat`
    /// - 密钥集中没有可用签名密钥：`CryptoError`
    /// - 请求加密但构建不支持：`CryptoError`
    pub fn issue(&self, subject: &str, opts: &CreateOptions) -> Result<String> {
        if subject.is_empty() {
            return Err(Error::invalid_format("subject must not be empty"));
        }

        let now = self.clock.now();
        let keys = self.keys.read().unwrap();
        let key = keys.signing_key(now)?;

        let exp = now + opts.effective_ttl();
        let jti = if opts.effective_one_time() {
            Some(generate_random_base64_url(JTI_BYTES)?)
        } else {
            None
        };

        // 保留键由选项设置，覆盖调用方传入的同名键
        let mut app = opts.app.clone();
        if let Some(path) = &opts.path_bind {
            app.insert(APP_BIND_PATH.to_string(), Value::String(path.clone()));
        }
        if let Some(return_to) = &opts.return_to {
            app.insert(APP_RETURN_TO.to_string(), Value::String(return_to.clone()));
        }

        let claims = Claims {
            sub: subject.to_string(),
            iat: now,
            exp,
            aud: opts.aud.clone(),
            nbf: None,
            jti,
            app,
        };

        let mut header = Map::new();
        header.insert("alg".to_string(), Value::String("HS256".to_string()));
        header.insert("kid".to_string(), Value::String(key.kid().to_string()));
        if opts.encrypt_payload {
            header.insert("enc".to_string(), Value::String("A256GCM".to_string()));
        }
        let header_segment = b64url_encode(canonical_json(&Value::Object(header))?.as_bytes());

        let payload_json = canonical_json(&claims.to_value())?;
        let payload_segment = if opts.encrypt_payload {
            let sealed = cipher::encrypt(key, payload_json.as_bytes(), header_segment.as_bytes())?;
            let mut envelope = Map::new();
            envelope.insert("iv".to_string(), Value::String(b64url_encode(&sealed.iv)));
            envelope.insert("tag".to_string(), Value::String(b64url_encode(&sealed.tag)));
            envelope.insert(
                "ct".to_string(),
                Value::String(b64url_encode(&sealed.ciphertext)),
            );
            b64url_encode(canonical_json(&Value::Object(envelope))?.as_bytes())
        } else {
            b64url_encode(payload_json.as_bytes())
        };

        let signing_input = format!("{}.{}", header_segment, payload_segment);
        let signature = mac::sign(key, signing_input.as_bytes())?;

        Ok(format!("{}.{}", signing_input, b64url_encode(&signature)))
    }

    /// 组装魔法链接 URL，token 放在默认参数 `ml` 下
    pub fn create_url(&self, base_url: &str, token: &str) -> Result<String> {
        self.create_url_with_param(base_url, token, DEFAULT_PARAM_NAME)
    }

    /// 组装魔法链接 URL，token 放在指定参数下
    ///
    /// 保留 scheme、userinfo、host、port、path、其余查询参数和
    /// fragment；同名参数被替换。
    pub fn create_url_with_param(
        &self,
        base_url: &str,
        token: &str,
        param_name: &str,
    ) -> Result<String> {
        let mut url = Url::parse(base_url)
            .map_err(|e| Error::invalid_format(format!("invalid base url: {}", e)))?;

        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(name, _)| name != param_name)
            .map(|(name, value)| (name.into_owned(), value.into_owned()))
            .collect();

        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            for (name, value) in &kept {
                pairs.append_pair(name, value);
            }
            pairs.append_pair(param_name, token);
        }

        Ok(url.into())
    }
}
