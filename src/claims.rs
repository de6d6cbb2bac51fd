//! Claims 与紧凑 token 容器
//!
//! [`Claims`] 是 payload 的值对象：必选的 `sub`/`iat`/`exp`，
//! 可选的 `aud`/`nbf`/`jti`，以及自由的应用 claim 包 `app`。
//! `app` 中按约定使用命名空间键：`bind.path`、`bind.host`、
//! `uah`、`return_to`。验证端只对这几个键做存在性和类型检查，
//! 其余内容完全由应用定义。
//!
//! [`CompactToken`] 是三段式 token 容器：
//! `base64url(header) "." base64url(payload) "." base64url(signature)`。

use std::collections::HashMap;

use serde_json::{Map, Value};

// app claim 包中验证端识别的保留键
/// 路径绑定
pub const APP_BIND_PATH: &str = "bind.path";
/// 主机绑定
pub const APP_BIND_HOST: &str = "bind.host";
/// User-Agent 哈希
pub const APP_UA_HASH: &str = "uah";
/// 登录后跳转地址
pub const APP_RETURN_TO: &str = "return_to";

/// Token payload 的值对象
///
/// 每次签发创建一份，签发后不再变更；验证成功后交还给调用方。
#[derive(Debug, Clone, PartialEq)]
pub struct Claims {
    /// 主体标识（用户 ID、邮箱哈希等），非空
    pub sub: String,

    /// 签发时间（秒）
    pub iat: i64,

    /// 过期时间（秒）
    pub exp: i64,

    /// 受众（流程标识），防止跨流程使用
    pub aud: Option<String>,

    /// 生效时间（秒）
    pub nbf: Option<i64>,

    /// 一次性 token 的随机标识，交由 NonceStore 消费
    pub jti: Option<String>,

    /// 应用自定义 claim 包
    pub app: HashMap<String, Value>,
}

impl Claims {
    /// 读取 app claim 包中的值
    pub fn app_claim(&self, key: &str) -> Option<&Value> {
        self.app.get(key)
    }

    /// 是否签发为一次性 token
    pub fn is_one_time(&self) -> bool {
        self.jti.is_some()
    }

    /// 转为 JSON 对象，供规范化编码
    ///
    /// 可选字段缺省时不输出；`app` 为空时也不输出。
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("sub".to_string(), Value::String(self.sub.clone()));
        map.insert("iat".to_string(), Value::from(self.iat));
        map.insert("exp".to_string(), Value::from(self.exp));
        if let Some(aud) = &self.aud {
            map.insert("aud".to_string(), Value::String(aud.clone()));
        }
        if let Some(nbf) = self.nbf {
            map.insert("nbf".to_string(), Value::from(nbf));
        }
        if let Some(jti) = &self.jti {
            map.insert("jti".to_string(), Value::String(jti.clone()));
        }
        if !self.app.is_empty() {
            let app: Map<String, Value> = self
                .app
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            map.insert("app".to_string(), Value::Object(app));
        }
        Value::Object(map)
    }

    /// 从解码后的 JSON 对象重建 Claims，严格检查各字段形状
    ///
    /// - `sub`: 非空字符串
    /// - `iat`/`exp`: JSON 整数
    /// - `aud`/`jti`: 字符串（若出现）
    /// - `nbf`: JSON 整数（若出现）
    /// - `app`: 对象（若出现）
    ///
    /// 形状不符返回 `None`；未知的额外字段被忽略
    /// （它们已被签名覆盖，不构成篡改面）。
    pub fn from_object(map: &Map<String, Value>) -> Option<Self> {
        let sub = map.get("sub")?.as_str()?;
        if sub.is_empty() {
            return None;
        }

        let iat = as_integer(map.get("iat")?)?;
        let exp = as_integer(map.get("exp")?)?;

        let aud = match map.get("aud") {
            None => None,
            Some(v) => Some(v.as_str()?.to_string()),
        };
        let nbf = match map.get("nbf") {
            None => None,
            Some(v) => Some(as_integer(v)?),
        };
        let jti = match map.get("jti") {
            None => None,
            Some(v) => Some(v.as_str()?.to_string()),
        };
        let app = match map.get("app") {
            None => HashMap::new(),
            Some(Value::Object(obj)) => obj
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            Some(_) => return None,
        };

        Some(Self {
            sub: sub.to_string(),
            iat,
            exp,
            aud,
            nbf,
            jti,
            app,
        })
    }
}

/// JSON 整数：拒绝浮点表示（1.0 不是整数）
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

/// 三段式 token 容器
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactToken {
    /// header 段（URL 安全 Base64）
    pub header: String,
    /// payload 段（URL 安全 Base64）
    pub payload: String,
    /// 签名段（URL 安全 Base64）
    pub signature: String,
}

impl CompactToken {
    /// 解析 token 字符串；必须恰好是三个点分段
    pub fn parse(token: &str) -> Option<Self> {
        let mut parts = token.split('.');
        let header = parts.next()?;
        let payload = parts.next()?;
        let signature = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            header: header.to_string(),
            payload: payload.to_string(),
            signature: signature.to_string(),
        })
    }

    /// 签名输入：`header "." payload`
    pub fn signing_input(&self) -> String {
        format!("{}.{}", self.header, self.payload)
    }

    /// 编码为 token 字符串
    pub fn encode(&self) -> String {
        format!("{}.{}.{}", self.header, self.payload, self.signature)
    }
}
