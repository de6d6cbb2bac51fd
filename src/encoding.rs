//! 编码模块：URL 安全 Base64 与规范化 JSON
//!
//! MAC 的计算对象是 `base64url(header) + "." + base64url(payload)`，
//! 因此 header 和 payload 的字节必须在验证端可以逐字节复现。
//! 规范化 JSON 消除了所有实现自定义的键顺序差异：
//!
//! - 对象键在每一层都按码点升序排序
//! - 数组保持给定顺序
//! - 字符串按 UTF-8 直接输出，不转义斜杠和非 ASCII 字符
//! - 拒绝非有限浮点数（NaN、±∞）
//! - 整数不带小数点，无任何多余空白
//!
//! ## 示例
//!
//! ```rust
//! use linkrs::encoding::{b64url_encode, canonical_json};
//! use serde_json::json;
//!
//! assert_eq!(b64url_encode(&[0xF0, 0x9F, 0x92, 0xA9]), "8J-SqQ");
//!
//! let value = json!({"z": 1, "a": 2, "nested": {"b": 1, "a": 2}});
//! assert_eq!(
//!     canonical_json(&value).unwrap(),
//!     r#"{"a":2,"nested":{"a":2,"b":1},"z":1}"#
//! );
//! ```

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// URL 安全 Base64 编码（无填充）
pub fn b64url_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// URL 安全 Base64 解码
///
/// 拒绝 `[A-Za-z0-9_-]` 之外的任何字符；空输入解码为空输出。
pub fn b64url_decode(input: &str) -> Result<Vec<u8>> {
    if !input
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(Error::invalid_format("invalid base64url character"));
    }
    URL_SAFE_NO_PAD
        .decode(input)
        .map_err(|e| Error::invalid_format(format!("base64url decode failed: {}", e)))
}

/// 规范化 JSON 编码
///
/// 对同一个值的任意两次编码产生完全相同的字节序列。
pub fn canonical_json(value: &Value) -> Result<String> {
    let mut out = String::new();
    write_canonical(value, &mut out)?;
    Ok(out)
}

fn write_canonical(value: &Value, out: &mut String) -> Result<()> {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(true) => out.push_str("true"),
        Value::Bool(false) => out.push_str("false"),
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                if !f.is_finite() {
                    return Err(Error::invalid_format(
                        "non-finite number cannot be canonicalized",
                    ));
                }
            }
            out.push_str(&n.to_string());
        }
        Value::String(s) => write_json_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out)?;
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_unstable();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_json_string(key, out);
                out.push(':');
                // 键一定存在，上面刚从同一个 map 取出
                if let Some(v) = map.get(key.as_str()) {
                    write_canonical(v, out)?;
                }
            }
            out.push('}');
        }
    }
    Ok(())
}

/// JSON 字符串输出：只转义引号、反斜杠和控制字符，
/// 斜杠与非 ASCII 字符按 UTF-8 原样通过。
fn write_json_string(s: &str, out: &mut String) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// 解码 JSON 字节并要求顶层是对象
///
/// 顶层是数组或标量时以 `InvalidFormat` 失败。
pub fn json_decode_object(bytes: &[u8]) -> Result<Map<String, Value>> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::invalid_format(format!("json decode failed: {}", e)))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(Error::invalid_format("top-level json value is not an object")),
    }
}
