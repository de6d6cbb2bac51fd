//! 编码与不变量集成测试
//!
//! 覆盖规范化编码的字面值场景、规范化稳定性、
//! 往返确定性和篡改检测。

use std::sync::{Arc, RwLock};

use serde_json::{Value, json};

use linkrs::encoding::{b64url_decode, b64url_encode, canonical_json};
use linkrs::{
    CreateOptions, FixedClock, InMemoryNonceStore, Key, KeySet, LinkBuilder, RequestContext,
    Verifier, VerifyOptions,
};

// ============================================================================
// 字面值场景
// ============================================================================

#[test]
fn test_base64url_of_poop_emoji_bytes() {
    // U+1F4A9 的 UTF-8 字节，无填充
    assert_eq!(b64url_encode(&[0xF0, 0x9F, 0x92, 0xA9]), "8J-SqQ");
}

#[test]
fn test_canonical_json_literal() {
    let value = json!({"z": 1, "a": 2, "nested": {"b": 1, "a": 2}});
    assert_eq!(
        canonical_json(&value).unwrap(),
        r#"{"a":2,"nested":{"a":2,"b":1},"z":1}"#
    );
}

// ============================================================================
// 不变量
// ============================================================================

#[test]
fn test_canonical_stability_for_assorted_values() {
    let samples = [
        json!({}),
        json!({"k": []}),
        json!({"z": {"y": {"x": [1, "two", null, true]}}}),
        json!({"路径": "/登录", "emoji": "tag"}),
        json!({"b": 1.25, "a": -3}),
    ];

    for value in samples {
        let first = canonical_json(&value).unwrap();
        let reparsed: Value = serde_json::from_str(&first).unwrap();
        assert_eq!(first, canonical_json(&reparsed).unwrap(), "value: {}", value);
    }
}

fn pipeline(now: i64) -> (
    LinkBuilder<Arc<FixedClock>>,
    Verifier<InMemoryNonceStore, Arc<FixedClock>>,
) {
    let mut keys = KeySet::new();
    keys.add(Key::new("enc-test", vec![0x7E; 32], 500).unwrap());
    let keys = Arc::new(RwLock::new(keys));
    let clock = Arc::new(FixedClock::at(now));
    (
        LinkBuilder::with_clock(keys.clone(), clock.clone()),
        Verifier::with_parts(keys, InMemoryNonceStore::with_clock(clock.clone()), clock),
    )
}

#[test]
fn test_issue_verify_roundtrip_projection() {
    // verify(issue(c)) 恢复签发时的全部 claims
    let (builder, verifier) = pipeline(1000);

    let opts = CreateOptions::new()
        .with_aud("flow")
        .with_ttl_seconds(120)
        .with_app_claim("n", json!(7))
        .with_app_claim("nested", json!({"deep": [1, 2]}));
    let token = builder.issue("subject-x", &opts).unwrap();

    let claims = verifier
        .verify(
            &token,
            &RequestContext::default(),
            &VerifyOptions::default(),
        )
        .unwrap();

    assert_eq!(claims.sub, "subject-x");
    assert_eq!(claims.iat, 1000);
    assert_eq!(claims.exp, 1120);
    assert_eq!(claims.aud.as_deref(), Some("flow"));
    assert_eq!(claims.app_claim("n"), Some(&json!(7)));
    assert_eq!(claims.app_claim("nested"), Some(&json!({"deep": [1, 2]})));
}

#[test]
fn test_any_single_bit_flip_is_rejected() {
    // 对每个段的首字节做修改，全部必须验证失败
    let (builder, verifier) = pipeline(1000);
    let token = builder
        .issue("u", &CreateOptions::new().with_one_time(false))
        .unwrap();

    let parts: Vec<String> = token.split('.').map(str::to_string).collect();
    for segment in 0..3 {
        let mut bytes = b64url_decode(&parts[segment]).unwrap();
        bytes[0] ^= 0x01;
        let mut mutated = parts.clone();
        mutated[segment] = b64url_encode(&bytes);
        let tampered = mutated.join(".");
        assert_ne!(tampered, token);

        let result = verifier.verify(
            &tampered,
            &RequestContext::default(),
            &VerifyOptions::default(),
        );
        assert!(result.is_err(), "segment {} flip must fail", segment);
    }

    // 原始 token 本身仍然有效
    assert!(
        verifier
            .verify(
                &token,
                &RequestContext::default(),
                &VerifyOptions::default()
            )
            .is_ok()
    );
}

#[test]
fn test_token_is_url_safe() {
    let (builder, _) = pipeline(1000);
    let token = builder.issue("user@example.com", &CreateOptions::default()).unwrap();

    assert!(
        token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    );
}

#[test]
fn test_identical_claims_identical_segments() {
    // 相同输入的 header/payload 段逐字节一致（多次使用 token 无随机成分）
    let (builder, _) = pipeline(1000);
    let opts = CreateOptions::new().with_one_time(false).with_aud("a");

    let first = builder.issue("u", &opts).unwrap();
    let second = builder.issue("u", &opts).unwrap();
    assert_eq!(first, second);
}
