//! 魔法链接登录示例
//!
//! 展示完整的无密码登录流程：签发 token、组装邮件链接、
//! 验证链接、拒绝重放，并记录审计事件。
//!
//! 运行: cargo run --example magic_login

use std::sync::{Arc, RwLock};

use linkrs::{
    AuditLogger, CreateOptions, InMemoryAuditLogger, Key, KeySet, LinkBuilder, LinkEvent,
    SystemClock, Verifier, VerifyOptions, ua_hash,
};

/// 签名密钥（实际应用中应从环境变量或密钥管理服务获取）
const LINK_SECRET: &[u8] = b"rotate-me-256-bit-signing-secret";

/// 模拟的用户服务
struct UserService;

impl UserService {
    fn lookup_by_email(email: &str) -> Option<String> {
        // 实际应用中应查询用户目录
        if email == "alice@example.com" {
            Some("user_001".to_string())
        } else {
            None
        }
    }
}

/// 魔法链接认证服务
struct MagicLinkService {
    builder: LinkBuilder<SystemClock>,
    verifier: Verifier,
    audit: InMemoryAuditLogger,
}

impl MagicLinkService {
    fn new() -> Self {
        let mut keys = KeySet::new();
        keys.add(Key::new("2026-08", LINK_SECRET, 1_754_006_400).expect("valid key"));
        let keys = Arc::new(RwLock::new(keys));

        Self {
            builder: LinkBuilder::new(keys.clone()),
            verifier: Verifier::new(keys),
            audit: InMemoryAuditLogger::new(),
        }
    }

    /// 用户请求登录：签发一次性链接并「发送邮件」
    fn request_login(&self, email: &str, user_agent: &str) -> Result<String, String> {
        let user_id = UserService::lookup_by_email(email).ok_or("unknown user")?;

        let opts = CreateOptions::new()
            .with_aud("signin")
            .with_ttl_seconds(600)
            .with_path_bind("/auth/magic")
            .with_return_to("https://app.example.com/dashboard")
            .with_app_claim("uah", ua_hash(user_agent).into());
        let token = self
            .builder
            .issue(&user_id, &opts)
            .map_err(|e| e.to_string())?;

        let url = self
            .builder
            .create_url("https://app.example.com/auth/magic", &token)
            .map_err(|e| e.to_string())?;

        self.audit.log(LinkEvent::link_issued(&user_id));
        Ok(url)
    }

    /// 用户点击链接：验证并登录
    fn handle_click(&self, url: &str, user_agent: &str) -> Result<String, String> {
        let opts = VerifyOptions::new()
            .with_expected_aud("signin")
            .with_expected_host("app.example.com")
            .with_enforce_ua_hash(true)
            .with_return_to_allowlist(|target| target.starts_with("https://app.example.com"));

        match self.verifier.verify_from_request(url, Some(user_agent), &opts) {
            Ok(claims) => {
                self.audit.log(LinkEvent::link_verified(&claims.sub));
                Ok(claims.sub)
            }
            Err(reason) => {
                self.audit
                    .log(LinkEvent::link_rejected("unknown", reason.as_str()));
                Err(reason.as_str().to_string())
            }
        }
    }
}

fn main() {
    let service = MagicLinkService::new();
    let user_agent = "Mozilla/5.0 (Demo)";

    println!("=== 魔法链接登录演示 ===\n");

    // 1. 用户请求登录
    let url = service
        .request_login("alice@example.com", user_agent)
        .expect("issue link");
    println!("发送给用户的链接:\n  {}\n", url);

    // 2. 用户点击链接
    match service.handle_click(&url, user_agent) {
        Ok(user_id) => println!("登录成功, 用户: {}", user_id),
        Err(reason) => println!("登录失败: {}", reason),
    }

    // 3. 攻击者重放同一链接
    match service.handle_click(&url, user_agent) {
        Ok(_) => println!("重放竟然成功了（不应发生）"),
        Err(reason) => println!("重放被拒绝: {}", reason),
    }

    // 4. 换了浏览器的点击也会被拒绝
    let fresh = service
        .request_login("alice@example.com", user_agent)
        .expect("issue link");
    match service.handle_click(&fresh, "curl/8.0") {
        Ok(_) => println!("跨 UA 竟然成功了（不应发生）"),
        Err(reason) => println!("跨 UA 点击被拒绝: {}", reason),
    }

    // 5. 审计事件
    println!("\n审计事件:");
    for event in service.audit.get_events() {
        println!(
            "  [{}] {} subject={} reason={}",
            event.severity,
            event.event_type,
            event.subject.as_deref().unwrap_or("-"),
            event.reason.as_deref().unwrap_or("-"),
        );
    }
}
