//! 审计日志模块
//!
//! 提供魔法链接相关安全事件的记录和查询功能。
//! 核心流程本身不产生日志，由应用层在签发/验证前后记录事件。
//!
//! ## 使用示例
//!
//! ```rust
//! use linkrs::audit::{AuditLogger, InMemoryAuditLogger, LinkEvent};
//!
//! let logger = InMemoryAuditLogger::new();
//!
//! logger.log(LinkEvent::link_issued("user-42"));
//! logger.log(LinkEvent::link_rejected("user-42", "token_expired"));
//!
//! let events = logger.get_events();
//! assert_eq!(events.len(), 2);
//!
//! let rejected = logger.get_events_by_subject("user-42");
//! assert_eq!(rejected.len(), 2);
//! ```

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::random::generate_random_base64_url;

/// 事件严重程度，从低到高排列
///
/// 派生了 `Ord`，可以直接做阈值比较
/// （例如只上报 `>= Warning` 的事件）。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum EventSeverity {
    /// 诊断细节，生产环境通常不关心
    Debug,
    /// 正常的业务事件（签发、验证成功）
    #[default]
    Info,
    /// 值得人工留意的异常（验证被拒绝）
    Warning,
    /// 操作失败
    Error,
    /// 需要立即响应的安全问题
    Critical,
}

impl EventSeverity {
    /// 稳定的小写等级名
    pub fn as_str(&self) -> &'static str {
        match self {
            EventSeverity::Debug => "debug",
            EventSeverity::Info => "info",
            EventSeverity::Warning => "warning",
            EventSeverity::Error => "error",
            EventSeverity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for EventSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 安全事件类型
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// 魔法链接签发
    LinkIssued,
    /// 魔法链接验证成功
    LinkVerified,
    /// 魔法链接被拒绝
    LinkRejected,
    /// 签名密钥加入密钥集
    KeyAdded,
    /// 自定义事件
    Custom(String),
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::LinkIssued => write!(f, "link_issued"),
            EventType::LinkVerified => write!(f, "link_verified"),
            EventType::LinkRejected => write!(f, "link_rejected"),
            EventType::KeyAdded => write!(f, "key_added"),
            EventType::Custom(name) => write!(f, "custom:{}", name),
        }
    }
}

/// 安全事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkEvent {
    /// 事件 ID
    pub id: String,
    /// 事件类型
    pub event_type: EventType,
    /// 严重程度
    pub severity: EventSeverity,
    /// 相关主体（如果适用）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// 拒绝原因代码（如果适用）
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// 额外详情
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, String>,
    /// 事件时间
    pub timestamp: DateTime<Utc>,
}

impl LinkEvent {
    /// 创建新的安全事件
    pub fn new(event_type: EventType, severity: EventSeverity) -> Self {
        Self {
            id: generate_random_base64_url(8).unwrap_or_default(),
            event_type,
            severity,
            subject: None,
            reason: None,
            details: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// 创建自定义事件
    pub fn custom(name: impl Into<String>, severity: EventSeverity) -> Self {
        Self::new(EventType::Custom(name.into()), severity)
    }

    // ========================================================================
    // 便捷构造方法
    // ========================================================================

    /// 魔法链接签发事件
    pub fn link_issued(subject: impl Into<String>) -> Self {
        Self::new(EventType::LinkIssued, EventSeverity::Info).with_subject(subject)
    }

    /// 魔法链接验证成功事件
    pub fn link_verified(subject: impl Into<String>) -> Self {
        Self::new(EventType::LinkVerified, EventSeverity::Info).with_subject(subject)
    }

    /// 魔法链接被拒绝事件
    ///
    /// `subject` 在验证失败时往往不可信或未知，可以传占位值。
    pub fn link_rejected(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(EventType::LinkRejected, EventSeverity::Warning)
            .with_subject(subject)
            .with_reason(reason)
    }

    /// 密钥加入事件
    pub fn key_added(kid: impl Into<String>) -> Self {
        Self::new(EventType::KeyAdded, EventSeverity::Info).with_detail("kid", kid)
    }

    // ========================================================================
    // 构建器方法
    // ========================================================================

    /// 设置相关主体
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// 设置拒绝原因
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// 添加详情
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// 审计日志接口
///
/// 实现此 trait 以接入自定义的日志后端。
pub trait AuditLogger: Send + Sync {
    /// 记录一个事件
    fn log(&self, event: LinkEvent);
}

/// 内存审计日志器
///
/// 用于测试和开发；生产环境建议接入持久化后端。
#[derive(Debug, Default)]
pub struct InMemoryAuditLogger {
    events: RwLock<Vec<LinkEvent>>,
}

impl InMemoryAuditLogger {
    /// 创建新的内存日志器
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取所有事件
    pub fn get_events(&self) -> Vec<LinkEvent> {
        self.events.read().unwrap().clone()
    }

    /// 按主体过滤事件
    pub fn get_events_by_subject(&self, subject: &str) -> Vec<LinkEvent> {
        self.events
            .read()
            .unwrap()
            .iter()
            .filter(|event| event.subject.as_deref() == Some(subject))
            .cloned()
            .collect()
    }

    /// 按类型过滤事件
    pub fn get_events_by_type(&self, event_type: &EventType) -> Vec<LinkEvent> {
        self.events
            .read()
            .unwrap()
            .iter()
            .filter(|event| &event.event_type == event_type)
            .cloned()
            .collect()
    }

    /// 按严重程度过滤事件
    pub fn get_events_by_severity(&self, severity: EventSeverity) -> Vec<LinkEvent> {
        self.events
            .read()
            .unwrap()
            .iter()
            .filter(|event| event.severity == severity)
            .cloned()
            .collect()
    }

    /// 事件数量
    pub fn len(&self) -> usize {
        self.events.read().unwrap().len()
    }

    /// 是否没有任何事件
    pub fn is_empty(&self) -> bool {
        self.events.read().unwrap().is_empty()
    }

    /// 清空所有事件
    pub fn clear(&self) {
        self.events.write().unwrap().clear();
    }
}

impl AuditLogger for InMemoryAuditLogger {
    fn log(&self, event: LinkEvent) {
        self.events.write().unwrap().push(event);
    }
}
