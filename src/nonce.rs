//! 重放账本模块
//!
//! 一次性 token 的防重放依赖单个契约方法：
//! [`NonceStore::consume`]。它是整个验证流程中唯一的副作用点，
//! 也是并发验证同一 token 时的线性化点：任意交错下至多一个
//! 调用者得到 `true`，其余得到 `false`。
//!
//! 生产环境可以基于 Redis/SQL 实现此 trait；
//! 本模块提供内存实现 [`InMemoryNonceStore`]（单实例部署/测试）
//! 和对多次使用 token 的空操作实现 [`BlackholeNonceStore`]。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::clock::{Clock, SystemClock};

/// 重放账本契约
///
/// 实现必须：
/// - 对同一个未过期的 `jti`，首次 `consume` 返回 `true`，
///   其后一律返回 `false`
/// - 在返回 `false` 时不改变账本内容
/// - 在并发调用下保持原子的 test-and-set 语义
/// - 顺带回收已过期的条目
pub trait NonceStore: Send + Sync {
    /// 尝试消费一个 nonce；`expires_at` 之后条目可被回收
    fn consume(&self, jti: &str, expires_at: i64) -> bool;
}

/// 内存重放账本
///
/// `jti -> expires_at` 的映射；每次调用先清理过期条目。
///
/// # Example
///
/// ```rust
/// use linkrs::nonce::{InMemoryNonceStore, NonceStore};
///
/// let store = InMemoryNonceStore::new();
/// assert!(store.consume("n1", i64::MAX));
/// assert!(!store.consume("n1", i64::MAX));
/// ```
pub struct InMemoryNonceStore {
    entries: Mutex<HashMap<String, i64>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryNonceStore {
    /// 创建使用系统时钟的账本
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// 创建使用指定时钟的账本
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// 当前账本中的条目数（含尚未回收的过期条目）
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// 账本是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

impl Default for InMemoryNonceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NonceStore for InMemoryNonceStore {
    fn consume(&self, jti: &str, expires_at: i64) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap();

        // 顺带回收：过期条目在 expires_at 之后即可重新使用存储
        entries.retain(|_, entry_expires_at| *entry_expires_at > now);

        if entries.contains_key(jti) {
            return false;
        }
        entries.insert(jti.to_string(), expires_at);
        true
    }
}

/// 黑洞账本
///
/// 无条件返回 `true`，用于不需要防重放的多次使用 token 场景。
#[derive(Debug, Clone, Copy, Default)]
pub struct BlackholeNonceStore;

impl NonceStore for BlackholeNonceStore {
    fn consume(&self, _jti: &str, _expires_at: i64) -> bool {
        true
    }
}
