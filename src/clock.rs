//! 时钟抽象模块
//!
//! 签发和验证都只依赖「自 epoch 起的秒数」这一个时间概念。
//! 通过 [`Clock`] trait 注入时间来源，生产环境使用 [`SystemClock`]，
//! 测试中使用 [`FixedClock`] 获得确定性的时间。

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// 时钟抽象
///
/// 返回自 Unix epoch 起的秒数。实现必须可以在多线程间共享。
pub trait Clock: Send + Sync {
    /// 当前时间（秒）
    fn now(&self) -> i64;
}

/// 系统时钟
///
/// 默认实现，读取系统墙上时钟。
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// 固定时钟
///
/// 用于测试：时间只在显式调用 [`set`](FixedClock::set) 或
/// [`advance`](FixedClock::advance) 时改变。
///
/// # Example
///
/// ```rust
/// use linkrs::clock::{Clock, FixedClock};
///
/// let clock = FixedClock::at(1000);
/// assert_eq!(clock.now(), 1000);
///
/// clock.advance(500);
/// assert_eq!(clock.now(), 1500);
/// ```
#[derive(Debug, Default)]
pub struct FixedClock {
    secs: AtomicI64,
}

impl FixedClock {
    /// 创建固定在指定时刻的时钟
    pub fn at(secs: i64) -> Self {
        Self {
            secs: AtomicI64::new(secs),
        }
    }

    /// 设置当前时间
    pub fn set(&self, secs: i64) {
        self.secs.store(secs, Ordering::SeqCst);
    }

    /// 前进指定秒数
    pub fn advance(&self, secs: i64) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.secs.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> i64 {
        (**self).now()
    }
}
