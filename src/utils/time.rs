//! 时间工具

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

/// 当前时间来源(秒)，截止时间在调用入口处与它比较
pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        current_timestamp()
    }
}

/// 可手动设置的时钟，用于模拟和测试
#[derive(Debug, Default)]
pub struct FixedClock {
    now: AtomicU64,
}

impl FixedClock {
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, seconds: u64) {
        self.now.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// 获取当前UTC时间戳（秒）
pub fn current_timestamp() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

/// 将时间戳转换为可读的时间字符串
pub fn timestamp_to_string(timestamp: u64) -> String {
    let datetime = DateTime::from_timestamp(timestamp as i64, 0).unwrap_or_else(Utc::now);
    datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
