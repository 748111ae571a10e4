//! 池级重入锁
//!
//! 获取失败立即返回 `Reentrancy`，不会阻塞等待。释放由 `GuardToken` 的 Drop
//! 完成，因此所有退出路径(包括 `?` 提前返回)都会释放。

use crate::core::types::{ExchangeError, Result};
use ethers::types::Address;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct ReentrancyGuard {
    owner: Address,
    locked: AtomicBool,
}

impl ReentrancyGuard {
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            locked: AtomicBool::new(false),
        }
    }

    pub fn enter(&self) -> Result<GuardToken<'_>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| ExchangeError::Reentrancy(self.owner))?;
        Ok(GuardToken { guard: self })
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }
}

/// 持有期间池处于锁定状态
#[derive(Debug)]
pub struct GuardToken<'a> {
    guard: &'a ReentrancyGuard,
}

impl Drop for GuardToken<'_> {
    fn drop(&mut self) {
        self.guard.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_entry_is_rejected() {
        let owner = Address::from_low_u64_be(1);
        let guard = ReentrancyGuard::new(owner);

        let token = guard.enter().unwrap();
        assert!(guard.is_locked());
        assert_eq!(guard.enter().unwrap_err(), ExchangeError::Reentrancy(owner));

        drop(token);
        assert!(!guard.is_locked());
        assert!(guard.enter().is_ok());
    }

    #[test]
    fn test_released_on_early_return() {
        fn failing(guard: &ReentrancyGuard) -> Result<()> {
            let _token = guard.enter()?;
            Err(ExchangeError::NotFunded)
        }

        let guard = ReentrancyGuard::new(Address::from_low_u64_be(1));
        assert_eq!(failing(&guard), Err(ExchangeError::NotFunded));
        assert!(!guard.is_locked());
    }
}
