//! 结算日志
//!
//! 记录一次调用中已经完成的外部转账。未提交就被 drop 时按相反顺序执行补偿转账，
//! 使调用要么全部生效要么全部撤销。转出给外部账户的资产无法补偿，
//! 因此每次调用最多一笔 `push_asset`，且必须是最后一个外部操作。

use crate::core::types::{ExchangeError, Result};
use crate::ledger::{AssetLedger, NativeLedger};
use ethers::types::{Address, U256};
use log::{error, warn};
use std::sync::Arc;

enum Compensation {
    Native {
        from: Address,
        to: Address,
        amount: U256,
    },
    Asset {
        ledger: Arc<dyn AssetLedger>,
        from: Address,
        to: Address,
        amount: U256,
        /// 拉取前 owner 给池子的授权额度，退回资产后恢复；无限授权不需要恢复
        allowance: Option<U256>,
    },
}

pub struct Settlement {
    native: Arc<dyn NativeLedger>,
    undo: Vec<Compensation>,
    committed: bool,
}

impl Settlement {
    pub fn new(native: Arc<dyn NativeLedger>) -> Self {
        Self {
            native,
            undo: Vec::new(),
            committed: false,
        }
    }

    /// 原生币转账
    pub fn move_native(&mut self, from: Address, to: Address, amount: U256) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        if !self.native.transfer(from, to, amount) {
            return Err(ExchangeError::TransferFailed(format!(
                "native transfer of {} from {:?} to {:?} rejected",
                amount, from, to
            )));
        }
        self.undo.push(Compensation::Native {
            from: to,
            to: from,
            amount,
        });
        Ok(())
    }

    /// 通过授权把 owner 的资产拉进池子，并重新读取池余额确认实际到账
    pub fn pull_asset(
        &mut self,
        ledger: &Arc<dyn AssetLedger>,
        pool: Address,
        owner: Address,
        amount: U256,
    ) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let allowance = Some(ledger.allowance(owner, pool)).filter(|a| *a != U256::MAX);
        let before = ledger.balance_of(pool);
        let accepted = ledger.transfer_from(pool, owner, pool, amount);
        let received = ledger.balance_of(pool).saturating_sub(before);

        if !received.is_zero() {
            self.undo.push(Compensation::Asset {
                ledger: Arc::clone(ledger),
                from: pool,
                to: owner,
                amount: received.min(amount),
                allowance,
            });
        }

        if !accepted || received < amount {
            return Err(ExchangeError::TransferFailed(format!(
                "asset {:?}: pulled {} of {} from {:?}",
                ledger.address(),
                received,
                amount,
                owner
            )));
        }
        Ok(())
    }

    /// 池子向外部账户转出资产，无法补偿
    pub fn push_asset(
        &mut self,
        ledger: &Arc<dyn AssetLedger>,
        pool: Address,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }
        if !ledger.transfer(pool, to, amount) {
            return Err(ExchangeError::TransferFailed(format!(
                "asset {:?}: transfer of {} to {:?} rejected",
                ledger.address(),
                amount,
                to
            )));
        }
        Ok(())
    }

    pub fn commit(mut self) {
        self.committed = true;
    }

    fn rollback(&mut self) {
        while let Some(step) = self.undo.pop() {
            let restored = match &step {
                Compensation::Native { from, to, amount } => {
                    self.native.transfer(*from, *to, *amount)
                }
                Compensation::Asset {
                    ledger,
                    from,
                    to,
                    amount,
                    allowance,
                } => {
                    let returned = ledger.transfer(*from, *to, *amount);
                    // to 是原 owner，from 是池子
                    returned && allowance.map_or(true, |a| ledger.approve(*to, *from, a))
                }
            };
            if !restored {
                match step {
                    Compensation::Native { from, to, amount } => {
                        error!("原生币补偿转账失败: {} from {:?} to {:?}", amount, from, to)
                    }
                    Compensation::Asset {
                        ledger,
                        from,
                        to,
                        amount,
                        ..
                    } => error!(
                        "资产 {:?} 补偿转账失败: {} from {:?} to {:?}",
                        ledger.address(),
                        amount,
                        from,
                        to
                    ),
                }
            }
        }
    }
}

impl Drop for Settlement {
    fn drop(&mut self) {
        if !self.committed && !self.undo.is_empty() {
            warn!("调用失败，回滚 {} 笔转账", self.undo.len());
            self.rollback();
        }
    }
}
