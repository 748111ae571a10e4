//! 流动性份额账本
//!
//! 池自身发行的可替代份额。所有方法在出错时不修改任何状态。

use crate::core::types::{ExchangeError, Result};
use ethers::types::{Address, U256};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ShareLedger {
    total_supply: U256,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
}

impl ShareLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    pub fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn mint(&mut self, to: Address, amount: U256) -> Result<()> {
        let total = self
            .total_supply
            .checked_add(amount)
            .ok_or(ExchangeError::Overflow)?;
        let balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(ExchangeError::Overflow)?;
        self.total_supply = total;
        self.balances.insert(to, balance);
        Ok(())
    }

    pub fn burn(&mut self, from: Address, amount: U256) -> Result<()> {
        let balance = self.ensure_balance(from, amount)?;
        self.balances.insert(from, balance - amount);
        self.total_supply -= amount;
        Ok(())
    }

    pub fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<()> {
        let from_balance = self.ensure_balance(from, amount)?;
        if from == to {
            return Ok(());
        }
        // 任一余额不超过 total_supply，加法不会溢出
        let to_balance = self.balance_of(to) + amount;
        self.balances.insert(from, from_balance - amount);
        self.balances.insert(to, to_balance);
        Ok(())
    }

    pub fn approve(&mut self, owner: Address, spender: Address, amount: U256) {
        self.allowances.insert((owner, spender), amount);
    }

    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        let allowed = self.allowance(from, spender);
        if allowed < amount {
            return Err(ExchangeError::InsufficientAllowance {
                requested: amount,
                allowed,
            });
        }
        self.transfer(from, to, amount)?;
        if allowed != U256::MAX {
            self.allowances.insert((from, spender), allowed - amount);
        }
        Ok(())
    }

    fn ensure_balance(&self, account: Address, amount: U256) -> Result<U256> {
        let available = self.balance_of(account);
        if available < amount {
            return Err(ExchangeError::InsufficientShares {
                requested: amount,
                available,
            });
        }
        Ok(available)
    }
}
