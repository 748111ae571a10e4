//! 内存账本实现
//!
//! 模拟器和测试使用的参考实现。所有写操作在一个写锁内完成。

use super::{AssetLedger, NativeLedger};
use ethers::types::{Address, U256};
use log::debug;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Default)]
struct TokenState {
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    total_supply: U256,
}

impl TokenState {
    fn balance(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    fn move_balance(&mut self, from: Address, to: Address, amount: U256) -> bool {
        let from_balance = self.balance(from);
        if from_balance < amount {
            return false;
        }
        if from == to {
            return true;
        }
        let to_balance = self.balance(to);
        let Some(new_to_balance) = to_balance.checked_add(amount) else {
            return false;
        };
        self.balances.insert(from, from_balance - amount);
        self.balances.insert(to, new_to_balance);
        true
    }
}

/// 内存中的可替代资产(测试代币)
#[derive(Debug)]
pub struct InMemoryAssetLedger {
    address: Address,
    symbol: String,
    state: RwLock<TokenState>,
}

impl InMemoryAssetLedger {
    pub fn new(address: Address, symbol: impl Into<String>) -> Self {
        Self {
            address,
            symbol: symbol.into(),
            state: RwLock::new(TokenState::default()),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn total_supply(&self) -> U256 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .total_supply
    }

    /// 增发代币
    pub fn mint(&self, to: Address, amount: U256) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let (Some(supply), Some(balance)) = (
            state.total_supply.checked_add(amount),
            state.balance(to).checked_add(amount),
        ) else {
            return false;
        };
        state.total_supply = supply;
        state.balances.insert(to, balance);
        debug!("{} 增发 {} 给 {:?}", self.symbol, amount, to);
        true
    }
}

impl AssetLedger for InMemoryAssetLedger {
    fn address(&self) -> Address {
        self.address
    }

    fn balance_of(&self, account: Address) -> U256 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .balance(account)
    }

    fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    fn approve(&self, owner: Address, spender: Address, amount: U256) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.allowances.insert((owner, spender), amount);
        true
    }

    fn transfer(&self, from: Address, to: Address, amount: U256) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.move_balance(from, to, amount)
    }

    fn transfer_from(&self, spender: Address, owner: Address, to: Address, amount: U256) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let allowed = state
            .allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default();
        if allowed < amount {
            return false;
        }
        if !state.move_balance(owner, to, amount) {
            return false;
        }
        // U256::MAX 视为无限授权
        if allowed != U256::MAX {
            state.allowances.insert((owner, spender), allowed - amount);
        }
        true
    }
}

/// 内存中的原生币余额
#[derive(Debug, Default)]
pub struct InMemoryNativeLedger {
    state: RwLock<TokenState>,
}

impl InMemoryNativeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 创世分配
    pub fn mint(&self, to: Address, amount: U256) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let (Some(supply), Some(balance)) = (
            state.total_supply.checked_add(amount),
            state.balance(to).checked_add(amount),
        ) else {
            return false;
        };
        state.total_supply = supply;
        state.balances.insert(to, balance);
        true
    }

    pub fn total_supply(&self) -> U256 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .total_supply
    }
}

impl NativeLedger for InMemoryNativeLedger {
    fn balance_of(&self, account: Address) -> U256 {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .balance(account)
    }

    fn transfer(&self, from: Address, to: Address, amount: U256) -> bool {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.move_balance(from, to, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[test]
    fn test_mint_and_transfer() {
        let token = InMemoryAssetLedger::new(addr(100), "TK1");
        assert!(token.mint(addr(1), U256::from(500u64)));
        assert_eq!(token.total_supply(), U256::from(500u64));

        assert!(token.transfer(addr(1), addr(2), U256::from(200u64)));
        assert_eq!(token.balance_of(addr(1)), U256::from(300u64));
        assert_eq!(token.balance_of(addr(2)), U256::from(200u64));

        // 余额不足
        assert!(!token.transfer(addr(2), addr(1), U256::from(201u64)));
        assert_eq!(token.balance_of(addr(2)), U256::from(200u64));
    }

    #[test]
    fn test_transfer_from_consumes_allowance() {
        let token = InMemoryAssetLedger::new(addr(100), "TK1");
        token.mint(addr(1), U256::from(1000u64));

        assert!(!token.transfer_from(addr(9), addr(1), addr(9), U256::from(1u64)));

        token.approve(addr(1), addr(9), U256::from(300u64));
        assert!(token.transfer_from(addr(9), addr(1), addr(5), U256::from(100u64)));
        assert_eq!(token.allowance(addr(1), addr(9)), U256::from(200u64));
        assert_eq!(token.balance_of(addr(5)), U256::from(100u64));

        assert!(!token.transfer_from(addr(9), addr(1), addr(5), U256::from(201u64)));
    }

    #[test]
    fn test_unlimited_allowance() {
        let token = InMemoryAssetLedger::new(addr(100), "TK1");
        token.mint(addr(1), U256::from(1000u64));
        token.approve(addr(1), addr(9), U256::MAX);

        assert!(token.transfer_from(addr(9), addr(1), addr(9), U256::from(10u64)));
        assert_eq!(token.allowance(addr(1), addr(9)), U256::MAX);
    }

    #[test]
    fn test_native_ledger() {
        let native = InMemoryNativeLedger::new();
        native.mint(addr(1), U256::from(10u64));

        assert!(native.transfer(addr(1), addr(2), U256::from(4u64)));
        assert!(!native.transfer(addr(1), addr(2), U256::from(7u64)));
        assert_eq!(native.balance_of(addr(1)), U256::from(6u64));
        assert_eq!(native.balance_of(addr(2)), U256::from(4u64));
        assert_eq!(native.total_supply(), U256::from(10u64));
    }
}
