//! 外部账本接口
//!
//! 交易所依赖的两个外部协作方：可替代资产账本(ERC20语义)和原生币转账原语。
//! 交易所只通过这里的 trait 访问它们，`memory` 提供内存实现。

pub mod memory;

pub use memory::*;

use ethers::types::{Address, U256};

/// 资产账本，语义与 ERC20 一致。调用者身份显式传入
#[cfg_attr(test, mockall::automock)]
pub trait AssetLedger: Send + Sync {
    /// 资产标识(代币合约地址)
    fn address(&self) -> Address;

    fn balance_of(&self, account: Address) -> U256;

    fn allowance(&self, owner: Address, spender: Address) -> U256;

    fn approve(&self, owner: Address, spender: Address, amount: U256) -> bool;

    /// 由 from 发起的直接转账
    fn transfer(&self, from: Address, to: Address, amount: U256) -> bool;

    /// spender 使用 owner 的授权额度转账
    fn transfer_from(&self, spender: Address, owner: Address, to: Address, amount: U256) -> bool;
}

/// 原生币转账原语
pub trait NativeLedger: Send + Sync {
    fn balance_of(&self, account: Address) -> U256;

    fn transfer(&self, from: Address, to: Address, amount: U256) -> bool;
}
