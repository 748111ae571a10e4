use ethers::types::{Address, H160, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 原生币的资产标识 (0xEeee...EEeE 约定)，不能为其创建交易所
pub const NATIVE_CURRENCY: Address = H160([0xee; 20]);

/// 一次调用的上下文：调用者以及随调用附带的原生币数量
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Call {
    pub sender: Address,
    pub value: U256,
}

impl Call {
    /// 附带原生币的调用
    pub fn new(sender: Address, value: U256) -> Self {
        Self { sender, value }
    }
}

/// 池的可序列化视图
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    pub address: Address,
    pub asset: Address,
    pub native_reserve: U256,
    pub asset_reserve: U256,
    pub total_shares: U256,
}

impl PoolSnapshot {
    pub fn is_funded(&self) -> bool {
        !self.total_shares.is_zero()
    }
}

impl fmt::Display for PoolSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "池 {:?} (资产 {:?})", self.address, self.asset)?;
        write!(f, "\n原生币储备: {} wei", self.native_reserve)?;
        write!(f, "\n资产储备: {}", self.asset_reserve)?;
        write!(f, "\n流动性份额: {}", self.total_shares)
    }
}

/// 错误类型
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    #[error("Deadline expired: deadline {deadline}, now {now}")]
    Expired { deadline: u64, now: u64 },

    #[error("Exchange already exists for asset {0:?}")]
    AlreadyExists(Address),

    #[error("Invalid asset: {0:?}")]
    InvalidAsset(Address),

    #[error("Pool has no liquidity")]
    NotFunded,

    #[error("Insufficient shares: requested {requested}, available {available}")]
    InsufficientShares { requested: U256, available: U256 },

    #[error("Insufficient allowance: requested {requested}, allowed {allowed}")]
    InsufficientAllowance { requested: U256, allowed: U256 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(&'static str),

    #[error("Invalid recipient: {0:?}")]
    InvalidRecipient(Address),

    #[error("Excessive input amount: required {required}, maximum {maximum}")]
    ExcessiveInputAmount { required: U256, maximum: U256 },

    #[error("Insufficient liquidity minted: minted {minted}, minimum {minimum}")]
    InsufficientLiquidityMinted { minted: U256, minimum: U256 },

    #[error("Insufficient output amount: got {actual}, minimum {minimum}")]
    InsufficientOutputAmount { actual: U256, minimum: U256 },

    #[error("No exchange for asset {0:?}")]
    NoExchangeForAsset(Address),

    #[error("Reentrant call into pool {0:?}")]
    Reentrancy(Address),

    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    #[error("Arithmetic overflow")]
    Overflow,

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ExchangeError>;
