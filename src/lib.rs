//! 恒定乘积兑换协议
//!
//! 注册表为每种资产创建一个原生币/资产流动性池，池子按 x * y = k 定价，
//! 收取输入侧手续费，并向流动性提供者发行份额。

pub mod amm;
pub mod config;
pub mod core;
pub mod exchange;
pub mod ledger;
pub mod utils;

pub use crate::amm::{ConstantProductCalculator, Fee, Rounding, Trade, TradeQuote};
pub use crate::config::{ConfigManager, ExchangeConfig};
pub use crate::core::types::{Call, ExchangeError, PoolSnapshot, Result, NATIVE_CURRENCY};
pub use crate::exchange::{ExchangeRegistry, LiquidityPool};
pub use crate::ledger::{AssetLedger, InMemoryAssetLedger, InMemoryNativeLedger, NativeLedger};
