//! 交易所模块
//!
//! 注册表按资产管理流动性池，池子实现原生币/资产的恒定乘积市场

pub mod guard;
pub mod pool;
pub mod registry;
pub mod settlement;
pub mod shares;


pub use guard::{GuardToken, ReentrancyGuard};
pub use pool::LiquidityPool;
pub use registry::ExchangeRegistry;
pub use settlement::Settlement;
pub use shares::ShareLedger;
