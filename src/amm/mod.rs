//! AMM计算模块
//!
//! 恒定乘积定价、流动性份额与舍入规则

pub mod calculator;
pub mod types;

pub use calculator::*;
pub use types::*;
