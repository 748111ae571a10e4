//! AMM计算相关类型定义

use ethers::types::U256;
use serde::{Deserialize, Serialize};

/// 整数除法的舍入方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rounding {
    Up,
    Down,
}

impl std::str::FromStr for Rounding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "ceil" => Ok(Self::Up),
            "down" | "floor" => Ok(Self::Down),
            other => Err(format!("unknown rounding mode: {}", other)),
        }
    }
}

/// 手续费：输入中实际参与定价的比例 numerator / denominator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub numerator: u32,
    pub denominator: u32,
}

impl Default for Fee {
    fn default() -> Self {
        // 0.3%
        Self {
            numerator: 997,
            denominator: 1000,
        }
    }
}

impl Fee {
    pub fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.denominator > 0 && self.numerator > 0 && self.numerator <= self.denominator
    }

    /// 手续费基点(如30 = 0.3%)，仅用于展示
    pub fn fee_bps(&self) -> f64 {
        if self.denominator == 0 {
            return 0.0;
        }
        (self.denominator - self.numerator.min(self.denominator)) as f64 * 10000.0
            / self.denominator as f64
    }

    pub(crate) fn numerator_u256(&self) -> U256 {
        U256::from(self.numerator)
    }

    pub(crate) fn denominator_u256(&self) -> U256 {
        U256::from(self.denominator)
    }
}

/// 交易的边界条件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trade {
    /// 卖出确定数量，要求至少得到 min_out
    ExactInput { amount_in: U256, min_out: U256 },
    /// 买入确定数量，最多付出 max_in
    ExactOutput { amount_out: U256, max_in: U256 },
}

/// 定价结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeQuote {
    pub amount_in: U256,
    pub amount_out: U256,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounding_from_str() {
        assert_eq!("up".parse::<Rounding>(), Ok(Rounding::Up));
        assert_eq!(" CEIL ".parse::<Rounding>(), Ok(Rounding::Up));
        assert_eq!("floor".parse::<Rounding>(), Ok(Rounding::Down));
        assert!("sideways".parse::<Rounding>().is_err());
    }

    #[test]
    fn test_fee_validation() {
        assert!(Fee::default().is_valid());
        assert!(Fee::new(1000, 1000).is_valid());
        assert!(!Fee::new(0, 1000).is_valid());
        assert!(!Fee::new(1001, 1000).is_valid());
        assert!(!Fee::new(1, 0).is_valid());
        assert!((Fee::default().fee_bps() - 30.0).abs() < 1e-9);
    }
}
