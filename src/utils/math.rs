//! 数值计算工具

use crate::core::types::{ExchangeError, Result};
use ethers::types::U256;
use ethers::utils::{format_ether, parse_ether};

/// 解析以 ether 表示的数量("0.1" → 10^17 wei)
pub fn ether_to_wei(ether: &str) -> Result<U256> {
    parse_ether(ether).map_err(|e| ExchangeError::Config(format!("invalid ether amount {}: {}", ether, e)))
}

/// 将Wei格式化为Ether字符串，用于显示
pub fn wei_to_ether_string(wei: U256) -> String {
    format_ether(wei)
}

/// 解析十进制整数数量
pub fn parse_amount(value: &str) -> Result<U256> {
    U256::from_dec_str(value.trim())
        .map_err(|_| ExchangeError::Config(format!("invalid amount: {}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ether_to_wei() {
        assert_eq!(
            ether_to_wei("0.1").unwrap(),
            U256::from(100_000_000_000_000_000u64)
        );
        assert_eq!(
            ether_to_wei("1").unwrap(),
            U256::from(1_000_000_000_000_000_000u64)
        );
        assert!(ether_to_wei("abc").is_err());
    }

    #[test]
    fn test_wei_to_ether_string() {
        let formatted = wei_to_ether_string(U256::from(1_500_000_000_000_000_000u64));
        assert!(formatted.starts_with("1.5"));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(" 100000 ").unwrap(), U256::from(100_000u64));
        assert!(matches!(parse_amount("-1"), Err(ExchangeError::Config(_))));
    }
}
