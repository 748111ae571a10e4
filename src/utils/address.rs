//! 地址工具函数

use crate::core::types::{ExchangeError, Result, NATIVE_CURRENCY};
use ethers::types::Address;
use std::str::FromStr;

/// 解析地址字符串
pub fn parse_address(addr_str: &str) -> Result<Address> {
    Address::from_str(addr_str.trim())
        .map_err(|_| ExchangeError::Config(format!("invalid address: {}", addr_str)))
}

/// 检查地址是否为零地址
pub fn is_zero_address(addr: &Address) -> bool {
    addr.is_zero()
}

/// 能否作为交易所的交易资产：非零地址且不是原生币标识
pub fn is_tradable_asset(addr: &Address) -> bool {
    !addr.is_zero() && *addr != NATIVE_CURRENCY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert!(parse_address("0x1234567890123456789012345678901234567890").is_ok());
        assert!(parse_address("invalid_address").is_err());
    }

    #[test]
    fn test_tradable_asset() {
        assert!(is_zero_address(&Address::zero()));
        assert!(!is_tradable_asset(&Address::zero()));
        assert!(!is_tradable_asset(&NATIVE_CURRENCY));
        assert!(is_tradable_asset(&Address::from_low_u64_be(7)));
    }
}
