use crate::amm::{ConstantProductCalculator, Fee, Rounding};
use crate::core::types::{ExchangeError, Result};
use crate::utils::address::{is_zero_address, parse_address};
use ethers::types::{Address, H160};
use serde::{Deserialize, Serialize};
use std::env;

/// 注册表的默认地址 0x00000000000000000000000000000000000f4c70
pub const DEFAULT_REGISTRY_ADDRESS: Address = H160([
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0x0f, 0x4c, 0x70,
]);

/// 交易所配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// 输入中参与定价的比例分子 (997 表示收取 0.3%)
    pub fee_numerator: u32,
    /// 比例分母
    pub fee_denominator: u32,
    /// 已有流动性时追加存入的资产数量的舍入方向
    pub deposit_rounding: Rounding,
    /// 注册表地址，池地址由它推导
    pub registry_address: Address,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        let fee = Fee::default();
        Self {
            fee_numerator: fee.numerator,
            fee_denominator: fee.denominator,
            deposit_rounding: Rounding::Up,
            registry_address: DEFAULT_REGISTRY_ADDRESS,
        }
    }
}

impl ExchangeConfig {
    pub fn fee(&self) -> Fee {
        Fee::new(self.fee_numerator, self.fee_denominator)
    }

    pub fn calculator(&self) -> ConstantProductCalculator {
        ConstantProductCalculator::new(self.fee(), self.deposit_rounding)
    }
}

/// 配置管理器
pub struct ConfigManager;

impl ConfigManager {
    /// 从环境变量加载配置
    pub fn load_from_env() -> Result<ExchangeConfig> {
        dotenv::dotenv().ok(); // 加载.env文件，如果存在的话

        Self::load_with(|key| env::var(key).ok())
    }

    /// 从任意键值来源加载配置，未设置的键使用默认值
    pub fn load_with<F>(lookup: F) -> Result<ExchangeConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ExchangeConfig::default();

        if let Some(numerator) = lookup("FEE_NUMERATOR") {
            config.fee_numerator = numerator
                .trim()
                .parse()
                .map_err(|_| ExchangeError::Config("Invalid FEE_NUMERATOR".to_string()))?;
        }

        if let Some(denominator) = lookup("FEE_DENOMINATOR") {
            config.fee_denominator = denominator
                .trim()
                .parse()
                .map_err(|_| ExchangeError::Config("Invalid FEE_DENOMINATOR".to_string()))?;
        }

        if let Some(rounding) = lookup("DEPOSIT_ROUNDING") {
            config.deposit_rounding = rounding.parse().map_err(ExchangeError::Config)?;
        }

        if let Some(address) = lookup("REGISTRY_ADDRESS") {
            config.registry_address = parse_address(&address)?;
        }

        Self::validate_config(&config)?;

        Ok(config)
    }

    /// 验证配置的有效性
    pub fn validate_config(config: &ExchangeConfig) -> Result<()> {
        if config.fee_denominator == 0 {
            return Err(ExchangeError::Config(
                "fee_denominator cannot be zero".to_string(),
            ));
        }

        if !config.fee().is_valid() {
            return Err(ExchangeError::Config(format!(
                "fee_numerator must be in 1..={}, got {}",
                config.fee_denominator, config.fee_numerator
            )));
        }

        if is_zero_address(&config.registry_address) {
            return Err(ExchangeError::Config(
                "registry_address cannot be the zero address".to_string(),
            ));
        }

        Ok(())
    }

    /// 打印配置摘要
    pub fn print_config_summary(config: &ExchangeConfig) {
        log::info!("=== 配置摘要 ===");
        log::info!(
            "手续费: {}/{} ({}%)",
            config.fee_numerator,
            config.fee_denominator,
            config.fee().fee_bps() / 100.0
        );
        log::info!("存入舍入: {:?}", config.deposit_rounding);
        log::info!("注册表地址: {:?}", config.registry_address);
        log::info!("==================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<ExchangeConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ConfigManager::load_with(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config, ExchangeConfig::default());
        assert_eq!(config.fee(), Fee::new(997, 1000));
        assert_eq!(config.deposit_rounding, Rounding::Up);
        assert_eq!(config.registry_address, DEFAULT_REGISTRY_ADDRESS);
        assert_eq!(
            DEFAULT_REGISTRY_ADDRESS,
            parse_address("0x00000000000000000000000000000000000f4c70").unwrap()
        );
        assert_eq!(DEFAULT_REGISTRY_ADDRESS, Address::from_low_u64_be(0xf4c70));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("FEE_NUMERATOR", "9975"),
            ("FEE_DENOMINATOR", "10000"),
            ("DEPOSIT_ROUNDING", "down"),
            ("REGISTRY_ADDRESS", "0x1234567890123456789012345678901234567890"),
        ])
        .unwrap();
        assert_eq!(config.fee(), Fee::new(9975, 10000));
        assert_eq!(config.deposit_rounding, Rounding::Down);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            load(&[("FEE_NUMERATOR", "abc")]),
            Err(ExchangeError::Config(_))
        ));
        assert!(matches!(
            load(&[("FEE_NUMERATOR", "1001")]),
            Err(ExchangeError::Config(_))
        ));
        assert!(matches!(
            load(&[("FEE_DENOMINATOR", "0")]),
            Err(ExchangeError::Config(_))
        ));
        assert!(matches!(
            load(&[("DEPOSIT_ROUNDING", "sideways")]),
            Err(ExchangeError::Config(_))
        ));
        assert!(matches!(
            load(&[(
                "REGISTRY_ADDRESS",
                "0x0000000000000000000000000000000000000000"
            )]),
            Err(ExchangeError::Config(_))
        ));
    }
}
