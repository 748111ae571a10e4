//! 恒定乘积计算器
//!
//! 交易所的全部定价与流动性份额计算都在这里完成，纯函数、无状态、无I/O。

use super::types::{Fee, Rounding, Trade, TradeQuote};
use crate::core::types::{ExchangeError, Result};
use ethers::types::U256;

/// 恒定乘积(x * y = k)计算器，手续费从输入侧扣除
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantProductCalculator {
    fee: Fee,
    deposit_rounding: Rounding,
}

impl ConstantProductCalculator {
    /// 创建新的计算器
    pub fn new(fee: Fee, deposit_rounding: Rounding) -> Self {
        Self {
            fee,
            deposit_rounding,
        }
    }

    /// 计算给定输入数量的输出数量
    /// 使用公式: amount_out = (amount_in * num * reserve_out) / (reserve_in * den + amount_in * num)
    pub fn get_input_price(
        &self,
        amount_in: U256,
        reserve_in: U256,
        reserve_out: U256,
    ) -> Result<U256> {
        if amount_in.is_zero() {
            return Err(ExchangeError::InvalidAmount("input amount is zero"));
        }
        if reserve_in.is_zero() || reserve_out.is_zero() {
            return Err(ExchangeError::NotFunded);
        }

        let amount_in_with_fee = amount_in
            .checked_mul(self.fee.numerator_u256())
            .ok_or(ExchangeError::Overflow)?;
        let numerator = amount_in_with_fee
            .checked_mul(reserve_out)
            .ok_or(ExchangeError::Overflow)?;
        let denominator = reserve_in
            .checked_mul(self.fee.denominator_u256())
            .ok_or(ExchangeError::Overflow)?
            .checked_add(amount_in_with_fee)
            .ok_or(ExchangeError::Overflow)?;

        Ok(numerator / denominator)
    }

    /// 计算得到指定输出所需的输入数量
    /// 使用公式: amount_in = (reserve_in * amount_out * den) / ((reserve_out - amount_out) * num) + 1
    pub fn get_output_price(
        &self,
        amount_out: U256,
        reserve_in: U256,
        reserve_out: U256,
    ) -> Result<U256> {
        if amount_out.is_zero() {
            return Err(ExchangeError::InvalidAmount("output amount is zero"));
        }
        if reserve_in.is_zero() || reserve_out.is_zero() {
            return Err(ExchangeError::NotFunded);
        }
        if amount_out >= reserve_out {
            return Err(ExchangeError::InvalidAmount("output amount exceeds reserve"));
        }

        let numerator = reserve_in
            .checked_mul(amount_out)
            .ok_or(ExchangeError::Overflow)?
            .checked_mul(self.fee.denominator_u256())
            .ok_or(ExchangeError::Overflow)?;
        let denominator = (reserve_out - amount_out)
            .checked_mul(self.fee.numerator_u256())
            .ok_or(ExchangeError::Overflow)?;

        (numerator / denominator)
            .checked_add(U256::one())
            .ok_or(ExchangeError::Overflow)
    }

    /// 按交易边界定价并检查滑点
    pub fn quote_trade(&self, trade: Trade, reserve_in: U256, reserve_out: U256) -> Result<TradeQuote> {
        match trade {
            Trade::ExactInput { amount_in, min_out } => {
                if amount_in.is_zero() || min_out.is_zero() {
                    return Err(ExchangeError::InvalidAmount("input and minimum output must be positive"));
                }
                let amount_out = self.get_input_price(amount_in, reserve_in, reserve_out)?;
                if amount_out < min_out {
                    return Err(ExchangeError::InsufficientOutputAmount {
                        actual: amount_out,
                        minimum: min_out,
                    });
                }
                Ok(TradeQuote { amount_in, amount_out })
            }
            Trade::ExactOutput { amount_out, max_in } => {
                if amount_out.is_zero() || max_in.is_zero() {
                    return Err(ExchangeError::InvalidAmount("output and maximum input must be positive"));
                }
                let amount_in = self.get_output_price(amount_out, reserve_in, reserve_out)?;
                if amount_in > max_in {
                    return Err(ExchangeError::ExcessiveInputAmount {
                        required: amount_in,
                        maximum: max_in,
                    });
                }
                Ok(TradeQuote { amount_in, amount_out })
            }
        }
    }

    /// 按当前比例存入 native_in 时需要的资产数量
    pub fn deposit_amount(
        &self,
        native_in: U256,
        native_reserve: U256,
        asset_reserve: U256,
    ) -> Result<U256> {
        mul_div(native_in, asset_reserve, native_reserve, self.deposit_rounding)
    }

    /// 存入 native_in 可以铸造的份额，向下取整
    pub fn shares_for_deposit(
        &self,
        native_in: U256,
        native_reserve: U256,
        total_shares: U256,
    ) -> Result<U256> {
        mul_div(native_in, total_shares, native_reserve, Rounding::Down)
    }

    /// 销毁 shares 份额可以取回的 (原生币, 资产)，均向下取整
    pub fn removal_amounts(
        &self,
        shares: U256,
        native_reserve: U256,
        asset_reserve: U256,
        total_shares: U256,
    ) -> Result<(U256, U256)> {
        let native_out = mul_div(shares, native_reserve, total_shares, Rounding::Down)?;
        let asset_out = mul_div(shares, asset_reserve, total_shares, Rounding::Down)?;
        Ok((native_out, asset_out))
    }

    /// 验证交易后储备乘积没有减少
    pub fn verify_k(before: (U256, U256), after: (U256, U256)) -> bool {
        match (
            before.0.checked_mul(before.1),
            after.0.checked_mul(after.1),
        ) {
            (Some(k_before), Some(k_after)) => k_after >= k_before,
            // 乘积溢出 U256 时比较 512 位结果
            _ => before.0.full_mul(before.1) <= after.0.full_mul(after.1),
        }
    }
}

impl Default for ConstantProductCalculator {
    fn default() -> Self {
        Self::new(Fee::default(), Rounding::Up)
    }
}

/// a * b / d，按指定方向舍入
pub fn mul_div(a: U256, b: U256, d: U256, rounding: Rounding) -> Result<U256> {
    if d.is_zero() {
        return Err(ExchangeError::NotFunded);
    }
    let product = a.checked_mul(b).ok_or(ExchangeError::Overflow)?;
    let (quotient, remainder) = product.div_mod(d);
    match rounding {
        Rounding::Up if !remainder.is_zero() => quotient
            .checked_add(U256::one())
            .ok_or(ExchangeError::Overflow),
        _ => Ok(quotient),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wei(n: u128) -> U256 {
        U256::from(n)
    }

    const ETHER: u128 = 1_000_000_000_000_000_000;

    #[test]
    fn test_get_input_price_basic() {
        let calculator = ConstantProductCalculator::default();
        let out = calculator
            .get_input_price(wei(1000), wei(10000), wei(20000))
            .unwrap();
        assert_eq!(out, wei(1813));
    }

    #[test]
    fn test_get_input_price_observed_scenario() {
        // 1 ETH / 100000 资产的池子，买入 0.1 ETH
        let calculator = ConstantProductCalculator::default();
        let out = calculator
            .get_input_price(wei(ETHER / 10), wei(ETHER), wei(100_000))
            .unwrap();
        assert_eq!(out, wei(9066));
    }

    #[test]
    fn test_get_output_price_inverts_input_price() {
        let calculator = ConstantProductCalculator::default();
        let amount_in = calculator
            .get_output_price(wei(1000), wei(10000), wei(20000))
            .unwrap();
        assert_eq!(amount_in, wei(528));

        // 528 刚好够买到 1000，少 1 就不够
        let out = calculator
            .get_input_price(amount_in, wei(10000), wei(20000))
            .unwrap();
        assert!(out >= wei(1000));
        let short = calculator
            .get_input_price(amount_in - 1, wei(10000), wei(20000))
            .unwrap();
        assert!(short < wei(1000));
    }

    #[test]
    fn test_quote_trade_bounds() {
        let calculator = ConstantProductCalculator::default();
        let (reserve_in, reserve_out) = (wei(ETHER), wei(100_000));

        // 最小输出恰好等于预期输出时成功，多 1 则失败
        let exact = Trade::ExactInput { amount_in: wei(ETHER / 10), min_out: wei(9066) };
        let quote = calculator.quote_trade(exact, reserve_in, reserve_out).unwrap();
        assert_eq!(quote.amount_out, wei(9066));

        let above = Trade::ExactInput { amount_in: wei(ETHER / 10), min_out: wei(9067) };
        assert_eq!(
            calculator.quote_trade(above, reserve_in, reserve_out),
            Err(ExchangeError::InsufficientOutputAmount { actual: wei(9066), minimum: wei(9067) })
        );

        let capped = Trade::ExactOutput { amount_out: wei(1000), max_in: wei(527) };
        assert_eq!(
            calculator.quote_trade(capped, wei(10000), wei(20000)),
            Err(ExchangeError::ExcessiveInputAmount { required: wei(528), maximum: wei(527) })
        );

        let zero_min = Trade::ExactInput { amount_in: wei(1), min_out: U256::zero() };
        assert!(matches!(
            calculator.quote_trade(zero_min, reserve_in, reserve_out),
            Err(ExchangeError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_output_price_rejects_full_reserve() {
        let calculator = ConstantProductCalculator::default();
        let err = calculator
            .get_output_price(wei(20000), wei(10000), wei(20000))
            .unwrap_err();
        assert!(matches!(err, ExchangeError::InvalidAmount(_)));
    }

    #[test]
    fn test_zero_amounts_and_empty_reserves() {
        let calculator = ConstantProductCalculator::default();
        assert!(matches!(
            calculator.get_input_price(U256::zero(), wei(1), wei(1)),
            Err(ExchangeError::InvalidAmount(_))
        ));
        assert_eq!(
            calculator.get_input_price(wei(1), U256::zero(), wei(1)),
            Err(ExchangeError::NotFunded)
        );
    }

    #[test]
    fn test_overflow_is_reported() {
        let calculator = ConstantProductCalculator::default();
        assert_eq!(
            calculator.get_input_price(U256::MAX, wei(1), wei(1)),
            Err(ExchangeError::Overflow)
        );
    }

    #[test]
    fn test_deposit_rounding_modes() {
        let up = ConstantProductCalculator::new(Fee::default(), Rounding::Up);
        let down = ConstantProductCalculator::new(Fee::default(), Rounding::Down);
        // 10 * 7 / 3 = 23.33
        assert_eq!(up.deposit_amount(wei(10), wei(3), wei(7)).unwrap(), wei(24));
        assert_eq!(down.deposit_amount(wei(10), wei(3), wei(7)).unwrap(), wei(23));
        // 整除时两种模式一致
        assert_eq!(up.deposit_amount(wei(6), wei(3), wei(7)).unwrap(), wei(14));
    }

    #[test]
    fn test_shares_and_removal_round_down() {
        let calculator = ConstantProductCalculator::default();
        assert_eq!(
            calculator.shares_for_deposit(wei(10), wei(3), wei(7)).unwrap(),
            wei(23)
        );
        let (native_out, asset_out) = calculator
            .removal_amounts(wei(1), wei(10), wei(7), wei(3))
            .unwrap();
        assert_eq!((native_out, asset_out), (wei(3), wei(2)));
    }

    #[test]
    fn test_k_constant_verification() {
        let calculator = ConstantProductCalculator::default();
        let (reserve_in, reserve_out) = (wei(10000), wei(20000));
        let amount_in = wei(1000);
        let amount_out = calculator
            .get_input_price(amount_in, reserve_in, reserve_out)
            .unwrap();

        assert!(ConstantProductCalculator::verify_k(
            (reserve_in, reserve_out),
            (reserve_in + amount_in, reserve_out - amount_out),
        ));
        assert!(!ConstantProductCalculator::verify_k(
            (reserve_in, reserve_out),
            (reserve_in, reserve_out - 1),
        ));
    }
}
