//! 流动性池
//!
//! 一个池子对应一种资产，持有原生币和资产两侧储备，发行流动性份额，
//! 所有交易按恒定乘积定价。
//!
//! 状态机只有两个状态：Empty (份额为 0) 和 Funded (份额大于 0)。
//! 只有 `add_liquidity` 能离开 Empty，其余操作在 Empty 状态下返回 `NotFunded`。
//!
//! 每个修改状态的入口都先获取池级重入锁，外部转账通过 `Settlement` 记录，
//! 全部成功后才写入池状态，任何一步失败都会回滚已经发生的转账。

use super::guard::ReentrancyGuard;
use super::registry::ExchangeRegistry;
use super::settlement::Settlement;
use super::shares::ShareLedger;
use crate::amm::{ConstantProductCalculator, Trade, TradeQuote};
use crate::core::types::{Call, ExchangeError, PoolSnapshot, Result};
use crate::ledger::{AssetLedger, NativeLedger};
use crate::utils::address::is_zero_address;
use crate::utils::time::Clock;
use ethers::types::{Address, U256};
use log::{debug, warn};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

#[derive(Debug, Default)]
struct PoolState {
    native_reserve: U256,
    shares: ShareLedger,
}

/// 一次计算开始时读取的储备
#[derive(Debug, Clone, Copy)]
struct Reserves {
    native: U256,
    asset: U256,
    shares: U256,
}

/// 资产换资产的两种边界
#[derive(Debug, Clone, Copy)]
enum Route {
    ExactInput {
        tokens_sold: U256,
        min_tokens_bought: U256,
        min_eth_bought: U256,
    },
    ExactOutput {
        tokens_bought: U256,
        max_tokens_sold: U256,
        max_eth_sold: U256,
    },
}

pub struct LiquidityPool {
    address: Address,
    asset: Arc<dyn AssetLedger>,
    native: Arc<dyn NativeLedger>,
    registry: Weak<ExchangeRegistry>,
    clock: Arc<dyn Clock>,
    calculator: ConstantProductCalculator,
    guard: ReentrancyGuard,
    state: RwLock<PoolState>,
}

impl LiquidityPool {
    pub(crate) fn new(
        address: Address,
        asset: Arc<dyn AssetLedger>,
        native: Arc<dyn NativeLedger>,
        registry: Weak<ExchangeRegistry>,
        clock: Arc<dyn Clock>,
        calculator: ConstantProductCalculator,
    ) -> Self {
        Self {
            address,
            asset,
            native,
            registry,
            clock,
            calculator,
            guard: ReentrancyGuard::new(address),
            state: RwLock::new(PoolState::default()),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// 交易资产的标识
    pub fn asset(&self) -> Address {
        self.asset.address()
    }

    pub fn native_reserve(&self) -> U256 {
        self.state().native_reserve
    }

    /// 资产储备以账本余额为准
    pub fn asset_reserve(&self) -> U256 {
        self.asset.balance_of(self.address)
    }

    pub fn is_funded(&self) -> bool {
        !self.state().shares.total_supply().is_zero()
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let (native_reserve, total_shares) = {
            let state = self.state();
            (state.native_reserve, state.shares.total_supply())
        };
        PoolSnapshot {
            address: self.address,
            asset: self.asset(),
            native_reserve,
            asset_reserve: self.asset_reserve(),
            total_shares,
        }
    }

    // ---- 流动性份额(代币语义) ----

    pub fn total_supply(&self) -> U256 {
        self.state().shares.total_supply()
    }

    pub fn balance_of(&self, account: Address) -> U256 {
        self.state().shares.balance_of(account)
    }

    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.state().shares.allowance(owner, spender)
    }

    pub fn transfer(&self, sender: Address, to: Address, amount: U256) -> Result<()> {
        let _token = self.guard.enter()?;
        self.state_mut().shares.transfer(sender, to, amount)
    }

    pub fn approve(&self, owner: Address, spender: Address, amount: U256) -> Result<()> {
        let _token = self.guard.enter()?;
        self.state_mut().shares.approve(owner, spender, amount);
        Ok(())
    }

    pub fn transfer_from(
        &self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<()> {
        let _token = self.guard.enter()?;
        self.state_mut()
            .shares
            .transfer_from(spender, from, to, amount)
    }

    // ---- 价格查询 ----

    pub fn get_eth_to_token_input_price(&self, eth_sold: U256) -> Result<U256> {
        let reserves = self.funded_reserves()?;
        self.calculator
            .get_input_price(eth_sold, reserves.native, reserves.asset)
    }

    pub fn get_eth_to_token_output_price(&self, tokens_bought: U256) -> Result<U256> {
        let reserves = self.funded_reserves()?;
        self.calculator
            .get_output_price(tokens_bought, reserves.native, reserves.asset)
    }

    pub fn get_token_to_eth_input_price(&self, tokens_sold: U256) -> Result<U256> {
        let reserves = self.funded_reserves()?;
        self.calculator
            .get_input_price(tokens_sold, reserves.asset, reserves.native)
    }

    pub fn get_token_to_eth_output_price(&self, eth_bought: U256) -> Result<U256> {
        let reserves = self.funded_reserves()?;
        self.calculator
            .get_output_price(eth_bought, reserves.asset, reserves.native)
    }

    // ---- 流动性 ----

    /// 存入 `call.value` 原生币和相应资产，返回铸造的份额。
    ///
    /// 空池时 `max_asset_in` 原样作为初始存入量并确定价格，份额数等于原生币数量；
    /// 否则按当前比例计算所需资产(向上取整)并按比例铸造份额(向下取整)。
    pub fn add_liquidity(
        &self,
        call: Call,
        min_shares: U256,
        max_asset_in: U256,
        deadline: u64,
    ) -> Result<U256> {
        self.add_liquidity_inner(call, min_shares, max_asset_in, deadline)
            .inspect_err(|e| warn!("池 {:?} add_liquidity 失败: {}", self.address, e))
    }

    fn add_liquidity_inner(
        &self,
        call: Call,
        min_shares: U256,
        max_asset_in: U256,
        deadline: u64,
    ) -> Result<U256> {
        let _token = self.guard.enter()?;
        self.check_deadline(deadline)?;
        if call.value.is_zero() {
            return Err(ExchangeError::InvalidAmount("native deposit is zero"));
        }
        if max_asset_in.is_zero() {
            return Err(ExchangeError::InvalidAmount("asset deposit is zero"));
        }

        let reserves = self.reserves();
        let (asset_in, minted) = if reserves.shares.is_zero() {
            (max_asset_in, call.value)
        } else {
            let asset_in =
                self.calculator
                    .deposit_amount(call.value, reserves.native, reserves.asset)?;
            if asset_in > max_asset_in {
                return Err(ExchangeError::ExcessiveInputAmount {
                    required: asset_in,
                    maximum: max_asset_in,
                });
            }
            let minted = self.calculator.shares_for_deposit(
                call.value,
                reserves.native,
                reserves.shares,
            )?;
            if minted.is_zero() {
                return Err(ExchangeError::InvalidAmount("deposit too small to mint shares"));
            }
            if minted < min_shares {
                return Err(ExchangeError::InsufficientLiquidityMinted {
                    minted,
                    minimum: min_shares,
                });
            }
            (asset_in, minted)
        };

        let native_reserve = reserves
            .native
            .checked_add(call.value)
            .ok_or(ExchangeError::Overflow)?;
        reserves
            .shares
            .checked_add(minted)
            .ok_or(ExchangeError::Overflow)?;

        let mut settlement = Settlement::new(Arc::clone(&self.native));
        settlement.move_native(call.sender, self.address, call.value)?;
        settlement.pull_asset(&self.asset, self.address, call.sender, asset_in)?;

        {
            let mut state = self.state_mut();
            state.shares.mint(call.sender, minted)?;
            state.native_reserve = native_reserve;
        }
        settlement.commit();

        debug!(
            "池 {:?} 添加流动性: {} wei + {} 资产, 铸造 {} 份额给 {:?}",
            self.address, call.value, asset_in, minted, call.sender
        );
        Ok(minted)
    }

    /// 销毁份额，按比例取回 (原生币, 资产)。份额归零后池子回到 Empty 状态
    pub fn remove_liquidity(
        &self,
        sender: Address,
        shares_in: U256,
        min_native_out: U256,
        min_asset_out: U256,
        deadline: u64,
    ) -> Result<(U256, U256)> {
        self.remove_liquidity_inner(sender, shares_in, min_native_out, min_asset_out, deadline)
            .inspect_err(|e| warn!("池 {:?} remove_liquidity 失败: {}", self.address, e))
    }

    fn remove_liquidity_inner(
        &self,
        sender: Address,
        shares_in: U256,
        min_native_out: U256,
        min_asset_out: U256,
        deadline: u64,
    ) -> Result<(U256, U256)> {
        let _token = self.guard.enter()?;
        self.check_deadline(deadline)?;
        if shares_in.is_zero() {
            return Err(ExchangeError::InvalidAmount("shares to burn is zero"));
        }

        let reserves = self.funded_reserves()?;
        let owned = self.balance_of(sender);
        if owned < shares_in {
            return Err(ExchangeError::InsufficientShares {
                requested: shares_in,
                available: owned,
            });
        }

        let (native_out, asset_out) = self.calculator.removal_amounts(
            shares_in,
            reserves.native,
            reserves.asset,
            reserves.shares,
        )?;
        if native_out < min_native_out {
            return Err(ExchangeError::InsufficientOutputAmount {
                actual: native_out,
                minimum: min_native_out,
            });
        }
        if asset_out < min_asset_out {
            return Err(ExchangeError::InsufficientOutputAmount {
                actual: asset_out,
                minimum: min_asset_out,
            });
        }

        let mut settlement = Settlement::new(Arc::clone(&self.native));
        settlement.move_native(self.address, sender, native_out)?;
        settlement.push_asset(&self.asset, self.address, sender, asset_out)?;

        {
            let mut state = self.state_mut();
            state.shares.burn(sender, shares_in)?;
            state.native_reserve = reserves.native - native_out;
        }
        settlement.commit();

        debug!(
            "池 {:?} 移除流动性: 销毁 {} 份额, 取回 {} wei + {} 资产",
            self.address, shares_in, native_out, asset_out
        );
        Ok((native_out, asset_out))
    }

    // ---- 原生币 → 资产 ----

    /// 卖出全部 `call.value`，返回买到的资产数量
    pub fn eth_to_token_swap_input(
        &self,
        call: Call,
        min_tokens: U256,
        deadline: u64,
    ) -> Result<U256> {
        self.eth_to_token_transfer_input(call, min_tokens, deadline, call.sender)
    }

    pub fn eth_to_token_transfer_input(
        &self,
        call: Call,
        min_tokens: U256,
        deadline: u64,
        recipient: Address,
    ) -> Result<U256> {
        let trade = Trade::ExactInput {
            amount_in: call.value,
            min_out: min_tokens,
        };
        self.eth_to_token(call.sender, recipient, trade, deadline)
            .map(|quote| quote.amount_out)
    }

    /// 买入确定数量的资产，`call.value` 是愿意付出的上限，只扣除实际价格。返回付出的原生币
    pub fn eth_to_token_swap_output(
        &self,
        call: Call,
        tokens_bought: U256,
        deadline: u64,
    ) -> Result<U256> {
        self.eth_to_token_transfer_output(call, tokens_bought, deadline, call.sender)
    }

    pub fn eth_to_token_transfer_output(
        &self,
        call: Call,
        tokens_bought: U256,
        deadline: u64,
        recipient: Address,
    ) -> Result<U256> {
        let trade = Trade::ExactOutput {
            amount_out: tokens_bought,
            max_in: call.value,
        };
        self.eth_to_token(call.sender, recipient, trade, deadline)
            .map(|quote| quote.amount_in)
    }

    fn eth_to_token(
        &self,
        buyer: Address,
        recipient: Address,
        trade: Trade,
        deadline: u64,
    ) -> Result<TradeQuote> {
        self.eth_to_token_inner(buyer, recipient, trade, deadline)
            .inspect_err(|e| warn!("池 {:?} 原生币→资产 失败: {}", self.address, e))
    }

    fn eth_to_token_inner(
        &self,
        buyer: Address,
        recipient: Address,
        trade: Trade,
        deadline: u64,
    ) -> Result<TradeQuote> {
        let _token = self.guard.enter()?;
        self.check_deadline(deadline)?;
        self.check_recipient(recipient)?;

        let reserves = self.funded_reserves()?;
        let quote = self
            .calculator
            .quote_trade(trade, reserves.native, reserves.asset)?;
        let native_reserve = reserves
            .native
            .checked_add(quote.amount_in)
            .ok_or(ExchangeError::Overflow)?;

        let mut settlement = Settlement::new(Arc::clone(&self.native));
        settlement.move_native(buyer, self.address, quote.amount_in)?;
        settlement.push_asset(&self.asset, self.address, recipient, quote.amount_out)?;

        self.state_mut().native_reserve = native_reserve;
        settlement.commit();

        debug!(
            "池 {:?} 原生币→资产: {} wei → {} 资产, 接收者 {:?}",
            self.address, quote.amount_in, quote.amount_out, recipient
        );
        Ok(quote)
    }

    // ---- 资产 → 原生币 ----

    /// 卖出 `tokens_sold` 资产，返回得到的原生币
    pub fn token_to_eth_swap_input(
        &self,
        sender: Address,
        tokens_sold: U256,
        min_eth: U256,
        deadline: u64,
    ) -> Result<U256> {
        self.token_to_eth_transfer_input(sender, tokens_sold, min_eth, deadline, sender)
    }

    pub fn token_to_eth_transfer_input(
        &self,
        sender: Address,
        tokens_sold: U256,
        min_eth: U256,
        deadline: u64,
        recipient: Address,
    ) -> Result<U256> {
        let trade = Trade::ExactInput {
            amount_in: tokens_sold,
            min_out: min_eth,
        };
        self.token_to_eth(sender, recipient, trade, deadline)
            .map(|quote| quote.amount_out)
    }

    /// 买入确定数量的原生币，返回卖出的资产数量
    pub fn token_to_eth_swap_output(
        &self,
        sender: Address,
        eth_bought: U256,
        max_tokens: U256,
        deadline: u64,
    ) -> Result<U256> {
        self.token_to_eth_transfer_output(sender, eth_bought, max_tokens, deadline, sender)
    }

    pub fn token_to_eth_transfer_output(
        &self,
        sender: Address,
        eth_bought: U256,
        max_tokens: U256,
        deadline: u64,
        recipient: Address,
    ) -> Result<U256> {
        let trade = Trade::ExactOutput {
            amount_out: eth_bought,
            max_in: max_tokens,
        };
        self.token_to_eth(sender, recipient, trade, deadline)
            .map(|quote| quote.amount_in)
    }

    fn token_to_eth(
        &self,
        seller: Address,
        recipient: Address,
        trade: Trade,
        deadline: u64,
    ) -> Result<TradeQuote> {
        self.token_to_eth_inner(seller, recipient, trade, deadline)
            .inspect_err(|e| warn!("池 {:?} 资产→原生币 失败: {}", self.address, e))
    }

    fn token_to_eth_inner(
        &self,
        seller: Address,
        recipient: Address,
        trade: Trade,
        deadline: u64,
    ) -> Result<TradeQuote> {
        let _token = self.guard.enter()?;
        self.check_deadline(deadline)?;
        self.check_recipient(recipient)?;

        let reserves = self.funded_reserves()?;
        let quote = self
            .calculator
            .quote_trade(trade, reserves.asset, reserves.native)?;
        let native_reserve = reserves
            .native
            .checked_sub(quote.amount_out)
            .ok_or(ExchangeError::Overflow)?;

        let mut settlement = Settlement::new(Arc::clone(&self.native));
        settlement.pull_asset(&self.asset, self.address, seller, quote.amount_in)?;
        settlement.move_native(self.address, recipient, quote.amount_out)?;

        self.state_mut().native_reserve = native_reserve;
        settlement.commit();

        debug!(
            "池 {:?} 资产→原生币: {} 资产 → {} wei, 接收者 {:?}",
            self.address, quote.amount_in, quote.amount_out, recipient
        );
        Ok(quote)
    }

    // ---- 资产 → 资产(经由原生币) ----

    /// 卖出本池资产，经原生币买入 `other_asset`，返回买到的数量
    pub fn token_to_token_swap_input(
        &self,
        sender: Address,
        tokens_sold: U256,
        min_tokens_bought: U256,
        min_eth_bought: U256,
        deadline: u64,
        other_asset: Address,
    ) -> Result<U256> {
        self.token_to_token_transfer_input(
            sender,
            tokens_sold,
            min_tokens_bought,
            min_eth_bought,
            deadline,
            sender,
            other_asset,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn token_to_token_transfer_input(
        &self,
        sender: Address,
        tokens_sold: U256,
        min_tokens_bought: U256,
        min_eth_bought: U256,
        deadline: u64,
        recipient: Address,
        other_asset: Address,
    ) -> Result<U256> {
        let route = Route::ExactInput {
            tokens_sold,
            min_tokens_bought,
            min_eth_bought,
        };
        self.token_to_token(sender, recipient, other_asset, route, deadline)
            .map(|(_, tokens_bought)| tokens_bought)
    }

    /// 买入确定数量的 `other_asset`，返回卖出的本池资产数量
    pub fn token_to_token_swap_output(
        &self,
        sender: Address,
        tokens_bought: U256,
        max_tokens_sold: U256,
        max_eth_sold: U256,
        deadline: u64,
        other_asset: Address,
    ) -> Result<U256> {
        self.token_to_token_transfer_output(
            sender,
            tokens_bought,
            max_tokens_sold,
            max_eth_sold,
            deadline,
            sender,
            other_asset,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn token_to_token_transfer_output(
        &self,
        sender: Address,
        tokens_bought: U256,
        max_tokens_sold: U256,
        max_eth_sold: U256,
        deadline: u64,
        recipient: Address,
        other_asset: Address,
    ) -> Result<U256> {
        let route = Route::ExactOutput {
            tokens_bought,
            max_tokens_sold,
            max_eth_sold,
        };
        self.token_to_token(sender, recipient, other_asset, route, deadline)
            .map(|(tokens_sold, _)| tokens_sold)
    }

    fn token_to_token(
        &self,
        seller: Address,
        recipient: Address,
        other_asset: Address,
        route: Route,
        deadline: u64,
    ) -> Result<(U256, U256)> {
        self.token_to_token_inner(seller, recipient, other_asset, route, deadline)
            .inspect_err(|e| warn!("池 {:?} 资产→资产 失败: {}", self.address, e))
    }

    /// 两段交易：本池 资产→原生币，目标池 原生币→资产。
    /// 锁顺序固定为先本池后目标池，目标池不会是本池，因此不存在环。
    fn token_to_token_inner(
        &self,
        seller: Address,
        recipient: Address,
        other_asset: Address,
        route: Route,
        deadline: u64,
    ) -> Result<(U256, U256)> {
        let _token = self.guard.enter()?;
        self.check_deadline(deadline)?;
        self.check_recipient(recipient)?;
        if other_asset == self.asset() {
            return Err(ExchangeError::InvalidAsset(other_asset));
        }

        let other = self
            .registry
            .upgrade()
            .and_then(|registry| registry.get_exchange(other_asset))
            .ok_or(ExchangeError::NoExchangeForAsset(other_asset))?;
        other.check_recipient(recipient)?;
        let _other_token = other.guard.enter()?;

        let mine = self.funded_reserves()?;
        let theirs = other.funded_reserves()?;

        let (sell_leg, buy_leg) = match route {
            Route::ExactInput {
                tokens_sold,
                min_tokens_bought,
                min_eth_bought,
            } => {
                let sell_leg = self.calculator.quote_trade(
                    Trade::ExactInput {
                        amount_in: tokens_sold,
                        min_out: min_eth_bought,
                    },
                    mine.asset,
                    mine.native,
                )?;
                let buy_leg = other.calculator.quote_trade(
                    Trade::ExactInput {
                        amount_in: sell_leg.amount_out,
                        min_out: min_tokens_bought,
                    },
                    theirs.native,
                    theirs.asset,
                )?;
                (sell_leg, buy_leg)
            }
            Route::ExactOutput {
                tokens_bought,
                max_tokens_sold,
                max_eth_sold,
            } => {
                let buy_leg = other.calculator.quote_trade(
                    Trade::ExactOutput {
                        amount_out: tokens_bought,
                        max_in: max_eth_sold,
                    },
                    theirs.native,
                    theirs.asset,
                )?;
                let sell_leg = self.calculator.quote_trade(
                    Trade::ExactOutput {
                        amount_out: buy_leg.amount_in,
                        max_in: max_tokens_sold,
                    },
                    mine.asset,
                    mine.native,
                )?;
                (sell_leg, buy_leg)
            }
        };

        let eth_moved = sell_leg.amount_out;
        let my_native = mine
            .native
            .checked_sub(eth_moved)
            .ok_or(ExchangeError::Overflow)?;
        let their_native = theirs
            .native
            .checked_add(eth_moved)
            .ok_or(ExchangeError::Overflow)?;

        let mut settlement = Settlement::new(Arc::clone(&self.native));
        settlement.pull_asset(&self.asset, self.address, seller, sell_leg.amount_in)?;
        settlement.move_native(self.address, other.address, eth_moved)?;
        settlement.push_asset(&other.asset, other.address, recipient, buy_leg.amount_out)?;

        self.state_mut().native_reserve = my_native;
        other.state_mut().native_reserve = their_native;
        settlement.commit();

        debug!(
            "池 {:?} 资产→资产: {} 资产 → {} wei → {} {:?}, 接收者 {:?}",
            self.address,
            sell_leg.amount_in,
            eth_moved,
            buy_leg.amount_out,
            other_asset,
            recipient
        );
        Ok((sell_leg.amount_in, buy_leg.amount_out))
    }

    // ---- 内部 ----

    fn state(&self) -> RwLockReadGuard<'_, PoolState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn state_mut(&self) -> RwLockWriteGuard<'_, PoolState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn reserves(&self) -> Reserves {
        let (native, shares) = {
            let state = self.state();
            (state.native_reserve, state.shares.total_supply())
        };
        Reserves {
            native,
            asset: self.asset_reserve(),
            shares,
        }
    }

    fn funded_reserves(&self) -> Result<Reserves> {
        let reserves = self.reserves();
        if reserves.shares.is_zero() {
            return Err(ExchangeError::NotFunded);
        }
        Ok(reserves)
    }

    fn check_deadline(&self, deadline: u64) -> Result<()> {
        let now = self.clock.now();
        if now > deadline {
            return Err(ExchangeError::Expired { deadline, now });
        }
        Ok(())
    }

    fn check_recipient(&self, recipient: Address) -> Result<()> {
        if is_zero_address(&recipient) || recipient == self.address {
            return Err(ExchangeError::InvalidRecipient(recipient));
        }
        Ok(())
    }
}

impl std::fmt::Debug for LiquidityPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiquidityPool")
            .field("address", &self.address)
            .field("asset", &self.asset())
            .field("native_reserve", &self.native_reserve())
            .field("total_shares", &self.total_supply())
            .field("locked", &self.guard.is_locked())
            .finish()
    }
}
