//! 交易所注册表
//!
//! 每种资产最多一个池子，创建后不可替换也不会删除。检查与写入在同一个写锁内完成，
//! 并发创建同一资产时只有一个调用成功。

use super::pool::LiquidityPool;
use crate::config::ExchangeConfig;
use crate::core::types::{ExchangeError, Result};
use crate::ledger::{AssetLedger, NativeLedger};
use crate::utils::address::is_tradable_asset;
use crate::utils::time::Clock;
use ethers::types::Address;
use ethers::utils::get_contract_address;
use log::{info, warn};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, Weak};

#[derive(Default)]
struct RegistryState {
    /// 资产 → 池
    pools: HashMap<Address, Arc<LiquidityPool>>,
    /// 池地址 → 资产
    assets_by_pool: HashMap<Address, Address>,
    /// 按创建顺序排列的资产，id 从 1 开始
    assets_by_id: Vec<Address>,
}

pub struct ExchangeRegistry {
    config: ExchangeConfig,
    native: Arc<dyn NativeLedger>,
    clock: Arc<dyn Clock>,
    self_ref: Weak<ExchangeRegistry>,
    state: RwLock<RegistryState>,
}

impl ExchangeRegistry {
    /// 创建注册表。池子通过弱引用找回注册表，因此只能以 `Arc` 形式存在
    pub fn new(
        config: ExchangeConfig,
        native: Arc<dyn NativeLedger>,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self> {
        info!("初始化交易所注册表 {:?}", config.registry_address);
        Arc::new_cyclic(|self_ref| Self {
            config,
            native,
            clock,
            self_ref: self_ref.clone(),
            state: RwLock::new(RegistryState::default()),
        })
    }

    pub fn address(&self) -> Address {
        self.config.registry_address
    }

    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// 为资产创建交易池
    pub fn create_exchange(&self, asset: Arc<dyn AssetLedger>) -> Result<Arc<LiquidityPool>> {
        let asset_address = asset.address();
        if !is_tradable_asset(&asset_address) {
            warn!("拒绝为资产 {:?} 创建交易所", asset_address);
            return Err(ExchangeError::InvalidAsset(asset_address));
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.pools.contains_key(&asset_address) {
            warn!("资产 {:?} 的交易所已存在", asset_address);
            return Err(ExchangeError::AlreadyExists(asset_address));
        }

        let token_id = state.assets_by_id.len() as u64 + 1;
        let pool_address = get_contract_address(self.address(), token_id);
        let pool = Arc::new(LiquidityPool::new(
            pool_address,
            asset,
            Arc::clone(&self.native),
            self.self_ref.clone(),
            Arc::clone(&self.clock),
            self.config.calculator(),
        ));

        state.pools.insert(asset_address, Arc::clone(&pool));
        state.assets_by_pool.insert(pool_address, asset_address);
        state.assets_by_id.push(asset_address);

        info!(
            "创建交易所 #{}: 资产 {:?} → 池 {:?}",
            token_id, asset_address, pool_address
        );
        Ok(pool)
    }

    pub fn get_exchange(&self, asset: Address) -> Option<Arc<LiquidityPool>> {
        self.state().pools.get(&asset).cloned()
    }

    /// 反向查询：池地址对应的资产
    pub fn get_token(&self, pool: Address) -> Option<Address> {
        self.state().assets_by_pool.get(&pool).copied()
    }

    pub fn get_token_with_id(&self, token_id: u64) -> Option<Address> {
        let index = usize::try_from(token_id).ok()?.checked_sub(1)?;
        self.state().assets_by_id.get(index).copied()
    }

    pub fn token_count(&self) -> u64 {
        self.state().assets_by_id.len() as u64
    }

    /// 所有池子，按创建顺序
    pub fn exchanges(&self) -> Vec<Arc<LiquidityPool>> {
        let state = self.state();
        state
            .assets_by_id
            .iter()
            .filter_map(|asset| state.pools.get(asset).cloned())
            .collect()
    }

    fn state(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::NATIVE_CURRENCY;
    use crate::ledger::{InMemoryAssetLedger, InMemoryNativeLedger};
    use crate::utils::time::FixedClock;
    use std::thread;

    fn registry() -> Arc<ExchangeRegistry> {
        ExchangeRegistry::new(
            ExchangeConfig::default(),
            Arc::new(InMemoryNativeLedger::new()),
            Arc::new(FixedClock::new(0)),
        )
    }

    fn token(n: u64) -> Arc<InMemoryAssetLedger> {
        Arc::new(InMemoryAssetLedger::new(
            Address::from_low_u64_be(n),
            format!("TK{}", n),
        ))
    }

    #[test]
    fn test_create_and_lookup() {
        let registry = registry();
        let pool = registry.create_exchange(token(100)).unwrap();

        let asset = Address::from_low_u64_be(100);
        assert_eq!(pool.asset(), asset);
        assert_eq!(
            registry.get_exchange(asset).map(|p| p.address()),
            Some(pool.address())
        );
        assert_eq!(registry.get_token(pool.address()), Some(asset));
        assert_eq!(registry.get_token_with_id(1), Some(asset));
        assert_eq!(registry.get_token_with_id(0), None);
        assert_eq!(registry.get_token_with_id(2), None);
        assert_eq!(registry.token_count(), 1);
        assert!(registry.get_exchange(Address::from_low_u64_be(101)).is_none());
    }

    #[test]
    fn test_duplicate_creation_rejected() {
        let registry = registry();
        let first = registry.create_exchange(token(100)).unwrap();

        let err = registry.create_exchange(token(100)).unwrap_err();
        assert_eq!(err, ExchangeError::AlreadyExists(Address::from_low_u64_be(100)));

        let still = registry.get_exchange(Address::from_low_u64_be(100)).unwrap();
        assert!(Arc::ptr_eq(&first, &still));
        assert_eq!(registry.token_count(), 1);
    }

    #[test]
    fn test_invalid_assets_rejected() {
        let registry = registry();
        let zero = Arc::new(InMemoryAssetLedger::new(Address::zero(), "ZERO"));
        let native = Arc::new(InMemoryAssetLedger::new(NATIVE_CURRENCY, "ETH"));

        assert_eq!(
            registry.create_exchange(zero).unwrap_err(),
            ExchangeError::InvalidAsset(Address::zero())
        );
        assert_eq!(
            registry.create_exchange(native).unwrap_err(),
            ExchangeError::InvalidAsset(NATIVE_CURRENCY)
        );
        assert_eq!(registry.token_count(), 0);
    }

    #[test]
    fn test_pool_addresses_are_distinct_and_deterministic() {
        let a = registry();
        let b = registry();
        let a1 = a.create_exchange(token(1)).unwrap();
        let a2 = a.create_exchange(token(2)).unwrap();
        let b1 = b.create_exchange(token(9)).unwrap();

        assert_ne!(a1.address(), a2.address());
        // 同一注册表地址、同一序号 → 同一池地址
        assert_eq!(a1.address(), b1.address());
        assert_eq!(
            a.exchanges().iter().map(|p| p.address()).collect::<Vec<_>>(),
            vec![a1.address(), a2.address()]
        );
    }

    #[test]
    fn test_concurrent_creation_is_exactly_once() {
        let registry = registry();
        let shared = token(100);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let asset: Arc<dyn AssetLedger> = shared.clone();
                thread::spawn(move || registry.create_exchange(asset).is_ok())
            })
            .collect();

        let created = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(created, 1);
        assert_eq!(registry.token_count(), 1);
    }
}
