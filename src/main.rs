use clap::Parser;
use eyre::Result;
use log::{info, warn};
use std::sync::Arc;
use uniswap_lite::config::{ConfigManager, ExchangeConfig};
use uniswap_lite::core::types::{Call, PoolSnapshot};
use uniswap_lite::exchange::ExchangeRegistry;
use uniswap_lite::ledger::{AssetLedger, InMemoryAssetLedger, InMemoryNativeLedger, NativeLedger};
use uniswap_lite::utils::math::{ether_to_wei, parse_amount, wei_to_ether_string};
use uniswap_lite::utils::time::{timestamp_to_string, FixedClock};

/// 演示场景使用的区块时间
const SIMULATION_START: u64 = 1_654_982_400;
const SIMULATION_DEADLINE: u64 = SIMULATION_START + 600;

#[derive(clap::Parser)]
#[command(about = "Constant product exchange simulator")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand)]
pub enum Command {
    /// Replay a liquidity and swap session against in-memory ledgers
    Simulate {
        /// Print pool snapshots as JSON after each step
        #[arg(long)]
        json: bool,
    },
    /// Price a single trade against the given reserves
    Quote {
        #[arg(long)]
        reserve_in: String,
        #[arg(long)]
        reserve_out: String,
        #[arg(long)]
        amount: String,
        /// Treat amount as the desired output instead of the input
        #[arg(long)]
        exact_output: bool,
    },
}

fn main() -> Result<()> {
    // 初始化日志系统
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config();
    ConfigManager::print_config_summary(&config);

    match Args::parse().command {
        Command::Simulate { json } => simulate(config, json),
        Command::Quote {
            reserve_in,
            reserve_out,
            amount,
            exact_output,
        } => quote(&config, &reserve_in, &reserve_out, &amount, exact_output),
    }
}

fn load_config() -> ExchangeConfig {
    match ConfigManager::load_from_env() {
        Ok(config) => {
            info!("✅ 配置加载成功");
            config
        }
        Err(e) => {
            warn!("从环境变量加载配置失败: {}", e);
            info!("使用默认配置...");
            ExchangeConfig::default()
        }
    }
}

fn quote(
    config: &ExchangeConfig,
    reserve_in: &str,
    reserve_out: &str,
    amount: &str,
    exact_output: bool,
) -> Result<()> {
    let calculator = config.calculator();
    let reserve_in = parse_amount(reserve_in)?;
    let reserve_out = parse_amount(reserve_out)?;
    let amount = parse_amount(amount)?;

    if exact_output {
        let amount_in = calculator.get_output_price(amount, reserve_in, reserve_out)?;
        println!("买入 {} 需要输入 {}", amount, amount_in);
    } else {
        let amount_out = calculator.get_input_price(amount, reserve_in, reserve_out)?;
        println!("输入 {} 可得到 {}", amount, amount_out);
    }
    Ok(())
}

fn simulate(config: ExchangeConfig, json: bool) -> Result<()> {
    info!("🚀 启动兑换模拟...");

    let native = Arc::new(InMemoryNativeLedger::new());
    let clock = Arc::new(FixedClock::new(SIMULATION_START));
    let registry = ExchangeRegistry::new(config, native.clone(), clock.clone());
    info!("模拟时间: {}", timestamp_to_string(SIMULATION_START));

    let user = ethers::types::Address::from_low_u64_be(0xa11ce);
    native.mint(user, ether_to_wei("10")?);

    let token1 = Arc::new(InMemoryAssetLedger::new(
        ethers::types::Address::from_low_u64_be(0x1001),
        "TK1",
    ));
    let token2 = Arc::new(InMemoryAssetLedger::new(
        ethers::types::Address::from_low_u64_be(0x1002),
        "TK2",
    ));
    let pool1 = registry.create_exchange(token1.clone())?;
    let pool2 = registry.create_exchange(token2.clone())?;

    let asset_budget = parse_amount("1000000")?;
    for (token, pool) in [(&token1, &pool1), (&token2, &pool2)] {
        token.mint(user, asset_budget);
        token.approve(user, pool.address(), asset_budget);
    }

    let report = |step: &str, snapshots: &[PoolSnapshot]| -> Result<()> {
        info!(
            "[{}] 用户余额: {} ETH, {} {}, {} {}",
            step,
            wei_to_ether_string(native.balance_of(user)),
            token1.balance_of(user),
            token1.symbol(),
            token2.balance_of(user),
            token2.symbol()
        );
        for snapshot in snapshots {
            if json {
                println!("{}", serde_json::to_string(snapshot)?);
            } else {
                info!("{}", snapshot);
            }
        }
        Ok(())
    };

    let initial = parse_amount("100000")?;
    let one = parse_amount("1")?;
    for pool in [&pool1, &pool2] {
        let minted =
            pool.add_liquidity(Call::new(user, ether_to_wei("1")?), one, initial, SIMULATION_DEADLINE)?;
        info!("池 {:?} 铸造份额 {}", pool.address(), minted);
    }
    report("添加流动性", &[pool1.snapshot(), pool2.snapshot()])?;

    let bought = pool1.eth_to_token_swap_input(
        Call::new(user, ether_to_wei("0.1")?),
        one,
        SIMULATION_DEADLINE,
    )?;
    info!("0.1 ETH 买入 {} {}", bought, token1.symbol());
    report("原生币→资产", &[pool1.snapshot()])?;

    clock.advance(15);
    let eth_out =
        pool1.token_to_eth_swap_input(user, parse_amount("100")?, one, SIMULATION_DEADLINE)?;
    info!("100 {} 卖出得到 {} ETH", token1.symbol(), wei_to_ether_string(eth_out));
    report("资产→原生币", &[pool1.snapshot()])?;

    clock.advance(15);
    let shares = pool1.balance_of(user);
    let (native_out, asset_out) = pool1.remove_liquidity(
        user,
        shares,
        ether_to_wei("0.2")?,
        parse_amount("2000")?,
        SIMULATION_DEADLINE,
    )?;
    info!(
        "取回 {} ETH 和 {} {}",
        wei_to_ether_string(native_out),
        asset_out,
        token1.symbol()
    );
    report("移除流动性", &[pool1.snapshot()])?;

    pool1.add_liquidity(Call::new(user, ether_to_wei("1")?), one, initial, SIMULATION_DEADLINE)?;
    let tokens_bought = pool1.token_to_token_swap_input(
        user,
        parse_amount("100")?,
        one,
        one,
        SIMULATION_DEADLINE,
        token2.address(),
    )?;
    info!(
        "100 {} 换得 {} {}",
        token1.symbol(),
        tokens_bought,
        token2.symbol()
    );
    report("资产→资产", &[pool1.snapshot(), pool2.snapshot()])?;

    info!("🏁 模拟完成");
    Ok(())
}
