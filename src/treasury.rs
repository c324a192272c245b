//! Treasury and protocol-wide metrics
//!
//! Split in two halves so the math stays testable: `fetch_protocol_snapshot`
//! does every chain read and returns raw integers; `compose_metrics` folds
//! the snapshot with cached USD prices into display-ready numbers and never
//! touches the network. Re-composing the same snapshot twice always yields
//! identical metrics.
//!
//! Per-bond holdings are fetched independently. A depository that reverts
//! contributes an error entry and the aggregate carries on without it,
//! flagged partial.

use alloy_primitives::U256;
use futures::future::join_all;
use serde::Serialize;
use tracing::warn;

use crate::bonds::{self, BondDescriptor, BondKind, QuoteAsset};
use crate::chain::{
    call3, decode_slot, ChainClient, IBondingCalculator, IERC20, IStakedToken, IStaking,
    ISupplyController, IUniswapV2Pair,
};
use crate::config::Config;
use crate::error::MetricsError;
use crate::market;
use crate::oracle::PriceOracle;
use crate::registry::{self, to_units, ChainBook, Network, RESERVE_DECIMALS, REWARD_DECIMALS};

// ============================================
// SNAPSHOT TYPES
// ============================================

#[derive(Debug, Clone, Copy)]
pub struct EpochInfo {
    pub number: u64,
    /// LUM minted to stakers at the next rebase, raw 1e9.
    pub distribute: U256,
    pub length: u32,
    pub end_time: u64,
}

/// A treasury LP position plus the pair-side balance that prices it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LpPosition {
    pub treasury_balance: U256,
    pub total_supply: U256,
    /// Balance of the priced side of the pair, raw 1e18.
    pub side_balance: U256,
}

impl LpPosition {
    /// USD value of the treasury's share. LP price is twice the priced
    /// side divided by supply, the usual constant-product shortcut.
    pub fn value_usd(&self, side_price_usd: f64) -> f64 {
        let supply = to_units(self.total_supply, RESERVE_DECIMALS);
        if supply <= 0.0 {
            return 0.0;
        }
        let lp_price = to_units(self.side_balance, RESERVE_DECIMALS) * 2.0 * side_price_usd / supply;
        to_units(self.treasury_balance, RESERVE_DECIMALS) * lp_price
    }
}

/// Treasury capital parked outside the bonding book.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvestmentSnapshot {
    /// Priced by its DAI side at par.
    pub dai_ftm: LpPosition,
    /// Priced by its WETH side.
    pub eth_ftm: LpPosition,
    /// Priced by its WFTM side; the wLUM leg has no external feed.
    pub wlum_ftm: LpPosition,
    pub ftm_lend: U256,
    pub dai_lend: U256,
    pub eth_lend: U256,
    /// Some investment reads failed and were zeroed.
    pub degraded: bool,
}

impl InvestmentSnapshot {
    pub fn value_usd(&self, prices: &PriceSet) -> f64 {
        let liquidity = self.dai_ftm.value_usd(1.0)
            + self.eth_ftm.value_usd(prices.eth)
            + self.wlum_ftm.value_usd(prices.ftm);
        let lending = to_units(self.ftm_lend, RESERVE_DECIMALS) * prices.ftm
            + to_units(self.dai_lend, RESERVE_DECIMALS) * prices.dai
            + to_units(self.eth_lend, RESERVE_DECIMALS) * prices.eth;
        liquidity + lending
    }
}

/// Raw treasury exposure to one depository's reserve.
#[derive(Debug, Clone)]
pub enum BondHolding {
    Stable {
        quote: QuoteAsset,
        balance: U256,
        in_strategy: U256,
    },
    Lp {
        quote: QuoteAsset,
        balance: U256,
        markdown: U256,
        valuation: U256,
        pair_supply: U256,
        lux_reserve: U256,
        other_reserve: U256,
    },
}

/// Everything one aggregation pass read from the chain, still raw.
#[derive(Debug, Clone)]
pub struct ProtocolSnapshot {
    pub network: Network,
    pub block_number: Option<u64>,
    /// DAI-wei per LUX-gwei from the market pair.
    pub raw_market_ratio: f64,
    pub total_supply_raw: U256,
    pub circulating_supply_raw: U256,
    pub dai_treasury_raw: U256,
    pub wftm_treasury_raw: U256,
    pub dao_lux_raw: U256,
    /// LUX parked in the DAI, FTM and SOUL pairs.
    pub pooled_lux_raw: [U256; 3],
    pub mintable_lux_raw: Option<U256>,
    pub index_raw: U256,
    pub epoch: EpochInfo,
    pub investments: InvestmentSnapshot,
    pub holdings: Vec<(String, Result<BondHolding, MetricsError>)>,
}

/// USD prices frozen for one composition.
#[derive(Debug, Clone, Copy)]
pub struct PriceSet {
    pub dai: f64,
    pub ftm: f64,
    pub eth: f64,
}

impl PriceSet {
    pub async fn from_oracle(oracle: &PriceOracle) -> Result<PriceSet, MetricsError> {
        Ok(PriceSet {
            dai: oracle.usd_price("DAI").await?,
            ftm: oracle.usd_price("FTM").await?,
            eth: oracle.usd_price("ETH").await?,
        })
    }
}

// ============================================
// METRICS
// ============================================

/// One bond's slice of the treasury, in USD.
#[derive(Debug, Clone, Serialize)]
pub struct BondContribution {
    pub bond: String,
    pub treasury_balance: f64,
    /// Stable-denominated portion only.
    pub risk_free_value: f64,
    /// LUX inside this bond's pair attributable to the treasury.
    pub lux_amount: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProtocolMetrics {
    pub market_price: f64,
    pub total_supply: f64,
    pub circ_supply: f64,
    pub market_cap: f64,
    pub staking_tvl: f64,
    pub reserves: f64,
    pub liquidity: f64,
    pub treasury_balance: f64,
    pub investments_value: f64,
    pub lux_owned: f64,
    pub circulating_lux: f64,
    pub pooled_lux: f64,
    pub mintable_lux: f64,
    pub rfv: f64,
    pub staking_rebase: f64,
    pub five_day_rate: f64,
    pub staking_apy: f64,
    pub current_index: f64,
    pub current_epoch: u64,
    pub next_rebase: u64,
    /// Days of staking emissions the stable backing can cover.
    pub runway: f64,
    pub contributions: Vec<BondContribution>,
    /// At least one input was zeroed or skipped.
    pub partial: bool,
    pub failed_bonds: Vec<String>,
}

// ============================================
// FETCH
// ============================================

/// Read the full protocol state in one batched pass plus one small batch
/// per depository.
pub async fn fetch_protocol_snapshot(
    client: &ChainClient,
    network: Network,
) -> Result<ProtocolSnapshot, MetricsError> {
    let book = registry::book(network)?;
    let block_number = client.block_number().await.ok();

    let core = client
        .multicall(vec![
            call3(book.lux, IERC20::totalSupplyCall {}),
            call3(book.lum, IStakedToken::circulatingSupplyCall {}),
            call3(book.dai, IERC20::balanceOfCall { account: book.treasury }),
            call3(book.wftm, IERC20::balanceOfCall { account: book.treasury }),
            call3(book.lux, IERC20::balanceOfCall { account: book.dao }),
            call3(book.lux, IERC20::balanceOfCall { account: book.lux_dai_pair.address }),
            call3(book.lux, IERC20::balanceOfCall { account: book.lux_ftm_pair.address }),
            call3(book.lux, IERC20::balanceOfCall { account: book.lux_soul_pair.address }),
            call3(book.supply_controller, ISupplyController::mintableLuxorCall {}),
            call3(book.staking, IStaking::epochCall {}),
            call3(book.staking, IStaking::indexCall {}),
            call3(book.market_pair.address, IUniswapV2Pair::getReservesCall {}),
            call3(book.dai_ftm_pair, IERC20::totalSupplyCall {}),
            call3(book.dai_ftm_pair, IERC20::balanceOfCall { account: book.treasury }),
            call3(book.dai, IERC20::balanceOfCall { account: book.dai_ftm_pair }),
            call3(book.eth_ftm_pair, IERC20::totalSupplyCall {}),
            call3(book.eth_ftm_pair, IERC20::balanceOfCall { account: book.treasury }),
            call3(book.weth, IERC20::balanceOfCall { account: book.eth_ftm_pair }),
            call3(book.wlum_ftm_pair, IERC20::totalSupplyCall {}),
            call3(book.wlum_ftm_pair, IERC20::balanceOfCall { account: book.treasury }),
            call3(book.wftm, IERC20::balanceOfCall { account: book.wlum_ftm_pair }),
            call3(book.ftm_lend, IERC20::balanceOfCall { account: book.treasury }),
            call3(book.dai_lend, IERC20::balanceOfCall { account: book.treasury }),
            call3(book.eth_lend, IERC20::balanceOfCall { account: book.treasury }),
        ])
        .await?;

    let required = |idx: usize, what: &str| -> Result<U256, MetricsError> {
        decode_slot::<IERC20::balanceOfCall>(&core[idx])
            .ok_or_else(|| MetricsError::Provider(format!("{} read failed", what)))
    };

    let total_supply_raw = decode_slot::<IERC20::totalSupplyCall>(&core[0])
        .ok_or_else(|| MetricsError::Provider("LUX totalSupply read failed".to_string()))?;
    let circulating_supply_raw = decode_slot::<IStakedToken::circulatingSupplyCall>(&core[1])
        .ok_or_else(|| MetricsError::Provider("LUM circulatingSupply read failed".to_string()))?;
    let dai_treasury_raw = required(2, "treasury DAI balance")?;
    let wftm_treasury_raw = required(3, "treasury wFTM balance")?;
    let dao_lux_raw = required(4, "DAO LUX balance")?;
    let pooled_lux_raw = [
        required(5, "LUX-DAI pooled LUX")?,
        required(6, "LUX-FTM pooled LUX")?,
        required(7, "LUX-SOUL pooled LUX")?,
    ];
    let mintable_lux_raw = decode_slot::<ISupplyController::mintableLuxorCall>(&core[8]);

    let epoch_raw = decode_slot::<IStaking::epochCall>(&core[9])
        .ok_or_else(|| MetricsError::Provider("staking epoch read failed".to_string()))?;
    let epoch = EpochInfo {
        number: epoch_raw.number.to::<u64>(),
        distribute: epoch_raw.distribute,
        length: epoch_raw.length,
        end_time: epoch_raw.endTime as u64,
    };
    let index_raw = decode_slot::<IStaking::indexCall>(&core[10])
        .ok_or_else(|| MetricsError::Provider("staking index read failed".to_string()))?;

    let reserves = decode_slot::<IUniswapV2Pair::getReservesCall>(&core[11])
        .ok_or_else(|| MetricsError::Provider("market pair reserves read failed".to_string()))?;
    let raw_market_ratio = market::reserve_ratio(
        reserves.reserve0.to::<u128>(),
        reserves.reserve1.to::<u128>(),
        book.market_pair.lux_is_token0,
    )
    .ok_or(MetricsError::PriceUnavailable {
        symbol: "LUX".to_string(),
    })?;

    // Investment reads degrade to zero rather than sinking the pass.
    let mut degraded = false;
    let mut optional = |decoded: Option<U256>, what: &str| -> U256 {
        match decoded {
            Some(v) => v,
            None => {
                warn!("{} read failed, counting as zero", what);
                degraded = true;
                U256::ZERO
            }
        }
    };
    let supply = |idx: usize| decode_slot::<IERC20::totalSupplyCall>(&core[idx]);
    let balance = |idx: usize| decode_slot::<IERC20::balanceOfCall>(&core[idx]);
    let investments_partial = InvestmentSnapshot {
        dai_ftm: LpPosition {
            total_supply: optional(supply(12), "DAI-FTM supply"),
            treasury_balance: optional(balance(13), "DAI-FTM treasury balance"),
            side_balance: optional(balance(14), "DAI-FTM dai side"),
        },
        eth_ftm: LpPosition {
            total_supply: optional(supply(15), "ETH-FTM supply"),
            treasury_balance: optional(balance(16), "ETH-FTM treasury balance"),
            side_balance: optional(balance(17), "ETH-FTM weth side"),
        },
        wlum_ftm: LpPosition {
            total_supply: optional(supply(18), "wLUM-FTM supply"),
            treasury_balance: optional(balance(19), "wLUM-FTM treasury balance"),
            side_balance: optional(balance(20), "wLUM-FTM wftm side"),
        },
        ftm_lend: optional(balance(21), "FTM lend position"),
        dai_lend: optional(balance(22), "DAI lend position"),
        eth_lend: optional(balance(23), "ETH lend position"),
        degraded: false,
    };
    let investments = InvestmentSnapshot {
        degraded,
        ..investments_partial
    };

    // ========== Per-bond holdings, isolated ==========
    let catalog = bonds::bonds_for(network);
    let holdings = join_all(catalog.iter().map(|bond| async move {
        (
            bond.name.to_string(),
            fetch_bond_holding(client, book, bond).await,
        )
    }))
    .await;

    Ok(ProtocolSnapshot {
        network,
        block_number,
        raw_market_ratio,
        total_supply_raw,
        circulating_supply_raw,
        dai_treasury_raw,
        wftm_treasury_raw,
        dao_lux_raw,
        pooled_lux_raw,
        mintable_lux_raw,
        index_raw,
        epoch,
        investments,
        holdings,
    })
}

async fn fetch_bond_holding(
    client: &ChainClient,
    book: &ChainBook,
    bond: &BondDescriptor,
) -> Result<BondHolding, MetricsError> {
    // Only the reserve side matters here; the depository itself is never read.
    let reserve = bond.address_for_reserve(book.network)?;

    match bond.kind {
        BondKind::Stable => {
            let balance = client
                .read(
                    reserve,
                    IERC20::balanceOfCall {
                        account: book.treasury,
                    },
                )
                .await?;
            Ok(BondHolding::Stable {
                quote: bond.quote,
                balance,
                in_strategy: bond.tokens_in_strategy,
            })
        }
        BondKind::Lp => {
            let batch = client
                .multicall(vec![
                    call3(
                        reserve,
                        IERC20::balanceOfCall {
                            account: book.treasury,
                        },
                    ),
                    call3(
                        book.bond_calculator,
                        IBondingCalculator::markdownCall { pair: reserve },
                    ),
                    call3(reserve, IERC20::totalSupplyCall {}),
                    call3(reserve, IUniswapV2Pair::getReservesCall {}),
                ])
                .await?;

            let balance = decode_slot::<IERC20::balanceOfCall>(&batch[0]).ok_or_else(|| {
                MetricsError::Provider(format!("treasury LP balance failed for {}", bond.name))
            })?;
            let markdown =
                decode_slot::<IBondingCalculator::markdownCall>(&batch[1]).ok_or_else(|| {
                    MetricsError::Provider(format!("markdown failed for {}", bond.name))
                })?;
            let pair_supply = decode_slot::<IERC20::totalSupplyCall>(&batch[2]).ok_or_else(
                || MetricsError::Provider(format!("pair supply failed for {}", bond.name)),
            )?;
            let pair_reserves = decode_slot::<IUniswapV2Pair::getReservesCall>(&batch[3])
                .ok_or_else(|| {
                    MetricsError::Provider(format!("pair reserves failed for {}", bond.name))
                })?;

            let lux_is_token0 = book.lux_is_token0(reserve).ok_or_else(|| {
                MetricsError::Provider(format!("unknown pair orientation for {}", bond.name))
            })?;
            let (lux_reserve, other_reserve) = if lux_is_token0 {
                (pair_reserves.reserve0, pair_reserves.reserve1)
            } else {
                (pair_reserves.reserve1, pair_reserves.reserve0)
            };

            let valuation = client
                .read(
                    book.bond_calculator,
                    IBondingCalculator::valuationCall {
                        pair: reserve,
                        amount: balance,
                    },
                )
                .await?;

            Ok(BondHolding::Lp {
                quote: bond.quote,
                balance,
                markdown,
                valuation,
                pair_supply,
                lux_reserve: U256::from(lux_reserve.to::<u128>()),
                other_reserve: U256::from(other_reserve.to::<u128>()),
            })
        }
    }
}

// ============================================
// COMPOSE
// ============================================

fn contribution_from_holding(name: &str, holding: &BondHolding, prices: &PriceSet) -> BondContribution {
    match holding {
        BondHolding::Stable {
            quote,
            balance,
            in_strategy,
        } => {
            let units = bonds::stable_purchased_units(*balance, *in_strategy);
            let (value, rfv) = match quote {
                QuoteAsset::Dai => (units, units),
                QuoteAsset::Ftm => (units * prices.ftm, 0.0),
            };
            BondContribution {
                bond: name.to_string(),
                treasury_balance: value,
                risk_free_value: rfv,
                lux_amount: 0.0,
            }
        }
        BondHolding::Lp {
            quote,
            balance,
            markdown,
            valuation,
            pair_supply,
            lux_reserve,
            other_reserve,
        } => {
            let mut value = bonds::lp_purchased_usd(*markdown, *valuation);
            if *quote == QuoteAsset::Ftm {
                value *= prices.ftm;
            }

            let share = if pair_supply.is_zero() {
                0.0
            } else {
                to_units(*balance, 0) / to_units(*pair_supply, 0)
            };
            let rfv = match quote {
                QuoteAsset::Dai => 2.0 * to_units(*other_reserve, RESERVE_DECIMALS) * share,
                QuoteAsset::Ftm => 0.0,
            };
            let lux_amount = to_units(*lux_reserve, REWARD_DECIMALS) * share;

            BondContribution {
                bond: name.to_string(),
                treasury_balance: value,
                risk_free_value: rfv,
                lux_amount,
            }
        }
    }
}

/// Fold a snapshot and a frozen price set into display metrics. Pure;
/// the same inputs always produce the same output.
pub fn compose_metrics(
    snapshot: &ProtocolSnapshot,
    prices: &PriceSet,
    config: &Config,
) -> ProtocolMetrics {
    let market_price = market::usd_from_ratio(snapshot.raw_market_ratio, prices.dai);
    let total_supply = to_units(snapshot.total_supply_raw, REWARD_DECIMALS);
    let circ_supply = to_units(snapshot.circulating_supply_raw, REWARD_DECIMALS);
    let market_cap = total_supply * market_price;
    let staking_tvl = circ_supply * market_price;

    let dai_reserves = to_units(snapshot.dai_treasury_raw, RESERVE_DECIMALS);
    let wftm_reserves = to_units(snapshot.wftm_treasury_raw, RESERVE_DECIMALS) * prices.ftm;
    let reserves = dai_reserves + wftm_reserves;

    let lux_owned = to_units(snapshot.dao_lux_raw, REWARD_DECIMALS);
    let pooled_lux = snapshot
        .pooled_lux_raw
        .iter()
        .map(|raw| to_units(*raw, REWARD_DECIMALS))
        .sum::<f64>();
    let mintable_lux = snapshot
        .mintable_lux_raw
        .map(|raw| to_units(raw, REWARD_DECIMALS))
        .unwrap_or(0.0);
    let circulating_lux = total_supply - lux_owned;

    let mut contributions = Vec::new();
    let mut failed_bonds = Vec::new();
    for (name, holding) in &snapshot.holdings {
        match holding {
            Ok(h) => contributions.push(contribution_from_holding(name, h, prices)),
            Err(e) => {
                warn!("excluding {} from aggregates: {}", name, e);
                failed_bonds.push(name.clone());
            }
        }
    }

    let raw_treasury_balance: f64 = contributions.iter().map(|c| c.treasury_balance).sum();
    let rfv_treasury: f64 = contributions.iter().map(|c| c.risk_free_value).sum();
    let lux_in_pairs: f64 = contributions.iter().map(|c| c.lux_amount).sum();

    let treasury_lux_liquidity = raw_treasury_balance / config.strategy_divisor;
    let investments_value = snapshot.investments.value_usd(prices);
    let treasury_balance = treasury_lux_liquidity + investments_value;
    let liquidity = treasury_lux_liquidity - reserves;

    let backing_supply = total_supply - lux_in_pairs;
    let rfv = if backing_supply > 0.0 {
        rfv_treasury / backing_supply
    } else {
        0.0
    };

    let staking_rebase = if snapshot.circulating_supply_raw.is_zero() {
        0.0
    } else {
        to_units(snapshot.epoch.distribute, 0) / to_units(snapshot.circulating_supply_raw, 0)
    };
    let five_day_rate = (1.0 + staking_rebase).powf(5.0 * config.epochs_per_day) - 1.0;
    let staking_apy = (1.0 + staking_rebase).powf(365.0 * config.epochs_per_day) - 1.0;

    let runway = if circ_supply > 0.0 && rfv_treasury > 0.0 && staking_rebase > 0.0 {
        let coverage = rfv_treasury / circ_supply;
        coverage.ln() / (1.0 + staking_rebase).ln() / config.epochs_per_day
    } else {
        0.0
    };

    let partial = !failed_bonds.is_empty() || snapshot.investments.degraded;

    ProtocolMetrics {
        market_price,
        total_supply,
        circ_supply,
        market_cap,
        staking_tvl,
        reserves,
        liquidity,
        treasury_balance,
        investments_value,
        lux_owned,
        circulating_lux,
        pooled_lux,
        mintable_lux,
        rfv,
        staking_rebase,
        five_day_rate,
        staking_apy,
        current_index: to_units(snapshot.index_raw, REWARD_DECIMALS),
        current_epoch: snapshot.epoch.number,
        next_rebase: snapshot.epoch.end_time,
        runway,
        contributions,
        partial,
        failed_bonds,
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn gwei(units: f64) -> U256 {
        U256::from((units * 1e9) as u128)
    }

    fn wei(units: f64) -> U256 {
        U256::from((units * 1e18) as u128)
    }

    fn sample_snapshot() -> ProtocolSnapshot {
        ProtocolSnapshot {
            network: Network::Fantom,
            block_number: Some(30_000_000),
            // 2.2 DAI per LUX before decimal correction
            raw_market_ratio: 2.2e9,
            total_supply_raw: gwei(1_000_000.0),
            circulating_supply_raw: gwei(400_000.0),
            dai_treasury_raw: wei(500_000.0),
            wftm_treasury_raw: wei(100_000.0),
            dao_lux_raw: gwei(50_000.0),
            pooled_lux_raw: [gwei(10_000.0), gwei(5_000.0), gwei(1_000.0)],
            mintable_lux_raw: Some(gwei(20_000.0)),
            index_raw: gwei(4.2),
            epoch: EpochInfo {
                number: 315,
                distribute: gwei(4_000.0),
                length: 28_800,
                end_time: 1_700_000_000,
            },
            investments: InvestmentSnapshot::default(),
            holdings: vec![
                (
                    "dai".to_string(),
                    Ok(BondHolding::Stable {
                        quote: QuoteAsset::Dai,
                        balance: wei(300_000.0),
                        in_strategy: U256::ZERO,
                    }),
                ),
                (
                    "wftm".to_string(),
                    Ok(BondHolding::Stable {
                        quote: QuoteAsset::Ftm,
                        balance: wei(100_000.0),
                        in_strategy: U256::ZERO,
                    }),
                ),
            ],
        }
    }

    fn test_prices() -> PriceSet {
        PriceSet {
            dai: 1.0,
            ftm: 2.0,
            eth: 2_000.0,
        }
    }

    #[test]
    fn test_compose_is_deterministic() {
        let snapshot = sample_snapshot();
        let prices = test_prices();
        let config = Config::default();

        let a = compose_metrics(&snapshot, &prices, &config);
        let b = compose_metrics(&snapshot, &prices, &config);

        assert_eq!(a.market_price, b.market_price);
        assert_eq!(a.treasury_balance, b.treasury_balance);
        assert_eq!(a.rfv, b.rfv);
        assert_eq!(a.runway, b.runway);
        assert_eq!(a.staking_apy, b.staking_apy);
    }

    #[test]
    fn test_supply_and_cap_math() {
        let metrics = compose_metrics(&sample_snapshot(), &test_prices(), &Config::default());

        assert!((metrics.market_price - 2.2).abs() < 1e-9);
        assert!((metrics.total_supply - 1_000_000.0).abs() < 1e-6);
        assert!((metrics.circ_supply - 400_000.0).abs() < 1e-6);
        assert!((metrics.market_cap - 2_200_000.0).abs() < 1e-3);
        assert!((metrics.staking_tvl - 880_000.0).abs() < 1e-3);
        assert!((metrics.circulating_lux - 950_000.0).abs() < 1e-6);
        assert!((metrics.pooled_lux - 16_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_treasury_composition() {
        let metrics = compose_metrics(&sample_snapshot(), &test_prices(), &Config::default());

        // dai bond 300k at par, wftm bond 100k at $2
        let raw_treasury = 300_000.0 + 200_000.0;
        let lux_side = raw_treasury / 4.0;
        assert!((metrics.treasury_balance - lux_side).abs() < 1e-6);

        // reserves: 500k DAI + 100k wFTM at $2
        assert!((metrics.reserves - 700_000.0).abs() < 1e-6);
        assert!((metrics.liquidity - (lux_side - 700_000.0)).abs() < 1e-6);

        // only the DAI bond is risk free
        let backing = 1_000_000.0; // no LP holdings, nothing deducted
        assert!((metrics.rfv - 300_000.0 / backing).abs() < 1e-12);
        assert!(!metrics.partial);
    }

    #[test]
    fn test_strategy_divisor_is_configurable() {
        let snapshot = sample_snapshot();
        let prices = test_prices();

        let mut config = Config::default();
        config.strategy_divisor = 2.0;
        let halved = compose_metrics(&snapshot, &prices, &config);

        config.strategy_divisor = 4.0;
        let quartered = compose_metrics(&snapshot, &prices, &config);

        assert!((halved.treasury_balance - 2.0 * quartered.treasury_balance).abs() < 1e-6);
    }

    #[test]
    fn test_failed_bond_excluded_from_aggregates() {
        // five depositories, one of which reverts mid-pass
        let extra_ok = |name: &str, units: f64| {
            (
                name.to_string(),
                Ok(BondHolding::Stable {
                    quote: QuoteAsset::Dai,
                    balance: wei(units),
                    in_strategy: U256::ZERO,
                }),
            )
        };
        let mut snapshot = sample_snapshot();
        snapshot.holdings.push(extra_ok("dai7", 50_000.0));
        snapshot.holdings.push(extra_ok("dai14", 25_000.0));
        snapshot.holdings.push((
            "dai_lux_lp".to_string(),
            Err(MetricsError::Provider("execution reverted".to_string())),
        ));

        let metrics = compose_metrics(&snapshot, &test_prices(), &Config::default());

        assert!(metrics.partial);
        assert_eq!(metrics.failed_bonds, vec!["dai_lux_lp".to_string()]);
        assert_eq!(metrics.contributions.len(), 4);
        // totals identical to the same pass without the broken bond
        let mut clean_snapshot = sample_snapshot();
        clean_snapshot.holdings.push(extra_ok("dai7", 50_000.0));
        clean_snapshot.holdings.push(extra_ok("dai14", 25_000.0));
        let clean = compose_metrics(&clean_snapshot, &test_prices(), &Config::default());
        assert_eq!(metrics.treasury_balance, clean.treasury_balance);
        assert_eq!(metrics.rfv, clean.rfv);
        assert!(!clean.partial);
    }

    #[test]
    fn test_rebase_and_apy() {
        let metrics = compose_metrics(&sample_snapshot(), &test_prices(), &Config::default());

        // 4,000 LUM distributed over 400,000 staked
        assert!((metrics.staking_rebase - 0.01).abs() < 1e-12);
        let expected_5d = 1.01f64.powi(15) - 1.0;
        let expected_apy = 1.01f64.powi(1095) - 1.0;
        assert!((metrics.five_day_rate - expected_5d).abs() < 1e-9);
        assert!((metrics.staking_apy - expected_apy).abs() / expected_apy < 1e-9);
    }

    #[test]
    fn test_runway_in_days() {
        let mut snapshot = sample_snapshot();
        // stable backing covering exactly (1.01)^30 of the staked supply
        let coverage = 1.01f64.powi(30);
        snapshot.holdings = vec![(
            "dai".to_string(),
            Ok(BondHolding::Stable {
                quote: QuoteAsset::Dai,
                balance: wei(400_000.0 * coverage),
                in_strategy: U256::ZERO,
            }),
        )];

        let metrics = compose_metrics(&snapshot, &test_prices(), &Config::default());
        // 30 rebases of coverage at 3 per day
        assert!((metrics.runway - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_circulating_supply_guards() {
        let mut snapshot = sample_snapshot();
        snapshot.circulating_supply_raw = U256::ZERO;

        let metrics = compose_metrics(&snapshot, &test_prices(), &Config::default());
        assert_eq!(metrics.staking_rebase, 0.0);
        assert_eq!(metrics.staking_apy, 0.0);
        assert_eq!(metrics.runway, 0.0);
    }

    #[test]
    fn test_lp_holding_contribution() {
        let holding = BondHolding::Lp {
            quote: QuoteAsset::Dai,
            balance: wei(10.0),
            markdown: wei(2.0),
            valuation: gwei(300.0),
            pair_supply: wei(100.0),
            lux_reserve: gwei(50_000.0),
            other_reserve: wei(110_000.0),
        };
        let c = contribution_from_holding("dai_lux_lp", &holding, &test_prices());

        assert!((c.treasury_balance - 600.0).abs() < 1e-9);
        // 10% share of twice the DAI side
        assert!((c.risk_free_value - 2.0 * 110_000.0 * 0.1).abs() < 1e-6);
        assert!((c.lux_amount - 5_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_ftm_lp_holding_valued_through_ftm() {
        let holding = BondHolding::Lp {
            quote: QuoteAsset::Ftm,
            balance: wei(10.0),
            markdown: wei(2.0),
            valuation: gwei(300.0),
            pair_supply: wei(100.0),
            lux_reserve: gwei(50_000.0),
            other_reserve: wei(60_000.0),
        };
        let c = contribution_from_holding("ftm_lux_lp", &holding, &test_prices());

        // markdown value doubled by the $2 FTM quote
        assert!((c.treasury_balance - 1_200.0).abs() < 1e-9);
        assert_eq!(c.risk_free_value, 0.0);
        assert!((c.lux_amount - 5_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_investment_valuation() {
        let investments = InvestmentSnapshot {
            dai_ftm: LpPosition {
                treasury_balance: wei(10.0),
                total_supply: wei(100.0),
                side_balance: wei(200.0),
            },
            eth_ftm: LpPosition::default(),
            wlum_ftm: LpPosition::default(),
            ftm_lend: wei(1_000.0),
            dai_lend: wei(500.0),
            eth_lend: U256::ZERO,
            degraded: false,
        };

        let value = investments.value_usd(&test_prices());
        // LP: price $4 per share, 10 shares. Lends: 1,000 FTM at $2 + 500 DAI
        assert!((value - (40.0 + 2_000.0 + 500.0)).abs() < 1e-6);
    }

    #[test]
    fn test_degraded_investments_flag_partial() {
        let mut snapshot = sample_snapshot();
        snapshot.investments.degraded = true;

        let metrics = compose_metrics(&snapshot, &test_prices(), &Config::default());
        assert!(metrics.partial);
        assert!(metrics.failed_bonds.is_empty());
    }
}
