//! Bond appraisal engine
//!
//! One pass per depository: terms, caps and debt in a single batch, then
//! the deposit quote plus a one-unit probe, then the treasury's holdings of
//! the reserve. Reads that depend on an earlier result (LP valuations) go
//! out as chained singles; everything else rides the batch.
//!
//! A dead bondPriceInUSD never kills the appraisal: the valuation comes
//! back flagged with zeroed price fields, matching how the desk renders a
//! depository that is sold out or unseeded.

use alloy_primitives::U256;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::bonds::{self, BondDescriptor, BondKind, QuoteAsset};
use crate::chain::{call3, decode_slot, ChainClient, IBondDepository, IBondingCalculator, IERC20};
use crate::error::MetricsError;
use crate::market;
use crate::oracle::PriceOracle;
use crate::registry::{self, to_units, Network, REWARD_DECIMALS};

// ============================================
// CONSTANTS
// ============================================

/// One reserve unit, the anchor for the linear max-purchasable estimate.
const PROBE_DEPOSIT_WEI: u128 = 1_000_000_000_000_000_000;

/// Deposit slippage tolerance applied when the caller passes none.
pub const DEFAULT_SLIPPAGE: f64 = 0.005;

/// Deposits beyond this are typos, not trades.
const MAX_DEPOSIT_TOKENS: f64 = 1e12;

// ============================================
// RESULT TYPE
// ============================================

#[derive(Debug, Clone, Serialize)]
pub struct BondValuation {
    pub bond: String,
    pub display_name: String,
    /// USD per LUX on the open market at appraisal time.
    pub market_price: f64,
    /// USD per LUX this depository asks. Zero when flagged unavailable.
    pub bond_price: f64,
    /// Signed fraction; negative means the bond trades above market.
    pub bond_discount: f64,
    /// LUX receivable for the candidate deposit.
    pub bond_quote: f64,
    /// Payout cap per deposit, in LUX.
    pub max_bond_price: f64,
    /// Deposit size that would hit the cap, in reserve units.
    /// Zero when the probe quote came back dead.
    pub max_bond_price_token: f64,
    /// Outstanding depository debt, in LUX.
    pub total_bond_debt: f64,
    /// Debt ceiling from terms, in LUX.
    pub max_debt: f64,
    /// Vesting length in seconds.
    pub vesting_term: u64,
    /// Raw internal fixed-point bondPrice, the premium anchor for deposits.
    pub internal_price_raw: f64,
    /// USD already absorbed by the treasury through this bond's reserve.
    pub purchased: f64,
    /// Candidate quote beat the payout cap. Warning, not failure.
    pub quote_exceeds_max: bool,
    /// bondPriceInUSD reverted; price and discount fields are placeholders.
    pub price_unavailable: bool,
}

impl BondValuation {
    /// True when outstanding debt has reached the depository's ceiling, so
    /// a deposit would revert on-chain. A zero ceiling reads as unlimited.
    pub fn deposit_blocked(&self) -> bool {
        self.max_debt > 0.0 && self.total_bond_debt >= self.max_debt
    }
}

// ============================================
// INPUT HANDLING
// ============================================

/// Parse a user-entered deposit amount.
pub fn parse_amount(raw: &str) -> Result<f64, MetricsError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(MetricsError::InvalidAmount("empty".to_string()));
    }
    let value: f64 = trimmed
        .parse()
        .map_err(|_| MetricsError::InvalidAmount(raw.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(MetricsError::InvalidAmount(raw.to_string()));
    }
    Ok(value)
}

/// Reserve units to raw wei, range-checked.
pub fn deposit_to_wei(tokens: f64) -> Result<U256, MetricsError> {
    if !tokens.is_finite() || tokens < 0.0 || tokens > MAX_DEPOSIT_TOKENS {
        return Err(MetricsError::InvalidAmount(format!("{}", tokens)));
    }
    Ok(U256::from((tokens * 1e18) as u128))
}

/// Premium ceiling a depositor would sign, from the depository's internal
/// fixed-point price. Rounded the way the deposit call expects.
pub fn max_premium(internal_price_raw: f64, slippage: f64) -> f64 {
    let tolerance = if slippage > 0.0 { slippage } else { DEFAULT_SLIPPAGE };
    (internal_price_raw * (1.0 + tolerance)).round()
}

// ============================================
// APPRAISAL
// ============================================

/// Full appraisal of a single depository against a candidate deposit.
pub async fn appraise_bond(
    client: &ChainClient,
    oracle: &PriceOracle,
    network: Network,
    bond: &BondDescriptor,
    deposit_tokens: f64,
) -> Result<BondValuation, MetricsError> {
    let deposit_wei = deposit_to_wei(deposit_tokens)?;
    let book = registry::book(network)?;
    let deployment = bond.deployment(network)?;

    let market_price = market::market_price_usd(client, oracle, network).await?;
    let ftm_usd = match bond.quote {
        QuoteAsset::Ftm => Some(oracle.usd_price("FTM").await?),
        QuoteAsset::Dai => None,
    };

    // ========== Batch 1: terms, caps, debt, price, holdings ==========
    let base = client
        .multicall(vec![
            call3(deployment.bond, IBondDepository::termsCall {}),
            call3(deployment.bond, IBondDepository::maxPayoutCall {}),
            call3(deployment.bond, IBondDepository::totalDebtCall {}),
            call3(deployment.bond, IBondDepository::bondPriceInUSDCall {}),
            call3(deployment.bond, IBondDepository::bondPriceCall {}),
            call3(
                deployment.reserve,
                IERC20::balanceOfCall {
                    account: book.treasury,
                },
            ),
        ])
        .await?;

    let terms = decode_slot::<IBondDepository::termsCall>(&base[0])
        .ok_or_else(|| MetricsError::Provider(format!("terms read failed for {}", bond.name)))?;
    let max_payout_raw = decode_slot::<IBondDepository::maxPayoutCall>(&base[1])
        .ok_or_else(|| MetricsError::Provider(format!("maxPayout read failed for {}", bond.name)))?;
    let total_debt_raw = decode_slot::<IBondDepository::totalDebtCall>(&base[2])
        .ok_or_else(|| MetricsError::Provider(format!("totalDebt read failed for {}", bond.name)))?;
    let usd_price_raw = decode_slot::<IBondDepository::bondPriceInUSDCall>(&base[3]);
    let internal_price_raw = decode_slot::<IBondDepository::bondPriceCall>(&base[4])
        .map(|p| to_units(p, 0))
        .unwrap_or(0.0);
    let treasury_holdings = decode_slot::<IERC20::balanceOfCall>(&base[5]).ok_or_else(|| {
        MetricsError::Provider(format!("treasury balance read failed for {}", bond.name))
    })?;

    let max_bond_price = to_units(max_payout_raw, REWARD_DECIMALS);
    let total_bond_debt = to_units(total_debt_raw, REWARD_DECIMALS);
    let max_debt = to_units(terms.maxDebt, REWARD_DECIMALS);
    let vesting_term = terms.vestingTerm.to::<u64>();

    // ========== Price and discount ==========
    let (bond_price, bond_discount, price_unavailable) = match usd_price_raw {
        Some(raw) if !raw.is_zero() => {
            let mut price_raw = to_units(raw, 0);
            if bond.price_quoted_in_ftm() {
                price_raw *= ftm_usd.unwrap_or(1.0);
            }
            let discount = bonds::compute_discount(market_price, price_raw).unwrap_or(0.0);
            (price_raw / 1e18, discount, false)
        }
        _ => {
            warn!("bondPriceInUSD unavailable for {}", bond.name);
            (0.0, 0.0, true)
        }
    };

    // ========== Quote and probe ==========
    let probe_wei = U256::from(PROBE_DEPOSIT_WEI);
    let (quote_raw, probe_raw) = match bond.kind {
        BondKind::Lp => {
            let calc = book.bond_calculator;
            let valuations = client
                .multicall(vec![
                    call3(
                        calc,
                        IBondingCalculator::valuationCall {
                            pair: deployment.reserve,
                            amount: deposit_wei,
                        },
                    ),
                    call3(
                        calc,
                        IBondingCalculator::valuationCall {
                            pair: deployment.reserve,
                            amount: probe_wei,
                        },
                    ),
                ])
                .await?;
            let deposit_value = decode_slot::<IBondingCalculator::valuationCall>(&valuations[0])
                .ok_or_else(|| {
                    MetricsError::Provider(format!("valuation failed for {}", bond.name))
                })?;
            let probe_value = decode_slot::<IBondingCalculator::valuationCall>(&valuations[1])
                .ok_or_else(|| {
                    MetricsError::Provider(format!("probe valuation failed for {}", bond.name))
                })?;

            let quotes = client
                .multicall(vec![
                    call3(
                        deployment.bond,
                        IBondDepository::payoutForCall {
                            value: deposit_value,
                        },
                    ),
                    call3(
                        deployment.bond,
                        IBondDepository::payoutForCall { value: probe_value },
                    ),
                ])
                .await?;
            (
                decode_slot::<IBondDepository::payoutForCall>(&quotes[0]),
                decode_slot::<IBondDepository::payoutForCall>(&quotes[1]),
            )
        }
        BondKind::Stable => {
            let quotes = client
                .multicall(vec![
                    call3(
                        deployment.bond,
                        IBondDepository::payoutForCall { value: deposit_wei },
                    ),
                    call3(
                        deployment.bond,
                        IBondDepository::payoutForCall { value: probe_wei },
                    ),
                ])
                .await?;
            (
                decode_slot::<IBondDepository::payoutForCall>(&quotes[0]),
                decode_slot::<IBondDepository::payoutForCall>(&quotes[1]),
            )
        }
    };

    let quote_decimals = bond.kind.quote_decimals();
    let bond_quote = quote_raw
        .map(|q| to_units(q, quote_decimals))
        .ok_or_else(|| MetricsError::Provider(format!("payout quote failed for {}", bond.name)))?;
    let probe_quote = probe_raw
        .map(|q| to_units(q, quote_decimals))
        .ok_or_else(|| MetricsError::Provider(format!("probe quote failed for {}", bond.name)))?;

    let max_bond_price_token = match bonds::compute_max_purchasable(max_bond_price, probe_quote) {
        Ok(v) => v,
        Err(e) => {
            warn!("{}: {}", bond.name, e);
            0.0
        }
    };

    let quote_exceeds_max = bond_quote > max_bond_price;
    if quote_exceeds_max {
        let limit = MetricsError::PurchaseExceedsLimit {
            quote: bond_quote,
            max_payout: max_bond_price,
        };
        warn!("{}: {}", bond.name, limit);
    }

    // ========== Purchased ==========
    let purchased = match bond.kind {
        BondKind::Lp => {
            let calc = book.bond_calculator;
            let lp = client
                .multicall(vec![
                    call3(
                        calc,
                        IBondingCalculator::markdownCall {
                            pair: deployment.reserve,
                        },
                    ),
                    call3(
                        calc,
                        IBondingCalculator::valuationCall {
                            pair: deployment.reserve,
                            amount: treasury_holdings,
                        },
                    ),
                ])
                .await?;
            let markdown = decode_slot::<IBondingCalculator::markdownCall>(&lp[0]).ok_or_else(
                || MetricsError::Provider(format!("markdown failed for {}", bond.name)),
            )?;
            let holdings_value = decode_slot::<IBondingCalculator::valuationCall>(&lp[1])
                .ok_or_else(|| {
                    MetricsError::Provider(format!("holdings valuation failed for {}", bond.name))
                })?;
            let mut usd = bonds::lp_purchased_usd(markdown, holdings_value);
            if bond.purchased_valued_in_ftm() {
                usd *= ftm_usd.unwrap_or(1.0);
            }
            usd
        }
        BondKind::Stable => {
            let mut units =
                bonds::stable_purchased_units(treasury_holdings, bond.tokens_in_strategy);
            if bond.purchased_valued_in_ftm() {
                units *= ftm_usd.unwrap_or(1.0);
            }
            units
        }
    };

    debug!(
        "appraised {}: price ${:.4}, discount {:.2}%, purchased ${:.0}",
        bond.name,
        bond_price,
        bond_discount * 100.0,
        purchased
    );

    Ok(BondValuation {
        bond: bond.name.to_string(),
        display_name: bond.display_name.to_string(),
        market_price,
        bond_price,
        bond_discount,
        bond_quote,
        max_bond_price,
        max_bond_price_token,
        total_bond_debt,
        max_debt,
        vesting_term,
        internal_price_raw,
        purchased,
        quote_exceeds_max,
        price_unavailable,
    })
}

/// Appraise a set of depositories concurrently. Each bond fails or
/// succeeds on its own; one bad depository never blanks the desk.
pub async fn appraise_all(
    client: &ChainClient,
    oracle: &PriceOracle,
    network: Network,
    bonds: &[BondDescriptor],
    deposit_tokens: f64,
) -> Vec<(String, Result<BondValuation, MetricsError>)> {
    let appraisals = bonds.iter().map(|bond| async move {
        (
            bond.name.to_string(),
            appraise_bond(client, oracle, network, bond, deposit_tokens).await,
        )
    });
    join_all(appraisals).await
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_accepts_decimals() {
        assert_eq!(parse_amount("1.5").unwrap(), 1.5);
        assert_eq!(parse_amount("  42 ").unwrap(), 42.0);
        assert_eq!(parse_amount("0").unwrap(), 0.0);
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        assert!(matches!(
            parse_amount(""),
            Err(MetricsError::InvalidAmount(_))
        ));
        assert!(matches!(
            parse_amount("   "),
            Err(MetricsError::InvalidAmount(_))
        ));
        assert!(matches!(
            parse_amount("abc"),
            Err(MetricsError::InvalidAmount(_))
        ));
        assert!(matches!(
            parse_amount("-3"),
            Err(MetricsError::InvalidAmount(_))
        ));
        assert!(matches!(
            parse_amount("NaN"),
            Err(MetricsError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_deposit_to_wei_scale() {
        let wei = deposit_to_wei(1.5).unwrap();
        assert_eq!(wei, U256::from(1_500_000_000_000_000_000u128));
        assert_eq!(deposit_to_wei(0.0).unwrap(), U256::ZERO);
    }

    #[test]
    fn test_deposit_to_wei_range_check() {
        assert!(deposit_to_wei(-1.0).is_err());
        assert!(deposit_to_wei(f64::INFINITY).is_err());
        assert!(deposit_to_wei(1e13).is_err());
    }

    #[test]
    fn test_max_premium_applies_slippage() {
        // internal price 1100 at 1% tolerance
        assert_eq!(max_premium(1100.0, 0.01), 1111.0);
    }

    #[test]
    fn test_max_premium_default_tolerance() {
        // zero slippage falls back to 0.5%
        assert_eq!(max_premium(1000.0, 0.0), 1005.0);
    }

    fn sample_valuation() -> BondValuation {
        BondValuation {
            bond: "dai".to_string(),
            display_name: "DAI".to_string(),
            market_price: 2.2,
            bond_price: 2.0,
            bond_discount: 0.1,
            bond_quote: 0.5,
            max_bond_price: 500.0,
            max_bond_price_token: 1_000.0,
            total_bond_debt: 40_000.0,
            max_debt: 100_000.0,
            vesting_term: 432_000,
            internal_price_raw: 1_100.0,
            purchased: 250_000.0,
            quote_exceeds_max: false,
            price_unavailable: false,
        }
    }

    #[test]
    fn test_deposit_blocked_at_debt_ceiling() {
        let mut v = sample_valuation();
        assert!(!v.deposit_blocked());

        v.total_bond_debt = 100_000.0;
        assert!(v.deposit_blocked());
        v.total_bond_debt = 120_000.0;
        assert!(v.deposit_blocked());

        // an unreported ceiling never blocks
        v.max_debt = 0.0;
        assert!(!v.deposit_blocked());
    }
}
