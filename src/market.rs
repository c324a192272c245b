//! Market price discovery
//!
//! LUX trades against DAI on SoulSwap; the spot price falls straight out
//! of the pair reserves. The raw ratio is DAI-wei per LUX-gwei, so USD
//! conversion folds in both the 9/18 decimal gap and the DAI peg.

use crate::chain::{ChainClient, IUniswapV2Pair};
use crate::error::MetricsError;
use crate::oracle::PriceOracle;
use crate::registry::{self, Network};

/// Quote-per-base ratio from raw pair reserves. None when either side is
/// empty, which happens on freshly seeded or drained pairs.
pub fn reserve_ratio(reserve0: u128, reserve1: u128, base_is_token0: bool) -> Option<f64> {
    let (base, quote) = if base_is_token0 {
        (reserve0, reserve1)
    } else {
        (reserve1, reserve0)
    };
    if base == 0 || quote == 0 {
        return None;
    }
    Some(quote as f64 / base as f64)
}

/// USD per LUX from the raw reserve ratio. LUX carries 9 decimals against
/// DAI's 18, so the ratio lands 1e9 hot before the peg correction.
pub fn usd_from_ratio(raw_ratio: f64, dai_price_usd: f64) -> f64 {
    raw_ratio / 1e9 * dai_price_usd
}

/// Raw DAI-per-LUX ratio read from the market pair.
pub async fn raw_market_ratio(
    client: &ChainClient,
    network: Network,
) -> Result<f64, MetricsError> {
    let book = registry::book(network)?;
    let pair = book.market_pair;

    let r = client
        .read(pair.address, IUniswapV2Pair::getReservesCall {})
        .await?;

    reserve_ratio(
        r.reserve0.to::<u128>(),
        r.reserve1.to::<u128>(),
        pair.lux_is_token0,
    )
    .ok_or(MetricsError::PriceUnavailable {
        symbol: "LUX".to_string(),
    })
}

/// Spot USD price of LUX. Needs a cached DAI price.
pub async fn market_price_usd(
    client: &ChainClient,
    oracle: &PriceOracle,
    network: Network,
) -> Result<f64, MetricsError> {
    let ratio = raw_market_ratio(client, network).await?;
    let dai = oracle.usd_price("DAI").await?;
    Ok(usd_from_ratio(ratio, dai))
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_respects_token_ordering() {
        // 50,000 LUX (1e9) against 110,000 DAI (1e18)
        let lux = 50_000_000_000_000u128;
        let dai = 110_000_000_000_000_000_000_000u128;

        let as_token0 = reserve_ratio(lux, dai, true).unwrap();
        let as_token1 = reserve_ratio(dai, lux, false).unwrap();
        assert!((as_token0 - as_token1).abs() < 1e-9);
        assert!((as_token0 - 2.2e9).abs() < 1.0);
    }

    #[test]
    fn test_empty_reserves_yield_no_price() {
        assert!(reserve_ratio(0, 1_000, true).is_none());
        assert!(reserve_ratio(1_000, 0, true).is_none());
        assert!(reserve_ratio(0, 0, false).is_none());
    }

    #[test]
    fn test_usd_conversion_bridges_decimal_gap() {
        // raw ratio 2.2e9 at a clean DAI peg
        let usd = usd_from_ratio(2.2e9, 1.0);
        assert!((usd - 2.2).abs() < 1e-9);

        // a 1% DAI depeg moves the quote with it
        let depegged = usd_from_ratio(2.2e9, 0.99);
        assert!((depegged - 2.178).abs() < 1e-9);
    }
}
