//! Bond depository catalog
//!
//! Sixteen live depositories: DAI, wFTM, LUX-DAI LP and LUX-FTM LP, each in
//! instant / 7 / 14 / 28 day vesting flavors. The descriptor carries the
//! per-network deployment plus the two switches that drive all downstream
//! math: whether the reserve is an LP share, and which asset quotes it.

use alloy_primitives::{address, Address, U256};

use crate::error::MetricsError;
use crate::registry::{to_units, Network, RESERVE_DECIMALS, REWARD_DECIMALS};

// ============================================
// RESERVE ASSETS
// ============================================

const DAI_RESERVE: Address = address!("8D11eC38a3EB5E956B052f67Da8Bdc9bef8Abf3E");
const WFTM_RESERVE: Address = address!("21be370D5312f44cB42ce377BC9b8a0cEF1A4C83");
const LUX_DAI_PAIR: Address = address!("46729c2AeeabE7774a0E710867df80a6E19Ef851");
const LUX_FTM_PAIR: Address = address!("951BBB838e49F7081072895947735b0892cCcbCD");

const SOULSWAP_LUX_DAI: &str =
    "https://app.soulswap.finance/add/0x8D11eC38a3EB5E956B052f67Da8Bdc9bef8Abf3E/0x6671E20b83Ba463F270c8c75dAe57e3Cc246cB2b";
const SOULSWAP_LUX_FTM: &str =
    "https://app.soulswap.finance/add/FTM/0x6671E20b83Ba463F270c8c75dAe57e3Cc246cB2b";

// ============================================
// DESCRIPTOR
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BondKind {
    /// Single reserve asset, deposited raw.
    Stable,
    /// UniswapV2 LP share, priced through the bonding calculator.
    Lp,
}

impl BondKind {
    /// payoutFor scales 1e18 against raw reserve amounts and 1e9 against
    /// calculator valuations.
    pub fn quote_decimals(&self) -> u32 {
        match self {
            BondKind::Stable => RESERVE_DECIMALS,
            BondKind::Lp => REWARD_DECIMALS,
        }
    }
}

impl std::fmt::Display for BondKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BondKind::Stable => write!(f, "Stable"),
            BondKind::Lp => write!(f, "LP"),
        }
    }
}

/// Asset the depository quotes in. FTM-quoted depositories report prices
/// and holdings that need a USD conversion before display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteAsset {
    Dai,
    Ftm,
}

impl QuoteAsset {
    pub fn symbol(&self) -> &'static str {
        match self {
            QuoteAsset::Dai => "DAI",
            QuoteAsset::Ftm => "FTM",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BondDeployment {
    pub bond: Address,
    pub reserve: Address,
}

#[derive(Debug, Clone)]
pub struct BondDescriptor {
    pub name: &'static str,
    pub display_name: &'static str,
    pub kind: BondKind,
    pub quote: QuoteAsset,
    pub deployments: Vec<(Network, BondDeployment)>,
    /// Reserve capital farmed outside the treasury wallet, raw 1e18.
    pub tokens_in_strategy: U256,
    pub lp_url: Option<&'static str>,
}

impl BondDescriptor {
    /// Resolve this bond's deployment, rejecting absent or zeroed entries.
    pub fn deployment(&self, network: Network) -> Result<BondDeployment, MetricsError> {
        self.deployments
            .iter()
            .find(|(n, _)| *n == network)
            .map(|(_, d)| *d)
            .filter(|d| !d.bond.is_zero() && !d.reserve.is_zero())
            .ok_or(MetricsError::UnsupportedNetwork { network })
    }

    pub fn address_for_bond(&self, network: Network) -> Result<Address, MetricsError> {
        self.deployment(network).map(|d| d.bond)
    }

    pub fn address_for_reserve(&self, network: Network) -> Result<Address, MetricsError> {
        self.deployment(network).map(|d| d.reserve)
    }

    pub fn is_lp(&self) -> bool {
        self.kind == BondKind::Lp
    }

    /// Symbol of the asset a depositor pays with.
    pub fn bond_token(&self) -> &'static str {
        self.quote.symbol()
    }

    /// Symbol of the asset a depositor vests into.
    pub fn reward_token(&self) -> &'static str {
        "LUX"
    }

    /// bondPriceInUSD on the LUX-FTM depositories actually reports an
    /// FTM-denominated price.
    pub fn price_quoted_in_ftm(&self) -> bool {
        self.kind == BondKind::Lp && self.quote == QuoteAsset::Ftm
    }

    /// Treasury holdings of FTM-side reserves are valued through the FTM
    /// price, LP and stable alike.
    pub fn purchased_valued_in_ftm(&self) -> bool {
        self.quote == QuoteAsset::Ftm
    }
}

// ============================================
// CATALOG
// ============================================

fn fantom_bond(
    name: &'static str,
    display_name: &'static str,
    kind: BondKind,
    quote: QuoteAsset,
    bond: Address,
    reserve: Address,
    lp_url: Option<&'static str>,
) -> BondDescriptor {
    BondDescriptor {
        name,
        display_name,
        kind,
        quote,
        deployments: vec![(Network::Fantom, BondDeployment { bond, reserve })],
        tokens_in_strategy: U256::ZERO,
        lp_url,
    }
}

/// Every depository the protocol has shipped, in dashboard order.
pub fn all_bonds() -> Vec<BondDescriptor> {
    use BondKind::*;
    use QuoteAsset::*;

    vec![
        fantom_bond("dai", "DAI", Stable, Dai,
            address!("Cf994423b39A6991e82443a8011Bf6749e19434b"), DAI_RESERVE, None),
        fantom_bond("dai7", "DAI 7-Day", Stable, Dai,
            address!("80C61168e1F02e1835b541e9Ca6Bb3416a36Af6F"), DAI_RESERVE, None),
        fantom_bond("dai14", "DAI 14-Day", Stable, Dai,
            address!("73eE5Fcd1336246C74f6448B1d528aeacF5404f2"), DAI_RESERVE, None),
        fantom_bond("dai28", "DAI 28-Day", Stable, Dai,
            address!("1a7bA76b2A421E0E730809C40bE4a685dE29307c"), DAI_RESERVE, None),
        fantom_bond("dai_lux_lp", "LUX-DAI LP", Lp, Dai,
            address!("5612d83dfED9B387c925Ac4D19ED3aeDd71004A8"), LUX_DAI_PAIR, Some(SOULSWAP_LUX_DAI)),
        fantom_bond("dai_lux_lp7", "LUX-DAI LP 7-Day", Lp, Dai,
            address!("aC64DC47A1fe52458D3418AC7C568Edc3306130a"), LUX_DAI_PAIR, Some(SOULSWAP_LUX_DAI)),
        fantom_bond("dai_lux_lp14", "LUX-DAI LP 14-Day", Lp, Dai,
            address!("aFADcDca5Aa1F187B357499f2e3BA94D3Cc32ad1"), LUX_DAI_PAIR, Some(SOULSWAP_LUX_DAI)),
        fantom_bond("dai_lux_lp28", "LUX-DAI LP 28-Day", Lp, Dai,
            address!("AE08cf625d4232935D2F1b331517aC0089163DB2"), LUX_DAI_PAIR, Some(SOULSWAP_LUX_DAI)),
        fantom_bond("ftm_lux_lp", "LUX-FTM LP", Lp, Ftm,
            address!("aBAD60240f1a39fce0d828eecf54d790FFF92cec"), LUX_FTM_PAIR, Some(SOULSWAP_LUX_FTM)),
        fantom_bond("ftm_lux_lp7", "LUX-FTM LP 7-Day", Lp, Ftm,
            address!("8dF4f6e20C64DA8DAFC8c43E434f2cFda9C3FCAE"), LUX_FTM_PAIR, Some(SOULSWAP_LUX_FTM)),
        fantom_bond("ftm_lux_lp14", "LUX-FTM LP 14-Day", Lp, Ftm,
            address!("0A98e728f0537f40e8dC261D633fe4a00E1aFA72"), LUX_FTM_PAIR, Some(SOULSWAP_LUX_FTM)),
        fantom_bond("ftm_lux_lp28", "LUX-FTM LP 28-Day", Lp, Ftm,
            address!("AbeEd495A87fccc2988F0CdaCf314F23AF52B685"), LUX_FTM_PAIR, Some(SOULSWAP_LUX_FTM)),
        fantom_bond("wftm", "wFTM", Stable, Ftm,
            address!("13729e99A7b77469f7FD204495a7b49e25e8444a"), WFTM_RESERVE, None),
        fantom_bond("wftm7", "wFTM 7-Day", Stable, Ftm,
            address!("376969e00621Ebf685fC3D1F216C00d19B162923"), WFTM_RESERVE, None),
        fantom_bond("wftm14", "wFTM 14-Day", Stable, Ftm,
            address!("c421072646C51FF8983714F28e4253ad8B44bb1E"), WFTM_RESERVE, None),
        fantom_bond("wftm28", "wFTM 28-Day", Stable, Ftm,
            address!("89EA4331183730F289DEAfc926cF0541364F169D"), WFTM_RESERVE, None),
    ]
}

pub fn get_bond(name: &str) -> Option<BondDescriptor> {
    all_bonds().into_iter().find(|b| b.name == name)
}

/// Bonds with a live deployment on the given network.
pub fn bonds_for(network: Network) -> Vec<BondDescriptor> {
    all_bonds()
        .into_iter()
        .filter(|b| b.deployment(network).is_ok())
        .collect()
}

// ============================================
// BOND MATH
// ============================================

/// Discount of the depository's ask against the open market, as a signed
/// fraction. `raw_bond_price` is the 1e18 fixed point bondPriceInUSD
/// reports; a negative result means the bond trades above market.
pub fn compute_discount(market_price_usd: f64, raw_bond_price: f64) -> Option<f64> {
    if !raw_bond_price.is_finite() || raw_bond_price <= 0.0 {
        return None;
    }
    Some((market_price_usd * 1e18 - raw_bond_price) / raw_bond_price)
}

/// Deposit size that would hit the payout cap, anchored on a one-unit probe
/// quote. The bonding curve is only locally linear, so this over-estimates
/// for large deposits.
pub fn compute_max_purchasable(max_payout: f64, probe_quote: f64) -> Result<f64, MetricsError> {
    if !probe_quote.is_finite() || probe_quote <= 0.0 {
        return Err(MetricsError::InvalidAmount(format!(
            "probe quote of {} cannot anchor a payout estimate",
            probe_quote
        )));
    }
    Ok(max_payout / probe_quote)
}

/// Treasury holdings of a stable reserve, in reserve units.
pub fn stable_purchased_units(balance: U256, in_strategy: U256) -> f64 {
    to_units(balance.saturating_add(in_strategy), RESERVE_DECIMALS)
}

/// USD value of treasury-held LP, from the calculator's markdown price and
/// its LUX-denominated valuation of the position.
pub fn lp_purchased_usd(markdown: U256, valuation: U256) -> f64 {
    to_units(markdown, RESERVE_DECIMALS) * to_units(valuation, REWARD_DECIMALS)
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;

    #[test]
    fn test_catalog_has_all_sixteen() {
        let bonds = all_bonds();
        assert_eq!(bonds.len(), 16);
        assert_eq!(bonds.iter().filter(|b| b.is_lp()).count(), 8);
        assert_eq!(
            bonds.iter().filter(|b| b.quote == QuoteAsset::Ftm).count(),
            8
        );
        assert_eq!(bonds[0].name, "dai");
        assert_eq!(bonds[15].name, "wftm28");
    }

    #[test]
    fn test_catalog_names_unique() {
        let bonds = all_bonds();
        for (i, a) in bonds.iter().enumerate() {
            for b in bonds.iter().skip(i + 1) {
                assert_ne!(a.name, b.name);
                assert_ne!(a.address_for_bond(Network::Fantom), b.address_for_bond(Network::Fantom));
            }
        }
    }

    #[test]
    fn test_catalog_reserves_match_registry() {
        let book = registry::book(Network::Fantom).unwrap();
        let dai = get_bond("dai").unwrap();
        assert_eq!(dai.address_for_reserve(Network::Fantom).unwrap(), book.dai);

        let lp = get_bond("dai_lux_lp").unwrap();
        assert_eq!(
            lp.address_for_reserve(Network::Fantom).unwrap(),
            book.lux_dai_pair.address
        );

        let ftm_lp = get_bond("ftm_lux_lp28").unwrap();
        assert_eq!(
            ftm_lp.address_for_reserve(Network::Fantom).unwrap(),
            book.lux_ftm_pair.address
        );

        let wftm = get_bond("wftm14").unwrap();
        assert_eq!(wftm.address_for_reserve(Network::Fantom).unwrap(), book.wftm);
    }

    #[test]
    fn test_deployment_resolution_per_network() {
        let bond = get_bond("dai").unwrap();
        assert!(bond.deployment(Network::Fantom).is_ok());
        assert_eq!(
            bond.deployment(Network::Bsc).unwrap_err(),
            MetricsError::UnsupportedNetwork {
                network: Network::Bsc
            }
        );
        assert!(bonds_for(Network::Bsc).is_empty());
        assert_eq!(bonds_for(Network::Fantom).len(), 16);
    }

    #[test]
    fn test_zeroed_deployment_entry_is_not_a_deployment() {
        // a table entry carrying zero addresses must resolve like an
        // absent one, never as a usable address
        let mut bond = get_bond("dai").unwrap();
        bond.deployments.push((
            Network::Bsc,
            BondDeployment {
                bond: Address::ZERO,
                reserve: Address::ZERO,
            },
        ));

        assert_eq!(
            bond.address_for_bond(Network::Bsc).unwrap_err(),
            MetricsError::UnsupportedNetwork {
                network: Network::Bsc
            }
        );
        assert_eq!(
            bond.address_for_reserve(Network::Bsc).unwrap_err(),
            MetricsError::UnsupportedNetwork {
                network: Network::Bsc
            }
        );
        // the Fantom entry still resolves
        assert!(bond.address_for_bond(Network::Fantom).is_ok());
    }

    #[test]
    fn test_ftm_conversion_flags() {
        let wftm = get_bond("wftm").unwrap();
        assert!(wftm.purchased_valued_in_ftm());
        assert!(!wftm.price_quoted_in_ftm());

        let ftm_lp = get_bond("ftm_lux_lp").unwrap();
        assert!(ftm_lp.purchased_valued_in_ftm());
        assert!(ftm_lp.price_quoted_in_ftm());

        let dai_lp = get_bond("dai_lux_lp").unwrap();
        assert!(!dai_lp.purchased_valued_in_ftm());
        assert!(!dai_lp.price_quoted_in_ftm());
    }

    #[test]
    fn test_token_symbols() {
        for bond in all_bonds() {
            assert_eq!(bond.reward_token(), "LUX");
            match bond.quote {
                QuoteAsset::Dai => assert_eq!(bond.bond_token(), "DAI"),
                QuoteAsset::Ftm => assert_eq!(bond.bond_token(), "FTM"),
            }
        }
    }

    #[test]
    fn test_discount_ten_percent() {
        // market $1.10, bond asking $1.00
        let d = compute_discount(1.10, 1e18).unwrap();
        assert!((d - 0.10).abs() < 1e-9);
    }

    #[test]
    fn test_discount_negative_when_bond_above_market() {
        let d = compute_discount(0.90, 1e18).unwrap();
        assert!(d < 0.0);
        assert!((d + 0.10).abs() < 1e-9);
    }

    #[test]
    fn test_discount_undefined_for_bad_price() {
        assert!(compute_discount(1.10, 0.0).is_none());
        assert!(compute_discount(1.10, -5.0).is_none());
        assert!(compute_discount(1.10, f64::NAN).is_none());
    }

    #[test]
    fn test_max_purchasable_linear_estimate() {
        // cap of 1000 LUX, one deposit unit quoting 2 LUX
        let max = compute_max_purchasable(1000.0, 2.0).unwrap();
        assert!((max - 500.0).abs() < 1e-9);
    }

    #[test]
    fn test_max_purchasable_rejects_dead_probe() {
        let err = compute_max_purchasable(1000.0, 0.0).unwrap_err();
        assert!(matches!(err, MetricsError::InvalidAmount(_)));
        assert!(compute_max_purchasable(1000.0, f64::NAN).is_err());
    }

    #[test]
    fn test_quote_decimals_by_kind() {
        assert_eq!(BondKind::Stable.quote_decimals(), 18);
        assert_eq!(BondKind::Lp.quote_decimals(), 9);
    }

    #[test]
    fn test_stable_purchased_adds_strategy_capital() {
        let balance = U256::from(5_000_000_000_000_000_000u128); // 5.0
        let strategy = U256::from(1_500_000_000_000_000_000u128); // 1.5
        let units = stable_purchased_units(balance, strategy);
        assert!((units - 6.5).abs() < 1e-12);
    }

    #[test]
    fn test_lp_purchased_usd() {
        // markdown $2.00 per LP unit, valuation 300 LUX
        let markdown = U256::from(2_000_000_000_000_000_000u128);
        let valuation = U256::from(300_000_000_000u64);
        let usd = lp_purchased_usd(markdown, valuation);
        assert!((usd - 600.0).abs() < 1e-9);
    }
}
