//! Network registry and address book
//!
//! Every contract the engine reads lives here, keyed by network. Address
//! resolution is the single choke point for "is this deployed": callers get
//! a typed error instead of a zero address.

use alloy_primitives::{address, Address, U256};

use crate::error::MetricsError;

// ============================================
// FIXED-POINT BASES
// ============================================

/// LUX, LUM and the staking index carry 9 decimals.
pub const REWARD_DECIMALS: u32 = 9;

/// Reserve assets and LP tokens carry 18 decimals.
pub const RESERVE_DECIMALS: u32 = 18;

/// Lossy conversion of a raw fixed-point integer to display units.
/// Values beyond u128 are clamped; nothing on this chain gets near that.
pub fn to_units(raw: U256, decimals: u32) -> f64 {
    let clamped: u128 = raw.min(U256::from(u128::MAX)).to::<u128>();
    clamped as f64 / 10f64.powi(decimals as i32)
}

// ============================================
// NETWORKS
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Fantom,
    Bsc,
}

impl Network {
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Fantom => 250,
            Network::Bsc => 56,
        }
    }

    pub fn from_chain_id(chain_id: u64) -> Option<Network> {
        match chain_id {
            250 => Some(Network::Fantom),
            56 => Some(Network::Bsc),
            _ => None,
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Network::Fantom => write!(f, "Fantom"),
            Network::Bsc => write!(f, "BSC"),
        }
    }
}

// ============================================
// ADDRESS BOOK
// ============================================

/// A LUX pair plus its token ordering. UniswapV2 sorts token0/token1 by
/// address, so which side is LUX is a fixed deployment fact per pair.
#[derive(Debug, Clone, Copy)]
pub struct PairInfo {
    pub address: Address,
    pub lux_is_token0: bool,
}

/// Full contract surface of one deployment.
#[derive(Debug, Clone)]
pub struct ChainBook {
    pub network: Network,

    // ========== Core protocol ==========
    pub treasury: Address,
    pub dao: Address,
    pub staking: Address,
    pub staking_helper: Address,
    pub bond_calculator: Address,
    pub supply_controller: Address,
    pub zap_router: Address,

    // ========== Tokens ==========
    pub lux: Address,
    pub lum: Address,
    pub wlum: Address,
    pub dai: Address,
    pub wftm: Address,
    pub weth: Address,

    // ========== LUX pairs ==========
    /// Pair the market price is read from (LUX-DAI).
    pub market_pair: PairInfo,
    pub lux_dai_pair: PairInfo,
    pub lux_ftm_pair: PairInfo,
    pub lux_soul_pair: PairInfo,

    // ========== Treasury investments ==========
    pub dai_ftm_pair: Address,
    pub eth_ftm_pair: Address,
    pub wlum_ftm_pair: Address,
    pub ftm_lend: Address,
    pub dai_lend: Address,
    pub eth_lend: Address,
}

impl ChainBook {
    /// Token ordering for a LUX pair, None for pairs we do not track.
    pub fn lux_is_token0(&self, pair: Address) -> Option<bool> {
        [self.lux_dai_pair, self.lux_ftm_pair, self.lux_soul_pair]
            .iter()
            .find(|p| p.address == pair)
            .map(|p| p.lux_is_token0)
    }
}

static FANTOM_BOOK: ChainBook = ChainBook {
    network: Network::Fantom,

    treasury: address!("db4d8a20c4a23f0fca47fb0ed45e1a7d4c57f3a9"),
    dao: address!("7cd0ee27e2194e1a7064602d0a7a42a79b5e2d38"),
    staking: address!("8a57f2e415bbcbf4a7b8a7a9b24e8e14c0d6e8c7"),
    staking_helper: address!("4e0ee60cd2e45c1fde35a15de57a6b42df8c09a3"),
    bond_calculator: address!("29ee5c47c84a4e399ddbf0c0c0eacd7f5a43c0db"),
    supply_controller: address!("5226d745a9733a24be3b71643a693de399262a7d"),
    zap_router: address!("f93b7fc04c7cdafe9b5c03ebf1a0e5cde5a8bbe4"),

    lux: address!("6671E20b83Ba463F270c8c75dAe57e3Cc246cB2b"),
    lum: address!("4290b33158F429F40C0eDc8f9b9e5d8C5288800c"),
    wlum: address!("a63d1de58a8a8e2d504db9b0eb9c6cc47ee70d9f"),
    dai: address!("8D11eC38a3EB5E956B052f67Da8Bdc9bef8Abf3E"),
    wftm: address!("21be370D5312f44cB42ce377BC9b8a0cEF1A4C83"),
    weth: address!("74b23882a30290451A17c44f4F05243b6b58C76d"),

    // LUX sorts below DAI, above WFTM and SOUL
    market_pair: PairInfo {
        address: address!("46729c2AeeabE7774a0E710867df80a6E19Ef851"),
        lux_is_token0: true,
    },
    lux_dai_pair: PairInfo {
        address: address!("46729c2AeeabE7774a0E710867df80a6E19Ef851"),
        lux_is_token0: true,
    },
    lux_ftm_pair: PairInfo {
        address: address!("951BBB838e49F7081072895947735b0892cCcbCD"),
        lux_is_token0: false,
    },
    lux_soul_pair: PairInfo {
        address: address!("9bcd1ae2ffe5e9a7c652ebdcb7e92c4a53baff25"),
        lux_is_token0: false,
    },

    dai_ftm_pair: address!("90469acbc4b6d877873cd4f1cca54fde8075a998"),
    eth_ftm_pair: address!("613bf4e46b4817015c01c6bb31c7ae9edaadc26e"),
    wlum_ftm_pair: address!("7051c6f0c1f14bc23cb4a2db559d426d8faab99f"),
    ftm_lend: address!("0dec85e74a92c52b7f708c4b10207d9560cefaf0"),
    dai_lend: address!("8d9749f569f2e94d60bd1bbfa58e4a7bc8743871"),
    eth_lend: address!("1e5e5ccf5e27a39e76f14c2e9baa8a70ca9e56d2"),
};

/// Resolve the address book for a network. BSC is recognized but has no
/// deployment, so it resolves to the same error a bogus network would.
pub fn book(network: Network) -> Result<&'static ChainBook, MetricsError> {
    match network {
        Network::Fantom => Ok(&FANTOM_BOOK),
        Network::Bsc => Err(MetricsError::UnsupportedNetwork { network }),
    }
}

// ============================================
// ZAP TOKEN CATALOG
// ============================================

/// Tokens accepted by the zap router. `address: None` marks the native coin.
#[derive(Debug, Clone, Copy)]
pub struct ZapToken {
    pub symbol: &'static str,
    pub address: Option<Address>,
    pub decimals: u32,
}

pub fn zap_tokens(book: &ChainBook) -> Vec<ZapToken> {
    vec![
        ZapToken {
            symbol: "DAI",
            address: Some(book.dai),
            decimals: 18,
        },
        ZapToken {
            symbol: "LUX",
            address: Some(book.lux),
            decimals: 9,
        },
        ZapToken {
            symbol: "LUM",
            address: Some(book.lum),
            decimals: 9,
        },
        ZapToken {
            symbol: "FTM",
            address: None,
            decimals: 18,
        },
        ZapToken {
            symbol: "WFTM",
            address: Some(book.wftm),
            decimals: 18,
        },
    ]
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_id_round_trip() {
        assert_eq!(Network::from_chain_id(250), Some(Network::Fantom));
        assert_eq!(Network::from_chain_id(56), Some(Network::Bsc));
        assert_eq!(Network::from_chain_id(1), None);
        assert_eq!(Network::Fantom.chain_id(), 250);
    }

    #[test]
    fn test_fantom_book_resolves() {
        let book = book(Network::Fantom).unwrap();
        assert_eq!(book.network, Network::Fantom);
        assert!(!book.treasury.is_zero());
        assert!(!book.lux.is_zero());
        assert_eq!(book.market_pair.address, book.lux_dai_pair.address);
    }

    #[test]
    fn test_bsc_has_no_deployment() {
        let err = book(Network::Bsc).unwrap_err();
        assert_eq!(
            err,
            MetricsError::UnsupportedNetwork {
                network: Network::Bsc
            }
        );
    }

    #[test]
    fn test_pair_orientation_lookup() {
        let book = book(Network::Fantom).unwrap();
        assert_eq!(book.lux_is_token0(book.lux_dai_pair.address), Some(true));
        assert_eq!(book.lux_is_token0(book.lux_ftm_pair.address), Some(false));
        assert_eq!(book.lux_is_token0(book.dai_ftm_pair), None);
    }

    #[test]
    fn test_to_units_nine_decimal_round_trip() {
        // 123.456789123 LUX as a raw gwei-scale integer
        let raw = U256::from(123_456_789_123u64);
        let units = to_units(raw, REWARD_DECIMALS);
        assert!((units - 123.456789123).abs() < 1e-12);

        let back = U256::from((units * 1e9).round() as u128);
        assert_eq!(back, raw);
    }

    #[test]
    fn test_to_units_eighteen_decimals() {
        let raw = U256::from(2_500_000_000_000_000_000u128);
        assert!((to_units(raw, RESERVE_DECIMALS) - 2.5).abs() < 1e-12);
        assert_eq!(to_units(U256::ZERO, RESERVE_DECIMALS), 0.0);
    }

    #[test]
    fn test_zap_token_catalog() {
        let book = book(Network::Fantom).unwrap();
        let tokens = zap_tokens(book);
        assert_eq!(tokens.len(), 5);

        let ftm = tokens.iter().find(|t| t.symbol == "FTM").unwrap();
        assert!(ftm.address.is_none());

        let lux = tokens.iter().find(|t| t.symbol == "LUX").unwrap();
        assert_eq!(lux.decimals, 9);
        assert_eq!(lux.address, Some(book.lux));
    }
}
