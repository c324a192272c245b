//! Wallet-scoped reads
//!
//! Balances, staking allowances and open bond positions for one address.
//! A zeroed address short-circuits to an empty snapshot before any RPC
//! goes out, so disconnected-wallet flows cost nothing.

use alloy_primitives::{Address, U256};

use crate::bonds::BondDescriptor;
use crate::chain::{call3, decode_slot, ChainClient, IBondDepository, IERC20};
use crate::error::MetricsError;
use crate::registry::{self, to_units, Network, RESERVE_DECIMALS, REWARD_DECIMALS, ZapToken};

// ============================================
// TYPES
// ============================================

#[derive(Debug, Clone, Copy, Default)]
pub struct AccountBalances {
    pub lux: f64,
    pub lum: f64,
    pub wlum: f64,
}

/// Raw allowances toward the three staking surfaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct StakingAllowances {
    /// LUX approved for the staking helper.
    pub stake: U256,
    /// LUM approved for the staking contract.
    pub unstake: U256,
    /// LUM approved for the wrapper.
    pub wrap: U256,
}

#[derive(Debug, Clone, Copy)]
pub struct AccountSnapshot {
    pub address: Address,
    pub balances: AccountBalances,
    pub allowances: StakingAllowances,
}

impl AccountSnapshot {
    fn empty(address: Address) -> Self {
        Self {
            address,
            balances: AccountBalances::default(),
            allowances: StakingAllowances::default(),
        }
    }
}

/// One wallet's standing in one depository.
#[derive(Debug, Clone)]
pub struct UserBondPosition {
    pub bond: String,
    /// LUX still vesting.
    pub interest_due: f64,
    /// Unix seconds when the position is fully vested.
    pub maturation_time: u64,
    /// LUX claimable right now.
    pub pending_payout: f64,
    /// Reserve approved for the depository.
    pub allowance: U256,
    /// Wallet balance of the reserve, in units.
    pub reserve_balance: f64,
    /// Native FTM balance, in units.
    pub native_balance: f64,
}

impl UserBondPosition {
    fn empty(bond: &str) -> Self {
        Self {
            bond: bond.to_string(),
            interest_due: 0.0,
            maturation_time: 0,
            pending_payout: 0.0,
            allowance: U256::ZERO,
            reserve_balance: 0.0,
            native_balance: 0.0,
        }
    }
}

/// Zap-input standing: balance plus router allowance.
#[derive(Debug, Clone)]
pub struct UserTokenDetails {
    pub symbol: String,
    pub balance: f64,
    /// None for the native coin, which needs no approval.
    pub allowance: Option<U256>,
}

// ============================================
// PURE HELPERS
// ============================================

/// Fold a raw bondInfo record into display units.
fn position_parts(payout: U256, vesting: U256, last_time: U256, pending: U256) -> (f64, u64, f64) {
    let interest_due = to_units(payout, REWARD_DECIMALS);
    let maturation = vesting.to::<u64>().saturating_add(last_time.to::<u64>());
    let pending_payout = to_units(pending, REWARD_DECIMALS);
    (interest_due, maturation, pending_payout)
}

// ============================================
// READS
// ============================================

/// Balances and staking allowances in one batch.
pub async fn load_account(
    client: &ChainClient,
    network: Network,
    who: Address,
) -> Result<AccountSnapshot, MetricsError> {
    if who.is_zero() {
        return Ok(AccountSnapshot::empty(who));
    }
    let book = registry::book(network)?;

    let batch = client
        .multicall(vec![
            call3(book.lux, IERC20::balanceOfCall { account: who }),
            call3(book.lum, IERC20::balanceOfCall { account: who }),
            call3(book.wlum, IERC20::balanceOfCall { account: who }),
            call3(
                book.lux,
                IERC20::allowanceCall {
                    owner: who,
                    spender: book.staking_helper,
                },
            ),
            call3(
                book.lum,
                IERC20::allowanceCall {
                    owner: who,
                    spender: book.staking,
                },
            ),
            call3(
                book.lum,
                IERC20::allowanceCall {
                    owner: who,
                    spender: book.wlum,
                },
            ),
        ])
        .await?;

    let balance = |idx: usize, what: &str| -> Result<U256, MetricsError> {
        decode_slot::<IERC20::balanceOfCall>(&batch[idx])
            .ok_or_else(|| MetricsError::Provider(format!("{} read failed", what)))
    };
    let approval = |idx: usize, what: &str| -> Result<U256, MetricsError> {
        decode_slot::<IERC20::allowanceCall>(&batch[idx])
            .ok_or_else(|| MetricsError::Provider(format!("{} read failed", what)))
    };

    Ok(AccountSnapshot {
        address: who,
        balances: AccountBalances {
            lux: to_units(balance(0, "LUX balance")?, REWARD_DECIMALS),
            lum: to_units(balance(1, "LUM balance")?, REWARD_DECIMALS),
            wlum: to_units(balance(2, "wLUM balance")?, RESERVE_DECIMALS),
        },
        allowances: StakingAllowances {
            stake: approval(3, "stake allowance")?,
            unstake: approval(4, "unstake allowance")?,
            wrap: approval(5, "wrap allowance")?,
        },
    })
}

/// A wallet's position in one depository: vesting state, claimables, and
/// what it could still deposit.
pub async fn user_bond_position(
    client: &ChainClient,
    network: Network,
    bond: &BondDescriptor,
    who: Address,
) -> Result<UserBondPosition, MetricsError> {
    if who.is_zero() {
        return Ok(UserBondPosition::empty(bond.name));
    }
    let depository = bond.address_for_bond(network)?;
    let reserve = bond.address_for_reserve(network)?;

    let batch = client
        .multicall(vec![
            call3(depository, IBondDepository::bondInfoCall { depositor: who }),
            call3(
                depository,
                IBondDepository::pendingPayoutForCall { depositor: who },
            ),
            call3(
                reserve,
                IERC20::allowanceCall {
                    owner: who,
                    spender: depository,
                },
            ),
            call3(reserve, IERC20::balanceOfCall { account: who }),
        ])
        .await?;

    let info = decode_slot::<IBondDepository::bondInfoCall>(&batch[0])
        .ok_or_else(|| MetricsError::Provider(format!("bondInfo failed for {}", bond.name)))?;
    let pending = decode_slot::<IBondDepository::pendingPayoutForCall>(&batch[1])
        .ok_or_else(|| MetricsError::Provider(format!("pendingPayout failed for {}", bond.name)))?;
    let allowance = decode_slot::<IERC20::allowanceCall>(&batch[2])
        .ok_or_else(|| MetricsError::Provider(format!("allowance failed for {}", bond.name)))?;
    let reserve_balance = decode_slot::<IERC20::balanceOfCall>(&batch[3])
        .ok_or_else(|| MetricsError::Provider(format!("reserve balance failed for {}", bond.name)))?;

    let (interest_due, maturation_time, pending_payout) =
        position_parts(info.payout, info.vesting, info.lastTime, pending);
    let native = client.native_balance(who).await?;

    Ok(UserBondPosition {
        bond: bond.name.to_string(),
        interest_due,
        maturation_time,
        pending_payout,
        allowance,
        reserve_balance: to_units(reserve_balance, RESERVE_DECIMALS),
        native_balance: to_units(native, RESERVE_DECIMALS),
    })
}

/// Balance and zap-router allowance for one input token.
pub async fn user_token_details(
    client: &ChainClient,
    network: Network,
    token: &ZapToken,
    who: Address,
) -> Result<UserTokenDetails, MetricsError> {
    if who.is_zero() {
        return Ok(UserTokenDetails {
            symbol: token.symbol.to_string(),
            balance: 0.0,
            allowance: if token.address.is_some() {
                Some(U256::ZERO)
            } else {
                None
            },
        });
    }
    let book = registry::book(network)?;

    match token.address {
        None => {
            let native = client.native_balance(who).await?;
            Ok(UserTokenDetails {
                symbol: token.symbol.to_string(),
                balance: to_units(native, token.decimals),
                allowance: None,
            })
        }
        Some(addr) => {
            let batch = client
                .multicall(vec![
                    call3(addr, IERC20::balanceOfCall { account: who }),
                    call3(
                        addr,
                        IERC20::allowanceCall {
                            owner: who,
                            spender: book.zap_router,
                        },
                    ),
                ])
                .await?;
            let balance = decode_slot::<IERC20::balanceOfCall>(&batch[0]).ok_or_else(|| {
                MetricsError::Provider(format!("{} balance read failed", token.symbol))
            })?;
            let allowance = decode_slot::<IERC20::allowanceCall>(&batch[1]).ok_or_else(|| {
                MetricsError::Provider(format!("{} allowance read failed", token.symbol))
            })?;
            Ok(UserTokenDetails {
                symbol: token.symbol.to_string(),
                balance: to_units(balance, token.decimals),
                allowance: Some(allowance),
            })
        }
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bonds;

    #[test]
    fn test_position_parts_units() {
        let payout = U256::from(12_500_000_000u64); // 12.5 LUX
        let vesting = U256::from(302_400u64); // 3.5 days
        let last_time = U256::from(1_700_000_000u64);
        let pending = U256::from(2_000_000_000u64); // 2 LUX

        let (due, maturation, claimable) = position_parts(payout, vesting, last_time, pending);
        assert!((due - 12.5).abs() < 1e-12);
        assert_eq!(maturation, 1_700_302_400);
        assert!((claimable - 2.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_zero_address_skips_account_reads() {
        // bogus endpoint: the early return means it is never dialed
        let client = ChainClient::new("http://localhost:1");
        let snapshot = load_account(&client, Network::Fantom, Address::ZERO)
            .await
            .unwrap();
        assert_eq!(snapshot.balances.lux, 0.0);
        assert_eq!(snapshot.allowances.stake, U256::ZERO);
    }

    #[tokio::test]
    async fn test_zero_address_skips_bond_reads() {
        let client = ChainClient::new("http://localhost:1");
        let bond = bonds::get_bond("dai").unwrap();
        let position = user_bond_position(&client, Network::Fantom, &bond, Address::ZERO)
            .await
            .unwrap();
        assert_eq!(position.bond, "dai");
        assert_eq!(position.interest_due, 0.0);
        assert_eq!(position.pending_payout, 0.0);
    }

    #[tokio::test]
    async fn test_zero_address_token_details() {
        let client = ChainClient::new("http://localhost:1");
        let book = registry::book(Network::Fantom).unwrap();
        let tokens = registry::zap_tokens(book);

        let native = tokens.iter().find(|t| t.address.is_none()).unwrap();
        let details = user_token_details(&client, Network::Fantom, native, Address::ZERO)
            .await
            .unwrap();
        assert!(details.allowance.is_none());
        assert_eq!(details.balance, 0.0);

        let dai = tokens.iter().find(|t| t.symbol == "DAI").unwrap();
        let details = user_token_details(&client, Network::Fantom, dai, Address::ZERO)
            .await
            .unwrap();
        assert_eq!(details.allowance, Some(U256::ZERO));
    }

    #[tokio::test]
    async fn test_unsupported_network_rejected_before_dialing() {
        let client = ChainClient::new("http://localhost:1");
        let who = Address::repeat_byte(0x11);
        let err = load_account(&client, Network::Bsc, who).await.unwrap_err();
        assert_eq!(
            err,
            MetricsError::UnsupportedNetwork {
                network: Network::Bsc
            }
        );
    }
}
