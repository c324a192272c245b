//! JSON-RPC read client
//!
//! All protocol reads funnel through here: batched eth_calls via
//! Multicall3 with per-slot failure isolation, plus single reads for calls
//! whose arguments depend on an earlier result.

use alloy_primitives::{address, Address, U256};
use alloy_provider::{Provider, ProviderBuilder};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::SolCall;
use futures::future::join_all;
use tracing::debug;

use crate::chain::abi::IMulticall3;
use crate::error::MetricsError;

// ============================================
// CONSTANTS
// ============================================

/// Multicall3, deployed at the same address on all EVM chains.
pub const MULTICALL3: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

/// Oversized batches are split and issued concurrently.
const MAX_CALLS_PER_BATCH: usize = 100;

// ============================================
// CALL HELPERS
// ============================================

/// Wrap a typed call into an allow-failure Multicall3 slot.
pub fn call3<C: SolCall>(target: Address, call: C) -> IMulticall3::Call3 {
    IMulticall3::Call3 {
        target,
        allowFailure: true,
        callData: call.abi_encode().into(),
    }
}

/// Decode one batch slot. Reverted or empty slots become None; the caller
/// decides whether that particular read was load-bearing.
pub fn decode_slot<C: SolCall>(slot: &IMulticall3::Result) -> Option<C::Return> {
    if !slot.success || slot.returnData.is_empty() {
        return None;
    }
    C::abi_decode_returns(&slot.returnData).ok()
}

// ============================================
// CLIENT
// ============================================

#[derive(Debug, Clone)]
pub struct ChainClient {
    rpc_url: String,
}

impl ChainClient {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
        }
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Execute a batch of reads in one round trip per hundred calls.
    /// Slot order matches call order across chunk boundaries.
    pub async fn multicall(
        &self,
        calls: Vec<IMulticall3::Call3>,
    ) -> Result<Vec<IMulticall3::Result>, MetricsError> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        let total = calls.len();
        let chunks: Vec<Vec<IMulticall3::Call3>> = calls
            .chunks(MAX_CALLS_PER_BATCH)
            .map(|c| c.to_vec())
            .collect();

        let batches = join_all(chunks.into_iter().map(|chunk| self.aggregate(chunk))).await;

        let mut results = Vec::with_capacity(total);
        for batch in batches {
            results.extend(batch?);
        }
        debug!("multicall: {} slots in {} batch(es)", total, (total + MAX_CALLS_PER_BATCH - 1) / MAX_CALLS_PER_BATCH);
        Ok(results)
    }

    async fn aggregate(
        &self,
        calls: Vec<IMulticall3::Call3>,
    ) -> Result<Vec<IMulticall3::Result>, MetricsError> {
        let provider = ProviderBuilder::new().connect_http(
            self.rpc_url
                .parse()
                .map_err(|e| MetricsError::Provider(format!("invalid rpc url: {}", e)))?,
        );

        let calldata = IMulticall3::aggregate3Call { calls }.abi_encode();
        let tx = TransactionRequest::default()
            .to(MULTICALL3)
            .input(calldata.into());

        let raw = provider
            .call(tx)
            .await
            .map_err(|e| MetricsError::Provider(format!("multicall failed: {}", e)))?;

        IMulticall3::aggregate3Call::abi_decode_returns(&raw)
            .map_err(|e| MetricsError::Provider(format!("multicall decode failed: {}", e)))
    }

    /// Single read for calls whose arguments depend on an earlier result.
    pub async fn read<C: SolCall>(&self, target: Address, call: C) -> Result<C::Return, MetricsError> {
        let provider = ProviderBuilder::new().connect_http(
            self.rpc_url
                .parse()
                .map_err(|e| MetricsError::Provider(format!("invalid rpc url: {}", e)))?,
        );

        let tx = TransactionRequest::default()
            .to(target)
            .input(call.abi_encode().into());

        let raw = provider
            .call(tx)
            .await
            .map_err(|e| MetricsError::Provider(format!("call to {} failed: {}", target, e)))?;

        C::abi_decode_returns(&raw)
            .map_err(|e| MetricsError::Provider(format!("decode failed for {}: {}", target, e)))
    }

    /// Native coin balance of an account.
    pub async fn native_balance(&self, who: Address) -> Result<U256, MetricsError> {
        let provider = ProviderBuilder::new().connect_http(
            self.rpc_url
                .parse()
                .map_err(|e| MetricsError::Provider(format!("invalid rpc url: {}", e)))?,
        );

        provider
            .get_balance(who)
            .await
            .map_err(|e| MetricsError::Provider(format!("balance query failed: {}", e)))
    }

    pub async fn block_number(&self) -> Result<u64, MetricsError> {
        let provider = ProviderBuilder::new().connect_http(
            self.rpc_url
                .parse()
                .map_err(|e| MetricsError::Provider(format!("invalid rpc url: {}", e)))?,
        );

        provider
            .get_block_number()
            .await
            .map_err(|e| MetricsError::Provider(format!("block number query failed: {}", e)))
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::abi::{IERC20, IUniswapV2Pair};
    use alloy_primitives::Bytes;

    #[test]
    fn test_empty_multicall_is_a_no_op() {
        let client = ChainClient::new("http://localhost:1");
        let out = tokio_test::block_on(client.multicall(Vec::new())).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_call3_encodes_selector() {
        let slot = call3(MULTICALL3, IERC20::totalSupplyCall {});
        assert_eq!(slot.target, MULTICALL3);
        assert!(slot.allowFailure);
        // 4-byte selector, no arguments
        assert_eq!(slot.callData.len(), 4);
    }

    #[test]
    fn test_decode_slot_rejects_failed_calls() {
        let slot = IMulticall3::Result {
            success: false,
            returnData: Bytes::new(),
        };
        assert!(decode_slot::<IERC20::balanceOfCall>(&slot).is_none());

        let slot = IMulticall3::Result {
            success: true,
            returnData: Bytes::new(),
        };
        assert!(decode_slot::<IERC20::balanceOfCall>(&slot).is_none());
    }

    #[test]
    fn test_decode_slot_single_word() {
        let slot = IMulticall3::Result {
            success: true,
            returnData: U256::from(42u64).to_be_bytes::<32>().to_vec().into(),
        };
        let value = decode_slot::<IERC20::balanceOfCall>(&slot).unwrap();
        assert_eq!(value, U256::from(42u64));
    }

    #[test]
    fn test_decode_slot_multi_word_reserves() {
        let mut data = Vec::new();
        data.extend_from_slice(&U256::from(1_000u64).to_be_bytes::<32>());
        data.extend_from_slice(&U256::from(2_000u64).to_be_bytes::<32>());
        data.extend_from_slice(&U256::from(12_345u64).to_be_bytes::<32>());

        let slot = IMulticall3::Result {
            success: true,
            returnData: data.into(),
        };
        let r = decode_slot::<IUniswapV2Pair::getReservesCall>(&slot).unwrap();
        assert_eq!(r.reserve0.to::<u128>(), 1_000);
        assert_eq!(r.reserve1.to::<u128>(), 2_000);
        assert_eq!(r.blockTimestampLast, 12_345);
    }
}
