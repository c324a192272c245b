//! Chain access layer: typed contract interfaces plus the batching client.

mod abi;
mod client;

pub use abi::{
    IBondDepository, IBondingCalculator, IERC20, IMulticall3, IStakedToken, IStaking,
    ISupplyController, IUniswapV2Pair,
};
pub use client::{call3, decode_slot, ChainClient, MULTICALL3};
