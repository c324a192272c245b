//! Contract interfaces
//!
//! Only the read surface the engine actually touches. Multi-value returns
//! keep their on-chain names so decode sites stay greppable against the
//! deployed ABIs.

use alloy_sol_types::sol;

sol! {
    /// Canonical batching contract, same address on every EVM chain.
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (Result[] memory returnData);
    }
}

sol! {
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function totalSupply() external view returns (uint256);
    }

    /// Rebasing staked token (LUM).
    interface IStakedToken {
        function circulatingSupply() external view returns (uint256);
    }

    interface IUniswapV2Pair {
        function getReserves() external view returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
    }
}

sol! {
    interface IBondDepository {
        function terms() external view returns (
            uint256 controlVariable,
            uint256 vestingTerm,
            uint256 minimumPrice,
            uint256 maxPayout,
            uint256 fee,
            uint256 maxDebt
        );
        function maxPayout() external view returns (uint256);
        function totalDebt() external view returns (uint256);
        function bondPrice() external view returns (uint256);
        function bondPriceInUSD() external view returns (uint256);
        function payoutFor(uint256 value) external view returns (uint256);
        function bondInfo(address depositor) external view returns (
            uint256 payout,
            uint256 vesting,
            uint256 lastTime,
            uint256 pricePaid
        );
        function pendingPayoutFor(address depositor) external view returns (uint256 pendingPayout);
    }

    /// Prices LP shares for the LP depositories.
    interface IBondingCalculator {
        function valuation(address pair, uint256 amount) external view returns (uint256);
        function markdown(address pair) external view returns (uint256);
    }

    interface IStaking {
        function epoch() external view returns (
            uint256 number,
            uint256 distribute,
            uint32 length,
            uint32 endTime
        );
        function index() external view returns (uint256);
    }

    interface ISupplyController {
        function mintableLuxor() external view returns (uint256);
    }
}
