//! Diagnostic tool - Check environment and RPC health
//!
//! Run with: cargo run --bin diagnose

use alloy_primitives::{address, Address};
use alloy_sol_types::{sol, SolCall};
use std::env;

sol! {
    interface IUniswapV2Pair {
        function token0() external view returns (address);
        function token1() external view returns (address);
    }
}

/// Canonical Multicall3, same address on every EVM chain.
const MULTICALL3: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

const LUX: Address = address!("6671E20b83Ba463F270c8c75dAe57e3Cc246cB2b");
const LUX_DAI_PAIR: Address = address!("46729c2AeeabE7774a0E710867df80a6E19Ef851");

/// Fantom deployment, mirrored from the engine's address book.
const CORE_CONTRACTS: &[(&str, Address)] = &[
    ("Treasury", address!("db4d8a20c4a23f0fca47fb0ed45e1a7d4c57f3a9")),
    ("Staking", address!("8a57f2e415bbcbf4a7b8a7a9b24e8e14c0d6e8c7")),
    ("Bond calculator", address!("29ee5c47c84a4e399ddbf0c0c0eacd7f5a43c0db")),
    ("Supply controller", address!("5226d745a9733a24be3b71643a693de399262a7d")),
    ("LUX token", LUX),
    ("LUM token", address!("4290b33158F429F40C0eDc8f9b9e5d8C5288800c")),
    ("LUX-DAI pair", LUX_DAI_PAIR),
];

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    println!();
    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║             LUXWATCH ENVIRONMENT DIAGNOSTIC                ║");
    println!("╚════════════════════════════════════════════════════════════╝");
    println!();

    let mut issues: Vec<String> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    // ==========================================
    // CHECK 1: Configuration echo
    // ==========================================
    println!("📋 CONFIGURATION");
    println!();

    let checks = [
        ("CHAIN_ID", "250", "Target chain (250 = Fantom Opera)"),
        ("STRATEGY_DIVISOR", "4", "Bonded capital to LUX-side liquidity"),
        ("EPOCHS_PER_DAY", "3", "Rebases per day"),
        ("SECONDS_PER_EPOCH", "28800", "Epoch length"),
        ("SLIPPAGE", "0.005", "Deposit premium tolerance"),
        ("DEBOUNCE_MS", "1000", "Quiet window for amount edits"),
        ("REFRESH_INTERVAL_SECS", "600", "Watch mode cadence"),
        ("SNAPSHOT_LOG", "true", "Append JSON metric lines?"),
    ];

    for (key, default, desc) in checks {
        let value = env::var(key).unwrap_or_else(|_| default.to_string());
        let marker = if env::var(key).is_err() {
            "(default)"
        } else {
            "(from .env)"
        };
        println!("  {}: {} {}", key, value, marker);
        println!("    └─ {}\n", desc);
    }

    let rpc = env::var("RPC_URL").unwrap_or_else(|_| "https://rpc.ftm.tools".to_string());
    let rpc_display = if rpc.len() > 50 {
        format!("{}...{}", &rpc[..30], &rpc[rpc.len() - 15..])
    } else {
        rpc.clone()
    };
    println!("  RPC_URL: {}", rpc_display);

    let account = env::var("ACCOUNT_ADDRESS").unwrap_or_default();
    println!(
        "  ACCOUNT_ADDRESS: {}",
        if account.is_empty() {
            "not set (account phase skipped)"
        } else {
            account.as_str()
        }
    );

    // ==========================================
    // CHECK 2: RPC connection
    // ==========================================
    println!();
    println!("📡 CHECKING RPC CONNECTION...");

    let expected_chain: u64 = env::var("CHAIN_ID")
        .unwrap_or_else(|_| "250".to_string())
        .parse()
        .unwrap_or(250);

    if rpc.contains("YOUR_API_KEY") {
        issues.push("RPC_URL still carries the YOUR_API_KEY placeholder".to_string());
        println!("   ❌ RPC_URL: placeholder, not configured");
    } else {
        match check_rpc(&rpc).await {
            Ok((block, chain_id)) => {
                println!("   ✅ RPC connected, current block: {}", block);
                if chain_id == expected_chain {
                    println!("   ✅ Chain ID matches: {}", chain_id);
                } else {
                    issues.push(format!(
                        "chain ID mismatch: node reports {}, CHAIN_ID says {}",
                        chain_id, expected_chain
                    ));
                    println!(
                        "   ❌ Chain ID mismatch: node reports {}, CHAIN_ID says {}",
                        chain_id, expected_chain
                    );
                }
            }
            Err(e) => {
                issues.push(format!("RPC connection failed: {}", e));
                println!("   ❌ RPC connection failed: {}", e);
            }
        }

        match check_contract(&rpc, MULTICALL3).await {
            Ok(true) => println!("   ✅ Multicall3 deployed at {:?}", MULTICALL3),
            Ok(false) => {
                issues.push("Multicall3 has no code on this chain".to_string());
                println!(
                    "   ❌ Multicall3: NO CODE at {:?} - aggregation cannot work",
                    MULTICALL3
                );
            }
            Err(e) => {
                warnings.push(format!("could not verify Multicall3: {}", e));
                println!("   ⚠️  Multicall3: verification failed ({})", e);
            }
        }
    }

    // ==========================================
    // CHECK 3: Core contracts
    // ==========================================
    println!();
    println!("🏦 CHECKING CORE CONTRACTS...");

    if rpc.contains("YOUR_API_KEY") {
        println!("   ⚠️  Skipped, RPC not configured");
    } else if expected_chain != 250 {
        warnings.push(format!("no address book for chain {}", expected_chain));
        println!(
            "   ⚠️  No address book for chain {}, skipping",
            expected_chain
        );
    } else {
        for (name, addr) in CORE_CONTRACTS {
            match check_contract(&rpc, *addr).await {
                Ok(true) => println!("   ✅ {} at {:?}", name, addr),
                Ok(false) => {
                    issues.push(format!("{} has no code at {:?}", name, addr));
                    println!("   ❌ {}: NO CODE at {:?}", name, addr);
                }
                Err(e) => {
                    warnings.push(format!("could not verify {}: {}", name, e));
                    println!("   ⚠️  {}: verification failed ({})", name, e);
                }
            }
        }

        // The engine trusts the book's token ordering instead of querying
        // it per pass, so verify that fact holds on the live pair.
        match check_pair_sides(&rpc, LUX_DAI_PAIR).await {
            Ok((t0, _)) if t0 == LUX => {
                println!("   ✅ Market pair token0 is LUX, matching the address book");
            }
            Ok((t0, t1)) => {
                issues.push(format!(
                    "market pair ordering off: token0 {:?}, token1 {:?}",
                    t0, t1
                ));
                println!(
                    "   ❌ Market pair token0 {:?} is not LUX - price math would invert",
                    t0
                );
            }
            Err(e) => {
                warnings.push(format!("could not read market pair sides: {}", e));
                println!("   ⚠️  Market pair: ordering check failed ({})", e);
            }
        }
    }

    // ==========================================
    // CHECK 4: Backup RPCs
    // ==========================================
    println!();
    println!("🔁 CHECKING BACKUP RPCS...");

    let backups: Vec<String> = env::var("BACKUP_RPC_URLS")
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if backups.is_empty() {
        warnings.push("no backup RPCs configured".to_string());
        println!("   ⚠️  No backups configured (BACKUP_RPC_URLS is empty)");
    } else {
        for url in &backups {
            match check_rpc(url).await {
                Ok((block, _)) => println!("   ✅ {} (block {})", url, block),
                Err(e) => {
                    warnings.push(format!("backup {} unreachable", url));
                    println!("   ⚠️  {} unreachable: {}", url, e);
                }
            }
        }
    }

    // ==========================================
    // CHECK 5: Price feed
    // ==========================================
    println!();
    println!("💱 CHECKING PRICE FEED...");

    let api = env::var("PRICE_API_URL")
        .unwrap_or_else(|_| "https://api.coingecko.com/api/v3/simple/price".to_string());
    match check_price_feed(&api).await {
        Ok(price) => println!("   ✅ Feed reachable, DAI at ${:.4}", price),
        Err(e) => {
            if env::var("FALLBACK_DAI_PRICE").is_ok() {
                warnings.push(format!("price feed unreachable ({}), fallback set", e));
                println!(
                    "   ⚠️  Feed unreachable ({}), FALLBACK_DAI_PRICE will be used",
                    e
                );
            } else {
                issues.push(format!("price feed unreachable: {}", e));
                println!("   ❌ Feed unreachable: {}", e);
                println!("   💡 Set FALLBACK_DAI_PRICE to run without the feed");
            }
        }
    }

    // ==========================================
    // SUMMARY
    // ==========================================
    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    if issues.is_empty() && warnings.is_empty() {
        println!("✅ ALL CHECKS PASSED!");
        println!();
        println!("   The engine is ready. Run: cargo run");
    } else if issues.is_empty() {
        println!("⚠️  READY WITH WARNINGS ({} warnings)", warnings.len());
        println!();
        for w in &warnings {
            println!("   • {}", w);
        }
        println!();
        println!("   You can proceed, but consider fixing the warnings.");
    } else {
        println!(
            "❌ NOT READY ({} issues, {} warnings)",
            issues.len(),
            warnings.len()
        );
        println!();
        println!("   MUST FIX:");
        for i in &issues {
            println!("   • {}", i);
        }
        if !warnings.is_empty() {
            println!();
            println!("   WARNINGS:");
            for w in &warnings {
                println!("   • {}", w);
            }
        }
        println!();
        println!("   Fix the issues above before trusting the numbers.");
    }

    println!();
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
}

async fn check_rpc(url: &str) -> Result<(u64, u64), String> {
    use alloy_provider::{Provider, ProviderBuilder};

    let provider = ProviderBuilder::new()
        .connect_http(url.parse().map_err(|e| format!("Invalid URL: {}", e))?);

    let block = provider
        .get_block_number()
        .await
        .map_err(|e| format!("Connection failed: {}", e))?;
    let chain_id = provider
        .get_chain_id()
        .await
        .map_err(|e| format!("Chain ID query failed: {}", e))?;

    Ok((block, chain_id))
}

async fn check_contract(url: &str, address: Address) -> Result<bool, String> {
    use alloy_provider::{Provider, ProviderBuilder};

    let provider = ProviderBuilder::new()
        .connect_http(url.parse().map_err(|e| format!("Invalid URL: {}", e))?);

    let code = provider
        .get_code_at(address)
        .await
        .map_err(|e| format!("Failed to get code: {}", e))?;

    Ok(!code.is_empty())
}

async fn check_pair_sides(url: &str, pair: Address) -> Result<(Address, Address), String> {
    use alloy_provider::{Provider, ProviderBuilder};
    use alloy_rpc_types::TransactionRequest;

    let provider = ProviderBuilder::new()
        .connect_http(url.parse().map_err(|e| format!("Invalid URL: {}", e))?);

    let raw0 = provider
        .call(
            TransactionRequest::default()
                .to(pair)
                .input(IUniswapV2Pair::token0Call {}.abi_encode().into()),
        )
        .await
        .map_err(|e| format!("token0 call failed: {}", e))?;
    let token0 = IUniswapV2Pair::token0Call::abi_decode_returns(&raw0)
        .map_err(|e| format!("token0 decode failed: {}", e))?;

    let raw1 = provider
        .call(
            TransactionRequest::default()
                .to(pair)
                .input(IUniswapV2Pair::token1Call {}.abi_encode().into()),
        )
        .await
        .map_err(|e| format!("token1 call failed: {}", e))?;
    let token1 = IUniswapV2Pair::token1Call::abi_decode_returns(&raw1)
        .map_err(|e| format!("token1 decode failed: {}", e))?;

    Ok((token0, token1))
}

async fn check_price_feed(api_url: &str) -> Result<f64, String> {
    let url = format!("{}?ids=dai&vs_currencies=usd", api_url);
    let response = reqwest::get(&url)
        .await
        .map_err(|e| format!("request failed: {}", e))?;
    let body: serde_json::Value = response
        .json()
        .await
        .map_err(|e| format!("bad body: {}", e))?;
    body["dai"]["usd"]
        .as_f64()
        .ok_or_else(|| "no dai quote in response".to_string())
}
