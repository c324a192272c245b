//! Runtime configuration
//!
//! Environment-first with an optional TOML file for pinned setups. Every
//! knob has a default that works against public Fantom RPC, so a bare
//! `luxwatch` run needs zero setup.

use alloy_primitives::Address;
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::oracle::DEFAULT_PRICE_API_URL;
use crate::registry::Network;
use crate::treasury::ProtocolMetrics;

// ============================================
// DEFAULTS
// ============================================

const DEFAULT_RPC_URL: &str = "https://rpc.ftm.tools";
const DEFAULT_CHAIN_ID: u64 = 250;
const DEFAULT_STRATEGY_DIVISOR: f64 = 4.0;
const DEFAULT_EPOCHS_PER_DAY: f64 = 3.0;
const DEFAULT_SECONDS_PER_EPOCH: u64 = 28_800;
const DEFAULT_SLIPPAGE: f64 = 0.005;
const DEFAULT_DEBOUNCE_MS: u64 = 1_000;
const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 600;
const DEFAULT_SNAPSHOT_LOG_PATH: &str = "./logs/metrics_snapshots.log";

// ============================================
// MAIN CONFIGURATION
// ============================================

/// Main configuration struct for luxwatch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // ========== Network Settings ==========
    /// Primary RPC URL (any Fantom archive or full node)
    pub rpc_url: String,

    /// Backup RPC URLs for failover
    pub backup_rpc_urls: Vec<String>,

    /// Chain ID (250 = Fantom Opera)
    pub chain_id: u64,

    // ========== Price Feed ==========
    /// CoinGecko-compatible simple-price endpoint
    pub price_api_url: String,

    /// Seeded into the oracle when the price feed is unreachable
    pub fallback_dai_price: Option<f64>,

    // ========== Protocol Math ==========
    /// Divisor applied to bonded treasury capital to estimate the
    /// LUX-side liquidity share
    pub strategy_divisor: f64,

    /// Rebases per day, drives APY exponents
    pub epochs_per_day: f64,

    /// Epoch length in seconds
    pub seconds_per_epoch: u64,

    // ========== Bond Desk ==========
    /// Deposit slippage tolerance (0.005 = 0.5%)
    pub slippage: f64,

    /// Quiet window before an amount change triggers an appraisal
    pub debounce_ms: u64,

    // ========== Watch Mode ==========
    /// Seconds between refresh passes when watching
    pub refresh_interval_secs: u64,

    // ========== Account ==========
    /// Wallet to report balances and bond positions for
    pub account_address: Option<String>,

    // ========== Snapshot Log ==========
    /// Enable/disable the JSON-lines metrics log
    pub snapshot_log: bool,

    /// Path to append metric snapshots to
    pub snapshot_log_path: String,
}

impl Config {
    /// Load configuration from environment variables and .env file
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            // Network
            rpc_url: env::var("RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string()),
            backup_rpc_urls: env::var("BACKUP_RPC_URLS")
                .map(|s| {
                    s.split(',')
                        .map(|u| u.trim().to_string())
                        .filter(|u| !u.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            chain_id: env::var("CHAIN_ID")
                .unwrap_or_else(|_| DEFAULT_CHAIN_ID.to_string())
                .parse()
                .unwrap_or(DEFAULT_CHAIN_ID),

            // Price feed
            price_api_url: env::var("PRICE_API_URL")
                .unwrap_or_else(|_| DEFAULT_PRICE_API_URL.to_string()),
            fallback_dai_price: env::var("FALLBACK_DAI_PRICE")
                .ok()
                .and_then(|v| v.parse().ok()),

            // Protocol math
            strategy_divisor: env::var("STRATEGY_DIVISOR")
                .unwrap_or_else(|_| DEFAULT_STRATEGY_DIVISOR.to_string())
                .parse()
                .unwrap_or(DEFAULT_STRATEGY_DIVISOR),
            epochs_per_day: env::var("EPOCHS_PER_DAY")
                .unwrap_or_else(|_| DEFAULT_EPOCHS_PER_DAY.to_string())
                .parse()
                .unwrap_or(DEFAULT_EPOCHS_PER_DAY),
            seconds_per_epoch: env::var("SECONDS_PER_EPOCH")
                .unwrap_or_else(|_| DEFAULT_SECONDS_PER_EPOCH.to_string())
                .parse()
                .unwrap_or(DEFAULT_SECONDS_PER_EPOCH),

            // Bond desk
            slippage: env::var("SLIPPAGE")
                .unwrap_or_else(|_| DEFAULT_SLIPPAGE.to_string())
                .parse()
                .unwrap_or(DEFAULT_SLIPPAGE),
            debounce_ms: env::var("DEBOUNCE_MS")
                .unwrap_or_else(|_| DEFAULT_DEBOUNCE_MS.to_string())
                .parse()
                .unwrap_or(DEFAULT_DEBOUNCE_MS),

            // Watch mode
            refresh_interval_secs: env::var("REFRESH_INTERVAL_SECS")
                .unwrap_or_else(|_| DEFAULT_REFRESH_INTERVAL_SECS.to_string())
                .parse()
                .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS),

            // Account
            account_address: env::var("ACCOUNT_ADDRESS").ok().filter(|s| !s.is_empty()),

            // Snapshot log
            snapshot_log: env::var("SNAPSHOT_LOG")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            snapshot_log_path: env::var("SNAPSHOT_LOG_PATH")
                .unwrap_or_else(|_| DEFAULT_SNAPSHOT_LOG_PATH.to_string()),
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Network this config points at. Recognition only; whether the
    /// protocol is deployed there is the registry's call.
    pub fn network(&self) -> Result<Network> {
        Network::from_chain_id(self.chain_id).ok_or_else(|| {
            eyre::eyre!("unrecognized CHAIN_ID {} (known: 250, 56)", self.chain_id)
        })
    }

    /// Parsed account address, if one is configured.
    pub fn account(&self) -> Result<Option<Address>> {
        match &self.account_address {
            None => Ok(None),
            Some(raw) => Address::from_str(raw)
                .map(Some)
                .map_err(|e| eyre::eyre!("invalid ACCOUNT_ADDRESS {}: {}", raw, e)),
        }
    }

    /// Validate configuration before any phase runs
    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() || !self.rpc_url.starts_with("http") {
            return Err(eyre::eyre!("Invalid RPC_URL - must be an http(s) endpoint"));
        }
        if self.rpc_url.contains("YOUR_API_KEY") {
            return Err(eyre::eyre!("RPC_URL still contains a placeholder"));
        }

        self.network()?;
        self.account()?;

        // Sanity checks
        if self.strategy_divisor <= 0.0 || !self.strategy_divisor.is_finite() {
            return Err(eyre::eyre!(
                "STRATEGY_DIVISOR must be positive (currently {})",
                self.strategy_divisor
            ));
        }
        if self.epochs_per_day <= 0.0 || self.epochs_per_day > 24.0 {
            return Err(eyre::eyre!(
                "EPOCHS_PER_DAY out of range (currently {})",
                self.epochs_per_day
            ));
        }
        if self.seconds_per_epoch == 0 {
            return Err(eyre::eyre!("SECONDS_PER_EPOCH must be positive"));
        }
        if !(0.0..0.5).contains(&self.slippage) {
            return Err(eyre::eyre!(
                "SLIPPAGE should be between 0 and 0.5 (currently {})",
                self.slippage
            ));
        }
        if self.debounce_ms > 60_000 {
            return Err(eyre::eyre!(
                "DEBOUNCE_MS > 60s defeats the point (currently {}ms)",
                self.debounce_ms
            ));
        }
        if self.refresh_interval_secs < 5 {
            return Err(eyre::eyre!(
                "REFRESH_INTERVAL_SECS < 5 would hammer the RPC"
            ));
        }

        Ok(())
    }

    /// Print configuration summary
    pub fn print_summary(&self) {
        let network = Network::from_chain_id(self.chain_id)
            .map(|n| n.to_string())
            .unwrap_or_else(|| format!("unknown ({})", self.chain_id));

        println!("╔════════════════════════════════════════════════════════════╗");
        println!("║                LUXWATCH - CONFIGURATION                    ║");
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ Network:           {:^40}║", network);
        println!("║ Chain ID:          {:^40}║", self.chain_id);
        println!("║ Backup RPCs:       {:^40}║", self.backup_rpc_urls.len());
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ PROTOCOL MATH                                              ║");
        println!("║ • Strategy Divisor: {:<39}║", self.strategy_divisor);
        println!("║ • Epochs Per Day:   {:<39}║", self.epochs_per_day);
        println!("║ • Epoch Length:     {:<37}s ║", self.seconds_per_epoch);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ BOND DESK                                                  ║");
        println!("║ • Slippage:         {:>37.2}% ║", self.slippage * 100.0);
        println!("║ • Debounce:         {:>36}ms ║", self.debounce_ms);
        println!("╠════════════════════════════════════════════════════════════╣");
        println!("║ WATCH MODE                                                 ║");
        println!("║ • Refresh Interval: {:>37}s ║", self.refresh_interval_secs);
        println!("║ • Snapshot Log:     {:^39}║",
            if self.snapshot_log { "✓ Enabled" } else { "✗ Disabled" }
        );
        println!("║ • Account:          {:^39}║",
            if self.account_address.is_some() { "✓ Configured" } else { "✗ Not Set" }
        );
        println!("╚════════════════════════════════════════════════════════════╝");
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: DEFAULT_RPC_URL.to_string(),
            backup_rpc_urls: vec![],
            chain_id: DEFAULT_CHAIN_ID,
            price_api_url: DEFAULT_PRICE_API_URL.to_string(),
            fallback_dai_price: None,
            strategy_divisor: DEFAULT_STRATEGY_DIVISOR,
            epochs_per_day: DEFAULT_EPOCHS_PER_DAY,
            seconds_per_epoch: DEFAULT_SECONDS_PER_EPOCH,
            slippage: DEFAULT_SLIPPAGE,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            account_address: None,
            snapshot_log: true,
            snapshot_log_path: DEFAULT_SNAPSHOT_LOG_PATH.to_string(),
        }
    }
}

// ============================================
// SNAPSHOT LOGGER
// ============================================

use chrono::{DateTime, Utc};
use std::io::Write;

/// One aggregation pass flattened to a JSON line for offline charting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotLog {
    pub timestamp: DateTime<Utc>,
    pub network: String,
    pub block_number: Option<u64>,
    pub market_price: f64,
    pub market_cap: f64,
    pub treasury_balance: f64,
    pub reserves: f64,
    pub liquidity: f64,
    pub rfv: f64,
    pub staking_apy: f64,
    pub runway: f64,
    pub partial: bool,
    pub failed_bonds: Vec<String>,
}

impl SnapshotLog {
    pub fn from_metrics(
        network: Network,
        block_number: Option<u64>,
        metrics: &ProtocolMetrics,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            network: network.to_string(),
            block_number,
            market_price: metrics.market_price,
            market_cap: metrics.market_cap,
            treasury_balance: metrics.treasury_balance,
            reserves: metrics.reserves,
            liquidity: metrics.liquidity,
            rfv: metrics.rfv,
            staking_apy: metrics.staking_apy,
            runway: metrics.runway,
            partial: metrics.partial,
            failed_bonds: metrics.failed_bonds.clone(),
        }
    }

    /// Append this snapshot to a file
    pub fn append_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        // Create parent directories if needed
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;

        let json = serde_json::to_string(self)?;
        writeln!(file, "{}", json)?;

        Ok(())
    }
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.network().unwrap(), Network::Fantom);
        assert_eq!(config.account().unwrap(), None);
        assert_eq!(config.strategy_divisor, 4.0);
    }

    #[test]
    fn test_invalid_slippage_rejected() {
        let mut config = Config::default();
        config.slippage = 0.75;
        assert!(config.validate().is_err());

        config.slippage = -0.01;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_chain_id_rejected() {
        let mut config = Config::default();
        config.chain_id = 1;
        assert!(config.validate().is_err());
        assert!(config.network().is_err());
    }

    #[test]
    fn test_bsc_chain_id_recognized() {
        // recognized by config; deployment lookup is the registry's call
        let mut config = Config::default();
        config.chain_id = 56;
        assert!(config.validate().is_ok());
        assert_eq!(config.network().unwrap(), Network::Bsc);
    }

    #[test]
    fn test_malformed_account_rejected() {
        let mut config = Config::default();
        config.account_address = Some("not-an-address".to_string());
        assert!(config.validate().is_err());

        config.account_address = Some("0x6671E20b83Ba463F270c8c75dAe57e3Cc246cB2b".to_string());
        assert!(config.validate().is_ok());
        assert!(config.account().unwrap().is_some());
    }

    #[test]
    fn test_zero_strategy_divisor_rejected() {
        let mut config = Config::default();
        config.strategy_divisor = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let mut config = Config::default();
        config.strategy_divisor = 5.0;
        config.slippage = 0.01;

        let path = std::env::temp_dir().join("luxwatch_config_test.toml");
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.strategy_divisor, 5.0);
        assert_eq!(loaded.slippage, 0.01);
        assert_eq!(loaded.chain_id, 250);

        fs::remove_file(path).ok();
    }

    #[test]
    fn test_snapshot_log_appends_json_lines() {
        let log = SnapshotLog {
            timestamp: Utc::now(),
            network: "Fantom".to_string(),
            block_number: Some(30_000_000),
            market_price: 2.2,
            market_cap: 2_200_000.0,
            treasury_balance: 125_000.0,
            reserves: 700_000.0,
            liquidity: -575_000.0,
            rfv: 0.3,
            staking_apy: 53_466.0,
            runway: 10.0,
            partial: false,
            failed_bonds: vec![],
        };

        let path = std::env::temp_dir().join("luxwatch_snapshot_test.log");
        fs::remove_file(&path).ok();

        log.append_to_file(&path).unwrap();
        log.append_to_file(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: SnapshotLog = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.network, "Fantom");
        assert_eq!(parsed.block_number, Some(30_000_000));

        fs::remove_file(path).ok();
    }
}
