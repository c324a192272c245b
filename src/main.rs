//! luxwatch - Luxor Protocol Metrics Engine
//!
//! Run with: cargo run
//!
//! One pass refreshes USD quotes, aggregates the treasury, appraises
//! every bond depository against a candidate deposit, and optionally
//! reports a wallet's balances and vesting positions. Pass --watch to
//! repeat the pass on an interval.

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use clap::Parser;
use color_eyre::eyre::{eyre, Result};
use console::style;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod account;
mod bonds;
mod chain;
mod config;
mod error;
mod market;
mod oracle;
mod registry;
mod store;
mod treasury;
mod valuation;

use bonds::BondDescriptor;
use chain::ChainClient;
use config::{Config, SnapshotLog};
use error::MetricsError;
use oracle::PriceOracle;
use registry::Network;
use store::MetricsStore;
use treasury::PriceSet;

#[derive(Parser, Debug)]
#[command(
    name = "luxwatch",
    about = "Treasury and bond desk metrics for the Luxor reserve protocol"
)]
struct Args {
    /// Candidate deposit in reserve units, quoted against every depository
    #[arg(short, long, default_value = "1")]
    amount: String,

    /// Appraise a single depository by catalog name, e.g. dai28
    #[arg(short, long)]
    bond: Option<String>,

    /// Load configuration from a TOML file instead of the environment
    #[arg(short, long)]
    config: Option<String>,

    /// Wallet to report balances and bond positions for
    #[arg(long)]
    account: Option<String>,

    /// Network name or chain id, overrides CHAIN_ID
    #[arg(short, long)]
    network: Option<String>,

    /// Keep running, one pass every REFRESH_INTERVAL_SECS
    #[arg(short, long)]
    watch: bool,
}

/// Accept a network by name or by chain id.
fn parse_network_arg(raw: &str) -> Result<u64> {
    match raw.to_ascii_lowercase().as_str() {
        "fantom" | "ftm" | "opera" => Ok(250),
        "bsc" | "binance" => Ok(56),
        other => other
            .parse()
            .map_err(|_| eyre!("unknown network {:?} (try fantom or bsc)", raw)),
    }
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" 🔭 LUXWATCH - Luxor Protocol Metrics Engine").cyan().bold()
    );
    println!(
        "{}",
        style("    Treasury | Bond Desk | Staking | Fantom Opera").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

/// Whole-number display with thousands separators.
fn commas(value: f64) -> String {
    let negative = value < 0.0;
    let digits = format!("{:.0}", value.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    if negative {
        format!("-{}", out)
    } else {
        out
    }
}

fn usd(value: f64) -> String {
    if value < 0.0 {
        format!("-${}", commas(value.abs()))
    } else {
        format!("${}", commas(value))
    }
}

/// Keeps six meaningful decimals on dust values; larger numbers get
/// cents or thousands separators.
fn meaningful(value: f64) -> String {
    if value > 1000.0 {
        commas(value)
    } else if value > 1.0 {
        format!("{:.2}", value)
    } else {
        let leading = format!("{:.18}", value)
            .split('.')
            .nth(1)
            .map(|d| d.bytes().take_while(|b| *b == b'0').count())
            .unwrap_or(0);
        let shown = format!("{:.*}", leading + 6, value);
        shown.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn countdown(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{}h {}m {}s", h, m, s)
    } else if m > 0 {
        format!("{}m {}s", m, s)
    } else {
        format!("{}s", s)
    }
}

/// One full engine pass. Ticket acquisition happens before each fetch so
/// that overlapping passes resolve last-request-wins in the store.
#[allow(clippy::too_many_arguments)]
async fn run_pass(
    config: &Config,
    client: &ChainClient,
    oracle: &PriceOracle,
    store: &MetricsStore,
    network: Network,
    desk: &[BondDescriptor],
    deposit: f64,
    account: Option<Address>,
) -> Result<()> {
    // =============================================
    // PHASE 1: THE PRICE ORACLE
    // =============================================
    println!();
    println!(
        "{}",
        style("═══ PHASE 1: THE PRICE ORACLE ═══").blue().bold()
    );
    println!();

    println!("{}", style("Step 1.1: Fetching USD quotes...").blue());
    let start = Instant::now();

    match oracle.refresh().await {
        Ok(()) => {
            println!(
                "{} Quotes refreshed in {:?}",
                style("✓").green(),
                start.elapsed()
            );
        }
        Err(e) => {
            warn!("Price feed unreachable: {}", e);
            if !oracle.is_stale(oracle::DEFAULT_MAX_PRICE_AGE).await {
                let age = oracle
                    .last_refreshed()
                    .await
                    .map(|at| format!("{}s", at.elapsed().as_secs()))
                    .unwrap_or_else(|| "?".to_string());
                println!(
                    "{} Price feed down, continuing on quotes from {} ago",
                    style("⚠").yellow(),
                    age
                );
            } else if let Some(fallback) = config.fallback_dai_price {
                oracle.set("DAI", fallback).await;
                println!(
                    "{} Price feed down, seeded DAI at ${:.2}",
                    style("⚠").yellow(),
                    fallback
                );
            } else {
                println!(
                    "{} Price feed down and cache stale, quotes may be missing",
                    style("⚠").yellow()
                );
            }
        }
    }

    for symbol in ["DAI", "FTM", "ETH", "SOUL"] {
        match oracle.get(symbol).await {
            Some(price) => println!("   {:<5} ${}", symbol, meaningful(price)),
            None => println!("   {:<5} {}", symbol, style("no quote").dim()),
        }
    }

    // =============================================
    // PHASE 2: THE TREASURY
    // =============================================
    println!();
    println!("{}", style("═══ PHASE 2: THE TREASURY ═══").magenta().bold());
    println!();

    println!(
        "{}",
        style(format!(
            "Step 2.1: Aggregating protocol state on {} (chain {})...",
            network,
            network.chain_id()
        ))
        .magenta()
    );
    let start = Instant::now();
    let ticket = store.protocol.begin();

    let snapshot = treasury::fetch_protocol_snapshot(client, network).await?;
    let prices = PriceSet::from_oracle(oracle).await?;
    let metrics = treasury::compose_metrics(&snapshot, &prices, config);

    if u64::from(snapshot.epoch.length) != config.seconds_per_epoch {
        warn!(
            "on-chain epoch length {}s differs from configured {}s",
            snapshot.epoch.length, config.seconds_per_epoch
        );
    }

    if !store.protocol.commit(ticket, metrics.clone()).await {
        debug!("protocol pass {} superseded, result dropped", ticket);
    }

    let block = snapshot
        .block_number
        .map(|b| format!("block {}", b))
        .unwrap_or_else(|| "block unknown".to_string());
    println!(
        "{} Aggregated {} depositories in {:?} ({})",
        style("✓").green(),
        snapshot.holdings.len(),
        start.elapsed(),
        block
    );

    let now = Utc::now().timestamp().max(0) as u64;
    let until_rebase = metrics.next_rebase.saturating_sub(now);

    println!();
    println!(
        "   Market price        {}",
        style(format!("${:.4}", metrics.market_price)).cyan()
    );
    println!(
        "   wLUM price          ${:.2}",
        metrics.market_price * metrics.current_index
    );
    println!("   Market cap          {}", usd(metrics.market_cap));
    println!(
        "   Supply (circ/total) {} / {} LUX",
        commas(metrics.circ_supply),
        commas(metrics.total_supply)
    );
    println!("   Staking TVL         {}", usd(metrics.staking_tvl));
    let free_float =
        metrics.total_supply - metrics.lux_owned - metrics.pooled_lux - metrics.mintable_lux;
    if free_float > 0.0 {
        println!(
            "   Percent staked      {:.2}%",
            100.0 * metrics.circ_supply / free_float
        );
    }
    println!(
        "   Treasury balance    {}",
        style(usd(metrics.treasury_balance)).green()
    );
    println!("     Reserves          {}", usd(metrics.reserves));
    println!("     LUX liquidity     {}", usd(metrics.liquidity));
    println!("     Investments       {}", usd(metrics.investments_value));
    println!("   Risk-free value     ${:.4} per LUX", metrics.rfv);
    if metrics.total_supply > 0.0 {
        println!(
            "   Floor price         ${:.2} per LUX",
            metrics.reserves / metrics.total_supply
        );
    }
    println!(
        "   Rebase              {:.4}% (epoch {}, next in {})",
        metrics.staking_rebase * 100.0,
        metrics.current_epoch,
        countdown(until_rebase)
    );
    println!("   Five-day rate       {:.2}%", metrics.five_day_rate * 100.0);
    println!("   Staking APY         {}%", commas(metrics.staking_apy * 100.0));
    println!("   Current index       {:.2} LUM", metrics.current_index);
    println!("   Runway              {:.1} days", metrics.runway);
    println!(
        "   DAO LUX             {} owned, {} pooled, {} mintable",
        commas(metrics.lux_owned),
        commas(metrics.pooled_lux),
        commas(metrics.mintable_lux)
    );
    println!(
        "   Circulating LUX     {} (total minus DAO-owned)",
        commas(metrics.circulating_lux)
    );
    if !metrics.contributions.is_empty() {
        println!("   Bonded capital by depository:");
        for c in &metrics.contributions {
            println!(
                "     {:<18}{:>14}   {}",
                c.bond,
                usd(c.treasury_balance),
                style(format!("{} risk-free", usd(c.risk_free_value))).dim()
            );
        }
    }

    if metrics.partial {
        println!();
        println!("{}", style("⚠ Partial aggregation:").yellow());
        if snapshot.investments.degraded {
            println!(
                "   {}",
                style("some investment reads failed and were zeroed").yellow()
            );
        }
        if !metrics.failed_bonds.is_empty() {
            println!(
                "   {}",
                style(format!(
                    "depositories excluded: {}",
                    metrics.failed_bonds.join(", ")
                ))
                .yellow()
            );
        }
    }

    if config.snapshot_log {
        let entry = SnapshotLog::from_metrics(snapshot.network, snapshot.block_number, &metrics);
        match entry.append_to_file(&config.snapshot_log_path) {
            Ok(()) => println!(
                "{} Snapshot appended to {}",
                style("📝").cyan(),
                config.snapshot_log_path
            ),
            Err(e) => warn!("Snapshot log write failed: {}", e),
        }
    }

    // =============================================
    // PHASE 3: THE BOND DESK
    // =============================================
    println!();
    println!("{}", style("═══ PHASE 3: THE BOND DESK ═══").green().bold());
    println!();

    println!(
        "{}",
        style(format!(
            "Step 3.1: Appraising {} depositories against a {} unit deposit...",
            desk.len(),
            deposit
        ))
        .green()
    );

    // One ticket per depository, taken before the batch goes out.
    let mut tickets = Vec::with_capacity(desk.len());
    for bond in desk {
        let slot = store.bond_slot(bond.name).await;
        tickets.push((slot.begin(), slot));
    }

    let bar = ProgressBar::new_spinner();
    if let Ok(tpl) = ProgressStyle::with_template("{spinner:.green} {msg}") {
        bar.set_style(tpl);
    }
    bar.enable_steady_tick(Duration::from_millis(100));
    bar.set_message("waiting on depositories...");

    let start = Instant::now();
    let valuations = valuation::appraise_all(client, oracle, network, desk, deposit).await;
    bar.finish_and_clear();
    println!(
        "{} Desk appraised in {:?}",
        style("✓").green(),
        start.elapsed()
    );

    for ((_, result), (ticket, slot)) in valuations.iter().zip(&tickets) {
        if let Ok(v) = result {
            if !slot.commit(*ticket, v.clone()).await {
                debug!("{} pass {} superseded, result dropped", v.bond, ticket);
            }
        }
    }

    println!();
    println!(
        "       {}",
        style(format!(
            "{:<22} {:>10} {:>9} {:>14} {:>12} {:>6} {:>14}",
            "DEPOSITORY", "PRICE", "DISC", "QUOTE (LUX)", "MAX (TOK)", "VEST", "PURCHASED"
        ))
        .dim()
    );

    let mut best: Option<(&str, f64, f64)> = None;
    for (i, (name, result)) in valuations.iter().enumerate() {
        match result {
            Ok(v) => {
                let price = if v.price_unavailable {
                    "—".to_string()
                } else {
                    format!("${:.4}", v.bond_price)
                };
                let disc = if v.price_unavailable {
                    style(format!("{:>9}", "—")).dim()
                } else if v.bond_discount >= 0.0 {
                    style(format!("{:>+9.2}", v.bond_discount * 100.0)).green()
                } else {
                    style(format!("{:>+9.2}", v.bond_discount * 100.0)).red()
                };
                println!(
                    "{:>3}. {} {:<22} {:>10} {} {:>14.4} {:>12.2} {:>5.0}d {:>14}",
                    i + 1,
                    style("✓").green(),
                    v.display_name,
                    price,
                    disc,
                    v.bond_quote,
                    v.max_bond_price_token,
                    v.vesting_term as f64 / 86_400.0,
                    usd(v.purchased)
                );
                if v.quote_exceeds_max {
                    let over = MetricsError::PurchaseExceedsLimit {
                        quote: v.bond_quote,
                        max_payout: v.max_bond_price,
                    };
                    println!("       {}", style(format!("⚠ {}", over)).yellow());
                }
                if v.deposit_blocked() {
                    println!(
                        "       {}",
                        style(format!(
                            "⛔ debt ceiling reached: {:.0} of {:.0} LUX outstanding",
                            v.total_bond_debt, v.max_debt
                        ))
                        .red()
                    );
                }
                if v.price_unavailable {
                    println!(
                        "       {}",
                        style("⚠ depository price reverted, discount unavailable").yellow()
                    );
                }
                if !v.price_unavailable {
                    let improved = match &best {
                        Some((_, b, _)) => v.bond_discount > *b,
                        None => true,
                    };
                    if improved {
                        best = Some((
                            v.display_name.as_str(),
                            v.bond_discount,
                            valuation::max_premium(v.internal_price_raw, config.slippage),
                        ));
                    }
                }
            }
            Err(e) => {
                let marker = if e.is_warning() {
                    style("⚠").yellow()
                } else {
                    style("✗").red()
                };
                println!(
                    "{:>3}. {} {:<22} {}",
                    i + 1,
                    marker,
                    name,
                    style(format!("appraisal failed: {}", e)).red()
                );
            }
        }
    }

    // --bond narrows the desk to one row; give it the full purchase sheet.
    if desk.len() == 1 {
        if let Some((_, Ok(v))) = valuations.first() {
            println!();
            println!("   Market price      ${:.4} at appraisal", v.market_price);
            println!("   Purchase limit    {:.4} LUX", v.max_bond_price);
            println!("   Minimum purchase  0.01 LUX");
            if v.max_debt > 0.0 {
                let headroom = 100.0 - 100.0 * v.total_bond_debt / v.max_debt;
                println!("   Debt headroom     {:.2}%", headroom.max(0.0));
            }
        }
    }

    if let Some((name, disc, ceiling)) = best {
        println!();
        println!(
            "{} Best discount: {} at {:+.2}%",
            style("✓").green(),
            style(name).cyan(),
            disc * 100.0
        );
        println!(
            "   {}",
            style(format!(
                "deposit price ceiling {:.0} at {:.1}% slippage",
                ceiling,
                config.slippage * 100.0
            ))
            .dim()
        );
    }

    // =============================================
    // PHASE 4: THE ACCOUNT
    // =============================================
    println!();
    println!("{}", style("═══ PHASE 4: THE ACCOUNT ═══").yellow().bold());
    println!();

    match account {
        None => {
            println!("{} No account configured, skipping", style("ℹ").cyan());
            println!("   Set ACCOUNT_ADDRESS or pass --account to report balances");
        }
        Some(who) => {
            println!(
                "{}",
                style(format!("Step 4.1: Loading balances for {:?}...", who)).yellow()
            );
            let ticket = store.account.begin();
            match account::load_account(client, network, who).await {
                Ok(snap) => {
                    let approved = |raw: U256| {
                        if raw.is_zero() {
                            style("✗ not approved").red()
                        } else {
                            style("✓ approved").green()
                        }
                    };
                    println!("   LUX    {:.4}", snap.balances.lux);
                    println!("   LUM    {:.4}", snap.balances.lum);
                    println!("   wLUM   {:.4}", snap.balances.wlum);
                    println!(
                        "   stake {}   unstake {}   wrap {}",
                        approved(snap.allowances.stake),
                        approved(snap.allowances.unstake),
                        approved(snap.allowances.wrap)
                    );
                    if !store.account.commit(ticket, snap).await {
                        debug!("account pass {} superseded, result dropped", ticket);
                    }
                }
                Err(e) => warn!("Account load failed: {}", e),
            }

            println!();
            println!(
                "{}",
                style("Step 4.2: Scanning depository positions...").yellow()
            );
            let positions = join_all(
                desk.iter()
                    .map(|bond| account::user_bond_position(client, network, bond, who)),
            )
            .await;
            let mut open = 0usize;
            for (bond, position) in desk.iter().zip(positions) {
                match position {
                    Ok(p) if p.interest_due > 0.0 || p.pending_payout > 0.0 => {
                        open += 1;
                        let matures = DateTime::<Utc>::from_timestamp(p.maturation_time as i64, 0)
                            .map(|t| t.format("%Y-%m-%d %H:%M UTC").to_string())
                            .unwrap_or_else(|| "unknown".to_string());
                        println!(
                            "   {} {:<22} vesting {:.4} {}, claimable {:.4} {}, matures {}",
                            style("●").green(),
                            bond.display_name,
                            p.interest_due,
                            bond.reward_token(),
                            p.pending_payout,
                            bond.reward_token(),
                            matures
                        );
                        let unit = if bond.is_lp() { "LP" } else { bond.bond_token() };
                        let gate = if p.allowance.is_zero() {
                            style("✗ depository not approved").red()
                        } else {
                            style("✓ depository approved").green()
                        };
                        if !bond.is_lp() && bond.quote == bonds::QuoteAsset::Ftm {
                            // wFTM depositories also take native FTM deposits
                            println!(
                                "       holds {:.4} {} plus {:.4} native FTM ({})",
                                p.reserve_balance, unit, p.native_balance, gate
                            );
                        } else {
                            println!(
                                "       holds {:.4} {} ({})",
                                p.reserve_balance, unit, gate
                            );
                        }
                        if p.allowance.is_zero() {
                            if let Some(url) = bond.lp_url {
                                println!(
                                    "       {}",
                                    style(format!("provision LP at {}", url)).dim()
                                );
                            }
                        }
                    }
                    Ok(p) => debug!("{}: no open position", p.bond),
                    Err(e) => warn!("{} position read failed: {}", bond.name, e),
                }
            }
            if open == 0 {
                println!("   No open positions");
            }

            println!();
            println!("{}", style("Step 4.3: Zap input balances...").yellow());
            let book = registry::book(network)?;
            let tokens = registry::zap_tokens(book);
            let details = join_all(
                tokens
                    .iter()
                    .map(|token| account::user_token_details(client, network, token, who)),
            )
            .await;
            for detail in details {
                match detail {
                    Ok(d) => {
                        let gate = match d.allowance {
                            None => style("native".to_string()).dim(),
                            Some(a) if a.is_zero() => {
                                style("✗ router not approved".to_string()).red()
                            }
                            Some(_) => style("✓ router approved".to_string()).green(),
                        };
                        println!("   {:<5} {:>16}   {}", d.symbol, meaningful(d.balance), gate);
                    }
                    Err(e) => warn!("Token detail read failed: {}", e),
                }
            }
        }
    }

    // =============================================
    // SUMMARY
    // =============================================
    let appraised = valuations.iter().filter(|(_, r)| r.is_ok()).count();
    let failed = valuations.len() - appraised;

    // Render from the committed store, not this pass's locals; a newer
    // overlapping pass may have superseded us.
    let shown = store.protocol.get().await.unwrap_or(metrics);
    let cached = store.bond_valuations().await.len();
    debug!(
        "protocol slot at generation {} (committed {:?})",
        store.protocol.latest_ticket(),
        store.protocol.committed_ticket().await
    );

    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").green()
    );
    println!("{}", style(" ✅ PASS COMPLETE").green().bold());
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").green()
    );
    println!();
    println!("Summary:");
    println!(
        "  • Market price: ${:.4} ({} market cap)",
        shown.market_price,
        usd(shown.market_cap)
    );
    println!(
        "  • Treasury: {} backing ${:.4} of risk-free value per LUX",
        usd(shown.treasury_balance),
        shown.rfv
    );
    println!(
        "  • Depositories: {} appraised, {} failed, {} in the store",
        appraised, failed, cached
    );
    println!("  • Runway: {:.1} days at the current rebase", shown.runway);
    if let Some(snap) = store.account.get().await {
        println!(
            "  • Account {}: {:.2} LUX / {:.2} LUM / {:.2} wLUM",
            snap.address, snap.balances.lux, snap.balances.lum, snap.balances.wlum
        );
    }
    println!(
        "  • Aggregation: {}",
        if shown.partial { "partial" } else { "complete" }
    );

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("luxwatch=info".parse()?),
        )
        .init();

    let args = Args::parse();
    print_banner();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(address) = &args.account {
        config.account_address = Some(address.clone());
    }
    if let Some(raw) = &args.network {
        config.chain_id = parse_network_arg(raw)?;
    }

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        error!("Please check your .env file");
        return Err(e);
    }

    // Print configuration summary
    config.print_summary();
    println!();

    let deposit = valuation::parse_amount(&args.amount)?;
    let network = config.network()?;
    let account = config.account()?;

    // The desk is fixed for the whole session: the full per-network
    // catalog, or a single depository when --bond narrows it.
    let desk: Vec<BondDescriptor> = match &args.bond {
        Some(name) => {
            let bond = bonds::get_bond(name).ok_or_else(|| {
                let known = bonds::all_bonds()
                    .iter()
                    .map(|b| b.name)
                    .collect::<Vec<_>>()
                    .join(", ");
                eyre!("unknown depository {:?} (known: {})", name, known)
            })?;
            vec![bond]
        }
        None => bonds::bonds_for(network),
    };

    let client = ChainClient::new(config.rpc_url.clone());
    info!("chain client ready at {}", client.rpc_url());
    let oracle = PriceOracle::new(config.price_api_url.clone());
    let store = MetricsStore::new();

    if args.watch {
        info!(
            "Watch mode: one pass every {}s",
            config.refresh_interval_secs
        );
    }

    loop {
        if let Err(e) =
            run_pass(&config, &client, &oracle, &store, network, &desk, deposit, account).await
        {
            if !args.watch {
                return Err(e);
            }
            if let Some(me) = e.downcast_ref::<MetricsError>() {
                if !me.is_retryable() {
                    error!("Pass failed with a non-retryable error, stopping watch");
                    return Err(e);
                }
            }
            warn!("Pass failed, retrying next tick: {}", e);
        }
        if !args.watch {
            break;
        }
        println!();
        println!(
            "{}",
            style(format!(
                "Watching, next pass in {}s (Ctrl-C to stop)...",
                config.refresh_interval_secs
            ))
            .dim()
        );
        tokio::time::sleep(Duration::from_secs(config.refresh_interval_secs)).await;
    }

    Ok(())
}
