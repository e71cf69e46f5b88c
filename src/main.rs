use analytics::{expected_move_targets, summarize, target_strike_band, StrategyRowView};
use anyhow::Context;
use api_client::PolygonClient;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use configuration::key_store::mask;
use configuration::{KeyStore, Settings};
use core_types::{ContractType, KeyStatus, StrategyKind, VolatilityMetrics};
use engine::{Dashboard, DashboardState, FetchOutcome, FetchRequest, LiveProviders};
use events::{DashboardEvent, LogLevel, Notice};
use indicatif::{ProgressBar, ProgressStyle};
use rust_decimal::Decimal;
use search_client::GeminiClient;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// The main entry point for the Yieldscope options-yield dashboard.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; keys can live in the key store.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let settings = configuration::load_settings_from(&cli.config)
        .with_context(|| format!("Failed to load settings from {}", cli.config))?;
    let _log_guard =
        configuration::init_tracing(&settings.logging).context("Failed to initialize logging")?;

    let store = match &cli.keys_file {
        Some(path) => KeyStore::at(path),
        None => KeyStore::default_location()?,
    };

    match cli.command {
        Commands::Fetch(args) => handle_fetch(args, settings, &store).await,
        Commands::VerifyKey { provider } => handle_verify_key(provider, &settings, &store).await,
        Commands::Keys { action } => handle_keys(action, &store),
        Commands::Targets(args) => handle_targets(args, &settings),
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Income-options dashboard: yields for cash-secured puts, put credit spreads
/// and covered calls on a single ETF.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file; missing is fine, every value has a default.
    #[arg(long, global = true, default_value = "config.toml")]
    config: String,

    /// Key store location (defaults to the per-user config directory).
    #[arg(long, global = true)]
    keys_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the option chain for an expiration and show the yield table.
    Fetch(FetchArgs),
    /// Check that a stored provider key is accepted.
    VerifyKey {
        #[arg(value_enum)]
        provider: ProviderArg,
    },
    /// Manage the locally stored provider keys.
    Keys {
        #[command(subcommand)]
        action: KeysCommand,
    },
    /// Show target strikes for a price and expiration without any network call.
    Targets(TargetsArgs),
}

#[derive(Parser)]
struct FetchArgs {
    /// The expiration date (format: YYYY-MM-DD).
    #[arg(long)]
    expiration: NaiveDate,

    /// csp, pcs or cc (defaults to the configured strategy).
    #[arg(long)]
    strategy: Option<StrategyKind>,

    /// Target spread width for put credit spreads.
    #[arg(long)]
    width: Option<Decimal>,

    /// Cost basis of the owned shares for covered calls.
    #[arg(long)]
    cost_basis: Option<Decimal>,
}

#[derive(Parser)]
struct TargetsArgs {
    #[arg(long)]
    price: Decimal,

    /// The expiration date (format: YYYY-MM-DD).
    #[arg(long)]
    expiration: NaiveDate,

    /// put or call.
    #[arg(long = "type", default_value = "put")]
    contract_type: ContractType,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProviderArg {
    Structured,
    Ai,
}

#[derive(Subcommand)]
enum KeysCommand {
    /// Store one or both keys.
    Set {
        #[arg(long)]
        structured: Option<String>,
        #[arg(long)]
        ai: Option<String>,
    },
    /// Show which keys are stored, masked.
    Show,
    /// Delete the stored keys.
    Clear,
}

// ==============================================================================
// Fetch Command Logic
// ==============================================================================

async fn handle_fetch(args: FetchArgs, settings: Settings, store: &KeyStore) -> anyhow::Result<()> {
    let keys = store.load()?.with_env_fallback();
    let strategy = args.strategy.unwrap_or(settings.dashboard.strategy);
    let width = args.width.unwrap_or(settings.dashboard.spread_width);
    let cost_basis = args.cost_basis.unwrap_or(settings.dashboard.cost_basis);
    let ticker = settings.underlying.ticker.clone();
    tracing::debug!(%strategy, %width, %cost_basis, "Fetch parameters.");

    let factory = Arc::new(LiveProviders::new(settings.clone()));
    let dashboard = Dashboard::new(settings, keys, factory);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner:.green} [{elapsed}] {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("Fetching {ticker} {strategy} chain for {}...", args.expiration));

    let mut events = dashboard.subscribe();
    let pb = spinner.clone();
    let listener = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(DashboardEvent::Progress(status)) => pb.set_message(status),
                Ok(DashboardEvent::Notice(notice)) if !notice.is_fatal() => {
                    pb.println(format_notice(&notice));
                }
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    let request = FetchRequest::new(args.expiration, strategy.contract_type()).with_cost_basis(cost_basis);
    let outcome = dashboard.fetch(request).await;
    spinner.set_message("Waiting for volatility metrics...");
    dashboard.settle_volatility().await;
    spinner.finish_and_clear();
    listener.abort();

    let state = dashboard.snapshot().await;
    for notice in state.notices.iter().filter(|n| n.is_fatal()) {
        eprintln!("{}", format_notice(notice));
    }
    let outcome = outcome.context("Fetch failed")?;

    println!();
    if let Some(volatility) = &state.volatility {
        print_volatility(&dashboard.settings().underlying.volatility_index, volatility);
    }

    match outcome {
        FetchOutcome::NoChainFound { provider, current_price } => {
            println!(
                "{ticker} @ {:.2} (via {provider}): no {} contracts found for {}.",
                current_price,
                strategy.contract_type(),
                args.expiration
            );
        }
        FetchOutcome::Loaded { provider, rows } => {
            let price = state.current_price.unwrap_or_default();
            println!("{ticker} @ {price:.2} (via {provider}), {rows} contracts");
            let view = dashboard.view(strategy, width).await;
            print_table(strategy, &view);
            print_summary(&state);
        }
    }
    print_citations(&state);
    Ok(())
}

fn format_notice(notice: &Notice) -> String {
    let label = match notice.level {
        LogLevel::Info => "info",
        LogLevel::Warn => "warning",
        LogLevel::Error => "error",
    };
    match &notice.action {
        Some(action) => format!("[{label}] {} {action}", notice.message),
        None => format!("[{label}] {}", notice.message),
    }
}

// ==============================================================================
// Rendering
// ==============================================================================

const UNAVAILABLE: &str = "—";

fn fmt(value: Decimal, dp: u32) -> String {
    format!("{}", value.round_dp(dp))
}

fn fmt_opt(value: Option<Decimal>, dp: u32) -> String {
    value.map_or_else(|| UNAVAILABLE.to_string(), |v| fmt(v, dp))
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn print_table(strategy: StrategyKind, view: &[StrategyRowView]) {
    let table = match strategy {
        StrategyKind::PutCreditSpread => spread_table(view),
        StrategyKind::CashSecuredPut | StrategyKind::CoveredCall => single_leg_table(strategy, view),
    };
    println!("{table}");
}

fn single_leg_table(strategy: StrategyKind, view: &[StrategyRowView]) -> Table {
    let mut table = new_table(vec![
        "Strike", "Premium", "DTE", "ROI %", "Annualized %", "Breakeven", "Capital", "Delta", "IV",
        "Win %",
    ]);
    for entry in view {
        let row = &entry.row;
        table.add_row(vec![
            Cell::new(fmt(row.strike, 2)),
            Cell::new(fmt(row.premium, 2)),
            Cell::new(row.days_to_expiration),
            Cell::new(fmt(row.roi, 2)),
            return_cell(entry.headline_return(strategy)),
            Cell::new(fmt(row.breakeven, 2)),
            Cell::new(fmt(row.capital_required, 0)),
            Cell::new(fmt_opt(row.delta, 3)),
            Cell::new(fmt_opt(row.implied_volatility.map(|iv| iv * Decimal::ONE_HUNDRED), 1)),
            Cell::new(fmt_opt(row.win_rate, 1)),
        ]);
    }
    table
}

fn spread_table(view: &[StrategyRowView]) -> Table {
    let mut table = new_table(vec![
        "Short", "Long", "Net credit", "Width", "Max risk", "ROI %", "Annualized %", "DTE",
    ]);
    for entry in view {
        let row = &entry.row;
        let Some(spread) = &entry.spread else {
            table.add_row(vec![
                Cell::new(fmt(row.strike, 2)),
                Cell::new("no long leg").fg(Color::DarkGrey),
                Cell::new(UNAVAILABLE),
                Cell::new(UNAVAILABLE),
                Cell::new(UNAVAILABLE),
                Cell::new(UNAVAILABLE),
                Cell::new(UNAVAILABLE),
                Cell::new(row.days_to_expiration),
            ]);
            continue;
        };
        let width = Cell::new(fmt(spread.actual_width, 2));
        table.add_row(vec![
            Cell::new(fmt(row.strike, 2)),
            Cell::new(fmt(spread.long_strike, 2)),
            Cell::new(fmt(spread.net_credit, 2)),
            if spread.width_mismatch { width.fg(Color::Yellow) } else { width },
            Cell::new(fmt(spread.max_risk, 0)),
            Cell::new(fmt_opt(spread.roi, 2)),
            return_cell(spread.annualized_return),
            Cell::new(row.days_to_expiration),
        ]);
    }
    table
}

fn return_cell(value: Option<Decimal>) -> Cell {
    match value {
        Some(v) if v >= Decimal::from(20) => Cell::new(fmt(v, 2)).fg(Color::Green),
        Some(v) => Cell::new(fmt(v, 2)),
        None => Cell::new(UNAVAILABLE),
    }
}

fn print_summary(state: &DashboardState) {
    let summary = summarize(state.book.rows());
    println!(
        "Best annualized: {}%  Average annualized: {}%  Average win rate: {}%  Total capital: {}",
        fmt_opt(summary.best_annualized, 2),
        fmt_opt(summary.average_annualized, 2),
        fmt_opt(summary.average_win_rate, 1),
        fmt_opt(summary.total_capital, 0),
    );
}

fn print_volatility(index: &str, metrics: &VolatilityMetrics) {
    println!(
        "{index} {} (52w {} to {}), IV rank {}: {} [{}]",
        fmt(metrics.current, 2),
        fmt(metrics.low, 2),
        fmt(metrics.high, 2),
        fmt(metrics.rank, 1),
        metrics.status.label(),
        metrics.status.tone(),
    );
}

fn print_citations(state: &DashboardState) {
    if state.citations.is_empty() {
        return;
    }
    println!("\nSources:");
    for (i, citation) in state.citations.iter().enumerate() {
        println!("  {}. {} <{}>", i + 1, citation.title, citation.uri);
    }
}

// ==============================================================================
// Key Commands
// ==============================================================================

async fn handle_verify_key(
    provider: ProviderArg,
    settings: &Settings,
    store: &KeyStore,
) -> anyhow::Result<()> {
    let keys = store.load()?.with_env_fallback();
    let (name, status) = match provider {
        ProviderArg::Structured => {
            let key = keys
                .structured_api_key
                .context("No structured-API key stored. Use `keys set --structured`.")?;
            let client = PolygonClient::new(
                &key,
                &settings.structured_api,
                settings.dashboard.baseline_volatility,
            )?;
            ("structured-API", client.verify_key().await?)
        }
        ProviderArg::Ai => {
            let key = keys
                .ai_search_key
                .context("No AI-search key stored. Use `keys set --ai`.")?;
            let client = GeminiClient::new(&key, &settings.ai_search)?;
            ("AI-search", client.verify_key().await?)
        }
    };

    match status {
        KeyStatus::Valid => println!("The {name} key is valid."),
        KeyStatus::Invalid => println!("The {name} key was rejected."),
    }
    Ok(())
}

fn handle_keys(action: KeysCommand, store: &KeyStore) -> anyhow::Result<()> {
    match action {
        KeysCommand::Set { structured, ai } => {
            if structured.is_none() && ai.is_none() {
                anyhow::bail!("Pass --structured and/or --ai.");
            }
            if let Some(key) = structured {
                store.set_structured(&key)?;
            }
            if let Some(key) = ai {
                store.set_ai_search(&key)?;
            }
            println!("Saved keys to {}", store.path().display());
        }
        KeysCommand::Show => {
            let keys = store.load()?;
            let show = |key: Option<String>| key.map_or_else(|| "not set".to_string(), |k| mask(&k));
            println!("Key store:      {}", store.path().display());
            println!("Structured API: {}", show(keys.structured_api_key));
            println!("AI search:      {}", show(keys.ai_search_key));
        }
        KeysCommand::Clear => {
            store.clear()?;
            println!("Cleared stored keys.");
        }
    }
    Ok(())
}

// ==============================================================================
// Targets Command Logic
// ==============================================================================

fn handle_targets(args: TargetsArgs, settings: &Settings) -> anyhow::Result<()> {
    if args.price <= Decimal::ZERO {
        anyhow::bail!("--price must be greater than 0");
    }
    let band = target_strike_band(args.price, args.contract_type);
    let moves = expected_move_targets(
        args.price,
        args.expiration,
        Utc::now(),
        settings.dashboard.baseline_volatility,
        args.contract_type,
    );

    let mut table = new_table(vec!["Target", "Strike"]);
    for (i, strike) in band.iter().enumerate() {
        table.add_row(vec![Cell::new(format!("Band {}", i + 1)), Cell::new(fmt(*strike, 2))]);
    }
    table.add_row(vec![Cell::new("Aggressive (0.5σ)"), Cell::new(fmt(moves.aggressive, 2))]);
    table.add_row(vec![Cell::new("Moderate (1σ)"), Cell::new(fmt(moves.moderate, 2))]);
    table.add_row(vec![Cell::new("Safe (2σ)"), Cell::new(fmt(moves.safe, 2))]);
    table.add_row(vec![Cell::new("Std. deviation"), Cell::new(fmt(moves.std_dev, 2))]);

    println!(
        "{} targets @ {}, expiring {}",
        args.contract_type,
        fmt(args.price, 2),
        args.expiration
    );
    println!("{table}");
    Ok(())
}
