use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use indicator_cache::{
    batch::{self, BatchSummary, DynChartSink},
    chart::SvgChartSink,
    config::{AppConfig, resolve_config},
    store::{CsvStore, SeriesStore},
    tickers::load_tickers,
    weekday::weekday_stats,
};
use price_feed::providers::build_provider;
use shared_utils::env::get_env_var_opt;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "INDICATOR_CACHE_CONFIG";

#[derive(Parser)]
#[command(version, about = "Incremental price cache with EMA/RSI/MACD indicators")]
struct Cli {
    /// TOML configuration. Falls back to `$INDICATOR_CACHE_CONFIG`, then to
    /// `indicator_cache.toml` when present.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Fetch new bars, recompute indicators and report signals for every ticker.
    Sync {
        /// JSON ticker list, overriding `tickers_file`.
        #[arg(long, value_name = "FILE")]
        tickers: Option<PathBuf>,
        #[arg(long)]
        no_charts: bool,
    },
    /// Recompute indicators for every stored table without fetching.
    Recompute,
    /// Report the latest EMA crossover for every stored ticker.
    Signals {
        #[arg(long)]
        no_charts: bool,
    },
    /// Print how often a ticker rose or fell on each weekday and chart it.
    Weekdays {
        #[arg(long)]
        ticker: String,
        #[arg(long)]
        no_charts: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn chart_sink(config: &AppConfig, no_charts: bool) -> Option<SvgChartSink> {
    (config.charts.enabled && !no_charts).then(|| {
        SvgChartSink::new(
            config.charts_dir.clone(),
            config.charts.width,
            config.charts.height,
        )
    })
}

fn print_summary(summary: &BatchSummary) {
    for report in summary.succeeded() {
        println!("{report}");
    }
    for signal in summary.signals() {
        println!("{signal}");
    }
    print!("{summary}");
}

async fn run_sync(config: &AppConfig, tickers: Option<PathBuf>, no_charts: bool) -> Result<u8> {
    let path = tickers.unwrap_or_else(|| config.tickers_file.clone());
    let tickers = match load_tickers(&path) {
        Ok(tickers) => tickers,
        Err(err) => {
            error!(error = %err, "ticker list unavailable; nothing to process");
            return Ok(1);
        }
    };

    let provider = build_provider(&config.provider).context("failed to initialize provider")?;
    let store = CsvStore::new(config.data_dir.clone(), config.timeframe);
    let sink = chart_sink(config, no_charts);
    let charts = sink.as_ref().map(|s| s as DynChartSink<'_>);

    let summary =
        batch::run_sync_batch(&tickers, &store, provider.as_ref(), config, Utc::now(), charts).await;
    print_summary(&summary);
    Ok(summary.exit_code())
}

async fn run(cli: Cli) -> Result<u8> {
    let explicit = cli
        .config
        .or_else(|| get_env_var_opt(CONFIG_ENV).map(PathBuf::from));
    let config = resolve_config(explicit.as_deref())?;
    let store = CsvStore::new(config.data_dir.clone(), config.timeframe);

    match cli.cmd {
        Cmd::Sync { tickers, no_charts } => run_sync(&config, tickers, no_charts).await,
        Cmd::Recompute => {
            let summary = batch::run_recompute_batch(&store, &config.indicators)?;
            print_summary(&summary);
            Ok(summary.exit_code())
        }
        Cmd::Signals { no_charts } => {
            let sink = chart_sink(&config, no_charts);
            let charts = sink.as_ref().map(|s| s as DynChartSink<'_>);
            let summary =
                batch::run_signal_batch(&store, &config.indicators, &config.signals, charts)?;
            print_summary(&summary);
            Ok(summary.exit_code())
        }
        Cmd::Weekdays { ticker, no_charts } => {
            let ticker = ticker.trim().to_uppercase();
            let table = store
                .load(&ticker)?
                .with_context(|| format!("no stored history for {ticker}"))?;
            let stats = weekday_stats(&table.series);
            print!("{stats}");
            if let Some(sink) = chart_sink(&config, no_charts) {
                match sink.render_weekdays(&stats) {
                    Ok(path) => println!("chart: {}", path.display()),
                    Err(err) => warn!(ticker = %ticker, error = %err, "weekday chart failed"),
                }
            }
            Ok(0)
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            error!(error = %err, "failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(1)
        }
    }
}
