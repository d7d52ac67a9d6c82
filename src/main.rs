//! Crypto backtester entry point
//!
//! Single `backtest` subcommand: replay a CSV bar series through the
//! trend-pullback strategy and print metrics, trades, and warnings as JSON.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "crypto-backtest")]
#[command(about = "Event-driven crypto backtester with latency, slippage, and fee modeling", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a strategy backtest over a CSV bar file
    Backtest {
        /// Trading pair symbol, e.g. BTC/USDT
        #[arg(long)]
        symbol: String,

        /// Path to the OHLCV CSV file
        #[arg(long)]
        csv: String,

        /// Starting capital, denominated like the price data
        #[arg(long, default_value_t = 10_000.0)]
        initial_capital: f64,

        /// Fee per fill as a fraction of notional
        #[arg(long, default_value_t = 0.001)]
        fee_rate: f64,

        /// Assumed slippage as a fraction of price
        #[arg(long, default_value_t = 0.0005)]
        slippage: f64,

        /// Full spread as a fraction of price
        #[arg(long, default_value_t = 0.0004)]
        spread: f64,

        /// Bars between signal and execution
        #[arg(long, default_value_t = 1)]
        latency_bars: usize,

        /// Fraction of equity risked per trade
        #[arg(long, default_value_t = 0.01)]
        risk_per_trade: f64,

        /// Drawdown at which new entries stop
        #[arg(long, default_value_t = 0.2)]
        max_drawdown: f64,

        /// Losing streak at which new entries stop
        #[arg(long, default_value_t = 4)]
        max_consecutive_losses: usize,

        /// Permit short entries
        #[arg(long)]
        allow_short: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries only the JSON result.
    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Backtest {
            symbol,
            csv,
            initial_capital,
            fee_rate,
            slippage,
            spread,
            latency_bars,
            risk_per_trade,
            max_drawdown,
            max_consecutive_losses,
            allow_short,
        } => commands::backtest::run(commands::backtest::BacktestRequest {
            symbol,
            csv_path: csv,
            initial_capital,
            fee_rate,
            slippage_pct: slippage,
            spread_pct: spread,
            latency_bars,
            risk_per_trade,
            max_drawdown,
            max_consecutive_losses,
            allow_short,
        }),
    }
}
