//! Backtest command implementation

use anyhow::Result;
use serde_json::json;
use tracing::info;

use crypto_backtest::backtest::{BacktestConfig, BacktestEngine};
use crypto_backtest::data;
use crypto_backtest::execution::{ExecutionConfig, ExecutionModel};
use crypto_backtest::risk::{RiskConfig, RiskManager};
use crypto_backtest::strategies::{TrendPullbackConfig, TrendPullbackStrategy};

/// Parameters for one backtest run, exposed 1:1 by the CLI flags
#[derive(Debug, Clone)]
pub struct BacktestRequest {
    pub symbol: String,
    pub csv_path: String,
    pub initial_capital: f64,
    pub fee_rate: f64,
    pub slippage_pct: f64,
    pub spread_pct: f64,
    pub latency_bars: usize,
    pub risk_per_trade: f64,
    pub max_drawdown: f64,
    pub max_consecutive_losses: usize,
    pub allow_short: bool,
}

/// Run a backtest and print `{metrics, trades, warnings}` as JSON on stdout
pub fn run(request: BacktestRequest) -> Result<()> {
    info!(symbol = %request.symbol, csv = %request.csv_path, "loading data");
    let series = data::load_series(&request.symbol, &request.csv_path)?;

    let strategy = TrendPullbackStrategy::new(TrendPullbackConfig::default());
    let risk = RiskManager::new(
        RiskConfig::default()
            .with_risk_per_trade(request.risk_per_trade)
            .with_max_drawdown(request.max_drawdown)
            .with_max_consecutive_losses(request.max_consecutive_losses),
    )?;
    let execution = ExecutionModel::new(ExecutionConfig {
        fee_rate: request.fee_rate,
        slippage_pct: request.slippage_pct,
        spread_pct: request.spread_pct,
        latency_bars: request.latency_bars,
        ..ExecutionConfig::default()
    })?;

    let mut engine = BacktestEngine::new(
        Box::new(strategy),
        risk,
        execution,
        BacktestConfig {
            initial_capital: request.initial_capital,
            allow_short: request.allow_short,
            min_bars: None,
        },
    );

    let result = engine.run(&series);

    let payload = json!({
        "metrics": result.metrics,
        "trades": result.trades,
        "warnings": result.warnings,
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);

    Ok(())
}
