//! Integration tests for the backtesting engine
//!
//! These run complete series through the engine and verify the end-to-end
//! contracts: causality (no look-ahead), stop/take resolution, cost
//! modeling, risk gating, warnings, and determinism.

use crypto_backtest::backtest::{BacktestConfig, BacktestEngine};
use crypto_backtest::execution::{ExecutionConfig, ExecutionModel};
use crypto_backtest::risk::{RiskConfig, RiskManager};
use crypto_backtest::strategies::{Strategy, TrendPullbackConfig, TrendPullbackStrategy};
use crypto_backtest::{
    Candle, ExitReason, MarketSeries, OrderIntent, OrderSide, OrderType, PortfolioState, Position,
    StrategyDecision, Symbol, Warning,
};

// =============================================================================
// Test Utilities
// =============================================================================

/// Candles at the given closes with a 1% intrabar range, one bar per hour
fn make_candles(prices: &[f64]) -> Vec<Candle> {
    let mut candles = Vec::with_capacity(prices.len());
    let mut ts = 1_700_000_000;
    for &price in prices {
        candles.push(Candle::new_unchecked(
            ts,
            price,
            price * 1.01,
            price * 0.99,
            price,
            1000.0,
        ));
        ts += 3600;
    }
    candles
}

/// Uptrend bars: open at 100 + i with a fixed 0.6 intrabar range
fn uptrend_candles(count: usize, step_secs: i64) -> Vec<Candle> {
    (0..count)
        .map(|i| {
            let price = 100.0 + i as f64;
            Candle::new_unchecked(
                1_700_000_000 + i as i64 * step_secs,
                price,
                price + 0.6,
                price - 0.6,
                price,
                1000.0,
            )
        })
        .collect()
}

fn flat_candles(count: usize, price: f64, step_secs: i64) -> Vec<Candle> {
    (0..count)
        .map(|i| {
            Candle::new_unchecked(
                1_700_000_000 + i as i64 * step_secs,
                price,
                price,
                price,
                price,
                1000.0,
            )
        })
        .collect()
}

/// Deterministic strategy driven by bar index
struct ScriptedStrategy {
    warmup: usize,
    entries: Vec<(usize, OrderSide, f64, f64)>,
    exits: Vec<usize>,
}

impl Strategy for ScriptedStrategy {
    fn min_bars(&self) -> usize {
        self.warmup
    }

    fn evaluate(
        &self,
        symbol: &Symbol,
        candles: &[Candle],
        position: Option<&Position>,
        _portfolio: &PortfolioState,
    ) -> StrategyDecision {
        let idx = candles.len() - 1;
        let last = candles.last().unwrap();

        if position.is_some() {
            if self.exits.contains(&idx) {
                return StrategyDecision::exit("scripted");
            }
            return StrategyDecision::hold("in_position");
        }

        if let Some(&(_, side, stop, take)) = self.entries.iter().find(|(i, ..)| *i == idx) {
            let intent = OrderIntent {
                symbol: symbol.clone(),
                side,
                order_type: OrderType::Market,
                quantity: 0.0,
                reference_price: last.close,
                stop_loss: stop,
                take_profit: take,
                invalidation: 0.0,
                created_at: last.timestamp,
            };
            return match side {
                OrderSide::Buy => StrategyDecision::Buy {
                    intent,
                    reason: "scripted",
                    metadata: Default::default(),
                },
                OrderSide::Sell => StrategyDecision::Sell {
                    intent,
                    reason: "scripted",
                    metadata: Default::default(),
                },
            };
        }

        StrategyDecision::hold("no_setup")
    }
}

fn small_strategy_config() -> TrendPullbackConfig {
    TrendPullbackConfig {
        ema_fast: 3,
        ema_slow: 5,
        rsi_period: 3,
        macd_fast: 3,
        macd_slow: 5,
        macd_signal: 2,
        atr_period: 3,
        ..TrendPullbackConfig::default()
    }
}

fn costed_execution() -> ExecutionModel {
    ExecutionModel::new(ExecutionConfig {
        fee_rate: 0.0,
        slippage_pct: 0.0005,
        spread_pct: 0.001,
        ..ExecutionConfig::default()
    })
    .unwrap()
}

fn long_then_take_engine() -> BacktestEngine {
    BacktestEngine::new(
        Box::new(ScriptedStrategy {
            warmup: 1,
            entries: vec![(1, OrderSide::Buy, 95.0, 111.0)],
            exits: vec![],
        }),
        RiskManager::new(RiskConfig::default()).unwrap(),
        costed_execution(),
        BacktestConfig::default(),
    )
}

// =============================================================================
// End-to-end scenarios
// =============================================================================

#[test]
fn test_empty_series_yields_no_data_warning() {
    let strategy = TrendPullbackStrategy::new(TrendPullbackConfig::default());
    let mut engine = BacktestEngine::new(
        Box::new(strategy),
        RiskManager::new(RiskConfig::default()).unwrap(),
        ExecutionModel::new(ExecutionConfig::default()).unwrap(),
        BacktestConfig::default(),
    );
    let result = engine.run(&MarketSeries::new("BTC/USDT", Vec::new()));

    assert!(result.trades.is_empty());
    assert!(result.equity_curve.is_empty());
    assert_eq!(result.metrics.trades, 0);
    assert_eq!(result.warnings, vec![Warning::NoData]);
}

#[test]
fn test_insufficient_bars_holds_and_warns() {
    let config = small_strategy_config();
    let strategy = TrendPullbackStrategy::new(config.clone());
    let candles = make_candles(&[100.0, 101.0, 102.0, 103.0]);

    let decision = strategy.evaluate(
        &Symbol::new("BTC/USDT"),
        &candles,
        None,
        &PortfolioState::new(10_000.0),
    );
    assert_eq!(decision, StrategyDecision::hold("insufficient_data"));

    let mut engine = BacktestEngine::new(
        Box::new(TrendPullbackStrategy::new(config)),
        RiskManager::new(RiskConfig::default()).unwrap(),
        ExecutionModel::new(ExecutionConfig::default()).unwrap(),
        BacktestConfig::default(),
    );
    let result = engine.run(&MarketSeries::new("BTC/USDT", candles));

    assert!(result.trades.is_empty());
    assert!(result.equity_curve.is_empty());
    assert_eq!(result.metrics.trades, 0);
    assert!(result.warnings.contains(&Warning::NoTrades));
}

#[test]
fn test_clean_long_closed_at_adjusted_take_profit() {
    let candles = uptrend_candles(21, 3600);
    let mut engine = long_then_take_engine();
    let result = engine.run(&MarketSeries::new("BTC/USDT", candles.clone()));

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];

    // Signal on bar 1; one bar of latency means the fill uses bar 2's open,
    // adjusted up by half the spread plus slippage.
    assert_eq!(trade.entry_time, candles[2].timestamp);
    let expected_entry = 102.0 + 102.0 * 0.001 / 2.0 + 102.0 * 0.0005;
    assert!((trade.entry_price - expected_entry).abs() < 1e-9);

    // Bar 11 is the first whose high crosses the 111 take profit.
    assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
    assert_eq!(trade.exit_time, candles[11].timestamp);
    let expected_exit = 111.0 - 111.0 * 0.001 / 2.0 - 111.0 * 0.0005;
    assert!((trade.exit_price - expected_exit).abs() < 1e-9);

    assert!(trade.pnl > 0.0);
    assert!(result.metrics.net_pnl > 0.0);
    assert_eq!(result.metrics.max_losing_streak, 0);

    // Flat at the end: equity settles at initial capital plus realized pnl.
    let final_equity = *result.equity_curve.last().unwrap();
    assert!((final_equity - (10_000.0 + trade.pnl)).abs() < 1e-9);
}

#[test]
fn test_no_look_ahead_fills() {
    let candles = uptrend_candles(21, 3600);
    let mut engine = long_then_take_engine();
    let result = engine.run(&MarketSeries::new("BTC/USDT", candles.clone()));

    // The order was submitted on bar 1; its fill timestamp must belong to a
    // strictly later bar.
    for trade in &result.trades {
        assert!(trade.entry_time > candles[1].timestamp);
        assert!(trade.exit_time >= trade.entry_time);
    }
}

#[test]
fn test_equity_identity_while_long() {
    let candles = uptrend_candles(21, 3600);
    let mut engine = long_then_take_engine();
    let result = engine.run(&MarketSeries::new("BTC/USDT", candles.clone()));

    let trade = &result.trades[0];
    let cash_while_open = 10_000.0 - trade.entry_price * trade.quantity;

    // Loop starts at bar 1, so equity_curve[k] is the mark at bar k + 1.
    // Bars 2..=10 hold the open position.
    for bar in 2..=10 {
        let expected = cash_while_open + trade.quantity * candles[bar].close;
        let actual = result.equity_curve[bar - 1];
        assert!(
            (actual - expected).abs() < 1e-9,
            "equity mismatch at bar {bar}: {actual} vs {expected}"
        );
    }
}

#[test]
fn test_stop_wins_over_take_on_ambiguous_bar() {
    // Engineered bar where both the 95 stop and the 110 take are in range.
    let mut candles = flat_candles(6, 100.0, 3600);
    candles[3].high = 120.0;
    candles[3].low = 90.0;

    let mut engine = BacktestEngine::new(
        Box::new(ScriptedStrategy {
            warmup: 1,
            entries: vec![(1, OrderSide::Buy, 95.0, 110.0)],
            exits: vec![],
        }),
        RiskManager::new(RiskConfig::default()).unwrap(),
        costed_execution(),
        BacktestConfig::default(),
    );
    let result = engine.run(&MarketSeries::new("BTC/USDT", candles));

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::StopLoss);
    let expected_exit = 95.0 - 95.0 * 0.001 / 2.0 - 95.0 * 0.0005;
    assert!((trade.exit_price - expected_exit).abs() < 1e-9);
}

#[test]
fn test_drawdown_gate_stops_further_entries() {
    let mut candles = flat_candles(12, 100.0, 3600);
    candles[3].low = 89.0;

    let risk = RiskManager::new(
        RiskConfig::default()
            .with_risk_per_trade(0.1)
            .with_max_drawdown(0.05)
            .with_max_exposure_pct(1.0),
    )
    .unwrap();
    let mut engine = BacktestEngine::new(
        Box::new(ScriptedStrategy {
            warmup: 1,
            entries: vec![
                (1, OrderSide::Buy, 90.0, 10_000.0),
                (5, OrderSide::Buy, 90.0, 10_000.0),
                (8, OrderSide::Buy, 90.0, 10_000.0),
            ],
            exits: vec![],
        }),
        risk,
        ExecutionModel::new(ExecutionConfig {
            fee_rate: 0.0,
            slippage_pct: 0.0,
            spread_pct: 0.0,
            ..ExecutionConfig::default()
        })
        .unwrap(),
        BacktestConfig::default(),
    );
    let result = engine.run(&MarketSeries::new("BTC/USDT", candles));

    // The first trade draws equity down 10%, past the 5% gate; the later
    // signals must be ignored no matter how many arrive.
    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].exit_reason, ExitReason::StopLoss);
}

#[test]
fn test_overtrading_warning_on_minute_churn() {
    let candles = flat_candles(200, 100.0, 60);
    let entries = (1..200).map(|i| (i, OrderSide::Buy, 95.0, 10_000.0)).collect();
    let exits = (1..200).collect();

    let risk = RiskManager::new(
        RiskConfig::default().with_max_consecutive_losses(1_000),
    )
    .unwrap();
    let mut engine = BacktestEngine::new(
        Box::new(ScriptedStrategy {
            warmup: 1,
            entries,
            exits,
        }),
        risk,
        ExecutionModel::new(ExecutionConfig {
            fee_rate: 0.0,
            slippage_pct: 0.0,
            spread_pct: 0.0,
            ..ExecutionConfig::default()
        })
        .unwrap(),
        BacktestConfig::default(),
    );
    let result = engine.run(&MarketSeries::new("BTC/USDT", candles));

    // Well over ten round trips inside a single elapsed day.
    assert!(result.metrics.trades > 10);
    assert!(result.warnings.contains(&Warning::Overtrading));
    // Frictionless churn at one price never moves equity.
    assert!(result.warnings.contains(&Warning::FlatEquity));
}

#[test]
fn test_deterministic_replay() {
    let candles = uptrend_candles(21, 3600);
    let series = MarketSeries::new("BTC/USDT", candles);

    let mut first = long_then_take_engine();
    let mut second = long_then_take_engine();
    let a = serde_json::to_string(&first.run(&series)).unwrap();
    let b = serde_json::to_string(&second.run(&series)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_full_pipeline_with_trend_pullback_strategy() {
    // Exercise the real strategy end to end on an accelerating series; the
    // run either produces oversized returns (and says so) or stays out.
    let config = TrendPullbackConfig {
        ema_fast: 2,
        ema_slow: 3,
        rsi_period: 2,
        macd_fast: 2,
        macd_slow: 3,
        macd_signal: 2,
        atr_period: 2,
        pullback_tolerance: 0.1,
        min_rsi_long: 0.0,
        ..TrendPullbackConfig::default()
    };
    let risk = RiskManager::new(
        RiskConfig::default()
            .with_risk_per_trade(0.5)
            .with_max_drawdown(0.8)
            .with_max_consecutive_losses(10),
    )
    .unwrap();
    let execution = ExecutionModel::new(ExecutionConfig {
        fee_rate: 0.0,
        slippage_pct: 0.0,
        spread_pct: 0.0,
        ..ExecutionConfig::default()
    })
    .unwrap();
    let mut engine = BacktestEngine::new(
        Box::new(TrendPullbackStrategy::new(config)),
        risk,
        execution,
        BacktestConfig::default(),
    );

    let prices = [
        100.0, 102.0, 104.0, 106.0, 108.0, 110.0, 140.0, 200.0, 260.0, 320.0, 400.0, 500.0,
        600.0, 700.0,
    ];
    let result = engine.run(&MarketSeries::new("BTC/USDT", make_candles(&prices)));

    assert!(
        result.warnings.contains(&Warning::ExtremeReturns) || result.metrics.trades == 0
    );
}
