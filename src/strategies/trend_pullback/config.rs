//! Trend pullback configuration

use serde::{Deserialize, Serialize};

/// Parameters for the trend-pullback strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPullbackConfig {
    /// Fast EMA period, the pullback anchor (default: 20)
    pub ema_fast: usize,

    /// Slow EMA period, the trend filter (default: 50)
    pub ema_slow: usize,

    /// RSI period (default: 14)
    pub rsi_period: usize,

    /// MACD fast period (default: 12)
    pub macd_fast: usize,

    /// MACD slow period (default: 26)
    pub macd_slow: usize,

    /// MACD signal period (default: 9)
    pub macd_signal: usize,

    /// ATR period (default: 14)
    pub atr_period: usize,

    /// Bars scanned for the protective swing high/low (default: 10)
    pub swing_lookback: usize,

    /// Maximum distance from the fast EMA, as a fraction of close
    /// (default: 0.003)
    pub pullback_tolerance: f64,

    /// ATR multiple for the volatility stop (default: 1.6)
    pub atr_stop_mult: f64,

    /// Reward-to-risk ratio for the take profit (default: 2.0)
    pub rr_ratio: f64,

    /// Lower bound on atr/close; quieter markets are skipped
    /// (default: 0.002)
    pub min_atr_pct: f64,

    /// Upper bound on atr/close; wilder markets are skipped (default: 0.08)
    pub max_atr_pct: f64,

    /// RSI floor for long entries (default: 52)
    pub min_rsi_long: f64,

    /// RSI ceiling for short entries (default: 48)
    pub max_rsi_short: f64,
}

impl Default for TrendPullbackConfig {
    fn default() -> Self {
        Self {
            ema_fast: 20,
            ema_slow: 50,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            atr_period: 14,
            swing_lookback: 10,
            pullback_tolerance: 0.003,
            atr_stop_mult: 1.6,
            rr_ratio: 2.0,
            min_atr_pct: 0.002,
            max_atr_pct: 0.08,
            min_rsi_long: 52.0,
            max_rsi_short: 48.0,
        }
    }
}
