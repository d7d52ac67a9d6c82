//! Trend pullback strategy
//!
//! Trades with the prevailing EMA trend after a retracement toward the fast
//! EMA, confirmed by a rising MACD histogram and RSI. Stops go below the
//! recent swing or an ATR multiple, whichever is further; the take profit
//! is a fixed reward-to-risk multiple of the stop distance.

use std::collections::HashMap;

use crate::indicators::{atr, ema, macd, rsi, slope};
use crate::{
    Candle, OrderIntent, OrderSide, OrderType, PortfolioState, Position, StrategyDecision, Symbol,
};

use super::super::Strategy;
use super::TrendPullbackConfig;

pub struct TrendPullbackStrategy {
    config: TrendPullbackConfig,
}

impl TrendPullbackStrategy {
    pub fn new(config: TrendPullbackConfig) -> Self {
        Self { config }
    }

    fn entry_intent(
        &self,
        symbol: &Symbol,
        side: OrderSide,
        last: &Candle,
        stop: f64,
        take: f64,
        invalidation: f64,
    ) -> OrderIntent {
        OrderIntent {
            symbol: symbol.clone(),
            side,
            order_type: OrderType::Market,
            quantity: 0.0,
            reference_price: last.close,
            stop_loss: stop,
            take_profit: take,
            invalidation,
            created_at: last.timestamp,
        }
    }

    /// Protective stop: beyond the recent swing or an ATR multiple away,
    /// whichever is further from price
    fn compute_stop_loss(&self, swings: &[f64], price: f64, atr_value: f64, side: OrderSide) -> f64 {
        let start = swings.len().saturating_sub(self.config.swing_lookback);
        let lookback = &swings[start..];
        match side {
            OrderSide::Buy => {
                let swing_low = lookback.iter().copied().fold(f64::INFINITY, f64::min);
                swing_low.min(price - atr_value * self.config.atr_stop_mult)
            }
            OrderSide::Sell => {
                let swing_high = lookback.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                swing_high.max(price + atr_value * self.config.atr_stop_mult)
            }
        }
    }
}

impl Strategy for TrendPullbackStrategy {
    fn min_bars(&self) -> usize {
        (self.config.ema_slow + 2)
            .max(self.config.atr_period + 2)
            .max(self.config.macd_slow + self.config.macd_signal + 2)
            .max(self.config.rsi_period + 2)
            .max(self.config.swing_lookback + 2)
    }

    fn evaluate(
        &self,
        symbol: &Symbol,
        candles: &[Candle],
        position: Option<&Position>,
        _portfolio: &PortfolioState,
    ) -> StrategyDecision {
        if candles.len() < self.min_bars() {
            return StrategyDecision::hold("insufficient_data");
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
        let last = candles.last().unwrap();

        let ema_fast = ema(&closes, self.config.ema_fast);
        let ema_slow = ema(&closes, self.config.ema_slow);
        if ema_fast.is_empty() || ema_slow.is_empty() {
            return StrategyDecision::hold("ema_unavailable");
        }

        let ema_fast_last = *ema_fast.last().unwrap();
        let ema_slow_last = *ema_slow.last().unwrap();
        let ema_slow_slope = if ema_slow.len() > 1 {
            *slope(&ema_slow).last().unwrap()
        } else {
            0.0
        };

        let trend_bull = ema_fast_last > ema_slow_last && ema_slow_slope > 0.0;
        let trend_bear = ema_fast_last < ema_slow_last && ema_slow_slope < 0.0;

        let atr_values = atr(&highs, &lows, &closes, self.config.atr_period);
        let Some(&atr_last) = atr_values.last() else {
            return StrategyDecision::hold("atr_unavailable");
        };
        let atr_pct = if last.close > 0.0 {
            atr_last / last.close
        } else {
            0.0
        };
        if atr_pct < self.config.min_atr_pct || atr_pct > self.config.max_atr_pct {
            return StrategyDecision::hold("volatility_filter");
        }

        let rsi_values = rsi(&closes, self.config.rsi_period);
        if rsi_values.len() < 2 {
            return StrategyDecision::hold("rsi_unavailable");
        }
        let rsi_last = rsi_values[rsi_values.len() - 1];
        let rsi_prev = rsi_values[rsi_values.len() - 2];

        let (_, _, macd_hist) = macd(
            &closes,
            self.config.macd_fast,
            self.config.macd_slow,
            self.config.macd_signal,
        );
        if macd_hist.len() < 2 {
            return StrategyDecision::hold("macd_unavailable");
        }
        let hist_last = macd_hist[macd_hist.len() - 1];
        let hist_prev = macd_hist[macd_hist.len() - 2];

        let pullback_band = self.config.pullback_tolerance * last.close;
        let near_fast = (last.close - ema_fast_last).abs() <= pullback_band;

        // Position management: exit as soon as the entry thesis breaks.
        if let Some(position) = position {
            return match position.side {
                OrderSide::Buy if last.close < ema_slow_last || hist_last < 0.0 => {
                    StrategyDecision::exit("thesis_failed")
                }
                OrderSide::Sell if last.close > ema_slow_last || hist_last > 0.0 => {
                    StrategyDecision::exit("thesis_failed")
                }
                _ => StrategyDecision::hold("in_position"),
            };
        }

        if trend_bull
            && near_fast
            && hist_last > 0.0
            && hist_last > hist_prev
            && rsi_last > self.config.min_rsi_long
            && rsi_last > rsi_prev
        {
            let stop = self.compute_stop_loss(&lows, last.close, atr_last, OrderSide::Buy);
            let take = last.close + (last.close - stop) * self.config.rr_ratio;
            return StrategyDecision::Buy {
                intent: self.entry_intent(symbol, OrderSide::Buy, last, stop, take, ema_slow_last),
                reason: "trend_pullback_long",
                metadata: HashMap::from([("atr", atr_last), ("rsi", rsi_last)]),
            };
        }

        if trend_bear
            && near_fast
            && hist_last < 0.0
            && hist_last < hist_prev
            && rsi_last < self.config.max_rsi_short
            && rsi_last < rsi_prev
        {
            let stop = self.compute_stop_loss(&highs, last.close, atr_last, OrderSide::Sell);
            let take = last.close - (stop - last.close) * self.config.rr_ratio;
            return StrategyDecision::Sell {
                intent: self.entry_intent(symbol, OrderSide::Sell, last, stop, take, ema_slow_last),
                reason: "trend_pullback_short",
                metadata: HashMap::from([("atr", atr_last), ("rsi", rsi_last)]),
            };
        }

        StrategyDecision::hold("no_setup")
    }
}
