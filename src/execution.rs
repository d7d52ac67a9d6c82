//! Execution model
//!
//! Simulates order handling: latency in bars, spread and slippage price
//! adjustment, fees, and optional partial fills sampled from a seeded RNG.
//! With `partial_fill_probability = 0` no RNG is constructed and the model
//! is fully deterministic.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Candle, OrderFill, OrderIntent, OrderSide};

/// Invalid execution parameters, rejected at construction
#[derive(Debug, Error)]
pub enum ExecutionConfigError {
    #[error("{name} ({value}) must be >= 0")]
    NegativeRate { name: &'static str, value: f64 },

    #[error("latency_bars must be >= 1")]
    ZeroLatency,

    #[error("partial_fill_probability ({0}) must be within [0, 1]")]
    ProbabilityOutOfRange(f64),

    #[error("partial_fill_ratio ({0}) must be within (0, 1]")]
    RatioOutOfRange(f64),
}

/// Cost and latency parameters for simulated fills
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub fee_rate: f64,
    pub slippage_pct: f64,
    pub spread_pct: f64,
    /// Bars between signal and execution; at least 1 so an order can never
    /// fill on the bar that produced it
    pub latency_bars: usize,
    pub partial_fill_probability: f64,
    pub partial_fill_ratio: f64,
    pub seed: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            fee_rate: 0.001,
            slippage_pct: 0.0005,
            spread_pct: 0.0004,
            latency_bars: 1,
            partial_fill_probability: 0.0,
            partial_fill_ratio: 0.5,
            seed: 7,
        }
    }
}

impl ExecutionConfig {
    fn validate(&self) -> Result<(), ExecutionConfigError> {
        for (name, value) in [
            ("fee_rate", self.fee_rate),
            ("slippage_pct", self.slippage_pct),
            ("spread_pct", self.spread_pct),
        ] {
            if value < 0.0 {
                return Err(ExecutionConfigError::NegativeRate { name, value });
            }
        }
        if self.latency_bars < 1 {
            return Err(ExecutionConfigError::ZeroLatency);
        }
        if !(0.0..=1.0).contains(&self.partial_fill_probability) {
            return Err(ExecutionConfigError::ProbabilityOutOfRange(
                self.partial_fill_probability,
            ));
        }
        if self.partial_fill_ratio <= 0.0 || self.partial_fill_ratio > 1.0 {
            return Err(ExecutionConfigError::RatioOutOfRange(self.partial_fill_ratio));
        }
        Ok(())
    }
}

/// Simulated order execution against bar opens
#[derive(Debug)]
pub struct ExecutionModel {
    config: ExecutionConfig,
    rng: Option<StdRng>,
}

impl ExecutionModel {
    pub fn new(config: ExecutionConfig) -> Result<Self, ExecutionConfigError> {
        config.validate()?;
        let rng = (config.partial_fill_probability > 0.0)
            .then(|| StdRng::seed_from_u64(config.seed));
        Ok(Self { config, rng })
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Bar index at which an order submitted at `current_index` executes
    pub fn execution_index(&self, current_index: usize) -> usize {
        current_index + self.config.latency_bars.max(1)
    }

    /// Fill a market order against the candle open
    ///
    /// Returns `None` when the open is non-positive or the intent carries no
    /// quantity. The fill price is the open adjusted by half the spread plus
    /// slippage, against the order's side.
    pub fn fill_order(&mut self, intent: &OrderIntent, candle: &Candle) -> Option<OrderFill> {
        if candle.open <= 0.0 {
            return None;
        }

        let price = self.apply_spread_slippage(candle.open, intent.side);
        let mut quantity = intent.quantity;
        if quantity <= 0.0 {
            return None;
        }

        if let Some(rng) = self.rng.as_mut() {
            if rng.gen::<f64>() < self.config.partial_fill_probability {
                quantity *= self.config.partial_fill_ratio;
                tracing::debug!(
                    symbol = %intent.symbol,
                    quantity,
                    ratio = self.config.partial_fill_ratio,
                    "partial fill"
                );
            }
        }

        let fee = (price * quantity).abs() * self.config.fee_rate;
        Some(OrderFill {
            symbol: intent.symbol.clone(),
            side: intent.side,
            quantity,
            price,
            fee,
            filled_at: candle.timestamp,
        })
    }

    /// Adjust a price by half the spread plus slippage, against `side`
    ///
    /// Buys pay up, sells receive less. The engine applies the same rule to
    /// stop and take-profit trigger prices on the closing side.
    pub fn apply_spread_slippage(&self, price: f64, side: OrderSide) -> f64 {
        let spread = price * self.config.spread_pct;
        let slippage = price * self.config.slippage_pct;
        match side {
            OrderSide::Buy => price + spread / 2.0 + slippage,
            OrderSide::Sell => price - spread / 2.0 - slippage,
        }
    }

    /// Fee for a closing fill at the given price and quantity
    pub fn fee_for(&self, price: f64, quantity: f64) -> f64 {
        (price * quantity).abs() * self.config.fee_rate
    }
}
