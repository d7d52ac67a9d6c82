//! Core data types used across the backtesting engine

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Validation errors for candle data
#[derive(Debug, Error)]
pub enum CandleValidationError {
    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("volume ({0}) must be >= 0")]
    NegativeVolume(f64),

    #[error("open ({open}) must be between low ({low}) and high ({high})")]
    OpenOutOfRange { open: f64, low: f64, high: f64 },

    #[error("close ({close}) must be between low ({low}) and high ({high})")]
    CloseOutOfRange { close: f64, low: f64, high: f64 },
}

/// OHLCV bar for a fixed time interval
///
/// `timestamp` is epoch seconds and must be non-decreasing within a series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Create a new candle with validation
    pub fn new(
        timestamp: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, CandleValidationError> {
        let candle = Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        };
        candle.validate()?;
        Ok(candle)
    }

    /// Create a candle without validation (trusted sources)
    pub fn new_unchecked(
        timestamp: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Validate the candle invariants
    pub fn validate(&self) -> Result<(), CandleValidationError> {
        if self.high < self.low {
            return Err(CandleValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if self.volume < 0.0 {
            return Err(CandleValidationError::NegativeVolume(self.volume));
        }

        if self.open < self.low || self.open > self.high {
            return Err(CandleValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }

        if self.close < self.low || self.close > self.high {
            return Err(CandleValidationError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }

        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Trading pair symbol
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(s: impl Into<String>) -> Self {
        Symbol(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An ordered sequence of candles for one symbol
///
/// Timestamps must be monotonically non-decreasing; the CSV loader enforces
/// this on ingest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSeries {
    pub symbol: Symbol,
    pub candles: Vec<Candle>,
}

impl MarketSeries {
    pub fn new(symbol: impl Into<String>, candles: Vec<Candle>) -> Self {
        Self {
            symbol: Symbol::new(symbol),
            candles,
        }
    }
}

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// The side that closes a position opened on this side
    pub fn closing(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

/// Order type; only market orders are modeled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
}

/// A request to trade, proposed by a strategy
///
/// Strategies emit intents with `quantity = 0`; the engine asks the risk
/// manager to fill in a sized quantity before queuing the order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: f64,
    pub reference_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub invalidation: f64,
    pub created_at: i64,
}

/// A simulated execution produced by the execution model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderFill {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub quantity: f64,
    pub price: f64,
    pub fee: f64,
    pub filled_at: i64,
}

/// An open (or just-closed) position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub entry_price: f64,
    pub quantity: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub opened_at: i64,
    pub closed_at: Option<i64>,
    pub exit_price: Option<f64>,
    pub realized_pnl: Option<f64>,
    /// Accumulates entry and exit fees
    pub fees_paid: f64,
}

impl Position {
    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        match self.side {
            OrderSide::Buy => (current_price - self.entry_price) * self.quantity,
            OrderSide::Sell => (self.entry_price - current_price) * self.quantity,
        }
    }
}

/// Why a position was closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    SignalExit,
}

/// Completed trade record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: Symbol,
    pub side: OrderSide,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    pub entry_time: i64,
    pub exit_time: i64,
    pub pnl: f64,
    pub return_pct: f64,
    pub fees_paid: f64,
    pub exit_reason: ExitReason,
}

/// Portfolio state owned and mutated exclusively by the backtest engine
///
/// Strategies and the risk manager only ever see a shared reference. At most
/// one position is open at a time, which the `Option` encodes directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioState {
    pub cash: f64,
    pub equity: f64,
    pub peak_equity: f64,
    pub drawdown: f64,
    pub open_position: Option<Position>,
    pub realized_pnl: f64,
    pub consecutive_losses: usize,
}

impl PortfolioState {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            cash: initial_capital,
            equity: initial_capital,
            peak_equity: initial_capital,
            drawdown: 0.0,
            open_position: None,
            realized_pnl: 0.0,
            consecutive_losses: 0,
        }
    }

    pub fn position_count(&self) -> usize {
        usize::from(self.open_position.is_some())
    }
}

/// What a strategy wants the engine to do on the current bar
///
/// Buy and Sell carry an unsized intent; Hold and Exit carry only a reason
/// tag. `metadata` holds named scalars (e.g. atr, rsi) for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub enum StrategyDecision {
    Hold {
        reason: &'static str,
    },
    Buy {
        intent: OrderIntent,
        reason: &'static str,
        metadata: HashMap<&'static str, f64>,
    },
    Sell {
        intent: OrderIntent,
        reason: &'static str,
        metadata: HashMap<&'static str, f64>,
    },
    Exit {
        reason: &'static str,
    },
}

impl StrategyDecision {
    pub fn hold(reason: &'static str) -> Self {
        StrategyDecision::Hold { reason }
    }

    pub fn exit(reason: &'static str) -> Self {
        StrategyDecision::Exit { reason }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            StrategyDecision::Hold { reason }
            | StrategyDecision::Buy { reason, .. }
            | StrategyDecision::Sell { reason, .. }
            | StrategyDecision::Exit { reason } => reason,
        }
    }
}

/// Diagnostic warnings attached to a backtest result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Warning {
    NoData,
    NoTrades,
    Overtrading,
    FlatEquity,
    NoEquityCurve,
    ExtremeReturns,
}
