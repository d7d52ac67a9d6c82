//! Trading strategies
//!
//! Contains the strategy abstraction and the concrete strategies that
//! implement it.

pub mod trend_pullback;

pub use trend_pullback::{TrendPullbackConfig, TrendPullbackStrategy};

use crate::{Candle, PortfolioState, Position, StrategyDecision, Symbol};

/// Trading strategy abstraction
///
/// Strategies are pure over their inputs and configuration. They propose
/// direction and exit prices only; sizing belongs to the risk manager and
/// all state mutation to the engine.
pub trait Strategy: Send + Sync {
    /// Bars required before the first meaningful evaluation
    fn min_bars(&self) -> usize;

    /// Decide what to do given the bars up to and including the current one
    fn evaluate(
        &self,
        symbol: &Symbol,
        candles: &[Candle],
        position: Option<&Position>,
        portfolio: &PortfolioState,
    ) -> StrategyDecision;
}
