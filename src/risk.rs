//! Risk management
//!
//! Gating and sizing for new positions. The risk manager never mutates the
//! portfolio; it inspects a shared reference and returns values.
//!
//! Position sizing formula:
//! ```text
//! quantity = (equity * risk_per_trade) / |reference_price - stop_loss|
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{OrderIntent, PortfolioState};

/// Invalid risk parameters, rejected at construction
#[derive(Debug, Error)]
pub enum RiskConfigError {
    #[error("{name} ({value}) must be within [0, 1]")]
    FractionOutOfRange { name: &'static str, value: f64 },

    #[error("max_positions must be >= 1")]
    NoPositionCapacity,
}

/// Risk limits for gating and sizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Fraction of equity risked between entry and stop on each trade
    pub risk_per_trade: f64,
    /// Drawdown at which new entries are blocked
    pub max_drawdown: f64,
    pub max_positions: usize,
    /// Cap on notional / equity for a single position
    pub max_exposure_pct: f64,
    /// Losing streak at which new entries are blocked
    pub max_consecutive_losses: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            risk_per_trade: 0.01,
            max_drawdown: 0.2,
            max_positions: 1,
            max_exposure_pct: 0.5,
            max_consecutive_losses: 4,
        }
    }
}

impl RiskConfig {
    pub fn with_risk_per_trade(mut self, risk: f64) -> Self {
        self.risk_per_trade = risk;
        self
    }

    pub fn with_max_drawdown(mut self, dd: f64) -> Self {
        self.max_drawdown = dd;
        self
    }

    pub fn with_max_exposure_pct(mut self, pct: f64) -> Self {
        self.max_exposure_pct = pct;
        self
    }

    pub fn with_max_consecutive_losses(mut self, limit: usize) -> Self {
        self.max_consecutive_losses = limit;
        self
    }

    fn validate(&self) -> Result<(), RiskConfigError> {
        for (name, value) in [
            ("risk_per_trade", self.risk_per_trade),
            ("max_drawdown", self.max_drawdown),
            ("max_exposure_pct", self.max_exposure_pct),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(RiskConfigError::FractionOutOfRange { name, value });
            }
        }
        if self.max_positions == 0 {
            return Err(RiskConfigError::NoPositionCapacity);
        }
        Ok(())
    }
}

/// Gating and sizing over validated limits
#[derive(Debug, Clone)]
pub struct RiskManager {
    config: RiskConfig,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Result<Self, RiskConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// May a new position be opened in this portfolio state?
    pub fn can_open_trade(&self, portfolio: &PortfolioState) -> bool {
        if portfolio.drawdown >= self.config.max_drawdown {
            tracing::debug!(
                drawdown = portfolio.drawdown,
                limit = self.config.max_drawdown,
                "entry blocked by drawdown"
            );
            return false;
        }
        if portfolio.consecutive_losses >= self.config.max_consecutive_losses {
            tracing::debug!(
                losses = portfolio.consecutive_losses,
                limit = self.config.max_consecutive_losses,
                "entry blocked by losing streak"
            );
            return false;
        }
        if portfolio.position_count() >= self.config.max_positions {
            return false;
        }
        true
    }

    /// Convert the per-trade risk budget into a quantity
    ///
    /// Returns 0 when the stop distance is degenerate; never negative.
    pub fn size_position(&self, equity: f64, intent: &OrderIntent) -> f64 {
        let risk_amount = equity * self.config.risk_per_trade;
        let risk_per_unit = (intent.reference_price - intent.stop_loss).abs();
        if risk_per_unit <= 0.0 {
            return 0.0;
        }
        let quantity = risk_amount / risk_per_unit;
        if quantity < 0.0 {
            return 0.0;
        }
        quantity
    }

    /// Is the proposed notional within the exposure cap?
    pub fn exposure_ok(&self, equity: f64, quantity: f64, price: f64) -> bool {
        if equity <= 0.0 {
            return false;
        }
        (quantity * price) / equity <= self.config.max_exposure_pct
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{OrderSide, OrderType, Symbol};

    fn intent(reference_price: f64, stop_loss: f64) -> OrderIntent {
        OrderIntent {
            symbol: Symbol::new("BTCUSDT"),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            quantity: 0.0,
            reference_price,
            stop_loss,
            take_profit: 0.0,
            invalidation: 0.0,
            created_at: 0,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(RiskManager::new(RiskConfig::default()).is_ok());
    }

    #[test]
    fn test_rejects_out_of_range_fractions() {
        let err = RiskManager::new(RiskConfig::default().with_risk_per_trade(1.5));
        assert!(matches!(
            err,
            Err(RiskConfigError::FractionOutOfRange { name: "risk_per_trade", .. })
        ));

        let err = RiskManager::new(RiskConfig::default().with_max_drawdown(-0.1));
        assert!(matches!(err, Err(RiskConfigError::FractionOutOfRange { .. })));
    }

    #[test]
    fn test_rejects_zero_position_capacity() {
        let config = RiskConfig {
            max_positions: 0,
            ..RiskConfig::default()
        };
        assert!(matches!(
            RiskManager::new(config),
            Err(RiskConfigError::NoPositionCapacity)
        ));
    }

    #[test]
    fn test_can_open_trade_gates() {
        let rm = RiskManager::new(RiskConfig::default()).unwrap();
        let mut portfolio = PortfolioState::new(10_000.0);
        assert!(rm.can_open_trade(&portfolio));

        portfolio.drawdown = 0.25;
        assert!(!rm.can_open_trade(&portfolio));

        portfolio.drawdown = 0.0;
        portfolio.consecutive_losses = 4;
        assert!(!rm.can_open_trade(&portfolio));
    }

    #[test]
    fn test_position_sizing() {
        let rm = RiskManager::new(RiskConfig::default()).unwrap();
        // risk = 10,000 * 0.01 = 100; stop distance = 5; quantity = 20
        let quantity = rm.size_position(10_000.0, &intent(100.0, 95.0));
        assert_eq!(quantity, 20.0);
    }

    #[test]
    fn test_sizing_degenerate_stop_distance() {
        let rm = RiskManager::new(RiskConfig::default()).unwrap();
        assert_eq!(rm.size_position(10_000.0, &intent(100.0, 100.0)), 0.0);
    }

    #[test]
    fn test_exposure_cap() {
        let rm = RiskManager::new(RiskConfig::default()).unwrap();
        // 40 * 100 / 10,000 = 0.4 <= 0.5
        assert!(rm.exposure_ok(10_000.0, 40.0, 100.0));
        // 60 * 100 / 10,000 = 0.6 > 0.5
        assert!(!rm.exposure_ok(10_000.0, 60.0, 100.0));
        assert!(!rm.exposure_ok(0.0, 1.0, 100.0));
        assert!(!rm.exposure_ok(-100.0, 1.0, 100.0));
    }
}
