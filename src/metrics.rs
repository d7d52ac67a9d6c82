//! Summary performance metrics
//!
//! A pure function of the trade log and the equity curve.

use serde::{Deserialize, Serialize};

use crate::Trade;

/// Aggregate backtest statistics
///
/// `profit_factor` may be infinite when there are no losing trades; it is
/// serialized as the string `"inf"` in that case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub net_pnl: f64,
    pub win_rate: f64,
    pub expectancy: f64,
    pub max_drawdown: f64,
    #[serde(with = "profit_factor_serde")]
    pub profit_factor: f64,
    pub trades: usize,
    pub max_losing_streak: usize,
    pub avg_win: f64,
    pub avg_loss: f64,
}

/// Compute summary metrics over closed trades and the equity curve
///
/// Break-even trades count as losses; a zero gross loss yields an infinite
/// profit factor, including the empty trade log.
pub fn compute_metrics(trades: &[Trade], equity_curve: &[f64]) -> BacktestMetrics {
    let trades_count = trades.len();
    let wins: Vec<&Trade> = trades.iter().filter(|t| t.pnl > 0.0).collect();
    let losses: Vec<&Trade> = trades.iter().filter(|t| t.pnl <= 0.0).collect();

    let net_pnl: f64 = trades.iter().map(|t| t.pnl).sum();
    let win_rate = if trades_count > 0 {
        wins.len() as f64 / trades_count as f64
    } else {
        0.0
    };
    let loss_rate = if trades_count > 0 {
        losses.len() as f64 / trades_count as f64
    } else {
        0.0
    };

    let gross_profit: f64 = wins.iter().map(|t| t.pnl).sum();
    let gross_loss: f64 = losses.iter().map(|t| t.pnl).sum::<f64>().abs();

    let avg_win = if wins.is_empty() {
        0.0
    } else {
        gross_profit / wins.len() as f64
    };
    let avg_loss = if losses.is_empty() {
        0.0
    } else {
        losses.iter().map(|t| t.pnl).sum::<f64>() / losses.len() as f64
    };

    let expectancy = avg_win * win_rate + avg_loss * loss_rate;
    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else {
        f64::INFINITY
    };

    BacktestMetrics {
        net_pnl,
        win_rate,
        expectancy,
        max_drawdown: max_drawdown(equity_curve),
        profit_factor,
        trades: trades_count,
        max_losing_streak: max_losing_streak(trades),
        avg_win,
        avg_loss,
    }
}

fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = equity_curve.first().copied().unwrap_or(0.0);
    let mut max_dd = 0.0;
    for &value in equity_curve {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            let dd = (peak - value) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

fn max_losing_streak(trades: &[Trade]) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for trade in trades {
        if trade.pnl <= 0.0 {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

mod profit_factor_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if value.is_infinite() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum NumberOrInf {
            Number(f64),
            Text(String),
        }

        match NumberOrInf::deserialize(deserializer)? {
            NumberOrInf::Number(v) => Ok(v),
            NumberOrInf::Text(s) if s == "inf" => Ok(f64::INFINITY),
            NumberOrInf::Text(s) => Err(serde::de::Error::custom(format!(
                "invalid profit_factor: {s}"
            ))),
        }
    }
}
