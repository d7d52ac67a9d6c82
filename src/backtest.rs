//! Backtesting engine
//!
//! Event-driven bar replay. The engine owns the portfolio, the trade log,
//! the equity curve, and the pending-order queue; strategy and risk only
//! ever see shared references. Within a bar the order of events is fixed:
//! pending fills, stop/take resolution, strategy evaluation, mark-to-market.
//! Orders queue for `execution_index(i) >= i + 1` bars, so a signal can
//! never fill on the bar that produced it.

use serde::{Deserialize, Serialize};

use crate::execution::ExecutionModel;
use crate::metrics::{compute_metrics, BacktestMetrics};
use crate::risk::RiskManager;
use crate::strategies::Strategy;
use crate::{
    Candle, ExitReason, MarketSeries, OrderIntent, OrderSide, OrderType, PortfolioState, Position,
    StrategyDecision, Trade, Warning,
};

/// Engine parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub allow_short: bool,
    /// Overrides the strategy's warmup when larger
    pub min_bars: Option<usize>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            allow_short: true,
            min_bars: None,
        }
    }
}

/// Why an order sits in the pending queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrderReason {
    SignalEntry,
    SignalExit,
}

#[derive(Debug)]
struct PendingOrder {
    execute_at: usize,
    intent: OrderIntent,
    reason: OrderReason,
}

/// Everything a run produces
#[derive(Debug, Serialize)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub metrics: BacktestMetrics,
    pub equity_curve: Vec<f64>,
    pub warnings: Vec<Warning>,
}

/// Bar-replay scheduler coordinating strategy, risk, and execution
pub struct BacktestEngine {
    strategy: Box<dyn Strategy>,
    risk: RiskManager,
    execution: ExecutionModel,
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(
        strategy: Box<dyn Strategy>,
        risk: RiskManager,
        execution: ExecutionModel,
        config: BacktestConfig,
    ) -> Self {
        Self {
            strategy,
            risk,
            execution,
            config,
        }
    }

    /// Replay the series through the strategy and produce the result
    ///
    /// Never fails: adverse conditions (no data, rejected intents, missed
    /// fills) surface as warnings or silent discards, not errors.
    pub fn run(&mut self, series: &MarketSeries) -> BacktestResult {
        if series.candles.is_empty() {
            return BacktestResult {
                trades: Vec::new(),
                metrics: compute_metrics(&[], &[]),
                equity_curve: Vec::new(),
                warnings: vec![Warning::NoData],
            };
        }

        let min_bars = match self.config.min_bars {
            Some(m) => m.max(self.strategy.min_bars()),
            None => self.strategy.min_bars(),
        };

        tracing::info!(
            symbol = %series.symbol,
            candles = series.candles.len(),
            min_bars,
            "starting backtest"
        );

        let mut portfolio = PortfolioState::new(self.config.initial_capital);
        let mut trades: Vec<Trade> = Vec::new();
        let mut equity_curve: Vec<f64> = Vec::new();
        let mut pending: Vec<PendingOrder> = Vec::new();

        for idx in min_bars..series.candles.len() {
            let candle = &series.candles[idx];

            self.execute_pending(idx, candle, &mut portfolio, &mut trades, &mut pending);
            self.resolve_stop_take(candle, &mut portfolio, &mut trades);

            let decision = self.strategy.evaluate(
                &series.symbol,
                &series.candles[..=idx],
                portfolio.open_position.as_ref(),
                &portfolio,
            );

            match decision {
                StrategyDecision::Exit { reason } => {
                    if let Some(position) = portfolio.open_position.as_ref() {
                        tracing::debug!(bar = idx, reason, "queuing signal exit");
                        pending.push(PendingOrder {
                            execute_at: self.execution.execution_index(idx),
                            intent: exit_intent(position, candle),
                            reason: OrderReason::SignalExit,
                        });
                    }
                }
                StrategyDecision::Buy { intent, reason, .. }
                | StrategyDecision::Sell { intent, reason, .. } => {
                    if portfolio.open_position.is_none() {
                        if intent.side == OrderSide::Sell && !self.config.allow_short {
                            tracing::debug!(bar = idx, "short entry ignored");
                        } else if let Some(sized) = self.size_intent(intent, &portfolio) {
                            tracing::debug!(
                                bar = idx,
                                side = ?sized.side,
                                quantity = sized.quantity,
                                reason,
                                "queuing signal entry"
                            );
                            pending.push(PendingOrder {
                                execute_at: self.execution.execution_index(idx),
                                intent: sized,
                                reason: OrderReason::SignalEntry,
                            });
                        }
                    }
                }
                StrategyDecision::Hold { .. } => {}
            }

            update_equity(&mut portfolio, candle);
            equity_curve.push(portfolio.equity);
        }

        let metrics = compute_metrics(&trades, &equity_curve);
        let warnings = evaluate_warnings(&trades, &equity_curve, series);
        tracing::info!(
            trades = trades.len(),
            net_pnl = metrics.net_pnl,
            "backtest finished"
        );

        BacktestResult {
            trades,
            metrics,
            equity_curve,
            warnings,
        }
    }

    /// Fill orders scheduled for this bar, in submission order
    fn execute_pending(
        &mut self,
        index: usize,
        candle: &Candle,
        portfolio: &mut PortfolioState,
        trades: &mut Vec<Trade>,
        pending: &mut Vec<PendingOrder>,
    ) {
        if pending.is_empty() {
            return;
        }
        let (ready, rest): (Vec<_>, Vec<_>) =
            pending.drain(..).partition(|o| o.execute_at == index);
        *pending = rest;

        for order in ready {
            let Some(fill) = self.execution.fill_order(&order.intent, candle) else {
                continue;
            };
            match order.reason {
                OrderReason::SignalExit => {
                    if let Some(position) = portfolio.open_position.take() {
                        let trade = close_position(
                            portfolio,
                            position,
                            fill.price,
                            fill.filled_at,
                            fill.fee,
                            ExitReason::SignalExit,
                        );
                        trades.push(trade);
                    }
                }
                OrderReason::SignalEntry => {
                    if portfolio.open_position.is_none() {
                        let position = Position {
                            symbol: fill.symbol.clone(),
                            side: fill.side,
                            entry_price: fill.price,
                            quantity: fill.quantity,
                            stop_loss: order.intent.stop_loss,
                            take_profit: order.intent.take_profit,
                            opened_at: fill.filled_at,
                            closed_at: None,
                            exit_price: None,
                            realized_pnl: None,
                            fees_paid: fill.fee,
                        };
                        apply_entry_cash(portfolio, &position);
                        tracing::debug!(
                            bar = index,
                            side = ?position.side,
                            price = position.entry_price,
                            quantity = position.quantity,
                            "position opened"
                        );
                        portfolio.open_position = Some(position);
                    }
                }
            }
        }
    }

    /// Intrabar stop/take resolution; when both trigger, the stop wins
    fn resolve_stop_take(
        &self,
        candle: &Candle,
        portfolio: &mut PortfolioState,
        trades: &mut Vec<Trade>,
    ) {
        let Some(position) = portfolio.open_position.as_ref() else {
            return;
        };

        let (hit_stop, hit_take) = match position.side {
            OrderSide::Buy => (
                candle.low <= position.stop_loss,
                candle.high >= position.take_profit,
            ),
            OrderSide::Sell => (
                candle.high >= position.stop_loss,
                candle.low <= position.take_profit,
            ),
        };

        let (trigger, reason) = if hit_stop {
            (position.stop_loss, ExitReason::StopLoss)
        } else if hit_take {
            (position.take_profit, ExitReason::TakeProfit)
        } else {
            return;
        };

        let closing_side = position.side.closing();
        let exit_price = self.execution.apply_spread_slippage(trigger, closing_side);
        let exit_fee = self.execution.fee_for(exit_price, position.quantity);

        let position = portfolio.open_position.take().unwrap();
        tracing::debug!(
            reason = ?reason,
            trigger,
            exit_price,
            "intrabar exit"
        );
        let trade = close_position(
            portfolio,
            position,
            exit_price,
            candle.timestamp,
            exit_fee,
            reason,
        );
        trades.push(trade);
    }

    /// Size an intent with the risk manager; `None` means the entry is
    /// rejected (degenerate stop, exposure cap, or gating)
    fn size_intent(&self, intent: OrderIntent, portfolio: &PortfolioState) -> Option<OrderIntent> {
        let quantity = self.risk.size_position(portfolio.equity, &intent);
        if quantity <= 0.0 {
            return None;
        }
        if !self
            .risk
            .exposure_ok(portfolio.equity, quantity, intent.reference_price)
        {
            return None;
        }
        if !self.risk.can_open_trade(portfolio) {
            return None;
        }
        Some(OrderIntent { quantity, ..intent })
    }
}

fn exit_intent(position: &Position, candle: &Candle) -> OrderIntent {
    OrderIntent {
        symbol: position.symbol.clone(),
        side: position.side.closing(),
        order_type: OrderType::Market,
        quantity: position.quantity,
        reference_price: candle.close,
        stop_loss: 0.0,
        take_profit: 0.0,
        invalidation: 0.0,
        created_at: candle.timestamp,
    }
}

fn apply_entry_cash(portfolio: &mut PortfolioState, position: &Position) {
    let notional = position.entry_price * position.quantity;
    match position.side {
        OrderSide::Buy => portfolio.cash -= notional + position.fees_paid,
        OrderSide::Sell => portfolio.cash += notional - position.fees_paid,
    }
}

/// Convert a position into a trade and settle the portfolio
fn close_position(
    portfolio: &mut PortfolioState,
    mut position: Position,
    exit_price: f64,
    exit_time: i64,
    exit_fee: f64,
    reason: ExitReason,
) -> Trade {
    position.exit_price = Some(exit_price);
    position.closed_at = Some(exit_time);
    let trade = build_trade(&position, exit_price, exit_time, exit_fee, reason);
    position.realized_pnl = Some(trade.pnl);

    let notional = exit_price * position.quantity;
    match position.side {
        OrderSide::Buy => portfolio.cash += notional - exit_fee,
        OrderSide::Sell => portfolio.cash -= notional + exit_fee,
    }
    portfolio.realized_pnl += trade.pnl;
    if trade.pnl <= 0.0 {
        portfolio.consecutive_losses += 1;
    } else {
        portfolio.consecutive_losses = 0;
    }

    trade
}

fn build_trade(
    position: &Position,
    exit_price: f64,
    exit_time: i64,
    exit_fee: f64,
    reason: ExitReason,
) -> Trade {
    let fees_paid = position.fees_paid + exit_fee;
    let pnl = match position.side {
        OrderSide::Buy => (exit_price - position.entry_price) * position.quantity - fees_paid,
        OrderSide::Sell => (position.entry_price - exit_price) * position.quantity - fees_paid,
    };
    let entry_notional = position.entry_price * position.quantity;
    let return_pct = if entry_notional > 0.0 {
        pnl / entry_notional
    } else {
        0.0
    };

    Trade {
        symbol: position.symbol.clone(),
        side: position.side,
        entry_price: position.entry_price,
        exit_price,
        quantity: position.quantity,
        entry_time: position.opened_at,
        exit_time,
        pnl,
        return_pct,
        fees_paid,
        exit_reason: reason,
    }
}

/// Mark the portfolio to the bar close and refresh peak/drawdown
fn update_equity(portfolio: &mut PortfolioState, candle: &Candle) {
    portfolio.equity = match &portfolio.open_position {
        Some(p) if p.side == OrderSide::Buy => portfolio.cash + p.quantity * candle.close,
        Some(p) => portfolio.cash - p.quantity * candle.close,
        None => portfolio.cash,
    };
    if portfolio.equity > portfolio.peak_equity {
        portfolio.peak_equity = portfolio.equity;
    }
    if portfolio.peak_equity > 0.0 {
        portfolio.drawdown = (portfolio.peak_equity - portfolio.equity) / portfolio.peak_equity;
    }
}

fn evaluate_warnings(
    trades: &[Trade],
    equity_curve: &[f64],
    series: &MarketSeries,
) -> Vec<Warning> {
    let mut warnings = Vec::new();
    if trades.is_empty() {
        warnings.push(Warning::NoTrades);
        return warnings;
    }

    let first = series.candles.first().map(|c| c.timestamp).unwrap_or(0);
    let last = series.candles.last().map(|c| c.timestamp).unwrap_or(0);
    let days = ((last - first) as f64 / 86_400.0).max(1.0);
    if trades.len() as f64 / days > 10.0 {
        warnings.push(Warning::Overtrading);
    }

    if equity_curve.is_empty() {
        warnings.push(Warning::NoEquityCurve);
    } else {
        let min = equity_curve.iter().copied().fold(f64::INFINITY, f64::min);
        let max = equity_curve
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        if min == max {
            warnings.push(Warning::FlatEquity);
        }
    }

    if trades.iter().any(|t| t.return_pct.abs() > 1.0) {
        warnings.push(Warning::ExtremeReturns);
    }

    warnings
}
