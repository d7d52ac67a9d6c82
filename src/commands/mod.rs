//! CLI subcommand implementations

pub mod backtest;
