//! Market data loading
//!
//! Parses OHLCV bars from CSV. Columns are resolved by header name, so the
//! column order in the file does not matter. Timestamps are epoch seconds;
//! a `%Y-%m-%d %H:%M:%S` datetime (assumed UTC) is accepted as a fallback.

use anyhow::{bail, Context, Result};
use std::io::Read;
use std::path::Path;

use crate::{Candle, MarketSeries};

/// Load a full series for one symbol from a CSV file
pub fn load_series(symbol: impl Into<String>, path: impl AsRef<Path>) -> Result<MarketSeries> {
    let candles = load_candles(path)?;
    Ok(MarketSeries::new(symbol, candles))
}

/// Load candles from a CSV file
pub fn load_candles(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open CSV file: {}", path.display()))?;
    let candles = read_candles(file)?;
    tracing::info!(candles = candles.len(), path = %path.display(), "loaded CSV data");
    Ok(candles)
}

/// Parse candles from any reader
///
/// Rows are consumed in file order and must carry monotonically
/// non-decreasing timestamps. The volume column is optional and defaults
/// to 0.
pub fn read_candles<R: Read>(input: R) -> Result<Vec<Candle>> {
    let mut reader = csv::Reader::from_reader(input);
    let headers = reader.headers().context("failed to read CSV header")?.clone();
    let column = |name: &str| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));

    let ts_col = column("timestamp").context("missing timestamp column")?;
    let open_col = column("open").context("missing open column")?;
    let high_col = column("high").context("missing high column")?;
    let low_col = column("low").context("missing low column")?;
    let close_col = column("close").context("missing close column")?;
    let volume_col = column("volume");

    let mut candles = Vec::new();
    for (row_idx, result) in reader.records().enumerate() {
        let row = row_idx + 2; // 1-based, after the header line
        let record = result.with_context(|| format!("failed to read row {row}"))?;

        let timestamp = parse_timestamp(field(&record, ts_col, "timestamp", row)?)
            .with_context(|| format!("row {row}"))?;
        if let Some(prev) = candles.last().map(|c: &Candle| c.timestamp) {
            if timestamp < prev {
                bail!("non-monotonic timestamp at row {row}: {timestamp} < {prev}");
            }
        }

        let open = parse_price(&record, open_col, "open", row)?;
        let high = parse_price(&record, high_col, "high", row)?;
        let low = parse_price(&record, low_col, "low", row)?;
        let close = parse_price(&record, close_col, "close", row)?;
        let volume = match volume_col {
            Some(col) => {
                let raw = record.get(col).unwrap_or("").trim();
                if raw.is_empty() {
                    0.0
                } else {
                    raw.parse()
                        .with_context(|| format!("failed to parse volume at row {row}: {raw}"))?
                }
            }
            None => 0.0,
        };

        candles.push(Candle {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        });
    }

    Ok(candles)
}

fn field<'a>(record: &'a csv::StringRecord, col: usize, name: &str, row: usize) -> Result<&'a str> {
    record
        .get(col)
        .with_context(|| format!("missing {name} at row {row}"))
}

fn parse_price(record: &csv::StringRecord, col: usize, name: &str, row: usize) -> Result<f64> {
    let raw = field(record, col, name, row)?;
    raw.trim()
        .parse()
        .with_context(|| format!("failed to parse {name} at row {row}: {raw}"))
}

fn parse_timestamp(raw: &str) -> Result<i64> {
    let raw = raw.trim();
    if let Ok(seconds) = raw.parse::<i64>() {
        return Ok(seconds);
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|ndt| ndt.and_utc().timestamp())
        .with_context(|| format!("failed to parse timestamp: {raw}"))
}
