//! Technical indicators
//!
//! Pure transforms over ordered price sequences. All outputs are
//! trailing-aligned: the last element corresponds to the latest input. Every
//! function returns an empty vector when the input is too short for its
//! period; none of them panic.

/// Calculate Exponential Moving Average
///
/// Seeded with the SMA of the first `period` values, then
/// `ema = (value - ema) * k + ema` with `k = 2 / (period + 1)`.
/// Output length is `len - period + 1`.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut result = Vec::with_capacity(values.len() - period + 1);
    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;
    result.push(seed);

    for &value in &values[period..] {
        let prev = *result.last().unwrap();
        result.push((value - prev) * k + prev);
    }

    result
}

/// Calculate Simple Moving Average over a sliding window
///
/// Output length is `len - period + 1`.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(values.len() - period + 1);
    let mut window_sum: f64 = values[..period].iter().sum();
    result.push(window_sum / period as f64);

    for i in period..values.len() {
        window_sum += values[i] - values[i - period];
        result.push(window_sum / period as f64);
    }

    result
}

/// Calculate Relative Strength Index with Wilder smoothing
///
/// The first average gain/loss is a simple mean of the first `period`
/// deltas; afterwards `avg = (prev * (period - 1) + current) / period`.
/// A zero average loss maps to RSI 100. Output length is `len - period`.
pub fn rsi(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() <= period {
        return Vec::new();
    }

    let mut gains = Vec::with_capacity(values.len() - 1);
    let mut losses = Vec::with_capacity(values.len() - 1);
    for pair in values.windows(2) {
        let delta = pair[1] - pair[0];
        gains.push(delta.max(0.0));
        losses.push((-delta).max(0.0));
    }

    let mut avg_gain: f64 = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss: f64 = losses[..period].iter().sum::<f64>() / period as f64;

    let rsi_of = |avg_gain: f64, avg_loss: f64| {
        let rs = if avg_loss > 0.0 { avg_gain / avg_loss } else { 0.0 };
        100.0 - (100.0 / (1.0 + rs))
    };

    let mut result = Vec::with_capacity(gains.len() - period + 1);
    result.push(rsi_of(avg_gain, avg_loss));

    for i in period..gains.len() {
        avg_gain = (avg_gain * (period as f64 - 1.0) + gains[i]) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + losses[i]) / period as f64;
        result.push(rsi_of(avg_gain, avg_loss));
    }

    result
}

/// Calculate MACD line, signal line, and histogram
///
/// The MACD line is `ema(fast) - ema(slow)` aligned on the slow tail; the
/// signal is an EMA of the MACD line; all three outputs are aligned on the
/// signal tail. Returns an empty triple when any stage lacks data.
pub fn macd(
    values: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    if values.len() < slow + signal {
        return (Vec::new(), Vec::new(), Vec::new());
    }

    let ema_fast = ema(values, fast);
    let ema_slow = ema(values, slow);
    if ema_fast.is_empty() || ema_slow.is_empty() {
        return (Vec::new(), Vec::new(), Vec::new());
    }

    let macd_line: Vec<f64> = ema_fast[ema_fast.len() - ema_slow.len()..]
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();

    let signal_line = ema(&macd_line, signal);
    if signal_line.is_empty() {
        return (Vec::new(), Vec::new(), Vec::new());
    }

    let macd_tail = macd_line[macd_line.len() - signal_line.len()..].to_vec();
    let hist: Vec<f64> = macd_tail
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| m - s)
        .collect();

    (macd_tail, signal_line, hist)
}

/// Calculate Average True Range with Wilder smoothing
///
/// True range is `max(high - low, |high - prev_close|, |low - prev_close|)`.
/// Output length is `len - period` (one bar is consumed by the previous
/// close).
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    let mut trs = Vec::with_capacity(closes.len() - 1);
    for i in 1..closes.len() {
        let prev_close = closes[i - 1];
        let tr = (highs[i] - lows[i])
            .max((highs[i] - prev_close).abs())
            .max((lows[i] - prev_close).abs());
        trs.push(tr);
    }

    let mut result = Vec::with_capacity(trs.len() - period + 1);
    result.push(trs[..period].iter().sum::<f64>() / period as f64);

    for i in period..trs.len() {
        let prev = *result.last().unwrap();
        result.push((prev * (period as f64 - 1.0) + trs[i]) / period as f64);
    }

    result
}

/// Calculate Bollinger Bands as (upper, middle, lower)
///
/// Population mean and standard deviation over a sliding window, bands at
/// `mean +/- num_std * stdev`.
pub fn bollinger(values: &[f64], period: usize, num_std: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    if period == 0 || values.len() < period {
        return (Vec::new(), Vec::new(), Vec::new());
    }

    let count = values.len() - period + 1;
    let mut upper = Vec::with_capacity(count);
    let mut mid = Vec::with_capacity(count);
    let mut lower = Vec::with_capacity(count);

    for window in values.windows(period) {
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance =
            window.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / period as f64;
        let std = variance.sqrt();
        upper.push(mean + num_std * std);
        mid.push(mean);
        lower.push(mean - num_std * std);
    }

    (upper, mid, lower)
}

/// Calculate population standard deviation over a sliding window
pub fn stdev(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    values
        .windows(period)
        .map(|window| {
            let mean = window.iter().sum::<f64>() / period as f64;
            let variance =
                window.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / period as f64;
            variance.sqrt()
        })
        .collect()
}

/// First difference of a sequence; output length is `len - 1`
pub fn slope(values: &[f64]) -> Vec<f64> {
    if values.len() < 2 {
        return Vec::new();
    }
    values.windows(2).map(|pair| pair[1] - pair[0]).collect()
}
