//! Pure technical-indicator functions used by the technical agent.
//!
//! These operate on plain `&[f64]` series (no dataframe dependency) and
//! return a series of the same length, matching the Wilder/EWM
//! conventions of the Python reference implementation.

/// Exponential moving average with the given smoothing period, Wilder-style
/// (`alpha = 1 / period`), seeded with the first value.
fn ewm(series: &[f64], period: usize) -> Vec<f64> {
    if series.is_empty() {
        return Vec::new();
    }
    let alpha = 1.0 / period as f64;
    let mut out = Vec::with_capacity(series.len());
    out.push(series[0]);
    for &value in &series[1..] {
        let prev = *out.last().unwrap();
        out.push(alpha * value + (1.0 - alpha) * prev);
    }
    out
}

/// Relative Strength Index over `period` bars.
pub fn rsi(close: &[f64], period: usize) -> Vec<f64> {
    if close.len() < 2 {
        return vec![50.0; close.len()];
    }
    let mut gains = vec![0.0];
    let mut losses = vec![0.0];
    for window in close.windows(2) {
        let delta = window[1] - window[0];
        gains.push(delta.max(0.0));
        losses.push((-delta).max(0.0));
    }
    let avg_gain = ewm(&gains, period);
    let avg_loss = ewm(&losses, period);
    avg_gain
        .iter()
        .zip(avg_loss.iter())
        .map(|(&g, &l)| {
            if l == 0.0 {
                100.0
            } else {
                let rs = g / l;
                100.0 - (100.0 / (1.0 + rs))
            }
        })
        .collect()
}

/// MACD line and signal line (fast/slow/signal EWM periods).
pub fn macd(close: &[f64], fast: usize, slow: usize, signal: usize) -> (Vec<f64>, Vec<f64>) {
    let fast_ema = ewm(close, fast);
    let slow_ema = ewm(close, slow);
    let macd_line: Vec<f64> = fast_ema.iter().zip(slow_ema.iter()).map(|(f, s)| f - s).collect();
    let signal_line = ewm(&macd_line, signal);
    (macd_line, signal_line)
}

/// Bollinger bands: returns (lower, mean, upper) over a rolling `period`
/// simple moving average and sample standard deviation.
pub fn bollinger_bands(close: &[f64], period: usize, n_std: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = close.len();
    let mut lower = Vec::with_capacity(n);
    let mut mean = Vec::with_capacity(n);
    let mut upper = Vec::with_capacity(n);
    for i in 0..n {
        let start = i.saturating_sub(period - 1);
        let window = &close[start..=i];
        let m = window.iter().sum::<f64>() / window.len() as f64;
        let variance = if window.len() > 1 {
            window.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (window.len() - 1) as f64
        } else {
            0.0
        };
        let sd = variance.sqrt();
        mean.push(m);
        lower.push(m - n_std * sd);
        upper.push(m + n_std * sd);
    }
    (lower, mean, upper)
}

/// Cumulative volume-weighted average price.
pub fn vwap(close: &[f64], volume: &[f64]) -> Vec<f64> {
    let mut cum_turnover = 0.0;
    let mut cum_volume = 0.0;
    close
        .iter()
        .zip(volume.iter())
        .map(|(&c, &v)| {
            cum_turnover += c * v;
            cum_volume += v;
            if cum_volume == 0.0 {
                c
            } else {
                cum_turnover / cum_volume
            }
        })
        .collect()
}

/// Average True Range over `period` bars via Wilder EWM of the true range.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<f64> {
    let n = high.len();
    let mut true_range = Vec::with_capacity(n);
    for i in 0..n {
        let hl = high[i] - low[i];
        let tr = if i == 0 {
            hl
        } else {
            let hc = (high[i] - close[i - 1]).abs();
            let lc = (low[i] - close[i - 1]).abs();
            hl.max(hc).max(lc)
        };
        true_range.push(tr);
    }
    ewm(&true_range, period)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_is_bounded() {
        let close = vec![10.0, 11.0, 10.5, 12.0, 13.0, 12.5, 14.0, 15.0];
        let values = rsi(&close, 3);
        assert_eq!(values.len(), close.len());
        assert!(values.iter().all(|v| (0.0..=100.0).contains(v)));
    }

    #[test]
    fn bollinger_upper_never_below_lower() {
        let close = vec![1.0, 2.0, 3.0, 2.0, 1.0, 4.0, 5.0];
        let (lower, _mean, upper) = bollinger_bands(&close, 3, 2.0);
        for (l, u) in lower.iter().zip(upper.iter()) {
            assert!(u >= l);
        }
    }

    #[test]
    fn vwap_matches_single_point_close() {
        let close = vec![10.0];
        let volume = vec![0.0];
        assert_eq!(vwap(&close, &volume), vec![10.0]);
    }
}
