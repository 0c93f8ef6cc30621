//! Indicator helpers over closed-bar history.
//!
//! Every function looks only at the tail of the slice it is given and returns
//! `None` until enough bars exist.

/// Simple moving average of the last `period` values.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let tail = &values[values.len() - period..];
    Some(tail.iter().sum::<f64>() / period as f64)
}

/// Exponential moving average seeded with the SMA of the oldest `period`
/// values of a bounded lookback (`period * 4` bars).
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let lookback = (period * 4).min(values.len());
    let tail = &values[values.len() - lookback..];
    let k = 2.0 / (period as f64 + 1.0);
    let seed = tail[..period].iter().sum::<f64>() / period as f64;
    Some(tail[period..].iter().fold(seed, |ema, &v| v * k + ema * (1.0 - k)))
}

/// EMA at every bar from `period - 1` onwards, seeded with the SMA of the
/// first `period` values. Empty when `values` is too short.
fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }
    let k = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len() - period + 1);
    let mut ema = values[..period].iter().sum::<f64>() / period as f64;
    out.push(ema);
    for &v in &values[period..] {
        ema = v * k + ema * (1.0 - k);
        out.push(ema);
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// MACD: `ema(fast) - ema(slow)`, with the signal line an EMA of that
/// difference over `signal` bars. Uses a bounded lookback of
/// `(slow + signal) * 4` bars.
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Option<Macd> {
    if fast == 0 || signal == 0 || fast >= slow || values.len() < slow + signal - 1 {
        return None;
    }
    let lookback = ((slow + signal) * 4).min(values.len());
    let tail = &values[values.len() - lookback..];

    let fast_ema = ema_series(tail, fast);
    let slow_ema = ema_series(tail, slow);
    let offset = slow - fast;
    let line: Vec<f64> = slow_ema
        .iter()
        .enumerate()
        .map(|(j, s)| fast_ema[j + offset] - s)
        .collect();

    let last_line = *line.last()?;
    let last_signal = *ema_series(&line, signal).last()?;
    Some(Macd {
        line: last_line,
        signal: last_signal,
        histogram: last_line - last_signal,
    })
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bollinger {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Bollinger bands over the last `period` values: the SMA plus and minus
/// `width` population standard deviations.
pub fn bollinger(values: &[f64], period: usize, width: f64) -> Option<Bollinger> {
    let middle = sma(values, period)?;
    let tail = &values[values.len() - period..];
    let variance = tail.iter().map(|v| (v - middle).powi(2)).sum::<f64>() / period as f64;
    let band = width * variance.sqrt();
    Some(Bollinger {
        upper: middle + band,
        middle,
        lower: middle - band,
    })
}

/// Relative Strength Index over the last `period` changes (simple averages).
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }
    let tail = &values[values.len() - period - 1..];
    let (gain, loss) = tail.windows(2).fold((0.0, 0.0), |(g, l), w| {
        let change = w[1] - w[0];
        if change > 0.0 {
            (g + change, l)
        } else {
            (g, l - change)
        }
    });
    let avg_gain = gain / period as f64;
    let avg_loss = loss / period as f64;
    if avg_loss == 0.0 {
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// Average True Range over the last `period` bars.
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Option<f64> {
    let n = closes.len();
    if period == 0 || n < period + 1 || highs.len() != n || lows.len() != n {
        return None;
    }
    let total: f64 = (n - period..n)
        .map(|i| {
            let prev = closes[i - 1];
            (highs[i] - lows[i])
                .max((highs[i] - prev).abs())
                .max((lows[i] - prev).abs())
        })
        .sum();
    Some(total / period as f64)
}

/// Highest value among the last `period` values.
pub fn highest(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    values[values.len() - period..]
        .iter()
        .copied()
        .reduce(f64::max)
}

/// Lowest value among the last `period` values.
pub fn lowest(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    values[values.len() - period..]
        .iter()
        .copied()
        .reduce(f64::min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(sma(&v, 2), Some(3.5));
        assert_eq!(sma(&v, 5), None);
        assert_eq!(sma(&v, 0), None);
    }

    #[test]
    fn test_ema_constant_series() {
        let v = [5.0; 40];
        assert!((ema(&v, 10).unwrap() - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_ema_tracks_trend() {
        let v: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let e = ema(&v, 10).unwrap();
        assert!(e < 49.0 && e > sma(&v, 20).unwrap());
    }

    #[test]
    fn test_macd_on_linear_trend() {
        let v: Vec<f64> = (0..100).map(|i| i as f64).collect();
        let m = macd(&v, 12, 26, 9).unwrap();
        assert!((m.line - 7.0).abs() < 1e-9);
        assert!((m.signal - 7.0).abs() < 1e-9);
        assert!(m.histogram.abs() < 1e-9);

        assert_eq!(macd(&v[..33], 12, 26, 9), None);
        assert!(macd(&v[..34], 12, 26, 9).is_some());
        assert_eq!(macd(&v, 26, 12, 9), None);
    }

    #[test]
    fn test_macd_flat_series_is_zero() {
        let m = macd(&[42.0; 60], 12, 26, 9).unwrap();
        assert!(m.line.abs() < 1e-12);
        assert!(m.histogram.abs() < 1e-12);
    }

    #[test]
    fn test_bollinger_bands() {
        let b = bollinger(&[9.0, 1.0, 2.0, 3.0, 4.0, 5.0], 5, 2.0).unwrap();
        assert_eq!(b.middle, 3.0);
        assert!((b.upper - (3.0 + 2.0 * 2.0f64.sqrt())).abs() < 1e-12);
        assert!((b.lower - (3.0 - 2.0 * 2.0f64.sqrt())).abs() < 1e-12);

        let flat = bollinger(&[7.0; 20], 20, 2.0).unwrap();
        assert_eq!((flat.upper, flat.lower), (7.0, 7.0));
        assert_eq!(bollinger(&[1.0, 2.0], 3, 2.0), None);
    }

    #[test]
    fn test_rsi_bounds() {
        let up: Vec<f64> = (0..20).map(|i| i as f64).collect();
        assert_eq!(rsi(&up, 14), Some(100.0));
        let down: Vec<f64> = (0..20).map(|i| -(i as f64)).collect();
        assert!(rsi(&down, 14).unwrap() < 1e-9);
        assert_eq!(rsi(&[1.0; 20], 14), Some(50.0));
    }

    #[test]
    fn test_atr_flat_range() {
        let highs = [11.0; 10];
        let lows = [9.0; 10];
        let closes = [10.0; 10];
        assert_eq!(atr(&highs, &lows, &closes, 5), Some(2.0));
    }

    #[test]
    fn test_highest_lowest() {
        let v = [3.0, 9.0, 1.0, 4.0];
        assert_eq!(highest(&v, 3), Some(9.0));
        assert_eq!(lowest(&v, 2), Some(1.0));
        assert_eq!(highest(&v, 5), None);
    }
}
