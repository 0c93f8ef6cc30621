use edge_core::{HistoryWindow, Side};

use crate::indicators::sma;
use crate::traits::EntrySignal;

/// Moving-average crossover regime signal.
///
/// Long while the fast SMA is above the slow SMA, short while below. The
/// position is closed by the default `exit` once the regime flips.
#[derive(Debug, Clone)]
pub struct MaCrossover {
    fast: usize,
    slow: usize,
}

impl MaCrossover {
    /// `fast` is clamped below `slow`.
    pub fn new(fast: usize, slow: usize) -> Self {
        let slow = slow.max(2);
        Self {
            fast: fast.clamp(1, slow - 1),
            slow,
        }
    }

    fn spread(&self, closes: &[f64]) -> Option<f64> {
        Some(sma(closes, self.fast)? - sma(closes, self.slow)?)
    }
}

impl Default for MaCrossover {
    fn default() -> Self {
        Self::new(10, 30)
    }
}

impl EntrySignal for MaCrossover {
    fn id(&self) -> &str {
        "ma_crossover"
    }

    fn evaluate(&self, window: &HistoryWindow<'_>) -> Option<Side> {
        let spread = self.spread(window.closes())?;
        if spread > 0.0 {
            Some(Side::Long)
        } else if spread < 0.0 {
            Some(Side::Short)
        } else {
            None
        }
    }

    /// Spread relative to price, so a tiny cross can be filtered by `min_score`.
    fn score(&self, window: &HistoryWindow<'_>) -> f64 {
        let close = window.last_close();
        match self.spread(window.closes()) {
            Some(spread) if close > 0.0 => (spread / close).abs(),
            _ => 0.0,
        }
    }
}
