use edge_core::{HistoryWindow, Side};

use crate::indicators::rsi;
use crate::traits::EntrySignal;

/// RSI mean reversion: long when oversold, short when overbought.
#[derive(Debug, Clone)]
pub struct RsiReversion {
    period: usize,
    oversold: f64,
    overbought: f64,
}

impl RsiReversion {
    pub fn new(period: usize, oversold: f64, overbought: f64) -> Self {
        Self {
            period: period.max(1),
            oversold,
            overbought,
        }
    }
}

impl Default for RsiReversion {
    fn default() -> Self {
        Self::new(14, 30.0, 70.0)
    }
}

impl EntrySignal for RsiReversion {
    fn id(&self) -> &str {
        "rsi_reversion"
    }

    fn evaluate(&self, window: &HistoryWindow<'_>) -> Option<Side> {
        let value = rsi(window.closes(), self.period)?;
        if value < self.oversold {
            Some(Side::Long)
        } else if value > self.overbought {
            Some(Side::Short)
        } else {
            None
        }
    }

    /// Distance of RSI from its midpoint, in [0, 1].
    fn score(&self, window: &HistoryWindow<'_>) -> f64 {
        rsi(window.closes(), self.period)
            .map(|v| ((v - 50.0) / 50.0).abs())
            .unwrap_or(0.0)
    }

    // Hold until RSI crosses back through the midpoint.
    fn exit(&self, window: &HistoryWindow<'_>, side: Side) -> bool {
        match (rsi(window.closes(), self.period), side) {
            (Some(v), Side::Long) => v >= 50.0,
            (Some(v), Side::Short) => v <= 50.0,
            (None, _) => false,
        }
    }
}
