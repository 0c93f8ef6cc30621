use edge_core::{HistoryWindow, Side};

use crate::indicators::{highest, lowest};
use crate::traits::EntrySignal;

/// Channel breakout trend follower meant to run with fixed stop/target exits.
///
/// Long when the close breaks above the highest high of the previous
/// `lookback` bars, short when it breaks below the lowest low. It never asks
/// for a signal exit; stops, targets and holding limits close the trade.
#[derive(Debug, Clone)]
pub struct TrendBreakout {
    lookback: usize,
}

impl TrendBreakout {
    pub fn new(lookback: usize) -> Self {
        Self {
            lookback: lookback.max(1),
        }
    }
}

impl Default for TrendBreakout {
    fn default() -> Self {
        Self::new(20)
    }
}

impl EntrySignal for TrendBreakout {
    fn id(&self) -> &str {
        "trend_breakout"
    }

    fn evaluate(&self, window: &HistoryWindow<'_>) -> Option<Side> {
        let n = window.len();
        if n < self.lookback + 1 {
            return None;
        }
        let close = window.last_close();
        let prior_highs = &window.highs()[..n - 1];
        let prior_lows = &window.lows()[..n - 1];
        if close > highest(prior_highs, self.lookback)? {
            Some(Side::Long)
        } else if close < lowest(prior_lows, self.lookback)? {
            Some(Side::Short)
        } else {
            None
        }
    }

    fn exit(&self, _window: &HistoryWindow<'_>, _side: Side) -> bool {
        false
    }
}
