use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::config::WalkForwardConfig;
use crate::error::ConfigError;

/// One walk-forward fold over a bar series.
///
/// Bounds are bar indices into the full series; ends are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldWindow {
    pub index: usize,
    pub train_start: usize,
    pub train_end: usize,
    pub trade_start: usize,
    pub trade_end: usize,
}

impl FoldWindow {
    #[inline]
    pub fn train_range(&self) -> Range<usize> {
        self.train_start..self.train_end
    }

    #[inline]
    pub fn trade_range(&self) -> Range<usize> {
        self.trade_start..self.trade_end
    }

    #[inline]
    pub fn trade_len(&self) -> usize {
        self.trade_end - self.trade_start
    }
}

/// Partition `len` bars into consecutive (train, trade) folds.
///
/// Fold `k` trains on `[k * step, k * step + train_bars)` (or from bar 0 when
/// anchored) and trades the bars right after it. The last trade window may be
/// shorter than `trade_bars`; folds whose trade window would be empty are not
/// produced. Trade windows never overlap.
pub fn compute_folds(len: usize, config: &WalkForwardConfig) -> Result<Vec<FoldWindow>, ConfigError> {
    config.validate()?;
    let step = config.step();

    let mut folds = Vec::new();
    let mut offset = 0usize;
    loop {
        let train_end = offset + config.train_bars;
        if train_end >= len {
            break;
        }
        let trade_end = (train_end + config.trade_bars).min(len);
        folds.push(FoldWindow {
            index: folds.len(),
            train_start: if config.anchored { 0 } else { offset },
            train_end,
            trade_start: train_end,
            trade_end,
        });
        offset += step;
    }

    Ok(folds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(train: usize, trade: usize, step: Option<usize>, anchored: bool) -> WalkForwardConfig {
        WalkForwardConfig {
            train_bars: train,
            trade_bars: trade,
            step_bars: step,
            anchored,
            ..WalkForwardConfig::default()
        }
    }

    #[test]
    fn test_rolling_folds() {
        let folds = compute_folds(100, &config(40, 20, None, false)).unwrap();
        assert_eq!(folds.len(), 3);
        assert_eq!(folds[0].train_range(), 0..40);
        assert_eq!(folds[0].trade_range(), 40..60);
        assert_eq!(folds[1].train_range(), 20..60);
        assert_eq!(folds[1].trade_range(), 60..80);
        assert_eq!(folds[2].trade_range(), 80..100);
    }

    #[test]
    fn test_partial_last_fold() {
        let folds = compute_folds(95, &config(40, 20, None, false)).unwrap();
        assert_eq!(folds.len(), 3);
        assert_eq!(folds[2].trade_range(), 80..95);
        assert_eq!(folds[2].trade_len(), 15);
    }

    #[test]
    fn test_anchored_folds_grow_train_window() {
        let folds = compute_folds(100, &config(40, 20, None, true)).unwrap();
        assert!(folds.iter().all(|f| f.train_start == 0));
        assert_eq!(folds[2].train_range(), 0..80);
    }

    #[test]
    fn test_trade_windows_do_not_overlap() {
        let folds = compute_folds(1000, &config(100, 30, Some(45), false)).unwrap();
        for pair in folds.windows(2) {
            assert!(pair[0].trade_end <= pair[1].trade_start);
        }
    }

    #[test]
    fn test_too_short_series() {
        assert!(compute_folds(40, &config(40, 20, None, false)).unwrap().is_empty());
    }
}
