use std::ops::Range;

use rayon::prelude::*;
use tracing::debug;

use edge_core::{CandleStore, StrategyConfig};
use edge_strategy::EntrySignal;

use crate::engine::BacktestEngine;
use crate::error::OptimizerError;

/// Everything an optimizer may look at for one fold.
///
/// `train` indexes into `candles`; bars after `train.end` must not
/// influence the chosen parameters.
pub struct OptimizationContext<'a> {
    pub candles: &'a CandleStore,
    pub train: Range<usize>,
    pub base: &'a StrategyConfig,
    pub signal: &'a dyn EntrySignal,
    pub engine: &'a BacktestEngine,
}

/// Picks strategy parameters from a train window.
pub trait Optimizer: Send + Sync {
    fn name(&self) -> &str;

    fn optimize(&self, ctx: &OptimizationContext<'_>) -> Result<StrategyConfig, OptimizerError>;
}

/// Always returns the base config unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedParams;

impl Optimizer for FixedParams {
    fn name(&self) -> &str {
        "fixed"
    }

    fn optimize(&self, ctx: &OptimizationContext<'_>) -> Result<StrategyConfig, OptimizerError> {
        Ok(ctx.base.clone())
    }
}

/// Exhaustive stop-loss × take-profit sweep scored by train-window Sharpe.
///
/// Candidates run in parallel; ties go to the earliest candidate in grid
/// order so the choice does not depend on scheduling.
#[derive(Debug, Clone)]
pub struct GridSearchOptimizer {
    stop_loss: Vec<f64>,
    take_profit: Vec<f64>,
}

impl GridSearchOptimizer {
    pub fn new(stop_loss: Vec<f64>, take_profit: Vec<f64>) -> Self {
        Self {
            stop_loss,
            take_profit,
        }
    }

    fn candidates(&self, base: &StrategyConfig) -> Vec<StrategyConfig> {
        self.stop_loss
            .iter()
            .flat_map(|&sl| {
                self.take_profit.iter().map(move |&tp| StrategyConfig {
                    stop_loss_pct: sl,
                    take_profit_pct: tp,
                    ..base.clone()
                })
            })
            .collect()
    }
}

impl Default for GridSearchOptimizer {
    fn default() -> Self {
        Self::new(
            vec![0.01, 0.02, 0.03, 0.05],
            vec![0.02, 0.04, 0.06, 0.10],
        )
    }
}

impl Optimizer for GridSearchOptimizer {
    fn name(&self) -> &str {
        "grid_search"
    }

    fn optimize(&self, ctx: &OptimizationContext<'_>) -> Result<StrategyConfig, OptimizerError> {
        if ctx.train.is_empty() {
            return Err(OptimizerError::EmptyTrainWindow {
                start: ctx.train.start,
                end: ctx.train.end,
            });
        }
        let mut candidates = self.candidates(ctx.base);
        if candidates.is_empty() {
            return Err(OptimizerError::NoCandidates);
        }

        let scores = candidates
            .par_iter()
            .map(|candidate| {
                ctx.engine
                    .run_window(ctx.candles, ctx.train.start, ctx.train.clone(), candidate, ctx.signal)
                    .map(|r| r.metrics.sharpe_ratio)
            })
            .collect::<Result<Vec<f64>, _>>()?;

        let mut best = 0;
        for (i, &score) in scores.iter().enumerate() {
            if score > scores[best] {
                best = i;
            }
        }
        let chosen = candidates.swap_remove(best);
        debug!(
            train_start = ctx.train.start,
            train_end = ctx.train.end,
            stop_loss = chosen.stop_loss_pct,
            take_profit = chosen.take_profit_pct,
            sharpe = scores[best],
            "grid search picked parameters"
        );
        Ok(chosen)
    }
}
