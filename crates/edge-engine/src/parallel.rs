use rayon::prelude::*;
use serde::Serialize;

use edge_core::{CandleStore, StrategyConfig};
use edge_strategy::StrategyRegistry;

use crate::engine::{BacktestEngine, BacktestResult};
use crate::error::BacktestError;
use crate::validator::{ResultValidation, StatisticalValidator};

/// One (series, strategy config) pair to backtest.
#[derive(Debug, Clone, Copy)]
pub struct BacktestJob<'a> {
    pub candles: &'a CandleStore,
    pub config: &'a StrategyConfig,
}

/// Full result: backtest + statistical validation for a single job.
#[derive(Debug, Clone, Serialize)]
pub struct FullResult {
    pub backtest: BacktestResult,
    pub validation: ResultValidation,
}

/// Orchestrate parallel backtesting across many jobs.
///
/// Level 1: jobs in parallel via `par_iter`
/// Level 2: validation (bootstrap + permutation) already parallel inside
pub struct ParallelRunner {
    engine: BacktestEngine,
    validator: StatisticalValidator,
    registry: StrategyRegistry,
}

impl ParallelRunner {
    pub fn new(engine: BacktestEngine, validator: StatisticalValidator, registry: StrategyRegistry) -> Self {
        Self {
            engine,
            validator,
            registry,
        }
    }

    /// Run all jobs in parallel. Results keep job order; one failing job
    /// does not affect the others.
    pub fn run_all(&self, jobs: &[BacktestJob<'_>]) -> Vec<Result<FullResult, BacktestError>> {
        jobs.par_iter().map(|job| self.run_one(job)).collect()
    }

    pub fn run_one(&self, job: &BacktestJob<'_>) -> Result<FullResult, BacktestError> {
        let signal = self
            .registry
            .get(&job.config.strategy_id)
            .ok_or_else(|| BacktestError::UnknownStrategy(job.config.strategy_id.clone()))?;
        let backtest = self.engine.run(job.candles, job.config, signal)?;
        let validation = self.validator.validate_result(&backtest)?;
        Ok(FullResult {
            backtest,
            validation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core::{EngineSettings, MetricsConfig, ValidatorConfig};

    fn make_candles(symbol: &str, n: usize, slope: f64) -> CandleStore {
        let mut store = CandleStore::with_capacity(symbol, n);
        for i in 0..n {
            let p = 100.0 + i as f64 * slope + (i as f64 * 0.4).sin();
            store.push(i as i64 * 60, p, p + 0.2, p - 0.2, p + 0.05, 1000.0);
        }
        store
    }

    fn runner() -> ParallelRunner {
        let metrics = MetricsConfig::new(525_600.0);
        ParallelRunner::new(
            BacktestEngine::new(EngineSettings::default(), metrics),
            StatisticalValidator::new(
                ValidatorConfig {
                    runs: 50,
                    n_bootstrap: 50,
                    seed: Some(42),
                    ..ValidatorConfig::default()
                },
                metrics,
            ),
            StrategyRegistry::with_builtins(),
        )
    }

    #[test]
    fn test_parallel_runner_keeps_job_order() {
        let up = make_candles("UP", 150, 0.05);
        let down = make_candles("DOWN", 150, -0.05);
        let ma = StrategyConfig::new("ma_crossover", 0.02, 0.04);
        let hold = StrategyConfig::new("buy_and_hold", 0.02, 0.04);
        let missing = StrategyConfig::new("missing", 0.02, 0.04);

        let jobs = [
            BacktestJob { candles: &up, config: &ma },
            BacktestJob { candles: &down, config: &hold },
            BacktestJob { candles: &up, config: &missing },
        ];
        let results = runner().run_all(&jobs);
        assert_eq!(results.len(), 3);

        let first = results[0].as_ref().unwrap();
        assert_eq!(first.backtest.symbol, "UP");
        assert_eq!(first.backtest.strategy_id, "ma_crossover");
        assert_eq!(first.backtest.equity_curve.len(), 150);

        let second = results[1].as_ref().unwrap();
        assert_eq!(second.backtest.symbol, "DOWN");
        assert_eq!(second.validation.permutation.seed, 42);

        assert_eq!(
            results[2].as_ref().unwrap_err(),
            &BacktestError::UnknownStrategy("missing".into())
        );
    }
}
