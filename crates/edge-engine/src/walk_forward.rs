use serde::Serialize;
use tracing::{info, warn};

use edge_core::{
    compute_folds, CandleStore, EngineSettings, FoldWindow, MetricsConfig, StrategyConfig,
    WalkForwardConfig,
};
use edge_strategy::{EntrySignal, StrategyRegistry};

use crate::cancel::CancelToken;
use crate::engine::{BacktestEngine, BacktestResult, EquityPoint, Trade};
use crate::error::WalkForwardError;
use crate::metrics::{Metrics, MetricsCalculator};
use crate::optimizer::{OptimizationContext, Optimizer};
use crate::validator::StatisticalValidator;

/// One completed fold: parameters chosen on the train window and the
/// out-of-sample run over the trade window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalkForwardFold {
    pub window: FoldWindow,
    pub params: StrategyConfig,
    pub starting_capital: f64,
    pub ending_capital: f64,
    pub in_sample_sharpe: Option<f64>,
    pub out_of_sample_sharpe: f64,
    pub passed: bool,
    pub result: BacktestResult,
}

/// A fold that could not be completed. Capital passes through it unchanged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoldFailure {
    pub fold_index: usize,
    pub window: FoldWindow,
    pub starting_capital: f64,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalkForwardReport {
    pub strategy_id: String,
    pub optimizer: String,
    pub initial_capital: f64,
    pub final_capital: f64,
    pub folds: Vec<WalkForwardFold>,
    pub failures: Vec<FoldFailure>,
    /// Out-of-sample equity, one point per processed trade bar, re-indexed
    /// from 0.
    pub stitched_equity: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub metrics: Metrics,
    pub fold_sharpes: Vec<f64>,
    /// Passing folds over processed (completed + failed) folds.
    pub pass_fraction: f64,
    pub promoted: bool,
    pub overfitting_warnings: Vec<String>,
    /// Set when the token fired before every fold was processed.
    pub cancelled: bool,
}

/// Rolling (or anchored) re-optimization with compounding capital.
pub struct WalkForwardRunner {
    settings: EngineSettings,
    metrics: MetricsConfig,
    config: WalkForwardConfig,
}

impl WalkForwardRunner {
    pub fn new(settings: EngineSettings, metrics: MetricsConfig, config: WalkForwardConfig) -> Self {
        Self {
            settings,
            metrics,
            config,
        }
    }

    /// Run every fold in order.
    ///
    /// Fold `k` starts from fold `k - 1`'s ending capital. A fold whose
    /// optimizer or backtest fails is recorded and its trade bars are
    /// stitched as flat capital. The token is checked before each fold;
    /// folds already completed are kept when it fires.
    pub fn run(
        &self,
        candles: &CandleStore,
        base: &StrategyConfig,
        registry: &StrategyRegistry,
        optimizer: &dyn Optimizer,
        cancel: &CancelToken,
    ) -> Result<WalkForwardReport, WalkForwardError> {
        base.validate()?;
        self.metrics.validate()?;
        let signal = registry
            .get(&base.strategy_id)
            .ok_or_else(|| WalkForwardError::UnknownStrategy(base.strategy_id.clone()))?;

        let windows = compute_folds(candles.len(), &self.config)?;
        if windows.is_empty() {
            return Err(WalkForwardError::NotEnoughData {
                len: candles.len(),
                required: self.config.train_bars + 1,
            });
        }

        let mut capital = self.config.initial_capital;
        let mut folds = Vec::with_capacity(windows.len());
        let mut failures = Vec::new();
        let mut stitched_equity = Vec::new();
        let mut trades = Vec::new();
        let mut cancelled = false;

        for window in &windows {
            if cancel.is_cancelled() {
                warn!(
                    fold = window.index,
                    completed = folds.len(),
                    "walk-forward cancelled"
                );
                cancelled = true;
                break;
            }

            match self.run_fold(candles, window, base, signal, optimizer, capital) {
                Ok(fold) => {
                    info!(
                        fold = window.index,
                        start_capital = fold.starting_capital,
                        end_capital = fold.ending_capital,
                        sharpe = fold.out_of_sample_sharpe,
                        "fold complete"
                    );
                    for point in &fold.result.equity_curve {
                        stitched_equity.push(EquityPoint {
                            bar_index: stitched_equity.len(),
                            ..*point
                        });
                    }
                    trades.extend(fold.result.trades.iter().cloned());
                    capital = fold.ending_capital;
                    folds.push(fold);
                }
                Err(error) => {
                    warn!(fold = window.index, %error, "fold failed, capital carried over");
                    for i in window.trade_range() {
                        stitched_equity.push(EquityPoint {
                            bar_index: stitched_equity.len(),
                            timestamp: candles.timestamps[i],
                            equity: capital,
                        });
                    }
                    failures.push(FoldFailure {
                        fold_index: window.index,
                        window: *window,
                        starting_capital: capital,
                        error,
                    });
                }
            }
        }

        let processed = folds.len() + failures.len();
        let passes = folds.iter().filter(|f| f.passed).count();
        let pass_fraction = if processed == 0 {
            0.0
        } else {
            passes as f64 / processed as f64
        };
        let promoted = processed > 0 && pass_fraction >= self.config.min_pass_fraction;

        let overfitting_warnings = folds
            .iter()
            .filter_map(|f| {
                let is_sharpe = f.in_sample_sharpe?;
                StatisticalValidator::check_overfitting(is_sharpe, f.out_of_sample_sharpe)
                    .map(|w| format!("fold {}: {}", f.window.index, w))
            })
            .collect();

        let metrics = MetricsCalculator::calculate(&trades, &stitched_equity, &self.metrics);

        info!(
            strategy = %base.strategy_id,
            folds = folds.len(),
            failed = failures.len(),
            pass_fraction,
            promoted,
            "walk-forward complete"
        );

        Ok(WalkForwardReport {
            strategy_id: base.strategy_id.clone(),
            optimizer: optimizer.name().to_string(),
            initial_capital: self.config.initial_capital,
            final_capital: capital,
            fold_sharpes: folds.iter().map(|f| f.out_of_sample_sharpe).collect(),
            folds,
            failures,
            stitched_equity,
            trades,
            metrics,
            pass_fraction,
            promoted,
            overfitting_warnings,
            cancelled,
        })
    }

    fn run_fold(
        &self,
        candles: &CandleStore,
        window: &FoldWindow,
        base: &StrategyConfig,
        signal: &dyn EntrySignal,
        optimizer: &dyn Optimizer,
        capital: f64,
    ) -> Result<WalkForwardFold, String> {
        let engine = BacktestEngine::new(self.settings.clone(), self.metrics).with_initial_capital(capital);

        let ctx = OptimizationContext {
            candles,
            train: window.train_range(),
            base,
            signal,
            engine: &engine,
        };
        let params = optimizer
            .optimize(&ctx)
            .map_err(|e| format!("optimizer: {}", e))?;

        let history_start = window.train_start;
        let in_sample_sharpe =
            match engine.run_window(candles, history_start, window.train_range(), &params, signal) {
                Ok(r) => Some(r.metrics.sharpe_ratio),
                Err(error) => {
                    warn!(fold = window.index, %error, "in-sample run failed");
                    None
                }
            };

        let result = engine
            .run_window(candles, history_start, window.trade_range(), &params, signal)
            .map_err(|e| format!("backtest: {}", e))?;

        let out_of_sample_sharpe = result.metrics.sharpe_ratio;
        Ok(WalkForwardFold {
            window: *window,
            starting_capital: capital,
            ending_capital: result.final_capital,
            in_sample_sharpe,
            out_of_sample_sharpe,
            passed: out_of_sample_sharpe > self.config.sharpe_threshold,
            params,
            result,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::FixedParams;

    fn trending(n: usize) -> CandleStore {
        let mut store = CandleStore::new("TREND");
        for i in 0..n {
            let p = 100.0 + i as f64 * 0.1 + 2.0 * (i as f64 * 0.3).sin();
            store.push(i as i64 * 3600, p, p + 0.5, p - 0.5, p + 0.1, 1000.0);
        }
        store
    }

    fn runner(train: usize, trade: usize) -> WalkForwardRunner {
        WalkForwardRunner::new(
            EngineSettings::default(),
            MetricsConfig::new(8760.0),
            WalkForwardConfig {
                train_bars: train,
                trade_bars: trade,
                ..WalkForwardConfig::default()
            },
        )
    }

    #[test]
    fn test_capital_compounds_across_folds() {
        let candles = trending(400);
        let base = StrategyConfig::new("ma_crossover", 0.03, 0.06);
        let report = runner(100, 60)
            .run(
                &candles,
                &base,
                &StrategyRegistry::with_builtins(),
                &FixedParams,
                &CancelToken::new(),
            )
            .unwrap();

        assert_eq!(report.folds.len(), 5);
        assert_eq!(report.folds[0].starting_capital, 10_000.0);
        for pair in report.folds.windows(2) {
            assert_eq!(pair[1].starting_capital, pair[0].ending_capital);
        }
        assert_eq!(report.final_capital, report.folds[4].ending_capital);
        assert_eq!(report.stitched_equity.len(), 300);
        assert!(report
            .stitched_equity
            .iter()
            .enumerate()
            .all(|(i, p)| p.bar_index == i));
        assert!(!report.cancelled);
    }

    #[test]
    fn test_unknown_strategy() {
        let candles = trending(200);
        let base = StrategyConfig::new("nope", 0.03, 0.06);
        let err = runner(100, 50)
            .run(
                &candles,
                &base,
                &StrategyRegistry::with_builtins(),
                &FixedParams,
                &CancelToken::new(),
            )
            .unwrap_err();
        assert_eq!(err, WalkForwardError::UnknownStrategy("nope".into()));
    }

    #[test]
    fn test_not_enough_data() {
        let candles = trending(100);
        let base = StrategyConfig::new("buy_and_hold", 0.03, 0.06);
        let err = runner(100, 50)
            .run(
                &candles,
                &base,
                &StrategyRegistry::with_builtins(),
                &FixedParams,
                &CancelToken::new(),
            )
            .unwrap_err();
        assert_eq!(
            err,
            WalkForwardError::NotEnoughData {
                len: 100,
                required: 101
            }
        );
    }

    #[test]
    fn test_cancelled_before_start() {
        let candles = trending(300);
        let base = StrategyConfig::new("buy_and_hold", 0.03, 0.06);
        let token = CancelToken::new();
        token.cancel();
        let report = runner(100, 50)
            .run(
                &candles,
                &base,
                &StrategyRegistry::with_builtins(),
                &FixedParams,
                &token,
            )
            .unwrap();
        assert!(report.cancelled);
        assert!(report.folds.is_empty());
        assert!(report.stitched_equity.is_empty());
        assert!(!report.promoted);
        assert_eq!(report.final_capital, 10_000.0);
    }
}
