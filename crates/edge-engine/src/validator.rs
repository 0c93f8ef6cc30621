use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use edge_core::{mix_seed, MetricsConfig, ValidatorConfig};

use crate::engine::BacktestResult;
use crate::error::ValidationError;
use crate::metrics::{sharpe_per_period, MetricsCalculator};

/// Seed used when the caller does not supply one.
pub const DEFAULT_SEED: u64 = 42;

pub const SIGN_FLIP_METHOD: &str = "sign_flip_permutation";

// Keeps bootstrap streams apart from permutation streams under one seed.
const BOOTSTRAP_STREAM: u64 = 0xB007_5EED;

/// Outcome of a sign-flip permutation test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    /// Per-period Sharpe of the input returns.
    pub observed_statistic: f64,
    /// `None` when the sample is below `min_sample`.
    pub p_value: Option<f64>,
    pub method: String,
    pub runs: usize,
    pub seed: u64,
    pub sample_size: usize,
    pub is_significant: bool,
}

/// Permutation test plus the auxiliary checks run on a full backtest.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultValidation {
    pub permutation: ValidationResult,
    /// Percentile 95% interval of the annualized Sharpe.
    pub sharpe_ci_95: (f64, f64),
    pub overfitting_warning: Option<String>,
}

/// Statistical validator for backtest return series.
///
/// - Sign-flip permutation test on the per-period Sharpe (Rayon, one
///   seeded RNG per trial)
/// - Bootstrap 95% CI on the annualized Sharpe (Rayon, one RNG per resample)
/// - IS/OOS overfitting check (70/30 split)
#[derive(Debug, Clone)]
pub struct StatisticalValidator {
    config: ValidatorConfig,
    metrics: MetricsConfig,
}

impl StatisticalValidator {
    pub fn new(config: ValidatorConfig, metrics: MetricsConfig) -> Self {
        Self { config, metrics }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// One-sided sign-flip permutation test.
    ///
    /// Each trial multiplies every return by an independent fair ±1 and
    /// recomputes the Sharpe. The p-value is
    /// `(count(synthetic >= observed) + 1) / (runs + 1)`, so it always lies
    /// in `(0, 1]`. The same input and seed give the same p-value no matter
    /// how trials are scheduled across threads.
    pub fn validate(
        &self,
        returns: &[f64],
        runs: usize,
        seed: Option<u64>,
    ) -> Result<ValidationResult, ValidationError> {
        if runs == 0 {
            return Err(ValidationError::NoRuns);
        }
        if let Some((index, &value)) = returns.iter().enumerate().find(|(_, r)| !r.is_finite()) {
            return Err(ValidationError::NonFiniteReturn { index, value });
        }

        let seed = seed.unwrap_or(DEFAULT_SEED);
        let observed = sharpe_per_period(returns);
        let mut result = ValidationResult {
            observed_statistic: observed,
            p_value: None,
            method: SIGN_FLIP_METHOD.to_string(),
            runs,
            seed,
            sample_size: returns.len(),
            is_significant: false,
        };

        if returns.len() < self.config.min_sample {
            debug!(
                sample = returns.len(),
                min_sample = self.config.min_sample,
                "sample too small for permutation test"
            );
            return Ok(result);
        }

        let at_least_as_extreme = (0..runs)
            .into_par_iter()
            .filter(|&trial| {
                let mut rng = StdRng::seed_from_u64(mix_seed(seed, trial as u64));
                let flipped: Vec<f64> = returns
                    .iter()
                    .map(|&r| if rng.gen_bool(0.5) { r } else { -r })
                    .collect();
                sharpe_per_period(&flipped) >= observed
            })
            .count();

        let p_value = (at_least_as_extreme + 1) as f64 / (runs + 1) as f64;
        result.p_value = Some(p_value);
        result.is_significant = p_value < self.config.significance_level;
        Ok(result)
    }

    /// Permutation test with the configured runs and seed, plus bootstrap CI
    /// and overfitting check over the result's equity curve.
    pub fn validate_result(&self, result: &BacktestResult) -> Result<ResultValidation, ValidationError> {
        let returns = result.returns();
        let permutation = self.validate(&returns, self.config.runs, self.config.seed)?;
        let seed = self.config.seed.unwrap_or(DEFAULT_SEED);

        let values = result.equity_values();
        let overfitting_warning = if values.len() >= 20 {
            let split = (values.len() as f64 * 0.7) as usize;
            let is_returns = MetricsCalculator::returns_from_values(&values[..split]);
            let oos_returns = MetricsCalculator::returns_from_values(&values[split..]);
            if is_returns.len() >= 2 && oos_returns.len() >= 2 {
                let ppy = self.metrics.periods_per_year;
                Self::check_overfitting(
                    MetricsCalculator::sharpe_ratio(&is_returns, ppy),
                    MetricsCalculator::sharpe_ratio(&oos_returns, ppy),
                )
            } else {
                None
            }
        } else {
            None
        };

        Ok(ResultValidation {
            permutation,
            sharpe_ci_95: self.bootstrap_sharpe_ci(&returns, seed),
            overfitting_warning,
        })
    }

    /// Bootstrap 95% CI on the annualized Sharpe.
    pub fn bootstrap_sharpe_ci(&self, returns: &[f64], seed: u64) -> (f64, f64) {
        let n_bootstrap = self.config.n_bootstrap;
        if returns.len() < 2 || n_bootstrap == 0 {
            return (0.0, 0.0);
        }

        let n = returns.len();
        let ppy = self.metrics.periods_per_year;
        let stream = seed ^ BOOTSTRAP_STREAM;

        let mut sharpes: Vec<f64> = (0..n_bootstrap)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(mix_seed(stream, i as u64));
                let sample: Vec<f64> = (0..n).map(|_| returns[rng.gen_range(0..n)]).collect();
                MetricsCalculator::sharpe_ratio(&sample, ppy)
            })
            .collect();

        sharpes.sort_unstable_by(f64::total_cmp);

        let lower_idx = (n_bootstrap as f64 * 0.025) as usize;
        let upper_idx = ((n_bootstrap as f64 * 0.975) as usize).min(sharpes.len() - 1);
        (sharpes[lower_idx], sharpes[upper_idx])
    }

    /// Warn when out-of-sample Sharpe is non-positive or less than half the
    /// in-sample Sharpe.
    pub fn check_overfitting(is_sharpe: f64, oos_sharpe: f64) -> Option<String> {
        if oos_sharpe <= 0.0 {
            return Some(format!(
                "Out-of-sample Sharpe ({:.2}) is non-positive. In-sample was {:.2}. Likely overfitting.",
                oos_sharpe, is_sharpe
            ));
        }
        let ratio = is_sharpe / oos_sharpe;
        if ratio > 2.0 {
            return Some(format!(
                "IS/OOS Sharpe ratio is {:.2}x (IS={:.2}, OOS={:.2}). Possible overfitting.",
                ratio, is_sharpe, oos_sharpe
            ));
        }
        None
    }
}

impl Default for StatisticalValidator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default(), MetricsConfig::new(252.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(min_sample: usize) -> StatisticalValidator {
        StatisticalValidator::new(
            ValidatorConfig {
                min_sample,
                n_bootstrap: 200,
                ..ValidatorConfig::default()
            },
            MetricsConfig::new(252.0),
        )
    }

    fn biased(n: usize) -> Vec<f64> {
        (0..n).map(|i| 0.01 + 0.005 * (i as f64 * 0.7).sin()).collect()
    }

    fn neutral(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let sign = if i % 2 == 0 { 1.0 } else { -1.0 };
                sign * 0.01 * (1.0 + 0.1 * (i as f64).cos())
            })
            .collect()
    }

    #[test]
    fn test_small_sample_has_no_p_value() {
        let result = validator(30).validate(&biased(10), 100, Some(1)).unwrap();
        assert_eq!(result.p_value, None);
        assert_eq!(result.sample_size, 10);
        assert!(!result.is_significant);
        assert!(result.observed_statistic > 0.0);
    }

    #[test]
    fn test_zero_runs_rejected() {
        assert_eq!(
            validator(5).validate(&biased(10), 0, None),
            Err(ValidationError::NoRuns)
        );
    }

    #[test]
    fn test_non_finite_return_rejected() {
        let mut returns = biased(40);
        returns[7] = f64::INFINITY;
        assert!(matches!(
            validator(5).validate(&returns, 10, None),
            Err(ValidationError::NonFiniteReturn { index: 7, .. })
        ));
    }

    #[test]
    fn test_biased_series_is_significant() {
        let result = validator(30).validate(&biased(100), 500, Some(7)).unwrap();
        let p = result.p_value.unwrap();
        assert!(p < 0.05, "expected significant p-value, got {}", p);
        assert!(p > 0.0);
        assert!(result.is_significant);
        assert_eq!(result.method, SIGN_FLIP_METHOD);
    }

    #[test]
    fn test_neutral_series_is_not_degenerate() {
        let result = validator(30).validate(&neutral(200), 500, Some(7)).unwrap();
        let p = result.p_value.unwrap();
        assert!(p > 0.05 && p < 0.95, "p-value {} is degenerate", p);
    }

    #[test]
    fn test_same_seed_same_p_value() {
        let v = validator(30);
        let a = v.validate(&neutral(120), 300, Some(99)).unwrap();
        let b = v.validate(&neutral(120), 300, Some(99)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_default_seed_recorded() {
        let result = validator(30).validate(&neutral(60), 50, None).unwrap();
        assert_eq!(result.seed, DEFAULT_SEED);
    }

    #[test]
    fn test_all_zero_returns_give_p_one() {
        let result = validator(5).validate(&[0.0; 50], 99, Some(3)).unwrap();
        assert_eq!(result.p_value, Some(1.0));
    }

    #[test]
    fn test_bootstrap_ci_empty() {
        assert_eq!(validator(5).bootstrap_sharpe_ci(&[], 42), (0.0, 0.0));
    }

    #[test]
    fn test_bootstrap_ci_ordered() {
        let (lo, hi) = validator(5).bootstrap_sharpe_ci(&neutral(80), 42);
        assert!(lo <= hi);
    }

    #[test]
    fn test_check_overfitting_none() {
        assert!(StatisticalValidator::check_overfitting(2.0, 1.5).is_none());
    }

    #[test]
    fn test_check_overfitting_detected() {
        assert!(StatisticalValidator::check_overfitting(4.0, 1.0).is_some());
        assert!(StatisticalValidator::check_overfitting(1.0, -0.5).is_some());
    }
}
