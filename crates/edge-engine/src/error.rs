use std::path::PathBuf;

use thiserror::Error;

use edge_core::{ConfigError, ExecutionError};

/// Failure of a single backtest run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("unknown strategy id '{0}'")]
    UnknownStrategy(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Rejected validator input. Too-small samples are not errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("permutation runs must be >= 1")]
    NoRuns,

    #[error("return at index {index} is not finite: {value}")]
    NonFiniteReturn { index: usize, value: f64 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizerError {
    #[error("optimizer has no candidate parameters")]
    NoCandidates,

    #[error("train window {start}..{end} is empty")]
    EmptyTrainWindow { start: usize, end: usize },

    #[error(transparent)]
    Backtest(#[from] BacktestError),
}

/// Run-level walk-forward failure. Per-fold failures are recorded in the
/// report instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WalkForwardError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unknown strategy id '{0}'")]
    UnknownStrategy(String),

    #[error("{len} bars cannot form a fold: need at least {required}")]
    NotEnoughData { len: usize, required: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("reference engine '{engine}' failed on scenario '{scenario}': {reason}")]
pub struct ReferenceError {
    pub engine: String,
    pub scenario: String,
    pub reason: String,
}

/// Strict-mode harness failure: at least one scenario diverged.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{} scenario(s) diverged from reference: {}; artifact at {}", .failed.len(), .failed.join(", "), .artifact.display())]
pub struct ComparisonDivergenceError {
    pub failed: Vec<String>,
    pub artifact: PathBuf,
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Divergence(#[from] ComparisonDivergenceError),

    #[error("artifact I/O at {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = BacktestError::from(ExecutionError::EmptySeries);
        assert!(matches!(err, BacktestError::Execution(_)));

        let err = ComparisonDivergenceError {
            failed: vec!["buy_and_hold".into(), "ma_crossover".into()],
            artifact: PathBuf::from("out/comparison.json"),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("2 scenario(s)"));
        assert!(msg.contains("buy_and_hold, ma_crossover"));
        assert!(msg.contains("out/comparison.json"));
    }
}
