pub mod cancel;
pub mod engine;
pub mod error;
pub mod fill_sim;
pub mod harness;
pub mod metrics;
pub mod optimizer;
pub mod parallel;
pub mod position;
pub mod validator;
pub mod walk_forward;

pub use cancel::CancelToken;
pub use engine::{BacktestEngine, BacktestResult, EquityPoint, Trade};
pub use error::{
    BacktestError, ComparisonDivergenceError, HarnessError, OptimizerError, ReferenceError,
    ValidationError, WalkForwardError,
};
pub use fill_sim::{FillSimulator, OrderSide, SimulatedFill};
pub use harness::{
    ComparisonHarness, ComparisonReport, ComparisonRun, EngineReference, RecordedReference,
    ReferenceEngine, Scenario, ScenarioMetrics, ScenarioStatus, UnavailableReference,
};
pub use metrics::{LiveComparison, Metrics, MetricsCalculator, RATIO_CAP};
pub use optimizer::{FixedParams, GridSearchOptimizer, OptimizationContext, Optimizer};
pub use parallel::{BacktestJob, FullResult, ParallelRunner};
pub use position::{Account, Position};
pub use validator::{ResultValidation, StatisticalValidator, ValidationResult};
pub use walk_forward::{FoldFailure, WalkForwardFold, WalkForwardReport, WalkForwardRunner};
