pub mod candle;
pub mod config;
pub mod error;
pub mod seed;
pub mod signal;
pub mod timeframe;
pub mod window;

pub use candle::{Candle, CandleStore, HistoryWindow};
pub use config::{
    EngineSettings, HarnessConfig, HarnessMode, MetricsConfig, RunConfig, StrategyConfig,
    Tolerance, ValidatorConfig, WalkForwardConfig,
};
pub use error::{ConfigError, CsvError, ExecutionError};
pub use seed::mix_seed;
pub use signal::{ExitReason, PositionSide, Side};
pub use timeframe::Timeframe;
pub use window::{compute_folds, FoldWindow};
