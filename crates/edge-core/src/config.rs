use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::timeframe::Timeframe;

/// Top-level run config: every section the engine and its runners consume.
///
/// The core never reads files itself; this loader is a convenience for
/// drivers such as the CLI.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunConfig {
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub engine: EngineSettings,
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
    #[serde(default)]
    pub walk_forward: WalkForwardConfig,
    #[serde(default)]
    pub harness: HarnessConfig,
}

impl RunConfig {
    pub fn from_toml(path: &Path) -> Result<Self, ConfigError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and merge multiple TOML files (later files override earlier).
    pub fn from_toml_files(paths: &[&Path]) -> Result<Self, ConfigError> {
        let (first, rest) = paths
            .split_first()
            .ok_or_else(|| ConfigError::Parse("no config files provided".into()))?;

        let mut base = read_toml_value(first)?;
        for path in rest {
            merge_toml(&mut base, read_toml_value(path)?);
        }

        let merged = toml::to_string(&base).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_toml_str(&merged)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.strategy.validate()?;
        self.engine.validate()?;
        self.metrics.validate()?;
        self.validator.validate()?;
        self.walk_forward.validate()?;
        self.harness.validate()
    }
}

fn read_toml_value(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
    toml::from_str(&content).map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))
}

fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    if let (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) = (base, overlay) {
        for (key, value) in overlay_table {
            if let Some(base_value) = base_table.get_mut(&key) {
                if base_value.is_table() && value.is_table() {
                    merge_toml(base_value, value);
                    continue;
                }
            }
            base_table.insert(key, value);
        }
    }
}

/// Risk and cost parameters for one strategy run.
///
/// All percentages are fractions (`0.05` = 5%) and positive magnitudes; the
/// engine applies them in the adverse direction for the position side.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StrategyConfig {
    pub strategy_id: String,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    #[serde(default)]
    pub trailing_stop_pct: Option<f64>,
    /// Minimum `EntrySignal::score` required to act on an entry.
    #[serde(default)]
    pub min_score: f64,
    /// Minimum `close * volume` on the signal bar.
    #[serde(default)]
    pub min_liquidity_usd: f64,
    #[serde(default)]
    pub slippage_pct: f64,
    #[serde(default)]
    pub fee_pct: f64,
    #[serde(default)]
    pub max_hold_bars: Option<usize>,
}

impl StrategyConfig {
    /// Config with the given stops and no costs, trailing stop or hold limit.
    pub fn new(strategy_id: impl Into<String>, stop_loss_pct: f64, take_profit_pct: f64) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            stop_loss_pct,
            take_profit_pct,
            trailing_stop_pct: None,
            min_score: 0.0,
            min_liquidity_usd: 0.0,
            slippage_pct: 0.0,
            fee_pct: 0.0,
            max_hold_bars: None,
        }
    }

    pub fn with_costs(mut self, slippage_pct: f64, fee_pct: f64) -> Self {
        self.slippage_pct = slippage_pct;
        self.fee_pct = fee_pct;
        self
    }

    pub fn with_trailing_stop(mut self, pct: f64) -> Self {
        self.trailing_stop_pct = Some(pct);
        self
    }

    pub fn with_max_hold(mut self, bars: usize) -> Self {
        self.max_hold_bars = Some(bars);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strategy_id.trim().is_empty() {
            return Err(ConfigError::invalid("strategy_id", "must not be empty"));
        }
        positive("stop_loss_pct", self.stop_loss_pct)?;
        positive("take_profit_pct", self.take_profit_pct)?;
        if let Some(trail) = self.trailing_stop_pct {
            positive("trailing_stop_pct", trail)?;
            if trail >= 1.0 {
                return Err(ConfigError::invalid("trailing_stop_pct", "must be < 1"));
            }
        }
        non_negative("slippage_pct", self.slippage_pct)?;
        non_negative("fee_pct", self.fee_pct)?;
        if self.slippage_pct + self.fee_pct >= 1.0 {
            return Err(ConfigError::invalid(
                "fee_pct",
                "slippage_pct + fee_pct must be < 1",
            ));
        }
        finite("min_score", self.min_score)?;
        non_negative("min_liquidity_usd", self.min_liquidity_usd)?;
        if self.max_hold_bars == Some(0) {
            return Err(ConfigError::invalid("max_hold_bars", "must be >= 1 when set"));
        }
        Ok(())
    }
}

/// Account-level settings of a `BacktestEngine`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineSettings {
    #[serde(default = "default_10000")]
    pub initial_capital: f64,
    /// Fraction of cash committed on each entry.
    #[serde(default = "default_1_00")]
    pub position_size_pct: f64,
    #[serde(default)]
    pub allow_short: bool,
    /// Liquidate an open position at the last bar's close.
    #[serde(default = "default_true")]
    pub close_at_end: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            position_size_pct: 1.0,
            allow_short: false,
            close_at_end: true,
        }
    }
}

impl EngineSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("initial_capital", self.initial_capital)?;
        positive("position_size_pct", self.position_size_pct)?;
        if self.position_size_pct > 1.0 {
            return Err(ConfigError::invalid("position_size_pct", "must be <= 1"));
        }
        Ok(())
    }
}

/// Annualization input for Sharpe, Sortino, volatility and CAGR.
///
/// No `Default`: the value depends on the candle timeframe and is
/// supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct MetricsConfig {
    pub periods_per_year: f64,
}

impl MetricsConfig {
    pub fn new(periods_per_year: f64) -> Self {
        Self { periods_per_year }
    }

    pub fn for_timeframe(timeframe: Timeframe) -> Self {
        Self::new(timeframe.periods_per_year())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        positive("periods_per_year", self.periods_per_year)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ValidatorConfig {
    /// Sign-flip trials per validation.
    #[serde(default = "default_1000")]
    pub runs: usize,
    /// Below this many returns the p-value is `None`.
    #[serde(default = "default_30")]
    pub min_sample: usize,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_0_05")]
    pub significance_level: f64,
    #[serde(default = "default_1000")]
    pub n_bootstrap: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            runs: 1000,
            min_sample: 30,
            seed: None,
            significance_level: 0.05,
            n_bootstrap: 1000,
        }
    }
}

impl ValidatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.runs == 0 {
            return Err(ConfigError::invalid("runs", "must be >= 1"));
        }
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            return Err(ConfigError::invalid(
                "significance_level",
                "must be in (0, 1)",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WalkForwardConfig {
    #[serde(default = "default_500")]
    pub train_bars: usize,
    #[serde(default = "default_100")]
    pub trade_bars: usize,
    /// Bars between fold starts; defaults to `trade_bars`.
    #[serde(default)]
    pub step_bars: Option<usize>,
    /// Expanding train window anchored at bar 0.
    #[serde(default)]
    pub anchored: bool,
    #[serde(default = "default_10000")]
    pub initial_capital: f64,
    /// Per-fold annualized Sharpe a fold must exceed to count as passing.
    #[serde(default = "default_0_50")]
    pub sharpe_threshold: f64,
    /// Fraction of completed folds that must pass for promotion.
    #[serde(default = "default_0_60")]
    pub min_pass_fraction: f64,
}

impl Default for WalkForwardConfig {
    fn default() -> Self {
        Self {
            train_bars: 500,
            trade_bars: 100,
            step_bars: None,
            anchored: false,
            initial_capital: 10_000.0,
            sharpe_threshold: 0.5,
            min_pass_fraction: 0.6,
        }
    }
}

impl WalkForwardConfig {
    pub fn step(&self) -> usize {
        self.step_bars.unwrap_or(self.trade_bars)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.train_bars == 0 {
            return Err(ConfigError::invalid("train_bars", "must be >= 1"));
        }
        if self.trade_bars == 0 {
            return Err(ConfigError::invalid("trade_bars", "must be >= 1"));
        }
        // Overlapping trade windows would put two equity points on one bar.
        if self.step() < self.trade_bars {
            return Err(ConfigError::invalid(
                "step_bars",
                format!("must be >= trade_bars ({})", self.trade_bars),
            ));
        }
        positive("initial_capital", self.initial_capital)?;
        finite("sharpe_threshold", self.sharpe_threshold)?;
        if !(0.0..=1.0).contains(&self.min_pass_fraction) {
            return Err(ConfigError::invalid("min_pass_fraction", "must be in [0, 1]"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HarnessMode {
    /// Divergences are reported but the run succeeds.
    #[default]
    Warning,
    /// Any divergence fails the run.
    Strict,
}

/// Absolute tolerances used when comparing against a reference engine.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Tolerance {
    #[serde(default = "default_0_50")]
    pub total_return_pct: f64,
    #[serde(default = "default_0_50")]
    pub max_drawdown_pct: f64,
    #[serde(default = "default_0_10")]
    pub sharpe_ratio: f64,
    #[serde(default = "default_0_02")]
    pub win_rate: f64,
    #[serde(default)]
    pub total_trades: usize,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            total_return_pct: 0.5,
            max_drawdown_pct: 0.5,
            sharpe_ratio: 0.1,
            win_rate: 0.02,
            total_trades: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub mode: HarnessMode,
    #[serde(default = "default_artifact_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub tolerance: Tolerance,
    /// Length of each synthetic scenario series.
    #[serde(default = "default_500")]
    pub bars: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            mode: HarnessMode::Warning,
            output_dir: default_artifact_dir(),
            tolerance: Tolerance::default(),
            bars: 500,
            seed: 7,
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bars < 2 {
            return Err(ConfigError::invalid("bars", "must be >= 2"));
        }
        let t = &self.tolerance;
        non_negative("tolerance.total_return_pct", t.total_return_pct)?;
        non_negative("tolerance.max_drawdown_pct", t.max_drawdown_pct)?;
        non_negative("tolerance.sharpe_ratio", t.sharpe_ratio)?;
        non_negative("tolerance.win_rate", t.win_rate)
    }
}

fn finite(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be finite, got {}", value)))
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be > 0, got {}", value)))
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    finite(field, value)?;
    if value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be >= 0, got {}", value)))
    }
}

// Default value helpers
fn default_true() -> bool { true }
fn default_30() -> usize { 30 }
fn default_100() -> usize { 100 }
fn default_500() -> usize { 500 }
fn default_1000() -> usize { 1000 }
fn default_seed() -> u64 { 7 }
fn default_0_02() -> f64 { 0.02 }
fn default_0_05() -> f64 { 0.05 }
fn default_0_10() -> f64 { 0.10 }
fn default_0_50() -> f64 { 0.50 }
fn default_0_60() -> f64 { 0.60 }
fn default_1_00() -> f64 { 1.00 }
fn default_10000() -> f64 { 10000.0 }
fn default_artifact_dir() -> PathBuf { PathBuf::from("artifacts/comparison") }
