use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use edge_core::{
    CandleStore, EngineSettings, HarnessConfig, HarnessMode, MetricsConfig, StrategyConfig,
    Tolerance,
};
use edge_strategy::{BuyAndHold, EntrySignal, MaCrossover, TrendBreakout};

use crate::cancel::CancelToken;
use crate::engine::BacktestEngine;
use crate::error::{ComparisonDivergenceError, HarnessError, ReferenceError};
use crate::metrics::Metrics;

pub const SCHEMA_VERSION: u32 = 1;
pub const ARTIFACT_FILE: &str = "comparison.json";

const SYNTHETIC_START_TS: i64 = 1_704_067_200; // 2024-01-01T00:00:00Z
const SYNTHETIC_STEP_SECS: i64 = 3_600;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    /// Both engines ran and every metric is within tolerance.
    Completed,
    /// Reference engine unavailable.
    Skipped,
    /// Divergence beyond tolerance, or either engine failed.
    Fail,
}

/// The metrics both engines must agree on.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScenarioMetrics {
    pub total_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub win_rate: f64,
    pub total_trades: usize,
}

impl From<&Metrics> for ScenarioMetrics {
    fn from(m: &Metrics) -> Self {
        Self {
            total_return_pct: m.total_return_pct,
            max_drawdown_pct: m.max_drawdown_pct,
            sharpe_ratio: m.sharpe_ratio,
            win_rate: m.win_rate,
            total_trades: m.total_trades,
        }
    }
}

/// A named strategy + config pair replayed on the synthetic series.
pub struct Scenario {
    pub name: String,
    pub config: StrategyConfig,
    pub signal: Box<dyn EntrySignal>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, config: StrategyConfig, signal: Box<dyn EntrySignal>) -> Self {
        Self {
            name: name.into(),
            config,
            signal,
        }
    }

    /// buy_and_hold, ma_crossover and fixed_stop_target_trend.
    pub fn standard() -> Vec<Scenario> {
        vec![
            Scenario::new(
                "buy_and_hold",
                StrategyConfig::new("buy_and_hold", 0.5, 5.0),
                Box::new(BuyAndHold),
            ),
            Scenario::new(
                "ma_crossover",
                StrategyConfig::new("ma_crossover", 0.05, 0.10),
                Box::new(MaCrossover::new(10, 30)),
            ),
            Scenario::new(
                "fixed_stop_target_trend",
                StrategyConfig::new("trend_breakout", 0.02, 0.04),
                Box::new(TrendBreakout::new(20)),
            ),
        ]
    }
}

/// What a reference engine receives for one scenario.
pub struct ScenarioInput<'a> {
    pub name: &'a str,
    pub candles: &'a CandleStore,
    pub config: &'a StrategyConfig,
    pub signal: &'a dyn EntrySignal,
    pub settings: &'a EngineSettings,
    pub metrics: &'a MetricsConfig,
}

/// Another backtesting framework bound to the same contract.
pub trait ReferenceEngine: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    fn run(&self, input: &ScenarioInput<'_>) -> Result<ScenarioMetrics, ReferenceError>;
}

/// Stand-in for a reference framework that is not installed.
#[derive(Debug, Clone)]
pub struct UnavailableReference {
    name: String,
}

impl UnavailableReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl ReferenceEngine for UnavailableReference {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        false
    }

    fn run(&self, input: &ScenarioInput<'_>) -> Result<ScenarioMetrics, ReferenceError> {
        Err(ReferenceError {
            engine: self.name.clone(),
            scenario: input.name.to_string(),
            reason: "reference engine is not available".into(),
        })
    }
}

/// Reference metrics captured from an external run, keyed by scenario.
///
/// JSON shape: `{ "<scenario>": { "total_return_pct": .., ... }, ... }`.
#[derive(Debug, Clone, Default)]
pub struct RecordedReference {
    name: String,
    scenarios: BTreeMap<String, ScenarioMetrics>,
}

impl RecordedReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scenarios: BTreeMap::new(),
        }
    }

    pub fn with_scenario(mut self, scenario: impl Into<String>, metrics: ScenarioMetrics) -> Self {
        self.scenarios.insert(scenario.into(), metrics);
        self
    }

    pub fn from_json_str(name: impl Into<String>, json: &str) -> Result<Self, HarnessError> {
        Ok(Self {
            name: name.into(),
            scenarios: serde_json::from_str(json)?,
        })
    }

    pub fn from_json_file(name: impl Into<String>, path: &Path) -> Result<Self, HarnessError> {
        let json = fs::read_to_string(path).map_err(|source| HarnessError::Artifact {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(name, &json)
    }
}

impl ReferenceEngine for RecordedReference {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        true
    }

    fn run(&self, input: &ScenarioInput<'_>) -> Result<ScenarioMetrics, ReferenceError> {
        self.scenarios
            .get(input.name)
            .copied()
            .ok_or_else(|| ReferenceError {
                engine: self.name.clone(),
                scenario: input.name.to_string(),
                reason: "no recorded metrics for scenario".into(),
            })
    }
}

/// A second binding of this engine, for implementation-vs-implementation
/// checks.
#[derive(Debug, Clone)]
pub struct EngineReference {
    name: String,
}

impl EngineReference {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for EngineReference {
    fn default() -> Self {
        Self::new("edge-engine")
    }
}

impl ReferenceEngine for EngineReference {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        true
    }

    fn run(&self, input: &ScenarioInput<'_>) -> Result<ScenarioMetrics, ReferenceError> {
        BacktestEngine::new(input.settings.clone(), *input.metrics)
            .run(input.candles, input.config, input.signal)
            .map(|r| ScenarioMetrics::from(&r.metrics))
            .map_err(|e| ReferenceError {
                engine: self.name.clone(),
                scenario: input.name.to_string(),
                reason: e.to_string(),
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDiff {
    pub metric: String,
    pub internal: f64,
    pub reference: f64,
    pub abs_diff: f64,
    pub tolerance: f64,
    pub within_tolerance: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub status: ScenarioStatus,
    pub internal: Option<ScenarioMetrics>,
    pub reference: Option<ScenarioMetrics>,
    pub diffs: Vec<MetricDiff>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceInfo {
    pub name: String,
    pub available: bool,
}

/// Contents of `comparison.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub schema_version: u32,
    pub generated_at: String,
    pub mode: HarnessMode,
    pub reference: ReferenceInfo,
    pub bars: usize,
    pub seed: u64,
    pub tolerance: Tolerance,
    pub cancelled: bool,
    pub scenarios: Vec<ScenarioOutcome>,
}

impl ComparisonReport {
    pub fn failed(&self) -> Vec<String> {
        self.scenarios
            .iter()
            .filter(|s| s.status == ScenarioStatus::Fail)
            .map(|s| s.name.clone())
            .collect()
    }

    pub fn count(&self, status: ScenarioStatus) -> usize {
        self.scenarios.iter().filter(|s| s.status == status).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonRun {
    pub report: ComparisonReport,
    pub artifact: PathBuf,
}

/// Replays fixed scenarios through this engine and a reference engine and
/// writes a timestamped `comparison.json`.
///
/// In `Warning` mode divergences are logged and the run succeeds. In
/// `Strict` mode any failed scenario turns into
/// `HarnessError::Divergence`, after the artifact has been written.
pub struct ComparisonHarness {
    config: HarnessConfig,
    settings: EngineSettings,
    metrics: MetricsConfig,
}

impl ComparisonHarness {
    pub fn new(config: HarnessConfig, settings: EngineSettings, metrics: MetricsConfig) -> Self {
        Self {
            config,
            settings,
            metrics,
        }
    }

    pub fn run(&self, reference: &dyn ReferenceEngine, cancel: &CancelToken) -> Result<ComparisonRun, HarnessError> {
        self.run_scenarios(&Scenario::standard(), reference, cancel, Utc::now())
    }

    pub fn run_scenarios(
        &self,
        scenarios: &[Scenario],
        reference: &dyn ReferenceEngine,
        cancel: &CancelToken,
        now: DateTime<Utc>,
    ) -> Result<ComparisonRun, HarnessError> {
        self.config.validate()?;
        self.metrics.validate()?;

        let candles = synthetic_candles(self.config.bars, self.config.seed);
        let available = reference.is_available();
        if !available {
            warn!(reference = reference.name(), "reference engine unavailable, scenarios skipped");
        }

        let mut outcomes = Vec::with_capacity(scenarios.len());
        let mut cancelled = false;
        for scenario in scenarios {
            if cancel.is_cancelled() {
                warn!(scenario = %scenario.name, "comparison cancelled");
                cancelled = true;
                break;
            }
            outcomes.push(self.compare(scenario, &candles, reference, available));
        }

        let report = ComparisonReport {
            schema_version: SCHEMA_VERSION,
            generated_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            mode: self.config.mode,
            reference: ReferenceInfo {
                name: reference.name().to_string(),
                available,
            },
            bars: self.config.bars,
            seed: self.config.seed,
            tolerance: self.config.tolerance,
            cancelled,
            scenarios: outcomes,
        };

        let artifact = write_artifact(&self.config.output_dir, &report, now)?;
        info!(
            artifact = %artifact.display(),
            completed = report.count(ScenarioStatus::Completed),
            skipped = report.count(ScenarioStatus::Skipped),
            failed = report.count(ScenarioStatus::Fail),
            "comparison written"
        );

        let failed = report.failed();
        if !failed.is_empty() {
            match self.config.mode {
                HarnessMode::Strict => {
                    return Err(ComparisonDivergenceError { failed, artifact }.into());
                }
                HarnessMode::Warning => {
                    for outcome in report.scenarios.iter().filter(|s| s.status == ScenarioStatus::Fail) {
                        warn!(
                            scenario = %outcome.name,
                            error = outcome.error.as_deref().unwrap_or("metrics diverged"),
                            "scenario diverged from reference"
                        );
                    }
                }
            }
        }

        Ok(ComparisonRun { report, artifact })
    }

    fn compare(
        &self,
        scenario: &Scenario,
        candles: &CandleStore,
        reference: &dyn ReferenceEngine,
        available: bool,
    ) -> ScenarioOutcome {
        let mut outcome = ScenarioOutcome {
            name: scenario.name.clone(),
            status: ScenarioStatus::Fail,
            internal: None,
            reference: None,
            diffs: Vec::new(),
            error: None,
        };

        let engine = BacktestEngine::new(self.settings.clone(), self.metrics);
        let internal = match engine.run(candles, &scenario.config, scenario.signal.as_ref()) {
            Ok(result) => ScenarioMetrics::from(&result.metrics),
            Err(e) => {
                outcome.error = Some(format!("internal engine: {}", e));
                return outcome;
            }
        };
        outcome.internal = Some(internal);

        if !available {
            outcome.status = ScenarioStatus::Skipped;
            return outcome;
        }

        let input = ScenarioInput {
            name: &scenario.name,
            candles,
            config: &scenario.config,
            signal: scenario.signal.as_ref(),
            settings: &self.settings,
            metrics: &self.metrics,
        };
        let external = match reference.run(&input) {
            Ok(m) => m,
            Err(e) => {
                outcome.error = Some(e.to_string());
                return outcome;
            }
        };
        outcome.reference = Some(external);
        outcome.diffs = diff_metrics(&internal, &external, &self.config.tolerance);
        outcome.status = if outcome.diffs.iter().all(|d| d.within_tolerance) {
            ScenarioStatus::Completed
        } else {
            ScenarioStatus::Fail
        };
        outcome
    }
}

fn diff_metrics(internal: &ScenarioMetrics, reference: &ScenarioMetrics, tol: &Tolerance) -> Vec<MetricDiff> {
    let rows = [
        ("total_return_pct", internal.total_return_pct, reference.total_return_pct, tol.total_return_pct),
        ("max_drawdown_pct", internal.max_drawdown_pct, reference.max_drawdown_pct, tol.max_drawdown_pct),
        ("sharpe_ratio", internal.sharpe_ratio, reference.sharpe_ratio, tol.sharpe_ratio),
        ("win_rate", internal.win_rate, reference.win_rate, tol.win_rate),
        (
            "total_trades",
            internal.total_trades as f64,
            reference.total_trades as f64,
            tol.total_trades as f64,
        ),
    ];
    rows.into_iter()
        .map(|(metric, a, b, tolerance)| {
            let abs_diff = (a - b).abs();
            MetricDiff {
                metric: metric.to_string(),
                internal: a,
                reference: b,
                abs_diff,
                tolerance,
                within_tolerance: abs_diff <= tolerance,
            }
        })
        .collect()
}

/// Write `report` to `<output_dir>/<UTC timestamp>/comparison.json`.
pub fn write_artifact(output_dir: &Path, report: &ComparisonReport, now: DateTime<Utc>) -> Result<PathBuf, HarnessError> {
    let dir = output_dir.join(now.format("%Y%m%dT%H%M%S%.3fZ").to_string());
    fs::create_dir_all(&dir).map_err(|source| HarnessError::Artifact {
        path: dir.clone(),
        source,
    })?;
    let path = dir.join(ARTIFACT_FILE);
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, json).map_err(|source| HarnessError::Artifact {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Deterministic hourly random walk with a slight upward drift.
pub fn synthetic_candles(bars: usize, seed: u64) -> CandleStore {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut store = CandleStore::with_capacity("SYNTH", bars);
    let mut close = 100.0f64;
    for i in 0..bars {
        let open = close;
        let shock: f64 = rng.gen_range(-0.01..0.01);
        close = (open * (1.0003 + shock)).max(0.01);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.004));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.004));
        let volume = rng.gen_range(500.0..5_000.0);
        store.push(
            SYNTHETIC_START_TS + i as i64 * SYNTHETIC_STEP_SECS,
            open,
            high,
            low,
            close,
            volume,
        );
    }
    store
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_candles_deterministic_and_valid() {
        let a = synthetic_candles(300, 7);
        let b = synthetic_candles(300, 7);
        assert_eq!(a, b);
        assert_ne!(a, synthetic_candles(300, 8));
        assert!(a.check_all().is_ok());
        for i in 0..a.len() {
            assert!(a.high[i] >= a.open[i].max(a.close[i]));
            assert!(a.low[i] <= a.open[i].min(a.close[i]));
        }
    }

    #[test]
    fn test_diff_metrics_tolerance() {
        let internal = ScenarioMetrics {
            total_return_pct: 10.0,
            max_drawdown_pct: 5.0,
            sharpe_ratio: 1.2,
            win_rate: 0.5,
            total_trades: 4,
        };
        let reference = ScenarioMetrics {
            total_return_pct: 10.4,
            sharpe_ratio: 1.5,
            ..internal
        };
        let diffs = diff_metrics(&internal, &reference, &Tolerance::default());
        assert_eq!(diffs.len(), 5);
        assert!(diffs[0].within_tolerance);
        assert!(!diffs[2].within_tolerance);
        assert!(diffs[4].within_tolerance);
    }

    #[test]
    fn test_recorded_reference_from_json() {
        let json = r#"{"buy_and_hold": {"total_return_pct": 1.0, "max_drawdown_pct": 2.0,
            "sharpe_ratio": 0.3, "win_rate": 1.0, "total_trades": 1}}"#;
        let reference = RecordedReference::from_json_str("recorded", json).unwrap();
        assert!(reference.is_available());
        assert_eq!(reference.scenarios["buy_and_hold"].total_trades, 1);
        assert!(matches!(
            RecordedReference::from_json_str("recorded", "{not json"),
            Err(HarnessError::Serialize(_))
        ));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ScenarioStatus::Skipped).unwrap(), "\"skipped\"");
        assert_eq!(serde_json::to_string(&ScenarioStatus::Fail).unwrap(), "\"fail\"");
    }
}
