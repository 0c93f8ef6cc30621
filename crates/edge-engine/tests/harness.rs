use std::fs;

use chrono::{TimeZone, Utc};
use edge_core::{EngineSettings, HarnessConfig, HarnessMode, MetricsConfig};
use edge_engine::{
    CancelToken, ComparisonHarness, ComparisonReport, EngineReference, HarnessError,
    RecordedReference, Scenario, ScenarioMetrics, ScenarioStatus, UnavailableReference,
};

fn harness(mode: HarnessMode, dir: &std::path::Path) -> ComparisonHarness {
    ComparisonHarness::new(
        HarnessConfig {
            mode,
            output_dir: dir.to_path_buf(),
            bars: 400,
            ..HarnessConfig::default()
        },
        EngineSettings::default(),
        MetricsConfig::new(8760.0),
    )
}

fn far_off() -> ScenarioMetrics {
    ScenarioMetrics {
        total_return_pct: 500.0,
        max_drawdown_pct: 90.0,
        sharpe_ratio: 9.0,
        win_rate: 0.0,
        total_trades: 1000,
    }
}

#[test]
fn unavailable_reference_skips_every_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let run = harness(HarnessMode::Strict, dir.path())
        .run_scenarios(
            &Scenario::standard(),
            &UnavailableReference::new("vendor"),
            &CancelToken::new(),
            now,
        )
        .unwrap();

    assert_eq!(run.report.count(ScenarioStatus::Skipped), 3);
    assert!(run.report.scenarios.iter().all(|s| s.internal.is_some()));
    assert!(!run.report.reference.available);
    assert_eq!(
        run.artifact,
        dir.path().join("20240301T120000.000Z").join("comparison.json")
    );

    let written: ComparisonReport =
        serde_json::from_str(&fs::read_to_string(&run.artifact).unwrap()).unwrap();
    assert_eq!(written, run.report);
    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&run.artifact).unwrap()).unwrap();
    assert_eq!(raw["scenarios"][0]["status"], "skipped");
}

#[test]
fn engine_against_itself_completes() {
    let dir = tempfile::tempdir().unwrap();
    let run = harness(HarnessMode::Strict, dir.path())
        .run(&EngineReference::default(), &CancelToken::new())
        .unwrap();

    assert_eq!(run.report.count(ScenarioStatus::Completed), 3);
    let names: Vec<&str> = run.report.scenarios.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["buy_and_hold", "ma_crossover", "fixed_stop_target_trend"]);
    for outcome in &run.report.scenarios {
        assert!(outcome.diffs.iter().all(|d| d.abs_diff == 0.0));
    }
    assert!(run.artifact.exists());
}

#[test]
fn strict_mode_divergence_is_an_error_after_writing() {
    let dir = tempfile::tempdir().unwrap();
    let reference = RecordedReference::new("recorded").with_scenario("buy_and_hold", far_off());
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let err = harness(HarnessMode::Strict, dir.path())
        .run_scenarios(&Scenario::standard(), &reference, &CancelToken::new(), now)
        .unwrap_err();

    match err {
        HarnessError::Divergence(divergence) => {
            assert_eq!(divergence.failed.len(), 3);
            assert!(divergence.artifact.exists());
        }
        other => panic!("expected divergence, got {other:?}"),
    }
}

#[test]
fn warning_mode_divergence_still_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let reference = RecordedReference::new("recorded").with_scenario("buy_and_hold", far_off());
    let run = harness(HarnessMode::Warning, dir.path())
        .run(&reference, &CancelToken::new())
        .unwrap();

    let hold = &run.report.scenarios[0];
    assert_eq!(hold.status, ScenarioStatus::Fail);
    assert!(hold.diffs.iter().any(|d| !d.within_tolerance));
    assert!(run.report.scenarios[1].error.is_some());
    assert_eq!(run.report.failed().len(), 3);
}

#[test]
fn cancelled_run_records_nothing_but_the_flag() {
    let dir = tempfile::tempdir().unwrap();
    let token = CancelToken::new();
    token.cancel();
    let run = harness(HarnessMode::Strict, dir.path())
        .run(&EngineReference::default(), &token)
        .unwrap();
    assert!(run.report.cancelled);
    assert!(run.report.scenarios.is_empty());
    assert!(run.artifact.exists());
}
