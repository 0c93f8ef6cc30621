mod export;

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use edge_core::{CandleStore, HarnessMode, MetricsConfig, RunConfig, Timeframe};
use edge_engine::{
    BacktestEngine, BacktestJob, CancelToken, ComparisonHarness, EngineReference, FixedParams,
    FullResult, GridSearchOptimizer, Optimizer, ParallelRunner, RecordedReference,
    ReferenceEngine, StatisticalValidator, UnavailableReference, ValidationResult,
    WalkForwardReport, WalkForwardRunner,
};
use edge_strategy::StrategyRegistry;

#[derive(Parser, Debug)]
#[command(name = "edge-backtest", about = "Bar-by-bar backtesting and statistical validation")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Backtest one or more strategies over a candle file
    Backtest(BacktestArgs),
    /// Sign-flip permutation test on a return series
    Validate(ValidateArgs),
    /// Walk-forward re-optimization with compounding capital
    WalkForward(WalkForwardArgs),
    /// Replay the standard scenarios against a reference engine
    Compare(CompareArgs),
}

#[derive(Args, Debug)]
struct ConfigArgs {
    /// Path to TOML config file(s), comma-separated for merge
    #[arg(long, default_value = "config/default.toml")]
    config: String,

    /// Candle timeframe; overrides metrics.periods_per_year
    #[arg(long)]
    timeframe: Option<Timeframe>,

    /// Output file path (stdout if not specified)
    #[arg(long)]
    output_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct BacktestArgs {
    #[command(flatten)]
    common: ConfigArgs,

    /// Path to CSV candle data file
    #[arg(long)]
    candles: PathBuf,

    /// Symbol label; defaults to the file stem
    #[arg(long)]
    symbol: Option<String>,

    /// Strategies to run (comma-separated); defaults to strategy.strategy_id
    #[arg(long)]
    strategies: Option<String>,

    /// Initial capital
    #[arg(long)]
    initial_capital: Option<f64>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for `<strategy>_trades.csv` and `<strategy>_equity.csv`
    #[arg(long)]
    export_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    #[command(flatten)]
    common: ConfigArgs,

    /// One return per line, no header
    #[arg(long)]
    returns: PathBuf,

    /// Number of sign-flip trials
    #[arg(long)]
    runs: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OptimizerKind {
    Fixed,
    Grid,
}

#[derive(Args, Debug)]
struct WalkForwardArgs {
    #[command(flatten)]
    common: ConfigArgs,

    #[arg(long)]
    candles: PathBuf,

    #[arg(long)]
    symbol: Option<String>,

    #[arg(long, value_enum, default_value = "fixed")]
    optimizer: OptimizerKind,

    /// Stop after this many seconds, keeping completed folds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Write the stitched equity curve and trades here
    #[arg(long)]
    export_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CompareArgs {
    #[command(flatten)]
    common: ConfigArgs,

    /// Recorded reference metrics (JSON keyed by scenario name)
    #[arg(long, conflicts_with = "self_check")]
    reference: Option<PathBuf>,

    /// Compare the engine against a second instance of itself
    #[arg(long)]
    self_check: bool,

    /// Fail on any divergence, regardless of harness.mode
    #[arg(long)]
    strict: bool,

    /// Overrides harness.output_dir
    #[arg(long)]
    output_dir: Option<PathBuf>,

    #[arg(long)]
    timeout_secs: Option<u64>,
}

/// JSON output of the `backtest` subcommand.
#[derive(Debug, Serialize)]
struct OutputReport {
    meta: OutputMeta,
    results: Vec<StrategyReport>,
    errors: Vec<JobError>,
}

#[derive(Debug, Serialize)]
struct OutputMeta {
    candle_file: String,
    symbol: String,
    total_candles: usize,
    strategies_run: Vec<String>,
    periods_per_year: f64,
    elapsed_ms: u128,
}

#[derive(Debug, Serialize)]
struct JobError {
    strategy_id: String,
    error: String,
}

#[derive(Debug, Serialize)]
struct StrategyReport {
    strategy_id: String,
    initial_capital: f64,
    final_capital: f64,
    backtest: BacktestSummary,
    validation: ValidationSummary,
}

#[derive(Debug, Serialize)]
struct BacktestSummary {
    total_trades: usize,
    total_pnl: f64,
    total_return_pct: f64,
    cagr_pct: f64,
    sharpe_ratio: f64,
    sortino_ratio: f64,
    max_drawdown_pct: f64,
    calmar_ratio: f64,
    win_rate: f64,
    profit_factor: f64,
    expectancy: f64,
    avg_win_loss_ratio: f64,
    total_fees: f64,
}

#[derive(Debug, Serialize)]
struct ValidationSummary {
    sharpe_ci_95_lower: f64,
    sharpe_ci_95_upper: f64,
    p_value: Option<f64>,
    runs: usize,
    seed: u64,
    is_significant: bool,
    overfitting_warning: Option<String>,
}

/// JSON output of the `walk-forward` subcommand.
#[derive(Debug, Serialize)]
struct WalkForwardOutput<'a> {
    strategy_id: &'a str,
    optimizer: &'a str,
    initial_capital: f64,
    final_capital: f64,
    folds: Vec<FoldSummary>,
    failures: &'a [edge_engine::FoldFailure],
    fold_sharpes: &'a [f64],
    pass_fraction: f64,
    promoted: bool,
    overfitting_warnings: &'a [String],
    cancelled: bool,
    metrics: &'a edge_engine::Metrics,
}

#[derive(Debug, Serialize)]
struct FoldSummary {
    index: usize,
    train: (usize, usize),
    trade: (usize, usize),
    stop_loss_pct: f64,
    take_profit_pct: f64,
    starting_capital: f64,
    ending_capital: f64,
    in_sample_sharpe: Option<f64>,
    out_of_sample_sharpe: f64,
    trades: usize,
    passed: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Backtest(args) => run_backtest(args),
        Command::Validate(args) => run_validate(args),
        Command::WalkForward(args) => run_walk_forward(args),
        Command::Compare(args) => run_compare(args),
    }
}

fn load_config(args: &ConfigArgs) -> Result<RunConfig> {
    let paths: Vec<PathBuf> = args.config.split(',').map(|p| PathBuf::from(p.trim())).collect();
    let refs: Vec<&Path> = paths.iter().map(|p| p.as_path()).collect();
    let mut config = RunConfig::from_toml_files(&refs)
        .with_context(|| format!("failed to load config from {}", args.config))?;
    if let Some(timeframe) = args.timeframe {
        config.metrics = MetricsConfig::for_timeframe(timeframe);
    }
    Ok(config)
}

fn load_candles(path: &Path, symbol: Option<&str>) -> Result<CandleStore> {
    let symbol = symbol.map(str::to_string).unwrap_or_else(|| {
        path.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "UNKNOWN".into())
    });
    let start = Instant::now();
    let candles = CandleStore::from_csv(symbol, path)
        .with_context(|| format!("failed to load candles from {}", path.display()))?;
    info!(
        file = %path.display(),
        candles = candles.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "candles loaded"
    );
    Ok(candles)
}

fn emit_json<T: Serialize>(value: &T, output_file: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("JSON serialization failed")?;
    match output_file {
        Some(path) => {
            std::fs::write(path, &json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(file = %path.display(), "results written");
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn run_backtest(args: BacktestArgs) -> Result<()> {
    let start = Instant::now();
    let mut config = load_config(&args.common)?;
    if let Some(capital) = args.initial_capital {
        config.engine.initial_capital = capital;
    }
    if let Some(seed) = args.seed {
        config.validator.seed = Some(seed);
    }
    let candles = load_candles(&args.candles, args.symbol.as_deref())?;

    let registry = StrategyRegistry::with_builtins();
    let strategy_ids: Vec<String> = match &args.strategies {
        Some(list) => list.split(',').map(|s| s.trim().to_string()).collect(),
        None => vec![config.strategy.strategy_id.clone()],
    };
    for id in &strategy_ids {
        if !registry.contains(id) {
            bail!("unknown strategy `{}` (available: {})", id, registry.ids().join(", "));
        }
    }

    let configs: Vec<_> = strategy_ids
        .iter()
        .map(|id| {
            let mut c = config.strategy.clone();
            c.strategy_id = id.clone();
            c
        })
        .collect();
    let jobs: Vec<BacktestJob<'_>> = configs
        .iter()
        .map(|c| BacktestJob {
            candles: &candles,
            config: c,
        })
        .collect();

    info!(strategies = jobs.len(), candles = candles.len(), "running backtests");
    let runner = ParallelRunner::new(
        BacktestEngine::new(config.engine.clone(), config.metrics),
        StatisticalValidator::new(config.validator.clone(), config.metrics),
        registry,
    );
    let results = runner.run_all(&jobs);

    let mut ok = Vec::new();
    let mut errors = Vec::new();
    for (id, result) in strategy_ids.iter().zip(results) {
        match result {
            Ok(full) => ok.push(full),
            Err(e) => errors.push(JobError {
                strategy_id: id.clone(),
                error: e.to_string(),
            }),
        }
    }

    if let Some(dir) = &args.export_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        for full in &ok {
            let id = &full.backtest.strategy_id;
            export::write_trades_csv(&dir.join(format!("{}_trades.csv", id)), &full.backtest.trades)?;
            export::write_equity_csv(
                &dir.join(format!("{}_equity.csv", id)),
                &full.backtest.equity_curve,
            )?;
        }
    }

    let report = build_report(&args, &candles, &config.metrics, &strategy_ids, &ok, errors, start);
    print_summary(&report);
    emit_json(&report, args.common.output_file.as_deref())?;

    if report.results.is_empty() {
        bail!("every backtest failed");
    }
    Ok(())
}

fn build_report(
    args: &BacktestArgs,
    candles: &CandleStore,
    metrics: &MetricsConfig,
    strategy_ids: &[String],
    results: &[FullResult],
    errors: Vec<JobError>,
    start: Instant,
) -> OutputReport {
    let strategy_reports: Vec<StrategyReport> = results
        .iter()
        .map(|r| {
            let m = &r.backtest.metrics;
            let v = &r.validation;
            StrategyReport {
                strategy_id: r.backtest.strategy_id.clone(),
                initial_capital: r.backtest.initial_capital,
                final_capital: r.backtest.final_capital,
                backtest: BacktestSummary {
                    total_trades: m.total_trades,
                    total_pnl: m.total_pnl,
                    total_return_pct: m.total_return_pct,
                    cagr_pct: m.cagr_pct,
                    sharpe_ratio: m.sharpe_ratio,
                    sortino_ratio: m.sortino_ratio,
                    max_drawdown_pct: m.max_drawdown_pct,
                    calmar_ratio: m.calmar_ratio,
                    win_rate: m.win_rate,
                    profit_factor: m.profit_factor,
                    expectancy: m.expectancy,
                    avg_win_loss_ratio: m.avg_win_loss_ratio,
                    total_fees: m.total_fees,
                },
                validation: ValidationSummary {
                    sharpe_ci_95_lower: v.sharpe_ci_95.0,
                    sharpe_ci_95_upper: v.sharpe_ci_95.1,
                    p_value: v.permutation.p_value,
                    runs: v.permutation.runs,
                    seed: v.permutation.seed,
                    is_significant: v.permutation.is_significant,
                    overfitting_warning: v.overfitting_warning.clone(),
                },
            }
        })
        .collect();

    OutputReport {
        meta: OutputMeta {
            candle_file: args.candles.display().to_string(),
            symbol: candles.symbol.clone(),
            total_candles: candles.len(),
            strategies_run: strategy_ids.to_vec(),
            periods_per_year: metrics.periods_per_year,
            elapsed_ms: start.elapsed().as_millis(),
        },
        results: strategy_reports,
        errors,
    }
}

fn print_summary(report: &OutputReport) {
    eprintln!("\n{}", "=".repeat(80));
    eprintln!("Backtest Results: {}", report.meta.symbol);
    eprintln!("{}", "=".repeat(80));
    eprintln!(
        "Candles: {} | Strategies: {} | Elapsed: {}ms",
        report.meta.total_candles,
        report.meta.strategies_run.len(),
        report.meta.elapsed_ms
    );
    eprintln!("{}", "-".repeat(80));
    eprintln!(
        "{:<20} {:>7} {:>8} {:>8} {:>8} {:>9} {:>10} {:>6}",
        "Strategy", "Trades", "WinRate", "Sharpe", "MaxDD", "Return", "PnL", "PF"
    );
    eprintln!("{}", "-".repeat(80));

    for r in &report.results {
        eprintln!(
            "{:<20} {:>7} {:>7.1}% {:>8.2} {:>7.2}% {:>8.2}% {:>10.2} {:>6.2}",
            r.strategy_id,
            r.backtest.total_trades,
            r.backtest.win_rate * 100.0,
            r.backtest.sharpe_ratio,
            r.backtest.max_drawdown_pct,
            r.backtest.total_return_pct,
            r.backtest.total_pnl,
            r.backtest.profit_factor,
        );
    }

    eprintln!("{}", "-".repeat(80));
    eprintln!("Validation:");
    for r in &report.results {
        eprintln!(
            "  {}: Sharpe CI [{:.2}, {:.2}], p={}, sig={}{}",
            r.strategy_id,
            r.validation.sharpe_ci_95_lower,
            r.validation.sharpe_ci_95_upper,
            r.validation
                .p_value
                .map_or_else(|| "n/a".to_string(), |p| format!("{:.4}", p)),
            r.validation.is_significant,
            r.validation
                .overfitting_warning
                .as_ref()
                .map(|w| format!(" [WARN: {}]", w))
                .unwrap_or_default(),
        );
    }
    for e in &report.errors {
        eprintln!("  {}: FAILED: {}", e.strategy_id, e.error);
    }
    eprintln!("{}", "=".repeat(80));
}

fn run_validate(args: ValidateArgs) -> Result<()> {
    let config = load_config(&args.common)?;
    let returns = export::read_returns_csv(&args.returns)?;
    let runs = args.runs.unwrap_or(config.validator.runs);
    let seed = args.seed.or(config.validator.seed);

    let validator = StatisticalValidator::new(config.validator.clone(), config.metrics);
    let result: ValidationResult = validator
        .validate(&returns, runs, seed)
        .with_context(|| format!("validation of {} failed", args.returns.display()))?;

    eprintln!(
        "n={} observed Sharpe/period={:.4} p={} runs={} seed={} significant={}",
        result.sample_size,
        result.observed_statistic,
        result
            .p_value
            .map_or_else(|| "n/a (sample too small)".to_string(), |p| format!("{:.4}", p)),
        result.runs,
        result.seed,
        result.is_significant,
    );
    emit_json(&result, args.common.output_file.as_deref())
}

fn cancel_token(timeout_secs: Option<u64>) -> CancelToken {
    match timeout_secs {
        Some(secs) => CancelToken::with_timeout(std::time::Duration::from_secs(secs)),
        None => CancelToken::new(),
    }
}

fn run_walk_forward(args: WalkForwardArgs) -> Result<()> {
    let config = load_config(&args.common)?;
    let candles = load_candles(&args.candles, args.symbol.as_deref())?;

    let optimizer: Box<dyn Optimizer> = match args.optimizer {
        OptimizerKind::Fixed => Box::new(FixedParams),
        OptimizerKind::Grid => Box::new(GridSearchOptimizer::default()),
    };
    let runner = WalkForwardRunner::new(config.engine.clone(), config.metrics, config.walk_forward.clone());
    let report = runner
        .run(
            &candles,
            &config.strategy,
            &StrategyRegistry::with_builtins(),
            optimizer.as_ref(),
            &cancel_token(args.timeout_secs),
        )
        .context("walk-forward failed")?;

    if let Some(dir) = &args.export_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        export::write_trades_csv(&dir.join("walk_forward_trades.csv"), &report.trades)?;
        export::write_equity_csv(&dir.join("walk_forward_equity.csv"), &report.stitched_equity)?;
    }

    print_walk_forward(&report);
    emit_json(&walk_forward_output(&report), args.common.output_file.as_deref())
}

fn walk_forward_output(report: &WalkForwardReport) -> WalkForwardOutput<'_> {
    WalkForwardOutput {
        strategy_id: &report.strategy_id,
        optimizer: &report.optimizer,
        initial_capital: report.initial_capital,
        final_capital: report.final_capital,
        folds: report
            .folds
            .iter()
            .map(|f| FoldSummary {
                index: f.window.index,
                train: (f.window.train_start, f.window.train_end),
                trade: (f.window.trade_start, f.window.trade_end),
                stop_loss_pct: f.params.stop_loss_pct,
                take_profit_pct: f.params.take_profit_pct,
                starting_capital: f.starting_capital,
                ending_capital: f.ending_capital,
                in_sample_sharpe: f.in_sample_sharpe,
                out_of_sample_sharpe: f.out_of_sample_sharpe,
                trades: f.result.trades.len(),
                passed: f.passed,
            })
            .collect(),
        failures: &report.failures,
        fold_sharpes: &report.fold_sharpes,
        pass_fraction: report.pass_fraction,
        promoted: report.promoted,
        overfitting_warnings: &report.overfitting_warnings,
        cancelled: report.cancelled,
        metrics: &report.metrics,
    }
}

fn print_walk_forward(report: &WalkForwardReport) {
    eprintln!("\n{}", "=".repeat(80));
    eprintln!(
        "Walk-forward: {} ({} optimizer)",
        report.strategy_id, report.optimizer
    );
    eprintln!("{}", "-".repeat(80));
    eprintln!(
        "{:>5} {:>13} {:>13} {:>12} {:>12} {:>8} {:>6}",
        "Fold", "Train", "Trade", "Start", "End", "Sharpe", "Pass"
    );
    for f in &report.folds {
        eprintln!(
            "{:>5} {:>6}-{:<6} {:>6}-{:<6} {:>12.2} {:>12.2} {:>8.2} {:>6}",
            f.window.index,
            f.window.train_start,
            f.window.train_end,
            f.window.trade_start,
            f.window.trade_end,
            f.starting_capital,
            f.ending_capital,
            f.out_of_sample_sharpe,
            if f.passed { "yes" } else { "no" },
        );
    }
    for f in &report.failures {
        eprintln!("{:>5} FAILED: {}", f.fold_index, f.error);
    }
    eprintln!("{}", "-".repeat(80));
    eprintln!(
        "Capital {:.2} -> {:.2} | pass fraction {:.2} | promoted: {}{}",
        report.initial_capital,
        report.final_capital,
        report.pass_fraction,
        report.promoted,
        if report.cancelled { " | CANCELLED" } else { "" },
    );
    for w in &report.overfitting_warnings {
        eprintln!("  [WARN: {}]", w);
    }
    eprintln!("{}", "=".repeat(80));
}

fn run_compare(args: CompareArgs) -> Result<()> {
    let mut config = load_config(&args.common)?;
    if args.strict {
        config.harness.mode = HarnessMode::Strict;
    }
    if let Some(dir) = &args.output_dir {
        config.harness.output_dir = dir.clone();
    }

    let reference: Box<dyn ReferenceEngine> = match (&args.reference, args.self_check) {
        (Some(path), _) => Box::new(
            RecordedReference::from_json_file("recorded", path)
                .with_context(|| format!("failed to load reference metrics from {}", path.display()))?,
        ),
        (None, true) => Box::new(EngineReference::default()),
        (None, false) => Box::new(UnavailableReference::new("none")),
    };

    let harness = ComparisonHarness::new(config.harness.clone(), config.engine.clone(), config.metrics);
    let run = harness
        .run(reference.as_ref(), &cancel_token(args.timeout_secs))
        .context("comparison failed")?;

    for s in &run.report.scenarios {
        eprintln!(
            "{:<26} {:<10}{}",
            s.name,
            format!("{:?}", s.status).to_lowercase(),
            s.error.as_deref().map(|e| format!(" {}", e)).unwrap_or_default(),
        );
    }
    eprintln!("artifact: {}", run.artifact.display());
    emit_json(&run.report, args.common.output_file.as_deref())
}
