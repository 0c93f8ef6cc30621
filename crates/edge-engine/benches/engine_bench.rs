use criterion::{black_box, criterion_group, criterion_main, Criterion};

use edge_core::{CandleStore, EngineSettings, MetricsConfig, StrategyConfig, ValidatorConfig};
use edge_engine::{BacktestEngine, BacktestJob, ParallelRunner, StatisticalValidator};
use edge_strategy::{MaCrossover, StrategyRegistry};

fn make_candles(n: usize) -> CandleStore {
    let mut store = CandleStore::with_capacity("BENCH", n);
    let base_ts: i64 = 1_735_689_600;
    for i in 0..n {
        let ts = base_ts + (i as i64) * 60;
        // Trending price with some noise
        let trend = (i as f64) * 0.001;
        let noise = ((i as f64) * 0.1).sin() * 0.05;
        let price = 100.0 + trend + noise;
        store.push(ts, price, price + 0.02, price - 0.02, price + 0.01, 1000.0 + (i as f64));
    }
    store
}

fn metrics() -> MetricsConfig {
    MetricsConfig::new(525_600.0)
}

fn bench_single_run(c: &mut Criterion) {
    let candles = make_candles(10_000);
    let config = StrategyConfig::new("ma_crossover", 0.01, 0.02).with_costs(0.0005, 0.001);
    let signal = MaCrossover::default();
    let engine = BacktestEngine::new(EngineSettings::default(), metrics());

    c.bench_function("single_run_10k", |b| {
        b.iter(|| {
            let result = engine.run(black_box(&candles), black_box(&config), &signal);
            black_box(result)
        });
    });
}

fn bench_parallel_jobs(c: &mut Criterion) {
    let candles = make_candles(10_000);
    let configs: Vec<StrategyConfig> = ["buy_and_hold", "ma_crossover", "rsi_reversion", "trend_breakout"]
        .iter()
        .map(|id| StrategyConfig::new(*id, 0.01, 0.02))
        .collect();
    let jobs: Vec<BacktestJob<'_>> = configs
        .iter()
        .map(|config| BacktestJob {
            candles: &candles,
            config,
        })
        .collect();

    let runner = ParallelRunner::new(
        BacktestEngine::new(EngineSettings::default(), metrics()),
        StatisticalValidator::new(
            ValidatorConfig {
                runs: 100,
                n_bootstrap: 100,
                seed: Some(42),
                ..ValidatorConfig::default()
            },
            metrics(),
        ),
        StrategyRegistry::with_builtins(),
    );

    c.bench_function("parallel_jobs_10k", |b| {
        b.iter(|| black_box(runner.run_all(black_box(&jobs))));
    });
}

fn bench_permutation_test(c: &mut Criterion) {
    let returns: Vec<f64> = (0..2_000)
        .map(|i| 0.0002 + ((i as f64) * 0.37).sin() * 0.01)
        .collect();
    let validator = StatisticalValidator::new(ValidatorConfig::default(), metrics());

    c.bench_function("sign_flip_1000_runs_2k", |b| {
        b.iter(|| black_box(validator.validate(black_box(&returns), 1_000, Some(42))));
    });
}

criterion_group!(
    benches,
    bench_single_run,
    bench_parallel_jobs,
    bench_permutation_test,
);
criterion_main!(benches);
