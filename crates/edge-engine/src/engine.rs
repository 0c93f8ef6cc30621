use std::ops::Range;

use serde::Serialize;
use tracing::{debug, info};

use edge_core::{
    CandleStore, EngineSettings, ExecutionError, ExitReason, MetricsConfig, Side, StrategyConfig,
};
use edge_strategy::EntrySignal;

use crate::error::BacktestError;
use crate::fill_sim::{FillSimulator, OrderSide};
use crate::metrics::{Metrics, MetricsCalculator};
use crate::position::{Account, Position};

/// A completed round trip.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub strategy_id: String,
    pub side: Side,
    /// Entry fill price, costs included.
    pub entry_price: f64,
    /// Exit fill price, costs included.
    pub exit_price: f64,
    pub entry_bar_index: usize,
    pub exit_bar_index: usize,
    pub entry_timestamp: i64,
    pub exit_timestamp: i64,
    pub units: f64,
    pub exit_reason: ExitReason,
    /// PnL at reference prices, before any cost.
    pub pnl_gross: f64,
    /// PnL at fill prices. Equals the cash the trade added or removed.
    pub pnl_net: f64,
    pub fee: f64,
    pub slippage: f64,
}

impl Trade {
    #[inline]
    pub fn bars_held(&self) -> usize {
        self.exit_bar_index - self.entry_bar_index
    }

    #[inline]
    pub fn is_win(&self) -> bool {
        self.pnl_net > 0.0
    }
}

/// Account value at the close of one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EquityPoint {
    pub bar_index: usize,
    pub timestamp: i64,
    pub equity: f64,
}

/// Full backtest result for a single strategy over one series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub symbol: String,
    pub strategy_id: String,
    pub config: StrategyConfig,
    pub initial_capital: f64,
    pub final_capital: f64,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    /// Position still open after the last bar when `close_at_end` is off.
    pub open_position: Option<Position>,
    pub metrics: Metrics,
}

impl BacktestResult {
    /// Per-bar returns of the equity curve.
    pub fn returns(&self) -> Vec<f64> {
        MetricsCalculator::returns_from_equity(&self.equity_curve)
    }

    pub fn equity_values(&self) -> Vec<f64> {
        self.equity_curve.iter().map(|p| p.equity).collect()
    }
}

/// Bar-by-bar simulator for one strategy on one symbol.
///
/// Per bar, in order:
///   1. Validate the candle; corrupt data aborts the run
///   2. Fill the order scheduled on the previous bar at this bar's open
///   3. With a position open: stop-loss, take-profit, trailing-stop,
///      max-hold, then the strategy's own exit; a hit schedules an exit
///   4. Flat with nothing just closed: ask the strategy for an entry
///   5. On the last bar, liquidate at the close when `close_at_end`
///   6. Record one equity point
///
/// Runs are single-threaded and deterministic; the engine keeps no state
/// between calls.
#[derive(Debug, Clone)]
pub struct BacktestEngine {
    settings: EngineSettings,
    metrics: MetricsConfig,
}

impl BacktestEngine {
    pub fn new(settings: EngineSettings, metrics: MetricsConfig) -> Self {
        Self { settings, metrics }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn metrics_config(&self) -> &MetricsConfig {
        &self.metrics
    }

    /// Same engine starting from a different capital.
    pub fn with_initial_capital(&self, initial_capital: f64) -> Self {
        Self {
            settings: EngineSettings {
                initial_capital,
                ..self.settings.clone()
            },
            metrics: self.metrics,
        }
    }

    /// Run over every bar of `candles`.
    pub fn run(
        &self,
        candles: &CandleStore,
        config: &StrategyConfig,
        signal: &dyn EntrySignal,
    ) -> Result<BacktestResult, BacktestError> {
        self.run_range(candles, 0..candles.len(), config, signal)
    }

    /// Trade only the bars in `range`.
    ///
    /// Bars before `range.start` are visible to the strategy as history but
    /// are never traded. Bar indices in the result refer to `candles`.
    pub fn run_range(
        &self,
        candles: &CandleStore,
        range: Range<usize>,
        config: &StrategyConfig,
        signal: &dyn EntrySignal,
    ) -> Result<BacktestResult, BacktestError> {
        self.run_window(candles, 0, range, config, signal)
    }

    /// Trade the bars in `range` with history starting at `history_start`.
    ///
    /// Bars before `history_start` are neither validated nor visible to the
    /// strategy, so a corrupt bar there cannot fail the run.
    pub fn run_window(
        &self,
        candles: &CandleStore,
        history_start: usize,
        range: Range<usize>,
        config: &StrategyConfig,
        signal: &dyn EntrySignal,
    ) -> Result<BacktestResult, BacktestError> {
        config.validate()?;
        self.settings.validate()?;
        self.metrics.validate()?;

        if candles.is_empty() {
            return Err(ExecutionError::EmptySeries.into());
        }
        let Range { start, end } = range;
        if start >= end || end > candles.len() || history_start > start {
            return Err(ExecutionError::InvalidRange {
                start,
                end,
                len: candles.len(),
            }
            .into());
        }

        // Warm-up bars feed the strategy, so they must be sound as well.
        let mut prev_ts = None;
        for i in history_start..start {
            candles.check_bar(i, prev_ts)?;
            prev_ts = Some(candles.timestamps[i]);
        }

        let mut sim = Simulation {
            candles,
            config,
            signal,
            settings: &self.settings,
            fills: FillSimulator::from_config(config),
            history_start,
            end,
            account: Account::new(self.settings.initial_capital),
            pending_entry: None,
            pending_exit: None,
            trades: Vec::new(),
            equity_curve: Vec::with_capacity(end - start),
        };

        for i in start..end {
            candles.check_bar(i, prev_ts)?;
            prev_ts = Some(candles.timestamps[i]);
            sim.step(i);
        }

        let final_capital = sim
            .equity_curve
            .last()
            .map_or(self.settings.initial_capital, |p| p.equity);
        let metrics = MetricsCalculator::calculate(&sim.trades, &sim.equity_curve, &self.metrics);

        info!(
            symbol = %candles.symbol,
            strategy = signal.id(),
            bars = end - start,
            trades = sim.trades.len(),
            final_capital,
            "backtest complete"
        );

        Ok(BacktestResult {
            symbol: candles.symbol.clone(),
            strategy_id: signal.id().to_string(),
            config: config.clone(),
            initial_capital: self.settings.initial_capital,
            final_capital,
            open_position: sim.account.position().copied(),
            trades: sim.trades,
            equity_curve: sim.equity_curve,
            metrics,
        })
    }
}

/// Mutable state of one run.
struct Simulation<'a> {
    candles: &'a CandleStore,
    config: &'a StrategyConfig,
    signal: &'a dyn EntrySignal,
    settings: &'a EngineSettings,
    fills: FillSimulator,
    history_start: usize,
    end: usize,
    account: Account,
    pending_entry: Option<Side>,
    pending_exit: Option<ExitReason>,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
}

impl Simulation<'_> {
    fn step(&mut self, i: usize) {
        let candles = self.candles;
        let is_last = i + 1 == self.end;

        let mut exited = false;
        if let Some(reason) = self.pending_exit.take() {
            self.close_position(i, candles.open[i], reason);
            exited = true;
        } else if let Some(side) = self.pending_entry.take() {
            self.open_position(i, side);
        }

        if let Some(position) = self.account.position_mut() {
            position.update_watermark(candles.high[i], candles.low[i]);
        }

        match self.account.position().copied() {
            Some(position) => self.pending_exit = self.check_exit(&position, i),
            None if !exited => self.check_entry(i),
            None => {}
        }

        if is_last && self.settings.close_at_end && !self.account.is_flat() {
            self.pending_exit = None;
            self.close_position(i, candles.close[i], ExitReason::EndOfData);
        }

        self.equity_curve.push(EquityPoint {
            bar_index: i,
            timestamp: candles.timestamps[i],
            equity: self.account.equity(candles.close[i]),
        });
    }

    fn check_exit(&self, position: &Position, i: usize) -> Option<ExitReason> {
        let candles = self.candles;
        let sign = position.side.sign();
        let entry = position.entry_reference;
        let (adverse, favourable) = match position.side {
            Side::Long => (candles.low[i], candles.high[i]),
            Side::Short => (candles.high[i], candles.low[i]),
        };

        let stop = entry * (1.0 - sign * self.config.stop_loss_pct);
        if sign * (adverse - stop) <= 0.0 {
            return Some(ExitReason::StopLoss);
        }

        let target = entry * (1.0 + sign * self.config.take_profit_pct);
        if sign * (favourable - target) >= 0.0 {
            return Some(ExitReason::TakeProfit);
        }

        if let Some(trail) = self.config.trailing_stop_pct {
            let level = position.watermark * (1.0 - sign * trail);
            if sign * (candles.close[i] - level) <= 0.0 {
                return Some(ExitReason::TrailingStop);
            }
        }

        if let Some(max_hold) = self.config.max_hold_bars {
            if position.bars_held(i) >= max_hold {
                return Some(ExitReason::MaxHold);
            }
        }

        if self.signal.exit(&candles.history_from(self.history_start, i), position.side) {
            return Some(ExitReason::SignalExit);
        }

        None
    }

    fn check_entry(&mut self, i: usize) {
        if i + 1 >= self.end || self.account.cash() <= 0.0 {
            return;
        }
        let window = self.candles.history_from(self.history_start, i);
        let Some(side) = self.signal.evaluate(&window) else {
            return;
        };
        if side == Side::Short && !self.settings.allow_short {
            return;
        }
        if self.signal.score(&window) < self.config.min_score {
            return;
        }
        if self.candles.dollar_volume(i) < self.config.min_liquidity_usd {
            return;
        }
        self.pending_entry = Some(side);
    }

    fn open_position(&mut self, i: usize, side: Side) {
        let reference = self.candles.open[i];
        let order = match side {
            Side::Long => OrderSide::Buy,
            Side::Short => OrderSide::Sell,
        };
        let fill_price = self.fills.fill_price(order, reference);
        if fill_price <= 0.0 {
            debug!(bar = i, reference, "entry skipped at non-positive price");
            return;
        }

        let budget = self.account.cash() * self.settings.position_size_pct;
        let fill = self.fills.simulate_fill(order, reference, budget / fill_price);
        if self
            .account
            .open(side, &fill, i, self.candles.timestamps[i])
        {
            debug!(
                bar = i,
                ?side,
                price = fill.fill_price,
                units = fill.units,
                "entry filled"
            );
        }
    }

    fn close_position(&mut self, i: usize, reference: f64, reason: ExitReason) {
        let Some(position) = self.account.position().copied() else {
            return;
        };
        let order = match position.side {
            Side::Long => OrderSide::Sell,
            Side::Short => OrderSide::Buy,
        };
        let fill = self.fills.simulate_fill(order, reference, position.units);
        let Some(closed) = self.account.close(fill.fill_price) else {
            return;
        };

        let pnl_gross = position.side.sign() * (reference - position.entry_reference) * position.units;
        debug!(
            bar = i,
            reason = reason.as_str(),
            price = fill.fill_price,
            pnl = closed.pnl_net,
            "exit filled"
        );

        self.trades.push(Trade {
            strategy_id: self.signal.id().to_string(),
            side: position.side,
            entry_price: position.entry_price,
            exit_price: fill.fill_price,
            entry_bar_index: position.entry_bar_index,
            exit_bar_index: i,
            entry_timestamp: position.entry_timestamp,
            exit_timestamp: self.candles.timestamps[i],
            units: position.units,
            exit_reason: reason,
            pnl_gross,
            pnl_net: closed.pnl_net,
            fee: position.entry_fee + fill.fee,
            slippage: position.entry_slippage + fill.slippage,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core::ConfigError;
    use edge_strategy::{BuyAndHold, Scripted};

    fn engine() -> BacktestEngine {
        BacktestEngine::new(EngineSettings::default(), MetricsConfig::new(252.0))
    }

    fn config() -> StrategyConfig {
        StrategyConfig::new("scripted", 0.05, 0.10)
    }

    fn flat(n: usize, price: f64) -> CandleStore {
        let mut store = CandleStore::new("FLAT");
        for i in 0..n {
            store.push(i as i64 * 60, price, price, price, price, 1000.0);
        }
        store
    }

    fn rising(n: usize) -> CandleStore {
        let mut store = CandleStore::new("UP");
        for i in 0..n {
            let p = 100.0 + i as f64;
            store.push(i as i64 * 60, p, p + 0.5, p - 0.5, p + 0.25, 1000.0);
        }
        store
    }

    #[test]
    fn test_flat_price_round_trip_keeps_capital() {
        let candles = flat(4, 100.0);
        let signal = Scripted::new("scripted").enter(0, Side::Long).exit_at(1);
        let result = engine().run(&candles, &config(), &signal).unwrap();

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.final_capital, result.initial_capital);
        assert!(result.equity_curve.iter().all(|p| p.equity == 10_000.0));
        assert_eq!(result.metrics.max_drawdown_pct, 0.0);
    }

    #[test]
    fn test_entry_fills_on_next_bar_open() {
        let candles = rising(6);
        let signal = Scripted::new("scripted").enter(0, Side::Long).exit_at(2);
        let result = engine().run(&candles, &config().with_max_hold(100), &signal).unwrap();

        let trade = &result.trades[0];
        assert_eq!(trade.entry_bar_index, 1);
        assert_eq!(trade.entry_price, candles.open[1]);
        assert_eq!(trade.exit_bar_index, 3);
        assert_eq!(trade.exit_price, candles.open[3]);
        assert_eq!(trade.exit_reason, ExitReason::SignalExit);
    }

    #[test]
    fn test_one_equity_point_per_bar() {
        let candles = rising(25);
        let result = engine().run(&candles, &config(), &BuyAndHold).unwrap();
        assert_eq!(result.equity_curve.len(), 25);
        for (i, point) in result.equity_curve.iter().enumerate() {
            assert_eq!(point.bar_index, i);
            assert_eq!(point.timestamp, candles.timestamps[i]);
        }
        assert_eq!(result.final_capital, result.equity_curve[24].equity);
    }

    #[test]
    fn test_stop_loss_wins_same_bar_tie() {
        let mut candles = CandleStore::new("X");
        candles.push(0, 100.0, 100.0, 100.0, 100.0, 1.0);
        candles.push(60, 100.0, 120.0, 80.0, 100.0, 1.0);
        candles.push(120, 90.0, 90.0, 90.0, 90.0, 1.0);
        let signal = Scripted::new("scripted").enter(0, Side::Long);
        let result = engine().run(&candles, &config(), &signal).unwrap();

        let trade = &result.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::StopLoss);
        assert_eq!(trade.exit_bar_index, 2);
        assert_eq!(trade.exit_price, 90.0);
        assert!((trade.pnl_net + 1_000.0).abs() < 1e-9);
        assert!((result.final_capital - 9_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_take_profit_beats_trailing_stop_on_same_bar() {
        let mut candles = CandleStore::new("X");
        candles.push(0, 100.0, 100.0, 100.0, 100.0, 1.0);
        candles.push(60, 100.0, 111.0, 99.0, 105.0, 1.0);
        candles.push(120, 104.0, 104.0, 104.0, 104.0, 1.0);
        let signal = Scripted::new("scripted").enter(0, Side::Long);
        let config = config().with_trailing_stop(0.02);
        let result = engine().run(&candles, &config, &signal).unwrap();

        let trade = &result.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
        assert_eq!(trade.exit_bar_index, 2);
    }

    #[test]
    fn test_trailing_stop_beats_max_hold_on_same_bar() {
        let mut candles = CandleStore::new("X");
        candles.push(0, 100.0, 100.0, 100.0, 100.0, 1.0);
        candles.push(60, 100.0, 101.0, 99.0, 100.0, 1.0);
        candles.push(120, 100.0, 104.0, 98.0, 99.0, 1.0);
        candles.push(180, 99.0, 99.0, 99.0, 99.0, 1.0);
        let signal = Scripted::new("scripted").enter(0, Side::Long);
        let config = config().with_trailing_stop(0.02).with_max_hold(1);
        let result = engine().run(&candles, &config, &signal).unwrap();

        let trade = &result.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::TrailingStop);
        assert_eq!(trade.exit_bar_index, 3);
        assert_eq!(trade.exit_price, 99.0);
    }

    #[test]
    fn test_take_profit_on_short() {
        let mut candles = CandleStore::new("X");
        candles.push(0, 100.0, 100.0, 100.0, 100.0, 1.0);
        candles.push(60, 100.0, 101.0, 89.0, 95.0, 1.0);
        candles.push(120, 92.0, 92.0, 92.0, 92.0, 1.0);
        let signal = Scripted::new("scripted").enter(0, Side::Short);
        let settings = EngineSettings {
            allow_short: true,
            ..EngineSettings::default()
        };
        let result = BacktestEngine::new(settings, MetricsConfig::new(252.0))
            .run(&candles, &config(), &signal)
            .unwrap();

        let trade = &result.trades[0];
        assert_eq!(trade.side, Side::Short);
        assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
        assert!((trade.pnl_net - 800.0).abs() < 1e-9);
        assert!((result.final_capital - 10_800.0).abs() < 1e-9);
    }

    #[test]
    fn test_short_ignored_when_disabled() {
        let candles = rising(5);
        let signal = Scripted::new("scripted").enter(0, Side::Short);
        let result = engine().run(&candles, &config(), &signal).unwrap();
        assert!(result.trades.is_empty());
        assert_eq!(result.final_capital, 10_000.0);
    }

    #[test]
    fn test_costs_applied_once() {
        let candles = rising(6);
        let signal = Scripted::new("scripted").enter(0, Side::Long).exit_at(2);
        let cfg = config().with_costs(0.001, 0.002);
        let result = engine().run(&candles, &cfg, &signal).unwrap();

        let trade = &result.trades[0];
        let costs = trade.fee + trade.slippage;
        assert!(costs > 0.0);
        assert!((trade.pnl_gross - trade.pnl_net - costs).abs() < 1e-6);
        assert!((result.final_capital - (10_000.0 + trade.pnl_net)).abs() < 1e-6);
    }

    #[test]
    fn test_trailing_stop() {
        let mut candles = CandleStore::new("X");
        candles.push(0, 100.0, 100.0, 100.0, 100.0, 1.0);
        candles.push(60, 100.0, 100.0, 100.0, 100.0, 1.0);
        candles.push(120, 100.0, 110.0, 100.0, 109.0, 1.0);
        candles.push(180, 101.0, 101.0, 100.0, 100.0, 1.0);
        candles.push(240, 99.0, 99.0, 99.0, 99.0, 1.0);
        let signal = Scripted::new("scripted").enter(0, Side::Long);
        let cfg = StrategyConfig::new("scripted", 0.2, 0.5).with_trailing_stop(0.05);
        let result = engine().run(&candles, &cfg, &signal).unwrap();

        let trade = &result.trades[0];
        assert_eq!(trade.exit_reason, ExitReason::TrailingStop);
        assert_eq!(trade.exit_bar_index, 4);
        assert_eq!(trade.exit_price, 99.0);
    }

    #[test]
    fn test_max_hold_then_reentry() {
        let candles = flat(10, 50.0);
        let cfg = StrategyConfig::new("buy_and_hold", 0.5, 0.5).with_max_hold(2);
        let result = engine().run(&candles, &cfg, &BuyAndHold).unwrap();

        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].entry_bar_index, 1);
        assert_eq!(result.trades[0].exit_bar_index, 4);
        assert_eq!(result.trades[0].exit_reason, ExitReason::MaxHold);
        assert_eq!(result.trades[1].entry_bar_index, 6);
        assert_eq!(result.trades[1].exit_bar_index, 9);
    }

    #[test]
    fn test_end_of_data_liquidation() {
        let candles = rising(5);
        let result = engine().run(&candles, &config(), &BuyAndHold).unwrap();
        let trade = result.trades.last().unwrap();
        assert_eq!(trade.exit_reason, ExitReason::EndOfData);
        assert_eq!(trade.exit_bar_index, 4);
        assert_eq!(trade.exit_price, candles.close[4]);
        assert!(result.open_position.is_none());
    }

    #[test]
    fn test_open_position_kept_without_close_at_end() {
        let candles = rising(5);
        let settings = EngineSettings {
            close_at_end: false,
            ..EngineSettings::default()
        };
        let result = BacktestEngine::new(settings, MetricsConfig::new(252.0))
            .run(&candles, &config(), &BuyAndHold)
            .unwrap();
        assert!(result.trades.is_empty());
        assert!(result.open_position.is_some());
        assert!(result.final_capital > result.initial_capital);
    }

    #[test]
    fn test_no_entry_signal_on_last_bar() {
        let candles = rising(4);
        let signal = Scripted::new("scripted").enter(3, Side::Long);
        let result = engine().run(&candles, &config(), &signal).unwrap();
        assert!(result.trades.is_empty());
        assert!(result.open_position.is_none());
    }

    #[test]
    fn test_liquidity_gate() {
        let candles = rising(5);
        let cfg = StrategyConfig {
            min_liquidity_usd: 1e9,
            ..config()
        };
        let result = engine().run(&candles, &cfg, &BuyAndHold).unwrap();
        assert!(result.trades.is_empty());
    }

    #[test]
    fn test_invalid_config_rejected_before_run() {
        let candles = rising(5);
        let cfg = StrategyConfig::new("scripted", 0.0, 0.1);
        let err = engine().run(&candles, &cfg, &BuyAndHold).unwrap_err();
        assert!(matches!(
            err,
            BacktestError::Config(ConfigError::Invalid {
                field: "stop_loss_pct",
                ..
            })
        ));
    }

    #[test]
    fn test_empty_series() {
        let candles = CandleStore::new("EMPTY");
        let err = engine().run(&candles, &config(), &BuyAndHold).unwrap_err();
        assert_eq!(err, BacktestError::Execution(ExecutionError::EmptySeries));
    }

    #[test]
    fn test_corrupt_bar_aborts_with_index() {
        let mut candles = rising(6);
        candles.close[3] = f64::NAN;
        let err = engine().run(&candles, &config(), &BuyAndHold).unwrap_err();
        assert!(matches!(
            err,
            BacktestError::Execution(ExecutionError::NonFinite {
                bar_index: 3,
                field: "close",
                ..
            })
        ));

        let mut candles = rising(6);
        candles.timestamps[4] = candles.timestamps[3];
        let err = engine().run(&candles, &config(), &BuyAndHold).unwrap_err();
        assert!(matches!(
            err,
            BacktestError::Execution(ExecutionError::NonMonotonicTimestamp { bar_index: 4, .. })
        ));
    }

    #[test]
    fn test_run_range_uses_history_but_trades_only_range() {
        let candles = rising(20);
        let result = engine()
            .run_range(&candles, 10..20, &config(), &BuyAndHold)
            .unwrap();
        assert_eq!(result.equity_curve.len(), 10);
        assert_eq!(result.equity_curve[0].bar_index, 10);
        assert_eq!(result.trades[0].entry_bar_index, 11);

        let err = engine()
            .run_range(&candles, 15..25, &config(), &BuyAndHold)
            .unwrap_err();
        assert!(matches!(
            err,
            BacktestError::Execution(ExecutionError::InvalidRange { start: 15, end: 25, .. })
        ));
    }

    #[test]
    fn test_run_window_ignores_bars_before_history_start() {
        let mut candles = rising(20);
        candles.close[2] = f64::NAN;
        assert!(engine()
            .run_range(&candles, 10..20, &config(), &BuyAndHold)
            .is_err());

        let result = engine()
            .run_window(&candles, 5, 10..20, &config(), &BuyAndHold)
            .unwrap();
        assert_eq!(result.equity_curve.len(), 10);
        assert_eq!(result.trades[0].entry_bar_index, 11);

        let err = engine()
            .run_window(&candles, 12, 10..20, &config(), &BuyAndHold)
            .unwrap_err();
        assert!(matches!(
            err,
            BacktestError::Execution(ExecutionError::InvalidRange { start: 10, end: 20, .. })
        ));
    }

    #[test]
    fn test_with_initial_capital() {
        let candles = flat(3, 10.0);
        let result = engine()
            .with_initial_capital(2_500.0)
            .run(&candles, &config(), &BuyAndHold)
            .unwrap();
        assert_eq!(result.initial_capital, 2_500.0);
        assert_eq!(result.final_capital, 2_500.0);
    }
}
