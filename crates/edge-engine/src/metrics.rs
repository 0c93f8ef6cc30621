use serde::{Deserialize, Serialize};

use edge_core::MetricsConfig;

use crate::engine::{BacktestResult, EquityPoint, Trade};

/// Returned instead of infinity for unbounded ratios.
pub const RATIO_CAP: f64 = 999.0;

/// Computed performance metrics.
///
/// `*_pct` fields are percentages (`12.5` = 12.5%); `win_rate` is a fraction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub total_pnl: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_win_loss_ratio: f64,
    pub avg_bars_held: f64,
    pub total_fees: f64,
    pub total_slippage: f64,
    pub total_return_pct: f64,
    pub cagr_pct: f64,
    pub volatility_pct: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub max_drawdown_pct: f64,
    /// Longest run of bars spent below a previous equity peak.
    pub max_drawdown_duration: usize,
    pub recovery_factor: f64,
}

/// Backtest vs live trading deltas.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveComparison {
    pub backtest_return_pct: f64,
    pub live_return_pct: f64,
    pub return_deviation_pct: f64,
    pub backtest_win_rate: f64,
    pub live_win_rate: f64,
    pub win_rate_delta: f64,
    pub backtest_trades: usize,
    pub live_trades: usize,
}

pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Calculate all performance metrics from a trade ledger and equity curve.
    pub fn calculate(trades: &[Trade], equity: &[EquityPoint], config: &MetricsConfig) -> Metrics {
        let values: Vec<f64> = equity.iter().map(|p| p.equity).collect();
        let returns = Self::returns_from_values(&values);
        let pnls: Vec<f64> = trades.iter().map(|t| t.pnl_net).collect();
        let ppy = config.periods_per_year;

        let wins: Vec<f64> = pnls.iter().copied().filter(|&p| p > 0.0).collect();
        let losses: Vec<f64> = pnls.iter().copied().filter(|&p| p < 0.0).collect();
        let gross_profit: f64 = wins.iter().sum();
        let gross_loss: f64 = losses.iter().map(|p| p.abs()).sum();

        let total_return_pct = Self::total_return_pct(&values);
        let max_drawdown_pct = Self::max_drawdown_pct(&values);
        let cagr_pct = Self::cagr_pct(&values, ppy);

        Metrics {
            total_trades: trades.len(),
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            win_rate: Self::win_rate(&pnls),
            profit_factor: Self::profit_factor(&pnls),
            expectancy: mean(&pnls),
            total_pnl: pnls.iter().sum(),
            gross_profit,
            gross_loss,
            avg_win: mean(&wins),
            avg_loss: mean(&losses),
            largest_win: wins.iter().copied().fold(0.0, f64::max),
            largest_loss: losses.iter().copied().fold(0.0, f64::min),
            avg_win_loss_ratio: Self::avg_win_loss_ratio(&pnls),
            avg_bars_held: if trades.is_empty() {
                0.0
            } else {
                trades.iter().map(|t| t.bars_held() as f64).sum::<f64>() / trades.len() as f64
            },
            total_fees: trades.iter().map(|t| t.fee).sum(),
            total_slippage: trades.iter().map(|t| t.slippage).sum(),
            total_return_pct,
            cagr_pct,
            volatility_pct: std_dev(&returns) * ppy.sqrt() * 100.0,
            sharpe_ratio: Self::sharpe_ratio(&returns, ppy),
            sortino_ratio: Self::sortino_ratio(&returns, ppy),
            calmar_ratio: Self::calmar_ratio(cagr_pct, max_drawdown_pct),
            max_drawdown_pct,
            max_drawdown_duration: Self::max_drawdown_duration(&values),
            recovery_factor: if max_drawdown_pct == 0.0 {
                0.0
            } else {
                total_return_pct / max_drawdown_pct
            },
        }
    }

    /// Simple returns between consecutive equity points.
    pub fn returns_from_equity(equity: &[EquityPoint]) -> Vec<f64> {
        let values: Vec<f64> = equity.iter().map(|p| p.equity).collect();
        Self::returns_from_values(&values)
    }

    pub fn returns_from_values(values: &[f64]) -> Vec<f64> {
        if values.len() < 2 {
            return Vec::new();
        }
        values
            .windows(2)
            .map(|w| {
                if w[0] == 0.0 {
                    0.0
                } else {
                    (w[1] - w[0]) / w[0]
                }
            })
            .collect()
    }

    /// Annualized Sharpe: `mean / std * sqrt(periods_per_year)`.
    pub fn sharpe_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
        sharpe_per_period(returns) * periods_per_year.sqrt()
    }

    /// Annualized Sortino, with the deviation taken over negative returns
    /// only. When the negatives have no spread (a single loss, or identical
    /// losses) their root mean square is used instead. No downside and a
    /// positive mean gives `RATIO_CAP`.
    pub fn sortino_ratio(returns: &[f64], periods_per_year: f64) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }
        let m = mean(returns);
        let downside: Vec<f64> = returns.iter().copied().filter(|&r| r < 0.0).collect();
        if downside.is_empty() {
            return if m > 0.0 { RATIO_CAP } else { 0.0 };
        }
        let mut deviation = std_dev(&downside);
        if deviation == 0.0 {
            let squares: Vec<f64> = downside.iter().map(|r| r * r).collect();
            deviation = mean(&squares).sqrt();
        }
        (m / deviation * periods_per_year.sqrt()).min(RATIO_CAP)
    }

    /// Largest peak-to-trough decline as a percentage, one forward pass.
    pub fn max_drawdown_pct(values: &[f64]) -> f64 {
        let mut peak = f64::MIN;
        let mut max_dd = 0.0f64;
        for &value in values {
            peak = peak.max(value);
            if peak > 0.0 {
                max_dd = max_dd.max((peak - value) / peak);
            }
        }
        max_dd * 100.0
    }

    /// Drawdown from the running peak at every point, as percentages.
    pub fn drawdown_curve(equity: &[EquityPoint]) -> Vec<f64> {
        let mut peak = f64::MIN;
        equity
            .iter()
            .map(|p| {
                peak = peak.max(p.equity);
                if peak > 0.0 {
                    (peak - p.equity) / peak * 100.0
                } else {
                    0.0
                }
            })
            .collect()
    }

    fn max_drawdown_duration(values: &[f64]) -> usize {
        let mut peak = f64::MIN;
        let mut current = 0usize;
        let mut longest = 0usize;
        for &value in values {
            if value >= peak {
                peak = value;
                current = 0;
            } else {
                current += 1;
                longest = longest.max(current);
            }
        }
        longest
    }

    /// CAGR over `values.len() - 1` periods, as a percentage.
    fn cagr_pct(values: &[f64], periods_per_year: f64) -> f64 {
        let (Some(&first), Some(&last)) = (values.first(), values.last()) else {
            return 0.0;
        };
        let periods = values.len() - 1;
        if periods == 0 || first <= 0.0 {
            return 0.0;
        }
        if last <= 0.0 {
            return -100.0;
        }
        let years = periods as f64 / periods_per_year;
        ((last / first).powf(1.0 / years) - 1.0) * 100.0
    }

    /// CAGR over the magnitude of the max drawdown; 0 without drawdown.
    fn calmar_ratio(cagr_pct: f64, max_drawdown_pct: f64) -> f64 {
        if max_drawdown_pct == 0.0 {
            return 0.0;
        }
        cagr_pct / max_drawdown_pct.abs()
    }

    fn total_return_pct(values: &[f64]) -> f64 {
        match (values.first(), values.last()) {
            (Some(&first), Some(&last)) if first != 0.0 => (last - first) / first * 100.0,
            _ => 0.0,
        }
    }

    fn win_rate(pnls: &[f64]) -> f64 {
        if pnls.is_empty() {
            return 0.0;
        }
        let wins = pnls.iter().filter(|&&p| p > 0.0).count();
        wins as f64 / pnls.len() as f64
    }

    /// Gross profit over gross loss, `RATIO_CAP` when nothing was lost.
    pub fn profit_factor(pnls: &[f64]) -> f64 {
        let gross_profit: f64 = pnls.iter().filter(|&&p| p > 0.0).sum();
        let gross_loss: f64 = pnls.iter().filter(|&&p| p < 0.0).map(|p| p.abs()).sum();
        if gross_loss == 0.0 {
            return if gross_profit > 0.0 { RATIO_CAP } else { 0.0 };
        }
        (gross_profit / gross_loss).min(RATIO_CAP)
    }

    fn avg_win_loss_ratio(pnls: &[f64]) -> f64 {
        let wins: Vec<f64> = pnls.iter().copied().filter(|&p| p > 0.0).collect();
        let losses: Vec<f64> = pnls
            .iter()
            .copied()
            .filter(|&p| p < 0.0)
            .map(f64::abs)
            .collect();
        if wins.is_empty() || losses.is_empty() {
            return 0.0;
        }
        let avg_loss = mean(&losses);
        if avg_loss == 0.0 {
            return 0.0;
        }
        mean(&wins) / avg_loss
    }

    /// Compare a backtest with realized live PnLs on the same capital base.
    pub fn compare_with_live(result: &BacktestResult, live_pnls: &[f64]) -> LiveComparison {
        let backtest_return_pct = result.metrics.total_return_pct;
        let live_return_pct = if result.initial_capital == 0.0 {
            0.0
        } else {
            live_pnls.iter().sum::<f64>() / result.initial_capital * 100.0
        };
        let live_win_rate = Self::win_rate(live_pnls);
        LiveComparison {
            backtest_return_pct,
            live_return_pct,
            return_deviation_pct: live_return_pct - backtest_return_pct,
            backtest_win_rate: result.metrics.win_rate,
            live_win_rate,
            win_rate_delta: live_win_rate - result.metrics.win_rate,
            backtest_trades: result.metrics.total_trades,
            live_trades: live_pnls.len(),
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Un-annualized Sharpe, the statistic the validator permutes.
pub fn sharpe_per_period(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(returns);
    if std == 0.0 {
        return 0.0;
    }
    mean(returns) / std
}
