use serde::Serialize;

use edge_core::StrategyConfig;

/// Which way an order crosses the market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Result of a simulated fill.
///
/// `fill_price` already contains slippage and fee. `slippage` and `fee` are
/// the currency amounts folded into it, kept for reporting only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulatedFill {
    pub reference_price: f64,
    pub fill_price: f64,
    pub units: f64,
    pub slippage: f64,
    pub fee: f64,
}

/// Fixed-percentage cost model.
///
/// Buys fill at `ref * (1 + slippage + fee)`, sells at
/// `ref * (1 - slippage - fee)`. The adjustment happens here and nowhere
/// else; realized PnL computed from fill prices is already net of costs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FillSimulator {
    slippage_pct: f64,
    fee_pct: f64,
}

impl FillSimulator {
    pub fn new(slippage_pct: f64, fee_pct: f64) -> Self {
        Self {
            slippage_pct,
            fee_pct,
        }
    }

    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(config.slippage_pct, config.fee_pct)
    }

    /// Price at which an order of `side` fills against `reference_price`.
    #[inline]
    pub fn fill_price(&self, side: OrderSide, reference_price: f64) -> f64 {
        let cost = self.slippage_pct + self.fee_pct;
        match side {
            OrderSide::Buy => reference_price * (1.0 + cost),
            OrderSide::Sell => reference_price * (1.0 - cost),
        }
    }

    pub fn simulate_fill(&self, side: OrderSide, reference_price: f64, units: f64) -> SimulatedFill {
        let notional = reference_price * units;
        SimulatedFill {
            reference_price,
            fill_price: self.fill_price(side, reference_price),
            units,
            slippage: notional * self.slippage_pct,
            fee: notional * self.fee_pct,
        }
    }
}

impl Default for FillSimulator {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}
