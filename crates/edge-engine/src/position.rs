use serde::Serialize;

use edge_core::{PositionSide, Side};

use crate::fill_sim::SimulatedFill;

/// An open position. At most one exists per account.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub side: Side,
    /// Fill price including costs.
    pub entry_price: f64,
    /// Market price the entry filled against; stop levels are set from it.
    pub entry_reference: f64,
    pub entry_bar_index: usize,
    pub entry_timestamp: i64,
    pub units: f64,
    /// Most favourable price seen while open (highest high for longs,
    /// lowest low for shorts).
    pub watermark: f64,
    pub entry_fee: f64,
    pub entry_slippage: f64,
}

impl Position {
    /// Profit at `price` measured from the entry fill, before exit costs.
    #[inline]
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.side.sign() * (price - self.entry_price) * self.units
    }

    pub fn update_watermark(&mut self, high: f64, low: f64) {
        self.watermark = match self.side {
            Side::Long => self.watermark.max(high),
            Side::Short => self.watermark.min(low),
        };
    }

    pub fn bars_held(&self, bar_index: usize) -> usize {
        bar_index.saturating_sub(self.entry_bar_index)
    }
}

/// Result of closing the open position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosedPosition {
    pub position: Position,
    pub pnl_net: f64,
}

/// Cash plus at most one open position.
///
/// Longs pay for units out of cash. Shorts run on margin: cash is untouched
/// at entry and only the realized PnL lands on exit. Either way the realized
/// adjustment is applied exactly once, in `close`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    cash: f64,
    position: Option<Position>,
}

impl Account {
    pub fn new(cash: f64) -> Self {
        Self {
            cash,
            position: None,
        }
    }

    #[inline]
    pub fn cash(&self) -> f64 {
        self.cash
    }

    #[inline]
    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn position_mut(&mut self) -> Option<&mut Position> {
        self.position.as_mut()
    }

    pub fn position_side(&self) -> PositionSide {
        self.position
            .map_or(PositionSide::Flat, |p| PositionSide::from(p.side))
    }

    #[inline]
    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    /// Open a position from an entry fill. Returns `false` (and changes
    /// nothing) if a position is already open.
    pub fn open(&mut self, side: Side, fill: &SimulatedFill, bar_index: usize, timestamp: i64) -> bool {
        if self.position.is_some() {
            return false;
        }
        if side == Side::Long {
            self.cash -= fill.units * fill.fill_price;
        }
        self.position = Some(Position {
            side,
            entry_price: fill.fill_price,
            entry_reference: fill.reference_price,
            entry_bar_index: bar_index,
            entry_timestamp: timestamp,
            units: fill.units,
            watermark: fill.reference_price,
            entry_fee: fill.fee,
            entry_slippage: fill.slippage,
        });
        true
    }

    /// Close the open position at `exit_price` (a fill price, costs
    /// included) and settle cash.
    pub fn close(&mut self, exit_price: f64) -> Option<ClosedPosition> {
        let position = self.position.take()?;
        let pnl_net = position.unrealized_pnl(exit_price);
        match position.side {
            Side::Long => self.cash += position.units * exit_price,
            Side::Short => self.cash += pnl_net,
        }
        Some(ClosedPosition { position, pnl_net })
    }

    /// Mark-to-market account value at `price`.
    pub fn equity(&self, price: f64) -> f64 {
        match self.position {
            None => self.cash,
            Some(p) => match p.side {
                Side::Long => self.cash + p.units * price,
                Side::Short => self.cash + p.unrealized_pnl(price),
            },
        }
    }
}
