use edge_core::{HistoryWindow, Side};

use crate::traits::EntrySignal;

/// Always long. Re-enters on the bar after any stop-out.
#[derive(Debug, Clone, Default)]
pub struct BuyAndHold;

impl EntrySignal for BuyAndHold {
    fn id(&self) -> &str {
        "buy_and_hold"
    }

    fn evaluate(&self, _window: &HistoryWindow<'_>) -> Option<Side> {
        Some(Side::Long)
    }

    fn exit(&self, _window: &HistoryWindow<'_>, _side: Side) -> bool {
        false
    }
}
