use edge_core::{HistoryWindow, Side};

/// Pure-function entry-signal interface for backtesting.
///
/// Implementations see only the bars up to and including the current one and
/// must not keep mutable state between calls: the engine replays them across
/// threads and expects bit-identical answers for identical windows. All
/// signals must be Send + Sync for Rayon parallelism.
pub trait EntrySignal: Send + Sync {
    /// Unique identifier, also the registry key.
    fn id(&self) -> &str;

    /// Evaluate the window ending at the current bar and optionally produce a
    /// side to enter on the next bar.
    fn evaluate(&self, window: &HistoryWindow<'_>) -> Option<Side>;

    /// Strength of the current signal, compared against `min_score`.
    fn score(&self, _window: &HistoryWindow<'_>) -> f64 {
        1.0
    }

    /// Whether an open position on `side` should be closed on the next bar.
    ///
    /// Defaults to the signal flipping to the opposite side.
    fn exit(&self, window: &HistoryWindow<'_>, side: Side) -> bool {
        self.evaluate(window) == Some(side.opposite())
    }
}
