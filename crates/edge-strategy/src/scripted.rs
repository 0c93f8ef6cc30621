use std::collections::{BTreeMap, BTreeSet};

use edge_core::{HistoryWindow, Side};

use crate::traits::EntrySignal;

/// Bar-indexed schedule of entries and exits.
///
/// Useful for pinning down engine behaviour: the signal fires exactly on the
/// listed bars and nowhere else.
#[derive(Debug, Clone, Default)]
pub struct Scripted {
    id: String,
    entries: BTreeMap<usize, Side>,
    exits: BTreeSet<usize>,
}

impl Scripted {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn enter(mut self, bar: usize, side: Side) -> Self {
        self.entries.insert(bar, side);
        self
    }

    pub fn exit_at(mut self, bar: usize) -> Self {
        self.exits.insert(bar);
        self
    }
}

impl EntrySignal for Scripted {
    fn id(&self) -> &str {
        &self.id
    }

    fn evaluate(&self, window: &HistoryWindow<'_>) -> Option<Side> {
        self.entries.get(&window.current_index()).copied()
    }

    fn exit(&self, window: &HistoryWindow<'_>, _side: Side) -> bool {
        self.exits.contains(&window.current_index())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core::CandleStore;

    #[test]
    fn test_fires_only_on_listed_bars() {
        let mut store = CandleStore::new("X");
        for i in 0..4 {
            store.push(i, 1.0, 1.0, 1.0, 1.0, 1.0);
        }
        let s = Scripted::new("script").enter(1, Side::Short).exit_at(3);
        assert_eq!(s.evaluate(&store.history(0)), None);
        assert_eq!(s.evaluate(&store.history(1)), Some(Side::Short));
        assert!(!s.exit(&store.history(2), Side::Short));
        assert!(s.exit(&store.history(3), Side::Short));
        assert_eq!(s.id(), "script");
    }
}
