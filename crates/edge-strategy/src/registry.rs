use std::collections::BTreeMap;

use crate::buy_and_hold::BuyAndHold;
use crate::coin_flip::CoinFlip;
use crate::ma_crossover::MaCrossover;
use crate::rsi_reversion::RsiReversion;
use crate::traits::EntrySignal;
use crate::trend_breakout::TrendBreakout;

/// Entry signals keyed by strategy id.
///
/// Callers resolve `StrategyConfig::strategy_id` here instead of branching on
/// strings; new strategies are added with `register`.
#[derive(Default)]
pub struct StrategyRegistry {
    signals: BTreeMap<String, Box<dyn EntrySignal>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in strategy with default parameters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(BuyAndHold));
        registry.register(Box::new(MaCrossover::default()));
        registry.register(Box::new(TrendBreakout::default()));
        registry.register(Box::new(RsiReversion::default()));
        registry.register(Box::new(CoinFlip::default()));
        registry
    }

    /// Insert a signal under its own id, replacing any previous entry.
    pub fn register(&mut self, signal: Box<dyn EntrySignal>) -> Option<Box<dyn EntrySignal>> {
        self.signals.insert(signal.id().to_string(), signal)
    }

    pub fn get(&self, id: &str) -> Option<&dyn EntrySignal> {
        self.signals.get(id).map(|s| s.as_ref())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.signals.contains_key(id)
    }

    /// Registered ids in sorted order.
    pub fn ids(&self) -> Vec<&str> {
        self.signals.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scripted::Scripted;

    #[test]
    fn test_builtins_registered() {
        let registry = StrategyRegistry::with_builtins();
        assert_eq!(
            registry.ids(),
            vec![
                "buy_and_hold",
                "coin_flip",
                "ma_crossover",
                "rsi_reversion",
                "trend_breakout"
            ]
        );
        assert_eq!(registry.get("ma_crossover").unwrap().id(), "ma_crossover");
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_register_replaces_same_id() {
        let mut registry = StrategyRegistry::new();
        assert!(registry.register(Box::new(Scripted::new("s"))).is_none());
        assert!(registry.register(Box::new(Scripted::new("s"))).is_some());
        assert_eq!(registry.len(), 1);
    }
}
