use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use edge_core::{mix_seed, HistoryWindow, Side};

use crate::traits::EntrySignal;

/// Randomized control strategy: enters a random side with a fixed
/// probability on each bar.
///
/// The RNG is re-seeded from `(seed, bar index)` on every call, so the
/// answer for a given bar never depends on call order or thread.
#[derive(Debug, Clone)]
pub struct CoinFlip {
    seed: u64,
    entry_probability: f64,
}

impl CoinFlip {
    pub fn new(seed: u64, entry_probability: f64) -> Self {
        Self {
            seed,
            entry_probability: entry_probability.clamp(0.0, 1.0),
        }
    }

    fn rng_for(&self, window: &HistoryWindow<'_>) -> StdRng {
        StdRng::seed_from_u64(mix_seed(self.seed, window.current_index() as u64))
    }
}

impl Default for CoinFlip {
    fn default() -> Self {
        Self::new(42, 0.1)
    }
}

impl EntrySignal for CoinFlip {
    fn id(&self) -> &str {
        "coin_flip"
    }

    fn evaluate(&self, window: &HistoryWindow<'_>) -> Option<Side> {
        let mut rng = self.rng_for(window);
        if !rng.gen_bool(self.entry_probability) {
            return None;
        }
        if rng.gen_bool(0.5) {
            Some(Side::Long)
        } else {
            Some(Side::Short)
        }
    }

    fn exit(&self, _window: &HistoryWindow<'_>, _side: Side) -> bool {
        false
    }
}
