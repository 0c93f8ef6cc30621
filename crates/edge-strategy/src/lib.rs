pub mod buy_and_hold;
pub mod coin_flip;
pub mod indicators;
pub mod ma_crossover;
pub mod registry;
pub mod rsi_reversion;
pub mod scripted;
pub mod traits;
pub mod trend_breakout;

pub use buy_and_hold::BuyAndHold;
pub use coin_flip::CoinFlip;
pub use ma_crossover::MaCrossover;
pub use registry::StrategyRegistry;
pub use rsi_reversion::RsiReversion;
pub use scripted::Scripted;
pub use traits::EntrySignal;
pub use trend_breakout::TrendBreakout;
