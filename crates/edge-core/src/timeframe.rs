use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const SECONDS_PER_YEAR: f64 = 365.0 * 86_400.0;

/// Candle timeframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
    W1,
}

impl FromStr for Timeframe {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "M1" | "1M" => Ok(Timeframe::M1),
            "M5" | "5M" => Ok(Timeframe::M5),
            "M15" | "15M" => Ok(Timeframe::M15),
            "M30" | "30M" => Ok(Timeframe::M30),
            "H1" | "1H" => Ok(Timeframe::H1),
            "H4" | "4H" => Ok(Timeframe::H4),
            "D1" | "1D" => Ok(Timeframe::D1),
            "W1" | "1W" => Ok(Timeframe::W1),
            other => Err(ConfigError::invalid(
                "timeframe",
                format!("unknown timeframe `{}`", other),
            )),
        }
    }
}

impl Timeframe {
    pub fn to_seconds(self) -> u64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 300,
            Timeframe::M15 => 900,
            Timeframe::M30 => 1_800,
            Timeframe::H1 => 3_600,
            Timeframe::H4 => 14_400,
            Timeframe::D1 => 86_400,
            Timeframe::W1 => 604_800,
        }
    }

    /// Bars per year for a market that trades around the clock.
    ///
    /// Session-based markets (e.g. 252 trading days) should pass their own
    /// figure to `MetricsConfig::new` instead.
    pub fn periods_per_year(self) -> f64 {
        SECONDS_PER_YEAR / self.to_seconds() as f64
    }
}
