use thiserror::Error;

/// Invalid or unloadable configuration. Always raised before a run starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid config field `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("config I/O error: {0}")]
    Io(String),

    #[error("config parse error: {0}")]
    Parse(String),
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Malformed candle data met while a run is in progress.
///
/// Every variant names the offending bar so the failure can be replayed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("candle series is empty")]
    EmptySeries,

    #[error("bar {bar_index}: {field} is not finite ({value})")]
    NonFinite {
        bar_index: usize,
        field: &'static str,
        value: f64,
    },

    #[error("bar {bar_index}: {field} is negative ({value})")]
    Negative {
        bar_index: usize,
        field: &'static str,
        value: f64,
    },

    #[error("bar {bar_index}: timestamp {current} does not follow previous timestamp {previous}")]
    NonMonotonicTimestamp {
        bar_index: usize,
        previous: i64,
        current: i64,
    },

    #[error("bar range {start}..{end} is not valid for a series of {len} bars")]
    InvalidRange { start: usize, end: usize, len: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CsvError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },
}
