use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CsvError, ExecutionError};

/// One OHLCV bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// A bar where every price equals `price`.
    pub fn flat(timestamp: i64, price: f64) -> Self {
        Self::new(timestamp, price, price, price, price, 0.0)
    }
}

/// Struct-of-Arrays candle storage for one symbol and timeframe.
///
/// All vectors are parallel: index `i` across all fields is one candle.
/// The store is filled once by the data collaborator and only read afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandleStore {
    pub symbol: String,
    pub timestamps: Vec<i64>,
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
    pub volume: Vec<f64>,
}

impl CandleStore {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    pub fn with_capacity(symbol: impl Into<String>, cap: usize) -> Self {
        Self {
            symbol: symbol.into(),
            timestamps: Vec::with_capacity(cap),
            open: Vec::with_capacity(cap),
            high: Vec::with_capacity(cap),
            low: Vec::with_capacity(cap),
            close: Vec::with_capacity(cap),
            volume: Vec::with_capacity(cap),
        }
    }

    pub fn from_candles(symbol: impl Into<String>, candles: &[Candle]) -> Self {
        let mut store = Self::with_capacity(symbol, candles.len());
        for c in candles {
            store.push_candle(*c);
        }
        store
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn push(&mut self, ts: i64, o: f64, h: f64, l: f64, c: f64, v: f64) {
        self.timestamps.push(ts);
        self.open.push(o);
        self.high.push(h);
        self.low.push(l);
        self.close.push(c);
        self.volume.push(v);
    }

    pub fn push_candle(&mut self, c: Candle) {
        self.push(c.timestamp, c.open, c.high, c.low, c.close, c.volume);
    }

    /// Copy bar `i` out of the columns. Panics if `i` is out of bounds.
    #[inline]
    pub fn get(&self, i: usize) -> Candle {
        Candle {
            timestamp: self.timestamps[i],
            open: self.open[i],
            high: self.high[i],
            low: self.low[i],
            close: self.close[i],
            volume: self.volume[i],
        }
    }

    /// Check bar `i` for corrupt values before it is simulated.
    ///
    /// Prices and volume must be finite and non-negative, and the timestamp
    /// must be strictly greater than `prev_ts` when one is given.
    pub fn check_bar(&self, i: usize, prev_ts: Option<i64>) -> Result<(), ExecutionError> {
        let fields = [
            ("open", self.open[i]),
            ("high", self.high[i]),
            ("low", self.low[i]),
            ("close", self.close[i]),
            ("volume", self.volume[i]),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(ExecutionError::NonFinite {
                    bar_index: i,
                    field,
                    value,
                });
            }
            if value < 0.0 {
                return Err(ExecutionError::Negative {
                    bar_index: i,
                    field,
                    value,
                });
            }
        }
        if let Some(previous) = prev_ts {
            let current = self.timestamps[i];
            if current <= previous {
                return Err(ExecutionError::NonMonotonicTimestamp {
                    bar_index: i,
                    previous,
                    current,
                });
            }
        }
        Ok(())
    }

    /// Check every bar. Used by loaders that want to reject a file up front.
    pub fn check_all(&self) -> Result<(), ExecutionError> {
        if self.is_empty() {
            return Err(ExecutionError::EmptySeries);
        }
        let mut prev = None;
        for i in 0..self.len() {
            self.check_bar(i, prev)?;
            prev = Some(self.timestamps[i]);
        }
        Ok(())
    }

    /// Read-only view of bars `0..=end`.
    #[inline]
    pub fn history(&self, end: usize) -> HistoryWindow<'_> {
        self.history_from(0, end)
    }

    /// Read-only view of bars `start..=end`. Bars before `start` are not
    /// visible through the window.
    #[inline]
    pub fn history_from(&self, start: usize, end: usize) -> HistoryWindow<'_> {
        debug_assert!(start <= end && end < self.len());
        HistoryWindow {
            store: self,
            start,
            end,
        }
    }

    /// Dollar volume of bar `i`.
    #[inline]
    pub fn dollar_volume(&self, i: usize) -> f64 {
        self.close[i] * self.volume[i]
    }

    /// Get a sub-slice view as a new CandleStore (copies data).
    pub fn slice(&self, start: usize, end: usize) -> CandleStore {
        let end = end.min(self.len());
        let start = start.min(end);
        CandleStore {
            symbol: self.symbol.clone(),
            timestamps: self.timestamps[start..end].to_vec(),
            open: self.open[start..end].to_vec(),
            high: self.high[start..end].to_vec(),
            low: self.low[start..end].to_vec(),
            close: self.close[start..end].to_vec(),
            volume: self.volume[start..end].to_vec(),
        }
    }

    /// Load candles from a CSV file using memory-mapped I/O.
    ///
    /// Expected CSV format: timestamp,open,high,low,close,volume (header row
    /// required). Rows keep file order; ordering problems surface when the
    /// series is simulated.
    pub fn from_csv(symbol: impl Into<String>, path: &Path) -> Result<Self, CsvError> {
        let file = std::fs::File::open(path).map_err(|e| CsvError::Io(e.to_string()))?;
        let mmap =
            unsafe { memmap2::Mmap::map(&file) }.map_err(|e| CsvError::Io(e.to_string()))?;
        Self::parse_csv_bytes(symbol, &mmap[..])
    }

    /// Parse CSV from raw bytes (testable without files).
    pub fn parse_csv_bytes(symbol: impl Into<String>, data: &[u8]) -> Result<Self, CsvError> {
        // ~50 bytes per row
        let mut store = Self::with_capacity(symbol, data.len() / 50);
        let len = data.len();

        let mut pos = match memchr::memchr(b'\n', data) {
            Some(nl) => nl + 1,
            None => return Ok(store),
        };
        let mut line_no = 1;

        while pos < len {
            line_no += 1;
            let line_end = memchr::memchr(b'\n', &data[pos..])
                .map(|i| pos + i)
                .unwrap_or(len);

            let line = &data[pos..line_end];
            let line = line.strip_suffix(b"\r").unwrap_or(line);

            if !line.is_empty() {
                Self::parse_row(line, line_no, &mut store)?;
            }

            pos = line_end + 1;
        }

        Ok(store)
    }

    fn parse_row(line: &[u8], line_no: usize, store: &mut CandleStore) -> Result<(), CsvError> {
        let mut fields: [&[u8]; 6] = [&[]; 6];
        let mut count = 0;
        for field in line.split(|&b| b == b',') {
            if count == 6 {
                count += 1;
                break;
            }
            fields[count] = field;
            count += 1;
        }
        if count != 6 {
            return Err(CsvError::Parse {
                line: line_no,
                reason: format!("expected 6 columns, got {}", count),
            });
        }

        let ts = parse_timestamp(fields[0]).map_err(|reason| CsvError::Parse {
            line: line_no,
            reason,
        })?;

        let mut values = [0.0f64; 5];
        let names = ["open", "high", "low", "close", "volume"];
        for (k, name) in names.iter().enumerate() {
            values[k] = fast_float::parse(fields[k + 1]).map_err(|_| CsvError::Parse {
                line: line_no,
                reason: format!("bad {}", name),
            })?;
        }

        store.push(ts, values[0], values[1], values[2], values[3], values[4]);
        Ok(())
    }
}

/// The bars a strategy may look at when deciding on bar `end`.
///
/// Every accessor covers `start..=end`, so a strategy cannot read a bar that
/// has not closed yet nor one before the run's history start.
#[derive(Debug, Clone, Copy)]
pub struct HistoryWindow<'a> {
    store: &'a CandleStore,
    start: usize,
    end: usize,
}

impl<'a> HistoryWindow<'a> {
    /// Index of the current (last visible) bar in the underlying series.
    #[inline]
    pub fn current_index(&self) -> usize {
        self.end
    }

    /// Index of the first visible bar in the underlying series.
    #[inline]
    pub fn start_index(&self) -> usize {
        self.start
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start + 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        false
    }

    #[inline]
    pub fn timestamps(&self) -> &'a [i64] {
        &self.store.timestamps[self.start..=self.end]
    }

    #[inline]
    pub fn opens(&self) -> &'a [f64] {
        &self.store.open[self.start..=self.end]
    }

    #[inline]
    pub fn highs(&self) -> &'a [f64] {
        &self.store.high[self.start..=self.end]
    }

    #[inline]
    pub fn lows(&self) -> &'a [f64] {
        &self.store.low[self.start..=self.end]
    }

    #[inline]
    pub fn closes(&self) -> &'a [f64] {
        &self.store.close[self.start..=self.end]
    }

    #[inline]
    pub fn volumes(&self) -> &'a [f64] {
        &self.store.volume[self.start..=self.end]
    }

    #[inline]
    pub fn last(&self) -> Candle {
        self.store.get(self.end)
    }

    #[inline]
    pub fn last_close(&self) -> f64 {
        self.store.close[self.end]
    }
}

/// Parse an ISO8601 (`2025-01-01T00:00:00Z` / `+00:00`) or plain integer
/// timestamp into Unix epoch seconds.
fn parse_timestamp(bytes: &[u8]) -> Result<i64, String> {
    if !bytes.contains(&b'T') && !bytes.contains(&b'-') {
        if let Ok(ts) = fast_float::parse::<f64, _>(bytes) {
            return Ok(ts as i64);
        }
    }

    if bytes.len() < 19 {
        return Err(format!(
            "timestamp too short: {}",
            String::from_utf8_lossy(bytes)
        ));
    }

    let s = std::str::from_utf8(bytes).map_err(|_| "non-UTF8 timestamp".to_string())?;

    let year: i32 = s[0..4].parse().map_err(|_| "bad year".to_string())?;
    let month: u32 = s[5..7].parse().map_err(|_| "bad month".to_string())?;
    let day: u32 = s[8..10].parse().map_err(|_| "bad day".to_string())?;
    let hour: u32 = s[11..13].parse().map_err(|_| "bad hour".to_string())?;
    let minute: u32 = s[14..16].parse().map_err(|_| "bad minute".to_string())?;
    let second: u32 = s[17..19].parse().map_err(|_| "bad second".to_string())?;

    let days = days_from_civil(year, month, day);
    Ok(days * 86400 + hour as i64 * 3600 + minute as i64 * 60 + second as i64)
}

/// Convert civil date to days since Unix epoch (Howard Hinnant algorithm).
fn days_from_civil(year: i32, month: u32, day: u32) -> i64 {
    let y = if month <= 2 { year - 1 } else { year } as i64;
    let m = if month <= 2 {
        month as i64 + 9
    } else {
        month as i64 - 3
    };
    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = (y - era * 400) as u64;
    let doy = (153 * m as u64 + 2) / 5 + day as u64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146097 + doe as i64 - 719468
}
