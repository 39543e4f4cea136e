use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::interval::Interval;

/// One OHLCV bar.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// Historical bars for one symbol at one interval.
///
/// Bars are always in non-decreasing timestamp order. An empty series means
/// no data was available; it is never used to signal an error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub symbol: String,
    pub interval: Interval,
    bars: Vec<Bar>,
}

impl Series {
    /// Build a series, sorting the bars by timestamp.
    pub fn new(symbol: impl Into<String>, interval: Interval, mut bars: Vec<Bar>) -> Self {
        bars.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        Self {
            symbol: symbol.into(),
            interval,
            bars,
        }
    }

    pub fn empty(symbol: impl Into<String>, interval: Interval) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            bars: Vec::new(),
        }
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Keep only bars inside `[start, end]`.
    pub fn within(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.bars
            .retain(|bar| bar.timestamp >= start && bar.timestamp <= end);
        self
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }
}
