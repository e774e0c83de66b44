//! Multi-symbol merge.
//!
//! Streams bars from per-symbol series in global timestamp order. Ties across
//! symbols break by lexical symbol order, so replay never depends on input
//! interleaving or hash order.

use super::DataError;
use crate::domain::Bar;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, VecDeque};

/// K-way merge over per-symbol bar series.
///
/// Yields `Err` once on the first contract violation and `None` after that.
#[derive(Debug)]
pub struct BarFeed {
    series: BTreeMap<String, VecDeque<Bar>>,
    heads: BinaryHeap<Reverse<(DateTime<Utc>, String)>>,
    last_seen: BTreeMap<String, DateTime<Utc>>,
    failed: bool,
}

impl BarFeed {
    /// Group bars by symbol, keeping each symbol's input order.
    pub fn new(bars: Vec<Bar>) -> Self {
        let mut series: BTreeMap<String, VecDeque<Bar>> = BTreeMap::new();
        for bar in bars {
            series.entry(bar.symbol.clone()).or_default().push_back(bar);
        }
        let heads = series
            .iter()
            .filter_map(|(symbol, bars)| bars.front().map(|b| Reverse((b.timestamp, symbol.clone()))))
            .collect();
        Self {
            series,
            heads,
            last_seen: BTreeMap::new(),
            failed: false,
        }
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    /// Bars not yet pulled.
    pub fn remaining(&self) -> usize {
        self.series.values().map(VecDeque::len).sum()
    }

    fn check(&self, bar: &Bar) -> Result<(), DataError> {
        bar.validate()?;
        if let Some(&previous) = self.last_seen.get(&bar.symbol) {
            if bar.timestamp == previous {
                return Err(DataError::Duplicate {
                    symbol: bar.symbol.clone(),
                    timestamp: bar.timestamp,
                });
            }
            if bar.timestamp < previous {
                return Err(DataError::OutOfOrder {
                    symbol: bar.symbol.clone(),
                    previous,
                    timestamp: bar.timestamp,
                });
            }
        }
        Ok(())
    }
}

impl Iterator for BarFeed {
    type Item = Result<Bar, DataError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let Reverse((_, symbol)) = self.heads.pop()?;
        let queue = self.series.get_mut(&symbol)?;
        let bar = queue.pop_front()?;
        if let Some(next) = queue.front() {
            self.heads.push(Reverse((next.timestamp, symbol.clone())));
        }

        if let Err(err) = self.check(&bar) {
            self.failed = true;
            return Some(Err(err));
        }
        self.last_seen.insert(symbol, bar.timestamp);
        Some(Ok(bar))
    }
}
