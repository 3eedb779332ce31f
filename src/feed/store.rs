use std::collections::VecDeque;
use serde::Serialize;
use crate::config::FeedConfig;
use crate::scope::{Column, ScopeError};

/// One generated batch: `data` is sub-frames x channels.
#[derive(Clone, Debug, PartialEq)]
pub struct FeedBatch {
    pub idx: u64,
    pub query: f64,
    pub query2: f64,
    pub data: Vec<Vec<f64>>,
}

/// Response body of the feed: column-oriented, each column keyed by row
/// index like a dataframe dump.
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub idx: Column<u64>,
    pub query: Column<f64>,
    pub query2: Column<f64>,
    pub data: Column<Vec<Vec<f64>>>,
}
impl Snapshot {
    pub fn rows(&self) -> usize {
        match &self.query {
            Column::Rows(rows) => rows.len(),
            Column::Indexed(map) => map.len(),
        }
    }
    pub fn to_json(&self) -> Result<String, ScopeError> {
        serde_json::to_string(self)
            .map_err(|e| ScopeError::Render(format!("snapshot encoding failed: {e}")))
    }
}
fn indexed<T>(rows: impl Iterator<Item = T>) -> Column<T> {
    Column::Indexed(rows.enumerate().map(|(i, v)| (i.to_string(), v)).collect())
}

/// Recent batches, bounded by `limit`. Shrinking happens in bulk: once the
/// store holds more than 1.5x `limit`, only the newest `limit / 2` survive.
pub struct BatchStore {
    batches: VecDeque<FeedBatch>,
    limit: usize,
}
impl BatchStore {
    pub fn new(limit: usize) -> Result<Self, ScopeError> {
        if limit < 2 {
            return Err(ScopeError::Config(format!(
                "store limit must be at least 2 batches, got {limit}"
            )));
        }
        Ok(Self {
            batches: VecDeque::with_capacity(limit),
            limit,
        })
    }
    pub fn from_config(config: &FeedConfig) -> Result<Self, ScopeError> {
        Self::new(config.batch_limit())
    }
    pub fn limit(&self) -> usize {
        self.limit
    }
    fn overflow(&self) -> usize {
        self.limit + self.limit / 2
    }
    pub fn len(&self) -> usize {
        self.batches.len()
    }
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
    pub fn push(&mut self, batch: FeedBatch) {
        if self.batches.len() > self.overflow() {
            let keep = self.limit / 2;
            let excess = self.batches.len() - keep;
            self.batches.drain(..excess);
            log::warn!(
                "store beyond 1.5x its limit of {} batches, shrunk to the newest {keep}",
                self.limit
            );
        }
        self.batches.push_back(batch);
    }
    pub fn newest(&self) -> Option<&FeedBatch> {
        self.batches.back()
    }
    /// The newest `n` batches, oldest first.
    pub fn latest(&self, n: usize) -> Snapshot {
        let skip = self.batches.len().saturating_sub(n);
        let picked = || self.batches.iter().skip(skip);
        Snapshot {
            idx: indexed(picked().map(|b| b.idx)),
            query: indexed(picked().map(|b| b.query)),
            query2: indexed(picked().map(|b| b.query2)),
            data: indexed(picked().map(|b| b.data.clone())),
        }
    }
}
