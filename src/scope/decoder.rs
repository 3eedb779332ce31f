use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::scope::ScopeError;
use crate::types::{DecodedBatch, LatencySample, SampleFrame};

/// Spacing of sub-frames inside a batch (1 kHz source).
pub const DEFAULT_SUB_FRAME_INTERVAL: f64 = 0.001;

/// A payload column: either a plain array or an object keyed by row index
/// (`{"0": .., "1": ..}`), the way a column-oriented dataframe dump looks.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Column<T> {
    Rows(Vec<T>),
    Indexed(BTreeMap<String, T>),
}
impl<T> Column<T> {
    pub fn into_rows(self, name: &str) -> Result<Vec<T>, ScopeError> {
        match self {
            Column::Rows(rows) => Ok(rows),
            Column::Indexed(map) => {
                let mut keyed = Vec::with_capacity(map.len());
                for (key, value) in map {
                    let row: usize = key.parse().map_err(|_| {
                        ScopeError::MalformedPayload(format!(
                            "column `{name}` has non-numeric row key `{key}`"
                        ))
                    })?;
                    keyed.push((row, value));
                }
                keyed.sort_by_key(|(row, _)| *row);
                // Rows must be exactly 0..n so every column lines up by position.
                for (expected, (row, _)) in keyed.iter().enumerate() {
                    if *row != expected {
                        let problem = if *row < expected { "repeats" } else { "skips" };
                        return Err(ScopeError::MalformedPayload(format!(
                            "column `{name}` {problem} row {}",
                            (*row).min(expected)
                        )));
                    }
                }
                Ok(keyed.into_iter().map(|(_, value)| value).collect())
            }
        }
    }
}
impl<T> From<Vec<T>> for Column<T> {
    fn from(rows: Vec<T>) -> Self {
        Column::Rows(rows)
    }
}
/// Wire shape of one poll response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payload {
    /// batch -> sub-frame -> channel values
    pub data: Column<Vec<Vec<f64>>>,
    /// batch send timestamps
    pub query: Column<f64>,
    /// batch confirm timestamps
    pub query2: Column<f64>,
}
/// Flattens batched payloads into time-stamped frames.
#[derive(Clone, Copy, Debug)]
pub struct FrameDecoder {
    sub_interval: f64,
}
impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_SUB_FRAME_INTERVAL)
    }
}
impl FrameDecoder {
    pub fn new(sub_interval: f64) -> Self {
        Self { sub_interval }
    }
    pub fn decode(&self, raw: &str) -> Result<DecodedBatch, ScopeError> {
        let payload: Payload = serde_json::from_str(raw)?;
        self.decode_payload(payload)
    }
    pub fn decode_payload(&self, payload: Payload) -> Result<DecodedBatch, ScopeError> {
        let data = payload.data.into_rows("data")?;
        let sent = payload.query.into_rows("query")?;
        let confirmed = payload.query2.into_rows("query2")?;
        if data.len() != sent.len() || sent.len() != confirmed.len() {
            return Err(ScopeError::MalformedPayload(format!(
                "column lengths differ: data={}, query={}, query2={}",
                data.len(),
                sent.len(),
                confirmed.len()
            )));
        }
        let mut frames = Vec::with_capacity(data.iter().map(Vec::len).sum());
        let mut channels: Option<usize> = None;
        for (batch, (sub_frames, &sent_at)) in data.into_iter().zip(&sent).enumerate() {
            for (j, values) in sub_frames.into_iter().enumerate() {
                let expected = *channels.get_or_insert(values.len());
                if expected == 0 {
                    return Err(ScopeError::MalformedPayload(
                        "first frame carries no channel values".into(),
                    ));
                }
                if values.len() != expected {
                    return Err(ScopeError::MalformedPayload(format!(
                        "batch {batch} sub-frame {j} has {} channels, expected {expected}",
                        values.len()
                    )));
                }
                frames.push(SampleFrame::new(sent_at + self.sub_interval * j as f64, values));
            }
        }
        let latency = sent
            .iter()
            .zip(&confirmed)
            .map(|(&sent_at, &confirmed_at)| LatencySample {
                sent_at,
                confirmed_at,
            })
            .collect();
        Ok(DecodedBatch {
            frames,
            channels: channels.unwrap_or(0),
            latency,
        })
    }
}
