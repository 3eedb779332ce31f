// src/types.rs

/// One multi-channel sample at a source-side timestamp (seconds).
#[derive(Clone, Debug, PartialEq)]
pub struct SampleFrame {
    pub timestamp: f64,
    pub values: Vec<f64>, // one per channel
}
impl SampleFrame {
    pub fn new(timestamp: f64, values: Vec<f64>) -> Self {
        Self { timestamp, values }
    }
    /// Position of this frame inside the display period.
    pub fn phase(&self, seconds: f64) -> f64 {
        self.timestamp % seconds
    }
}

// Send/confirm pair of one source batch; diagnostics only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatencySample {
    pub sent_at: f64,
    pub confirmed_at: f64,
}
impl LatencySample {
    pub fn latency(&self) -> f64 {
        self.confirmed_at - self.sent_at
    }
}

/// Everything one payload decodes into.
#[derive(Clone, Debug, Default)]
pub struct DecodedBatch {
    pub frames: Vec<SampleFrame>,
    pub channels: usize,
    pub latency: Vec<LatencySample>,
}
impl DecodedBatch {
    pub fn mean_latency(&self) -> f64 {
        if self.latency.is_empty() {
            return f64::NAN;
        }
        self.latency.iter().map(LatencySample::latency).sum::<f64>() / self.latency.len() as f64
    }
}

/// Values shown in the diagnostics line after each cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Diagnostics {
    pub max: f64,
    pub sweep_pos: f64,
    pub mean_latency: f64,
}
impl Diagnostics {
    pub fn line(&self) -> String {
        format!(
            "{:.4} | {:.4} | {:.4}",
            self.max, self.sweep_pos, self.mean_latency
        )
    }
}
