use crate::scope::ScopeError;
use crate::types::SampleFrame;

/// Width of the gap left at the sweep line, as a fraction of the period.
pub const DEFAULT_GUARD_BAND_FRACTION: f64 = 0.01;

/// Where the write head is this cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepState {
    pub max: f64,
    pub sweep_pos: f64,
    pub gap: f64,
}

/// Frames split around the sweep line. Both groups are ordered by phase.
#[derive(Clone, Debug)]
pub struct Partition {
    pub state: SweepState,
    /// Already passed by the sweep this period (left of the line).
    pub old: Vec<SampleFrame>,
    /// Beyond the guard band, left over from the previous pass.
    pub new: Vec<SampleFrame>,
    /// Frames that fell inside the guard band.
    pub dropped: usize,
}

#[derive(Clone, Copy, Debug)]
pub struct SweepPartitioner {
    seconds: f64,
    guard_fraction: f64,
}
impl SweepPartitioner {
    pub fn new(seconds: f64) -> Result<Self, ScopeError> {
        if !(seconds.is_finite() && seconds > 0.0) {
            return Err(ScopeError::InvalidDisplayPeriod(seconds));
        }
        Ok(Self {
            seconds,
            guard_fraction: DEFAULT_GUARD_BAND_FRACTION,
        })
    }
    pub fn with_guard_band(mut self, fraction: f64) -> Self {
        self.guard_fraction = fraction.max(0.0);
        self
    }
    pub fn seconds(&self) -> f64 {
        self.seconds
    }
    pub fn sweep_state(&self, frames: &[SampleFrame]) -> Result<SweepState, ScopeError> {
        if frames.is_empty() {
            return Err(ScopeError::EmptyBuffer);
        }
        let max = frames
            .iter()
            .map(|f| f.timestamp)
            .fold(f64::NEG_INFINITY, f64::max);
        Ok(SweepState {
            max,
            sweep_pos: max % self.seconds,
            gap: self.seconds * self.guard_fraction,
        })
    }
    pub fn partition(&self, frames: Vec<SampleFrame>) -> Result<Partition, ScopeError> {
        let state = self.sweep_state(&frames)?;
        let mut old = Vec::new();
        let mut new = Vec::new();
        let mut dropped = 0;
        for frame in frames {
            let phase = frame.phase(self.seconds);
            // Strict comparisons: a frame exactly on either edge of the band is dropped.
            if phase < state.sweep_pos {
                old.push((phase, frame));
            } else if phase > state.sweep_pos + state.gap {
                new.push((phase, frame));
            } else {
                dropped += 1;
            }
        }
        Ok(Partition {
            state,
            old: sort_by_phase(old),
            new: sort_by_phase(new),
            dropped,
        })
    }
}
/// Partitions with the default guard band.
pub fn partition(frames: Vec<SampleFrame>, seconds: f64) -> Result<Partition, ScopeError> {
    SweepPartitioner::new(seconds)?.partition(frames)
}
fn sort_by_phase(mut group: Vec<(f64, SampleFrame)>) -> Vec<SampleFrame> {
    // sort_by is stable, so equal phases keep arrival order.
    group.sort_by(|a, b| a.0.total_cmp(&b.0));
    group.into_iter().map(|(_, frame)| frame).collect()
}
