use std::time::{SystemTime, UNIX_EPOCH};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::config::FeedConfig;
use crate::feed::codec::encode_packet;
use crate::scope::ScopeError;

/// Seconds since the Unix epoch, as the feed stamps its batches.
pub fn unix_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Pseudo device: uniform integer noise in [-1000, 1000) on every channel.
pub struct SyntheticSource {
    channels: usize,
    sub_frames: usize,
    next_n: u16,
    rng: StdRng,
}
impl SyntheticSource {
    pub fn new(channels: usize, sub_frames: usize) -> Self {
        Self::with_rng(channels, sub_frames, StdRng::from_entropy())
    }
    /// Reproducible noise, for tests.
    pub fn with_seed(channels: usize, sub_frames: usize, seed: u64) -> Self {
        Self::with_rng(channels, sub_frames, StdRng::seed_from_u64(seed))
    }
    fn with_rng(channels: usize, sub_frames: usize, rng: StdRng) -> Self {
        Self {
            channels,
            sub_frames,
            next_n: 0,
            rng,
        }
    }
    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(config.channels, config.sub_frames())
    }
    pub fn generate(&mut self) -> Vec<Vec<f64>> {
        (0..self.sub_frames)
            .map(|_| {
                (0..self.channels)
                    .map(|_| self.rng.gen_range(-1000i32..1000) as f64)
                    .collect()
            })
            .collect()
    }
    /// Generates, numbers and frames the next packet, stamped with the
    /// send time. The counter wraps like the 16-bit header field.
    pub fn next_packet(&mut self) -> Result<Vec<u8>, ScopeError> {
        let data = self.generate();
        let n = self.next_n;
        self.next_n = n.wrapping_add(1);
        encode_packet(n, unix_seconds(), &data)
    }
}
