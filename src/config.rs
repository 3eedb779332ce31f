// src/config.rs
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use crate::scope::mapper::ValueDomain;
use crate::scope::render::{Color, DEFAULT_BACKGROUND};
use crate::scope::ScopeError;

pub const CONFIG_ENV: &str = "SWEEPSCOPE_CONFIG";
pub const FEED_CONFIG_ENV: &str = "SWEEPSCOPE_FEED_CONFIG";
/// Largest accepted canvas side, in pixels.
pub const MAX_CANVAS_SIDE: u32 = 16_384;
/// Longest accepted backoff delay: one day.
pub const MAX_BACKOFF_MS: u64 = 86_400_000;

/// Viewer settings. Every field has a default, so a partial file is fine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScopeConfig {
    /// Width of the sweep window.
    pub display_period_seconds: f64,
    pub poll_interval_seconds: f64,
    /// Requested throughput; one request asks for period * rate samples.
    pub samples_per_second: f64,
    pub background_color: Color,
    pub endpoint: String,
    pub access_token: String,
    pub sub_frame_interval_seconds: f64,
    pub guard_band_fraction: f64,
    pub value_domain: [f64; 2],
    pub request_timeout_seconds: Option<f64>,
    pub backoff: Option<BackoffConfig>,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Headless mode: render each cycle into this PNG instead of a window.
    pub snapshot_path: Option<PathBuf>,
}
impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            display_period_seconds: 4.0,
            poll_interval_seconds: 0.1,
            samples_per_second: 25.0,
            background_color: DEFAULT_BACKGROUND,
            endpoint: "ws://localhost:23334/".to_owned(),
            access_token: "123456".to_owned(),
            sub_frame_interval_seconds: 0.001,
            guard_band_fraction: 0.01,
            value_domain: [0.0, -2000.0],
            request_timeout_seconds: Some(5.0),
            backoff: None,
            canvas_width: 900,
            canvas_height: 400,
            snapshot_path: None,
        }
    }
}
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackoffConfig {
    pub initial_ms: u64,
    pub max_ms: u64,
    /// Fraction of the delay that is randomized, 0..=1.
    #[serde(default)]
    pub jitter: f64,
}
fn positive(name: &str, value: f64) -> Result<(), ScopeError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ScopeError::Config(format!("{name} must be > 0, got {value}")))
    }
}
/// A positive number of seconds that is representable and non-zero as a `Duration`.
fn seconds(name: &str, value: f64) -> Result<Duration, ScopeError> {
    positive(name, value)?;
    let duration = Duration::try_from_secs_f64(value)
        .map_err(|_| ScopeError::Config(format!("{name} is out of range: {value}")))?;
    if duration.is_zero() {
        return Err(ScopeError::Config(format!("{name} is too small: {value}")));
    }
    Ok(duration)
}
impl ScopeConfig {
    pub fn validate(&self) -> Result<(), ScopeError> {
        positive("displayPeriodSeconds", self.display_period_seconds)?;
        self.poll_interval()?;
        positive("samplesPerSecond", self.samples_per_second)?;
        positive("subFrameIntervalSeconds", self.sub_frame_interval_seconds)?;
        if let Some(timeout) = self.request_timeout_seconds {
            seconds("requestTimeoutSeconds", timeout)?;
        }
        let guard = self.guard_band_fraction;
        if !(guard.is_finite() && (0.0..1.0).contains(&guard)) {
            return Err(ScopeError::Config(format!(
                "guardBandFraction must be in [0, 1), got {}",
                self.guard_band_fraction
            )));
        }
        if self.value_domain().is_degenerate() {
            return Err(ScopeError::Config(format!(
                "valueDomain {:?} has zero width",
                self.value_domain
            )));
        }
        let sides = 1..=MAX_CANVAS_SIDE;
        if !sides.contains(&self.canvas_width) || !sides.contains(&self.canvas_height) {
            return Err(ScopeError::Config(format!(
                "canvas size must be within 1..={MAX_CANVAS_SIDE}, got {}x{}",
                self.canvas_width, self.canvas_height
            )));
        }
        if let Some(backoff) = &self.backoff {
            if backoff.initial_ms == 0
                || backoff.max_ms < backoff.initial_ms
                || backoff.max_ms > MAX_BACKOFF_MS
            {
                return Err(ScopeError::Config(format!(
                    "backoff needs 0 < initialMs <= maxMs <= {MAX_BACKOFF_MS}"
                )));
            }
            if !(0.0..=1.0).contains(&backoff.jitter) {
                return Err(ScopeError::Config("backoff jitter must be in [0, 1]".into()));
            }
        }
        Ok(())
    }
    pub fn poll_interval(&self) -> Result<Duration, ScopeError> {
        seconds("pollIntervalSeconds", self.poll_interval_seconds)
    }
    /// `None` when disabled or not representable; `validate` rejects the latter.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_seconds
            .and_then(|s| seconds("requestTimeoutSeconds", s).ok())
    }
    /// Number sent with every request.
    pub fn requested_samples(&self) -> u64 {
        (self.display_period_seconds * self.samples_per_second).round() as u64
    }
    pub fn value_domain(&self) -> ValueDomain {
        ValueDomain::new(self.value_domain[0], self.value_domain[1])
    }
    /// Endpoint with the bearer token attached as a query parameter.
    pub fn access_url(&self) -> String {
        if self.access_token.is_empty() {
            return self.endpoint.clone();
        }
        let sep = if self.endpoint.contains('?') { '&' } else { '?' };
        format!("{}{}accessToken={}", self.endpoint, sep, self.access_token)
    }
}

/// Settings of the synthetic feed server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeedConfig {
    pub host: String,
    pub port: u16,
    /// Samples per second per channel.
    pub sample_rate: f64,
    /// Batch spacing in milliseconds.
    pub interval_ms: u64,
    pub channels: usize,
    /// How much history the store keeps before shrinking.
    pub limit_seconds: f64,
    /// Where the device streams its packets.
    pub device_host: String,
    pub device_port: u16,
    /// Run the synthetic device inside the feed process.
    pub spawn_device: bool,
}
impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 23334,
            sample_rate: 1000.0,
            interval_ms: 40,
            channels: 64,
            limit_seconds: 1800.0,
            device_host: "127.0.0.1".to_owned(),
            device_port: 23333,
            spawn_device: true,
        }
    }
}
impl FeedConfig {
    pub fn validate(&self) -> Result<(), ScopeError> {
        positive("sampleRate", self.sample_rate)?;
        positive("limitSeconds", self.limit_seconds)?;
        if self.interval_ms == 0 || self.channels == 0 {
            return Err(ScopeError::Config(
                "intervalMs and channels must be non-zero".into(),
            ));
        }
        if self.sub_frames() == 0 {
            return Err(ScopeError::Config(
                "intervalMs is shorter than one sample".into(),
            ));
        }
        let body = self.sub_frames().saturating_mul(self.channels).saturating_mul(4);
        if body > usize::from(u16::MAX) {
            return Err(ScopeError::Config(format!(
                "a batch of {} x {} samples does not fit one device packet",
                self.sub_frames(),
                self.channels
            )));
        }
        Ok(())
    }
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
    pub fn device_addr(&self) -> String {
        format!("{}:{}", self.device_host, self.device_port)
    }
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
    /// Samples per channel in one batch.
    pub fn sub_frames(&self) -> usize {
        (self.interval_ms as f64 * self.sample_rate / 1000.0).round() as usize
    }
    pub fn sub_frame_interval(&self) -> f64 {
        1.0 / self.sample_rate
    }
    /// Store size, in batches.
    pub fn batch_limit(&self) -> usize {
        (self.limit_seconds * 1000.0 / self.interval_ms as f64) as usize
    }
}

fn load_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ScopeError> {
    let text = fs::read_to_string(path).map_err(|e| {
        ScopeError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&text)
        .map_err(|e| ScopeError::Config(format!("failed to parse {}: {e}", path.display())))
}
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ScopeConfig, ScopeError> {
    let config: ScopeConfig = load_json(path.as_ref())?;
    config.validate()?;
    Ok(config)
}
pub fn load_feed_config<P: AsRef<Path>>(path: P) -> Result<FeedConfig, ScopeError> {
    let config: FeedConfig = load_json(path.as_ref())?;
    config.validate()?;
    Ok(config)
}
/// Loads from `$SWEEPSCOPE_CONFIG`, or returns defaults when it is unset.
pub fn config_from_env() -> Result<ScopeConfig, ScopeError> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => load_config(PathBuf::from(path)),
        None => Ok(ScopeConfig::default()),
    }
}
pub fn feed_config_from_env() -> Result<FeedConfig, ScopeError> {
    match std::env::var_os(FEED_CONFIG_ENV) {
        Some(path) => load_feed_config(PathBuf::from(path)),
        None => Ok(FeedConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_setup() {
        let config = ScopeConfig::default();
        config.validate().unwrap();
        assert_eq!(config.requested_samples(), 100);
        assert_eq!(config.poll_interval().unwrap(), Duration::from_millis(100));
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.access_url(), "ws://localhost:23334/?accessToken=123456");
        let feed = FeedConfig::default();
        feed.validate().unwrap();
        assert_eq!(feed.sub_frames(), 40);
        assert_eq!(feed.batch_limit(), 45_000);
        assert_eq!(feed.device_addr(), "127.0.0.1:23333");
    }

    #[test]
    fn feed_batches_must_fit_a_device_packet() {
        let feed: FeedConfig =
            serde_json::from_str(r#"{"channels": 512, "devicePort": 9000}"#).unwrap();
        assert_eq!(feed.device_port, 9000);
        assert!(feed.spawn_device);
        assert!(matches!(feed.validate(), Err(ScopeError::Config(_))));
        let feed: FeedConfig = serde_json::from_str(r#"{"sampleRate": 1e300}"#).unwrap();
        assert!(feed.validate().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ScopeConfig = serde_json::from_str(
            r##"{"displayPeriodSeconds": 2.0, "backgroundColor": "#101010",
                "backoff": {"initialMs": 100, "maxMs": 2000}}"##,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.display_period_seconds, 2.0);
        assert_eq!(config.background_color, Color::rgb(0x10, 0x10, 0x10));
        assert_eq!(config.samples_per_second, 25.0);
        assert_eq!(config.backoff.unwrap().jitter, 0.0);
    }

    #[test]
    fn rejects_bad_values() {
        let bad = [
            r#"{"displayPeriodSeconds": 0}"#,
            r#"{"pollIntervalSeconds": -1}"#,
            r#"{"valueDomain": [5, 5]}"#,
            r#"{"guardBandFraction": 1.5}"#,
            r#"{"backoff": {"initialMs": 500, "maxMs": 100}}"#,
            r#"{"backoff": {"initialMs": 1, "maxMs": 18446744073709551615}}"#,
            r#"{"pollIntervalSeconds": 1e-12}"#,
            r#"{"pollIntervalSeconds": 1e20}"#,
            r#"{"requestTimeoutSeconds": 1e20}"#,
            r#"{"requestTimeoutSeconds": 1e-12}"#,
            r#"{"canvasWidth": 0}"#,
            r#"{"canvasWidth": 4000000000, "canvasHeight": 4000000000}"#,
        ];
        for text in bad {
            let config: ScopeConfig = serde_json::from_str(text).unwrap();
            assert!(config.validate().is_err(), "{text}");
        }
        assert!(serde_json::from_str::<ScopeConfig>(r#"{"backgroundColor": "red"}"#).is_err());
    }

    #[test]
    fn token_joins_existing_query() {
        let config = ScopeConfig {
            endpoint: "ws://scope:1/feed?v=2".into(),
            access_token: "abc".into(),
            ..ScopeConfig::default()
        };
        assert_eq!(config.access_url(), "ws://scope:1/feed?v=2&accessToken=abc");
    }

    #[test]
    fn loads_from_file() {
        let name = format!("sweepscope-config-{}.json", std::process::id());
        let path = std::env::temp_dir().join(name);
        fs::write(&path, r#"{"samplesPerSecond": 50}"#).unwrap();
        let config = load_config(&path).unwrap();
        assert_eq!(config.requested_samples(), 200);
        fs::remove_file(&path).ok();
        assert!(matches!(load_config(&path), Err(ScopeError::Config(_))));
    }
}
