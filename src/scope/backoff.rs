use std::time::Duration;
use rand::Rng;
use tokio::time::Instant;
use crate::config::{BackoffConfig, MAX_BACKOFF_MS};

const CEILING: Duration = Duration::from_millis(MAX_BACKOFF_MS);

/// Exponential retry delay with a cap and proportional jitter. No delay
/// exceeds one day, whatever the cap.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    jitter: f64,
}
impl Backoff {
    pub fn new(initial: Duration, max: Duration, jitter: f64) -> Self {
        let initial = initial.min(CEILING);
        Self {
            initial,
            max: max.max(initial).min(CEILING),
            jitter: jitter.clamp(0.0, 1.0),
        }
    }
    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_ms),
            Duration::from_millis(config.max_ms),
            config.jitter,
        )
    }
    /// Delay after `failures` consecutive failures, before jitter.
    pub fn base_delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(failures - 1).unwrap_or(u32::MAX);
        self.initial
            .checked_mul(factor)
            .unwrap_or(self.max)
            .min(self.max)
    }
    pub fn delay<R: Rng + ?Sized>(&self, failures: u32, rng: &mut R) -> Duration {
        let base = self.base_delay(failures);
        if self.jitter == 0.0 || base.is_zero() {
            return base;
        }
        let spread = rng.gen_range(-self.jitter..=self.jitter);
        base.mul_f64(1.0 + spread).min(self.max)
    }
}

/// Failure bookkeeping shared by the ticks of one schedule.
#[derive(Clone, Debug, Default)]
pub struct BackoffState {
    policy: Option<Backoff>,
    failures: u32,
    resume_at: Option<Instant>,
}
impl BackoffState {
    pub fn new(policy: Option<Backoff>) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }
    pub fn failures(&self) -> u32 {
        self.failures
    }
    /// True while a previous failure asks us to hold off.
    pub fn should_skip(&self, now: Instant) -> bool {
        self.resume_at.is_some_and(|at| now < at)
    }
    /// Returns the wait imposed by this failure, if backoff is enabled.
    pub fn record_failure(&mut self, now: Instant) -> Option<Duration> {
        self.failures = self.failures.saturating_add(1);
        let policy = self.policy?;
        let wait = policy.delay(self.failures, &mut rand::thread_rng());
        self.resume_at = now.checked_add(wait);
        Some(wait)
    }
    pub fn record_success(&mut self) {
        self.failures = 0;
        self.resume_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn doubles_up_to_the_cap() {
        let backoff = Backoff::new(ms(100), ms(1000), 0.0);
        let delays: Vec<_> = (0..7).map(|n| backoff.base_delay(n)).collect();
        assert_eq!(
            delays,
            vec![ms(0), ms(100), ms(200), ms(400), ms(800), ms(1000), ms(1000)]
        );
        assert_eq!(backoff.base_delay(200), ms(1000));
    }

    #[test]
    fn jitter_stays_in_bounds() {
        let backoff = Backoff::new(ms(100), ms(1000), 0.25);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let d = backoff.delay(2, &mut rng);
            assert!(d >= ms(150) && d <= ms(250), "{d:?}");
            assert!(backoff.delay(10, &mut rng) <= ms(1000));
        }
    }

    #[test]
    fn state_skips_until_resume() {
        let mut state = BackoffState::new(Some(Backoff::new(ms(100), ms(400), 0.0)));
        let now = Instant::now();
        assert!(!state.should_skip(now));
        assert_eq!(state.record_failure(now), Some(ms(100)));
        assert!(state.should_skip(now + ms(50)));
        assert!(!state.should_skip(now + ms(100)));
        assert_eq!(state.record_failure(now), Some(ms(200)));
        state.record_success();
        assert_eq!(state.failures(), 0);
        assert!(!state.should_skip(now));
    }

    #[test]
    fn huge_settings_are_capped_at_a_day() {
        let backoff = Backoff::new(Duration::from_secs(u64::MAX), Duration::MAX, 0.0);
        assert_eq!(backoff.base_delay(1), CEILING);
        assert_eq!(backoff.base_delay(40), CEILING);
        let mut state = BackoffState::new(Some(backoff));
        let now = Instant::now();
        assert_eq!(state.record_failure(now), Some(CEILING));
        assert!(state.should_skip(now + Duration::from_secs(3600)));
    }

    #[test]
    fn disabled_state_never_skips() {
        let mut state = BackoffState::new(None);
        let now = Instant::now();
        assert_eq!(state.record_failure(now), None);
        assert_eq!(state.failures(), 1);
        assert!(!state.should_skip(now));
    }
}
