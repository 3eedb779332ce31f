use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::{Instant, MissedTickBehavior};
use crate::config::ScopeConfig;
use crate::scope::backoff::{Backoff, BackoffState};
use crate::scope::pipeline::SweepPipeline;
use crate::scope::render::Screen;
use crate::scope::source::Transport;
use crate::scope::ScopeError;
use crate::types::Diagnostics;

fn lock<X>(mutex: &Mutex<X>) -> MutexGuard<'_, X> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owned handle of one repeating schedule, returned by [`Poller::start`].
#[derive(Debug)]
pub struct ScheduleHandle {
    id: u64,
    abort: AbortHandle,
}
impl ScheduleHandle {
    pub fn id(&self) -> u64 {
        self.id
    }
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// What every tick of a schedule needs.
struct CycleContext<T, S> {
    transport: Arc<T>,
    screen: Arc<Mutex<S>>,
    pipeline: Arc<SweepPipeline>,
    sample_count: u64,
    issued: Arc<AtomicU64>,
    presented: Arc<AtomicU64>,
    backoff: Arc<Mutex<BackoffState>>,
}
impl<T, S> Clone for CycleContext<T, S> {
    fn clone(&self) -> Self {
        Self {
            transport: Arc::clone(&self.transport),
            screen: Arc::clone(&self.screen),
            pipeline: Arc::clone(&self.pipeline),
            sample_count: self.sample_count,
            issued: Arc::clone(&self.issued),
            presented: Arc::clone(&self.presented),
            backoff: Arc::clone(&self.backoff),
        }
    }
}

/// Drives poll → decode → partition → draw on a fixed interval.
///
/// At most one schedule is active. Every tick is tagged with a sequence
/// number; a response older than the last one drawn is discarded, so slow
/// responses can never overwrite fresher ones.
pub struct Poller<T, S> {
    transport: Arc<T>,
    screen: Arc<Mutex<S>>,
    pipeline: Arc<SweepPipeline>,
    interval: Duration,
    sample_count: u64,
    backoff: Option<Backoff>,
    schedules: u64,
    active: Option<(u64, AbortHandle)>,
    issued: Arc<AtomicU64>,
    presented: Arc<AtomicU64>,
}
impl<T: Transport, S: Screen + Send + 'static> Poller<T, S> {
    pub fn new(
        transport: T,
        screen: Arc<Mutex<S>>,
        pipeline: SweepPipeline,
        interval: Duration,
        sample_count: u64,
    ) -> Self {
        Self {
            transport: Arc::new(transport),
            screen,
            pipeline: Arc::new(pipeline),
            interval,
            sample_count,
            backoff: None,
            schedules: 0,
            active: None,
            issued: Arc::new(AtomicU64::new(0)),
            presented: Arc::new(AtomicU64::new(0)),
        }
    }
    pub fn from_config(
        config: &ScopeConfig,
        transport: T,
        screen: Arc<Mutex<S>>,
    ) -> Result<Self, ScopeError> {
        config.validate()?;
        let pipeline = SweepPipeline::from_config(config)?;
        Ok(Self::new(
            transport,
            screen,
            pipeline,
            config.poll_interval()?,
            config.requested_samples(),
        )
        .with_backoff(config.backoff.as_ref().map(Backoff::from_config)))
    }
    pub fn with_backoff(mut self, backoff: Option<Backoff>) -> Self {
        self.backoff = backoff;
        self
    }
    pub fn screen(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.screen)
    }
    /// Sequence number of the last response that was drawn (0 = none yet).
    pub fn last_presented(&self) -> u64 {
        self.presented.load(Ordering::SeqCst)
    }
    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|(_, abort)| !abort.is_finished())
    }
    /// Starts polling, replacing any schedule that is already running.
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> ScheduleHandle {
        if let Some((id, abort)) = self.active.take() {
            abort.abort();
            log::info!("schedule {id} replaced");
        }
        self.schedules += 1;
        let id = self.schedules;
        let task = tokio::spawn(run_schedule(id, self.interval, self.context()));
        self.active = Some((id, task.abort_handle()));
        log::info!(
            "schedule {id} started: {} samples every {:?}",
            self.sample_count,
            self.interval
        );
        ScheduleHandle {
            id,
            abort: task.abort_handle(),
        }
    }
    /// Stops the schedule. Requests already in flight still complete.
    pub fn stop(&mut self, handle: ScheduleHandle) {
        handle.abort.abort();
        if self.active.as_ref().is_some_and(|(id, _)| *id == handle.id) {
            self.active = None;
        }
        log::info!("schedule {} stopped", handle.id);
    }
    fn context(&self) -> CycleContext<T, S> {
        CycleContext {
            transport: Arc::clone(&self.transport),
            screen: Arc::clone(&self.screen),
            pipeline: Arc::clone(&self.pipeline),
            sample_count: self.sample_count,
            issued: Arc::clone(&self.issued),
            presented: Arc::clone(&self.presented),
            backoff: Arc::new(Mutex::new(BackoffState::new(self.backoff))),
        }
    }
}
async fn run_schedule<T: Transport, S: Screen + Send + 'static>(
    id: u64,
    interval: Duration,
    ctx: CycleContext<T, S>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        if lock(&ctx.backoff).should_skip(Instant::now()) {
            log::debug!("schedule {id}: backing off, tick skipped");
            continue;
        }
        let seq = ctx.issued.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("schedule {id}: requesting (seq {seq})");
        tokio::spawn(run_cycle(seq, ctx.clone()));
    }
}
async fn run_cycle<T: Transport, S: Screen + Send + 'static>(
    seq: u64,
    ctx: CycleContext<T, S>,
) {
    let raw = match ctx.transport.fetch(ctx.sample_count).await {
        Ok(raw) => {
            lock(&ctx.backoff).record_success();
            raw
        }
        Err(err) => {
            let wait = lock(&ctx.backoff).record_failure(Instant::now());
            match wait {
                Some(wait) => {
                    log::warn!("request {seq} failed: {err}; backing off for {wait:?}")
                }
                None => log::warn!("request {seq} failed: {err}"),
            }
            return;
        }
    };
    log::debug!("received {seq}: {}", raw.chars().take(80).collect::<String>());
    match present(seq, &raw, &ctx) {
        Ok(Some(diagnostics)) => log::debug!("drew {seq}: {}", diagnostics.line()),
        Ok(None) => log::debug!("discarded stale response {seq}"),
        Err(err) => log::error!("cycle {seq} aborted: {err}"),
    }
}
fn present<T, S: Screen>(
    seq: u64,
    raw: &str,
    ctx: &CycleContext<T, S>,
) -> Result<Option<Diagnostics>, ScopeError> {
    let cycle = ctx.pipeline.prepare(raw)?;
    let mut screen = lock(&ctx.screen);
    // Checked and updated under the screen lock so two cycles cannot interleave.
    if seq <= ctx.presented.load(Ordering::SeqCst) {
        return Ok(None);
    }
    let diagnostics = ctx.pipeline.draw(&cycle, &mut *screen)?;
    ctx.presented.store(seq, Ordering::SeqCst);
    Ok(Some(diagnostics))
}
