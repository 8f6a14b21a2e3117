/*!
 * Scheduled polling state machine for one batch.
 *
 * The poller runs a fixed-interval schedule that fetches batch status,
 * feeds the diff cache, and emits events toward a renderer. It stops
 * itself when the batch settles or when too many rounds fail in a row,
 * and it can be stopped from outside at any time.
 *
 * Every round carries the generation that was current when it was
 * issued. Restarting or stopping bumps the generation, so a response
 * that comes back late is recognized as stale and discarded wholesale:
 * no cache writes, no events, no counter movement.
 */

use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::PipelineApi;
use crate::tracking::batch::{BatchContext, BatchProgress, PollEvent, StopReason};
use crate::tracking::diff_cache::DiffCache;

/// Poll rounds that may fail back-to-back before the poller gives up
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default wait between poll rounds
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Events buffered between the poller and a slow renderer
const EVENT_QUEUE_CAPACITY: usize = 64;

/// Where the poller is in its lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollPhase {
    /// No batch has been started yet
    Idle,
    /// A batch is being polled
    Polling {
        /// The batch being polled
        batch_id: String,
    },
    /// Polling ended and will not resume without a new `start`
    Stopped(StopReason),
}

/// What one poll round decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Keep polling
    Continue,
    /// The poller transitioned to a stopped phase
    Finished,
    /// The round belonged to a superseded generation and was discarded
    Stale,
}

struct PollerState {
    phase: Mutex<PollPhase>,
    generation: AtomicU64,
    consecutive_failures: AtomicU32,
    events: Mutex<Option<mpsc::Sender<PollEvent>>>,
    cancel: Mutex<Option<CancellationToken>>,
    schedule: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for PollerState {
    // The schedule task only holds a weak reference back to this state,
    // so dropping the last poller handle tears the schedule down
    fn drop(&mut self) {
        if let Some(token) = self.cancel.lock().take() {
            token.cancel();
        }
        if let Some(handle) = self.schedule.lock().take() {
            handle.abort();
        }
    }
}

fn short(id: &str) -> &str {
    &id[..id.len().min(8)]
}

/// Polling state machine over a pipeline client and a diff cache
pub struct BatchPoller<A: PipelineApi + 'static> {
    api: Arc<A>,
    cache: Arc<DiffCache>,
    poll_interval: Duration,
    failure_threshold: u32,
    state: Arc<PollerState>,
}

impl<A: PipelineApi + 'static> BatchPoller<A> {
    /// Create a poller with the default interval and failure threshold
    pub fn new(api: Arc<A>, cache: Arc<DiffCache>) -> Self {
        Self::with_timing(api, cache, DEFAULT_POLL_INTERVAL, DEFAULT_FAILURE_THRESHOLD)
    }

    /// Create a poller with explicit timing, for configs and tests
    pub fn with_timing(
        api: Arc<A>,
        cache: Arc<DiffCache>,
        poll_interval: Duration,
        failure_threshold: u32,
    ) -> Self {
        Self {
            api,
            cache,
            poll_interval,
            failure_threshold: failure_threshold.max(1),
            state: Arc::new(PollerState {
                phase: Mutex::new(PollPhase::Idle),
                generation: AtomicU64::new(0),
                consecutive_failures: AtomicU32::new(0),
                events: Mutex::new(None),
                cancel: Mutex::new(None),
                schedule: Mutex::new(None),
            }),
        }
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> PollPhase {
        self.state.phase.lock().clone()
    }

    /// Current generation; rounds issued under an older one are stale
    pub fn generation(&self) -> u64 {
        self.state.generation.load(Ordering::SeqCst)
    }

    /// Poll failures observed back-to-back
    pub fn consecutive_failures(&self) -> u32 {
        self.state.consecutive_failures.load(Ordering::SeqCst)
    }

    /// Reset the machine for a new batch without scheduling anything.
    ///
    /// Any previous schedule is torn down, the diff cache cleared, and
    /// the generation bumped so in-flight rounds from before turn
    /// stale. Returns the new generation and the event receiver; drive
    /// rounds manually with [`poll_once`](Self::poll_once).
    pub fn arm(&self, ctx: &BatchContext) -> (u64, mpsc::Receiver<PollEvent>) {
        self.halt_schedule();

        let generation = self.state.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.consecutive_failures.store(0, Ordering::SeqCst);
        self.cache.reset();

        let (sender, receiver) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        {
            let mut phase = self.state.phase.lock();
            *phase = PollPhase::Polling {
                batch_id: ctx.batch_id.clone(),
            };
            *self.state.events.lock() = Some(sender);
        }

        debug!(
            "Polling batch {} (generation {})",
            short(&ctx.batch_id),
            generation
        );
        (generation, receiver)
    }

    /// Start the recurring schedule for a batch.
    ///
    /// At most one schedule is live per poller: starting again tears
    /// the previous one down first. The returned receiver yields events
    /// until the poller stops, then closes.
    pub fn start(&self, ctx: BatchContext) -> mpsc::Receiver<PollEvent> {
        let (generation, receiver) = self.arm(&ctx);

        let token = CancellationToken::new();
        *self.state.cancel.lock() = Some(token.clone());

        let api = Arc::clone(&self.api);
        let cache = Arc::clone(&self.cache);
        let state = Arc::downgrade(&self.state);
        let poll_interval = self.poll_interval;
        let threshold = self.failure_threshold;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(state) = state.upgrade() else { break };
                        let outcome =
                            Self::poll_round(&api, &cache, &state, threshold, generation, &ctx)
                                .await;
                        if outcome != TickOutcome::Continue {
                            break;
                        }
                    }
                }
            }
        });
        *self.state.schedule.lock() = Some(handle);

        receiver
    }

    /// Drive one poll round by hand, outside any schedule
    pub async fn poll_once(&self, generation: u64, ctx: &BatchContext) -> TickOutcome {
        Self::poll_round(
            &self.api,
            &self.cache,
            &self.state,
            self.failure_threshold,
            generation,
            ctx,
        )
        .await
    }

    /// Stop polling.
    ///
    /// Idempotent and callable from any phase. Tears down the schedule,
    /// turns in-flight rounds stale, closes the event channel, and
    /// moves a live poll to `Stopped(Cancelled)`.
    pub fn stop(&self) {
        self.halt_schedule();
        self.state.generation.fetch_add(1, Ordering::SeqCst);

        let was_polling = {
            let mut phase = self.state.phase.lock();
            if let PollPhase::Polling { batch_id } = &*phase {
                info!("Polling for batch {} cancelled", short(batch_id));
                *phase = PollPhase::Stopped(StopReason::Cancelled);
                true
            } else {
                false
            }
        };

        if was_polling {
            Self::emit(
                &self.state,
                PollEvent::Stopped {
                    reason: StopReason::Cancelled,
                    progress: None,
                },
            );
        }
        *self.state.events.lock() = None;
    }

    fn halt_schedule(&self) {
        if let Some(token) = self.state.cancel.lock().take() {
            token.cancel();
        }
        if let Some(handle) = self.state.schedule.lock().take() {
            handle.abort();
        }
    }

    async fn poll_round(
        api: &Arc<A>,
        cache: &DiffCache,
        state: &Arc<PollerState>,
        threshold: u32,
        generation: u64,
        ctx: &BatchContext,
    ) -> TickOutcome {
        // A stopped poller never resumes on its own
        {
            let phase = state.phase.lock();
            let live = matches!(&*phase, PollPhase::Polling { batch_id } if *batch_id == ctx.batch_id);
            if !live {
                return TickOutcome::Stale;
            }
        }

        let fetched = api.fetch_batch_status(&ctx.batch_id).await;

        if state.generation.load(Ordering::SeqCst) != generation {
            debug!(
                "Discarding stale poll response for batch {}",
                short(&ctx.batch_id)
            );
            return TickOutcome::Stale;
        }

        match fetched {
            Ok(status) => {
                state.consecutive_failures.store(0, Ordering::SeqCst);

                let deltas = cache.update(ctx, &status.items).await;
                let progress = BatchProgress::from_status(&status);
                Self::emit(state, PollEvent::Snapshot { progress, deltas });

                if progress.is_settled() {
                    let transitioned = {
                        let mut phase = state.phase.lock();
                        if state.generation.load(Ordering::SeqCst) == generation
                            && matches!(&*phase, PollPhase::Polling { .. })
                        {
                            *phase = PollPhase::Stopped(StopReason::Complete);
                            true
                        } else {
                            false
                        }
                    };
                    if !transitioned {
                        return TickOutcome::Stale;
                    }

                    info!("Batch {} settled: {}", short(&ctx.batch_id), progress);
                    Self::emit(
                        state,
                        PollEvent::Stopped {
                            reason: StopReason::Complete,
                            progress: Some(progress),
                        },
                    );
                    *state.events.lock() = None;
                    return TickOutcome::Finished;
                }

                TickOutcome::Continue
            }
            Err(err) => {
                let failures = state.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                warn!(
                    "Poll for batch {} failed ({}/{}): {}",
                    short(&ctx.batch_id),
                    failures,
                    threshold,
                    err
                );

                if failures >= threshold {
                    let transitioned = {
                        let mut phase = state.phase.lock();
                        if state.generation.load(Ordering::SeqCst) == generation
                            && matches!(&*phase, PollPhase::Polling { .. })
                        {
                            *phase = PollPhase::Stopped(StopReason::ErrorThreshold);
                            true
                        } else {
                            false
                        }
                    };
                    if !transitioned {
                        return TickOutcome::Stale;
                    }

                    warn!(
                        "Giving up on batch {} after {} consecutive poll failures",
                        short(&ctx.batch_id),
                        failures
                    );
                    Self::emit(
                        state,
                        PollEvent::Stopped {
                            reason: StopReason::ErrorThreshold,
                            progress: None,
                        },
                    );
                    *state.events.lock() = None;
                    return TickOutcome::Finished;
                }

                Self::emit(
                    state,
                    PollEvent::FetchFailed {
                        consecutive: failures,
                        threshold,
                        message: err.to_string(),
                    },
                );
                TickOutcome::Continue
            }
        }
    }

    // A full queue drops the event rather than stalling the schedule
    fn emit(state: &PollerState, event: PollEvent) {
        let sender = state.events.lock().clone();
        if let Some(sender) = sender {
            let _ = sender.try_send(event);
        }
    }
}
