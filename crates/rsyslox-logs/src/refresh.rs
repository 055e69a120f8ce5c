use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::engine::EngineEvent;

/// Polling interval until the user picks another one
pub const DEFAULT_REFRESH_INTERVAL_SECS: u32 = 30;

/// Visible auto-refresh state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshState {
    pub enabled: bool,
    pub interval_secs: u32,
    /// Seconds until the next poll
    pub countdown_secs: u32,
}

impl RefreshState {
    /// One second elapsed
    pub fn tick(&mut self) {
        if self.enabled {
            self.countdown_secs = self.countdown_secs.saturating_sub(1);
        }
    }

    /// A poll fired
    pub fn on_refresh(&mut self) {
        self.countdown_secs = self.interval_secs;
    }
}

/// Drives auto-refresh with two periodic tasks: the poll timer and the
/// one-second countdown. Both report through the engine event channel and
/// are always cancelled together.
pub struct RefreshScheduler {
    state: RefreshState,

    /// Cancellation token for the running timers
    cancel: CancellationToken,

    /// Active timer task handles
    tasks: Vec<JoinHandle<()>>,

    /// Bumped on every start so late events from old timers are ignored
    generation: u64,

    events: mpsc::UnboundedSender<EngineEvent>,
}

impl RefreshScheduler {
    /// Create a stopped scheduler
    pub fn new(interval_secs: u32, events: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self {
            state: RefreshState {
                enabled: false,
                interval_secs: interval_secs.max(1),
                countdown_secs: 0,
            },
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
            generation: 0,
            events,
        }
    }

    /// Start polling every `interval_secs`, replacing any running timers.
    /// A zero interval leaves the scheduler stopped.
    pub fn start(&mut self, interval_secs: u32) {
        self.stop();
        if interval_secs == 0 {
            return;
        }

        self.generation += 1;
        self.state = RefreshState {
            enabled: true,
            interval_secs,
            countdown_secs: interval_secs,
        };

        let generation = self.generation;
        let period = Duration::from_secs(u64::from(interval_secs));
        self.tasks.push(self.spawn_timer(period, move || EngineEvent::RefreshDue {
            generation,
        }));
        self.tasks
            .push(self.spawn_timer(Duration::from_secs(1), move || {
                EngineEvent::CountdownTick { generation }
            }));

        debug!(interval_secs, generation, "auto-refresh started");
    }

    fn spawn_timer<F>(&self, period: Duration, event: F) -> JoinHandle<()>
    where
        F: Fn() -> EngineEvent + Send + 'static,
    {
        let cancel = self.cancel.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let mut timer = interval_at(Instant::now() + period, period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,

                    _ = timer.tick() => {
                        if events.send(event()).is_err() {
                            // Engine dropped
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Cancel both timers and zero the countdown
    pub fn stop(&mut self) {
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        // Create a fresh cancellation token for future timers
        self.cancel = CancellationToken::new();
        self.state.enabled = false;
        self.state.countdown_secs = 0;
    }

    /// Flip between running and stopped, reusing the last interval
    pub fn toggle(&mut self) {
        if self.state.enabled {
            self.stop();
        } else {
            self.start(self.state.interval_secs);
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.enabled
    }

    pub fn state(&self) -> RefreshState {
        self.state
    }

    /// Apply a countdown tick from the current timers. Returns false for
    /// stale events.
    pub fn on_tick(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.state.tick();
        true
    }

    /// Apply a poll from the current timers. Returns false for stale events.
    pub fn on_refresh(&mut self, generation: u64) -> bool {
        if !self.is_current(generation) {
            return false;
        }
        self.state.on_refresh();
        true
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state.enabled && generation == self.generation
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
