//! Countdown engine for the widget renderer.
//!
//! This module provides the core countdown functionality:
//! - `Countdown`: the tick transition bound to a presentation callback
//! - `CountdownEngine`: one self-requeuing scheduled task driving a `Countdown`
//! - Cancellation through a single task handle
//!
//! ```text
//! start ──▶ Counting ──(current == stop)──▶ Succeeded ──(reset)──▶ Counting ─ ...
//! ```
//!
//! The schedule is fixed-delay: each tick sleeps for the delay configured at
//! the time the previous tick completed, so drift is tolerated rather than
//! corrected.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::types::{CountdownConfig, CountdownError, CountdownState};

/// Boxed presentation callback invoked with every reported state.
pub type TickCallback = Box<dyn FnMut(CountdownState) -> anyhow::Result<()> + Send>;

/// Returns a tick callback that forwards every reported state to a channel.
///
/// The callback fails once the receiving side is dropped, which halts the
/// engine that owns it.
pub fn forward_to(
    tx: mpsc::UnboundedSender<CountdownState>,
) -> impl Fn(CountdownState) -> anyhow::Result<()> + Clone + Send + Sync + 'static {
    move |state| {
        tx.send(state)
            .map_err(|_| anyhow::anyhow!("Tick receiver dropped"))
    }
}

// ============================================================================
// Countdown
// ============================================================================

/// Countdown state machine bound to its presentation callback.
///
/// This type performs no scheduling; `CountdownEngine` calls `tick` once per
/// interval.
pub struct Countdown {
    /// Active configuration
    config: CountdownConfig,
    /// Current state
    state: CountdownState,
    /// Presentation callback
    on_tick: TickCallback,
}

impl Countdown {
    /// Creates a countdown seeded with the start value of `config`.
    ///
    /// # Errors
    ///
    /// Returns `CountdownError::InvalidConfig` if the configuration is invalid.
    pub fn new<F>(config: CountdownConfig, on_tick: F) -> Result<Self, CountdownError>
    where
        F: FnMut(CountdownState) -> anyhow::Result<()> + Send + 'static,
    {
        config.validate()?;

        Ok(Self {
            config,
            state: CountdownState::new(config.start_value),
            on_tick: Box::new(on_tick),
        })
    }

    /// Reports the current state without transitioning.
    pub fn report(&mut self) -> anyhow::Result<()> {
        (self.on_tick)(self.state)
    }

    /// Performs one tick: transitions the state and reports it.
    ///
    /// # Errors
    ///
    /// Returns the callback's error unchanged.
    pub fn tick(&mut self) -> anyhow::Result<()> {
        let reported = self.state.advance(&self.config);
        tracing::debug!(current = reported.current, phase = %reported.phase, "tick");
        (self.on_tick)(reported)
    }

    /// Replaces the configuration and resets the current value to its start value.
    ///
    /// # Errors
    ///
    /// Returns `CountdownError::InvalidConfig` and leaves the countdown
    /// untouched if the configuration is invalid.
    pub fn update_config(&mut self, config: CountdownConfig) -> Result<(), CountdownError> {
        config.validate()?;

        self.config = config;
        self.state.reset(&config);
        Ok(())
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &CountdownConfig {
        &self.config
    }

    /// Returns the current state.
    pub fn state(&self) -> CountdownState {
        self.state
    }

    /// Returns the delay before the next tick.
    pub fn delay(&self) -> Duration {
        self.config.delay()
    }
}

// ============================================================================
// CountdownEngine
// ============================================================================

/// State shared between the engine handle and its scheduled task.
struct Shared {
    countdown: Countdown,
    running: bool,
}

fn lock(shared: &Mutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives a `Countdown` with a single pending scheduled tick at a time.
///
/// The callback runs on the Tokio runtime while the engine lock is held, so
/// it must not call back into the engine.
pub struct CountdownEngine {
    /// Countdown shared with the scheduled task
    shared: Arc<Mutex<Shared>>,
    /// Handle of the scheduled task (None once stopped)
    handle: Option<JoinHandle<()>>,
}

impl CountdownEngine {
    /// Starts a countdown.
    ///
    /// Reports the initial state to `on_tick` immediately, then schedules the
    /// first tick after the configured delay.
    ///
    /// # Errors
    ///
    /// Returns `CountdownError::InvalidConfig` for an invalid configuration and
    /// `CountdownError::TickFailed` if the initial report fails. Nothing is
    /// scheduled in either case.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start<F>(config: CountdownConfig, on_tick: F) -> Result<Self, CountdownError>
    where
        F: FnMut(CountdownState) -> anyhow::Result<()> + Send + 'static,
    {
        let mut countdown = Countdown::new(config, on_tick)?;
        countdown.report().map_err(CountdownError::TickFailed)?;

        let delay = countdown.delay();
        let shared = Arc::new(Mutex::new(Shared {
            countdown,
            running: true,
        }));
        let handle = tokio::spawn(run_schedule(Arc::clone(&shared), delay));

        tracing::info!(
            start = config.start_value,
            stop = config.stop_value,
            delay_seconds = config.delay_seconds,
            "Countdown started"
        );

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    /// Replaces the configuration and resets the current value.
    ///
    /// A sleep already in flight is not shortened or extended; the new delay
    /// applies from the next reschedule.
    ///
    /// # Errors
    ///
    /// Returns `CountdownError::InvalidConfig` if the configuration is invalid.
    pub fn update_config(&self, config: CountdownConfig) -> Result<(), CountdownError> {
        lock(&self.shared).countdown.update_config(config)?;

        tracing::info!(
            start = config.start_value,
            stop = config.stop_value,
            delay_seconds = config.delay_seconds,
            "Countdown configuration updated"
        );
        Ok(())
    }

    /// Cancels the pending tick. No callback is invoked afterwards.
    ///
    /// Safe to call repeatedly.
    pub fn stop(&mut self) {
        lock(&self.shared).running = false;

        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::info!("Countdown stopped");
        }
    }

    /// Returns true while ticks are being scheduled.
    pub fn is_running(&self) -> bool {
        lock(&self.shared).running
    }

    /// Returns the current state.
    pub fn state(&self) -> CountdownState {
        lock(&self.shared).countdown.state()
    }

    /// Returns the active configuration.
    pub fn config(&self) -> CountdownConfig {
        *lock(&self.shared).countdown.config()
    }
}

impl Drop for CountdownEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Clears the running flag when the scheduled task ends for any reason,
/// including a panicking callback.
struct HaltOnExit(Arc<Mutex<Shared>>);

impl Drop for HaltOnExit {
    fn drop(&mut self) {
        let mut guard = lock(&self.0);
        if guard.running && std::thread::panicking() {
            tracing::error!("Tick callback panicked, countdown halted");
        }
        guard.running = false;
    }
}

/// Sleeps, ticks, and requeues until stopped or the callback fails.
async fn run_schedule(shared: Arc<Mutex<Shared>>, mut delay: Duration) {
    let _halt = HaltOnExit(Arc::clone(&shared));

    loop {
        sleep(delay).await;

        match tick_once(&shared) {
            Some(next) => delay = next,
            None => break,
        }
    }
}

/// Runs one tick and returns the delay before the next one, or `None` when
/// scheduling must end.
fn tick_once(shared: &Mutex<Shared>) -> Option<Duration> {
    let mut guard = lock(shared);
    if !guard.running {
        return None;
    }

    if let Err(e) = guard.countdown.tick() {
        let message = format!("{e:#}");
        tracing::error!(error = %message, "Tick callback failed, countdown halted");
        guard.running = false;
        return None;
    }

    Some(guard.countdown.delay())
}

// ============================================================================
// Tests
// ============================================================================
