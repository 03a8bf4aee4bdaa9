//! Restartable, pausable countdown used by every time-gated behaviour.
//!
//! A [`Timer`] never reads a clock on its own; each call that needs the
//! current time receives the tick's `now`. Elapsed time is kept as an
//! accumulated [`Duration`] plus the instant the current running segment
//! began, so pausing and resuming never rebases a stored start timestamp.
//!
//! Completion compares whole units of the timer's resolution: a timer
//! configured for N units completes once the truncated elapsed count strictly
//! exceeds the truncated duration. That one-unit slack is intentional.

use core::time::Duration;

use crate::time::GateInstant;

/// Default comparison unit for timers (one second).
pub const DEFAULT_RESOLUTION: Duration = Duration::from_secs(1);

/// Externally observable timer lifecycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimerState {
    None,
    Running,
    Paused,
    Complete,
}

/// Countdown timer with an explicit state machine.
#[derive(Clone, Debug)]
pub struct Timer<I> {
    name: &'static str,
    duration: Duration,
    resolution: Duration,
    state: TimerState,
    segment_started_at: Option<I>,
    accumulated: Duration,
    elapsed: Duration,
}

impl<I> Timer<I>
where
    I: GateInstant,
{
    /// Creates an unconfigured timer that compares whole seconds.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self::with_resolution(name, DEFAULT_RESOLUTION)
    }

    /// Creates an unconfigured timer that compares whole multiples of `resolution`.
    #[must_use]
    pub const fn with_resolution(name: &'static str, resolution: Duration) -> Self {
        Self {
            name,
            duration: Duration::ZERO,
            resolution,
            state: TimerState::None,
            segment_started_at: None,
            accumulated: Duration::ZERO,
            elapsed: Duration::ZERO,
        }
    }

    /// Sets the countdown length. Does not start the timer.
    pub fn configure(&mut self, duration: Duration) {
        self.duration = duration;
    }

    /// Starts (or restarts) the countdown from zero at `now`.
    pub fn start(&mut self, now: I) {
        self.state = TimerState::Running;
        self.segment_started_at = Some(now);
        self.accumulated = Duration::ZERO;
        self.elapsed = Duration::ZERO;
    }

    /// Freezes the elapsed time. Only meaningful while running.
    pub fn pause(&mut self, now: I) {
        if self.state != TimerState::Running {
            return;
        }

        self.accumulated = self.running_elapsed(now);
        self.elapsed = self.accumulated;
        self.segment_started_at = None;
        self.state = TimerState::Paused;
    }

    /// Continues a paused countdown from the elapsed time already accrued.
    pub fn resume(&mut self, now: I) {
        if self.state != TimerState::Paused {
            return;
        }

        self.segment_started_at = Some(now);
        self.state = TimerState::Running;
        self.update(now);
    }

    /// Returns to [`TimerState::None`] and zeroes elapsed time.
    pub fn reset(&mut self) {
        self.state = TimerState::None;
        self.segment_started_at = None;
        self.accumulated = Duration::ZERO;
        self.elapsed = Duration::ZERO;
    }

    /// Advances the timer. Must be called once per tick.
    ///
    /// Completion is one-way: once [`TimerState::Complete`] the timer ignores
    /// further updates until [`reset`](Self::reset) or [`start`](Self::start).
    pub fn update(&mut self, now: I) {
        if self.state != TimerState::Running {
            return;
        }

        self.elapsed = self.running_elapsed(now);
        if self.whole_units(self.elapsed) > self.whole_units(self.duration) {
            self.state = TimerState::Complete;
        }
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> TimerState {
        self.state
    }

    /// Returns the elapsed time computed by the latest update.
    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Returns the configured countdown length.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// Diagnostic label.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    fn running_elapsed(&self, now: I) -> Duration {
        match self.segment_started_at {
            Some(started_at) => self.accumulated + now.saturating_duration_since(started_at),
            None => self.accumulated,
        }
    }

    fn whole_units(&self, value: Duration) -> u128 {
        let unit = self.resolution.as_nanos().max(1);
        value.as_nanos() / unit
    }
}
