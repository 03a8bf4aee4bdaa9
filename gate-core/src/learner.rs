//! Safety-timeout learning.
//!
//! A double press of the limit-set button arms the learner. The next movement
//! that starts from a known limit is measured; when it reaches the opposite
//! limit the measured travel time plus a 10% margin becomes a candidate
//! timeout. The candidate is only adopted when it is strictly larger than the
//! active timeout, so a short or interrupted run can never shrink the limit.

use core::time::Duration;

use crate::position::Position;
use crate::time::GateInstant;

/// Outcome of closing out a measured learning cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LearningOutcome {
    /// Candidate exceeded the active timeout and should be persisted.
    Adopted { measured: Duration, candidate: Duration },
    /// Candidate was not larger than the active timeout.
    Discarded { measured: Duration, candidate: Duration },
}

impl LearningOutcome {
    #[must_use]
    pub const fn candidate(self) -> Duration {
        match self {
            LearningOutcome::Adopted { candidate, .. }
            | LearningOutcome::Discarded { candidate, .. } => candidate,
        }
    }

    #[must_use]
    pub const fn measured(self) -> Duration {
        match self {
            LearningOutcome::Adopted { measured, .. }
            | LearningOutcome::Discarded { measured, .. } => measured,
        }
    }
}

/// Adds the 10% safety margin using integer milliseconds.
#[must_use]
pub fn candidate_timeout(measured: Duration) -> Duration {
    let millis = measured.as_millis();
    let candidate = millis + millis / 10;
    Duration::from_millis(u64::try_from(candidate).unwrap_or(u64::MAX))
}

/// Tracks the armed flag and the in-flight travel measurement.
#[derive(Clone, Debug)]
pub struct TimeoutLearner<I> {
    armed: bool,
    cycle_marked: bool,
    started_at: Option<I>,
}

impl<I> TimeoutLearner<I>
where
    I: GateInstant,
{
    #[must_use]
    pub const fn new() -> Self {
        Self {
            armed: false,
            cycle_marked: false,
            started_at: None,
        }
    }

    /// Arms learning. Returns `false` when already armed.
    pub fn arm(&mut self) -> bool {
        if self.armed {
            return false;
        }

        self.armed = true;
        true
    }

    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.armed
    }

    /// Returns `true` while a movement is being measured.
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        self.cycle_marked
    }

    /// Marks the movement that is about to start for measurement.
    ///
    /// Only an armed learner marks a cycle, and only when the gate starts on a
    /// known limit. Returns `true` when the cycle was marked.
    pub fn mark_cycle(&mut self, starting_from: Position) -> bool {
        if !self.armed || self.cycle_marked || !starting_from.is_known() {
            return false;
        }

        self.cycle_marked = true;
        self.started_at = None;
        true
    }

    /// Records the start instant on the first tick of a marked movement.
    pub fn observe(&mut self, now: I) {
        if self.cycle_marked && self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    /// Closes out a marked cycle at `now`.
    ///
    /// Returns `None` (and keeps the learner armed) when no cycle was marked.
    /// Otherwise clears the armed and recording flags and reports whether the
    /// candidate beats `active_timeout`.
    pub fn finalize(&mut self, now: I, active_timeout: Duration) -> Option<LearningOutcome> {
        if !self.cycle_marked {
            return None;
        }

        let measured = self
            .started_at
            .map_or(Duration::ZERO, |start| now.saturating_duration_since(start));
        let candidate = candidate_timeout(measured);

        self.clear();

        Some(if candidate > active_timeout {
            LearningOutcome::Adopted {
                measured,
                candidate,
            }
        } else {
            LearningOutcome::Discarded {
                measured,
                candidate,
            }
        })
    }

    /// Drops any in-flight measurement and disarms.
    ///
    /// Returns `true` when there was something to discard.
    pub fn discard(&mut self) -> bool {
        let had_state = self.armed || self.cycle_marked;
        self.clear();
        had_state
    }

    fn clear(&mut self) {
        self.armed = false;
        self.cycle_marked = false;
        self.started_at = None;
    }
}

impl<I> Default for TimeoutLearner<I>
where
    I: GateInstant,
{
    fn default() -> Self {
        Self::new()
    }
}
