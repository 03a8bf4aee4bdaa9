//! Discrete LED acknowledgement sequences.
//!
//! Sequences are compile-time step tables played through a [`GateDriver`].
//! They are the only place the controller pauses: each step applies its
//! levels and then holds for a bounded duration.

use core::fmt;
use core::time::Duration;

use crate::io::{GateDriver, OutputLine};

/// LEDs flashed together by both sequences.
const DIRECTION_LEDS: &[OutputLine] = &[OutputLine::OpenLed, OutputLine::CloseLed];

/// Hold used by the power-on flash.
pub const STARTUP_HOLD: Duration = Duration::from_millis(100);
/// Hold used by the learning acknowledgement flash.
pub const LEARNING_ARMED_HOLD: Duration = Duration::from_millis(500);

/// Named indicator sequences.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum IndicatorKind {
    Startup,
    LearningArmed,
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IndicatorKind::Startup => "startup",
            IndicatorKind::LearningArmed => "learning-armed",
        })
    }
}

/// One step: drive `lines` to `lit`, then hold.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IndicatorStep {
    pub lines: &'static [OutputLine],
    pub lit: bool,
    pub hold: Duration,
}

impl IndicatorStep {
    pub const fn new(lines: &'static [OutputLine], lit: bool, hold: Duration) -> Self {
        Self { lines, lit, hold }
    }
}

/// Ordered steps for one sequence.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IndicatorSequence {
    pub kind: IndicatorKind,
    pub steps: &'static [IndicatorStep],
}

impl IndicatorSequence {
    pub const fn new(kind: IndicatorKind, steps: &'static [IndicatorStep]) -> Self {
        Self { kind, steps }
    }

    /// Sum of every hold in the sequence.
    #[must_use]
    pub fn total_hold(&self) -> Duration {
        self.steps.iter().map(|step| step.hold).sum()
    }

    /// Applies each step to `driver`, holding between steps.
    pub fn play<D>(&self, driver: &mut D)
    where
        D: GateDriver,
    {
        for step in self.steps {
            for line in step.lines {
                driver.apply(*line, step.lit);
            }
            if !step.hold.is_zero() {
                driver.hold(step.hold);
            }
        }
    }
}

const STARTUP_STEPS: [IndicatorStep; 4] = [
    IndicatorStep::new(DIRECTION_LEDS, true, STARTUP_HOLD),
    IndicatorStep::new(DIRECTION_LEDS, false, STARTUP_HOLD),
    IndicatorStep::new(DIRECTION_LEDS, true, STARTUP_HOLD),
    IndicatorStep::new(DIRECTION_LEDS, false, Duration::ZERO),
];

const LEARNING_ARMED_STEPS: [IndicatorStep; 5] = [
    IndicatorStep::new(&[OutputLine::IdleLed], false, Duration::ZERO),
    IndicatorStep::new(DIRECTION_LEDS, true, LEARNING_ARMED_HOLD),
    IndicatorStep::new(DIRECTION_LEDS, false, LEARNING_ARMED_HOLD),
    IndicatorStep::new(DIRECTION_LEDS, true, LEARNING_ARMED_HOLD),
    IndicatorStep::new(DIRECTION_LEDS, false, Duration::ZERO),
];

/// Played once after the persisted timeout has been loaded.
pub const STARTUP_FLASH: IndicatorSequence =
    IndicatorSequence::new(IndicatorKind::Startup, &STARTUP_STEPS);

/// Played when a double press arms timeout learning.
pub const LEARNING_ARMED_FLASH: IndicatorSequence =
    IndicatorSequence::new(IndicatorKind::LearningArmed, &LEARNING_ARMED_STEPS);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingDriver;

    #[test]
    fn startup_flash_leaves_direction_leds_dark() {
        let mut driver = RecordingDriver::default();
        STARTUP_FLASH.play(&mut driver);

        assert!(!driver.level(OutputLine::OpenLed));
        assert!(!driver.level(OutputLine::CloseLed));
        assert_eq!(driver.holds.as_slice(), &[STARTUP_HOLD; 3]);
        assert_eq!(STARTUP_FLASH.total_hold(), Duration::from_millis(300));
    }

    #[test]
    fn learning_flash_extinguishes_idle_led() {
        let mut driver = RecordingDriver::default();
        driver.apply(OutputLine::IdleLed, true);
        LEARNING_ARMED_FLASH.play(&mut driver);

        assert!(!driver.level(OutputLine::IdleLed));
        assert_eq!(driver.holds.len(), 3);
        assert_eq!(LEARNING_ARMED_FLASH.total_hold(), Duration::from_millis(1_500));
    }

    #[test]
    fn sequences_never_touch_relays() {
        for sequence in [STARTUP_FLASH, LEARNING_ARMED_FLASH] {
            assert!(
                sequence
                    .steps
                    .iter()
                    .all(|step| step.lines.iter().all(|line| !line.is_relay())),
                "{} drives a relay",
                sequence.kind
            );
        }
    }
}
