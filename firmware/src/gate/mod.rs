//! Board bindings for the shared `gate-core` controller.
//!
//! Pin adapters and the flash slot only exist on the MCU target; the instant
//! wrapper and the flash record layout compile on the host so they can be
//! unit tested.

pub mod flash;

use core::time::Duration;

use embassy_time::Instant;
use gate_core::time::GateInstant;

#[cfg(target_os = "none")]
use embassy_stm32::gpio::{Input, Level, Output};
#[cfg(target_os = "none")]
use gate_core::io::{GateDriver, GateSensors, InputLine, OutputLine};

/// Controller tick period.
pub const TICK_PERIOD: embassy_time::Duration = embassy_time::Duration::from_millis(10);

/// Embassy monotonic instant wrapped for the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(pub Instant);

impl FirmwareInstant {
    #[cfg(target_os = "none")]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub const fn from_micros(micros: u64) -> Self {
        Self(Instant::from_micros(micros))
    }

    pub fn as_millis(self) -> u64 {
        self.0.as_millis()
    }
}

impl GateInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        let micros = self.0.saturating_duration_since(earlier.0).as_micros();
        Duration::from_micros(micros)
    }
}

pub fn core_duration_to_embassy(duration: Duration) -> embassy_time::Duration {
    let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
    embassy_time::Duration::from_micros(micros)
}

/// Limit switches, remote receiver, and limit-set button.
#[cfg(target_os = "none")]
pub struct BoardSensors<'d> {
    open_limit: Input<'d>,
    closed_limit: Input<'d>,
    remote: Input<'d>,
    limit_set: Input<'d>,
}

#[cfg(target_os = "none")]
impl<'d> BoardSensors<'d> {
    pub fn new(
        open_limit: Input<'d>,
        closed_limit: Input<'d>,
        remote: Input<'d>,
        limit_set: Input<'d>,
    ) -> Self {
        Self {
            open_limit,
            closed_limit,
            remote,
            limit_set,
        }
    }
}

#[cfg(target_os = "none")]
impl GateSensors for BoardSensors<'_> {
    fn read(&mut self, line: InputLine) -> bool {
        match line {
            InputLine::OpenLimit => self.open_limit.is_high(),
            InputLine::ClosedLimit => self.closed_limit.is_high(),
            InputLine::RemoteSignal => self.remote.is_high(),
            InputLine::LimitSetButton => self.limit_set.is_high(),
        }
    }
}

/// Motor relays and indicator LEDs, all active high.
#[cfg(target_os = "none")]
pub struct BoardDriver<'d> {
    open_relay: Output<'d>,
    close_relay: Output<'d>,
    open_led: Output<'d>,
    close_led: Output<'d>,
    idle_led: Output<'d>,
}

#[cfg(target_os = "none")]
impl<'d> BoardDriver<'d> {
    pub fn new(
        open_relay: Output<'d>,
        close_relay: Output<'d>,
        open_led: Output<'d>,
        close_led: Output<'d>,
        idle_led: Output<'d>,
    ) -> Self {
        Self {
            open_relay,
            close_relay,
            open_led,
            close_led,
            idle_led,
        }
    }

    fn output_mut(&mut self, line: OutputLine) -> &mut Output<'d> {
        match line {
            OutputLine::OpenRelay => &mut self.open_relay,
            OutputLine::CloseRelay => &mut self.close_relay,
            OutputLine::OpenLed => &mut self.open_led,
            OutputLine::CloseLed => &mut self.close_led,
            OutputLine::IdleLed => &mut self.idle_led,
        }
    }
}

#[cfg(target_os = "none")]
impl GateDriver for BoardDriver<'_> {
    fn apply(&mut self, line: OutputLine, asserted: bool) {
        self.output_mut(line).set_level(Level::from(asserted));
    }

    fn release_all(&mut self) {
        // Relays first so the motor never sees a partial update.
        self.open_relay.set_low();
        self.close_relay.set_low();
        self.open_led.set_low();
        self.close_led.set_low();
        self.idle_led.set_low();
    }

    fn hold(&mut self, duration: Duration) {
        embassy_time::block_for(core_duration_to_embassy(duration));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instant_difference_saturates() {
        let earlier = FirmwareInstant::from_micros(1_000);
        let later = FirmwareInstant::from_micros(3_500);

        assert_eq!(
            later.saturating_duration_since(earlier),
            Duration::from_micros(2_500)
        );
        assert_eq!(earlier.saturating_duration_since(later), Duration::ZERO);
    }

    #[test]
    fn durations_convert_to_embassy_ticks() {
        let converted = core_duration_to_embassy(Duration::from_millis(500));
        assert_eq!(converted.as_millis(), 500);
        assert_eq!(
            core_duration_to_embassy(Duration::MAX).as_micros(),
            u64::MAX
        );
    }
}
