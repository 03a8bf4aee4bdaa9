//! Compile-time tunables for the gate controller.
//!
//! The firmware has no configuration surface; targets pick [`GateConfig::DEFAULT`]
//! or build a variant with the `with_*` helpers (the emulator shortens timings
//! this way).

use core::time::Duration;

/// Safety timeout used when the persisted slot was never written.
pub const COLD_SAFETY_TIMEOUT: Duration = Duration::from_secs(30);
/// Quiet period enforced between two accepted remote triggers.
pub const INPUT_COOLDOWN: Duration = Duration::from_millis(1_500);
/// Idle LED toggle cadence.
pub const BLINK_INTERVAL: Duration = Duration::from_secs(1);
/// Window in which limit-set button presses are counted.
pub const PRESS_WINDOW: Duration = Duration::from_secs(1);
/// Resolution used by the blink and press-window timers.
pub const FINE_RESOLUTION: Duration = Duration::from_millis(100);
/// Byte address of the persisted safety timeout slot.
pub const TIMEOUT_ADDRESS: u32 = 0;

/// Timing and storage parameters consumed by [`crate::controller::GateController`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct GateConfig {
    pub default_safety_timeout: Duration,
    pub input_cooldown: Duration,
    pub blink_interval: Duration,
    pub press_window: Duration,
    pub fine_resolution: Duration,
    pub timeout_address: u32,
}

impl GateConfig {
    pub const DEFAULT: Self = Self::new();

    #[must_use]
    pub const fn new() -> Self {
        Self {
            default_safety_timeout: COLD_SAFETY_TIMEOUT,
            input_cooldown: INPUT_COOLDOWN,
            blink_interval: BLINK_INTERVAL,
            press_window: PRESS_WINDOW,
            fine_resolution: FINE_RESOLUTION,
            timeout_address: TIMEOUT_ADDRESS,
        }
    }

    #[must_use]
    pub const fn with_default_safety_timeout(mut self, timeout: Duration) -> Self {
        self.default_safety_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_input_cooldown(mut self, cooldown: Duration) -> Self {
        self.input_cooldown = cooldown;
        self
    }

    #[must_use]
    pub const fn with_press_window(mut self, window: Duration) -> Self {
        self.press_window = window;
        self
    }

    #[must_use]
    pub const fn with_timeout_address(mut self, address: u32) -> Self {
        self.timeout_address = address;
        self
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
