//! Hardware seams: the boolean input lines the controller polls and the
//! output lines it drives.
//!
//! The catalog mirrors the board wiring so firmware and emulator front-ends
//! can label lines consistently. Nothing in this module touches registers;
//! targets implement [`GateSensors`] and [`GateDriver`] for their pins.

use core::time::Duration;

/// Inputs polled once per tick.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InputLine {
    OpenLimit,
    ClosedLimit,
    RemoteSignal,
    LimitSetButton,
}

impl InputLine {
    /// Number of input lines.
    pub const COUNT: usize = 4;

    /// Deterministic index for lookups into [`ALL_INPUTS`].
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            InputLine::OpenLimit => 0,
            InputLine::ClosedLimit => 1,
            InputLine::RemoteSignal => 2,
            InputLine::LimitSetButton => 3,
        }
    }
}

/// Relays and indicator LEDs driven by the controller.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputLine {
    OpenRelay,
    CloseRelay,
    OpenLed,
    CloseLed,
    IdleLed,
}

impl OutputLine {
    /// Number of output lines.
    pub const COUNT: usize = 5;

    /// Deterministic index for lookups into [`ALL_OUTPUTS`].
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            OutputLine::OpenRelay => 0,
            OutputLine::CloseRelay => 1,
            OutputLine::OpenLed => 2,
            OutputLine::CloseLed => 3,
            OutputLine::IdleLed => 4,
        }
    }

    /// Attempts to construct an [`OutputLine`] from a raw index.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(OutputLine::OpenRelay),
            1 => Some(OutputLine::CloseRelay),
            2 => Some(OutputLine::OpenLed),
            3 => Some(OutputLine::CloseLed),
            4 => Some(OutputLine::IdleLed),
            _ => None,
        }
    }

    /// Returns `true` for the motor relay outputs.
    #[must_use]
    pub const fn is_relay(self) -> bool {
        matches!(self, OutputLine::OpenRelay | OutputLine::CloseRelay)
    }
}

/// Metadata describing how a line is routed on the board.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PinAssignment<L> {
    pub line: L,
    pub name: &'static str,
    pub mcu_pin: &'static str,
}

impl<L> PinAssignment<L> {
    pub const fn new(line: L, name: &'static str, mcu_pin: &'static str) -> Self {
        Self {
            line,
            name,
            mcu_pin,
        }
    }
}

/// Compile-time catalog of every input line.
pub const ALL_INPUTS: [PinAssignment<InputLine>; InputLine::COUNT] = [
    PinAssignment::new(InputLine::OpenLimit, "LIMIT-OPEN", "PB4"),
    PinAssignment::new(InputLine::ClosedLimit, "LIMIT-CLOSED", "PB5"),
    PinAssignment::new(InputLine::RemoteSignal, "REMOTE", "PB3"),
    PinAssignment::new(InputLine::LimitSetButton, "LIMIT-SET", "PA8"),
];

/// Compile-time catalog of every output line.
pub const ALL_OUTPUTS: [PinAssignment<OutputLine>; OutputLine::COUNT] = [
    PinAssignment::new(OutputLine::OpenRelay, "RELAY-OPEN", "PA6"),
    PinAssignment::new(OutputLine::CloseRelay, "RELAY-CLOSE", "PA7"),
    PinAssignment::new(OutputLine::OpenLed, "LED-OPEN", "PC6"),
    PinAssignment::new(OutputLine::CloseLed, "LED-CLOSE", "PC7"),
    PinAssignment::new(OutputLine::IdleLed, "LED-IDLE", "PA5"),
];

/// Retrieve input metadata by line.
#[must_use]
pub const fn input_by_line(line: InputLine) -> PinAssignment<InputLine> {
    ALL_INPUTS[line.as_index()]
}

/// Retrieve output metadata by line.
#[must_use]
pub const fn output_by_line(line: OutputLine) -> PinAssignment<OutputLine> {
    ALL_OUTPUTS[line.as_index()]
}

/// Boolean reads of the polled input lines. `true` means asserted.
pub trait GateSensors {
    /// Samples the requested line. No debouncing or rate limiting is applied.
    fn read(&mut self, line: InputLine) -> bool;
}

/// Abstraction over the relay and LED drivers.
pub trait GateDriver {
    /// Drives the line to the requested level (`true` asserts it).
    fn apply(&mut self, line: OutputLine, asserted: bool);

    /// Releases every output: both relays off, every LED dark.
    fn release_all(&mut self);

    /// Bounded busy-delay used only right after a discrete indicator sequence.
    fn hold(&mut self, duration: Duration);
}
