//! Limit-switch polling and gate position derivation.
//!
//! The tracker owns the sensor collaborator and recomputes the [`Position`]
//! every tick from the two limit switches. The movement direction stored here
//! is written only by the controller when it issues a movement command.

use crate::io::{GateSensors, InputLine};
use crate::machine::MovementDirection;

/// Gate position derived from the limit switches.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Position {
    Unknown,
    Open,
    Closed,
}

impl Position {
    /// Applies the switch derivation table.
    ///
    /// Neither switch asserted means mid-travel (or a fault); both asserted is
    /// a sensor fault. Both map to [`Position::Unknown`].
    #[must_use]
    pub const fn from_switches(open: bool, closed: bool) -> Self {
        match (open, closed) {
            (true, false) => Position::Open,
            (false, true) => Position::Closed,
            (false, false) | (true, true) => Position::Unknown,
        }
    }

    /// Returns `true` when the gate sits on one of its limits.
    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Position::Unknown)
    }
}

/// Polls the limit switches and tracks the derived gate position.
pub struct PositionTracker<S> {
    sensors: S,
    position: Position,
    last_confirmed: Position,
    direction: MovementDirection,
}

impl<S> PositionTracker<S>
where
    S: GateSensors,
{
    /// Seeds the position from the switches; the gate always starts idle.
    pub fn new(mut sensors: S) -> Self {
        let open = sensors.read(InputLine::OpenLimit);
        let closed = sensors.read(InputLine::ClosedLimit);

        Self {
            sensors,
            position: Position::from_switches(open, closed),
            last_confirmed: Position::Unknown,
            direction: MovementDirection::Idle,
        }
    }

    /// Raw read of the open limit switch.
    pub fn read_open_switch(&mut self) -> bool {
        self.sensors.read(InputLine::OpenLimit)
    }

    /// Raw read of the closed limit switch.
    pub fn read_closed_switch(&mut self) -> bool {
        self.sensors.read(InputLine::ClosedLimit)
    }

    /// Raw read of the remote receiver line. Callers apply their own cooldown.
    pub fn read_command_signal(&mut self) -> bool {
        self.sensors.read(InputLine::RemoteSignal)
    }

    /// Raw read of the local limit-set push-button.
    pub fn read_limit_set_button(&mut self) -> bool {
        self.sensors.read(InputLine::LimitSetButton)
    }

    /// Recomputes the position. Must run every tick.
    ///
    /// Returns the new position when it differs from the previous tick.
    pub fn refresh_position(&mut self) -> Option<Position> {
        let open = self.read_open_switch();
        let closed = self.read_closed_switch();
        let next = Position::from_switches(open, closed);

        if next == self.position {
            None
        } else {
            self.position = next;
            Some(next)
        }
    }

    /// Returns the position computed by the latest refresh.
    #[must_use]
    pub const fn position(&self) -> Position {
        self.position
    }

    /// Returns the last limit confirmed by an arrival check.
    #[must_use]
    pub const fn last_confirmed_position(&self) -> Position {
        self.last_confirmed
    }

    #[must_use]
    pub const fn movement_direction(&self) -> MovementDirection {
        self.direction
    }

    pub fn set_movement_direction(&mut self, direction: MovementDirection) {
        self.direction = direction;
    }

    /// `true` only while closing with the closed switch asserted.
    ///
    /// Records [`Position::Closed`] as both the current and the last
    /// confirmed position when it fires.
    pub fn has_reached_closing_limit(&mut self) -> bool {
        if self.direction != MovementDirection::Closing || !self.read_closed_switch() {
            return false;
        }

        self.position = Position::Closed;
        self.last_confirmed = Position::Closed;
        true
    }

    /// `true` only while opening with the open switch asserted.
    pub fn has_reached_opening_limit(&mut self) -> bool {
        if self.direction != MovementDirection::Opening || !self.read_open_switch() {
            return false;
        }

        self.position = Position::Open;
        self.last_confirmed = Position::Open;
        true
    }

    /// Runs the arrival check that matches the current direction.
    pub fn has_reached_target_limit(&mut self) -> bool {
        match self.direction {
            MovementDirection::Opening => self.has_reached_opening_limit(),
            MovementDirection::Closing => self.has_reached_closing_limit(),
            MovementDirection::Idle => false,
        }
    }

    /// Provides access to the sensor collaborator.
    pub fn sensors(&self) -> &S {
        &self.sensors
    }

    /// Provides mutable access to the sensor collaborator.
    pub fn sensors_mut(&mut self) -> &mut S {
        &mut self.sensors
    }
}
