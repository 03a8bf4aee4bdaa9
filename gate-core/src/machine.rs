//! Pure command/movement transition function.
//!
//! [`transition`] maps the current movement direction, the derived position,
//! and a [`Trigger`] to the next direction plus the list of side-effect
//! intents the controller must apply. Nothing here touches hardware or
//! timers, so every row of the table is testable in isolation.
//!
//! The command state is never stored; it is derived from the direction via
//! [`MovementDirection::command_state`], which keeps "processing iff moving"
//! true by construction.

use heapless::Vec;

use crate::io::OutputLine;
use crate::position::Position;

/// Upper bound on the effects emitted by a single transition.
pub const MAX_EFFECTS: usize = 8;

/// Direction currently commanded to the motor.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MovementDirection {
    Idle,
    Opening,
    Closing,
}

impl MovementDirection {
    #[must_use]
    pub const fn is_moving(self) -> bool {
        !matches!(self, MovementDirection::Idle)
    }

    /// Derives the command state for this direction.
    #[must_use]
    pub const fn command_state(self) -> CommandState {
        if self.is_moving() {
            CommandState::Processing
        } else {
            CommandState::Ready
        }
    }

    /// Relay that drives the motor in this direction.
    #[must_use]
    pub const fn relay(self) -> Option<OutputLine> {
        match self {
            MovementDirection::Opening => Some(OutputLine::OpenRelay),
            MovementDirection::Closing => Some(OutputLine::CloseRelay),
            MovementDirection::Idle => None,
        }
    }

    /// Indicator LED lit while moving in this direction.
    #[must_use]
    pub const fn indicator(self) -> Option<OutputLine> {
        match self {
            MovementDirection::Opening => Some(OutputLine::OpenLed),
            MovementDirection::Closing => Some(OutputLine::CloseLed),
            MovementDirection::Idle => None,
        }
    }

    /// Direction that drives the motor the other way.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            MovementDirection::Opening => MovementDirection::Closing,
            MovementDirection::Closing => MovementDirection::Opening,
            MovementDirection::Idle => MovementDirection::Idle,
        }
    }

    /// Short label for logs and status output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            MovementDirection::Idle => "idle",
            MovementDirection::Opening => "opening",
            MovementDirection::Closing => "closing",
        }
    }
}

/// Whether the controller accepts a new movement or treats input as a stop.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandState {
    Ready,
    Processing,
}

/// Events that can change the movement direction.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Trigger {
    /// Accepted remote pulse or single press of the local button.
    Command,
    /// Motor safety timer completed.
    SafetyTimeout,
    /// Limit switch matching the current direction asserted.
    LimitReached,
}

/// Side-effect intents produced by a transition.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Effect {
    /// Drive an output line to the given level.
    Drive(OutputLine, bool),
    /// Configure the safety timer to the active timeout and start it.
    RestartSafetyTimer,
    /// Return the safety timer to its idle state.
    ClearSafetyTimer,
    /// Drop any in-flight learning measurement and disarm the learner.
    DiscardLearning,
    /// Close out an armed learning cycle at the current instant.
    FinalizeLearning,
}

/// Why a movement ended.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StopReason {
    Command,
    SafetyTimeout,
    LimitReached,
}

impl StopReason {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            StopReason::Command => "command",
            StopReason::SafetyTimeout => "safety-timeout",
            StopReason::LimitReached => "limit-reached",
        }
    }
}

/// Result of a single transition.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Transition {
    pub next: MovementDirection,
    pub stopped: Option<StopReason>,
    pub effects: Vec<Effect, MAX_EFFECTS>,
}

impl Transition {
    fn unchanged(direction: MovementDirection) -> Self {
        Self {
            next: direction,
            stopped: None,
            effects: Vec::new(),
        }
    }

    /// Direction of the movement this transition started, if any.
    #[must_use]
    pub fn started(&self) -> Option<MovementDirection> {
        (self.stopped.is_none() && self.next.is_moving()).then_some(self.next)
    }
}

/// Direction chosen for an idle gate at the given position.
///
/// An unknown position always opens.
#[must_use]
pub const fn direction_for(position: Position) -> MovementDirection {
    match position {
        Position::Open => MovementDirection::Closing,
        Position::Closed | Position::Unknown => MovementDirection::Opening,
    }
}

/// Computes the next direction and the effects required to get there.
#[must_use]
pub fn transition(
    direction: MovementDirection,
    position: Position,
    trigger: Trigger,
) -> Transition {
    match (direction, trigger) {
        (MovementDirection::Idle, Trigger::Command) => enter_moving(direction_for(position)),
        (MovementDirection::Idle, Trigger::SafetyTimeout | Trigger::LimitReached) => {
            Transition::unchanged(direction)
        }
        (_, Trigger::Command) => enter_idle(StopReason::Command),
        (_, Trigger::SafetyTimeout) => enter_idle(StopReason::SafetyTimeout),
        (_, Trigger::LimitReached) => enter_idle(StopReason::LimitReached),
    }
}

fn enter_moving(next: MovementDirection) -> Transition {
    let opposite = next.opposite();
    let (Some(relay), Some(led), Some(other_relay), Some(other_led)) = (
        next.relay(),
        next.indicator(),
        opposite.relay(),
        opposite.indicator(),
    ) else {
        return Transition::unchanged(next);
    };
    let mut effects = Vec::new();

    // Break before make on the relay pair.
    push(&mut effects, Effect::Drive(other_relay, false));
    push(&mut effects, Effect::RestartSafetyTimer);
    push(&mut effects, Effect::Drive(relay, true));
    push(&mut effects, Effect::Drive(OutputLine::IdleLed, false));
    push(&mut effects, Effect::Drive(other_led, false));
    push(&mut effects, Effect::Drive(led, true));

    Transition {
        next,
        stopped: None,
        effects,
    }
}

fn enter_idle(reason: StopReason) -> Transition {
    let mut effects = Vec::new();

    push(&mut effects, Effect::Drive(OutputLine::OpenRelay, false));
    push(&mut effects, Effect::Drive(OutputLine::CloseRelay, false));
    push(&mut effects, Effect::ClearSafetyTimer);
    push(
        &mut effects,
        match reason {
            StopReason::LimitReached => Effect::FinalizeLearning,
            StopReason::Command | StopReason::SafetyTimeout => Effect::DiscardLearning,
        },
    );
    push(&mut effects, Effect::Drive(OutputLine::OpenLed, false));
    push(&mut effects, Effect::Drive(OutputLine::CloseLed, false));
    push(&mut effects, Effect::Drive(OutputLine::IdleLed, true));

    Transition {
        next: MovementDirection::Idle,
        stopped: Some(reason),
        effects,
    }
}

fn push(effects: &mut Vec<Effect, MAX_EFFECTS>, effect: Effect) {
    // Capacity covers the longest transition above.
    let _ = effects.push(effect);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drives(transition: &Transition, line: OutputLine) -> Option<bool> {
        transition.effects.iter().rev().find_map(|effect| match effect {
            Effect::Drive(target, level) if *target == line => Some(*level),
            _ => None,
        })
    }

    #[test]
    fn idle_command_moves_away_from_known_limit() {
        let from_open = transition(MovementDirection::Idle, Position::Open, Trigger::Command);
        assert_eq!(from_open.next, MovementDirection::Closing);
        assert_eq!(from_open.started(), Some(MovementDirection::Closing));
        assert_eq!(drives(&from_open, OutputLine::CloseRelay), Some(true));
        assert_eq!(drives(&from_open, OutputLine::OpenRelay), Some(false));
        assert_eq!(drives(&from_open, OutputLine::CloseLed), Some(true));
        assert_eq!(drives(&from_open, OutputLine::IdleLed), Some(false));
        assert!(from_open.effects.contains(&Effect::RestartSafetyTimer));

        let from_closed = transition(MovementDirection::Idle, Position::Closed, Trigger::Command);
        assert_eq!(from_closed.next, MovementDirection::Opening);
        assert_eq!(drives(&from_closed, OutputLine::OpenRelay), Some(true));
        assert_eq!(drives(&from_closed, OutputLine::CloseRelay), Some(false));
        assert_eq!(drives(&from_closed, OutputLine::OpenLed), Some(true));
        assert_eq!(drives(&from_closed, OutputLine::CloseLed), Some(false));
    }

    #[test]
    fn unknown_position_defaults_to_opening() {
        let result = transition(MovementDirection::Idle, Position::Unknown, Trigger::Command);
        assert_eq!(result.next, MovementDirection::Opening);
    }

    #[test]
    fn relay_release_precedes_relay_assert() {
        let result = transition(MovementDirection::Idle, Position::Open, Trigger::Command);
        let release = result
            .effects
            .iter()
            .position(|effect| *effect == Effect::Drive(OutputLine::OpenRelay, false));
        let assert = result
            .effects
            .iter()
            .position(|effect| *effect == Effect::Drive(OutputLine::CloseRelay, true));
        assert!(release < assert);
    }

    #[test]
    fn command_while_moving_stops_and_discards_learning() {
        for direction in [MovementDirection::Opening, MovementDirection::Closing] {
            for position in [Position::Unknown, Position::Open, Position::Closed] {
                let result = transition(direction, position, Trigger::Command);
                assert_eq!(result.next, MovementDirection::Idle);
                assert_eq!(result.stopped, Some(StopReason::Command));
                assert_eq!(result.started(), None);
                assert_eq!(drives(&result, OutputLine::OpenRelay), Some(false));
                assert_eq!(drives(&result, OutputLine::CloseRelay), Some(false));
                assert_eq!(drives(&result, OutputLine::IdleLed), Some(true));
                assert!(result.effects.contains(&Effect::ClearSafetyTimer));
                assert!(result.effects.contains(&Effect::DiscardLearning));
            }
        }
    }

    #[test]
    fn safety_timeout_stops_regardless_of_position() {
        let result = transition(
            MovementDirection::Closing,
            Position::Unknown,
            Trigger::SafetyTimeout,
        );
        assert_eq!(result.next, MovementDirection::Idle);
        assert_eq!(result.stopped, Some(StopReason::SafetyTimeout));
        assert!(result.effects.contains(&Effect::DiscardLearning));
    }

    #[test]
    fn limit_arrival_finalizes_learning() {
        let result = transition(
            MovementDirection::Opening,
            Position::Open,
            Trigger::LimitReached,
        );
        assert_eq!(result.stopped, Some(StopReason::LimitReached));
        assert!(result.effects.contains(&Effect::FinalizeLearning));
        assert!(!result.effects.contains(&Effect::DiscardLearning));
    }

    #[test]
    fn idle_ignores_non_command_triggers() {
        for trigger in [Trigger::SafetyTimeout, Trigger::LimitReached] {
            let result = transition(MovementDirection::Idle, Position::Closed, trigger);
            assert_eq!(result.next, MovementDirection::Idle);
            assert!(result.effects.is_empty());
            assert_eq!(result.stopped, None);
        }
    }

    #[test]
    fn command_state_tracks_direction() {
        assert_eq!(MovementDirection::Idle.command_state(), CommandState::Ready);
        assert_eq!(
            MovementDirection::Opening.command_state(),
            CommandState::Processing
        );
        assert_eq!(
            MovementDirection::Closing.command_state(),
            CommandState::Processing
        );
    }
}
