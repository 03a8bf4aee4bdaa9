//! Gate controller: the single owned object driven once per tick.
//!
//! The controller owns the position tracker, the hardware driver, the
//! persisted-timeout store, and every timer. The host scheduling loop calls
//! [`GateController::tick`] with one captured instant; the tick runs to
//! completion in a fixed order:
//!
//! 1. advance every timer,
//! 2. refresh the position from the limit switches,
//! 3. blink the idle indicator,
//! 4. sample the button window and the remote line,
//! 5. dispatch an accepted command,
//! 6. force a stop if the safety timer completed,
//! 7. otherwise check for arrival at the target limit.
//!
//! State changes go through [`crate::machine::transition`]; this module only
//! applies the returned effects.

pub mod input;

use core::time::Duration;

use crate::config::GateConfig;
use crate::indicator::{LEARNING_ARMED_FLASH, STARTUP_FLASH};
use crate::io::{GateDriver, GateSensors, OutputLine};
use crate::learner::{LearningOutcome, TimeoutLearner};
use crate::machine::{
    CommandState, Effect, MovementDirection, StopReason, Transition, Trigger, transition,
};
use crate::position::{Position, PositionTracker};
use crate::storage::{TimeoutStore, load_timeout, save_timeout};
use crate::telemetry::{
    CommandSource, GateEventKind, Gesture, LearningTelemetry, MovementTelemetry,
    StorageAccess, TelemetryPayload, TelemetryRecorder,
};
use crate::time::GateInstant;
use crate::timer::{Timer, TimerState};

pub use input::{ButtonSampler, RemoteCooldown};

/// Observable result of one tick.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TickOutcome {
    /// Source of the command accepted this tick.
    pub command: Option<CommandSource>,
    /// Direction of a movement started this tick.
    pub started: Option<MovementDirection>,
    /// Reason a movement ended this tick.
    pub stopped: Option<StopReason>,
    /// Button gesture classified this tick.
    pub gesture: Option<Gesture>,
}

/// Point-in-time view of the controller for diagnostics front-ends.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct GateStatus {
    pub position: Position,
    pub last_confirmed_position: Position,
    pub direction: MovementDirection,
    pub command_state: CommandState,
    pub last_direction: MovementDirection,
    pub active_timeout: Duration,
    pub learning_armed: bool,
    pub learning_recording: bool,
    pub safety_timer: TimerState,
    pub safety_elapsed: Duration,
    pub cooldown_timer: TimerState,
    pub blink_timer: TimerState,
}

/// Owned gate controller.
pub struct GateController<S, D, T, I> {
    config: GateConfig,
    tracker: PositionTracker<S>,
    driver: D,
    store: T,
    safety_timer: Timer<I>,
    blink_timer: Timer<I>,
    cooldown: RemoteCooldown<I>,
    button: ButtonSampler<I>,
    learner: TimeoutLearner<I>,
    active_timeout: Duration,
    last_direction: MovementDirection,
    blink_line: OutputLine,
    blink_lit: bool,
}

impl<S, D, T, I> GateController<S, D, T, I>
where
    S: GateSensors,
    D: GateDriver,
    T: TimeoutStore,
    I: GateInstant,
{
    /// Builds the controller and seeds the position from the switches.
    ///
    /// No outputs are driven until [`startup`](Self::startup) runs.
    pub fn new(sensors: S, driver: D, store: T, config: GateConfig) -> Self {
        let mut safety_timer = Timer::new("safety-timeout");
        safety_timer.configure(config.default_safety_timeout);

        let mut blink_timer = Timer::with_resolution("idle-blink", config.fine_resolution);
        blink_timer.configure(config.blink_interval);

        Self {
            config,
            tracker: PositionTracker::new(sensors),
            driver,
            store,
            safety_timer,
            blink_timer,
            cooldown: RemoteCooldown::new(config.input_cooldown),
            button: ButtonSampler::new(config.press_window, config.fine_resolution),
            learner: TimeoutLearner::new(),
            active_timeout: config.default_safety_timeout,
            last_direction: MovementDirection::Idle,
            blink_line: OutputLine::IdleLed,
            blink_lit: idle_level(OutputLine::IdleLed),
        }
    }

    /// Loads the persisted timeout, plays the power-on flash, and shows idle.
    ///
    /// Storage failures fall back to the cold default and are recorded.
    pub fn startup<const CAP: usize>(
        &mut self,
        telemetry: &mut TelemetryRecorder<I, CAP>,
        now: I,
    ) -> Duration {
        self.driver.release_all();

        self.active_timeout = match load_timeout(&mut self.store, self.config.timeout_address) {
            Ok(Some(timeout)) => timeout,
            Ok(None) => self.config.default_safety_timeout,
            Err(_) => {
                telemetry.record_event(GateEventKind::StorageFault(StorageAccess::Load), now);
                self.config.default_safety_timeout
            }
        };
        self.safety_timer.configure(self.active_timeout);
        telemetry.record(
            GateEventKind::TimeoutLoaded,
            TelemetryPayload::Timeout(self.active_timeout),
            now,
        );

        STARTUP_FLASH.play(&mut self.driver);
        self.show_direction_indicators();

        self.active_timeout
    }

    /// Runs one control cycle at `now`.
    pub fn tick<const CAP: usize>(
        &mut self,
        telemetry: &mut TelemetryRecorder<I, CAP>,
        now: I,
    ) -> TickOutcome {
        let mut outcome = TickOutcome::default();

        self.safety_timer.update(now);
        self.blink_timer.update(now);
        self.cooldown.update(now);
        self.button.update(now);

        if let Some(position) = self.tracker.refresh_position() {
            telemetry.record_event(GateEventKind::PositionChanged(position), now);
        }

        self.update_idle_blink(now);

        let pressed = self.tracker.read_limit_set_button();
        let manual = match self.button.sample(pressed, now) {
            Some((gesture, presses)) => {
                outcome.gesture = Some(gesture);
                telemetry.record(
                    GateEventKind::GestureDetected(gesture),
                    TelemetryPayload::Presses(presses),
                    now,
                );
                if gesture == Gesture::DoublePress {
                    self.arm_learning(telemetry, now);
                }
                gesture == Gesture::SinglePress
            }
            None => false,
        };

        let remote_asserted = self.tracker.read_command_signal();
        let remote = self.cooldown.sample(remote_asserted, now);

        if manual || remote {
            let source = if manual {
                CommandSource::Button
            } else {
                CommandSource::Remote
            };
            outcome.command = Some(source);
            telemetry.record_event(GateEventKind::CommandAccepted(source), now);
            self.dispatch(Trigger::Command, telemetry, now, &mut outcome);
        }

        if self.movement_direction().is_moving() {
            self.learner.observe(now);

            if self.safety_timer.state() == TimerState::Complete {
                self.dispatch(Trigger::SafetyTimeout, telemetry, now, &mut outcome);
            } else if self.tracker.has_reached_target_limit() {
                self.dispatch(Trigger::LimitReached, telemetry, now, &mut outcome);
            }
        }

        outcome
    }

    /// Returns a diagnostics snapshot.
    #[must_use]
    pub fn snapshot(&self) -> GateStatus {
        let direction = self.tracker.movement_direction();
        GateStatus {
            position: self.tracker.position(),
            last_confirmed_position: self.tracker.last_confirmed_position(),
            direction,
            command_state: direction.command_state(),
            last_direction: self.last_direction,
            active_timeout: self.active_timeout,
            learning_armed: self.learner.is_armed(),
            learning_recording: self.learner.is_recording(),
            safety_timer: self.safety_timer.state(),
            safety_elapsed: self.safety_timer.elapsed(),
            cooldown_timer: self.cooldown.state(),
            blink_timer: self.blink_timer.state(),
        }
    }

    #[must_use]
    pub fn position(&self) -> Position {
        self.tracker.position()
    }

    #[must_use]
    pub fn movement_direction(&self) -> MovementDirection {
        self.tracker.movement_direction()
    }

    #[must_use]
    pub fn command_state(&self) -> CommandState {
        self.movement_direction().command_state()
    }

    /// Most recent direction issued, or `Idle` before the first movement.
    #[must_use]
    pub fn last_movement_direction(&self) -> MovementDirection {
        self.last_direction
    }

    /// Safety timeout currently applied to every movement.
    #[must_use]
    pub fn active_timeout(&self) -> Duration {
        self.active_timeout
    }

    #[must_use]
    pub fn safety_timer_state(&self) -> TimerState {
        self.safety_timer.state()
    }

    #[must_use]
    pub fn is_learning_armed(&self) -> bool {
        self.learner.is_armed()
    }

    #[must_use]
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn sensors(&self) -> &S {
        self.tracker.sensors()
    }

    pub fn sensors_mut(&mut self) -> &mut S {
        self.tracker.sensors_mut()
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut T {
        &mut self.store
    }

    fn dispatch<const CAP: usize>(
        &mut self,
        trigger: Trigger,
        telemetry: &mut TelemetryRecorder<I, CAP>,
        now: I,
        outcome: &mut TickOutcome,
    ) {
        let direction = self.tracker.movement_direction();
        let position = self.tracker.position();

        if !direction.is_moving()
            && trigger == Trigger::Command
            && self.learner.mark_cycle(position)
        {
            telemetry.record_event(GateEventKind::LearningStarted, now);
        }

        let result = transition(direction, position, trigger);
        self.apply(&result, telemetry, now);

        if let Some(started) = result.started() {
            outcome.started = Some(started);
        }
        if result.stopped.is_some() {
            outcome.stopped = result.stopped;
        }
    }

    fn apply<const CAP: usize>(
        &mut self,
        result: &Transition,
        telemetry: &mut TelemetryRecorder<I, CAP>,
        now: I,
    ) {
        let mut ran_for = Duration::ZERO;

        for effect in &result.effects {
            match *effect {
                Effect::Drive(line, level) => self.driver.apply(line, level),
                Effect::RestartSafetyTimer => {
                    self.safety_timer.configure(self.active_timeout);
                    self.safety_timer.start(now);
                }
                Effect::ClearSafetyTimer => {
                    ran_for = self.safety_timer.elapsed();
                    self.safety_timer.reset();
                }
                Effect::DiscardLearning => {
                    if self.learner.discard() {
                        telemetry.record_event(GateEventKind::LearningDiscarded, now);
                    }
                }
                Effect::FinalizeLearning => self.finalize_learning(telemetry, now),
            }
        }

        self.tracker.set_movement_direction(result.next);

        if let Some(started) = result.started() {
            self.last_direction = started;
            telemetry.record(
                GateEventKind::MovementStarted(started),
                TelemetryPayload::Timeout(self.active_timeout),
                now,
            );
        }

        if let Some(reason) = result.stopped {
            let event = match reason {
                StopReason::Command => GateEventKind::StoppedByCommand,
                StopReason::SafetyTimeout => GateEventKind::SafetyTimeout,
                StopReason::LimitReached => GateEventKind::LimitReached(self.tracker.position()),
            };
            telemetry.record(
                event,
                TelemetryPayload::Movement(MovementTelemetry::new(ran_for, self.active_timeout)),
                now,
            );

            self.blink_timer.reset();
            self.blink_lit = idle_level(self.blink_line);
        }
    }

    fn finalize_learning<const CAP: usize>(
        &mut self,
        telemetry: &mut TelemetryRecorder<I, CAP>,
        now: I,
    ) {
        let active = self.active_timeout;
        let Some(outcome) = self.learner.finalize(now, active) else {
            return;
        };

        let details = TelemetryPayload::Learning(LearningTelemetry::new(
            outcome.measured(),
            outcome.candidate(),
            active,
        ));

        match outcome {
            LearningOutcome::Adopted { candidate, .. } => {
                self.active_timeout = candidate;
                self.safety_timer.configure(candidate);
                telemetry.record(GateEventKind::TimeoutAdopted, details, now);

                if save_timeout(&mut self.store, self.config.timeout_address, candidate).is_err() {
                    telemetry.record_event(GateEventKind::StorageFault(StorageAccess::Save), now);
                }
            }
            LearningOutcome::Discarded { .. } => {
                telemetry.record(GateEventKind::TimeoutRejected, details, now);
            }
        }
    }

    fn arm_learning<const CAP: usize>(
        &mut self,
        telemetry: &mut TelemetryRecorder<I, CAP>,
        now: I,
    ) {
        if !self.learner.arm() {
            return;
        }

        telemetry.record_event(GateEventKind::LearningArmed, now);

        // The flash blocks the tick; never hold with a relay energised.
        if !self.tracker.movement_direction().is_moving() {
            LEARNING_ARMED_FLASH.play(&mut self.driver);
            self.show_direction_indicators();
        }
    }

    /// Drives the LEDs to the steady indication for the current direction.
    fn show_direction_indicators(&mut self) {
        let direction = self.tracker.movement_direction();
        self.driver.apply(
            OutputLine::OpenLed,
            direction == MovementDirection::Opening,
        );
        self.driver.apply(
            OutputLine::CloseLed,
            direction == MovementDirection::Closing,
        );
        self.driver
            .apply(OutputLine::IdleLed, !direction.is_moving());
        self.blink_lit = idle_level(self.blink_line);
        self.blink_timer.reset();
    }

    fn update_idle_blink(&mut self, now: I) {
        if self.tracker.movement_direction().is_moving() {
            return;
        }

        match self.blink_timer.state() {
            TimerState::None => self.blink_timer.start(now),
            TimerState::Complete => {
                let line = blink_line_for(self.tracker.position());
                if line != self.blink_line {
                    self.driver.apply(self.blink_line, idle_level(self.blink_line));
                    self.blink_line = line;
                    self.blink_lit = idle_level(line);
                }

                self.blink_lit = !self.blink_lit;
                self.driver.apply(line, self.blink_lit);
                self.blink_timer.start(now);
            }
            TimerState::Running | TimerState::Paused => {}
        }
    }
}

/// Steady level of an indicator while the gate is idle.
const fn idle_level(line: OutputLine) -> bool {
    matches!(line, OutputLine::IdleLed)
}

/// LED toggled while idle at `position`.
#[must_use]
pub const fn blink_line_for(position: Position) -> OutputLine {
    match position {
        Position::Closed => OutputLine::CloseLed,
        Position::Open => OutputLine::OpenLed,
        Position::Unknown => OutputLine::IdleLed,
    }
}
