//! Simulated gate shared by the integration tests.
//!
//! The board state sits behind `Rc<RefCell<_>>` so the sensor and driver
//! handles handed to the controller observe the same wiring.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use gate_core::config::GateConfig;
use gate_core::controller::{GateController, TickOutcome};
use gate_core::io::{GateDriver, GateSensors, InputLine, OutputLine};
use gate_core::storage::TimeoutStore;
use gate_core::telemetry::{GateEventKind, TelemetryRecorder};
use gate_core::time::GateInstant;

pub const STEP_MS: u64 = 10;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct SimInstant(u64);

impl SimInstant {
    pub fn millis(value: u64) -> Self {
        Self(value * 1_000)
    }
}

impl GateInstant for SimInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

#[derive(Debug)]
pub struct Board {
    pub outputs: [bool; OutputLine::COUNT],
    pub travel_ms: u64,
    /// 0 = fully closed, `travel_ms` = fully open.
    pub gate_ms: u64,
    pub jammed: bool,
    pub open_switch_stuck: bool,
    pub remote: bool,
    pub button: bool,
    pub holds: Vec<Duration>,
}

impl Board {
    pub fn output(&self, line: OutputLine) -> bool {
        self.outputs[line.as_index()]
    }

    fn advance(&mut self, step_ms: u64) {
        let open = self.output(OutputLine::OpenRelay);
        let close = self.output(OutputLine::CloseRelay);
        assert!(!(open && close), "both relays energised");
        if self.jammed {
            return;
        }
        if open {
            self.gate_ms = (self.gate_ms + step_ms).min(self.travel_ms);
        } else if close {
            self.gate_ms = self.gate_ms.saturating_sub(step_ms);
        }
    }
}

#[derive(Clone)]
pub struct BoardSensors(Rc<RefCell<Board>>);

impl GateSensors for BoardSensors {
    fn read(&mut self, line: InputLine) -> bool {
        let board = self.0.borrow();
        match line {
            InputLine::OpenLimit => board.gate_ms >= board.travel_ms && !board.open_switch_stuck,
            InputLine::ClosedLimit => board.gate_ms == 0,
            InputLine::RemoteSignal => board.remote,
            InputLine::LimitSetButton => board.button,
        }
    }
}

#[derive(Clone)]
pub struct BoardDriver(Rc<RefCell<Board>>);

impl GateDriver for BoardDriver {
    fn apply(&mut self, line: OutputLine, asserted: bool) {
        self.0.borrow_mut().outputs[line.as_index()] = asserted;
    }

    fn release_all(&mut self) {
        self.0.borrow_mut().outputs = [false; OutputLine::COUNT];
    }

    fn hold(&mut self, duration: Duration) {
        self.0.borrow_mut().holds.push(duration);
    }
}

#[derive(Clone, Debug, Default)]
pub struct FlashSlot {
    pub bytes: Vec<u8>,
    pub writes: usize,
    pub fail_writes: bool,
}

impl FlashSlot {
    pub fn erased() -> Self {
        Self {
            bytes: vec![0xFF; 8],
            ..Self::default()
        }
    }

    pub fn holding(seconds: f32) -> Self {
        let mut slot = Self::erased();
        slot.bytes[..4].copy_from_slice(&seconds.to_le_bytes());
        slot
    }

    pub fn seconds(&self) -> f32 {
        f32::from_le_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]])
    }
}

impl TimeoutStore for FlashSlot {
    type Error = &'static str;

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        let start = address as usize;
        let bytes = self.bytes.get(start..start + buf.len()).ok_or("out of range")?;
        buf.copy_from_slice(bytes);
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err("write rejected");
        }
        let start = address as usize;
        self.bytes
            .get_mut(start..start + data.len())
            .ok_or("out of range")?
            .copy_from_slice(data);
        self.writes += 1;
        Ok(())
    }
}

pub type SimController = GateController<BoardSensors, BoardDriver, FlashSlot, SimInstant>;

pub struct Rig {
    pub board: Rc<RefCell<Board>>,
    pub controller: SimController,
    pub telemetry: TelemetryRecorder<SimInstant>,
    pub now_ms: u64,
}

impl Rig {
    /// Gate resting closed with the given travel time.
    pub fn closed(travel: Duration, slot: FlashSlot) -> Self {
        Self::with_config(travel, 0, slot, GateConfig::DEFAULT)
    }

    pub fn with_config(travel: Duration, gate_ms: u64, slot: FlashSlot, config: GateConfig) -> Self {
        let travel_ms = u64::try_from(travel.as_millis()).unwrap();
        let board = Rc::new(RefCell::new(Board {
            outputs: [false; OutputLine::COUNT],
            travel_ms,
            gate_ms,
            jammed: false,
            open_switch_stuck: false,
            remote: false,
            button: false,
            holds: Vec::new(),
        }));

        let mut controller = GateController::new(
            BoardSensors(board.clone()),
            BoardDriver(board.clone()),
            slot,
            config,
        );
        let mut telemetry = TelemetryRecorder::new();
        controller.startup(&mut telemetry, SimInstant::millis(0));

        Self {
            board,
            controller,
            telemetry,
            now_ms: 0,
        }
    }

    pub fn tick(&mut self) -> TickOutcome {
        self.now_ms += STEP_MS;
        self.board.borrow_mut().advance(STEP_MS);
        self.controller
            .tick(&mut self.telemetry, SimInstant::millis(self.now_ms))
    }

    /// Runs for `millis` and returns every tick outcome that reported something.
    pub fn run_for(&mut self, millis: u64) -> Vec<TickOutcome> {
        (0..millis / STEP_MS)
            .map(|_| self.tick())
            .filter(|outcome| *outcome != TickOutcome::default())
            .collect()
    }

    /// Holds the remote line high for one second, then lets the cooldown lapse.
    pub fn pulse_remote(&mut self) -> Vec<TickOutcome> {
        self.board.borrow_mut().remote = true;
        let mut outcomes = self.run_for(1_000);
        self.board.borrow_mut().remote = false;
        outcomes.extend(self.run_for(1_100));
        outcomes
    }

    /// Presses the limit-set button `count` times and waits for the window.
    pub fn press_button(&mut self, count: usize) -> Vec<TickOutcome> {
        let mut outcomes = Vec::new();
        for _ in 0..count {
            self.board.borrow_mut().button = true;
            outcomes.extend(self.run_for(60));
            self.board.borrow_mut().button = false;
            outcomes.extend(self.run_for(60));
        }
        outcomes.extend(self.run_for(1_200));
        outcomes
    }

    /// Ticks until the gate is idle again, up to `limit`.
    pub fn run_until_idle(&mut self, limit: Duration) -> Vec<TickOutcome> {
        let mut outcomes = Vec::new();
        let deadline = self.now_ms + u64::try_from(limit.as_millis()).unwrap();
        while self.controller.movement_direction().is_moving() && self.now_ms < deadline {
            let outcome = self.tick();
            if outcome != TickOutcome::default() {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    pub fn output(&self, line: OutputLine) -> bool {
        self.board.borrow().output(line)
    }

    pub fn events(&self) -> Vec<GateEventKind> {
        self.telemetry.oldest_first().map(|record| record.event).collect()
    }
}
