//! Test doubles shared by the unit tests in this crate.

use core::time::Duration;

use heapless::Vec;

use crate::io::{GateDriver, GateSensors, InputLine, OutputLine};
use crate::storage::TimeoutStore;
use crate::time::GateInstant;

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct MockInstant(u64);

impl MockInstant {
    pub fn millis(value: u64) -> Self {
        Self(value * 1_000)
    }
}

impl GateInstant for MockInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

#[derive(Clone, Debug, Default)]
pub struct MockSensors {
    pub open_limit: bool,
    pub closed_limit: bool,
    pub remote_signal: bool,
    pub limit_set_button: bool,
}

impl MockSensors {
    pub fn at_limits(open_limit: bool, closed_limit: bool) -> Self {
        Self {
            open_limit,
            closed_limit,
            ..Self::default()
        }
    }
}

impl GateSensors for MockSensors {
    fn read(&mut self, line: InputLine) -> bool {
        match line {
            InputLine::OpenLimit => self.open_limit,
            InputLine::ClosedLimit => self.closed_limit,
            InputLine::RemoteSignal => self.remote_signal,
            InputLine::LimitSetButton => self.limit_set_button,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct RecordingDriver {
    levels: [bool; OutputLine::COUNT],
    pub holds: Vec<Duration, 32>,
}

impl RecordingDriver {
    pub fn level(&self, line: OutputLine) -> bool {
        self.levels[line.as_index()]
    }
}

impl GateDriver for RecordingDriver {
    fn apply(&mut self, line: OutputLine, asserted: bool) {
        self.levels[line.as_index()] = asserted;
    }

    fn release_all(&mut self) {
        self.levels = [false; OutputLine::COUNT];
    }

    fn hold(&mut self, duration: Duration) {
        let _ = self.holds.push(duration);
    }
}

#[derive(Clone, Debug)]
pub struct MemoryStore {
    pub bytes: [u8; 16],
    pub fail_writes: bool,
    pub writes: usize,
}

impl MemoryStore {
    pub fn erased() -> Self {
        Self {
            bytes: [0xFF; 16],
            fail_writes: false,
            writes: 0,
        }
    }

    pub fn holding_seconds(seconds: f32) -> Self {
        let mut store = Self::erased();
        store.bytes[..4].copy_from_slice(&seconds.to_le_bytes());
        store
    }
}

impl TimeoutStore for MemoryStore {
    type Error = ();

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        let start = address as usize;
        let end = start + buf.len();
        buf.copy_from_slice(self.bytes.get(start..end).ok_or(())?);
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(());
        }
        let start = address as usize;
        let end = start + data.len();
        self.bytes.get_mut(start..end).ok_or(())?.copy_from_slice(data);
        self.writes += 1;
        Ok(())
    }
}
