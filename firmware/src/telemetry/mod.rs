//! Forwards controller telemetry to the log sink.
//!
//! The gate task owns the [`TelemetryRecorder`]; after every tick it pushes
//! records it has not forwarded yet into [`LogChannel`], and the log task
//! prints them through defmt on the target or stdout on the host.

use core::fmt::Write;

use embassy_sync::channel::{Channel, Receiver, Sender};
use gate_core::telemetry::{EventId, TelemetryRecorder};
use heapless::String;

use crate::gate::FirmwareInstant;

#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex as LogMutex;
#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex as LogMutex;

/// Depth of the log queue.
pub const LOG_QUEUE_DEPTH: usize = 16;
/// Longest rendered record.
pub const LOG_LINE_CAPACITY: usize = 96;

/// One rendered telemetry record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogLine {
    pub at_ms: u64,
    pub text: String<LOG_LINE_CAPACITY>,
}

impl LogLine {
    fn render(at_ms: u64, record: &impl core::fmt::Display) -> Self {
        let mut text = String::new();
        // Overlong records are truncated rather than dropped.
        let _ = write!(text, "{record}");
        Self { at_ms, text }
    }
}

pub type LogChannel = Channel<LogMutex, LogLine, LOG_QUEUE_DEPTH>;
pub type LogSender<'a> = Sender<'a, LogMutex, LogLine, LOG_QUEUE_DEPTH>;
pub type LogReceiver<'a> = Receiver<'a, LogMutex, LogLine, LOG_QUEUE_DEPTH>;

/// Tracks which records have already been forwarded.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LogCursor {
    next: EventId,
    dropped: u32,
}

impl LogCursor {
    pub const fn new() -> Self {
        Self { next: 0, dropped: 0 }
    }

    /// Records lost because the queue was full.
    pub const fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Queues every record newer than the cursor without blocking.
    ///
    /// Returns how many records were queued.
    pub fn forward<const CAP: usize>(
        &mut self,
        telemetry: &TelemetryRecorder<FirmwareInstant, CAP>,
        sender: &LogSender<'_>,
    ) -> usize {
        let mut queued = 0;
        for record in telemetry.records_since(self.next) {
            let line = LogLine::render(record.timestamp.as_millis(), record);
            if sender.try_send(line).is_ok() {
                queued += 1;
            } else {
                self.dropped = self.dropped.saturating_add(1);
            }
        }
        self.next = telemetry.next_id();
        queued
    }
}

#[cfg(target_os = "none")]
pub fn emit(line: &LogLine) {
    defmt::info!("gate t={=u64}ms {=str}", line.at_ms, line.text.as_str());
}

#[cfg(not(target_os = "none"))]
pub fn emit(line: &LogLine) {
    println!("gate t={}ms {}", line.at_ms, line.text);
}
