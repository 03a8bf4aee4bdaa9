//! Telemetry event catalog and ring buffer shared by firmware and host targets.
//!
//! Every observable controller transition is captured as a typed
//! [`GateEventKind`] with an optional payload. Events encode to compact
//! numeric codes so diagnostics sinks can forward them cheaply. Removing
//! every consumer of this module never changes controller behaviour.

use core::{fmt, time::Duration};

use heapless::HistoryBuf;

use crate::machine::MovementDirection;
use crate::position::Position;

/// Monotonic identifier assigned to each record.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Input that produced an accepted command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandSource {
    Remote,
    Button,
}

/// Classified limit-set button gesture.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Gesture {
    SinglePress,
    DoublePress,
    /// More presses than any gesture uses; ignored.
    Overflow,
}

/// Which storage access failed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StorageAccess {
    Load,
    Save,
}

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum GateEventKind {
    TimeoutLoaded,
    PositionChanged(Position),
    GestureDetected(Gesture),
    CommandAccepted(CommandSource),
    MovementStarted(MovementDirection),
    LimitReached(Position),
    StoppedByCommand,
    SafetyTimeout,
    LearningArmed,
    LearningStarted,
    LearningDiscarded,
    TimeoutAdopted,
    TimeoutRejected,
    StorageFault(StorageAccess),
    Custom(u16),
}

impl fmt::Display for GateEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateEventKind::TimeoutLoaded => f.write_str("timeout-loaded"),
            GateEventKind::PositionChanged(position) => {
                write!(f, "position-changed {}", position_label(*position))
            }
            GateEventKind::GestureDetected(gesture) => {
                write!(f, "gesture {}", gesture_label(*gesture))
            }
            GateEventKind::CommandAccepted(source) => write!(
                f,
                "command-accepted {}",
                match source {
                    CommandSource::Remote => "remote",
                    CommandSource::Button => "button",
                }
            ),
            GateEventKind::MovementStarted(direction) => {
                write!(f, "movement-started {}", direction.label())
            }
            GateEventKind::LimitReached(position) => {
                write!(f, "limit-reached {}", position_label(*position))
            }
            GateEventKind::StoppedByCommand => f.write_str("stopped-by-command"),
            GateEventKind::SafetyTimeout => f.write_str("safety-timeout"),
            GateEventKind::LearningArmed => f.write_str("learning-armed"),
            GateEventKind::LearningStarted => f.write_str("learning-started"),
            GateEventKind::LearningDiscarded => f.write_str("learning-discarded"),
            GateEventKind::TimeoutAdopted => f.write_str("timeout-adopted"),
            GateEventKind::TimeoutRejected => f.write_str("timeout-rejected"),
            GateEventKind::StorageFault(access) => write!(
                f,
                "storage-fault {}",
                match access {
                    StorageAccess::Load => "load",
                    StorageAccess::Save => "save",
                }
            ),
            GateEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl GateEventKind {
    const TIMEOUT_LOADED_CODE: u16 = 0x0001;
    const STOPPED_BY_COMMAND_CODE: u16 = 0x0002;
    const SAFETY_TIMEOUT_CODE: u16 = 0x0003;
    const LEARNING_ARMED_CODE: u16 = 0x0004;
    const LEARNING_STARTED_CODE: u16 = 0x0005;
    const LEARNING_DISCARDED_CODE: u16 = 0x0006;
    const TIMEOUT_ADOPTED_CODE: u16 = 0x0007;
    const TIMEOUT_REJECTED_CODE: u16 = 0x0008;
    const POSITION_BASE: u16 = 0x0010;
    const LIMIT_BASE: u16 = 0x0014;
    const MOVEMENT_BASE: u16 = 0x0018;
    const GESTURE_BASE: u16 = 0x001C;
    const COMMAND_BASE: u16 = 0x0020;
    const STORAGE_BASE: u16 = 0x0024;
    const STORAGE_END: u16 = 0x0028;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            GateEventKind::TimeoutLoaded => Self::TIMEOUT_LOADED_CODE,
            GateEventKind::PositionChanged(position) => {
                Self::POSITION_BASE + position_index(position)
            }
            GateEventKind::GestureDetected(gesture) => Self::GESTURE_BASE + gesture_index(gesture),
            GateEventKind::CommandAccepted(source) => Self::COMMAND_BASE + source_index(source),
            GateEventKind::MovementStarted(direction) => {
                Self::MOVEMENT_BASE + direction_index(direction)
            }
            GateEventKind::LimitReached(position) => Self::LIMIT_BASE + position_index(position),
            GateEventKind::StoppedByCommand => Self::STOPPED_BY_COMMAND_CODE,
            GateEventKind::SafetyTimeout => Self::SAFETY_TIMEOUT_CODE,
            GateEventKind::LearningArmed => Self::LEARNING_ARMED_CODE,
            GateEventKind::LearningStarted => Self::LEARNING_STARTED_CODE,
            GateEventKind::LearningDiscarded => Self::LEARNING_DISCARDED_CODE,
            GateEventKind::TimeoutAdopted => Self::TIMEOUT_ADOPTED_CODE,
            GateEventKind::TimeoutRejected => Self::TIMEOUT_REJECTED_CODE,
            GateEventKind::StorageFault(access) => Self::STORAGE_BASE + access_index(access),
            GateEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`GateEventKind::Custom`].
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        let decoded = match code {
            Self::TIMEOUT_LOADED_CODE => Some(GateEventKind::TimeoutLoaded),
            Self::STOPPED_BY_COMMAND_CODE => Some(GateEventKind::StoppedByCommand),
            Self::SAFETY_TIMEOUT_CODE => Some(GateEventKind::SafetyTimeout),
            Self::LEARNING_ARMED_CODE => Some(GateEventKind::LearningArmed),
            Self::LEARNING_STARTED_CODE => Some(GateEventKind::LearningStarted),
            Self::LEARNING_DISCARDED_CODE => Some(GateEventKind::LearningDiscarded),
            Self::TIMEOUT_ADOPTED_CODE => Some(GateEventKind::TimeoutAdopted),
            Self::TIMEOUT_REJECTED_CODE => Some(GateEventKind::TimeoutRejected),
            value if (Self::POSITION_BASE..Self::LIMIT_BASE).contains(&value) => {
                position_from_index(value - Self::POSITION_BASE).map(GateEventKind::PositionChanged)
            }
            value if (Self::LIMIT_BASE..Self::MOVEMENT_BASE).contains(&value) => {
                position_from_index(value - Self::LIMIT_BASE).map(GateEventKind::LimitReached)
            }
            value if (Self::MOVEMENT_BASE..Self::GESTURE_BASE).contains(&value) => {
                direction_from_index(value - Self::MOVEMENT_BASE)
                    .map(GateEventKind::MovementStarted)
            }
            value if (Self::GESTURE_BASE..Self::COMMAND_BASE).contains(&value) => {
                gesture_from_index(value - Self::GESTURE_BASE).map(GateEventKind::GestureDetected)
            }
            value if (Self::COMMAND_BASE..Self::STORAGE_BASE).contains(&value) => {
                source_from_index(value - Self::COMMAND_BASE).map(GateEventKind::CommandAccepted)
            }
            value if (Self::STORAGE_BASE..Self::STORAGE_END).contains(&value) => {
                access_from_index(value - Self::STORAGE_BASE).map(GateEventKind::StorageFault)
            }
            _ => None,
        };

        decoded.unwrap_or(GateEventKind::Custom(code))
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    /// No additional metadata accompanies the event.
    None,
    /// Safety timeout now in force.
    Timeout(Duration),
    /// How long the motor ran before the movement ended.
    Movement(MovementTelemetry),
    /// Result of a closed-out learning cycle.
    Learning(LearningTelemetry),
    /// Presses counted in one sampling window.
    Presses(u8),
}

impl TelemetryPayload {
    /// Convenience constructor when no payload data is needed.
    #[must_use]
    pub const fn none() -> Self {
        TelemetryPayload::None
    }
}

impl fmt::Display for TelemetryPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryPayload::None => Ok(()),
            TelemetryPayload::Timeout(timeout) => write!(f, "timeout={timeout:?}"),
            TelemetryPayload::Movement(details) => {
                write!(f, "ran={:?} limit={:?}", details.ran_for, details.timeout)
            }
            TelemetryPayload::Learning(details) => write!(
                f,
                "measured={:?} candidate={:?} active={:?}",
                details.measured, details.candidate, details.active
            ),
            TelemetryPayload::Presses(count) => write!(f, "presses={count}"),
        }
    }
}

/// Movement summary payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MovementTelemetry {
    pub ran_for: Duration,
    pub timeout: Duration,
}

impl MovementTelemetry {
    #[must_use]
    pub const fn new(ran_for: Duration, timeout: Duration) -> Self {
        Self { ran_for, timeout }
    }
}

/// Learning cycle payload.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LearningTelemetry {
    pub measured: Duration,
    pub candidate: Duration,
    pub active: Duration,
}

impl LearningTelemetry {
    #[must_use]
    pub const fn new(measured: Duration, candidate: Duration, active: Duration) -> Self {
        Self {
            measured,
            candidate,
            active,
        }
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: GateEventKind,
    pub details: TelemetryPayload,
}

impl<TInstant> fmt::Display for TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.event)?;
        if self.details != TelemetryPayload::None {
            write!(f, " {}", self.details)?;
        }
        Ok(())
    }
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &TelemetryRecord<TInstant>> + '_ {
        self.ring.oldest_ordered()
    }

    /// Returns records whose id is at or after `cursor`, oldest first.
    ///
    /// Pair with [`next_id`](Self::next_id) to drain only new records each
    /// tick. Records already overwritten by the ring are skipped.
    pub fn records_since(
        &self,
        cursor: EventId,
    ) -> impl Iterator<Item = &TelemetryRecord<TInstant>> + '_ {
        let next = self.next_event_id;
        let span = next.wrapping_sub(cursor);
        self.ring
            .oldest_ordered()
            .filter(move |record| next.wrapping_sub(record.id) <= span)
    }

    /// Identifier the next recorded event will receive.
    #[must_use]
    pub const fn next_id(&self) -> EventId {
        self.next_event_id
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records an event with the supplied payload.
    pub fn record(
        &mut self,
        event: GateEventKind,
        payload: TelemetryPayload,
        timestamp: TInstant,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }

    /// Records an event without a payload.
    pub fn record_event(&mut self, event: GateEventKind, timestamp: TInstant) -> EventId {
        self.record(event, TelemetryPayload::none(), timestamp)
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

const fn position_label(position: Position) -> &'static str {
    match position {
        Position::Unknown => "unknown",
        Position::Open => "open",
        Position::Closed => "closed",
    }
}

const fn gesture_label(gesture: Gesture) -> &'static str {
    match gesture {
        Gesture::SinglePress => "single-press",
        Gesture::DoublePress => "double-press",
        Gesture::Overflow => "overflow",
    }
}

const fn position_index(position: Position) -> u16 {
    match position {
        Position::Unknown => 0,
        Position::Open => 1,
        Position::Closed => 2,
    }
}

fn position_from_index(index: u16) -> Option<Position> {
    match index {
        0 => Some(Position::Unknown),
        1 => Some(Position::Open),
        2 => Some(Position::Closed),
        _ => None,
    }
}

const fn direction_index(direction: MovementDirection) -> u16 {
    match direction {
        MovementDirection::Idle => 0,
        MovementDirection::Opening => 1,
        MovementDirection::Closing => 2,
    }
}

fn direction_from_index(index: u16) -> Option<MovementDirection> {
    match index {
        0 => Some(MovementDirection::Idle),
        1 => Some(MovementDirection::Opening),
        2 => Some(MovementDirection::Closing),
        _ => None,
    }
}

const fn gesture_index(gesture: Gesture) -> u16 {
    match gesture {
        Gesture::SinglePress => 0,
        Gesture::DoublePress => 1,
        Gesture::Overflow => 2,
    }
}

fn gesture_from_index(index: u16) -> Option<Gesture> {
    match index {
        0 => Some(Gesture::SinglePress),
        1 => Some(Gesture::DoublePress),
        2 => Some(Gesture::Overflow),
        _ => None,
    }
}

const fn source_index(source: CommandSource) -> u16 {
    match source {
        CommandSource::Remote => 0,
        CommandSource::Button => 1,
    }
}

fn source_from_index(index: u16) -> Option<CommandSource> {
    match index {
        0 => Some(CommandSource::Remote),
        1 => Some(CommandSource::Button),
        _ => None,
    }
}

const fn access_index(access: StorageAccess) -> u16 {
    match access {
        StorageAccess::Load => 0,
        StorageAccess::Save => 1,
    }
}

fn access_from_index(index: u16) -> Option<StorageAccess> {
    match index {
        0 => Some(StorageAccess::Load),
        1 => Some(StorageAccess::Save),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use core::fmt::Write;

    use super::*;
    use crate::testing::MockInstant;

    #[test]
    fn raw_codes_decode_to_the_same_event() {
        let fixtures = [
            GateEventKind::TimeoutLoaded,
            GateEventKind::PositionChanged(Position::Closed),
            GateEventKind::LimitReached(Position::Open),
            GateEventKind::MovementStarted(MovementDirection::Closing),
            GateEventKind::GestureDetected(Gesture::DoublePress),
            GateEventKind::CommandAccepted(CommandSource::Button),
            GateEventKind::StorageFault(StorageAccess::Save),
            GateEventKind::SafetyTimeout,
            GateEventKind::TimeoutRejected,
        ];

        for event in fixtures {
            assert_eq!(GateEventKind::from_raw(event.to_raw()), event);
        }
    }

    #[test]
    fn unknown_codes_fall_back_to_custom() {
        assert_eq!(GateEventKind::from_raw(0x0013), GateEventKind::Custom(0x0013));
        assert_eq!(GateEventKind::from_raw(0x7000), GateEventKind::Custom(0x7000));
        assert_eq!(GateEventKind::Custom(0x7000).to_raw(), 0x7000);
    }

    #[test]
    fn ids_increase_and_latest_tracks_last_write() {
        let mut recorder = TelemetryRecorder::<MockInstant>::new();
        assert!(recorder.is_empty());

        let first = recorder.record_event(GateEventKind::TimeoutLoaded, MockInstant::millis(0));
        let second = recorder.record(
            GateEventKind::SafetyTimeout,
            TelemetryPayload::Movement(MovementTelemetry::new(
                Duration::from_secs(31),
                Duration::from_secs(30),
            )),
            MockInstant::millis(31_000),
        );

        assert_eq!((first, second), (0, 1));
        assert_eq!(recorder.len(), 2);
        let latest = recorder.latest().copied().unwrap();
        assert_eq!(latest.event, GateEventKind::SafetyTimeout);
        assert_eq!(latest.timestamp, MockInstant::millis(31_000));
    }

    #[test]
    fn records_since_returns_only_new_entries() {
        let mut recorder = TelemetryRecorder::<MockInstant, 4>::new();
        recorder.record_event(GateEventKind::LearningArmed, MockInstant::millis(0));
        let cursor = recorder.next_id();

        recorder.record_event(GateEventKind::LearningStarted, MockInstant::millis(1));
        recorder.record_event(GateEventKind::TimeoutAdopted, MockInstant::millis(2));

        let events: heapless::Vec<_, 4> = recorder
            .records_since(cursor)
            .map(|record| record.event)
            .collect();
        assert_eq!(
            events.as_slice(),
            &[GateEventKind::LearningStarted, GateEventKind::TimeoutAdopted]
        );
        assert_eq!(recorder.records_since(recorder.next_id()).count(), 0);
    }

    #[test]
    fn ring_keeps_only_the_newest_records() {
        let mut recorder = TelemetryRecorder::<MockInstant, 4>::new();
        for tick in 0..6 {
            recorder.record_event(GateEventKind::Custom(tick), MockInstant::millis(u64::from(tick)));
        }

        assert_eq!(recorder.len(), 4);
        let first = recorder.oldest_first().next().copied().unwrap();
        assert_eq!(first.id, 2);
        assert_eq!(recorder.records_since(0).count(), 4);
    }

    #[test]
    fn records_render_event_and_payload() {
        let mut recorder = TelemetryRecorder::<MockInstant>::new();
        recorder.record(
            GateEventKind::TimeoutAdopted,
            TelemetryPayload::Learning(LearningTelemetry::new(
                Duration::from_secs(12),
                Duration::from_millis(13_200),
                Duration::from_secs(10),
            )),
            MockInstant::millis(0),
        );
        recorder.record_event(
            GateEventKind::PositionChanged(Position::Unknown),
            MockInstant::millis(1),
        );

        let mut lines = heapless::Vec::<heapless::String<96>, 2>::new();
        for record in recorder.oldest_first() {
            let mut line = heapless::String::new();
            write!(line, "{record}").unwrap();
            lines.push(line).unwrap();
        }

        assert_eq!(
            lines[0].as_str(),
            "#0 timeout-adopted measured=12s candidate=13.2s active=10s"
        );
        assert_eq!(lines[1].as_str(), "#1 position-changed unknown");
    }
}
