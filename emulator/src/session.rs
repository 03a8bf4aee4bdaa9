use std::cell::RefCell;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use crossterm::style::{StyledContent, Stylize};
use gate_core::config::GateConfig;
use gate_core::controller::{GateController, GateStatus};
use gate_core::io::{ALL_INPUTS, ALL_OUTPUTS, GateDriver, GateSensors, InputLine, OutputLine};
use gate_core::storage::{SLOT_LEN, TimeoutStore, decode_timeout};
use gate_core::telemetry::{EventId, TelemetryRecorder};
use gate_core::time::GateInstant;

/// Virtual milliseconds advanced per controller tick.
pub const TICK_MS: u64 = 10;
/// Default end-to-end travel time of the simulated gate.
pub const DEFAULT_TRAVEL: Duration = Duration::from_secs(12);
/// How long `wait` runs before giving up on a moving gate.
const WAIT_LIMIT: Duration = Duration::from_secs(120);
/// Receiver pulse produced by one remote press.
const REMOTE_PULSE: Duration = Duration::from_secs(1);
/// Button contact time for a single press.
const PRESS_LENGTH: Duration = Duration::from_millis(120);
/// Gap between the two presses of a double press.
const PRESS_GAP: Duration = Duration::from_millis(200);
const FLASH_BYTES: usize = 16;
const TELEMETRY_CAPACITY: usize = 256;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("status", "status                 - show position, direction, timers and outputs"),
    ("step", "step [ticks]           - advance the controller (10 ms per tick)"),
    ("run", "run <duration>         - advance virtual time, e.g. `run 2s` or `run 250ms`"),
    ("wait", "wait                   - run until the gate is idle again"),
    ("remote", "remote                 - pulse the remote receiver for 1 s"),
    ("press", "press                  - single press of the limit-set button"),
    ("double", "double                 - double press: arm timeout learning"),
    ("jam", "jam [on|off]           - block gate travel to exercise the safety timeout"),
    ("travel", "travel <duration>      - set end-to-end travel time"),
    ("slot", "slot                   - show the persisted timeout slot"),
    ("reboot", "reboot                 - power-cycle the controller, keeping flash"),
    ("help", "help [topic]           - show help for a command"),
];

/// Monotonic instant driven by the simulation clock.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct SimInstant(u64);

impl SimInstant {
    pub fn from_millis(ms: u64) -> Self {
        Self(ms.saturating_mul(1_000))
    }

    pub fn as_millis(self) -> u64 {
        self.0 / 1_000
    }
}

impl GateInstant for SimInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }
}

#[derive(Copy, Clone, Debug)]
struct Pulse {
    line: InputLine,
    from_ms: u64,
    until_ms: u64,
}

/// Simulated wiring, motor and flash shared by every adapter.
#[derive(Debug)]
struct World {
    now_ms: u64,
    outputs: [bool; OutputLine::COUNT],
    travel_ms: u64,
    /// 0 = fully closed, `travel_ms` = fully open.
    gate_ms: u64,
    jammed: bool,
    pulses: Vec<Pulse>,
    flash: [u8; FLASH_BYTES],
}

impl World {
    fn new(travel: Duration) -> Self {
        Self {
            now_ms: 0,
            outputs: [false; OutputLine::COUNT],
            travel_ms: duration_ms(travel),
            gate_ms: 0,
            jammed: false,
            pulses: Vec::new(),
            flash: [0xFF; FLASH_BYTES],
        }
    }

    fn output(&self, line: OutputLine) -> bool {
        self.outputs[line.as_index()]
    }

    fn input(&self, line: InputLine) -> bool {
        match line {
            InputLine::OpenLimit => self.gate_ms >= self.travel_ms,
            InputLine::ClosedLimit => self.gate_ms == 0,
            InputLine::RemoteSignal | InputLine::LimitSetButton => self
                .pulses
                .iter()
                .any(|pulse| pulse.line == line && (pulse.from_ms..pulse.until_ms).contains(&self.now_ms)),
        }
    }

    fn schedule(&mut self, line: InputLine, delay: Duration, length: Duration) {
        let from_ms = self.now_ms + duration_ms(delay);
        self.pulses.push(Pulse {
            line,
            from_ms,
            until_ms: from_ms + duration_ms(length),
        });
    }

    fn pulses_pending(&self) -> bool {
        !self.pulses.is_empty()
    }

    fn advance(&mut self, step_ms: u64) {
        self.now_ms += step_ms;
        let now = self.now_ms;
        self.pulses.retain(|pulse| pulse.until_ms > now);

        if self.jammed {
            return;
        }
        match (self.output(OutputLine::OpenRelay), self.output(OutputLine::CloseRelay)) {
            (true, false) => self.gate_ms = (self.gate_ms + step_ms).min(self.travel_ms),
            (false, true) => self.gate_ms = self.gate_ms.saturating_sub(step_ms),
            _ => {}
        }
    }

    fn travel_percent(&self) -> u64 {
        if self.travel_ms == 0 {
            return 100;
        }
        self.gate_ms * 100 / self.travel_ms
    }
}

struct SimSensors(Rc<RefCell<World>>);

impl GateSensors for SimSensors {
    fn read(&mut self, line: InputLine) -> bool {
        self.0.borrow().input(line)
    }
}

struct SimDriver(Rc<RefCell<World>>);

impl GateDriver for SimDriver {
    fn apply(&mut self, line: OutputLine, asserted: bool) {
        self.0.borrow_mut().outputs[line.as_index()] = asserted;
    }

    fn release_all(&mut self) {
        self.0.borrow_mut().outputs = [false; OutputLine::COUNT];
    }

    fn hold(&mut self, duration: Duration) {
        // Indicator holds block the controller; the world keeps moving.
        let mut world = self.0.borrow_mut();
        let mut remaining = duration_ms(duration);
        while remaining > 0 {
            let step = remaining.min(TICK_MS);
            world.advance(step);
            remaining -= step;
        }
    }
}

struct SimFlash(Rc<RefCell<World>>);

impl TimeoutStore for SimFlash {
    type Error = &'static str;

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        let world = self.0.borrow();
        let range = flash_range(address, buf.len())?;
        buf.copy_from_slice(&world.flash[range]);
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<(), Self::Error> {
        let mut world = self.0.borrow_mut();
        let range = flash_range(address, data.len())?;
        world.flash[range].copy_from_slice(data);
        Ok(())
    }
}

fn flash_range(address: u32, len: usize) -> Result<std::ops::Range<usize>, &'static str> {
    let start = usize::try_from(address).map_err(|_| "address out of range")?;
    let end = start.checked_add(len).ok_or("address out of range")?;
    if end > FLASH_BYTES {
        return Err("access past end of flash");
    }
    Ok(start..end)
}

type EmuController = GateController<SimSensors, SimDriver, SimFlash, SimInstant>;

/// Interactive simulation of one gate installation.
pub struct Session {
    world: Rc<RefCell<World>>,
    controller: EmuController,
    telemetry: TelemetryRecorder<SimInstant, TELEMETRY_CAPACITY>,
    cursor: EventId,
    config: GateConfig,
    transcript: Option<TranscriptLogger>,
    styled: bool,
}

impl Session {
    pub fn new(config: GateConfig, transcript: Option<&Path>, styled: bool) -> io::Result<Self> {
        let world = Rc::new(RefCell::new(World::new(DEFAULT_TRAVEL)));
        let controller = build_controller(&world, config);
        let transcript = transcript.map(TranscriptLogger::new).transpose()?;

        let mut session = Self {
            world,
            controller,
            telemetry: TelemetryRecorder::new(),
            cursor: 0,
            config,
            transcript,
            styled,
        };
        session.power_on();
        Ok(session)
    }

    /// Lines produced by the power-on sequence.
    pub fn banner(&mut self) -> io::Result<Vec<String>> {
        let mut lines = self.drain_events();
        lines.push(self.status_line());
        self.record_output(&lines)?;
        Ok(lines)
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }
        let at = self.now_ms();
        if let Some(transcript) = self.transcript.as_mut() {
            transcript.append_line(at, TranscriptRole::Host, trimmed)?;
        }

        let mut words = trimmed.split_whitespace();
        let verb = words.next().unwrap_or_default().to_ascii_lowercase();
        let argument = words.next();

        let mut lines = match (verb.as_str(), argument) {
            ("help", topic) => help(topic),
            ("status", None) => self.status(),
            ("step", ticks) => match ticks.map_or(Ok(1), str::parse::<u64>) {
                Ok(ticks) => {
                    self.run_ticks(ticks);
                    self.after_run()
                }
                Err(_) => vec!["ERR step expects a tick count".to_string()],
            },
            ("run", Some(text)) => match parse_duration(text) {
                Ok(duration) => {
                    self.run_for(duration);
                    self.after_run()
                }
                Err(err) => vec![format!("ERR run {err}")],
            },
            ("wait", None) => {
                let settled = self.run_until_idle();
                let mut lines = self.after_run();
                if !settled {
                    lines.push(format!(
                        "WARN gate still moving after {}s",
                        WAIT_LIMIT.as_secs()
                    ));
                }
                lines
            }
            ("remote", None) => {
                self.world
                    .borrow_mut()
                    .schedule(InputLine::RemoteSignal, Duration::ZERO, REMOTE_PULSE);
                self.run_while_pulsing();
                self.after_run()
            }
            ("press", None) => {
                self.press(1);
                self.after_run()
            }
            ("double", None) => {
                self.press(2);
                self.after_run()
            }
            ("jam", state) => match state.map_or(Some(true), parse_switch) {
                Some(jammed) => {
                    self.world.borrow_mut().jammed = jammed;
                    vec![format!("OK jam {}", if jammed { "on" } else { "off" })]
                }
                None => vec!["ERR jam expects on|off".to_string()],
            },
            ("travel", Some(text)) => match parse_duration(text) {
                Ok(duration) if !duration.is_zero() => {
                    let mut world = self.world.borrow_mut();
                    let percent = world.travel_percent();
                    world.travel_ms = duration_ms(duration);
                    world.gate_ms = world.travel_ms * percent / 100;
                    vec![format!("OK travel {}", format_duration(duration))]
                }
                Ok(_) => vec!["ERR travel must be non-zero".to_string()],
                Err(err) => vec![format!("ERR travel {err}")],
            },
            ("slot", None) => vec![self.slot_line()],
            ("reboot", None) => {
                self.controller = build_controller(&self.world, self.config);
                self.power_on();
                let mut lines = vec!["OK reboot".to_string()];
                lines.extend(self.drain_events());
                lines
            }
            _ => vec![format!("ERR unknown command `{trimmed}` (try `help`)")],
        };

        if lines.is_empty() {
            lines.push("OK".to_string());
        }
        self.record_output(&lines)?;
        Ok(lines)
    }

    fn power_on(&mut self) {
        self.world.borrow_mut().outputs = [false; OutputLine::COUNT];
        let now = self.instant();
        self.controller.startup(&mut self.telemetry, now);
    }

    fn now_ms(&self) -> u64 {
        self.world.borrow().now_ms
    }

    fn instant(&self) -> SimInstant {
        SimInstant::from_millis(self.now_ms())
    }

    fn tick(&mut self) {
        self.world.borrow_mut().advance(TICK_MS);
        let now = self.instant();
        self.controller.tick(&mut self.telemetry, now);
    }

    fn run_ticks(&mut self, ticks: u64) {
        for _ in 0..ticks {
            self.tick();
        }
    }

    fn run_for(&mut self, duration: Duration) {
        self.run_ticks(duration_ms(duration).div_ceil(TICK_MS));
    }

    fn run_while_pulsing(&mut self) {
        while self.world.borrow().pulses_pending() {
            self.tick();
        }
        // Let the cooldown and press window settle.
        self.run_for(self.config.input_cooldown.max(self.config.press_window));
    }

    fn run_until_idle(&mut self) -> bool {
        let limit = duration_ms(WAIT_LIMIT);
        let start = self.now_ms();
        while self.controller.movement_direction().is_moving() {
            if self.now_ms() - start >= limit {
                return false;
            }
            self.tick();
        }
        true
    }

    fn press(&mut self, count: u32) {
        let mut world = self.world.borrow_mut();
        for index in 0..count {
            let delay = (PRESS_LENGTH + PRESS_GAP) * index;
            world.schedule(InputLine::LimitSetButton, delay, PRESS_LENGTH);
        }
        drop(world);
        self.run_while_pulsing();
    }

    fn after_run(&mut self) -> Vec<String> {
        let mut lines = self.drain_events();
        lines.push(self.status_line());
        lines
    }

    fn drain_events(&mut self) -> Vec<String> {
        let lines = self
            .telemetry
            .records_since(self.cursor)
            .map(|record| format!("  [{:>7} ms] {record}", record.timestamp.as_millis()))
            .collect();
        self.cursor = self.telemetry.next_id();
        lines
    }

    fn status(&self) -> Vec<String> {
        let status = self.controller.snapshot();
        let world = self.world.borrow();
        let mut lines = vec![
            format!("t=+{}ms", world.now_ms),
            format_status(&status),
            format!(
                "gate travel={}% of {} jam={}",
                world.travel_percent(),
                format_duration(Duration::from_millis(world.travel_ms)),
                if world.jammed { "on" } else { "off" },
            ),
        ];
        for pin in &ALL_INPUTS {
            lines.push(format!(
                "  in  {:<13} {:<4} {}",
                pin.name,
                pin.mcu_pin,
                level_label(world.input(pin.line))
            ));
        }
        for pin in &ALL_OUTPUTS {
            lines.push(format!(
                "  out {:<13} {:<4} {}",
                pin.name,
                pin.mcu_pin,
                level_label(world.output(pin.line))
            ));
        }
        lines
    }

    fn status_line(&self) -> String {
        let status = self.controller.snapshot();
        let world = self.world.borrow();
        let leds = [
            (OutputLine::OpenLed, "OPEN"),
            (OutputLine::CloseLed, "CLOSE"),
            (OutputLine::IdleLed, "IDLE"),
        ]
        .iter()
        .map(|(line, label)| self.led(label, world.output(*line)))
        .collect::<Vec<_>>()
        .join(" ");
        format!(
            "t=+{}ms {} {} timeout={} [{}]",
            world.now_ms,
            position_label(&status),
            status.direction.label(),
            format_duration(status.active_timeout),
            leds
        )
    }

    fn led(&self, label: &str, lit: bool) -> String {
        if !self.styled {
            return if lit { label.to_string() } else { label.to_ascii_lowercase() };
        }
        let styled: StyledContent<&str> = if lit {
            label.bold().green()
        } else {
            label.dark_grey()
        };
        styled.to_string()
    }

    fn slot_line(&self) -> String {
        let world = self.world.borrow();
        let address = self.config.timeout_address;
        let Ok(range) = flash_range(address, SLOT_LEN) else {
            return format!("slot@{address} outside simulated flash");
        };
        let mut bytes = [0u8; SLOT_LEN];
        bytes.copy_from_slice(&world.flash[range]);
        let decoded = match decode_timeout::<&'static str>(bytes) {
            Ok(Some(timeout)) => format_duration(timeout),
            Ok(None) => "erased".to_string(),
            Err(err) => err.to_string(),
        };
        format!("slot@{address} {bytes:02X?} => {decoded}")
    }

    fn record_output(&mut self, lines: &[String]) -> io::Result<()> {
        let at = self.now_ms();
        if let Some(transcript) = self.transcript.as_mut() {
            for line in lines {
                transcript.append_line(at, TranscriptRole::Emulator, line)?;
            }
        }
        Ok(())
    }
}

fn build_controller(world: &Rc<RefCell<World>>, config: GateConfig) -> EmuController {
    GateController::new(
        SimSensors(Rc::clone(world)),
        SimDriver(Rc::clone(world)),
        SimFlash(Rc::clone(world)),
        config,
    )
}

fn help(topic: Option<&str>) -> Vec<String> {
    match topic {
        Some(target) => match HELP_TOPICS
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(target))
        {
            Some((_, detail)) => vec![(*detail).to_string()],
            None => vec![
                format!("No help available for `{target}`."),
                format!("Available topics: {}", help_topic_list()),
            ],
        },
        None => {
            let mut lines = vec!["Available commands:".to_string()];
            lines.extend(HELP_TOPICS.iter().map(|(_, detail)| format!("  {detail}")));
            lines.push("Type `help <topic>` for a specific command.".to_string());
            lines
        }
    }
}

fn help_topic_list() -> String {
    HELP_TOPICS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_status(status: &GateStatus) -> String {
    format!(
        "position={} direction={} last={} learning={} safety={:?}/{} cooldown={:?}",
        position_label(status),
        status.direction.label(),
        status.last_direction.label(),
        match (status.learning_armed, status.learning_recording) {
            (_, true) => "recording",
            (true, false) => "armed",
            (false, false) => "off",
        },
        status.safety_timer,
        format_duration(status.active_timeout),
        status.cooldown_timer,
    )
}

fn position_label(status: &GateStatus) -> String {
    format!("{:?}", status.position).to_ascii_lowercase()
}

fn level_label(asserted: bool) -> &'static str {
    if asserted { "high" } else { "low" }
}

fn parse_switch(text: &str) -> Option<bool> {
    match text.to_ascii_lowercase().as_str() {
        "on" | "1" | "true" => Some(true),
        "off" | "0" | "false" => Some(false),
        _ => None,
    }
}

/// Parses `250ms`, `2s` or `1.5s`. A bare number is milliseconds.
pub fn parse_duration(text: &str) -> Result<Duration, String> {
    let text = text.trim().to_ascii_lowercase();
    if let Some(ms) = text.strip_suffix("ms") {
        return ms
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| format!("invalid milliseconds `{ms}`"));
    }
    if let Some(secs) = text.strip_suffix('s') {
        return secs
            .parse::<f64>()
            .ok()
            .and_then(|value| Duration::try_from_secs_f64(value).ok())
            .ok_or_else(|| format!("invalid seconds `{secs}`"));
    }
    text.parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| format!("invalid duration `{text}`"))
}

fn format_duration(duration: Duration) -> String {
    let ms = duration.as_millis();
    if ms % 1_000 == 0 {
        format!("{}s", ms / 1_000)
    } else {
        format!("{}.{:03}s", ms / 1_000, ms % 1_000)
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        logger.write_header(path)?;
        Ok(logger)
    }

    fn write_header(&mut self, path: &Path) -> io::Result<()> {
        writeln!(
            self.writer,
            "# Gate controller emulator transcript ({})",
            path.display()
        )?;
        writeln!(self.writer, "# Timestamps are virtual milliseconds since power-on")?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, at_ms: u64, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(self.writer, "[+{at_ms:>7} ms] {} {line}", role.prefix())?;
        self.writer.flush()
    }
}

#[derive(Copy, Clone)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}
