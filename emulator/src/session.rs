use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use turntable_core::bindings::{BINDING_COUNT, Bindings};
use turntable_core::hid::report::HidReportState;
use turntable_core::led::LedHandler;
use turntable_core::link::{DjFrame, ExtensionBus, TurntableState};
use turntable_core::profile::{AdapterConfig, DisconnectIndication};
use turntable_core::side_select::TurntableConfig;
use turntable_core::{Adapter, Millis};

use crate::sim::{ConsoleLed, FileStore, NoDelay, SimPresence, SimTurntable, table_mut};

const HID_SLOTS: usize = 16;
const _: () = assert!(HID_SLOTS >= BINDING_COUNT);
/// How long `press` holds an input.
const TAP_MS: Millis = 50;
const MAX_WAIT_MS: Millis = 60_000;
const DIAL_POSITIONS: i16 = 32;

pub type EmulatedAdapter =
    Adapter<ExtensionBus<SimTurntable, NoDelay>, SimPresence, ConsoleLed, FileStore, HID_SLOTS>;

pub const HELP_TOPICS: &[(&str, &str)] = &[
    ("plug", "plug                       - connect the turntable"),
    ("unplug", "unplug                     - pull the turntable out"),
    ("fail", "fail                       - toggle bus errors while plugged in"),
    ("hold", "hold <input>               - press an input and keep it down"),
    ("release", "release <input>            - let go of a held input"),
    ("press", "press <input>              - tap an input for 50 ms"),
    ("spin", "spin <left|right> <speed>  - set platter speed (-32..31)"),
    ("stick", "stick <x> <y>              - move the stick (0..63, 32 is centre)"),
    ("dial", "dial <delta>               - turn the effect dial one notch per poll"),
    ("wait", "wait <ms>                  - advance the clock"),
    ("status", "status                     - show adapter state"),
    ("help", "help [topic]               - show help for a command"),
];

const INPUT_NAMES: &str = "euphoria, plus, minus, <left|right>-<red|green|blue>";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Color {
    Red,
    Green,
    Blue,
}

impl Color {
    fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "red" => Some(Self::Red),
            "green" => Some(Self::Green),
            "blue" => Some(Self::Blue),
            _ => None,
        }
    }

    fn slot(self, table: &mut TurntableState) -> &mut bool {
        match self {
            Color::Red => &mut table.red,
            Color::Green => &mut table.green,
            Color::Blue => &mut table.blue,
        }
    }
}

/// Canned command scripts recorded by `capture_transcripts`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scenario {
    SideSelect,
    Unplug,
}

impl Scenario {
    pub fn log_path(self) -> &'static str {
        match self {
            Scenario::SideSelect => "transcripts/side-select.log",
            Scenario::Unplug => "transcripts/unplug.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            Scenario::SideSelect => "Turntable emulator side-select transcript",
            Scenario::Unplug => "Turntable emulator unplug transcript",
        }
    }

    pub const ALL: [Scenario; 2] = [Scenario::SideSelect, Scenario::Unplug];

    pub fn commands(self) -> &'static [&'static str] {
        match self {
            Scenario::SideSelect => &[
                "wait 20",
                "spin left 3",
                "spin right -3",
                "wait 20",
                "spin left 0",
                "spin right 0",
                "status",
                "hold euphoria",
                "hold left-blue",
                "wait 1100",
                "release left-blue",
                "release euphoria",
                "press left-green",
                "status",
            ],
            Scenario::Unplug => &[
                "wait 20",
                "hold right-green",
                "dial 4",
                "unplug",
                "wait 200",
                "release right-green",
                "status",
                "plug",
                "wait 600",
                "status",
            ],
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("side-select") {
            Ok(Self::SideSelect)
        } else if tag.eq_ignore_ascii_case("unplug") {
            Ok(Self::Unplug)
        } else {
            Err(format!("Unknown scenario `{tag}`"))
        }
    }
}

pub struct Session {
    adapter: EmulatedAdapter,
    reports: HidReportState,
    bindings: Bindings,
    now: Millis,
    transcript: Option<TranscriptLogger>,
}

impl Session {
    pub fn new(
        store: FileStore,
        indication: DisconnectIndication,
        transcript: Option<TranscriptLogger>,
    ) -> io::Result<Self> {
        let config = AdapterConfig {
            disconnect_indication: indication,
            ..AdapterConfig::DEFAULT
        };
        let side_config = TurntableConfig::new(
            store,
            Some(DjFrame::euphoria_pressed),
            Some(TurntableState::blue_pressed),
            config.config_stable_time,
        );
        let mut adapter = Adapter::new(
            ExtensionBus::new(SimTurntable::new(), NoDelay),
            SimPresence { level: true },
            LedHandler::new(ConsoleLed::default(), false),
            side_config,
            &config,
        );

        let bindings = Bindings::register(adapter.hid_mut())
            .map_err(|err| io::Error::other(err.to_string()))?;

        Ok(Self {
            adapter,
            reports: HidReportState::new(),
            bindings,
            now: 0,
            transcript,
        })
    }

    /// Powers the adapter up and loads the stored main table.
    pub fn boot(&mut self) -> io::Result<Vec<String>> {
        let lines = match self.adapter.begin(self.now) {
            Ok(load) => {
                let mut lines = vec![format!("config: main table {}", load.main)];
                if load.repaired {
                    lines.push("config: stored selection was invalid, reset to right".to_string());
                }
                lines
            }
            Err(err) => vec![format!("ERR storage {err}")],
        };
        self.record_output(&lines)?;
        Ok(lines)
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(transcript) = self.transcript.as_mut() {
            transcript.append_line(self.now, TranscriptRole::Host, trimmed)?;
        }

        let lines = self
            .dispatch(trimmed)
            .unwrap_or_else(|message| vec![format!("ERR {message}")]);
        self.record_output(&lines)?;
        Ok(lines)
    }

    fn dispatch(&mut self, line: &str) -> Result<Vec<String>, String> {
        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or_default().to_ascii_lowercase();
        let args: Vec<&str> = words.collect();

        match (command.as_str(), args.as_slice()) {
            ("help", []) => Ok(help(None)),
            ("help", [topic]) => Ok(help(Some(*topic))),
            ("plug", []) => {
                self.set_plugged(true);
                Ok(vec!["OK plugged in".to_string()])
            }
            ("unplug", []) => {
                self.set_plugged(false);
                Ok(vec!["OK unplugged".to_string()])
            }
            ("fail", []) => {
                let turntable = self.turntable_mut();
                turntable.failing = !turntable.failing;
                let state = if turntable.failing { "on" } else { "off" };
                Ok(vec![format!("OK bus errors {state}")])
            }
            ("hold", [input]) => {
                set_input(self.inputs_mut(), input, true)?;
                Ok(vec![format!("OK holding {input}")])
            }
            ("release", [input]) => {
                set_input(self.inputs_mut(), input, false)?;
                Ok(vec![format!("OK released {input}")])
            }
            ("press", [input]) => {
                set_input(self.inputs_mut(), input, true)?;
                let mut lines = self.advance(TAP_MS);
                set_input(self.inputs_mut(), input, false)?;
                lines.extend(self.advance(1));
                Ok(lines)
            }
            ("spin", [side, speed]) => {
                let speed: i8 = speed
                    .parse()
                    .ok()
                    .filter(|speed| (-32..=31).contains(speed))
                    .ok_or_else(|| format!("speed `{speed}` is not in -32..31"))?;
                let table = table_mut(self.inputs_mut(), side)
                    .ok_or_else(|| format!("no `{side}` platter; use left or right"))?;
                table.speed = speed;
                Ok(vec![format!("OK {side} platter at {speed}")])
            }
            ("stick", [x, y]) => {
                let x = parse_axis(x)?;
                let y = parse_axis(y)?;
                let inputs = self.inputs_mut();
                inputs.stick_x = x;
                inputs.stick_y = y;
                Ok(vec![format!("OK stick at {x},{y}")])
            }
            ("dial", [delta]) => {
                let delta: i16 = delta
                    .parse()
                    .map_err(|_| format!("dial delta `{delta}` is not a number"))?;
                Ok(self.turn_dial(delta))
            }
            ("wait", [ms]) => {
                let ms: Millis = ms
                    .parse()
                    .ok()
                    .filter(|ms| *ms <= MAX_WAIT_MS)
                    .ok_or_else(|| format!("wait takes 0..={MAX_WAIT_MS} ms"))?;
                Ok(self.advance(ms))
            }
            ("status", []) => Ok(self.status()),
            _ => Err(format!("unknown command `{line}`; type `help`")),
        }
    }

    fn turntable_mut(&mut self) -> &mut SimTurntable {
        self.adapter.connection_mut().link_mut().bus_mut()
    }

    fn inputs_mut(&mut self) -> &mut DjFrame {
        &mut self.turntable_mut().inputs
    }

    fn set_plugged(&mut self, plugged: bool) {
        let turntable = self.turntable_mut();
        turntable.plugged = plugged;
        turntable.failing = false;
        self.adapter.connection_mut().detect_mut().pin_mut().level = plugged;
    }

    /// Steps the dial one notch at a time, one poll interval apart, so the
    /// adapter sees it move instead of jump.
    fn turn_dial(&mut self, delta: i16) -> Vec<String> {
        let poll = AdapterConfig::DEFAULT.connection.poll_interval;
        let step = delta.signum();
        let mut lines = Vec::new();
        for _ in 0..delta.unsigned_abs() {
            let inputs = self.inputs_mut();
            let position = (i16::from(inputs.effect_dial) + step).rem_euclid(DIAL_POSITIONS);
            inputs.effect_dial = u8::try_from(position).unwrap_or_default();
            lines.extend(self.advance(poll));
        }
        if lines.is_empty() {
            lines.push(format!("OK dial at {}", self.inputs_mut().effect_dial));
        }
        lines
    }

    /// Runs one tick per simulated millisecond and narrates what changed.
    fn advance(&mut self, ms: Millis) -> Vec<String> {
        let mut lines = Vec::new();
        let led_before = self.led_summary();

        for _ in 0..ms {
            self.now = self.now.wrapping_add(1);
            let report = self.adapter.tick(self.now, &mut self.reports);
            if let Some(event) = report.link {
                lines.push(format!("[{}] link: {event}", self.now));
            }
            if let Some(side) = report.config_written {
                lines.push(format!("[{}] config: main table {side} saved", self.now));
            }
            if let Some(err) = report.store_error {
                lines.push(format!("[{}] ERR storage {err}", self.now));
            }
            if report.fresh
                && let Err(err) = self
                    .bindings
                    .apply_adapter(&mut self.adapter, &mut self.reports)
            {
                lines.push(format!("[{}] ERR bindings {err}", self.now));
            }
            self.drain_reports(&mut lines);
        }

        let led_after = self.led_summary();
        if led_after != led_before {
            lines.push(format!("[{}] led: {led_after}", self.now));
        }
        if lines.is_empty() {
            lines.push(format!("OK t={}ms", self.now));
        }
        lines
    }

    fn drain_reports(&mut self, lines: &mut Vec<String>) {
        if let Some(report) = self.reports.take_keyboard_report() {
            let held: Vec<String> = report
                .keycodes
                .iter()
                .filter(|&&usage| usage != 0)
                .map(|usage| format!("{usage:02x}"))
                .collect();
            lines.push(format!(
                "[{}] hid: keyboard modifiers={:#04x} keys=[{}]",
                self.now,
                report.modifier,
                held.join(" ")
            ));
        }
        if let Some(report) = self.reports.take_mouse_report() {
            lines.push(format!(
                "[{}] hid: mouse buttons={:#04x} wheel={}",
                self.now, report.buttons, report.wheel
            ));
        }
    }

    fn led_summary(&self) -> &'static str {
        let led = self.adapter.led();
        if led.is_blinking() {
            "blinking"
        } else if led.state() {
            "on"
        } else {
            "off"
        }
    }

    fn status(&self) -> Vec<String> {
        let adapter = &self.adapter;
        let turntable = adapter.connection().link().bus();
        let routing = adapter.routing();
        let store = adapter.side_config().store();

        let link = if adapter.is_connected() {
            "connected"
        } else {
            "disconnected"
        };
        let mut lines = vec![
            format!("time: {}ms", self.now),
            format!(
                "controller: {link} (plugged={}, bus errors={})",
                turntable.plugged, turntable.failing
            ),
        ];
        if let Some(frame) = adapter.frame() {
            lines.push(format!(
                "layout: {:?} ({} turntables)",
                frame.layout,
                frame.turntable_count()
            ));
        }
        lines.push(format!("main table: {} (alt {})", routing.main(), routing.alt()));
        lines.push(format!("effect total: {}", adapter.effects().total()));
        lines.push(format!(
            "hid: {} of {} buttons held",
            adapter
                .hid()
                .iter()
                .filter(|(_, button)| button.is_pressed())
                .count(),
            adapter.hid().len()
        ));
        lines.push(format!("led: {}", self.led_summary()));
        lines.push(format!(
            "store: {} ({} writes this session)",
            store.path().display(),
            store.writes()
        ));
        lines
    }

    fn record_output(&mut self, lines: &[String]) -> io::Result<()> {
        if let Some(transcript) = self.transcript.as_mut() {
            for line in lines {
                transcript.append_line(self.now, TranscriptRole::Emulator, line)?;
            }
        }
        Ok(())
    }
}

fn set_input(frame: &mut DjFrame, name: &str, pressed: bool) -> Result<(), String> {
    let unknown = || format!("unknown input `{name}`; inputs are {INPUT_NAMES}");
    let slot = match name.to_ascii_lowercase().as_str() {
        "euphoria" => &mut frame.euphoria,
        "plus" => &mut frame.plus,
        "minus" => &mut frame.minus,
        other => {
            let (side, color) = other.split_once('-').ok_or_else(unknown)?;
            let color = Color::parse(color).ok_or_else(unknown)?;
            color.slot(table_mut(frame, side).ok_or_else(unknown)?)
        }
    };
    *slot = pressed;
    Ok(())
}

fn parse_axis(raw: &str) -> Result<u8, String> {
    raw.parse()
        .ok()
        .filter(|value| *value <= 63)
        .ok_or_else(|| format!("stick position `{raw}` is not in 0..63"))
}

fn help(topic: Option<&str>) -> Vec<String> {
    let mut lines = Vec::new();
    match topic {
        Some(target) => {
            if let Some((_, detail)) = HELP_TOPICS
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(target))
            {
                lines.push((*detail).to_string());
                if matches!(target, "hold" | "release" | "press") {
                    lines.push(format!("  inputs: {INPUT_NAMES}"));
                }
            } else {
                let topics: Vec<&str> = HELP_TOPICS.iter().map(|(name, _)| *name).collect();
                lines.push(format!("No help available for `{target}`."));
                lines.push(format!("Available topics: {}", topics.join(", ")));
            }
        }
        None => {
            lines.push("Available commands:".to_string());
            for (_, detail) in HELP_TOPICS {
                lines.push(format!("  {detail}"));
            }
            lines.push("Type `help <topic>` for a specific command.".to_string());
        }
    }
    lines
}

pub struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    pub fn create(path: impl AsRef<Path>, header: &str) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
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
        logger.write_header(header)?;
        Ok(logger)
    }

    fn write_header(&mut self, header: &str) -> io::Result<()> {
        writeln!(self.writer, "# {header}")?;
        writeln!(
            self.writer,
            "# Timestamps are simulated milliseconds since power-up"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, now: Millis, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(self.writer, "[+{now:>6} ms] {} {line}", role.prefix())?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

/// Store file used when none is given on the command line.
pub fn default_store_path() -> PathBuf {
    PathBuf::from("turntable-store.bin")
}

#[cfg(test)]
mod tests {
    use super::*;
    use turntable_core::side_select::TableSide;

    fn scratch_store(tag: &str) -> FileStore {
        let path = std::env::temp_dir().join(format!(
            "turntable-session-{tag}-{}.bin",
            std::process::id()
        ));
        let _ = fs::remove_file(&path);
        FileStore::open(path).expect("blank store")
    }

    fn session(tag: &str) -> Session {
        let mut session =
            Session::new(scratch_store(tag), DisconnectIndication::Off, None).expect("session");
        session.boot().expect("boot");
        session
    }

    fn run(session: &mut Session, commands: &[&str]) -> Vec<String> {
        commands
            .iter()
            .flat_map(|command| session.handle_command(command).expect("command"))
            .collect()
    }

    #[test]
    fn connects_on_first_tick() {
        let mut session = session("connect");
        let lines = run(&mut session, &["wait 1"]);
        assert!(lines.iter().any(|line| line.contains("link: controller connected")));
        assert!(session.adapter.is_connected());
    }

    #[test]
    fn gesture_saves_the_left_table() {
        let mut session = session("gesture");
        let lines = run(
            &mut session,
            &[
                "spin left 2",
                "spin right -2",
                "wait 10",
                "spin left 0",
                "spin right 0",
                "hold euphoria",
                "hold left-blue",
                "wait 1200",
            ],
        );
        assert!(
            lines
                .iter()
                .any(|line| line.contains("config: main table left saved")),
            "{lines:?}"
        );
        assert_eq!(session.adapter.routing().main(), TableSide::Left);
        // Blank store repaired at boot, then the gesture.
        assert_eq!(session.adapter.side_config().store().writes(), 2);
    }

    #[test]
    fn unplug_releases_held_buttons() {
        let mut session = session("unplug");
        run(&mut session, &["hold right-green", "wait 10"]);
        assert!(
            session
                .adapter
                .hid()
                .iter()
                .any(|(_, button)| button.is_pressed())
        );

        let lines = run(&mut session, &["unplug", "wait 200"]);
        assert!(lines.iter().any(|line| line.contains("controller lost")));
        assert!(lines.iter().any(|line| line.contains("mouse buttons=0x00")));
        assert!(!session.adapter.is_connected());
    }

    #[test]
    fn dial_scrolls_the_wheel() {
        let mut session = session("dial");
        let lines = run(&mut session, &["wait 4", "dial 4"]);
        let scrolls = lines.iter().filter(|line| line.contains("wheel=1")).count();
        assert_eq!(scrolls, 2, "{lines:?}");
    }

    #[test]
    fn scenarios_run_without_errors() {
        for scenario in Scenario::ALL {
            let mut session = session(scenario.log_path().trim_start_matches("transcripts/"));
            let lines = run(&mut session, scenario.commands());
            assert!(
                lines.iter().all(|line| !line.contains("ERR")),
                "{scenario:?}: {lines:?}"
            );
        }
    }

    #[test]
    fn bad_input_is_an_error_line() {
        let mut session = session("bad-input");
        let lines = run(&mut session, &["hold nose"]);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ERR unknown input"));
    }

    #[test]
    fn stick_and_base_buttons_use_the_shared_table() {
        let mut session = session("stick");
        let lines = run(&mut session, &["wait 4", "stick 63 32", "wait 4"]);
        assert!(lines.iter().any(|line| line.contains("keys=[07]")), "{lines:?}");

        let lines = run(&mut session, &["stick 32 32", "wait 4", "hold minus", "wait 4"]);
        assert!(lines.iter().any(|line| line.contains("keys=[2b]")), "{lines:?}");
    }

    #[test]
    fn stick_rejects_positions_off_the_axis() {
        let mut session = session("stick-range");
        let lines = run(&mut session, &["stick 64 0"]);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("ERR stick position"));
    }
}
