mod session;
mod sim;

use std::env;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process;

use session::{Scenario, Session, TranscriptLogger, default_store_path};
use sim::FileStore;
use turntable_core::profile::DisconnectIndication;

const USAGE: &str = "Usage: turntable-emulator [--store <path>] [--blink <hz>] \
                     [--transcript <path>] [--scenario <side-select|unplug>]";

struct Options {
    store: PathBuf,
    indication: DisconnectIndication,
    transcript: Option<PathBuf>,
    scenario: Option<Scenario>,
}

fn main() -> io::Result<()> {
    let options = parse_options().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let transcript = match &options.transcript {
        Some(path) => Some(TranscriptLogger::create(path, "Turntable emulator session")?),
        None => None,
    };
    let store = FileStore::open(&options.store)?;
    let mut session = Session::new(store, options.indication, transcript)?;

    let stdout = io::stdout();
    let mut writer = stdout.lock();
    for line in session.boot()? {
        writeln!(writer, "{line}")?;
    }

    if let Some(scenario) = options.scenario {
        for command in scenario.commands() {
            writeln!(writer, "> {command}")?;
            for response in session.handle_command(command)? {
                writeln!(writer, "{response}")?;
            }
        }
        return Ok(());
    }

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut line = String::new();

    writeln!(
        writer,
        "Turntable emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        for response in session.handle_command(trimmed)? {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_options() -> Result<Options, String> {
    let mut options = Options {
        store: default_store_path(),
        indication: DisconnectIndication::Off,
        transcript: None,
        scenario: None,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };
        let mut value = || {
            inline
                .clone()
                .or_else(|| args.next())
                .ok_or_else(|| format!("Expected value after {flag}"))
        };

        match flag.as_str() {
            "--store" => options.store = PathBuf::from(value()?),
            "--transcript" => options.transcript = Some(PathBuf::from(value()?)),
            "--scenario" => options.scenario = Some(Scenario::from_tag(&value()?)?),
            "--blink" => {
                let raw = value()?;
                let hz: u8 = raw
                    .parse()
                    .map_err(|_| format!("Blink rate `{raw}` is not a number"))?;
                options.indication = if hz == 0 {
                    DisconnectIndication::Off
                } else {
                    DisconnectIndication::Blink { hz }
                };
            }
            other => return Err(format!("Unknown option `{other}`")),
        }
    }

    Ok(options)
}
