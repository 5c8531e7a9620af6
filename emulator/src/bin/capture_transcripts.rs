use std::fs;
use std::io;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;
#[allow(dead_code)]
#[path = "../sim.rs"]
mod sim;

use session::{Scenario, Session, TranscriptLogger};
use sim::FileStore;
use turntable_core::profile::DisconnectIndication;

fn main() -> io::Result<()> {
    for scenario in Scenario::ALL {
        record_scenario(scenario)?;
    }
    Ok(())
}

/// Replays `scenario` from a blank store so every capture is reproducible.
fn record_scenario(scenario: Scenario) -> io::Result<()> {
    let store_path = std::env::temp_dir().join(format!(
        "turntable-capture-{}.bin",
        scenario.log_path().replace('/', "-")
    ));
    match fs::remove_file(&store_path) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }

    let transcript = TranscriptLogger::create(scenario.log_path(), scenario.header())?;
    let store = FileStore::open(&store_path)?;
    let mut session = Session::new(
        store,
        DisconnectIndication::Blink { hz: 2 },
        Some(transcript),
    )?;

    session.boot()?;
    for command in scenario.commands() {
        session.handle_command(command)?;
    }
    println!("recorded {}", scenario.log_path());
    fs::remove_file(&store_path)
}
