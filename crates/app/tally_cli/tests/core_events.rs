//! tally_core reports through `tracing`; with no subscriber installed those
//! events must still reach the `log` facade the CLI logger listens on.

use std::sync::Mutex;

use log::{Level, LevelFilter, Log, Metadata, Record};

struct Capture(Mutex<Vec<(Level, String)>>);

impl Log for Capture {
    fn enabled(&self, _: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        if let Ok(mut lines) = self.0.lock() {
            lines.push((record.level(), record.args().to_string()));
        }
    }

    fn flush(&self) {}
}

static CAPTURE: Capture = Capture(Mutex::new(Vec::new()));

#[test]
fn core_warnings_reach_the_log_facade() {
    log::set_logger(&CAPTURE).unwrap();
    log::set_max_level(LevelFilter::Trace);

    tally_core::auth::jwt::TokenService::new(b"secret", 0);

    let lines = CAPTURE.0.lock().unwrap();
    assert!(
        lines.iter().any(|(level, msg)| *level == Level::Warn
            && msg.contains("access token lifetime out of range")),
        "{lines:?}"
    );
}
