//! Ambient logging (§6's configuration surface, §1's "logger accepting formatted
//! messages"). The distilled spec treats the logger as an interface the core merely
//! consumes; this module is what actually backs it, dispatching to either a file or
//! stderr depending on `Config::log_file`, at the level `Config::log_level` selects.

use std::fs::OpenOptions;

use crate::config::Config;
use crate::error::InitError;

/// Initializes the global `log` dispatcher from `config`. Safe to call more than
/// once in a test process: a second call from `fern` would itself return an error,
/// which we treat as "someone else already set this up" rather than a fatal `init`
/// failure, since nothing about the plugin's own correctness depends on owning the
/// global logger.
pub fn init(config: &Config) -> Result<(), InitError> {
    let level = config.log_level_filter();
    let dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                humantime_now(),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level);

    let dispatch = if config.log_file == "-" {
        dispatch.chain(std::io::stderr())
    } else {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)
            .map_err(|source| InitError::Logging {
                path: config.log_file.clone(),
                source: fern::InitError::Io(source),
            })?;
        dispatch.chain(file)
    };

    match dispatch.apply() {
        Ok(()) => Ok(()),
        Err(_already_set) => Ok(()),
    }
}

/// A timestamp without pulling in `chrono`/`time`: seconds since the Unix epoch is
/// plenty for a trace log line, and it keeps this ambient module's own dependency
/// footprint small.
fn humantime_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("{secs}")
}
