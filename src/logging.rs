// Conditional logging macros - only active in debug builds.
// Warnings always go through `log::warn!` directly.

use log::LevelFilter;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;

#[cfg(debug_assertions)]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        log::debug!($($arg)*);
    };
}

#[cfg(not(debug_assertions))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {{}};
}

#[cfg(debug_assertions)]
#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {
        log::info!($($arg)*);
    };
}

#[cfg(not(debug_assertions))]
#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {{}};
}

pub const LOG_FILE: &str = "the-hunt.log";

/// `-v` count to level: warn, info, then debug.
#[must_use]
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

/// Set up `env_logger`. `RUST_LOG` wins over `verbosity` when set.
///
/// The TUI owns the terminal, so with a `log_dir` output is appended to
/// `<log_dir>/the-hunt.log`; without one it goes to stderr.
pub fn init_logging(verbosity: u8, log_dir: Option<&Path>) -> io::Result<()> {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level_for(verbosity));
    if let Ok(spec) = std::env::var("RUST_LOG") {
        builder.parse_filters(&spec);
    }

    if let Some(dir) = log_dir {
        fs::create_dir_all(dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(LOG_FILE))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    // A second init (tests, repeated runs in one process) is harmless
    let _ = builder.try_init();
    Ok(())
}
