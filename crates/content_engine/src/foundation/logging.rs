//! Logging setup and load-progress reporting
//!
//! Content loading surfaces its progress through the reader's callback
//! channel; [`progress_logger`] turns those reports into `log` records so
//! loads stay observable when no frontend is attached.

use env_logger::Env;

use crate::reader::ProgressCallback;

/// Initializes logging from the environment, defaulting to `info` level
/// when `RUST_LOG` is unset.
pub fn init() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}

/// A progress callback forwarding reader reports to the log: newly opened
/// files at debug level, per-line progress inside a file at trace.
pub fn progress_logger() -> ProgressCallback {
    Box::new(|report, new_file| {
        if new_file {
            log::debug!("{}", report.trim_start_matches('\t'));
        } else {
            log::trace!("{}", report.trim_start_matches('\t'));
        }
    })
}
