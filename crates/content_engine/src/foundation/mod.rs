//! Foundation module - shared utilities
//!
//! Small helpers used across the engine: logging setup and the bridge from
//! the reader's progress reports to the log.

pub mod logging;
