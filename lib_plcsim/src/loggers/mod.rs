//! # Loggers
//!
//! Subscriber setup for the binaries: console output plus a timestamped log
//! file per run.

pub mod logger;

pub use logger::setup_logging;
