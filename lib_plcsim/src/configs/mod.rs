//! # Configuration Modules
//!
//! Settings for `server_plc`, gathered from defaults, an optional JSON file,
//! environment variables and the command line.

/// CLI / environment / file configuration of the simulation.
pub mod config_sim;

pub use config_sim::{load_config, load_config_from, Config, ConfigError};
