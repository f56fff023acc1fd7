use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::simulation::{plant_generators, FeedSpec, SimulationPlan, DEFAULT_HISTORY_COUNT};
use crate::core::mirror::DEFAULT_MIRROR_INTERVAL;
use crate::ingestors::{Cadence, PlaybackMode, PresencePolicy};

const DEFAULT_CONFIG_FILE: &str = "server_plc.conf";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(about = "Simulated PLC endpoint: generators, mirror and GPS track replay", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "PLC_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "PLC_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "PLC_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "PLC_TRACK_PATH", help = "TCX or GPX track replayed into the GPS variables.")]
    pub track_path: Option<PathBuf>,

    #[clap(long, env = "PLC_TRACK_LOOP", help = "Restart the track after the last waypoint (true/false).")]
    pub track_loop: Option<bool>,

    #[clap(long, env = "PLC_TRACK_STEP_MS", help = "Delay between waypoints without usable timestamps.")]
    pub track_step_ms: Option<u64>,

    #[clap(long, env = "PLC_TRACK_SPEED", help = "Replay speed factor applied to waypoint timestamps.")]
    pub track_speed: Option<f64>,

    #[clap(long, env = "PLC_POSITION_PRESENCE", help = "Which coordinates are written: truthy (skip 0.0) or present.")]
    pub position_presence: Option<PresencePolicy>,

    #[clap(long, env = "PLC_MIRROR_INTERVAL_MS", help = "Publishing interval of the mirror subscription.")]
    pub mirror_interval_ms: Option<u64>,

    #[clap(long, env = "PLC_HISTORY_COUNT", help = "Values kept in the CyclicData history.")]
    pub history_count: Option<usize>,

    #[clap(long, env = "PLC_SNAPSHOT_INTERVAL_SECS", help = "Log a snapshot of all variables at this interval.")]
    pub snapshot_interval_secs: Option<u64>,

    #[clap(long, env = "PLC_SEED", help = "Seed for the random generators.")]
    pub seed: Option<u64>,
}

impl Config {
    /// Built-in defaults, the lowest precedence layer.
    pub fn defaults() -> Self {
        Config {
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            track_path: Some(PathBuf::from("tracks/urnieta-loop.tcx")),
            track_loop: Some(false),
            track_step_ms: Some(1000),
            track_speed: Some(1.0),
            position_presence: Some(PresencePolicy::Truthy),
            mirror_interval_ms: Some(DEFAULT_MIRROR_INTERVAL.as_millis() as u64),
            history_count: Some(DEFAULT_HISTORY_COUNT),
            ..Default::default()
        }
    }

    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            track_path: other.track_path.or(self.track_path),
            track_loop: other.track_loop.or(self.track_loop),
            track_step_ms: other.track_step_ms.or(self.track_step_ms),
            track_speed: other.track_speed.or(self.track_speed),
            position_presence: other.position_presence.or(self.position_presence),
            mirror_interval_ms: other.mirror_interval_ms.or(self.mirror_interval_ms),
            history_count: other.history_count.or(self.history_count),
            snapshot_interval_secs: other.snapshot_interval_secs.or(self.snapshot_interval_secs),
            seed: other.seed.or(self.seed),
        }
    }

    /// The JSON file this configuration is read from.
    pub fn config_file(&self) -> PathBuf {
        self.config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| PathBuf::from("./logs"))
    }

    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    /// Checks values clap and serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(speed) = self.track_speed {
            if !(speed > 0.0 && speed.is_finite()) {
                return Err(ConfigError::Invalid {
                    key: "trackSpeed",
                    reason: format!("must be a positive number, got {speed}"),
                });
            }
        }
        if self.mirror_interval_ms == Some(0) {
            return Err(ConfigError::Invalid {
                key: "mirrorIntervalMs",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Turns the settled configuration into the plant description.
    pub fn plan(&self) -> SimulationPlan {
        let feed = self.track_path.clone().map(|path| FeedSpec {
            path,
            cadence: Cadence {
                fixed_step: Duration::from_millis(self.track_step_ms.unwrap_or(1000)),
                speed: self.track_speed.unwrap_or(1.0),
                use_timestamps: true,
            },
            mode: if self.track_loop.unwrap_or(false) {
                PlaybackMode::Loop
            } else {
                PlaybackMode::Once
            },
            presence: self.position_presence.unwrap_or_default(),
        });

        SimulationPlan {
            generators: plant_generators(self.history_count.unwrap_or(DEFAULT_HISTORY_COUNT)),
            mirror_interval: self
                .mirror_interval_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_MIRROR_INTERVAL),
            feed,
            snapshot_interval: self.snapshot_interval_secs.map(Duration::from_secs),
            seed: self.seed,
        }
    }
}

fn read_config_file(path: &Path) -> Result<Config, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Loads configuration from the process arguments and environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(std::env::args_os())
}

/// Defaults, then the config file (if present), then environment/CLI.
pub fn load_config_from<I, T>(args: I) -> Result<Config, ConfigError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    // clap::Parser handles env vars and CLI args together
    let cli = Config::parse_from(args);

    // A missing file is not an error; the caller reports it once logging is up
    let config_file_path = cli.config_file();
    let mut current = Config::defaults();
    if config_file_path.exists() {
        current = current.merge(read_config_file(&config_file_path)?);
    }

    let current = current.merge(cli);
    current.validate()?;
    Ok(current)
}
