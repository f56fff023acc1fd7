//! # Track Feed
//!
//! [`TrackFeed`] replays a track file and calls every registered callback once
//! per position record. [`PositionUpdater`] is the callback the plant uses: it
//! fans a record out to the latitude, longitude and combined position
//! variables.
//!
//! A track that cannot be read or parsed fails the feed's task when it starts.
//! Nothing else in the simulation depends on it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::str::FromStr;

use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use crate::core::publish;
use crate::error::EngineError;
use crate::ingestors::track_reader::{Cadence, PositionRecord, Track};
use crate::store::Variable;

const COMPONENT: &str = "track_feed";

/// Whether the track is replayed once or restarted after the last waypoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    #[default]
    Once,
    Loop,
}

impl FromStr for PlaybackMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "once" => Ok(PlaybackMode::Once),
            "loop" => Ok(PlaybackMode::Loop),
            other => Err(format!("unknown playback mode '{other}' (expected once or loop)")),
        }
    }
}

/// Which coordinates count as present.
///
/// `Truthy` skips absent values and `0.0`, the way the plant has always
/// behaved: a waypoint on the equator or the prime meridian is not written.
/// `Present` only skips absent values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresencePolicy {
    #[default]
    Truthy,
    Present,
}

impl PresencePolicy {
    pub fn accept(self, value: Option<f64>) -> Option<f64> {
        match self {
            PresencePolicy::Truthy => value.filter(|v| *v != 0.0),
            PresencePolicy::Present => value,
        }
    }
}

impl FromStr for PresencePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "truthy" => Ok(PresencePolicy::Truthy),
            "present" => Ok(PresencePolicy::Present),
            other => Err(format!("unknown presence policy '{other}' (expected truthy or present)")),
        }
    }
}

impl fmt::Display for PresencePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresencePolicy::Truthy => f.write_str("truthy"),
            PresencePolicy::Present => f.write_str("present"),
        }
    }
}

pub type PositionCallback = Box<dyn FnMut(&PositionRecord) -> Result<(), EngineError> + Send>;

/// Replays one track file into registered callbacks.
pub struct TrackFeed {
    path: PathBuf,
    cadence: Cadence,
    mode: PlaybackMode,
    callbacks: Vec<PositionCallback>,
}

impl TrackFeed {
    pub fn new(path: impl Into<PathBuf>, cadence: Cadence, mode: PlaybackMode) -> Self {
        Self {
            path: path.into(),
            cadence,
            mode,
            callbacks: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Adds a callback invoked for every record, in registration order. A
    /// callback error ends the replay.
    pub fn register_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&PositionRecord) -> Result<(), EngineError> + Send + 'static,
    {
        self.callbacks.push(Box::new(callback));
    }

    /// Loads the track and replays it. Returns after one pass in
    /// [`PlaybackMode::Once`]; in [`PlaybackMode::Loop`] it only returns on error.
    pub async fn start(self) -> Result<(), EngineError> {
        let track = Track::load(&self.path).await?;
        tracing::info!(
            component = COMPONENT,
            path = %self.path.display(),
            waypoints = track.points().len(),
            mode = ?self.mode,
            "track loaded"
        );
        self.run(track).await
    }

    /// Replays an already loaded track.
    pub async fn run(mut self, track: Track) -> Result<(), EngineError> {
        loop {
            let mut records = pin!(track.playback(self.cadence));
            while let Some(record) = records.next().await {
                for callback in self.callbacks.iter_mut() {
                    callback(&record)?;
                }
            }

            match self.mode {
                PlaybackMode::Once => break,
                PlaybackMode::Loop => {
                    tracing::debug!(component = COMPONENT, "end of track, restarting");
                    tokio::time::sleep(self.cadence.fixed_step).await;
                }
            }
        }

        tracing::info!(component = COMPONENT, path = %self.path.display(), "track replay finished");
        Ok(())
    }
}

/// Writes position records into the plant's GPS variables.
#[derive(Debug, Clone)]
pub struct PositionUpdater {
    latitude: Variable,
    longitude: Variable,
    combined: Variable,
    presence: PresencePolicy,
}

impl PositionUpdater {
    pub fn new(
        latitude: Variable,
        longitude: Variable,
        combined: Variable,
        presence: PresencePolicy,
    ) -> Self {
        Self {
            latitude,
            longitude,
            combined,
            presence,
        }
    }

    /// Writes each accepted coordinate to its own variable, and the combined
    /// `lat=..,long=..` text only when both are accepted.
    pub fn on_update(&self, position: &PositionRecord) -> Result<(), EngineError> {
        let lat = self.presence.accept(position.latitude);
        let long = self.presence.accept(position.longitude);

        if let Some(lat) = lat {
            publish(&self.latitude, format_coordinate(lat).into(), COMPONENT)?;
        }
        if let Some(long) = long {
            publish(&self.longitude, format_coordinate(long).into(), COMPONENT)?;
        }
        if let (Some(lat), Some(long)) = (lat, long) {
            let text = format!("lat={},long={}", format_coordinate(lat), format_coordinate(long));
            publish(&self.combined, text.into(), COMPONENT)?;
        }
        Ok(())
    }

    /// Registers itself on `feed` and runs the replay.
    pub async fn start(self, mut feed: TrackFeed) -> Result<(), EngineError> {
        feed.register_callback(move |position| self.on_update(position));
        feed.start().await
    }
}

/// Decimal degrees as text, always with a fractional part (`-2.0`, `43.1`).
pub fn format_coordinate(value: f64) -> String {
    format!("{value:?}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, RetentionPolicy, VariableStore, VariableType, VariableValue};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn gps(store: &Arc<dyn VariableStore>) -> (Variable, Variable, Variable) {
        let mk = |name| {
            let v = Variable::create(store, name, "", VariableType::String).unwrap();
            v.historize(RetentionPolicy::unbounded()).unwrap();
            v
        };
        (mk("GPSLatitude"), mk("GPSLongitude"), mk("GPSLatitudeAndLongitude"))
    }

    fn history(v: &Variable) -> Vec<String> {
        v.store()
            .read_history(v.node())
            .unwrap()
            .into_iter()
            .map(|e| e.value.as_str().unwrap().to_string())
            .collect()
    }

    fn record(latitude: Option<f64>, longitude: Option<f64>) -> PositionRecord {
        PositionRecord { latitude, longitude }
    }

    #[test]
    fn test_partial_records_fan_out() {
        let store: Arc<dyn VariableStore> = Arc::new(MemoryStore::new());
        let (lat, long, both) = gps(&store);
        let updater = PositionUpdater::new(lat.clone(), long.clone(), both.clone(), PresencePolicy::Truthy);

        for r in [
            record(Some(43.1), Some(-2.0)),
            record(None, Some(-2.1)),
            record(Some(43.2), None),
        ] {
            updater.on_update(&r).unwrap();
        }

        assert_eq!(history(&lat), vec!["43.1", "43.2"]);
        assert_eq!(history(&long), vec!["-2.0", "-2.1"]);
        assert_eq!(history(&both), vec!["lat=43.1,long=-2.0"]);
    }

    #[test]
    fn test_zero_coordinates_follow_policy() {
        let store: Arc<dyn VariableStore> = Arc::new(MemoryStore::new());
        let (lat, long, both) = gps(&store);

        let truthy = PositionUpdater::new(lat.clone(), long.clone(), both.clone(), PresencePolicy::Truthy);
        truthy.on_update(&record(Some(0.0), Some(-2.0))).unwrap();
        assert!(history(&lat).is_empty());
        assert!(history(&both).is_empty());

        let present = PositionUpdater::new(lat.clone(), long, both.clone(), PresencePolicy::Present);
        present.on_update(&record(Some(0.0), Some(-2.0))).unwrap();
        assert_eq!(history(&lat), vec!["0.0"]);
        assert_eq!(history(&both), vec!["lat=0.0,long=-2.0"]);
    }

    #[test]
    fn test_parse_modes() {
        assert_eq!("LOOP".parse::<PlaybackMode>().unwrap(), PlaybackMode::Loop);
        assert_eq!("present".parse::<PresencePolicy>().unwrap(), PresencePolicy::Present);
        assert!("sometimes".parse::<PlaybackMode>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_invokes_callbacks_per_record_and_loops() {
        let track = Track::parse(
            "two.gpx",
            r#"<gpx><trkpt lat="43.1" lon="-2.0"/><trkpt lat="43.2" lon="-2.1"/></gpx>"#,
        )
        .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut feed = TrackFeed::new("two.gpx", Cadence::fixed(Duration::from_secs(1)), PlaybackMode::Loop);
        let sink = Arc::clone(&seen);
        feed.register_callback(move |r| {
            sink.lock().unwrap().push(r.latitude);
            Ok(())
        });

        let task = tokio::spawn(feed.run(track));
        // 0s, 1s, then a 1s pause before restarting at 2s, 3s
        tokio::time::sleep(Duration::from_millis(3500)).await;
        task.abort();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen, vec![Some(43.1), Some(43.2), Some(43.1), Some(43.2)]);
    }

    #[tokio::test]
    async fn test_unreadable_track_fails_start() {
        let store: Arc<dyn VariableStore> = Arc::new(MemoryStore::new());
        let (lat, long, both) = gps(&store);
        let updater = PositionUpdater::new(lat, long, both.clone(), PresencePolicy::Truthy);

        let feed = TrackFeed::new("/no/such/track.tcx", Cadence::default(), PlaybackMode::Once);
        let err = updater.start(feed).await.unwrap_err();
        assert!(matches!(err, EngineError::FeedSource(_)));
        assert_eq!(both.read_value().unwrap(), VariableValue::String(String::new()));
    }
}
