//! # Data Ingestors Module
//!
//! External data sources that drive variables instead of a generator.
//!
//! - **`track_reader`**: loads a TCX or GPX track file and replays its
//!   waypoints as a timed stream of position records.
//! - **`track_feed`**: runs a replay, hands each record to registered
//!   callbacks, and the `PositionUpdater` that turns records into writes on
//!   the latitude, longitude and combined position variables.

/// Track file parsing and timed replay.
pub mod track_reader;
/// Position feed and the variables it updates.
pub mod track_feed;

pub use track_feed::{PlaybackMode, PositionUpdater, PresencePolicy, TrackFeed};
pub use track_reader::{Cadence, PositionRecord, Track, TrackPoint};
