//! # Track Reader
//!
//! Reads a recorded track and plays it back as [`PositionRecord`]s. Two file
//! formats are understood:
//!
//! - **TCX**: `<Trackpoint>` elements carrying `<Time>`, `<LatitudeDegrees>`
//!   and `<LongitudeDegrees>`. Trackpoints without a `<Position>` are kept with
//!   both coordinates absent.
//! - **GPX**: `<trkpt lat=".." lon="..">` elements with an optional `<time>`.
//!
//! Parsing is a plain scan for those elements, nothing else in the document is
//! interpreted. The whole file is read up front so a broken track fails before
//! the first record is emitted.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, Stream};
use regex::Regex;

use crate::error::FeedError;

static TCX_POINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<Trackpoint\b[^>]*>(.*?)</Trackpoint>").expect("valid regex"));
static TCX_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<Time>\s*([^<]*?)\s*</Time>").expect("valid regex"));
static TCX_LAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<LatitudeDegrees>\s*([^<]*?)\s*</LatitudeDegrees>").expect("valid regex")
});
static TCX_LON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<LongitudeDegrees>\s*([^<]*?)\s*</LongitudeDegrees>").expect("valid regex")
});

static GPX_POINT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<trkpt\b([^>]*?)(?:/>|>(.*?)</trkpt>)").expect("valid regex")
});
static GPX_LAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\blat\s*=\s*["']([^"']*)["']"#).expect("valid regex"));
static GPX_LON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\blon\s*=\s*["']([^"']*)["']"#).expect("valid regex"));
static GPX_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<time>\s*([^<]*?)\s*</time>").expect("valid regex"));

/// One position observation, as handed to feed callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PositionRecord {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// One waypoint as stored in the track file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub time: Option<DateTime<Utc>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl TrackPoint {
    pub fn record(&self) -> PositionRecord {
        PositionRecord {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Replay timing. The first record goes out immediately; after that the gap
/// between two waypoint timestamps, divided by `speed`, is used when both
/// timestamps exist and increase, `fixed_step` otherwise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cadence {
    pub fixed_step: Duration,
    pub speed: f64,
    pub use_timestamps: bool,
}

impl Default for Cadence {
    fn default() -> Self {
        Self {
            fixed_step: Duration::from_secs(1),
            speed: 1.0,
            use_timestamps: true,
        }
    }
}

impl Cadence {
    /// Fixed-step cadence that ignores timestamps.
    pub fn fixed(step: Duration) -> Self {
        Self {
            fixed_step: step,
            speed: 1.0,
            use_timestamps: false,
        }
    }

    /// Delay before `next`. A scaled gap that does not fit a `Duration` falls
    /// back to `fixed_step`.
    pub fn delay(&self, previous: &TrackPoint, next: &TrackPoint) -> Duration {
        if !self.use_timestamps || !(self.speed > 0.0) {
            return self.fixed_step;
        }
        match (previous.time, next.time) {
            (Some(a), Some(b)) if b > a => (b - a)
                .to_std()
                .ok()
                .and_then(|gap| Duration::try_from_secs_f64(gap.as_secs_f64() / self.speed).ok())
                .unwrap_or(self.fixed_step),
            _ => self.fixed_step,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Track {
    path: PathBuf,
    points: Vec<TrackPoint>,
}

impl Track {
    /// Reads and parses `path`.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, FeedError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| FeedError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Self::parse(path, &text)
    }

    /// Parses track text. `path` is only used in error messages.
    pub fn parse(path: impl AsRef<Path>, text: &str) -> Result<Self, FeedError> {
        let path = path.as_ref().to_path_buf();
        let malformed = |reason: String| FeedError::Malformed {
            path: path.clone(),
            reason,
        };

        let points = if text.contains("<TrainingCenterDatabase") {
            parse_tcx(text).map_err(malformed)?
        } else if text.contains("<gpx") {
            parse_gpx(text).map_err(malformed)?
        } else {
            return Err(malformed("neither a TCX nor a GPX document".to_string()));
        };

        if points.is_empty() {
            return Err(FeedError::Empty(path));
        }
        Ok(Self { path, points })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn points(&self) -> &[TrackPoint] {
        &self.points
    }

    /// Lazily replays the track once, in file order, sleeping between records
    /// according to `cadence`. Call again to replay from the start.
    pub fn playback(&self, cadence: Cadence) -> impl Stream<Item = PositionRecord> + '_ {
        stream::unfold(0usize, move |idx| async move {
            let point = self.points.get(idx)?;
            if idx > 0 {
                tokio::time::sleep(cadence.delay(&self.points[idx - 1], point)).await;
            }
            Some((point.record(), idx + 1))
        })
    }
}

fn capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn parse_coordinate(raw: Option<&str>, what: &str) -> Result<Option<f64>, String> {
    match raw {
        None => Ok(None),
        Some(s) => s
            .parse::<f64>()
            .map(Some)
            .map_err(|_| format!("invalid {what} '{s}'")),
    }
}

fn parse_time(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, String> {
    match raw {
        None => Ok(None),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|_| format!("invalid timestamp '{s}'")),
    }
}

fn parse_tcx(text: &str) -> Result<Vec<TrackPoint>, String> {
    TCX_POINT
        .captures_iter(text)
        .map(|block| {
            let body = block.get(1).map_or("", |m| m.as_str());
            Ok(TrackPoint {
                time: parse_time(capture(&TCX_TIME, body))?,
                latitude: parse_coordinate(capture(&TCX_LAT, body), "latitude")?,
                longitude: parse_coordinate(capture(&TCX_LON, body), "longitude")?,
            })
        })
        .collect()
}

fn parse_gpx(text: &str) -> Result<Vec<TrackPoint>, String> {
    GPX_POINT
        .captures_iter(text)
        .map(|block| {
            let attrs = block.get(1).map_or("", |m| m.as_str());
            let body = block.get(2).map_or("", |m| m.as_str());
            Ok(TrackPoint {
                time: parse_time(capture(&GPX_TIME, body))?,
                latitude: parse_coordinate(capture(&GPX_LAT, attrs), "latitude")?,
                longitude: parse_coordinate(capture(&GPX_LON, attrs), "longitude")?,
            })
        })
        .collect()
}
