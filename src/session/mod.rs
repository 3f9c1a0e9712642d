// Session record management module
// Provides the persisted session model, summary statistics, and the
// file-backed session store

pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uom::si::f64::Velocity;
use uom::si::velocity::{kilometer_per_hour, meter_per_second};

// Re-export commonly used types
pub use store::{FileSessionStore, SessionStore};

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A sample timestamp as it appears in stored records.
///
/// Device CSV logs carry raw millisecond counters while GPX tracks carry
/// RFC 3339 strings, and both forms occur in stored session files. The
/// variants serialize untagged so the JSON stays a plain string or number.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum SampleTime {
    Text(String),
    Millis(f64),
}

impl SampleTime {
    /// Milliseconds since the Unix epoch, when the value can be read as a
    /// timestamp. Text values are tried as RFC 3339 first, then as a plain
    /// millisecond number.
    pub fn epoch_millis(&self) -> Option<f64> {
        match self {
            SampleTime::Millis(ms) => Some(*ms),
            SampleTime::Text(text) => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.timestamp_millis() as f64)
                .or_else(|| text.trim().parse::<f64>().ok()),
        }
    }
}

/// One telemetry sample extracted from a track log.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SamplePoint {
    /// Recording timestamp, kept exactly as parsed from the source
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<SampleTime>,
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub lng: f64,
    /// Speed in the source's unit (m/s for GPX, km/h for device CSV)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Engine RPM, only present in device CSV logs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rpm: Option<f64>,
}

/// Unit of the per-sample speed values handed to stats computation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpeedUnit {
    MetersPerSecond,
    KilometersPerHour,
}

impl SpeedUnit {
    /// Convert a speed value in this unit to km/h.
    pub fn to_kmh(&self, value: f64) -> f64 {
        match self {
            SpeedUnit::MetersPerSecond => {
                Velocity::new::<meter_per_second>(value).get::<kilometer_per_hour>()
            }
            SpeedUnit::KilometersPerHour => value,
        }
    }
}

/// Aggregate statistics derived from a session's sample points.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Number of samples in the session, always equal to `points.len()`
    pub total_points: usize,
    /// Maximum per-sample speed in km/h, 0 for an empty sample set
    pub max_speed: f64,
    /// Maximum engine RPM, only present when at least one sample has RPM
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rpm: Option<f64>,
    /// Timestamp of the first sample
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<SampleTime>,
    /// Timestamp of the last sample
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<SampleTime>,
}

impl SessionStats {
    /// Compute statistics over an ordered sample sequence.
    ///
    /// `speed_unit` names the unit the per-sample speeds are in; the
    /// `max_speed` aggregate is always reported in km/h. Samples without a
    /// speed contribute nothing to the maximum.
    pub fn from_points(points: &[SamplePoint], speed_unit: SpeedUnit) -> Self {
        let max_speed_raw = points
            .iter()
            .filter_map(|p| p.speed)
            .fold(0.0_f64, f64::max);

        Self {
            total_points: points.len(),
            max_speed: speed_unit.to_kmh(max_speed_raw),
            max_rpm: points.iter().filter_map(|p| p.rpm).reduce(f64::max),
            start_time: points.first().and_then(|p| p.time.clone()),
            end_time: points.last().and_then(|p| p.time.clone()),
        }
    }
}

/// A persisted telemetry capture with summary statistics and raw samples.
///
/// Records are immutable once written: the store only creates and deletes
/// them, never updates. `points` preserves the recording order of the
/// source log.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Collision-free identifier, assigned at ingestion time and used as
    /// the sole filename component in the store
    pub id: String,
    /// Source file name, informational only
    pub original_filename: String,
    /// Ingestion timestamp
    pub upload_date: DateTime<Utc>,
    /// Track name parsed from source metadata, when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_name: Option<String>,
    pub stats: SessionStats,
    pub points: Vec<SamplePoint>,
}

impl SessionRecord {
    /// Wall-clock duration in seconds between the first and last sample,
    /// when both carry an interpretable timestamp.
    pub fn duration_seconds(&self) -> Option<f64> {
        let start = self.points.first().and_then(|p| p.time.as_ref())?;
        let end = self.points.last().and_then(|p| p.time.as_ref())?;
        Some((end.epoch_millis()? - start.epoch_millis()?) / 1000.0)
    }

    /// Total distance in meters covered by the sample sequence, summed
    /// over consecutive coordinate pairs.
    pub fn total_distance_m(&self) -> f64 {
        self.points
            .windows(2)
            .map(|pair| haversine_distance(pair[0].lat, pair[0].lng, pair[1].lat, pair[1].lng))
            .sum()
    }
}

/// Listing view of a session record: everything but the sample points.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: String,
    pub original_filename: String,
    pub upload_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_name: Option<String>,
    pub stats: SessionStats,
}

impl From<&SessionRecord> for SessionSummary {
    fn from(record: &SessionRecord) -> Self {
        Self {
            id: record.id.clone(),
            original_filename: record.original_filename.clone(),
            upload_date: record.upload_date,
            track_name: record.track_name.clone(),
            stats: record.stats.clone(),
        }
    }
}

fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_phi = (lat2 - lat1).to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let a = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}
