// Track log ingestion module
// Turns uploaded GPX and device CSV files into session records

pub mod csv;
pub mod gpx;

use crate::errors::PitwallError;
use crate::session::{SamplePoint, SessionRecord, SessionStats, SpeedUnit};
use chrono::Utc;
use std::path::Path;
use uuid::Uuid;

/// Supported track log formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackLogFormat {
    /// Standard GPX track, speeds expressed in meters per second
    Gpx,
    /// Device recording CSV, speeds expressed in km/h
    DeviceCsv,
}

impl TrackLogFormat {
    /// Decide the format from the filename extension, falling back to a
    /// content sniff when the extension is missing or unknown
    pub fn detect(filename: &str, content: &str) -> Self {
        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match extension.as_deref() {
            Some("gpx") => TrackLogFormat::Gpx,
            Some("csv") => TrackLogFormat::DeviceCsv,
            _ => {
                let head = content.trim_start();
                if head.starts_with('<') && content.contains("<gpx") {
                    TrackLogFormat::Gpx
                } else {
                    TrackLogFormat::DeviceCsv
                }
            }
        }
    }

    /// Unit the format uses for its speed values
    pub fn speed_unit(&self) -> SpeedUnit {
        match self {
            TrackLogFormat::Gpx => SpeedUnit::MetersPerSecond,
            TrackLogFormat::DeviceCsv => SpeedUnit::KilometersPerHour,
        }
    }
}

/// Output of a format parser before it becomes a stored record
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTrackLog {
    /// Track name embedded in the file, when the format carries one
    pub track_name: Option<String>,
    /// Sample points in file order, units left as the file had them
    pub points: Vec<SamplePoint>,
}

/// Parse an uploaded track log and assemble a complete session record.
///
/// The record id is a fresh UUIDv7, so ids created later sort later and
/// concurrent uploads never collide. A log with zero usable points is
/// still a valid session.
pub fn build_session_record(
    original_filename: &str,
    content: &str,
) -> Result<SessionRecord, PitwallError> {
    use log::{info, warn};

    let format = TrackLogFormat::detect(original_filename, content);
    let parsed = match format {
        TrackLogFormat::Gpx => gpx::parse_gpx(content)?,
        TrackLogFormat::DeviceCsv => csv::parse_device_csv(content),
    };

    if parsed.points.is_empty() {
        warn!("Track log {original_filename} contained no usable points");
    }

    let stats = SessionStats::from_points(&parsed.points, format.speed_unit());
    let record = SessionRecord {
        id: Uuid::now_v7().to_string(),
        original_filename: original_filename.to_string(),
        upload_date: Utc::now(),
        track_name: parsed.track_name,
        stats,
        points: parsed.points,
    };

    info!(
        "Parsed {original_filename} as {:?}: {} points, max speed {:.1} km/h",
        format, record.stats.total_points, record.stats.max_speed
    );

    Ok(record)
}
