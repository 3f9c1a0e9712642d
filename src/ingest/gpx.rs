// GPX track parsing

use crate::errors::PitwallError;
use crate::ingest::ParsedTrackLog;
use crate::session::{SamplePoint, SampleTime};

/// Parse GPX content into sample points.
///
/// Speeds stay in meters per second as GPX defines them. The track name
/// comes from the first named track, falling back to the file metadata
/// name. Points without a timestamp or speed are kept, the missing
/// fields are simply absent.
pub fn parse_gpx(content: &str) -> Result<ParsedTrackLog, PitwallError> {
    use gpx::read;
    use std::io::Cursor;

    let mut cursor = Cursor::new(content.as_bytes());
    let parsed = read(&mut cursor).map_err(|e| PitwallError::GpxParseError {
        description: e.to_string(),
    })?;

    let track_name = parsed
        .tracks
        .iter()
        .find_map(|t| t.name.clone())
        .or_else(|| parsed.metadata.as_ref().and_then(|m| m.name.clone()));

    let mut points = Vec::new();
    for track in parsed.tracks {
        for segment in track.segments {
            for waypoint in segment.points {
                let time = match waypoint.time {
                    Some(t) => {
                        let iso = t.format().map_err(|e| PitwallError::GpxParseError {
                            description: e.to_string(),
                        })?;
                        Some(SampleTime::Text(iso))
                    }
                    None => None,
                };

                let geo = waypoint.point();
                points.push(SamplePoint {
                    time,
                    lat: geo.y(),
                    lng: geo.x(),
                    speed: waypoint.speed,
                    rpm: None,
                });
            }
        }
    }

    Ok(ParsedTrackLog { track_name, points })
}
