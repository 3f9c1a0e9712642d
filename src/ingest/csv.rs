// Device recording CSV parsing
//
// Recordings use the columns `Time,Lat,Lon,Speed,Rpm`. Real files also
// carry a header row and `LAP,<n>,<ms>` marker rows, neither of which
// survives the numeric position check below.

use crate::ingest::ParsedTrackLog;
use crate::session::{SamplePoint, SampleTime};

const MIN_FIELDS: usize = 5;

/// Parse a device recording. Malformed rows are skipped, never fatal:
/// a recording with a torn tail still yields every intact row.
pub fn parse_device_csv(content: &str) -> ParsedTrackLog {
    use log::debug;

    let mut points = Vec::new();

    for (line_number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < MIN_FIELDS {
            debug!("Skipping CSV line {}: too few fields", line_number + 1);
            continue;
        }

        let (lat, lng) = match (
            fields[1].trim().parse::<f64>(),
            fields[2].trim().parse::<f64>(),
        ) {
            (Ok(lat), Ok(lng)) => (lat, lng),
            _ => {
                debug!(
                    "Skipping CSV line {}: position is not numeric",
                    line_number + 1
                );
                continue;
            }
        };

        let speed = fields[3].trim().parse::<f64>().unwrap_or(0.0);
        let rpm = fields[4].trim().parse::<f64>().unwrap_or(0.0);

        let time = fields[0].trim();
        let time = (!time.is_empty()).then(|| SampleTime::Text(time.to_string()));

        points.push(SamplePoint {
            time,
            lat,
            lng,
            speed: Some(speed),
            rpm: Some(rpm),
        });
    }

    ParsedTrackLog {
        track_name: None,
        points,
    }
}
