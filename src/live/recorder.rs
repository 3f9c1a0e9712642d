// Writes live frames to a device-format recording file

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
    sync::mpsc::Receiver,
};

use chrono::{SecondsFormat, Utc};

use crate::{errors::PitwallError, live::LiveFrame};

/// Header matching the device's own recording format, so recordings
/// made here can be re-imported like any device CSV
pub const RECORDING_HEADER: &str = "Time,Lat,Lon,Speed,Rpm";

/// Drain the receiver into a CSV recording until the sender hangs up.
/// A bad line is logged and skipped, only opening and flushing the
/// file can fail the recording.
pub fn record_frames(
    file: &PathBuf,
    frame_receiver: Receiver<LiveFrame>,
) -> Result<(), PitwallError> {
    use log::error;

    let recording_file = File::create(file).map_err(|e| PitwallError::RecorderError { source: e })?;
    let mut recording_writer = BufWriter::new(recording_file);

    let _ = writeln!(recording_writer, "{}", RECORDING_HEADER).map_err(|e| {
        error!("Error while writing recording header: {}", e);
    });

    for frame in &frame_receiver {
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let _ = writeln!(
            recording_writer,
            "{},{},{},{},{}",
            timestamp, frame.lat, frame.lng, frame.speed, frame.rpm
        )
        .map_err(|e| {
            error!("Error while writing frame to recording file: {}", e);
        });
    }

    recording_writer
        .flush()
        .map_err(|e| PitwallError::RecorderError { source: e })?;
    Ok(())
}
