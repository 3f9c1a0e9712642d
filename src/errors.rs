// Error types for pitwall

use crate::live::LiveFrame;
use snafu::Snafu;
use std::{io, sync::mpsc::SendError};

#[derive(Debug, Snafu)]
pub enum PitwallError {
    // Errors while parsing track logs
    #[snafu(display("Could not parse GPX document: {description}"))]
    GpxParseError { description: String },

    // Errors for the session store
    #[snafu(display("Session store error: {reason}"))]
    SessionStoreError { reason: String },
    #[snafu(display("Error reading session file"))]
    SessionReadError { source: io::Error },
    #[snafu(display("Error serializing session record"))]
    SessionSerializeError { source: serde_json::Error },

    // Errors while polling and broadcasting live telemetry
    #[snafu(display("Telemetry source error: {description}"))]
    TelemetrySourceError { description: String },
    #[snafu(display("Device unreachable after {attempts} consecutive failed polls"))]
    ReconnectExhausted { attempts: u32 },
    #[snafu(display("Error broadcasting live telemetry frame"))]
    TelemetryBroadcastError {
        source: Box<SendError<LiveFrame>>,
    },

    // Errors for the telemetry recorder
    #[snafu(display("Error writing telemetry recording"))]
    RecorderError { source: io::Error },

    // HTTP server errors
    #[snafu(display("HTTP server error: {description}"))]
    ServerError { description: String },

    // Config management errors
    #[snafu(display("Could not find application data directory"))]
    NoConfigDir,
    #[snafu(display("Error reading or writing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error parsing config file"))]
    ConfigSerializeError { source: serde_json::Error },
    #[snafu(display("Invalid configuration: {reason}"))]
    ConfigValidationError { reason: String },

    // User input validation errors
    #[snafu(display("Invalid user input: {field} - {reason}"))]
    InvalidUserInput { field: String, reason: String },
    #[snafu(display("File operation failed: {operation} - {reason}"))]
    FileOperationError { operation: String, reason: String },
}

impl From<SendError<LiveFrame>> for PitwallError {
    fn from(value: SendError<LiveFrame>) -> Self {
        PitwallError::TelemetryBroadcastError {
            source: Box::new(value),
        }
    }
}
