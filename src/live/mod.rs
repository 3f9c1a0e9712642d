// Live telemetry module
// Polls the device access point and fans frames out to consumers

pub mod http_source;
pub mod recorder;
pub mod stream;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::LiveConfig;
use crate::errors::PitwallError;

pub use http_source::HttpTelemetrySource;
pub use recorder::record_frames;
pub use stream::stream_telemetry;

/// Device access point URL when the companion phone joins its network
pub const DEFAULT_DEVICE_URL: &str = "http://192.168.4.1";
pub const POLL_INTERVAL_MS: u64 = 1000;
pub const REQUEST_TIMEOUT_MS: u64 = 2000;
pub const BACKOFF_INITIAL_MS: u64 = 500;
pub const BACKOFF_MAX_MS: u64 = 30_000;

// Doubling 500ms twenty times already overshoots any sane cap
const MAX_DOUBLINGS: u32 = 20;

/// One live telemetry sample as the device reports it
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LiveFrame {
    /// Current speed, km/h
    pub speed: f64,
    /// Current engine RPM
    pub rpm: f64,
    /// Trip distance since power-on, km
    pub trip: f64,
    /// GNSS satellites in view
    pub sats: u32,
    /// Latitude in decimal degrees
    pub lat: f64,
    /// Longitude in decimal degrees
    pub lng: f64,
}

/// A trait for producing live telemetry frames from a track device.
///
/// Implementations wrap a concrete transport, the poll loop in
/// [`stream::stream_telemetry`] only sees frames and errors. This keeps
/// reconnect handling and consumers testable without a device on the
/// bench.
///
/// # Lifecycle
///
/// 1. Call `connect()` once to initialize the transport
/// 2. Call `poll()` repeatedly to fetch the latest frame
pub trait TelemetrySource {
    /// Initialize the connection to the device.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport cannot be set up.
    fn connect(&mut self) -> Result<(), PitwallError>;

    /// Fetch the most recent telemetry frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the source is not connected, the device is
    /// unreachable, or the payload cannot be decoded. Errors are per
    /// poll, the caller decides whether to retry.
    fn poll(&mut self) -> Result<LiveFrame, PitwallError>;

    /// Human readable description of where frames come from
    fn endpoint(&self) -> String;
}

/// A scripted telemetry source for testing and recording replay.
///
/// Plays back a fixed sequence of poll outcomes, including failures, so
/// reconnect behavior can be exercised deterministically.
pub struct MockTelemetrySource {
    cur_tick: usize,
    outcomes: Vec<Result<LiveFrame, String>>,
}

#[allow(dead_code)]
impl MockTelemetrySource {
    /// Create a source that yields every frame in order, then errors
    pub fn from_frames(frames: Vec<LiveFrame>) -> Self {
        Self {
            cur_tick: 0,
            outcomes: frames.into_iter().map(Ok).collect(),
        }
    }

    /// Create a source from a full script of successes and failures
    pub fn from_script(outcomes: Vec<Result<LiveFrame, String>>) -> Self {
        Self {
            cur_tick: 0,
            outcomes,
        }
    }

    /// Replay a device recording CSV as live frames.
    ///
    /// # Errors
    ///
    /// Returns an error if the recording file cannot be read.
    pub fn from_recording(file: &std::path::Path) -> Result<Self, PitwallError> {
        let content = std::fs::read_to_string(file).map_err(|e| {
            PitwallError::FileOperationError {
                operation: "read_recording".to_string(),
                reason: format!("Could not read recording {:?}: {}", file, e),
            }
        })?;

        let frames = crate::ingest::csv::parse_device_csv(&content)
            .points
            .into_iter()
            .map(|p| LiveFrame {
                speed: p.speed.unwrap_or(0.0),
                rpm: p.rpm.unwrap_or(0.0),
                trip: 0.0,
                sats: 0,
                lat: p.lat,
                lng: p.lng,
            })
            .collect();

        Ok(Self::from_frames(frames))
    }
}

impl TelemetrySource for MockTelemetrySource {
    fn connect(&mut self) -> Result<(), PitwallError> {
        // Mock source doesn't need to connect to anything
        Ok(())
    }

    fn poll(&mut self) -> Result<LiveFrame, PitwallError> {
        if self.cur_tick >= self.outcomes.len() {
            return Err(PitwallError::TelemetrySourceError {
                description: "End of scripted frames".to_string(),
            });
        }

        let outcome = self.outcomes[self.cur_tick].clone();
        self.cur_tick += 1;

        outcome.map_err(|description| PitwallError::TelemetrySourceError { description })
    }

    fn endpoint(&self) -> String {
        "mock://scripted".to_string()
    }
}

/// Reconnect pacing for the poll loop.
///
/// Delays double from the initial value up to the cap. The delay for a
/// given failure count is a pure function, so pacing is testable
/// without sleeping.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Stop retrying after this many consecutive failures. None retries forever.
    pub max_consecutive_failures: Option<u32>,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(BACKOFF_INITIAL_MS),
            max_delay: Duration::from_millis(BACKOFF_MAX_MS),
            max_consecutive_failures: None,
        }
    }
}

impl BackoffPolicy {
    pub fn from_config(live: &LiveConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(live.backoff_initial_ms),
            max_delay: Duration::from_millis(live.backoff_max_ms),
            max_consecutive_failures: live.max_consecutive_failures,
        }
    }

    /// Delay to wait before the next poll given how many polls in a row
    /// have failed. Zero failures means no extra delay.
    pub fn delay_after(&self, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 {
            return Duration::ZERO;
        }

        let doublings = (consecutive_failures - 1).min(MAX_DOUBLINGS);
        let initial_ms = self.initial_delay.as_millis() as u64;
        let delay_ms = initial_ms.saturating_mul(1u64 << doublings);

        Duration::from_millis(delay_ms).min(self.max_delay)
    }

    /// Whether the failure budget is spent
    pub fn exhausted(&self, consecutive_failures: u32) -> bool {
        match self.max_consecutive_failures {
            Some(limit) => consecutive_failures >= limit,
            None => false,
        }
    }
}
