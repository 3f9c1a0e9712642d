// HTTP polling source for the device access point

use std::time::Duration;

use crate::errors::PitwallError;
use crate::live::{LiveFrame, TelemetrySource};

/// Telemetry source that polls the device's `/api/live` endpoint.
///
/// The device serves plain HTTP on its own WiFi network, one small JSON
/// object per request. Short timeouts keep a dead link from stalling
/// the poll loop.
pub struct HttpTelemetrySource {
    base_url: String,
    client: Option<reqwest::blocking::Client>,
    timeout: Duration,
}

impl HttpTelemetrySource {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: None,
            timeout,
        }
    }

    fn live_url(&self) -> String {
        format!("{}/api/live", self.base_url)
    }
}

impl TelemetrySource for HttpTelemetrySource {
    fn connect(&mut self) -> Result<(), PitwallError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| PitwallError::TelemetrySourceError {
                description: format!("Could not build HTTP client: {}", e),
            })?;

        self.client = Some(client);
        Ok(())
    }

    fn poll(&mut self) -> Result<LiveFrame, PitwallError> {
        let client = self
            .client
            .as_ref()
            .ok_or(PitwallError::TelemetrySourceError {
                description: "The device connection is not initialized, call connect() first."
                    .to_string(),
            })?;

        let response =
            client
                .get(self.live_url())
                .send()
                .map_err(|e| PitwallError::TelemetrySourceError {
                    description: format!("Device unreachable: {}", e),
                })?;

        if !response.status().is_success() {
            return Err(PitwallError::TelemetrySourceError {
                description: format!("Device returned HTTP {}", response.status()),
            });
        }

        response
            .json::<LiveFrame>()
            .map_err(|e| PitwallError::TelemetrySourceError {
                description: format!("Could not decode live frame: {}", e),
            })
    }

    fn endpoint(&self) -> String {
        self.live_url()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_url_from_base() {
        let source = HttpTelemetrySource::new("http://192.168.4.1", Duration::from_secs(2));
        assert_eq!(source.endpoint(), "http://192.168.4.1/api/live");
    }

    #[test]
    fn test_trailing_slash_is_normalized() {
        let source = HttpTelemetrySource::new("http://192.168.4.1/", Duration::from_secs(2));
        assert_eq!(source.endpoint(), "http://192.168.4.1/api/live");
    }

    #[test]
    fn test_poll_before_connect_is_an_error() {
        let mut source = HttpTelemetrySource::new("http://192.168.4.1", Duration::from_secs(2));

        let err = source.poll().unwrap_err();
        assert!(err.to_string().contains("call connect() first"));
    }
}
