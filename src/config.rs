// Application configuration
//
// Every runtime knob lives in one JSON file. The loaded AppConfig is
// handed to the server as managed state, nothing reads configuration
// through globals.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::PitwallError;
use crate::live::{
    BACKOFF_INITIAL_MS, BACKOFF_MAX_MS, DEFAULT_DEVICE_URL, POLL_INTERVAL_MS, REQUEST_TIMEOUT_MS,
};

const CONFIG_FILE_NAME: &str = "config.json";
const APP_DIR_NAME: &str = "pitwall";

const DEFAULT_ADDRESS: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_SYNC_USERNAME: &str = "device";
const DEFAULT_SYNC_PASSWORD: &str = "pitwall";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Base directory for sessions and device state. Defaults to the
    /// platform data directory when unset.
    pub data_dir: Option<PathBuf>,
    pub server: ServerConfig,
    pub sync: SyncConfig,
    pub live: LiveConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SyncConfig {
    /// Credentials the device must present on sync endpoints
    pub username: String,
    pub password: String,
    /// Settings blob returned to the device on every sync
    pub settings: SyncSettingsBlob,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            username: DEFAULT_SYNC_USERNAME.to_string(),
            password: DEFAULT_SYNC_PASSWORD.to_string(),
            settings: SyncSettingsBlob::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncSettingsBlob {
    pub settings: DeviceSettings,
    pub tracks: TrackSummary,
    pub engines: Vec<EngineProfile>,
    pub active_engine: u32,
}

impl Default for SyncSettingsBlob {
    fn default() -> Self {
        Self {
            settings: DeviceSettings::default(),
            tracks: TrackSummary::default(),
            engines: vec![EngineProfile {
                id: 1,
                name: "Engine 1".to_string(),
                hours: 0.0,
            }],
            active_engine: 1,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceSettings {
    pub units: String,
    pub temperature: String,
    pub gnss: String,
    pub brightness: u8,
    pub power_save: u8,
    pub contrast: u8,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            units: "kmh".to_string(),
            temperature: "celsius".to_string(),
            gnss: "gps".to_string(),
            brightness: 50,
            power_save: 5,
            contrast: 50,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TrackSummary {
    pub countries: Vec<String>,
    pub track_count: u32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EngineProfile {
    pub id: u32,
    pub name: String,
    pub hours: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LiveConfig {
    /// Base URL of the device access point
    pub device_url: String,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
    /// Give up after this many consecutive poll failures. None retries forever.
    pub max_consecutive_failures: Option<u32>,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            device_url: DEFAULT_DEVICE_URL.to_string(),
            poll_interval_ms: POLL_INTERVAL_MS,
            request_timeout_ms: REQUEST_TIMEOUT_MS,
            backoff_initial_ms: BACKOFF_INITIAL_MS,
            backoff_max_ms: BACKOFF_MAX_MS,
            max_consecutive_failures: None,
        }
    }
}

impl AppConfig {
    /// Load configuration. An explicit path must exist and parse. Without
    /// one, the default path is used when present, otherwise defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, PitwallError> {
        let config = match path {
            Some(explicit) => Self::from_file(explicit)?,
            None => {
                let default_path = Self::default_path()?;
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Default config file location under the platform config directory
    pub fn default_path() -> Result<PathBuf, PitwallError> {
        let config_dir = dirs::config_dir().ok_or(PitwallError::NoConfigDir)?;
        Ok(config_dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    fn from_file(config_path: &Path) -> Result<Self, PitwallError> {
        let file = std::fs::File::open(config_path)
            .map_err(|e| PitwallError::ConfigIOError { source: e })?;
        serde_json::from_reader(file).map_err(|e| PitwallError::ConfigSerializeError { source: e })
    }

    /// Write the configuration to an explicit path
    pub fn save_to(&self, config_path: &Path) -> Result<(), PitwallError> {
        if let Some(parent) = config_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| PitwallError::ConfigIOError { source: e })?;
            }
        }

        let file = std::fs::File::create(config_path)
            .map_err(|e| PitwallError::ConfigIOError { source: e })?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| PitwallError::ConfigSerializeError { source: e })
    }

    /// Base directory for application data
    pub fn resolved_data_dir(&self) -> Result<PathBuf, PitwallError> {
        match &self.data_dir {
            Some(dir) => Ok(dir.clone()),
            None => {
                let data_dir = dirs::data_dir().ok_or(PitwallError::NoConfigDir)?;
                Ok(data_dir.join(APP_DIR_NAME))
            }
        }
    }

    pub fn sessions_dir(&self) -> Result<PathBuf, PitwallError> {
        Ok(self.resolved_data_dir()?.join("sessions"))
    }

    /// Persisted device storage report
    pub fn status_path(&self) -> Result<PathBuf, PitwallError> {
        Ok(self.resolved_data_dir()?.join("status.json"))
    }

    /// Optional track catalog served to the device
    pub fn tracks_catalog_path(&self) -> Result<PathBuf, PitwallError> {
        Ok(self.resolved_data_dir()?.join("tracks.json"))
    }

    pub fn validate(&self) -> Result<(), PitwallError> {
        if self.live.poll_interval_ms == 0 {
            return Err(PitwallError::ConfigValidationError {
                reason: "live.poll_interval_ms must be greater than zero".to_string(),
            });
        }

        if self.live.request_timeout_ms == 0 {
            return Err(PitwallError::ConfigValidationError {
                reason: "live.request_timeout_ms must be greater than zero".to_string(),
            });
        }

        if self.live.backoff_max_ms < self.live.backoff_initial_ms {
            return Err(PitwallError::ConfigValidationError {
                reason: "live.backoff_max_ms must not be below live.backoff_initial_ms"
                    .to_string(),
            });
        }

        Ok(())
    }
}
