// Device sync endpoints
//
// The device calls these while the companion phone is on its network:
// GET sync pulls the settings blob and reports storage, POST sync acks
// settings or pushes a recorded session as CSV.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use rocket::serde::json::Json;
use rocket::{get, post, State};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::config::SyncSettingsBlob;
use crate::errors::PitwallError;
use crate::ingest::build_session_record;
use crate::server::auth::{AuthError, DeviceAuth};
use crate::server::ApiError;
use crate::session::{FileSessionStore, SessionStore};

/// State shared by the sync handlers
pub(crate) struct SyncState {
    pub settings: SyncSettingsBlob,
    pub status_path: PathBuf,
    pub tracks_path: PathBuf,
}

/// Last storage report the device sent, persisted across restarts
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeviceStatus {
    pub storage_used: u64,
    pub storage_total: u64,
    pub last_sync: Option<DateTime<Utc>>,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self {
            storage_used: 0,
            storage_total: 0,
            last_sync: None,
        }
    }
}

/// Read the persisted status, falling back to the default when the
/// file is missing or unreadable
pub(crate) fn load_device_status(path: &Path) -> DeviceStatus {
    use log::warn;

    if !path.exists() {
        return DeviceStatus::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(status) => status,
            Err(e) => {
                warn!("Device status file is corrupt, using defaults: {}", e);
                DeviceStatus::default()
            }
        },
        Err(e) => {
            warn!("Could not read device status file: {}", e);
            DeviceStatus::default()
        }
    }
}

pub(crate) fn save_device_status(path: &Path, status: &DeviceStatus) -> Result<(), PitwallError> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| PitwallError::FileOperationError {
                operation: "create_status_dir".to_string(),
                reason: format!("Could not create status directory: {}", e),
            })?;
        }
    }

    let content =
        serde_json::to_string_pretty(status).map_err(|e| PitwallError::FileOperationError {
            operation: "serialize_status".to_string(),
            reason: format!("Could not serialize device status: {}", e),
        })?;

    std::fs::write(path, content).map_err(|e| PitwallError::FileOperationError {
        operation: "write_status".to_string(),
        reason: format!("Could not write device status: {}", e),
    })
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SyncEnvelope {
    pub success: bool,
    pub data: SyncSettingsBlob,
    pub sync_time: String,
}

/// Settings pull. The device reports its storage numbers as query
/// parameters and gets the settings blob back.
#[get("/device/sync?<storage_used>&<storage_total>")]
pub(crate) fn device_sync(
    auth: Result<DeviceAuth, AuthError>,
    storage_used: Option<u64>,
    storage_total: Option<u64>,
    state: &State<SyncState>,
) -> Result<Json<SyncEnvelope>, ApiError> {
    use log::{info, warn};

    auth.map_err(ApiError::from)?;

    if storage_used.is_some() || storage_total.is_some() {
        let mut status = load_device_status(&state.status_path);
        if let Some(used) = storage_used {
            status.storage_used = used;
        }
        if let Some(total) = storage_total {
            status.storage_total = total;
        }
        status.last_sync = Some(Utc::now());

        // A failed status write must not fail the sync itself
        if let Err(e) = save_device_status(&state.status_path, &status) {
            warn!("Could not persist device status: {}", e);
        }
    }

    info!("Device sync: settings blob sent");
    Ok(Json(SyncEnvelope {
        success: true,
        data: state.settings.clone(),
        sync_time: now_iso(),
    }))
}

#[derive(Deserialize)]
pub(crate) struct SessionUploadBody {
    pub filename: String,
    pub csv_data: String,
}

/// Settings ack or session push, distinguished by the `type` field
#[post("/device/sync", data = "<body>")]
pub(crate) fn device_sync_post(
    auth: Result<DeviceAuth, AuthError>,
    body: Json<serde_json::Value>,
    store: &State<FileSessionStore>,
) -> Result<Json<serde_json::Value>, ApiError> {
    use log::{debug, error, info};

    auth.map_err(ApiError::from)?;

    let payload = body.into_inner();

    if payload.get("type").and_then(|t| t.as_str()) == Some("upload_session") {
        let upload: SessionUploadBody = serde_json::from_value(payload)
            .map_err(|e| ApiError::bad_request(&format!("Invalid session upload: {}", e)))?;

        let record = match build_session_record(&upload.filename, &upload.csv_data) {
            Ok(record) => record,
            Err(e) => {
                error!("Could not parse pushed session {}: {}", upload.filename, e);
                return Err(ApiError::internal("Failed to save session"));
            }
        };

        if let Err(e) = store.save(&record) {
            error!("Could not save pushed session {}: {}", upload.filename, e);
            return Err(ApiError::internal("Failed to save session"));
        }

        info!(
            "Device pushed session {} as {} ({} points)",
            upload.filename, record.id, record.stats.total_points
        );

        return Ok(Json(json!({
            "success": true,
            "sessionId": record.id,
            "message": "Session uploaded successfully",
            "syncTime": now_iso(),
        })));
    }

    debug!("Device settings ack: {}", payload);
    Ok(Json(json!({
        "success": true,
        "message": "Settings updated successfully",
        "syncTime": now_iso(),
    })))
}

/// Storage report for dashboards. Read-only and unauthenticated.
#[get("/device/status")]
pub(crate) fn device_status(state: &State<SyncState>) -> Json<DeviceStatus> {
    Json(load_device_status(&state.status_path))
}

/// Track catalog download. Served verbatim from the catalog file when
/// one exists, an empty catalog otherwise.
#[get("/tracks/list")]
pub(crate) fn tracks_list(
    auth: Result<DeviceAuth, AuthError>,
    state: &State<SyncState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    use log::error;

    auth.map_err(ApiError::from)?;

    if !state.tracks_path.exists() {
        return Ok(Json(json!({ "tracks": [] })));
    }

    let content = match std::fs::read_to_string(&state.tracks_path) {
        Ok(content) => content,
        Err(e) => {
            error!("Could not read track catalog: {}", e);
            return Err(ApiError::internal("Failed to load track catalog"));
        }
    };

    match serde_json::from_str::<serde_json::Value>(&content) {
        Ok(catalog) => Ok(Json(catalog)),
        Err(e) => {
            error!("Track catalog is not valid JSON: {}", e);
            Err(ApiError::internal("Failed to load track catalog"))
        }
    }
}
