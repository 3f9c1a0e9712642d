// Track log upload endpoint

use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::serde::json::Json;
use rocket::{post, FromForm, State};
use serde::Serialize;
use uuid::Uuid;

use crate::ingest::build_session_record;
use crate::server::ApiError;
use crate::session::{FileSessionStore, SessionStore};

#[derive(FromForm)]
pub(crate) struct TrackLogUpload<'r> {
    file: Option<TempFile<'r>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UploadResponse {
    pub success: bool,
    pub session_id: String,
    pub message: String,
}

/// Accept a multipart track log upload and store it as a session.
/// The uploaded filename is kept as metadata only, it never becomes a
/// filesystem path.
#[post("/upload/gpx", data = "<upload>")]
pub(crate) async fn upload_track_log(
    upload: Form<TrackLogUpload<'_>>,
    store: &State<FileSessionStore>,
) -> Result<Json<UploadResponse>, ApiError> {
    use log::{error, info};

    let mut file = match upload.into_inner().file {
        Some(file) => file,
        None => return Err(ApiError::bad_request("No file uploaded")),
    };

    let original_filename = file
        .raw_name()
        .map(|n| n.dangerous_unsafe_unsanitized_raw().as_str().to_string())
        .unwrap_or_else(|| "upload.gpx".to_string());

    // Stage the upload next to the store so reading it back is local
    let staging = store
        .storage_path()
        .join(format!(".upload-{}", Uuid::now_v7()));

    if let Err(e) = file.copy_to(&staging).await {
        error!("Could not stage upload {}: {}", original_filename, e);
        return Err(ApiError::internal("Failed to process GPX file"));
    }

    let content = rocket::tokio::fs::read_to_string(&staging).await;
    let _ = rocket::tokio::fs::remove_file(&staging).await;

    let content = match content {
        Ok(content) => content,
        Err(e) => {
            error!("Could not read staged upload {}: {}", original_filename, e);
            return Err(ApiError::internal("Failed to process GPX file"));
        }
    };

    let record = match build_session_record(&original_filename, &content) {
        Ok(record) => record,
        Err(e) => {
            error!("Could not parse {}: {}", original_filename, e);
            return Err(ApiError::internal("Failed to process GPX file"));
        }
    };

    if let Err(e) = store.save(&record) {
        error!("Could not save session for {}: {}", original_filename, e);
        return Err(ApiError::internal("Failed to process GPX file"));
    }

    info!(
        "Stored upload {} as session {}",
        original_filename, record.id
    );

    Ok(Json(UploadResponse {
        success: true,
        session_id: record.id,
        message: "GPX parsed and saved".to_string(),
    }))
}
