// Session listing and retrieval endpoints

use rocket::get;
use rocket::serde::json::Json;
use rocket::State;

use crate::errors::PitwallError;
use crate::server::ApiError;
use crate::session::{FileSessionStore, SessionRecord, SessionStore, SessionSummary};

/// Summaries of every stored session, newest upload first
#[get("/sessions")]
pub(crate) fn list_sessions(
    store: &State<FileSessionStore>,
) -> Result<Json<Vec<SessionSummary>>, ApiError> {
    use log::error;

    match store.list() {
        Ok(records) => Ok(Json(records.iter().map(SessionSummary::from).collect())),
        Err(e) => {
            error!("Failed to list sessions: {}", e);
            Err(ApiError::internal("Failed to list sessions"))
        }
    }
}

/// Full record for one session id, points included
#[get("/sessions/<id>")]
pub(crate) fn get_session(
    id: &str,
    store: &State<FileSessionStore>,
) -> Result<Json<SessionRecord>, ApiError> {
    use log::error;

    match store.load(id) {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(ApiError::not_found("Session not found")),
        // An id that could never name a stored file is just not found
        Err(PitwallError::InvalidUserInput { .. }) => {
            Err(ApiError::not_found("Session not found"))
        }
        Err(e) => {
            error!("Failed to load session {}: {}", id, e);
            Err(ApiError::internal("Failed to load session"))
        }
    }
}
