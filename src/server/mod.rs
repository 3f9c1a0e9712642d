// HTTP server module
// Serves session uploads, listings, and the device sync endpoints

pub(crate) mod auth;
mod sessions;
mod sync;
mod upload;

use rocket::data::{Limits, ToByteUnit};
use rocket::http::Status;
use rocket::response::{self, status, Responder};
use rocket::serde::json::Json;
use rocket::{catch, catchers, routes, Build, Request, Rocket};
use serde::Serialize;

use crate::config::AppConfig;
use crate::errors::PitwallError;
use crate::server::auth::{AuthError, SyncCredentials};
use crate::session::FileSessionStore;

/// Every error leaves the server as `{"error": "..."}`
#[derive(Serialize)]
pub(crate) struct ErrorBody {
    pub error: String,
}

/// Error response carrying the status and message a handler chose
pub(crate) struct ApiError {
    status: Status,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: &str) -> Self {
        Self {
            status: Status::BadRequest,
            message: message.to_string(),
        }
    }

    pub fn unauthorized(message: &str) -> Self {
        Self {
            status: Status::Unauthorized,
            message: message.to_string(),
        }
    }

    pub fn not_found(message: &str) -> Self {
        Self {
            status: Status::NotFound,
            message: message.to_string(),
        }
    }

    pub fn internal(message: &str) -> Self {
        Self {
            status: Status::InternalServerError,
            message: message.to_string(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        ApiError::unauthorized(e.message())
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        status::Custom(self.status, Json(ErrorBody { error: self.message })).respond_to(req)
    }
}

// Catchers keep the error shape for failures that never reach a
// handler, like unroutable paths or bodies rejected by a data guard.

#[catch(400)]
fn bad_request() -> Json<ErrorBody> {
    Json(ErrorBody {
        error: "Bad request".to_string(),
    })
}

#[catch(401)]
fn unauthorized() -> Json<ErrorBody> {
    Json(ErrorBody {
        error: "Unauthorized".to_string(),
    })
}

#[catch(404)]
fn not_found() -> Json<ErrorBody> {
    Json(ErrorBody {
        error: "Resource not found".to_string(),
    })
}

#[catch(422)]
fn unprocessable() -> Json<ErrorBody> {
    Json(ErrorBody {
        error: "Request body is not in the expected shape".to_string(),
    })
}

#[catch(500)]
fn internal_error() -> Json<ErrorBody> {
    Json(ErrorBody {
        error: "Internal server error".to_string(),
    })
}

/// Assemble the Rocket instance from the loaded configuration.
/// The session store, credentials, and sync state ride along as
/// managed state so handlers never reach for globals.
pub fn build_rocket(config: AppConfig) -> Result<Rocket<Build>, PitwallError> {
    let store = FileSessionStore::new(config.sessions_dir()?)?;

    let credentials = SyncCredentials {
        username: config.sync.username.clone(),
        password: config.sync.password.clone(),
    };

    let sync_state = sync::SyncState {
        settings: config.sync.settings.clone(),
        status_path: config.status_path()?,
        tracks_path: config.tracks_catalog_path()?,
    };

    // Track logs can run long, the default form limits are too tight
    let limits = Limits::default()
        .limit("file", 10.mebibytes())
        .limit("data-form", 12.mebibytes())
        .limit("string", 10.mebibytes())
        .limit("json", 10.mebibytes());

    let figment = rocket::Config::figment()
        .merge(("address", config.server.address.clone()))
        .merge(("port", config.server.port))
        .merge(("limits", limits));

    Ok(rocket::custom(figment)
        .manage(store)
        .manage(credentials)
        .manage(sync_state)
        .mount(
            "/api",
            routes![
                upload::upload_track_log,
                sessions::list_sessions,
                sessions::get_session,
                sync::device_sync,
                sync::device_sync_post,
                sync::device_status,
                sync::tracks_list,
            ],
        )
        .register(
            "/",
            catchers![
                bad_request,
                unauthorized,
                not_found,
                unprocessable,
                internal_error
            ],
        ))
}
