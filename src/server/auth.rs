// Basic authentication for device-facing endpoints

use base64::Engine;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};

/// Credential pair the device must present, managed as Rocket state
#[derive(Clone, Debug)]
pub struct SyncCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    MissingCredentials,
    InvalidCredentials,
}

impl AuthError {
    /// Body the device firmware expects on a 401
    pub fn message(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "Unauthorized - Missing credentials",
            AuthError::InvalidCredentials => "Unauthorized - Invalid credentials",
        }
    }
}

/// Check an Authorization header against the expected pair.
/// No header and no `Basic` scheme both count as missing. Anything
/// present but undecodable or mismatched counts as invalid.
fn check_basic_auth(header: Option<&str>, expected: &SyncCredentials) -> Result<(), AuthError> {
    let header = header.ok_or(AuthError::MissingCredentials)?;
    let encoded = header
        .strip_prefix("Basic ")
        .ok_or(AuthError::MissingCredentials)?;

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| AuthError::InvalidCredentials)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::InvalidCredentials)?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or(AuthError::InvalidCredentials)?;

    if username == expected.username && password == expected.password {
        Ok(())
    } else {
        Err(AuthError::InvalidCredentials)
    }
}

/// Request guard proving the caller presented valid device credentials.
/// Handlers take `Result<DeviceAuth, AuthError>` so a failure becomes a
/// 401 with the exact body the firmware checks for, never a forward.
pub struct DeviceAuth;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for DeviceAuth {
    type Error = AuthError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        use log::error;

        let expected = match req.rocket().state::<SyncCredentials>() {
            Some(credentials) => credentials,
            None => {
                error!("SyncCredentials state is not managed");
                return Outcome::Error((
                    Status::InternalServerError,
                    AuthError::InvalidCredentials,
                ));
            }
        };

        let header = req.headers().get_one("Authorization");
        match check_basic_auth(header, expected) {
            Ok(()) => Outcome::Success(DeviceAuth),
            Err(e) => Outcome::Error((Status::Unauthorized, e)),
        }
    }
}
