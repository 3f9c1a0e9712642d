// Library interface for pitwall
// This allows integration tests to access internal modules

pub mod config;
pub mod errors;
pub mod ingest;
pub mod live;
pub mod server;
pub mod session;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::PitwallError;
pub use ingest::{build_session_record, TrackLogFormat};
pub use live::{BackoffPolicy, LiveFrame, TelemetrySource};
pub use server::build_rocket;
pub use session::{
    FileSessionStore, SamplePoint, SampleTime, SessionRecord, SessionStats, SessionStore,
    SessionSummary,
};
