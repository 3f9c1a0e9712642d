// End-to-end tests for the HTTP API
//
// Each test builds a Rocket instance over a fresh temporary data
// directory and drives it with the blocking local client, covering:
// 1. Track log upload and retrieval
// 2. Session listing order and corrupt-file tolerance
// 3. The device sync exchange (auth, settings blob, session push)
// 4. Device status persistence and the track catalog

use base64::Engine;
use rocket::http::{Header, Status};
use rocket::local::blocking::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use pitwall::config::AppConfig;
use pitwall::server::build_rocket;
use pitwall::session::{
    FileSessionStore, SamplePoint, SessionRecord, SessionStats, SessionStore, SpeedUnit,
};

const BOUNDARY: &str = "X-PITWALL-BOUNDARY";

/// GPX with the three points at 10, 20, and 15 m/s
const GPX_THREE_POINTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.0" creator="pitwall-test">
  <trk>
    <name>Sentul International</name>
    <trkseg>
      <trkpt lat="45.618" lon="9.281"><time>2026-05-10T14:00:00Z</time><speed>10.0</speed></trkpt>
      <trkpt lat="45.619" lon="9.282"><time>2026-05-10T14:00:01Z</time><speed>20.0</speed></trkpt>
      <trkpt lat="45.620" lon="9.283"><time>2026-05-10T14:00:02Z</time><speed>15.0</speed></trkpt>
    </trkseg>
  </trk>
</gpx>"#;

fn test_client(temp_dir: &TempDir) -> Client {
    let mut config = AppConfig::default();
    config.data_dir = Some(temp_dir.path().to_path_buf());

    let rocket = build_rocket(config).expect("failed to build rocket");
    Client::tracked(rocket).expect("failed to build local client")
}

fn multipart_header() -> Header<'static> {
    Header::new(
        "Content-Type",
        format!("multipart/form-data; boundary={}", BOUNDARY),
    )
}

fn multipart_file_body(field: &str, filename: &str, content: &str) -> String {
    [
        &format!("--{}", BOUNDARY),
        &format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"",
            field, filename
        ),
        "Content-Type: application/octet-stream",
        "",
        content,
        &format!("--{}--", BOUNDARY),
        "",
    ]
    .join("\r\n")
}

fn basic_auth(username: &str, password: &str) -> Header<'static> {
    let encoded =
        base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}"));
    Header::new("Authorization", format!("Basic {encoded}"))
}

#[test]
fn test_gpx_upload_and_detail_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let client = test_client(&temp_dir);

    let response = client
        .post("/api/upload/gpx")
        .header(multipart_header())
        .body(multipart_file_body("file", "morning.gpx", GPX_THREE_POINTS))
        .dispatch();

    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().unwrap();
    assert_eq!(body["success"], true);
    let session_id = body["sessionId"].as_str().expect("sessionId missing");

    let detail = client
        .get(format!("/api/sessions/{}", session_id))
        .dispatch();
    assert_eq!(detail.status(), Status::Ok);

    let record: Value = detail.into_json().unwrap();
    assert_eq!(record["id"], session_id);
    assert_eq!(record["originalFilename"], "morning.gpx");
    assert_eq!(record["trackName"], "Sentul International");
    assert_eq!(record["stats"]["totalPoints"], 3);

    let max_speed = record["stats"]["maxSpeed"].as_f64().unwrap();
    assert!(
        (max_speed - 72.0).abs() < 1e-9,
        "expected 72.0 km/h, got {}",
        max_speed
    );

    // point speeds stay in the source unit, only the aggregate converts
    assert_eq!(record["points"][0]["speed"], 10.0);
    assert_eq!(record["points"].as_array().unwrap().len(), 3);
}

#[test]
fn test_upload_without_file_field_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let client = test_client(&temp_dir);

    let response = client
        .post("/api/upload/gpx")
        .header(multipart_header())
        .body(multipart_file_body("wrong_field", "x.gpx", "<gpx></gpx>"))
        .dispatch();

    assert_eq!(response.status(), Status::BadRequest);
    let body: Value = response.into_json().unwrap();
    assert_eq!(body["error"], "No file uploaded");
}

#[test]
fn test_unknown_session_is_404_with_error_payload() {
    let temp_dir = TempDir::new().unwrap();
    let client = test_client(&temp_dir);

    let response = client.get("/api/sessions/no-such-session").dispatch();

    assert_eq!(response.status(), Status::NotFound);
    let body: Value = response.into_json().unwrap();
    assert_eq!(body["error"], "Session not found");
}

fn seeded_record(id: &str, upload_date: &str) -> SessionRecord {
    let points = vec![SamplePoint {
        time: None,
        lat: 45.618,
        lng: 9.281,
        speed: Some(12.0),
        rpm: None,
    }];

    SessionRecord {
        id: id.to_string(),
        original_filename: format!("{id}.gpx"),
        upload_date: upload_date.parse().unwrap(),
        track_name: None,
        stats: SessionStats::from_points(&points, SpeedUnit::MetersPerSecond),
        points,
    }
}

#[test]
fn test_listing_is_sorted_and_skips_corrupt_files() {
    let temp_dir = TempDir::new().unwrap();

    // Seed the store before the server comes up
    let sessions_dir = temp_dir.path().join("sessions");
    let store = FileSessionStore::new(sessions_dir.clone()).unwrap();
    store
        .save(&seeded_record("older", "2026-05-10T10:00:00Z"))
        .unwrap();
    store
        .save(&seeded_record("newest", "2026-05-12T10:00:00Z"))
        .unwrap();
    store
        .save(&seeded_record("middle", "2026-05-11T10:00:00Z"))
        .unwrap();
    std::fs::write(sessions_dir.join("corrupt.json"), "{definitely not json").unwrap();

    let client = test_client(&temp_dir);
    let response = client.get("/api/sessions").dispatch();
    assert_eq!(response.status(), Status::Ok);

    let listed: Value = response.into_json().unwrap();
    let listed = listed.as_array().unwrap();

    let ids: Vec<&str> = listed
        .iter()
        .map(|summary| summary["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["newest", "middle", "older"]);

    // summaries carry the stats but never the raw points
    assert!(listed[0].get("stats").is_some());
    assert!(listed[0].get("points").is_none());
}

#[test]
fn test_sync_without_credentials_is_401() {
    let temp_dir = TempDir::new().unwrap();
    let client = test_client(&temp_dir);

    let response = client.get("/api/device/sync").dispatch();

    assert_eq!(response.status(), Status::Unauthorized);
    let body: Value = response.into_json().unwrap();
    assert_eq!(body["error"], "Unauthorized - Missing credentials");
}

#[test]
fn test_sync_with_wrong_credentials_is_401() {
    let temp_dir = TempDir::new().unwrap();
    let client = test_client(&temp_dir);

    let response = client
        .get("/api/device/sync")
        .header(basic_auth("device", "not-the-password"))
        .dispatch();

    assert_eq!(response.status(), Status::Unauthorized);
    let body: Value = response.into_json().unwrap();
    assert_eq!(body["error"], "Unauthorized - Invalid credentials");
}

#[test]
fn test_sync_get_returns_settings_blob() {
    let temp_dir = TempDir::new().unwrap();
    let client = test_client(&temp_dir);

    let response = client
        .get("/api/device/sync")
        .header(basic_auth("device", "pitwall"))
        .dispatch();

    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().unwrap();
    assert_eq!(body["success"], true);
    assert!(body["syncTime"].is_string());
    assert_eq!(body["data"]["settings"]["units"], "kmh");
    assert_eq!(body["data"]["settings"]["powerSave"], 5);
    assert_eq!(body["data"]["activeEngine"], 1);
    assert_eq!(body["data"]["engines"][0]["name"], "Engine 1");
}

#[test]
fn test_device_status_round_trips_through_sync() {
    let temp_dir = TempDir::new().unwrap();
    let client = test_client(&temp_dir);

    // before any sync the status is all defaults
    let initial = client.get("/api/device/status").dispatch();
    assert_eq!(initial.status(), Status::Ok);
    let initial: Value = initial.into_json().unwrap();
    assert_eq!(initial["storage_used"], 0);
    assert_eq!(initial["storage_total"], 0);
    assert!(initial["last_sync"].is_null());

    let sync = client
        .get("/api/device/sync?storage_used=1200&storage_total=8000")
        .header(basic_auth("device", "pitwall"))
        .dispatch();
    assert_eq!(sync.status(), Status::Ok);

    let status = client.get("/api/device/status").dispatch();
    let status: Value = status.into_json().unwrap();
    assert_eq!(status["storage_used"], 1200);
    assert_eq!(status["storage_total"], 8000);
    assert!(status["last_sync"].is_string());
}

#[test]
fn test_sync_post_uploads_a_device_session() {
    let temp_dir = TempDir::new().unwrap();
    let client = test_client(&temp_dir);

    // two valid rows and one three-field lap marker
    let csv_data = "2026-05-10T14:00:00Z,45.618,9.281,92.1,10500\n\
2026-05-10T14:00:01Z,45.619,9.282,95.4,10900\n\
LAP,1,83450\n";

    let response = client
        .post("/api/device/sync")
        .header(basic_auth("device", "pitwall"))
        .json(&json!({
            "type": "upload_session",
            "filename": "rec_20260510.csv",
            "csv_data": csv_data,
        }))
        .dispatch();

    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().unwrap();
    assert_eq!(body["success"], true);
    let session_id = body["sessionId"].as_str().expect("sessionId missing");

    let detail = client
        .get(format!("/api/sessions/{}", session_id))
        .dispatch();
    let record: Value = detail.into_json().unwrap();

    assert_eq!(record["originalFilename"], "rec_20260510.csv");
    assert_eq!(record["stats"]["totalPoints"], 2);
    assert_eq!(record["stats"]["maxSpeed"], 95.4);
    assert_eq!(record["stats"]["maxRpm"], 10900.0);
}

#[test]
fn test_sync_post_acks_settings_updates() {
    let temp_dir = TempDir::new().unwrap();
    let client = test_client(&temp_dir);

    let response = client
        .post("/api/device/sync")
        .header(basic_auth("device", "pitwall"))
        .json(&json!({ "settings": { "brightness": 80 } }))
        .dispatch();

    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "Settings updated successfully");
    assert!(body["syncTime"].is_string());
}

#[test]
fn test_sync_post_without_credentials_is_401() {
    let temp_dir = TempDir::new().unwrap();
    let client = test_client(&temp_dir);

    let response = client
        .post("/api/device/sync")
        .json(&json!({ "settings": {} }))
        .dispatch();

    assert_eq!(response.status(), Status::Unauthorized);
    let body: Value = response.into_json().unwrap();
    assert_eq!(body["error"], "Unauthorized - Missing credentials");
}

#[test]
fn test_sync_post_malformed_json_is_400() {
    let temp_dir = TempDir::new().unwrap();
    let client = test_client(&temp_dir);

    let response = client
        .post("/api/device/sync")
        .header(basic_auth("device", "pitwall"))
        .header(Header::new("Content-Type", "application/json"))
        .body("{this is not json")
        .dispatch();

    assert_eq!(response.status(), Status::BadRequest);
    let body: Value = response.into_json().unwrap();
    assert!(body["error"].is_string());
}

#[test]
fn test_sync_post_upload_session_missing_fields_is_400() {
    let temp_dir = TempDir::new().unwrap();
    let client = test_client(&temp_dir);

    let response = client
        .post("/api/device/sync")
        .header(basic_auth("device", "pitwall"))
        .json(&json!({ "type": "upload_session" }))
        .dispatch();

    assert_eq!(response.status(), Status::BadRequest);
    let body: Value = response.into_json().unwrap();
    assert!(body["error"].as_str().unwrap().contains("Invalid session upload"));
}

#[test]
fn test_tracks_list_requires_credentials() {
    let temp_dir = TempDir::new().unwrap();
    let client = test_client(&temp_dir);

    let response = client.get("/api/tracks/list").dispatch();
    assert_eq!(response.status(), Status::Unauthorized);
}

#[test]
fn test_tracks_list_defaults_to_empty_catalog() {
    let temp_dir = TempDir::new().unwrap();
    let client = test_client(&temp_dir);

    let response = client
        .get("/api/tracks/list")
        .header(basic_auth("device", "pitwall"))
        .dispatch();

    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().unwrap();
    assert_eq!(body, json!({ "tracks": [] }));
}

#[test]
fn test_tracks_list_serves_catalog_file() {
    let temp_dir = TempDir::new().unwrap();
    let catalog = json!({
        "tracks": [
            { "id": 1, "name": "Sentul International", "country": "ID" },
            { "id": 2, "name": "Sepang North", "country": "MY" },
        ]
    });
    std::fs::write(
        temp_dir.path().join("tracks.json"),
        serde_json::to_string_pretty(&catalog).unwrap(),
    )
    .unwrap();

    let client = test_client(&temp_dir);
    let response = client
        .get("/api/tracks/list")
        .header(basic_auth("device", "pitwall"))
        .dispatch();

    assert_eq!(response.status(), Status::Ok);
    let body: Value = response.into_json().unwrap();
    assert_eq!(body, catalog);
}
