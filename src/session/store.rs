// Storage implementation for session record persistence

use crate::errors::PitwallError;
use crate::session::SessionRecord;
use itertools::Itertools;
use std::fs;
use std::path::{Path, PathBuf};

/// Trait defining the interface for session record storage operations
pub trait SessionStore {
    /// Persist a session record under its id
    fn save(&self, record: &SessionRecord) -> Result<(), PitwallError>;

    /// Load a session record by exact id
    fn load(&self, id: &str) -> Result<Option<SessionRecord>, PitwallError>;

    /// List every stored record, sorted by upload date descending.
    /// Files that fail to read or parse are skipped.
    fn list(&self) -> Result<Vec<SessionRecord>, PitwallError>;

    /// Remove a stored record. Returns whether a record existed.
    fn delete(&self, id: &str) -> Result<bool, PitwallError>;

    /// Check whether a record exists for the given id
    fn exists(&self, id: &str) -> Result<bool, PitwallError>;
}

/// File-based implementation of session record storage.
///
/// Every record lives in its own pretty-printed JSON file named
/// `<id>.json`. The id is the sole filename component, so lookup is an
/// exact path construction, never a directory scan. Writes go through a
/// temp file and an atomic rename so readers never observe partial
/// records.
pub struct FileSessionStore {
    /// Base directory for stored session files
    storage_path: PathBuf,
}

impl FileSessionStore {
    /// Create a new file-based store, creating the directory when missing
    pub fn new(storage_path: PathBuf) -> Result<Self, PitwallError> {
        if !storage_path.exists() {
            fs::create_dir_all(&storage_path)
                .map_err(|e| PitwallError::ConfigIOError { source: e })?;
        }

        Ok(Self { storage_path })
    }

    /// Create a store in the default application data directory
    pub fn new_default() -> Result<Self, PitwallError> {
        let storage_path = Self::default_storage_path()?;
        Self::new(storage_path)
    }

    /// Get the default storage path for session records
    pub fn default_storage_path() -> Result<PathBuf, PitwallError> {
        let app_data_dir = dirs::data_dir().ok_or(PitwallError::NoConfigDir)?;
        Ok(app_data_dir.join("pitwall").join("sessions"))
    }

    /// Get the storage directory path
    pub fn storage_path(&self) -> &Path {
        &self.storage_path
    }

    /// Generate the file path for a given session id
    fn file_path_for_id(&self, id: &str) -> Result<PathBuf, PitwallError> {
        Self::validate_id(id)?;
        Ok(self.storage_path.join(format!("{id}.json")))
    }

    /// Reject ids that are empty or not filesystem-safe
    fn validate_id(id: &str) -> Result<(), PitwallError> {
        if id.is_empty() {
            return Err(PitwallError::InvalidUserInput {
                field: "session_id".to_string(),
                reason: "Session id cannot be empty".to_string(),
            });
        }

        if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(PitwallError::InvalidUserInput {
                field: "session_id".to_string(),
                reason: "Session id must contain only alphanumeric characters and hyphens"
                    .to_string(),
            });
        }

        Ok(())
    }

    /// Load and parse one record file
    fn load_from_file(&self, file_path: &Path) -> Result<SessionRecord, PitwallError> {
        let content = fs::read_to_string(file_path)
            .map_err(|e| PitwallError::SessionReadError { source: e })?;

        serde_json::from_str(&content).map_err(|e| PitwallError::SessionStoreError {
            reason: format!("Failed to parse session file {:?}: {}", file_path, e),
        })
    }

    /// Write the record to a temp file, then atomically move it in place
    fn save_to_file(&self, record: &SessionRecord) -> Result<(), PitwallError> {
        use std::io::Write;

        let file_path = self.file_path_for_id(&record.id)?;
        let temp_path = file_path.with_extension("json.tmp");

        let content = serde_json::to_string_pretty(record)
            .map_err(|e| PitwallError::SessionSerializeError { source: e })?;

        {
            let mut temp_file =
                fs::File::create(&temp_path).map_err(|e| PitwallError::FileOperationError {
                    operation: "create_temp_file".to_string(),
                    reason: format!("Failed to create temporary file: {}", e),
                })?;

            temp_file.write_all(content.as_bytes()).map_err(|e| {
                PitwallError::FileOperationError {
                    operation: "write_temp_file".to_string(),
                    reason: format!("Failed to write to temporary file: {}", e),
                }
            })?;

            temp_file
                .sync_all()
                .map_err(|e| PitwallError::FileOperationError {
                    operation: "sync_temp_file".to_string(),
                    reason: format!("Failed to sync temporary file: {}", e),
                })?;
        }

        fs::rename(&temp_path, &file_path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            PitwallError::FileOperationError {
                operation: "atomic_move".to_string(),
                reason: format!("Failed to move temporary file to final location: {}", e),
            }
        })?;

        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn save(&self, record: &SessionRecord) -> Result<(), PitwallError> {
        use log::{error, info};

        info!(
            "Saving session {} ({} points)",
            record.id, record.stats.total_points
        );

        match self.save_to_file(record) {
            Ok(()) => Ok(()),
            Err(e) => {
                error!("Failed to save session {}: {}", record.id, e);
                Err(e)
            }
        }
    }

    fn load(&self, id: &str) -> Result<Option<SessionRecord>, PitwallError> {
        let file_path = self.file_path_for_id(id)?;

        if !file_path.exists() {
            return Ok(None);
        }

        self.load_from_file(&file_path).map(Some)
    }

    fn list(&self) -> Result<Vec<SessionRecord>, PitwallError> {
        use log::warn;

        let entries = fs::read_dir(&self.storage_path)
            .map_err(|e| PitwallError::SessionReadError { source: e })?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PitwallError::SessionReadError { source: e })?;
            let path = entry.path();

            if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            match self.load_from_file(&path) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!("Skipping unreadable session file {:?}: {}", path, e);
                }
            }
        }

        Ok(records
            .into_iter()
            .sorted_by(|a, b| b.upload_date.cmp(&a.upload_date))
            .collect())
    }

    fn delete(&self, id: &str) -> Result<bool, PitwallError> {
        let file_path = self.file_path_for_id(id)?;

        if !file_path.exists() {
            return Ok(false);
        }

        fs::remove_file(&file_path).map_err(|e| PitwallError::SessionReadError { source: e })?;
        Ok(true)
    }

    fn exists(&self, id: &str) -> Result<bool, PitwallError> {
        let file_path = self.file_path_for_id(id)?;
        Ok(file_path.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SamplePoint, SampleTime, SessionStats, SpeedUnit};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn create_test_record(id: &str, upload_epoch_s: i64) -> SessionRecord {
        let points = vec![
            SamplePoint {
                time: Some(SampleTime::Text("2026-05-10T14:00:00Z".to_string())),
                lat: 45.618,
                lng: 9.281,
                speed: Some(12.5),
                rpm: None,
            },
            SamplePoint {
                time: Some(SampleTime::Text("2026-05-10T14:00:01Z".to_string())),
                lat: 45.619,
                lng: 9.282,
                speed: Some(14.0),
                rpm: None,
            },
        ];

        SessionRecord {
            id: id.to_string(),
            original_filename: "morning-run.gpx".to_string(),
            upload_date: Utc.timestamp_opt(upload_epoch_s, 0).unwrap(),
            track_name: Some("Sentul International".to_string()),
            stats: SessionStats::from_points(&points, SpeedUnit::MetersPerSecond),
            points,
        }
    }

    #[test]
    fn test_store_creation_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("sessions");
        let store = FileSessionStore::new(nested.clone()).unwrap();

        assert!(nested.exists());
        assert_eq!(store.storage_path(), nested);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp_dir.path().to_path_buf()).unwrap();

        let record = create_test_record("abc-123", 1_760_000_000);
        store.save(&record).unwrap();

        let loaded = store.load("abc-123").unwrap();
        assert_eq!(loaded, Some(record));
    }

    #[test]
    fn test_load_missing_id_returns_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp_dir.path().to_path_buf()).unwrap();

        assert!(store.load("does-not-exist").unwrap().is_none());
    }

    #[test]
    fn test_exact_lookup_ignores_partial_id_matches() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp_dir.path().to_path_buf()).unwrap();

        store
            .save(&create_test_record("1756000000123", 1_756_000_000))
            .unwrap();

        // A substring of a stored id must not resolve to that record
        assert!(store.load("1756000000").unwrap().is_none());
        assert!(store.load("123").unwrap().is_none());
    }

    #[test]
    fn test_list_sorted_by_upload_date_descending() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp_dir.path().to_path_buf()).unwrap();

        store.save(&create_test_record("middle", 2_000)).unwrap();
        store.save(&create_test_record("oldest", 1_000)).unwrap();
        store.save(&create_test_record("newest", 3_000)).unwrap();

        let listed = store.list().unwrap();
        let ids: Vec<&str> = listed.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["newest", "middle", "oldest"]);
    }

    #[test]
    fn test_list_skips_unparseable_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp_dir.path().to_path_buf()).unwrap();

        store.save(&create_test_record("valid", 1_000)).unwrap();
        fs::write(temp_dir.path().join("corrupt.json"), "{not json").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "valid");
    }

    #[test]
    fn test_delete_removes_record() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp_dir.path().to_path_buf()).unwrap();

        store.save(&create_test_record("gone-soon", 1_000)).unwrap();
        assert!(store.exists("gone-soon").unwrap());

        assert!(store.delete("gone-soon").unwrap());
        assert!(!store.exists("gone-soon").unwrap());
        assert!(store.load("gone-soon").unwrap().is_none());

        // Deleting again reports that nothing was there
        assert!(!store.delete("gone-soon").unwrap());
    }

    #[test]
    fn test_ids_with_path_separators_are_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp_dir.path().to_path_buf()).unwrap();

        assert!(store.load("../../etc/passwd").is_err());
        assert!(store.load("a/b").is_err());
        assert!(store.load("").is_err());
        assert!(store.delete("..").is_err());
    }

    #[test]
    fn test_no_temp_files_left_after_save() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(temp_dir.path().to_path_buf()).unwrap();

        store.save(&create_test_record("tidy", 1_000)).unwrap();

        let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
