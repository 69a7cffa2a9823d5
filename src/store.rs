//! Profile persistence.
//!
//! A single-table SQLite store keyed by profile name. The profile itself is
//! a JSON blob; sample rate, mean F0 and creation time are duplicated into
//! indexed columns for listing and lookup. Writes serialize through an
//! internal mutex (single writer, blob granularity).

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::types::VoiceProfile;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("profile serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Listing row for one stored profile.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ProfileSummary {
    pub name: String,
    pub sample_rate: u32,
    pub f0_mean: f32,
    pub created_at: String,
}

pub struct ProfileStore {
    conn: Mutex<Connection>,
}

impl ProfileStore {
    /// Open (creating if needed) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open the store at the default per-user location.
    pub fn open_default() -> Result<Self, StoreError> {
        Self::open(&default_db_path())
    }

    /// In-memory store, handy for tests and ephemeral servers.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().expect("profile store mutex poisoned");
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS profiles (
                name TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                sample_rate INTEGER NOT NULL,
                f0_mean REAL NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS idx_profiles_sample_rate ON profiles(sample_rate);
            CREATE INDEX IF NOT EXISTS idx_profiles_f0_mean ON profiles(f0_mean);
            CREATE INDEX IF NOT EXISTS idx_profiles_created_at ON profiles(created_at);",
        )?;
        Ok(())
    }

    /// Insert or replace a profile under `name`.
    pub fn save(&self, name: &str, profile: &VoiceProfile) -> Result<(), StoreError> {
        let blob = serde_json::to_string(profile)?;
        let conn = self.conn.lock().expect("profile store mutex poisoned");
        conn.execute(
            "INSERT OR REPLACE INTO profiles (name, data, sample_rate, f0_mean)
             VALUES (?1, ?2, ?3, ?4)",
            params![name, blob, profile.sample_rate, profile.pitch.f0_mean as f64],
        )?;
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<Option<VoiceProfile>, StoreError> {
        let conn = self.conn.lock().expect("profile store mutex poisoned");
        let blob: Option<String> = conn
            .query_row(
                "SELECT data FROM profiles WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        match blob {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Returns whether a profile was actually removed.
    pub fn delete(&self, name: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().expect("profile store mutex poisoned");
        let changed = conn.execute("DELETE FROM profiles WHERE name = ?1", params![name])?;
        Ok(changed > 0)
    }

    pub fn exists(&self, name: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().expect("profile store mutex poisoned");
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM profiles WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Newest first.
    pub fn list(&self) -> Result<Vec<ProfileSummary>, StoreError> {
        let conn = self.conn.lock().expect("profile store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT name, sample_rate, f0_mean, created_at
             FROM profiles ORDER BY created_at DESC, name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ProfileSummary {
                name: row.get(0)?,
                sample_rate: row.get(1)?,
                f0_mean: row.get::<_, f64>(2)? as f32,
                created_at: row.get(3)?,
            })
        })?;
        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }
        Ok(summaries)
    }
}

/// `~/.voico/profiles.db`, falling back to the working directory when the
/// home directory cannot be resolved.
pub fn default_db_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".voico")
        .join("profiles.db")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FormantTrack, PitchContour, SpectralFeatures};

    fn profile() -> VoiceProfile {
        VoiceProfile {
            pitch: PitchContour {
                f0: vec![120.0, f32::NAN, 130.0],
                voiced_mask: vec![true, false, true],
                f0_mean: 125.0,
                f0_std: 5.0,
                hnr_db: 18.0,
            },
            formants: FormantTrack {
                frequencies: vec![vec![500.0; 3], vec![1500.0; 3]],
                bandwidths: vec![vec![80.0; 3], vec![100.0; 3]],
                mean_frequencies: vec![500.0, 1500.0],
                mean_bandwidths: vec![80.0, 100.0],
            },
            spectral: SpectralFeatures {
                envelope: vec![vec![1.0; 8]; 3],
                spectral_tilt: -0.4,
            },
            harmonic_ratios: vec![0.7; 3],
            harmonic_energy: vec![2.0; 3],
            sample_rate: 44100,
        }
    }

    #[test]
    fn test_save_load_round_trip_with_nan() {
        let store = ProfileStore::open_in_memory().unwrap();
        store.save("alice", &profile()).unwrap();

        let loaded = store.load("alice").unwrap().unwrap();
        assert_eq!(loaded.sample_rate, 44100);
        assert_eq!(loaded.pitch.f0_mean, 125.0);
        assert!(loaded.pitch.f0[1].is_nan());
        assert_eq!(loaded.formants.mean_frequencies, vec![500.0, 1500.0]);
    }

    #[test]
    fn test_missing_profile_is_none() {
        let store = ProfileStore::open_in_memory().unwrap();
        assert!(store.load("nobody").unwrap().is_none());
        assert!(!store.exists("nobody").unwrap());
    }

    #[test]
    fn test_delete_reports_removal() {
        let store = ProfileStore::open_in_memory().unwrap();
        store.save("bob", &profile()).unwrap();
        assert!(store.exists("bob").unwrap());
        assert!(store.delete("bob").unwrap());
        assert!(!store.delete("bob").unwrap());
    }

    #[test]
    fn test_list_contains_summary_columns() {
        let store = ProfileStore::open_in_memory().unwrap();
        store.save("a", &profile()).unwrap();
        store.save("b", &profile()).unwrap();
        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|p| p.sample_rate == 44100));
        assert!(listed.iter().all(|p| !p.created_at.is_empty()));
    }

    #[test]
    fn test_save_replaces_existing() {
        let store = ProfileStore::open_in_memory().unwrap();
        let mut p = profile();
        store.save("carol", &p).unwrap();
        p.pitch.f0_mean = 200.0;
        store.save("carol", &p).unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(store.load("carol").unwrap().unwrap().pitch.f0_mean, 200.0);
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.db");
        {
            let store = ProfileStore::open(&path).unwrap();
            store.save("dave", &profile()).unwrap();
        }
        let store = ProfileStore::open(&path).unwrap();
        assert!(store.exists("dave").unwrap());
    }
}
