use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};

use crate::models::{Profile, now_timestamp};

/// Where a session's data lives: the data-directory file or a process-lifetime memory database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    #[default]
    Durable,
    Session,
}

impl StorageMode {
    /// A query string with an `ephemeral` key or `persist=false` selects session storage.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let query = query.trim_start_matches('?');
        let session = url::form_urlencoded::parse(query.as_bytes()).any(|(key, value)| {
            key == "ephemeral" || (key == "persist" && value.eq_ignore_ascii_case("false"))
        });
        if session { Self::Session } else { Self::Durable }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Durable => "durable",
            Self::Session => "session",
        }
    }
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Opens the database backing `mode`; `path` is only used for durable storage.
    pub fn open_for(mode: StorageMode, path: &Path) -> Result<Self> {
        match mode {
            StorageMode::Durable => Self::open(path),
            StorageMode::Session => Self::open_in_memory(),
        }
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS profiles (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    initial TEXT NOT NULL,
                    birthday TEXT NOT NULL,
                    status TEXT NOT NULL,
                    last_online TEXT NOT NULL,
                    emergency_contact TEXT,
                    primary_caregiver TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS kv_store (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    fn profile_from_row(row: &rusqlite::Row) -> rusqlite::Result<Profile> {
        Ok(Profile {
            id: row.get(0)?,
            name: row.get(1)?,
            initial: row.get(2)?,
            birthday: row.get(3)?,
            status: row.get(4)?,
            last_online: row.get(5)?,
            emergency_contact: row.get(6)?,
            primary_caregiver: row.get(7)?,
        })
    }

    // --- Profiles ---

    pub fn insert_profile(&self, profile: &Profile) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO profiles (id, name, initial, birthday, status, last_online,
                                       emergency_contact, primary_caregiver, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    profile.id,
                    profile.name,
                    profile.initial,
                    profile.birthday,
                    profile.status,
                    profile.last_online,
                    profile.emergency_contact,
                    profile.primary_caregiver,
                    now_timestamp(),
                ],
            )
            .with_context(|| format!("Failed to insert profile '{}'", profile.name))?;
        Ok(())
    }

    pub fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT id, name, initial, birthday, status, last_online,
                        emergency_contact, primary_caregiver
                 FROM profiles WHERE id = ?1",
                params![id],
                Self::profile_from_row,
            )
            .optional()?;
        Ok(profile)
    }

    /// All profiles in the order they were added.
    pub fn list_profiles(&self) -> Result<Vec<Profile>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, initial, birthday, status, last_online,
                    emergency_contact, primary_caregiver
             FROM profiles ORDER BY rowid",
        )?;
        let profiles = stmt
            .query_map([], Self::profile_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(profiles)
    }

    // --- Key-value documents ---

    pub fn get_item(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM kv_store WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        if let Some(row) = rows.next()? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    pub fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv_store (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
            params![key, value, now_timestamp()],
        )?;
        Ok(())
    }

    pub fn remove_item(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }

    /// Keys starting with `prefix`, matched literally.
    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT key FROM kv_store WHERE substr(key, 1, length(?1)) = ?1 ORDER BY key",
        )?;
        let keys = stmt
            .query_map(params![prefix], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }

    /// Makes every later key-value access fail.
    #[cfg(test)]
    pub(crate) fn break_kv_store(&self) {
        self.conn
            .execute_batch("DROP TABLE kv_store;")
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(id: &str, name: &str) -> Profile {
        Profile {
            id: id.to_string(),
            name: name.to_string(),
            initial: name[..1].to_uppercase(),
            birthday: "1938-05-14".to_string(),
            status: "New".to_string(),
            last_online: "Just added".to_string(),
            emergency_contact: None,
            primary_caregiver: Some("Sam".to_string()),
        }
    }

    #[test]
    fn test_storage_mode_from_query() {
        assert_eq!(StorageMode::from_query(""), StorageMode::Durable);
        assert_eq!(StorageMode::from_query("?ephemeral"), StorageMode::Session);
        assert_eq!(StorageMode::from_query("tab=1&ephemeral=1"), StorageMode::Session);
        assert_eq!(StorageMode::from_query("persist=false"), StorageMode::Session);
        assert_eq!(StorageMode::from_query("persist=true"), StorageMode::Durable);
        assert_eq!(StorageMode::from_query("persistent=false"), StorageMode::Durable);
    }

    #[test]
    fn test_migration_sets_user_version() {
        let db = Database::open_in_memory().unwrap();
        let version: i64 = db
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, 1);
        // Running again is a no-op
        db.migrate().unwrap();
    }

    #[test]
    fn test_profile_insert_get_list() {
        let db = Database::open_in_memory().unwrap();
        db.insert_profile(&profile("p2", "Walter")).unwrap();
        db.insert_profile(&profile("p1", "Margaret")).unwrap();

        let fetched = db.get_profile("p1").unwrap().unwrap();
        assert_eq!(fetched.name, "Margaret");
        assert_eq!(fetched.initial, "M");
        assert_eq!(fetched.primary_caregiver.as_deref(), Some("Sam"));
        assert!(fetched.emergency_contact.is_none());

        let all = db.list_profiles().unwrap();
        let ids: Vec<&str> = all.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p1"]);

        assert!(db.get_profile("missing").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_profile_id_fails() {
        let db = Database::open_in_memory().unwrap();
        db.insert_profile(&profile("p1", "Margaret")).unwrap();
        assert!(db.insert_profile(&profile("p1", "Walter")).is_err());
    }

    #[test]
    fn test_item_set_get_upsert_remove() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get_item("k").unwrap().is_none());
        db.set_item("k", "one").unwrap();
        db.set_item("k", "two").unwrap();
        assert_eq!(db.get_item("k").unwrap().as_deref(), Some("two"));
        assert!(db.remove_item("k").unwrap());
        assert!(!db.remove_item("k").unwrap());
    }

    #[test]
    fn test_keys_with_prefix_is_literal() {
        let db = Database::open_in_memory().unwrap();
        db.set_item("mealcare_preferences_a", "{}").unwrap();
        db.set_item("mealcare_preferences_b", "{}").unwrap();
        db.set_item("mealcare_history_a", "[]").unwrap();
        // '_' must not act as a wildcard
        db.set_item("mealcareXpreferences_c", "{}").unwrap();

        let keys = db.keys_with_prefix("mealcare_preferences_").unwrap();
        assert_eq!(keys, vec!["mealcare_preferences_a", "mealcare_preferences_b"]);
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mealcare.db");
        {
            let db = Database::open_for(StorageMode::Durable, &path).unwrap();
            db.insert_profile(&profile("p1", "Margaret")).unwrap();
            db.set_item("k", "v").unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.list_profiles().unwrap().len(), 1);
        assert_eq!(db.get_item("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn test_session_database_ignores_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never-created.db");
        let db = Database::open_for(StorageMode::Session, &path).unwrap();
        db.set_item("k", "v").unwrap();
        assert!(!path.exists());
    }
}
