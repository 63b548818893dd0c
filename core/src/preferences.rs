use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::db::Database;
use crate::models::{PreferenceExport, PreferenceSnapshot, PreferencesUpdate, now_timestamp};

pub const PREFERENCES_PREFIX: &str = "mealcare_preferences";

#[must_use]
pub fn preferences_key(profile_id: &str) -> String {
    format!("{PREFERENCES_PREFIX}_{profile_id}")
}

/// Per-profile preference documents stored as JSON in the key-value table.
///
/// Read and write failures never propagate: reads fall back to an empty
/// snapshot and writes report `false`, leaving the stored document as it was.
pub struct PreferenceStore<'a> {
    db: &'a Database,
}

impl<'a> PreferenceStore<'a> {
    #[must_use]
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// The stored snapshot, or an empty one when nothing usable is stored.
    #[must_use]
    pub fn load(&self, profile_id: &str) -> PreferenceSnapshot {
        match self.try_load(profile_id) {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => PreferenceSnapshot::empty(),
            Err(e) => {
                warn!(profile_id, error = %format!("{e:#}"), "failed to load preferences");
                PreferenceSnapshot::empty()
            }
        }
    }

    fn try_load(&self, profile_id: &str) -> Result<Option<PreferenceSnapshot>> {
        let Some(raw) = self.db.get_item(&preferences_key(profile_id))? else {
            return Ok(None);
        };
        let snapshot = serde_json::from_str(&raw)
            .with_context(|| format!("Stored preferences for '{profile_id}' are not valid JSON"))?;
        Ok(Some(snapshot))
    }

    /// Merges `update` over the stored snapshot and writes the result.
    pub fn try_save(
        &self,
        profile_id: &str,
        update: &PreferencesUpdate,
        updated_by: Option<&str>,
    ) -> Result<PreferenceSnapshot> {
        let mut snapshot = self.load(profile_id);
        update.apply_to(&mut snapshot);
        snapshot.last_updated = now_timestamp();
        snapshot.updated_by = updated_by.map(str::to_string);

        let json = serde_json::to_string(&snapshot)?;
        self.db
            .set_item(&preferences_key(profile_id), &json)
            .with_context(|| format!("Failed to save preferences for '{profile_id}'"))?;
        debug!(profile_id, updated_by, "preferences saved");
        Ok(snapshot)
    }

    pub fn save(
        &self,
        profile_id: &str,
        update: &PreferencesUpdate,
        updated_by: Option<&str>,
    ) -> bool {
        match self.try_save(profile_id, update, updated_by) {
            Ok(_) => true,
            Err(e) => {
                warn!(profile_id, error = %format!("{e:#}"), "failed to save preferences");
                false
            }
        }
    }

    pub fn clear(&self, profile_id: &str) -> bool {
        match self.db.remove_item(&preferences_key(profile_id)) {
            Ok(_) => true,
            Err(e) => {
                warn!(profile_id, error = %format!("{e:#}"), "failed to clear preferences");
                false
            }
        }
    }

    #[must_use]
    pub fn export(&self, profile_id: &str) -> PreferenceExport {
        PreferenceExport {
            snapshot: self.load(profile_id),
            profile_id: profile_id.to_string(),
            exported_at: now_timestamp(),
        }
    }

    /// Ids of every profile with a stored preference document.
    pub fn profile_ids(&self) -> Result<Vec<String>> {
        let prefix = format!("{PREFERENCES_PREFIX}_");
        let keys = self.db.keys_with_prefix(&prefix)?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }
}
