use anyhow::{Context, Result};
use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::db::Database;
use crate::models::{ChangeEntry, NewChange, now_timestamp};

pub const HISTORY_PREFIX: &str = "mealcare_history";
/// Entries kept per profile; older ones are dropped on append.
pub const HISTORY_LIMIT: usize = 50;

#[must_use]
pub fn history_key(profile_id: &str) -> String {
    format!("{HISTORY_PREFIX}_{profile_id}")
}

fn entry_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}_{}", Utc::now().timestamp_millis(), &suffix[..9])
}

/// Most-recent-first change log per profile.
pub struct ChangeHistory<'a> {
    db: &'a Database,
}

impl<'a> ChangeHistory<'a> {
    #[must_use]
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    #[must_use]
    pub fn list(&self, profile_id: &str) -> Vec<ChangeEntry> {
        self.try_list(profile_id).unwrap_or_else(|e| {
            warn!(profile_id, error = %format!("{e:#}"), "failed to load change history");
            Vec::new()
        })
    }

    fn try_list(&self, profile_id: &str) -> Result<Vec<ChangeEntry>> {
        match self.db.get_item(&history_key(profile_id))? {
            Some(raw) => serde_json::from_str(&raw)
                .with_context(|| format!("Stored history for '{profile_id}' is not valid JSON")),
            None => Ok(Vec::new()),
        }
    }

    /// Records a change as the newest entry. A failed write is logged and the entry is still returned.
    pub fn append(&self, profile_id: &str, change: NewChange) -> ChangeEntry {
        let entry = ChangeEntry {
            id: entry_id(),
            timestamp: now_timestamp(),
            change_type: change.change_type,
            category: change.category,
            description: change.description,
            updated_by: change.updated_by,
            old_value: change.old_value,
            new_value: change.new_value,
        };

        let mut entries = self.list(profile_id);
        entries.insert(0, entry.clone());
        entries.truncate(HISTORY_LIMIT);

        let written = serde_json::to_string(&entries)
            .map_err(anyhow::Error::from)
            .and_then(|json| self.db.set_item(&history_key(profile_id), &json));
        if let Err(e) = written {
            warn!(profile_id, error = %format!("{e:#}"), "failed to record change");
        }
        entry
    }

    pub fn clear(&self, profile_id: &str) -> bool {
        match self.db.remove_item(&history_key(profile_id)) {
            Ok(_) => true,
            Err(e) => {
                warn!(profile_id, error = %format!("{e:#}"), "failed to clear change history");
                false
            }
        }
    }
}
