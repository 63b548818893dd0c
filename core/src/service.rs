use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::catalog::{MEAL_CATALOG, find_meal};
use crate::db::{Database, StorageMode};
use crate::history::ChangeHistory;
use crate::matcher::{MealAssessment, assess};
use crate::models::{
    Allergy, AllergySeverity, AvoidLevel, AvoidedFood, ChangeEntry, ChangeType, FavoriteFood,
    MealCategory, NEW_PROFILE_LAST_ONLINE, NEW_PROFILE_STATUS, NewChange, NewProfile,
    PreferenceExport, PreferenceItem, PreferenceSnapshot, PreferencesUpdate, Profile, Section,
};
use crate::preferences::PreferenceStore;
use crate::ranker::{MealSuggestion, for_category, suggest};
use crate::undo::{UndoOp, UndoRegistry, UndoTicket};
use crate::validation::{
    Rejection, check_allergy, check_avoid, check_favorite, check_new_profile, check_notes,
    check_snapshot,
};

pub const MANUAL_SAVE_AUTHOR: &str = "Manual Save";
const MANUAL_SAVE_RECORDED_BY: &str = "User";

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error(transparent)]
    Rejected(#[from] Rejection),
    #[error("Profile not found: {0}")]
    ProfileNotFound(String),
    #[error("Nothing to undo for '{0}' (unknown or expired)")]
    UndoUnavailable(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

// --- Edit inputs and results ---

#[derive(Debug, Clone, Deserialize)]
pub struct FavoriteInput {
    pub name: String,
    #[serde(default)]
    pub category: Option<MealCategory>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AvoidInput {
    pub name: String,
    pub level: AvoidLevel,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllergyInput {
    pub label: String,
    pub severity: AllergySeverity,
}

/// New field values for an entry of one section.
#[derive(Debug, Clone)]
pub enum ItemInput {
    Favorite(FavoriteInput),
    Avoid(AvoidInput),
    Allergy(AllergyInput),
}

impl ItemInput {
    #[must_use]
    pub fn section(&self) -> Section {
        match self {
            Self::Favorite(_) => Section::Favorites,
            Self::Avoid(_) => Section::Dislikes,
            Self::Allergy(_) => Section::Allergies,
        }
    }

    /// Validates against `snapshot` and builds the entry carrying `id`.
    fn into_item(
        self,
        id: String,
        snapshot: &PreferenceSnapshot,
        replacing: Option<&str>,
    ) -> Result<PreferenceItem, Rejection> {
        Ok(match self {
            Self::Favorite(input) => PreferenceItem::Favorite(FavoriteFood {
                id,
                name: check_favorite(&input.name, snapshot, replacing)?,
                category: input.category,
            }),
            Self::Avoid(input) => PreferenceItem::Avoid(AvoidedFood {
                id,
                name: check_avoid(&input.name, snapshot, replacing)?,
                level: input.level,
            }),
            Self::Allergy(input) => PreferenceItem::Allergy(Allergy {
                id,
                label: check_allergy(&input.label, snapshot, replacing)?,
                severity: input.severity,
            }),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOutcome {
    pub item: PreferenceItem,
    pub change: ChangeEntry,
    pub undo: UndoTicket,
    pub preferences: PreferenceSnapshot,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotesOutcome {
    pub preferences: PreferenceSnapshot,
    pub change: Option<ChangeEntry>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoOutcome {
    pub message: String,
    pub profile_id: String,
    pub preferences: PreferenceSnapshot,
}

fn new_item_id() -> String {
    Uuid::new_v4().to_string()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Caregiver operations over one storage scope.
pub struct CareService {
    db: Database,
    mode: StorageMode,
}

impl CareService {
    pub fn new(db_path: &Path) -> Result<Self> {
        let db = Database::open(db_path)?;
        Ok(Self {
            db,
            mode: StorageMode::Durable,
        })
    }

    pub fn new_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db,
            mode: StorageMode::Session,
        })
    }

    pub fn open(mode: StorageMode, db_path: &Path) -> Result<Self> {
        let db = Database::open_for(mode, db_path)?;
        Ok(Self { db, mode })
    }

    #[must_use]
    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    #[must_use]
    pub fn store(&self) -> PreferenceStore<'_> {
        PreferenceStore::new(&self.db)
    }

    #[must_use]
    pub fn change_log(&self) -> ChangeHistory<'_> {
        ChangeHistory::new(&self.db)
    }

    // --- Profiles ---

    pub fn add_profile(&self, new: NewProfile) -> Result<Profile, EditError> {
        check_new_profile(&new)?;
        let name = new.name.trim().to_string();
        let initial = name
            .chars()
            .next()
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_default();
        let profile = Profile {
            id: new_item_id(),
            initial,
            name,
            birthday: new.birthday.trim().to_string(),
            status: NEW_PROFILE_STATUS.to_string(),
            last_online: NEW_PROFILE_LAST_ONLINE.to_string(),
            emergency_contact: non_blank(new.emergency_contact),
            primary_caregiver: non_blank(new.primary_caregiver),
        };
        self.db.insert_profile(&profile)?;
        info!(profile_id = %profile.id, "profile added");
        Ok(profile)
    }

    pub fn get_profile(&self, id: &str) -> Result<Profile, EditError> {
        self.db
            .get_profile(id)?
            .ok_or_else(|| EditError::ProfileNotFound(id.to_string()))
    }

    pub fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.db.list_profiles()
    }

    // --- Preferences ---

    pub fn preferences(&self, profile_id: &str) -> Result<PreferenceSnapshot, EditError> {
        self.get_profile(profile_id)?;
        Ok(self.store().load(profile_id))
    }

    /// Validates the merged snapshot, then writes it.
    pub fn save_preferences(
        &self,
        profile_id: &str,
        update: &PreferencesUpdate,
        updated_by: Option<&str>,
    ) -> Result<PreferenceSnapshot, EditError> {
        let mut merged = self.preferences(profile_id)?;
        update.apply_to(&mut merged);
        check_snapshot(&merged)?;
        Ok(self.store().try_save(profile_id, update, updated_by)?)
    }

    /// Re-validates and re-saves the current snapshot on request.
    pub fn manual_save(&self, profile_id: &str) -> Result<PreferenceSnapshot, EditError> {
        let current = self.preferences(profile_id)?;
        check_snapshot(&current)?;
        let saved = self.store().try_save(
            profile_id,
            &PreferencesUpdate::default(),
            Some(MANUAL_SAVE_AUTHOR),
        )?;
        let mut change = NewChange::new(ChangeType::Updated, Section::Notes, "Manual save triggered");
        change.updated_by = Some(MANUAL_SAVE_RECORDED_BY.to_string());
        self.change_log().append(profile_id, change);
        Ok(saved)
    }

    pub fn clear_preferences(&self, profile_id: &str) -> Result<bool, EditError> {
        self.get_profile(profile_id)?;
        Ok(self.store().clear(profile_id))
    }

    /// Ids of profiles that have a stored preference document.
    pub fn profiles_with_preferences(&self) -> Result<Vec<String>> {
        self.store().profile_ids()
    }

    pub fn export(&self, profile_id: &str) -> Result<PreferenceExport, EditError> {
        self.get_profile(profile_id)?;
        Ok(self.store().export(profile_id))
    }

    // --- Section edits ---

    fn commit_section(
        &self,
        profile_id: &str,
        snapshot: &PreferenceSnapshot,
        section: Section,
    ) -> Result<PreferenceSnapshot, EditError> {
        let update = PreferencesUpdate::section_of(snapshot, section);
        Ok(self.store().try_save(profile_id, &update, None)?)
    }

    pub fn add_item(
        &self,
        undo: &mut UndoRegistry,
        profile_id: &str,
        input: ItemInput,
    ) -> Result<EditOutcome, EditError> {
        let mut snapshot = self.preferences(profile_id)?;
        let section = input.section();
        let item = input.into_item(new_item_id(), &snapshot, None)?;
        snapshot.insert_item(item.clone());
        let preferences = self.commit_section(profile_id, &snapshot, section)?;

        let change = self.change_log().append(
            profile_id,
            NewChange::new(ChangeType::Added, section, item.added_description()),
        );
        let op = UndoOp::Discard {
            section,
            id: item.id().to_string(),
        };
        let undo = undo.register(profile_id, item.name(), op, Utc::now());
        info!(profile_id, section = %section, item_id = item.id(), "item added");
        Ok(EditOutcome {
            item,
            change,
            undo,
            preferences,
        })
    }

    pub fn update_item(
        &self,
        undo: &mut UndoRegistry,
        profile_id: &str,
        item_id: &str,
        input: ItemInput,
    ) -> Result<EditOutcome, EditError> {
        let mut snapshot = self.preferences(profile_id)?;
        let section = input.section();
        let unknown = || {
            EditError::from(Rejection::UnknownItem {
                section,
                id: item_id.to_string(),
            })
        };
        if snapshot.find_item(section, item_id).is_none() {
            return Err(unknown());
        }
        let item = input.into_item(item_id.to_string(), &snapshot, Some(item_id))?;
        let old = snapshot.replace_item(item.clone()).ok_or_else(unknown)?;
        let preferences = self.commit_section(profile_id, &snapshot, section)?;

        let change = self.change_log().append(
            profile_id,
            NewChange::new(ChangeType::Updated, section, item.updated_description(&old)),
        );
        let undo = undo.register(profile_id, item.name(), UndoOp::Revert(old), Utc::now());
        info!(profile_id, section = %section, item_id, "item updated");
        Ok(EditOutcome {
            item,
            change,
            undo,
            preferences,
        })
    }

    pub fn remove_item(
        &self,
        undo: &mut UndoRegistry,
        profile_id: &str,
        section: Section,
        item_id: &str,
    ) -> Result<EditOutcome, EditError> {
        let mut snapshot = self.preferences(profile_id)?;
        let item = snapshot
            .remove_item(section, item_id)
            .ok_or_else(|| Rejection::UnknownItem {
                section,
                id: item_id.to_string(),
            })?;
        let preferences = self.commit_section(profile_id, &snapshot, section)?;

        let change = self.change_log().append(
            profile_id,
            NewChange::new(ChangeType::Removed, section, item.removed_description()),
        );
        let undo = undo.register(
            profile_id,
            item.name(),
            UndoOp::Restore(item.clone()),
            Utc::now(),
        );
        info!(profile_id, section = %section, item_id, "item removed");
        Ok(EditOutcome {
            item,
            change,
            undo,
            preferences,
        })
    }

    /// Replaces the notes. History is only written when the text actually changes.
    pub fn set_notes(
        &self,
        profile_id: &str,
        notes: &str,
        updated_by: Option<&str>,
    ) -> Result<NotesOutcome, EditError> {
        check_notes(notes)?;
        let current = self.preferences(profile_id)?;
        if current.notes == notes {
            return Ok(NotesOutcome {
                preferences: current,
                change: None,
            });
        }

        let update = PreferencesUpdate {
            notes: Some(notes.to_string()),
            ..PreferencesUpdate::default()
        };
        let preferences = self.store().try_save(profile_id, &update, updated_by)?;
        let mut change = NewChange::new(
            ChangeType::NotesChanged,
            Section::Notes,
            "Updated special instructions",
        );
        change.updated_by = updated_by.map(str::to_string);
        change.old_value = Some(current.notes);
        change.new_value = Some(notes.to_string());
        let change = self.change_log().append(profile_id, change);
        Ok(NotesOutcome {
            preferences,
            change: Some(change),
        })
    }

    /// Reverses a registered edit. The reversal is not written to the change history.
    ///
    /// Refused with nothing written when the reversed lists would break a list rule.
    pub fn undo(&self, undo: &mut UndoRegistry, undo_id: &str) -> Result<UndoOutcome, EditError> {
        let action = undo
            .take(undo_id, Utc::now())
            .ok_or_else(|| EditError::UndoUnavailable(undo_id.to_string()))?;
        let mut snapshot = self.preferences(&action.profile_id)?;
        action.op.apply(&mut snapshot);
        // Later edits may have taken the name back; the ticket is spent either way.
        check_snapshot(&snapshot)?;
        let preferences = self.commit_section(&action.profile_id, &snapshot, action.section())?;
        info!(profile_id = %action.profile_id, undo_id, "edit undone");
        Ok(UndoOutcome {
            message: action.undo_message(),
            profile_id: action.profile_id,
            preferences,
        })
    }

    // --- History ---

    pub fn history(&self, profile_id: &str) -> Result<Vec<ChangeEntry>, EditError> {
        self.get_profile(profile_id)?;
        Ok(self.change_log().list(profile_id))
    }

    pub fn clear_history(&self, profile_id: &str) -> Result<bool, EditError> {
        self.get_profile(profile_id)?;
        Ok(self.change_log().clear(profile_id))
    }

    // --- Suggestions ---

    /// Ranked catalog for the profile, optionally cut to one category's reveal count.
    pub fn suggestions(
        &self,
        profile_id: &str,
        category: Option<MealCategory>,
        seed: u64,
    ) -> Result<Vec<MealSuggestion>, EditError> {
        let snapshot = self.preferences(profile_id)?;
        let ranked = suggest(MEAL_CATALOG, &snapshot, seed);
        Ok(match category {
            Some(category) => for_category(&ranked, category),
            None => ranked,
        })
    }

    /// Classifies a meal that need not be in the catalog.
    pub fn check_meal(
        &self,
        profile_id: &str,
        meal_name: &str,
        ingredients: &[String],
    ) -> Result<MealAssessment, EditError> {
        let snapshot = self.preferences(profile_id)?;
        Ok(assess(meal_name, ingredients, &snapshot))
    }

    /// Classifies a catalog meal by name; `None` when no catalog meal has that name.
    pub fn check_catalog_meal(
        &self,
        profile_id: &str,
        meal_name: &str,
    ) -> Result<Option<MealAssessment>, EditError> {
        let snapshot = self.preferences(profile_id)?;
        Ok(find_meal(meal_name).map(|meal| assess(meal.name, meal.ingredients, &snapshot)))
    }
}
