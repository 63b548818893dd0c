use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Canonical form used for duplicate and conflict checks: trimmed, lowercased,
/// compatibility-decomposed with diacritics dropped.
#[must_use]
pub fn normalize(s: &str) -> String {
    s.trim()
        .to_lowercase()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// RFC 3339 UTC timestamp with millisecond precision, the format every stored record uses.
#[must_use]
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// --- Enumerations ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealCategory {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealCategory {
    pub const ALL: [MealCategory; 4] = [Self::Breakfast, Self::Lunch, Self::Dinner, Self::Snack];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
            Self::Snack => "snack",
        }
    }
}

impl FromStr for MealCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "breakfast" => Ok(Self::Breakfast),
            "lunch" => Ok(Self::Lunch),
            "dinner" => Ok(Self::Dinner),
            "snack" => Ok(Self::Snack),
            _ => bail!(
                "Invalid meal category '{s}'. Must be one of: breakfast, lunch, dinner, snack"
            ),
        }
    }
}

impl fmt::Display for MealCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How strongly a food should be kept off the plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvoidLevel {
    Mild,
    Moderate,
    Absolute,
}

impl AvoidLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mild => "mild",
            Self::Moderate => "moderate",
            Self::Absolute => "absolute",
        }
    }

    /// Caregiver-facing wording for the level.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Absolute => "Never serve",
            Self::Moderate => "Strong dislike",
            Self::Mild => "Mild dislike",
        }
    }
}

impl FromStr for AvoidLevel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mild" => Ok(Self::Mild),
            "moderate" => Ok(Self::Moderate),
            "absolute" => Ok(Self::Absolute),
            _ => bail!("Invalid avoid level '{s}'. Must be one of: mild, moderate, absolute"),
        }
    }
}

impl fmt::Display for AvoidLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllergySeverity {
    Mild,
    Severe,
}

impl AllergySeverity {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mild => "mild",
            Self::Severe => "severe",
        }
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Severe => "SEVERE",
            Self::Mild => "Mild",
        }
    }
}

impl FromStr for AllergySeverity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mild" => Ok(Self::Mild),
            "severe" => Ok(Self::Severe),
            _ => bail!("Invalid allergy severity '{s}'. Must be one of: mild, severe"),
        }
    }
}

impl fmt::Display for AllergySeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the four editable parts of a preference snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Favorites,
    Dislikes,
    Allergies,
    Notes,
}

impl Section {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Favorites => "favorites",
            Self::Dislikes => "dislikes",
            Self::Allergies => "allergies",
            Self::Notes => "notes",
        }
    }

    /// Name shown to caregivers; the dislikes list is presented as the "avoid list".
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Dislikes => "avoid list",
            other => other.as_str(),
        }
    }
}

impl FromStr for Section {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "favorites" => Ok(Self::Favorites),
            "dislikes" => Ok(Self::Dislikes),
            "allergies" => Ok(Self::Allergies),
            "notes" => Ok(Self::Notes),
            _ => bail!(
                "Invalid section '{s}'. Must be one of: favorites, dislikes, allergies, notes"
            ),
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Preference items ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteFood {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<MealCategory>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvoidedFood {
    pub id: String,
    pub name: String,
    pub level: AvoidLevel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allergy {
    pub id: String,
    pub label: String,
    pub severity: AllergySeverity,
}

/// A single list entry of any kind, discriminated by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PreferenceItem {
    Favorite(FavoriteFood),
    Avoid(AvoidedFood),
    Allergy(Allergy),
}

impl PreferenceItem {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Favorite(f) => &f.id,
            Self::Avoid(a) => &a.id,
            Self::Allergy(a) => &a.id,
        }
    }

    /// The food name, or the label for allergies.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Favorite(f) => &f.name,
            Self::Avoid(a) => &a.name,
            Self::Allergy(a) => &a.label,
        }
    }

    #[must_use]
    pub fn section(&self) -> Section {
        match self {
            Self::Favorite(_) => Section::Favorites,
            Self::Avoid(_) => Section::Dislikes,
            Self::Allergy(_) => Section::Allergies,
        }
    }

    #[must_use]
    pub fn added_description(&self) -> String {
        match self {
            Self::Favorite(f) => format!("Added \"{}\" to favorites", f.name),
            Self::Avoid(a) => format!(
                "Added \"{}\" to avoid list ({})",
                a.name,
                a.level.description()
            ),
            Self::Allergy(a) => format!(
                "Added \"{}\" allergy ({})",
                a.label,
                a.severity.description()
            ),
        }
    }

    #[must_use]
    pub fn removed_description(&self) -> String {
        match self {
            Self::Favorite(f) => format!("Removed \"{}\" from favorites", f.name),
            Self::Avoid(a) => format!("Removed \"{}\" from avoid list", a.name),
            Self::Allergy(a) => format!("Removed \"{}\" allergy", a.label),
        }
    }

    /// Describes `self` as the replacement of `old`.
    #[must_use]
    pub fn updated_description(&self, old: &PreferenceItem) -> String {
        let old_name = old.name();
        match self {
            Self::Favorite(f) => format!("Updated favorite: \"{old_name}\" → \"{}\"", f.name),
            Self::Avoid(a) => format!(
                "Updated dislike: \"{old_name}\" → \"{}\" ({})",
                a.name, a.level
            ),
            Self::Allergy(a) => format!(
                "Updated allergy: \"{old_name}\" → \"{}\" ({})",
                a.label, a.severity
            ),
        }
    }
}

// --- Snapshots ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceSnapshot {
    #[serde(default)]
    pub favorites: Vec<FavoriteFood>,
    #[serde(default)]
    pub dislikes: Vec<AvoidedFood>,
    #[serde(default)]
    pub allergies: Vec<Allergy>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub last_updated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl PreferenceSnapshot {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            favorites: Vec::new(),
            dislikes: Vec::new(),
            allergies: Vec::new(),
            notes: String::new(),
            last_updated: now_timestamp(),
            updated_by: None,
        }
    }

    /// True when the profile has a severe allergy or a never-serve food.
    #[must_use]
    pub fn has_safety_blockers(&self) -> bool {
        self.allergies
            .iter()
            .any(|a| a.severity == AllergySeverity::Severe)
            || self.dislikes.iter().any(|d| d.level == AvoidLevel::Absolute)
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.favorites.is_empty()
            && self.dislikes.is_empty()
            && self.allergies.is_empty()
            && self.notes.trim().is_empty()
    }

    #[must_use]
    pub fn find_item(&self, section: Section, id: &str) -> Option<PreferenceItem> {
        match section {
            Section::Favorites => self
                .favorites
                .iter()
                .find(|f| f.id == id)
                .cloned()
                .map(PreferenceItem::Favorite),
            Section::Dislikes => self
                .dislikes
                .iter()
                .find(|d| d.id == id)
                .cloned()
                .map(PreferenceItem::Avoid),
            Section::Allergies => self
                .allergies
                .iter()
                .find(|a| a.id == id)
                .cloned()
                .map(PreferenceItem::Allergy),
            Section::Notes => None,
        }
    }

    /// Appends the item to its list.
    pub fn insert_item(&mut self, item: PreferenceItem) {
        match item {
            PreferenceItem::Favorite(f) => self.favorites.push(f),
            PreferenceItem::Avoid(a) => self.dislikes.push(a),
            PreferenceItem::Allergy(a) => self.allergies.push(a),
        }
    }

    /// Replaces the entry with the same id in place, returning the previous value.
    pub fn replace_item(&mut self, item: PreferenceItem) -> Option<PreferenceItem> {
        match item {
            PreferenceItem::Favorite(f) => {
                let slot = self.favorites.iter_mut().find(|x| x.id == f.id)?;
                Some(PreferenceItem::Favorite(std::mem::replace(slot, f)))
            }
            PreferenceItem::Avoid(a) => {
                let slot = self.dislikes.iter_mut().find(|x| x.id == a.id)?;
                Some(PreferenceItem::Avoid(std::mem::replace(slot, a)))
            }
            PreferenceItem::Allergy(a) => {
                let slot = self.allergies.iter_mut().find(|x| x.id == a.id)?;
                Some(PreferenceItem::Allergy(std::mem::replace(slot, a)))
            }
        }
    }

    pub fn remove_item(&mut self, section: Section, id: &str) -> Option<PreferenceItem> {
        match section {
            Section::Favorites => {
                let idx = self.favorites.iter().position(|f| f.id == id)?;
                Some(PreferenceItem::Favorite(self.favorites.remove(idx)))
            }
            Section::Dislikes => {
                let idx = self.dislikes.iter().position(|d| d.id == id)?;
                Some(PreferenceItem::Avoid(self.dislikes.remove(idx)))
            }
            Section::Allergies => {
                let idx = self.allergies.iter().position(|a| a.id == id)?;
                Some(PreferenceItem::Allergy(self.allergies.remove(idx)))
            }
            Section::Notes => None,
        }
    }
}

impl Default for PreferenceSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Partial snapshot merged field-by-field over the stored one before saving.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorites: Option<Vec<FavoriteFood>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dislikes: Option<Vec<AvoidedFood>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allergies: Option<Vec<Allergy>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl PreferencesUpdate {
    /// An update carrying only `section` copied from `snapshot`.
    #[must_use]
    pub fn section_of(snapshot: &PreferenceSnapshot, section: Section) -> Self {
        match section {
            Section::Favorites => Self {
                favorites: Some(snapshot.favorites.clone()),
                ..Self::default()
            },
            Section::Dislikes => Self {
                dislikes: Some(snapshot.dislikes.clone()),
                ..Self::default()
            },
            Section::Allergies => Self {
                allergies: Some(snapshot.allergies.clone()),
                ..Self::default()
            },
            Section::Notes => Self {
                notes: Some(snapshot.notes.clone()),
                ..Self::default()
            },
        }
    }

    pub fn apply_to(&self, snapshot: &mut PreferenceSnapshot) {
        if let Some(ref favorites) = self.favorites {
            snapshot.favorites.clone_from(favorites);
        }
        if let Some(ref dislikes) = self.dislikes {
            snapshot.dislikes.clone_from(dislikes);
        }
        if let Some(ref allergies) = self.allergies {
            snapshot.allergies.clone_from(allergies);
        }
        if let Some(ref notes) = self.notes {
            snapshot.notes.clone_from(notes);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceExport {
    #[serde(flatten)]
    pub snapshot: PreferenceSnapshot,
    #[serde(rename = "elderId")]
    pub profile_id: String,
    pub exported_at: String,
}

// --- Profiles ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub initial: String,
    pub birthday: String,
    pub status: String,
    pub last_online: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_caregiver: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProfile {
    pub name: String,
    pub birthday: String,
    #[serde(default)]
    pub emergency_contact: Option<String>,
    #[serde(default)]
    pub primary_caregiver: Option<String>,
}

pub const NEW_PROFILE_STATUS: &str = "New";
pub const NEW_PROFILE_LAST_ONLINE: &str = "Just added";

// --- Change history ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Removed,
    Updated,
    NotesChanged,
}

impl ChangeType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Updated => "updated",
            Self::NotesChanged => "notes_changed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    pub id: String,
    pub timestamp: String,
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub category: Section,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
}

/// Caller-supplied fields of a history entry; id and timestamp are assigned on append.
#[derive(Debug, Clone)]
pub struct NewChange {
    pub change_type: ChangeType,
    pub category: Section,
    pub description: String,
    pub updated_by: Option<String>,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl NewChange {
    #[must_use]
    pub fn new(change_type: ChangeType, category: Section, description: impl Into<String>) -> Self {
        Self {
            change_type,
            category,
            description: description.into(),
            updated_by: None,
            old_value: None,
            new_value: None,
        }
    }
}
