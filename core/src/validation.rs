use std::collections::HashSet;
use std::fmt;

use crate::models::{NewProfile, PreferenceSnapshot, Section, normalize};

pub const NAME_MIN_CHARS: usize = 2;
pub const NAME_MAX_CHARS: usize = 100;
pub const NOTES_MAX_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameSubject {
    Food,
    Allergy,
}

impl fmt::Display for NameSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Food => "Food",
            Self::Allergy => "Allergy",
        })
    }
}

/// A user-facing reason an edit was refused. Nothing is written when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("{0} name must be at least 2 characters long")]
    NameTooShort(NameSubject),
    #[error("{0} name is too long (max 100 characters)")]
    NameTooLong(NameSubject),
    #[error(
        "'{name}' is already listed as {level}. Remove it first if you want to add it as a favorite."
    )]
    AlreadyAvoided { name: String, level: &'static str },
    #[error("'{0}' is already listed as a favorite. Remove it first if you want to avoid it.")]
    AlreadyFavorite(String),
    #[error("'{0}' is already in favorites")]
    DuplicateFavorite(String),
    #[error("'{0}' is already in the avoid list")]
    DuplicateAvoid(String),
    #[error("Allergy '{0}' already exists")]
    DuplicateAllergy(String),
    #[error("Notes are too long (max 500 characters)")]
    NotesTooLong,
    #[error("No {section} entry with id '{id}'")]
    UnknownItem { section: Section, id: String },
    #[error("Please enter a name")]
    MissingName,
    #[error("Please enter a birthday")]
    MissingBirthday,
}

/// Trims `value` and checks it against the name length bounds.
pub fn check_name(value: &str, subject: NameSubject) -> Result<String, Rejection> {
    let trimmed = value.trim();
    let len = trimmed.chars().count();
    if len < NAME_MIN_CHARS {
        return Err(Rejection::NameTooShort(subject));
    }
    if len > NAME_MAX_CHARS {
        return Err(Rejection::NameTooLong(subject));
    }
    Ok(trimmed.to_string())
}

/// Validates a favorite name against `snapshot`, returning the trimmed name.
///
/// `except_id` names the entry being updated, which is ignored by the duplicate check.
pub fn check_favorite(
    name: &str,
    snapshot: &PreferenceSnapshot,
    except_id: Option<&str>,
) -> Result<String, Rejection> {
    let trimmed = check_name(name, NameSubject::Food)?;
    let key = normalize(&trimmed);

    if let Some(conflict) = snapshot.dislikes.iter().find(|d| normalize(&d.name) == key) {
        return Err(Rejection::AlreadyAvoided {
            name: trimmed,
            level: conflict.level.description(),
        });
    }
    if snapshot
        .favorites
        .iter()
        .any(|f| Some(f.id.as_str()) != except_id && normalize(&f.name) == key)
    {
        return Err(Rejection::DuplicateFavorite(trimmed));
    }
    Ok(trimmed)
}

pub fn check_avoid(
    name: &str,
    snapshot: &PreferenceSnapshot,
    except_id: Option<&str>,
) -> Result<String, Rejection> {
    let trimmed = check_name(name, NameSubject::Food)?;
    let key = normalize(&trimmed);

    if snapshot.favorites.iter().any(|f| normalize(&f.name) == key) {
        return Err(Rejection::AlreadyFavorite(trimmed));
    }
    if snapshot
        .dislikes
        .iter()
        .any(|d| Some(d.id.as_str()) != except_id && normalize(&d.name) == key)
    {
        return Err(Rejection::DuplicateAvoid(trimmed));
    }
    Ok(trimmed)
}

pub fn check_allergy(
    label: &str,
    snapshot: &PreferenceSnapshot,
    except_id: Option<&str>,
) -> Result<String, Rejection> {
    let trimmed = check_name(label, NameSubject::Allergy)?;
    let key = normalize(&trimmed);

    if snapshot
        .allergies
        .iter()
        .any(|a| Some(a.id.as_str()) != except_id && normalize(&a.label) == key)
    {
        return Err(Rejection::DuplicateAllergy(trimmed));
    }
    Ok(trimmed)
}

pub fn check_notes(notes: &str) -> Result<(), Rejection> {
    if notes.chars().count() > NOTES_MAX_CHARS {
        return Err(Rejection::NotesTooLong);
    }
    Ok(())
}

/// Checks every list invariant across a whole snapshot.
pub fn check_snapshot(snapshot: &PreferenceSnapshot) -> Result<(), Rejection> {
    let mut favorites = HashSet::new();
    for favorite in &snapshot.favorites {
        let name = check_name(&favorite.name, NameSubject::Food)?;
        if !favorites.insert(normalize(&name)) {
            return Err(Rejection::DuplicateFavorite(name));
        }
    }

    let mut dislikes = HashSet::new();
    for dislike in &snapshot.dislikes {
        let name = check_name(&dislike.name, NameSubject::Food)?;
        let key = normalize(&name);
        if favorites.contains(&key) {
            return Err(Rejection::AlreadyFavorite(name));
        }
        if !dislikes.insert(key) {
            return Err(Rejection::DuplicateAvoid(name));
        }
    }

    let mut allergies = HashSet::new();
    for allergy in &snapshot.allergies {
        let label = check_name(&allergy.label, NameSubject::Allergy)?;
        if !allergies.insert(normalize(&label)) {
            return Err(Rejection::DuplicateAllergy(label));
        }
    }

    check_notes(&snapshot.notes)
}

pub fn check_new_profile(profile: &NewProfile) -> Result<(), Rejection> {
    if profile.name.trim().is_empty() {
        return Err(Rejection::MissingName);
    }
    if profile.birthday.trim().is_empty() {
        return Err(Rejection::MissingBirthday);
    }
    Ok(())
}
