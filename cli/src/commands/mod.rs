mod helpers;
mod history;
mod preferences;
mod profile;
mod suggest;

use anyhow::Result;

use mealcare_core::models::Profile;
use mealcare_core::service::{CareService, EditError};

use helpers::reject;

pub(crate) use history::cmd_history;
pub(crate) use preferences::{
    cmd_allergy_add, cmd_allergy_update, cmd_avoid_add, cmd_avoid_update, cmd_clear, cmd_export,
    cmd_favorite_add, cmd_favorite_update, cmd_item_remove, cmd_notes_set, cmd_notes_show,
    cmd_save, cmd_show,
};
pub(crate) use profile::{cmd_profile_add, cmd_profile_list, cmd_profile_show};
pub(crate) use suggest::{cmd_check, cmd_suggest};

/// Unwrap a service result. Refusals exit with status 2; storage failures propagate.
pub(super) fn settle<T>(result: Result<T, EditError>, json: bool) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(EditError::Storage(e)) => Err(e),
        Err(refused) => reject(&refused.to_string(), json),
    }
}

/// Resolve a profile argument by id, then by case-insensitive name.
pub(super) fn resolve_profile(service: &CareService, query: &str, json: bool) -> Result<Profile> {
    let query = query.trim();
    let profiles = service.list_profiles()?;

    if let Some(p) = profiles.iter().find(|p| p.id == query) {
        return Ok(p.clone());
    }

    let wanted = query.to_lowercase();
    let mut named: Vec<Profile> = profiles
        .into_iter()
        .filter(|p| p.name.to_lowercase() == wanted)
        .collect();

    match named.len() {
        0 => reject(&format!("Profile not found: {query}"), json),
        1 => Ok(named.remove(0)),
        _ => {
            let ids: Vec<&str> = named.iter().map(|p| p.id.as_str()).collect();
            reject(
                &format!(
                    "More than one profile is named '{query}'. Use an id instead: {}",
                    ids.join(", ")
                ),
                json,
            )
        }
    }
}
