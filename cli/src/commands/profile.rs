use anyhow::Result;
use serde::Serialize;

use mealcare_core::models::{NewProfile, PreferenceSnapshot, Profile};
use mealcare_core::service::CareService;

use super::helpers::{print_preferences, print_profile_table};
use super::{resolve_profile, settle};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileDetail<'a> {
    #[serde(flatten)]
    profile: &'a Profile,
    has_safety_blockers: bool,
    preferences: &'a PreferenceSnapshot,
}

pub(crate) fn cmd_profile_add(
    service: &CareService,
    name: &str,
    birthday: &str,
    emergency_contact: Option<String>,
    caregiver: Option<String>,
    json: bool,
) -> Result<()> {
    let new = NewProfile {
        name: name.to_string(),
        birthday: birthday.to_string(),
        emergency_contact,
        primary_caregiver: caregiver,
    };
    let profile = settle(service.add_profile(new), json)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profile)?);
    } else {
        println!("Added profile '{}' (id: {})", profile.name, profile.id);
    }

    Ok(())
}

pub(crate) fn cmd_profile_list(service: &CareService, json: bool) -> Result<()> {
    let profiles = service.list_profiles()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&profiles)?);
    } else if profiles.is_empty() {
        println!("No profiles yet. Add one with: mealcare profile add <name> --birthday <date>");
    } else {
        print_profile_table(&profiles, &service.profiles_with_preferences()?);
    }

    Ok(())
}

pub(crate) fn cmd_profile_show(service: &CareService, query: &str, json: bool) -> Result<()> {
    let profile = resolve_profile(service, query, json)?;
    let preferences = settle(service.preferences(&profile.id), json)?;

    if json {
        let detail = ProfileDetail {
            profile: &profile,
            has_safety_blockers: preferences.has_safety_blockers(),
            preferences: &preferences,
        };
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    println!("{} ({})", profile.name, profile.id);
    println!("  Birthday:          {}", profile.birthday);
    println!("  Status:            {} ({})", profile.status, profile.last_online);
    if let Some(ref c) = profile.primary_caregiver {
        println!("  Primary caregiver: {c}");
    }
    if let Some(ref c) = profile.emergency_contact {
        println!("  Emergency contact: {c}");
    }
    if preferences.has_safety_blockers() {
        println!("  Has severe allergies or never-serve foods. Check meals before serving.");
    }
    println!();
    print_preferences(&preferences);

    Ok(())
}
