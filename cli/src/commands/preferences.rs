use anyhow::{Context, Result};
use std::path::Path;

use mealcare_core::models::{AllergySeverity, AvoidLevel, MealCategory, Section};
use mealcare_core::service::{
    AllergyInput, AvoidInput, CareService, EditOutcome, FavoriteInput, ItemInput,
};
use mealcare_core::undo::UndoRegistry;

use super::helpers::print_preferences;
use super::{resolve_profile, settle};

fn print_edit(outcome: &EditOutcome, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        println!("{}", outcome.change.description);
        println!("  id: {}", outcome.item.id());
    }
    Ok(())
}

fn add(
    service: &CareService,
    undo: &mut UndoRegistry,
    profile: &str,
    input: ItemInput,
    json: bool,
) -> Result<()> {
    let profile = resolve_profile(service, profile, json)?;
    let outcome = settle(service.add_item(undo, &profile.id, input), json)?;
    print_edit(&outcome, json)
}

fn update(
    service: &CareService,
    undo: &mut UndoRegistry,
    profile: &str,
    item_id: &str,
    input: ItemInput,
    json: bool,
) -> Result<()> {
    let profile = resolve_profile(service, profile, json)?;
    let outcome = settle(service.update_item(undo, &profile.id, item_id, input), json)?;
    print_edit(&outcome, json)
}

fn parse_category(category: Option<&str>) -> Result<Option<MealCategory>> {
    category.map(str::parse).transpose()
}

pub(crate) fn cmd_favorite_add(
    service: &CareService,
    undo: &mut UndoRegistry,
    profile: &str,
    name: &str,
    category: Option<&str>,
    json: bool,
) -> Result<()> {
    let input = ItemInput::Favorite(FavoriteInput {
        name: name.to_string(),
        category: parse_category(category)?,
    });
    add(service, undo, profile, input, json)
}

pub(crate) fn cmd_favorite_update(
    service: &CareService,
    undo: &mut UndoRegistry,
    profile: &str,
    item_id: &str,
    name: &str,
    category: Option<&str>,
    json: bool,
) -> Result<()> {
    let input = ItemInput::Favorite(FavoriteInput {
        name: name.to_string(),
        category: parse_category(category)?,
    });
    update(service, undo, profile, item_id, input, json)
}

pub(crate) fn cmd_avoid_add(
    service: &CareService,
    undo: &mut UndoRegistry,
    profile: &str,
    name: &str,
    level: &str,
    json: bool,
) -> Result<()> {
    let input = ItemInput::Avoid(AvoidInput {
        name: name.to_string(),
        level: level.parse::<AvoidLevel>()?,
    });
    add(service, undo, profile, input, json)
}

pub(crate) fn cmd_avoid_update(
    service: &CareService,
    undo: &mut UndoRegistry,
    profile: &str,
    item_id: &str,
    name: &str,
    level: &str,
    json: bool,
) -> Result<()> {
    let input = ItemInput::Avoid(AvoidInput {
        name: name.to_string(),
        level: level.parse::<AvoidLevel>()?,
    });
    update(service, undo, profile, item_id, input, json)
}

pub(crate) fn cmd_allergy_add(
    service: &CareService,
    undo: &mut UndoRegistry,
    profile: &str,
    label: &str,
    severity: &str,
    json: bool,
) -> Result<()> {
    let input = ItemInput::Allergy(AllergyInput {
        label: label.to_string(),
        severity: severity.parse::<AllergySeverity>()?,
    });
    add(service, undo, profile, input, json)
}

pub(crate) fn cmd_allergy_update(
    service: &CareService,
    undo: &mut UndoRegistry,
    profile: &str,
    item_id: &str,
    label: &str,
    severity: &str,
    json: bool,
) -> Result<()> {
    let input = ItemInput::Allergy(AllergyInput {
        label: label.to_string(),
        severity: severity.parse::<AllergySeverity>()?,
    });
    update(service, undo, profile, item_id, input, json)
}

pub(crate) fn cmd_item_remove(
    service: &CareService,
    undo: &mut UndoRegistry,
    profile: &str,
    section: Section,
    item_id: &str,
    json: bool,
) -> Result<()> {
    let profile = resolve_profile(service, profile, json)?;
    let outcome = settle(
        service.remove_item(undo, &profile.id, section, item_id),
        json,
    )?;
    print_edit(&outcome, json)
}

pub(crate) fn cmd_show(service: &CareService, profile: &str, json: bool) -> Result<()> {
    let profile = resolve_profile(service, profile, json)?;
    let preferences = settle(service.preferences(&profile.id), json)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&preferences)?);
    } else {
        println!("Preferences for {}", profile.name);
        println!();
        print_preferences(&preferences);
    }

    Ok(())
}

pub(crate) fn cmd_notes_set(
    service: &CareService,
    profile: &str,
    notes: &str,
    updated_by: Option<&str>,
    json: bool,
) -> Result<()> {
    let profile = resolve_profile(service, profile, json)?;
    let outcome = settle(service.set_notes(&profile.id, notes, updated_by), json)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else if outcome.change.is_some() {
        println!("Updated special instructions for {}", profile.name);
    } else {
        println!("Special instructions unchanged");
    }

    Ok(())
}

pub(crate) fn cmd_notes_show(service: &CareService, profile: &str, json: bool) -> Result<()> {
    let profile = resolve_profile(service, profile, json)?;
    let preferences = settle(service.preferences(&profile.id), json)?;

    if json {
        println!("{}", serde_json::json!({ "notes": preferences.notes }));
    } else if preferences.notes.is_empty() {
        println!("No special instructions for {}", profile.name);
    } else {
        println!("{}", preferences.notes);
    }

    Ok(())
}

pub(crate) fn cmd_save(service: &CareService, profile: &str, json: bool) -> Result<()> {
    let profile = resolve_profile(service, profile, json)?;
    let saved = settle(service.manual_save(&profile.id), json)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&saved)?);
    } else {
        println!("Saved preferences for {} at {}", profile.name, saved.last_updated);
    }

    Ok(())
}

pub(crate) fn cmd_export(service: &CareService, profile: &str, output: Option<&Path>) -> Result<()> {
    let profile = resolve_profile(service, profile, false)?;
    let export = settle(service.export(&profile.id), false)?;
    let body = serde_json::to_string_pretty(&export)?;

    match output {
        Some(path) => {
            std::fs::write(path, body)
                .with_context(|| format!("Failed to write export to {}", path.display()))?;
            eprintln!("Exported preferences for {} to {}", profile.name, path.display());
        }
        None => println!("{body}"),
    }

    Ok(())
}

pub(crate) fn cmd_clear(service: &CareService, profile: &str, json: bool) -> Result<()> {
    let profile = resolve_profile(service, profile, json)?;
    let cleared = settle(service.clear_preferences(&profile.id), json)?;

    if json {
        println!("{}", serde_json::json!({ "cleared": cleared }));
    } else if cleared {
        println!("Cleared preferences for {}", profile.name);
    } else {
        eprintln!("Could not clear preferences for {}", profile.name);
    }

    Ok(())
}
