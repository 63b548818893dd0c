use anyhow::Result;

use mealcare_core::service::CareService;

use super::helpers::print_history_table;
use super::{resolve_profile, settle};

pub(crate) fn cmd_history(service: &CareService, profile: &str, clear: bool, json: bool) -> Result<()> {
    let profile = resolve_profile(service, profile, json)?;

    if clear {
        let cleared = settle(service.clear_history(&profile.id), json)?;
        if json {
            println!("{}", serde_json::json!({ "cleared": cleared }));
        } else if cleared {
            println!("Cleared change history for {}", profile.name);
        } else {
            eprintln!("Could not clear change history for {}", profile.name);
        }
        return Ok(());
    }

    let entries = settle(service.history(&profile.id), json)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        println!("No changes recorded for {}", profile.name);
    } else {
        print_history_table(&entries);
    }

    Ok(())
}
