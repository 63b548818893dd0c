use anyhow::Result;

use mealcare_core::matcher::{MealAssessment, SafetyScore};
use mealcare_core::models::MealCategory;
use mealcare_core::ranker::SafetyTally;
use mealcare_core::service::CareService;

use super::helpers::{print_suggestion_table, reject, split_list};
use super::{resolve_profile, settle};

pub(crate) fn cmd_suggest(
    service: &CareService,
    profile: &str,
    category: Option<&str>,
    seed: u64,
    json: bool,
) -> Result<()> {
    let category = category.map(str::parse::<MealCategory>).transpose()?;
    let profile = resolve_profile(service, profile, json)?;
    let preferences = settle(service.preferences(&profile.id), json)?;
    let suggestions = settle(service.suggestions(&profile.id, category, seed), json)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&suggestions)?);
        return Ok(());
    }

    if preferences.is_blank() {
        println!(
            "No preferences recorded for {} yet; every meal is shown as safe.",
            profile.name
        );
    }
    let tally = SafetyTally::count(&suggestions);
    println!(
        "{} safe, {} caution, {} avoid",
        tally.safe, tally.caution, tally.avoid
    );
    print_suggestion_table(&suggestions);

    Ok(())
}

fn print_assessment(meal: &str, assessment: &MealAssessment) {
    let verdict = match assessment.safety_score {
        SafetyScore::Safe => "safe to serve",
        SafetyScore::Caution => "serve with caution",
        SafetyScore::Avoid => "do not serve",
    };
    println!("{meal}: {verdict}");
    for issue in &assessment.possible_issues {
        println!("  ! {issue}");
    }
    if !assessment.matched_favorites.is_empty() {
        println!("  Favorites: {}", assessment.matched_favorites.join(", "));
    }
}

pub(crate) fn cmd_check(
    service: &CareService,
    profile: &str,
    meal: &str,
    ingredients: Option<&str>,
    json: bool,
) -> Result<()> {
    let profile = resolve_profile(service, profile, json)?;

    let assessment = if let Some(list) = ingredients {
        settle(service.check_meal(&profile.id, meal, &split_list(list)), json)?
    } else {
        let found = settle(service.check_catalog_meal(&profile.id, meal), json)?;
        let Some(assessment) = found else {
            reject(
                &format!("No catalog meal named '{meal}'. Pass --ingredients to check any meal."),
                json,
            );
        };
        assessment
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&assessment)?);
    } else {
        print_assessment(meal, &assessment);
    }

    Ok(())
}
