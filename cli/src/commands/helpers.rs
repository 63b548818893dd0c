use serde::Serialize;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use mealcare_core::models::{ChangeEntry, PreferenceSnapshot, Profile};
use mealcare_core::ranker::MealSuggestion;

/// Split a comma-separated argument, dropping blank pieces.
pub(crate) fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Report a refused request and exit with status 2.
pub(crate) fn reject(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

pub(crate) fn print_profile_table(profiles: &[Profile], with_preferences: &[String]) {
    #[derive(Tabled)]
    struct ProfileRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "")]
        initial: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Birthday")]
        birthday: String,
        #[tabled(rename = "Caregiver")]
        caregiver: String,
        #[tabled(rename = "Status")]
        status: String,
        #[tabled(rename = "Preferences")]
        preferences: &'static str,
    }

    let rows: Vec<ProfileRow> = profiles
        .iter()
        .map(|p| ProfileRow {
            id: p.id.clone(),
            initial: p.initial.clone(),
            name: truncate(&p.name, 30),
            birthday: p.birthday.clone(),
            caregiver: p
                .primary_caregiver
                .as_deref()
                .map(|c| truncate(c, 20))
                .unwrap_or_default(),
            status: p.status.clone(),
            preferences: if with_preferences.contains(&p.id) {
                "yes"
            } else {
                "-"
            },
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
}

pub(crate) fn print_preferences(snapshot: &PreferenceSnapshot) {
    #[derive(Tabled)]
    struct ItemRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Detail")]
        detail: String,
    }

    fn section(title: &str, rows: &[ItemRow]) {
        println!("{title}:");
        if rows.is_empty() {
            println!("  (none)");
        } else {
            println!("{}", Table::new(rows).with(Style::rounded()));
        }
    }

    let allergies: Vec<ItemRow> = snapshot
        .allergies
        .iter()
        .map(|a| ItemRow {
            id: a.id.clone(),
            name: truncate(&a.label, 35),
            detail: a.severity.description().to_string(),
        })
        .collect();
    let dislikes: Vec<ItemRow> = snapshot
        .dislikes
        .iter()
        .map(|d| ItemRow {
            id: d.id.clone(),
            name: truncate(&d.name, 35),
            detail: d.level.description().to_string(),
        })
        .collect();
    let favorites: Vec<ItemRow> = snapshot
        .favorites
        .iter()
        .map(|f| ItemRow {
            id: f.id.clone(),
            name: truncate(&f.name, 35),
            detail: f.category.map(|c| c.to_string()).unwrap_or_default(),
        })
        .collect();

    section("Allergies", &allergies);
    section("Avoid list", &dislikes);
    section("Favorites", &favorites);

    if snapshot.notes.is_empty() {
        println!("Notes: (none)");
    } else {
        println!("Notes: {}", snapshot.notes);
    }
    match snapshot.updated_by {
        Some(ref by) => println!("Last updated {} by {by}", snapshot.last_updated),
        None => println!("Last updated {}", snapshot.last_updated),
    }
}

pub(crate) fn print_suggestion_table(suggestions: &[MealSuggestion]) {
    #[derive(Tabled)]
    struct SuggestionRow {
        #[tabled(rename = "Safety")]
        safety: String,
        #[tabled(rename = "Meal")]
        name: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Prep")]
        prep: String,
        #[tabled(rename = "Favorites")]
        favorites: String,
        #[tabled(rename = "Issues")]
        issues: String,
    }

    let rows: Vec<SuggestionRow> = suggestions
        .iter()
        .map(|s| SuggestionRow {
            safety: s.safety_score().to_string(),
            name: truncate(s.meal.name, 30),
            category: s.meal.category.to_string(),
            prep: s.meal.prep_time.to_string(),
            favorites: s.assessment.matched_favorites.join(", "),
            issues: truncate(&s.assessment.possible_issues.join("; "), 50),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::single(3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_history_table(entries: &[ChangeEntry]) {
    #[derive(Tabled)]
    struct HistoryRow {
        #[tabled(rename = "When")]
        timestamp: String,
        #[tabled(rename = "Type")]
        change_type: String,
        #[tabled(rename = "Section")]
        section: String,
        #[tabled(rename = "Description")]
        description: String,
        #[tabled(rename = "By")]
        by: String,
    }

    let rows: Vec<HistoryRow> = entries
        .iter()
        .map(|e| HistoryRow {
            timestamp: e.timestamp.clone(),
            change_type: e.change_type.as_str().to_string(),
            section: e.category.to_string(),
            description: truncate(&e.description, 60),
            by: e.updated_by.clone().unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list("whole milk, eggs ,,sugar"),
            vec!["whole milk", "eggs", "sugar"]
        );
        assert!(split_list(" , ").is_empty());
    }

    #[test]
    fn test_json_error_escapes() {
        let json: serde_json::Value =
            serde_json::from_str(&json_error("'liver' is \"never\" served")).unwrap();
        assert_eq!(json["error"], "'liver' is \"never\" served");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
    }

    #[test]
    fn test_truncate_utf8() {
        // Should not panic on multi-byte characters
        assert_eq!(truncate("Crème fraîche", 10), "Crème f...");
        assert_eq!(truncate("Müsli", 10), "Müsli");
        assert_eq!(truncate("日清カップヌードル", 8), "日清カップ...");
    }
}
