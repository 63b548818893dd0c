use serde::Serialize;

use crate::catalog::MealCatalogEntry;
use crate::matcher::{MealAssessment, SafetyScore, assess};
use crate::models::{MealCategory, PreferenceSnapshot};

/// Entries revealed per category when enough of them are safe.
pub const REVEAL_WHEN_SAFE: usize = 6;
/// Entries revealed per category when safe options are scarce.
pub const REVEAL_WHEN_SCARCE: usize = 8;
/// Safe entries a category needs before the shorter list is shown.
pub const SAFE_THRESHOLD: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealSuggestion {
    pub id: String,
    #[serde(flatten)]
    pub meal: MealCatalogEntry,
    #[serde(flatten)]
    pub assessment: MealAssessment,
}

impl MealSuggestion {
    #[must_use]
    pub fn safety_score(&self) -> SafetyScore {
        self.assessment.safety_score
    }
}

/// Display id: lowercased name, whitespace runs replaced by `-`, then the seed.
#[must_use]
pub fn suggestion_id(name: &str, seed: u64) -> String {
    let slug = name
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    format!("{slug}-{seed}")
}

/// Classifies every catalog entry, preserving catalog order.
#[must_use]
pub fn assess_catalog(
    catalog: &[MealCatalogEntry],
    snapshot: &PreferenceSnapshot,
    seed: u64,
) -> Vec<MealSuggestion> {
    catalog
        .iter()
        .map(|meal| MealSuggestion {
            id: suggestion_id(meal.name, seed),
            meal: *meal,
            assessment: assess(meal.name, meal.ingredients, snapshot),
        })
        .collect()
}

/// Stable sort: safest tier first, then most favorite matches.
#[must_use]
pub fn rank(mut suggestions: Vec<MealSuggestion>) -> Vec<MealSuggestion> {
    suggestions.sort_by(|a, b| {
        a.safety_score().cmp(&b.safety_score()).then_with(|| {
            b.assessment
                .matched_favorites
                .len()
                .cmp(&a.assessment.matched_favorites.len())
        })
    });
    suggestions
}

#[must_use]
pub fn suggest(
    catalog: &[MealCatalogEntry],
    snapshot: &PreferenceSnapshot,
    seed: u64,
) -> Vec<MealSuggestion> {
    rank(assess_catalog(catalog, snapshot, seed))
}

#[must_use]
pub fn reveal_count(safe_count: usize) -> usize {
    if safe_count >= SAFE_THRESHOLD {
        REVEAL_WHEN_SAFE
    } else {
        REVEAL_WHEN_SCARCE
    }
}

/// The head of `ranked` restricted to `category`, cut to the reveal count.
#[must_use]
pub fn for_category(ranked: &[MealSuggestion], category: MealCategory) -> Vec<MealSuggestion> {
    let filtered: Vec<&MealSuggestion> = ranked
        .iter()
        .filter(|s| s.meal.category == category)
        .collect();
    let safe = filtered
        .iter()
        .filter(|s| s.safety_score() == SafetyScore::Safe)
        .count();
    filtered
        .into_iter()
        .take(reveal_count(safe))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SafetyTally {
    pub safe: usize,
    pub caution: usize,
    pub avoid: usize,
}

impl SafetyTally {
    #[must_use]
    pub fn count(suggestions: &[MealSuggestion]) -> Self {
        suggestions
            .iter()
            .fold(Self::default(), |mut tally, s| {
                match s.safety_score() {
                    SafetyScore::Safe => tally.safe += 1,
                    SafetyScore::Caution => tally.caution += 1,
                    SafetyScore::Avoid => tally.avoid += 1,
                }
                tally
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Difficulty, MEAL_CATALOG};
    use crate::models::{
        Allergy, AllergySeverity, AvoidLevel, AvoidedFood, FavoriteFood,
    };

    fn entry(name: &'static str, ingredients: &'static [&'static str]) -> MealCatalogEntry {
        MealCatalogEntry {
            name,
            category: MealCategory::Lunch,
            description: "",
            difficulty: Difficulty::Easy,
            prep_time: "10 min",
            tags: &[],
            ingredients,
        }
    }

    fn suggestion(name: &'static str, score: SafetyScore, favorites: usize) -> MealSuggestion {
        MealSuggestion {
            id: suggestion_id(name, 0),
            meal: entry(name, &[]),
            assessment: MealAssessment {
                safety_score: score,
                matched_favorites: vec!["x".to_string(); favorites],
                possible_issues: Vec::new(),
            },
        }
    }

    fn names(list: &[MealSuggestion]) -> Vec<&str> {
        list.iter().map(|s| s.meal.name).collect()
    }

    #[test]
    fn test_suggestion_id() {
        assert_eq!(suggestion_id("Gentle Chicken Soup", 0), "gentle-chicken-soup-0");
        assert_eq!(suggestion_id("French Toast (Soft)", 4), "french-toast-(soft)-4");
        assert_eq!(suggestion_id("Shepherd's  Pie", 1), "shepherd's-pie-1");
    }

    #[test]
    fn test_rank_by_tier_then_favorites() {
        let ranked = rank(vec![
            suggestion("a", SafetyScore::Avoid, 3),
            suggestion("b", SafetyScore::Safe, 0),
            suggestion("c", SafetyScore::Caution, 1),
            suggestion("d", SafetyScore::Safe, 2),
        ]);
        assert_eq!(names(&ranked), vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn test_rank_is_stable() {
        let ranked = rank(vec![
            suggestion("first", SafetyScore::Safe, 1),
            suggestion("avoid", SafetyScore::Avoid, 0),
            suggestion("second", SafetyScore::Safe, 1),
            suggestion("third", SafetyScore::Safe, 1),
        ]);
        assert_eq!(names(&ranked), vec!["first", "second", "third", "avoid"]);
    }

    #[test]
    fn test_rank_catalog_without_preferences_keeps_order() {
        let ranked = suggest(MEAL_CATALOG, &PreferenceSnapshot::empty(), 0);
        let expected: Vec<&str> = MEAL_CATALOG.iter().map(|m| m.name).collect();
        assert_eq!(names(&ranked), expected);
        assert!(ranked.iter().all(|s| s.safety_score() == SafetyScore::Safe));
    }

    #[test]
    fn test_suggest_pushes_allergens_down() {
        let mut snapshot = PreferenceSnapshot::empty();
        snapshot.allergies.push(Allergy {
            id: "a".to_string(),
            label: "milk".to_string(),
            severity: AllergySeverity::Severe,
        });
        snapshot.favorites.push(FavoriteFood {
            id: "f".to_string(),
            name: "banana".to_string(),
            category: None,
        });
        let ranked = suggest(MEAL_CATALOG, &snapshot, 2);

        let smoothie = ranked.iter().find(|s| s.meal.name == "Banana Smoothie").unwrap();
        assert_eq!(smoothie.safety_score(), SafetyScore::Avoid);
        assert_eq!(smoothie.assessment.matched_favorites, vec!["banana"]);
        assert_eq!(smoothie.id, "banana-smoothie-2");

        // Safe meals with a favorite lead the list
        assert_eq!(ranked[0].meal.name, "Banana Bread (Soft)");
        let first_avoid = ranked
            .iter()
            .position(|s| s.safety_score() == SafetyScore::Avoid)
            .unwrap();
        assert!(ranked[first_avoid..]
            .iter()
            .all(|s| s.safety_score() == SafetyScore::Avoid));
    }

    #[test]
    fn test_seed_does_not_change_classification() {
        let mut snapshot = PreferenceSnapshot::empty();
        snapshot.dislikes.push(AvoidedFood {
            id: "d".to_string(),
            name: "cream".to_string(),
            level: AvoidLevel::Moderate,
        });
        let a = suggest(MEAL_CATALOG, &snapshot, 0);
        let b = suggest(MEAL_CATALOG, &snapshot, 7);
        assert_eq!(names(&a), names(&b));
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.assessment, y.assessment);
            assert_ne!(x.id, y.id);
        }
    }

    #[test]
    fn test_reveal_count() {
        assert_eq!(reveal_count(0), 8);
        assert_eq!(reveal_count(2), 8);
        assert_eq!(reveal_count(3), 6);
        assert_eq!(reveal_count(10), 6);
    }

    #[test]
    fn test_for_category_slices_filtered_list() {
        let mut ranked = Vec::new();
        for i in 0..10 {
            let mut s = suggestion("lunch", SafetyScore::Safe, 0);
            s.id = format!("lunch-{i}");
            ranked.push(s);
        }
        let mut other = suggestion("breakfast", SafetyScore::Safe, 0);
        other.meal.category = MealCategory::Breakfast;
        ranked.insert(0, other);

        let lunch = for_category(&ranked, MealCategory::Lunch);
        assert_eq!(lunch.len(), 6);
        assert_eq!(lunch[0].id, "lunch-0");

        for s in &mut ranked {
            s.assessment.safety_score = SafetyScore::Caution;
        }
        assert_eq!(for_category(&ranked, MealCategory::Lunch).len(), 8);
        assert_eq!(for_category(&ranked, MealCategory::Breakfast).len(), 1);
        assert!(for_category(&ranked, MealCategory::Snack).is_empty());
    }

    #[test]
    fn test_tally() {
        let list = vec![
            suggestion("a", SafetyScore::Safe, 0),
            suggestion("b", SafetyScore::Avoid, 0),
            suggestion("c", SafetyScore::Safe, 0),
        ];
        assert_eq!(
            SafetyTally::count(&list),
            SafetyTally {
                safe: 2,
                caution: 0,
                avoid: 1
            }
        );
    }

    #[test]
    fn test_suggestion_json_is_flat() {
        let ranked = suggest(&MEAL_CATALOG[..1], &PreferenceSnapshot::empty(), 0);
        let json = serde_json::to_value(&ranked[0]).unwrap();
        assert_eq!(json["id"], "gentle-chicken-soup-0");
        assert_eq!(json["prepTime"], "45 min");
        assert_eq!(json["safetyScore"], "safe");
        assert!(json["possibleIssues"].is_array());
    }
}
