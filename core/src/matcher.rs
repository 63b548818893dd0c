use std::fmt;

use serde::{Deserialize, Serialize};

use crate::models::{Allergy, AvoidLevel, AvoidedFood, FavoriteFood, PreferenceSnapshot};

/// Safety tier of a meal for one profile. Ordering is display order: safe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyScore {
    Safe,
    Caution,
    Avoid,
}

impl SafetyScore {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Caution => "caution",
            Self::Avoid => "avoid",
        }
    }
}

impl fmt::Display for SafetyScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealAssessment {
    pub safety_score: SafetyScore,
    pub matched_favorites: Vec<String>,
    pub possible_issues: Vec<String>,
}

/// Lowercased ingredient list with blank entries removed.
struct Ingredients(Vec<String>);

impl Ingredients {
    fn new<S: AsRef<str>>(raw: &[S]) -> Self {
        Self(
            raw.iter()
                .map(|s| s.as_ref().trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }

    /// Substring test in either direction against any ingredient.
    fn matches(&self, term: &str) -> bool {
        self.0.iter().any(|i| terms_match(i, term))
    }
}

/// Case-insensitive containment in either direction. Blank strings never match.
#[must_use]
pub fn terms_match(ingredient: &str, term: &str) -> bool {
    let ingredient = ingredient.trim().to_lowercase();
    let term = term.trim().to_lowercase();
    if ingredient.is_empty() || term.is_empty() {
        return false;
    }
    ingredient.contains(&term) || term.contains(&ingredient)
}

fn name_contains(meal_name: &str, term: &str) -> bool {
    let term = term.trim().to_lowercase();
    !term.is_empty() && meal_name.to_lowercase().contains(&term)
}

/// Classifies one meal against a profile's allergies, dislikes and favorites.
///
/// Allergies are matched against ingredients only. Dislikes and favorites also
/// match when the meal name contains them. An allergy match outranks an
/// absolute dislike, which outranks a moderate one; mild dislikes never change
/// the tier. Favorite matches are reported whatever the tier.
#[must_use]
pub fn classify<S: AsRef<str>>(
    meal_name: &str,
    ingredients: &[S],
    allergies: &[Allergy],
    dislikes: &[AvoidedFood],
    favorites: &[FavoriteFood],
) -> MealAssessment {
    let ingredients = Ingredients::new(ingredients);
    let dislike_matches =
        |d: &&AvoidedFood| ingredients.matches(&d.name) || name_contains(meal_name, &d.name);

    let matched_favorites = favorites
        .iter()
        .filter(|f| ingredients.matches(&f.name) || name_contains(meal_name, &f.name))
        .map(|f| f.name.clone())
        .collect();

    let allergy_issues: Vec<String> = allergies
        .iter()
        .filter(|a| ingredients.matches(&a.label))
        .map(|a| format!("Contains {} ({} allergy)", a.label, a.severity))
        .collect();

    let (safety_score, possible_issues) = if allergy_issues.is_empty() {
        let never_serve: Vec<String> = dislikes
            .iter()
            .filter(|d| d.level == AvoidLevel::Absolute)
            .filter(dislike_matches)
            .map(|d| format!("Contains {} (never serve)", d.name))
            .collect();
        if never_serve.is_empty() {
            let strong: Vec<String> = dislikes
                .iter()
                .filter(|d| d.level == AvoidLevel::Moderate)
                .filter(dislike_matches)
                .map(|d| format!("Contains {} (strong dislike)", d.name))
                .collect();
            if strong.is_empty() {
                (SafetyScore::Safe, Vec::new())
            } else {
                (SafetyScore::Caution, strong)
            }
        } else {
            (SafetyScore::Avoid, never_serve)
        }
    } else {
        (SafetyScore::Avoid, allergy_issues)
    };

    MealAssessment {
        safety_score,
        matched_favorites,
        possible_issues,
    }
}

/// [`classify`] using the lists of a stored snapshot.
#[must_use]
pub fn assess<S: AsRef<str>>(
    meal_name: &str,
    ingredients: &[S],
    snapshot: &PreferenceSnapshot,
) -> MealAssessment {
    classify(
        meal_name,
        ingredients,
        &snapshot.allergies,
        &snapshot.dislikes,
        &snapshot.favorites,
    )
}
