//! The fixed reference list of soft-food meals that suggestions are drawn from.

use std::fmt;

use serde::Serialize;

use crate::models::MealCategory;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Easy => "easy",
            Self::Medium => "medium",
            Self::Hard => "hard",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealCatalogEntry {
    pub name: &'static str,
    pub category: MealCategory,
    pub description: &'static str,
    pub difficulty: Difficulty,
    pub prep_time: &'static str,
    pub tags: &'static [&'static str],
    pub ingredients: &'static [&'static str],
}

/// Case-insensitive lookup by meal name.
#[must_use]
pub fn find_meal(name: &str) -> Option<&'static MealCatalogEntry> {
    let wanted = name.trim().to_lowercase();
    MEAL_CATALOG
        .iter()
        .find(|m| m.name.to_lowercase() == wanted)
}

pub static MEAL_CATALOG: &[MealCatalogEntry] = &[
    MealCatalogEntry {
        name: "Gentle Chicken Soup",
        category: MealCategory::Lunch,
        description: "Soft, warm, and comforting with tender vegetables",
        difficulty: Difficulty::Easy,
        prep_time: "45 min",
        tags: &["soft", "warm", "protein", "vegetables"],
        ingredients: &["chicken breast", "carrots", "celery", "onion", "rice", "chicken broth"],
    },
    MealCatalogEntry {
        name: "Creamy Mashed Potatoes",
        category: MealCategory::Dinner,
        description: "Smooth and creamy with butter and cream",
        difficulty: Difficulty::Easy,
        prep_time: "20 min",
        tags: &["soft", "comfort", "carbs", "dairy"],
        ingredients: &["potatoes", "butter", "cream", "salt"],
    },
    MealCatalogEntry {
        name: "Banana Smoothie",
        category: MealCategory::Breakfast,
        description: "Thick, nutritious smoothie with banana and yogurt",
        difficulty: Difficulty::Easy,
        prep_time: "5 min",
        tags: &["soft", "cold", "fruit", "dairy"],
        ingredients: &["banana", "yogurt", "honey", "milk"],
    },
    MealCatalogEntry {
        name: "Soft Scrambled Eggs",
        category: MealCategory::Breakfast,
        description: "Gentle, creamy eggs perfect for easy eating",
        difficulty: Difficulty::Easy,
        prep_time: "10 min",
        tags: &["soft", "protein", "warm"],
        ingredients: &["eggs", "butter", "cream", "chives"],
    },
    MealCatalogEntry {
        name: "Oatmeal with Fruit",
        category: MealCategory::Breakfast,
        description: "Warm, creamy oatmeal with soft seasonal fruit",
        difficulty: Difficulty::Easy,
        prep_time: "15 min",
        tags: &["soft", "warm", "fiber", "fruit"],
        ingredients: &["oats", "milk", "banana", "berries", "honey"],
    },
    MealCatalogEntry {
        name: "French Toast (Soft)",
        category: MealCategory::Breakfast,
        description: "Tender, custard-like French toast, easy to eat",
        difficulty: Difficulty::Easy,
        prep_time: "15 min",
        tags: &["soft", "sweet", "comfort", "dairy"],
        ingredients: &["bread", "eggs", "milk", "cinnamon", "butter"],
    },
    MealCatalogEntry {
        name: "Cottage Cheese Bowl",
        category: MealCategory::Breakfast,
        description: "Protein-rich cottage cheese with soft fruits",
        difficulty: Difficulty::Easy,
        prep_time: "3 min",
        tags: &["soft", "protein", "dairy", "cold"],
        ingredients: &["cottage cheese", "peaches", "honey", "cinnamon"],
    },
    MealCatalogEntry {
        name: "Tomato Basil Soup",
        category: MealCategory::Lunch,
        description: "Smooth, warming soup with fresh basil",
        difficulty: Difficulty::Easy,
        prep_time: "25 min",
        tags: &["soft", "warm", "vegetables", "comfort"],
        ingredients: &["tomatoes", "basil", "cream", "onion", "garlic"],
    },
    MealCatalogEntry {
        name: "Tuna Salad (Soft)",
        category: MealCategory::Lunch,
        description: "Well-mashed tuna salad with soft bread",
        difficulty: Difficulty::Easy,
        prep_time: "10 min",
        tags: &["soft", "protein", "fish"],
        ingredients: &["tuna", "mayonnaise", "soft bread", "celery"],
    },
    MealCatalogEntry {
        name: "Vegetable Puree Soup",
        category: MealCategory::Lunch,
        description: "Smooth, nutritious soup with mixed vegetables",
        difficulty: Difficulty::Medium,
        prep_time: "40 min",
        tags: &["soft", "vegetables", "warm", "healthy"],
        ingredients: &["mixed vegetables", "vegetable broth", "cream", "herbs"],
    },
    MealCatalogEntry {
        name: "Chicken Noodle Soup",
        category: MealCategory::Lunch,
        description: "Classic comfort soup with tender noodles",
        difficulty: Difficulty::Medium,
        prep_time: "50 min",
        tags: &["soft", "warm", "protein", "comfort"],
        ingredients: &["chicken", "noodles", "carrots", "celery", "chicken broth"],
    },
    MealCatalogEntry {
        name: "Fish with White Sauce",
        category: MealCategory::Dinner,
        description: "Tender white fish with gentle cream sauce",
        difficulty: Difficulty::Medium,
        prep_time: "25 min",
        tags: &["soft", "protein", "fish", "creamy"],
        ingredients: &["white fish", "cream", "butter", "herbs", "lemon"],
    },
    MealCatalogEntry {
        name: "Beef Stew",
        category: MealCategory::Dinner,
        description: "Tender slow-cooked beef with vegetables",
        difficulty: Difficulty::Hard,
        prep_time: "2 hours",
        tags: &["soft", "protein", "vegetables", "warm"],
        ingredients: &["beef", "potatoes", "carrots", "onions", "beef broth"],
    },
    MealCatalogEntry {
        name: "Shepherd's Pie",
        category: MealCategory::Dinner,
        description: "Soft ground meat with mashed potato topping",
        difficulty: Difficulty::Medium,
        prep_time: "45 min",
        tags: &["soft", "protein", "comfort", "vegetables"],
        ingredients: &["ground lamb", "potatoes", "peas", "carrots", "gravy"],
    },
    MealCatalogEntry {
        name: "Baked Chicken Breast",
        category: MealCategory::Dinner,
        description: "Tender, well-cooked chicken with herbs",
        difficulty: Difficulty::Easy,
        prep_time: "35 min",
        tags: &["soft", "protein", "warm"],
        ingredients: &["chicken breast", "herbs", "olive oil", "garlic"],
    },
    MealCatalogEntry {
        name: "Pasta with Butter Sauce",
        category: MealCategory::Dinner,
        description: "Soft pasta with gentle butter and herb sauce",
        difficulty: Difficulty::Easy,
        prep_time: "20 min",
        tags: &["soft", "comfort", "carbs"],
        ingredients: &["pasta", "butter", "herbs", "parmesan cheese"],
    },
    MealCatalogEntry {
        name: "Rice Pudding",
        category: MealCategory::Snack,
        description: "Sweet, creamy dessert with cinnamon",
        difficulty: Difficulty::Medium,
        prep_time: "30 min",
        tags: &["soft", "sweet", "dairy", "comfort"],
        ingredients: &["rice", "milk", "sugar", "cinnamon", "vanilla"],
    },
    MealCatalogEntry {
        name: "Apple Sauce",
        category: MealCategory::Snack,
        description: "Smooth, naturally sweet fruit puree",
        difficulty: Difficulty::Easy,
        prep_time: "25 min",
        tags: &["soft", "fruit", "sweet", "fiber"],
        ingredients: &["apples", "cinnamon", "sugar", "lemon juice"],
    },
    MealCatalogEntry {
        name: "Yogurt Parfait",
        category: MealCategory::Breakfast,
        description: "Layered yogurt with soft fruits",
        difficulty: Difficulty::Easy,
        prep_time: "5 min",
        tags: &["soft", "dairy", "fruit", "cold"],
        ingredients: &["yogurt", "soft berries", "honey", "granola"],
    },
    MealCatalogEntry {
        name: "Banana Bread (Soft)",
        category: MealCategory::Snack,
        description: "Moist, tender banana bread slice",
        difficulty: Difficulty::Medium,
        prep_time: "60 min",
        tags: &["soft", "sweet", "fruit", "baked"],
        ingredients: &["bananas", "flour", "butter", "sugar", "eggs"],
    },
    MealCatalogEntry {
        name: "Pudding Cup",
        category: MealCategory::Snack,
        description: "Smooth, creamy pudding in favorite flavors",
        difficulty: Difficulty::Easy,
        prep_time: "2 min",
        tags: &["soft", "sweet", "dairy", "cold"],
        ingredients: &["milk", "pudding mix", "vanilla", "sugar"],
    },
    MealCatalogEntry {
        name: "Smoothie Bowl",
        category: MealCategory::Snack,
        description: "Thick fruit smoothie topped with soft additions",
        difficulty: Difficulty::Easy,
        prep_time: "8 min",
        tags: &["soft", "fruit", "cold", "healthy"],
        ingredients: &["mixed berries", "banana", "yogurt", "honey"],
    },
];
