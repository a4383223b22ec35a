use serde::{Deserialize, Serialize};

/// A recipe record as stored in the recipe corpus
///
/// Only `id`, `name`, `ingredients` and `category` are interpreted by the matching pipeline.
/// Everything else (nutrition, step text, images) travels untouched in `details`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Recipe {
    pub id: String,
    pub name: String,
    /// Raw comma-separated ingredient string as imported from the source dataset
    pub ingredients: String,
    pub category: Option<String>,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl Recipe {
    /// Normalized ingredient list derived from the raw ingredient string
    pub fn ingredient_list(&self) -> Vec<String> {
        split_ingredients(&self.ingredients)
    }
}

/// Splits a raw ingredient string on commas, trimming and lower-casing each entry
///
/// Empty entries (blank source field, trailing commas) are dropped, so a malformed
/// string yields fewer ingredients rather than phantom empty names.
pub fn split_ingredients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|ingredient| ingredient.trim().to_lowercase())
        .filter(|ingredient| !ingredient.is_empty())
        .collect()
}
