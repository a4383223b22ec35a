//! Fuzzy ingredient matching
//!
//! Ingredient names come from label translation on one side and a scraped recipe dataset on
//! the other, so spelling drifts. Names are compared with a normalized Levenshtein similarity
//! and a pair counts as a match above [`MATCH_THRESHOLD`].

use strsim::normalized_levenshtein;

/// Similarity a (recipe ingredient, user ingredient) pair must exceed to count as a match
pub const MATCH_THRESHOLD: f64 = 0.8;

/// Similarity in [0, 1]: `1 - levenshtein(a, b) / max(len(a), len(b))`, lengths in chars
///
/// Inputs are compared as given; callers lower-case them first. Two empty strings are
/// identical and score 1.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein(a, b)
}

/// Ratio of matched pairs to recipe ingredient count
///
/// Every (recipe ingredient, user ingredient) pair above the threshold adds one, so a recipe
/// ingredient that matches two user ingredients counts twice and the score can exceed 1.0.
/// Known quirk: ranking order depends on it, so it is kept as is. A recipe with no ingredients
/// scores 0.0.
pub fn match_score(user_ingredients: &[String], recipe_ingredients: &[String]) -> f64 {
    if recipe_ingredients.is_empty() {
        return 0.0;
    }

    let matched_count = recipe_ingredients
        .iter()
        .map(|recipe_ingredient| {
            user_ingredients
                .iter()
                .filter(|user_ingredient| {
                    similarity(recipe_ingredient, user_ingredient) > MATCH_THRESHOLD
                })
                .count()
        })
        .sum::<usize>();

    matched_count as f64 / recipe_ingredients.len() as f64
}
