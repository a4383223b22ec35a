use crate::{
    models::{Recipe, ScoredRecipe, UserIngredients},
    services::matching::match_score,
};

/// Maximum number of recipes handed to the recommendation selector
pub const SHORTLIST_SIZE: usize = 50;

/// Scores every recipe in the corpus against the user's owned ingredients
///
/// Returns at most [`SHORTLIST_SIZE`] recipes ordered by descending match score. The sort is
/// stable, so recipes with equal scores keep their corpus order. Recipes whose ingredient
/// string is empty or unparseable score 0.0 and sink to the bottom rather than being dropped.
pub fn rank_recipes(corpus: &[Recipe], user: &UserIngredients) -> Vec<ScoredRecipe> {
    rank_with_limit(corpus, &user.normalized_owned(), SHORTLIST_SIZE)
}

fn rank_with_limit(corpus: &[Recipe], owned: &[String], limit: usize) -> Vec<ScoredRecipe> {
    let mut scored: Vec<ScoredRecipe> = corpus
        .iter()
        .map(|recipe| {
            let ingredients = recipe.ingredient_list();
            let match_score = match_score(owned, &ingredients);
            ScoredRecipe {
                recipe: recipe.clone(),
                ingredients,
                match_score,
            }
        })
        .collect();

    // Scores are finite ratios; total_cmp keeps the comparator total anyway
    scored.sort_by(|a, b| b.match_score.total_cmp(&a.match_score));
    scored.truncate(limit);

    tracing::debug!(
        corpus = corpus.len(),
        shortlisted = scored.len(),
        top_score = scored.first().map(|s| s.match_score),
        "Recipes ranked"
    );

    scored
}
