use std::sync::Arc;

use crate::{
    db::RecipeStore,
    error::{AppError, AppResult},
    models::{RecommendedRecipe, UserIngredients},
    services::{ranking::rank_recipes, IngredientRegistry, RecommendationSelector},
};

/// Result of one recommendation request
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub user_ingredients: UserIngredients,
    pub recommendations: Vec<RecommendedRecipe>,
}

/// End-to-end recommendation flow for one user
///
/// user ingredients -> corpus ranking -> shortlist -> completion-assisted selection
pub struct RecommendationPipeline {
    registry: Arc<IngredientRegistry>,
    recipes: Arc<dyn RecipeStore>,
    selector: RecommendationSelector,
}

impl RecommendationPipeline {
    pub fn new(
        registry: Arc<IngredientRegistry>,
        recipes: Arc<dyn RecipeStore>,
        selector: RecommendationSelector,
    ) -> Self {
        Self {
            registry,
            recipes,
            selector,
        }
    }

    pub async fn recommend_for_user(&self, user_id: &str) -> AppResult<PipelineOutcome> {
        let user_ingredients = self.registry.get_user_ingredients(user_id).await?;

        if !user_ingredients.has_owned() {
            return Err(AppError::InvalidInput(
                "No ingredients have been registered yet".to_string(),
            ));
        }

        let corpus = self.recipes.get_all_recipes().await?;
        let shortlist = rank_recipes(&corpus, &user_ingredients);

        tracing::info!(
            user_id = %user_id,
            owned = user_ingredients.owned.len(),
            corpus = corpus.len(),
            shortlisted = shortlist.len(),
            "Shortlist built"
        );

        let recommendations = self.selector.recommend(&user_ingredients, &shortlist).await?;

        Ok(PipelineOutcome {
            user_ingredients,
            recommendations,
        })
    }
}
