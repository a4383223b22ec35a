use std::collections::HashMap;

use crate::{
    error::AppResult,
    models::{Recipe, UserIngredients},
};

/// Read access to the recipe corpus
///
/// Recipes are owned by the external store and are read-only to the recommendation pipeline.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecipeStore: Send + Sync {
    /// Full corpus snapshot, in a stable order
    async fn get_all_recipes(&self) -> AppResult<Vec<Recipe>>;

    async fn get_recipe(&self, id: &str) -> AppResult<Option<Recipe>>;
}

/// Translation table and per-user ingredient sets
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait IngredientStore: Send + Sync {
    /// Detected label (lower-cased) to canonical ingredient name
    async fn load_ingredient_map(&self) -> AppResult<HashMap<String, String>>;

    /// Returns `None` when the user has never saved an ingredient
    async fn get_user_ingredients(&self, user_id: &str) -> AppResult<Option<UserIngredients>>;

    /// Unions `names` into the user's owned set in one atomic update and returns the result
    async fn add_owned_ingredients(
        &self,
        user_id: &str,
        names: &[String],
    ) -> AppResult<UserIngredients>;
}
