use std::collections::HashMap;

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    cached,
    db::{Cache, CacheKey, IngredientStore, RecipeStore},
    error::{AppError, AppResult},
    models::{Recipe, UserIngredients},
};

const CORPUS_CACHE_TTL: u64 = 3600; // 1 hour
const INGREDIENT_MAP_CACHE_TTL: u64 = 3600; // 1 hour

/// Creates a PostgreSQL connection pool and applies pending migrations
pub async fn create_pool(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// PostgreSQL-backed store for recipes, the translation table and user ingredient sets
///
/// The corpus and translation table are read-mostly and go through the Redis cache.
/// User ingredient sets always hit the database.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    cache: Cache,
}

#[derive(sqlx::FromRow)]
struct TranslationRow {
    english: String,
    canonical: String,
}

impl PgStore {
    pub fn new(pool: PgPool, cache: Cache) -> Self {
        Self { pool, cache }
    }

    async fn fetch_recipes(&self) -> AppResult<Vec<Recipe>> {
        let recipes = sqlx::query_as::<_, Recipe>(
            r#"
            SELECT id, name, ingredients, category, details
            FROM recipes
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        tracing::info!(recipes = recipes.len(), "Loaded recipe corpus from database");
        Ok(recipes)
    }

    async fn fetch_ingredient_map(&self) -> AppResult<HashMap<String, String>> {
        let rows = sqlx::query_as::<_, TranslationRow>(
            r#"
            SELECT english, canonical
            FROM ingredient_translations
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.english.trim().to_lowercase(), row.canonical))
            .collect())
    }
}

#[async_trait::async_trait]
impl RecipeStore for PgStore {
    async fn get_all_recipes(&self) -> AppResult<Vec<Recipe>> {
        cached!(
            self.cache,
            CacheKey::RecipeCorpus,
            CORPUS_CACHE_TTL,
            self.fetch_recipes()
        )
    }

    async fn get_recipe(&self, id: &str) -> AppResult<Option<Recipe>> {
        let recipe = sqlx::query_as::<_, Recipe>(
            r#"
            SELECT id, name, ingredients, category, details
            FROM recipes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(recipe)
    }
}

#[async_trait::async_trait]
impl IngredientStore for PgStore {
    async fn load_ingredient_map(&self) -> AppResult<HashMap<String, String>> {
        cached!(
            self.cache,
            CacheKey::IngredientMap,
            INGREDIENT_MAP_CACHE_TTL,
            self.fetch_ingredient_map()
        )
    }

    async fn get_user_ingredients(&self, user_id: &str) -> AppResult<Option<UserIngredients>> {
        let user = sqlx::query_as::<_, UserIngredients>(
            r#"
            SELECT owned, disliked, allergic, preference_tag, updated_at
            FROM user_ingredients
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn add_owned_ingredients(
        &self,
        user_id: &str,
        names: &[String],
    ) -> AppResult<UserIngredients> {
        if names.is_empty() {
            return Err(AppError::InvalidInput(
                "At least one ingredient is required".to_string(),
            ));
        }

        // Union in a single statement; first-seen order is kept
        let user = sqlx::query_as::<_, UserIngredients>(
            r#"
            INSERT INTO user_ingredients (user_id, owned, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (user_id) DO UPDATE
            SET owned = ARRAY(
                    SELECT merged.name
                    FROM unnest(user_ingredients.owned || EXCLUDED.owned)
                        WITH ORDINALITY AS merged(name, position)
                    GROUP BY merged.name
                    ORDER BY MIN(merged.position)
                ),
                updated_at = NOW()
            RETURNING owned, disliked, allergic, preference_tag, updated_at
            "#,
        )
        .bind(user_id)
        .bind(names)
        .fetch_one(&self.pool)
        .await?;

        tracing::info!(
            user_id = %user_id,
            added = names.len(),
            owned = user.owned.len(),
            "User ingredients updated"
        );

        Ok(user)
    }
}
