pub mod postgres;
pub mod redis;
pub mod store;

pub use self::postgres::{create_pool, PgStore};
pub use self::redis::create_redis_client;
pub use self::redis::Cache;
pub use self::redis::CacheKey;
pub use self::store::{IngredientStore, RecipeStore};
