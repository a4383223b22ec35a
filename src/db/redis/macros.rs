/// Read-through caching on top of [`Cache`](crate::db::Cache).
///
/// Returns the cached value when present. Otherwise awaits `$block`, queues the result for a
/// background write with `$ttl` seconds to live, and returns it. A failed cache read is logged
/// and treated as a miss, so an unreachable Redis slows requests down instead of failing them.
///
/// # Example
/// ```rust,ignore
/// let recipes: Vec<Recipe> = cached!(self.cache, CacheKey::RecipeCorpus, 3600, async move {
///     load_recipes(&self.pool).await
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let hit = match $cache.get_from_cache(&$key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, key = %$key, "Cache read failed, falling back to source");
                None
            }
        };

        match hit {
            Some(cached) => Ok(cached),
            None => match $block.await {
                Ok(value) => {
                    $cache.set_in_background(&$key, &value, $ttl);
                    Ok(value)
                }
                Err(e) => Err(e),
            },
        }
    }};
}
