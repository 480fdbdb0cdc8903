/// A macro to simplify caching logic using Redis.
///
/// Checks the cache first; on a miss (including a Redis failure, which the
/// cache absorbs into a miss) executes the provided block, stores the result
/// in the background, and returns it.
///
/// # Arguments
/// * `$cache`: The cache instance. Must have `get_from_cache` and
///   `set_in_background` methods.
/// * `$key`: The `CacheKey` under which the value lives.
/// * `$ttl`: Time-to-live for the cached value, in seconds.
/// * `$block`: The async block computing the value on a miss.
///
/// # Example
/// ```rust,ignore
/// let tracks = cached!(cache, CacheKey::ChartTopTracks, 3600, async move {
///     fetch_chart_top_tracks().await
/// })?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        if let Some(cached) = $cache.get_from_cache(&$key).await {
            Ok(cached)
        } else {
            // The block's error type must be pinned: `AppError` has several
            // `#[from]` impls, so bare `?` on the block is ambiguous.
            let value: $crate::error::AppResult<_> = $block.await;
            match value {
                Ok(value) => {
                    $cache.set_in_background(&$key, &value, $ttl);
                    Ok(value)
                }
                Err(err) => Err(err),
            }
        }
    }};
}
