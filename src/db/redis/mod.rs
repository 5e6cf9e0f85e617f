pub mod cache;

pub use cache::{create_redis_client, Cache, CacheKey, CacheWriterHandle};
