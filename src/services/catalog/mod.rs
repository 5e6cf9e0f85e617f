/// Video catalog abstraction
///
/// The catalog resolves recommended ids to display metadata and hands out a
/// random candidate pool used for filler. Exclusion filtering of that pool is
/// the assembler's job, so backends stay simple.
use crate::{error::AppResult, models::Video};

pub mod cached;
pub mod memory;
pub mod postgres;

pub use cached::CachedVideoCatalog;
pub use memory::StaticVideoCatalog;
pub use postgres::PgVideoCatalog;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait VideoCatalog: Send + Sync {
    /// Looks up the given ids. Unknown ids are simply absent from the result,
    /// and no ordering is guaranteed.
    async fn fetch_by_ids(&self, ids: &[String]) -> AppResult<Vec<Video>>;

    /// Returns up to `limit` catalog videos in random order
    async fn sample_candidates(&self, limit: usize) -> AppResult<Vec<Video>>;

    /// Catalog name for logging and debugging
    fn name(&self) -> &'static str;
}
