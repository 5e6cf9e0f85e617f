use crate::{
    error::AppResult,
    models::{
        InteractionEvent, InteractionFilter, SessionFilter, SessionRecord, StoreCounts,
        UserPreferences, UserRecord,
    },
};

pub mod file;
pub mod postgres;
pub mod redis;
pub mod sink;

pub use file::FileStore;
pub use postgres::{create_pool, PgStore};
pub use redis::create_redis_client;
pub use redis::Cache;
pub use redis::CacheKey;
pub use redis::CacheWriterHandle;
pub use sink::{InteractionSink, InteractionSinkHandle};

pub const INTERACTIONS_TABLE: &str = "video_interactions";
pub const SESSIONS_TABLE: &str = "recommendation_sessions";

/// Persistence boundary for interaction analytics
///
/// Implemented once per backend; the assembly and aggregation logic never
/// knows which one it is talking to.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Appends incremental interaction events, returning how many were stored
    async fn record_interactions(&self, events: &[InteractionEvent]) -> AppResult<usize>;

    /// Stores a session's event log and its summary together
    async fn record_session_batch(
        &self,
        events: &[InteractionEvent],
        session: &SessionRecord,
    ) -> AppResult<()>;

    /// Stored interactions, newest first
    async fn list_interactions(&self, filter: &InteractionFilter)
        -> AppResult<Vec<InteractionEvent>>;

    /// Stored sessions, newest first
    async fn list_sessions(&self, filter: &SessionFilter) -> AppResult<Vec<SessionRecord>>;

    async fn counts(&self) -> AppResult<StoreCounts>;

    /// Backend name for logging and debugging
    fn name(&self) -> &'static str;
}

/// User records and their topic preferences
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts the user unless one with the same id exists.
    /// Returns the stored record and whether it was created.
    async fn create_user_if_missing(&self, user: UserRecord) -> AppResult<(UserRecord, bool)>;

    async fn get_user(&self, user_id: &str) -> AppResult<Option<UserRecord>>;

    /// Replaces the preferences of an existing user; `None` if the user is unknown
    async fn update_preferences(
        &self,
        user_id: &str,
        preferences: &UserPreferences,
    ) -> AppResult<Option<UserRecord>>;
}

/// Applies a read-back limit to rows already sorted newest first
pub(crate) fn apply_limit<T>(mut rows: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(limit) = limit {
        rows.truncate(limit);
    }
    rows
}
