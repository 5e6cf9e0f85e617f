/// Recommendation service abstraction
///
/// The recommendation microservice is an unreliable collaborator: callers treat
/// any error from a provider as "no recommendations" and fall back to filler.
use crate::error::AppResult;

pub mod workflow;

pub use workflow::HttpRecommendationProvider;

/// Trait for sources of ranked video recommendations
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecommendationProvider: Send + Sync {
    /// Returns up to `top_k` ranked video ids for the user
    async fn recommend(&self, user_id: &str, top_k: usize) -> AppResult<Vec<String>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}
