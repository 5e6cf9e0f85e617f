use crate::{
    db::{AnalyticsStore, InteractionSink, UserStore},
    services::{RecommendationAssembler, SessionRegistry},
};
use std::sync::Arc;

/// Shared application state handed to every handler
pub struct AppState {
    pub assembler: RecommendationAssembler,
    pub store: Arc<dyn AnalyticsStore>,
    pub users: Arc<dyn UserStore>,
    pub sink: InteractionSink,
    pub sessions: SessionRegistry,
    /// Videos per recommendation screen
    pub target_total: usize,
    /// Default number of service recommendations per screen
    pub recommended_target: usize,
}
