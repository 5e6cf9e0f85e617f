use rand::seq::SliceRandom;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::{
    models::{RecommendationResult, SourceCounts, Video},
    services::{catalog::VideoCatalog, providers::RecommendationProvider},
};

/// Extra candidates requested on top of what is needed, to survive exclusion filtering
const SAMPLE_HEADROOM: usize = 5;

/// Static videos used when neither the service nor the catalog can fill the list
pub fn fallback_videos() -> Vec<Video> {
    [
        (
            "fallback_1",
            "Introduction to Machine Learning - Complete Guide",
            "https://i.ytimg.com/vi/_19pRsZRiz4/hqdefault.jpg",
            "Complete introduction to machine learning concepts and applications",
        ),
        (
            "fallback_2",
            "AI in Healthcare: Revolutionary Applications",
            "https://i.ytimg.com/vi/ad79nYk2keg/hqdefault.jpg",
            "Exploring how AI is transforming healthcare and medical diagnosis",
        ),
        (
            "fallback_3",
            "Deep Learning Fundamentals Explained",
            "https://i.ytimg.com/vi/_19pRsZRiz4/hqdefault.jpg",
            "Understanding the core concepts of deep learning and neural networks",
        ),
        (
            "fallback_4",
            "Data Science Projects for Beginners",
            "https://i.ytimg.com/vi/ad79nYk2keg/hqdefault.jpg",
            "Hands-on data science projects to build your portfolio",
        ),
    ]
    .into_iter()
    .map(|(id, title, thumbnail, description)| Video {
        id: id.to_string(),
        title: title.to_string(),
        thumbnail: thumbnail.to_string(),
        description: description.to_string(),
    })
    .collect()
}

/// Builds the fixed-size video list shown on the recommendation screen
///
/// The list is assembled in three tiers:
/// 1. Ids ranked by the recommendation service, resolved against the catalog
/// 2. Random catalog videos not already chosen
/// 3. The static fallback list, in order, again skipping chosen ids
///
/// No tier can fail the request. A broken service or catalog just leaves its
/// tier empty, and the result may be shorter than requested when every tier
/// runs dry.
pub struct RecommendationAssembler {
    provider: Arc<dyn RecommendationProvider>,
    catalog: Arc<dyn VideoCatalog>,
    fallback: Vec<Video>,
}

impl RecommendationAssembler {
    pub fn new(provider: Arc<dyn RecommendationProvider>, catalog: Arc<dyn VideoCatalog>) -> Self {
        Self::with_fallback(provider, catalog, fallback_videos())
    }

    pub fn with_fallback(
        provider: Arc<dyn RecommendationProvider>,
        catalog: Arc<dyn VideoCatalog>,
        fallback: Vec<Video>,
    ) -> Self {
        Self {
            provider,
            catalog,
            fallback,
        }
    }

    pub async fn assemble(
        &self,
        user_id: &str,
        target_total: usize,
        recommended_target: usize,
    ) -> RecommendationResult {
        let recommended_target = recommended_target.min(target_total);

        let recommended_ids = self.recommended_ids(user_id, recommended_target).await;
        let recommended = self.resolve(&recommended_ids).await;
        let recommended_count = recommended.len();

        let mut excluded: HashSet<String> = recommended.iter().map(|v| v.id.clone()).collect();
        let needed = target_total.saturating_sub(recommended_count);

        let random = self.sample_filler(&excluded, needed).await;
        excluded.extend(random.iter().map(|v| v.id.clone()));

        let fallback: Vec<Video> = self
            .fallback
            .iter()
            .filter(|v| !excluded.contains(&v.id))
            .take(needed - random.len())
            .cloned()
            .collect();

        let source_counts = SourceCounts {
            from_service: recommended_count,
            from_catalog_random: random.len(),
            from_fallback: fallback.len(),
        };

        let mut videos = recommended;
        videos.extend(random);
        videos.extend(fallback);
        videos.truncate(target_total);

        if videos.len() < target_total {
            tracing::warn!(
                user_id = %user_id,
                assembled = videos.len(),
                target_total,
                "Could not fill recommendation list, returning partial result"
            );
        }

        tracing::info!(
            user_id = %user_id,
            total = videos.len(),
            from_service = source_counts.from_service,
            from_catalog_random = source_counts.from_catalog_random,
            from_fallback = source_counts.from_fallback,
            "Recommendation list assembled"
        );

        RecommendationResult {
            user_id: user_id.to_string(),
            videos,
            recommended_count,
            source_counts,
        }
    }

    /// Ranked ids from the service, deduplicated and capped. Errors become an empty list.
    async fn recommended_ids(&self, user_id: &str, top_k: usize) -> Vec<String> {
        if top_k == 0 {
            return vec![];
        }

        match self.provider.recommend(user_id, top_k).await {
            Ok(ids) => {
                let mut seen = HashSet::new();
                ids.into_iter()
                    .filter(|id| seen.insert(id.clone()))
                    .take(top_k)
                    .collect()
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    user_id = %user_id,
                    provider = self.provider.name(),
                    "Recommendation service unavailable, using filler only"
                );
                vec![]
            }
        }
    }

    /// Resolves ids to videos in service order. Unknown ids get a placeholder.
    async fn resolve(&self, ids: &[String]) -> Vec<Video> {
        if ids.is_empty() {
            return vec![];
        }

        let mut by_id: HashMap<String, Video> = match self.catalog.fetch_by_ids(ids).await {
            Ok(videos) => videos.into_iter().map(|v| (v.id.clone(), v)).collect(),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    catalog = self.catalog.name(),
                    "Catalog lookup failed, using placeholders for recommended videos"
                );
                HashMap::new()
            }
        };

        ids.iter()
            .map(|id| {
                by_id.remove(id).unwrap_or_else(|| {
                    tracing::warn!(video_id = %id, "Video details not found in catalog");
                    Video::placeholder(id)
                })
            })
            .collect()
    }

    /// Up to `needed` random catalog videos, none of them in `excluded`
    async fn sample_filler(&self, excluded: &HashSet<String>, needed: usize) -> Vec<Video> {
        if needed == 0 {
            return vec![];
        }

        let limit = needed + excluded.len() + SAMPLE_HEADROOM;
        let candidates = match self.catalog.sample_candidates(limit).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    catalog = self.catalog.name(),
                    "Random catalog sample failed, using fallback videos"
                );
                return vec![];
            }
        };

        let mut seen = HashSet::new();
        let mut pool: Vec<Video> = candidates
            .into_iter()
            .filter(|v| !excluded.contains(&v.id) && seen.insert(v.id.clone()))
            .collect();

        pool.shuffle(&mut rand::thread_rng());
        pool.truncate(needed);
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::services::catalog::{MockVideoCatalog, StaticVideoCatalog};
    use crate::services::providers::MockRecommendationProvider;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn provider_returning(values: &[&str]) -> Arc<dyn RecommendationProvider> {
        let values = ids(values);
        let mut provider = MockRecommendationProvider::new();
        provider
            .expect_recommend()
            .returning(move |_, _| Ok(values.clone()));
        provider.expect_name().return_const("mock");
        Arc::new(provider)
    }

    fn failing_provider() -> Arc<dyn RecommendationProvider> {
        let mut provider = MockRecommendationProvider::new();
        provider
            .expect_recommend()
            .returning(|_, _| Err(AppError::ExternalApi("connection refused".to_string())));
        provider.expect_name().return_const("mock");
        Arc::new(provider)
    }

    fn catalog_of(values: &[&str]) -> Arc<dyn VideoCatalog> {
        Arc::new(StaticVideoCatalog::new(
            values
                .iter()
                .map(|id| Video {
                    id: id.to_string(),
                    title: format!("Catalog {}", id),
                    thumbnail: format!("https://img/{}.jpg", id),
                    description: format!("About {}", id),
                })
                .collect(),
        ))
    }

    fn assert_unique(result: &RecommendationResult) {
        let unique: HashSet<_> = result.videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(unique.len(), result.videos.len(), "duplicate ids in {:?}", result.videos);
    }

    #[tokio::test]
    async fn test_two_recommendations_padded_from_catalog() {
        let assembler = RecommendationAssembler::new(
            provider_returning(&["v1", "v2"]),
            catalog_of(&["v1", "v2", "c1", "c2", "c3", "c4", "c5", "c6", "c7"]),
        );

        let result = assembler.assemble("u1", 8, 4).await;

        assert_eq!(result.videos.len(), 8);
        assert_eq!(result.recommended_count, 2);
        assert_eq!(result.recommended_ids(), vec!["v1", "v2"]);
        assert_eq!(result.videos[0].title, "Catalog v1");
        assert_eq!(result.source_counts.from_service, 2);
        assert_eq!(result.source_counts.from_catalog_random, 6);
        assert_eq!(result.source_counts.from_fallback, 0);
        assert_unique(&result);
    }

    #[tokio::test]
    async fn test_service_failure_means_all_filler() {
        let assembler = RecommendationAssembler::new(
            failing_provider(),
            catalog_of(&["c1", "c2", "c3", "c4", "c5", "c6", "c7", "c8", "c9"]),
        );

        let result = assembler.assemble("u1", 8, 4).await;

        assert_eq!(result.recommended_count, 0);
        assert_eq!(result.videos.len(), 8);
        assert_eq!(result.source_counts.from_catalog_random, 8);
        assert_unique(&result);
    }

    #[tokio::test]
    async fn test_empty_service_response_means_all_filler() {
        let assembler =
            RecommendationAssembler::new(provider_returning(&[]), catalog_of(&["c1", "c2"]));

        let result = assembler.assemble("u1", 8, 4).await;

        assert_eq!(result.recommended_count, 0);
        assert_eq!(result.source_counts.from_catalog_random, 2);
        assert_eq!(result.source_counts.from_fallback, 4);
        assert_eq!(result.videos.len(), 6);
        assert_unique(&result);
    }

    #[tokio::test]
    async fn test_unknown_ids_get_placeholders_in_service_order() {
        let assembler = RecommendationAssembler::new(
            provider_returning(&["missing", "c1"]),
            catalog_of(&["c1", "c2", "c3", "c4", "c5", "c6", "c7"]),
        );

        let result = assembler.assemble("u1", 8, 4).await;

        assert_eq!(result.recommended_ids(), vec!["missing", "c1"]);
        assert_eq!(result.videos[0], Video::placeholder("missing"));
        assert_eq!(result.videos[1].title, "Catalog c1");
        assert_eq!(result.recommended_count, 2);
        assert_unique(&result);
    }

    #[tokio::test]
    async fn test_service_overshoot_is_truncated_and_deduplicated() {
        let assembler = RecommendationAssembler::new(
            provider_returning(&["a", "a", "b", "c", "d", "e", "f"]),
            catalog_of(&["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"]),
        );

        let result = assembler.assemble("u1", 8, 4).await;

        assert_eq!(result.recommended_ids(), vec!["a", "b", "c", "d"]);
        assert_eq!(result.recommended_count, 4);
        assert_eq!(result.videos.len(), 8);
        assert_unique(&result);
    }

    #[tokio::test]
    async fn test_filler_never_repeats_recommended_ids() {
        // Catalog only knows the recommended ids plus two others
        let assembler = RecommendationAssembler::new(
            provider_returning(&["a", "b", "c", "d"]),
            catalog_of(&["a", "b", "c", "d", "x", "y"]),
        );

        for _ in 0..20 {
            let result = assembler.assemble("u1", 8, 4).await;
            assert_unique(&result);
            assert_eq!(result.recommended_count, 4);
            assert_eq!(result.source_counts.from_catalog_random, 2);
            assert_eq!(result.source_counts.from_fallback, 2);

            let filler: HashSet<_> = result.videos[4..].iter().map(|v| v.id.as_str()).collect();
            assert!(filler.contains("x") && filler.contains("y"));
        }
    }

    #[tokio::test]
    async fn test_fallback_respects_exclusion_and_order() {
        let assembler = RecommendationAssembler::new(
            provider_returning(&["fallback_1"]),
            catalog_of(&[]),
        );

        let result = assembler.assemble("u1", 4, 4).await;

        let got: Vec<_> = result.videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(got, vec!["fallback_1", "fallback_2", "fallback_3", "fallback_4"]);
        assert_eq!(result.recommended_count, 1);
        assert_eq!(result.source_counts.from_fallback, 3);
    }

    #[tokio::test]
    async fn test_everything_down_returns_partial_fallback() {
        let mut catalog = MockVideoCatalog::new();
        catalog
            .expect_sample_candidates()
            .returning(|_| Err(AppError::Internal("db down".to_string())));
        catalog.expect_name().return_const("mock");

        let assembler = RecommendationAssembler::new(failing_provider(), Arc::new(catalog));
        let result = assembler.assemble("u1", 8, 4).await;

        assert_eq!(result.recommended_count, 0);
        assert_eq!(result.videos.len(), 4);
        assert_eq!(result.source_counts.from_fallback, 4);
    }

    #[tokio::test]
    async fn test_catalog_lookup_failure_keeps_service_ids() {
        let mut catalog = MockVideoCatalog::new();
        catalog
            .expect_fetch_by_ids()
            .returning(|_| Err(AppError::Internal("timeout".to_string())));
        catalog.expect_sample_candidates().returning(|_| Ok(vec![]));
        catalog.expect_name().return_const("mock");

        let assembler =
            RecommendationAssembler::new(provider_returning(&["v1", "v2"]), Arc::new(catalog));
        let result = assembler.assemble("u1", 8, 4).await;

        assert_eq!(result.recommended_count, 2);
        assert_eq!(result.videos[0], Video::placeholder("v1"));
        assert_eq!(result.source_counts.from_fallback, 4);
        assert_eq!(result.videos.len(), 6);
    }

    #[tokio::test]
    async fn test_sample_limit_includes_headroom() {
        let mut catalog = MockVideoCatalog::new();
        catalog
            .expect_fetch_by_ids()
            .returning(|requested| Ok(requested.iter().map(|id| Video::placeholder(id)).collect()));
        // 2 recommended, 6 needed: 6 + 2 excluded + 5 headroom
        catalog
            .expect_sample_candidates()
            .withf(|limit| *limit == 13)
            .times(1)
            .returning(|_| Ok(vec![]));
        catalog.expect_name().return_const("mock");

        let assembler =
            RecommendationAssembler::new(provider_returning(&["v1", "v2"]), Arc::new(catalog));
        assembler.assemble("u1", 8, 4).await;
    }

    #[tokio::test]
    async fn test_recommended_target_zero_skips_service() {
        let mut provider = MockRecommendationProvider::new();
        provider.expect_recommend().times(0);
        provider.expect_name().return_const("mock");

        let assembler = RecommendationAssembler::new(
            Arc::new(provider),
            catalog_of(&["c1", "c2", "c3"]),
        );
        let result = assembler.assemble("u1", 3, 0).await;

        assert_eq!(result.recommended_count, 0);
        assert_eq!(result.videos.len(), 3);
    }
}
