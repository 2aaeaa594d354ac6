use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Instant,
};

use crate::{
    db::CatalogStore,
    error::{AppError, AppResult},
    models::{
        ClusterHierarchy, ClusterRecommendation, HistoryRecord, RecommendationRequest,
        SimilarityRecommendation, Strategy, Track, TrackId,
    },
    services::{cluster_matcher, history::HistoryLogger, similarity},
};

/// Tunables of the recommendation engine
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub hierarchy: ClusterHierarchy,
    /// Use the first seed's fallback cluster instead of failing without consensus
    pub with_fallback: bool,
    /// Upper bound on the candidate scan
    pub catalog_scan_limit: usize,
    pub cluster_default_n: usize,
    pub similarity_default_n: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            hierarchy: ClusterHierarchy::default(),
            with_fallback: true,
            catalog_scan_limit: 10_000,
            cluster_default_n: 3,
            similarity_default_n: 1,
        }
    }
}

/// Serves recommendations from seed tracks against a read-only catalog
///
/// Every request reads a fresh catalog snapshot: seeds by id, then a bounded
/// full scan for candidates. Cluster and similarity matching are alternative
/// strategies; a request uses exactly one of them.
pub struct RecommendationEngine {
    catalog: Arc<dyn CatalogStore>,
    history: Option<HistoryLogger>,
    settings: EngineSettings,
}

impl RecommendationEngine {
    pub fn new(catalog: Arc<dyn CatalogStore>, settings: EngineSettings) -> Self {
        Self {
            catalog,
            history: None,
            settings,
        }
    }

    /// Enables query history persistence
    pub fn with_history(mut self, logger: HistoryLogger) -> Self {
        self.history = Some(logger);
        self
    }

    /// Recommends tracks sharing the cluster three seeds agree on
    pub async fn recommend_by_cluster(
        &self,
        request: RecommendationRequest,
    ) -> AppResult<ClusterRecommendation> {
        let start = Instant::now();
        let seed_ids = validate_cluster_seeds(&request.seed_ids)?;
        let user_id = request.user_id;
        let n = request.n.unwrap_or(self.settings.cluster_default_n);

        let seeds: [Track; 3] = self
            .fetch_seeds(&seed_ids)
            .await?
            .try_into()
            .map_err(|_| AppError::Internal("seed lookup returned wrong count".to_string()))?;

        let found = cluster_matcher::match_seeds(
            &seeds,
            &self.settings.hierarchy,
            self.settings.with_fallback,
        )?;
        let level_used = self.settings.hierarchy.name(found.level).to_string();

        let catalog = self.fetch_candidates().await?;
        let scanned = catalog.len();
        let recommendations =
            cluster_matcher::rank_cluster_candidates(catalog, &seed_ids, &found, n);

        tracing::info!(
            level_used = %level_used,
            shared_value = %found.shared_value,
            match_degree = ?found.degree,
            scanned,
            returned = recommendations.len(),
            processing_time_ms = start.elapsed().as_millis(),
            "Cluster recommendation completed"
        );

        let response = ClusterRecommendation {
            recommendations,
            strategy_used: Strategy::Cluster,
            level_used,
            shared_value: found.shared_value,
            match_degree: found.degree,
        };

        if let Some(history) = &self.history {
            history.record_in_background(
                HistoryRecord::from_cluster(&seed_ids, &response).with_user(user_id),
            );
        }

        Ok(response)
    }

    /// Recommends the tracks closest to the seeds' audio-feature centroid
    pub async fn recommend_by_similarity(
        &self,
        request: RecommendationRequest,
    ) -> AppResult<SimilarityRecommendation> {
        let start = Instant::now();
        let seed_ids = validate_similarity_seeds(&request.seed_ids)?;
        let user_id = request.user_id;
        let n = request.n.unwrap_or(self.settings.similarity_default_n);

        let seeds = self.fetch_seeds(&seed_ids).await?;
        let candidates = self.fetch_candidates().await?;
        let scanned = candidates.len();

        let recommendations = similarity::score(&seeds, candidates, n)?;

        tracing::info!(
            seeds = seeds.len(),
            scanned,
            returned = recommendations.len(),
            best_similarity = recommendations.first().map(|r| r.similarity),
            processing_time_ms = start.elapsed().as_millis(),
            "Similarity recommendation completed"
        );

        let response = SimilarityRecommendation {
            recommendations,
            strategy_used: Strategy::Similarity,
        };

        if let Some(history) = &self.history {
            history.record_in_background(
                HistoryRecord::from_similarity(&seed_ids, &response).with_user(user_id),
            );
        }

        Ok(response)
    }

    /// Resolves seed ids to tracks, in request order
    async fn fetch_seeds(&self, seed_ids: &[TrackId]) -> AppResult<Vec<Track>> {
        let mut by_id: HashMap<TrackId, Track> = self
            .catalog
            .get_by_ids(seed_ids)
            .await?
            .into_iter()
            .map(|track| (track.id, track))
            .collect();

        let missing: Vec<TrackId> = seed_ids
            .iter()
            .filter(|id| !by_id.contains_key(id))
            .copied()
            .collect();

        if !missing.is_empty() {
            tracing::warn!(missing = ?missing, "Seed tracks not found in catalog");
            return Err(AppError::SeedNotFound(missing));
        }

        Ok(seed_ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .collect())
    }

    async fn fetch_candidates(&self) -> AppResult<Vec<Track>> {
        let limit = self.settings.catalog_scan_limit;
        let candidates = self.catalog.get_all(limit).await?;

        if candidates.len() >= limit {
            tracing::warn!(
                limit,
                store = self.catalog.name(),
                "Catalog scan hit the configured limit, candidates truncated"
            );
        }

        Ok(candidates)
    }
}

/// Exactly three distinct seeds
fn validate_cluster_seeds(seed_ids: &[TrackId]) -> AppResult<Vec<TrackId>> {
    if seed_ids.len() != 3 {
        return Err(AppError::Validation(format!(
            "Exactly 3 seed track ids are required, got {}",
            seed_ids.len()
        )));
    }

    let distinct: HashSet<&TrackId> = seed_ids.iter().collect();
    if distinct.len() != seed_ids.len() {
        return Err(AppError::Validation(
            "Seed track ids must be distinct".to_string(),
        ));
    }

    Ok(seed_ids.to_vec())
}

/// At least one seed; repeated ids collapse to their first occurrence
fn validate_similarity_seeds(seed_ids: &[TrackId]) -> AppResult<Vec<TrackId>> {
    if seed_ids.is_empty() {
        return Err(AppError::Validation(
            "At least one seed track id is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    Ok(seed_ids
        .iter()
        .filter(|id| seen.insert(**id))
        .copied()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MockCatalogStore;
    use crate::models::{AudioFeatures, ClusterLabel, MatchDegree, UserId, FEATURE_COUNT};
    use crate::services::history::test_support::{FailingSink, RecordingSink};

    fn track(id: i64, popularity: u32, levels: [i64; 5], features: [f64; FEATURE_COUNT]) -> Track {
        Track {
            id: TrackId(id),
            name: format!("Track {}", id),
            artists: "Artist".to_string(),
            popularity,
            cluster_levels: levels.iter().map(|l| ClusterLabel(*l)).collect(),
            features: AudioFeatures::from_array(features),
        }
    }

    fn request(ids: &[i64], n: Option<usize>) -> RecommendationRequest {
        RecommendationRequest {
            seed_ids: ids.iter().map(|i| TrackId(*i)).collect(),
            n,
            user_id: None,
        }
    }

    /// Mock catalog answering lookups from a fixed track list
    fn catalog_of(tracks: Vec<Track>) -> MockCatalogStore {
        let mut mock = MockCatalogStore::new();
        let lookup = tracks.clone();
        mock.expect_get_by_ids().returning(move |ids| {
            Ok(lookup
                .iter()
                .filter(|t| ids.contains(&t.id))
                .cloned()
                .collect())
        });
        mock.expect_get_all()
            .returning(move |limit| Ok(tracks.iter().take(limit).cloned().collect()));
        mock.expect_name().return_const("mock");
        mock
    }

    fn fallback_catalog() -> Vec<Track> {
        vec![
            track(1, 50, [1, 2, 3, 4, 5], [0.5; FEATURE_COUNT]),
            track(2, 50, [6, 7, 8, 9, 10], [0.5; FEATURE_COUNT]),
            track(3, 50, [11, 12, 13, 14, 15], [0.5; FEATURE_COUNT]),
            track(4, 10, [0, 0, 3, 0, 0], [0.2; FEATURE_COUNT]),
            track(5, 20, [0, 0, 3, 0, 0], [0.9; FEATURE_COUNT]),
        ]
    }

    #[tokio::test]
    async fn test_cluster_fallback_orders_by_popularity() {
        let engine = RecommendationEngine::new(
            Arc::new(catalog_of(fallback_catalog())),
            EngineSettings::default(),
        );

        let response = engine
            .recommend_by_cluster(request(&[1, 2, 3], None))
            .await
            .unwrap();

        assert_eq!(response.match_degree, MatchDegree::FallbackFirstSeed);
        assert_eq!(response.level_used, "cluster3");
        assert_eq!(response.shared_value, ClusterLabel(3));
        let popularity: Vec<u32> = response.recommendations.iter().map(|t| t.popularity).collect();
        assert_eq!(popularity, vec![20, 10]);
    }

    #[tokio::test]
    async fn test_cluster_without_fallback_reports_no_consensus() {
        let settings = EngineSettings {
            with_fallback: false,
            ..EngineSettings::default()
        };
        let engine = RecommendationEngine::new(Arc::new(catalog_of(fallback_catalog())), settings);

        let result = engine.recommend_by_cluster(request(&[1, 2, 3], None)).await;

        assert!(matches!(result, Err(AppError::NoConsensus)));
    }

    #[tokio::test]
    async fn test_cluster_rejects_wrong_seed_count_before_catalog_access() {
        // No expectations: any catalog call would panic.
        let engine =
            RecommendationEngine::new(Arc::new(MockCatalogStore::new()), EngineSettings::default());

        let too_few = engine.recommend_by_cluster(request(&[1, 2], None)).await;
        let duplicates = engine.recommend_by_cluster(request(&[1, 1, 2], None)).await;

        assert!(matches!(too_few, Err(AppError::Validation(_))));
        assert!(matches!(duplicates, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_missing_seeds_are_named() {
        let engine = RecommendationEngine::new(
            Arc::new(catalog_of(fallback_catalog())),
            EngineSettings::default(),
        );

        let result = engine.recommend_by_cluster(request(&[1, 42, 43], None)).await;

        match result {
            Err(AppError::SeedNotFound(missing)) => {
                assert_eq!(missing, vec![TrackId(42), TrackId(43)])
            }
            other => panic!("expected SeedNotFound, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_first_seed_is_request_order_not_store_order() {
        // The store answers in reverse order; fallback must still use seed #1.
        let tracks = fallback_catalog();
        let mut mock = MockCatalogStore::new();
        let lookup = tracks.clone();
        mock.expect_get_by_ids().returning(move |ids| {
            Ok(lookup
                .iter()
                .rev()
                .filter(|t| ids.contains(&t.id))
                .cloned()
                .collect())
        });
        mock.expect_get_all()
            .returning(move |_| Ok(tracks.clone()));
        mock.expect_name().return_const("mock");
        let engine = RecommendationEngine::new(Arc::new(mock), EngineSettings::default());

        let response = engine
            .recommend_by_cluster(request(&[2, 1, 3], None))
            .await
            .unwrap();

        assert_eq!(response.shared_value, ClusterLabel(8));
        assert!(response.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_catalog_failure_surfaces_without_retry() {
        let mut mock = MockCatalogStore::new();
        mock.expect_get_by_ids()
            .times(1)
            .returning(|_| Err(AppError::CatalogUnavailable("connection refused".to_string())));
        let engine = RecommendationEngine::new(Arc::new(mock), EngineSettings::default());

        let result = engine.recommend_by_similarity(request(&[1], None)).await;

        assert!(matches!(result, Err(AppError::CatalogUnavailable(_))));
    }

    #[tokio::test]
    async fn test_scan_is_bounded_by_configured_limit() {
        let mut mock = MockCatalogStore::new();
        let tracks = fallback_catalog();
        let lookup = tracks.clone();
        mock.expect_get_by_ids().returning(move |ids| {
            Ok(lookup
                .iter()
                .filter(|t| ids.contains(&t.id))
                .cloned()
                .collect())
        });
        mock.expect_get_all()
            .withf(|limit| *limit == 4)
            .times(1)
            .returning(move |limit| Ok(tracks.iter().take(limit).cloned().collect()));
        mock.expect_name().return_const("mock");
        let settings = EngineSettings {
            catalog_scan_limit: 4,
            ..EngineSettings::default()
        };
        let engine = RecommendationEngine::new(Arc::new(mock), settings);

        let response = engine
            .recommend_by_cluster(request(&[1, 2, 3], Some(10)))
            .await
            .unwrap();

        // track 5 lies beyond the scan bound
        let ids: Vec<TrackId> = response.recommendations.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![TrackId(4)]);
    }

    #[tokio::test]
    async fn test_similarity_excludes_seeds_and_defaults_to_one() {
        let engine = RecommendationEngine::new(
            Arc::new(catalog_of(fallback_catalog())),
            EngineSettings::default(),
        );

        let response = engine
            .recommend_by_similarity(request(&[1, 1], None))
            .await
            .unwrap();

        assert_eq!(response.strategy_used, Strategy::Similarity);
        assert_eq!(response.recommendations.len(), 1);
        assert_ne!(response.recommendations[0].track.id, TrackId(1));
    }

    #[tokio::test]
    async fn test_similarity_n_zero_is_empty() {
        let engine = RecommendationEngine::new(
            Arc::new(catalog_of(fallback_catalog())),
            EngineSettings::default(),
        );

        let response = engine
            .recommend_by_similarity(request(&[1], Some(0)))
            .await
            .unwrap();

        assert!(response.recommendations.is_empty());
    }

    #[tokio::test]
    async fn test_similarity_requires_a_seed() {
        let engine =
            RecommendationEngine::new(Arc::new(MockCatalogStore::new()), EngineSettings::default());

        let result = engine.recommend_by_similarity(request(&[], None)).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_history_is_recorded_in_rank_order() {
        let sink = RecordingSink::default();
        let (logger, handle) = HistoryLogger::spawn(Arc::new(sink.clone()));
        let engine = RecommendationEngine::new(
            Arc::new(catalog_of(fallback_catalog())),
            EngineSettings::default(),
        )
        .with_history(logger);

        let mut listener_request = request(&[1, 2, 3], None);
        listener_request.user_id = Some(UserId(42));
        engine.recommend_by_cluster(listener_request).await.unwrap();
        drop(engine);
        handle.shutdown().await;

        let records = sink.recorded();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].user_id, Some(UserId(42)));
        assert_eq!(records[0].seed_ids, vec![TrackId(1), TrackId(2), TrackId(3)]);
        assert_eq!(records[0].result_ids(), vec![TrackId(5), TrackId(4)]);
        assert_eq!(records[0].match_degree, Some(MatchDegree::FallbackFirstSeed));
    }

    #[tokio::test]
    async fn test_history_failure_does_not_fail_response() {
        let (logger, handle) = HistoryLogger::spawn(Arc::new(FailingSink));
        let engine = RecommendationEngine::new(
            Arc::new(catalog_of(fallback_catalog())),
            EngineSettings::default(),
        )
        .with_history(logger);

        let response = engine.recommend_by_similarity(request(&[4], Some(2))).await;
        handle.shutdown().await;

        assert_eq!(response.unwrap().recommendations.len(), 2);
    }
}
