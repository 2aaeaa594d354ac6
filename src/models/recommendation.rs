use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ClusterLabel, Track, TrackId};

/// How strongly the seeds agreed on the cluster used for recommendations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchDegree {
    /// All three seeds share the label
    AllThree,
    /// Exactly two seeds share the label
    TwoOfThree,
    /// No agreement anywhere, the first seed's label at the fallback level is used
    FallbackFirstSeed,
}

/// Matching strategy that produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Cluster,
    Similarity,
}

/// Outcome of cluster matching over three seeds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterMatch {
    /// Level position, 0 = coarsest
    pub level: usize,
    pub shared_value: ClusterLabel,
    pub degree: MatchDegree,
}

/// Listener a request is made on behalf of, as issued by the auth collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Incoming recommendation request, used by both strategies
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationRequest {
    pub seed_ids: Vec<TrackId>,
    /// Number of recommendations; the strategy default applies when absent
    #[serde(default)]
    pub n: Option<usize>,
    /// Owner of the query in the history log; anonymous when absent
    #[serde(default)]
    pub user_id: Option<UserId>,
}

/// Cluster-mode response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRecommendation {
    pub recommendations: Vec<Track>,
    pub strategy_used: Strategy,
    pub level_used: String,
    pub shared_value: ClusterLabel,
    pub match_degree: MatchDegree,
}

/// A candidate together with its cosine similarity to the seed centroid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredTrack {
    pub track: Track,
    pub similarity: f64,
}

/// Similarity-mode response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimilarityRecommendation {
    pub recommendations: Vec<ScoredTrack>,
    pub strategy_used: Strategy,
}

/// One ranked entry of a persisted result list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedResult {
    /// 1-based rank
    pub rank: usize,
    pub track_id: TrackId,
    pub similarity: f64,
}

/// Immutable record of one served recommendation, written to the query history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub seed_ids: Vec<TrackId>,
    pub strategy: Strategy,
    pub level_used: Option<String>,
    pub match_degree: Option<MatchDegree>,
    pub results: Vec<RankedResult>,
    pub created_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// Record for a cluster-mode response; every result carries similarity 1.0
    pub fn from_cluster(seed_ids: &[TrackId], response: &ClusterRecommendation) -> Self {
        Self {
            user_id: None,
            seed_ids: seed_ids.to_vec(),
            strategy: Strategy::Cluster,
            level_used: Some(response.level_used.clone()),
            match_degree: Some(response.match_degree),
            results: response
                .recommendations
                .iter()
                .enumerate()
                .map(|(idx, track)| RankedResult {
                    rank: idx + 1,
                    track_id: track.id,
                    similarity: 1.0,
                })
                .collect(),
            created_at: Utc::now(),
        }
    }

    /// Record for a similarity-mode response
    pub fn from_similarity(seed_ids: &[TrackId], response: &SimilarityRecommendation) -> Self {
        Self {
            user_id: None,
            seed_ids: seed_ids.to_vec(),
            strategy: Strategy::Similarity,
            level_used: None,
            match_degree: None,
            results: response
                .recommendations
                .iter()
                .enumerate()
                .map(|(idx, scored)| RankedResult {
                    rank: idx + 1,
                    track_id: scored.track.id,
                    similarity: scored.similarity,
                })
                .collect(),
            created_at: Utc::now(),
        }
    }

    /// Attributes the record to a listener
    pub fn with_user(mut self, user_id: Option<UserId>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn result_ids(&self) -> Vec<TrackId> {
        self.results.iter().map(|r| r.track_id).collect()
    }
}
