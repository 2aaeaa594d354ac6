use axum::{extract::State, Extension, Json};

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{ClusterRecommendation, RecommendationRequest, SimilarityRecommendation},
    routes::AppState,
};

/// Handler for cluster-consensus recommendations
pub async fn recommend_cluster(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<ClusterRecommendation>> {
    tracing::info!(
        request_id = %request_id,
        seed_ids = ?request.seed_ids,
        n = ?request.n,
        user_id = ?request.user_id,
        "Processing cluster recommendation request"
    );

    let response = state
        .engine
        .recommend_by_cluster(request)
        .await
        .map_err(|e| log_failure(&request_id, "cluster", e))?;

    Ok(Json(response))
}

/// Handler for audio-feature similarity recommendations
pub async fn recommend_similarity(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<RecommendationRequest>,
) -> AppResult<Json<SimilarityRecommendation>> {
    tracing::info!(
        request_id = %request_id,
        seed_count = request.seed_ids.len(),
        n = ?request.n,
        user_id = ?request.user_id,
        "Processing similarity recommendation request"
    );

    let response = state
        .engine
        .recommend_by_similarity(request)
        .await
        .map_err(|e| log_failure(&request_id, "similarity", e))?;

    Ok(Json(response))
}

fn log_failure(request_id: &RequestId, strategy: &'static str, err: AppError) -> AppError {
    if err.is_client_error() {
        tracing::warn!(request_id = %request_id, strategy, error = %err, "Recommendation rejected");
    } else {
        tracing::error!(request_id = %request_id, strategy, error = %err, "Recommendation failed");
    }
    err
}
