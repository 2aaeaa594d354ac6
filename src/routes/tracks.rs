use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppResult, models::TrackSummary, routes::AppState, services::track_search,
};

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    q: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<TrackSummary>,
}

/// Handler for track search endpoint
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<SearchResponse>> {
    let results =
        track_search::search_tracks(state.catalog.as_ref(), &params.q, state.search_limit).await?;
    Ok(Json(SearchResponse { results }))
}
