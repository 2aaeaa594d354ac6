use crate::{
    db::CatalogStore,
    error::{AppError, AppResult},
    models::TrackSummary,
};

/// Service function for track search
///
/// Validates the query and delegates to the configured catalog, keeping
/// HTTP routing free of catalog details.
pub async fn search_tracks(
    catalog: &dyn CatalogStore,
    query: &str,
    limit: usize,
) -> AppResult<Vec<TrackSummary>> {
    let query = query.trim();
    if query.is_empty() {
        return Err(AppError::Validation(
            "Missing or empty search query".to_string(),
        ));
    }

    let results = catalog.search(query, limit).await?;

    tracing::debug!(
        query = %query,
        store = catalog.name(),
        results = results.len(),
        "Track search completed"
    );

    Ok(results)
}
