use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::models::TrackId;

/// Application-level errors
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Seed tracks not found: {}", join_ids(.0))]
    SeedNotFound(Vec<TrackId>),

    #[error("No cluster level yields a match between the seed tracks")]
    NoConsensus,

    #[error("Insufficient feature data: {0}")]
    InsufficientFeatureData(String),

    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

fn join_ids(ids: &[TrackId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors raised by the pure matching algorithms
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MatchError {
    #[error("no cluster level yields a match")]
    NoConsensus,

    #[error("no seed carries a value for {0}")]
    InsufficientFeatureData(&'static str),
}

impl From<MatchError> for AppError {
    fn from(err: MatchError) -> Self {
        match err {
            MatchError::NoConsensus => AppError::NoConsensus,
            MatchError::InsufficientFeatureData(_) => {
                AppError::InsufficientFeatureData(err.to_string())
            }
        }
    }
}

impl AppError {
    /// Whether the caller can fix the request, as opposed to a server-side failure
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::Validation(_)
                | AppError::SeedNotFound(_)
                | AppError::NoConsensus
                | AppError::InsufficientFeatureData(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::SeedNotFound(_) => StatusCode::NOT_FOUND,
            AppError::NoConsensus | AppError::InsufficientFeatureData(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::CatalogUnavailable(_) | AppError::Database(_) | AppError::Cache(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = match &self {
            AppError::SeedNotFound(ids) => Json(json!({
                "error": self.to_string(),
                "missingIds": ids,
            })),
            _ => Json(json!({
                "error": self.to_string()
            })),
        };

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_not_found_names_missing_ids() {
        let err = AppError::SeedNotFound(vec![TrackId(4), TrackId(9)]);
        assert_eq!(err.to_string(), "Seed tracks not found: 4, 9");
        assert!(err.is_client_error());
    }

    #[test]
    fn test_match_error_conversion() {
        let err: AppError = MatchError::InsufficientFeatureData("tempo").into();
        assert!(matches!(err, AppError::InsufficientFeatureData(ref msg) if msg.contains("tempo")));

        let err: AppError = MatchError::NoConsensus.into();
        assert!(matches!(err, AppError::NoConsensus));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::Validation("bad".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::SeedNotFound(vec![TrackId(1)]).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::CatalogUnavailable("down".into())
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert!(!AppError::CatalogUnavailable("down".into()).is_client_error());
    }
}
