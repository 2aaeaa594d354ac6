use sqlx::PgPool;

use crate::{
    error::{AppError, AppResult},
    models::{AudioFeatures, ClusterLabel, Track, TrackId, TrackSummary},
};

/// Read-only access to the track catalog
///
/// The engine only ever reads: point lookups for seeds, a bounded full scan
/// for candidates and a name/artist search for seed selection. Failures are
/// reported as [`AppError::CatalogUnavailable`] and never retried here.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fetches the tracks with the given ids, in no particular order
    ///
    /// Unknown ids are silently absent from the result.
    async fn get_by_ids(&self, ids: &[TrackId]) -> AppResult<Vec<Track>>;

    /// Scans the catalog in its iteration order, returning at most `limit` tracks
    async fn get_all(&self, limit: usize) -> AppResult<Vec<Track>>;

    /// Case-insensitive substring search on track name or artists
    async fn search(&self, query: &str, limit: usize) -> AppResult<Vec<TrackSummary>>;

    /// Store name for logging
    fn name(&self) -> &'static str;
}

const TRACK_COLUMNS: &str = "song_id, name, artists, popularity, \
     cluster1, cluster2, cluster3, cluster4, cluster5, \
     danceability, energy, valence, tempo, acousticness, \
     speechiness, instrumentalness, liveness, loudness";

/// Row of the `songs_with_clusters` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrackRow {
    pub song_id: i64,
    pub name: String,
    pub artists: String,
    pub popularity: i32,
    pub cluster1: i64,
    pub cluster2: i64,
    pub cluster3: i64,
    pub cluster4: i64,
    pub cluster5: i64,
    pub danceability: Option<f64>,
    pub energy: Option<f64>,
    pub valence: Option<f64>,
    pub tempo: Option<f64>,
    pub acousticness: Option<f64>,
    pub speechiness: Option<f64>,
    pub instrumentalness: Option<f64>,
    pub liveness: Option<f64>,
    pub loudness: Option<f64>,
}

impl From<TrackRow> for Track {
    fn from(row: TrackRow) -> Self {
        Track {
            id: TrackId(row.song_id),
            name: row.name,
            artists: row.artists,
            popularity: u32::try_from(row.popularity).unwrap_or(0),
            cluster_levels: [row.cluster1, row.cluster2, row.cluster3, row.cluster4, row.cluster5]
                .into_iter()
                .map(ClusterLabel)
                .collect(),
            features: AudioFeatures {
                danceability: row.danceability,
                energy: row.energy,
                valence: row.valence,
                tempo: row.tempo,
                acousticness: row.acousticness,
                speechiness: row.speechiness,
                instrumentalness: row.instrumentalness,
                liveness: row.liveness,
                loudness: row.loudness,
            },
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    song_id: i64,
    name: String,
    artists: String,
}

/// Escapes LIKE wildcards so user input only matches literally
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn unavailable(operation: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |e| {
        tracing::error!(error = %e, operation, "Catalog read failed");
        AppError::CatalogUnavailable(format!("{} failed: {}", operation, e))
    }
}

/// Catalog backed by the Postgres `songs_with_clusters` table
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CatalogStore for PgCatalogStore {
    async fn get_by_ids(&self, ids: &[TrackId]) -> AppResult<Vec<Track>> {
        let raw_ids: Vec<i64> = ids.iter().map(|id| id.0).collect();
        let sql = format!(
            "SELECT {} FROM songs_with_clusters WHERE song_id = ANY($1)",
            TRACK_COLUMNS
        );

        let rows: Vec<TrackRow> = sqlx::query_as(&sql)
            .bind(&raw_ids)
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable("seed lookup"))?;

        Ok(rows.into_iter().map(Track::from).collect())
    }

    async fn get_all(&self, limit: usize) -> AppResult<Vec<Track>> {
        let sql = format!(
            "SELECT {} FROM songs_with_clusters ORDER BY song_id LIMIT $1",
            TRACK_COLUMNS
        );

        let rows: Vec<TrackRow> = sqlx::query_as(&sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable("catalog scan"))?;

        tracing::debug!(rows = rows.len(), limit, "Catalog scan completed");

        Ok(rows.into_iter().map(Track::from).collect())
    }

    async fn search(&self, query: &str, limit: usize) -> AppResult<Vec<TrackSummary>> {
        let rows: Vec<SummaryRow> = sqlx::query_as(
            r#"
            SELECT song_id, name, artists
            FROM songs_with_clusters
            WHERE name ILIKE $1 OR artists ILIKE $1
            ORDER BY popularity DESC, song_id
            LIMIT $2
            "#,
        )
        .bind(like_pattern(query))
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable("track search"))?;

        Ok(rows
            .into_iter()
            .map(|row| TrackSummary {
                id: TrackId(row.song_id),
                name: row.name,
                artists: row.artists,
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}
