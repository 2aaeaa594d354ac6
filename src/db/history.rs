use redis::{AsyncCommands, Client};
use sqlx::PgPool;

use crate::{
    error::{AppError, AppResult},
    models::{HistoryRecord, MatchDegree, Strategy},
};

/// Destination for served-recommendation records
#[async_trait::async_trait]
pub trait HistorySink: Send + Sync {
    async fn record(&self, record: &HistoryRecord) -> AppResult<()>;

    /// Sink name for logging
    fn name(&self) -> &'static str;
}

fn strategy_str(strategy: Strategy) -> &'static str {
    match strategy {
        Strategy::Cluster => "cluster",
        Strategy::Similarity => "similarity",
    }
}

fn degree_str(degree: MatchDegree) -> &'static str {
    match degree {
        MatchDegree::AllThree => "ALL_THREE",
        MatchDegree::TwoOfThree => "TWO_OF_THREE",
        MatchDegree::FallbackFirstSeed => "FALLBACK_FIRST_SEED",
    }
}

/// Writes records into `recommendation_queries`, `query_seeds` and `query_results`
#[derive(Clone)]
pub struct PgHistorySink {
    pool: PgPool,
}

impl PgHistorySink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl HistorySink for PgHistorySink {
    async fn record(&self, record: &HistoryRecord) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        let (query_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO recommendation_queries
                (user_id, strategy, level_used, match_degree, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING query_id
            "#,
        )
        .bind(record.user_id.map(|id| id.0))
        .bind(strategy_str(record.strategy))
        .bind(record.level_used.as_deref())
        .bind(record.match_degree.map(degree_str))
        .bind(record.created_at)
        .fetch_one(&mut *tx)
        .await?;

        for (idx, seed_id) in record.seed_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO query_seeds (query_id, seed_rank, song_id) VALUES ($1, $2, $3)",
            )
            .bind(query_id)
            .bind(idx as i32 + 1)
            .bind(seed_id.0)
            .execute(&mut *tx)
            .await?;
        }

        for result in &record.results {
            sqlx::query(
                r#"
                INSERT INTO query_results (query_id, result_rank, song_id, similarity)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(query_id)
            .bind(result.rank as i32)
            .bind(result.track_id.0)
            .bind(result.similarity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            query_id,
            user_id = ?record.user_id,
            seeds = record.seed_ids.len(),
            results = record.results.len(),
            "Stored recommendation history"
        );

        Ok(())
    }

    fn name(&self) -> &'static str {
        "postgres"
    }
}

/// Pushes JSON records onto a capped Redis list, newest first
#[derive(Clone)]
pub struct RedisHistorySink {
    client: Client,
    key: String,
    max_len: usize,
}

impl RedisHistorySink {
    pub fn new(client: Client, key: String, max_len: usize) -> Self {
        Self {
            client,
            key,
            max_len,
        }
    }
}

#[async_trait::async_trait]
impl HistorySink for RedisHistorySink {
    async fn record(&self, record: &HistoryRecord) -> AppResult<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| AppError::Internal(format!("History serialization error: {}", e)))?;

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let _: () = conn.lpush(&self.key, json).await?;
        let stop = self.max_len.saturating_sub(1) as isize;
        let _: () = conn.ltrim(&self.key, 0, stop).await?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Creates a Redis client for the history list
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}
