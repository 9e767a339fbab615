//! Sync Repository Implementation
//!
//! PostgreSQL implementation of the durable side of the pipeline.
//! Every write is conditional on natural identity, so replaying a log
//! entry never changes the outcome.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::domain::{CounterKey, EventId, EventMembership, Like, SyncRepository, TargetType};
use crate::shared::error::AppError;

/// PostgreSQL implementation of the SyncRepository.
#[derive(Clone)]
pub struct PgSyncRepository {
    pool: PgPool,
}

impl PgSyncRepository {
    /// Creates a new PgSyncRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncRepository for PgSyncRepository {
    /// Uses INSERT ON CONFLICT so a redelivered LIKE leaves the first row in place.
    #[instrument(skip(self, like), fields(like_id = like.like_id), level = "debug")]
    async fn save_like_if_absent(&self, like: &Like) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO likes (like_id, target_id, target_type, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (created_by, target_type, target_id) DO NOTHING
            "#,
        )
        .bind(like.like_id)
        .bind(like.target_id)
        .bind(like.target_type.as_str())
        .bind(like.created_by)
        .bind(like.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_like_if_present(
        &self,
        user_id: Uuid,
        target_type: TargetType,
        target_id: i64,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM likes
            WHERE created_by = $1 AND target_type = $2 AND target_id = $3
            "#,
        )
        .bind(user_id)
        .bind(target_type.as_str())
        .bind(target_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn has_like(
        &self,
        user_id: Uuid,
        target_type: TargetType,
        target_id: i64,
    ) -> Result<bool, AppError> {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM likes
                WHERE created_by = $1 AND target_type = $2 AND target_id = $3
            )
            "#,
        )
        .bind(user_id)
        .bind(target_type.as_str())
        .bind(target_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    async fn count_likes(&self, target_type: TargetType, target_id: i64) -> Result<i64, AppError> {
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM likes
            WHERE target_type = $1 AND target_id = $2
            "#,
        )
        .bind(target_type.as_str())
        .bind(target_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count.0)
    }

    async fn add_member_if_absent(&self, membership: &EventMembership) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO event_members (event_id, user_id, joined_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id, user_id) DO NOTHING
            "#,
        )
        .bind(membership.event_id)
        .bind(membership.user_id)
        .bind(membership.joined_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn remove_member_if_present(&self, event_id: i64, user_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            DELETE FROM event_members
            WHERE event_id = $1 AND user_id = $2
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Records the entry id and folds the delta in one transaction.
    #[instrument(skip(self), level = "debug")]
    async fn apply_counter_delta(
        &self,
        event_id: &EventId,
        key: &CounterKey,
        delta: i64,
    ) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let marked = sqlx::query(
            r#"
            INSERT INTO applied_counter_events (event_id)
            VALUES ($1)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id.as_str())
        .execute(&mut *tx)
        .await?;

        if marked.rows_affected() == 0 {
            tx.rollback().await?;
            debug!(event_id = %event_id, "Counter delta already applied");
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO counters (metric, target_type, target_id, value)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (metric, target_type, target_id)
            DO UPDATE SET value = counters.value + EXCLUDED.value, updated_at = NOW()
            "#,
        )
        .bind(key.metric.as_str())
        .bind(key.target_type.as_str())
        .bind(key.target_id)
        .bind(delta)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn counter_value(&self, key: &CounterKey) -> Result<i64, AppError> {
        let value: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT value FROM counters
            WHERE metric = $1 AND target_type = $2 AND target_id = $3
            "#,
        )
        .bind(key.metric.as_str())
        .bind(key.target_type.as_str())
        .bind(key.target_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value.map(|v| v.0).unwrap_or(0))
    }

    #[instrument(skip(self), level = "debug")]
    async fn prune_applied_counter_events(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM applied_counter_events WHERE applied_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

impl std::fmt::Debug for PgSyncRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgSyncRepository").finish_non_exhaustive()
    }
}
