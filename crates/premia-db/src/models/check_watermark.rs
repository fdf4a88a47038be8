//! Per-check watermark model.
//!
//! One row per check name recording the timestamp of the newest event that
//! check has fully processed. Read before a run to bound the event fetch
//! window; advanced after a successful run. The upsert only moves forward,
//! so a replayed run cannot rewind the cursor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// Watermark record for one named check.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CheckWatermark {
    pub check_name: String,
    pub last_event_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CheckWatermark {
    /// Get the watermark for a check, if one has been recorded.
    pub async fn get(pool: &PgPool, check_name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as(r"SELECT * FROM check_watermarks WHERE check_name = $1")
            .bind(check_name)
            .fetch_optional(pool)
            .await
    }

    /// Advance the watermark for a check, creating it if absent.
    pub async fn advance(
        pool: &PgPool,
        check_name: &str,
        last_event_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as(
            r"
            INSERT INTO check_watermarks (check_name, last_event_at)
            VALUES ($1, $2)
            ON CONFLICT (check_name) DO UPDATE
            SET last_event_at = GREATEST(check_watermarks.last_event_at, EXCLUDED.last_event_at),
                updated_at = NOW()
            RETURNING *
            ",
        )
        .bind(check_name)
        .bind(last_event_at)
        .fetch_one(pool)
        .await
    }
}
