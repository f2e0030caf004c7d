use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use std::collections::HashMap;
use uuid::Uuid;

use crate::event_sourcing::core::{EsError, EsResult, EventEnvelope, NO_EVENTS_VERSION};
use super::event_store::{validate_batch, EventStore};

// ============================================================================
// PostgreSQL Event Store
// ============================================================================
//
// One append-only table. UNIQUE (aggregate_id, version) is what makes two
// racing writers collide; a unique violation is reported as a concurrency
// conflict. Each append is a single transaction.
//
// ============================================================================

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS events (
        event_id UUID PRIMARY KEY,
        event_type TEXT NOT NULL,
        aggregate_id TEXT NOT NULL,
        aggregate_type TEXT NOT NULL,
        version BIGINT NOT NULL,
        timestamp TIMESTAMPTZ NOT NULL,
        data JSONB NOT NULL,
        metadata JSONB NOT NULL DEFAULT '{}'::jsonb,
        CONSTRAINT events_aggregate_version_key UNIQUE (aggregate_id, version)
    )",
    "CREATE INDEX IF NOT EXISTS events_stream_idx ON events (timestamp, event_id)",
    "CREATE INDEX IF NOT EXISTS events_aggregate_idx ON events (aggregate_type, aggregate_id, version)",
];

const SELECT_COLUMNS: &str =
    "event_id, event_type, aggregate_id, aggregate_type, version, timestamp, data, metadata";

pub struct PostgresEventStore {
    pool: PgPool,
}

impl PostgresEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> EsResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Create the events table and its indexes if missing.
    pub async fn init_schema(&self) -> EsResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("Event store schema ready");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn row_to_envelope(row: &PgRow) -> EsResult<EventEnvelope> {
    let data: Json<serde_json::Value> = row.try_get("data")?;
    let metadata: Json<HashMap<String, String>> = row.try_get("metadata")?;

    Ok(EventEnvelope {
        event_id: row.try_get::<Uuid, _>("event_id")?,
        event_type: row.try_get("event_type")?,
        aggregate_id: row.try_get("aggregate_id")?,
        aggregate_type: row.try_get("aggregate_type")?,
        version: row.try_get("version")?,
        timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
        data: data.0,
        metadata: metadata.0,
    })
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn save_events(
        &self,
        aggregate_id: &str,
        expected_version: i64,
        events: &[EventEnvelope],
    ) -> EsResult<()> {
        validate_batch(aggregate_id, expected_version, events)?;

        let mut tx = self.pool.begin().await?;

        let current_version: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(version), -1) FROM events WHERE aggregate_id = $1",
        )
        .bind(aggregate_id)
        .fetch_one(&mut *tx)
        .await?;

        let conflict = || EsError::ConcurrencyConflict {
            aggregate_id: aggregate_id.to_string(),
            expected: expected_version,
            actual: current_version,
        };

        if current_version != expected_version {
            tracing::warn!(
                aggregate_id = %aggregate_id,
                expected_version,
                current_version,
                "Concurrency conflict on append"
            );
            return Err(conflict());
        }

        for envelope in events {
            let inserted = sqlx::query(
                "INSERT INTO events (
                    event_id, event_type, aggregate_id, aggregate_type, version,
                    timestamp, data, metadata
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(envelope.event_id)
            .bind(&envelope.event_type)
            .bind(&envelope.aggregate_id)
            .bind(&envelope.aggregate_type)
            .bind(envelope.version)
            .bind(envelope.timestamp)
            .bind(Json(&envelope.data))
            .bind(Json(&envelope.metadata))
            .execute(&mut *tx)
            .await;

            match inserted {
                Ok(_) => {}
                // Another writer committed this version after our read
                Err(err) if is_unique_violation(&err) => {
                    tracing::warn!(
                        aggregate_id = %aggregate_id,
                        version = envelope.version,
                        "Version slot already taken"
                    );
                    return Err(conflict());
                }
                Err(err) => return Err(err.into()),
            }
        }

        tx.commit().await.map_err(|err| {
            if is_unique_violation(&err) {
                conflict()
            } else {
                err.into()
            }
        })?;

        tracing::info!(
            aggregate_id = %aggregate_id,
            aggregate_type = %events[0].aggregate_type,
            new_version = expected_version + events.len() as i64,
            event_count = events.len(),
            "Appended events to event store"
        );

        Ok(())
    }

    async fn get_events(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> EsResult<Vec<EventEnvelope>> {
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM events
             WHERE aggregate_type = $1 AND aggregate_id = $2
             ORDER BY version ASC"
        ))
        .bind(aggregate_type)
        .bind(aggregate_id)
        .fetch_all(&self.pool)
        .await?;

        let events = rows.iter().map(row_to_envelope).collect::<EsResult<Vec<_>>>()?;
        tracing::debug!("Loaded {} events for aggregate {}", events.len(), aggregate_id);
        Ok(events)
    }

    async fn get_aggregate_version(
        &self,
        aggregate_type: &str,
        aggregate_id: &str,
    ) -> EsResult<i64> {
        let version: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(version) FROM events WHERE aggregate_type = $1 AND aggregate_id = $2",
        )
        .bind(aggregate_type)
        .bind(aggregate_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(version.unwrap_or(NO_EVENTS_VERSION))
    }

    async fn get_event_stream(
        &self,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> EsResult<Vec<EventEnvelope>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM events
             WHERE $1::timestamptz IS NULL OR timestamp >= $1
             ORDER BY timestamp ASC, event_id ASC
             LIMIT $2"
        ))
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_envelope).collect()
    }
}
