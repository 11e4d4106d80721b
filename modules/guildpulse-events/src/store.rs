//! EventStore: read-only gateway onto the `actions` log in Postgres.
//!
//! Executes prepared aggregation specs with bound parameters and decodes the
//! two row shapes. No retries; every failure surfaces to the caller.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgConnectOptions, PgConnection, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres, Row};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::types::{QueryParam, QuerySpec, RawRow, RowShape};

// ---------------------------------------------------------------------------
// Pool settings
// ---------------------------------------------------------------------------

/// Sizing for the shared connection pool.
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Open the first connection immediately instead of on first query.
    pub eager: bool,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(10),
            eager: false,
        }
    }
}

// ---------------------------------------------------------------------------
// EventStore
// ---------------------------------------------------------------------------

/// Gateway to the event log. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct EventStore {
    pool: PgPool,
}

impl EventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Build a pool from connection options and wrap it.
    pub async fn connect(options: PgConnectOptions, settings: &PoolSettings) -> Result<Self> {
        let pool_options = PgPoolOptions::new()
            .max_connections(settings.max_connections)
            .acquire_timeout(settings.acquire_timeout);

        let pool = if settings.eager {
            pool_options.connect_with(options).await?
        } else {
            pool_options.connect_lazy_with(options)
        };

        Ok(Self::new(pool))
    }

    /// Run `spec` and decode every row into the shape it declares.
    ///
    /// The query runs on a connection whose backend pid is known up front. If
    /// `cancel` fires first, the server-side statement is cancelled with
    /// `pg_cancel_backend` and the connection is discarded instead of going
    /// back to the pool mid-protocol.
    pub async fn execute(&self, spec: &QuerySpec, cancel: &CancellationToken) -> Result<Vec<RawRow>> {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        let mut conn = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StoreError::Cancelled),
            conn = self.pool.acquire() => conn?,
        };
        let pid: i32 = sqlx::query_scalar("SELECT pg_backend_pid()")
            .fetch_one(&mut *conn)
            .await?;

        debug!(shape = ?spec.shape(), params = spec.params().len(), pid, "Executing aggregation");

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = fetch(&mut *conn, spec) => Some(result),
        };

        match outcome {
            Some(result) => result,
            None => {
                warn!(shape = ?spec.shape(), pid, "Aggregation cancelled mid-flight");
                let abandoned = conn.detach();
                self.cancel_backend(pid).await;
                drop(abandoned);
                Err(StoreError::Cancelled)
            }
        }
    }

    async fn cancel_backend(&self, pid: i32) {
        let cancelled = sqlx::query_scalar::<_, bool>("SELECT pg_cancel_backend($1)")
            .bind(pid)
            .fetch_one(&self.pool)
            .await;
        match cancelled {
            Ok(true) => debug!(pid, "Server-side statement cancelled"),
            Ok(false) => debug!(pid, "Backend had no statement to cancel"),
            Err(e) => warn!(pid, error = %e, "Failed to cancel server-side statement"),
        }
    }

    /// Round-trip a trivial statement to prove the pool can reach the database.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

async fn fetch(conn: &mut PgConnection, spec: &QuerySpec) -> Result<Vec<RawRow>> {
    let rows = bind_all(sqlx::query(spec.statement()), spec.params())
        .fetch_all(conn)
        .await?;

    rows.iter().map(|row| decode_row(row, spec.shape())).collect()
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[QueryParam],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            QueryParam::Text(value) => query.bind(value.clone()),
            QueryParam::SmallInt(value) => query.bind(*value),
            QueryParam::Timestamp(value) => query.bind(*value),
        };
    }
    query
}

fn decode_row(row: &PgRow, shape: RowShape) -> Result<RawRow> {
    let count: i64 = row.try_get(1)?;
    match shape {
        RowShape::Raw => {
            let timestamp: DateTime<Utc> = row.try_get(0)?;
            Ok(RawRow::Snapshot { timestamp, count })
        }
        RowShape::MinuteBucketed => {
            let label: String = row.try_get(0)?;
            Ok(RawRow::Bucketed { label, count })
        }
    }
}

// ---------------------------------------------------------------------------
// Test utilities
// ---------------------------------------------------------------------------

#[cfg(feature = "test-utils")]
impl EventStore {
    /// Create the `actions` table if missing. Serialized with an advisory
    /// lock so parallel tests don't race on the catalog.
    pub async fn ensure_schema(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock(740021)")
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS actions (
                id        BIGSERIAL    PRIMARY KEY,
                guild_id  TEXT         NOT NULL,
                action    SMALLINT     NOT NULL,
                ts        TIMESTAMPTZ  NOT NULL,
                value     BIGINT       NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// Remove every action logged for one guild.
    pub async fn clear_guild(&self, guild_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM actions WHERE guild_id = $1")
            .bind(guild_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Append one action row. The gateway itself never writes; tests seed with this.
    pub async fn append_action(
        &self,
        guild_id: &str,
        action: crate::types::ActionKind,
        ts: DateTime<Utc>,
        value: i64,
    ) -> Result<()> {
        sqlx::query("INSERT INTO actions (guild_id, action, ts, value) VALUES ($1, $2, $3, $4)")
            .bind(guild_id)
            .bind(action.code())
            .bind(ts)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
