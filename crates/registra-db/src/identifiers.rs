//! PostgreSQL implementation of [`IdentifierAllocator`].
//!
//! Allocation is max-then-increment: each sequence source is asked for its
//! lexicographically largest identifier matching `<prefix>-<epoch>%`, the
//! numeric suffixes are merged by maximum, and the next identifier is
//! `max + 1`. There is no locking read here: concurrent allocation of the
//! same prefix/epoch can compute the same sequence, and a store-level unique
//! constraint on the identifier column is what turns that race into a
//! `WriteRejected` the caller can retry.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::debug;

use registra_core::{identifier, Error, IdentifierAllocator, Result, SequenceSource};

use crate::escape_like;
use crate::identifier_validation::validate_sql_identifier;

/// Sequential identifier allocation across candidate sources.
pub struct PgIdentifierAllocator {
    pool: PgPool,
}

impl PgIdentifierAllocator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Mint the next identifier inside an already-open transaction.
    pub async fn next_id_tx(
        tx: &mut Transaction<'_, Postgres>,
        prefix: &str,
        epoch: u8,
        sources: &[SequenceSource],
    ) -> Result<String> {
        allocate(&mut **tx, prefix, epoch, sources).await
    }
}

/// Whether a (table, column) source exists on this deployment.
///
/// Sources are probed before querying: a failed SELECT would abort any
/// enclosing transaction, so absence has to be established without error.
async fn source_exists(conn: &mut PgConnection, source: &SequenceSource) -> Result<bool> {
    let found: Option<i32> = sqlx::query_scalar(
        r#"
        SELECT 1
        FROM information_schema.columns
        WHERE table_schema = current_schema()
            AND table_name = $1
            AND column_name = $2
        "#,
    )
    .bind(&source.table)
    .bind(&source.column)
    .fetch_optional(&mut *conn)
    .await
    .map_err(Error::Database)?;

    Ok(found.is_some())
}

async fn allocate(
    conn: &mut PgConnection,
    prefix: &str,
    epoch: u8,
    sources: &[SequenceSource],
) -> Result<String> {
    let pattern = format!("{}-{:02}%", escape_like(prefix), epoch);
    let mut maxima = Vec::with_capacity(sources.len());

    for source in sources {
        validate_sql_identifier(&source.table)?;
        validate_sql_identifier(&source.column)?;

        if !source_exists(&mut *conn, source).await? {
            debug!(
                subsystem = "db",
                component = "identifiers",
                op = "next_id",
                table = %source.table,
                column = %source.column,
                "Sequence source absent, skipped"
            );
            continue;
        }

        let sql = format!(
            "SELECT {col}::text FROM {table} WHERE {col} LIKE $1 ORDER BY {col} DESC LIMIT 1",
            col = source.column,
            table = source.table,
        );

        let raw: Option<Option<String>> = sqlx::query_scalar(&sql)
            .bind(&pattern)
            .fetch_optional(&mut *conn)
            .await
            .map_err(Error::Database)?;

        if let Some(Some(raw)) = raw {
            if let Some(sequence) = identifier::parse_sequence(prefix, epoch, &raw) {
                maxima.push(sequence);
            }
        }
    }

    let sequence = identifier::next_sequence(maxima);
    let id = identifier::render(prefix, epoch, sequence);

    debug!(
        subsystem = "db",
        component = "identifiers",
        op = "next_id",
        identifier = %id,
        source_count = sources.len(),
        "Allocated identifier"
    );

    Ok(id)
}

#[async_trait]
impl IdentifierAllocator for PgIdentifierAllocator {
    async fn next_id(&self, prefix: &str, epoch: u8, sources: &[SequenceSource]) -> Result<String> {
        let mut conn = self.pool.acquire().await.map_err(Error::Database)?;
        allocate(&mut conn, prefix, epoch, sources).await
    }
}
