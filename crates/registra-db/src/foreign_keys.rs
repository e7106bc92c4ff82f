//! PostgreSQL implementation of [`ForeignKeyIndex`].
//!
//! Cascade targets are discovered from `pg_constraint` rather than from a
//! hand-maintained list of referencing tables, so newly added dependent
//! tables never leave orphaned rows behind an archive operation.

use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool, Postgres, Row, Transaction};
use tracing::warn;

use registra_core::{Error, ForeignKeyIndex, ReferenceEdge, Result};

use crate::identifier_validation::validate_sql_identifier;

/// Foreign-key metadata discovery backed by `pg_constraint`.
pub struct PgForeignKeyIndex {
    pool: PgPool,
}

impl PgForeignKeyIndex {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Edges referencing `target_table`, fetched inside an open transaction.
    ///
    /// Unlike the pool-backed trait method, a failed metadata query here is
    /// propagated: the failure has already aborted the transaction, and the
    /// caller's rollback should carry the root cause.
    pub async fn referencing_tables_tx(
        tx: &mut Transaction<'_, Postgres>,
        target_table: &str,
    ) -> Result<Vec<ReferenceEdge>> {
        Self::fetch(&mut **tx, target_table).await
    }

    async fn fetch<'e>(
        executor: impl PgExecutor<'e>,
        target_table: &str,
    ) -> Result<Vec<ReferenceEdge>> {
        validate_sql_identifier(target_table)?;

        // One row per (constraint, column pair); composite keys yield one
        // edge per column. unnest WITH ORDINALITY keeps conkey/confkey
        // positions aligned.
        let rows = sqlx::query(
            r#"
            SELECT
                src.relname::text AS referencing_table,
                sa.attname::text AS referencing_column,
                ra.attname::text AS referenced_column
            FROM pg_constraint c
            JOIN pg_class src ON c.conrelid = src.oid
            JOIN pg_namespace sn ON src.relnamespace = sn.oid
            JOIN pg_class ref ON c.confrelid = ref.oid
            JOIN pg_namespace rn ON ref.relnamespace = rn.oid
            CROSS JOIN LATERAL (
                SELECT *
                FROM unnest(c.conkey, c.confkey)
                    WITH ORDINALITY AS t(src_num, ref_num, ord)
            ) u
            JOIN pg_attribute sa
                ON sa.attrelid = c.conrelid AND sa.attnum = u.src_num
            JOIN pg_attribute ra
                ON ra.attrelid = c.confrelid AND ra.attnum = u.ref_num
            WHERE c.contype = 'f'
                AND sn.nspname = current_schema()
                AND rn.nspname = current_schema()
                AND ref.relname = $1
            ORDER BY src.relname, c.conname, u.ord
            "#,
        )
        .bind(target_table)
        .fetch_all(executor)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| ReferenceEdge {
                table: row.get("referencing_table"),
                column: row.get("referencing_column"),
                referenced_column: row.get("referenced_column"),
            })
            .collect())
    }
}

#[async_trait]
impl ForeignKeyIndex for PgForeignKeyIndex {
    async fn referencing_tables(&self, target_table: &str) -> Result<Vec<ReferenceEdge>> {
        // Missing or unreadable metadata means "no discoverable references",
        // never a failed operation. On this standalone path no transaction
        // is at stake, so degrading is safe.
        match Self::fetch(&self.pool, target_table).await {
            Ok(edges) => Ok(edges),
            Err(Error::InvalidInput(msg)) => Err(Error::InvalidInput(msg)),
            Err(e) => {
                warn!(
                    subsystem = "db",
                    component = "foreign_keys",
                    op = "referencing_tables",
                    table = %target_table,
                    error = %e,
                    "Foreign key metadata unavailable, treating as no references"
                );
                Ok(Vec::new())
            }
        }
    }
}
