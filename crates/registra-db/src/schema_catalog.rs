//! PostgreSQL implementation of [`SchemaCatalog`].
//!
//! Column discovery runs against `information_schema.columns` scoped to the
//! connection's current schema. Nothing is cached: every logical operation
//! re-fetches the column set it needs, since the schema can change between
//! deployments.

use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool, Postgres, Transaction};
use tracing::debug;

use registra_core::{ColumnSet, Error, Result, SchemaCatalog};

use crate::identifier_validation::validate_sql_identifier;

/// Read-only column introspection backed by `information_schema`.
pub struct PgSchemaCatalog {
    pool: PgPool,
}

impl PgSchemaCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Column set of `table`, fetched inside an already-open transaction.
    ///
    /// The archiver runs its whole batch in one transaction and discovers
    /// the archive table's shape through this entry point.
    pub async fn columns_of_tx(
        tx: &mut Transaction<'_, Postgres>,
        table: &str,
    ) -> Result<ColumnSet> {
        Self::fetch(&mut **tx, table).await
    }

    async fn fetch<'e>(executor: impl PgExecutor<'e>, table: &str) -> Result<ColumnSet> {
        validate_sql_identifier(table)?;

        let columns: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT column_name::text
            FROM information_schema.columns
            WHERE table_schema = current_schema()
                AND table_name = $1
            ORDER BY ordinal_position
            "#,
        )
        .bind(table)
        .fetch_all(executor)
        .await
        .map_err(Error::Database)?;

        if columns.is_empty() {
            return Err(Error::SchemaUnavailable(table.to_string()));
        }

        Ok(ColumnSet::new(table, columns))
    }
}

#[async_trait]
impl SchemaCatalog for PgSchemaCatalog {
    async fn columns_of(&self, table: &str) -> Result<ColumnSet> {
        Self::fetch(&self.pool, table).await
    }

    async fn probe(&self, tables: &[&str]) -> Result<Option<ColumnSet>> {
        for table in tables {
            match self.columns_of(table).await {
                Ok(columns) => return Ok(Some(columns)),
                Err(Error::SchemaUnavailable(_)) => {
                    debug!(
                        subsystem = "db",
                        component = "schema_catalog",
                        op = "probe",
                        table = %table,
                        "Candidate table absent, probing next"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }
}
