//! Schema-adaptive INSERT and UPDATE construction.
//!
//! Callers hand over a superset of candidate fields; only the candidates
//! whose column exists in the live [`ColumnSet`] (and whose value survives
//! the empty-value filter) become part of the statement. Statement building
//! is separated from execution so filtering and ordering are testable
//! without a store.
//!
//! Table and column names are validated identifiers; every non-null value
//! is a bound parameter. NULLs are emitted as literal tokens so the store
//! never has to infer a type for an untyped null parameter.

use sqlx::PgExecutor;
use tracing::debug;

use registra_core::{ColumnSet, Error, FieldCandidate, FieldValue, Result};

use crate::identifier_validation::validate_sql_identifier;

/// Bind a [`FieldValue`] onto a sqlx query or query_scalar.
///
/// A macro because `Query` and `QueryScalar` are distinct types with no
/// shared bind trait.
macro_rules! bind_field {
    ($query:expr, $value:expr) => {
        match $value {
            FieldValue::Bool(b) => $query.bind(*b),
            FieldValue::Int(i) => $query.bind(*i),
            FieldValue::Float(f) => $query.bind(*f),
            FieldValue::Text(s) => $query.bind(s.clone()),
            FieldValue::Json(j) => $query.bind(j.clone()),
            // Nulls are emitted as SQL tokens and never reach a binding.
            FieldValue::Null => $query.bind(Option::<String>::None),
        }
    };
}
pub(crate) use bind_field;

/// Candidates that will actually be written: column present in the live
/// set, and value non-empty unless the candidate opts into keeping empties.
/// Input order is preserved.
pub fn applicable_candidates<'a>(
    columns: &ColumnSet,
    candidates: &'a [FieldCandidate],
) -> Vec<&'a FieldCandidate> {
    candidates
        .iter()
        .filter(|c| columns.contains(&c.column) && (c.keep_empty || !c.value.is_empty()))
        .collect()
}

/// Build an adaptive INSERT statement and its bound values.
///
/// `key_column` appends a `RETURNING` clause for the generated key. Fails
/// with [`Error::NoApplicableColumns`] when filtering leaves nothing to
/// write — schema drift too severe to proceed.
pub fn build_insert(
    table: &str,
    columns: &ColumnSet,
    candidates: &[FieldCandidate],
    key_column: Option<&str>,
) -> Result<(String, Vec<FieldValue>)> {
    validate_sql_identifier(table)?;

    let picked = applicable_candidates(columns, candidates);
    if picked.is_empty() {
        return Err(Error::NoApplicableColumns(table.to_string()));
    }

    let mut names = Vec::with_capacity(picked.len());
    let mut slots = Vec::with_capacity(picked.len());
    let mut binds = Vec::new();

    for candidate in picked {
        validate_sql_identifier(&candidate.column)?;
        names.push(candidate.column.as_str());
        if matches!(candidate.value, FieldValue::Null) {
            slots.push("NULL".to_string());
        } else {
            binds.push(candidate.value.clone());
            slots.push(format!("${}", binds.len()));
        }
    }

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        names.join(", "),
        slots.join(", ")
    );

    if let Some(key) = key_column {
        validate_sql_identifier(key)?;
        sql.push_str(&format!(" RETURNING {}", key));
    }

    Ok((sql, binds))
}

/// Build an adaptive single-row UPDATE keyed on one column.
pub fn build_update(
    table: &str,
    columns: &ColumnSet,
    candidates: &[FieldCandidate],
    key_column: &str,
) -> Result<(String, Vec<FieldValue>)> {
    validate_sql_identifier(table)?;
    validate_sql_identifier(key_column)?;

    let picked = applicable_candidates(columns, candidates);
    if picked.is_empty() {
        return Err(Error::NoApplicableColumns(table.to_string()));
    }

    let mut assignments = Vec::with_capacity(picked.len());
    let mut binds = Vec::new();

    for candidate in picked {
        validate_sql_identifier(&candidate.column)?;
        if matches!(candidate.value, FieldValue::Null) {
            assignments.push(format!("{} = NULL", candidate.column));
        } else {
            binds.push(candidate.value.clone());
            assignments.push(format!("{} = ${}", candidate.column, binds.len()));
        }
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ${}",
        table,
        assignments.join(", "),
        key_column,
        binds.len() + 1
    );

    Ok((sql, binds))
}

/// Classify a failed write: integrity violations (SQLSTATE class 23) become
/// [`Error::WriteRejected`]; everything else stays a transport error.
fn map_write_error(table: &str, e: sqlx::Error) -> Error {
    if let sqlx::Error::Database(db) = &e {
        if let Some(code) = db.code() {
            if code.starts_with("23") {
                return Error::WriteRejected(format!("{}: {}", table, db.message()));
            }
        }
    }
    Error::Database(e)
}

/// Execute an adaptive INSERT, returning the generated key when requested.
pub async fn insert<'e>(
    executor: impl PgExecutor<'e>,
    table: &str,
    columns: &ColumnSet,
    candidates: &[FieldCandidate],
    key_column: Option<&str>,
) -> Result<Option<i64>> {
    let (sql, binds) = build_insert(table, columns, candidates, key_column)?;

    debug!(
        subsystem = "db",
        component = "adaptive_writer",
        op = "insert",
        table = %table,
        column_count = binds.len(),
        "Executing adaptive insert"
    );

    if key_column.is_some() {
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for value in &binds {
            query = bind_field!(query, value);
        }
        let key = query
            .fetch_one(executor)
            .await
            .map_err(|e| map_write_error(table, e))?;
        Ok(Some(key))
    } else {
        let mut query = sqlx::query(&sql);
        for value in &binds {
            query = bind_field!(query, value);
        }
        query
            .execute(executor)
            .await
            .map_err(|e| map_write_error(table, e))?;
        Ok(None)
    }
}

/// Execute an adaptive single-row UPDATE; returns rows affected.
///
/// Used for backfilling a column after insertion: e.g. writing a
/// just-allocated identifier, or a missing numeric linkage value, back onto
/// an existing row.
pub async fn update_where<'e>(
    executor: impl PgExecutor<'e>,
    table: &str,
    columns: &ColumnSet,
    candidates: &[FieldCandidate],
    key_column: &str,
    key_value: &FieldValue,
) -> Result<u64> {
    let (sql, binds) = build_update(table, columns, candidates, key_column)?;

    let mut query = sqlx::query(&sql);
    for value in &binds {
        query = bind_field!(query, value);
    }
    query = bind_field!(query, key_value);

    let result = query
        .execute(executor)
        .await
        .map_err(|e| map_write_error(table, e))?;

    debug!(
        subsystem = "db",
        component = "adaptive_writer",
        op = "update_where",
        table = %table,
        row_count = result.rows_affected(),
        "Executed adaptive update"
    );

    Ok(result.rows_affected())
}
