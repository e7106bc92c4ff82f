//! Transactional archive-then-delete of live records.
//!
//! Archiving a record is an explicit ordered step list, all inside one
//! transaction per batch:
//!
//! 1. Discover the archive table's live columns (fatal when missing).
//! 2. Probe for an existing archive row; re-archiving is idempotent and
//!    only backfills a missing linkage column.
//! 3. Otherwise snapshot the live row (and its role-profile child row)
//!    into the archive table through the adaptive writer, including a
//!    full-row JSON blob when the archive table has a column for it.
//! 4. Cascade-delete every discovered referencing row, excluding the
//!    archive and log tables.
//! 5. Delete the role-profile row, then the primary row.
//! 6. Commit; any failure anywhere rolls back the entire batch.

use std::collections::HashSet;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info, trace};

use registra_core::{
    ArchiveSummary, ColumnSet, Error, FieldCandidate, FieldValue, RecordArchiver, ReferenceEdge,
    Result,
};

use crate::adaptive_writer::{self, bind_field};
use crate::foreign_keys::PgForeignKeyIndex;
use crate::identifier_validation::validate_sql_identifier;
use crate::schema_catalog::PgSchemaCatalog;

/// Legacy column names a contact number has lived under on the primary row.
const CONTACT_COLUMNS: &[&str] = &["contact_no", "phone", "mobile", "phone_number"];

/// Contact column names checked on the role-profile row.
const PROFILE_CONTACT_COLUMNS: &[&str] = &["contact_number", "contact_no", "phone", "mobile"];

/// Table and column layout the archiver operates on.
///
/// Nothing here fixes the archive table's schema: the snapshot adapts to
/// whatever columns exist. The config only names where to look.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Live table holding the records to archive.
    pub primary_table: String,
    /// Primary key column of the live table.
    pub key_column: String,
    /// Natural-identifier column on the live table (the role identifier).
    pub identifier_column: String,
    /// Archive table receiving snapshots.
    pub archive_table: String,
    /// Numeric linkage column in the archive table.
    pub archive_key_column: String,
    /// Natural-identifier column in the archive table.
    pub archive_identifier_column: String,
    /// Optional full-snapshot JSON column in the archive table.
    pub snapshot_column: String,
    /// Candidate role-profile tables, probed in order.
    pub profile_tables: Vec<String>,
    /// Candidate linkage columns on a profile table, probed in order.
    pub profile_link_columns: Vec<String>,
    /// Referencing tables the cascade must never touch (the primary and
    /// archive tables are always excluded in addition to these).
    pub excluded_tables: Vec<String>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            primary_table: "users".to_string(),
            key_column: "id".to_string(),
            identifier_column: "login_id".to_string(),
            archive_table: "archived_users".to_string(),
            archive_key_column: "user_id".to_string(),
            archive_identifier_column: "login_id".to_string(),
            snapshot_column: "snapshot_json".to_string(),
            profile_tables: vec!["user_profiles".to_string()],
            profile_link_columns: vec!["user_id".to_string(), "uid".to_string()],
            excluded_tables: vec!["activity_log".to_string()],
        }
    }
}

/// A role-profile child row loaded alongside the primary record.
struct ProfileRow {
    table: String,
    link_column: String,
    row: JsonValue,
}

/// Non-blank text (or stringified number) at `key` in a row loaded as JSON.
fn json_text(row: &JsonValue, key: &str) -> Option<String> {
    match row.get(key)? {
        JsonValue::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Display name fallback chain: explicit name, concatenated name parts,
/// username, email, then a synthetic `User <id>`.
fn display_name(row: &JsonValue, user_id: i64) -> String {
    if let Some(name) = json_text(row, "name") {
        return name;
    }
    let parts: Vec<String> = ["first_name", "middle_name", "last_name"]
        .iter()
        .filter_map(|key| json_text(row, key))
        .collect();
    if !parts.is_empty() {
        return parts.join(" ");
    }
    if let Some(username) = json_text(row, "username") {
        return username;
    }
    if let Some(email) = json_text(row, "email") {
        return email;
    }
    format!("User {}", user_id)
}

/// Contact number fallback chain across legacy column names, primary row
/// first, then the profile row.
fn contact_number(row: &JsonValue, profile: Option<&JsonValue>) -> Option<String> {
    for key in CONTACT_COLUMNS {
        if let Some(value) = json_text(row, key) {
            return Some(value);
        }
    }
    if let Some(profile) = profile {
        for key in PROFILE_CONTACT_COLUMNS {
            if let Some(value) = json_text(profile, key) {
                return Some(value);
            }
        }
    }
    None
}

/// Edges the cascade may act on: the index itself never filters, so the
/// exclusion of the target, archive, and log tables happens here.
fn filter_edges<'a>(
    edges: &'a [ReferenceEdge],
    excluded: &HashSet<&str>,
) -> Vec<&'a ReferenceEdge> {
    edges
        .iter()
        .filter(|edge| !excluded.contains(edge.table.as_str()))
        .collect()
}

/// Value of the column an edge references, taken from the loaded row.
fn edge_value(row: &JsonValue, edge: &ReferenceEdge) -> Option<FieldValue> {
    let value = FieldValue::from_json(row.get(&edge.referenced_column)?);
    (!matches!(value, FieldValue::Null)).then_some(value)
}

/// Load one row as a JSON object, staying agnostic of the table's shape.
///
/// The row is locked for the rest of the transaction; concurrent archives
/// of the same record serialize here, and the loser sees the row gone.
async fn load_row(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    key_column: &str,
    key: i64,
) -> Result<Option<JsonValue>> {
    validate_sql_identifier(table)?;
    validate_sql_identifier(key_column)?;

    let sql = format!(
        "SELECT to_jsonb(t) FROM {} t WHERE {} = $1 LIMIT 1 FOR UPDATE",
        table, key_column
    );
    sqlx::query_scalar(&sql)
        .bind(key)
        .fetch_optional(&mut **tx)
        .await
        .map_err(Error::Database)
}

async fn delete_where(
    tx: &mut Transaction<'_, Postgres>,
    table: &str,
    column: &str,
    value: &FieldValue,
) -> Result<u64> {
    validate_sql_identifier(table)?;
    validate_sql_identifier(column)?;

    let sql = format!("DELETE FROM {} WHERE {} = $1", table, column);
    let mut query = sqlx::query(&sql);
    query = bind_field!(query, value);

    let result = query.execute(&mut **tx).await.map_err(Error::Database)?;
    Ok(result.rows_affected())
}

/// Archive-then-delete orchestration against PostgreSQL.
pub struct PgRecordArchiver {
    pool: PgPool,
    config: ArchiveConfig,
}

impl PgRecordArchiver {
    /// Archiver over the default school-records layout.
    pub fn new(pool: PgPool) -> Self {
        Self::with_config(pool, ArchiveConfig::default())
    }

    pub fn with_config(pool: PgPool, config: ArchiveConfig) -> Self {
        Self { pool, config }
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// First configured profile table that exists and holds a row for this
    /// record, using whichever of its linkage columns is present.
    async fn load_profile(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: i64,
    ) -> Result<Option<ProfileRow>> {
        let link_candidates: Vec<&str> = self
            .config
            .profile_link_columns
            .iter()
            .map(String::as_str)
            .collect();

        for table in &self.config.profile_tables {
            let columns = match PgSchemaCatalog::columns_of_tx(tx, table).await {
                Ok(columns) => columns,
                Err(Error::SchemaUnavailable(_)) => {
                    debug!(
                        subsystem = "db",
                        component = "archiver",
                        op = "load_profile",
                        table = %table,
                        "Profile table absent, probing next"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };

            let Some(link_column) = columns.first_present(&link_candidates) else {
                continue;
            };

            if let Some(row) = load_row(tx, table, link_column, user_id).await? {
                return Ok(Some(ProfileRow {
                    table: table.clone(),
                    link_column: link_column.to_string(),
                    row,
                }));
            }
        }
        Ok(None)
    }

    /// Existing archive row for this record, probed by the natural
    /// identifier first and the numeric linkage column second.
    async fn find_archived(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        archive_columns: &ColumnSet,
        identifier: Option<&str>,
        user_id: i64,
    ) -> Result<Option<JsonValue>> {
        let cfg = &self.config;

        if let Some(identifier) = identifier {
            if archive_columns.contains(&cfg.archive_identifier_column) {
                validate_sql_identifier(&cfg.archive_table)?;
                validate_sql_identifier(&cfg.archive_identifier_column)?;
                let sql = format!(
                    "SELECT to_jsonb(t) FROM {} t WHERE {} = $1 LIMIT 1",
                    cfg.archive_table, cfg.archive_identifier_column
                );
                let row: Option<JsonValue> = sqlx::query_scalar(&sql)
                    .bind(identifier)
                    .fetch_optional(&mut **tx)
                    .await
                    .map_err(Error::Database)?;
                if row.is_some() {
                    return Ok(row);
                }
            }
        }

        if archive_columns.contains(&cfg.archive_key_column) {
            validate_sql_identifier(&cfg.archive_table)?;
            validate_sql_identifier(&cfg.archive_key_column)?;
            let sql = format!(
                "SELECT to_jsonb(t) FROM {} t WHERE {} = $1 LIMIT 1",
                cfg.archive_table, cfg.archive_key_column
            );
            return sqlx::query_scalar(&sql)
                .bind(user_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(Error::Database);
        }

        Ok(None)
    }

    /// Backfill the numeric linkage column on an archive row that predates
    /// it (the id was unknown or the column did not exist at archive time).
    async fn backfill_linkage(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        archive_columns: &ColumnSet,
        existing: &JsonValue,
        identifier: Option<&str>,
        user_id: i64,
    ) -> Result<()> {
        let cfg = &self.config;
        if !archive_columns.contains(&cfg.archive_key_column) {
            return Ok(());
        }
        let missing = existing
            .get(&cfg.archive_key_column)
            .map(JsonValue::is_null)
            .unwrap_or(true);
        if !missing {
            return Ok(());
        }
        let Some(identifier) = identifier else {
            return Ok(());
        };

        adaptive_writer::update_where(
            &mut **tx,
            &cfg.archive_table,
            archive_columns,
            &[FieldCandidate::new(&cfg.archive_key_column, user_id)],
            &cfg.archive_identifier_column,
            &FieldValue::Text(identifier.to_string()),
        )
        .await?;

        debug!(
            subsystem = "db",
            component = "archiver",
            op = "backfill_linkage",
            user_id,
            "Backfilled linkage column on existing archive row"
        );
        Ok(())
    }

    /// Write the archive snapshot through the adaptive writer, using only
    /// the candidate fields whose columns exist on the archive table.
    #[allow(clippy::too_many_arguments)]
    async fn write_snapshot(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        archive_columns: &ColumnSet,
        row: &JsonValue,
        profile: Option<&ProfileRow>,
        user_id: i64,
        name: &str,
        identifier: Option<&str>,
        reason: &str,
    ) -> Result<()> {
        let cfg = &self.config;
        let profile_row = profile.map(|p| &p.row);

        let mut candidates = vec![
            FieldCandidate::new(&cfg.archive_key_column, user_id),
            FieldCandidate::new(
                &cfg.archive_identifier_column,
                identifier.map(str::to_string),
            ),
            FieldCandidate::new("name", name),
            FieldCandidate::nullable("email", json_text(row, "email")),
            FieldCandidate::new("contact_no", contact_number(row, profile_row)),
            FieldCandidate::new("role", json_text(row, "role")),
            FieldCandidate::new("reason", reason),
        ];

        // Discrete columns capture the common fields; the JSON blob keeps
        // everything for forensic recovery when the table has room for it.
        if archive_columns.contains(&cfg.snapshot_column) {
            let snapshot = json!({
                "record": row,
                "profile": profile_row,
            });
            candidates.push(FieldCandidate::new(&cfg.snapshot_column, snapshot));
        }

        adaptive_writer::insert(
            &mut **tx,
            &cfg.archive_table,
            archive_columns,
            &candidates,
            None,
        )
        .await?;
        Ok(())
    }

    /// Delete every row behind the given edges whose referenced value is
    /// present on the loaded record.
    async fn delete_edges(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        edges: &[ReferenceEdge],
        excluded: &HashSet<&str>,
        row: &JsonValue,
    ) -> Result<u64> {
        let mut total = 0u64;
        for edge in filter_edges(edges, excluded) {
            let Some(value) = edge_value(row, edge) else {
                debug!(
                    subsystem = "db",
                    component = "archiver",
                    op = "cascade",
                    table = %edge.table,
                    column = %edge.referenced_column,
                    "Referenced value absent from record, edge skipped"
                );
                continue;
            };
            let deleted = delete_where(tx, &edge.table, &edge.column, &value).await?;
            trace!(
                subsystem = "db",
                component = "archiver",
                op = "cascade",
                table = %edge.table,
                column = %edge.column,
                row_count = deleted,
                "Cascade delete"
            );
            total += deleted;
        }
        Ok(total)
    }

    /// Metadata-driven cascade over the primary table and, when a profile
    /// row exists, the profile table. Grandchild rows referencing the
    /// profile go first so the profile rows themselves can be removed.
    async fn cascade_delete(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        row: &JsonValue,
        profile: Option<&ProfileRow>,
    ) -> Result<u64> {
        let cfg = &self.config;
        let mut excluded: HashSet<&str> =
            cfg.excluded_tables.iter().map(String::as_str).collect();
        excluded.insert(cfg.primary_table.as_str());
        excluded.insert(cfg.archive_table.as_str());
        // Profile rows are deleted explicitly after the cascade, keyed by
        // their linkage column; they are never cascade targets and never
        // count toward the cascade total.
        for table in &cfg.profile_tables {
            excluded.insert(table.as_str());
        }

        let mut deleted = 0u64;

        if let Some(profile) = profile {
            let edges = PgForeignKeyIndex::referencing_tables_tx(tx, &profile.table).await?;
            debug!(
                subsystem = "db",
                component = "archiver",
                op = "cascade",
                table = %profile.table,
                edge_count = edges.len(),
                "Discovered profile reference edges"
            );
            deleted += self.delete_edges(tx, &edges, &excluded, &profile.row).await?;
        }

        let edges = PgForeignKeyIndex::referencing_tables_tx(tx, &cfg.primary_table).await?;
        debug!(
            subsystem = "db",
            component = "archiver",
            op = "cascade",
            table = %cfg.primary_table,
            edge_count = edges.len(),
            "Discovered primary reference edges"
        );
        deleted += self.delete_edges(tx, &edges, &excluded, row).await?;

        Ok(deleted)
    }

    /// Steps 2 through 5 for one record, inside the batch transaction.
    async fn archive_one(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        archive_columns: &ColumnSet,
        user_id: i64,
        reason: &str,
    ) -> Result<ArchiveSummary> {
        let cfg = &self.config;

        let Some(row) = load_row(tx, &cfg.primary_table, &cfg.key_column, user_id).await? else {
            // Live row already gone. If the archive holds it, this request
            // is a replay of a completed archive and succeeds as a no-op;
            // otherwise the id never existed.
            if let Some(existing) = self
                .find_archived(tx, archive_columns, None, user_id)
                .await?
            {
                return Ok(ArchiveSummary {
                    user_id,
                    display_name: json_text(&existing, "name")
                        .unwrap_or_else(|| format!("User {}", user_id)),
                    already_archived: true,
                    cascade_rows_deleted: 0,
                });
            }
            return Err(Error::RecordNotFound(user_id));
        };
        let profile = self.load_profile(tx, user_id).await?;

        let identifier = json_text(&row, &cfg.identifier_column);
        let name = display_name(&row, user_id);

        let existing = self
            .find_archived(tx, archive_columns, identifier.as_deref(), user_id)
            .await?;
        let already_archived = existing.is_some();

        if let Some(existing) = existing {
            self.backfill_linkage(
                tx,
                archive_columns,
                &existing,
                identifier.as_deref(),
                user_id,
            )
            .await?;
        } else {
            self.write_snapshot(
                tx,
                archive_columns,
                &row,
                profile.as_ref(),
                user_id,
                &name,
                identifier.as_deref(),
                reason,
            )
            .await?;
        }

        let cascade_rows_deleted = self.cascade_delete(tx, &row, profile.as_ref()).await?;

        if let Some(profile) = &profile {
            delete_where(
                tx,
                &profile.table,
                &profile.link_column,
                &FieldValue::Int(user_id),
            )
            .await?;
        }
        delete_where(tx, &cfg.primary_table, &cfg.key_column, &FieldValue::Int(user_id)).await?;

        info!(
            subsystem = "db",
            component = "archiver",
            op = "archive",
            user_id,
            already_archived,
            row_count = cascade_rows_deleted,
            "Record archived"
        );

        Ok(ArchiveSummary {
            user_id,
            display_name: name,
            already_archived,
            cascade_rows_deleted,
        })
    }
}

#[async_trait]
impl RecordArchiver for PgRecordArchiver {
    async fn archive(&self, user_ids: &[i64], reason: &str) -> Result<Vec<ArchiveSummary>> {
        let start = Instant::now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Columns discovered once per batch. A missing archive table is
        // fatal: archiving is a precondition for deleting live data.
        let archive_columns =
            match PgSchemaCatalog::columns_of_tx(&mut tx, &self.config.archive_table).await {
                Ok(columns) => columns,
                Err(Error::SchemaUnavailable(table)) => {
                    return Err(Error::ArchiveUnavailable(table))
                }
                Err(e) => return Err(e),
            };

        let mut summaries = Vec::with_capacity(user_ids.len());
        for &user_id in user_ids {
            // Any failure drops the transaction and rolls back the batch.
            let summary = self
                .archive_one(&mut tx, &archive_columns, user_id, reason)
                .await?;
            summaries.push(summary);
        }

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "archiver",
            op = "archive_batch",
            record_count = summaries.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Archive batch committed"
        );
        crate::pool::log_pool_metrics(&self.pool);

        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_name_prefers_explicit_name() {
        let row = json!({"name": "Ana Cruz", "first_name": "Ana"});
        assert_eq!(display_name(&row, 1), "Ana Cruz");
    }

    #[test]
    fn test_display_name_concatenates_parts() {
        let row = json!({"name": null, "first_name": "Ana", "middle_name": "B", "last_name": "Cruz"});
        assert_eq!(display_name(&row, 1), "Ana B Cruz");
    }

    #[test]
    fn test_display_name_single_part() {
        // email=null, name=null, first_name="Lee" synthesizes "Lee".
        let row = json!({"name": null, "email": null, "first_name": "Lee"});
        assert_eq!(display_name(&row, 42), "Lee");
    }

    #[test]
    fn test_display_name_falls_back_to_username_then_email() {
        let row = json!({"username": "acruz", "email": "ana@example.com"});
        assert_eq!(display_name(&row, 1), "acruz");

        let row = json!({"email": "ana@example.com"});
        assert_eq!(display_name(&row, 1), "ana@example.com");
    }

    #[test]
    fn test_display_name_synthesizes_from_id() {
        let row = json!({"name": "", "email": null});
        assert_eq!(display_name(&row, 42), "User 42");
    }

    #[test]
    fn test_contact_number_prefers_primary_row() {
        let row = json!({"phone": "555-0100"});
        let profile = json!({"contact_number": "555-0199"});
        assert_eq!(
            contact_number(&row, Some(&profile)),
            Some("555-0100".to_string())
        );
    }

    #[test]
    fn test_contact_number_falls_back_to_profile() {
        let row = json!({"phone": null});
        let profile = json!({"contact_number": "555-0199"});
        assert_eq!(
            contact_number(&row, Some(&profile)),
            Some("555-0199".to_string())
        );
        assert_eq!(contact_number(&row, None), None);
    }

    #[test]
    fn test_filter_edges_excludes_tables() {
        let edges = vec![
            ReferenceEdge {
                table: "user_sessions".to_string(),
                column: "user_id".to_string(),
                referenced_column: "id".to_string(),
            },
            ReferenceEdge {
                table: "archived_users".to_string(),
                column: "user_id".to_string(),
                referenced_column: "id".to_string(),
            },
            ReferenceEdge {
                table: "activity_log".to_string(),
                column: "user_id".to_string(),
                referenced_column: "id".to_string(),
            },
        ];
        let excluded: HashSet<&str> = ["archived_users", "activity_log"].into_iter().collect();

        let kept = filter_edges(&edges, &excluded);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].table, "user_sessions");
    }

    #[test]
    fn test_edge_value_reads_referenced_column() {
        let row = json!({"id": 42, "login_id": "TR-250004"});
        let edge = ReferenceEdge {
            table: "user_sessions".to_string(),
            column: "user_id".to_string(),
            referenced_column: "id".to_string(),
        };
        assert_eq!(edge_value(&row, &edge), Some(FieldValue::Int(42)));
    }

    #[test]
    fn test_edge_value_none_when_absent_or_null() {
        let row = json!({"id": null});
        let edge = ReferenceEdge {
            table: "user_sessions".to_string(),
            column: "user_id".to_string(),
            referenced_column: "id".to_string(),
        };
        assert_eq!(edge_value(&row, &edge), None);

        let edge_missing = ReferenceEdge {
            referenced_column: "uuid".to_string(),
            ..edge
        };
        assert_eq!(edge_value(&row, &edge_missing), None);
    }

    #[test]
    fn test_json_text_trims_and_rejects_blank() {
        let row = json!({"a": "  x  ", "b": "   ", "c": 7});
        assert_eq!(json_text(&row, "a"), Some("x".to_string()));
        assert_eq!(json_text(&row, "b"), None);
        assert_eq!(json_text(&row, "c"), Some("7".to_string()));
        assert_eq!(json_text(&row, "missing"), None);
    }

    #[test]
    fn test_default_config_excludes_log_table() {
        let config = ArchiveConfig::default();
        assert_eq!(config.primary_table, "users");
        assert!(config
            .excluded_tables
            .contains(&"activity_log".to_string()));
    }
}
