//! Data model for schema-adaptive provisioning and archival.
//!
//! Everything here is transient: computed per operation from the live
//! relational store and dropped when the operation returns. Nothing is
//! cached across requests, since the schema can change between deployments.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// The set of column names that actually exist on one table.
///
/// Fetched on demand via introspection and held for the duration of a single
/// logical operation. Column order follows the table's ordinal positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSet {
    table: String,
    columns: Vec<String>,
}

impl ColumnSet {
    pub fn new(
        table: impl Into<String>,
        columns: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// The table this set was introspected from.
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// First of the given column names present on the table, if any.
    ///
    /// Call sites use this to resolve legacy column aliases (a contact
    /// number that has lived under several names across deployments).
    pub fn first_present<'a>(&self, candidates: &[&'a str]) -> Option<&'a str> {
        candidates.iter().copied().find(|c| self.contains(c))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// A value bound into an adaptive INSERT or UPDATE.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Json(JsonValue),
}

impl FieldValue {
    /// Whether this value counts as "empty" for candidate filtering:
    /// NULL, or text that is blank after trimming.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Convert a JSON scalar loaded from the store into a bindable value.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => FieldValue::Null,
            JsonValue::Bool(b) => FieldValue::Bool(*b),
            JsonValue::Number(n) => n
                .as_i64()
                .map(FieldValue::Int)
                .or_else(|| n.as_f64().map(FieldValue::Float))
                .unwrap_or(FieldValue::Null),
            JsonValue::String(s) => FieldValue::Text(s.clone()),
            other => FieldValue::Json(other.clone()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Int(i)
    }
}

impl From<i32> for FieldValue {
    fn from(i: i32) -> Self {
        FieldValue::Int(i as i64)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Bool(b)
    }
}

impl From<JsonValue> for FieldValue {
    fn from(v: JsonValue) -> Self {
        FieldValue::Json(v)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FieldValue::Null)
    }
}

/// A column a caller wants to write; whether it actually lands in the
/// statement depends on the live [`ColumnSet`] and on the value itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCandidate {
    pub column: String,
    pub value: FieldValue,
    /// Include the column even when the value is null/blank. Most string
    /// fields are only written when non-empty; a few (an optional middle
    /// name, a nullable email) are written regardless.
    pub keep_empty: bool,
}

impl FieldCandidate {
    /// Candidate written only when its value is non-empty.
    pub fn new(column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
            keep_empty: false,
        }
    }

    /// Candidate written even when its value is null or blank.
    pub fn nullable(column: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
            keep_empty: true,
        }
    }
}

/// A (table, column) pair that may hold previously issued identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceSource {
    pub table: String,
    pub column: String,
}

impl SequenceSource {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

/// A discovered foreign-key relationship pointing at a target table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceEdge {
    /// Table holding the foreign key.
    pub table: String,
    /// Column in the referencing table.
    pub column: String,
    /// Column on the target table the key points at.
    pub referenced_column: String,
}

/// Request to provision one record with a freshly minted role identifier.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    /// Target table for the insert.
    pub table: String,
    /// Generated-key column returned from the insert (usually `id`).
    pub key_column: String,
    /// Column receiving the minted identifier, when the table has it.
    pub identifier_column: String,
    /// Identifier prefix, e.g. `PR` for principals.
    pub prefix: String,
    /// Two-digit epoch override; defaults to the current year.
    pub epoch: Option<u8>,
    /// Tables/columns scanned for previously issued identifiers.
    pub sources: Vec<SequenceSource>,
    /// Candidate fields, in the order they should appear in the statement.
    pub fields: Vec<FieldCandidate>,
}

/// Successful provisioning result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionOutcome {
    /// Store-generated primary key of the inserted row.
    pub key: i64,
    /// Minted role identifier, e.g. `PR-250001`.
    pub identifier: String,
}

/// A record skipped during batch provisioning, with the conflict reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub index: usize,
    pub reason: String,
}

/// Result of provisioning a batch of independent records.
///
/// Batch provisioning is deliberately partial: rejected writes are reported
/// as skips while the rest of the batch proceeds. Archival is the opposite
/// (all-or-nothing in one transaction).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchProvisionOutcome {
    pub provisioned: Vec<ProvisionOutcome>,
    pub skipped: Vec<SkippedRecord>,
}

/// Per-record result of a committed archive batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveSummary {
    pub user_id: i64,
    /// Synthesized display name written to the archive row.
    pub display_name: String,
    /// True when an archive row already existed and only the linkage
    /// column was backfilled.
    pub already_archived: bool,
    /// Rows removed from discovered referencing tables.
    pub cascade_rows_deleted: u64,
}
