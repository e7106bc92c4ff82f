//! Core traits for the records engine abstractions.
//!
//! These traits define the interfaces that concrete store implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::*;

/// Runtime discovery of table shapes.
///
/// Implementations issue read-only metadata queries; nothing is cached
/// beyond the returned [`ColumnSet`].
#[async_trait]
pub trait SchemaCatalog: Send + Sync {
    /// Column names of `table`, or [`crate::Error::SchemaUnavailable`] when
    /// the table does not exist on this deployment.
    async fn columns_of(&self, table: &str) -> Result<ColumnSet>;

    /// First of several candidate table names that exists, if any.
    ///
    /// Probing is how call sites cope with legacy deployments: a missing
    /// candidate is "feature absent", not an error.
    async fn probe(&self, tables: &[&str]) -> Result<Option<ColumnSet>>;
}

/// Discovery of foreign keys pointing at a target table.
#[async_trait]
pub trait ForeignKeyIndex: Send + Sync {
    /// Every discovered edge referencing `target_table`.
    ///
    /// Returns an empty list when no references exist or the metadata is
    /// unavailable. No filtering happens here; callers exclude the target
    /// table, the archive table, and log tables themselves.
    async fn referencing_tables(&self, target_table: &str) -> Result<Vec<ReferenceEdge>>;
}

/// Allocation of role-prefixed sequential identifiers.
#[async_trait]
pub trait IdentifierAllocator: Send + Sync {
    /// Mint the next identifier for `prefix`/`epoch`, scanning every source
    /// for the largest previously issued sequence.
    async fn next_id(&self, prefix: &str, epoch: u8, sources: &[SequenceSource]) -> Result<String>;
}

/// Record provisioning: identifier allocation plus adaptive insert.
#[async_trait]
pub trait ProvisioningRepository: Send + Sync {
    /// Provision one record in a single transaction.
    async fn provision(&self, request: ProvisionRequest) -> Result<ProvisionOutcome>;

    /// Provision independent records, one transaction each. Rejected writes
    /// become skip entries; any other failure aborts the batch.
    async fn provision_batch(
        &self,
        requests: Vec<ProvisionRequest>,
    ) -> Result<BatchProvisionOutcome>;
}

/// Transactional archive-then-delete of live records.
#[async_trait]
pub trait RecordArchiver: Send + Sync {
    /// Archive the given records and cascade-delete everything referencing
    /// them, all within one transaction. A failure on any record rolls the
    /// entire batch back.
    async fn archive(&self, user_ids: &[i64], reason: &str) -> Result<Vec<ArchiveSummary>>;
}
