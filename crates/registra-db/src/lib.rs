//! # registra-db
//!
//! PostgreSQL implementation of the registra records engine.
//!
//! This crate provides:
//! - Connection pool management
//! - Runtime column discovery (`information_schema` introspection)
//! - Foreign-key discovery for metadata-driven cascade deletes
//! - Role-prefixed sequential identifier allocation
//! - Schema-adaptive INSERT/UPDATE construction
//! - Transactional archive-then-delete orchestration
//!
//! ## Example
//!
//! ```rust,ignore
//! use registra_db::{Database, ProvisioningRepository, RecordArchiver};
//! use registra_core::{FieldCandidate, ProvisionRequest, SequenceSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/registra").await?;
//!
//!     let outcome = db.provisioning.provision(ProvisionRequest {
//!         table: "users".to_string(),
//!         key_column: "id".to_string(),
//!         identifier_column: "login_id".to_string(),
//!         prefix: "PR".to_string(),
//!         epoch: None,
//!         sources: vec![
//!             SequenceSource::new("users", "login_id"),
//!             SequenceSource::new("archived_users", "login_id"),
//!         ],
//!         fields: vec![
//!             FieldCandidate::new("first_name", "Ana"),
//!             FieldCandidate::new("last_name", "Cruz"),
//!             FieldCandidate::new("email", "ana@example.com"),
//!         ],
//!     }).await?;
//!
//!     println!("Provisioned {} as {}", outcome.key, outcome.identifier);
//!
//!     db.archiver.archive(&[outcome.key], "resigned").await?;
//!     Ok(())
//! }
//! ```

pub mod adaptive_writer;
pub mod archiver;
pub mod foreign_keys;
pub mod identifier_validation;
pub mod identifiers;
pub mod pool;
pub mod provisioning;
pub mod schema_catalog;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

// Re-export core types
pub use registra_core::*;

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

// Re-export implementations
pub use archiver::{ArchiveConfig, PgRecordArchiver};
pub use foreign_keys::PgForeignKeyIndex;
pub use identifier_validation::validate_sql_identifier;
pub use identifiers::PgIdentifierAllocator;
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use provisioning::PgProvisioningRepository;
pub use schema_catalog::PgSchemaCatalog;

/// Combined database context with every engine component.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::PgPool,
    /// Runtime column discovery.
    pub catalog: PgSchemaCatalog,
    /// Foreign-key metadata discovery.
    pub foreign_keys: PgForeignKeyIndex,
    /// Sequential identifier allocation.
    pub identifiers: PgIdentifierAllocator,
    /// Record provisioning.
    pub provisioning: PgProvisioningRepository,
    /// Archive-then-delete orchestration.
    pub archiver: PgRecordArchiver,
}

impl Database {
    /// Create a new Database instance from a connection pool, with the
    /// default school-records archive layout.
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self {
            catalog: PgSchemaCatalog::new(pool.clone()),
            foreign_keys: PgForeignKeyIndex::new(pool.clone()),
            identifiers: PgIdentifierAllocator::new(pool.clone()),
            provisioning: PgProvisioningRepository::new(pool.clone()),
            archiver: PgRecordArchiver::new(pool.clone()),
            pool,
        }
    }

    /// Use a non-default archive layout.
    pub fn with_archive_config(mut self, config: ArchiveConfig) -> Self {
        self.archiver = PgRecordArchiver::with_config(self.pool.clone(), config);
        self
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone()).with_archive_config(self.archiver.config().clone())
    }
}
