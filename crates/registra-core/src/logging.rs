//! Structured logging field name constants.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Operation completions (provision, archive commit) |
//! | DEBUG | Decision points: skipped sources, probed tables |
//! | TRACE | Per-row iteration during cascade deletes |

/// Subsystem originating the log event. Values: "db".
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "schema_catalog", "archiver", "provisioning"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "columns_of", "next_id", "archive", "provision"
pub const OPERATION: &str = "op";

/// Table being introspected or written.
pub const TABLE: &str = "table";

/// Primary key of the record being provisioned or archived.
pub const USER_ID: &str = "user_id";

/// Minted or re-displayed role identifier.
pub const IDENTIFIER: &str = "identifier";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Rows affected by a write or cascade delete.
pub const ROW_COUNT: &str = "row_count";

/// Foreign-key edges discovered for a cascade.
pub const EDGE_COUNT: &str = "edge_count";
