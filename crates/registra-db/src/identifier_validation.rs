//! SQL identifier validation for dynamically assembled statements.
//!
//! Table and column names reach this crate from two places: introspection
//! results (trusted) and engine configuration (operator-supplied). Both are
//! validated against PostgreSQL identifier rules before ever being spliced
//! into a statement; row values are always bound, never interpolated.

use registra_core::{Error, Result};

/// Keywords that must never appear as a bare table or column name in a
/// dynamically built statement.
const RESERVED_KEYWORDS: &[&str] = &[
    "select", "insert", "update", "delete", "drop", "create", "alter", "grant", "revoke",
    "truncate", "union", "where",
];

/// Validate a PostgreSQL table or column name.
///
/// Accepts non-empty names of at most 63 characters that start with a letter
/// or underscore and contain only ASCII alphanumerics and underscores, and
/// that are not reserved SQL keywords.
///
/// # Examples
///
/// ```
/// use registra_db::validate_sql_identifier;
///
/// assert!(validate_sql_identifier("archived_users").is_ok());
/// assert!(validate_sql_identifier("login_id").is_ok());
/// assert!(validate_sql_identifier("users; drop table users").is_err());
/// ```
pub fn validate_sql_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidInput(
            "SQL identifier cannot be empty".to_string(),
        ));
    }

    // PostgreSQL truncates identifiers at 63 bytes; longer input is a bug.
    if name.len() > 63 {
        return Err(Error::InvalidInput(format!(
            "SQL identifier exceeds 63 character limit: {} characters",
            name.len()
        )));
    }

    let mut chars = name.chars();
    let first = chars.next().unwrap_or_default();
    if !first.is_ascii_alphabetic() && first != '_' {
        return Err(Error::InvalidInput(format!(
            "SQL identifier must start with a letter or underscore, found: '{}'",
            first
        )));
    }

    for ch in chars {
        if !ch.is_ascii_alphanumeric() && ch != '_' {
            return Err(Error::InvalidInput(format!(
                "SQL identifier contains invalid character: '{}'",
                ch
            )));
        }
    }

    if RESERVED_KEYWORDS.contains(&name.to_lowercase().as_str()) {
        return Err(Error::InvalidInput(format!(
            "SQL identifier '{}' is a reserved keyword",
            name
        )));
    }

    Ok(())
}
