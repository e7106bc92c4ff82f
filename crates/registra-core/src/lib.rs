//! # registra-core
//!
//! Core types, traits, and abstractions for the registra records engine.
//!
//! This crate provides the foundational data structures and trait
//! definitions that the store-backed crates depend on: the error taxonomy,
//! the schema-adaptive data model (column sets, field candidates, reference
//! edges), and the pure identifier rendering/parsing logic.

pub mod error;
pub mod identifier;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use identifier::RolePrefix;
pub use models::*;
pub use traits::*;
