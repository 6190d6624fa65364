//! # permafrost-core
//!
//! Core types, traits, and SQL generation for permafrost.
//!
//! This crate provides the data model of the archive/restore protocol, the
//! error taxonomy, the SQL safety layer (the single escaping/quoting choke
//! point), and the collaborator traits the orchestrators drive.

pub mod error;
pub mod logging;
pub mod models;
pub mod sql;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
