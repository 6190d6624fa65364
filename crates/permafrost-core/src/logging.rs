//! Structured logging field name constants for permafrost.
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
//! | WARN  | Recoverable issue (cleanup-phase failures, notification drops) |
//! | INFO  | Protocol step completions, lifecycle events |
//! | DEBUG | Generated SQL shape, artifact keys, config choices |

/// Subsystem originating the log event.
/// Values: "jobs", "db", "store", "notify"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "archive", "restore", "registry", "s3", "executor"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "unload", "drop", "copy", "upsert", "delete_prefix"
pub const OPERATION: &str = "op";

/// Schema-qualified table being archived or restored.
pub const TABLE: &str = "table";

/// Object store bucket involved in the operation.
pub const BUCKET: &str = "bucket";

/// Object store key or prefix involved in the operation.
pub const KEY: &str = "key";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of statements in a transactional batch.
pub const STATEMENT_COUNT: &str = "statement_count";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
