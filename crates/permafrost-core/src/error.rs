//! Error types for permafrost.

use thiserror::Error;

/// Result type alias using permafrost's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for archive/restore operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A required input was empty or malformed. Raised before any side effect.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The caller lacks the grant required to drop the table.
    #[error("Permission error: {0}")]
    Permission(String),

    /// Other warehouse objects still depend on the table.
    #[error("Dependency error: {0}")]
    Dependency(String),

    /// The schema exporter produced something other than exactly one CREATE TABLE.
    #[error("Schema export error: {0}")]
    SchemaExport(String),

    /// Foreign-key constraint resolution failed.
    #[error("Constraint resolution error: {0}")]
    ConstraintResolution(String),

    /// The constraint catalog returned an incomplete edge.
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// A required restore artifact is absent from the object store.
    /// The message echoes the exact bucket/key.
    #[error("{0}")]
    ArtifactMissing(String),

    /// A restore artifact exists but its content cannot be trusted.
    #[error("{0}")]
    ArtifactCorrupt(String),

    /// A warehouse transaction rolled back; no partial table state persists.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Object store or warehouse I/O failed outside a transaction.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Notification delivery failed.
    #[error("Notification error: {0}")]
    Notification(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error is "filtered": expected and user-caused, so
    /// failure notifications skip the engineering cc/bcc list while still
    /// notifying the requester.
    pub fn is_filtered(&self) -> bool {
        matches!(
            self,
            Error::Validation(_)
                | Error::Permission(_)
                | Error::Dependency(_)
                | Error::ArtifactMissing(_)
                | Error::ArtifactCorrupt(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Internal(format!("serialization: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_validation() {
        let err = Error::Validation("Empty schema name!".to_string());
        assert_eq!(err.to_string(), "Validation error: Empty schema name!");
    }

    #[test]
    fn test_error_display_dependency() {
        let err = Error::Dependency("table has dependent views: reports.v1".to_string());
        assert!(err.to_string().contains("reports.v1"));
    }

    #[test]
    fn test_artifact_missing_message_is_verbatim() {
        let err = Error::ArtifactMissing("S3 manifest_file b/p/manifest does not exist!".into());
        assert_eq!(
            err.to_string(),
            "S3 manifest_file b/p/manifest does not exist!"
        );
    }

    #[test]
    fn test_filtered_classification() {
        assert!(Error::Validation("x".into()).is_filtered());
        assert!(Error::Permission("x".into()).is_filtered());
        assert!(Error::Dependency("x".into()).is_filtered());
        assert!(Error::ArtifactMissing("x".into()).is_filtered());
        assert!(Error::ArtifactCorrupt("x".into()).is_filtered());

        assert!(!Error::Transaction("x".into()).is_filtered());
        assert!(!Error::Transport("x".into()).is_filtered());
        assert!(!Error::Internal("x".into()).is_filtered());
        assert!(!Error::SchemaExport("x".into()).is_filtered());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        match err {
            Error::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }
}
