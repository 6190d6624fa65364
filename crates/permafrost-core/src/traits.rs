//! Collaborator traits for the archive/restore protocol.
//!
//! These define the seams the orchestrators drive: warehouse execution,
//! object storage, exporters, the snapshot refresher, the archive registry,
//! and notification delivery. Concrete implementations live in
//! `permafrost-db` and `permafrost-aws`; tests substitute in-memory mocks.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{ArchiveRecord, ConstraintEdge, SchemaExportOverrides, TableRef, TableSnapshot};

/// Executes raw SQL against the warehouse.
///
/// Implementations acquire a dedicated connection per call and release it
/// on every exit path. `execute_transaction` is the only ACID boundary in
/// the protocol: the batch commits or rolls back as a whole.
#[async_trait]
pub trait WarehouseExecutor: Send + Sync {
    /// Execute one statement outside any explicit transaction.
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Execute a batch of statements inside one transaction.
    async fn execute_transaction(&self, statements: &[String]) -> Result<()>;
}

/// Blob interface over bucket + key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, bucket: &str, key: &str) -> Result<bool>;

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    async fn put(&self, bucket: &str, key: &str, data: &[u8]) -> Result<()>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<()>;

    /// List all keys under a prefix. Implementations iterate paginated
    /// listings to completion.
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;
}

/// Reads the warehouse catalog for authorization, dependency, and
/// constraint facts about a table.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Whether the caller holds a grant permitting DROP of the table.
    /// `caller` defaults to the session user when `None`.
    async fn can_drop(&self, table: &TableRef, caller: Option<&str>) -> Result<bool>;

    /// Names (`schema.view`) of views whose definition queries the table.
    async fn dependent_views(&self, table: &TableRef) -> Result<Vec<String>>;

    /// Foreign-key edges whose referenced table is the target.
    async fn foreign_key_edges(&self, table: &TableRef) -> Result<Vec<ConstraintEdge>>;
}

/// Recomputes and serves the structural snapshot of a table.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Recompute the snapshot from the warehouse and upsert it. After a
    /// drop, this removes the dropped table's entry.
    async fn refresh(&self, table: &TableRef) -> Result<()>;

    /// Read the current snapshot, if one exists.
    async fn fetch(&self, table: &TableRef) -> Result<Option<TableSnapshot>>;
}

/// Persists one [`ArchiveRecord`] per archived table.
#[async_trait]
pub trait ArchiveRegistry: Send + Sync {
    async fn find(&self, table: &TableRef) -> Result<Option<ArchiveRecord>>;

    /// Insert or overwrite the record for the table key.
    async fn upsert(&self, record: &ArchiveRecord) -> Result<()>;

    async fn delete(&self, table: &TableRef) -> Result<()>;
}

/// Writes the DDL artifact: exactly one CREATE TABLE statement.
#[async_trait]
pub trait SchemaExporter: Send + Sync {
    async fn export(
        &self,
        table: &TableRef,
        bucket: &str,
        key: &str,
        overrides: &SchemaExportOverrides,
    ) -> Result<()>;
}

/// Writes the grant-replay SQL script.
#[async_trait]
pub trait PermissionExporter: Send + Sync {
    async fn export(&self, table: &TableRef, bucket: &str, key: &str) -> Result<()>;
}

/// A notification to deliver, best-effort.
#[derive(Debug, Clone)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub body: String,
    /// Engineering escalation list; dropped for filtered errors.
    pub cc: Option<String>,
    pub bcc: Option<String>,
}

/// Best-effort delivery channel for success/failure notices.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}
