//! Restore orchestration: recreate an archived table from its object-store
//! artifacts, reapply permissions, and bulk-load the data back.
//!
//! Every artifact is verified before the warehouse is touched; the create,
//! lock, grant, and copy statements then run in a single transaction so a
//! partially restored table never persists.

use std::sync::Arc;

use tracing::{info, warn};

use permafrost_core::sql::{copy_statement, credentials_clause, extract_create_table, lock_statement};
use permafrost_core::{
    ArchiveRegistry, Error, ObjectStore, RestoreOutcome, RestoreRequest, Result, SnapshotStore,
    StorageLocation, TableRef, WarehouseAccessConfig, WarehouseExecutor,
};

/// Drives one restore run end to end.
pub struct RestoreOrchestrator {
    executor: Arc<dyn WarehouseExecutor>,
    store: Arc<dyn ObjectStore>,
    registry: Arc<dyn ArchiveRegistry>,
    snapshots: Arc<dyn SnapshotStore>,
    access: WarehouseAccessConfig,
}

impl RestoreOrchestrator {
    pub fn new(
        executor: Arc<dyn WarehouseExecutor>,
        store: Arc<dyn ObjectStore>,
        registry: Arc<dyn ArchiveRegistry>,
        snapshots: Arc<dyn SnapshotStore>,
        access: WarehouseAccessConfig,
    ) -> Self {
        Self {
            executor,
            store,
            registry,
            snapshots,
            access,
        }
    }

    /// Run the restore protocol for one table.
    pub async fn restore(&self, request: &RestoreRequest) -> Result<RestoreOutcome> {
        request.validate()?;

        let table = &request.table;
        let source = &request.source;

        info!(
            subsystem = "jobs",
            component = "restore",
            op = "start",
            table = %table,
            bucket = %source.bucket,
            "Restoring table"
        );

        let ddl_key = source.ddl_key();
        let permissions_key = source.permissions_key();
        let manifest_key = source.manifest_key();

        // The manifest is the data; without it nothing else matters.
        self.require_artifact("manifest_file", &source.bucket, &manifest_key)
            .await?;

        self.require_artifact("ddl_file", &source.bucket, &ddl_key)
            .await?;
        let ddl_bytes = self.store.get(&source.bucket, &ddl_key).await?;
        let ddl = String::from_utf8_lossy(&ddl_bytes);
        // Identifier-exact match guards against a tampered artifact
        // creating a different table than the one requested.
        let create_table = extract_create_table(&ddl, table).ok_or_else(|| {
            Error::ArtifactCorrupt(format!(
                "S3 ddl_file {}/{} must contain a single valid CREATE TABLE statement!",
                source.bucket, ddl_key
            ))
        })?;

        self.require_artifact("perms_file", &source.bucket, &permissions_key)
            .await?;
        let permission_bytes = self.store.get(&source.bucket, &permissions_key).await?;
        let permission_script = String::from_utf8_lossy(&permission_bytes).into_owned();

        let clause = credentials_clause(&request.credentials, &self.access);
        let copy = copy_statement(table, source, &clause, &request.options.copy);

        let mut statements = vec![create_table, lock_statement(table)];
        statements.extend(split_statements(&permission_script));
        statements.push(copy);

        self.executor
            .execute_transaction(&statements)
            .await
            .map_err(|e| Error::Transaction(format!("Restore of {} failed: {}", table, e)))?;

        info!(
            subsystem = "jobs",
            component = "restore",
            op = "copy",
            table = %table,
            bucket = %source.bucket,
            key = %manifest_key,
            "Created and copied table"
        );

        // The table is live; record and artifacts are now redundant.
        // Failures past this point cannot undo the restore.
        self.cleanup(table, source).await;

        if let Err(e) = self.snapshots.refresh(table).await {
            warn!(
                subsystem = "jobs",
                component = "restore",
                op = "post_restore_refresh",
                table = %table,
                error = %e,
                "Snapshot refresh after restore failed"
            );
        }

        info!(
            subsystem = "jobs",
            component = "restore",
            op = "done",
            table = %table,
            "Restored table"
        );

        Ok(RestoreOutcome {
            schema: table.schema.clone(),
            table: table.name.clone(),
        })
    }

    async fn require_artifact(&self, label: &str, bucket: &str, key: &str) -> Result<()> {
        if self.store.exists(bucket, key).await? {
            Ok(())
        } else {
            Err(Error::ArtifactMissing(format!(
                "S3 {} {}/{} does not exist!",
                label, bucket, key
            )))
        }
    }

    /// Delete the archive record and every artifact under the prefix,
    /// best-effort.
    async fn cleanup(&self, table: &TableRef, source: &StorageLocation) {
        if let Err(e) = self.registry.delete(table).await {
            warn!(
                subsystem = "jobs",
                component = "restore",
                op = "cleanup",
                table = %table,
                error = %e,
                "Deleting archive record failed"
            );
        }

        let keys = match self.store.list(&source.bucket, &source.prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(
                    subsystem = "jobs",
                    component = "restore",
                    op = "cleanup",
                    table = %table,
                    bucket = %source.bucket,
                    error = %e,
                    "Listing archive artifacts failed"
                );
                return;
            }
        };

        for key in keys {
            if let Err(e) = self.store.delete(&source.bucket, &key).await {
                warn!(
                    subsystem = "jobs",
                    component = "restore",
                    op = "cleanup",
                    table = %table,
                    bucket = %source.bucket,
                    key = %key,
                    error = %e,
                    "Deleting archive artifact failed"
                );
            }
        }
    }
}

/// Split a grant-replay script into individual statements.
///
/// The permission exporter writes one statement per line, each terminated
/// by `;`. Blank lines and line comments are dropped.
fn split_statements(script: &str) -> Vec<String> {
    script
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("--"))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_statements_drops_blanks_and_comments() {
        let script = "-- permissions for \"s\".\"t\"\n\
                      ALTER TABLE \"s\".\"t\" OWNER TO \"alice\";\n\
                      \n\
                      GRANT SELECT ON \"s\".\"t\" TO \"bob\";\n";
        assert_eq!(
            split_statements(script),
            vec![
                "ALTER TABLE \"s\".\"t\" OWNER TO \"alice\";".to_string(),
                "GRANT SELECT ON \"s\".\"t\" TO \"bob\";".to_string(),
            ]
        );
    }

    #[test]
    fn test_split_statements_empty_script() {
        assert!(split_statements("").is_empty());
        assert!(split_statements("\n\n-- nothing\n").is_empty());
    }
}
