//! Archive orchestration: export a table's schema, permissions, and data
//! to the object store, commit the archive record, then drop the table.
//!
//! The step order is load-bearing. Artifacts are written first, metadata
//! second, the destructive drop last, so a crash mid-run always leaves the
//! object store as the recoverable source of truth and the warehouse table
//! either fully present or fully absent.

use std::sync::Arc;

use tracing::{info, warn};

use permafrost_core::sql::{comment_statement, count_create_table, drop_table_statement, unload_statement};
use permafrost_core::{
    ArchiveOutcome, ArchiveRecord, ArchiveRegistry, ArchiveRequest, CatalogReader, Error,
    ObjectStore, PermissionExporter, Result, SchemaExporter, SnapshotStore, TableRef,
    WarehouseExecutor,
};

use crate::constraints::ConstraintResolver;

/// Drives one archive run end to end.
pub struct ArchiveOrchestrator {
    executor: Arc<dyn WarehouseExecutor>,
    catalog: Arc<dyn CatalogReader>,
    store: Arc<dyn ObjectStore>,
    registry: Arc<dyn ArchiveRegistry>,
    snapshots: Arc<dyn SnapshotStore>,
    schema_exporter: Arc<dyn SchemaExporter>,
    permission_exporter: Arc<dyn PermissionExporter>,
}

impl ArchiveOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        executor: Arc<dyn WarehouseExecutor>,
        catalog: Arc<dyn CatalogReader>,
        store: Arc<dyn ObjectStore>,
        registry: Arc<dyn ArchiveRegistry>,
        snapshots: Arc<dyn SnapshotStore>,
        schema_exporter: Arc<dyn SchemaExporter>,
        permission_exporter: Arc<dyn PermissionExporter>,
    ) -> Self {
        Self {
            executor,
            catalog,
            store,
            registry,
            snapshots,
            schema_exporter,
            permission_exporter,
        }
    }

    /// Look up the existing archive record for a table, if any.
    ///
    /// The external job runner uses this to reject overlapping runs before
    /// scheduling; the archive itself overwrites an existing record.
    pub async fn preflight(&self, table: &TableRef) -> Result<Option<ArchiveRecord>> {
        self.registry.find(table).await
    }

    /// Run the archive protocol for one table.
    pub async fn archive(&self, request: &ArchiveRequest) -> Result<ArchiveOutcome> {
        request.validate()?;

        let table = &request.table;
        let destination = &request.destination;
        let options = &request.options;

        info!(
            subsystem = "jobs",
            component = "archive",
            op = "start",
            table = %table,
            bucket = %destination.bucket,
            "Archiving table"
        );

        // Checks that gate the drop are pointless when nothing is dropped.
        if !options.skip_drop {
            if !options.skip_permission_check {
                let allowed = self
                    .catalog
                    .can_drop(table, options.caller.as_deref())
                    .await?;
                if !allowed {
                    return Err(Error::Permission(format!(
                        "No permission to drop table {}!",
                        table
                    )));
                }
            }

            let views = self.catalog.dependent_views(table).await?;
            if !views.is_empty() {
                return Err(Error::Dependency(format!(
                    "Views exist that depend on table {}: {}",
                    table,
                    views.join(", ")
                )));
            }
        }

        // Snapshot before anything changes; the record copies it.
        self.snapshots.refresh(table).await?;
        let snapshot = self.snapshots.fetch(table).await?.unwrap_or_default();

        let ddl_key = destination.ddl_key();
        self.schema_exporter
            .export(table, &destination.bucket, &ddl_key, &options.schema_overrides)
            .await?;

        let ddl_bytes = self.store.get(&destination.bucket, &ddl_key).await?;
        let mut ddl = String::from_utf8(ddl_bytes).map_err(|_| {
            Error::SchemaExport(format!(
                "DDL artifact for {} is not valid UTF-8!",
                table
            ))
        })?;
        let creates = count_create_table(&ddl);
        if creates != 1 {
            return Err(Error::SchemaExport(format!(
                "DDL artifact for {} must contain exactly one CREATE TABLE statement, found {}!",
                table, creates
            )));
        }

        // FK edges into this table: dropped just before DROP TABLE, and
        // recreated from statements appended to the DDL artifact.
        let plan = ConstraintResolver::resolve(self.catalog.as_ref(), table).await?;
        let mut appended = plan.add_statements.clone();
        if let Some(comment) = snapshot.table_comment.as_deref().filter(|c| !c.is_empty()) {
            appended.push(comment_statement(table, comment));
        }
        if !appended.is_empty() {
            for statement in &appended {
                ddl.push('\n');
                ddl.push_str(statement);
            }
            self.store
                .put(&destination.bucket, &ddl_key, ddl.as_bytes())
                .await?;
        }

        let permissions_key = destination.permissions_key();
        self.permission_exporter
            .export(table, &destination.bucket, &permissions_key)
            .await?;

        let unload = unload_statement(table, destination, &request.credentials, &options.unload);
        self.executor
            .execute(&unload)
            .await
            .map_err(|e| Error::Transport(format!("UNLOAD of {} failed: {}", table, e)))?;

        info!(
            subsystem = "jobs",
            component = "archive",
            op = "unload",
            table = %table,
            bucket = %destination.bucket,
            key = %destination.manifest_key(),
            "Unloaded table data"
        );

        // Commit the new record before touching the old artifacts, so a
        // failure between the two leaves a valid (new) archive behind.
        let previous = self.registry.find(table).await?;
        let record = ArchiveRecord::from_snapshot(table, destination, &snapshot);
        self.registry.upsert(&record).await?;

        if let Some(previous) = previous {
            if previous.location() != *destination {
                self.cleanup_stale(table, &previous).await;
            }
        }

        if !options.skip_drop {
            let mut statements = plan.drop_statements.clone();
            statements.push(drop_table_statement(table));
            self.executor
                .execute_transaction(&statements)
                .await
                .map_err(|e| Error::Transaction(format!("DROP of {} failed: {}", table, e)))?;

            // The table is gone; the snapshot entry should follow. A
            // refresh failure here cannot un-archive anything.
            if let Err(e) = self.snapshots.refresh(table).await {
                warn!(
                    subsystem = "jobs",
                    component = "archive",
                    op = "post_drop_refresh",
                    table = %table,
                    error = %e,
                    "Snapshot refresh after drop failed"
                );
            }
        }

        info!(
            subsystem = "jobs",
            component = "archive",
            op = "done",
            table = %table,
            bucket = %destination.bucket,
            "Archived table"
        );

        Ok(ArchiveOutcome {
            ddl_file: destination.url_for(&ddl_key),
            manifest_file: destination.url_for(&destination.manifest_key()),
            permissions_file: destination.url_for(&permissions_key),
        })
    }

    /// Delete the artifacts of a superseded archive, best-effort.
    async fn cleanup_stale(&self, table: &TableRef, previous: &ArchiveRecord) {
        let location = previous.location();
        let keys = match self.store.list(&location.bucket, &location.prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(
                    subsystem = "jobs",
                    component = "archive",
                    op = "cleanup",
                    table = %table,
                    bucket = %location.bucket,
                    error = %e,
                    "Listing stale archive artifacts failed"
                );
                return;
            }
        };

        for key in keys {
            if let Err(e) = self.store.delete(&location.bucket, &key).await {
                warn!(
                    subsystem = "jobs",
                    component = "archive",
                    op = "cleanup",
                    table = %table,
                    bucket = %location.bucket,
                    key = %key,
                    error = %e,
                    "Deleting stale archive artifact failed"
                );
            }
        }
    }
}
