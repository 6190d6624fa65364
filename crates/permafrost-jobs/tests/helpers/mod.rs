#![allow(dead_code)]

//! Mock collaborators for driving the orchestrators end to end without a
//! warehouse. The object store is the real in-memory implementation from
//! `permafrost-aws`; everything else records calls for assertions.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use permafrost_aws::MemoryObjectStore;
use permafrost_core::{
    ArchiveRecord, ArchiveRegistry, CatalogReader, ColumnDef, ConstraintEdge, Error, ObjectStore,
    PermissionExporter, Result, SchemaExporter, SchemaExportOverrides, SnapshotStore, TableRef,
    TableSnapshot, WarehouseExecutor,
};

/// Records every statement; failures are injectable per entry point.
#[derive(Default)]
pub struct MockExecutor {
    pub executed: Mutex<Vec<String>>,
    pub transactions: Mutex<Vec<Vec<String>>>,
    pub fail_execute: AtomicBool,
    pub fail_transaction: AtomicBool,
}

impl MockExecutor {
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn transactions(&self) -> Vec<Vec<String>> {
        self.transactions.lock().unwrap().clone()
    }
}

#[async_trait]
impl WarehouseExecutor for MockExecutor {
    async fn execute(&self, sql: &str) -> Result<()> {
        if self.fail_execute.load(Ordering::SeqCst) {
            return Err(Error::Transport("injected warehouse failure".into()));
        }
        self.executed.lock().unwrap().push(sql.to_string());
        Ok(())
    }

    async fn execute_transaction(&self, statements: &[String]) -> Result<()> {
        if self.fail_transaction.load(Ordering::SeqCst) {
            return Err(Error::Transport("injected transaction failure".into()));
        }
        self.transactions.lock().unwrap().push(statements.to_vec());
        Ok(())
    }
}

/// Catalog with configurable authorization, views, and FK edges.
#[derive(Default)]
pub struct MockCatalog {
    pub allow_drop: bool,
    pub dependent_views: Vec<String>,
    pub edges: Vec<ConstraintEdge>,
}

impl MockCatalog {
    pub fn permissive() -> Self {
        Self {
            allow_drop: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl CatalogReader for MockCatalog {
    async fn can_drop(&self, _table: &TableRef, _caller: Option<&str>) -> Result<bool> {
        Ok(self.allow_drop)
    }

    async fn dependent_views(&self, _table: &TableRef) -> Result<Vec<String>> {
        Ok(self.dependent_views.clone())
    }

    async fn foreign_key_edges(&self, _table: &TableRef) -> Result<Vec<ConstraintEdge>> {
        Ok(self.edges.clone())
    }
}

/// Snapshot store serving one configured snapshot, counting refreshes.
#[derive(Default)]
pub struct MockSnapshots {
    pub snapshot: Mutex<Option<TableSnapshot>>,
    pub refreshes: AtomicUsize,
    pub fail_refresh: AtomicBool,
}

impl MockSnapshots {
    pub fn with_snapshot(snapshot: TableSnapshot) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
            ..Default::default()
        }
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotStore for MockSnapshots {
    async fn refresh(&self, _table: &TableRef) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(Error::Transport("injected refresh failure".into()));
        }
        Ok(())
    }

    async fn fetch(&self, _table: &TableRef) -> Result<Option<TableSnapshot>> {
        Ok(self.snapshot.lock().unwrap().clone())
    }
}

/// Registry over a plain map.
#[derive(Default)]
pub struct MockRegistry {
    records: Mutex<HashMap<(String, String), ArchiveRecord>>,
}

impl MockRegistry {
    pub fn seed(&self, record: ArchiveRecord) {
        self.records.lock().unwrap().insert(
            (record.schema_name.clone(), record.table_name.clone()),
            record,
        );
    }

    pub fn get(&self, table: &TableRef) -> Option<ArchiveRecord> {
        self.records
            .lock()
            .unwrap()
            .get(&(table.schema.clone(), table.name.clone()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl ArchiveRegistry for MockRegistry {
    async fn find(&self, table: &TableRef) -> Result<Option<ArchiveRecord>> {
        Ok(self.get(table))
    }

    async fn upsert(&self, record: &ArchiveRecord) -> Result<()> {
        self.seed(record.clone());
        Ok(())
    }

    async fn delete(&self, table: &TableRef) -> Result<()> {
        self.records
            .lock()
            .unwrap()
            .remove(&(table.schema.clone(), table.name.clone()));
        Ok(())
    }
}

/// Schema exporter writing a canned DDL artifact to the shared store.
pub struct MockSchemaExporter {
    store: Arc<MemoryObjectStore>,
    pub ddl_override: Mutex<Option<String>>,
}

impl MockSchemaExporter {
    pub fn new(store: Arc<MemoryObjectStore>) -> Self {
        Self {
            store,
            ddl_override: Mutex::new(None),
        }
    }

    pub fn set_ddl(&self, ddl: impl Into<String>) {
        *self.ddl_override.lock().unwrap() = Some(ddl.into());
    }
}

#[async_trait]
impl SchemaExporter for MockSchemaExporter {
    async fn export(
        &self,
        table: &TableRef,
        bucket: &str,
        key: &str,
        _overrides: &SchemaExportOverrides,
    ) -> Result<()> {
        let ddl = self
            .ddl_override
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| default_ddl(table));
        self.store.put(bucket, key, ddl.as_bytes()).await
    }
}

/// Permission exporter writing a canned grant script to the shared store.
pub struct MockPermissionExporter {
    store: Arc<MemoryObjectStore>,
}

impl MockPermissionExporter {
    pub fn new(store: Arc<MemoryObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PermissionExporter for MockPermissionExporter {
    async fn export(&self, table: &TableRef, bucket: &str, key: &str) -> Result<()> {
        self.store
            .put(bucket, key, default_permission_script(table).as_bytes())
            .await
    }
}

pub fn default_ddl(table: &TableRef) -> String {
    format!(
        "CREATE TABLE \"{}\".\"{}\" (\n    \"id\" bigint NOT NULL,\n    \"payload\" varchar(256)\n);",
        table.schema, table.name
    )
}

pub fn default_permission_script(table: &TableRef) -> String {
    format!(
        "ALTER TABLE \"{s}\".\"{t}\" OWNER TO \"owner_user\";\nGRANT SELECT ON \"{s}\".\"{t}\" TO \"reader\";",
        s = table.schema,
        t = table.name
    )
}

pub fn sample_snapshot() -> TableSnapshot {
    TableSnapshot {
        size_in_mb: Some(2048),
        dist_style: Some("KEY".into()),
        dist_key: Some("id".into()),
        sort_style: Some("COMPOUND".into()),
        sort_keys: vec!["id".into()],
        has_col_encodings: true,
        table_comment: Some("cold event data".into()),
        columns: vec![
            ColumnDef {
                name: "id".into(),
                data_type: "bigint".into(),
                position: 1,
                encoding: Some("az64".into()),
                nullable: false,
            },
            ColumnDef {
                name: "payload".into(),
                data_type: "varchar(256)".into(),
                position: 2,
                encoding: Some("lzo".into()),
                nullable: true,
            },
        ],
    }
}
