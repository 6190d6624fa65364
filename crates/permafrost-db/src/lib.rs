//! # permafrost-db
//!
//! PostgreSQL/Redshift warehouse layer for permafrost.
//!
//! This crate provides:
//! - Connection pool management
//! - The archive registry (one record per archived table)
//! - Catalog reads: ownership, dependent views, foreign-key edges
//! - The structural snapshot store
//! - Transactional raw-SQL execution
//! - DDL and permission artifact exporters
//!
//! ## Example
//!
//! ```rust,ignore
//! use permafrost_db::Warehouse;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let wh = Warehouse::connect("postgres://localhost/warehouse").await?;
//!     let record = wh.registry.find(&TableRef::new("s", "t")).await?;
//!     println!("archived: {}", record.is_some());
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod executor;
pub mod exporters;
pub mod pool;
pub mod registry;
pub mod snapshots;

// Re-export core types
pub use permafrost_core::*;

pub use catalog::PgCatalogReader;
pub use executor::PgWarehouseExecutor;
pub use exporters::{
    parse_acl_entry, render_create_table, render_permission_script, AclGrant, PgPermissionExporter,
    PgSchemaExporter,
};
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use registry::PgArchiveRegistry;
pub use snapshots::PgSnapshotStore;

/// Combined warehouse context with all repositories.
pub struct Warehouse {
    /// The underlying connection pool.
    pub pool: sqlx::PgPool,
    /// Archive record persistence.
    pub registry: PgArchiveRegistry,
    /// Catalog reads (ownership, views, constraints).
    pub catalog: PgCatalogReader,
    /// Structural snapshot store.
    pub snapshots: PgSnapshotStore,
    /// Raw SQL execution with transactional batches.
    pub executor: PgWarehouseExecutor,
}

impl Warehouse {
    /// Create a new Warehouse instance from a connection pool.
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self {
            registry: PgArchiveRegistry::new(pool.clone()),
            catalog: PgCatalogReader::new(pool.clone()),
            snapshots: PgSnapshotStore::new(pool.clone()),
            executor: PgWarehouseExecutor::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Warehouse instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations (registry and snapshot tables).
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}
