//! Structural snapshot store.
//!
//! The snapshot of a table (size, distribution, sort, encodings, comment,
//! columns) is recomputed from the warehouse catalog and persisted in the
//! `table_snapshot` table, where the archive orchestrator reads it back for
//! the ArchiveRecord. Refreshing a dropped table removes its entry.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use tracing::{debug, info};

use permafrost_core::{ColumnDef, Error, Result, SnapshotStore, TableRef, TableSnapshot};

/// PostgreSQL/Redshift implementation of [`SnapshotStore`].
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    /// Create a new PgSnapshotStore with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn table_exists(&self, table: &TableRef) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT 1 AS present
            FROM pg_class c
            JOIN pg_namespace n ON n.oid = c.relnamespace
            WHERE n.nspname = $1 AND c.relname = $2 AND c.relkind = 'r'
            "#,
        )
        .bind(&table.schema)
        .bind(&table.name)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(row.is_some())
    }

    async fn compute(&self, table: &TableRef) -> Result<TableSnapshot> {
        // Redshift-specific attributes: distkey flag, sort key ordinal
        // (negative for interleaved), and column encoding.
        let column_rows = sqlx::query(
            r#"
            SELECT a.attname AS name,
                   format_type(a.atttypid, a.atttypmod) AS data_type,
                   a.attnum::int AS position,
                   NULLIF(format_encoding(a.attencodingtype), 'none') AS encoding,
                   NOT a.attnotnull AS nullable,
                   a.attisdistkey AS is_distkey,
                   a.attsortkeyord::int AS sortkey_ord
            FROM pg_attribute a
            JOIN pg_class c ON c.oid = a.attrelid
            JOIN pg_namespace n ON n.oid = c.relnamespace
            WHERE n.nspname = $1 AND c.relname = $2
              AND a.attnum > 0 AND NOT a.attisdropped
            ORDER BY a.attnum
            "#,
        )
        .bind(&table.schema)
        .bind(&table.name)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut columns = Vec::with_capacity(column_rows.len());
        let mut dist_key: Option<String> = None;
        let mut sorted: Vec<(i32, String)> = Vec::new();
        let mut interleaved = false;

        for row in &column_rows {
            let name: String = row.get("name");
            let sortkey_ord: i32 = row.get("sortkey_ord");
            if row.get::<bool, _>("is_distkey") {
                dist_key = Some(name.clone());
            }
            if sortkey_ord != 0 {
                if sortkey_ord < 0 {
                    interleaved = true;
                }
                sorted.push((sortkey_ord.abs(), name.clone()));
            }
            columns.push(ColumnDef {
                name,
                data_type: row.get("data_type"),
                position: row.get("position"),
                encoding: row.get("encoding"),
                nullable: row.get("nullable"),
            });
        }
        sorted.sort_by_key(|(ord, _)| *ord);
        let sort_keys: Vec<String> = sorted.into_iter().map(|(_, name)| name).collect();

        let sort_style = if sort_keys.is_empty() {
            None
        } else if interleaved {
            Some("INTERLEAVED".to_string())
        } else {
            Some("COMPOUND".to_string())
        };

        let info_row = sqlx::query(
            r#"
            SELECT size::bigint AS size_in_mb, diststyle
            FROM svv_table_info
            WHERE "schema" = $1 AND "table" = $2
            "#,
        )
        .bind(&table.schema)
        .bind(&table.name)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let (size_in_mb, dist_style) = match info_row {
            Some(row) => (
                row.get::<Option<i64>, _>("size_in_mb"),
                row.get::<Option<String>, _>("diststyle"),
            ),
            None => (None, None),
        };

        let comment_row = sqlx::query(
            r#"
            SELECT obj_description(c.oid, 'pg_class') AS table_comment
            FROM pg_class c
            JOIN pg_namespace n ON n.oid = c.relnamespace
            WHERE n.nspname = $1 AND c.relname = $2
            "#,
        )
        .bind(&table.schema)
        .bind(&table.name)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let table_comment =
            comment_row.and_then(|row| row.get::<Option<String>, _>("table_comment"));

        let has_col_encodings = columns.iter().any(|c| c.encoding.is_some());

        Ok(TableSnapshot {
            size_in_mb,
            dist_style,
            dist_key,
            sort_style,
            sort_keys,
            has_col_encodings,
            table_comment,
            columns,
        })
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn refresh(&self, table: &TableRef) -> Result<()> {
        if !self.table_exists(table).await? {
            sqlx::query("DELETE FROM table_snapshot WHERE schema_name = $1 AND table_name = $2")
                .bind(&table.schema)
                .bind(&table.name)
                .execute(&self.pool)
                .await
                .map_err(Error::Database)?;
            info!(
                subsystem = "db",
                component = "snapshots",
                op = "refresh",
                table = %table,
                "Table gone, snapshot entry removed"
            );
            return Ok(());
        }

        let snapshot = self.compute(table).await?;
        let columns = serde_json::to_value(&snapshot.columns)?;

        sqlx::query(
            r#"
            INSERT INTO table_snapshot (
                schema_name, table_name, size_in_mb, dist_style, dist_key,
                sort_style, sort_keys, has_col_encodings, table_comment,
                columns, refreshed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (schema_name, table_name) DO UPDATE SET
                size_in_mb = EXCLUDED.size_in_mb,
                dist_style = EXCLUDED.dist_style,
                dist_key = EXCLUDED.dist_key,
                sort_style = EXCLUDED.sort_style,
                sort_keys = EXCLUDED.sort_keys,
                has_col_encodings = EXCLUDED.has_col_encodings,
                table_comment = EXCLUDED.table_comment,
                columns = EXCLUDED.columns,
                refreshed_at = EXCLUDED.refreshed_at
            "#,
        )
        .bind(&table.schema)
        .bind(&table.name)
        .bind(snapshot.size_in_mb)
        .bind(&snapshot.dist_style)
        .bind(&snapshot.dist_key)
        .bind(&snapshot.sort_style)
        .bind(&snapshot.sort_keys)
        .bind(snapshot.has_col_encodings)
        .bind(&snapshot.table_comment)
        .bind(columns)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "snapshots",
            op = "refresh",
            table = %table,
            "Snapshot refreshed"
        );
        Ok(())
    }

    async fn fetch(&self, table: &TableRef) -> Result<Option<TableSnapshot>> {
        let row = sqlx::query(
            r#"
            SELECT size_in_mb, dist_style, dist_key, sort_style, sort_keys,
                   has_col_encodings, table_comment, columns
            FROM table_snapshot
            WHERE schema_name = $1 AND table_name = $2
            "#,
        )
        .bind(&table.schema)
        .bind(&table.name)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let columns_json: serde_json::Value = row.get("columns");
        Ok(Some(TableSnapshot {
            size_in_mb: row.get("size_in_mb"),
            dist_style: row.get("dist_style"),
            dist_key: row.get("dist_key"),
            sort_style: row.get("sort_style"),
            sort_keys: row.get("sort_keys"),
            has_col_encodings: row.get("has_col_encodings"),
            table_comment: row.get("table_comment"),
            columns: serde_json::from_value(columns_json)?,
        }))
    }
}
