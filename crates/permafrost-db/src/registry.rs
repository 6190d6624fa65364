//! Archive registry repository: one record per archived table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::info;

use permafrost_core::{ArchiveRecord, ArchiveRegistry, ColumnDef, Error, Result, TableRef};

/// PostgreSQL implementation of [`ArchiveRegistry`].
///
/// Backed by the `archive_registry` table; `(schema_name, table_name)` is
/// the primary key, so a second archive of the same table overwrites the
/// record instead of duplicating it.
pub struct PgArchiveRegistry {
    pool: PgPool,
}

impl PgArchiveRegistry {
    /// Create a new PgArchiveRegistry with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<ArchiveRecord> {
        let columns_json: serde_json::Value = row.get("columns");
        let columns: Vec<ColumnDef> = serde_json::from_value(columns_json)?;
        let archived_at: DateTime<Utc> = row.get("archived_at");

        Ok(ArchiveRecord {
            schema_name: row.get("schema_name"),
            table_name: row.get("table_name"),
            archive_bucket: row.get("archive_bucket"),
            archive_prefix: row.get("archive_prefix"),
            size_in_mb: row.get("size_in_mb"),
            dist_style: row.get("dist_style"),
            dist_key: row.get("dist_key"),
            sort_style: row.get("sort_style"),
            sort_keys: row.get("sort_keys"),
            has_col_encodings: row.get("has_col_encodings"),
            table_comment: row.get("table_comment"),
            columns,
            archived_at,
        })
    }
}

#[async_trait]
impl ArchiveRegistry for PgArchiveRegistry {
    async fn find(&self, table: &TableRef) -> Result<Option<ArchiveRecord>> {
        let row = sqlx::query(
            r#"
            SELECT schema_name, table_name, archive_bucket, archive_prefix,
                   size_in_mb, dist_style, dist_key, sort_style, sort_keys,
                   has_col_encodings, table_comment, columns, archived_at
            FROM archive_registry
            WHERE schema_name = $1 AND table_name = $2
            "#,
        )
        .bind(&table.schema)
        .bind(&table.name)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.as_ref().map(Self::row_to_record).transpose()
    }

    async fn upsert(&self, record: &ArchiveRecord) -> Result<()> {
        let columns = serde_json::to_value(&record.columns)?;

        sqlx::query(
            r#"
            INSERT INTO archive_registry (
                schema_name, table_name, archive_bucket, archive_prefix,
                size_in_mb, dist_style, dist_key, sort_style, sort_keys,
                has_col_encodings, table_comment, columns, archived_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (schema_name, table_name) DO UPDATE SET
                archive_bucket = EXCLUDED.archive_bucket,
                archive_prefix = EXCLUDED.archive_prefix,
                size_in_mb = EXCLUDED.size_in_mb,
                dist_style = EXCLUDED.dist_style,
                dist_key = EXCLUDED.dist_key,
                sort_style = EXCLUDED.sort_style,
                sort_keys = EXCLUDED.sort_keys,
                has_col_encodings = EXCLUDED.has_col_encodings,
                table_comment = EXCLUDED.table_comment,
                columns = EXCLUDED.columns,
                archived_at = EXCLUDED.archived_at
            "#,
        )
        .bind(&record.schema_name)
        .bind(&record.table_name)
        .bind(&record.archive_bucket)
        .bind(&record.archive_prefix)
        .bind(record.size_in_mb)
        .bind(&record.dist_style)
        .bind(&record.dist_key)
        .bind(&record.sort_style)
        .bind(&record.sort_keys)
        .bind(record.has_col_encodings)
        .bind(&record.table_comment)
        .bind(columns)
        .bind(record.archived_at)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "registry",
            op = "upsert",
            table = %format!("{}.{}", record.schema_name, record.table_name),
            bucket = %record.archive_bucket,
            "Archive record committed"
        );
        Ok(())
    }

    async fn delete(&self, table: &TableRef) -> Result<()> {
        sqlx::query("DELETE FROM archive_registry WHERE schema_name = $1 AND table_name = $2")
            .bind(&table.schema)
            .bind(&table.name)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "registry",
            op = "delete",
            table = %table,
            "Archive record removed"
        );
        Ok(())
    }
}
