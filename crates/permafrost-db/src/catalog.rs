//! Warehouse catalog reader: ownership, dependent views, foreign keys.

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::debug;

use permafrost_core::{CatalogReader, ConstraintEdge, Error, Result, TableRef};

/// PostgreSQL implementation of [`CatalogReader`] over `pg_catalog`.
pub struct PgCatalogReader {
    pool: PgPool,
}

impl PgCatalogReader {
    /// Create a new PgCatalogReader with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn session_user(&self) -> Result<String> {
        let row = sqlx::query("SELECT current_user AS usename")
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(row.get("usename"))
    }
}

#[async_trait]
impl CatalogReader for PgCatalogReader {
    async fn can_drop(&self, table: &TableRef, caller: Option<&str>) -> Result<bool> {
        let caller = match caller {
            Some(c) => c.to_string(),
            None => self.session_user().await?,
        };

        let owner_row = sqlx::query(
            r#"
            SELECT u.usename AS owner
            FROM pg_class c
            JOIN pg_namespace n ON n.oid = c.relnamespace
            JOIN pg_user u ON u.usesysid = c.relowner
            WHERE n.nspname = $1 AND c.relname = $2 AND c.relkind = 'r'
            "#,
        )
        .bind(&table.schema)
        .bind(&table.name)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        let owner: String = match owner_row {
            Some(row) => row.get("owner"),
            None => {
                return Err(Error::Validation(format!(
                    "Table {} does not exist!",
                    table
                )))
            }
        };

        if owner == caller {
            return Ok(true);
        }

        // Not the owner: a superuser may still drop.
        let super_row = sqlx::query("SELECT usesuper FROM pg_user WHERE usename = $1")
            .bind(&caller)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(super_row
            .map(|row| row.get::<bool, _>("usesuper"))
            .unwrap_or(false))
    }

    async fn dependent_views(&self, table: &TableRef) -> Result<Vec<String>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT vn.nspname AS view_schema, v.relname AS view_name
            FROM pg_depend d
            JOIN pg_rewrite r ON r.oid = d.objid
            JOIN pg_class v ON v.oid = r.ev_class
            JOIN pg_namespace vn ON vn.oid = v.relnamespace
            JOIN pg_class t ON t.oid = d.refobjid
            JOIN pg_namespace tn ON tn.oid = t.relnamespace
            WHERE v.relkind = 'v'
              AND v.oid <> t.oid
              AND tn.nspname = $1
              AND t.relname = $2
            ORDER BY 1, 2
            "#,
        )
        .bind(&table.schema)
        .bind(&table.name)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let views: Vec<String> = rows
            .iter()
            .map(|row| {
                format!(
                    "{}.{}",
                    row.get::<String, _>("view_schema"),
                    row.get::<String, _>("view_name")
                )
            })
            .collect();

        debug!(
            subsystem = "db",
            component = "catalog",
            op = "dependent_views",
            table = %table,
            view_count = views.len(),
            "Dependent view lookup"
        );
        Ok(views)
    }

    async fn foreign_key_edges(&self, table: &TableRef) -> Result<Vec<ConstraintEdge>> {
        // Single-column constraints only (conkey[1]/confkey[1]); the
        // archive protocol does not support compound foreign keys.
        let rows = sqlx::query(
            r#"
            SELECT sn.nspname AS schema_name,
                   src.relname AS table_name,
                   con.conname AS constraint_name,
                   sa.attname AS column_name,
                   ra.attname AS ref_column_name
            FROM pg_constraint con
            JOIN pg_class src ON src.oid = con.conrelid
            JOIN pg_namespace sn ON sn.oid = src.relnamespace
            JOIN pg_class ref ON ref.oid = con.confrelid
            JOIN pg_namespace rn ON rn.oid = ref.relnamespace
            LEFT JOIN pg_attribute sa
                ON sa.attrelid = con.conrelid AND sa.attnum = con.conkey[1]
            LEFT JOIN pg_attribute ra
                ON ra.attrelid = con.confrelid AND ra.attnum = con.confkey[1]
            WHERE con.contype = 'f'
              AND rn.nspname = $1
              AND ref.relname = $2
            ORDER BY sn.nspname, src.relname, con.conname
            "#,
        )
        .bind(&table.schema)
        .bind(&table.name)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        // NULL attributes map to empty strings; the constraint resolver
        // treats an empty field as a fatal consistency error.
        Ok(rows
            .iter()
            .map(|row| ConstraintEdge {
                schema_name: row.get("schema_name"),
                table_name: row.get("table_name"),
                constraint_name: row.get("constraint_name"),
                column_name: row
                    .get::<Option<String>, _>("column_name")
                    .unwrap_or_default(),
                ref_column_name: row
                    .get::<Option<String>, _>("ref_column_name")
                    .unwrap_or_default(),
            })
            .collect())
    }
}
