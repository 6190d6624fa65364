//! Artifact exporters: DDL reconstruction and grant replay.
//!
//! The schema exporter renders exactly one CREATE TABLE statement from the
//! structural snapshot; the permission exporter turns the table's ACL into
//! a grant-replay script. Both write their artifact through the object
//! store so restore can replay them verbatim.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::info;

use permafrost_core::sql::{full_table_name, quote_ident};
use permafrost_core::{
    Error, ObjectStore, PermissionExporter, Result, SchemaExporter, SchemaExportOverrides,
    SnapshotStore, TableRef, TableSnapshot,
};

/// Normalize a catalog diststyle value (`KEY(id)`, `EVEN`, `ALL`) to the
/// DDL keyword.
fn normalize_diststyle(raw: &str) -> String {
    raw.split('(').next().unwrap_or(raw).trim().to_uppercase()
}

/// Render one CREATE TABLE statement from a structural snapshot.
pub fn render_create_table(
    table: &TableRef,
    snapshot: &TableSnapshot,
    overrides: &SchemaExportOverrides,
) -> Result<String> {
    if snapshot.columns.is_empty() {
        return Err(Error::SchemaExport(format!(
            "No column snapshot for {}",
            table
        )));
    }

    let mut column_lines = Vec::with_capacity(snapshot.columns.len());
    for column in &snapshot.columns {
        let mut line = format!("    {} {}", quote_ident(&column.name), column.data_type);
        if !overrides.no_column_encoding {
            if let Some(encoding) = &column.encoding {
                line.push_str(&format!(" ENCODE {}", encoding));
            }
        }
        if !column.nullable {
            line.push_str(" NOT NULL");
        }
        column_lines.push(line);
    }

    let dist_style = overrides
        .diststyle_override
        .clone()
        .or_else(|| snapshot.dist_style.as_deref().map(normalize_diststyle));
    let dist_key = overrides
        .distkey_override
        .clone()
        .or_else(|| snapshot.dist_key.clone());
    let sort_style = overrides
        .sortstyle_override
        .clone()
        .or_else(|| snapshot.sort_style.clone());
    let sort_keys = overrides
        .sortkeys_override
        .clone()
        .unwrap_or_else(|| snapshot.sort_keys.clone());

    let mut ddl = format!(
        "CREATE TABLE {} (\n{}\n)",
        full_table_name(table),
        column_lines.join(",\n")
    );
    if let Some(style) = dist_style.filter(|s| !s.is_empty()) {
        ddl.push_str(&format!("\nDISTSTYLE {}", style));
    }
    if let Some(key) = dist_key {
        ddl.push_str(&format!("\nDISTKEY({})", quote_ident(&key)));
    }
    if !sort_keys.is_empty() {
        let quoted: Vec<String> = sort_keys.iter().map(|k| quote_ident(k)).collect();
        ddl.push_str(&format!(
            "\n{} SORTKEY({})",
            sort_style.as_deref().unwrap_or("COMPOUND"),
            quoted.join(", ")
        ));
    }
    ddl.push(';');
    Ok(ddl)
}

/// Schema exporter backed by the structural snapshot store.
pub struct PgSchemaExporter {
    snapshots: Arc<dyn SnapshotStore>,
    store: Arc<dyn ObjectStore>,
}

impl PgSchemaExporter {
    pub fn new(snapshots: Arc<dyn SnapshotStore>, store: Arc<dyn ObjectStore>) -> Self {
        Self { snapshots, store }
    }
}

#[async_trait]
impl SchemaExporter for PgSchemaExporter {
    async fn export(
        &self,
        table: &TableRef,
        bucket: &str,
        key: &str,
        overrides: &SchemaExportOverrides,
    ) -> Result<()> {
        let snapshot = match self.snapshots.fetch(table).await? {
            Some(snapshot) => snapshot,
            None => {
                self.snapshots.refresh(table).await?;
                self.snapshots.fetch(table).await?.ok_or_else(|| {
                    Error::SchemaExport(format!("No structural snapshot for {}", table))
                })?
            }
        };

        let ddl = render_create_table(table, &snapshot, overrides)?;
        self.store.put(bucket, key, ddl.as_bytes()).await?;

        info!(
            subsystem = "db",
            component = "exporters",
            op = "schema_export",
            table = %table,
            bucket = bucket,
            key = key,
            "DDL artifact written"
        );
        Ok(())
    }
}

/// One parsed ACL entry: grantee plus privilege keywords.
#[derive(Debug, PartialEq, Eq)]
pub struct AclGrant {
    pub grantee: String,
    pub is_group: bool,
    pub is_public: bool,
    pub privileges: Vec<&'static str>,
}

/// Parse one `aclitem` text entry, e.g. `alice=arwd/bob` or `=r/bob`
/// (PUBLIC) or `group analysts=r/bob`.
pub fn parse_acl_entry(entry: &str) -> Option<AclGrant> {
    let entry = entry.trim().trim_matches('"');
    let (grantee_part, rest) = entry.split_once('=')?;
    let privs_part = rest.split('/').next().unwrap_or(rest);

    let (grantee, is_group) = match grantee_part.strip_prefix("group ") {
        Some(name) => (name.to_string(), true),
        None => (grantee_part.to_string(), false),
    };
    let is_public = grantee.is_empty();

    let mut privileges = Vec::new();
    for c in privs_part.chars() {
        let keyword = match c {
            'r' => "SELECT",
            'a' => "INSERT",
            'w' => "UPDATE",
            'd' => "DELETE",
            'x' => "REFERENCES",
            'R' => "RULE",
            't' => "TRIGGER",
            'D' => "TRUNCATE",
            '*' => continue, // grant option marker
            _ => continue,
        };
        privileges.push(keyword);
    }
    if privileges.is_empty() {
        return None;
    }
    Some(AclGrant {
        grantee,
        is_group,
        is_public,
        privileges,
    })
}

/// Render the grant-replay script: owner first, then one GRANT per ACL entry.
pub fn render_permission_script(table: &TableRef, owner: &str, acl_entries: &[&str]) -> String {
    let target = full_table_name(table);
    let mut statements = vec![format!(
        "ALTER TABLE {} OWNER TO {};",
        target,
        quote_ident(owner)
    )];

    for entry in acl_entries {
        if let Some(grant) = parse_acl_entry(entry) {
            let to = if grant.is_public {
                "PUBLIC".to_string()
            } else if grant.is_group {
                format!("GROUP {}", quote_ident(&grant.grantee))
            } else {
                quote_ident(&grant.grantee)
            };
            statements.push(format!(
                "GRANT {} ON {} TO {};",
                grant.privileges.join(", "),
                target,
                to
            ));
        }
    }
    statements.join("\n")
}

/// Permission exporter backed by `pg_class.relacl`.
pub struct PgPermissionExporter {
    pool: PgPool,
    store: Arc<dyn ObjectStore>,
}

impl PgPermissionExporter {
    pub fn new(pool: PgPool, store: Arc<dyn ObjectStore>) -> Self {
        Self { pool, store }
    }
}

#[async_trait]
impl PermissionExporter for PgPermissionExporter {
    async fn export(&self, table: &TableRef, bucket: &str, key: &str) -> Result<()> {
        let row = sqlx::query(
            r#"
            SELECT u.usename AS owner,
                   array_to_string(c.relacl, E'\n') AS acl
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

        let Some(row) = row else {
            return Err(Error::Validation(format!(
                "Table {} does not exist!",
                table
            )));
        };

        let owner: String = row.get("owner");
        let acl: Option<String> = row.get("acl");
        let entries: Vec<&str> = acl
            .as_deref()
            .map(|a| a.lines().filter(|l| !l.is_empty()).collect())
            .unwrap_or_default();

        let script = render_permission_script(table, &owner, &entries);
        self.store.put(bucket, key, script.as_bytes()).await?;

        info!(
            subsystem = "db",
            component = "exporters",
            op = "permission_export",
            table = %table,
            bucket = bucket,
            key = key,
            grant_count = entries.len(),
            "Permission artifact written"
        );
        Ok(())
    }
}
