//! Data model for the archive/restore protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A schema-qualified warehouse table reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    /// Schema the table lives in.
    pub schema: String,
    /// Table name without schema qualification.
    pub name: String,
}

impl TableRef {
    /// Create a new table reference.
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Unquoted `schema.table` form, used in messages and log fields.
    pub fn dotted(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Object store destination: bucket plus key prefix.
///
/// Artifact keys are derived deterministically from the prefix, so the
/// prefix is stored verbatim (callers usually terminate it with `/`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLocation {
    pub bucket: String,
    pub prefix: String,
}

impl StorageLocation {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Key of the DDL artifact under this prefix.
    pub fn ddl_key(&self) -> String {
        format!("{}ddl", self.prefix)
    }

    /// Key of the permission artifact under this prefix.
    pub fn permissions_key(&self) -> String {
        format!("{}permissions.sql", self.prefix)
    }

    /// Key of the unload manifest under this prefix.
    pub fn manifest_key(&self) -> String {
        format!("{}manifest", self.prefix)
    }

    /// `s3://bucket/key` form for results and generated SQL.
    pub fn url_for(&self, key: &str) -> String {
        format!("s3://{}/{}", self.bucket, key)
    }
}

/// Access/secret key pair for the object store, embedded (escaped) into
/// warehouse bulk-load syntax.
#[derive(Clone, Serialize, Deserialize)]
pub struct StorageCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl StorageCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }
}

// Secrets never appear in Debug output or logs.
impl std::fmt::Debug for StorageCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

/// One column of a table's structural snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: String,
    /// 1-based ordinal position.
    pub position: i32,
    pub encoding: Option<String>,
    pub nullable: bool,
}

/// Structural snapshot of a table, maintained by the snapshot refresher
/// and copied into the [`ArchiveRecord`] at archive time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub size_in_mb: Option<i64>,
    pub dist_style: Option<String>,
    pub dist_key: Option<String>,
    pub sort_style: Option<String>,
    /// Sort keys in declared order.
    pub sort_keys: Vec<String>,
    pub has_col_encodings: bool,
    pub table_comment: Option<String>,
    pub columns: Vec<ColumnDef>,
}

/// One persisted record per archived table, keyed by (schema, table).
///
/// Created or overwritten by a successful archive; read and destroyed by a
/// successful restore. At most one live record per table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub schema_name: String,
    pub table_name: String,
    pub archive_bucket: String,
    pub archive_prefix: String,
    pub size_in_mb: Option<i64>,
    pub dist_style: Option<String>,
    pub dist_key: Option<String>,
    pub sort_style: Option<String>,
    pub sort_keys: Vec<String>,
    pub has_col_encodings: bool,
    pub table_comment: Option<String>,
    pub columns: Vec<ColumnDef>,
    pub archived_at: DateTime<Utc>,
}

impl ArchiveRecord {
    /// Build a record from a destination and a structural snapshot.
    pub fn from_snapshot(
        table: &TableRef,
        destination: &StorageLocation,
        snapshot: &TableSnapshot,
    ) -> Self {
        Self {
            schema_name: table.schema.clone(),
            table_name: table.name.clone(),
            archive_bucket: destination.bucket.clone(),
            archive_prefix: destination.prefix.clone(),
            size_in_mb: snapshot.size_in_mb,
            dist_style: snapshot.dist_style.clone(),
            dist_key: snapshot.dist_key.clone(),
            sort_style: snapshot.sort_style.clone(),
            sort_keys: snapshot.sort_keys.clone(),
            has_col_encodings: snapshot.has_col_encodings,
            table_comment: snapshot.table_comment.clone(),
            columns: snapshot.columns.clone(),
            archived_at: Utc::now(),
        }
    }

    /// Location the record's artifacts live under.
    pub fn location(&self) -> StorageLocation {
        StorageLocation::new(&self.archive_bucket, &self.archive_prefix)
    }

    /// Table this record belongs to.
    pub fn table(&self) -> TableRef {
        TableRef::new(&self.schema_name, &self.table_name)
    }
}

/// One foreign-key edge whose referenced table is the archive target.
/// Computed at archive time only; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintEdge {
    /// Schema of the referencing table.
    pub schema_name: String,
    /// Referencing table.
    pub table_name: String,
    /// Constraint name on the referencing table.
    pub constraint_name: String,
    /// Referencing column. Compound keys are unsupported.
    pub column_name: String,
    /// Referenced column on the archive target.
    pub ref_column_name: String,
}

/// Formatting flags for the UNLOAD statement.
///
/// All boolean flags default off; `null_as` has no default. The `null_as`
/// value is escaped before interpolation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnloadOptions {
    pub allowoverwrite: bool,
    pub gzip: bool,
    pub addquotes: bool,
    pub escape: bool,
    pub null_as: Option<String>,
}

/// Formatting flags for the COPY statement.
///
/// All boolean flags default off; `null_as` has no default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyOptions {
    pub gzip: bool,
    pub removequotes: bool,
    pub escape: bool,
    pub null_as: Option<String>,
}

/// Structural overrides handed to the schema exporter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaExportOverrides {
    /// Leave out dependent objects (FKs are recreated separately).
    pub skip_dependencies: bool,
    /// Strip column encodings from the emitted DDL.
    pub no_column_encoding: bool,
    pub diststyle_override: Option<String>,
    pub distkey_override: Option<String>,
    pub sortstyle_override: Option<String>,
    pub sortkeys_override: Option<Vec<String>>,
}

/// Options controlling one archive run.
#[derive(Debug, Clone, Default)]
pub struct ArchiveOptions {
    /// Export artifacts and commit metadata, but leave the live table in
    /// place (no permission check, no dependent-view check, no DROP).
    pub skip_drop: bool,
    /// Bypass the drop-grant check. Intended for test contexts only.
    pub skip_permission_check: bool,
    /// Caller identity for the drop-grant check; the session user when unset.
    pub caller: Option<String>,
    pub unload: UnloadOptions,
    pub schema_overrides: SchemaExportOverrides,
}

/// Inputs for one archive run.
#[derive(Debug, Clone)]
pub struct ArchiveRequest {
    pub table: TableRef,
    pub destination: StorageLocation,
    pub credentials: StorageCredentials,
    pub options: ArchiveOptions,
}

/// Object-store locations of the three artifacts a successful archive wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveOutcome {
    pub ddl_file: String,
    pub manifest_file: String,
    pub permissions_file: String,
}

/// Options controlling one restore run.
#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    pub copy: CopyOptions,
}

/// Inputs for one restore run.
#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub table: TableRef,
    pub source: StorageLocation,
    pub credentials: StorageCredentials,
    pub options: RestoreOptions,
}

/// The restored table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreOutcome {
    pub schema: String,
    pub table: String,
}

/// Warehouse-wide credential configuration, passed explicitly into each
/// orchestrator instead of looked up from ambient globals.
#[derive(Debug, Clone, Default)]
pub struct WarehouseAccessConfig {
    /// The environment's default access key. A request supplying a
    /// different key is treated as carrying per-archive credentials.
    pub default_access_key: Option<String>,
    /// IAM role ARN used for bulk loads when no per-archive keys are given.
    pub iam_role: Option<String>,
}

impl WarehouseAccessConfig {
    /// Read the configuration from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `AWS_ACCESS_KEY_ID` | Environment default access key |
    /// | `WAREHOUSE_IAM_ROLE` | IAM role ARN for bulk loads |
    pub fn from_env() -> Self {
        Self {
            default_access_key: std::env::var("AWS_ACCESS_KEY_ID").ok(),
            iam_role: std::env::var("WAREHOUSE_IAM_ROLE").ok(),
        }
    }

    /// Set the default access key.
    pub fn with_default_access_key(mut self, key: impl Into<String>) -> Self {
        self.default_access_key = Some(key.into());
        self
    }

    /// Set the IAM role ARN.
    pub fn with_iam_role(mut self, arn: impl Into<String>) -> Self {
        self.iam_role = Some(arn.into());
        self
    }
}

fn require(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("Empty {}!", what)));
    }
    Ok(())
}

impl ArchiveRequest {
    /// Validate required inputs. Fails before any side effect.
    pub fn validate(&self) -> Result<()> {
        require(&self.table.schema, "schema name")?;
        require(&self.table.name, "table name")?;
        require(&self.destination.bucket, "bucket name")?;
        require(&self.destination.prefix, "prefix name")?;
        require(&self.credentials.access_key_id, "access key")?;
        require(&self.credentials.secret_access_key, "secret key")?;
        Ok(())
    }
}

impl RestoreRequest {
    /// Validate required inputs. Fails before any side effect.
    pub fn validate(&self) -> Result<()> {
        require(&self.table.schema, "schema name")?;
        require(&self.table.name, "table name")?;
        require(&self.source.bucket, "bucket name")?;
        require(&self.source.prefix, "prefix name")?;
        require(&self.credentials.access_key_id, "access key")?;
        require(&self.credentials.secret_access_key, "secret key")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_keys_derive_from_prefix() {
        let loc = StorageLocation::new("b", "p/");
        assert_eq!(loc.ddl_key(), "p/ddl");
        assert_eq!(loc.permissions_key(), "p/permissions.sql");
        assert_eq!(loc.manifest_key(), "p/manifest");
        assert_eq!(loc.url_for("p/ddl"), "s3://b/p/ddl");
    }

    #[test]
    fn test_options_default_off() {
        let unload = UnloadOptions::default();
        assert!(!unload.allowoverwrite && !unload.gzip && !unload.addquotes && !unload.escape);
        assert!(unload.null_as.is_none());

        let copy = CopyOptions::default();
        assert!(!copy.gzip && !copy.removequotes && !copy.escape);
        assert!(copy.null_as.is_none());
    }

    #[test]
    fn test_archive_request_validation() {
        let mut req = ArchiveRequest {
            table: TableRef::new("s", "t"),
            destination: StorageLocation::new("b", "p/"),
            credentials: StorageCredentials::new("ak", "sk"),
            options: ArchiveOptions::default(),
        };
        assert!(req.validate().is_ok());

        req.destination.bucket = "".into();
        let err = req.validate().unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Empty bucket name!");
    }

    #[test]
    fn test_restore_request_validation() {
        let req = RestoreRequest {
            table: TableRef::new("s", ""),
            source: StorageLocation::new("b", "p/"),
            credentials: StorageCredentials::new("ak", "sk"),
            options: RestoreOptions::default(),
        };
        let err = req.validate().unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Empty table name!");
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let creds = StorageCredentials::new("AKIA123", "supersecret");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("AKIA123"));
        assert!(!debug.contains("supersecret"));
    }

    #[test]
    fn test_record_from_snapshot_copies_structure() {
        let snapshot = TableSnapshot {
            size_in_mb: Some(1024),
            dist_style: Some("KEY".into()),
            dist_key: Some("id".into()),
            sort_style: Some("COMPOUND".into()),
            sort_keys: vec!["created_at".into(), "id".into()],
            has_col_encodings: true,
            table_comment: Some("cold data".into()),
            columns: vec![ColumnDef {
                name: "id".into(),
                data_type: "bigint".into(),
                position: 1,
                encoding: Some("az64".into()),
                nullable: false,
            }],
        };
        let record = ArchiveRecord::from_snapshot(
            &TableRef::new("s", "t"),
            &StorageLocation::new("b", "p/"),
            &snapshot,
        );
        assert_eq!(record.schema_name, "s");
        assert_eq!(record.sort_keys, vec!["created_at", "id"]);
        assert_eq!(record.location(), StorageLocation::new("b", "p/"));
        assert_eq!(record.table(), TableRef::new("s", "t"));
    }
}
