//! SQL generation choke point.
//!
//! Every value interpolated into generated warehouse SQL (bucket, prefix,
//! access key, secret key, null literal, comment text) passes through
//! [`escape_literal`]; every identifier passes through [`quote_ident`].
//! Credentials are escaped even though they come from configuration:
//! a misconfigured value must not be able to change statement structure.

use regex::Regex;

use crate::models::{
    CopyOptions, StorageCredentials, StorageLocation, TableRef, UnloadOptions,
    WarehouseAccessConfig,
};

/// Escape a string literal for single-quoted SQL interpolation by
/// doubling embedded single quotes.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Quote an identifier by wrapping it in double quotes, doubling any
/// embedded double quotes.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Fully quoted `"schema"."table"` form.
pub fn full_table_name(table: &TableRef) -> String {
    format!("{}.{}", quote_ident(&table.schema), quote_ident(&table.name))
}

/// Build the credential clause for a bulk load/unload.
///
/// Priority: an explicit key pair when the supplied access key differs
/// from the environment default, else the configured IAM role, else the
/// explicit key pair. This lets per-archive keys and warehouse-wide
/// role-based access coexist transparently.
pub fn credentials_clause(
    credentials: &StorageCredentials,
    config: &WarehouseAccessConfig,
) -> String {
    let access_key = credentials.access_key_id.as_str();
    let keys_differ = !access_key.is_empty()
        && config.default_access_key.as_deref() != Some(access_key);

    if keys_differ {
        key_pair_clause(credentials)
    } else if let Some(role) = config.iam_role.as_deref().filter(|r| !r.is_empty()) {
        format!("IAM_ROLE '{}'", escape_literal(role))
    } else {
        key_pair_clause(credentials)
    }
}

fn key_pair_clause(credentials: &StorageCredentials) -> String {
    format!(
        "CREDENTIALS 'aws_access_key_id={};aws_secret_access_key={}'",
        escape_literal(&credentials.access_key_id),
        escape_literal(&credentials.secret_access_key),
    )
}

fn render_unload_options(options: &UnloadOptions) -> String {
    let mut flags = Vec::new();
    if options.allowoverwrite {
        flags.push("ALLOWOVERWRITE".to_string());
    }
    if options.gzip {
        flags.push("GZIP".to_string());
    }
    if options.addquotes {
        flags.push("ADDQUOTES".to_string());
    }
    if options.escape {
        flags.push("ESCAPE".to_string());
    }
    if let Some(null_as) = &options.null_as {
        flags.push(format!("NULL AS '{}'", escape_literal(null_as)));
    }
    flags.join(" ")
}

fn render_copy_options(options: &CopyOptions) -> String {
    let mut flags = Vec::new();
    if options.gzip {
        flags.push("GZIP".to_string());
    }
    if options.removequotes {
        flags.push("REMOVEQUOTES".to_string());
    }
    if options.escape {
        flags.push("ESCAPE".to_string());
    }
    if let Some(null_as) = &options.null_as {
        flags.push(format!("NULL AS '{}'", escape_literal(null_as)));
    }
    flags.join(" ")
}

/// `UNLOAD ('SELECT * FROM <table>') TO 's3://…' … MANIFEST <flags>;`
pub fn unload_statement(
    table: &TableRef,
    destination: &StorageLocation,
    credentials: &StorageCredentials,
    options: &UnloadOptions,
) -> String {
    let flags = render_unload_options(options);
    format!(
        "UNLOAD ('SELECT * FROM {table}') \
         TO 's3://{bucket}/{prefix}' \
         {credentials} \
         MANIFEST{space}{flags};",
        table = full_table_name(table),
        bucket = escape_literal(&destination.bucket),
        prefix = escape_literal(&destination.prefix),
        credentials = key_pair_clause(credentials),
        space = if flags.is_empty() { "" } else { " " },
        flags = flags,
    )
}

/// `COPY <table> FROM 's3://…/manifest' <credentials> MANIFEST EXPLICIT_IDS <flags>;`
///
/// `EXPLICIT_IDS` keeps identity-column values from the unloaded data
/// instead of regenerating them.
pub fn copy_statement(
    table: &TableRef,
    source: &StorageLocation,
    credentials_clause: &str,
    options: &CopyOptions,
) -> String {
    let flags = render_copy_options(options);
    format!(
        "COPY {table} \
         FROM 's3://{bucket}/{manifest}' \
         {credentials} \
         MANIFEST EXPLICIT_IDS{space}{flags};",
        table = full_table_name(table),
        bucket = escape_literal(&source.bucket),
        manifest = escape_literal(&source.manifest_key()),
        credentials = credentials_clause,
        space = if flags.is_empty() { "" } else { " " },
        flags = flags,
    )
}

/// `LOCK <table>;` serializes concurrent writers ahead of the COPY.
pub fn lock_statement(table: &TableRef) -> String {
    format!("LOCK {};", full_table_name(table))
}

/// `DROP TABLE <table>;`
pub fn drop_table_statement(table: &TableRef) -> String {
    format!("DROP TABLE {};", full_table_name(table))
}

/// `COMMENT ON TABLE <table> IS '<escaped>';`
pub fn comment_statement(table: &TableRef, comment: &str) -> String {
    format!(
        "COMMENT ON TABLE {} IS '{}';",
        full_table_name(table),
        escape_literal(comment)
    )
}

/// Count `CREATE TABLE` occurrences, case-insensitive. An exported DDL
/// artifact is valid only when this returns exactly 1.
pub fn count_create_table(ddl: &str) -> usize {
    // The pattern is fixed, so compilation cannot fail.
    let re = Regex::new(r"(?i)CREATE\s+TABLE").unwrap();
    re.find_iter(ddl).count()
}

/// Extract the CREATE TABLE statement for exactly the requested table.
///
/// Scans from the opening `CREATE TABLE "<schema>"."<table>"` through the
/// final statement delimiter, so recreation statements appended to the
/// artifact (foreign keys, table comment) travel with it. Returns `None`
/// when the quoted identifiers do not match exactly.
pub fn extract_create_table(ddl: &str, table: &TableRef) -> Option<String> {
    let pattern = format!(
        r#"(?s)CREATE TABLE {}\.{}.*;"#,
        regex::escape(&quote_ident(&table.schema)),
        regex::escape(&quote_ident(&table.name)),
    );
    // Identifiers are regex-escaped above; the surrounding pattern is fixed.
    let re = Regex::new(&pattern).unwrap();
    re.find(ddl).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableRef {
        TableRef::new("analytics", "events")
    }

    #[test]
    fn test_escape_literal_doubles_single_quotes() {
        assert_eq!(escape_literal("o'brien"), "o''brien");
        assert_eq!(escape_literal("no quotes"), "no quotes");
        assert_eq!(escape_literal("''"), "''''");
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("events"), "\"events\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_full_table_name() {
        assert_eq!(full_table_name(&table()), "\"analytics\".\"events\"");
    }

    #[test]
    fn test_unload_statement_shape() {
        let sql = unload_statement(
            &table(),
            &StorageLocation::new("bkt", "pre/"),
            &StorageCredentials::new("AK", "SK"),
            &UnloadOptions {
                allowoverwrite: true,
                gzip: true,
                addquotes: false,
                escape: true,
                null_as: Some("NULL".into()),
            },
        );
        assert!(sql.starts_with("UNLOAD ('SELECT * FROM \"analytics\".\"events\"')"));
        assert!(sql.contains("TO 's3://bkt/pre/'"));
        assert!(sql.contains("CREDENTIALS 'aws_access_key_id=AK;aws_secret_access_key=SK'"));
        assert!(sql.contains("MANIFEST ALLOWOVERWRITE GZIP ESCAPE NULL AS 'NULL';"));
        assert!(!sql.contains("ADDQUOTES"));
    }

    #[test]
    fn test_unload_statement_no_flags() {
        let sql = unload_statement(
            &table(),
            &StorageLocation::new("bkt", "pre/"),
            &StorageCredentials::new("AK", "SK"),
            &UnloadOptions::default(),
        );
        assert!(sql.ends_with("MANIFEST;"));
    }

    #[test]
    fn test_unload_escapes_injection_in_null_as() {
        let sql = unload_statement(
            &table(),
            &StorageLocation::new("bkt", "pre/"),
            &StorageCredentials::new("AK", "SK"),
            &UnloadOptions {
                null_as: Some("x'; DROP TABLE \"analytics\".\"events\"; --".into()),
                ..Default::default()
            },
        );
        assert!(sql.contains("NULL AS 'x''; DROP TABLE"));
    }

    #[test]
    fn test_unload_escapes_credentials() {
        let sql = unload_statement(
            &table(),
            &StorageLocation::new("bkt", "pre/"),
            &StorageCredentials::new("AK", "S'K"),
            &UnloadOptions::default(),
        );
        assert!(sql.contains("aws_secret_access_key=S''K"));
    }

    #[test]
    fn test_copy_statement_shape() {
        let source = StorageLocation::new("bkt", "pre/");
        let creds = StorageCredentials::new("AK", "SK");
        let clause = credentials_clause(&creds, &WarehouseAccessConfig::default());
        let sql = copy_statement(
            &table(),
            &source,
            &clause,
            &CopyOptions {
                gzip: true,
                removequotes: true,
                escape: false,
                null_as: None,
            },
        );
        assert!(sql.starts_with("COPY \"analytics\".\"events\""));
        assert!(sql.contains("FROM 's3://bkt/pre/manifest'"));
        assert!(sql.contains("MANIFEST EXPLICIT_IDS GZIP REMOVEQUOTES;"));
    }

    #[test]
    fn test_credentials_clause_prefers_explicit_keys() {
        let config = WarehouseAccessConfig::default()
            .with_default_access_key("DEFAULT")
            .with_iam_role("arn:aws:iam::1:role/load");
        let clause = credentials_clause(&StorageCredentials::new("CUSTOM", "SK"), &config);
        assert!(clause.starts_with("CREDENTIALS"));
        assert!(clause.contains("CUSTOM"));
    }

    #[test]
    fn test_credentials_clause_falls_back_to_iam_role() {
        let config = WarehouseAccessConfig::default()
            .with_default_access_key("DEFAULT")
            .with_iam_role("arn:aws:iam::1:role/load");
        let clause = credentials_clause(&StorageCredentials::new("DEFAULT", "SK"), &config);
        assert_eq!(clause, "IAM_ROLE 'arn:aws:iam::1:role/load'");
    }

    #[test]
    fn test_credentials_clause_keys_when_no_role() {
        let config = WarehouseAccessConfig::default().with_default_access_key("DEFAULT");
        let clause = credentials_clause(&StorageCredentials::new("DEFAULT", "SK"), &config);
        assert!(clause.contains("aws_access_key_id=DEFAULT"));
    }

    #[test]
    fn test_comment_statement_escapes() {
        let sql = comment_statement(&table(), "user's events");
        assert_eq!(
            sql,
            "COMMENT ON TABLE \"analytics\".\"events\" IS 'user''s events';"
        );
    }

    #[test]
    fn test_count_create_table() {
        assert_eq!(count_create_table(""), 0);
        assert_eq!(count_create_table("CREATE TABLE \"s\".\"t\" (id int);"), 1);
        assert_eq!(
            count_create_table("create table a (x int); CREATE  TABLE b (y int);"),
            2
        );
    }

    #[test]
    fn test_extract_create_table_exact_match() {
        let ddl = "CREATE TABLE \"s\".\"t\" (\n  id bigint\n);\nALTER TABLE \"o\".\"r\" ADD CONSTRAINT \"fk\" FOREIGN KEY (\"tid\") REFERENCES \"s\".\"t\" (\"id\");";
        let stmt = extract_create_table(ddl, &TableRef::new("s", "t")).unwrap();
        // Greedy to the final delimiter: appended recreation statements travel along.
        assert!(stmt.contains("ADD CONSTRAINT"));
        assert!(stmt.starts_with("CREATE TABLE \"s\".\"t\""));
    }

    #[test]
    fn test_extract_create_table_rejects_mismatched_identifiers() {
        let ddl = "CREATE TABLE \"other\".\"t\" (id bigint);";
        assert!(extract_create_table(ddl, &TableRef::new("s", "t")).is_none());
    }

    #[test]
    fn test_extract_create_table_ident_with_regex_metachars() {
        let ddl = "CREATE TABLE \"s\".\"t.v2\" (id bigint);";
        let stmt = extract_create_table(ddl, &TableRef::new("s", "t.v2")).unwrap();
        assert!(stmt.starts_with("CREATE TABLE \"s\".\"t.v2\""));
        // The dot must not act as a wildcard.
        let ddl2 = "CREATE TABLE \"s\".\"tXv2\" (id bigint);";
        assert!(extract_create_table(ddl2, &TableRef::new("s", "t.v2")).is_none());
    }
}
