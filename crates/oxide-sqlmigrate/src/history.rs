//! Migration history tracking.
//!
//! This module manages the changelog table that records which migrations
//! have been applied to the database.

use tracing::info;

use crate::driver::Connection;
use crate::error::{MigrateError, Result};
use crate::migration::{AppliedMigration, FileMigration};

/// Default changelog table.
pub const DEFAULT_CHANGELOG_TABLE: &str = "public.migrations_changelog";

/// SQL to create the changelog table.
#[must_use]
pub fn create_changelog_sql(table: &str) -> String {
    format!(
        "CREATE TABLE {table} (\n    \
             id VARCHAR(14) NOT NULL PRIMARY KEY,\n    \
             name TEXT NOT NULL,\n    \
             applied_at TIMESTAMPTZ NOT NULL\n\
         );"
    )
}

/// SQL recording `migration` as applied now.
#[must_use]
pub fn insert_changelog_sql(table: &str, migration: &FileMigration) -> String {
    format!(
        "INSERT INTO {table} (id, name, applied_at) VALUES ({}, {}, now())",
        quote_literal(&migration.id),
        quote_literal(&migration.description),
    )
}

/// SQL removing the record of `migration`.
#[must_use]
pub fn delete_changelog_sql(table: &str, migration: &FileMigration) -> String {
    format!(
        "DELETE FROM {table} WHERE id = {}",
        quote_literal(&migration.id)
    )
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Splits `schema.table`, defaulting the schema to `public`.
fn split_table_name(table: &str) -> (&str, &str) {
    table.split_once('.').unwrap_or(("public", table))
}

/// Reads all applied migrations, sorted ascending by ID.
pub async fn get_applied_migrations<C: Connection>(
    conn: &C,
    table: &str,
) -> Result<Vec<AppliedMigration>> {
    let rows = conn
        .query_changelog(&format!(
            "SELECT id, name, applied_at FROM {table} ORDER BY id ASC"
        ))
        .await
        .map_err(MigrateError::ChangelogRead)?;

    Ok(rows
        .into_iter()
        .map(|(id, name, applied_at)| AppliedMigration {
            id,
            name,
            applied_at,
        })
        .collect())
}

/// Creates the changelog table unless it exists.
///
/// Returns whether the table was created.
pub async fn ensure_migrations_changelog<C: Connection>(conn: &C, table: &str) -> Result<bool> {
    let (schema, name) = split_table_name(table);
    let exists = conn
        .query_exists(&format!(
            "SELECT EXISTS (\n    \
                 SELECT FROM information_schema.tables\n    \
                 WHERE table_schema = {} AND table_name = {}\n\
             ) AS exists",
            quote_literal(schema),
            quote_literal(name),
        ))
        .await
        .map_err(MigrateError::ChangelogCheck)?;
    if exists {
        return Ok(false);
    }

    conn.execute(&create_changelog_sql(table))
        .await
        .map_err(MigrateError::ChangelogCreate)?;
    info!(table = %table, "Created migrations changelog");
    Ok(true)
}

/// Records a migration as applied.
pub async fn record_applied<C: Connection>(
    conn: &C,
    table: &str,
    migration: &FileMigration,
) -> Result<()> {
    conn.execute(&insert_changelog_sql(table, migration))
        .await
        .map_err(|source| MigrateError::ChangelogInsert {
            filename: migration.filename.clone(),
            source,
        })
}

/// Removes a migration record (for rollback).
pub async fn record_unapplied<C: Connection>(
    conn: &C,
    table: &str,
    migration: &FileMigration,
) -> Result<()> {
    conn.execute(&delete_changelog_sql(table, migration))
        .await
        .map_err(|source| MigrateError::ChangelogRemove {
            filename: migration.filename.clone(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migration() -> FileMigration {
        FileMigration {
            id: "20200101120000".to_string(),
            filename: "20200101120000_create_users.sql".to_string(),
            description: "create_users".to_string(),
            application: "users".to_string(),
            up_sql: "CREATE TABLE users (id INT);".to_string(),
            down_sql: "DROP TABLE users;".to_string(),
            verify_sql: "SELECT id FROM users;".to_string(),
            prepare_sql: None,
        }
    }

    #[test]
    fn test_insert_sql() {
        assert_eq!(
            insert_changelog_sql(DEFAULT_CHANGELOG_TABLE, &migration()),
            "INSERT INTO public.migrations_changelog (id, name, applied_at) \
             VALUES ('20200101120000', 'create_users', now())"
        );
    }

    #[test]
    fn test_delete_sql() {
        assert_eq!(
            delete_changelog_sql("app.changes", &migration()),
            "DELETE FROM app.changes WHERE id = '20200101120000'"
        );
    }

    #[test]
    fn test_create_sql_columns() {
        let sql = create_changelog_sql(DEFAULT_CHANGELOG_TABLE);
        assert!(sql.starts_with("CREATE TABLE public.migrations_changelog ("));
        assert!(sql.contains("id VARCHAR(14) NOT NULL PRIMARY KEY"));
        assert!(sql.contains("name TEXT NOT NULL"));
        assert!(sql.contains("applied_at TIMESTAMPTZ NOT NULL"));
    }

    #[test]
    fn test_split_table_name() {
        assert_eq!(
            split_table_name("public.migrations_changelog"),
            ("public", "migrations_changelog")
        );
        assert_eq!(split_table_name("changelog"), ("public", "changelog"));
    }

    #[test]
    fn test_quote_literal_escapes() {
        assert_eq!(quote_literal("it's"), "'it''s'");
    }
}
