//! Seed script generation.
//!
//! A seed is a single SQL file that brings an empty database to the state
//! of all local migrations: changelog table, bootstrap script, then every up
//! script followed by its changelog record.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::Path;

use crate::error::{MigrateError, Result};
use crate::executor::{read_bootstrap, BOOTSTRAP_FILE};
use crate::history::{create_changelog_sql, insert_changelog_sql};
use crate::migration::FileMigration;

/// Renders the seed script for `file_migrations` (expected sorted by ID).
pub fn generate_seed_sql(
    migrations_path: &Path,
    changelog_table: &str,
    file_migrations: &[FileMigration],
) -> Result<String> {
    let mut seed = create_changelog_sql(changelog_table);
    seed.push('\n');

    if let Some(bootstrap) = read_bootstrap(&migrations_path.join(BOOTSTRAP_FILE))? {
        seed.push_str(bootstrap.trim_end());
        seed.push('\n');
    }

    for migration in file_migrations {
        seed.push_str(migration.up_sql.trim_end_matches(';'));
        seed.push_str(";\n");
        seed.push_str(&insert_changelog_sql(changelog_table, migration));
        seed.push_str(";\n");
    }
    Ok(seed)
}

/// Writes `seed` to `target`, refusing to overwrite an existing file.
pub fn write_seed_file(target: &Path, seed: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
        .map_err(|err| {
            if err.kind() == ErrorKind::AlreadyExists {
                MigrateError::SeedTargetExists(target.to_path_buf())
            } else {
                MigrateError::Io(err)
            }
        })?;
    file.write_all(seed.as_bytes())?;
    Ok(())
}
