//! Drift detection between local files and the changelog.

use crate::error::{MigrateError, Result};
use crate::migration::{AppliedMigration, FileMigration};

/// Ensures the applied migrations are an ordered prefix of the local ones.
///
/// Both slices must be sorted ascending by ID, as returned by
/// [`crate::loader::load_migrations`] and
/// [`crate::history::get_applied_migrations`].
pub fn ensure_consistent_migrations(
    file_migrations: &[FileMigration],
    applied_migrations: &[AppliedMigration],
) -> Result<()> {
    for (idx, applied) in applied_migrations.iter().enumerate() {
        let matches = file_migrations
            .get(idx)
            .is_some_and(|file| file.id == applied.id);
        if matches {
            continue;
        }

        if idx == 0 {
            return Err(MigrateError::OutOfSyncAtFirst);
        }
        return Err(MigrateError::OutOfSyncAfter {
            last_good: file_migrations[idx - 1].id.clone(),
        });
    }
    Ok(())
}
