//! Selection of the migrations to process.
//!
//! Count based selection relies on a consistent changelog (see
//! [`crate::consistency`]); text based selection does not.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::direction::Direction;
use crate::error::{MigrateError, Result};
use crate::migration::{AppliedMigration, FileMigration};

/// Selects the next `count` migrations (or all of them) in `direction`.
///
/// Up migrations are returned ascending by ID, down migrations descending
/// (most recently applied first). A `count` exceeding what is left is
/// clamped to all remaining migrations.
pub fn filter_migrations_by_count<'a>(
    count: usize,
    all: bool,
    direction: Direction,
    file_migrations: &'a [FileMigration],
    applied_migrations: &[AppliedMigration],
) -> Result<Vec<&'a FileMigration>> {
    match direction {
        Direction::Up => filter_up_by_count(count, all, file_migrations, applied_migrations),
        Direction::Down => filter_down_by_count(count, all, file_migrations, applied_migrations),
    }
}

fn filter_up_by_count<'a>(
    count: usize,
    mut all: bool,
    file_migrations: &'a [FileMigration],
    applied_migrations: &[AppliedMigration],
) -> Result<Vec<&'a FileMigration>> {
    let applied_count = applied_migrations.len();
    if applied_count >= file_migrations.len() {
        return Err(MigrateError::NothingToApply);
    }

    if count > 0 && applied_count + count > file_migrations.len() {
        warn!(
            count,
            remaining = file_migrations.len() - applied_count,
            "The received count is bigger than the remaining migrations. \
             All migrations will be applied."
        );
        all = true;
    }

    let selected = if all {
        &file_migrations[applied_count..]
    } else {
        &file_migrations[applied_count..applied_count + count]
    };
    Ok(selected.iter().collect())
}

fn filter_down_by_count<'a>(
    count: usize,
    mut all: bool,
    file_migrations: &'a [FileMigration],
    applied_migrations: &[AppliedMigration],
) -> Result<Vec<&'a FileMigration>> {
    let applied_count = applied_migrations.len();
    if applied_count == 0 {
        return Err(MigrateError::NothingToRemove);
    }

    if count > applied_count {
        warn!(
            count,
            applied = applied_count,
            "The received count is bigger than the applied migrations. \
             All migrations will be removed."
        );
        all = true;
    }

    let last_idx = if all { 0 } else { applied_count - count };
    let by_id: HashMap<&str, &FileMigration> = file_migrations
        .iter()
        .map(|m| (m.id.as_str(), m))
        .collect();

    applied_migrations[last_idx..]
        .iter()
        .rev()
        .map(|applied| {
            by_id
                .get(applied.id.as_str())
                .copied()
                .ok_or_else(|| MigrateError::NotFoundLocally {
                    id: applied.id.clone(),
                })
        })
        .collect()
}

/// Selects the single migration whose filename contains `filter`.
///
/// Up considers local migrations that are not applied yet. Down considers
/// applied migrations by the filename recorded in the changelog, and only
/// those still present locally.
pub fn filter_migrations_by_text<'a>(
    filter: &str,
    direction: Direction,
    file_migrations: &'a [FileMigration],
    applied_migrations: &[AppliedMigration],
) -> Result<&'a FileMigration> {
    let found = match direction {
        Direction::Up => {
            let applied_ids: HashSet<&str> =
                applied_migrations.iter().map(|m| m.id.as_str()).collect();
            file_migrations
                .iter()
                .filter(|m| m.filename.contains(filter) && !applied_ids.contains(m.id.as_str()))
                .collect::<Vec<_>>()
        }
        Direction::Down => {
            let by_id: HashMap<&str, &FileMigration> = file_migrations
                .iter()
                .map(|m| (m.id.as_str(), m))
                .collect();
            applied_migrations
                .iter()
                .filter(|m| m.filename().contains(filter))
                .filter_map(|m| by_id.get(m.id.as_str()).copied())
                .collect::<Vec<_>>()
        }
    };

    match found.as_slice() {
        [] => Err(MigrateError::NoFilterMatch {
            filter: filter.to_string(),
        }),
        [single] => Ok(*single),
        many => Err(MigrateError::MultipleFilterMatches {
            filter: filter.to_string(),
            matches: many.iter().map(|m| m.qualified_name()).collect(),
        }),
    }
}
