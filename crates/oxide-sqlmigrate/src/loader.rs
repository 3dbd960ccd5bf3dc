//! Migration discovery.
//!
//! Migrations live one directory below the migrations root, grouped by
//! application:
//!
//! ```text
//! migrations/
//! ├── bootstrap.sql
//! ├── _environments/
//! │   └── development.yaml
//! └── users/
//!     ├── 20200101120000_create_users.sql
//!     ├── verify/20200101120000_create_users.sql
//!     └── prepare/20200101120000_create_users.sql
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::error::{MigrateError, Result};
use crate::migration::FileMigration;

/// Directory holding environment configuration, never an application.
pub const ENVIRONMENTS_DIR: &str = "_environments";

/// Loads every migration under `root`, sorted ascending by ID.
///
/// Fails on the first invalid file and when two files share an ID.
pub fn load_migrations(root: &Path) -> Result<Vec<FileMigration>> {
    let mut by_id: HashMap<String, FileMigration> = HashMap::new();

    for app_dir in read_dir(root)? {
        let app_name = app_dir.file_name();
        if app_name == ENVIRONMENTS_DIR || !app_dir.file_type().is_ok_and(|t| t.is_dir()) {
            continue;
        }

        let app_path = app_dir.path();
        for entry in read_dir(&app_path)? {
            if entry.file_type().is_ok_and(|t| t.is_dir()) {
                continue;
            }

            let migration = FileMigration::from_file(&entry.path())?;
            if let Some(previous) = by_id.get(&migration.id) {
                return Err(MigrateError::DuplicateId {
                    id: migration.id.clone(),
                    first: previous.filename.clone(),
                    second: migration.filename,
                });
            }
            debug!(
                id = %migration.id,
                application = %migration.application,
                "Loaded migration"
            );
            by_id.insert(migration.id.clone(), migration);
        }
    }

    let mut migrations: Vec<FileMigration> = by_id.into_values().collect();
    migrations.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(migrations)
}

fn read_dir(path: &Path) -> Result<Vec<fs::DirEntry>> {
    let to_error = |source| MigrateError::ReadDir {
        path: path.to_path_buf(),
        source,
    };
    let mut entries = fs::read_dir(path)
        .map_err(to_error)?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(to_error)?;
    entries.sort_by_key(fs::DirEntry::file_name);
    Ok(entries)
}
