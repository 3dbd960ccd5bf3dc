//! Migration records.
//!
//! A [`FileMigration`] is one migration found on disk together with its
//! verify (and optional prepare) script. An [`AppliedMigration`] is a row of
//! the changelog table.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::error::{MigrateError, Result};

/// Line separating the up script from the down script.
pub const UNDO_SEPARATOR: &str = "\n-- //@UNDO\n";

/// Directory holding the mandatory verify scripts of an application.
pub const VERIFY_DIR: &str = "verify";

/// Directory holding the optional prepare scripts of an application.
pub const PREPARE_DIR: &str = "prepare";

/// Number of digits in a migration ID.
pub const ID_LEN: usize = 14;

fn filename_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // ASCII only, so the ID and description can be sliced by byte offset.
    PATTERN.get_or_init(|| {
        Regex::new(r"^[0-9]{14}_[A-Za-z0-9_]+\.sql$").expect("Invalid migration filename regex")
    })
}

/// Returns whether `filename` is a valid migration filename.
#[must_use]
pub fn is_migration_filename(filename: &str) -> bool {
    filename_pattern().is_match(filename)
}

/// A migration found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMigration {
    /// 14 digit ID, the ordering key.
    pub id: String,
    /// Base filename, e.g. `20200101120000_create_users.sql`.
    pub filename: String,
    /// Filename without the ID prefix and the `.sql` suffix.
    pub description: String,
    /// Name of the directory the migration lives in.
    pub application: String,
    /// SQL above the separator.
    pub up_sql: String,
    /// SQL below the separator.
    pub down_sql: String,
    /// Content of `verify/<filename>`.
    pub verify_sql: String,
    /// Content of `prepare/<filename>`, if that file exists.
    pub prepare_sql: Option<String>,
}

impl FileMigration {
    /// Loads a migration and its sibling scripts from `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let filename = base_name(path);
        if !is_migration_filename(&filename) {
            return Err(MigrateError::InvalidFilename {
                path: path.to_path_buf(),
            });
        }

        let application = path
            .parent()
            .map(base_name)
            .unwrap_or_default();
        let id = filename[..ID_LEN].to_string();
        let description = filename[ID_LEN + 1..filename.len() - ".sql".len()].to_string();

        let content = fs::read_to_string(path).map_err(|source| MigrateError::ReadMigration {
            path: path.to_path_buf(),
            source,
        })?;
        let (up_sql, down_sql) = split_up_down(&filename, &content)?;
        let verify_sql = load_verify(path, &filename)?;
        let prepare_sql = load_prepare(path, &filename)?;

        Ok(Self {
            id,
            filename,
            description,
            application,
            up_sql,
            down_sql,
            verify_sql,
            prepare_sql,
        })
    }

    /// Returns `application/filename`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}/{}", self.application, self.filename)
    }
}

/// Splits migration content into its up and down scripts.
pub fn split_up_down(filename: &str, content: &str) -> Result<(String, String)> {
    if content.is_empty() {
        return Err(MigrateError::EmptyMigration {
            filename: filename.to_string(),
        });
    }

    let parts: Vec<&str> = content.split(UNDO_SEPARATOR).collect();
    let [up, down] = parts.as_slice() else {
        return Err(MigrateError::MissingSeparator {
            filename: filename.to_string(),
        });
    };

    let up = trim_sql(up);
    if up.is_empty() {
        return Err(MigrateError::EmptyUpMigration {
            filename: filename.to_string(),
        });
    }
    let down = trim_sql(down);
    if down.is_empty() {
        return Err(MigrateError::EmptyDownMigration {
            filename: filename.to_string(),
        });
    }

    Ok((up.to_string(), down.to_string()))
}

fn trim_sql(sql: &str) -> &str {
    sql.trim_matches('\n').trim_matches(' ')
}

fn sibling_path(path: &Path, dir: &str, filename: &str) -> std::path::PathBuf {
    path.parent()
        .unwrap_or_else(|| Path::new(""))
        .join(dir)
        .join(filename)
}

fn load_verify(path: &Path, filename: &str) -> Result<String> {
    let verify_path = sibling_path(path, VERIFY_DIR, filename);
    let verify = fs::read_to_string(&verify_path).map_err(|source| MigrateError::ReadVerify {
        path: verify_path.clone(),
        source,
    })?;

    let verify = verify.trim_matches('\n');
    if verify.is_empty() {
        return Err(MigrateError::EmptyVerify {
            path: path.to_path_buf(),
        });
    }
    Ok(verify.to_string())
}

fn load_prepare(path: &Path, filename: &str) -> Result<Option<String>> {
    let prepare_path = sibling_path(path, PREPARE_DIR, filename);
    match fs::read_to_string(&prepare_path) {
        Ok(prepare) => Ok(Some(prepare.trim_matches('\n').to_string())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(MigrateError::ReadPrepare {
            path: prepare_path,
            source,
        }),
    }
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// A record of an applied migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    /// 14 digit ID.
    pub id: String,
    /// Description the migration had when it was applied.
    pub name: String,
    /// When the migration was applied.
    pub applied_at: DateTime<Utc>,
}

impl AppliedMigration {
    /// Creates a new applied migration record.
    pub fn new(id: impl Into<String>, name: impl Into<String>, applied_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            applied_at,
        }
    }

    /// Returns the filename the migration had when it was applied.
    #[must_use]
    pub fn filename(&self) -> String {
        format!("{}_{}.sql", self.id, self.name)
    }
}
