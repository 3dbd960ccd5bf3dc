//! Environment configuration.
//!
//! Each environment has a YAML file under `<migrations>/_environments/`:
//!
//! ```yaml
//! db_type: postgres
//! prepare: true
//! host: localhost
//! port: 5432
//! db_name: app
//! user: app
//! password: secret
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sqlx::postgres::PgConnectOptions;

use crate::error::{MigrateError, Result};
use crate::history::DEFAULT_CHANGELOG_TABLE;
use crate::loader::ENVIRONMENTS_DIR;

/// The only supported `db_type`.
pub const POSTGRES_DB_TYPE: &str = "postgres";

/// The YAML file as written on disk.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    db_type: Option<String>,
    prepare: bool,
    host: String,
    port: u16,
    db_name: String,
    user: String,
    password: String,
}

/// Database connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// Database type, `postgres` when set.
    pub db_type: Option<String>,
    /// Server host.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Database name.
    pub name: String,
    /// Login user.
    pub user: String,
    /// Login password, may be empty.
    pub password: String,
}

impl DbConfig {
    /// Builds sqlx connect options from the settings.
    #[must_use]
    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.name)
            .username(&self.user);
        if self.password.is_empty() {
            options
        } else {
            options.password(&self.password)
        }
    }
}

/// Resolved configuration of one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Migrations root.
    pub migrations_path: PathBuf,
    /// Environment name.
    pub environment: String,
    /// Whether prepare scripts run ahead of up scripts.
    pub apply_prepare_scripts: bool,
    /// Changelog table.
    pub changelog_name: String,
    /// Connection settings.
    pub db: DbConfig,
}

impl Config {
    /// Path of the configuration file of `environment`.
    #[must_use]
    pub fn path_for(migrations_path: &Path, environment: &str) -> PathBuf {
        migrations_path
            .join(ENVIRONMENTS_DIR)
            .join(format!("{environment}.yaml"))
    }

    /// Loads `<migrations_path>/_environments/<environment>.yaml`.
    pub fn load(migrations_path: impl Into<PathBuf>, environment: &str) -> Result<Self> {
        let migrations_path = migrations_path.into();
        let path = Self::path_for(&migrations_path, environment);
        Self::from_file(&path, migrations_path, environment)
    }

    /// Loads and validates the configuration file at `path`.
    pub fn from_file(
        path: &Path,
        migrations_path: impl Into<PathBuf>,
        environment: &str,
    ) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| MigrateError::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        let file: FileConfig =
            serde_yaml::from_str(&content).map_err(|source| MigrateError::ParseConfig {
                path: path.to_path_buf(),
                source,
            })?;

        let config = Self {
            migrations_path: migrations_path.into(),
            environment: environment.to_string(),
            apply_prepare_scripts: file.prepare,
            changelog_name: DEFAULT_CHANGELOG_TABLE.to_string(),
            db: DbConfig {
                db_type: file.db_type,
                host: file.host,
                port: file.port,
                name: file.db_name,
                user: file.user,
                password: file.password,
            },
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks that all required connection settings are present.
    pub fn validate(&self) -> Result<()> {
        if self.db.port == 0 {
            return Err(MigrateError::InvalidConfig(
                "No port specified, or invalid port of 0",
            ));
        }
        if self.db.host.is_empty() {
            return Err(MigrateError::InvalidConfig("No host specified"));
        }
        if self.db.name.is_empty() {
            return Err(MigrateError::InvalidConfig("No database name specified"));
        }
        if self.db.user.is_empty() {
            return Err(MigrateError::InvalidConfig("No username specified"));
        }
        match self.db.db_type.as_deref() {
            None | Some(POSTGRES_DB_TYPE) => Ok(()),
            Some(_) => Err(MigrateError::InvalidConfig(
                "Unsupported db_type, only postgres is available",
            )),
        }
    }
}
