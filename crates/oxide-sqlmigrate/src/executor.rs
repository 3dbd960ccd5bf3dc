//! Migration executor.
//!
//! This module handles applying and reverting migrations against a database.
//! Every up or down script runs in its own transaction. After an up script
//! is committed and recorded, its verify script runs in a second
//! transaction that is always rolled back.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::config::Config;
use crate::consistency::ensure_consistent_migrations;
use crate::direction::Direction;
use crate::driver::{Connection, DriverError, Transaction};
use crate::error::{MigrateError, Result};
use crate::history::{self, DEFAULT_CHANGELOG_TABLE};
use crate::loader::load_migrations;
use crate::migration::{AppliedMigration, FileMigration};
use crate::seed::generate_seed_sql;
use crate::selection::{filter_migrations_by_count, filter_migrations_by_text};
use crate::status::{get_migration_status, MigrateStatusRow};

/// Name of the bootstrap script in the migrations root.
pub const BOOTSTRAP_FILE: &str = "bootstrap.sql";

/// Applies `migration` in `direction` and updates the changelog.
pub async fn apply_migration<C: Connection>(
    conn: &C,
    migration: &FileMigration,
    changelog_table: &str,
    direction: Direction,
) -> Result<()> {
    match direction {
        Direction::Up => apply_up_migration(conn, migration, changelog_table).await,
        Direction::Down => apply_down_migration(conn, migration, changelog_table).await,
    }
}

/// Applies the up script, records it and runs the verify script.
///
/// If recording fails the committed up script is left in place.
pub async fn apply_up_migration<C: Connection>(
    conn: &C,
    migration: &FileMigration,
    changelog_table: &str,
) -> Result<()> {
    apply_up(conn, migration, changelog_table, false).await
}

async fn apply_up<C: Connection>(
    conn: &C,
    migration: &FileMigration,
    changelog_table: &str,
    with_prepare: bool,
) -> Result<()> {
    let mut scripts = Vec::with_capacity(2);
    if with_prepare {
        if let Some(prepare) = migration.prepare_sql.as_deref().filter(|sql| !sql.is_empty()) {
            scripts.push(prepare);
        }
    }
    scripts.push(migration.up_sql.as_str());

    run_in_transaction(conn, Direction::Up, migration, &scripts).await?;
    history::record_applied(conn, changelog_table, migration).await?;
    run_verify(conn, migration).await
}

/// Applies the down script and removes the changelog record.
pub async fn apply_down_migration<C: Connection>(
    conn: &C,
    migration: &FileMigration,
    changelog_table: &str,
) -> Result<()> {
    run_in_transaction(conn, Direction::Down, migration, &[migration.down_sql.as_str()]).await?;
    history::record_unapplied(conn, changelog_table, migration).await
}

async fn run_in_transaction<C: Connection>(
    conn: &C,
    direction: Direction,
    migration: &FileMigration,
    scripts: &[&str],
) -> Result<()> {
    let mut tx = conn
        .begin()
        .await
        .map_err(|source| MigrateError::BeginTransaction {
            phase: direction.as_str(),
            filename: migration.filename.clone(),
            source,
        })?;

    for sql in scripts {
        debug!(id = %migration.id, %direction, "Executing migration SQL");
        if let Err(source) = tx.execute(sql).await {
            let filename = migration.filename.clone();
            return Err(match tx.rollback().await {
                Ok(()) => MigrateError::Execute {
                    direction,
                    filename,
                    source,
                },
                Err(rollback) => MigrateError::ExecuteAndRollback {
                    direction,
                    filename,
                    source,
                    rollback,
                },
            });
        }
    }

    tx.commit().await.map_err(|source| MigrateError::Commit {
        direction,
        filename: migration.filename.clone(),
        source,
    })
}

async fn run_verify<C: Connection>(conn: &C, migration: &FileMigration) -> Result<()> {
    let mut tx = conn
        .begin()
        .await
        .map_err(|source| MigrateError::BeginTransaction {
            phase: "verify",
            filename: migration.filename.clone(),
            source,
        })?;

    let verified = tx.execute(&migration.verify_sql).await;
    let rolled_back = tx.rollback().await;
    let filename = migration.filename.clone();
    match (verified, rolled_back) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(verify), Err(rollback)) => Err(MigrateError::VerifyAndRollback {
            filename,
            verify,
            rollback,
        }),
        (Err(source), Ok(())) => Err(MigrateError::Verify { filename, source }),
        (Ok(()), Err(source)) => Err(MigrateError::VerifyRollback { filename, source }),
    }
}

/// Executes `bootstrap.sql` from the migrations root, if there is one.
///
/// The script runs as one batch outside of a transaction.
pub async fn apply_bootstrap_migration<C: Connection>(
    conn: &C,
    migrations_path: &Path,
) -> Result<()> {
    let path = migrations_path.join(BOOTSTRAP_FILE);
    let sql = match read_bootstrap(&path)? {
        Some(sql) => sql,
        None => {
            debug!(path = %path.display(), "No bootstrap migration found");
            return Ok(());
        }
    };

    conn.execute(&sql).await.map_err(MigrateError::Bootstrap)?;
    info!(path = %path.display(), "Applied bootstrap migration");
    Ok(())
}

/// Reads a bootstrap script, `None` if it does not exist.
pub(crate) fn read_bootstrap(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(sql) => Ok(Some(sql)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(MigrateError::ReadBootstrap {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Probes the database with `SELECT 1` up to `retries` times.
pub async fn wait_for_start<C: Connection>(
    conn: &C,
    poll_interval: Duration,
    retries: u32,
) -> Result<()> {
    let mut last_error = None;
    for attempt in 1..=retries {
        match conn.execute("SELECT 1").await {
            Ok(()) => return Ok(()),
            Err(err) => {
                debug!(attempt, error = %err, "Database not reachable yet");
                last_error = Some(err);
            }
        }
        if attempt < retries {
            tokio::time::sleep(poll_interval).await;
        }
    }

    Err(MigrateError::ConnectTimeout(last_error.unwrap_or_else(
        || DriverError::other("no connection attempt was made"),
    )))
}

/// Executes migrations against a database.
///
/// The executor never caches migration lists: every operation either takes
/// them as arguments or loads them fresh.
pub struct MigrationExecutor<C: Connection> {
    conn: C,
    migrations_path: PathBuf,
    changelog_table: String,
    apply_prepare_scripts: bool,
}

impl<C: Connection> MigrationExecutor<C> {
    /// Creates a new migration executor.
    pub fn new(conn: C, migrations_path: impl Into<PathBuf>) -> Self {
        Self {
            conn,
            migrations_path: migrations_path.into(),
            changelog_table: DEFAULT_CHANGELOG_TABLE.to_string(),
            apply_prepare_scripts: false,
        }
    }

    /// Creates an executor for a resolved environment configuration.
    pub fn from_config(conn: C, config: &Config) -> Self {
        Self::new(conn, &config.migrations_path)
            .changelog_table(&config.changelog_name)
            .apply_prepare_scripts(config.apply_prepare_scripts)
    }

    /// Sets the changelog table.
    #[must_use]
    pub fn changelog_table(mut self, table: impl Into<String>) -> Self {
        self.changelog_table = table.into();
        self
    }

    /// Runs prepare scripts ahead of up scripts.
    #[must_use]
    pub fn apply_prepare_scripts(mut self, enabled: bool) -> Self {
        self.apply_prepare_scripts = enabled;
        self
    }

    /// Waits until the database answers.
    pub async fn wait_for_start(&self, poll_interval: Duration, retries: u32) -> Result<()> {
        wait_for_start(&self.conn, poll_interval, retries).await
    }

    /// Ensures the changelog table exists, returning whether it was created.
    pub async fn init(&self) -> Result<bool> {
        history::ensure_migrations_changelog(&self.conn, &self.changelog_table).await
    }

    /// Applies the bootstrap script.
    pub async fn bootstrap(&self) -> Result<()> {
        apply_bootstrap_migration(&self.conn, &self.migrations_path).await
    }

    /// Loads the local migrations.
    pub fn file_migrations(&self) -> Result<Vec<FileMigration>> {
        load_migrations(&self.migrations_path)
    }

    /// Reads the changelog.
    pub async fn applied_migrations(&self) -> Result<Vec<AppliedMigration>> {
        history::get_applied_migrations(&self.conn, &self.changelog_table).await
    }

    /// Applies a single migration in `direction`.
    pub async fn apply(&self, migration: &FileMigration, direction: Direction) -> Result<()> {
        info!(
            id = %migration.id,
            filename = %migration.filename,
            %direction,
            "Applying migration"
        );
        match direction {
            Direction::Up => {
                apply_up(
                    &self.conn,
                    migration,
                    &self.changelog_table,
                    self.apply_prepare_scripts,
                )
                .await?;
            }
            Direction::Down => {
                apply_down_migration(&self.conn, migration, &self.changelog_table).await?;
            }
        }
        info!(
            id = %migration.id,
            filename = %migration.filename,
            %direction,
            "Migration applied successfully"
        );
        Ok(())
    }

    /// Applies or reverts the next `count` migrations, or all of them.
    ///
    /// The changelog is checked for drift first. Returns the processed
    /// migrations in the order they ran.
    pub async fn apply_with_count<'a>(
        &self,
        count: usize,
        all: bool,
        direction: Direction,
        file_migrations: &'a [FileMigration],
        applied_migrations: &[AppliedMigration],
    ) -> Result<Vec<&'a FileMigration>> {
        ensure_consistent_migrations(file_migrations, applied_migrations)?;
        let selected = filter_migrations_by_count(
            count,
            all,
            direction,
            file_migrations,
            applied_migrations,
        )?;
        for migration in &selected {
            self.apply(migration, direction).await?;
        }
        Ok(selected)
    }

    /// Applies or reverts the one migration matching `filter`.
    ///
    /// No drift check is made, so a single migration can be applied out of
    /// order.
    pub async fn apply_specific<'a>(
        &self,
        filter: &str,
        direction: Direction,
        file_migrations: &'a [FileMigration],
        applied_migrations: &[AppliedMigration],
    ) -> Result<&'a FileMigration> {
        let migration =
            filter_migrations_by_text(filter, direction, file_migrations, applied_migrations)?;
        self.apply(migration, direction).await?;
        Ok(migration)
    }

    /// Applies every outstanding up migration.
    ///
    /// `on_applied` is called after each migration, e.g. to advance a
    /// progress bar. Having nothing to apply is not an error here.
    pub async fn apply_all_up<F>(
        &self,
        file_migrations: &[FileMigration],
        applied_migrations: &[AppliedMigration],
        mut on_applied: F,
    ) -> Result<usize>
    where
        F: FnMut(&FileMigration) + Send,
    {
        ensure_consistent_migrations(file_migrations, applied_migrations)?;
        if applied_migrations.len() == file_migrations.len() {
            info!("All migrations are already applied");
            return Ok(0);
        }

        let selected = filter_migrations_by_count(
            0,
            true,
            Direction::Up,
            file_migrations,
            applied_migrations,
        )?;
        for migration in &selected {
            self.apply(migration, Direction::Up).await?;
            on_applied(migration);
        }
        Ok(selected.len())
    }

    /// Builds the status table from fresh local and changelog snapshots.
    pub async fn status(&self) -> Result<(Vec<MigrateStatusRow>, String)> {
        let file_migrations = self.file_migrations()?;
        let applied_migrations = self.applied_migrations().await?;
        get_migration_status(&file_migrations, &applied_migrations)
    }

    /// Renders the seed script for the local migrations.
    pub fn seed_sql(&self) -> Result<String> {
        let file_migrations = self.file_migrations()?;
        generate_seed_sql(&self.migrations_path, &self.changelog_table, &file_migrations)
    }

    /// Closes the underlying connection.
    pub async fn close(&self) {
        self.conn.close().await;
    }
}
