//! Error types for the migration system.

use std::path::PathBuf;

use crate::direction::Direction;
use crate::driver::DriverError;

/// Errors that can occur during migration operations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// A directory of the migration tree could not be listed.
    #[error("Could not read content of directory {path}: {source}")]
    ReadDir {
        /// The directory that was listed.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// A migration file could not be read.
    #[error("Couldn't read migration file {path}: {source}")]
    ReadMigration {
        /// Path to the migration file.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The filename does not follow `<14 digits>_<description>.sql`.
    #[error("The migration file at '{path}' was invalid")]
    InvalidFilename {
        /// Path to the offending file.
        path: PathBuf,
    },

    /// The migration file has no content at all.
    #[error("The migration at '{filename}' was empty")]
    EmptyMigration {
        /// Migration filename.
        filename: String,
    },

    /// The file does not contain exactly one up/down separator.
    #[error("Could not find up and down migration in '{filename}'")]
    MissingSeparator {
        /// Migration filename.
        filename: String,
    },

    /// Nothing above the separator.
    #[error("The up migration at '{filename}' was empty")]
    EmptyUpMigration {
        /// Migration filename.
        filename: String,
    },

    /// Nothing below the separator.
    #[error("The down migration at '{filename}' was empty")]
    EmptyDownMigration {
        /// Migration filename.
        filename: String,
    },

    /// The mandatory verify script could not be read.
    #[error("Couldn't open verify file {path}: {source}")]
    ReadVerify {
        /// Path to the verify script.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The verify script exists but is empty.
    #[error("Verify file for {path} was empty")]
    EmptyVerify {
        /// Path to the migration file.
        path: PathBuf,
    },

    /// An existing prepare script could not be read.
    #[error("Couldn't open prepare file {path}: {source}")]
    ReadPrepare {
        /// Path to the prepare script.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Two migration files share the same ID.
    #[error("The id {id} is not unique. It exists for {first} and {second}")]
    DuplicateId {
        /// The duplicated ID.
        id: String,
        /// Filename that was loaded first.
        first: String,
        /// Filename that collided with it.
        second: String,
    },

    /// Reading the changelog table failed.
    #[error("Got error getting applied migrations: {0}")]
    ChangelogRead(#[source] DriverError),

    /// The first applied migration does not match the first local one.
    #[error("The changelog is out of sync at the first migration")]
    OutOfSyncAtFirst,

    /// Drift after a known-good prefix.
    #[error("The changelog is out of sync after the migration {last_good}")]
    OutOfSyncAfter {
        /// Last ID where local files and the changelog agreed.
        last_good: String,
    },

    /// Every local migration is already applied.
    #[error("No migrations left to apply")]
    NothingToApply,

    /// The changelog is empty.
    #[error("No migrations left to remove")]
    NothingToRemove,

    /// An applied migration selected for reversal has no local file.
    #[error("The applied migration {id} was not found locally")]
    NotFoundLocally {
        /// ID of the applied migration.
        id: String,
    },

    /// A text filter matched no candidate.
    #[error("Found no migration matching the filter: {filter}")]
    NoFilterMatch {
        /// The filter text.
        filter: String,
    },

    /// A text filter matched more than one candidate.
    #[error(
        "Found multiple matches for the filter: {filter} {}",
        .matches.iter().map(|m| format!("\n{m}")).collect::<String>()
    )]
    MultipleFilterMatches {
        /// The filter text.
        filter: String,
        /// `application/filename` of every match.
        matches: Vec<String>,
    },

    /// A transaction could not be opened.
    #[error("Error opening transaction for {phase} of {filename}: {source}")]
    BeginTransaction {
        /// `up`, `down` or `verify`.
        phase: &'static str,
        /// Migration filename.
        filename: String,
        /// Driver error.
        source: DriverError,
    },

    /// The up or down SQL failed and the rollback succeeded.
    #[error("Error during {direction} migration of {filename}: {source}")]
    Execute {
        /// Direction of the failing script.
        direction: Direction,
        /// Migration filename.
        filename: String,
        /// Driver error of the failing statement.
        source: DriverError,
    },

    /// The up or down SQL failed and so did the rollback.
    #[error(
        "Error during {direction} migration of {filename}: {source} \n and rollback error: {rollback}"
    )]
    ExecuteAndRollback {
        /// Direction of the failing script.
        direction: Direction,
        /// Migration filename.
        filename: String,
        /// Driver error of the failing statement.
        source: DriverError,
        /// Driver error of the rollback.
        rollback: DriverError,
    },

    /// The commit after a successful script failed.
    #[error("Error during commit of {direction} migration of {filename}: {source}")]
    Commit {
        /// Direction of the committed script.
        direction: Direction,
        /// Migration filename.
        filename: String,
        /// Driver error.
        source: DriverError,
    },

    /// The changelog row could not be inserted after the up migration committed.
    #[error("Could not add the migration {filename} to the changelog: {source}")]
    ChangelogInsert {
        /// Migration filename.
        filename: String,
        /// Driver error.
        source: DriverError,
    },

    /// The changelog row could not be removed after the down migration committed.
    #[error("Could not remove the migration {filename} from the changelog: {source}")]
    ChangelogRemove {
        /// Migration filename.
        filename: String,
        /// Driver error.
        source: DriverError,
    },

    /// The verify script failed and its rollback failed too.
    #[error(
        "Got an error for verify. Please assess the necessity of a down migration.\nMigration: {filename}\nVerify Error: {verify}\nRollback error: {rollback}"
    )]
    VerifyAndRollback {
        /// Migration filename.
        filename: String,
        /// Driver error of the verify script.
        verify: DriverError,
        /// Driver error of the rollback.
        rollback: DriverError,
    },

    /// The verify script failed.
    #[error("Error during verify for {filename}: {source}")]
    Verify {
        /// Migration filename.
        filename: String,
        /// Driver error.
        source: DriverError,
    },

    /// The verify script succeeded but could not be rolled back.
    #[error("Error during rollback of verify for {filename}: {source}")]
    VerifyRollback {
        /// Migration filename.
        filename: String,
        /// Driver error.
        source: DriverError,
    },

    /// `bootstrap.sql` exists but could not be read.
    #[error("Couldn't read bootstrap file {path}: {source}")]
    ReadBootstrap {
        /// Path to the bootstrap script.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// Executing `bootstrap.sql` failed.
    #[error("Error applying bootstrap migration: {0}")]
    Bootstrap(#[source] DriverError),

    /// The changelog existence check failed.
    #[error("Error checking for migrations changelog existence: {0}")]
    ChangelogCheck(#[source] DriverError),

    /// The changelog table could not be created.
    #[error("Error creating migrations changelog: {0}")]
    ChangelogCreate(#[source] DriverError),

    /// The database did not answer within the retry budget.
    #[error("Timed out connecting to database: {0}")]
    ConnectTimeout(#[source] DriverError),

    /// The environment configuration could not be read.
    #[error("Couldn't read config file {path}: {source}")]
    ReadConfig {
        /// Path to the YAML file.
        path: PathBuf,
        /// Underlying IO error.
        source: std::io::Error,
    },

    /// The environment configuration is not valid YAML for the expected keys.
    #[error("Couldn't unmarshal yaml {path}: {source}")]
    ParseConfig {
        /// Path to the YAML file.
        path: PathBuf,
        /// YAML error.
        source: serde_yaml::Error,
    },

    /// The environment configuration is missing a required value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// The seed target already exists.
    #[error("The file {0} already exists")]
    SeedTargetExists(PathBuf),

    /// IO error (writing the seed file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
