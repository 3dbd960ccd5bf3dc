//! Versioned SQL file migrations for PostgreSQL.
//!
//! `oxide-sqlmigrate` applies plain SQL migration files and records them in a
//! changelog table:
//! - Migrations live in `<root>/<application>/<14 digit id>_<name>.sql`
//! - Each file holds an up and a down script separated by `-- //@UNDO`
//! - A mandatory verify script in `<application>/verify/` is run after every
//!   up migration inside a transaction that is always rolled back
//! - Drift between the local files and the changelog blocks count based runs
//!
//! # Architecture
//!
//! - **Loader** - Reads and validates the migration tree
//! - **History** - Creates and reads the changelog table
//! - **Consistency** - Detects drift between files and changelog
//! - **Selection** - Picks migrations by count or by filename filter
//! - **Executor** - Runs scripts in transactions and updates the changelog
//! - **Status** - Per migration report with inconsistency hints
//! - **Seed** - Renders a single SQL file reproducing all migrations
//! - **Driver** - Database capability traits and the PostgreSQL backend
//!
//! # Example
//!
//! ```rust,ignore
//! use oxide_sqlmigrate::prelude::*;
//!
//! let config = Config::load("migrations", "development")?;
//! let conn = PostgresConnection::open(config.db.connect_options());
//! let executor = MigrationExecutor::from_config(conn, &config);
//!
//! executor.init().await?;
//! let files = executor.file_migrations()?;
//! let applied = executor.applied_migrations().await?;
//! executor
//!     .apply_with_count(1, false, Direction::Up, &files, &applied)
//!     .await?;
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Apply the next pending migration
//! oxide-sqlmigrate up
//!
//! # Revert the last two migrations
//! oxide-sqlmigrate down --count 2
//!
//! # Apply one migration by filename filter
//! oxide-sqlmigrate up --only add_email
//!
//! # Show migration status
//! oxide-sqlmigrate status
//!
//! # Bootstrap a fresh database and apply everything
//! oxide-sqlmigrate -e test bootstrap
//!
//! # Write a seed script
//! oxide-sqlmigrate create-seed --target seed.sql
//! ```

pub mod config;
pub mod consistency;
pub mod direction;
pub mod driver;
pub mod error;
pub mod executor;
pub mod history;
pub mod loader;
pub mod migration;
pub mod seed;
pub mod selection;
pub mod status;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::{Config, DbConfig};
    pub use crate::consistency::ensure_consistent_migrations;
    pub use crate::direction::Direction;
    pub use crate::driver::{Connection, DriverError, PostgresConnection, Transaction};
    pub use crate::error::{MigrateError, Result};
    pub use crate::executor::{
        apply_bootstrap_migration, apply_migration, wait_for_start, MigrationExecutor,
    };
    pub use crate::history::{ensure_migrations_changelog, get_applied_migrations};
    pub use crate::loader::load_migrations;
    pub use crate::migration::{AppliedMigration, FileMigration};
    pub use crate::seed::{generate_seed_sql, write_seed_file};
    pub use crate::selection::{filter_migrations_by_count, filter_migrations_by_text};
    pub use crate::status::{get_migration_status, render_status_table, MigrateStatusRow};
}
