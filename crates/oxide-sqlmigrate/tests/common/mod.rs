#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use oxide_sqlmigrate::driver::{
    ChangelogRow, Connection, DriverError, DriverResult, Transaction,
};
use oxide_sqlmigrate::migration::{AppliedMigration, FileMigration};

/// Behaviour and statement log shared by a fake connection and its
/// transactions.
#[derive(Default)]
pub struct FakeState {
    pub log: Vec<String>,
    pub fail_on: Vec<String>,
    pub fail_begin: bool,
    pub fail_commit: bool,
    pub fail_rollback: bool,
    pub unreachable_attempts: u32,
    pub changelog: Vec<ChangelogRow>,
    pub changelog_exists: bool,
}

/// In-memory connection recording every statement.
///
/// Statements run outside a transaction are logged as `exec: <sql>`, inside
/// one as `tx exec: <sql>`. Commits and rollbacks are logged as `commit` and
/// `rollback`.
#[derive(Clone, Default)]
pub struct FakeConnection {
    state: Arc<Mutex<FakeState>>,
}

impl FakeConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Fails every statement containing `fragment`.
    pub fn fail_on(self, fragment: &str) -> Self {
        self.state().fail_on.push(fragment.to_string());
        self
    }

    pub fn fail_begin(self) -> Self {
        self.state().fail_begin = true;
        self
    }

    pub fn fail_commit(self) -> Self {
        self.state().fail_commit = true;
        self
    }

    pub fn fail_rollback(self) -> Self {
        self.state().fail_rollback = true;
        self
    }

    /// Fails the next `attempts` liveness probes.
    pub fn unreachable_for(self, attempts: u32) -> Self {
        self.state().unreachable_attempts = attempts;
        self
    }

    pub fn with_changelog_table(self) -> Self {
        self.state().changelog_exists = true;
        self
    }

    pub fn with_applied(self, applied: &[AppliedMigration]) -> Self {
        {
            let mut state = self.state();
            state.changelog_exists = true;
            state.changelog = applied
                .iter()
                .map(|m| (m.id.clone(), m.name.clone(), m.applied_at))
                .collect();
        }
        self
    }

    pub fn log(&self) -> Vec<String> {
        self.state().log.clone()
    }

    fn check(state: &FakeState, sql: &str) -> DriverResult<()> {
        match state.fail_on.iter().find(|fragment| sql.contains(fragment.as_str())) {
            Some(fragment) => Err(DriverError::other(format!("failed on '{fragment}'"))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Connection for FakeConnection {
    type Transaction = FakeTransaction;

    async fn execute(&self, sql: &str) -> DriverResult<()> {
        let mut state = self.state();
        state.log.push(format!("exec: {sql}"));
        if sql == "SELECT 1" && state.unreachable_attempts > 0 {
            state.unreachable_attempts -= 1;
            return Err(DriverError::other("connection refused"));
        }
        Self::check(&state, sql)
    }

    async fn query_changelog(&self, sql: &str) -> DriverResult<Vec<ChangelogRow>> {
        let mut state = self.state();
        state.log.push(format!("query: {sql}"));
        Self::check(&state, sql)?;
        Ok(state.changelog.clone())
    }

    async fn query_exists(&self, sql: &str) -> DriverResult<bool> {
        let mut state = self.state();
        state.log.push(format!("query: {sql}"));
        Self::check(&state, sql)?;
        Ok(state.changelog_exists)
    }

    async fn begin(&self) -> DriverResult<FakeTransaction> {
        let mut state = self.state();
        if state.fail_begin {
            return Err(DriverError::other("begin failed"));
        }
        state.log.push("begin".to_string());
        Ok(FakeTransaction {
            state: Arc::clone(&self.state),
        })
    }

    async fn close(&self) {
        self.state().log.push("close".to_string());
    }
}

pub struct FakeTransaction {
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl Transaction for FakeTransaction {
    async fn execute(&mut self, sql: &str) -> DriverResult<()> {
        let mut state = self.state.lock().unwrap();
        state.log.push(format!("tx exec: {sql}"));
        FakeConnection::check(&state, sql)
    }

    async fn commit(self) -> DriverResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_commit {
            return Err(DriverError::other("commit failed"));
        }
        state.log.push("commit".to_string());
        Ok(())
    }

    async fn rollback(self) -> DriverResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_rollback {
            return Err(DriverError::other("rollback failed"));
        }
        state.log.push("rollback".to_string());
        Ok(())
    }
}

pub fn migration(id: &str, application: &str, description: &str) -> FileMigration {
    FileMigration {
        id: id.to_string(),
        filename: format!("{id}_{description}.sql"),
        description: description.to_string(),
        application: application.to_string(),
        up_sql: format!("-- up {id}"),
        down_sql: format!("-- down {id}"),
        verify_sql: format!("-- verify {id}"),
        prepare_sql: None,
    }
}

pub fn applied(id: &str, name: &str) -> AppliedMigration {
    AppliedMigration::new(id, name, Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap())
}

/// Writes a migration with its verify script into `root/<application>/`.
pub fn write_migration(root: &Path, application: &str, filename: &str, up: &str, down: &str) {
    let app_dir = root.join(application);
    fs::create_dir_all(app_dir.join("verify")).unwrap();
    fs::write(app_dir.join(filename), format!("{up}\n-- //@UNDO\n{down}\n")).unwrap();
    fs::write(app_dir.join("verify").join(filename), "SELECT 'verify';\n").unwrap();
}
