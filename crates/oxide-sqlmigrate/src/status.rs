//! Migration status report.
//!
//! Combines the local migrations and the changelog into one row per ID. This
//! is a diagnostic view; gating checks live in [`crate::consistency`].

use std::collections::{BTreeSet, HashMap};

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, Table};
use console::style;
use serde::Serialize;

use crate::error::Result;
use crate::migration::{AppliedMigration, FileMigration};

/// Status text of a migration missing from the changelog.
pub const NOT_APPLIED: &str = "not applied";

/// Info text of an applied migration without a local file.
pub const INFO_NOT_FOUND_LOCALLY: &str = "Migration not found locally";

/// Info text of an unapplied migration followed by an applied one.
pub const INFO_GAP: &str = "Gap in migrations - inconsistency";

/// Note added when an applied migration has no local file.
pub const NOTE_NOT_FOUND_LOCALLY: &str = "An applied migration was not found locally";

/// Note added when the changelog has a gap.
pub const NOTE_GAP: &str = "There was a gap in the changelog, making it inconsistent";

/// Table header.
pub const STATUS_HEADER: [&str; 5] = ["ID", "Name", "App", "Status", "Info"];

/// Status of one applied and/or local migration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrateStatusRow {
    /// Migration ID.
    pub id: String,
    /// Description from the file, or the changelog name if there is no file.
    pub name: String,
    /// Application directory, empty if there is no file.
    pub application: String,
    /// `applied at <timestamp> UTC` or `not applied`.
    pub status: String,
    /// Inconsistency hint, usually empty.
    pub info: String,
}

impl MigrateStatusRow {
    fn cells(&self) -> [&str; 5] {
        [
            self.id.as_str(),
            self.name.as_str(),
            self.application.as_str(),
            self.status.as_str(),
            self.info.as_str(),
        ]
    }
}

/// Returns the status rows sorted by ID and a note about inconsistencies.
///
/// The note is empty when everything is consistent, otherwise it holds one
/// line per kind of problem found.
pub fn get_migration_status(
    file_migrations: &[FileMigration],
    applied_migrations: &[AppliedMigration],
) -> Result<(Vec<MigrateStatusRow>, String)> {
    let files: HashMap<&str, &FileMigration> = file_migrations
        .iter()
        .map(|m| (m.id.as_str(), m))
        .collect();
    let applied: HashMap<&str, &AppliedMigration> = applied_migrations
        .iter()
        .map(|m| (m.id.as_str(), m))
        .collect();
    let ids: BTreeSet<&str> = files.keys().chain(applied.keys()).copied().collect();

    let mut not_found_locally = false;
    let mut rows: Vec<MigrateStatusRow> = ids
        .into_iter()
        .map(|id| {
            let mut row = MigrateStatusRow {
                id: id.to_string(),
                ..MigrateStatusRow::default()
            };

            if let Some(file) = files.get(id) {
                row.name.clone_from(&file.description);
                row.application.clone_from(&file.application);
            } else if let Some(record) = applied.get(id) {
                row.name.clone_from(&record.name);
                row.info = INFO_NOT_FOUND_LOCALLY.to_string();
                not_found_locally = true;
            }

            row.status = applied.get(id).map_or_else(
                || NOT_APPLIED.to_string(),
                |record| {
                    format!(
                        "applied at {} UTC",
                        record.applied_at.format("%Y-%m-%d %H:%M:%S")
                    )
                },
            );
            row
        })
        .collect();

    // The last row cannot be followed by an applied one.
    let mut gap = false;
    for idx in 1..rows.len() {
        if rows[idx - 1].status == NOT_APPLIED && rows[idx].status != NOT_APPLIED {
            rows[idx - 1].info = INFO_GAP.to_string();
            gap = true;
        }
    }

    let mut notes = Vec::new();
    if not_found_locally {
        notes.push(NOTE_NOT_FOUND_LOCALLY);
    }
    if gap {
        notes.push(NOTE_GAP);
    }

    Ok((rows, notes.join("\n")))
}

/// Renders the rows as a table followed by the note.
///
/// Rows carrying info are highlighted and the note is printed in red when
/// the output supports colors.
#[must_use]
pub fn render_status_table(rows: &[MigrateStatusRow], note: &str) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(STATUS_HEADER);
    if console::colors_enabled() {
        table.enforce_styling();
    } else {
        table.force_no_tty();
    }

    for row in rows {
        let cells = row.cells().map(|cell| {
            let cell = Cell::new(cell);
            if row.info.is_empty() {
                cell
            } else {
                cell.fg(Color::Yellow)
            }
        });
        table.add_row(cells);
    }

    let mut out = table.to_string();
    out.push('\n');
    if !note.is_empty() {
        out.push_str(&style(note).red().bright().to_string());
        out.push('\n');
    }
    out
}
