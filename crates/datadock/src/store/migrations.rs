//! Versioned schema migrations, applied in order on open.

use rusqlite::{params, Connection};

use super::error::StoreError;

struct Migration {
    version: i64,
    description: &'static str,
    sql: &'static str,
    kind: MigrationKind,
}

enum MigrationKind {
    /// Plain SQL script.
    Standard,
    /// `ALTER TABLE .. ADD COLUMN ..`, skipped when the column is already
    /// present so databases created after the column was folded into the
    /// base script do not fail.
    AddColumn {
        table: &'static str,
        column: &'static str,
    },
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create datasets table",
        sql: include_str!("sql/001_create_datasets.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 2,
        description: "create jobs table",
        sql: include_str!("sql/002_create_jobs.sql"),
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 3,
        description: "add jobs.history column",
        sql: include_str!("sql/003_add_jobs_history.sql"),
        kind: MigrationKind::AddColumn {
            table: "jobs",
            column: "history",
        },
    },
];

/// Applies every migration that is not yet recorded in the `_migrations`
/// ledger. Safe to call on every open.
pub fn run_all(conn: &Connection) -> Result<(), StoreError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
        [],
    )?;

    for migration in MIGRATIONS {
        let applied: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM _migrations WHERE version = ?1)",
            [migration.version],
            |row| row.get(0),
        )?;
        if applied {
            continue;
        }

        let run = match migration.kind {
            MigrationKind::Standard => true,
            MigrationKind::AddColumn { table, column } => !column_exists(conn, table, column)?,
        };
        if run {
            conn.execute_batch(migration.sql)
                .map_err(|e| StoreError::Migration {
                    version: migration.version,
                    reason: e.to_string(),
                })?;
        }

        conn.execute(
            "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
            params![
                migration.version,
                migration.description,
                chrono::Utc::now().to_rfc3339()
            ],
        )?;
        log::info!(
            "applied migration {}: {}",
            migration.version,
            migration.description
        );
    }

    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, StoreError> {
    // PRAGMA table_info cannot take a bound parameter; the table name is
    // restricted to identifier characters before interpolation.
    if table.is_empty()
        || !table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(StoreError::InvalidTableName(table.to_string()));
    }
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get("name")?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
