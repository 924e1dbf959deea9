//! Schema versions for the three tiers.
//!
//! Applied versions are recorded in `_migrations`. Each pending version
//! runs in its own transaction together with its bookkeeping row, so a
//! failure leaves the database at the previous version.

use rusqlite::Connection;

use super::error::DatabaseError;

enum Step {
    /// Embedded SQL script.
    Script(&'static str),
    /// `ALTER TABLE .. ADD COLUMN` for each listed column the table lacks.
    AddColumns {
        table: &'static str,
        columns: &'static [(&'static str, &'static str)],
    },
}

struct Migration {
    version: u32,
    name: &'static str,
    step: Step,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "bronze_records",
        step: Step::Script(include_str!("sql/001_create_bronze_records.sql")),
    },
    Migration {
        version: 2,
        name: "silver_records",
        step: Step::Script(include_str!("sql/002_create_silver_records.sql")),
    },
    Migration {
        version: 3,
        name: "gold_records",
        step: Step::Script(include_str!("sql/003_create_gold_records.sql")),
    },
    Migration {
        version: 4,
        name: "gold_sentiment",
        step: Step::AddColumns {
            table: "gold_records",
            columns: &[("sentiment_label", "TEXT"), ("sentiment_score", "REAL")],
        },
    },
];

/// Brings `conn` up to the latest schema version.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%SZ', 'now'))
        );",
    )?;

    let applied = schema_version(conn)?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        log::info!("Applying schema v{} ({})", migration.version, migration.name);
        apply(conn, migration).map_err(|e| DatabaseError::Migration {
            version: migration.version,
            reason: e.to_string(),
        })?;
    }

    Ok(())
}

/// Highest applied version, 0 for an empty database.
pub fn schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?)
}

fn apply(conn: &Connection, migration: &Migration) -> Result<(), DatabaseError> {
    let tx = conn.unchecked_transaction()?;
    match &migration.step {
        Step::Script(sql) => tx.execute_batch(sql)?,
        Step::AddColumns { table, columns } => {
            for (column, sql_type) in *columns {
                if has_column(&tx, table, column)? {
                    log::debug!("{}.{} already present", table, column);
                    continue;
                }
                tx.execute_batch(&format!(
                    "ALTER TABLE {} ADD COLUMN {} {};",
                    table, column, sql_type
                ))?;
            }
        }
    }
    tx.execute(
        "INSERT INTO _migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![migration.version, migration.name],
    )?;
    tx.commit()?;
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    let mut stmt = conn.prepare("SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2")?;
    Ok(stmt.exists(rusqlite::params![table, column])?)
}
