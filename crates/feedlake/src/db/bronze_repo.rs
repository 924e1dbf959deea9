//! Bronze repository - raw payloads exactly as collected.

use rusqlite::{params, Connection, Row};

use super::{Database, DatabaseError};

/// A raw bronze row from the database.
#[derive(Debug, Clone)]
pub struct BronzeRow {
    pub id: String,
    pub source: String,
    pub external_id: String,
    pub data_type: String,
    pub raw_payload: String,
    pub collected_at: String,
    pub stored_at: String,
}

impl BronzeRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            source: row.get("source")?,
            external_id: row.get("external_id")?,
            data_type: row.get("data_type")?,
            raw_payload: row.get("raw_payload")?,
            collected_at: row.get("collected_at")?,
            stored_at: row.get("stored_at")?,
        })
    }
}

/// Inserts a new bronze row. No deduplication on `external_id`.
pub fn insert(db: &Database, row: &BronzeRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO bronze_records (id, source, external_id, data_type, raw_payload,
             collected_at, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                row.id,
                row.source,
                row.external_id,
                row.data_type,
                row.raw_payload,
                row.collected_at,
                row.stored_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a bronze row by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<BronzeRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM bronze_records WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], BronzeRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists every bronze row stored for one `(source, external_id)` pair,
/// oldest first.
pub fn find_by_external_id(
    db: &Database,
    source: &str,
    external_id: &str,
) -> Result<Vec<BronzeRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM bronze_records WHERE source = ?1 AND external_id = ?2
             ORDER BY stored_at ASC",
        )?;
        let rows = stmt
            .query_map(params![source, external_id], BronzeRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Counts bronze rows, optionally restricted to one source.
pub fn count(db: &Database, source: Option<&str>) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let total: u64 = match source {
            Some(source) => conn.query_row(
                "SELECT COUNT(*) FROM bronze_records WHERE source = ?1",
                params![source],
                |r| r.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM bronze_records", [], |r| r.get(0))?,
        };
        Ok(total)
    })
}

/// Deletes bronze rows stored before `cutoff`.
///
/// Runs on a caller-provided connection so retention can delete all three
/// tiers inside one transaction. Descendants must already be gone.
pub fn delete_older_than(conn: &Connection, cutoff: &str) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM bronze_records WHERE stored_at < ?1",
        params![cutoff],
    )?;
    Ok(deleted)
}
