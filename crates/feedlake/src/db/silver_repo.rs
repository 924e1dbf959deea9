//! Silver repository - normalized, quality-scored records.

use rusqlite::{params, Connection, Row};

use super::{Database, DatabaseError};

/// A raw silver row from the database.
#[derive(Debug, Clone)]
pub struct SilverRow {
    pub id: String,
    pub bronze_id: String,
    pub source: String,
    pub external_id: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub url: Option<String>,
    pub published_at: Option<String>,
    pub validation_status: String,
    pub quality_score: f64,
    pub source_metadata: String,
    pub processed_at: String,
}

impl SilverRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            bronze_id: row.get("bronze_id")?,
            source: row.get("source")?,
            external_id: row.get("external_id")?,
            title: row.get("title")?,
            content: row.get("content")?,
            author: row.get("author")?,
            url: row.get("url")?,
            published_at: row.get("published_at")?,
            validation_status: row.get("validation_status")?,
            quality_score: row.get("quality_score")?,
            source_metadata: row.get("source_metadata")?,
            processed_at: row.get("processed_at")?,
        })
    }
}

/// Aggregated validation outcomes over a slice of the silver tier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityCounts {
    pub total: u64,
    pub valid: u64,
    pub invalid: u64,
    pub average_score: f64,
}

/// Inserts a new silver row. The referenced bronze row must exist.
pub fn insert(db: &Database, row: &SilverRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO silver_records (id, bronze_id, source, external_id, title, content,
             author, url, published_at, validation_status, quality_score, source_metadata,
             processed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                row.id,
                row.bronze_id,
                row.source,
                row.external_id,
                row.title,
                row.content,
                row.author,
                row.url,
                row.published_at,
                row.validation_status,
                row.quality_score,
                row.source_metadata,
                row.processed_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a silver row by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<SilverRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM silver_records WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], SilverRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Counts silver rows, optionally restricted to one source.
pub fn count(db: &Database, source: Option<&str>) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let total: u64 = match source {
            Some(source) => conn.query_row(
                "SELECT COUNT(*) FROM silver_records WHERE source = ?1",
                params![source],
                |r| r.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM silver_records", [], |r| r.get(0))?,
        };
        Ok(total)
    })
}

/// Summarizes validation outcomes for rows processed at or after `since`.
pub fn quality_counts(
    db: &Database,
    source: Option<&str>,
    since: &str,
) -> Result<QualityCounts, DatabaseError> {
    db.with_conn(|conn| {
        let mut conditions = vec!["processed_at >= ?1".to_string()];
        let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> =
            vec![Box::new(since.to_string())];

        if let Some(source) = source {
            conditions.push(format!("source = ?{}", param_values.len() + 1));
            param_values.push(Box::new(source.to_string()));
        }

        let sql = format!(
            "SELECT COUNT(*),
                    COALESCE(SUM(CASE WHEN validation_status = 'valid' THEN 1 ELSE 0 END), 0),
                    COALESCE(AVG(quality_score), 0.0)
             FROM silver_records WHERE {}",
            conditions.join(" AND ")
        );
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            param_values.iter().map(|p| p.as_ref()).collect();

        let (total, valid, average_score): (u64, u64, f64) =
            conn.query_row(&sql, params_ref.as_slice(), |r| {
                Ok((r.get(0)?, r.get(1)?, r.get(2)?))
            })?;

        Ok(QualityCounts {
            total,
            valid,
            invalid: total - valid,
            average_score,
        })
    })
}

/// Deletes silver rows whose bronze parent was stored before `cutoff`.
pub fn delete_older_than(conn: &Connection, cutoff: &str) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM silver_records WHERE bronze_id IN
         (SELECT id FROM bronze_records WHERE stored_at < ?1)",
        params![cutoff],
    )?;
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::bronze_repo::{self, BronzeRow};

    fn seed_bronze(db: &Database, id: &str, stored_at: &str) {
        bronze_repo::insert(
            db,
            &BronzeRow {
                id: id.to_string(),
                source: "news".to_string(),
                external_id: format!("ext-{}", id),
                data_type: "news_article".to_string(),
                raw_payload: "{}".to_string(),
                collected_at: stored_at.to_string(),
                stored_at: stored_at.to_string(),
            },
        )
        .unwrap();
    }

    fn make_row(id: &str, bronze_id: &str, status: &str, score: f64) -> SilverRow {
        SilverRow {
            id: id.to_string(),
            bronze_id: bronze_id.to_string(),
            source: "news".to_string(),
            external_id: format!("ext-{}", bronze_id),
            title: Some("Headline".to_string()),
            content: None,
            author: Some("Reporter".to_string()),
            url: Some("https://example.com/a".to_string()),
            published_at: None,
            validation_status: status.to_string(),
            quality_score: score,
            source_metadata: "{}".to_string(),
            processed_at: "2026-03-01T00:00:00.000000Z".to_string(),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = Database::open_in_memory().unwrap();
        seed_bronze(&db, "b-1", "2026-03-01T00:00:00.000000Z");
        insert(&db, &make_row("s-1", "b-1", "valid", 0.92)).unwrap();

        let found = find_by_id(&db, "s-1").unwrap().unwrap();
        assert_eq!(found.bronze_id, "b-1");
        assert_eq!(found.validation_status, "valid");
        assert!((found.quality_score - 0.92).abs() < f64::EPSILON);
        assert_eq!(found.content, None);
    }

    #[test]
    fn test_insert_without_bronze_parent_fails() {
        let db = Database::open_in_memory().unwrap();
        let result = insert(&db, &make_row("s-1", "missing", "valid", 0.9));
        assert!(matches!(result, Err(DatabaseError::Sqlite(_))));
    }

    #[test]
    fn test_quality_counts() {
        let db = Database::open_in_memory().unwrap();
        for (i, (status, score)) in [("valid", 0.9), ("valid", 0.85), ("invalid", 0.4)]
            .iter()
            .enumerate()
        {
            let bronze_id = format!("b-{}", i);
            seed_bronze(&db, &bronze_id, "2026-03-01T00:00:00.000000Z");
            insert(&db, &make_row(&format!("s-{}", i), &bronze_id, status, *score)).unwrap();
        }

        let counts = quality_counts(&db, Some("news"), "2026-02-01T00:00:00.000000Z").unwrap();
        assert_eq!(counts.total, 3);
        assert_eq!(counts.valid, 2);
        assert_eq!(counts.invalid, 1);
        assert!((counts.average_score - 0.716_666).abs() < 1e-3);

        let later = quality_counts(&db, None, "2026-04-01T00:00:00.000000Z").unwrap();
        assert_eq!(later, QualityCounts::default());

        let other = quality_counts(&db, Some("reddit"), "2026-02-01T00:00:00.000000Z").unwrap();
        assert_eq!(other.total, 0);
    }
}
