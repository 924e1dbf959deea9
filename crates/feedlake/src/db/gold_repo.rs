//! Gold repository - analytics rows derived from valid silver records.

use rusqlite::{params, Connection, Row};

use super::{Database, DatabaseError};

/// A raw gold row from the database.
#[derive(Debug, Clone)]
pub struct GoldRow {
    pub id: String,
    pub silver_id: String,
    pub source: String,
    pub external_id: String,
    pub engagement_score: f64,
    pub like_count: i64,
    pub retweet_count: i64,
    pub comment_count: i64,
    pub share_count: i64,
    pub hour_of_day: Option<u32>,
    pub day_of_week: Option<u32>,
    pub analytics_data: String,
    pub metrics: String,
    pub analyzed_at: String,
    pub sentiment_label: Option<String>,
    pub sentiment_score: Option<f64>,
}

impl GoldRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            silver_id: row.get("silver_id")?,
            source: row.get("source")?,
            external_id: row.get("external_id")?,
            engagement_score: row.get("engagement_score")?,
            like_count: row.get("like_count")?,
            retweet_count: row.get("retweet_count")?,
            comment_count: row.get("comment_count")?,
            share_count: row.get("share_count")?,
            hour_of_day: row.get("hour_of_day")?,
            day_of_week: row.get("day_of_week")?,
            analytics_data: row.get("analytics_data")?,
            metrics: row.get("metrics")?,
            analyzed_at: row.get("analyzed_at")?,
            sentiment_label: row.get("sentiment_label")?,
            sentiment_score: row.get("sentiment_score")?,
        })
    }
}

/// Inserts a new gold row. The referenced silver row must exist.
pub fn insert(db: &Database, row: &GoldRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO gold_records (id, silver_id, source, external_id, engagement_score,
             like_count, retweet_count, comment_count, share_count, hour_of_day, day_of_week,
             analytics_data, metrics, analyzed_at, sentiment_label, sentiment_score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                row.id,
                row.silver_id,
                row.source,
                row.external_id,
                row.engagement_score,
                row.like_count,
                row.retweet_count,
                row.comment_count,
                row.share_count,
                row.hour_of_day,
                row.day_of_week,
                row.analytics_data,
                row.metrics,
                row.analyzed_at,
                row.sentiment_label,
                row.sentiment_score,
            ],
        )?;
        Ok(())
    })
}

/// Finds a gold row by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<GoldRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM gold_records WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], GoldRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists gold rows, newest first, optionally restricted to one source.
pub fn list(db: &Database, source: Option<&str>) -> Result<Vec<GoldRow>, DatabaseError> {
    db.with_conn(|conn| {
        let rows = match source {
            Some(source) => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM gold_records WHERE source = ?1 ORDER BY analyzed_at DESC",
                )?;
                let rows = stmt
                    .query_map(params![source], GoldRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt =
                    conn.prepare("SELECT * FROM gold_records ORDER BY analyzed_at DESC")?;
                let rows = stmt
                    .query_map([], GoldRow::from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(rows)
    })
}

/// Counts gold rows, optionally restricted to one source.
pub fn count(db: &Database, source: Option<&str>) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let total: u64 = match source {
            Some(source) => conn.query_row(
                "SELECT COUNT(*) FROM gold_records WHERE source = ?1",
                params![source],
                |r| r.get(0),
            )?,
            None => conn.query_row("SELECT COUNT(*) FROM gold_records", [], |r| r.get(0))?,
        };
        Ok(total)
    })
}

/// Deletes gold rows whose lineage root was stored before `cutoff`.
pub fn delete_older_than(conn: &Connection, cutoff: &str) -> Result<usize, DatabaseError> {
    let deleted = conn.execute(
        "DELETE FROM gold_records WHERE silver_id IN
         (SELECT s.id FROM silver_records s
          JOIN bronze_records b ON b.id = s.bronze_id
          WHERE b.stored_at < ?1)",
        params![cutoff],
    )?;
    Ok(deleted)
}
