//! `detection_history` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryRow {
    pub id: String,
    pub document_id: String,
    pub detected_company_id: Option<String>,
    pub confidence: f64,
    pub method: String,
    /// Detection details as JSON.
    pub details: String,
    pub corrected_company_id: Option<String>,
    pub created_at: String,
}

impl HistoryRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            document_id: row.get("document_id")?,
            detected_company_id: row.get("detected_company_id")?,
            confidence: row.get("confidence")?,
            method: row.get("method")?,
            details: row.get("details")?,
            corrected_company_id: row.get("corrected_company_id")?,
            created_at: row.get("created_at")?,
        })
    }
}

pub fn insert(db: &Database, entry: &HistoryRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO detection_history (id, document_id, detected_company_id, confidence,
             method, details, corrected_company_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.id,
                entry.document_id,
                entry.detected_company_id,
                entry.confidence,
                entry.method,
                entry.details,
                entry.corrected_company_id,
                entry.created_at,
            ],
        )?;
        Ok(())
    })
}

/// Records a reviewer's correction. Returns false if the entry does not exist.
pub fn set_correction(db: &Database, id: &str, company_id: &str) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE detection_history SET corrected_company_id = ?2 WHERE id = ?1",
            params![id, company_id],
        )?;
        Ok(changed > 0)
    })
}

pub fn list_for_document(db: &Database, document_id: &str) -> Result<Vec<HistoryRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM detection_history WHERE document_id = ?1 ORDER BY created_at",
        )?;
        let rows = stmt
            .query_map(params![document_id], HistoryRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_correct() {
        let db = Database::open_in_memory().unwrap();
        insert(
            &db,
            &HistoryRow {
                id: "h1".to_string(),
                document_id: "a.pdf".to_string(),
                detected_company_id: Some("ACME".to_string()),
                confidence: 0.7,
                method: "rule_based".to_string(),
                details: "{}".to_string(),
                corrected_company_id: None,
                created_at: "2026-01-01T00:00:00Z".to_string(),
            },
        )
        .unwrap();

        assert!(set_correction(&db, "h1", "GLOBEX").unwrap());
        assert!(!set_correction(&db, "missing", "GLOBEX").unwrap());

        let rows = list_for_document(&db, "a.pdf").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].corrected_company_id.as_deref(), Some("GLOBEX"));
    }
}
