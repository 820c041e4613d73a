//! `work_orders` table. Status uses the raw store vocabulary
//! (`uploaded`, `processing`, `generating`, `completed`, `failed`, `cancelled`).

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

#[derive(Debug, Clone, PartialEq)]
pub struct WorkOrderRow {
    pub id: String,
    pub file_name: String,
    pub company_id: String,
    pub status: String,
    pub content: Option<String>,
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl WorkOrderRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            file_name: row.get("file_name")?,
            company_id: row.get("company_id")?,
            status: row.get("status")?,
            content: row.get("content")?,
            error_message: row.get("error_message")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub fn insert(db: &Database, order: &WorkOrderRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO work_orders (id, file_name, company_id, status, content, error_message,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                order.id,
                order.file_name,
                order.company_id,
                order.status,
                order.content,
                order.error_message,
                order.created_at,
                order.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Sets the status; `content` and `error_message` are only overwritten when given.
pub fn update_status(
    db: &Database,
    id: &str,
    status: &str,
    content: Option<&str>,
    error_message: Option<&str>,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE work_orders SET status=?2, content=COALESCE(?3, content),
             error_message=COALESCE(?4, error_message), updated_at=?5 WHERE id=?1",
            params![id, status, content, error_message, updated_at],
        )?;
        Ok(changed > 0)
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<WorkOrderRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM work_orders WHERE id = ?1",
                params![id],
                WorkOrderRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Most recent work order created for `file_name`.
pub fn find_latest_by_file(
    db: &Database,
    file_name: &str,
) -> Result<Option<WorkOrderRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM work_orders WHERE file_name = ?1
                 ORDER BY created_at DESC, rowid DESC LIMIT 1",
                params![file_name],
                WorkOrderRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}
