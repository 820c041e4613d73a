//! `batch_jobs` and `file_tasks` tables.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

#[derive(Debug, Clone, PartialEq)]
pub struct BatchJobRow {
    pub id: String,
    pub total_files: i64,
    /// Options as JSON.
    pub options: String,
    pub status: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub processed_files: i64,
    pub failed_files: i64,
    pub cancelled_files: i64,
    pub paused_on_error: bool,
    pub updated_at: String,
}

impl BatchJobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            total_files: row.get("total_files")?,
            options: row.get("options")?,
            status: row.get("status")?,
            start_time: row.get("start_time")?,
            end_time: row.get("end_time")?,
            processed_files: row.get("processed_files")?,
            failed_files: row.get("failed_files")?,
            cancelled_files: row.get("cancelled_files")?,
            paused_on_error: row.get("paused_on_error")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileTaskRow {
    pub batch_id: String,
    pub file_name: String,
    pub file_size: i64,
    pub status: String,
    pub company_id: Option<String>,
    pub work_order_id: Option<String>,
    /// Detection result as JSON.
    pub detection_result: Option<String>,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub processing_time_ms: Option<i64>,
    pub error_message: Option<String>,
    pub attempts: i64,
    pub updated_at: String,
}

impl FileTaskRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            batch_id: row.get("batch_id")?,
            file_name: row.get("file_name")?,
            file_size: row.get("file_size")?,
            status: row.get("status")?,
            company_id: row.get("company_id")?,
            work_order_id: row.get("work_order_id")?,
            detection_result: row.get("detection_result")?,
            started_at: row.get("started_at")?,
            completed_at: row.get("completed_at")?,
            processing_time_ms: row.get("processing_time_ms")?,
            error_message: row.get("error_message")?,
            attempts: row.get("attempts")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub fn insert_batch(db: &Database, job: &BatchJobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO batch_jobs (id, total_files, options, status, start_time, end_time,
             processed_files, failed_files, cancelled_files, paused_on_error, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                job.id,
                job.total_files,
                job.options,
                job.status,
                job.start_time,
                job.end_time,
                job.processed_files,
                job.failed_files,
                job.cancelled_files,
                job.paused_on_error,
                job.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Overwrites status, end time, counters and the pause flag. Returns false if
/// no row matched.
pub fn update_batch(db: &Database, job: &BatchJobRow) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE batch_jobs SET status=?2, end_time=?3, processed_files=?4, failed_files=?5,
             cancelled_files=?6, paused_on_error=?7, updated_at=?8 WHERE id=?1",
            params![
                job.id,
                job.status,
                job.end_time,
                job.processed_files,
                job.failed_files,
                job.cancelled_files,
                job.paused_on_error,
                job.updated_at,
            ],
        )?;
        Ok(changed > 0)
    })
}

pub fn find_batch(db: &Database, id: &str) -> Result<Option<BatchJobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM batch_jobs WHERE id = ?1",
                params![id],
                BatchJobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Inserts or replaces the task keyed by `(batch_id, file_name)`.
pub fn upsert_file_task(db: &Database, task: &FileTaskRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO file_tasks (batch_id, file_name, file_size, status, company_id,
             work_order_id, detection_result, started_at, completed_at, processing_time_ms,
             error_message, attempts, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(batch_id, file_name) DO UPDATE SET
                file_size=excluded.file_size, status=excluded.status,
                company_id=excluded.company_id, work_order_id=excluded.work_order_id,
                detection_result=excluded.detection_result, started_at=excluded.started_at,
                completed_at=excluded.completed_at, processing_time_ms=excluded.processing_time_ms,
                error_message=excluded.error_message, attempts=excluded.attempts,
                updated_at=excluded.updated_at",
            params![
                task.batch_id,
                task.file_name,
                task.file_size,
                task.status,
                task.company_id,
                task.work_order_id,
                task.detection_result,
                task.started_at,
                task.completed_at,
                task.processing_time_ms,
                task.error_message,
                task.attempts,
                task.updated_at,
            ],
        )?;
        Ok(())
    })
}

pub fn list_file_tasks(db: &Database, batch_id: &str) -> Result<Vec<FileTaskRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM file_tasks WHERE batch_id = ?1 ORDER BY started_at, file_name",
        )?;
        let rows = stmt
            .query_map(params![batch_id], FileTaskRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
