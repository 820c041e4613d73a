//! SQLite-backed store.
//!
//! Converts between the domain records and the row types of [`crate::db`],
//! running every query on tokio's blocking pool.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{Store, StoreError, WorkOrderRecord};
use crate::batch::{BatchJob, BatchOptions, BatchStatus, FileStatus, FileTask};
use crate::db::batch_repo::{self, BatchJobRow, FileTaskRow};
use crate::db::history_repo::{self, HistoryRow};
use crate::db::rule_repo::{self, RuleRow};
use crate::db::work_order_repo::{self, WorkOrderRow};
use crate::db::{now_rfc3339, Database, DatabaseError};
use crate::detection::{DetectionHistoryEntry, DetectionMethod, DetectionRule, RuleType};

/// [`Store`] backed by SQLite. Each call runs on a blocking thread.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Inserts `rules` only when the rule table is empty. Returns how many were added.
    pub async fn seed_rules(&self, rules: Vec<DetectionRule>) -> Result<usize, StoreError> {
        self.blocking(move |db| {
            if rule_repo::count(db)? > 0 {
                return Ok(0);
            }
            let now = now_rfc3339();
            for rule in &rules {
                rule_repo::upsert(db, &rule_to_row(rule), &now)?;
            }
            Ok(rules.len())
        })
        .await
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Database) -> Result<T, DatabaseError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        let result = tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))?;
        Ok(result?)
    }
}

fn parse_time(s: &str) -> DateTime<Utc> {
    match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(e) => {
            log::warn!("Invalid stored timestamp '{}': {}", s, e);
            DateTime::<Utc>::default()
        }
    }
}

fn parse_opt_time(s: Option<&str>) -> Option<DateTime<Utc>> {
    s.map(parse_time)
}

fn job_to_row(job: &BatchJob, id: &str) -> Result<BatchJobRow, StoreError> {
    Ok(BatchJobRow {
        id: id.to_string(),
        total_files: job.total_files as i64,
        options: serde_json::to_string(&job.options)?,
        status: job.status.as_str().to_string(),
        start_time: job.start_time.to_rfc3339(),
        end_time: job.end_time.map(|t| t.to_rfc3339()),
        processed_files: job.processed_files as i64,
        failed_files: job.failed_files as i64,
        cancelled_files: job.cancelled_files as i64,
        paused_on_error: job.paused_on_error,
        updated_at: now_rfc3339(),
    })
}

fn row_to_job(row: BatchJobRow) -> Result<BatchJob, StoreError> {
    let options: BatchOptions = serde_json::from_str(&row.options)?;
    Ok(BatchJob {
        id: row.id,
        total_files: row.total_files.max(0) as usize,
        options,
        status: BatchStatus::parse(&row.status),
        start_time: parse_time(&row.start_time),
        end_time: parse_opt_time(row.end_time.as_deref()),
        processed_files: row.processed_files.max(0) as usize,
        failed_files: row.failed_files.max(0) as usize,
        cancelled_files: row.cancelled_files.max(0) as usize,
        paused_on_error: row.paused_on_error,
    })
}

fn task_to_row(batch_id: &str, task: &FileTask) -> Result<FileTaskRow, StoreError> {
    let detection_result = match &task.detection_result {
        Some(result) => Some(serde_json::to_string(result)?),
        None => None,
    };
    Ok(FileTaskRow {
        batch_id: batch_id.to_string(),
        file_name: task.file_name.clone(),
        file_size: task.file_size as i64,
        status: task.status.as_str().to_string(),
        company_id: task.company_id.clone(),
        work_order_id: task.work_order_id.clone(),
        detection_result,
        started_at: task.started_at.map(|t| t.to_rfc3339()),
        completed_at: task.completed_at.map(|t| t.to_rfc3339()),
        processing_time_ms: task.processing_time_ms.map(|ms| ms as i64),
        error_message: task.error_message.clone(),
        attempts: i64::from(task.attempts),
        updated_at: now_rfc3339(),
    })
}

fn row_to_task(row: FileTaskRow) -> Result<FileTask, StoreError> {
    let detection_result = match row.detection_result.as_deref() {
        Some(json) => Some(serde_json::from_str(json)?),
        None => None,
    };
    Ok(FileTask {
        file_name: row.file_name,
        file_size: row.file_size.max(0) as u64,
        status: FileStatus::parse(&row.status),
        company_id: row.company_id,
        work_order_id: row.work_order_id,
        detection_result,
        started_at: parse_opt_time(row.started_at.as_deref()),
        completed_at: parse_opt_time(row.completed_at.as_deref()),
        processing_time_ms: row.processing_time_ms.map(|ms| ms.max(0) as u64),
        error_message: row.error_message,
        attempts: row.attempts.clamp(0, i64::from(u32::MAX)) as u32,
    })
}

fn order_to_row(record: &WorkOrderRecord) -> WorkOrderRow {
    WorkOrderRow {
        id: record.id.clone(),
        file_name: record.file_name.clone(),
        company_id: record.company_id.clone(),
        status: record.status.clone(),
        content: record.content.clone(),
        error_message: record.error_message.clone(),
        created_at: record.created_at.to_rfc3339(),
        updated_at: record.updated_at.to_rfc3339(),
    }
}

fn row_to_order(row: WorkOrderRow) -> WorkOrderRecord {
    WorkOrderRecord {
        id: row.id,
        file_name: row.file_name,
        company_id: row.company_id,
        status: row.status,
        content: row.content,
        error_message: row.error_message,
        created_at: parse_time(&row.created_at),
        updated_at: parse_time(&row.updated_at),
    }
}

fn rule_to_row(rule: &DetectionRule) -> RuleRow {
    RuleRow {
        id: rule.id.clone(),
        company_id: rule.company_id.clone(),
        rule_type: rule.rule_type.as_str().to_string(),
        rule_value: rule.rule_value.clone(),
        priority: i64::from(rule.priority),
        is_active: rule.is_active,
    }
}

fn row_to_rule(row: RuleRow) -> Option<DetectionRule> {
    let Some(rule_type) = RuleType::parse(&row.rule_type) else {
        log::warn!(
            "Ignoring rule '{}' with unknown type '{}'",
            row.id,
            row.rule_type
        );
        return None;
    };
    Some(DetectionRule {
        id: row.id,
        company_id: row.company_id,
        rule_type,
        rule_value: row.rule_value,
        priority: row.priority.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
        is_active: row.is_active,
    })
}

fn entry_to_row(entry: &DetectionHistoryEntry) -> Result<HistoryRow, StoreError> {
    Ok(HistoryRow {
        id: entry.id.clone(),
        document_id: entry.document_id.clone(),
        detected_company_id: entry.detected_company_id.clone(),
        confidence: entry.confidence,
        method: entry.method.as_str().to_string(),
        details: serde_json::to_string(&entry.details)?,
        corrected_company_id: entry.corrected_company_id.clone(),
        created_at: entry.created_at.to_rfc3339(),
    })
}

fn row_to_entry(row: HistoryRow) -> Result<DetectionHistoryEntry, StoreError> {
    Ok(DetectionHistoryEntry {
        id: row.id,
        document_id: row.document_id,
        detected_company_id: row.detected_company_id,
        confidence: row.confidence,
        method: DetectionMethod::parse(&row.method).unwrap_or(DetectionMethod::Unknown),
        details: serde_json::from_str(&row.details)?,
        corrected_company_id: row.corrected_company_id,
        created_at: parse_time(&row.created_at),
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_batch_job(&self, job: &BatchJob) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let row = job_to_row(job, &id)?;
        self.blocking(move |db| batch_repo::insert_batch(db, &row))
            .await?;
        Ok(id)
    }

    async fn update_batch_job(&self, job: &BatchJob) -> Result<(), StoreError> {
        let row = job_to_row(job, &job.id)?;
        let updated = self
            .blocking(move |db| batch_repo::update_batch(db, &row))
            .await?;
        if !updated {
            return Err(StoreError::NotFound {
                kind: "batch job",
                id: job.id.clone(),
            });
        }
        Ok(())
    }

    async fn find_batch_job(&self, id: &str) -> Result<Option<BatchJob>, StoreError> {
        let id = id.to_string();
        let row = self
            .blocking(move |db| batch_repo::find_batch(db, &id))
            .await?;
        row.map(row_to_job).transpose()
    }

    async fn upsert_file_task(&self, batch_id: &str, task: &FileTask) -> Result<(), StoreError> {
        let row = task_to_row(batch_id, task)?;
        self.blocking(move |db| batch_repo::upsert_file_task(db, &row))
            .await
    }

    async fn list_file_tasks(&self, batch_id: &str) -> Result<Vec<FileTask>, StoreError> {
        let batch_id = batch_id.to_string();
        let rows = self
            .blocking(move |db| batch_repo::list_file_tasks(db, &batch_id))
            .await?;
        rows.into_iter().map(row_to_task).collect()
    }

    async fn create_work_order(&self, record: &WorkOrderRecord) -> Result<(), StoreError> {
        let row = order_to_row(record);
        self.blocking(move |db| work_order_repo::insert(db, &row))
            .await
    }

    async fn update_work_order_status(
        &self,
        id: &str,
        status: &str,
        content: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        let (owned_id, status) = (id.to_string(), status.to_string());
        let content = content.map(str::to_string);
        let error = error.map(str::to_string);
        let updated = self
            .blocking(move |db| {
                work_order_repo::update_status(
                    db,
                    &owned_id,
                    &status,
                    content.as_deref(),
                    error.as_deref(),
                    &now_rfc3339(),
                )
            })
            .await?;
        if !updated {
            return Err(StoreError::NotFound {
                kind: "work order",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn find_work_order(&self, id: &str) -> Result<Option<WorkOrderRecord>, StoreError> {
        let id = id.to_string();
        let row = self
            .blocking(move |db| work_order_repo::find_by_id(db, &id))
            .await?;
        Ok(row.map(row_to_order))
    }

    async fn find_work_order_by_file(
        &self,
        file_name: &str,
    ) -> Result<Option<WorkOrderRecord>, StoreError> {
        let file_name = file_name.to_string();
        let row = self
            .blocking(move |db| work_order_repo::find_latest_by_file(db, &file_name))
            .await?;
        Ok(row.map(row_to_order))
    }

    async fn list_active_rules(&self) -> Result<Vec<DetectionRule>, StoreError> {
        let rows = self.blocking(rule_repo::list_active).await?;
        Ok(rows.into_iter().filter_map(row_to_rule).collect())
    }

    async fn save_rule(&self, rule: &DetectionRule) -> Result<(), StoreError> {
        let row = rule_to_row(rule);
        self.blocking(move |db| rule_repo::upsert(db, &row, &now_rfc3339()))
            .await
    }

    async fn delete_rule(&self, id: &str) -> Result<bool, StoreError> {
        let id = id.to_string();
        self.blocking(move |db| rule_repo::delete(db, &id)).await
    }

    async fn record_detection(&self, entry: &DetectionHistoryEntry) -> Result<(), StoreError> {
        let row = entry_to_row(entry)?;
        self.blocking(move |db| history_repo::insert(db, &row))
            .await
    }

    async fn correct_detection(
        &self,
        history_id: &str,
        company_id: &str,
    ) -> Result<(), StoreError> {
        let (id, company) = (history_id.to_string(), company_id.to_string());
        let updated = self
            .blocking(move |db| history_repo::set_correction(db, &id, &company))
            .await?;
        if !updated {
            return Err(StoreError::NotFound {
                kind: "detection history entry",
                id: history_id.to_string(),
            });
        }
        Ok(())
    }

    async fn list_detection_history(
        &self,
        document_id: &str,
    ) -> Result<Vec<DetectionHistoryEntry>, StoreError> {
        let document_id = document_id.to_string();
        let rows = self
            .blocking(move |db| history_repo::list_for_document(db, &document_id))
            .await?;
        rows.into_iter().map(row_to_entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_seed_rules_only_into_empty_table() {
        let store = SqliteStore::new(Database::open_in_memory().unwrap());
        let seeded = store
            .seed_rules(vec![DetectionRule::keyword("r1", "ACME", "ACME", 10)])
            .await
            .unwrap();
        assert_eq!(seeded, 1);

        let again = store
            .seed_rules(vec![DetectionRule::keyword("r2", "ACME", "Acme", 10)])
            .await
            .unwrap();
        assert_eq!(again, 0);
        assert_eq!(store.list_active_rules().await.unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_rule_type_is_dropped() {
        let row = RuleRow {
            id: "r1".to_string(),
            company_id: "ACME".to_string(),
            rule_type: "barcode".to_string(),
            rule_value: "x".to_string(),
            priority: 1,
            is_active: true,
        };
        assert!(row_to_rule(row).is_none());
    }
}
