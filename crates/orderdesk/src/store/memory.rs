use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{Store, StoreError, WorkOrderRecord};
use crate::batch::{BatchJob, FileTask};
use crate::detection::{DetectionHistoryEntry, DetectionRule};

#[derive(Debug, Default)]
struct MemoryState {
    jobs: HashMap<String, BatchJob>,
    /// Tasks per batch, in first-insert order.
    tasks: HashMap<String, Vec<FileTask>>,
    work_orders: Vec<WorkOrderRecord>,
    rules: Vec<DetectionRule>,
    history: Vec<DetectionHistoryEntry>,
}

/// In-process [`Store`] for tests and dry runs.
///
/// Writes and rule loading can be made to fail on demand.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    fail_writes: AtomicBool,
    fail_rule_loading: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: Vec<DetectionRule>) -> Self {
        let store = Self::default();
        store.write().rules = rules;
        store
    }

    /// Makes every write fail with [`StoreError::Unavailable`].
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_rule_loading(&self, fail: bool) {
        self.fail_rule_loading.store(fail, Ordering::SeqCst);
    }

    pub fn batch_jobs(&self) -> Vec<BatchJob> {
        self.read().jobs.values().cloned().collect()
    }

    pub fn work_orders(&self) -> Vec<WorkOrderRecord> {
        self.read().work_orders.clone()
    }

    pub fn history(&self) -> Vec<DetectionHistoryEntry> {
        self.read().history.clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryState> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryState> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_batch_job(&self, job: &BatchJob) -> Result<String, StoreError> {
        self.check_writable()?;
        let id = uuid::Uuid::new_v4().to_string();
        let mut stored = job.clone();
        stored.id = id.clone();
        self.write().jobs.insert(id.clone(), stored);
        Ok(id)
    }

    async fn update_batch_job(&self, job: &BatchJob) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.write();
        match state.jobs.get_mut(&job.id) {
            Some(stored) => {
                *stored = job.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound {
                kind: "batch job",
                id: job.id.clone(),
            }),
        }
    }

    async fn find_batch_job(&self, id: &str) -> Result<Option<BatchJob>, StoreError> {
        Ok(self.read().jobs.get(id).cloned())
    }

    async fn upsert_file_task(&self, batch_id: &str, task: &FileTask) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.write();
        let tasks = state.tasks.entry(batch_id.to_string()).or_default();
        match tasks.iter_mut().find(|t| t.file_name == task.file_name) {
            Some(existing) => *existing = task.clone(),
            None => tasks.push(task.clone()),
        }
        Ok(())
    }

    async fn list_file_tasks(&self, batch_id: &str) -> Result<Vec<FileTask>, StoreError> {
        Ok(self.read().tasks.get(batch_id).cloned().unwrap_or_default())
    }

    async fn create_work_order(&self, record: &WorkOrderRecord) -> Result<(), StoreError> {
        self.check_writable()?;
        self.write().work_orders.push(record.clone());
        Ok(())
    }

    async fn update_work_order_status(
        &self,
        id: &str,
        status: &str,
        content: Option<&str>,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.write();
        let record = state
            .work_orders
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "work order",
                id: id.to_string(),
            })?;
        record.status = status.to_string();
        if let Some(content) = content {
            record.content = Some(content.to_string());
        }
        if let Some(error) = error {
            record.error_message = Some(error.to_string());
        }
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn find_work_order(&self, id: &str) -> Result<Option<WorkOrderRecord>, StoreError> {
        Ok(self.read().work_orders.iter().find(|r| r.id == id).cloned())
    }

    async fn find_work_order_by_file(
        &self,
        file_name: &str,
    ) -> Result<Option<WorkOrderRecord>, StoreError> {
        Ok(self
            .read()
            .work_orders
            .iter()
            .rev()
            .find(|r| r.file_name == file_name)
            .cloned())
    }

    async fn list_active_rules(&self) -> Result<Vec<DetectionRule>, StoreError> {
        if self.fail_rule_loading.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("rule table unreachable".to_string()));
        }
        let mut rules: Vec<DetectionRule> = self
            .read()
            .rules
            .iter()
            .filter(|r| r.is_active)
            .cloned()
            .collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        Ok(rules)
    }

    async fn save_rule(&self, rule: &DetectionRule) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.write();
        match state.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule.clone(),
            None => state.rules.push(rule.clone()),
        }
        Ok(())
    }

    async fn delete_rule(&self, id: &str) -> Result<bool, StoreError> {
        self.check_writable()?;
        let mut state = self.write();
        let before = state.rules.len();
        state.rules.retain(|r| r.id != id);
        Ok(state.rules.len() != before)
    }

    async fn record_detection(&self, entry: &DetectionHistoryEntry) -> Result<(), StoreError> {
        self.check_writable()?;
        self.write().history.push(entry.clone());
        Ok(())
    }

    async fn correct_detection(
        &self,
        history_id: &str,
        company_id: &str,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.write();
        let entry = state
            .history
            .iter_mut()
            .find(|e| e.id == history_id)
            .ok_or_else(|| StoreError::NotFound {
                kind: "detection history entry",
                id: history_id.to_string(),
            })?;
        entry.corrected_company_id = Some(company_id.to_string());
        Ok(())
    }

    async fn list_detection_history(
        &self,
        document_id: &str,
    ) -> Result<Vec<DetectionHistoryEntry>, StoreError> {
        Ok(self
            .read()
            .history
            .iter()
            .filter(|e| e.document_id == document_id)
            .cloned()
            .collect())
    }
}
