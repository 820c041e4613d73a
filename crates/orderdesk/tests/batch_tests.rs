//! End-to-end tests for batch orchestration against a scripted pipeline.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{fast_batch_config, fast_tracker_config, source_file, source_files, FakePipeline};
use orderdesk::config::BatchConfig;
use orderdesk::{
    BatchEvent, BatchOptions, BatchOrchestrator, BatchStatus, FileStatus, MemoryStore,
    PauseReason, ProcessStatus, Store, ValidationError,
};

fn orchestrator(pipeline: Arc<FakePipeline>, store: Arc<MemoryStore>) -> Arc<BatchOrchestrator> {
    orchestrator_with(pipeline, store, fast_batch_config())
}

fn orchestrator_with(
    pipeline: Arc<FakePipeline>,
    store: Arc<MemoryStore>,
    config: BatchConfig,
) -> Arc<BatchOrchestrator> {
    Arc::new(BatchOrchestrator::new(
        pipeline,
        store as Arc<dyn Store>,
        config,
        fast_tracker_config(),
    ))
}

/// Polls `check` until it holds or a second has passed.
async fn wait_for(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn test_sequential_batch_processes_all_files() {
    let pipeline = Arc::new(FakePipeline::new());
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(Arc::clone(&pipeline), Arc::clone(&store));

    let summary = orch
        .start_batch(source_files(3), BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.status, BatchStatus::Completed);
    assert_eq!(summary.total_files, 3);
    assert_eq!(summary.success, 3);
    assert_eq!(summary.error, 0);
    assert_eq!(summary.not_started, 0);
    assert_eq!(pipeline.classify_calls(), 3);
    assert_eq!(pipeline.generate_calls(), 3);

    for result in &summary.results {
        assert_eq!(result.status, FileStatus::Success);
        assert_eq!(result.company_id.as_deref(), Some("ACME"));
        assert!(result.work_order_id.is_some());
        assert!(result.detection_result.is_some());
    }

    let handle = orch.handle();
    assert!(!handle.snapshot().is_processing);
    assert_eq!(handle.progress_percent(), 100.0);
    assert_eq!(
        handle.process_state("doc-00.pdf").map(|s| s.status),
        Some(ProcessStatus::Completed)
    );

    let jobs = store.batch_jobs();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].id, summary.batch_id);
    assert_eq!(jobs[0].status, BatchStatus::Completed);
}

#[tokio::test]
async fn test_oversized_batch_is_rejected_without_side_effects() {
    let pipeline = Arc::new(FakePipeline::new());
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(Arc::clone(&pipeline), Arc::clone(&store));

    let err = orch
        .start_batch(source_files(51), BatchOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err, ValidationError::BatchTooLarge { count: 51, max: 50 });
    assert_eq!(pipeline.classify_calls(), 0);
    assert_eq!(pipeline.generate_calls(), 0);
    assert!(store.batch_jobs().is_empty());
    assert!(!orch.handle().snapshot().is_processing);
}

#[tokio::test]
async fn test_raised_file_limit_still_rejects_51_files() {
    let pipeline = Arc::new(FakePipeline::new());
    let store = Arc::new(MemoryStore::new());
    let config = BatchConfig {
        max_files: 1000,
        ..fast_batch_config()
    };
    let orch = orchestrator_with(Arc::clone(&pipeline), Arc::clone(&store), config);

    let err = orch
        .start_batch(source_files(51), BatchOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err, ValidationError::BatchTooLarge { count: 51, max: 50 });
    assert_eq!(pipeline.generate_calls(), 0);
    assert!(store.batch_jobs().is_empty());
}

#[tokio::test]
async fn test_manual_company_batch_completes() {
    let pipeline = Arc::new(FakePipeline::new().detecting_nothing());
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(Arc::clone(&pipeline), Arc::clone(&store));

    let options = BatchOptions {
        concurrency_limit: 1,
        auto_detect_enabled: false,
        company_id: Some("ACME".to_string()),
        ..Default::default()
    };
    let summary = orch.start_batch(source_files(3), options).await.unwrap();

    assert_eq!(summary.status, BatchStatus::Completed);
    assert_eq!(summary.results.len(), 3);
    assert_eq!(summary.success, 3);
    assert!(summary.results.iter().all(|r| r.status == FileStatus::Success
        && r.company_id.as_deref() == Some("ACME")));
    assert_eq!(pipeline.classify_calls(), 0);
    assert_eq!(store.batch_jobs()[0].status, BatchStatus::Completed);
}

#[tokio::test]
async fn test_selected_company_is_trimmed() {
    let pipeline = Arc::new(FakePipeline::new());
    let orch = orchestrator(Arc::clone(&pipeline), Arc::new(MemoryStore::new()));

    let options = BatchOptions {
        auto_detect_enabled: false,
        company_id: Some("  ACME ".to_string()),
        ..Default::default()
    };
    let summary = orch.start_batch(source_files(1), options).await.unwrap();

    assert_eq!(summary.success, 1);
    assert_eq!(summary.results[0].company_id.as_deref(), Some("ACME"));
}

#[tokio::test]
async fn test_validation_rejections() {
    let orch = orchestrator(Arc::new(FakePipeline::new()), Arc::new(MemoryStore::new()));

    let err = orch
        .start_batch(Vec::new(), BatchOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, ValidationError::EmptyBatch);

    let options = BatchOptions {
        auto_detect_enabled: false,
        ..Default::default()
    };
    let err = orch.start_batch(source_files(2), options).await.unwrap_err();
    assert_eq!(err, ValidationError::MissingCompany);

    let files = vec![source_file("same.pdf"), source_file("same.pdf")];
    let err = orch
        .start_batch(files, BatchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ValidationError::DuplicateFileName(ref name) if name == "same.pdf"));
}

#[tokio::test]
async fn test_concurrency_never_exceeds_cap() {
    let pipeline = Arc::new(FakePipeline::new().with_latency(Duration::from_millis(20)));
    let orch = orchestrator(Arc::clone(&pipeline), Arc::new(MemoryStore::new()));

    let options = BatchOptions {
        concurrency_limit: 10,
        ..Default::default()
    };
    let summary = orch.start_batch(source_files(9), options).await.unwrap();

    assert_eq!(summary.success, 9);
    assert!(pipeline.max_in_flight() <= 3, "max in flight {}", pipeline.max_in_flight());
    assert!(pipeline.max_in_flight() >= 2);
}

#[tokio::test]
async fn test_parallel_batch_over_threshold_completes() {
    let pipeline = Arc::new(FakePipeline::new());
    let orch = orchestrator(Arc::clone(&pipeline), Arc::new(MemoryStore::new()));

    let options = BatchOptions {
        concurrency_limit: 3,
        ..Default::default()
    };
    let summary = orch.start_batch(source_files(12), options).await.unwrap();

    assert_eq!(summary.success, 12);
    assert_eq!(summary.results.len(), 12);
    assert!(pipeline.max_in_flight() <= 3);
}

#[tokio::test]
async fn test_file_failure_does_not_fail_batch() {
    let pipeline = Arc::new(FakePipeline::new().failing("doc-01.pdf"));
    let orch = orchestrator(Arc::clone(&pipeline), Arc::new(MemoryStore::new()));

    let summary = orch
        .start_batch(source_files(3), BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.status, BatchStatus::Completed);
    assert_eq!(summary.success, 2);
    assert_eq!(summary.error, 1);
    let failed = summary.result("doc-01.pdf").unwrap();
    assert_eq!(failed.status, FileStatus::Error);
    assert!(failed.error_message.as_deref().unwrap().contains("500"));
    assert_eq!(
        orch.handle().process_state("doc-01.pdf").map(|s| s.status),
        Some(ProcessStatus::Error)
    );
}

#[tokio::test]
async fn test_all_files_failing_marks_batch_error() {
    let pipeline = Arc::new(FakePipeline::new().detecting_nothing());
    let orch = orchestrator(Arc::clone(&pipeline), Arc::new(MemoryStore::new()));

    let summary = orch
        .start_batch(source_files(2), BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.status, BatchStatus::Error);
    assert_eq!(summary.error, 2);
    assert_eq!(pipeline.generate_calls(), 0);
}

#[tokio::test]
async fn test_selected_company_used_when_detection_finds_nothing() {
    let pipeline = Arc::new(FakePipeline::new().detecting_nothing());
    let orch = orchestrator(Arc::clone(&pipeline), Arc::new(MemoryStore::new()));

    let options = BatchOptions {
        company_id: Some("GLOBEX".to_string()),
        ..Default::default()
    };
    let summary = orch.start_batch(source_files(2), options).await.unwrap();

    assert_eq!(summary.success, 2);
    assert!(summary
        .results
        .iter()
        .all(|r| r.company_id.as_deref() == Some("GLOBEX")));
}

#[tokio::test]
async fn test_manual_company_skips_detection() {
    let pipeline = Arc::new(FakePipeline::new());
    let orch = orchestrator(Arc::clone(&pipeline), Arc::new(MemoryStore::new()));

    let options = BatchOptions {
        auto_detect_enabled: false,
        company_id: Some("GLOBEX".to_string()),
        ..Default::default()
    };
    let summary = orch.start_batch(source_files(2), options).await.unwrap();

    assert_eq!(summary.success, 2);
    assert_eq!(pipeline.classify_calls(), 0);
    assert!(summary.results.iter().all(|r| r.detection_result.is_none()));
}

#[tokio::test]
async fn test_pause_on_error_then_resume() {
    let pipeline = Arc::new(FakePipeline::new().failing("doc-01.pdf"));
    let orch = orchestrator(Arc::clone(&pipeline), Arc::new(MemoryStore::new()));
    let handle = orch.handle();

    let options = BatchOptions {
        pause_on_error: true,
        ..Default::default()
    };
    let runner = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.start_batch(source_files(3), options).await })
    };

    wait_for(|| handle.is_paused()).await;
    // The third file waits at the gate.
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(pipeline.generate_calls(), 2);
    assert_eq!(handle.snapshot().results.len(), 2);

    assert!(handle.resume());
    let summary = runner.await.unwrap().unwrap();

    assert_eq!(summary.status, BatchStatus::Completed);
    assert_eq!(summary.success, 2);
    assert_eq!(summary.error, 1);
    assert!(!summary.paused_on_error);
    assert_eq!(pipeline.generate_calls(), 3);
}

#[tokio::test]
async fn test_last_file_failure_leaves_batch_paused() {
    let pipeline = Arc::new(FakePipeline::new().failing("doc-01.pdf"));
    let store = Arc::new(MemoryStore::new());
    let orch = orchestrator(Arc::clone(&pipeline), Arc::clone(&store));
    let handle = orch.handle();

    let options = BatchOptions {
        pause_on_error: true,
        ..Default::default()
    };
    let summary = orch.start_batch(source_files(2), options).await.unwrap();

    assert!(summary.paused_on_error);
    assert_eq!(summary.success, 1);
    assert_eq!(summary.error, 1);
    assert_eq!(summary.result("doc-00.pdf").unwrap().status, FileStatus::Success);

    let snapshot = handle.snapshot();
    assert!(!snapshot.is_processing);
    assert!(snapshot.is_paused);
    assert_eq!(snapshot.pause_reason, Some(PauseReason::Error));

    let jobs = store.batch_jobs();
    assert!(jobs[0].paused_on_error);

    // The next batch starts unpaused.
    let summary = orch
        .start_batch(source_files(1), BatchOptions::default())
        .await
        .unwrap();
    assert!(!summary.paused_on_error);
    assert!(!handle.is_paused());
}

#[tokio::test]
async fn test_cancel_while_paused_on_error() {
    let pipeline = Arc::new(FakePipeline::new().failing("doc-00.pdf"));
    let orch = orchestrator(Arc::clone(&pipeline), Arc::new(MemoryStore::new()));
    let handle = orch.handle();

    let options = BatchOptions {
        pause_on_error: true,
        ..Default::default()
    };
    let runner = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.start_batch(source_files(3), options).await })
    };

    wait_for(|| handle.is_paused()).await;
    assert!(handle.cancel());
    let summary = runner.await.unwrap().unwrap();

    assert_eq!(summary.status, BatchStatus::Cancelled);
    assert_eq!(summary.error, 1);
    assert_eq!(summary.success, 0);
    assert_eq!(pipeline.generate_calls(), 1);
    assert_eq!(summary.cancelled + summary.not_started, 2);
}

#[tokio::test]
async fn test_user_pause_and_resume() {
    let pipeline = Arc::new(FakePipeline::new().with_latency(Duration::from_millis(30)));
    let orch = orchestrator(Arc::clone(&pipeline), Arc::new(MemoryStore::new()));
    let handle = orch.handle();

    let runner = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.start_batch(source_files(3), BatchOptions::default()).await })
    };

    wait_for(|| pipeline.generate_calls() >= 1).await;
    assert!(handle.pause());
    assert!(!handle.pause());

    // The in-flight file finishes; the next one does not start.
    wait_for(|| handle.snapshot().results.len() == 1).await;
    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(pipeline.generate_calls(), 1);

    assert!(handle.resume());
    let summary = runner.await.unwrap().unwrap();
    assert_eq!(summary.status, BatchStatus::Completed);
    assert_eq!(summary.success, 3);
}

#[tokio::test]
async fn test_cancel_yields_cancelled_not_error() {
    let pipeline = Arc::new(FakePipeline::new().with_latency(Duration::from_millis(50)));
    let orch = orchestrator(Arc::clone(&pipeline), Arc::new(MemoryStore::new()));
    let handle = orch.handle();
    let mut events = handle.subscribe();

    let runner = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.start_batch(source_files(3), BatchOptions::default()).await })
    };

    wait_for(|| pipeline.generate_calls() >= 1).await;
    assert!(handle.cancel());
    assert!(!handle.cancel());
    let summary = runner.await.unwrap().unwrap();

    assert_eq!(summary.status, BatchStatus::Cancelled);
    assert_eq!(summary.error, 0);
    assert_eq!(summary.cancelled, 1);
    assert_eq!(summary.not_started, 2);
    let first = summary.result("doc-00.pdf").unwrap();
    assert_eq!(first.status, FileStatus::Cancelled);
    assert_eq!(
        handle.process_state("doc-00.pdf").map(|s| s.status),
        Some(ProcessStatus::Cancelled)
    );

    let mut saw_cancelled = false;
    let mut saw_completed = false;
    while let Ok(event) = events.try_recv() {
        match event {
            BatchEvent::Cancelled { .. } => saw_cancelled = true,
            BatchEvent::Completed { summary } => {
                saw_completed = true;
                assert_eq!(summary.status, BatchStatus::Cancelled);
            }
            _ => {}
        }
    }
    assert!(saw_cancelled);
    assert!(saw_completed);
}

#[tokio::test]
async fn test_pause_and_cancel_ignored_when_idle() {
    let orch = orchestrator(Arc::new(FakePipeline::new()), Arc::new(MemoryStore::new()));
    let handle = orch.handle();

    assert!(!handle.pause());
    assert!(!handle.cancel());
    assert!(!handle.is_paused());
}

#[tokio::test]
async fn test_retry_replaces_failed_entry() {
    let pipeline = Arc::new(FakePipeline::new().failing_times("doc-01.pdf", 1));
    let orch = orchestrator(Arc::clone(&pipeline), Arc::new(MemoryStore::new()));

    let options = BatchOptions {
        retry_failed_files: true,
        ..Default::default()
    };
    let summary = orch.start_batch(source_files(3), options).await.unwrap();

    assert_eq!(summary.results.len(), 3);
    assert_eq!(summary.success, 3);
    assert_eq!(summary.error, 0);
    let retried = summary.result("doc-01.pdf").unwrap();
    assert_eq!(retried.status, FileStatus::Success);
    assert_eq!(retried.attempts, 2);
    assert_eq!(summary.result("doc-00.pdf").unwrap().attempts, 1);
    assert_eq!(pipeline.generate_calls(), 4);
}

#[tokio::test]
async fn test_retry_runs_once_per_file() {
    let pipeline = Arc::new(FakePipeline::new().failing("doc-00.pdf"));
    let orch = orchestrator(Arc::clone(&pipeline), Arc::new(MemoryStore::new()));

    let options = BatchOptions {
        retry_failed_files: true,
        ..Default::default()
    };
    let summary = orch.start_batch(source_files(2), options).await.unwrap();

    assert_eq!(summary.error, 1);
    assert_eq!(summary.result("doc-00.pdf").unwrap().attempts, 2);
    assert_eq!(pipeline.generate_calls(), 3);
}

#[tokio::test]
async fn test_store_failures_do_not_fail_files() {
    let pipeline = Arc::new(FakePipeline::new());
    let store = Arc::new(MemoryStore::new());
    store.set_fail_writes(true);
    let orch = orchestrator(Arc::clone(&pipeline), Arc::clone(&store));

    let summary = orch
        .start_batch(source_files(3), BatchOptions::default())
        .await
        .unwrap();

    assert_eq!(summary.status, BatchStatus::Completed);
    assert_eq!(summary.success, 3);
    assert!(!summary.batch_id.is_empty());
    assert!(store.batch_jobs().is_empty());
}

#[tokio::test]
async fn test_second_batch_rejected_while_running() {
    let pipeline = Arc::new(FakePipeline::new().with_latency(Duration::from_millis(30)));
    let orch = orchestrator(Arc::clone(&pipeline), Arc::new(MemoryStore::new()));
    let handle = orch.handle();

    let runner = {
        let orch = Arc::clone(&orch);
        tokio::spawn(async move { orch.start_batch(source_files(2), BatchOptions::default()).await })
    };
    wait_for(|| handle.snapshot().is_processing).await;

    let err = orch
        .start_batch(source_files(1), BatchOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err, ValidationError::AlreadyRunning);

    let summary = runner.await.unwrap().unwrap();
    assert_eq!(summary.success, 2);

    // Idle again: a new batch is accepted.
    let summary = orch
        .start_batch(source_files(1), BatchOptions::default())
        .await
        .unwrap();
    assert_eq!(summary.success, 1);
}
