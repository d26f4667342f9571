use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, FixedOffset, Utc};
use crawler_core::models::{
    CrawlEvent, LogLevel, MatchStatus, RawRecord, TaskStatus, TaskType, TimeRange,
    VENDOR_TIME_FORMAT,
};
use crawler_core::traits::{CatalogStore, TaskExecutor};
use crawler_core::CrawlerError;
use crawler_domain::{EngineDefaults, RecordTransformer, TaskContext, REASON_NO_CHANGES};
use crawler_infrastructure::{AdapterFactory, InMemoryCatalog};
use crawler_testing_utils::{
    page_of, MockLogSink, MockSourceAdapter, MockSourceRepository, MockTaskRepository,
    RawRecordBuilder, SourceBuilder, TaskBuilder,
};
use crawler_worker::{CrawlRunner, ProgressHub, REASON_NO_CATEGORY};

struct Harness {
    runner: CrawlRunner,
    tasks: MockTaskRepository,
    logs: MockLogSink,
    adapter: MockSourceAdapter,
    catalog: Arc<InMemoryCatalog>,
    events: Arc<ProgressHub>,
}

fn harness(task: crawler_core::models::Task, adapter: MockSourceAdapter) -> Harness {
    harness_with(MockTaskRepository::with_tasks(vec![task]), adapter)
}

fn harness_with(tasks: MockTaskRepository, adapter: MockSourceAdapter) -> Harness {
    let sources = MockSourceRepository::with_sources(vec![SourceBuilder::new().build()]);
    let logs = MockLogSink::new();
    let catalog = Arc::new(InMemoryCatalog::new());
    let events = Arc::new(ProgressHub::new(16));

    let mut factory = AdapterFactory::new();
    factory.register("nangua", Arc::new(adapter.clone()));

    let runner = CrawlRunner::new(
        Arc::new(tasks.clone()),
        Arc::new(sources),
        Arc::new(logs.clone()),
        catalog.clone(),
        Arc::new(factory),
        events.clone(),
    );
    Harness {
        runner,
        tasks,
        logs,
        adapter,
        catalog,
        events,
    }
}

/// 以执行器相同的方式把一条记录预先写入片库
async fn seed(catalog: &InMemoryCatalog, task: &crawler_core::models::Task, record: &RawRecord) {
    let ctx = TaskContext::new(task, &SourceBuilder::new().build(), &EngineDefaults::default());
    let mapping = ctx.find_mapping(&record.type_id).expect("mapping should exist").clone();
    let transformed = RecordTransformer::transform(record, &mapping, &ctx, catalog)
        .await
        .unwrap();
    catalog.create(transformed.draft).await.unwrap();
}

fn vendor_time(offset_from_now: Duration) -> String {
    let offset = FixedOffset::east_opt(8 * 3600).unwrap();
    (Utc::now() + offset_from_now)
        .with_timezone(&offset)
        .format(VENDOR_TIME_FORMAT)
        .to_string()
}

#[tokio::test]
async fn test_incremental_run_end_to_end() -> Result<()> {
    let task = TaskBuilder::new().with_mapping("6", "电影").build();

    let unmapped = RawRecordBuilder::new("100", "某综艺").with_type("99").build();
    let existing = RawRecordBuilder::new("101", "流浪地球").build();
    let fresh = RawRecordBuilder::new("102", "满江红").build();

    let adapter = MockSourceAdapter::new().with_page(page_of(
        1,
        3,
        30,
        vec![unmapped, existing.clone(), fresh],
    ));
    let h = harness(task.clone(), adapter);
    seed(&h.catalog, &task, &existing).await;

    let mut rx = h.events.subscribe(task.id).await;
    let result = h.runner.execute(task.id).await?;

    assert_eq!(result.new_count, 1);
    assert_eq!(result.updated_count, 0);
    assert_eq!(result.skipped_count, 2);
    assert_eq!(result.success_count, 2);
    assert_eq!(result.fail_count, 0);
    assert!(result.is_completed);
    assert_eq!(h.catalog.len().await, 2);

    // 增量任务只拉取第一页
    assert_eq!(h.adapter.requested_pages(), vec![1]);

    let stored = h.tasks.get(task.id).unwrap();
    assert_eq!(stored.status, TaskStatus::Completed);
    assert_eq!(stored.success_count, 2);
    assert!(stored.last_run_time.is_some());
    assert!(stored.last_error.is_none());

    assert_eq!(
        h.logs.messages(LogLevel::Info),
        vec!["task started", "completed"]
    );
    let start_log = &h.logs.logs()[0];
    assert_eq!(start_log.processed_count, Some(2));

    let CrawlEvent::Progress(progress) = rx.recv().await? else {
        panic!("expected progress event");
    };
    assert_eq!(progress.current_page, 1);
    assert_eq!(progress.total_pages, 10);
    let statuses: Vec<(MatchStatus, Option<&str>)> = progress
        .items
        .iter()
        .map(|i| (i.status, i.reason.as_deref()))
        .collect();
    assert_eq!(
        statuses,
        vec![
            (MatchStatus::Skipped, Some(REASON_NO_CATEGORY)),
            (MatchStatus::Skipped, Some(REASON_NO_CHANGES)),
            (MatchStatus::New, None),
        ]
    );
    assert!(matches!(rx.recv().await?, CrawlEvent::Complete { .. }));
    Ok(())
}

#[tokio::test]
async fn test_full_run_walks_every_page() -> Result<()> {
    let task = TaskBuilder::new()
        .with_type(TaskType::Full)
        .with_interval_ms(5)
        .with_mapping("6", "电影")
        .build();
    let adapter = MockSourceAdapter::new()
        .with_page(page_of(
            1,
            2,
            3,
            vec![
                RawRecordBuilder::new("1", "流浪地球").build(),
                RawRecordBuilder::new("2", "满江红").build(),
            ],
        ))
        .with_page(page_of(2, 2, 3, vec![RawRecordBuilder::new("3", "三体").build()]));
    let h = harness(task.clone(), adapter);

    let result = h.runner.execute(task.id).await?;
    assert_eq!(h.adapter.requested_pages(), vec![1, 2]);
    assert_eq!(result.new_count, 3);
    assert_eq!(result.success_count, 3);
    assert_eq!(h.tasks.get(task.id).unwrap().total_count, 3);
    Ok(())
}

#[tokio::test]
async fn test_bad_record_does_not_abort_run() -> Result<()> {
    let task = TaskBuilder::new().with_mapping("6", "电影").build();
    let nameless = RawRecordBuilder::new("1", "  ").build();
    let adapter = MockSourceAdapter::new().with_page(page_of(
        1,
        20,
        2,
        vec![nameless, RawRecordBuilder::new("2", "满江红").build()],
    ));
    let h = harness(task.clone(), adapter);

    let result = h.runner.execute(task.id).await?;
    assert_eq!(result.fail_count, 1);
    assert_eq!(result.success_count, 1);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].data["vod_id"], "1");

    let stored = h.tasks.get(task.id).unwrap();
    assert_eq!(stored.status, TaskStatus::Completed);
    assert_eq!(stored.last_error.as_deref(), Some(result.failures[0].error.as_str()));
    assert_eq!(h.logs.messages(LogLevel::Warning).len(), 1);
    assert!(h.logs.alerts().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_duplicate_episodes_are_logged_as_warning() -> Result<()> {
    let task = TaskBuilder::new().with_mapping("6", "电影").build();
    let record = RawRecordBuilder::new("1", "三体")
        .with_play_url("第1集$first#第01集$second#第2集$u2")
        .build();
    let adapter = MockSourceAdapter::new().with_page(page_of(1, 1, 1, vec![record]));
    let h = harness(task.clone(), adapter);

    let result = h.runner.execute(task.id).await?;
    assert_eq!(result.new_count, 1);
    assert_eq!(result.fail_count, 0);

    let warnings = h.logs.messages(LogLevel::Warning);
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("三体"));
    let entry = h
        .logs
        .logs()
        .into_iter()
        .find(|l| l.level == LogLevel::Warning)
        .unwrap();
    let recorded = entry.metadata["warnings"].as_array().unwrap();
    assert_eq!(recorded.len(), 1);
    assert!(recorded[0].as_str().unwrap().contains("重复的集数"));
    // 任务本身仍然正常完成
    assert_eq!(h.tasks.get(task.id).unwrap().status, TaskStatus::Completed);
    Ok(())
}

#[tokio::test]
async fn test_completion_error_fails_task_and_closes_stream() -> Result<()> {
    let task = TaskBuilder::new().with_mapping("6", "电影").build();
    let adapter = MockSourceAdapter::new().with_page(page_of(
        1,
        1,
        1,
        vec![RawRecordBuilder::new("1", "满江红").build()],
    ));
    let tasks = MockTaskRepository::with_tasks(vec![task.clone()]).failing_completion(task.id);
    let h = harness_with(tasks, adapter);

    let mut rx = h.events.subscribe(task.id).await;
    let err = h.runner.execute(task.id).await.unwrap_err();
    assert!(err.to_string().contains("completion rejected"));

    let stored = h.tasks.get(task.id).unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert!(stored.last_error.unwrap().contains("completion rejected"));
    assert_eq!(h.logs.alerts().len(), 1);

    assert!(matches!(rx.recv().await?, CrawlEvent::Progress(_)));
    assert!(matches!(
        rx.recv().await,
        Err(tokio::sync::broadcast::error::RecvError::Closed)
    ));
    Ok(())
}

#[tokio::test]
async fn test_unreachable_source_fails_task() -> Result<()> {
    let task = TaskBuilder::new().with_mapping("6", "电影").build();
    let adapter = MockSourceAdapter::new();
    adapter.fail_next("connection refused");
    let h = harness(task.clone(), adapter);

    let err = h.runner.execute(task.id).await.unwrap_err();
    assert!(matches!(err, CrawlerError::Network(_)));

    let stored = h.tasks.get(task.id).unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert!(stored.last_error.unwrap().contains("connection refused"));
    assert_eq!(h.logs.alerts().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_missing_source_is_fatal() -> Result<()> {
    let task = TaskBuilder::new().with_source(42).build();
    let h = harness(task.clone(), MockSourceAdapter::new());

    let err = h.runner.execute(task.id).await.unwrap_err();
    assert!(matches!(err, CrawlerError::SourceNotFound { id: 42 }));
    assert_eq!(h.tasks.get(task.id).unwrap().status, TaskStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn test_single_task_fetches_target_ids() -> Result<()> {
    let task = TaskBuilder::new()
        .with_type(TaskType::Single)
        .with_target_ids(&["7", "8"])
        .with_mapping("6", "电影")
        .build();
    let adapter = MockSourceAdapter::new().with_details(vec![
        RawRecordBuilder::new("7", "流浪地球").build(),
        RawRecordBuilder::new("8", "满江红").build(),
    ]);
    let h = harness(task.clone(), adapter);

    let result = h.runner.execute(task.id).await?;
    assert_eq!(h.adapter.requested_ids(), vec![vec!["7".to_string(), "8".to_string()]]);
    assert!(h.adapter.requested_pages().is_empty());
    assert_eq!(result.new_count, 2);
    Ok(())
}

#[tokio::test]
async fn test_collect_by_time_stops_at_cutoff() -> Result<()> {
    let task = TaskBuilder::new().with_mapping("6", "电影").build();
    let adapter = MockSourceAdapter::new().with_page(page_of(
        1,
        3,
        9,
        vec![
            RawRecordBuilder::new("1", "流浪地球")
                .with_time(&vendor_time(Duration::hours(-1)))
                .build(),
            RawRecordBuilder::new("2", "满江红")
                .with_time(&vendor_time(Duration::days(-10)))
                .build(),
            RawRecordBuilder::new("3", "三体")
                .with_time(&vendor_time(Duration::hours(-2)))
                .build(),
        ],
    ));
    let h = harness(task.clone(), adapter);

    let collected = h.runner.collect_by_time(task.id, TimeRange::Day, 1).await?;
    assert!(collected.is_completed);
    assert_eq!(collected.items.len(), 1);
    assert_eq!(collected.items[0].name, "流浪地球");
    assert!(collected.last_video_time.is_some());

    let all = h.runner.collect_by_time(task.id, TimeRange::All, 1).await?;
    assert!(!all.is_completed);
    assert_eq!(all.items.len(), 3);
    Ok(())
}
