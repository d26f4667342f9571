use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{FixedOffset, Utc};
use crawler_core::models::{LogLevel, NewTask, TaskStatus, TaskType, TaskUpdate};
use crawler_core::traits::{LogSink, TaskRepository};
use crawler_core::CrawlerError;
use crawler_dispatcher::TaskScheduler;
use crawler_infrastructure::DatabaseManager;
use crawler_testing_utils::{wait_for, MockLogSink, MockTaskExecutor, MockTaskRepository, TaskBuilder};

struct Harness {
    scheduler: Arc<TaskScheduler>,
    tasks: MockTaskRepository,
    logs: MockLogSink,
    executor: MockTaskExecutor,
}

fn harness(tasks: MockTaskRepository, executor: MockTaskExecutor) -> Harness {
    let logs = MockLogSink::new();
    let scheduler = Arc::new(TaskScheduler::new(
        Arc::new(tasks.clone()),
        Arc::new(logs.clone()),
        Arc::new(executor.clone()),
        FixedOffset::east_opt(8 * 3600).unwrap(),
    ));
    Harness {
        scheduler,
        tasks,
        logs,
        executor,
    }
}

fn new_task(name: &str, cron: Option<&str>) -> NewTask {
    NewTask {
        name: name.to_string(),
        source_id: 1,
        task_type: TaskType::Incremental,
        cron: cron.map(str::to_string),
        interval_ms: None,
        category_mapping: Vec::new(),
        match_rules: Default::default(),
        target_ids: Vec::new(),
    }
}

#[tokio::test]
async fn test_create_registers_cron() -> Result<()> {
    let h = harness(MockTaskRepository::new(), MockTaskExecutor::new());

    let with_cron = h.scheduler.create_task(new_task("a", Some("0 0 * * *"))).await?;
    let without_cron = h.scheduler.create_task(new_task("b", None)).await?;

    assert!(h.scheduler.is_registered(with_cron.id));
    assert!(!h.scheduler.is_registered(without_cron.id));
    assert!(h.scheduler.next_run_time(with_cron.id).await?.is_some());
    assert!(h.scheduler.next_run_time(without_cron.id).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_invalid_cron_rejected_on_create_and_update() -> Result<()> {
    let h = harness(MockTaskRepository::new(), MockTaskExecutor::new());

    let err = h
        .scheduler
        .create_task(new_task("bad", Some("every day")))
        .await
        .unwrap_err();
    assert!(matches!(err, CrawlerError::InvalidCron { .. }));
    assert_eq!(h.tasks.count(), 0);

    let task = h.scheduler.create_task(new_task("ok", None)).await?;
    let err = h
        .scheduler
        .update_task(
            task.id,
            TaskUpdate {
                cron: Some(Some("61 * * * *".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CrawlerError::InvalidCron { .. }));
    Ok(())
}

#[tokio::test]
async fn test_update_reregisters_and_clears_cron() -> Result<()> {
    let h = harness(MockTaskRepository::new(), MockTaskExecutor::new());
    let task = h.scheduler.create_task(new_task("a", None)).await?;
    assert!(!h.scheduler.is_registered(task.id));

    h.scheduler
        .update_task(
            task.id,
            TaskUpdate {
                cron: Some(Some("*/5 * * * *".to_string())),
                ..Default::default()
            },
        )
        .await?;
    assert!(h.scheduler.is_registered(task.id));

    let updated = h
        .scheduler
        .update_task(
            task.id,
            TaskUpdate {
                cron: Some(None),
                ..Default::default()
            },
        )
        .await?;
    assert!(updated.cron.is_none());
    assert!(!h.scheduler.is_registered(task.id));
    Ok(())
}

#[tokio::test]
async fn test_pause_only_from_running() -> Result<()> {
    let tasks = MockTaskRepository::with_tasks(vec![
        TaskBuilder::new().with_id(1).with_status(TaskStatus::Pending).build(),
        TaskBuilder::new().with_id(2).with_status(TaskStatus::Completed).build(),
        TaskBuilder::new()
            .with_id(3)
            .with_status(TaskStatus::Running)
            .with_cron("0 0 * * * *")
            .build(),
    ]);
    let h = harness(tasks, MockTaskExecutor::new());
    h.scheduler.bootstrap().await?;
    assert!(h.scheduler.is_registered(3));

    for id in [1, 2] {
        let err = h.scheduler.pause_task(id).await.unwrap_err();
        assert!(matches!(err, CrawlerError::InvalidTransition { .. }));
    }

    h.scheduler.pause_task(3).await?;
    let paused = h.tasks.get(3).unwrap();
    assert_eq!(paused.status, TaskStatus::Pending);
    assert!(paused.paused);
    assert!(!h.scheduler.is_registered(3));

    // 暂停状态在重启后仍然生效
    assert!(h.tasks.list_schedulable().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_resume_rearms_cron() -> Result<()> {
    let tasks = MockTaskRepository::with_tasks(vec![
        TaskBuilder::new()
            .with_id(1)
            .with_cron("0 0 * * * *")
            .paused()
            .build(),
        TaskBuilder::new().with_id(2).with_status(TaskStatus::Failed).build(),
    ]);
    let h = harness(tasks, MockTaskExecutor::new());
    assert_eq!(h.scheduler.bootstrap().await?, 0);

    h.scheduler.resume_task(1).await?;
    let resumed = h.tasks.get(1).unwrap();
    assert_eq!(resumed.status, TaskStatus::Running);
    assert!(!resumed.paused);
    assert!(h.scheduler.is_registered(1));

    assert!(matches!(
        h.scheduler.resume_task(2).await,
        Err(CrawlerError::InvalidTransition { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_remove_deletes_logs_task_and_registration() -> Result<()> {
    let h = harness(MockTaskRepository::new(), MockTaskExecutor::new());
    let task = h.scheduler.create_task(new_task("a", Some("0 0 * * *"))).await?;
    h.logs
        .append_log(task.id, LogLevel::Info, "task started", serde_json::json!({}))
        .await?;

    h.scheduler.remove_task(task.id).await?;
    assert!(h.logs.logs_for(task.id).is_empty());
    assert!(h.tasks.get(task.id).is_none());
    assert!(!h.scheduler.is_registered(task.id));

    // 注销不存在的注册不是错误
    assert!(!h.scheduler.deregister(task.id));
    assert!(matches!(
        h.scheduler.remove_task(task.id).await,
        Err(CrawlerError::TaskNotFound { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_cron_fire_spawns_execution() -> Result<()> {
    let executor = MockTaskExecutor::new();
    let h = harness(MockTaskRepository::new(), executor);
    let task = h
        .scheduler
        .create_task(new_task("every second", Some("* * * * * *")))
        .await?;

    let executor = h.executor.clone();
    let fired = wait_for(
        || {
            let executor = executor.clone();
            async move { executor.execution_count() >= 2 }
        },
        Duration::from_secs(5),
    )
    .await;
    assert!(fired);
    assert!(h.executor.executed().iter().all(|id| *id == task.id));

    h.scheduler.shutdown();
    assert!(h.scheduler.registered_tasks().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_daily_sweep_runs_incremental_tasks_sequentially() -> Result<()> {
    let tasks = MockTaskRepository::with_tasks(vec![
        TaskBuilder::new().with_id(1).with_type(TaskType::Incremental).build(),
        TaskBuilder::new().with_id(2).with_type(TaskType::Full).build(),
        TaskBuilder::new().with_id(3).with_type(TaskType::Incremental).build(),
        TaskBuilder::new()
            .with_id(4)
            .with_type(TaskType::Incremental)
            .paused()
            .build(),
    ]);
    let h = harness(tasks, MockTaskExecutor::new().failing_on(3));

    let summary = h.scheduler.run_daily_sweep().await?;
    assert_eq!(summary.succeeded, vec![1]);
    assert_eq!(summary.failed, vec![3]);
    assert_eq!(h.executor.executed(), vec![1, 3]);
    Ok(())
}

#[tokio::test]
async fn test_manual_trigger_tolerates_concurrent_runs() -> Result<()> {
    let tasks = MockTaskRepository::with_tasks(vec![TaskBuilder::new().with_id(1).build()]);
    let h = harness(
        tasks,
        MockTaskExecutor::new().with_delay(Duration::from_millis(50)),
    );

    let background = h.scheduler.trigger_detached(1);
    let result = h.scheduler.trigger(1).await?;
    assert!(result.is_completed);
    background.await??;
    assert_eq!(h.executor.executed(), vec![1, 1]);

    assert!(matches!(
        h.scheduler.trigger(99).await,
        Err(CrawlerError::TaskNotFound { id: 99 })
    ));
    Ok(())
}

#[tokio::test]
async fn test_pause_during_run_can_resume_after_completion() -> Result<()> {
    let db = DatabaseManager::new("sqlite::memory:", 1).await?;
    let tasks = db.task_repository();
    let scheduler = TaskScheduler::new(
        Arc::clone(&tasks),
        db.log_store(None),
        Arc::new(MockTaskExecutor::new()),
        FixedOffset::east_opt(8 * 3600).unwrap(),
    );
    let task = scheduler
        .create_task(new_task("增量", Some("0 0 * * * *")))
        .await?;

    // 执行进行中时暂停，随后这次执行正常结束
    tasks.mark_running(task.id, Utc::now()).await?;
    scheduler.pause_task(task.id).await?;
    tasks.mark_completed(task.id, 3, 0, None).await?;

    let paused = scheduler.get_task(task.id).await?;
    assert_eq!(paused.status, TaskStatus::Pending);
    assert!(paused.paused);
    assert!(!scheduler.is_registered(task.id));

    scheduler.resume_task(task.id).await?;
    let resumed = scheduler.get_task(task.id).await?;
    assert_eq!(resumed.status, TaskStatus::Running);
    assert!(!resumed.paused);
    assert!(scheduler.is_registered(task.id));

    scheduler.shutdown();
    Ok(())
}
