//! 协作方接口的内存替身
//!
//! 行为尽量贴近 SQLite 实现（例如不存在的任务返回 `TaskNotFound`），
//! 并额外记录调用，便于断言。

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crawler_core::models::{
    CategoryNode, CrawlLog, ListFilters, LogLevel, PageResult, RawRecord, Source, Task, TaskFilter,
    TaskResult, TaskStatus, TaskType,
};
use crawler_core::traits::{
    LogSink, SourceAdapter, SourceRepository, TaskExecutor, TaskRepository,
};
use crawler_core::{CrawlerError, CrawlerResult};

/// TaskRepository 的内存实现
#[derive(Debug, Clone)]
pub struct MockTaskRepository {
    tasks: Arc<Mutex<HashMap<i64, Task>>>,
    next_id: Arc<Mutex<i64>>,
    fail_completion: Arc<Mutex<Vec<i64>>>,
}

impl MockTaskRepository {
    pub fn new() -> Self {
        Self::with_tasks(Vec::new())
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let max_id = tasks.iter().map(|t| t.id).max().unwrap_or(0);
        let task_map = tasks.into_iter().map(|t| (t.id, t)).collect();
        Self {
            tasks: Arc::new(Mutex::new(task_map)),
            next_id: Arc::new(Mutex::new(max_id + 1)),
            fail_completion: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// 指定任务的 `mark_completed` 返回错误
    pub fn failing_completion(self, task_id: i64) -> Self {
        self.fail_completion.lock().unwrap().push(task_id);
        self
    }

    /// 与 SQLite 实现一致：执行结束时已暂停的任务保持 `pending`
    fn finished_status(task: &Task, status: TaskStatus) -> TaskStatus {
        if task.paused {
            TaskStatus::Pending
        } else {
            status
        }
    }

    pub fn count(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    pub fn get(&self, id: i64) -> Option<Task> {
        self.tasks.lock().unwrap().get(&id).cloned()
    }

    fn with_task<T>(&self, id: i64, f: impl FnOnce(&mut Task) -> T) -> CrawlerResult<T> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks.get_mut(&id).ok_or(CrawlerError::TaskNotFound { id })?;
        let out = f(task);
        task.updated_at = Utc::now();
        Ok(out)
    }

    fn sorted(tasks: impl Iterator<Item = Task>) -> Vec<Task> {
        let mut tasks: Vec<Task> = tasks.collect();
        tasks.sort_by_key(|t| t.id);
        tasks
    }
}

impl Default for MockTaskRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskRepository for MockTaskRepository {
    async fn create(&self, task: &Task) -> CrawlerResult<Task> {
        let mut tasks = self.tasks.lock().unwrap();
        let mut next_id = self.next_id.lock().unwrap();

        let mut new_task = task.clone();
        new_task.id = *next_id;
        *next_id += 1;

        tasks.insert(new_task.id, new_task.clone());
        Ok(new_task)
    }

    async fn get_by_id(&self, id: i64) -> CrawlerResult<Option<Task>> {
        Ok(self.get(id))
    }

    async fn list(&self, filter: &TaskFilter) -> CrawlerResult<Vec<Task>> {
        let tasks = self.tasks.lock().unwrap();
        let mut filtered = Self::sorted(tasks.values().cloned());

        if let Some(status) = filter.status {
            filtered.retain(|t| t.status == status);
        }
        if let Some(task_type) = filter.task_type {
            filtered.retain(|t| t.task_type == task_type);
        }
        if let Some(name_pattern) = &filter.name_pattern {
            filtered.retain(|t| t.name.contains(name_pattern.as_str()));
        }
        if let Some(offset) = filter.offset {
            filtered = filtered.into_iter().skip(offset.max(0) as usize).collect();
        }
        if let Some(limit) = filter.limit.filter(|l| *l >= 0) {
            filtered.truncate(limit as usize);
        }
        Ok(filtered)
    }

    async fn update(&self, task: &Task) -> CrawlerResult<()> {
        let updated = task.clone();
        self.with_task(task.id, move |stored| *stored = updated)
    }

    async fn delete(&self, id: i64) -> CrawlerResult<()> {
        self.tasks
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(CrawlerError::TaskNotFound { id })
    }

    async fn list_by_type(&self, task_type: TaskType) -> CrawlerResult<Vec<Task>> {
        let tasks = self.tasks.lock().unwrap();
        Ok(Self::sorted(
            tasks.values().filter(|t| t.task_type == task_type).cloned(),
        ))
    }

    async fn list_schedulable(&self) -> CrawlerResult<Vec<Task>> {
        let tasks = self.tasks.lock().unwrap();
        Ok(Self::sorted(
            tasks.values().filter(|t| t.should_register_cron()).cloned(),
        ))
    }

    async fn update_status(&self, id: i64, status: TaskStatus, paused: bool) -> CrawlerResult<()> {
        self.with_task(id, |task| {
            task.status = status;
            task.paused = paused;
        })
    }

    async fn mark_running(&self, id: i64, started_at: DateTime<Utc>) -> CrawlerResult<()> {
        self.with_task(id, |task| {
            task.status = TaskStatus::Running;
            task.last_run_time = Some(started_at);
        })
    }

    async fn mark_completed(
        &self,
        id: i64,
        success: i64,
        fail: i64,
        last_error: Option<&str>,
    ) -> CrawlerResult<()> {
        if self.fail_completion.lock().unwrap().contains(&id) {
            return Err(CrawlerError::Internal(format!("task {id} completion rejected")));
        }
        self.with_task(id, |task| {
            task.status = Self::finished_status(task, TaskStatus::Completed);
            task.success_count += success;
            task.fail_count += fail;
            task.total_count += success + fail;
            if let Some(error) = last_error {
                task.last_error = Some(error.to_string());
            }
        })
    }

    async fn mark_failed(&self, id: i64, error: &str) -> CrawlerResult<()> {
        self.with_task(id, |task| {
            task.status = Self::finished_status(task, TaskStatus::Failed);
            task.last_error = Some(error.to_string());
        })
    }
}

/// SourceRepository 的内存实现
#[derive(Debug, Clone, Default)]
pub struct MockSourceRepository {
    sources: Arc<Mutex<HashMap<i64, Source>>>,
}

impl MockSourceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources(sources: Vec<Source>) -> Self {
        let repo = Self::new();
        repo.sources
            .lock()
            .unwrap()
            .extend(sources.into_iter().map(|s| (s.id, s)));
        repo
    }
}

#[async_trait]
impl SourceRepository for MockSourceRepository {
    async fn create(&self, source: &Source) -> CrawlerResult<Source> {
        let mut sources = self.sources.lock().unwrap();
        let mut created = source.clone();
        created.id = sources.keys().max().copied().unwrap_or(0) + 1;
        sources.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> CrawlerResult<Option<Source>> {
        Ok(self.sources.lock().unwrap().get(&id).cloned())
    }

    async fn list(&self) -> CrawlerResult<Vec<Source>> {
        let mut sources: Vec<Source> = self.sources.lock().unwrap().values().cloned().collect();
        sources.sort_by_key(|s| s.id);
        Ok(sources)
    }
}

/// LogSink 的内存实现，`error` 级别的日志同时计入告警
#[derive(Debug, Clone, Default)]
pub struct MockLogSink {
    logs: Arc<Mutex<Vec<CrawlLog>>>,
    alerts: Arc<Mutex<Vec<CrawlLog>>>,
}

impl MockLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logs(&self) -> Vec<CrawlLog> {
        self.logs.lock().unwrap().clone()
    }

    pub fn logs_for(&self, task_id: i64) -> Vec<CrawlLog> {
        self.logs()
            .into_iter()
            .filter(|log| log.task_id == task_id)
            .collect()
    }

    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.logs()
            .into_iter()
            .filter(|log| log.level == level)
            .map(|log| log.message)
            .collect()
    }

    pub fn alerts(&self) -> Vec<CrawlLog> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogSink for MockLogSink {
    async fn append_log(
        &self,
        task_id: i64,
        level: LogLevel,
        message: &str,
        metadata: serde_json::Value,
    ) -> CrawlerResult<CrawlLog> {
        let mut logs = self.logs.lock().unwrap();
        let log = CrawlLog {
            id: logs.len() as i64 + 1,
            task_id,
            level,
            message: message.to_string(),
            metadata,
            processed_count: None,
            success_count: None,
            fail_count: None,
            created_at: Utc::now(),
        };
        logs.push(log.clone());
        if level == LogLevel::Error {
            self.alerts.lock().unwrap().push(log.clone());
        }
        Ok(log)
    }

    async fn update_progress(
        &self,
        log_id: i64,
        processed: i64,
        success: i64,
        fail: i64,
    ) -> CrawlerResult<()> {
        let mut logs = self.logs.lock().unwrap();
        let log = logs
            .iter_mut()
            .find(|log| log.id == log_id)
            .ok_or(CrawlerError::LogNotFound { id: log_id })?;
        log.processed_count = Some(processed);
        log.success_count = Some(success);
        log.fail_count = Some(fail);
        Ok(())
    }

    async fn list_logs(
        &self,
        task_id: i64,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> CrawlerResult<Vec<CrawlLog>> {
        let mut logs: Vec<CrawlLog> = self
            .logs_for(task_id)
            .into_iter()
            .filter(|log| start.map_or(true, |s| log.created_at >= s))
            .filter(|log| end.map_or(true, |e| log.created_at <= e))
            .collect();
        logs.reverse();
        Ok(logs)
    }

    async fn delete_task_logs(&self, task_id: i64) -> CrawlerResult<u64> {
        let mut logs = self.logs.lock().unwrap();
        let before = logs.len();
        logs.retain(|log| log.task_id != task_id);
        Ok((before - logs.len()) as u64)
    }
}

/// 资源站适配器替身
///
/// 按页号返回预置的 [`PageResult`]；`fail_next` 让下一次请求返回网络错误。
#[derive(Debug, Clone, Default)]
pub struct MockSourceAdapter {
    pages: Arc<Mutex<HashMap<u32, PageResult>>>,
    details: Arc<Mutex<HashMap<String, RawRecord>>>,
    categories: Arc<Mutex<Vec<CategoryNode>>>,
    failures: Arc<Mutex<VecDeque<String>>>,
    requested_pages: Arc<Mutex<Vec<u32>>>,
    requested_ids: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MockSourceAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, page: PageResult) -> Self {
        self.pages.lock().unwrap().insert(page.page, page);
        self
    }

    pub fn with_details(self, records: Vec<RawRecord>) -> Self {
        self.details
            .lock()
            .unwrap()
            .extend(records.into_iter().map(|r| (r.vod_id.clone(), r)));
        self
    }

    pub fn with_categories(self, categories: Vec<CategoryNode>) -> Self {
        *self.categories.lock().unwrap() = categories;
        self
    }

    pub fn fail_next(&self, message: &str) {
        self.failures.lock().unwrap().push_back(message.to_string());
    }

    pub fn requested_pages(&self) -> Vec<u32> {
        self.requested_pages.lock().unwrap().clone()
    }

    pub fn requested_ids(&self) -> Vec<Vec<String>> {
        self.requested_ids.lock().unwrap().clone()
    }

    fn take_failure(&self) -> CrawlerResult<()> {
        match self.failures.lock().unwrap().pop_front() {
            Some(message) => Err(CrawlerError::Network(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SourceAdapter for MockSourceAdapter {
    fn adapter_type(&self) -> &str {
        "mock"
    }

    async fn fetch_list(
        &self,
        _base_url: &str,
        page: u32,
        _filters: &ListFilters,
    ) -> CrawlerResult<PageResult> {
        self.requested_pages.lock().unwrap().push(page);
        self.take_failure()?;
        self.pages
            .lock()
            .unwrap()
            .get(&page)
            .cloned()
            .ok_or_else(|| CrawlerError::Network(format!("page {page} not stubbed")))
    }

    async fn fetch_details(&self, _base_url: &str, ids: &[String]) -> CrawlerResult<Vec<RawRecord>> {
        self.requested_ids.lock().unwrap().push(ids.to_vec());
        self.take_failure()?;
        let details = self.details.lock().unwrap();
        Ok(ids.iter().filter_map(|id| details.get(id).cloned()).collect())
    }

    async fn fetch_categories(&self, _base_url: &str) -> CrawlerResult<Vec<CategoryNode>> {
        self.take_failure()?;
        Ok(self.categories.lock().unwrap().clone())
    }
}

/// 任务执行器替身，记录被执行的任务ID
#[derive(Debug, Clone, Default)]
pub struct MockTaskExecutor {
    executed: Arc<Mutex<Vec<i64>>>,
    failing: Arc<Mutex<Vec<i64>>>,
    delay: Option<Duration>,
}

impl MockTaskExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// 每次执行前等待，用于模拟慢任务
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// 指定任务执行时返回网络错误
    pub fn failing_on(self, task_id: i64) -> Self {
        self.failing.lock().unwrap().push(task_id);
        self
    }

    pub fn executed(&self) -> Vec<i64> {
        self.executed.lock().unwrap().clone()
    }

    pub fn execution_count(&self) -> usize {
        self.executed.lock().unwrap().len()
    }
}

#[async_trait]
impl TaskExecutor for MockTaskExecutor {
    async fn execute(&self, task_id: i64) -> CrawlerResult<TaskResult> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.executed.lock().unwrap().push(task_id);
        if self.failing.lock().unwrap().contains(&task_id) {
            return Err(CrawlerError::Network(format!("task {task_id} failed")));
        }
        Ok(TaskResult {
            is_completed: true,
            ..Default::default()
        })
    }
}
