//! 任务调度器
//!
//! 持有任务ID到定时循环句柄的注册表，负责任务的增删改、暂停/恢复、
//! 定时触发与每日增量巡检。注册与注销都是幂等的。

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, FixedOffset, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crawler_core::models::{
    CrawlLog, NewTask, Task, TaskFilter, TaskResult, TaskStatus, TaskType, TaskUpdate,
};
use crawler_core::traits::{LogSink, TaskExecutor, TaskRepository};
use crawler_core::{CrawlerError, CrawlerResult};
use crawler_infrastructure::StructuredLogger;

use crate::cron_utils::CronScheduler;

/// 每日巡检的执行汇总
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub succeeded: Vec<i64>,
    pub failed: Vec<i64>,
}

pub struct TaskScheduler {
    tasks: Arc<dyn TaskRepository>,
    logs: Arc<dyn LogSink>,
    executor: Arc<dyn TaskExecutor>,
    offset: FixedOffset,
    jobs: Mutex<HashMap<i64, JoinHandle<()>>>,
    sweep: Mutex<Option<JoinHandle<()>>>,
}

impl TaskScheduler {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        logs: Arc<dyn LogSink>,
        executor: Arc<dyn TaskExecutor>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            tasks,
            logs,
            executor,
            offset,
            jobs: Mutex::new(HashMap::new()),
            sweep: Mutex::new(None),
        }
    }

    fn jobs(&self) -> std::sync::MutexGuard<'_, HashMap<i64, JoinHandle<()>>> {
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn sweep_handle(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.sweep.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn validate_cron(task: &Task) -> CrawlerResult<()> {
        match task.cron.as_deref().filter(|c| !c.trim().is_empty()) {
            Some(expr) => CronScheduler::validate_cron_expression(expr),
            None => Ok(()),
        }
    }

    async fn load_task(&self, id: i64) -> CrawlerResult<Task> {
        self.tasks
            .get_by_id(id)
            .await?
            .ok_or(CrawlerError::TaskNotFound { id })
    }

    // ---- 任务管理 ----

    /// 创建任务，配置了 cron 时注册定时触发
    #[instrument(skip(self, new_task), fields(task.name = %new_task.name))]
    pub async fn create_task(&self, new_task: NewTask) -> CrawlerResult<Task> {
        let task = new_task.into_task();
        Self::validate_cron(&task)?;
        let created = self.tasks.create(&task).await?;
        self.sync_registration(&created)?;
        info!(task.id = created.id, "创建采集任务: {}", created.name);
        Ok(created)
    }

    /// 更新任务并重新同步定时注册
    #[instrument(skip(self, update), fields(task.id = id))]
    pub async fn update_task(&self, id: i64, update: TaskUpdate) -> CrawlerResult<Task> {
        let mut task = self.load_task(id).await?;
        let touches_cron = update.touches_cron();
        update.apply_to(&mut task);
        Self::validate_cron(&task)?;
        self.tasks.update(&task).await?;
        if touches_cron {
            self.sync_registration(&task)?;
        }
        Ok(task)
    }

    /// 删除任务
    ///
    /// 依次删除日志、任务、定时注册。中途失败不回滚已完成的步骤。
    #[instrument(skip(self), fields(task.id = id))]
    pub async fn remove_task(&self, id: i64) -> CrawlerResult<()> {
        let deleted_logs = self.logs.delete_task_logs(id).await?;
        self.tasks.delete(id).await?;
        self.deregister(id);
        info!(task.id = id, deleted_logs, "删除采集任务");
        Ok(())
    }

    // ---- 生命周期 ----

    /// 暂停任务：只有运行中的任务可以暂停，暂停后不再定时触发
    ///
    /// 已经在执行的那一次不会被中断。
    #[instrument(skip(self), fields(task.id = id))]
    pub async fn pause_task(&self, id: i64) -> CrawlerResult<()> {
        let task = self.load_task(id).await?;
        if !task.status.can_pause() {
            return Err(CrawlerError::InvalidTransition {
                id,
                status: task.status,
                action: "暂停",
            });
        }
        self.tasks.update_status(id, TaskStatus::Pending, true).await?;
        self.deregister(id);
        info!(task.id = id, "任务已暂停");
        Ok(())
    }

    /// 恢复任务：只有等待中的任务可以恢复，恢复后重新注册定时触发
    #[instrument(skip(self), fields(task.id = id))]
    pub async fn resume_task(&self, id: i64) -> CrawlerResult<()> {
        let mut task = self.load_task(id).await?;
        if !task.status.can_resume() {
            return Err(CrawlerError::InvalidTransition {
                id,
                status: task.status,
                action: "恢复",
            });
        }
        self.tasks.update_status(id, TaskStatus::Running, false).await?;
        task.status = TaskStatus::Running;
        task.paused = false;
        self.sync_registration(&task)?;
        info!(task.id = id, "任务已恢复");
        Ok(())
    }

    // ---- 定时注册 ----

    /// 按任务当前配置注册或注销定时触发
    fn sync_registration(&self, task: &Task) -> CrawlerResult<()> {
        if task.should_register_cron() {
            self.register(task)
        } else {
            self.deregister(task.id);
            Ok(())
        }
    }

    /// 注册定时触发，已注册时先注销旧的
    ///
    /// 每次触发都单独派生一次执行，不等待其结束，慢任务不会推迟下一次触发。
    pub fn register(&self, task: &Task) -> CrawlerResult<()> {
        let Some(expr) = task.cron.as_deref().filter(|c| !c.trim().is_empty()) else {
            return Ok(());
        };
        let cron = CronScheduler::new(expr, self.offset)?;
        let next_fire = cron.next_execution_time(Utc::now());
        let task_id = task.id;
        let executor = Arc::clone(&self.executor);

        let handle = spawn_cron_loop(cron, move || {
            let executor = Arc::clone(&executor);
            async move {
                debug!(task.id = task_id, "定时触发");
                tokio::spawn(async move {
                    if let Err(e) = executor.execute(task_id).await {
                        warn!(task.id = task_id, error = %e, "定时执行失败");
                    }
                });
            }
        });

        if let Some(previous) = self.jobs().insert(task_id, handle) {
            previous.abort();
        }
        StructuredLogger::log_cron_registered(task_id, expr, next_fire);
        Ok(())
    }

    /// 注销定时触发，不存在时什么也不做；返回是否注销了已有注册
    pub fn deregister(&self, task_id: i64) -> bool {
        match self.jobs().remove(&task_id) {
            Some(handle) => {
                handle.abort();
                StructuredLogger::log_cron_deregistered(task_id);
                true
            }
            None => false,
        }
    }

    pub fn is_registered(&self, task_id: i64) -> bool {
        self.jobs().contains_key(&task_id)
    }

    pub fn registered_tasks(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.jobs().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// 启动时注册所有配置了 cron 且未暂停的任务
    ///
    /// 单个任务的表达式无效只记录警告，返回成功注册的数量。
    pub async fn bootstrap(&self) -> CrawlerResult<usize> {
        let tasks = self.tasks.list_schedulable().await?;
        let mut registered = 0;
        for task in &tasks {
            match self.register(task) {
                Ok(()) => registered += 1,
                Err(e) => warn!(task.id = task.id, error = %e, "注册定时任务失败"),
            }
        }
        info!("已注册 {}/{} 个定时采集任务", registered, tasks.len());
        Ok(registered)
    }

    /// 启动每日增量巡检
    pub fn start_daily_sweep(self: &Arc<Self>, cron_expr: &str) -> CrawlerResult<()> {
        let cron = CronScheduler::new(cron_expr, self.offset)?;
        let scheduler = Arc::downgrade(self);
        let handle = spawn_cron_loop(cron, move || {
            let scheduler = scheduler.clone();
            async move {
                if let Some(scheduler) = scheduler.upgrade() {
                    if let Err(e) = scheduler.run_daily_sweep().await {
                        warn!(error = %e, "每日巡检失败");
                    }
                }
            }
        });
        if let Some(previous) = self.sweep_handle().replace(handle) {
            previous.abort();
        }
        info!(cron = cron_expr, "每日增量巡检已启动");
        Ok(())
    }

    /// 依次执行所有未暂停的增量任务
    pub async fn run_daily_sweep(&self) -> CrawlerResult<SweepSummary> {
        let tasks = self.tasks.list_by_type(TaskType::Incremental).await?;
        let mut summary = SweepSummary::default();
        for task in tasks.iter().filter(|t| !t.paused) {
            match self.executor.execute(task.id).await {
                Ok(_) => summary.succeeded.push(task.id),
                Err(e) => {
                    warn!(task.id = task.id, error = %e, "巡检任务执行失败");
                    summary.failed.push(task.id);
                }
            }
        }
        info!(
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            "每日增量巡检完成"
        );
        Ok(summary)
    }

    // ---- 手动触发 ----

    /// 立即执行一次任务并等待结果；与正在进行的定时执行可以并存
    pub async fn trigger(&self, task_id: i64) -> CrawlerResult<TaskResult> {
        self.load_task(task_id).await?;
        self.executor.execute(task_id).await
    }

    /// 在后台执行一次任务
    pub fn trigger_detached(&self, task_id: i64) -> JoinHandle<CrawlerResult<TaskResult>> {
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move { executor.execute(task_id).await })
    }

    /// 下一次定时触发时间，未注册时为 `None`
    pub async fn next_run_time(&self, task_id: i64) -> CrawlerResult<Option<DateTime<Utc>>> {
        let task = self.load_task(task_id).await?;
        if !task.should_register_cron() || !self.is_registered(task_id) {
            return Ok(None);
        }
        match task.cron.as_deref() {
            Some(expr) => Ok(CronScheduler::new(expr, self.offset)?.next_execution_time(Utc::now())),
            None => Ok(None),
        }
    }

    // ---- 查询 ----

    pub async fn list_tasks(&self, filter: &TaskFilter) -> CrawlerResult<Vec<Task>> {
        self.tasks.list(filter).await
    }

    pub async fn get_task(&self, id: i64) -> CrawlerResult<Task> {
        self.load_task(id).await
    }

    pub async fn task_logs(
        &self,
        task_id: i64,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> CrawlerResult<Vec<CrawlLog>> {
        self.logs.list_logs(task_id, start, end).await
    }

    /// 注销全部定时触发与每日巡检
    pub fn shutdown(&self) {
        let mut jobs = self.jobs();
        let count = jobs.len();
        for (task_id, handle) in jobs.drain() {
            handle.abort();
            StructuredLogger::log_cron_deregistered(task_id);
        }
        drop(jobs);
        if let Some(handle) = self.sweep_handle().take() {
            handle.abort();
        }
        info!("调度器已停止，注销 {} 个定时任务", count);
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        for (_, handle) in self.jobs().drain() {
            handle.abort();
        }
        if let Some(handle) = self.sweep_handle().take() {
            handle.abort();
        }
    }
}

/// 派生一个按 cron 循环触发的任务
///
/// 下一次触发时间从上一次触发点之后计算，提前唤醒也不会重复触发。
fn spawn_cron_loop<F, Fut>(cron: CronScheduler, on_fire: F) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut last_fire = Utc::now();
        loop {
            let now = Utc::now();
            let Some(next) = cron.next_execution_time(now.max(last_fire)) else {
                warn!("CRON表达式没有后续触发时间，停止循环");
                break;
            };
            let wait = (next - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            last_fire = next;
            on_fire().await;
        }
    })
}
