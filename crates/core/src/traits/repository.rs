//! 数据仓储层接口定义
//!
//! 此模块定义了采集引擎自身持久化的抽象接口：
//! - 任务仓储接口 (TaskRepository)
//! - 资源站仓储接口 (SourceRepository)
//!
//! 所有操作都是异步的，返回 `CrawlerResult<T>`，实现需满足 `Send + Sync`。
//! 任务计数器的累加在存储层完成，两次并发执行不会互相覆盖计数。

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Source, Task, TaskFilter, TaskStatus, TaskType};
use crate::CrawlerResult;

/// 任务仓储接口
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// 创建新任务
    ///
    /// `task.id` 会被忽略，返回包含数据库生成ID的任务。
    async fn create(&self, task: &Task) -> CrawlerResult<Task>;

    /// 根据ID获取任务，未找到时返回 `None`
    async fn get_by_id(&self, id: i64) -> CrawlerResult<Option<Task>>;

    /// 按过滤条件列出任务，按ID升序
    async fn list(&self, filter: &TaskFilter) -> CrawlerResult<Vec<Task>>;

    /// 整体更新任务定义
    ///
    /// # 错误
    ///
    /// * `TaskNotFound` - 任务不存在
    async fn update(&self, task: &Task) -> CrawlerResult<()>;

    /// 删除任务，任务不存在时返回 `TaskNotFound`
    async fn delete(&self, id: i64) -> CrawlerResult<()>;

    async fn list_by_type(&self, task_type: TaskType) -> CrawlerResult<Vec<Task>>;

    /// 列出需要注册定时任务的任务（设置了cron且未暂停）
    async fn list_schedulable(&self) -> CrawlerResult<Vec<Task>>;

    /// 更新状态与暂停标记
    async fn update_status(&self, id: i64, status: TaskStatus, paused: bool) -> CrawlerResult<()>;

    /// 标记开始执行：状态置为 running 并记录 `last_run_time`
    async fn mark_running(&self, id: i64, started_at: DateTime<Utc>) -> CrawlerResult<()>;

    /// 标记执行完成，计数在原值上累加
    async fn mark_completed(
        &self,
        id: i64,
        success: i64,
        fail: i64,
        last_error: Option<&str>,
    ) -> CrawlerResult<()>;

    /// 标记执行失败并记录错误信息
    async fn mark_failed(&self, id: i64, error: &str) -> CrawlerResult<()>;
}

/// 资源站仓储接口
///
/// 资源站由运维人员维护，采集引擎只读取。
#[async_trait]
pub trait SourceRepository: Send + Sync {
    async fn create(&self, source: &Source) -> CrawlerResult<Source>;

    async fn get_by_id(&self, id: i64) -> CrawlerResult<Option<Source>>;

    async fn list(&self) -> CrawlerResult<Vec<Source>>;
}
