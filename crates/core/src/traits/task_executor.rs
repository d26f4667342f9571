use async_trait::async_trait;

use crate::models::TaskResult;
use crate::CrawlerResult;

/// 任务执行器
///
/// 调度器只依赖这个接口触发一次任务执行。同一任务允许并发执行多次，
/// 实现方不能把“当前任务”保存在共享状态里。
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// 执行一次任务并返回汇总结果
    ///
    /// 单条记录的失败计入结果，不会返回错误；
    /// 资源站不可达、任务不存在等致命错误在记录日志后返回。
    async fn execute(&self, task_id: i64) -> CrawlerResult<TaskResult>;
}
