//! 采集日志与告警接口

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{CrawlLog, LogLevel};
use crate::CrawlerResult;

/// 任务执行日志存储
///
/// 日志只追加；`error` 级别的日志写入后由实现方触发告警。
#[async_trait]
pub trait LogSink: Send + Sync {
    async fn append_log(
        &self,
        task_id: i64,
        level: LogLevel,
        message: &str,
        metadata: serde_json::Value,
    ) -> CrawlerResult<CrawlLog>;

    /// 回写某条日志的处理进度计数
    async fn update_progress(
        &self,
        log_id: i64,
        processed: i64,
        success: i64,
        fail: i64,
    ) -> CrawlerResult<()>;

    /// 按时间倒序列出任务日志，可选时间窗口 `[start, end]`
    async fn list_logs(
        &self,
        task_id: i64,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> CrawlerResult<Vec<CrawlLog>>;

    /// 删除任务的全部日志，返回删除条数
    async fn delete_task_logs(&self, task_id: i64) -> CrawlerResult<u64>;
}

/// 告警通知
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn notify(&self, log: &CrawlLog) -> CrawlerResult<()>;
}
