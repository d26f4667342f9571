use async_trait::async_trait;
use crawler_core::models::CrawlLog;
use crawler_core::traits::AlertNotifier;
use crawler_core::CrawlerResult;
use tracing::error;

/// 以 `error` 事件输出告警
///
/// 邮件等外部告警渠道由宿主系统接入，实现 [`AlertNotifier`] 即可替换。
#[derive(Debug, Default, Clone)]
pub struct TracingAlertNotifier;

#[async_trait]
impl AlertNotifier for TracingAlertNotifier {
    async fn notify(&self, log: &CrawlLog) -> CrawlerResult<()> {
        error!(
            event = "crawl_alert",
            task.id = log.task_id,
            log.id = log.id,
            metadata = %log.metadata,
            "采集告警: {}",
            log.message
        );
        Ok(())
    }
}
