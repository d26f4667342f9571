use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crawler_core::models::{CategoryNode, CrawlEvent, TaskResult};
use crawler_core::traits::{AlertNotifier, TaskExecutor};
use crawler_core::AppConfig;
use crawler_dispatcher::TaskScheduler;
use crawler_domain::{EngineDefaults, Tag, TagDeduplicator, TagMerge};
use crawler_infrastructure::{AdapterFactory, DatabaseManager, InMemoryCatalog, TracingAlertNotifier};
use crawler_worker::{CrawlRunner, ProgressHub};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// 关闭时等待调度器收尾的时间
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// 主应用程序
///
/// 组装数据库、适配器、片库、执行器和调度器。
pub struct Application {
    config: AppConfig,
    db: DatabaseManager,
    runner: Arc<CrawlRunner>,
    scheduler: Arc<TaskScheduler>,
}

impl Application {
    pub async fn new(config: AppConfig) -> Result<Self> {
        let db = DatabaseManager::new(&config.database.url, config.database.max_connections)
            .await
            .with_context(|| format!("打开数据库失败: {}", config.database.url))?;

        let notifier: Arc<dyn AlertNotifier> = Arc::new(TracingAlertNotifier);
        let tasks = db.task_repository();
        let logs = db.log_store(Some(notifier));
        let adapters = Arc::new(AdapterFactory::with_http(&config.crawler)?);
        info!("已注册资源站适配器: {:?}", adapters.supported_types());

        let offset = config.scheduler.offset();
        let runner = Arc::new(
            CrawlRunner::new(
                Arc::clone(&tasks),
                db.source_repository(),
                Arc::clone(&logs),
                Arc::new(InMemoryCatalog::new()),
                adapters,
                Arc::new(ProgressHub::new(config.crawler.event_buffer)),
            )
            .with_defaults(EngineDefaults {
                source_tag: config.crawler.default_source_tag.clone(),
                title_similarity_threshold: config.crawler.title_similarity_threshold,
                utc_offset: offset,
            }),
        );

        let executor: Arc<dyn TaskExecutor> = runner.clone();
        let scheduler = Arc::new(TaskScheduler::new(tasks, logs, executor, offset));

        Ok(Self {
            config,
            db,
            runner,
            scheduler,
        })
    }

    /// 常驻运行：注册定时任务与每日巡检，直到收到关闭信号
    pub async fn serve(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let registered = self.scheduler.bootstrap().await?;
        info!("调度器启动完成，定时任务 {} 个", registered);

        if self.config.scheduler.daily_sweep_enabled {
            self.scheduler
                .start_daily_sweep(&self.config.scheduler.daily_sweep_cron)?;
        }

        let _ = shutdown_rx.recv().await;
        info!("收到关闭信号，停止调度器");
        self.scheduler.shutdown();

        if tokio::time::timeout(SHUTDOWN_TIMEOUT, self.db.close())
            .await
            .is_err()
        {
            warn!("关闭数据库连接超时");
        }
        Ok(())
    }

    /// 前台执行一次任务，并把进度事件写入日志
    pub async fn run_task(&self, task_id: i64) -> Result<TaskResult> {
        let mut rx = self.runner.events().subscribe(task_id).await;
        let reporter = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(CrawlEvent::Progress(progress)) => info!(
                        task.id = progress.task_id,
                        page = progress.current_page,
                        total_pages = progress.total_pages,
                        success = progress.success_count,
                        fail = progress.fail_count,
                        "采集进度"
                    ),
                    Ok(CrawlEvent::Complete { .. }) | Err(broadcast::error::RecvError::Closed) => {
                        break
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("进度事件积压，跳过 {} 条", skipped)
                    }
                }
            }
        });

        let result = self.runner.execute(task_id).await;
        let _ = reporter.await;
        let result = result.with_context(|| format!("任务执行失败: {task_id}"))?;

        info!(
            new = result.new_count,
            updated = result.updated_count,
            skipped = result.skipped_count,
            failed = result.fail_count,
            "任务执行完成"
        );
        self.db.close().await;
        Ok(result)
    }
}

/// 拉取资源站的分类树，不需要数据库
pub async fn list_categories(
    config: &AppConfig,
    base_url: &str,
    adapter_type: &str,
) -> Result<Vec<CategoryNode>> {
    let factory = AdapterFactory::with_http(&config.crawler)?;
    let adapter = factory.get(adapter_type)?;
    let categories = adapter
        .fetch_categories(base_url.trim())
        .await
        .with_context(|| format!("拉取分类失败: {base_url}"))?;
    Ok(categories)
}

/// 规划相似标签合并，输入为标签数组的 JSON
pub fn plan_tag_merges(json: &str, threshold: f64) -> Result<Vec<TagMerge>> {
    let tags: Vec<Tag> = serde_json::from_str(json).context("解析标签列表失败")?;
    Ok(TagDeduplicator::plan_tag_merges(&tags, threshold))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_tag_merges_uses_configured_threshold() {
        let json = r#"[
            {"id": 1, "name": "喜剧片"},
            {"id": 2, "name": "喜剧"},
            {"id": 3, "name": "战争", "synonyms": ["战争片"]}
        ]"#;
        let threshold = AppConfig::default().crawler.tag_similarity_threshold;
        assert!(plan_tag_merges(json, threshold).unwrap().is_empty());

        let merges = plan_tag_merges(json, 0.6).unwrap();
        assert_eq!(merges, vec![TagMerge { from: 2, into: 1 }]);
    }

    #[test]
    fn test_plan_tag_merges_rejects_malformed_input() {
        assert!(plan_tag_merges("{\"id\": 1}", 0.8).is_err());
    }
}
