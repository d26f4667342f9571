//! 采集任务执行器
//!
//! 一次执行对应一个任务ID：
//!
//! ```text
//! 加载任务 -> running -> 解析资源站适配器 -> 逐页拉取
//!   每条记录: 结果过滤 -> 分类映射 -> 转换 -> 对账
//!   每页结束: 推送进度, 回写日志进度, 按 interval 等待
//! -> completed（累加计数） / failed（记录错误后返回）
//! ```
//!
//! 单条记录的错误只计入失败列表，不会中断执行；拉取页面失败属于致命错误。

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use crawler_core::models::{
    CollectResult, CrawlEvent, CrawlProgress, ItemOutcome, ListFilters, LogLevel, MatchStatus,
    RawRecord, Task, TaskFailure, TaskResult, TaskType, TimeRange,
};
use crawler_core::traits::{
    CatalogStore, LogSink, SourceRepository, TaskExecutor, TaskRepository,
};
use crawler_core::{CrawlerError, CrawlerResult};
use crawler_domain::{EngineDefaults, Reconciler, RecordFilter, RecordTransformer, TaskContext};
use crawler_infrastructure::{AdapterFactory, CrawlMetrics, ResolvedAdapter, StructuredLogger};
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::events::ProgressHub;

pub const REASON_NO_CATEGORY: &str = "no matching category";

/// 单条记录的处理结果
struct ProcessedItem {
    outcome: ItemOutcome,
    /// 是否经过对账（计入成功数）
    reconciled: bool,
}

/// 已解析的执行环境
struct PreparedRun {
    ctx: TaskContext,
    resolved: ResolvedAdapter,
}

pub struct CrawlRunner {
    tasks: Arc<dyn TaskRepository>,
    sources: Arc<dyn SourceRepository>,
    logs: Arc<dyn LogSink>,
    catalog: Arc<dyn CatalogStore>,
    adapters: Arc<AdapterFactory>,
    events: Arc<ProgressHub>,
    metrics: CrawlMetrics,
    defaults: EngineDefaults,
}

impl CrawlRunner {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        sources: Arc<dyn SourceRepository>,
        logs: Arc<dyn LogSink>,
        catalog: Arc<dyn CatalogStore>,
        adapters: Arc<AdapterFactory>,
        events: Arc<ProgressHub>,
    ) -> Self {
        Self {
            tasks,
            sources,
            logs,
            catalog,
            adapters,
            events,
            metrics: CrawlMetrics::new(),
            defaults: EngineDefaults::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: EngineDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn events(&self) -> Arc<ProgressHub> {
        Arc::clone(&self.events)
    }

    async fn load_task(&self, task_id: i64) -> CrawlerResult<Task> {
        self.tasks
            .get_by_id(task_id)
            .await?
            .ok_or(CrawlerError::TaskNotFound { id: task_id })
    }

    async fn prepare(&self, task: &Task) -> CrawlerResult<PreparedRun> {
        let source = self
            .sources
            .get_by_id(task.source_id)
            .await?
            .ok_or(CrawlerError::SourceNotFound { id: task.source_id })?;
        let resolved = self.adapters.resolve(&source)?;
        Ok(PreparedRun {
            ctx: TaskContext::new(task, &source, &self.defaults),
            resolved,
        })
    }

    /// 写执行日志；日志失败不影响采集本身
    async fn log(
        &self,
        task_id: i64,
        level: LogLevel,
        message: &str,
        metadata: serde_json::Value,
    ) -> Option<i64> {
        match self.logs.append_log(task_id, level, message, metadata).await {
            Ok(log) => Some(log.id),
            Err(e) => {
                warn!(task.id = task_id, error = %e, "写入采集日志失败");
                None
            }
        }
    }

    /// 处理一条记录
    ///
    /// 先按结果过滤条件，再按分类映射筛选；两者未通过的记录以 `skipped` 返回，
    /// 不计入成功数。通过的记录转换后交给对账。
    async fn process_record(
        &self,
        ctx: &TaskContext,
        record: &RawRecord,
    ) -> CrawlerResult<ProcessedItem> {
        let name = record.vod_name.trim();

        if let Some(reason) = RecordFilter::rejection_reason(record, &ctx.match_rules.filters) {
            return Ok(ProcessedItem {
                outcome: ItemOutcome::skipped(name, reason),
                reconciled: false,
            });
        }
        let Some(mapping) = ctx.find_mapping(record.type_id.trim()) else {
            return Ok(ProcessedItem {
                outcome: ItemOutcome::skipped(name, REASON_NO_CATEGORY),
                reconciled: false,
            });
        };

        let transformed =
            RecordTransformer::transform(record, mapping, ctx, self.catalog.as_ref()).await?;
        if !transformed.warnings.is_empty() {
            for warning in &transformed.warnings {
                warn!(task.id = ctx.task_id, title = name, "{warning}");
            }
            self.log(
                ctx.task_id,
                LogLevel::Warning,
                &format!("{name}: 播放串存在 {} 处重复集数", transformed.warnings.len()),
                json!({ "title": name, "warnings": transformed.warnings }),
            )
            .await;
        }
        let outcome = Reconciler::reconcile(
            transformed.draft,
            &ctx.match_rules,
            ctx.similarity_threshold,
            self.catalog.as_ref(),
        )
        .await?;

        Ok(ProcessedItem {
            outcome: ItemOutcome {
                name: name.to_string(),
                status: outcome.status,
                reason: outcome.reason,
                changes: outcome.changes,
                mapped_category: Some(transformed.category_name),
            },
            reconciled: true,
        })
    }

    /// 按资源站返回顺序处理一批记录，并累加到执行结果
    async fn process_records(
        &self,
        ctx: &TaskContext,
        records: &[RawRecord],
        result: &mut TaskResult,
    ) -> Vec<ItemOutcome> {
        let mut items = Vec::with_capacity(records.len());
        for record in records {
            match self.process_record(ctx, record).await {
                Ok(processed) => {
                    let outcome = processed.outcome;
                    match outcome.status {
                        MatchStatus::New => result.new_count += 1,
                        MatchStatus::Updated => result.updated_count += 1,
                        MatchStatus::Skipped => result.skipped_count += 1,
                    }
                    if processed.reconciled {
                        result.success_count += 1;
                        self.metrics.record_item(outcome.status);
                    } else {
                        self.metrics.record_filtered();
                    }
                    StructuredLogger::log_item_outcome(
                        ctx.task_id,
                        &outcome.name,
                        outcome.status,
                        outcome.reason.as_deref(),
                    );
                    items.push(outcome);
                }
                Err(e) => {
                    let error = e.to_string();
                    StructuredLogger::log_item_failed(ctx.task_id, &record.vod_name, &error);
                    self.metrics.record_item_failure();
                    result.fail_count += 1;
                    result.failures.push(TaskFailure {
                        data: serde_json::to_value(record).unwrap_or_default(),
                        error: error.clone(),
                    });
                    items.push(ItemOutcome::skipped(
                        record.vod_name.trim(),
                        format!("failed: {error}"),
                    ));
                }
            }
            if let Some(time) = record.updated_at(ctx.utc_offset) {
                result.last_video_time = Some(result.last_video_time.map_or(time, |t| t.max(time)));
            }
        }
        items
    }

    async fn publish_progress(
        &self,
        ctx: &TaskContext,
        current_page: u32,
        total_pages: u32,
        result: &TaskResult,
        items: Vec<ItemOutcome>,
    ) {
        self.events
            .publish(CrawlEvent::Progress(CrawlProgress {
                task_id: ctx.task_id,
                current_page,
                total_pages,
                success_count: result.success_count,
                fail_count: result.fail_count,
                items,
            }))
            .await;
    }

    async fn record_log_progress(&self, log_id: Option<i64>, result: &TaskResult) {
        let Some(log_id) = log_id else {
            return;
        };
        if let Err(e) = self
            .logs
            .update_progress(
                log_id,
                result.processed() as i64,
                result.success_count as i64,
                result.fail_count as i64,
            )
            .await
        {
            warn!(log.id = log_id, error = %e, "回写日志进度失败");
        }
    }

    /// 执行采集循环，返回本次执行的汇总
    async fn crawl(&self, task: &Task, start_log: Option<i64>) -> CrawlerResult<TaskResult> {
        let PreparedRun { ctx, resolved } = self.prepare(task).await?;
        let adapter = &resolved.adapter;
        let mut result = TaskResult::default();

        if task.task_type == TaskType::Single && !task.target_ids.is_empty() {
            let records = adapter
                .fetch_details(&resolved.base_url, &task.target_ids)
                .await?;
            let items = self.process_records(&ctx, &records, &mut result).await;
            self.record_log_progress(start_log, &result).await;
            self.publish_progress(&ctx, 1, 1, &result, items).await;
            result.is_completed = true;
            return Ok(result);
        }

        let filters = ListFilters::default();
        let interval = task
            .interval_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis);
        let mut page = 1;

        loop {
            let page_started = Instant::now();
            let page_result = adapter
                .fetch_list(&resolved.base_url, page, &filters)
                .await?;
            let total_pages = page_result.total_pages();

            let items = self
                .process_records(&ctx, &page_result.records, &mut result)
                .await;

            let elapsed = page_started.elapsed();
            self.metrics.record_page(elapsed.as_secs_f64());
            StructuredLogger::log_page_processed(
                ctx.task_id,
                page,
                total_pages,
                result.success_count,
                result.fail_count,
                elapsed.as_millis() as u64,
            );
            self.record_log_progress(start_log, &result).await;
            self.publish_progress(&ctx, page, total_pages, &result, items)
                .await;

            // 增量与单条只处理第一页
            if task.task_type != TaskType::Full || page >= total_pages {
                break;
            }
            if let Some(interval) = interval {
                tokio::time::sleep(interval).await;
            }
            page += 1;
        }

        result.is_completed = true;
        Ok(result)
    }

    /// 标记运行、采集并收尾；返回的错误由调用方统一按失败处理
    async fn run(&self, task: &Task, started: Instant) -> CrawlerResult<TaskResult> {
        self.tasks.mark_running(task.id, Utc::now()).await?;
        let start_log = self
            .log(
                task.id,
                LogLevel::Info,
                "task started",
                json!({ "name": task.name, "taskType": task.task_type }),
            )
            .await;
        StructuredLogger::log_task_started(task.id, &task.name, task.task_type, "execute");

        let result = self.crawl(task, start_log).await?;
        self.complete(task, &result, started.elapsed()).await?;
        Ok(result)
    }

    async fn complete(&self, task: &Task, result: &TaskResult, duration: Duration) -> CrawlerResult<()> {
        let first_error = result.first_failure().map(|f| f.error.clone());
        self.tasks
            .mark_completed(
                task.id,
                result.success_count as i64,
                result.fail_count as i64,
                first_error.as_deref(),
            )
            .await?;

        let summary = json!({
            "successCount": result.success_count,
            "failCount": result.fail_count,
            "newCount": result.new_count,
            "updatedCount": result.updated_count,
            "skippedCount": result.skipped_count,
        });
        match &first_error {
            Some(error) => {
                let metadata = json!({
                    "summary": summary,
                    "firstFailure": result.first_failure(),
                });
                self.log(
                    task.id,
                    LogLevel::Warning,
                    &format!("completed with {} failures: {error}", result.fail_count),
                    metadata,
                )
                .await;
            }
            None => {
                self.log(task.id, LogLevel::Info, "completed", summary).await;
            }
        }

        StructuredLogger::log_task_completed(task.id, &task.name, result, duration.as_millis() as u64);
        self.metrics
            .record_task_run(task.task_type, "completed", duration.as_secs_f64());
        self.events
            .publish(CrawlEvent::Complete {
                task_id: task.id,
                result: result.clone(),
            })
            .await;
        Ok(())
    }

    async fn fail(&self, task: &Task, error: &CrawlerError, duration: Duration) {
        let message = error.to_string();
        if let Err(e) = self.tasks.mark_failed(task.id, &message).await {
            warn!(task.id = task.id, error = %e, "更新任务失败状态失败");
        }
        self.log(
            task.id,
            LogLevel::Error,
            &message,
            json!({ "error": message, "transport": error.is_transport() }),
        )
        .await;
        StructuredLogger::log_task_failed(task.id, &task.name, &message, duration.as_millis() as u64);
        self.metrics
            .record_task_run(task.task_type, "failed", duration.as_secs_f64());
        self.events.end_run(task.id).await;
    }

    /// 按时间范围采集一页
    ///
    /// 遇到第一条更新时间早于截止时间的记录即停止，返回 `is_completed = true`；
    /// 当前页为最后一页时同样视为完成。没有更新时间的记录照常处理。
    #[instrument(skip(self), fields(task.id = task_id))]
    pub async fn collect_by_time(
        &self,
        task_id: i64,
        range: TimeRange,
        page: u32,
    ) -> CrawlerResult<CollectResult> {
        let task = self.load_task(task_id).await?;
        let PreparedRun { ctx, resolved } = self.prepare(&task).await?;
        let cutoff = range.cutoff(Utc::now());

        let page = page.max(1);
        let page_result = resolved
            .adapter
            .fetch_list(&resolved.base_url, page, &ListFilters::default())
            .await?;

        let mut collected = CollectResult {
            is_completed: page >= page_result.total_pages(),
            ..Default::default()
        };
        let mut scratch = TaskResult::default();

        for record in &page_result.records {
            let updated_at = record.updated_at(ctx.utc_offset);
            if let (Some(cutoff), Some(time)) = (cutoff, updated_at) {
                if time < cutoff {
                    debug!(title = %record.vod_name, %time, "到达时间范围截止点");
                    collected.is_completed = true;
                    break;
                }
            }
            if updated_at.is_some() {
                collected.last_video_time = updated_at;
            }
            let mut items = self
                .process_records(&ctx, std::slice::from_ref(record), &mut scratch)
                .await;
            collected.items.append(&mut items);
        }

        Ok(collected)
    }
}

#[async_trait]
impl TaskExecutor for CrawlRunner {
    #[instrument(skip(self), fields(task.id = task_id))]
    async fn execute(&self, task_id: i64) -> CrawlerResult<TaskResult> {
        self.events.begin_run(task_id).await;
        let task = match self.load_task(task_id).await {
            Ok(task) => task,
            Err(e) => {
                self.events.end_run(task_id).await;
                return Err(e);
            }
        };
        let started = Instant::now();

        let outcome = self.run(&task, started).await;
        // 任何阶段的错误都按失败收尾，任务不会停留在 running
        if let Err(e) = &outcome {
            self.fail(&task, e, started.elapsed()).await;
        }
        outcome
    }
}
