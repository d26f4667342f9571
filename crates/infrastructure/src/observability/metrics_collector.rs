//! 采集指标
//!
//! 只通过 `metrics` 门面记录，导出器由宿主进程安装；未安装时记录为空操作。

use crawler_core::models::{MatchStatus, TaskType};
use metrics::{counter, histogram};

pub const ITEMS_TOTAL: &str = "crawler_items_total";
pub const ITEM_FAILURES_TOTAL: &str = "crawler_item_failures_total";
pub const TASK_RUNS_TOTAL: &str = "crawler_task_runs_total";
pub const TASK_FAILURES_TOTAL: &str = "crawler_task_failures_total";
pub const PAGE_DURATION_SECONDS: &str = "crawler_page_duration_seconds";

#[derive(Debug, Default, Clone)]
pub struct CrawlMetrics;

impl CrawlMetrics {
    pub fn new() -> Self {
        Self
    }

    /// 记录一条对账结果，按 `status` 区分
    pub fn record_item(&self, status: MatchStatus) {
        counter!(ITEMS_TOTAL, "status" => status.as_str()).increment(1);
    }

    /// 被过滤或缺少分类映射的记录
    pub fn record_filtered(&self) {
        counter!(ITEMS_TOTAL, "status" => "filtered").increment(1);
    }

    pub fn record_item_failure(&self) {
        counter!(ITEM_FAILURES_TOTAL).increment(1);
    }

    pub fn record_task_run(&self, task_type: TaskType, status: &'static str, duration_seconds: f64) {
        counter!(TASK_RUNS_TOTAL, "task_type" => task_type.as_str(), "status" => status)
            .increment(1);
        if status == "failed" {
            counter!(TASK_FAILURES_TOTAL, "task_type" => task_type.as_str()).increment(1);
        }
        histogram!("crawler_task_duration_seconds", "task_type" => task_type.as_str())
            .record(duration_seconds);
    }

    pub fn record_page(&self, duration_seconds: f64) {
        histogram!(PAGE_DURATION_SECONDS).record(duration_seconds);
    }
}
