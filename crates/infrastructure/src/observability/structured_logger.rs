//! 采集引擎的规范日志事件
//!
//! 每个事件带固定的 `event` 字段，便于按事件名过滤 JSON 日志。

use chrono::{DateTime, Utc};
use crawler_core::models::{MatchStatus, TaskResult, TaskType};
use tracing::{debug, error, info, warn};

pub struct StructuredLogger;

impl StructuredLogger {
    pub fn log_task_started(task_id: i64, task_name: &str, task_type: TaskType, trigger: &str) {
        info!(
            event = "task_started",
            task.id = task_id,
            task.name = task_name,
            task.type = task_type.as_str(),
            trigger,
            "采集任务开始"
        );
    }

    pub fn log_page_processed(
        task_id: i64,
        page: u32,
        total_pages: u32,
        success_count: u64,
        fail_count: u64,
        duration_ms: u64,
    ) {
        info!(
            event = "page_processed",
            task.id = task_id,
            page,
            total_pages,
            success_count,
            fail_count,
            duration_ms,
            "页面处理完成"
        );
    }

    pub fn log_item_outcome(task_id: i64, name: &str, status: MatchStatus, reason: Option<&str>) {
        debug!(
            event = "item_outcome",
            task.id = task_id,
            item.name = name,
            status = status.as_str(),
            reason = reason.unwrap_or(""),
            "记录处理结果"
        );
    }

    pub fn log_item_failed(task_id: i64, name: &str, error: &str) {
        warn!(
            event = "item_failed",
            task.id = task_id,
            item.name = name,
            error,
            "记录处理失败"
        );
    }

    pub fn log_task_completed(task_id: i64, task_name: &str, result: &TaskResult, duration_ms: u64) {
        if result.fail_count > 0 {
            warn!(
                event = "task_completed",
                task.id = task_id,
                task.name = task_name,
                success_count = result.success_count,
                fail_count = result.fail_count,
                new_count = result.new_count,
                updated_count = result.updated_count,
                skipped_count = result.skipped_count,
                duration_ms,
                "采集任务完成，存在失败记录"
            );
        } else {
            info!(
                event = "task_completed",
                task.id = task_id,
                task.name = task_name,
                success_count = result.success_count,
                new_count = result.new_count,
                updated_count = result.updated_count,
                skipped_count = result.skipped_count,
                duration_ms,
                "采集任务完成"
            );
        }
    }

    pub fn log_task_failed(task_id: i64, task_name: &str, error: &str, duration_ms: u64) {
        error!(
            event = "task_failed",
            task.id = task_id,
            task.name = task_name,
            error,
            duration_ms,
            "采集任务失败"
        );
    }

    pub fn log_cron_registered(task_id: i64, cron: &str, next_fire: Option<DateTime<Utc>>) {
        info!(
            event = "cron_registered",
            task.id = task_id,
            cron,
            next_fire = ?next_fire,
            "注册定时任务"
        );
    }

    pub fn log_cron_deregistered(task_id: i64) {
        info!(event = "cron_deregistered", task.id = task_id, "注销定时任务");
    }
}
