use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crawler_core::models::{CrawlLog, LogLevel};
use crawler_core::traits::{AlertNotifier, LogSink};
use crawler_core::{CrawlerError, CrawlerResult};
use sqlx::{Row, SqlitePool};
use tracing::{instrument, warn};

const LOG_COLUMNS: &str =
    "id, task_id, level, message, metadata, processed_count, success_count, fail_count, created_at";

/// 采集日志存储
///
/// `error` 级别的日志写入成功后调用告警通知；通知失败只记录警告，不影响写入结果。
pub struct SqliteLogStore {
    pool: SqlitePool,
    notifier: Option<Arc<dyn AlertNotifier>>,
}

impl SqliteLogStore {
    pub fn new(pool: SqlitePool, notifier: Option<Arc<dyn AlertNotifier>>) -> Self {
        Self { pool, notifier }
    }

    fn row_to_log(row: &sqlx::sqlite::SqliteRow) -> CrawlerResult<CrawlLog> {
        let metadata: String = row.try_get("metadata")?;
        Ok(CrawlLog {
            id: row.try_get("id")?,
            task_id: row.try_get("task_id")?,
            level: row.try_get("level")?,
            message: row.try_get("message")?,
            metadata: serde_json::from_str(&metadata)?,
            processed_count: row.try_get("processed_count")?,
            success_count: row.try_get("success_count")?,
            fail_count: row.try_get("fail_count")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl LogSink for SqliteLogStore {
    #[instrument(skip(self, message, metadata), fields(task_id = %task_id, level = %level))]
    async fn append_log(
        &self,
        task_id: i64,
        level: LogLevel,
        message: &str,
        metadata: serde_json::Value,
    ) -> CrawlerResult<CrawlLog> {
        let sql = format!(
            "INSERT INTO crawl_logs (task_id, level, message, metadata, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5) RETURNING {LOG_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(task_id)
            .bind(level)
            .bind(message)
            .bind(serde_json::to_string(&metadata)?)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;
        let log = Self::row_to_log(&row)?;

        if level == LogLevel::Error {
            if let Some(notifier) = &self.notifier {
                if let Err(e) = notifier.notify(&log).await {
                    warn!("发送告警失败: 日志 {}, 错误: {}", log.id, e);
                }
            }
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
        let result = sqlx::query(
            "UPDATE crawl_logs SET processed_count = ?2, success_count = ?3, fail_count = ?4 \
             WHERE id = ?1",
        )
        .bind(log_id)
        .bind(processed)
        .bind(success)
        .bind(fail)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(CrawlerError::LogNotFound { id: log_id });
        }
        Ok(())
    }

    async fn list_logs(
        &self,
        task_id: i64,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> CrawlerResult<Vec<CrawlLog>> {
        let mut sql = format!("SELECT {LOG_COLUMNS} FROM crawl_logs WHERE task_id = ?1");
        let mut bind_count = 1;
        if start.is_some() {
            bind_count += 1;
            sql.push_str(&format!(" AND created_at >= ?{bind_count}"));
        }
        if end.is_some() {
            bind_count += 1;
            sql.push_str(&format!(" AND created_at <= ?{bind_count}"));
        }
        sql.push_str(" ORDER BY created_at DESC, id DESC");

        let mut query = sqlx::query(&sql).bind(task_id);
        if let Some(start) = start {
            query = query.bind(start);
        }
        if let Some(end) = end {
            query = query.bind(end);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_log).collect()
    }

    async fn delete_task_logs(&self, task_id: i64) -> CrawlerResult<u64> {
        let result = sqlx::query("DELETE FROM crawl_logs WHERE task_id = ?1")
            .bind(task_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
