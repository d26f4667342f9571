use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crawler_core::models::{Task, TaskFilter, TaskStatus, TaskType};
use crawler_core::traits::TaskRepository;
use crawler_core::{CrawlerError, CrawlerResult};
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

const TASK_COLUMNS: &str = "id, name, source_id, task_type, cron, interval_ms, category_mapping, \
     match_rules, target_ids, status, paused, total_count, success_count, fail_count, last_error, \
     last_run_time, created_at, updated_at";

pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_task(row: &sqlx::sqlite::SqliteRow) -> CrawlerResult<Task> {
        let category_mapping: String = row.try_get("category_mapping")?;
        let match_rules: String = row.try_get("match_rules")?;
        let target_ids: String = row.try_get("target_ids")?;
        let interval_ms: Option<i64> = row.try_get("interval_ms")?;

        Ok(Task {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            source_id: row.try_get("source_id")?,
            task_type: row.try_get("task_type")?,
            cron: row.try_get("cron")?,
            interval_ms: interval_ms.map(|ms| ms.max(0) as u64),
            category_mapping: serde_json::from_str(&category_mapping)?,
            match_rules: serde_json::from_str(&match_rules)?,
            target_ids: serde_json::from_str(&target_ids)?,
            status: row.try_get("status")?,
            paused: row.try_get("paused")?,
            total_count: row.try_get("total_count")?,
            success_count: row.try_get("success_count")?,
            fail_count: row.try_get("fail_count")?,
            last_error: row.try_get("last_error")?,
            last_run_time: row.try_get("last_run_time")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn rows_to_tasks(rows: &[sqlx::sqlite::SqliteRow]) -> CrawlerResult<Vec<Task>> {
        rows.iter().map(Self::row_to_task).collect()
    }

    fn ensure_affected(rows_affected: u64, id: i64) -> CrawlerResult<()> {
        if rows_affected == 0 {
            return Err(CrawlerError::TaskNotFound { id });
        }
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    #[instrument(skip(self, task), fields(task_name = %task.name, task_type = %task.task_type))]
    async fn create(&self, task: &Task) -> CrawlerResult<Task> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO tasks (name, source_id, task_type, cron, interval_ms, category_mapping, \
             match_rules, target_ids, status, paused, total_count, success_count, fail_count, \
             last_error, last_run_time, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?16) \
             RETURNING {TASK_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&task.name)
            .bind(task.source_id)
            .bind(task.task_type)
            .bind(&task.cron)
            .bind(task.interval_ms.map(|ms| ms as i64))
            .bind(serde_json::to_string(&task.category_mapping)?)
            .bind(serde_json::to_string(&task.match_rules)?)
            .bind(serde_json::to_string(&task.target_ids)?)
            .bind(task.status)
            .bind(task.paused)
            .bind(task.total_count)
            .bind(task.success_count)
            .bind(task.fail_count)
            .bind(&task.last_error)
            .bind(task.last_run_time)
            .bind(now)
            .fetch_one(&self.pool)
            .await?;

        let created = Self::row_to_task(&row)?;
        debug!("创建任务成功: ID {}, 名称: {}", created.id, created.name);
        Ok(created)
    }

    #[instrument(skip(self), fields(task_id = %id))]
    async fn get_by_id(&self, id: i64) -> CrawlerResult<Option<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(Self::row_to_task(&row)?)),
            None => {
                debug!("查询任务不存在: ID {}", id);
                Ok(None)
            }
        }
    }

    async fn list(&self, filter: &TaskFilter) -> CrawlerResult<Vec<Task>> {
        let mut sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE 1=1");
        let mut bind_count = 0;
        if filter.status.is_some() {
            bind_count += 1;
            sql.push_str(&format!(" AND status = ?{bind_count}"));
        }
        if filter.task_type.is_some() {
            bind_count += 1;
            sql.push_str(&format!(" AND task_type = ?{bind_count}"));
        }
        if filter.name_pattern.is_some() {
            bind_count += 1;
            sql.push_str(&format!(" AND name LIKE ?{bind_count}"));
        }
        sql.push_str(" ORDER BY id ASC");
        if filter.limit.is_some() || filter.offset.is_some() {
            bind_count += 1;
            sql.push_str(&format!(" LIMIT ?{bind_count}"));
            bind_count += 1;
            sql.push_str(&format!(" OFFSET ?{bind_count}"));
        }

        let mut query = sqlx::query(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status);
        }
        if let Some(task_type) = filter.task_type {
            query = query.bind(task_type);
        }
        if let Some(name_pattern) = &filter.name_pattern {
            query = query.bind(format!("%{name_pattern}%"));
        }
        if filter.limit.is_some() || filter.offset.is_some() {
            // SQLite 中 LIMIT -1 表示不限
            query = query
                .bind(filter.limit.unwrap_or(-1))
                .bind(filter.offset.unwrap_or(0));
        }

        let rows = query.fetch_all(&self.pool).await?;
        Self::rows_to_tasks(&rows)
    }

    #[instrument(skip(self, task), fields(task_id = %task.id, task_name = %task.name))]
    async fn update(&self, task: &Task) -> CrawlerResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET name = ?2, source_id = ?3, task_type = ?4, cron = ?5, interval_ms = ?6,
                category_mapping = ?7, match_rules = ?8, target_ids = ?9, status = ?10,
                paused = ?11, updated_at = ?12
            WHERE id = ?1
            "#,
        )
        .bind(task.id)
        .bind(&task.name)
        .bind(task.source_id)
        .bind(task.task_type)
        .bind(&task.cron)
        .bind(task.interval_ms.map(|ms| ms as i64))
        .bind(serde_json::to_string(&task.category_mapping)?)
        .bind(serde_json::to_string(&task.match_rules)?)
        .bind(serde_json::to_string(&task.target_ids)?)
        .bind(task.status)
        .bind(task.paused)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Self::ensure_affected(result.rows_affected(), task.id)
    }

    #[instrument(skip(self), fields(task_id = %id))]
    async fn delete(&self, id: i64) -> CrawlerResult<()> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Self::ensure_affected(result.rows_affected(), id)?;
        debug!("删除任务成功: ID {}", id);
        Ok(())
    }

    async fn list_by_type(&self, task_type: TaskType) -> CrawlerResult<Vec<Task>> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE task_type = ?1 ORDER BY id ASC");
        let rows = sqlx::query(&sql)
            .bind(task_type)
            .fetch_all(&self.pool)
            .await?;
        Self::rows_to_tasks(&rows)
    }

    async fn list_schedulable(&self) -> CrawlerResult<Vec<Task>> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks \
             WHERE cron IS NOT NULL AND TRIM(cron) != '' AND paused = 0 ORDER BY id ASC"
        );
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Self::rows_to_tasks(&rows)
    }

    #[instrument(skip(self), fields(task_id = %id, status = %status))]
    async fn update_status(&self, id: i64, status: TaskStatus, paused: bool) -> CrawlerResult<()> {
        let result = sqlx::query(
            "UPDATE tasks SET status = ?2, paused = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(status)
        .bind(paused)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Self::ensure_affected(result.rows_affected(), id)
    }

    async fn mark_running(&self, id: i64, started_at: DateTime<Utc>) -> CrawlerResult<()> {
        let result = sqlx::query(
            "UPDATE tasks SET status = ?2, last_run_time = ?3, updated_at = ?3 WHERE id = ?1",
        )
        .bind(id)
        .bind(TaskStatus::Running)
        .bind(started_at)
        .execute(&self.pool)
        .await?;
        Self::ensure_affected(result.rows_affected(), id)
    }

    /// 执行结束时已被暂停的任务保持 `pending`，以便之后恢复；
    /// 没有失败时保留上一次的 `last_error`
    async fn mark_completed(
        &self,
        id: i64,
        success: i64,
        fail: i64,
        last_error: Option<&str>,
    ) -> CrawlerResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = CASE WHEN paused = 1 THEN ?7 ELSE ?2 END,
                total_count = total_count + ?3 + ?4,
                success_count = success_count + ?3,
                fail_count = fail_count + ?4,
                last_error = COALESCE(?5, last_error),
                updated_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(TaskStatus::Completed)
        .bind(success)
        .bind(fail)
        .bind(last_error)
        .bind(Utc::now())
        .bind(TaskStatus::Pending)
        .execute(&self.pool)
        .await?;
        Self::ensure_affected(result.rows_affected(), id)
    }

    async fn mark_failed(&self, id: i64, error: &str) -> CrawlerResult<()> {
        let result = sqlx::query(
            "UPDATE tasks SET status = CASE WHEN paused = 1 THEN ?5 ELSE ?2 END, \
             last_error = ?3, updated_at = ?4 WHERE id = ?1",
        )
        .bind(id)
        .bind(TaskStatus::Failed)
        .bind(error)
        .bind(Utc::now())
        .bind(TaskStatus::Pending)
        .execute(&self.pool)
        .await?;
        Self::ensure_affected(result.rows_affected(), id)
    }
}
