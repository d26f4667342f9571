use std::str::FromStr;
use std::sync::Arc;

use crawler_core::traits::{AlertNotifier, LogSink, SourceRepository, TaskRepository};
use crawler_core::CrawlerResult;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::debug;

use super::sqlite::{SqliteLogStore, SqliteSourceRepository, SqliteTaskRepository};

/// SQLite 连接池与仓储工厂
pub struct DatabaseManager {
    pool: SqlitePool,
}

impl DatabaseManager {
    /// 打开数据库并执行迁移
    ///
    /// 内存库只使用一个连接，否则每个连接各自是一份独立的数据库。
    pub async fn new(url: &str, max_connections: u32) -> CrawlerResult<Self> {
        debug!("Opening SQLite database at: {}", url);
        let in_memory = url.contains(":memory:");

        let mut connect_options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        if !in_memory {
            connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { max_connections.max(1) })
            .min_connections(1)
            .connect_with(connect_options)
            .await?;

        let manager = Self { pool };
        manager.migrate().await?;
        Ok(manager)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// 运行数据库迁移
    pub async fn migrate(&self) -> CrawlerResult<()> {
        debug!("Running SQLite database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                base_url TEXT NOT NULL,
                adapter_type TEXT NOT NULL,
                description TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                config TEXT NOT NULL DEFAULT '{}',
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                source_id INTEGER NOT NULL,
                task_type TEXT NOT NULL,
                cron TEXT,
                interval_ms INTEGER,
                category_mapping TEXT NOT NULL DEFAULT '[]',
                match_rules TEXT NOT NULL DEFAULT '{}',
                target_ids TEXT NOT NULL DEFAULT '[]',
                status TEXT NOT NULL DEFAULT 'pending',
                paused INTEGER NOT NULL DEFAULT 0,
                total_count INTEGER NOT NULL DEFAULT 0,
                success_count INTEGER NOT NULL DEFAULT 0,
                fail_count INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                last_run_time DATETIME,
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // crawl_logs 不设外键，删除顺序由调度器负责
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS crawl_logs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER NOT NULL,
                level TEXT NOT NULL,
                message TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                processed_count INTEGER,
                success_count INTEGER,
                fail_count INTEGER,
                created_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let indexes = [
            "CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status)",
            "CREATE INDEX IF NOT EXISTS idx_tasks_task_type ON tasks(task_type)",
            "CREATE INDEX IF NOT EXISTS idx_crawl_logs_task_id ON crawl_logs(task_id, created_at)",
        ];
        for index_sql in indexes {
            sqlx::query(index_sql).execute(&self.pool).await?;
        }

        debug!("Successfully completed SQLite database migrations");
        Ok(())
    }

    pub async fn health_check(&self) -> CrawlerResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await
    }

    pub fn task_repository(&self) -> Arc<dyn TaskRepository> {
        Arc::new(SqliteTaskRepository::new(self.pool.clone()))
    }

    pub fn source_repository(&self) -> Arc<dyn SourceRepository> {
        Arc::new(SqliteSourceRepository::new(self.pool.clone()))
    }

    /// 日志存储，`error` 级别日志写入后通过 `notifier` 告警
    pub fn log_store(&self, notifier: Option<Arc<dyn AlertNotifier>>) -> Arc<dyn LogSink> {
        Arc::new(SqliteLogStore::new(self.pool.clone(), notifier))
    }
}
