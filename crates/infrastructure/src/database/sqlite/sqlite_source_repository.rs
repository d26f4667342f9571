use async_trait::async_trait;
use chrono::Utc;
use crawler_core::models::Source;
use crawler_core::traits::SourceRepository;
use crawler_core::CrawlerResult;
use sqlx::{Row, SqlitePool};
use tracing::{debug, instrument};

const SOURCE_COLUMNS: &str =
    "id, name, base_url, adapter_type, description, status, config, created_at, updated_at";

pub struct SqliteSourceRepository {
    pool: SqlitePool,
}

impl SqliteSourceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_source(row: &sqlx::sqlite::SqliteRow) -> CrawlerResult<Source> {
        let config: String = row.try_get("config")?;
        Ok(Source {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            base_url: row.try_get("base_url")?,
            adapter_type: row.try_get("adapter_type")?,
            description: row.try_get("description")?,
            status: row.try_get("status")?,
            config: serde_json::from_str(&config)?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl SourceRepository for SqliteSourceRepository {
    #[instrument(skip(self, source), fields(source_name = %source.name))]
    async fn create(&self, source: &Source) -> CrawlerResult<Source> {
        let sql = format!(
            "INSERT INTO sources (name, base_url, adapter_type, description, status, config, \
             created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7) \
             RETURNING {SOURCE_COLUMNS}"
        );
        let row = sqlx::query(&sql)
            .bind(&source.name)
            .bind(&source.base_url)
            .bind(&source.adapter_type)
            .bind(&source.description)
            .bind(source.status)
            .bind(serde_json::to_string(&source.config)?)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        let created = Self::row_to_source(&row)?;
        debug!("创建资源站成功: ID {}, 名称: {}", created.id, created.name);
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> CrawlerResult<Option<Source>> {
        let sql = format!("SELECT {SOURCE_COLUMNS} FROM sources WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_source).transpose()
    }

    async fn list(&self) -> CrawlerResult<Vec<Source>> {
        let sql = format!("SELECT {SOURCE_COLUMNS} FROM sources ORDER BY id ASC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(Self::row_to_source).collect()
    }
}
