use std::path::Path;

use anyhow::{Context, Result};
use chrono::{FixedOffset, Offset, Utc};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::schedule::parse_cron_expression;

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(anyhow::anyhow!("数据库URL不能为空"));
        }
        if !self.url.starts_with("sqlite:") {
            return Err(anyhow::anyhow!("数据库URL必须是SQLite格式"));
        }
        if self.max_connections == 0 {
            return Err(anyhow::anyhow!("最大连接数必须大于0"));
        }
        Ok(())
    }
}

/// 采集配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    pub request_timeout_seconds: u64,
    pub user_agent: String,
    /// 片库标题去重阈值（0-1）
    pub title_similarity_threshold: f64,
    /// 标签去重阈值（0-1）
    pub tag_similarity_threshold: f64,
    /// 每个任务进度通道的缓冲区大小
    pub event_buffer: usize,
    /// 平铺格式播放串的默认播放源名称
    pub default_source_tag: String,
}

impl CrawlerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("请求超时时间必须大于0"));
        }
        for (name, value) in [
            ("title_similarity_threshold", self.title_similarity_threshold),
            ("tag_similarity_threshold", self.tag_similarity_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow::anyhow!("{name} 必须在 0 到 1 之间，当前为 {value}"));
            }
        }
        if self.event_buffer == 0 {
            return Err(anyhow::anyhow!("进度通道缓冲区必须大于0"));
        }
        Ok(())
    }
}

/// 调度配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 每日增量巡检的CRON表达式
    pub daily_sweep_cron: String,
    pub daily_sweep_enabled: bool,
    /// CRON 与资源站时间使用的时区偏移（小时）
    pub utc_offset_hours: i32,
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        parse_cron_expression(&self.daily_sweep_cron).context("每日巡检CRON表达式无效")?;
        if !(-23..=23).contains(&self.utc_offset_hours) {
            return Err(anyhow::anyhow!(
                "时区偏移必须在 -23 到 23 小时之间，当前为 {}",
                self.utc_offset_hours
            ));
        }
        Ok(())
    }

    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).unwrap_or(Utc.fix())
    }
}

/// 可观测性配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// pretty 或 json
    pub log_format: String,
}

impl ObservabilityConfig {
    pub fn validate(&self) -> Result<()> {
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => return Err(anyhow::anyhow!("无效的日志级别: {other}")),
        }
        match self.log_format.as_str() {
            "pretty" | "json" => Ok(()),
            other => Err(anyhow::anyhow!("无效的日志格式: {other}")),
        }
    }
}

/// 系统配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub crawler: CrawlerConfig,
    pub scheduler: SchedulerConfig,
    pub observability: ObservabilityConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://crawler.db".to_string(),
                max_connections: 5,
            },
            crawler: CrawlerConfig {
                request_timeout_seconds: 30,
                user_agent: DEFAULT_USER_AGENT.to_string(),
                title_similarity_threshold: 0.9,
                tag_similarity_threshold: 0.8,
                event_buffer: 64,
                default_source_tag: "crawler".to_string(),
            },
            scheduler: SchedulerConfig {
                daily_sweep_cron: "0 0 2 * * *".to_string(),
                daily_sweep_enabled: true,
                utc_offset_hours: 8,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                log_format: "pretty".to_string(),
            },
        }
    }
}

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

const DEFAULT_CONFIG_PATHS: [&str; 2] = ["config/crawler.toml", "crawler.toml"];

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序：
    /// 1. 代码内默认值
    /// 2. 配置文件（TOML），未指定时依次尝试 `config/crawler.toml`、`crawler.toml`
    /// 3. 环境变量覆盖（前缀 `CRAWLER__`，层级分隔符 `__`）
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = AppConfig::default();
        let mut builder = ConfigBuilder::builder()
            .set_default("database.url", defaults.database.url)?
            .set_default(
                "database.max_connections",
                defaults.database.max_connections as i64,
            )?
            .set_default(
                "crawler.request_timeout_seconds",
                defaults.crawler.request_timeout_seconds as i64,
            )?
            .set_default("crawler.user_agent", defaults.crawler.user_agent)?
            .set_default(
                "crawler.title_similarity_threshold",
                defaults.crawler.title_similarity_threshold,
            )?
            .set_default(
                "crawler.tag_similarity_threshold",
                defaults.crawler.tag_similarity_threshold,
            )?
            .set_default("crawler.event_buffer", defaults.crawler.event_buffer as i64)?
            .set_default(
                "crawler.default_source_tag",
                defaults.crawler.default_source_tag,
            )?
            .set_default(
                "scheduler.daily_sweep_cron",
                defaults.scheduler.daily_sweep_cron,
            )?
            .set_default(
                "scheduler.daily_sweep_enabled",
                defaults.scheduler.daily_sweep_enabled,
            )?
            .set_default(
                "scheduler.utc_offset_hours",
                defaults.scheduler.utc_offset_hours as i64,
            )?
            .set_default("observability.log_level", defaults.observability.log_level)?
            .set_default(
                "observability.log_format",
                defaults.observability.log_format,
            )?;

        if let Some(path) = config_path {
            if !Path::new(path).exists() {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("CRAWLER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// 校验配置有效性
    pub fn validate(&self) -> Result<()> {
        self.database.validate().context("数据库配置验证失败")?;
        self.crawler.validate().context("采集配置验证失败")?;
        self.scheduler.validate().context("调度配置验证失败")?;
        self.observability
            .validate()
            .context("可观测性配置验证失败")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.offset().local_minus_utc(), 8 * 3600);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[database]
url = "sqlite::memory:"

[crawler]
title_similarity_threshold = 0.85

[scheduler]
daily_sweep_cron = "30 3 * * *"
"#
        )
        .unwrap();

        let config = AppConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.crawler.title_similarity_threshold, 0.85);
        assert_eq!(config.crawler.tag_similarity_threshold, 0.8);
        assert_eq!(config.scheduler.daily_sweep_cron, "30 3 * * *");
        assert_eq!(config.observability.log_format, "pretty");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(AppConfig::load(Some("/nonexistent/crawler.toml")).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.crawler.tag_similarity_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scheduler.daily_sweep_cron = "not a cron".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.scheduler.utc_offset_hours = 30;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.observability.log_format = "xml".to_string();
        assert!(config.validate().is_err());
    }
}
