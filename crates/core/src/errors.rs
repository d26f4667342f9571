use thiserror::Error;

use crate::models::TaskStatus;

/// 采集引擎错误类型定义
#[derive(Debug, Error)]
pub enum CrawlerError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("任务未找到: {id}")]
    TaskNotFound { id: i64 },

    #[error("资源站未找到: {id}")]
    SourceNotFound { id: i64 },

    #[error("日志未找到: {id}")]
    LogNotFound { id: i64 },

    #[error("资源站已停用: {id}")]
    SourceInactive { id: i64 },

    #[error("不支持的适配器类型: {0}")]
    UnsupportedAdapter(String),

    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },

    #[error("任务 {id} 当前状态为 {status}，不允许{action}")]
    InvalidTransition {
        id: i64,
        status: TaskStatus,
        action: &'static str,
    },

    #[error("网络错误: {0}")]
    Network(String),

    #[error("响应解析错误: {0}")]
    Decode(String),

    #[error("无效的资源记录: {0}")]
    InvalidRecord(String),

    #[error("片库错误: {0}")]
    Catalog(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl CrawlerError {
    /// 是否为资源站传输/解析类错误（整次采集失败）
    pub fn is_transport(&self) -> bool {
        matches!(self, CrawlerError::Network(_) | CrawlerError::Decode(_))
    }
}

impl From<serde_json::Error> for CrawlerError {
    fn from(err: serde_json::Error) -> Self {
        CrawlerError::Serialization(err.to_string())
    }
}

/// 统一的Result类型
pub type CrawlerResult<T> = std::result::Result<T, CrawlerError>;
