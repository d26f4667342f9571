use chrono::{DateTime, FixedOffset, Utc};
use cron::Schedule;

use crawler_core::{parse_cron_expression, CrawlerResult};

/// CRON表达式解析和调度工具
///
/// 表达式按固定时区解释（资源站所在时区），对外统一返回 UTC 时间。
#[derive(Debug, Clone)]
pub struct CronScheduler {
    schedule: Schedule,
    offset: FixedOffset,
}

impl CronScheduler {
    /// 创建新的CRON调度器，5段式表达式自动补秒
    pub fn new(cron_expr: &str, offset: FixedOffset) -> CrawlerResult<Self> {
        Ok(Self {
            schedule: parse_cron_expression(cron_expr)?,
            offset,
        })
    }

    /// 获取 `from` 之后的下一次执行时间
    pub fn next_execution_time(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule
            .after(&from.with_timezone(&self.offset))
            .next()
            .map(|t| t.with_timezone(&Utc))
    }

    /// 验证CRON表达式是否有效
    pub fn validate_cron_expression(cron_expr: &str) -> CrawlerResult<()> {
        parse_cron_expression(cron_expr).map(|_| ())
    }
}
