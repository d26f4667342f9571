use std::str::FromStr;

use cron::Schedule;

use crate::{CrawlerError, CrawlerResult};

/// 规范化CRON表达式
///
/// `cron` 库要求带秒字段，5段式表达式在前面补 `0` 秒。
pub fn normalize_cron_expression(expr: &str) -> String {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() == 5 {
        format!("0 {trimmed}")
    } else {
        trimmed.to_string()
    }
}

/// 解析CRON表达式（支持5段和6/7段）
pub fn parse_cron_expression(expr: &str) -> CrawlerResult<Schedule> {
    let normalized = normalize_cron_expression(expr);
    Schedule::from_str(&normalized).map_err(|e| CrawlerError::InvalidCron {
        expr: expr.to_string(),
        message: e.to_string(),
    })
}
