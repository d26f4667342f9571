use chrono::{FixedOffset, TimeZone, Timelike, Utc};
use crawler_core::CrawlerError;
use crawler_dispatcher::CronScheduler;

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

#[test]
fn test_five_field_expression_is_accepted() {
    let cron = CronScheduler::new("*/15 * * * *", utc()).unwrap();
    let from = Utc.with_ymd_and_hms(2024, 1, 1, 10, 7, 0).unwrap();
    let next = cron.next_execution_time(from).unwrap();
    assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 1, 10, 15, 0).unwrap());
}

#[test]
fn test_expression_evaluated_in_offset() {
    // 北京时间凌晨2点 = UTC 18点
    let beijing = FixedOffset::east_opt(8 * 3600).unwrap();
    let cron = CronScheduler::new("0 0 2 * * *", beijing).unwrap();
    let from = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let next = cron.next_execution_time(from).unwrap();
    assert_eq!(next.hour(), 18);
    assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 1, 18, 0, 0).unwrap());
}

#[test]
fn test_next_execution_is_strictly_after_from() {
    let cron = CronScheduler::new("0 */30 * * * *", utc()).unwrap();
    let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let next = cron.next_execution_time(from).unwrap();
    assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 1, 0, 30, 0).unwrap());
}

#[test]
fn test_invalid_expression_rejected() {
    assert!(matches!(
        CronScheduler::validate_cron_expression("not a cron"),
        Err(CrawlerError::InvalidCron { .. })
    ));
    assert!(CronScheduler::validate_cron_expression("0 0 2 * * *").is_ok());
}
