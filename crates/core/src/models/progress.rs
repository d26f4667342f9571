use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{FieldChanges, MatchStatus};

/// 单条记录的处理结果，随进度事件推送
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemOutcome {
    pub name: String,
    pub status: MatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<FieldChanges>,
    /// 映射到的目标分类名
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped_category: Option<String>,
}

impl ItemOutcome {
    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: MatchStatus::Skipped,
            reason: Some(reason.into()),
            changes: None,
            mapped_category: None,
        }
    }
}

/// 每页处理完成后推送的进度
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CrawlProgress {
    pub task_id: i64,
    pub current_page: u32,
    pub total_pages: u32,
    /// 本次执行累计成功数
    pub success_count: u64,
    pub fail_count: u64,
    pub items: Vec<ItemOutcome>,
}

/// 进度通道上的事件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum CrawlEvent {
    Progress(CrawlProgress),
    #[serde(rename_all = "camelCase")]
    Complete { task_id: i64, result: TaskResult },
}

impl CrawlEvent {
    pub fn task_id(&self) -> i64 {
        match self {
            CrawlEvent::Progress(p) => p.task_id,
            CrawlEvent::Complete { task_id, .. } => *task_id,
        }
    }
}

/// 单条记录处理失败的明细
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskFailure {
    /// 失败记录的原始数据
    pub data: serde_json::Value,
    pub error: String,
}

/// 一次任务执行的汇总结果
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub success_count: u64,
    pub fail_count: u64,
    pub new_count: u64,
    pub updated_count: u64,
    pub skipped_count: u64,
    pub failures: Vec<TaskFailure>,
    pub is_completed: bool,
    pub last_video_time: Option<DateTime<Utc>>,
}

impl TaskResult {
    pub fn processed(&self) -> u64 {
        self.success_count + self.fail_count
    }

    pub fn first_failure(&self) -> Option<&TaskFailure> {
        self.failures.first()
    }
}

/// 按时间采集的范围
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Day,
    Week,
    Month,
    All,
}

impl TimeRange {
    /// 截止时间，早于该时间的记录不再处理
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            TimeRange::Day => Some(now - Duration::days(1)),
            TimeRange::Week => Some(now - Duration::days(7)),
            TimeRange::Month => Some(now - Duration::days(30)),
            TimeRange::All => None,
        }
    }
}

impl std::str::FromStr for TimeRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(TimeRange::Day),
            "week" => Ok(TimeRange::Week),
            "month" => Ok(TimeRange::Month),
            "all" => Ok(TimeRange::All),
            _ => Err(format!("Invalid time range: {s}")),
        }
    }
}

/// 按时间采集一页的结果
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CollectResult {
    pub items: Vec<ItemOutcome>,
    pub is_completed: bool,
    pub last_video_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_time_range_cutoff() {
        let now = Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap();
        assert_eq!(
            TimeRange::Day.cutoff(now),
            Some(Utc.with_ymd_and_hms(2024, 6, 29, 12, 0, 0).unwrap())
        );
        assert_eq!(
            TimeRange::Month.cutoff(now),
            Some(Utc.with_ymd_and_hms(2024, 5, 31, 12, 0, 0).unwrap())
        );
        assert_eq!(TimeRange::All.cutoff(now), None);
    }

    #[test]
    fn test_progress_event_shape() {
        let event = CrawlEvent::Progress(CrawlProgress {
            task_id: 7,
            current_page: 1,
            total_pages: 3,
            success_count: 2,
            fail_count: 0,
            items: vec![ItemOutcome::skipped("三体", "no changes")],
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "progress");
        assert_eq!(json["taskId"], 7);
        assert_eq!(json["currentPage"], 1);
        assert_eq!(json["items"][0]["status"], "skipped");
        assert_eq!(json["items"][0]["reason"], "no changes");
        assert!(json["items"][0].get("changes").is_none());
    }
}
