use serde::{Deserialize, Serialize};

/// 单条记录的对账结果
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    New,
    Updated,
    Skipped,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::New => "new",
            MatchStatus::Updated => "updated",
            MatchStatus::Skipped => "skipped",
        }
    }
}

/// 字段变更标记
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FieldChanges {
    pub title: bool,
    pub description: bool,
    pub cover: bool,
    pub year: bool,
    pub area: bool,
    pub language: bool,
    pub rating: bool,
    pub update_status: bool,
    pub episodes: bool,
    pub actors: bool,
    pub directors: bool,
}

impl FieldChanges {
    pub fn any(&self) -> bool {
        self.title
            || self.description
            || self.cover
            || self.year
            || self.area
            || self.language
            || self.rating
            || self.update_status
            || self.episodes
            || self.actors
            || self.directors
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutcome {
    pub status: MatchStatus,
    /// 新建或命中的视频ID
    pub video_id: Option<i64>,
    pub changes: Option<FieldChanges>,
    pub reason: Option<String>,
}

impl MatchOutcome {
    pub fn created(video_id: i64) -> Self {
        Self {
            status: MatchStatus::New,
            video_id: Some(video_id),
            changes: None,
            reason: None,
        }
    }

    pub fn updated(video_id: i64, changes: FieldChanges) -> Self {
        Self {
            status: MatchStatus::Updated,
            video_id: Some(video_id),
            changes: Some(changes),
            reason: None,
        }
    }

    pub fn skipped(video_id: Option<i64>, reason: impl Into<String>) -> Self {
        Self {
            status: MatchStatus::Skipped,
            video_id,
            changes: None,
            reason: Some(reason.into()),
        }
    }
}
