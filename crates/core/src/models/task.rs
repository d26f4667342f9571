use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 采集任务定义
///
/// 一个任务绑定一个资源站，描述采集方式（全量/增量/单条）、调度方式
/// （cron 表达式与页间间隔）、分类映射与匹配规则，并记录运行计数。
///
/// # 字段说明
///
/// - `cron`: 可选的 cron 表达式，设置且未暂停时注册定时采集
/// - `interval_ms`: 翻页之间的等待时间（毫秒）
/// - `category_mapping`: 资源站分类到本站分类的映射表
/// - `match_rules`: 识别策略、字段更新开关与结果过滤条件
/// - `target_ids`: `single` 类型任务要采集的资源站视频ID
/// - `paused`: 是否被暂停，暂停的任务不持有定时注册
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub name: String,
    pub source_id: i64,
    pub task_type: TaskType,
    pub cron: Option<String>,
    pub interval_ms: Option<u64>,
    pub category_mapping: Vec<CategoryMapping>,
    pub match_rules: MatchRules,
    pub target_ids: Vec<String>,
    pub status: TaskStatus,
    pub paused: bool,
    pub total_count: i64,
    pub success_count: i64,
    pub fail_count: i64,
    pub last_error: Option<String>,
    pub last_run_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// 创建新任务
    pub fn new(name: impl Into<String>, source_id: i64, task_type: TaskType) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // 将由数据库生成
            name: name.into(),
            source_id,
            task_type,
            cron: None,
            interval_ms: None,
            category_mapping: Vec::new(),
            match_rules: MatchRules::default(),
            target_ids: Vec::new(),
            status: TaskStatus::Pending,
            paused: false,
            total_count: 0,
            success_count: 0,
            fail_count: 0,
            last_error: None,
            last_run_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 是否应持有定时注册
    pub fn should_register_cron(&self) -> bool {
        self.cron.as_deref().is_some_and(|c| !c.trim().is_empty()) && !self.paused
    }
}

/// 任务类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// 全量采集，翻页直到最后一页
    Full,
    /// 增量采集，只处理第一页（资源站按更新时间倒序）
    #[serde(alias = "increment")]
    Incremental,
    /// 单条采集，按 `target_ids` 拉取详情
    Single,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Full => "full",
            TaskType::Incremental => "incremental",
            TaskType::Single => "single",
        }
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(TaskType::Full),
            "incremental" | "increment" => Ok(TaskType::Incremental),
            "single" => Ok(TaskType::Single),
            _ => Err(format!("Invalid task type: {s}")),
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl_sqlite_text_enum!(TaskType);

/// 任务状态
///
/// 生命周期：`pending → running → {completed, failed}`，
/// 另有暂停 `running → pending` 与恢复 `pending → running`。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// 只有运行中的任务可以暂停
    pub fn can_pause(&self) -> bool {
        matches!(self, TaskStatus::Running)
    }

    /// 只有等待中的任务可以恢复
    pub fn can_resume(&self) -> bool {
        matches!(self, TaskStatus::Pending)
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err(format!("Invalid task status: {s}")),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl_sqlite_text_enum!(TaskStatus);

/// 分类映射条目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryMapping {
    /// 资源站分类ID
    pub source_id: String,
    #[serde(default)]
    pub source_name: String,
    /// 本站分类ID
    #[serde(default)]
    pub target_id: String,
    /// 本站分类名称，入库时按名称查找或创建
    pub target_name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// 视频识别策略
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum IdentifyStrategy {
    /// 只按外部ID匹配
    ExternalId,
    /// 外部ID优先，未命中时按标题相似度匹配
    #[default]
    ExternalIdThenTitle,
}

/// 匹配规则
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MatchRules {
    #[serde(default)]
    pub identify_by: IdentifyStrategy,
    /// 标题相似度阈值，取值 0~1，未设置时使用全局配置
    #[serde(default)]
    pub similarity_threshold: Option<f64>,
    /// 已存在且有变化的视频是否写回
    #[serde(default = "default_true")]
    pub update_existing: bool,
    #[serde(default)]
    pub update_strategy: UpdateStrategy,
    #[serde(default)]
    pub filters: ResultFilters,
}

impl MatchRules {
    pub fn threshold_or(&self, default: f64) -> f64 {
        self.similarity_threshold.unwrap_or(default)
    }
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            identify_by: IdentifyStrategy::default(),
            similarity_threshold: None,
            update_existing: true,
            update_strategy: UpdateStrategy::default(),
            filters: ResultFilters::default(),
        }
    }
}

/// 字段级更新开关
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateStrategy {
    pub cover: bool,
    pub description: bool,
    pub episodes: bool,
    pub rating: bool,
    pub title: bool,
    pub year: bool,
    pub area: bool,
    pub language: bool,
    pub update_status: bool,
    pub actors: bool,
    pub directors: bool,
}

impl Default for UpdateStrategy {
    fn default() -> Self {
        Self {
            cover: true,
            description: true,
            episodes: true,
            rating: true,
            title: true,
            year: true,
            area: true,
            language: true,
            update_status: true,
            actors: true,
            directors: true,
        }
    }
}

/// 采集结果过滤条件，先于分类映射生效
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ResultFilters {
    pub min_rating: Option<f64>,
    pub min_year: Option<i32>,
    pub exclude_areas: Vec<String>,
}

/// 新建任务请求
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub name: String,
    pub source_id: i64,
    pub task_type: TaskType,
    #[serde(default)]
    pub cron: Option<String>,
    #[serde(default)]
    pub interval_ms: Option<u64>,
    #[serde(default)]
    pub category_mapping: Vec<CategoryMapping>,
    #[serde(default)]
    pub match_rules: MatchRules,
    #[serde(default)]
    pub target_ids: Vec<String>,
}

impl NewTask {
    pub fn into_task(self) -> Task {
        let mut task = Task::new(self.name, self.source_id, self.task_type);
        task.cron = self.cron.filter(|c| !c.trim().is_empty());
        task.interval_ms = self.interval_ms;
        task.category_mapping = self.category_mapping;
        task.match_rules = self.match_rules;
        task.target_ids = self.target_ids;
        task
    }
}

/// 更新任务请求，未设置的字段保持不变
///
/// `cron` 为 `Some(None)` 时清除定时配置。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskUpdate {
    pub name: Option<String>,
    pub source_id: Option<i64>,
    pub task_type: Option<TaskType>,
    pub cron: Option<Option<String>>,
    pub interval_ms: Option<Option<u64>>,
    pub category_mapping: Option<Vec<CategoryMapping>>,
    pub match_rules: Option<MatchRules>,
    pub target_ids: Option<Vec<String>>,
}

impl TaskUpdate {
    pub fn apply_to(self, task: &mut Task) {
        if let Some(name) = self.name {
            task.name = name;
        }
        if let Some(source_id) = self.source_id {
            task.source_id = source_id;
        }
        if let Some(task_type) = self.task_type {
            task.task_type = task_type;
        }
        if let Some(cron) = self.cron {
            task.cron = cron.filter(|c| !c.trim().is_empty());
        }
        if let Some(interval_ms) = self.interval_ms {
            task.interval_ms = interval_ms;
        }
        if let Some(mapping) = self.category_mapping {
            task.category_mapping = mapping;
        }
        if let Some(rules) = self.match_rules {
            task.match_rules = rules;
        }
        if let Some(ids) = self.target_ids {
            task.target_ids = ids;
        }
        task.updated_at = Utc::now();
    }

    /// 是否改动了定时相关配置
    pub fn touches_cron(&self) -> bool {
        self.cron.is_some()
    }
}

/// 任务查询条件
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub task_type: Option<TaskType>,
    pub name_pattern: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn default_true() -> bool {
    true
}
