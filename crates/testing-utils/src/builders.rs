//! 测试数据构造器

use crawler_core::models::{
    CategoryMapping, MatchRules, RawRecord, Source, SourceStatus, Task, TaskStatus, TaskType,
};

/// Task 构造器
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new() -> Self {
        let mut task = Task::new("test_task", 1, TaskType::Incremental);
        task.id = 1;
        Self { task }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.task.id = id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.task.name = name.to_string();
        self
    }

    pub fn with_source(mut self, source_id: i64) -> Self {
        self.task.source_id = source_id;
        self
    }

    pub fn with_type(mut self, task_type: TaskType) -> Self {
        self.task.task_type = task_type;
        self
    }

    pub fn with_cron(mut self, cron: &str) -> Self {
        self.task.cron = Some(cron.to_string());
        self
    }

    pub fn with_interval_ms(mut self, interval_ms: u64) -> Self {
        self.task.interval_ms = Some(interval_ms);
        self
    }

    pub fn with_mapping(mut self, source_id: &str, target_name: &str) -> Self {
        self.task.category_mapping.push(CategoryMapping {
            source_id: source_id.to_string(),
            source_name: String::new(),
            target_id: String::new(),
            target_name: target_name.to_string(),
            enabled: true,
        });
        self
    }

    pub fn with_match_rules(mut self, rules: MatchRules) -> Self {
        self.task.match_rules = rules;
        self
    }

    pub fn with_target_ids(mut self, ids: &[&str]) -> Self {
        self.task.target_ids = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.task.status = status;
        self
    }

    pub fn paused(mut self) -> Self {
        self.task.paused = true;
        self
    }

    pub fn build(self) -> Task {
        self.task
    }
}

impl Default for TaskBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Source 构造器
pub struct SourceBuilder {
    source: Source,
}

impl SourceBuilder {
    pub fn new() -> Self {
        let mut source = Source::new("test_source", "https://api.example.com/provide/vod", "nangua");
        source.id = 1;
        Self { source }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.source.id = id;
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.source.base_url = base_url.to_string();
        self
    }

    pub fn with_adapter(mut self, adapter_type: &str) -> Self {
        self.source.adapter_type = adapter_type.to_string();
        self
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.source.config = config;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.source.status = SourceStatus::Inactive;
        self
    }

    pub fn build(self) -> Source {
        self.source
    }
}

impl Default for SourceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// RawRecord 构造器，默认是一条带单集播放地址的完整记录
pub struct RawRecordBuilder {
    record: RawRecord,
}

impl RawRecordBuilder {
    pub fn new(vod_id: &str, name: &str) -> Self {
        Self {
            record: RawRecord {
                vod_id: vod_id.to_string(),
                type_id: "6".to_string(),
                type_name: "动作片".to_string(),
                vod_name: name.to_string(),
                vod_pic: format!("https://img.example.com/{vod_id}.jpg"),
                vod_actor: "演员甲,演员乙".to_string(),
                vod_director: "导演甲".to_string(),
                vod_blurb: format!("{name}简介"),
                vod_remarks: "HD".to_string(),
                vod_area: "大陆".to_string(),
                vod_lang: "国语".to_string(),
                vod_year: "2023".to_string(),
                vod_score: "7.5".to_string(),
                vod_time: "2024-03-01 12:00:00".to_string(),
                vod_play_from: "ngm3u8".to_string(),
                vod_play_url: format!("正片$https://v.example.com/{vod_id}.m3u8"),
                ..Default::default()
            },
        }
    }

    pub fn with_type(mut self, type_id: &str) -> Self {
        self.record.type_id = type_id.to_string();
        self
    }

    pub fn with_cover(mut self, cover: &str) -> Self {
        self.record.vod_pic = cover.to_string();
        self
    }

    pub fn with_play_url(mut self, play_url: &str) -> Self {
        self.record.vod_play_url = play_url.to_string();
        self
    }

    pub fn with_score(mut self, score: &str) -> Self {
        self.record.vod_score = score.to_string();
        self
    }

    pub fn with_area(mut self, area: &str) -> Self {
        self.record.vod_area = area.to_string();
        self
    }

    pub fn with_time(mut self, vod_time: &str) -> Self {
        self.record.vod_time = vod_time.to_string();
        self
    }

    pub fn build(self) -> RawRecord {
        self.record
    }
}
