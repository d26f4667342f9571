use chrono::{FixedOffset, Offset, Utc};
use crawler_core::models::{CategoryMapping, MatchRules, Source, Task};

/// 引擎级默认参数
#[derive(Debug, Clone)]
pub struct EngineDefaults {
    /// 平铺格式播放串使用的播放源名称
    pub source_tag: String,
    /// 标题相似度阈值（0-1）
    pub title_similarity_threshold: f64,
    /// 资源站时间所在时区
    pub utc_offset: FixedOffset,
}

impl Default for EngineDefaults {
    fn default() -> Self {
        Self {
            source_tag: "crawler".to_string(),
            title_similarity_threshold: 0.9,
            utc_offset: FixedOffset::east_opt(8 * 3600).unwrap_or(Utc.fix()),
        }
    }
}

/// 一次任务执行的上下文
///
/// 在转换与对账的调用链上显式传递，同一任务的多次并发执行各自持有一份。
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub task_id: i64,
    pub task_name: String,
    pub source_id: i64,
    pub source_tag: String,
    pub category_mapping: Vec<CategoryMapping>,
    pub match_rules: MatchRules,
    /// 标题相似度阈值（0-1），任务规则优先
    pub similarity_threshold: f64,
    pub utc_offset: FixedOffset,
}

impl TaskContext {
    pub fn new(task: &Task, source: &Source, defaults: &EngineDefaults) -> Self {
        let source_tag = source
            .config_str("sourceTag")
            .filter(|tag| !tag.trim().is_empty())
            .unwrap_or(defaults.source_tag.as_str())
            .to_string();
        Self {
            task_id: task.id,
            task_name: task.name.clone(),
            source_id: source.id,
            source_tag,
            category_mapping: task.category_mapping.clone(),
            match_rules: task.match_rules.clone(),
            similarity_threshold: task
                .match_rules
                .threshold_or(defaults.title_similarity_threshold),
            utc_offset: defaults.utc_offset,
        }
    }

    /// 按资源站分类ID查找启用的映射
    pub fn find_mapping(&self, source_category_id: &str) -> Option<&CategoryMapping> {
        self.category_mapping
            .iter()
            .find(|m| m.enabled && m.source_id == source_category_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crawler_core::models::TaskType;

    fn mapping(source_id: &str, enabled: bool) -> CategoryMapping {
        CategoryMapping {
            source_id: source_id.to_string(),
            source_name: String::new(),
            target_id: "t".to_string(),
            target_name: "电影".to_string(),
            enabled,
        }
    }

    #[test]
    fn test_find_mapping_ignores_disabled_entries() {
        let mut task = Task::new("t", 1, TaskType::Full);
        task.category_mapping = vec![mapping("1", false), mapping("2", true)];
        let source = Source::new("s", "http://example.com/api.php/provide/vod", "nangua");
        let ctx = TaskContext::new(&task, &source, &EngineDefaults::default());

        assert!(ctx.find_mapping("1").is_none());
        assert!(ctx.find_mapping("2").is_some());
        assert!(ctx.find_mapping("3").is_none());
    }

    #[test]
    fn test_source_tag_and_threshold_resolution() {
        let mut task = Task::new("t", 1, TaskType::Full);
        let mut source = Source::new("s", "http://example.com", "nangua");
        let defaults = EngineDefaults::default();

        let ctx = TaskContext::new(&task, &source, &defaults);
        assert_eq!(ctx.source_tag, "crawler");
        assert!((ctx.similarity_threshold - 0.9).abs() < f64::EPSILON);

        source.config = serde_json::json!({"sourceTag": "ngm3u8"});
        task.match_rules.similarity_threshold = Some(0.75);
        let ctx = TaskContext::new(&task, &source, &defaults);
        assert_eq!(ctx.source_tag, "ngm3u8");
        assert!((ctx.similarity_threshold - 0.75).abs() < f64::EPSILON);
    }
}
