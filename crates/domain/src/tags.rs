use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::similarity::TitleSimilarity;

/// 标签去重默认阈值
pub const DEFAULT_TAG_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

/// 一次标签合并：`from` 并入 `into`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagMerge {
    pub from: i64,
    pub into: i64,
}

/// 基于名称相似度的标签去重
pub struct TagDeduplicator;

impl TagDeduplicator {
    /// 查找与 `name` 相似的标签
    ///
    /// 匹配顺序：名称完全相同 > 同义词包含 > 综合相似度最高且不低于阈值。
    pub fn find_similar_tag<'a>(name: &str, candidates: &'a [Tag], threshold: f64) -> Option<&'a Tag> {
        if let Some(tag) = candidates.iter().find(|tag| tag.name == name) {
            return Some(tag);
        }
        if let Some(tag) = candidates
            .iter()
            .find(|tag| tag.synonyms.iter().any(|s| s == name))
        {
            return Some(tag);
        }

        let mut best: Option<(&Tag, f64)> = None;
        for tag in candidates {
            let score = TitleSimilarity::overall(&tag.name, name);
            if score < threshold {
                continue;
            }
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((tag, score));
            }
        }
        best.map(|(tag, _)| tag)
    }

    /// 规划相似标签合并
    ///
    /// 贪心两两比较：靠后的标签与靠前且未被合并的标签相似度不低于阈值时并入前者，
    /// 每个标签最多被合并一次。
    pub fn plan_tag_merges(tags: &[Tag], threshold: f64) -> Vec<TagMerge> {
        let mut merged: HashSet<i64> = HashSet::new();
        let mut plan = Vec::new();

        for (i, target) in tags.iter().enumerate() {
            if merged.contains(&target.id) {
                continue;
            }
            for candidate in &tags[i + 1..] {
                if merged.contains(&candidate.id) {
                    continue;
                }
                if TitleSimilarity::overall(&target.name, &candidate.name) >= threshold {
                    plan.push(TagMerge {
                        from: candidate.id,
                        into: target.id,
                    });
                    merged.insert(candidate.id);
                }
            }
        }
        plan
    }
}
