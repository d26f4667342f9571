//! 标题相似度计算
//!
//! 两种度量按固定权重组合：
//! - 编辑相似度：`1 - levenshtein / max(len)`，按字符（而非字节）计算
//! - 字符集相似度：单字符集合上的 Jaccard 系数，弥补编辑距离在中文标题上的不足
//!
//! 综合相似度 = `0.6 × 编辑相似度 + 0.4 × 字符集相似度`。

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

const EDIT_WEIGHT: f64 = 0.6;
const CHAR_SET_WEIGHT: f64 = 0.4;

static PUNCTUATION_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[^\p{L}\p{N}_\s]").expect("punctuation regex should compile")
});
static WHITESPACE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex should compile"));
static SEASON_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"第.*?季|s\d+").expect("season regex should compile"));
static QUALITY_TAG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"全集|完结|高清|蓝光|修复版|重制版").expect("quality tag regex should compile")
});

/// 标题规范化与相似度计算
pub struct TitleSimilarity;

impl TitleSimilarity {
    /// 规范化标题：去标点、去空白、转小写、去季数标识与画质标识
    pub fn normalize(title: &str) -> String {
        let stripped = PUNCTUATION_PATTERN.replace_all(title, "");
        let compact = WHITESPACE_PATTERN.replace_all(&stripped, "");
        let lowered = compact.to_lowercase();
        let without_season = SEASON_PATTERN.replace_all(&lowered, "");
        QUALITY_TAG_PATTERN
            .replace_all(&without_season, "")
            .trim()
            .to_string()
    }

    /// 按字符计算编辑距离
    pub fn levenshtein(a: &str, b: &str) -> usize {
        let a: Vec<char> = a.chars().collect();
        let b: Vec<char> = b.chars().collect();
        if a.is_empty() {
            return b.len();
        }
        if b.is_empty() {
            return a.len();
        }

        let mut prev: Vec<usize> = (0..=b.len()).collect();
        let mut curr = vec![0usize; b.len() + 1];
        for (i, ca) in a.iter().enumerate() {
            curr[0] = i + 1;
            for (j, cb) in b.iter().enumerate() {
                curr[j + 1] = if ca == cb {
                    prev[j]
                } else {
                    1 + prev[j].min(prev[j + 1]).min(curr[j])
                };
            }
            std::mem::swap(&mut prev, &mut curr);
        }
        prev[b.len()]
    }

    /// 编辑相似度，任一为空时为 0，完全相同时为 1
    pub fn edit_similarity(a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        let len_a = a.chars().count();
        let len_b = b.chars().count();
        if len_a == 0 || len_b == 0 {
            return 0.0;
        }
        let distance = Self::levenshtein(a, b);
        1.0 - distance as f64 / len_a.max(len_b) as f64
    }

    /// 单字符集合的 Jaccard 系数
    pub fn char_set_similarity(a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        let set_a: HashSet<char> = a.chars().collect();
        let set_b: HashSet<char> = b.chars().collect();
        let union = set_a.union(&set_b).count();
        if union == 0 {
            return 0.0;
        }
        set_a.intersection(&set_b).count() as f64 / union as f64
    }

    /// 综合相似度（不做规范化），标签名比较使用
    pub fn overall(a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        EDIT_WEIGHT * Self::edit_similarity(a, b) + CHAR_SET_WEIGHT * Self::char_set_similarity(a, b)
    }

    /// 规范化后的标题综合相似度，范围 0-1
    ///
    /// 原始标题完全相同时直接返回 1；规范化后任一为空则为 0。
    pub fn title_similarity(a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        let norm_a = Self::normalize(a);
        let norm_b = Self::normalize(b);
        if norm_a.is_empty() || norm_b.is_empty() {
            return 0.0;
        }
        Self::overall(&norm_a, &norm_b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_markers() {
        assert_eq!(TitleSimilarity::normalize("庆余年 第二季"), "庆余年");
        assert_eq!(TitleSimilarity::normalize("Breaking Bad S05"), "breakingbad");
        assert_eq!(TitleSimilarity::normalize("三体（全集）"), "三体");
        assert_eq!(TitleSimilarity::normalize("大话西游 蓝光修复版"), "大话西游");
        assert_eq!(TitleSimilarity::normalize("!!!"), "");
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(TitleSimilarity::levenshtein("kitten", "sitting"), 3);
        assert_eq!(TitleSimilarity::levenshtein("", "abc"), 3);
        assert_eq!(TitleSimilarity::levenshtein("三体", "三体人"), 1);
    }

    #[test]
    fn test_identity_is_one() {
        for s in ["", "!!!", "三体", "The Wandering Earth", "庆余年 第二季", "a"] {
            assert_eq!(TitleSimilarity::title_similarity(s, s), 1.0, "input: {s:?}");
            assert_eq!(TitleSimilarity::overall(s, s), 1.0, "input: {s:?}");
        }
    }

    #[test]
    fn test_symmetry() {
        let pairs = [
            ("三体", "三体人"),
            ("流浪地球2", "流浪地球"),
            ("Breaking Bad", "Better Call Saul"),
            ("", "abc"),
            ("庆余年 第二季", "庆余年"),
        ];
        for (a, b) in pairs {
            assert_eq!(
                TitleSimilarity::title_similarity(a, b),
                TitleSimilarity::title_similarity(b, a)
            );
        }
    }

    #[test]
    fn test_empty_normalized_title_scores_zero() {
        assert_eq!(TitleSimilarity::title_similarity("!!!", "三体"), 0.0);
        assert_eq!(TitleSimilarity::edit_similarity("", "abc"), 0.0);
    }

    #[test]
    fn test_weighted_combination() {
        // 编辑相似度 1 - 1/3，字符集相似度 2/3
        let score = TitleSimilarity::overall("三体人", "三体");
        let expected = 0.6 * (2.0 / 3.0) + 0.4 * (2.0 / 3.0);
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_season_variants_match() {
        assert_eq!(TitleSimilarity::title_similarity("庆余年 第二季", "庆余年"), 1.0);
        assert!(TitleSimilarity::title_similarity("流浪地球", "流浪地球2") > 0.75);
        assert!(TitleSimilarity::title_similarity("三体", "西游记") < 0.5);
    }
}
