use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// 资源站返回的原始视频记录
///
/// 资源站的数值字段有时是数字有时是字符串，这里统一按字符串宽松解码，
/// 数值语义通过访问方法按“解析失败取默认值”的规则读取。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawRecord {
    #[serde(default, deserialize_with = "lenient_string")]
    pub vod_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub type_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub type_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vod_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vod_pic: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vod_actor: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vod_director: String,
    /// 剧情简介（纯文本，优先使用）
    #[serde(default, deserialize_with = "lenient_string")]
    pub vod_blurb: String,
    /// HTML 简介
    #[serde(default, deserialize_with = "lenient_string")]
    pub vod_content: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vod_remarks: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vod_area: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vod_lang: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vod_year: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vod_score: String,
    /// 资源更新时间，格式 `%Y-%m-%d %H:%M:%S`
    #[serde(default, deserialize_with = "lenient_string")]
    pub vod_time: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vod_play_from: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub vod_play_url: String,
}

pub const VENDOR_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl RawRecord {
    /// 年份，缺失或非数字时取当前年份
    pub fn year(&self) -> i32 {
        self.year_or(Utc::now().year())
    }

    pub fn year_or(&self, default: i32) -> i32 {
        leading_number(&self.vod_year, false)
            .and_then(|s| s.parse::<i32>().ok())
            .filter(|y| *y > 0)
            .unwrap_or(default)
    }

    /// 评分，缺失或非数字时为 0
    pub fn rating(&self) -> f64 {
        leading_number(&self.vod_score, true)
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|r| r.is_finite())
            .unwrap_or(0.0)
    }

    /// 资源更新时间，按资源站所在时区解析
    pub fn updated_at(&self, offset: FixedOffset) -> Option<DateTime<Utc>> {
        let naive = NaiveDateTime::parse_from_str(self.vod_time.trim(), VENDOR_TIME_FORMAT).ok()?;
        offset
            .from_local_datetime(&naive)
            .single()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// 取字符串开头的数字部分（对应宽松的整数/浮点解析）
fn leading_number(input: &str, allow_fraction: bool) -> Option<&str> {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'-') | Some(b'+')) {
        end = 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut has_digits = end > digits_start;
    if allow_fraction && end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start {
            has_digits = true;
            end = frac_end;
        }
    }
    has_digits.then(|| &s[..end])
}

/// 把字符串、数字或 null 统一解码为字符串
pub fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    })
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let s = lenient_string(deserializer)?;
    Ok(s.trim().parse::<u64>().unwrap_or(0))
}

/// 资源站分类节点
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryNode {
    #[serde(default, deserialize_with = "lenient_string")]
    pub type_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub type_pid: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub type_name: String,
}

/// 资源站列表响应信封
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VendorEnvelope {
    #[serde(default, deserialize_with = "lenient_u64")]
    pub code: u64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub msg: String,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub page: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub pagecount: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub limit: u64,
    #[serde(default, deserialize_with = "lenient_u64")]
    pub total: u64,
    #[serde(default)]
    pub list: Vec<RawRecord>,
    #[serde(default)]
    pub class: Vec<CategoryNode>,
}

/// 一页采集结果
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    pub page: u32,
    pub page_size: u32,
    pub total: u64,
    pub records: Vec<RawRecord>,
    pub categories: Vec<CategoryNode>,
}

impl PageResult {
    /// 总页数 = ceil(total / page_size)
    pub fn total_pages(&self) -> u32 {
        if self.page_size == 0 {
            return 0;
        }
        self.total.div_ceil(self.page_size as u64) as u32
    }
}

impl From<VendorEnvelope> for PageResult {
    fn from(envelope: VendorEnvelope) -> Self {
        let page_size = match envelope.limit {
            0 if !envelope.list.is_empty() => envelope.list.len() as u64,
            0 => 20,
            n => n,
        };
        Self {
            page: envelope.page.max(1) as u32,
            page_size: page_size as u32,
            total: envelope.total,
            records: envelope.list,
            categories: envelope.class,
        }
    }
}

/// 列表查询参数，透传给资源站
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilters {
    /// 资源站分类ID
    pub type_id: Option<String>,
    /// 最近多少小时内更新的资源
    pub hours: Option<u32>,
    pub keyword: Option<String>,
}

/// 人员角色
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PersonRole {
    Actor,
    Director,
}

impl PersonRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            PersonRole::Actor => "actor",
            PersonRole::Director => "director",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub role: PersonRole,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// 剧集草稿，同一视频内以集数唯一
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeDraft {
    pub title: String,
    /// 从 1 开始的集数
    pub episode: u32,
    pub play_url: String,
    /// 播放源名称
    pub source: String,
}

/// 规范化后的视频草稿，只在内存中存在，交由片库持久化
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoDraft {
    pub title: String,
    pub description: String,
    pub cover: String,
    pub year: i32,
    pub area: String,
    pub language: String,
    pub external_id: String,
    pub source_id: i64,
    pub source_tag: String,
    pub rating: f64,
    pub update_status: String,
    pub episodes: Vec<EpisodeDraft>,
    pub actor_ids: Vec<i64>,
    pub director_ids: Vec<i64>,
    pub category_ids: Vec<i64>,
}

/// 片库中的视频
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: i64,
    pub source_id: i64,
    pub external_id: String,
    pub source_tag: String,
    pub title: String,
    pub description: String,
    pub cover: String,
    pub year: i32,
    pub area: String,
    pub language: String,
    pub rating: f64,
    pub update_status: String,
    pub episodes: Vec<EpisodeDraft>,
    pub actor_ids: Vec<i64>,
    pub director_ids: Vec<i64>,
    pub category_ids: Vec<i64>,
}

impl Video {
    pub fn from_draft(id: i64, draft: VideoDraft) -> Self {
        Self {
            id,
            source_id: draft.source_id,
            external_id: draft.external_id,
            source_tag: draft.source_tag,
            title: draft.title,
            description: draft.description,
            cover: draft.cover,
            year: draft.year,
            area: draft.area,
            language: draft.language,
            rating: draft.rating,
            update_status: draft.update_status,
            episodes: draft.episodes,
            actor_ids: draft.actor_ids,
            director_ids: draft.director_ids,
            category_ids: draft.category_ids,
        }
    }

    /// 应用部分字段更新
    pub fn apply(&mut self, patch: VideoPatch) {
        if let Some(v) = patch.title {
            self.title = v;
        }
        if let Some(v) = patch.description {
            self.description = v;
        }
        if let Some(v) = patch.cover {
            self.cover = v;
        }
        if let Some(v) = patch.year {
            self.year = v;
        }
        if let Some(v) = patch.area {
            self.area = v;
        }
        if let Some(v) = patch.language {
            self.language = v;
        }
        if let Some(v) = patch.rating {
            self.rating = v;
        }
        if let Some(v) = patch.update_status {
            self.update_status = v;
        }
        if let Some(v) = patch.actor_ids {
            self.actor_ids = v;
        }
        if let Some(v) = patch.director_ids {
            self.director_ids = v;
        }
    }
}

/// 视频部分字段更新
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub cover: Option<String>,
    pub year: Option<i32>,
    pub area: Option<String>,
    pub language: Option<String>,
    pub rating: Option<f64>,
    pub update_status: Option<String>,
    pub actor_ids: Option<Vec<i64>>,
    pub director_ids: Option<Vec<i64>>,
}

impl VideoPatch {
    pub fn is_empty(&self) -> bool {
        *self == VideoPatch::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_decoding_accepts_numbers() {
        let record: RawRecord = serde_json::from_str(
            r#"{"vod_id": 42, "type_id": 6, "vod_name": "三体", "vod_score": 8.5, "vod_year": null}"#,
        )
        .unwrap();
        assert_eq!(record.vod_id, "42");
        assert_eq!(record.type_id, "6");
        assert_eq!(record.vod_year, "");
        assert!((record.rating() - 8.5).abs() < 1e-9);
    }

    #[test]
    fn test_permissive_numeric_fields() {
        let record = RawRecord {
            vod_year: "2023年".to_string(),
            vod_score: "暂无".to_string(),
            ..Default::default()
        };
        assert_eq!(record.year_or(1999), 2023);
        assert_eq!(record.rating(), 0.0);

        let missing = RawRecord::default();
        assert_eq!(missing.year_or(2026), 2026);
        assert_eq!(
            RawRecord {
                vod_score: " 7.9分".to_string(),
                ..Default::default()
            }
            .rating(),
            7.9
        );
    }

    #[test]
    fn test_updated_at_uses_source_offset() {
        let record = RawRecord {
            vod_time: "2024-03-01 08:00:00".to_string(),
            ..Default::default()
        };
        let offset = FixedOffset::east_opt(8 * 3600).unwrap();
        let ts = record.updated_at(offset).unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());

        let bad = RawRecord {
            vod_time: "yesterday".to_string(),
            ..Default::default()
        };
        assert!(bad.updated_at(offset).is_none());
    }

    #[test]
    fn test_page_result_from_envelope() {
        let envelope: VendorEnvelope = serde_json::from_str(
            r#"{"code":1,"msg":"数据列表","page":"1","pagecount":3,"limit":"20","total":45,"list":[],"class":[{"type_id":1,"type_pid":0,"type_name":"电影"}]}"#,
        )
        .unwrap();
        let page = PageResult::from(envelope);
        assert_eq!(page.page_size, 20);
        assert_eq!(page.total, 45);
        assert_eq!(page.total_pages(), 3);
        assert_eq!(page.categories[0].type_id, "1");
    }
}
