//! 资源记录到视频草稿的转换

use std::collections::HashSet;

use chrono::{Datelike, Utc};
use crawler_core::models::{CategoryMapping, PersonRole, RawRecord, VideoDraft};
use crawler_core::{CatalogStore, CrawlerError, CrawlerResult};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::context::TaskContext;
use crate::playlist::PlaylistParser;

static HTML_TAG_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*>").expect("html tag regex should compile"));
static PEOPLE_SEPARATOR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[,，、\s]+").expect("people separator regex should compile"));

/// 转换结果
#[derive(Debug, Clone)]
pub struct TransformedRecord {
    pub draft: VideoDraft,
    /// 映射到的本站分类名
    pub category_name: String,
    /// 播放串解析告警，由调用方写入采集日志
    pub warnings: Vec<String>,
}

pub struct RecordTransformer;

impl RecordTransformer {
    /// 简介：优先纯文本简介，其次 HTML 简介，去掉所有标签后 trim
    pub fn clean_description(record: &RawRecord) -> String {
        let source = if record.vod_blurb.trim().is_empty() {
            &record.vod_content
        } else {
            &record.vod_blurb
        };
        HTML_TAG_PATTERN.replace_all(source, "").trim().to_string()
    }

    /// 拆分演员/导演字符串，去空去重并保持原顺序
    pub fn split_people(raw: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        PEOPLE_SEPARATOR_PATTERN
            .split(raw)
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .filter(|name| seen.insert(name.to_string()))
            .map(str::to_string)
            .collect()
    }

    /// 平铺格式播放串的播放源名称
    fn flat_source_label<'a>(record: &'a RawRecord, ctx: &'a TaskContext) -> &'a str {
        record
            .vod_play_from
            .split("$$$")
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(ctx.source_tag.as_str())
    }

    /// 把一条资源记录转换为视频草稿
    ///
    /// 人员按 `(名称, 角色)` 查找或创建，分类按映射的本站分类名查找或创建。
    ///
    /// # 错误
    ///
    /// * `InvalidRecord` - 记录缺少标题或资源站ID
    /// * 片库协作方返回的错误原样返回
    pub async fn transform(
        record: &RawRecord,
        mapping: &CategoryMapping,
        ctx: &TaskContext,
        catalog: &dyn CatalogStore,
    ) -> CrawlerResult<TransformedRecord> {
        let title = record.vod_name.trim();
        if title.is_empty() {
            return Err(CrawlerError::InvalidRecord("缺少标题(vod_name)".to_string()));
        }
        let external_id = record.vod_id.trim();
        if external_id.is_empty() {
            return Err(CrawlerError::InvalidRecord(format!("{title} 缺少资源站ID(vod_id)")));
        }

        let mut actor_ids = Vec::new();
        for name in Self::split_people(&record.vod_actor) {
            actor_ids.push(catalog.find_or_create_person(&name, PersonRole::Actor).await?.id);
        }
        let mut director_ids = Vec::new();
        for name in Self::split_people(&record.vod_director) {
            director_ids.push(
                catalog
                    .find_or_create_person(&name, PersonRole::Director)
                    .await?
                    .id,
            );
        }

        let category = catalog.find_or_create_category(&mapping.target_name).await?;

        let playlist = PlaylistParser::parse(&record.vod_play_url, Self::flat_source_label(record, ctx));

        let draft = VideoDraft {
            title: title.to_string(),
            description: Self::clean_description(record),
            cover: record.vod_pic.trim().to_string(),
            year: record.year_or(Utc::now().year()),
            area: record.vod_area.trim().to_string(),
            language: record.vod_lang.trim().to_string(),
            external_id: external_id.to_string(),
            source_id: ctx.source_id,
            source_tag: ctx.source_tag.clone(),
            rating: record.rating(),
            update_status: record.vod_remarks.trim().to_string(),
            episodes: playlist.episodes,
            actor_ids,
            director_ids,
            category_ids: vec![category.id],
        };

        Ok(TransformedRecord {
            draft,
            category_name: category.name,
            warnings: playlist.warnings,
        })
    }
}
