//! 播放串解析
//!
//! 资源站的 `vod_play_url` 有两种编码：
//!
//! ```text
//! 多播放源: 源A$第1集$url1#第2集$url2$$$源B$第1集$url3
//! 平铺:     第1集$url1#第2集$url2
//! ```
//!
//! 多播放源格式以 `$$$` 分隔播放源，源名称与剧集列表以第一个 `$` 分隔，
//! 集数为剧集在本播放源中的位置（从 1 开始）。平铺格式直接以 `#` 分隔剧集，
//! 集数取标题中的第一段数字，没有数字时取位置。
//!
//! 剧集以第一个 `$` 前的部分为标题，最后一个 `$` 后的部分为地址；没有地址的片段丢弃。
//! 同一播放源内集数重复时保留先出现的一条并记录告警，最终按集数升序排列。

use std::collections::HashSet;

use crawler_core::models::EpisodeDraft;
use once_cell::sync::Lazy;
use regex::Regex;

const SOURCE_SEPARATOR: &str = "$$$";
const EPISODE_SEPARATOR: char = '#';
const FIELD_SEPARATOR: char = '$';

static EPISODE_NUMBER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+").expect("episode number regex should compile"));

/// 解析结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPlaylist {
    pub episodes: Vec<EpisodeDraft>,
    /// 重复集数等非致命问题
    pub warnings: Vec<String>,
}

pub struct PlaylistParser;

impl PlaylistParser {
    /// 解析播放串
    ///
    /// `flat_source` 为平铺格式剧集使用的播放源名称。
    pub fn parse(input: &str, flat_source: &str) -> ParsedPlaylist {
        let input = input.trim();
        if input.is_empty() {
            return ParsedPlaylist::default();
        }

        let mut parsed = ParsedPlaylist::default();
        let mut seen: HashSet<(String, u32)> = HashSet::new();

        let candidates = if input.contains(SOURCE_SEPARATOR) {
            Self::parse_multi_source(input)
        } else {
            Self::parse_flat(input, flat_source)
        };

        for episode in candidates {
            if !seen.insert((episode.source.clone(), episode.episode)) {
                parsed.warnings.push(format!(
                    "重复的集数 {}（播放源 {}），已忽略: {}",
                    episode.episode, episode.source, episode.play_url
                ));
                continue;
            }
            parsed.episodes.push(episode);
        }

        // 稳定排序，同集数保持输入顺序
        parsed.episodes.sort_by_key(|e| e.episode);
        parsed
    }

    fn parse_multi_source(input: &str) -> Vec<EpisodeDraft> {
        let mut episodes = Vec::new();
        for block in input.split(SOURCE_SEPARATOR) {
            let Some((name, list)) = block.split_once(FIELD_SEPARATOR) else {
                continue;
            };
            let name = name.trim();
            for (index, chunk) in list.split(EPISODE_SEPARATOR).enumerate() {
                let Some((title, url)) = split_chunk(chunk) else {
                    continue;
                };
                let number = index as u32 + 1;
                episodes.push(EpisodeDraft {
                    title: title_or_default(title, number),
                    episode: number,
                    play_url: url.to_string(),
                    source: name.to_string(),
                });
            }
        }
        episodes
    }

    fn parse_flat(input: &str, source: &str) -> Vec<EpisodeDraft> {
        let mut episodes = Vec::new();
        for (index, chunk) in input.split(EPISODE_SEPARATOR).enumerate() {
            let Some((title, url)) = split_chunk(chunk) else {
                continue;
            };
            let position = index as u32 + 1;
            let number = EPISODE_NUMBER_PATTERN
                .find(title)
                .and_then(|m| m.as_str().parse::<u32>().ok())
                .filter(|n| *n > 0)
                .unwrap_or(position);
            episodes.push(EpisodeDraft {
                title: title_or_default(title, number),
                episode: number,
                play_url: url.to_string(),
                source: source.to_string(),
            });
        }
        episodes
    }
}

/// 拆分单集片段为 (标题, 地址)，地址为空时返回 None
fn split_chunk(chunk: &str) -> Option<(&str, &str)> {
    let chunk = chunk.trim();
    let (title, _) = chunk.split_once(FIELD_SEPARATOR)?;
    let (_, url) = chunk.rsplit_once(FIELD_SEPARATOR)?;
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    Some((title.trim(), url))
}

fn title_or_default(title: &str, number: u32) -> String {
    if title.is_empty() {
        format!("第{number}集")
    } else {
        title.to_string()
    }
}
