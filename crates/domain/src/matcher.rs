//! 片库对账：判断草稿是新视频、重复还是需要更新

use std::collections::HashSet;

use crawler_core::models::{
    FieldChanges, IdentifyStrategy, MatchOutcome, MatchRules, UpdateStrategy, Video, VideoDraft,
    VideoPatch,
};
use crawler_core::{CatalogStore, CrawlerResult};
use tracing::debug;

pub const REASON_NO_CHANGES: &str = "no changes";
pub const REASON_UPDATE_DISABLED: &str = "update disabled";

pub struct Reconciler;

impl Reconciler {
    /// 在片库中查找草稿对应的已有视频
    ///
    /// 先按 `(source_id, external_id)` 精确查找；未命中且规则允许时按标题相似度查找。
    pub async fn find_existing(
        draft: &VideoDraft,
        rules: &MatchRules,
        threshold: f64,
        catalog: &dyn CatalogStore,
    ) -> CrawlerResult<Option<Video>> {
        if let Some(video) = catalog
            .find_by_external_id(draft.source_id, &draft.external_id)
            .await?
        {
            return Ok(Some(video));
        }
        match rules.identify_by {
            IdentifyStrategy::ExternalId => Ok(None),
            IdentifyStrategy::ExternalIdThenTitle => {
                catalog.find_similar(&draft.title, threshold * 100.0).await
            }
        }
    }

    /// 对账一条草稿
    ///
    /// - 未命中：创建，结果 `new`
    /// - 命中且无差异：`skipped`，原因 "no changes"
    /// - 命中有差异但规则禁止更新：`skipped`，原因 "update disabled"
    /// - 命中有差异：按更新策略写回启用的字段，剧集整体替换，结果 `updated`
    pub async fn reconcile(
        draft: VideoDraft,
        rules: &MatchRules,
        threshold: f64,
        catalog: &dyn CatalogStore,
    ) -> CrawlerResult<MatchOutcome> {
        let Some(existing) = Self::find_existing(&draft, rules, threshold, catalog).await? else {
            let video = catalog.create(draft).await?;
            debug!(video.id = video.id, title = %video.title, "新建视频");
            return Ok(MatchOutcome::created(video.id));
        };

        let changes = Self::diff(&existing, &draft);
        if !changes.any() {
            return Ok(MatchOutcome::skipped(Some(existing.id), REASON_NO_CHANGES));
        }
        if !rules.update_existing {
            return Ok(MatchOutcome::skipped(Some(existing.id), REASON_UPDATE_DISABLED));
        }

        let strategy = &rules.update_strategy;
        if strategy.episodes && changes.episodes {
            catalog.replace_episodes(existing.id, &draft.episodes).await?;
        }
        let patch = Self::build_patch(&draft, &changes, strategy);
        if !patch.is_empty() {
            catalog.update(existing.id, patch).await?;
        }
        debug!(video.id = existing.id, ?changes, "更新视频");
        Ok(MatchOutcome::updated(existing.id, changes))
    }

    /// 字段级差异
    ///
    /// 剧集数量不同或任一位置播放地址不同视为变化；演员/导演按集合比较，与顺序无关。
    pub fn diff(existing: &Video, draft: &VideoDraft) -> FieldChanges {
        FieldChanges {
            title: existing.title != draft.title,
            description: existing.description != draft.description,
            cover: existing.cover != draft.cover,
            year: existing.year != draft.year,
            area: existing.area != draft.area,
            language: existing.language != draft.language,
            rating: (existing.rating - draft.rating).abs() > f64::EPSILON,
            update_status: existing.update_status != draft.update_status,
            episodes: existing.episodes.len() != draft.episodes.len()
                || existing
                    .episodes
                    .iter()
                    .zip(&draft.episodes)
                    .any(|(old, new)| old.play_url != new.play_url),
            actors: !same_members(&existing.actor_ids, &draft.actor_ids),
            directors: !same_members(&existing.director_ids, &draft.director_ids),
        }
    }

    /// 只写回有变化且策略启用的字段；演员/导演在策略启用时总是重写
    pub fn build_patch(
        draft: &VideoDraft,
        changes: &FieldChanges,
        strategy: &UpdateStrategy,
    ) -> VideoPatch {
        fn pick<T: Clone>(enabled: bool, changed: bool, value: &T) -> Option<T> {
            (enabled && changed).then(|| value.clone())
        }

        VideoPatch {
            title: pick(strategy.title, changes.title, &draft.title),
            description: pick(strategy.description, changes.description, &draft.description),
            cover: pick(strategy.cover, changes.cover, &draft.cover),
            year: pick(strategy.year, changes.year, &draft.year),
            area: pick(strategy.area, changes.area, &draft.area),
            language: pick(strategy.language, changes.language, &draft.language),
            rating: pick(strategy.rating, changes.rating, &draft.rating),
            update_status: pick(
                strategy.update_status,
                changes.update_status,
                &draft.update_status,
            ),
            actor_ids: strategy.actors.then(|| draft.actor_ids.clone()),
            director_ids: strategy.directors.then(|| draft.director_ids.clone()),
        }
    }
}

fn same_members(a: &[i64], b: &[i64]) -> bool {
    a.iter().collect::<HashSet<_>>() == b.iter().collect::<HashSet<_>>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeCatalog;
    use crawler_core::models::{EpisodeDraft, MatchStatus};

    fn draft() -> VideoDraft {
        VideoDraft {
            title: "流浪地球".to_string(),
            description: "太阳即将毁灭".to_string(),
            cover: "http://img/1.jpg".to_string(),
            year: 2019,
            area: "大陆".to_string(),
            language: "国语".to_string(),
            external_id: "101".to_string(),
            source_id: 3,
            source_tag: "crawler".to_string(),
            rating: 7.9,
            update_status: "HD".to_string(),
            episodes: vec![EpisodeDraft {
                title: "正片".to_string(),
                episode: 1,
                play_url: "http://v/1.m3u8".to_string(),
                source: "ngm3u8".to_string(),
            }],
            actor_ids: vec![1, 2],
            director_ids: vec![3],
            category_ids: vec![1],
        }
    }

    fn stored(id: i64) -> Video {
        Video::from_draft(id, draft())
    }

    #[tokio::test]
    async fn test_identical_record_is_skipped() {
        let catalog = FakeCatalog::with_video(stored(1));
        let outcome = Reconciler::reconcile(draft(), &MatchRules::default(), 0.9, &catalog)
            .await
            .unwrap();
        assert_eq!(outcome.status, MatchStatus::Skipped);
        assert_eq!(outcome.reason.as_deref(), Some(REASON_NO_CHANGES));
        assert!(catalog.update_calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cover_only_change_is_updated() {
        let catalog = FakeCatalog::with_video(stored(1));
        let mut incoming = draft();
        incoming.cover = "http://img/2.jpg".to_string();
        // 演员顺序不同不算变化
        incoming.actor_ids = vec![2, 1];

        let outcome = Reconciler::reconcile(incoming, &MatchRules::default(), 0.9, &catalog)
            .await
            .unwrap();
        assert_eq!(outcome.status, MatchStatus::Updated);
        assert_eq!(
            outcome.changes,
            Some(FieldChanges {
                cover: true,
                ..Default::default()
            })
        );
        assert!(catalog.episode_replacements.lock().unwrap().is_empty());
        let calls = catalog.update_calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.cover.as_deref(), Some("http://img/2.jpg"));
        assert!(calls[0].1.title.is_none());
    }

    #[tokio::test]
    async fn test_title_similarity_prevents_duplicate_creation() {
        let mut existing = stored(1);
        existing.external_id = "other-id".to_string();
        existing.title = "流浪地球 高清".to_string();
        let catalog = FakeCatalog::with_video(existing);

        let outcome = Reconciler::reconcile(draft(), &MatchRules::default(), 0.9, &catalog)
            .await
            .unwrap();
        assert_ne!(outcome.status, MatchStatus::New);
        assert_eq!(outcome.video_id, Some(1));
        assert_eq!(catalog.videos.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_external_id_only_strategy_creates() {
        let mut existing = stored(1);
        existing.external_id = "other-id".to_string();
        let catalog = FakeCatalog::with_video(existing);
        let rules = MatchRules {
            identify_by: IdentifyStrategy::ExternalId,
            ..Default::default()
        };

        let outcome = Reconciler::reconcile(draft(), &rules, 0.9, &catalog)
            .await
            .unwrap();
        assert_eq!(outcome.status, MatchStatus::New);
        assert_eq!(catalog.videos.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_episode_change_replaces_list() {
        let catalog = FakeCatalog::with_video(stored(1));
        let mut incoming = draft();
        incoming.episodes[0].play_url = "http://v/1-new.m3u8".to_string();

        let outcome = Reconciler::reconcile(incoming, &MatchRules::default(), 0.9, &catalog)
            .await
            .unwrap();
        assert_eq!(outcome.status, MatchStatus::Updated);
        assert!(outcome.changes.unwrap().episodes);
        assert_eq!(*catalog.episode_replacements.lock().unwrap(), vec![1]);
    }

    #[tokio::test]
    async fn test_update_disabled_reports_skip() {
        let catalog = FakeCatalog::with_video(stored(1));
        let mut incoming = draft();
        incoming.rating = 8.4;
        let rules = MatchRules {
            update_existing: false,
            ..Default::default()
        };

        let outcome = Reconciler::reconcile(incoming, &rules, 0.9, &catalog)
            .await
            .unwrap();
        assert_eq!(outcome.status, MatchStatus::Skipped);
        assert_eq!(outcome.reason.as_deref(), Some(REASON_UPDATE_DISABLED));
    }

    #[test]
    fn test_build_patch_respects_strategy() {
        let changes = FieldChanges {
            cover: true,
            rating: true,
            ..Default::default()
        };
        let strategy = UpdateStrategy {
            cover: false,
            actors: false,
            ..Default::default()
        };
        let patch = Reconciler::build_patch(&draft(), &changes, &strategy);
        assert!(patch.cover.is_none());
        assert_eq!(patch.rating, Some(7.9));
        assert!(patch.actor_ids.is_none());
        assert_eq!(patch.director_ids, Some(vec![3]));
    }
}
