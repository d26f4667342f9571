//! 进程内片库
//!
//! 片库持久化由宿主系统负责，这里的实现供命令行运行和测试使用。
//! `(source_id, external_id)` 唯一，重复创建返回 `Catalog` 错误，
//! 并发采集同一外部ID时只有第一次创建成功。

use std::collections::HashMap;

use async_trait::async_trait;
use crawler_core::models::{
    Category, EpisodeDraft, Person, PersonRole, Video, VideoDraft, VideoPatch,
};
use crawler_core::traits::CatalogStore;
use crawler_core::{CrawlerError, CrawlerResult};
use crawler_domain::TitleSimilarity;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct CatalogState {
    videos: HashMap<i64, Video>,
    by_external_id: HashMap<(i64, String), i64>,
    people: HashMap<(String, PersonRole), Person>,
    categories: HashMap<String, Category>,
    next_video_id: i64,
    next_person_id: i64,
    next_category_id: i64,
}

#[derive(Default)]
pub struct InMemoryCatalog {
    state: RwLock<CatalogState>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按ID升序返回所有视频
    pub async fn videos(&self) -> Vec<Video> {
        let state = self.state.read().await;
        let mut videos: Vec<Video> = state.videos.values().cloned().collect();
        videos.sort_by_key(|v| v.id);
        videos
    }

    pub async fn get(&self, id: i64) -> Option<Video> {
        self.state.read().await.videos.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.videos.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn find_by_external_id(
        &self,
        source_id: i64,
        external_id: &str,
    ) -> CrawlerResult<Option<Video>> {
        let state = self.state.read().await;
        Ok(state
            .by_external_id
            .get(&(source_id, external_id.to_string()))
            .and_then(|id| state.videos.get(id))
            .cloned())
    }

    async fn find_similar(
        &self,
        title: &str,
        threshold_percent: f64,
    ) -> CrawlerResult<Option<Video>> {
        let state = self.state.read().await;
        let best = state
            .videos
            .values()
            .map(|video| {
                let score = TitleSimilarity::title_similarity(&video.title, title) * 100.0;
                (video, score)
            })
            .max_by(|a, b| a.1.total_cmp(&b.1).then_with(|| b.0.id.cmp(&a.0.id)));

        Ok(best
            .filter(|(_, score)| *score >= threshold_percent)
            .map(|(video, score)| {
                debug!(video.id = video.id, score, "标题相似匹配");
                video.clone()
            }))
    }

    async fn create(&self, draft: VideoDraft) -> CrawlerResult<Video> {
        let mut state = self.state.write().await;
        let key = (draft.source_id, draft.external_id.clone());
        if state.by_external_id.contains_key(&key) {
            return Err(CrawlerError::Catalog(format!(
                "重复的外部ID: 资源站 {} / {}",
                key.0, key.1
            )));
        }

        state.next_video_id += 1;
        let video = Video::from_draft(state.next_video_id, draft);
        state.by_external_id.insert(key, video.id);
        state.videos.insert(video.id, video.clone());
        Ok(video)
    }

    async fn update(&self, id: i64, patch: VideoPatch) -> CrawlerResult<Video> {
        let mut state = self.state.write().await;
        let video = state
            .videos
            .get_mut(&id)
            .ok_or_else(|| CrawlerError::Catalog(format!("视频不存在: {id}")))?;
        video.apply(patch);
        Ok(video.clone())
    }

    async fn replace_episodes(&self, video_id: i64, episodes: &[EpisodeDraft]) -> CrawlerResult<()> {
        let mut state = self.state.write().await;
        let video = state
            .videos
            .get_mut(&video_id)
            .ok_or_else(|| CrawlerError::Catalog(format!("视频不存在: {video_id}")))?;
        video.episodes = episodes.to_vec();
        Ok(())
    }

    async fn find_or_create_person(&self, name: &str, role: PersonRole) -> CrawlerResult<Person> {
        let mut state = self.state.write().await;
        let key = (name.to_string(), role);
        if let Some(person) = state.people.get(&key) {
            return Ok(person.clone());
        }
        state.next_person_id += 1;
        let person = Person {
            id: state.next_person_id,
            name: name.to_string(),
            role,
        };
        state.people.insert(key, person.clone());
        Ok(person)
    }

    async fn find_or_create_category(&self, name: &str) -> CrawlerResult<Category> {
        let mut state = self.state.write().await;
        if let Some(category) = state.categories.get(name) {
            return Ok(category.clone());
        }
        state.next_category_id += 1;
        let category = Category {
            id: state.next_category_id,
            name: name.to_string(),
        };
        state.categories.insert(name.to_string(), category.clone());
        Ok(category)
    }
}
