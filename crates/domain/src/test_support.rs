//! 单元测试用的片库替身

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use crawler_core::models::{
    Category, EpisodeDraft, Person, PersonRole, Video, VideoDraft, VideoPatch,
};
use crawler_core::{CatalogStore, CrawlerError, CrawlerResult};

use crate::similarity::TitleSimilarity;

#[derive(Default)]
pub struct FakeCatalog {
    pub videos: Mutex<Vec<Video>>,
    people: Mutex<HashMap<(String, PersonRole), i64>>,
    categories: Mutex<HashMap<String, i64>>,
    pub update_calls: Mutex<Vec<(i64, VideoPatch)>>,
    pub episode_replacements: Mutex<Vec<i64>>,
}

impl FakeCatalog {
    pub fn with_video(video: Video) -> Self {
        let catalog = Self::default();
        catalog.videos.lock().unwrap().push(video);
        catalog
    }
}

#[async_trait]
impl CatalogStore for FakeCatalog {
    async fn find_by_external_id(
        &self,
        source_id: i64,
        external_id: &str,
    ) -> CrawlerResult<Option<Video>> {
        Ok(self
            .videos
            .lock()
            .unwrap()
            .iter()
            .find(|v| v.source_id == source_id && v.external_id == external_id)
            .cloned())
    }

    async fn find_similar(
        &self,
        title: &str,
        threshold_percent: f64,
    ) -> CrawlerResult<Option<Video>> {
        let videos = self.videos.lock().unwrap();
        let best = videos
            .iter()
            .map(|v| (v, TitleSimilarity::title_similarity(&v.title, title) * 100.0))
            .filter(|(_, score)| *score >= threshold_percent)
            .max_by(|a, b| a.1.total_cmp(&b.1));
        Ok(best.map(|(v, _)| v.clone()))
    }

    async fn create(&self, draft: VideoDraft) -> CrawlerResult<Video> {
        let mut videos = self.videos.lock().unwrap();
        if videos
            .iter()
            .any(|v| v.source_id == draft.source_id && v.external_id == draft.external_id)
        {
            return Err(CrawlerError::Catalog("duplicate external id".to_string()));
        }
        let video = Video::from_draft(videos.len() as i64 + 1, draft);
        videos.push(video.clone());
        Ok(video)
    }

    async fn update(&self, id: i64, patch: VideoPatch) -> CrawlerResult<Video> {
        self.update_calls.lock().unwrap().push((id, patch.clone()));
        let mut videos = self.videos.lock().unwrap();
        let video = videos
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or_else(|| CrawlerError::Catalog(format!("video {id} not found")))?;
        video.apply(patch);
        Ok(video.clone())
    }

    async fn replace_episodes(&self, video_id: i64, episodes: &[EpisodeDraft]) -> CrawlerResult<()> {
        self.episode_replacements.lock().unwrap().push(video_id);
        let mut videos = self.videos.lock().unwrap();
        if let Some(video) = videos.iter_mut().find(|v| v.id == video_id) {
            video.episodes = episodes.to_vec();
        }
        Ok(())
    }

    async fn find_or_create_person(&self, name: &str, role: PersonRole) -> CrawlerResult<Person> {
        let mut people = self.people.lock().unwrap();
        let next = people.len() as i64 + 1;
        let id = *people.entry((name.to_string(), role)).or_insert(next);
        Ok(Person {
            id,
            name: name.to_string(),
            role,
        })
    }

    async fn find_or_create_category(&self, name: &str) -> CrawlerResult<Category> {
        let mut categories = self.categories.lock().unwrap();
        let next = categories.len() as i64 + 1;
        let id = *categories.entry(name.to_string()).or_insert(next);
        Ok(Category {
            id,
            name: name.to_string(),
        })
    }
}
