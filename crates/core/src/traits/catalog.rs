//! 片库协作方接口
//!
//! 视频、人员、分类的持久化不属于采集引擎，这里只约定调用契约。
//! 实现方需要保证单条 `create`/`update` 的原子性；
//! 同一 `(source_id, external_id)` 的重复创建应以 `Catalog` 错误拒绝。

use async_trait::async_trait;

use crate::models::{Category, EpisodeDraft, Person, PersonRole, Video, VideoDraft, VideoPatch};
use crate::CrawlerResult;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// 按资源站ID + 外部ID精确查找
    async fn find_by_external_id(
        &self,
        source_id: i64,
        external_id: &str,
    ) -> CrawlerResult<Option<Video>>;

    /// 按标题模糊查找
    ///
    /// 计算标题与片库中每个标题的综合相似度，取最大值，
    /// 不低于 `threshold_percent`（0-100）时返回该视频。
    async fn find_similar(&self, title: &str, threshold_percent: f64)
        -> CrawlerResult<Option<Video>>;

    async fn create(&self, draft: VideoDraft) -> CrawlerResult<Video>;

    async fn update(&self, id: i64, patch: VideoPatch) -> CrawlerResult<Video>;

    /// 整体替换视频的剧集列表（先删后插）
    async fn replace_episodes(&self, video_id: i64, episodes: &[EpisodeDraft]) -> CrawlerResult<()>;

    async fn find_or_create_person(&self, name: &str, role: PersonRole) -> CrawlerResult<Person>;

    async fn find_or_create_category(&self, name: &str) -> CrawlerResult<Category>;
}
