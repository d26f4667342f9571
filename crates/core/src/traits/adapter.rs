//! 资源站适配器接口
//!
//! 适配器只负责和一个第三方聚合接口通信：按页拉取列表、按ID拉取详情、
//! 拉取分类树。它不做任何重试，传输或解析错误原样返回给调用方，
//! 重试策略由任务执行器决定。
//!
//! 每个方法都显式接收 `base_url`，适配器本身不保存“当前资源站”状态，
//! 因此同一个实例可以被多个并发任务共享。

use async_trait::async_trait;

use crate::models::{CategoryNode, ListFilters, PageResult, RawRecord};
use crate::CrawlerResult;

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// 适配器类型标识，例如 "nangua"
    fn adapter_type(&self) -> &str;

    /// 拉取一页列表
    ///
    /// 返回的 [`PageResult`] 同时携带总数、页大小以及资源站内嵌的分类树。
    ///
    /// # 错误
    ///
    /// * `Network` - 请求失败或响应状态码非 2xx
    /// * `Decode` - 响应体不是合法的列表信封
    async fn fetch_list(
        &self,
        base_url: &str,
        page: u32,
        filters: &ListFilters,
    ) -> CrawlerResult<PageResult>;

    /// 按资源站ID批量拉取详情，`ids` 为空时返回空列表
    async fn fetch_details(&self, base_url: &str, ids: &[String]) -> CrawlerResult<Vec<RawRecord>>;

    /// 拉取分类树
    async fn fetch_categories(&self, base_url: &str) -> CrawlerResult<Vec<CategoryNode>>;
}
