//! MacCMS 协议资源站适配器
//!
//! ```text
//! GET {base}?ac=detail&pg=1[&t=分类][&h=小时][&wd=关键词]   分页详情
//! GET {base}?ac=detail&ids=1,2                              指定ID详情
//! GET {base}?ac=list                                        分类树
//! ```

use std::time::Duration;

use async_trait::async_trait;
use crawler_core::config::CrawlerConfig;
use crawler_core::models::{CategoryNode, ListFilters, PageResult, RawRecord, VendorEnvelope};
use crawler_core::traits::SourceAdapter;
use crawler_core::{CrawlerError, CrawlerResult};
use tracing::{debug, instrument};

pub const MACCMS_ADAPTER_TYPE: &str = "maccms";

/// 只持有不可变的 HTTP 客户端，可在并发任务间共享
pub struct MacCmsAdapter {
    client: reqwest::Client,
}

impl MacCmsAdapter {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn from_config(config: &CrawlerConfig) -> CrawlerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| CrawlerError::Configuration(format!("创建HTTP客户端失败: {e}")))?;
        Ok(Self::new(client))
    }

    /// 解析列表信封
    pub fn parse_envelope(body: &str) -> CrawlerResult<VendorEnvelope> {
        serde_json::from_str(body).map_err(|e| CrawlerError::Decode(format!("解析资源站响应失败: {e}")))
    }

    async fn get(&self, base_url: &str, query: &[(&str, String)]) -> CrawlerResult<VendorEnvelope> {
        let response = self
            .client
            .get(base_url)
            .query(query)
            .send()
            .await
            .map_err(|e| CrawlerError::Network(format!("请求资源站失败: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlerError::Network(format!(
                "资源站返回异常状态码: {}",
                status.as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CrawlerError::Network(format!("读取资源站响应失败: {e}")))?;
        Self::parse_envelope(&body)
    }
}

#[async_trait]
impl SourceAdapter for MacCmsAdapter {
    fn adapter_type(&self) -> &str {
        MACCMS_ADAPTER_TYPE
    }

    #[instrument(skip(self, filters), fields(base_url = %base_url, page = page))]
    async fn fetch_list(
        &self,
        base_url: &str,
        page: u32,
        filters: &ListFilters,
    ) -> CrawlerResult<PageResult> {
        let mut query = vec![("ac", "detail".to_string()), ("pg", page.max(1).to_string())];
        if let Some(type_id) = &filters.type_id {
            query.push(("t", type_id.clone()));
        }
        if let Some(hours) = filters.hours {
            query.push(("h", hours.to_string()));
        }
        if let Some(keyword) = &filters.keyword {
            query.push(("wd", keyword.clone()));
        }

        let page_result = PageResult::from(self.get(base_url, &query).await?);
        debug!(
            "拉取列表成功: 第{}页, 本页{}条, 共{}条",
            page_result.page,
            page_result.records.len(),
            page_result.total
        );
        Ok(page_result)
    }

    #[instrument(skip(self, ids), fields(base_url = %base_url, count = ids.len()))]
    async fn fetch_details(&self, base_url: &str, ids: &[String]) -> CrawlerResult<Vec<RawRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = [("ac", "detail".to_string()), ("ids", ids.join(","))];
        Ok(self.get(base_url, &query).await?.list)
    }

    async fn fetch_categories(&self, base_url: &str) -> CrawlerResult<Vec<CategoryNode>> {
        let query = [("ac", "list".to_string())];
        Ok(self.get(base_url, &query).await?.class)
    }
}
