use std::collections::HashMap;
use std::sync::Arc;

use crawler_core::config::CrawlerConfig;
use crawler_core::models::Source;
use crawler_core::traits::SourceAdapter;
use crawler_core::{CrawlerError, CrawlerResult};

use super::maccms::MacCmsAdapter;

/// 已解析的适配器及其资源站地址
#[derive(Clone)]
pub struct ResolvedAdapter {
    pub adapter: Arc<dyn SourceAdapter>,
    pub base_url: String,
}

/// 按适配器类型（不区分大小写）查找共享的适配器实例
#[derive(Default, Clone)]
pub struct AdapterFactory {
    adapters: HashMap<String, Arc<dyn SourceAdapter>>,
}

impl AdapterFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册 MacCMS 协议适配器，类型 `nangua` 与 `maccms` 共用一个实例
    pub fn with_http(config: &CrawlerConfig) -> CrawlerResult<Self> {
        let adapter: Arc<dyn SourceAdapter> = Arc::new(MacCmsAdapter::from_config(config)?);
        let mut factory = Self::new();
        factory.register("nangua", adapter.clone());
        factory.register("maccms", adapter);
        Ok(factory)
    }

    pub fn register(&mut self, adapter_type: &str, adapter: Arc<dyn SourceAdapter>) {
        self.adapters
            .insert(adapter_type.trim().to_lowercase(), adapter);
    }

    pub fn get(&self, adapter_type: &str) -> CrawlerResult<Arc<dyn SourceAdapter>> {
        self.adapters
            .get(&adapter_type.trim().to_lowercase())
            .cloned()
            .ok_or_else(|| CrawlerError::UnsupportedAdapter(adapter_type.to_string()))
    }

    /// 为资源站解析适配器
    ///
    /// # 错误
    ///
    /// * `SourceInactive` - 资源站已停用
    /// * `UnsupportedAdapter` - 未注册的适配器类型
    pub fn resolve(&self, source: &Source) -> CrawlerResult<ResolvedAdapter> {
        if !source.is_active() {
            return Err(CrawlerError::SourceInactive { id: source.id });
        }
        Ok(ResolvedAdapter {
            adapter: self.get(&source.adapter_type)?,
            base_url: source.base_url.trim().to_string(),
        })
    }

    pub fn supported_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.adapters.keys().cloned().collect();
        types.sort();
        types
    }
}
