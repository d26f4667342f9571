//! 测试辅助函数

use std::time::Duration;

use crawler_core::models::{PageResult, RawRecord};
use tokio::time::sleep;

/// 构造一页列表结果
pub fn page_of(page: u32, page_size: u32, total: u64, records: Vec<RawRecord>) -> PageResult {
    PageResult {
        page,
        page_size,
        total,
        records,
        categories: Vec::new(),
    }
}

/// 在超时前轮询等待条件成立
pub async fn wait_for<F, Fut>(mut condition: F, timeout: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        sleep(Duration::from_millis(20)).await;
    }
    false
}
