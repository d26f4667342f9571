pub mod metrics_collector;
pub mod structured_logger;

pub use metrics_collector::CrawlMetrics;
pub use structured_logger::StructuredLogger;
