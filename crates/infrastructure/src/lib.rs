pub mod adapters;
pub mod alert;
pub mod catalog;
pub mod database;
pub mod observability;

pub use adapters::{AdapterFactory, MacCmsAdapter, ResolvedAdapter};
pub use alert::TracingAlertNotifier;
pub use catalog::InMemoryCatalog;
pub use database::*;
pub use observability::{CrawlMetrics, StructuredLogger};
