pub mod events;
pub mod runner;

pub use events::ProgressHub;
pub use runner::{CrawlRunner, REASON_NO_CATEGORY};
