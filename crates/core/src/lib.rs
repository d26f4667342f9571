pub mod config;
pub mod errors;
pub mod models;
pub mod schedule;
pub mod traits;

pub use config::AppConfig;
pub use errors::*;
pub use models::*;
pub use schedule::{normalize_cron_expression, parse_cron_expression};
pub use traits::*;
