pub mod cron_utils;
pub mod scheduler;

pub use cron_utils::CronScheduler;
pub use scheduler::{SweepSummary, TaskScheduler};
