pub mod adapter;
pub mod catalog;
pub mod log_sink;
pub mod repository;
pub mod task_executor;

pub use adapter::*;
pub use catalog::*;
pub use log_sink::*;
pub use repository::*;
pub use task_executor::*;
