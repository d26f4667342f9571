pub mod sqlite_log_store;
pub mod sqlite_source_repository;
pub mod sqlite_task_repository;

pub use sqlite_log_store::SqliteLogStore;
pub use sqlite_source_repository::SqliteSourceRepository;
pub use sqlite_task_repository::SqliteTaskRepository;
