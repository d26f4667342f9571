//! # Crawler Testing Utils
//!
//! 各 crate 共用的测试工具：协作方接口的内存替身与测试数据构造器。
//!
//! ```toml
//! [dev-dependencies]
//! crawler-testing-utils = { path = "../testing-utils" }
//! ```

pub mod builders;
pub mod helpers;
pub mod mocks;

pub use builders::*;
pub use helpers::*;
pub use mocks::*;
