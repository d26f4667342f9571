pub mod factory;
pub mod maccms;

pub use factory::{AdapterFactory, ResolvedAdapter};
pub use maccms::MacCmsAdapter;
