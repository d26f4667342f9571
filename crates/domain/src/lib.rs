pub mod context;
pub mod filters;
pub mod matcher;
pub mod playlist;
pub mod similarity;
pub mod tags;
pub mod transform;

#[cfg(test)]
pub(crate) mod test_support;

pub use context::{EngineDefaults, TaskContext};
pub use filters::RecordFilter;
pub use matcher::{Reconciler, REASON_NO_CHANGES, REASON_UPDATE_DISABLED};
pub use playlist::{ParsedPlaylist, PlaylistParser};
pub use similarity::TitleSimilarity;
pub use tags::{Tag, TagDeduplicator, TagMerge, DEFAULT_TAG_THRESHOLD};
pub use transform::{RecordTransformer, TransformedRecord};
