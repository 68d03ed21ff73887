//! Knowledge storage: records, the handle allocator, the tag/spatial/source indices, the store
//! that keeps them consistent, advertisement claims and expiration.

mod advertisement;
mod expiration;
mod handle;
mod record;
mod source_index;
mod spatial;
mod store;
mod tag_index;

pub use expiration::ExpirationSweeper;
pub use handle::{HandleAllocator, KnowledgeHandle};
pub use record::{KnowledgeRecord, Payload, PayloadType};
pub use source_index::SourceIndex;
pub use spatial::{CellCoord, SpatialEntry, SpatialIndex};
pub use store::KnowledgeStore;
pub use tag_index::TagIndex;

pub(crate) use store::clamp_unit;
