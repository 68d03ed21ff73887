//! worldlore-core: world knowledge index and query engine.
//!
//! Facts about the world (resources, events, capabilities, job advertisements) are stored as
//! tagged, located records. The store keeps a tag index, a spatial grid and a per-producer index
//! in step with every mutation, answers filter/scorer queries, runs advertisement claims, expires
//! stale facts, and broadcasts change events globally and spatially.
//!
//! Everything is synchronous and single-owner: construct one [`KnowledgeStore`] per world and
//! drive it from the simulation thread.

mod config;
mod definition;
mod error;
mod events;
mod knowledge;
mod shared;
pub mod query;
pub mod tags;

pub use config::{KnowledgeConfig, MIN_CELL_SIZE, MIN_EXPIRATION_INTERVAL_SECS};
pub use definition::{EntryDefinition, SeedFile, SeedPlacement};
pub use error::{KnowledgeError, KnowledgeResult};
pub use events::{
    EndpointDirectory, EndpointPositions, EventBroadcaster, EventFilter, KnowledgeEvent,
    KnowledgeEventKind, KnowledgeListener, ListenerId,
};
pub use knowledge::{
    CellCoord, ExpirationSweeper, HandleAllocator, KnowledgeHandle, KnowledgeRecord,
    KnowledgeStore, Payload, PayloadType, SourceIndex, SpatialEntry, SpatialIndex, TagIndex,
};
pub use query::{
    FieldSampler, KnowledgeFilter, KnowledgeQuery, QueryContext, QueryResult, RecordPredicate,
    RecordScorer, ScorerKind, SelectionMode, WeightedScorer,
};
pub use shared::{AgentId, Clock, EndpointId, EntityId, ManualClock, SourceId, SystemClock, Vec3};
pub use tags::{Tag, TagQuery, TagSet};
