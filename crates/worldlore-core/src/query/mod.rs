//! Filter/scorer query engine over a [`KnowledgeStore`](crate::KnowledgeStore).

mod engine;
mod filter;
mod scorer;

pub use engine::{KnowledgeQuery, QueryResult, SelectionMode};
pub use filter::{KnowledgeFilter, RecordPredicate};
pub use scorer::{combined_score, FieldSampler, RecordScorer, ScorerKind, WeightedScorer};

use crate::shared::Vec3;

/// Where and when a query is asked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryContext {
    pub origin: Vec3,
    pub current_time: f64,
}

impl QueryContext {
    pub fn new(origin: Vec3, current_time: f64) -> Self {
        Self {
            origin,
            current_time,
        }
    }
}
