use super::handle::KnowledgeHandle;
use crate::shared::SourceId;
use std::collections::{HashMap, HashSet};

/// Producer → handles it authored. Only records with a source are tracked.
#[derive(Debug, Default)]
pub struct SourceIndex {
    buckets: HashMap<SourceId, HashSet<KnowledgeHandle>>,
}

impl SourceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, source: SourceId, handle: KnowledgeHandle) {
        self.buckets.entry(source).or_default().insert(handle);
    }

    pub fn remove(&mut self, source: SourceId, handle: KnowledgeHandle) {
        if let Some(bucket) = self.buckets.get_mut(&source) {
            bucket.remove(&handle);
            if bucket.is_empty() {
                self.buckets.remove(&source);
            }
        }
    }

    /// Snapshot of a source's handles, sorted so bulk removal is deterministic.
    pub fn handles(&self, source: SourceId) -> Vec<KnowledgeHandle> {
        let mut out: Vec<_> = self
            .buckets
            .get(&source)
            .map(|b| b.iter().copied().collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    pub fn contains(&self, source: SourceId, handle: KnowledgeHandle) -> bool {
        self.buckets.get(&source).is_some_and(|b| b.contains(&handle))
    }

    pub fn drop_source(&mut self, source: SourceId) {
        self.buckets.remove(&source);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SourceId, &HashSet<KnowledgeHandle>)> {
        self.buckets.iter()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}
