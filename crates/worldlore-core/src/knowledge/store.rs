//! The authoritative handle → record map and its derived indices.
//!
//! Every mutation goes through [`KnowledgeStore`], which keeps the tag, spatial and source
//! indices in step with the records and raises change events. Mutations keyed by a handle that is
//! no longer present are silent no-ops: handles routinely outlive their records.

use super::expiration::ExpirationSweeper;
use super::handle::{HandleAllocator, KnowledgeHandle};
use super::record::{KnowledgeRecord, Payload};
use super::source_index::SourceIndex;
use super::spatial::SpatialIndex;
use super::tag_index::TagIndex;
use crate::config::KnowledgeConfig;
use crate::error::{KnowledgeError, KnowledgeResult};
use crate::events::{
    EndpointDirectory, EventBroadcaster, EventFilter, KnowledgeEvent, KnowledgeEventKind,
    KnowledgeListener, ListenerId,
};
use crate::query::FieldSampler;
use crate::shared::{Clock, EndpointId, SourceId, Vec3};
use crate::tags::{Tag, TagQuery, TagSet};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub struct KnowledgeStore {
    pub(crate) records: HashMap<KnowledgeHandle, KnowledgeRecord>,
    pub(crate) tag_index: TagIndex,
    pub(crate) spatial: SpatialIndex,
    pub(crate) sources: SourceIndex,
    pub(crate) sweeper: ExpirationSweeper,
    pub(crate) field_sampler: Option<Arc<dyn FieldSampler>>,
    allocator: HandleAllocator,
    events: EventBroadcaster,
    clock: Arc<dyn Clock>,
    config: KnowledgeConfig,
}

impl fmt::Debug for KnowledgeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnowledgeStore")
            .field("records", &self.records.len())
            .field("tags", &self.tag_index.tag_count())
            .field("cells", &self.spatial.occupied_cells())
            .field("events", &self.events)
            .field("config", &self.config)
            .finish()
    }
}

impl KnowledgeStore {
    pub fn new(config: KnowledgeConfig, clock: Arc<dyn Clock>) -> Self {
        let config = config.sanitized();
        Self {
            records: HashMap::new(),
            tag_index: TagIndex::new(),
            spatial: SpatialIndex::new(config.spatial_cell_size),
            sources: SourceIndex::new(),
            sweeper: ExpirationSweeper::new(config.expiration_interval_secs),
            field_sampler: None,
            allocator: HandleAllocator::new(),
            events: EventBroadcaster::new(
                config.default_broadcast_radius,
                config.broadcast_global,
                config.broadcast_spatial,
            ),
            clock,
            config,
        }
    }

    pub fn with_field_sampler(mut self, sampler: Arc<dyn FieldSampler>) -> Self {
        self.field_sampler = Some(sampler);
        self
    }

    pub fn with_endpoint_directory(mut self, directory: Arc<dyn EndpointDirectory>) -> Self {
        self.events.set_directory(directory);
        self
    }

    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }

    /// Current simulation time from the injected clock.
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Stores a new record and returns its handle. Handle and timestamp are assigned here;
    /// relevance is clamped to [0, 1]. Returns [`KnowledgeHandle::INVALID`] only when the handle
    /// space is exhausted.
    pub fn register(&mut self, mut record: KnowledgeRecord) -> KnowledgeHandle {
        let handle = self.allocator.allocate();
        if !handle.is_valid() {
            tracing::warn!(
                target: "worldlore::knowledge",
                tags = %record.tags,
                "register dropped: no handles left"
            );
            return KnowledgeHandle::INVALID;
        }
        record.handle = handle;
        record.timestamp = self.now();
        record.relevance = clamp_unit(record.relevance);

        self.tag_index.add(handle, &record.tags);
        self.spatial.insert(handle, record.location);
        if let Some(source) = record.source {
            self.sources.add(source, handle);
        }
        tracing::debug!(
            target: "worldlore::knowledge",
            handle = %handle,
            tags = %record.tags,
            location = %record.location,
            "knowledge registered"
        );
        let event = KnowledgeEvent::from_record(KnowledgeEventKind::Registered, &record);
        self.records.insert(handle, record);
        self.events.broadcast(event);
        handle
    }

    pub fn register_batch<I>(&mut self, records: I) -> Vec<KnowledgeHandle>
    where
        I: IntoIterator<Item = KnowledgeRecord>,
    {
        records.into_iter().map(|r| self.register(r)).collect()
    }

    /// Replaces a record's content. Only the dimensions that changed are re-indexed. Claim state
    /// and timestamp are kept, so an update never extends a record's lifetime.
    pub fn update(&mut self, handle: KnowledgeHandle, mut replacement: KnowledgeRecord) -> bool {
        let Some(existing) = self.records.get_mut(&handle) else {
            return false;
        };

        if existing.tags != replacement.tags {
            self.tag_index
                .replace(handle, &existing.tags, &replacement.tags);
        }
        if existing.location != replacement.location {
            self.spatial
                .move_entry(handle, existing.location, replacement.location);
        }
        if existing.source != replacement.source {
            if let Some(old) = existing.source {
                self.sources.remove(old, handle);
            }
            if let Some(new) = replacement.source {
                self.sources.add(new, handle);
            }
        }

        replacement.handle = handle;
        replacement.timestamp = existing.timestamp;
        replacement.relevance = clamp_unit(replacement.relevance);
        replacement.claimed = existing.claimed;
        replacement.claimed_by = existing.claimed_by;
        *existing = replacement;

        tracing::debug!(target: "worldlore::knowledge", handle = %handle, "knowledge updated");
        let event = KnowledgeEvent::from_record(KnowledgeEventKind::Updated, existing);
        self.events.broadcast(event);
        true
    }

    /// Drops a record from every index, then from the store, and raises `Removed`.
    pub fn remove(&mut self, handle: KnowledgeHandle) -> bool {
        let Some(record) = self.records.get(&handle) else {
            return false;
        };
        self.tag_index.remove(handle, &record.tags);
        self.spatial.remove(handle, record.location);
        if let Some(source) = record.source {
            self.sources.remove(source, handle);
        }
        let Some(record) = self.records.remove(&handle) else {
            return false;
        };
        tracing::debug!(target: "worldlore::knowledge", handle = %handle, "knowledge removed");
        self.events
            .broadcast(KnowledgeEvent::from_record(KnowledgeEventKind::Removed, &record));
        true
    }

    /// Removes everything a producer authored. Each removal raises its own `Removed` event.
    pub fn remove_by_source(&mut self, source: SourceId) -> usize {
        let handles = self.sources.handles(source);
        let removed = handles.iter().filter(|h| self.remove(**h)).count();
        self.sources.drop_source(source);
        if removed > 0 {
            tracing::debug!(
                target: "worldlore::knowledge",
                source = %source,
                removed,
                "knowledge removed by source"
            );
        }
        removed
    }

    /// Sets relevance (clamped) and re-stamps the timestamp. No re-index, no event.
    pub fn refresh_relevance(&mut self, handle: KnowledgeHandle, relevance: f32) -> bool {
        let now = self.now();
        let Some(record) = self.records.get_mut(&handle) else {
            return false;
        };
        record.relevance = clamp_unit(relevance);
        record.timestamp = now;
        true
    }

    // -------------------------------------------------------------------------
    // Tag / payload mutation
    // -------------------------------------------------------------------------

    /// Adds one tag. No-op (false) when the record is missing or already carries the exact tag.
    pub fn add_tag(&mut self, handle: KnowledgeHandle, tag: impl Into<Tag>) -> bool {
        let tag = tag.into();
        let Some(record) = self.records.get_mut(&handle) else {
            return false;
        };
        if !record.tags.insert(tag.clone()) {
            return false;
        }
        self.tag_index.add_tag(handle, &tag);
        let event = KnowledgeEvent::from_record(KnowledgeEventKind::Updated, record);
        self.events.broadcast(event);
        true
    }

    pub fn remove_tag(&mut self, handle: KnowledgeHandle, tag: &Tag) -> bool {
        let Some(record) = self.records.get_mut(&handle) else {
            return false;
        };
        if !record.tags.remove(tag) {
            return false;
        }
        self.tag_index.remove_tag(handle, tag);
        let event = KnowledgeEvent::from_record(KnowledgeEventKind::Updated, record);
        self.events.broadcast(event);
        true
    }

    /// Replaces the whole tag set; the handle's tag-index membership is rebuilt.
    pub fn set_tags(&mut self, handle: KnowledgeHandle, tags: TagSet) -> bool {
        let Some(record) = self.records.get_mut(&handle) else {
            return false;
        };
        self.tag_index.replace(handle, &record.tags, &tags);
        record.tags = tags;
        let event = KnowledgeEvent::from_record(KnowledgeEventKind::Updated, record);
        self.events.broadcast(event);
        true
    }

    pub fn set_payload(&mut self, handle: KnowledgeHandle, payload: Payload) -> bool {
        let now = self.now();
        let Some(record) = self.records.get_mut(&handle) else {
            return false;
        };
        record.payload = Some(payload);
        record.timestamp = now;
        let event = KnowledgeEvent::from_record(KnowledgeEventKind::Updated, record);
        self.events.broadcast(event);
        true
    }

    // -------------------------------------------------------------------------
    // Reads
    // -------------------------------------------------------------------------

    pub fn get(&self, handle: KnowledgeHandle) -> Option<&KnowledgeRecord> {
        self.records.get(&handle)
    }

    pub fn contains(&self, handle: KnowledgeHandle) -> bool {
        self.records.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KnowledgeRecord> {
        self.records.values()
    }

    pub fn handles_by_source(&self, source: SourceId) -> Vec<KnowledgeHandle> {
        self.sources.handles(source)
    }

    /// Handles within `radius` of `center` whose tags satisfy `tags` (empty query: all).
    pub fn query_in_radius(
        &self,
        center: Vec3,
        radius: f32,
        tags: &TagQuery,
    ) -> Vec<KnowledgeHandle> {
        let mut hits = self.spatial.query_sphere(center, radius);
        if !tags.is_empty() {
            hits.retain(|h| self.records.get(h).is_some_and(|r| tags.matches(&r.tags)));
        }
        hits.sort();
        hits
    }

    /// Closest record within `max_radius` matching `tags`. Ties go to the lower handle.
    pub fn find_nearest(
        &self,
        location: Vec3,
        max_radius: f32,
        tags: &TagQuery,
    ) -> Option<KnowledgeHandle> {
        self.spatial
            .query_sphere_with_distance(location, max_radius)
            .into_iter()
            .filter(|(entry, _)| {
                tags.is_empty()
                    || self
                        .records
                        .get(&entry.handle)
                        .is_some_and(|r| tags.matches(&r.tags))
            })
            .min_by(|(a, da), (b, db)| da.total_cmp(db).then(a.handle.cmp(&b.handle)))
            .map(|(entry, _)| entry.handle)
    }

    // -------------------------------------------------------------------------
    // Events
    // -------------------------------------------------------------------------

    pub fn subscribe<L>(&mut self, filter: EventFilter, listener: L) -> ListenerId
    where
        L: KnowledgeListener + 'static,
    {
        self.events.subscribe(filter, Box::new(listener))
    }

    /// Subscribes on the spatial channel as `endpoint`.
    pub fn subscribe_spatial<L>(
        &mut self,
        endpoint: EndpointId,
        filter: EventFilter,
        listener: L,
    ) -> ListenerId
    where
        L: KnowledgeListener + 'static,
    {
        self.events.subscribe_spatial(endpoint, filter, Box::new(listener))
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    pub(crate) fn emit(&mut self, kind: KnowledgeEventKind, handle: KnowledgeHandle) {
        if let Some(record) = self.records.get(&handle) {
            let event = KnowledgeEvent::from_record(kind, record);
            self.events.broadcast(event);
        }
    }

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------

    /// Drops every record and index entry without raising events. Listeners are kept.
    pub fn clear(&mut self) {
        self.records.clear();
        self.tag_index.clear();
        self.spatial.clear();
        self.sources.clear();
    }

    /// Recomputes the tag index from the records.
    pub fn rebuild_tag_index(&mut self) {
        self.tag_index.clear();
        for record in self.records.values() {
            self.tag_index.add(record.handle, &record.tags);
        }
    }

    /// Checks that the tag, spatial and source indices agree with the records in both directions.
    pub fn verify_indices(&self) -> KnowledgeResult<()> {
        for (handle, record) in &self.records {
            for tag in &record.tags {
                if !self.tag_index.contains(tag, *handle) {
                    return Err(KnowledgeError::inconsistency(
                        *handle,
                        format!("missing from tag bucket {tag}"),
                    ));
                }
            }
            match self.spatial.entry_at(*handle, record.location) {
                Some(entry) if entry.location == record.location => {}
                _ => {
                    return Err(KnowledgeError::inconsistency(
                        *handle,
                        format!("not in spatial cell for {}", record.location),
                    ))
                }
            }
            if let Some(source) = record.source {
                if !self.sources.contains(source, *handle) {
                    return Err(KnowledgeError::inconsistency(
                        *handle,
                        format!("missing from source bucket {source}"),
                    ));
                }
            }
        }

        for (tag, handles) in self.tag_index.iter() {
            for handle in handles {
                let carries = self
                    .records
                    .get(handle)
                    .is_some_and(|r| r.tags.contains_exact(tag));
                if !carries {
                    return Err(KnowledgeError::inconsistency(
                        *handle,
                        format!("stale entry in tag bucket {tag}"),
                    ));
                }
            }
        }

        if self.spatial.len() != self.records.len() {
            for entry in self.spatial.iter() {
                if !self.records.contains_key(&entry.handle) {
                    return Err(KnowledgeError::inconsistency(
                        entry.handle,
                        "stale spatial entry",
                    ));
                }
            }
            return Err(KnowledgeError::inconsistency(
                KnowledgeHandle::INVALID,
                format!(
                    "spatial index holds {} entries for {} records",
                    self.spatial.len(),
                    self.records.len()
                ),
            ));
        }

        for (source, handles) in self.sources.iter() {
            for handle in handles {
                let owned = self
                    .records
                    .get(handle)
                    .is_some_and(|r| r.source == Some(*source));
                if !owned {
                    return Err(KnowledgeError::inconsistency(
                        *handle,
                        format!("stale entry in source bucket {source}"),
                    ));
                }
            }
        }
        Ok(())
    }
}

pub(crate) fn clamp_unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::{EntityId, ManualClock};

    fn store() -> KnowledgeStore {
        KnowledgeStore::new(KnowledgeConfig::default(), Arc::new(ManualClock::new(0.0)))
    }

    #[test]
    fn stale_handles_are_noops() {
        let mut store = store();
        let ghost = KnowledgeHandle::from_raw(42);
        assert!(!store.update(ghost, KnowledgeRecord::default()));
        assert!(!store.remove(ghost));
        assert!(!store.refresh_relevance(ghost, 0.5));
        assert!(!store.add_tag(ghost, "A"));
        assert!(!store.set_tags(ghost, TagSet::new()));
        assert!(store.get(ghost).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn update_moves_source_bucket() {
        let mut store = store();
        let rec = KnowledgeRecord::new(TagSet::single("A"), Vec3::ZERO).with_source(EntityId(1));
        let h = store.register(rec.clone());
        assert!(store.update(h, rec.with_source(EntityId(2))));
        assert!(store.handles_by_source(EntityId(1)).is_empty());
        assert_eq!(store.handles_by_source(EntityId(2)), vec![h]);
        store.verify_indices().expect("indices consistent");
    }

    #[test]
    fn verify_detects_a_corrupted_tag_index() {
        let mut store = store();
        let h = store.register(KnowledgeRecord::new(TagSet::single("A"), Vec3::ZERO));
        store.tag_index.remove_tag(h, &Tag::new("A"));
        assert!(matches!(
            store.verify_indices(),
            Err(KnowledgeError::IndexInconsistency { .. })
        ));
        store.rebuild_tag_index();
        store.verify_indices().expect("rebuilt");
    }

    #[test]
    fn clamp_unit_handles_nan() {
        assert_eq!(clamp_unit(f32::NAN), 0.0);
        assert_eq!(clamp_unit(2.0), 1.0);
        assert_eq!(clamp_unit(-1.0), 0.0);
    }
}
