//! Change notifications on two channels.
//!
//! * **Global**: every global subscriber sees every event its [`EventFilter`] accepts.
//! * **Spatial**: for events with a non-zero location, the [`EndpointDirectory`] is asked which
//!   endpoints are within the event radius; only subscribers bound to those endpoints hear it.
//!
//! Events are snapshots (handle, tags, location) taken at mutation time. Listeners run
//! synchronously inside the mutating call and cannot reach back into the store.

use crate::knowledge::{KnowledgeHandle, KnowledgeRecord};
use crate::shared::{AgentId, EndpointId, SourceId, Vec3};
use crate::tags::{TagQuery, TagSet};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeEventKind {
    Registered,
    Updated,
    Removed,
    AdvertisementPosted,
    AdvertisementClaimed,
    AdvertisementCompleted,
}

impl fmt::Display for KnowledgeEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Registered => "registered",
            Self::Updated => "updated",
            Self::Removed => "removed",
            Self::AdvertisementPosted => "advertisement_posted",
            Self::AdvertisementClaimed => "advertisement_claimed",
            Self::AdvertisementCompleted => "advertisement_completed",
        };
        f.write_str(s)
    }
}

/// Snapshot of a record at the moment it changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeEvent {
    pub kind: KnowledgeEventKind,
    pub handle: KnowledgeHandle,
    pub tags: TagSet,
    pub location: Vec3,
    /// Effective spatial radius (record override or configured default).
    pub radius: f32,
    pub source: Option<SourceId>,
    pub claimed_by: Option<AgentId>,
}

impl KnowledgeEvent {
    pub fn from_record(kind: KnowledgeEventKind, record: &KnowledgeRecord) -> Self {
        Self {
            kind,
            handle: record.handle,
            tags: record.tags.clone(),
            location: record.location,
            radius: record.broadcast_radius,
            source: record.source,
            claimed_by: record.claimed_by,
        }
    }
}

/// Receiver of knowledge events. Closures `FnMut(&KnowledgeEvent) + Send` implement it.
pub trait KnowledgeListener: Send {
    fn on_event(&mut self, event: &KnowledgeEvent);
}

impl<F> KnowledgeListener for F
where
    F: FnMut(&KnowledgeEvent) + Send,
{
    fn on_event(&mut self, event: &KnowledgeEvent) {
        self(event)
    }
}

/// Which events a subscription wants. Empty `kinds` accepts every kind; an empty tag query
/// accepts every tag set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventFilter {
    #[serde(default)]
    pub kinds: Vec<KnowledgeEventKind>,
    #[serde(default)]
    pub tags: TagQuery,
}

impl EventFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn kinds(kinds: impl IntoIterator<Item = KnowledgeEventKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
            tags: TagQuery::Empty,
        }
    }

    pub fn with_tags(mut self, tags: TagQuery) -> Self {
        self.tags = tags;
        self
    }

    pub fn accepts(&self, event: &KnowledgeEvent) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&event.kind) {
            return false;
        }
        self.tags.is_empty() || self.tags.matches(&event.tags)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

/// Position directory for spatial delivery: which endpoints are near a point.
pub trait EndpointDirectory: Send + Sync {
    fn endpoints_within(&self, location: Vec3, radius: f32) -> Vec<EndpointId>;
}

/// Simple in-memory [`EndpointDirectory`] the host keeps up to date with agent positions.
#[derive(Debug, Default)]
pub struct EndpointPositions {
    positions: RwLock<HashMap<EndpointId, Vec3>>,
}

impl EndpointPositions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_position(&self, endpoint: EndpointId, location: Vec3) {
        let mut map = self.positions.write().unwrap_or_else(|e| e.into_inner());
        map.insert(endpoint, location);
    }

    pub fn remove(&self, endpoint: EndpointId) {
        let mut map = self.positions.write().unwrap_or_else(|e| e.into_inner());
        map.remove(&endpoint);
    }
}

impl EndpointDirectory for EndpointPositions {
    fn endpoints_within(&self, location: Vec3, radius: f32) -> Vec<EndpointId> {
        let r_sq = radius * radius;
        let map = self.positions.read().unwrap_or_else(|e| e.into_inner());
        map.iter()
            .filter(|(_, pos)| pos.distance_squared(location) <= r_sq)
            .map(|(id, _)| *id)
            .collect()
    }
}

struct Subscription {
    id: ListenerId,
    filter: EventFilter,
    listener: Box<dyn KnowledgeListener>,
}

struct SpatialSubscription {
    endpoint: EndpointId,
    sub: Subscription,
}

/// Listener registry plus the two delivery channels.
pub struct EventBroadcaster {
    global: Vec<Subscription>,
    spatial: Vec<SpatialSubscription>,
    directory: Option<Arc<dyn EndpointDirectory>>,
    default_radius: f32,
    global_enabled: bool,
    spatial_enabled: bool,
    next_id: u64,
}

impl fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("global_listeners", &self.global.len())
            .field("spatial_listeners", &self.spatial.len())
            .field("has_directory", &self.directory.is_some())
            .field("default_radius", &self.default_radius)
            .finish()
    }
}

impl EventBroadcaster {
    pub fn new(default_radius: f32, global_enabled: bool, spatial_enabled: bool) -> Self {
        Self {
            global: Vec::new(),
            spatial: Vec::new(),
            directory: None,
            default_radius,
            global_enabled,
            spatial_enabled,
            next_id: 1,
        }
    }

    pub fn set_directory(&mut self, directory: Arc<dyn EndpointDirectory>) {
        self.directory = Some(directory);
    }

    pub fn subscribe(
        &mut self,
        filter: EventFilter,
        listener: Box<dyn KnowledgeListener>,
    ) -> ListenerId {
        let id = self.next_listener_id();
        self.global.push(Subscription {
            id,
            filter,
            listener,
        });
        tracing::debug!(target: "worldlore::events", listener = %id, "global listener subscribed");
        id
    }

    pub fn subscribe_spatial(
        &mut self,
        endpoint: EndpointId,
        filter: EventFilter,
        listener: Box<dyn KnowledgeListener>,
    ) -> ListenerId {
        let id = self.next_listener_id();
        self.spatial.push(SpatialSubscription {
            endpoint,
            sub: Subscription {
                id,
                filter,
                listener,
            },
        });
        tracing::debug!(
            target: "worldlore::events",
            listener = %id,
            endpoint = %endpoint,
            "spatial listener subscribed"
        );
        id
    }

    /// Removes a listener from whichever channel holds it. Returns false for unknown ids.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.global.len() + self.spatial.len();
        self.global.retain(|s| s.id != id);
        self.spatial.retain(|s| s.sub.id != id);
        before != self.global.len() + self.spatial.len()
    }

    pub fn listener_count(&self) -> usize {
        self.global.len() + self.spatial.len()
    }

    /// Resolves the effective radius, then delivers on both channels.
    pub fn broadcast(&mut self, mut event: KnowledgeEvent) {
        if !(event.radius > 0.0) {
            event.radius = self.default_radius;
        }

        if self.global_enabled {
            for sub in &mut self.global {
                if sub.filter.accepts(&event) {
                    sub.listener.on_event(&event);
                }
            }
        }

        if !self.spatial_enabled || self.spatial.is_empty() || event.location.is_zero() {
            return;
        }
        let Some(directory) = &self.directory else {
            return;
        };
        let nearby: HashSet<EndpointId> = directory
            .endpoints_within(event.location, event.radius)
            .into_iter()
            .collect();
        if nearby.is_empty() {
            return;
        }
        for sub in &mut self.spatial {
            if nearby.contains(&sub.endpoint) && sub.sub.filter.accepts(&event) {
                sub.sub.listener.on_event(&event);
            }
        }
    }

    fn next_listener_id(&mut self) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn event(kind: KnowledgeEventKind, tags: &[&str], location: Vec3) -> KnowledgeEvent {
        KnowledgeEvent {
            kind,
            handle: KnowledgeHandle::from_raw(1),
            tags: tags.iter().copied().collect(),
            location,
            radius: 0.0,
            source: None,
            claimed_by: None,
        }
    }

    #[test]
    fn filter_checks_kind_then_tags() {
        let filter = EventFilter::kinds([KnowledgeEventKind::Removed])
            .with_tags(TagQuery::tag("Resource"));
        assert!(filter.accepts(&event(KnowledgeEventKind::Removed, &["Resource.Iron"], Vec3::ZERO)));
        assert!(!filter.accepts(&event(KnowledgeEventKind::Updated, &["Resource.Iron"], Vec3::ZERO)));
        assert!(!filter.accepts(&event(KnowledgeEventKind::Removed, &["Event"], Vec3::ZERO)));
    }

    #[test]
    fn zero_radius_falls_back_to_default() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut bus = EventBroadcaster::new(750.0, true, false);
        bus.subscribe(
            EventFilter::all(),
            Box::new(move |e: &KnowledgeEvent| sink.lock().unwrap().push(e.radius)),
        );
        bus.broadcast(event(KnowledgeEventKind::Registered, &[], Vec3::ZERO));
        assert_eq!(*seen.lock().unwrap(), vec![750.0]);
    }

    #[test]
    fn unsubscribe_unknown_id_is_false() {
        let mut bus = EventBroadcaster::new(1.0, true, true);
        let id = bus.subscribe(EventFilter::all(), Box::new(|_: &KnowledgeEvent| {}));
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(bus.listener_count(), 0);
    }
}
