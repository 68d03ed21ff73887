//! The knowledge record and its opaque payload.

use super::handle::KnowledgeHandle;
use crate::error::KnowledgeResult;
use crate::shared::{AgentId, SourceId, Vec3};
use crate::tags::TagSet;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

fn default_relevance() -> f32 {
    1.0
}

/// Hierarchical payload type name (`Job.Harvest` is a `Job`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayloadType(String);

impl PayloadType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when `self` is `base` or derives from it.
    pub fn is_a(&self, base: &PayloadType) -> bool {
        match self.0.strip_prefix(base.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with('.'),
            None => false,
        }
    }
}

impl fmt::Display for PayloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PayloadType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Type-tagged blob. The engine only ever looks at `type_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub type_id: PayloadType,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Payload {
    pub fn new(type_id: impl Into<PayloadType>, data: serde_json::Value) -> Self {
        Self {
            type_id: type_id.into(),
            data,
        }
    }

    /// Serializes a producer's concrete type into a payload.
    pub fn encode<T: Serialize>(type_id: impl Into<PayloadType>, value: &T) -> KnowledgeResult<Self> {
        Ok(Self::new(type_id, serde_json::to_value(value)?))
    }

    /// Decodes back into the consumer's concrete type.
    pub fn decode<T: DeserializeOwned>(&self) -> KnowledgeResult<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// A tagged, located, time-stamped fact.
///
/// `handle` and `timestamp` are owned by the store: whatever the caller puts there is overwritten
/// on register.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    #[serde(default)]
    pub handle: KnowledgeHandle,
    #[serde(default)]
    pub tags: TagSet,
    #[serde(default)]
    pub location: Vec3,
    #[serde(default)]
    pub source: Option<SourceId>,
    /// Caller-assigned, in [0, 1].
    #[serde(default = "default_relevance")]
    pub relevance: f32,
    /// Simulation seconds at creation or last refresh.
    #[serde(default)]
    pub timestamp: f64,
    /// Seconds; 0 never expires.
    #[serde(default)]
    pub lifetime: f32,
    #[serde(default)]
    pub payload: Option<Payload>,
    /// Spatial event radius; 0 uses the configured default.
    #[serde(default)]
    pub broadcast_radius: f32,
    #[serde(default)]
    pub claimed: bool,
    #[serde(default)]
    pub claimed_by: Option<AgentId>,
}

impl Default for KnowledgeRecord {
    fn default() -> Self {
        Self {
            handle: KnowledgeHandle::INVALID,
            tags: TagSet::new(),
            location: Vec3::ZERO,
            source: None,
            relevance: default_relevance(),
            timestamp: 0.0,
            lifetime: 0.0,
            payload: None,
            broadcast_radius: 0.0,
            claimed: false,
            claimed_by: None,
        }
    }
}

impl KnowledgeRecord {
    pub fn new(tags: TagSet, location: Vec3) -> Self {
        Self {
            tags,
            location,
            ..Self::default()
        }
    }

    pub fn with_source(mut self, source: SourceId) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_relevance(mut self, relevance: f32) -> Self {
        self.relevance = relevance;
        self
    }

    pub fn with_lifetime(mut self, seconds: f32) -> Self {
        self.lifetime = seconds;
        self
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_broadcast_radius(mut self, radius: f32) -> Self {
        self.broadcast_radius = radius;
        self
    }

    pub fn age(&self, now: f64) -> f64 {
        now - self.timestamp
    }

    pub fn is_expired(&self, now: f64) -> bool {
        self.lifetime > 0.0 && self.age(now) >= f64::from(self.lifetime)
    }

    pub fn payload_type(&self) -> Option<&PayloadType> {
        self.payload.as_ref().map(|p| &p.type_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct HarvestJob {
        crop: String,
        workers: u8,
    }

    #[test]
    fn payload_type_hierarchy() {
        let job = PayloadType::new("Job.Harvest");
        assert!(job.is_a(&"Job".into()));
        assert!(!job.is_a(&"Jo".into()));
        assert!(!PayloadType::new("Job").is_a(&job));
    }

    #[test]
    fn payload_encode_decode() {
        let job = HarvestJob {
            crop: "wheat".into(),
            workers: 3,
        };
        let payload = Payload::encode("Job.Harvest", &job).expect("encode");
        let back: HarvestJob = payload.decode().expect("decode");
        assert_eq!(back, job);
        assert!(payload.decode::<Vec<u8>>().is_err());
    }

    #[test]
    fn lifetime_zero_never_expires() {
        let rec = KnowledgeRecord::default();
        assert!(!rec.is_expired(1.0e12));
        let rec = rec.with_lifetime(10.0);
        assert!(!rec.is_expired(9.9));
        assert!(rec.is_expired(10.0));
    }
}
