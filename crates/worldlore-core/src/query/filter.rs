//! Binary filters applied to query candidates, in order, stopping at the first rejection.

use super::QueryContext;
use crate::knowledge::{KnowledgeRecord, PayloadType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Open extension point for filters the built-in kinds don't cover.
pub trait RecordPredicate: Send + Sync {
    fn passes(&self, record: &KnowledgeRecord, ctx: &QueryContext) -> bool;

    /// Radius that bounds every record this predicate can accept (0 = no bound).
    fn spatial_radius_hint(&self) -> f32 {
        0.0
    }
}

impl fmt::Debug for dyn RecordPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecordPredicate")
    }
}

impl<F> RecordPredicate for F
where
    F: Fn(&KnowledgeRecord, &QueryContext) -> bool + Send + Sync,
{
    fn passes(&self, record: &KnowledgeRecord, ctx: &QueryContext) -> bool {
        self(record, ctx)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KnowledgeFilter {
    /// Within `max_distance` of the query origin (inclusive). Negative or NaN rejects everything.
    MaxDistance { max_distance: f32 },
    MinRelevance { min_relevance: f32 },
    /// `current_time - timestamp <= max_age_secs`.
    MaxAge { max_age_secs: f64 },
    /// Payload type is `payload_type` or derives from it. `None` accepts everything.
    PayloadTypeMatch {
        #[serde(default)]
        payload_type: Option<PayloadType>,
    },
    NotClaimed,
    #[serde(skip)]
    Custom(Arc<dyn RecordPredicate>),
}

impl KnowledgeFilter {
    pub fn max_distance(max_distance: f32) -> Self {
        Self::MaxDistance { max_distance }
    }

    pub fn min_relevance(min_relevance: f32) -> Self {
        Self::MinRelevance { min_relevance }
    }

    pub fn max_age(max_age_secs: f64) -> Self {
        Self::MaxAge { max_age_secs }
    }

    pub fn payload_type(payload_type: impl Into<PayloadType>) -> Self {
        Self::PayloadTypeMatch {
            payload_type: Some(payload_type.into()),
        }
    }

    pub fn custom(predicate: impl RecordPredicate + 'static) -> Self {
        Self::Custom(Arc::new(predicate))
    }

    pub fn passes(&self, record: &KnowledgeRecord, ctx: &QueryContext) -> bool {
        match self {
            Self::MaxDistance { max_distance } => {
                *max_distance >= 0.0
                    && record.location.distance_squared(ctx.origin) <= max_distance * max_distance
            }
            Self::MinRelevance { min_relevance } => record.relevance >= *min_relevance,
            Self::MaxAge { max_age_secs } => ctx.current_time - record.timestamp <= *max_age_secs,
            Self::PayloadTypeMatch { payload_type } => match payload_type {
                None => true,
                Some(wanted) => record.payload_type().is_some_and(|t| t.is_a(wanted)),
            },
            Self::NotClaimed => !record.claimed,
            Self::Custom(predicate) => predicate.passes(record, ctx),
        }
    }

    /// Positive when the filter can only pass records inside that radius of the origin.
    pub fn spatial_radius_hint(&self) -> f32 {
        match self {
            Self::MaxDistance { max_distance } => *max_distance,
            Self::Custom(predicate) => predicate.spatial_radius_hint(),
            _ => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::Payload;
    use crate::shared::Vec3;
    use crate::tags::TagSet;

    fn ctx() -> QueryContext {
        QueryContext::new(Vec3::ZERO, 100.0)
    }

    #[test]
    fn negative_max_distance_rejects_everything() {
        let at_origin = KnowledgeRecord::default();
        let nearby = KnowledgeRecord {
            location: Vec3::new(3.0, 0.0, 0.0),
            ..KnowledgeRecord::default()
        };
        let filter = KnowledgeFilter::max_distance(-5.0);
        assert!(!filter.passes(&at_origin, &ctx()));
        assert!(!filter.passes(&nearby, &ctx()));
        assert!(!KnowledgeFilter::max_distance(f32::NAN).passes(&at_origin, &ctx()));
        assert!(KnowledgeFilter::max_distance(0.0).passes(&at_origin, &ctx()));
    }

    #[test]
    fn max_age_uses_context_time() {
        let rec = KnowledgeRecord {
            timestamp: 60.0,
            ..KnowledgeRecord::default()
        };
        assert!(KnowledgeFilter::max_age(40.0).passes(&rec, &ctx()));
        assert!(!KnowledgeFilter::max_age(39.0).passes(&rec, &ctx()));
    }

    #[test]
    fn payload_type_accepts_derived_and_none() {
        let rec = KnowledgeRecord::new(TagSet::new(), Vec3::ZERO)
            .with_payload(Payload::new("Job.Harvest", serde_json::Value::Null));
        assert!(KnowledgeFilter::payload_type("Job").passes(&rec, &ctx()));
        assert!(!KnowledgeFilter::payload_type("Trade").passes(&rec, &ctx()));
        let any = KnowledgeFilter::PayloadTypeMatch { payload_type: None };
        assert!(any.passes(&KnowledgeRecord::default(), &ctx()));
        assert!(!KnowledgeFilter::payload_type("Job").passes(&KnowledgeRecord::default(), &ctx()));
    }

    #[test]
    fn only_distance_filters_hint() {
        assert_eq!(KnowledgeFilter::max_distance(250.0).spatial_radius_hint(), 250.0);
        assert_eq!(KnowledgeFilter::NotClaimed.spatial_radius_hint(), 0.0);
        let custom = KnowledgeFilter::custom(|r: &KnowledgeRecord, _: &QueryContext| r.claimed);
        assert_eq!(custom.spatial_radius_hint(), 0.0);
    }

    #[test]
    fn filters_parse_from_toml() {
        #[derive(Deserialize)]
        struct Doc {
            filters: Vec<KnowledgeFilter>,
        }
        let doc: Doc = toml::from_str(
            r#"
            [[filters]]
            kind = "max_distance"
            max_distance = 5000.0
            [[filters]]
            kind = "not_claimed"
            "#,
        )
        .expect("parse filters");
        assert_eq!(doc.filters.len(), 2);
        assert_eq!(doc.filters[0].spatial_radius_hint(), 5000.0);
    }
}
