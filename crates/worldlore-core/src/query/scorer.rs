//! [0, 1] scorers combined multiplicatively, each raised to its weight.
//!
//! A weight below 1 softens a scorer (pulls its output toward 1), above 1 sharpens it.
//! `0.5 ^ 0.5 * 0.5 ^ 0.5 = 0.5`, where the unweighted product would be `0.25`.

use super::QueryContext;
use crate::knowledge::{clamp_unit, KnowledgeRecord};
use crate::shared::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

fn default_weight() -> f32 {
    1.0
}

/// External scalar field (influence / heat maps) consulted by [`ScorerKind::InfluenceField`].
pub trait FieldSampler: Send + Sync {
    /// Value of `field`/`channel` at `location`, aggregated over `radius` when it is positive.
    /// `None` when the field has no data there.
    fn sample(&self, field: &str, channel: u32, location: Vec3, radius: f32) -> Option<f32>;
}

/// Open extension point for scorers the built-in kinds don't cover.
pub trait RecordScorer: Send + Sync {
    fn score(&self, record: &KnowledgeRecord, ctx: &QueryContext) -> f32;
}

impl fmt::Debug for dyn RecordScorer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecordScorer")
    }
}

impl<F> RecordScorer for F
where
    F: Fn(&KnowledgeRecord, &QueryContext) -> f32 + Send + Sync,
{
    fn score(&self, record: &KnowledgeRecord, ctx: &QueryContext) -> f32 {
        self(record, ctx)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScorerKind {
    /// `1 - distance / max_distance`, reaching 0 at `max_distance`.
    Distance { max_distance: f32 },
    /// The record's relevance as-is.
    Relevance,
    /// `2^(-age / half_life_secs)`.
    Freshness { half_life_secs: f64 },
    /// Sampled field value at the record's location, normalized by `max_value`, optionally
    /// inverted (for "avoid" queries).
    InfluenceField {
        field: String,
        #[serde(default)]
        channel: u32,
        #[serde(default)]
        sample_radius: f32,
        max_value: f32,
        #[serde(default)]
        invert: bool,
    },
    #[serde(skip)]
    Custom(Arc<dyn RecordScorer>),
}

impl ScorerKind {
    /// Raw score, clamped to [0, 1].
    pub fn score(
        &self,
        record: &KnowledgeRecord,
        ctx: &QueryContext,
        sampler: Option<&dyn FieldSampler>,
    ) -> f32 {
        let raw = match self {
            Self::Distance { max_distance } => {
                let d = record.location.distance(ctx.origin);
                if *max_distance > 0.0 {
                    1.0 - d / max_distance
                } else if d <= 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Self::Relevance => record.relevance,
            Self::Freshness { half_life_secs } => {
                if *half_life_secs > 0.0 {
                    let age = record.age(ctx.current_time).max(0.0);
                    (-age / half_life_secs).exp2() as f32
                } else {
                    1.0
                }
            }
            Self::InfluenceField {
                field,
                channel,
                sample_radius,
                max_value,
                invert,
            } => {
                let value = sampler
                    .and_then(|s| s.sample(field, *channel, record.location, *sample_radius))
                    .unwrap_or(0.0);
                let normalized = if *max_value > 0.0 {
                    clamp_unit(value / max_value)
                } else {
                    clamp_unit(value)
                };
                if *invert {
                    1.0 - normalized
                } else {
                    normalized
                }
            }
            Self::Custom(scorer) => scorer.score(record, ctx),
        };
        clamp_unit(raw)
    }
}

/// A scorer plus its weight exponent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedScorer {
    #[serde(flatten)]
    pub kind: ScorerKind,
    #[serde(default = "default_weight")]
    pub weight: f32,
}

impl WeightedScorer {
    pub fn new(kind: ScorerKind) -> Self {
        Self {
            kind,
            weight: default_weight(),
        }
    }

    pub fn weighted(kind: ScorerKind, weight: f32) -> Self {
        Self { kind, weight }
    }

    pub fn distance(max_distance: f32) -> Self {
        Self::new(ScorerKind::Distance { max_distance })
    }

    pub fn relevance() -> Self {
        Self::new(ScorerKind::Relevance)
    }

    pub fn freshness(half_life_secs: f64) -> Self {
        Self::new(ScorerKind::Freshness { half_life_secs })
    }

    pub fn custom(scorer: impl RecordScorer + 'static) -> Self {
        Self::new(ScorerKind::Custom(Arc::new(scorer)))
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.weight = weight;
        self
    }

    /// `score ^ weight`. Negative or NaN weights count as 0 (the scorer is neutralized).
    pub fn apply(
        &self,
        record: &KnowledgeRecord,
        ctx: &QueryContext,
        sampler: Option<&dyn FieldSampler>,
    ) -> f32 {
        let score = self.kind.score(record, ctx, sampler);
        if self.weight == 1.0 {
            return score;
        }
        let weight = if self.weight > 0.0 { self.weight } else { 0.0 };
        score.powf(weight)
    }
}

/// Product of every weighted score; 1 with no scorers. Always in [0, 1].
pub fn combined_score(
    scorers: &[WeightedScorer],
    record: &KnowledgeRecord,
    ctx: &QueryContext,
    sampler: Option<&dyn FieldSampler>,
) -> f32 {
    let product = scorers
        .iter()
        .map(|s| s.apply(record, ctx, sampler))
        .product::<f32>();
    clamp_unit(product)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::TagSet;

    struct Constant(f32);

    impl FieldSampler for Constant {
        fn sample(&self, _: &str, _: u32, _: Vec3, _: f32) -> Option<f32> {
            Some(self.0)
        }
    }

    fn half() -> WeightedScorer {
        WeightedScorer::custom(|_: &KnowledgeRecord, _: &QueryContext| -> f32 { 0.5 })
    }

    #[test]
    fn weights_soften_the_product() {
        let rec = KnowledgeRecord::default();
        let ctx = QueryContext::new(Vec3::ZERO, 0.0);
        let plain = combined_score(&[half(), half()], &rec, &ctx, None);
        assert!((plain - 0.25).abs() < 1e-6);
        let soft = [half().with_weight(0.5), half().with_weight(0.5)];
        assert!((combined_score(&soft, &rec, &ctx, None) - 0.5).abs() < 1e-6);
        assert_eq!(combined_score(&[], &rec, &ctx, None), 1.0);
    }

    #[test]
    fn distance_falls_off_linearly() {
        let rec = KnowledgeRecord::new(TagSet::new(), Vec3::new(2500.0, 0.0, 0.0));
        let ctx = QueryContext::new(Vec3::ZERO, 0.0);
        let s = WeightedScorer::distance(10000.0).apply(&rec, &ctx, None);
        assert!((s - 0.75).abs() < 1e-6);
        assert_eq!(WeightedScorer::distance(1000.0).apply(&rec, &ctx, None), 0.0);
    }

    #[test]
    fn freshness_halves_each_half_life() {
        let rec = KnowledgeRecord::default();
        let ctx = QueryContext::new(Vec3::ZERO, 120.0);
        let s = WeightedScorer::freshness(60.0).apply(&rec, &ctx, None);
        assert!((s - 0.25).abs() < 1e-6);
    }

    #[test]
    fn influence_field_normalizes_and_inverts() {
        let rec = KnowledgeRecord::default();
        let ctx = QueryContext::new(Vec3::ZERO, 0.0);
        let danger = ScorerKind::InfluenceField {
            field: "danger".into(),
            channel: 0,
            sample_radius: 0.0,
            max_value: 4.0,
            invert: true,
        };
        let sampler = Constant(1.0);
        assert!((danger.score(&rec, &ctx, Some(&sampler)) - 0.75).abs() < 1e-6);
        assert_eq!(danger.score(&rec, &ctx, None), 1.0);
    }

    #[test]
    fn out_of_range_custom_scores_are_clamped() {
        let rec = KnowledgeRecord::default();
        let ctx = QueryContext::new(Vec3::ZERO, 0.0);
        let wild = WeightedScorer::custom(|_: &KnowledgeRecord, _: &QueryContext| -> f32 { 7.0 });
        assert_eq!(wild.apply(&rec, &ctx, None), 1.0);
    }

    #[test]
    fn scorer_parses_with_flattened_kind() {
        let s: WeightedScorer = toml::from_str(
            r#"
            kind = "distance"
            max_distance = 10000.0
            weight = 0.5
            "#,
        )
        .expect("parse scorer");
        assert_eq!(s.weight, 0.5);
        assert!(matches!(s.kind, ScorerKind::Distance { .. }));
    }
}
