//! Query pipeline: gather → tag re-check → filters → scores → selection.

use super::filter::KnowledgeFilter;
use super::scorer::{combined_score, WeightedScorer};
use super::QueryContext;
use crate::error::KnowledgeResult;
use crate::knowledge::{KnowledgeHandle, KnowledgeRecord, KnowledgeStore};
use crate::tags::TagQuery;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

fn default_max_results() -> usize {
    1
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Single best survivor; ties go to the lower handle.
    #[default]
    HighestScore,
    /// Up to `max_results`, best first.
    TopN,
    /// Up to `max_results` distinct survivors drawn with probability proportional to score.
    RandomWeighted,
}

/// A reusable query definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeQuery {
    #[serde(default)]
    pub tags: TagQuery,
    #[serde(default)]
    pub filters: Vec<KnowledgeFilter>,
    #[serde(default)]
    pub scorers: Vec<WeightedScorer>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub selection: SelectionMode,
}

impl Default for KnowledgeQuery {
    fn default() -> Self {
        Self {
            tags: TagQuery::Empty,
            filters: Vec::new(),
            scorers: Vec::new(),
            max_results: default_max_results(),
            selection: SelectionMode::HighestScore,
        }
    }
}

impl KnowledgeQuery {
    pub fn new(tags: TagQuery) -> Self {
        Self {
            tags,
            ..Self::default()
        }
    }

    pub fn from_toml_str(src: &str) -> KnowledgeResult<Self> {
        Ok(toml::from_str(src)?)
    }

    pub fn filter(mut self, filter: KnowledgeFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn scorer(mut self, scorer: WeightedScorer) -> Self {
        self.scorers.push(scorer);
        self
    }

    pub fn top(mut self, n: usize) -> Self {
        self.selection = SelectionMode::TopN;
        self.max_results = n;
        self
    }

    pub fn random_weighted(mut self, n: usize) -> Self {
        self.selection = SelectionMode::RandomWeighted;
        self.max_results = n;
        self
    }

    /// Smallest positive radius hint among the filters.
    pub fn spatial_radius_hint(&self) -> Option<f32> {
        self.filters
            .iter()
            .map(KnowledgeFilter::spatial_radius_hint)
            .filter(|r| *r > 0.0)
            .min_by(f32::total_cmp)
    }
}

/// A selected record with its combined score.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub handle: KnowledgeHandle,
    pub record: KnowledgeRecord,
    pub score: f32,
}

impl KnowledgeStore {
    /// Query context at `origin`, stamped with the store clock.
    pub fn query_context(&self, origin: crate::shared::Vec3) -> QueryContext {
        QueryContext::new(origin, self.now())
    }

    pub fn query(&self, query: &KnowledgeQuery, ctx: &QueryContext) -> Vec<QueryResult> {
        self.query_with_rng(query, ctx, &mut rand::rng())
    }

    /// Same as [`query`](Self::query), drawing `RandomWeighted` picks from `rng`.
    pub fn query_with_rng<R>(
        &self,
        query: &KnowledgeQuery,
        ctx: &QueryContext,
        rng: &mut R,
    ) -> Vec<QueryResult>
    where
        R: Rng,
    {
        let candidates = self.gather_candidates(&query.tags, ctx, query.spatial_radius_hint());
        let gathered = candidates.len();
        let sampler = self.field_sampler.as_deref();

        let mut survivors: Vec<QueryResult> = candidates
            .into_iter()
            .filter_map(|handle| self.records.get(&handle))
            .filter(|record| query.tags.matches(&record.tags))
            .filter(|record| query.filters.iter().all(|f| f.passes(record, ctx)))
            .filter_map(|record| {
                let score = combined_score(&query.scorers, record, ctx, sampler);
                (score > 0.0).then(|| QueryResult {
                    handle: record.handle,
                    record: record.clone(),
                    score,
                })
            })
            .collect();

        let survived = survivors.len();
        let wanted = query.max_results.max(1);
        let results = match query.selection {
            SelectionMode::HighestScore => {
                rank(&mut survivors);
                survivors.truncate(1);
                survivors
            }
            SelectionMode::TopN => {
                rank(&mut survivors);
                survivors.truncate(wanted);
                survivors
            }
            SelectionMode::RandomWeighted => draw_weighted(survivors, wanted, rng),
        };

        tracing::debug!(
            target: "worldlore::query",
            gathered,
            survived,
            returned = results.len(),
            selection = ?query.selection,
            "knowledge query"
        );
        results
    }

    /// Candidate superset, sorted by handle. With a radius hint the spatial index bounds the
    /// set and is intersected with the tag candidates; without one the tag index alone is used.
    pub(crate) fn gather_candidates(
        &self,
        tags: &TagQuery,
        ctx: &QueryContext,
        radius_hint: Option<f32>,
    ) -> Vec<KnowledgeHandle> {
        let tag_candidates: Option<HashSet<KnowledgeHandle>> = tags
            .gather_keys()
            .map(|keys| self.tag_index.candidates(&keys));

        let mut out: Vec<KnowledgeHandle> = match (radius_hint, tag_candidates) {
            (Some(radius), Some(by_tag)) => self
                .spatial
                .query_sphere(ctx.origin, radius)
                .into_iter()
                .filter(|h| by_tag.contains(h))
                .collect(),
            (Some(radius), None) => self.spatial.query_sphere(ctx.origin, radius),
            (None, Some(by_tag)) => by_tag.into_iter().collect(),
            (None, None) => self.records.keys().copied().collect(),
        };
        out.sort();
        out
    }
}

/// Descending score, then ascending handle.
fn rank(results: &mut [QueryResult]) {
    results.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.handle.cmp(&b.handle)));
}

/// Weighted draw without replacement. Survivors are visited in handle order so a seeded RNG
/// reproduces the same picks.
fn draw_weighted<R>(mut pool: Vec<QueryResult>, count: usize, rng: &mut R) -> Vec<QueryResult>
where
    R: Rng,
{
    pool.sort_by_key(|r| r.handle);
    let count = count.min(pool.len());
    let mut total: f32 = pool.iter().map(|r| r.score).sum();
    let mut picked = Vec::with_capacity(count);

    while picked.len() < count && !pool.is_empty() {
        let mut roll = rng.random::<f32>() * total;
        let mut index = pool.len() - 1;
        for (i, r) in pool.iter().enumerate() {
            roll -= r.score;
            if roll <= 0.0 {
                index = i;
                break;
            }
        }
        let chosen = pool.remove(index);
        total -= chosen.score;
        picked.push(chosen);
    }
    picked
}
