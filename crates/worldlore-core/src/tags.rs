//! Hierarchical tags and the boolean tag-expression matcher.
//!
//! Tags are dotted paths (`Resource.Iron`, `Event.Robbery`). A tag *matches* another when it is
//! equal to it or lives underneath it: `Resource.Iron` matches `Resource`, but not the reverse.
//! Tags carry no other semantics here; the engine only asks [`TagQuery::matches`] whether a
//! record's tag set satisfies an expression.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A hierarchical, dot-separated tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    /// Builds a tag, trimming whitespace and stray separators (`" .Resource.Iron. "` → `Resource.Iron`).
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().trim_matches('.').to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty tag is never stored and never matches anything.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
    }

    /// True when `self` equals `parent` or is nested beneath it.
    pub fn matches(&self, parent: &Tag) -> bool {
        if !self.is_valid() || !parent.is_valid() {
            return false;
        }
        match self.0.strip_prefix(parent.as_str()) {
            Some("") => true,
            Some(rest) => rest.starts_with('.'),
            None => false,
        }
    }

    /// The direct parent (`Resource` for `Resource.Iron`), if any.
    pub fn parent(&self) -> Option<Tag> {
        self.0.rsplit_once('.').map(|(head, _)| Tag(head.to_string()))
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Tag {
    fn from(s: &str) -> Self {
        Tag::new(s)
    }
}

impl From<String> for Tag {
    fn from(s: String) -> Self {
        Tag::new(s)
    }
}

/// Unordered set of tags carried by a record (kept sorted for stable output).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeSet<Tag>);

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(tag: impl Into<Tag>) -> Self {
        let mut set = Self::new();
        set.insert(tag);
        set
    }

    /// Inserts a tag; returns false when it was already present (or invalid).
    pub fn insert(&mut self, tag: impl Into<Tag>) -> bool {
        let tag = tag.into();
        if !tag.is_valid() {
            return false;
        }
        self.0.insert(tag)
    }

    pub fn remove(&mut self, tag: &Tag) -> bool {
        self.0.remove(tag)
    }

    pub fn contains_exact(&self, tag: &Tag) -> bool {
        self.0.contains(tag)
    }

    /// True when any carried tag matches `tag` hierarchically.
    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.0.iter().any(|t| t.matches(tag))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tag> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T: Into<Tag>> FromIterator<T> for TagSet {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut set = TagSet::new();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a Tag;
    type IntoIter = std::collections::btree_set::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(Tag::as_str).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// Boolean tag expression evaluated against a record's [`TagSet`].
///
/// `Empty` matches everything. `AnyTags([])` matches nothing; `AllTags([])` and `NoTags([])`
/// match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "args", rename_all = "snake_case")]
pub enum TagQuery {
    #[default]
    Empty,
    AnyTags(Vec<Tag>),
    AllTags(Vec<Tag>),
    NoTags(Vec<Tag>),
    AnyTagsExact(Vec<Tag>),
    AllTagsExact(Vec<Tag>),
    AnyExpr(Vec<TagQuery>),
    AllExpr(Vec<TagQuery>),
    NoExpr(Vec<TagQuery>),
}

impl TagQuery {
    /// Shorthand for a query matching a single tag (hierarchically).
    pub fn tag(tag: impl Into<Tag>) -> Self {
        Self::AnyTags(vec![tag.into()])
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn matches(&self, tags: &TagSet) -> bool {
        match self {
            Self::Empty => true,
            Self::AnyTags(q) => q.iter().any(|t| tags.has_tag(t)),
            Self::AllTags(q) => q.iter().all(|t| tags.has_tag(t)),
            Self::NoTags(q) => !q.iter().any(|t| tags.has_tag(t)),
            Self::AnyTagsExact(q) => q.iter().any(|t| tags.contains_exact(t)),
            Self::AllTagsExact(q) => q.iter().all(|t| tags.contains_exact(t)),
            Self::AnyExpr(q) => q.iter().any(|e| e.matches(tags)),
            Self::AllExpr(q) => q.iter().all(|e| e.matches(tags)),
            Self::NoExpr(q) => !q.iter().any(|e| e.matches(tags)),
        }
    }

    /// Tags of which every matching record must carry at least one (hierarchically).
    ///
    /// Used by the tag index to gather a candidate superset. `None` means the expression is
    /// unbounded (empty, negated, or otherwise not narrowed by any positive tag) and every
    /// record is a candidate.
    pub fn gather_keys(&self) -> Option<Vec<Tag>> {
        match self {
            Self::Empty | Self::NoTags(_) | Self::NoExpr(_) => None,
            Self::AnyTags(q) | Self::AnyTagsExact(q) => Some(q.clone()),
            Self::AllTags(q) | Self::AllTagsExact(q) => q.first().map(|t| vec![t.clone()]),
            Self::AnyExpr(q) => {
                let mut keys = Vec::new();
                for expr in q {
                    keys.extend(expr.gather_keys()?);
                }
                Some(keys)
            }
            Self::AllExpr(q) => q.iter().find_map(TagQuery::gather_keys),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(tags: &[&str]) -> TagSet {
        tags.iter().copied().collect()
    }

    #[test]
    fn child_matches_parent_but_not_reverse() {
        let iron = Tag::new("Resource.Iron");
        let resource = Tag::new("Resource");
        assert!(iron.matches(&resource));
        assert!(iron.matches(&iron));
        assert!(!resource.matches(&iron));
        assert!(!Tag::new("ResourceX").matches(&resource));
        assert_eq!(iron.parent(), Some(resource));
    }

    #[test]
    fn empty_tags_are_rejected() {
        let mut tags = TagSet::new();
        assert!(!tags.insert(""));
        assert!(!tags.insert(" . "));
        assert!(tags.is_empty());
    }

    #[test]
    fn composite_queries() {
        let tags = set(&["Resource.Iron", "Event.Robbery"]);
        assert!(TagQuery::Empty.matches(&tags));
        assert!(TagQuery::tag("Resource").matches(&tags));
        assert!(!TagQuery::AnyTagsExact(vec!["Resource".into()]).matches(&tags));
        assert!(TagQuery::AllTags(vec!["Resource".into(), "Event".into()]).matches(&tags));
        assert!(!TagQuery::NoTags(vec!["Event".into()]).matches(&tags));
        let nested = TagQuery::AllExpr(vec![
            TagQuery::tag("Resource"),
            TagQuery::NoTags(vec!["Resource.Wood".into()]),
        ]);
        assert!(nested.matches(&tags));
        assert!(!TagQuery::AnyTags(vec![]).matches(&tags));
    }

    #[test]
    fn gather_keys_are_a_superset_bound() {
        assert_eq!(TagQuery::Empty.gather_keys(), None);
        assert_eq!(TagQuery::NoTags(vec!["A".into()]).gather_keys(), None);
        assert_eq!(
            TagQuery::AllTags(vec!["A".into(), "B".into()]).gather_keys(),
            Some(vec![Tag::new("A")])
        );
        let any = TagQuery::AnyExpr(vec![TagQuery::tag("A"), TagQuery::Empty]);
        assert_eq!(any.gather_keys(), None);
        let all = TagQuery::AllExpr(vec![TagQuery::Empty, TagQuery::tag("B")]);
        assert_eq!(all.gather_keys(), Some(vec![Tag::new("B")]));
    }

    #[test]
    fn query_round_trips_through_toml() {
        let src = r#"
            op = "all_expr"
            [[args]]
            op = "any_tags"
            args = ["Resource.Iron"]
            [[args]]
            op = "empty"
        "#;
        let q: TagQuery = toml::from_str(src).expect("parse tag query");
        assert!(q.matches(&set(&["Resource.Iron.Ore"])));
    }
}
