use super::handle::KnowledgeHandle;
use crate::tags::{Tag, TagSet};
use std::collections::{HashMap, HashSet};

/// Derived map tag → handles carrying that exact tag.
#[derive(Debug, Default)]
pub struct TagIndex {
    buckets: HashMap<Tag, HashSet<KnowledgeHandle>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, handle: KnowledgeHandle, tags: &TagSet) {
        for tag in tags {
            self.add_tag(handle, tag);
        }
    }

    pub fn add_tag(&mut self, handle: KnowledgeHandle, tag: &Tag) {
        self.buckets.entry(tag.clone()).or_default().insert(handle);
    }

    pub fn remove(&mut self, handle: KnowledgeHandle, tags: &TagSet) {
        for tag in tags {
            self.remove_tag(handle, tag);
        }
    }

    pub fn remove_tag(&mut self, handle: KnowledgeHandle, tag: &Tag) {
        if let Some(bucket) = self.buckets.get_mut(tag) {
            bucket.remove(&handle);
            if bucket.is_empty() {
                self.buckets.remove(tag);
            }
        }
    }

    /// Full membership swap: out of every old tag, then into every new one.
    pub fn replace(&mut self, handle: KnowledgeHandle, old: &TagSet, new: &TagSet) {
        self.remove(handle, old);
        self.add(handle, new);
    }

    pub fn contains(&self, tag: &Tag, handle: KnowledgeHandle) -> bool {
        self.buckets.get(tag).is_some_and(|b| b.contains(&handle))
    }

    /// Handles carrying any of `keys` or a descendant of one. Tag hierarchy is resolved by
    /// scanning bucket keys, so `Resource` also gathers `Resource.Iron`.
    pub fn candidates(&self, keys: &[Tag]) -> HashSet<KnowledgeHandle> {
        let mut out = HashSet::new();
        for (tag, bucket) in &self.buckets {
            if keys.iter().any(|k| tag.matches(k)) {
                out.extend(bucket.iter().copied());
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Tag, &HashSet<KnowledgeHandle>)> {
        self.buckets.iter()
    }

    pub fn tag_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(n: u32) -> KnowledgeHandle {
        KnowledgeHandle::from_raw(n)
    }

    #[test]
    fn duplicate_insert_is_a_noop_and_empty_buckets_go_away() {
        let mut index = TagIndex::new();
        let tags: TagSet = ["Resource.Iron"].into_iter().collect();
        index.add(h(1), &tags);
        index.add(h(1), &tags);
        assert_eq!(index.candidates(&[Tag::new("Resource.Iron")]).len(), 1);
        index.remove(h(1), &tags);
        assert_eq!(index.tag_count(), 0);
    }

    #[test]
    fn candidates_follow_hierarchy() {
        let mut index = TagIndex::new();
        index.add(h(1), &TagSet::single("Resource.Iron"));
        index.add(h(2), &TagSet::single("Resource.Wood"));
        index.add(h(3), &TagSet::single("Event.Fire"));
        let got = index.candidates(&[Tag::new("Resource")]);
        assert_eq!(got, [h(1), h(2)].into_iter().collect());
    }

    #[test]
    fn replace_moves_membership() {
        let mut index = TagIndex::new();
        let old: TagSet = ["A", "B"].into_iter().collect();
        let new: TagSet = ["B", "C"].into_iter().collect();
        index.add(h(7), &old);
        index.replace(h(7), &old, &new);
        assert!(!index.contains(&Tag::new("A"), h(7)));
        assert!(index.contains(&Tag::new("B"), h(7)));
        assert!(index.contains(&Tag::new("C"), h(7)));
    }
}
