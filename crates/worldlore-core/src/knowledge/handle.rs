use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a knowledge record. `0` is the invalid sentinel.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct KnowledgeHandle(u32);

impl KnowledgeHandle {
    pub const INVALID: KnowledgeHandle = KnowledgeHandle(0);

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for KnowledgeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "knowledge#{}", self.0)
    }
}

/// Monotonic, never-recycling handle source. One per store.
#[derive(Debug)]
pub struct HandleAllocator {
    next: u32,
}

impl Default for HandleAllocator {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl HandleAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next unused handle, or [`KnowledgeHandle::INVALID`] once the 32-bit space is exhausted.
    pub fn allocate(&mut self) -> KnowledgeHandle {
        if self.next == 0 {
            return KnowledgeHandle::INVALID;
        }
        let handle = KnowledgeHandle(self.next);
        self.next = match self.next.checked_add(1) {
            Some(n) => n,
            None => {
                tracing::warn!(target: "worldlore::knowledge", "knowledge handle space exhausted");
                0
            }
        };
        handle
    }

    /// Number of handles handed out so far.
    pub fn issued(&self) -> u32 {
        if self.next == 0 {
            u32::MAX
        } else {
            self.next - 1
        }
    }

    #[cfg(test)]
    pub(crate) fn starting_at(next: u32) -> Self {
        Self { next }
    }
}
