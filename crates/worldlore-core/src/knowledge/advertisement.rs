//! Advertisement claims over ordinary records.
//!
//! An advertisement is a record that agents claim, work on, and then complete or cancel.
//! `Unclaimed → Claimed(agent) → (Completed: removed | Cancelled: Unclaimed)`.

use super::handle::KnowledgeHandle;
use super::record::KnowledgeRecord;
use super::store::KnowledgeStore;
use crate::events::KnowledgeEventKind;
use crate::shared::AgentId;

impl KnowledgeStore {
    /// Registers the record and announces it as an advertisement.
    pub fn post(&mut self, record: KnowledgeRecord) -> KnowledgeHandle {
        let handle = self.register(record);
        self.emit(KnowledgeEventKind::AdvertisementPosted, handle);
        handle
    }

    /// Compare-and-set claim: succeeds only when the record exists and is unclaimed.
    pub fn claim(&mut self, handle: KnowledgeHandle, claimant: AgentId) -> bool {
        let Some(record) = self.records.get_mut(&handle) else {
            return false;
        };
        if record.claimed {
            tracing::debug!(
                target: "worldlore::knowledge",
                handle = %handle,
                claimant = %claimant,
                "claim rejected: already claimed"
            );
            return false;
        }
        record.claimed = true;
        record.claimed_by = Some(claimant);
        tracing::debug!(
            target: "worldlore::knowledge",
            handle = %handle,
            claimant = %claimant,
            "advertisement claimed"
        );
        self.emit(KnowledgeEventKind::AdvertisementClaimed, handle);
        true
    }

    /// Finishes an advertisement: `AdvertisementCompleted`, then the record is removed.
    pub fn complete(&mut self, handle: KnowledgeHandle) -> bool {
        if !self.contains(handle) {
            return false;
        }
        self.emit(KnowledgeEventKind::AdvertisementCompleted, handle);
        self.remove(handle)
    }

    /// Releases any claim, whoever holds it. Raises no event.
    pub fn cancel(&mut self, handle: KnowledgeHandle) -> bool {
        let Some(record) = self.records.get_mut(&handle) else {
            return false;
        };
        record.claimed = false;
        record.claimed_by = None;
        true
    }

    pub fn is_claimed(&self, handle: KnowledgeHandle) -> bool {
        self.get(handle).is_some_and(|r| r.claimed)
    }

    pub fn claimant(&self, handle: KnowledgeHandle) -> Option<AgentId> {
        self.get(handle).and_then(|r| r.claimed_by)
    }
}
