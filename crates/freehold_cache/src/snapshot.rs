//! Flat region indices: the per-generation hash maps answering the cheap
//! key-based lookups (by id, by name, by owner, children-of).
//!
//! A snapshot is immutable once built. The incremental-update path derives a
//! patched copy with [`RegionSnapshot::with_upsert`] /
//! [`RegionSnapshot::with_removed`] and publishes it through the generation
//! slot; the live maps are never touched in place.

use std::collections::HashMap;
use std::sync::Arc;

use freehold_types::{PlayerId, Region, RegionId};

/// One generation of the flat region indices.
#[derive(Debug, Default)]
pub struct RegionSnapshot {
    by_id: HashMap<RegionId, Arc<Region>>,
    by_name: HashMap<String, RegionId>,
    by_owner: HashMap<PlayerId, Vec<RegionId>>,
    children: HashMap<RegionId, Vec<RegionId>>,
}

impl RegionSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Index a full record set, as produced by a reload.
    ///
    /// Sibling order in the children lists follows the input order.
    pub fn from_records(records: Vec<Region>) -> Self {
        let mut snapshot = Self::empty();
        for record in records {
            snapshot.link(Arc::new(record));
        }
        snapshot
    }

    /// Derive a new generation with one record inserted or replaced.
    pub fn with_upsert(&self, record: Region) -> Self {
        let mut next = self.clone_maps();
        if let Some(previous) = next.by_id.get(&record.id).cloned() {
            next.unlink(&previous);
        }
        next.link(Arc::new(record));
        next
    }

    /// Derive a new generation with one record removed.
    ///
    /// Returns `None` when the id is not present, so callers can skip the
    /// publish entirely.
    pub fn with_removed(&self, id: RegionId) -> Option<Self> {
        let previous = self.by_id.get(&id)?.clone();
        let mut next = self.clone_maps();
        next.unlink(&previous);
        Some(next)
    }

    pub fn get(&self, id: RegionId) -> Option<Arc<Region>> {
        self.by_id.get(&id).cloned()
    }

    pub fn get_by_name(&self, name: &str) -> Option<Arc<Region>> {
        self.by_name.get(name).and_then(|id| self.by_id.get(id)).cloned()
    }

    pub fn owned_by(&self, owner: PlayerId) -> Vec<Arc<Region>> {
        self.by_owner
            .get(&owner)
            .map(|ids| ids.iter().filter_map(|id| self.by_id.get(id)).cloned().collect())
            .unwrap_or_default()
    }

    pub fn children_of(&self, parent: RegionId) -> Vec<Arc<Region>> {
        self.children
            .get(&parent)
            .map(|ids| ids.iter().filter_map(|id| self.by_id.get(id)).cloned().collect())
            .unwrap_or_default()
    }

    pub fn all(&self) -> Vec<Arc<Region>> {
        self.by_id.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    fn clone_maps(&self) -> Self {
        Self {
            by_id: self.by_id.clone(),
            by_name: self.by_name.clone(),
            by_owner: self.by_owner.clone(),
            children: self.children.clone(),
        }
    }

    /// Add one record to every index.
    fn link(&mut self, record: Arc<Region>) {
        self.by_name.insert(record.name.clone(), record.id);
        self.by_owner.entry(record.owner).or_default().push(record.id);
        self.children.entry(record.parent).or_default().push(record.id);
        self.by_id.insert(record.id, record);
    }

    /// Strip one record from every index, pruning emptied branches.
    fn unlink(&mut self, record: &Region) {
        self.by_id.remove(&record.id);
        // Only drop the name link if it still points at this record; an
        // upsert that renamed another record onto this name owns it now.
        if self.by_name.get(&record.name) == Some(&record.id) {
            self.by_name.remove(&record.name);
        }
        if let Some(owned) = self.by_owner.get_mut(&record.owner) {
            owned.retain(|id| *id != record.id);
            if owned.is_empty() {
                self.by_owner.remove(&record.owner);
            }
        }
        if let Some(siblings) = self.children.get_mut(&record.parent) {
            siblings.retain(|id| *id != record.id);
            if siblings.is_empty() {
                self.children.remove(&record.parent);
            }
        }
    }
}
