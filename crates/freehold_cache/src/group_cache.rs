//! Group cache.
//!
//! Snapshot-swapped like the region cache, minus derived structures: groups
//! have no spatial footprint, so flat indices are the whole story. Records
//! whose owning region is not served by this shard's region cache are
//! silently skipped.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use freehold_storage::GroupStore;
use freehold_types::{Group, GroupId, RegionId};

use crate::error::CacheResult;
use crate::region_cache::RegionCache;
use crate::slot::Slot;

/// One generation of the group indices.
#[derive(Debug, Default)]
struct GroupSnapshot {
    by_id: HashMap<GroupId, Arc<Group>>,
    by_region: HashMap<RegionId, Vec<GroupId>>,
}

impl GroupSnapshot {
    fn from_records(records: Vec<Group>) -> Self {
        let mut snapshot = Self::default();
        for record in records {
            snapshot.link(Arc::new(record));
        }
        snapshot
    }

    fn with_upsert(&self, record: Group) -> Self {
        let mut next = self.clone_maps();
        if let Some(previous) = next.by_id.get(&record.id).cloned() {
            next.unlink(&previous);
        }
        next.link(Arc::new(record));
        next
    }

    fn with_removed(&self, id: GroupId) -> Option<Self> {
        let previous = self.by_id.get(&id)?.clone();
        let mut next = self.clone_maps();
        next.unlink(&previous);
        Some(next)
    }

    fn clone_maps(&self) -> Self {
        Self {
            by_id: self.by_id.clone(),
            by_region: self.by_region.clone(),
        }
    }

    fn link(&mut self, record: Arc<Group>) {
        self.by_region.entry(record.region).or_default().push(record.id);
        self.by_id.insert(record.id, record);
    }

    fn unlink(&mut self, record: &Group) {
        self.by_id.remove(&record.id);
        if let Some(ids) = self.by_region.get_mut(&record.region) {
            ids.retain(|id| *id != record.id);
            if ids.is_empty() {
                self.by_region.remove(&record.region);
            }
        }
    }
}

/// Cache of per-region privilege groups.
pub struct GroupCache {
    store: Arc<dyn GroupStore>,
    regions: Arc<RegionCache>,
    snapshot: Slot<GroupSnapshot>,
    write_gate: Mutex<()>,
}

impl GroupCache {
    pub fn new(store: Arc<dyn GroupStore>, regions: Arc<RegionCache>) -> Self {
        Self {
            store,
            regions,
            snapshot: Slot::new(GroupSnapshot::default()),
            write_gate: Mutex::new(()),
        }
    }

    pub fn get(&self, id: GroupId) -> Option<Arc<Group>> {
        self.snapshot.load().by_id.get(&id).cloned()
    }

    /// Groups defined inside one region.
    pub fn of_region(&self, region: RegionId) -> Vec<Arc<Group>> {
        let snapshot = self.snapshot.load();
        snapshot
            .by_region
            .get(&region)
            .map(|ids| ids.iter().filter_map(|id| snapshot.by_id.get(id)).cloned().collect())
            .unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.snapshot.load().by_id.len()
    }

    /// Re-read all groups, admitting only those whose region this shard
    /// serves.
    pub async fn full_reload(&self) -> CacheResult<usize> {
        let gate = self.write_gate.lock().await;
        let records = self.store.select_all().await?;

        let mut admitted = Vec::new();
        let mut skipped = 0usize;
        for group in records {
            if self.regions.contains(group.region) {
                admitted.push(group);
            } else {
                skipped += 1;
                debug!("Skipping group {} of foreign-shard region {}", group.id, group.region);
            }
        }

        let count = admitted.len();
        self.snapshot.store(GroupSnapshot::from_records(admitted));
        drop(gate);

        info!("👥 Group cache reloaded: {} groups ({} foreign skipped)", count, skipped);
        Ok(count)
    }

    /// Re-read one group and patch the indices. A record that vanished, or
    /// whose region left this shard, is removed instead.
    pub async fn upsert(&self, id: GroupId) -> CacheResult<()> {
        let gate = self.write_gate.lock().await;
        let loaded = self.store.select_by_id(id).await?;
        let current = self.snapshot.load();

        match loaded {
            Some(group) if self.regions.contains(group.region) => {
                self.snapshot.store(current.with_upsert(group));
            }
            Some(group) => {
                debug!("Group {} belongs to foreign-shard region {}, dropping", id, group.region);
                if let Some(next) = current.with_removed(id) {
                    self.snapshot.store(next);
                }
            }
            None => {
                if let Some(next) = current.with_removed(id) {
                    self.snapshot.store(next);
                }
            }
        }
        drop(gate);
        Ok(())
    }

    /// Remove one group from the indices. Returns whether it was present.
    pub async fn remove(&self, id: GroupId) -> bool {
        let _gate = self.write_gate.lock().await;
        let current = self.snapshot.load();
        match current.with_removed(id) {
            Some(next) => {
                self.snapshot.store(next);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region_cache::CacheConfig;
    use freehold_storage::MemoryStore;
    use freehold_types::{CuboidBounds, PlayerId, Region, ShardId, WorldId};

    async fn cache_with_region() -> (Arc<MemoryStore>, Arc<RegionCache>, GroupCache, RegionId) {
        let store = Arc::new(MemoryStore::new());
        let regions = Arc::new(RegionCache::new(store.clone(), CacheConfig::default()));
        let region = store.create_region(Region {
            id: RegionId(0),
            name: "estate".to_string(),
            owner: PlayerId::new(),
            parent: RegionId::NONE,
            world: WorldId::new(),
            shard: ShardId(0),
            bounds: CuboidBounds::new(0, 0, 0, 64, 64, 64),
            color: 0,
            teleport: None,
            enter_message: String::new(),
            leave_message: String::new(),
            environment_flags: Default::default(),
            guest_flags: Default::default(),
            settings: serde_json::Value::Null,
        });
        regions.full_reload().await.unwrap();
        let groups = GroupCache::new(store.clone(), regions.clone());
        (store, regions, groups, region.id)
    }

    fn group(region: RegionId, name: &str) -> Group {
        Group {
            id: GroupId(0),
            region,
            name: name.to_string(),
            flags: Default::default(),
        }
    }

    #[tokio::test]
    async fn upsert_and_remove_round_trip() {
        let (store, regions, groups, region_id) = cache_with_region().await;

        let created = store.create_group(group(region_id, "builders"));
        groups.upsert(created.id).await.unwrap();
        assert_eq!(groups.get(created.id).unwrap().name, "builders");
        assert_eq!(groups.of_region(region_id).len(), 1);

        assert!(groups.remove(created.id).await);
        assert!(groups.get(created.id).is_none());
        assert!(groups.of_region(region_id).is_empty());
        assert!(!groups.remove(created.id).await);
        regions.shutdown();
    }

    #[tokio::test]
    async fn foreign_shard_groups_are_skipped_on_reload() {
        let (store, regions, groups, region_id) = cache_with_region().await;

        store.create_group(group(region_id, "local"));
        // Region 999 is not in the region cache: foreign shard.
        store.create_group(group(RegionId(999), "foreign"));

        let admitted = groups.full_reload().await.unwrap();
        assert_eq!(admitted, 1);
        assert_eq!(groups.count(), 1);
        regions.shutdown();
    }

    #[tokio::test]
    async fn upsert_drops_group_whose_region_left_the_shard() {
        let (store, regions, groups, region_id) = cache_with_region().await;

        let created = store.create_group(group(region_id, "builders"));
        groups.upsert(created.id).await.unwrap();
        assert_eq!(groups.count(), 1);

        // The region disappears from this shard; the next upsert of the
        // group must evict it.
        store.delete_region(region_id);
        regions.full_reload().await.unwrap();
        groups.upsert(created.id).await.unwrap();
        assert_eq!(groups.count(), 0);
        regions.shutdown();
    }
}
