//! Membership cache.
//!
//! Beyond the usual by-id table this keeps two query-shaped indices:
//!
//! - player → (region → member): the per-movement-event privilege question
//!   "does this player hold a membership in this region" in O(1), and
//! - group → member ids: kept in sync with membership moves so group-wide
//!   operations never scan the member table.
//!
//! Every incremental change goes through the same remove-then-add pattern:
//! strip the old record's links, add the new record's links, prune any
//! branch that emptied.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use freehold_storage::MemberStore;
use freehold_types::{GroupId, Member, MemberId, PlayerId, RegionId};

use crate::error::CacheResult;
use crate::region_cache::RegionCache;
use crate::slot::Slot;

/// One generation of the membership indices.
#[derive(Debug, Default)]
struct MemberSnapshot {
    by_id: HashMap<MemberId, Arc<Member>>,
    by_region: HashMap<RegionId, Vec<MemberId>>,
    by_player: HashMap<PlayerId, HashMap<RegionId, MemberId>>,
    by_group: HashMap<GroupId, Vec<MemberId>>,
}

impl MemberSnapshot {
    fn from_records(records: Vec<Member>) -> Self {
        let mut snapshot = Self::default();
        for record in records {
            snapshot.link(Arc::new(record));
        }
        snapshot
    }

    fn with_upsert(&self, record: Member) -> Self {
        let mut next = self.clone_maps();
        if let Some(previous) = next.by_id.get(&record.id).cloned() {
            next.unlink(&previous);
        }
        next.link(Arc::new(record));
        next
    }

    fn with_removed(&self, id: MemberId) -> Option<Self> {
        let previous = self.by_id.get(&id)?.clone();
        let mut next = self.clone_maps();
        next.unlink(&previous);
        Some(next)
    }

    /// Detach every member of a deleted group back to ungrouped.
    fn with_group_detached(&self, group: GroupId) -> Option<Self> {
        let member_ids = self.by_group.get(&group)?.clone();
        let mut next = self.clone_maps();
        next.by_group.remove(&group);
        for id in member_ids {
            if let Some(member) = next.by_id.get(&id) {
                let mut detached = (**member).clone();
                detached.group = GroupId::NONE;
                next.by_id.insert(id, Arc::new(detached));
            }
        }
        Some(next)
    }

    fn clone_maps(&self) -> Self {
        Self {
            by_id: self.by_id.clone(),
            by_region: self.by_region.clone(),
            by_player: self.by_player.clone(),
            by_group: self.by_group.clone(),
        }
    }

    fn link(&mut self, record: Arc<Member>) {
        self.by_region.entry(record.region).or_default().push(record.id);
        self.by_player
            .entry(record.player)
            .or_default()
            .insert(record.region, record.id);
        if !record.group.is_none() {
            self.by_group.entry(record.group).or_default().push(record.id);
        }
        self.by_id.insert(record.id, record);
    }

    fn unlink(&mut self, record: &Member) {
        self.by_id.remove(&record.id);
        if let Some(ids) = self.by_region.get_mut(&record.region) {
            ids.retain(|id| *id != record.id);
            if ids.is_empty() {
                self.by_region.remove(&record.region);
            }
        }
        if let Some(regions) = self.by_player.get_mut(&record.player) {
            regions.remove(&record.region);
            if regions.is_empty() {
                self.by_player.remove(&record.player);
            }
        }
        if !record.group.is_none() {
            if let Some(ids) = self.by_group.get_mut(&record.group) {
                ids.retain(|id| *id != record.id);
                if ids.is_empty() {
                    self.by_group.remove(&record.group);
                }
            }
        }
    }
}

/// Cache of region memberships.
pub struct MemberCache {
    store: Arc<dyn MemberStore>,
    regions: Arc<RegionCache>,
    snapshot: Slot<MemberSnapshot>,
    write_gate: Mutex<()>,
}

impl MemberCache {
    pub fn new(store: Arc<dyn MemberStore>, regions: Arc<RegionCache>) -> Self {
        Self {
            store,
            regions,
            snapshot: Slot::new(MemberSnapshot::default()),
            write_gate: Mutex::new(()),
        }
    }

    pub fn get(&self, id: MemberId) -> Option<Arc<Member>> {
        self.snapshot.load().by_id.get(&id).cloned()
    }

    /// All memberships of one region.
    pub fn of_region(&self, region: RegionId) -> Vec<Arc<Member>> {
        let snapshot = self.snapshot.load();
        snapshot
            .by_region
            .get(&region)
            .map(|ids| ids.iter().filter_map(|id| snapshot.by_id.get(id)).cloned().collect())
            .unwrap_or_default()
    }

    /// The membership a player holds in one specific region, if any.
    pub fn of_player_in(&self, player: PlayerId, region: RegionId) -> Option<Arc<Member>> {
        let snapshot = self.snapshot.load();
        let id = snapshot.by_player.get(&player)?.get(&region)?;
        snapshot.by_id.get(id).cloned()
    }

    /// All members assigned to a group.
    pub fn of_group(&self, group: GroupId) -> Vec<Arc<Member>> {
        let snapshot = self.snapshot.load();
        snapshot
            .by_group
            .get(&group)
            .map(|ids| ids.iter().filter_map(|id| snapshot.by_id.get(id)).cloned().collect())
            .unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.snapshot.load().by_id.len()
    }

    /// Re-read all memberships, admitting only those whose region this
    /// shard serves.
    pub async fn full_reload(&self) -> CacheResult<usize> {
        let gate = self.write_gate.lock().await;
        let records = self.store.select_all().await?;

        let mut admitted = Vec::new();
        let mut skipped = 0usize;
        for member in records {
            if self.regions.contains(member.region) {
                admitted.push(member);
            } else {
                skipped += 1;
                debug!("Skipping member {} of foreign-shard region {}", member.id, member.region);
            }
        }

        let count = admitted.len();
        self.snapshot.store(MemberSnapshot::from_records(admitted));
        drop(gate);

        info!("🪪 Member cache reloaded: {} members ({} foreign skipped)", count, skipped);
        Ok(count)
    }

    /// Re-read one membership and patch the indices; covers adds, group
    /// moves, and flag changes alike. A record that vanished, or whose
    /// region left this shard, is removed instead.
    pub async fn upsert(&self, id: MemberId) -> CacheResult<()> {
        let gate = self.write_gate.lock().await;
        let loaded = self.store.select_by_id(id).await?;
        let current = self.snapshot.load();

        match loaded {
            Some(member) if self.regions.contains(member.region) => {
                self.snapshot.store(current.with_upsert(member));
            }
            Some(member) => {
                debug!("Member {} belongs to foreign-shard region {}, dropping", id, member.region);
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

    /// Remove one membership from the indices. Returns whether it was
    /// present.
    pub async fn remove(&self, id: MemberId) -> bool {
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

    /// A group was deleted: drop its index branch and mark its members
    /// ungrouped. The member rows in the store are the caller's business.
    pub async fn remove_group(&self, group: GroupId) -> bool {
        let _gate = self.write_gate.lock().await;
        let current = self.snapshot.load();
        match current.with_group_detached(group) {
            Some(next) => {
                self.snapshot.store(next);
                true
            }
            None => false,
        }
    }
}
