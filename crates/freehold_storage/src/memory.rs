//! In-process storage backend.
//!
//! Backs tests and single-process deployments. Mutation helpers assign ids
//! from monotonic sequences the way a SQL store's autoincrement column
//! would, so cache code exercised against this backend sees the same id
//! discipline as against a real database.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use freehold_types::{
    Group, GroupId, Member, MemberId, PlayerId, PlayerRecord, PlayerRecordId, Region, RegionId,
    ShardId,
};

use crate::{GroupStore, MemberStore, PlayerStore, RegionStore, StorageResult};

/// DashMap-backed record tables with autoincrement id sequences.
#[derive(Debug, Default)]
pub struct MemoryStore {
    regions: DashMap<RegionId, Region>,
    groups: DashMap<GroupId, Group>,
    members: DashMap<MemberId, Member>,
    players: DashMap<PlayerRecordId, PlayerRecord>,
    region_seq: AtomicI64,
    group_seq: AtomicI64,
    member_seq: AtomicI64,
    player_seq: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a region, assigning it a fresh id. Returns the stored record.
    pub fn create_region(&self, mut region: Region) -> Region {
        region.id = RegionId(self.region_seq.fetch_add(1, Ordering::Relaxed) + 1);
        self.regions.insert(region.id, region.clone());
        region
    }

    /// Insert or replace a region under its existing id.
    pub fn put_region(&self, region: Region) {
        self.region_seq.fetch_max(region.id.0, Ordering::Relaxed);
        self.regions.insert(region.id, region);
    }

    pub fn delete_region(&self, id: RegionId) -> Option<Region> {
        self.regions.remove(&id).map(|(_, r)| r)
    }

    /// Insert a group, assigning it a fresh id. Returns the stored record.
    pub fn create_group(&self, mut group: Group) -> Group {
        group.id = GroupId(self.group_seq.fetch_add(1, Ordering::Relaxed) + 1);
        self.groups.insert(group.id, group.clone());
        group
    }

    pub fn put_group(&self, group: Group) {
        self.group_seq.fetch_max(group.id.0, Ordering::Relaxed);
        self.groups.insert(group.id, group);
    }

    pub fn delete_group(&self, id: GroupId) -> Option<Group> {
        self.groups.remove(&id).map(|(_, g)| g)
    }

    /// Insert a member, assigning it a fresh id. Returns the stored record.
    pub fn create_member(&self, mut member: Member) -> Member {
        member.id = MemberId(self.member_seq.fetch_add(1, Ordering::Relaxed) + 1);
        self.members.insert(member.id, member.clone());
        member
    }

    pub fn put_member(&self, member: Member) {
        self.member_seq.fetch_max(member.id.0, Ordering::Relaxed);
        self.members.insert(member.id, member);
    }

    pub fn delete_member(&self, id: MemberId) -> Option<Member> {
        self.members.remove(&id).map(|(_, m)| m)
    }

    /// Insert a player record, assigning it a fresh id. Returns the stored
    /// record.
    pub fn create_player(&self, mut player: PlayerRecord) -> PlayerRecord {
        player.id = PlayerRecordId(self.player_seq.fetch_add(1, Ordering::Relaxed) + 1);
        self.players.insert(player.id, player.clone());
        player
    }

    pub fn put_player(&self, player: PlayerRecord) {
        self.player_seq.fetch_max(player.id.0, Ordering::Relaxed);
        self.players.insert(player.id, player);
    }

    pub fn delete_player(&self, id: PlayerRecordId) -> Option<PlayerRecord> {
        self.players.remove(&id).map(|(_, p)| p)
    }
}

#[async_trait]
impl RegionStore for MemoryStore {
    async fn select_all(&self, shard: ShardId) -> StorageResult<Vec<Region>> {
        Ok(self
            .regions
            .iter()
            .filter(|entry| entry.shard == shard)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn select_by_id(&self, id: RegionId) -> StorageResult<Option<Region>> {
        Ok(self.regions.get(&id).map(|entry| entry.value().clone()))
    }

    async fn select_by_name(&self, name: &str) -> StorageResult<Option<Region>> {
        Ok(self
            .regions
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl GroupStore for MemoryStore {
    async fn select_all(&self) -> StorageResult<Vec<Group>> {
        Ok(self.groups.iter().map(|entry| entry.value().clone()).collect())
    }

    async fn select_by_id(&self, id: GroupId) -> StorageResult<Option<Group>> {
        Ok(self.groups.get(&id).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl MemberStore for MemoryStore {
    async fn select_all(&self) -> StorageResult<Vec<Member>> {
        Ok(self.members.iter().map(|entry| entry.value().clone()).collect())
    }

    async fn select_by_id(&self, id: MemberId) -> StorageResult<Option<Member>> {
        Ok(self.members.get(&id).map(|entry| entry.value().clone()))
    }
}

#[async_trait]
impl PlayerStore for MemoryStore {
    async fn select_all(&self) -> StorageResult<Vec<PlayerRecord>> {
        Ok(self.players.iter().map(|entry| entry.value().clone()).collect())
    }

    async fn select_by_id(&self, id: PlayerRecordId) -> StorageResult<Option<PlayerRecord>> {
        Ok(self.players.get(&id).map(|entry| entry.value().clone()))
    }

    async fn select_by_uuid(&self, uuid: PlayerId) -> StorageResult<Option<PlayerRecord>> {
        Ok(self
            .players
            .iter()
            .find(|entry| entry.uuid == uuid)
            .map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freehold_types::CuboidBounds;

    fn region(name: &str, shard: ShardId) -> Region {
        Region {
            id: RegionId(0),
            name: name.to_string(),
            owner: PlayerId::new(),
            parent: RegionId::NONE,
            world: freehold_types::WorldId::new(),
            shard,
            bounds: CuboidBounds::new(0, 0, 0, 16, 16, 16),
            color: 0x22AA66,
            teleport: None,
            enter_message: String::new(),
            leave_message: String::new(),
            environment_flags: Default::default(),
            guest_flags: Default::default(),
            settings: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn ids_are_assigned_sequentially() {
        let store = MemoryStore::new();
        let a = store.create_region(region("a", ShardId(1)));
        let b = store.create_region(region("b", ShardId(1)));
        assert_ne!(a.id, b.id);
        assert!(b.id > a.id);
    }

    #[tokio::test]
    async fn select_all_filters_by_shard() {
        let store = MemoryStore::new();
        store.create_region(region("local", ShardId(1)));
        store.create_region(region("foreign", ShardId(2)));

        let local = RegionStore::select_all(&store, ShardId(1)).await.unwrap();
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].name, "local");
    }

    #[tokio::test]
    async fn select_by_name_is_case_sensitive() {
        let store = MemoryStore::new();
        store.create_region(region("Spawn", ShardId(1)));

        assert!(store.select_by_name("Spawn").await.unwrap().is_some());
        assert!(store.select_by_name("spawn").await.unwrap().is_none());
    }
}
