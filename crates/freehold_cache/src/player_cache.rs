//! Player identity cache.
//!
//! Snapshot-swapped lookups by row id, platform UUID, and last-known name.
//! Player records are deployment-global (not region-scoped), so there is no
//! shard admission check here.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use freehold_storage::PlayerStore;
use freehold_types::{PlayerId, PlayerRecord, PlayerRecordId};

use crate::error::CacheResult;
use crate::slot::Slot;

/// One generation of the player indices.
#[derive(Debug, Default)]
struct PlayerSnapshot {
    by_id: HashMap<PlayerRecordId, Arc<PlayerRecord>>,
    by_uuid: HashMap<PlayerId, PlayerRecordId>,
    by_name: HashMap<String, PlayerRecordId>,
}

impl PlayerSnapshot {
    fn from_records(records: Vec<PlayerRecord>) -> Self {
        let mut snapshot = Self::default();
        for record in records {
            snapshot.link(Arc::new(record));
        }
        snapshot
    }

    fn with_upsert(&self, record: PlayerRecord) -> Self {
        let mut next = self.clone_maps();
        if let Some(previous) = next.by_id.get(&record.id).cloned() {
            next.unlink(&previous);
        }
        next.link(Arc::new(record));
        next
    }

    fn with_removed(&self, id: PlayerRecordId) -> Option<Self> {
        let previous = self.by_id.get(&id)?.clone();
        let mut next = self.clone_maps();
        next.unlink(&previous);
        Some(next)
    }

    fn clone_maps(&self) -> Self {
        Self {
            by_id: self.by_id.clone(),
            by_uuid: self.by_uuid.clone(),
            by_name: self.by_name.clone(),
        }
    }

    fn link(&mut self, record: Arc<PlayerRecord>) {
        self.by_uuid.insert(record.uuid, record.id);
        self.by_name.insert(record.name.clone(), record.id);
        self.by_id.insert(record.id, record);
    }

    fn unlink(&mut self, record: &PlayerRecord) {
        self.by_id.remove(&record.id);
        if self.by_uuid.get(&record.uuid) == Some(&record.id) {
            self.by_uuid.remove(&record.uuid);
        }
        // Names recycle across players; only drop the link if it is ours.
        if self.by_name.get(&record.name) == Some(&record.id) {
            self.by_name.remove(&record.name);
        }
    }
}

/// Cache of player identity records.
pub struct PlayerCache {
    store: Arc<dyn PlayerStore>,
    snapshot: Slot<PlayerSnapshot>,
    write_gate: Mutex<()>,
}

impl PlayerCache {
    pub fn new(store: Arc<dyn PlayerStore>) -> Self {
        Self {
            store,
            snapshot: Slot::new(PlayerSnapshot::default()),
            write_gate: Mutex::new(()),
        }
    }

    pub fn get(&self, id: PlayerRecordId) -> Option<Arc<PlayerRecord>> {
        self.snapshot.load().by_id.get(&id).cloned()
    }

    pub fn get_by_uuid(&self, uuid: PlayerId) -> Option<Arc<PlayerRecord>> {
        let snapshot = self.snapshot.load();
        let id = snapshot.by_uuid.get(&uuid)?;
        snapshot.by_id.get(id).cloned()
    }

    /// Lookup by last-known display name. Names are not stable identities;
    /// prefer [`PlayerCache::get_by_uuid`] where possible.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<PlayerRecord>> {
        let snapshot = self.snapshot.load();
        let id = snapshot.by_name.get(name)?;
        snapshot.by_id.get(id).cloned()
    }

    pub fn count(&self) -> usize {
        self.snapshot.load().by_id.len()
    }

    pub async fn full_reload(&self) -> CacheResult<usize> {
        let gate = self.write_gate.lock().await;
        let records = self.store.select_all().await?;
        let count = records.len();
        self.snapshot.store(PlayerSnapshot::from_records(records));
        drop(gate);

        info!("🧑 Player cache reloaded: {} records", count);
        Ok(count)
    }

    /// Re-read one record and patch the indices; a vanished record is
    /// removed instead.
    pub async fn upsert(&self, id: PlayerRecordId) -> CacheResult<()> {
        let gate = self.write_gate.lock().await;
        let loaded = self.store.select_by_id(id).await?;
        let current = self.snapshot.load();

        match loaded {
            Some(record) => self.snapshot.store(current.with_upsert(record)),
            None => {
                if let Some(next) = current.with_removed(id) {
                    self.snapshot.store(next);
                }
            }
        }
        drop(gate);
        Ok(())
    }

    /// Remove one record from the indices. Returns whether it was present.
    pub async fn remove(&self, id: PlayerRecordId) -> bool {
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
    use freehold_storage::MemoryStore;
    use freehold_types::{GroupId, UiPreference};

    fn record(name: &str) -> PlayerRecord {
        PlayerRecord {
            id: PlayerRecordId(0),
            uuid: PlayerId::new(),
            name: name.to_string(),
            ui: UiPreference::default(),
            title_group: GroupId::NONE,
        }
    }

    #[tokio::test]
    async fn lookups_by_id_uuid_and_name() {
        let store = Arc::new(MemoryStore::new());
        let cache = PlayerCache::new(store.clone());

        let created = store.create_player(record("steve"));
        cache.upsert(created.id).await.unwrap();

        assert_eq!(cache.get(created.id).unwrap().name, "steve");
        assert_eq!(cache.get_by_uuid(created.uuid).unwrap().id, created.id);
        assert_eq!(cache.get_by_name("steve").unwrap().id, created.id);
        assert!(cache.get_by_name("alex").is_none());
    }

    #[tokio::test]
    async fn rename_releases_the_old_name() {
        let store = Arc::new(MemoryStore::new());
        let cache = PlayerCache::new(store.clone());

        let created = store.create_player(record("steve"));
        cache.upsert(created.id).await.unwrap();

        let mut renamed = (*cache.get(created.id).unwrap()).clone();
        renamed.name = "alex".to_string();
        store.put_player(renamed);
        cache.upsert(created.id).await.unwrap();

        assert!(cache.get_by_name("steve").is_none());
        assert_eq!(cache.get_by_name("alex").unwrap().id, created.id);
    }

    #[tokio::test]
    async fn recycled_name_stays_with_its_new_holder() {
        let store = Arc::new(MemoryStore::new());
        let cache = PlayerCache::new(store.clone());

        let old = store.create_player(record("steve"));
        cache.upsert(old.id).await.unwrap();

        // A different account takes the name; the old record is then
        // removed. The name must keep pointing at the new holder.
        let newcomer = store.create_player(record("steve"));
        cache.upsert(newcomer.id).await.unwrap();
        assert!(cache.remove(old.id).await);

        assert_eq!(cache.get_by_name("steve").unwrap().id, newcomer.id);
    }
}
