//! The service facade: one explicitly-constructed object wiring storage and
//! the four caches together.
//!
//! Hosts construct a [`FreeholdService`] at startup and pass it by
//! reference to every component that needs region resolution; there is no
//! global registry to reach through.

use std::sync::Arc;

use tracing::info;

use freehold_cache::{CacheConfig, GroupCache, MemberCache, PlayerCache, RegionCache};
use freehold_storage::{
    GroupStore, JsonStore, MemberStore, MemoryStore, PlayerStore, RegionStore,
};
use freehold_types::ShardId;

use crate::config::{FreeholdConfig, StorageBackend};
use crate::error::ServiceResult;

/// Handle to the concrete storage backend behind the caches.
///
/// Mutation handlers write records through this handle, then call the
/// matching cache's `upsert`/`remove` to publish the change.
#[derive(Clone)]
pub enum StoreHandle {
    Memory(Arc<MemoryStore>),
    Json(Arc<JsonStore>),
}

/// The assembled land-claim service.
pub struct FreeholdService {
    config: FreeholdConfig,
    store: StoreHandle,
    regions: Arc<RegionCache>,
    groups: Arc<GroupCache>,
    members: Arc<MemberCache>,
    players: Arc<PlayerCache>,
}

impl FreeholdService {
    /// Open the configured storage backend, build the caches over it, and
    /// perform the initial load (regions first, then the caches that
    /// validate against them).
    pub async fn open(config: FreeholdConfig) -> ServiceResult<Self> {
        match config.storage.backend {
            StorageBackend::Memory => {
                let store = Arc::new(MemoryStore::new());
                Self::wire(config, StoreHandle::Memory(store.clone()), store).await
            }
            StorageBackend::Json => {
                let store = Arc::new(JsonStore::open(config.storage.data_dir.clone()).await?);
                Self::wire(config, StoreHandle::Json(store.clone()), store).await
            }
        }
    }

    async fn wire<S>(config: FreeholdConfig, handle: StoreHandle, store: Arc<S>) -> ServiceResult<Self>
    where
        S: RegionStore + GroupStore + MemberStore + PlayerStore + 'static,
    {
        let cache_config = CacheConfig {
            shard: ShardId(config.shard.id),
            sector_size: config.cache.sector_size,
        };

        let regions = Arc::new(RegionCache::new(store.clone(), cache_config));
        let groups = Arc::new(GroupCache::new(store.clone(), regions.clone()));
        let members = Arc::new(MemberCache::new(store.clone(), regions.clone()));
        let players = Arc::new(PlayerCache::new(store));

        let service = Self {
            config,
            store: handle,
            regions,
            groups,
            members,
            players,
        };
        service.reload_all().await?;

        info!(
            "✅ Freehold service ready on {}: {} regions, {} groups, {} members, {} players",
            cache_config.shard,
            service.regions.count(),
            service.groups.count(),
            service.members.count(),
            service.players.count()
        );
        Ok(service)
    }

    /// Re-read everything from storage. Region cache first: group and
    /// member admission validates against it.
    pub async fn reload_all(&self) -> ServiceResult<()> {
        self.regions.full_reload().await?;
        self.groups.full_reload().await?;
        self.members.full_reload().await?;
        self.players.full_reload().await?;
        Ok(())
    }

    pub fn config(&self) -> &FreeholdConfig {
        &self.config
    }

    /// The storage backend the caches read from.
    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn regions(&self) -> &Arc<RegionCache> {
        &self.regions
    }

    pub fn groups(&self) -> &Arc<GroupCache> {
        &self.groups
    }

    pub fn members(&self) -> &Arc<MemberCache> {
        &self.members
    }

    pub fn players(&self) -> &Arc<PlayerCache> {
        &self.players
    }

    /// Stop background workers. In-flight rebuilds are abandoned without
    /// touching published snapshots.
    pub fn shutdown(&self) {
        self.regions.shutdown();
        info!("🛑 Freehold service shut down");
    }
}
