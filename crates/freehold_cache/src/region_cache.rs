//! Region cache manager.
//!
//! Owns the two-speed update protocol:
//! - flat hash indices are patched synchronously the moment a
//!   persistence-layer write commits (`upsert`/`remove`), and
//! - the derived hierarchy forest + sector grid are rebuilt as a unit by a
//!   background worker, published with a single generation swap while
//!   readers keep answering from the previous generation.
//!
//! Readers never block on writers: every lookup copies the current
//! generation reference once and works on that generation throughout.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use freehold_storage::RegionStore;
use freehold_types::{PlayerId, Position, Region, RegionId, ShardId, WorldId};

use crate::error::CacheResult;
use crate::events::CacheEvent;
use crate::hierarchy::{build_forest, walk, HierarchyNode};
use crate::slot::Slot;
use crate::snapshot::RegionSnapshot;
use crate::spatial::{SectorGrid, DEFAULT_SECTOR_SIZE};

/// Tuning knobs for a cache instance.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Shard whose regions this cache serves.
    pub shard: ShardId,
    /// Sector edge length for the spatial index, in blocks.
    pub sector_size: i32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            shard: ShardId(0),
            sector_size: DEFAULT_SECTOR_SIZE,
        }
    }
}

/// Everything derived from the flat indices: hierarchy forest, node map,
/// and sector grid. Replaced as a unit, never patched.
#[derive(Debug)]
struct DerivedIndex {
    forest: Vec<Arc<HierarchyNode>>,
    nodes: HashMap<RegionId, Arc<HierarchyNode>>,
    grid: SectorGrid,
}

impl DerivedIndex {
    fn empty(sector_size: i32) -> Self {
        Self {
            forest: Vec::new(),
            nodes: HashMap::new(),
            grid: SectorGrid::empty(sector_size),
        }
    }

    fn build(sector_size: i32, flat: &RegionSnapshot) -> Self {
        let forest = build_forest(RegionId::NONE, &flat.all());
        let nodes = walk(&forest)
            .into_iter()
            .map(|node| (node.region.id, node))
            .collect();
        let grid = SectorGrid::build(sector_size, &forest);
        Self { forest, nodes, grid }
    }
}

/// One published generation: flat indices plus the derived structures they
/// were (last) compiled into. Swapped as a pair so a full reload can
/// republish both sides in one step.
#[derive(Debug)]
struct Generations {
    flat: Arc<RegionSnapshot>,
    derived: Arc<DerivedIndex>,
}

#[derive(Debug, Default)]
struct Counters {
    rebuilds: AtomicU64,
    last_rebuild_micros: AtomicU64,
    point_hits: AtomicU64,
    point_misses: AtomicU64,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub regions: usize,
    pub sectors: usize,
    pub rebuilds: u64,
    pub last_rebuild_micros: u64,
    pub point_hits: u64,
    pub point_misses: u64,
}

/// The region cache and spatial resolution engine.
///
/// Construct one per shard with [`RegionCache::new`] (requires a running
/// tokio runtime for the rebuild worker) and share it by reference; there is
/// no global registry.
pub struct RegionCache {
    store: Arc<dyn RegionStore>,
    config: CacheConfig,
    generations: Arc<Slot<Generations>>,
    /// Serializes writers and generation publication. Readers never take it.
    write_gate: Arc<Mutex<()>>,
    rebuild_tx: mpsc::Sender<()>,
    worker: std::sync::Mutex<Option<JoinHandle<()>>>,
    events: broadcast::Sender<CacheEvent>,
    counters: Arc<Counters>,
}

impl RegionCache {
    /// Create an empty cache over the given store and spawn its rebuild
    /// worker. Call [`RegionCache::full_reload`] to populate it.
    pub fn new(store: Arc<dyn RegionStore>, config: CacheConfig) -> Self {
        let generations = Arc::new(Slot::new(Generations {
            flat: Arc::new(RegionSnapshot::empty()),
            derived: Arc::new(DerivedIndex::empty(config.sector_size)),
        }));
        let write_gate = Arc::new(Mutex::new(()));
        let (events, _) = broadcast::channel(64);
        let counters = Arc::new(Counters::default());

        // Capacity-1 trigger channel: one rebuild in flight, at most one
        // queued follow-up, everything beyond that coalesces.
        let (rebuild_tx, rebuild_rx) = mpsc::channel(1);
        let worker = tokio::spawn(rebuild_loop(
            rebuild_rx,
            Arc::clone(&generations),
            Arc::clone(&write_gate),
            events.clone(),
            Arc::clone(&counters),
            config.sector_size,
        ));

        Self {
            store,
            config,
            generations,
            write_gate,
            rebuild_tx,
            worker: std::sync::Mutex::new(Some(worker)),
            events,
            counters,
        }
    }

    // ========================================================================
    // Read API
    // ========================================================================

    /// Lookup by id.
    pub fn get(&self, id: RegionId) -> Option<Arc<Region>> {
        self.generations.load().flat.get(id)
    }

    /// True when the region is present in the current flat generation.
    pub fn contains(&self, id: RegionId) -> bool {
        self.get(id).is_some()
    }

    /// Lookup by exact name against the cached generation only.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<Region>> {
        self.generations.load().flat.get_by_name(name)
    }

    /// Lookup by name, falling back to a persistence-layer point lookup
    /// when the name is not yet cached (startup races).
    pub async fn resolve_name(&self, name: &str) -> CacheResult<Option<Arc<Region>>> {
        if let Some(region) = self.get_by_name(name) {
            return Ok(Some(region));
        }
        Ok(self.store.select_by_name(name).await?.map(Arc::new))
    }

    /// Deepest region containing the point, if any.
    pub fn get_at(&self, world: WorldId, x: f64, y: f64, z: f64) -> Option<Arc<Region>> {
        let generations = self.generations.load();
        let hit = generations.derived.grid.query_point(world, x, y, z);
        match hit {
            Some(node) => {
                self.counters.point_hits.fetch_add(1, Ordering::Relaxed);
                Some(node.region.clone())
            }
            None => {
                self.counters.point_misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Deepest region containing the position, if any.
    pub fn get_at_position(&self, position: &Position) -> Option<Arc<Region>> {
        self.get_at(position.world, position.x, position.y, position.z)
    }

    /// Direct children of a region (or top-level regions for
    /// [`RegionId::NONE`]), from the flat indices.
    pub fn children_of(&self, parent: RegionId) -> Vec<Arc<Region>> {
        self.generations.load().flat.children_of(parent)
    }

    /// All regions owned by a player.
    pub fn owned_by(&self, owner: PlayerId) -> Vec<Arc<Region>> {
        self.generations.load().flat.owned_by(owner)
    }

    /// Every cached region.
    pub fn all(&self) -> Vec<Arc<Region>> {
        self.generations.load().flat.all()
    }

    pub fn count(&self) -> usize {
        self.generations.load().flat.len()
    }

    /// Hierarchy node for a region, from the latest completed rebuild.
    pub fn node_of(&self, id: RegionId) -> Option<Arc<HierarchyNode>> {
        self.generations.load().derived.nodes.get(&id).cloned()
    }

    /// Every hierarchy node of the latest completed rebuild.
    pub fn nodes(&self) -> Vec<Arc<HierarchyNode>> {
        self.generations.load().derived.nodes.values().cloned().collect()
    }

    /// Hierarchy nodes of regions owned by a player.
    pub fn nodes_owned_by(&self, owner: PlayerId) -> Vec<Arc<HierarchyNode>> {
        self.generations
            .load()
            .derived
            .nodes
            .values()
            .filter(|node| node.region.owner == owner)
            .cloned()
            .collect()
    }

    /// Top-level trees of the latest completed rebuild.
    pub fn forest(&self) -> Vec<Arc<HierarchyNode>> {
        self.generations.load().derived.forest.clone()
    }

    /// Would re-parenting `region` under `proposed_parent` make the region
    /// its own ancestor?
    ///
    /// The hierarchy builder trusts parent ids to form a DAG, so upstream
    /// mutation handlers must call this before admitting a parent-id change.
    pub fn would_create_cycle(&self, region: RegionId, proposed_parent: RegionId) -> bool {
        if proposed_parent.is_none() {
            return false;
        }
        if proposed_parent == region {
            return true;
        }
        let flat = self.generations.load().flat.clone();
        let mut seen = HashSet::new();
        let mut cursor = proposed_parent;
        while !cursor.is_none() {
            if cursor == region {
                return true;
            }
            if !seen.insert(cursor) {
                // The chain already loops; refuse to make it worse.
                return true;
            }
            cursor = match flat.get(cursor) {
                Some(ancestor) => ancestor.parent,
                None => break,
            };
        }
        false
    }

    /// Subscribe to cache lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> CacheStats {
        let generations = self.generations.load();
        CacheStats {
            regions: generations.flat.len(),
            sectors: generations.derived.grid.sector_count(),
            rebuilds: self.counters.rebuilds.load(Ordering::Relaxed),
            last_rebuild_micros: self.counters.last_rebuild_micros.load(Ordering::Relaxed),
            point_hits: self.counters.point_hits.load(Ordering::Relaxed),
            point_misses: self.counters.point_misses.load(Ordering::Relaxed),
        }
    }

    // ========================================================================
    // Write API
    // ========================================================================

    /// Re-read every region for this shard and republish flat and derived
    /// structures together as one matched generation.
    ///
    /// A storage failure aborts the reload; the previous generation keeps
    /// serving reads untouched.
    pub async fn full_reload(&self) -> CacheResult<usize> {
        let started = Instant::now();
        let gate = self.write_gate.lock().await;

        let records = match self.store.select_all(self.config.shard).await {
            Ok(records) => records,
            Err(e) => {
                error!("Region reload aborted, previous snapshot stays live: {}", e);
                return Err(e.into());
            }
        };

        let count = records.len();
        let flat = Arc::new(RegionSnapshot::from_records(records));
        let derived = Arc::new(DerivedIndex::build(self.config.sector_size, &flat));
        let sectors = derived.grid.sector_count();
        self.generations.store(Generations { flat, derived });
        drop(gate);

        self.counters.rebuilds.fetch_add(1, Ordering::Relaxed);
        self.counters
            .last_rebuild_micros
            .store(started.elapsed().as_micros() as u64, Ordering::Relaxed);
        let _ = self.events.send(CacheEvent::Rebuilt { regions: count });

        info!(
            "🗺️ Region cache reloaded: {} regions across {} sectors in {:?}",
            count,
            sectors,
            started.elapsed()
        );
        Ok(count)
    }

    /// Re-read one region from the store and patch the flat indices.
    ///
    /// If the store no longer has the record, this behaves like
    /// [`RegionCache::remove`]. Flat lookups reflect the change the moment
    /// this returns; the derived hierarchy/spatial view catches up when the
    /// scheduled background rebuild publishes.
    pub async fn upsert(&self, id: RegionId) -> CacheResult<()> {
        let gate = self.write_gate.lock().await;
        let loaded = self.store.select_by_id(id).await?;
        let current = self.generations.load();

        let event = match loaded {
            Some(region) => {
                debug!("Region {} upserted into flat indices", id);
                let flat = Arc::new(current.flat.with_upsert(region));
                self.generations.store(Generations {
                    flat,
                    derived: Arc::clone(&current.derived),
                });
                Some(CacheEvent::RegionUpserted { id })
            }
            None => match current.flat.with_removed(id) {
                Some(flat) => {
                    debug!("Region {} vanished from store, removed from flat indices", id);
                    self.generations.store(Generations {
                        flat: Arc::new(flat),
                        derived: Arc::clone(&current.derived),
                    });
                    Some(CacheEvent::RegionRemoved { id })
                }
                None => None,
            },
        };
        drop(gate);

        if let Some(event) = event {
            let _ = self.rebuild_tx.try_send(());
            let _ = self.events.send(event);
        }
        Ok(())
    }

    /// Remove one region from the flat indices and schedule a rebuild.
    ///
    /// Returns whether the region was present. Removing an unknown id is a
    /// no-op, not an error.
    pub async fn remove(&self, id: RegionId) -> bool {
        let gate = self.write_gate.lock().await;
        let current = self.generations.load();
        let removed = match current.flat.with_removed(id) {
            Some(flat) => {
                debug!("Region {} removed from flat indices", id);
                self.generations.store(Generations {
                    flat: Arc::new(flat),
                    derived: Arc::clone(&current.derived),
                });
                true
            }
            None => false,
        };
        drop(gate);

        if removed {
            let _ = self.rebuild_tx.try_send(());
            let _ = self.events.send(CacheEvent::RegionRemoved { id });
        }
        removed
    }

    /// Stop the rebuild worker. An in-flight rebuild is abandoned without
    /// touching the published generation.
    pub fn shutdown(&self) {
        let handle = self
            .worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
            debug!("Region cache rebuild worker stopped");
        }
    }
}

/// Background rebuild worker: recompiles the derived structures from the
/// newest flat generation each time it is triggered.
///
/// Exits when the cache (and with it the trigger sender) is dropped.
async fn rebuild_loop(
    mut trigger: mpsc::Receiver<()>,
    generations: Arc<Slot<Generations>>,
    write_gate: Arc<Mutex<()>>,
    events: broadcast::Sender<CacheEvent>,
    counters: Arc<Counters>,
    sector_size: i32,
) {
    while trigger.recv().await.is_some() {
        let started = Instant::now();
        let flat = generations.load().flat.clone();
        let derived = Arc::new(DerivedIndex::build(sector_size, &flat));
        let regions = flat.len();
        let sectors = derived.grid.sector_count();

        {
            // Re-pair with whatever flat generation is current at publish
            // time. If it moved past the one this rebuild compiled, the
            // writer that moved it already queued a follow-up trigger.
            let _gate = write_gate.lock().await;
            let current = generations.load();
            generations.store(Generations {
                flat: Arc::clone(&current.flat),
                derived,
            });
        }

        counters.rebuilds.fetch_add(1, Ordering::Relaxed);
        counters
            .last_rebuild_micros
            .store(started.elapsed().as_micros() as u64, Ordering::Relaxed);
        let _ = events.send(CacheEvent::Rebuilt { regions });

        debug!(
            "Derived generation rebuilt: {} regions across {} sectors in {:?}",
            regions,
            sectors,
            started.elapsed()
        );
    }
}
