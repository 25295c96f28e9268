//! Integration tests for the region cache: the two-speed update protocol,
//! spatial resolution, and reader/writer interleaving end-to-end against
//! the in-memory store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::Rng;
use tokio::time::{sleep, timeout, Duration};

use freehold_cache::{CacheConfig, RegionCache};
use freehold_storage::{MemoryStore, RegionStore};
use freehold_types::{CuboidBounds, PlayerId, Region, RegionId, ShardId, WorldId};

fn make_region(name: &str, world: WorldId, parent: RegionId, bounds: CuboidBounds) -> Region {
    Region {
        id: RegionId(0),
        name: name.to_string(),
        owner: PlayerId::new(),
        parent,
        world,
        shard: ShardId(0),
        bounds,
        color: 0x8844CC,
        teleport: None,
        enter_message: format!("entering {}", name),
        leave_message: format!("leaving {}", name),
        environment_flags: Default::default(),
        guest_flags: Default::default(),
        settings: serde_json::Value::Null,
    }
}

/// Poll until the derived view agrees with `check`, or panic after two
/// seconds. Rebuilds normally land within a few milliseconds.
async fn wait_for_rebuild<F: Fn() -> bool>(check: F) {
    timeout(Duration::from_secs(2), async {
        loop {
            if check() {
                return;
            }
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("background rebuild did not converge in time");
}

#[tokio::test]
async fn upserted_region_is_resolvable_by_point_after_rebuild() {
    let store = Arc::new(MemoryStore::new());
    let cache = RegionCache::new(store.clone(), CacheConfig::default());
    let world = WorldId::new();

    let created = store.create_region(make_region(
        "meadow",
        world,
        RegionId::NONE,
        CuboidBounds::new(0, 0, 0, 48, 256, 48),
    ));
    cache.upsert(created.id).await.unwrap();

    // Flat lookups answer synchronously.
    assert_eq!(cache.get(created.id).unwrap().name, "meadow");
    assert_eq!(cache.get_by_name("meadow").unwrap().id, created.id);

    // The spatial view catches up asynchronously, and never answers with a
    // wrong region in the meantime: before the rebuild it can only be the
    // prior (empty) generation's answer.
    if let Some(region) = cache.get_at(world, 10.0, 5.0, 10.0) {
        assert_eq!(region.id, created.id);
    }
    wait_for_rebuild(|| cache.get_at(world, 10.0, 5.0, 10.0).is_some()).await;
    assert_eq!(cache.get_at(world, 10.0, 5.0, 10.0).unwrap().id, created.id);
    cache.shutdown();
}

#[tokio::test]
async fn nested_child_shadows_parent_at_shared_points() {
    let store = Arc::new(MemoryStore::new());
    let cache = RegionCache::new(store.clone(), CacheConfig::default());
    let world = WorldId::new();

    let parent = store.create_region(make_region(
        "estate",
        world,
        RegionId::NONE,
        CuboidBounds::new(0, 0, 0, 128, 256, 128),
    ));
    let mut child = make_region("garden", world, parent.id, CuboidBounds::new(32, 0, 32, 64, 256, 64));
    child.owner = parent.owner;
    let child = store.create_region(child);
    cache.full_reload().await.unwrap();

    let inside_child = cache.get_at(world, 40.0, 10.0, 40.0).unwrap();
    assert_eq!(inside_child.id, child.id);

    let inside_parent_only = cache.get_at(world, 10.0, 10.0, 10.0).unwrap();
    assert_eq!(inside_parent_only.id, parent.id);
    cache.shutdown();
}

#[tokio::test]
async fn removal_is_synchronous_in_flat_maps_and_eventual_in_spatial() {
    let store = Arc::new(MemoryStore::new());
    let cache = RegionCache::new(store.clone(), CacheConfig::default());
    let world = WorldId::new();

    let outer = store.create_region(make_region(
        "outer",
        world,
        RegionId::NONE,
        CuboidBounds::new(0, 0, 0, 128, 256, 128),
    ));
    let inner = store.create_region(make_region(
        "inner",
        world,
        outer.id,
        CuboidBounds::new(32, 0, 32, 64, 256, 64),
    ));
    cache.full_reload().await.unwrap();
    assert_eq!(cache.get_at(world, 40.0, 10.0, 40.0).unwrap().id, inner.id);

    store.delete_region(inner.id);
    cache.remove(inner.id).await;

    // Synchronous: gone from every flat index.
    assert!(cache.get(inner.id).is_none());
    assert!(cache.get_by_name("inner").is_none());
    assert!(cache.children_of(outer.id).is_empty());
    assert!(cache.owned_by(inner.owner).is_empty());

    // Eventual: the point falls back to the next-enclosing ancestor.
    wait_for_rebuild(|| {
        cache
            .get_at(world, 40.0, 10.0, 40.0)
            .map(|r| r.id == outer.id)
            .unwrap_or(false)
    })
    .await;
    cache.shutdown();
}

#[tokio::test]
async fn full_reload_round_trips_every_store_record() {
    let store = Arc::new(MemoryStore::new());
    let cache = RegionCache::new(store.clone(), CacheConfig::default());
    let world = WorldId::new();

    let mut expected = Vec::new();
    for i in 0..20 {
        let offset = i * 200;
        let mut region = make_region(
            &format!("plot-{}", i),
            world,
            RegionId::NONE,
            CuboidBounds::new(offset, 0, 0, offset + 100, 256, 100),
        );
        region.settings = serde_json::json!({ "index": i });
        expected.push(store.create_region(region));
    }

    let loaded = cache.full_reload().await.unwrap();
    assert_eq!(loaded, expected.len());
    for record in &expected {
        let cached = cache.get(record.id).expect("record missing after reload");
        assert_eq!(*cached, *record);
    }
    cache.shutdown();
}

#[tokio::test]
async fn repeated_upsert_without_store_change_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let cache = RegionCache::new(store.clone(), CacheConfig::default());
    let world = WorldId::new();

    let created = store.create_region(make_region(
        "stable",
        world,
        RegionId::NONE,
        CuboidBounds::new(0, 0, 0, 32, 64, 32),
    ));
    cache.upsert(created.id).await.unwrap();
    let first_pass: Vec<_> = cache.all().iter().map(|r| (**r).clone()).collect();

    cache.upsert(created.id).await.unwrap();
    let second_pass: Vec<_> = cache.all().iter().map(|r| (**r).clone()).collect();

    assert_eq!(first_pass, second_pass);
    assert_eq!(cache.count(), 1);
    assert_eq!(cache.owned_by(created.owner).len(), 1);
    assert_eq!(cache.children_of(RegionId::NONE).len(), 1);
    cache.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_never_observe_inconsistent_state_under_write_churn() {
    const READERS: usize = 4;
    const WRITES: usize = 1_000;
    const WORLD_EXTENT: i32 = 1_024;

    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(RegionCache::new(store.clone(), CacheConfig::default()));
    let world = WorldId::new();

    // Seed a stable population so readers always have something to hit.
    for i in 0..16 {
        let x = (i % 4) * 256;
        let z = (i / 4) * 256;
        store.create_region(make_region(
            &format!("base-{}", i),
            world,
            RegionId::NONE,
            CuboidBounds::new(x, 0, z, x + 200, 256, z + 200),
        ));
    }
    cache.full_reload().await.unwrap();

    let stop = Arc::new(AtomicBool::new(false));
    let mut readers = Vec::new();
    for _ in 0..READERS {
        let cache = Arc::clone(&cache);
        let stop = Arc::clone(&stop);
        readers.push(tokio::spawn(async move {
            let mut observations = 0u64;
            while !stop.load(Ordering::Relaxed) {
                let (x, y, z) = {
                    let mut rng = rand::thread_rng();
                    (
                        rng.gen_range(0.0..WORLD_EXTENT as f64),
                        rng.gen_range(0.0..256.0),
                        rng.gen_range(0.0..WORLD_EXTENT as f64),
                    )
                };
                if let Some(region) = cache.get_at(world, x, y, z) {
                    // The answer must be self-consistent: the region really
                    // contains the queried point and lives in this world.
                    assert!(region.bounds.contains(x, y, z));
                    assert_eq!(region.world, world);
                }
                observations += 1;
                if observations % 256 == 0 {
                    tokio::task::yield_now().await;
                }
            }
            observations
        }));
    }

    // Interleaved churn: create and delete claims in a band the readers
    // also sample.
    for i in 0..WRITES {
        let x = ((i as i32) * 37) % (WORLD_EXTENT - 64);
        let created = store.create_region(make_region(
            &format!("churn-{}", i),
            world,
            RegionId::NONE,
            CuboidBounds::new(x, 0, 0, x + 48, 256, 48),
        ));
        cache.upsert(created.id).await.unwrap();

        if i % 2 == 1 {
            store.delete_region(created.id);
            cache.remove(created.id).await;
        }
    }

    stop.store(true, Ordering::Relaxed);
    for reader in readers {
        let observations = reader.await.expect("reader task panicked");
        assert!(observations > 0);
    }
    cache.shutdown();
}

#[tokio::test]
async fn cold_cache_answers_empty_not_error() {
    let store = Arc::new(MemoryStore::new());
    let cache = RegionCache::new(store.clone(), CacheConfig::default());
    let world = WorldId::new();

    assert!(cache.get(RegionId(1)).is_none());
    assert!(cache.get_by_name("anything").is_none());
    assert!(cache.get_at(world, 0.0, 0.0, 0.0).is_none());
    assert!(cache.all().is_empty());
    assert_eq!(cache.count(), 0);

    // Name resolution falls through to the store during startup races.
    let created = store.create_region(make_region(
        "early",
        world,
        RegionId::NONE,
        CuboidBounds::new(0, 0, 0, 16, 16, 16),
    ));
    let resolved = cache.resolve_name("early").await.unwrap().unwrap();
    assert_eq!(resolved.id, created.id);
    // But the cache itself was not populated by the fallback.
    assert_eq!(cache.count(), 0);
    cache.shutdown();
}

#[tokio::test]
async fn rapid_triggers_coalesce_into_few_rebuilds() {
    let store = Arc::new(MemoryStore::new());
    let cache = RegionCache::new(store.clone(), CacheConfig::default());
    let world = WorldId::new();

    let mut last = RegionId(0);
    for i in 0..50 {
        let created = store.create_region(make_region(
            &format!("burst-{}", i),
            world,
            RegionId::NONE,
            CuboidBounds::new(i * 20, 0, 0, i * 20 + 16, 64, 16),
        ));
        cache.upsert(created.id).await.unwrap();
        last = created.id;
    }

    // All 50 writes are in the flat maps; the derived view converges.
    assert_eq!(cache.count(), 50);
    let last_region = cache.get(last).unwrap();
    wait_for_rebuild(|| {
        cache
            .get_at(world, f64::from(last_region.bounds.min_x) + 1.0, 1.0, 1.0)
            .is_some()
    })
    .await;

    // The capacity-1 trigger channel bounds rebuilds by triggers; on a
    // loaded machine many triggers coalesce into far fewer rebuilds.
    let stats = cache.stats();
    assert!(stats.rebuilds >= 1);
    assert!(stats.rebuilds <= 50, "more rebuilds than triggers: {}", stats.rebuilds);
    assert_eq!(stats.regions, 50);
    cache.shutdown();
}

#[tokio::test]
async fn store_is_consulted_per_record_not_trusted_blindly() {
    // upsert(id) must re-read the store rather than reuse whatever the
    // caller thinks it wrote: a concurrent rename between the write and the
    // upsert call lands correctly.
    let store = Arc::new(MemoryStore::new());
    let cache = RegionCache::new(store.clone(), CacheConfig::default());
    let world = WorldId::new();

    let created = store.create_region(make_region(
        "before",
        world,
        RegionId::NONE,
        CuboidBounds::new(0, 0, 0, 16, 16, 16),
    ));
    let mut renamed = store.select_by_id(created.id).await.unwrap().unwrap();
    renamed.name = "after".to_string();
    store.put_region(renamed);

    cache.upsert(created.id).await.unwrap();
    assert!(cache.get_by_name("before").is_none());
    assert_eq!(cache.get_by_name("after").unwrap().id, created.id);
    cache.shutdown();
}
