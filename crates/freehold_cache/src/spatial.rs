//! Sector-bucketed spatial index.
//!
//! World space is partitioned per world into fixed-size square sectors on
//! the X/Z plane. Each sector bucket holds every hierarchy node whose claim
//! volume overlaps it; a claim spanning multiple sectors appears in all of
//! them. Point resolution is one hash lookup plus a scan of a single small
//! bucket, with the deepest containing node winning among nested matches.

use std::collections::HashMap;
use std::sync::Arc;

use freehold_types::WorldId;

use crate::hierarchy::{walk, HierarchyNode};

/// Default sector edge length in blocks.
///
/// Small enough that dense regions-of-regions keep buckets short, large
/// enough that a typical claim only lands in a handful of buckets.
pub const DEFAULT_SECTOR_SIZE: i32 = 64;

/// Key of one sector: world plus truncated X/Z sector coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectorKey {
    pub world: WorldId,
    pub x: i32,
    pub z: i32,
}

/// One generation of the sector table. Built wholesale, never patched.
#[derive(Debug)]
pub struct SectorGrid {
    sector_size: i32,
    buckets: HashMap<SectorKey, Vec<Arc<HierarchyNode>>>,
}

impl SectorGrid {
    pub fn empty(sector_size: i32) -> Self {
        Self {
            sector_size,
            buckets: HashMap::new(),
        }
    }

    /// Index every node of the forest, nested children included.
    pub fn build(sector_size: i32, forest: &[Arc<HierarchyNode>]) -> Self {
        let mut grid = Self::empty(sector_size);
        for node in walk(forest) {
            grid.insert(node);
        }
        grid
    }

    fn insert(&mut self, node: Arc<HierarchyNode>) {
        let bounds = &node.region.bounds;
        if bounds.width() <= 0 || bounds.height() <= 0 || bounds.depth() <= 0 {
            return; // degenerate volume contains no point
        }
        // max bounds are exclusive, so the last overlapped sector is the one
        // holding the final contained block.
        let min_sx = bounds.min_x.div_euclid(self.sector_size);
        let max_sx = (bounds.max_x - 1).div_euclid(self.sector_size);
        let min_sz = bounds.min_z.div_euclid(self.sector_size);
        let max_sz = (bounds.max_z - 1).div_euclid(self.sector_size);

        for sx in min_sx..=max_sx {
            for sz in min_sz..=max_sz {
                let key = SectorKey {
                    world: node.region.world,
                    x: sx,
                    z: sz,
                };
                self.buckets.entry(key).or_default().push(node.clone());
            }
        }
    }

    /// Resolve the deepest claim containing the point, if any.
    pub fn query_point(&self, world: WorldId, x: f64, y: f64, z: f64) -> Option<Arc<HierarchyNode>> {
        let key = SectorKey {
            world,
            x: (x.floor() as i32).div_euclid(self.sector_size),
            z: (z.floor() as i32).div_euclid(self.sector_size),
        };
        self.buckets
            .get(&key)?
            .iter()
            .filter(|node| node.region.bounds.contains(x, y, z))
            .max_by_key(|node| node.depth)
            .cloned()
    }

    /// Number of occupied sectors.
    pub fn sector_count(&self) -> usize {
        self.buckets.len()
    }
}
