//! # Freehold Cache
//!
//! The region cache and spatial resolution engine: an in-memory,
//! concurrently-readable view of all claimed regions, their nested
//! hierarchy, and their owning players/groups, answering "which region
//! contains this point" in near-constant time for every entity-movement
//! event.
//!
//! ## Architecture
//!
//! - [`RegionSnapshot`] - immutable-per-generation flat hash indices
//! - [`hierarchy`] - the parent/child forest, rebuilt wholesale
//! - [`SectorGrid`] - fixed-size spatial buckets with deepest-match queries
//! - [`RegionCache`] - orchestrates reloads, incremental patches, and the
//!   asynchronous single-flight rebuild worker
//! - [`GroupCache`] / [`MemberCache`] / [`PlayerCache`] - the same
//!   snapshot-swap discipline for the secondary record types
//!
//! ## Consistency model
//!
//! Flat indices always reflect the latest committed write; the derived
//! hierarchy/spatial view reflects the latest *completed* rebuild and may
//! lag by one in-flight background task. Readers never block and never see
//! a partially-updated generation.

pub mod error;
pub mod events;
pub mod group_cache;
pub mod hierarchy;
pub mod member_cache;
pub mod player_cache;
pub mod region_cache;
pub mod slot;
pub mod snapshot;
pub mod spatial;

pub use error::{CacheError, CacheResult};
pub use events::CacheEvent;
pub use group_cache::GroupCache;
pub use hierarchy::{build_forest, walk, HierarchyNode};
pub use member_cache::MemberCache;
pub use player_cache::PlayerCache;
pub use region_cache::{CacheConfig, CacheStats, RegionCache};
pub use slot::Slot;
pub use snapshot::RegionSnapshot;
pub use spatial::{SectorGrid, SectorKey, DEFAULT_SECTOR_SIZE};
