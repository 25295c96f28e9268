//! # Freehold Storage
//!
//! Persistence boundary for the Freehold caches: a set of async record-access
//! traits plus two concrete backends.
//!
//! The caches only ever ask a store for a consistent point-in-time view of
//! one or all records; transaction semantics, schema, and storage technology
//! stay behind these traits.
//!
//! ## Backends
//!
//! - [`MemoryStore`] - in-process tables, the default for tests and
//!   single-process servers
//! - [`JsonStore`] - one JSON document per record under a data directory,
//!   written with atomic renames

use async_trait::async_trait;

use freehold_types::{
    Group, GroupId, Member, MemberId, PlayerId, PlayerRecord, PlayerRecordId, Region, RegionId,
    ShardId,
};

pub mod error;
pub mod json;
pub mod memory;

pub use error::{StorageError, StorageResult};
pub use json::JsonStore;
pub use memory::MemoryStore;

/// Read access to region records.
#[async_trait]
pub trait RegionStore: Send + Sync {
    /// All regions owned by the given shard.
    async fn select_all(&self, shard: ShardId) -> StorageResult<Vec<Region>>;

    /// Point lookup by id.
    async fn select_by_id(&self, id: RegionId) -> StorageResult<Option<Region>>;

    /// Point lookup by exact (case-sensitive) name.
    async fn select_by_name(&self, name: &str) -> StorageResult<Option<Region>>;
}

/// Read access to group records.
#[async_trait]
pub trait GroupStore: Send + Sync {
    async fn select_all(&self) -> StorageResult<Vec<Group>>;

    async fn select_by_id(&self, id: GroupId) -> StorageResult<Option<Group>>;
}

/// Read access to membership records.
#[async_trait]
pub trait MemberStore: Send + Sync {
    async fn select_all(&self) -> StorageResult<Vec<Member>>;

    async fn select_by_id(&self, id: MemberId) -> StorageResult<Option<Member>>;
}

/// Read access to player identity records.
#[async_trait]
pub trait PlayerStore: Send + Sync {
    async fn select_all(&self) -> StorageResult<Vec<PlayerRecord>>;

    async fn select_by_id(&self, id: PlayerRecordId) -> StorageResult<Option<PlayerRecord>>;

    async fn select_by_uuid(&self, uuid: PlayerId) -> StorageResult<Option<PlayerRecord>>;
}
