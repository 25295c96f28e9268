//! # Freehold Record Types
//!
//! This crate contains the fundamental record types shared by the Freehold
//! land-claim caches, the persistence layer, and the host game server.
//!
//! ## Key Types
//!
//! - [`Region`] - A named, owner-held, axis-aligned cuboid claim in world space
//! - [`Group`] / [`Member`] - Per-region membership records
//! - [`PlayerRecord`] - Player identity and UI preferences
//! - [`CuboidBounds`] - Min-inclusive/max-exclusive claim volume
//! - [`RegionId`], [`PlayerId`], [`WorldId`] - Typed identifiers
//!
//! ## Design Principles
//!
//! - **Type Safety**: Wrapper types prevent ID confusion (RegionId vs GroupId)
//! - **Value Semantics**: Records are immutable values; a mutation produces a
//!   new record that replaces the old one, callers never patch in place
//! - **Serialization**: All records support JSON serialization so stores and
//!   host-server wire code can carry them without adapters

pub mod ids;
pub mod membership;
pub mod player;
pub mod region;

pub use ids::{GroupId, MemberId, PlayerId, PlayerRecordId, RegionId, ShardId, WorldId};
pub use membership::{FlagMap, Group, Member};
pub use player::{PlayerRecord, UiPreference};
pub use region::{CuboidBounds, Position, Region};
