//! Group and membership records attached to regions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::{GroupId, MemberId, PlayerId, RegionId};

/// Named flag set. Flag semantics belong to the permission-rules layer.
pub type FlagMap = HashMap<String, bool>;

/// A named privilege group inside one region.
///
/// A member assigned to a group takes the group's flags instead of its own
/// member-level flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Store-assigned unique id.
    pub id: GroupId,
    /// Region this group belongs to.
    pub region: RegionId,
    /// Display name, unique within the region.
    pub name: String,
    /// Privileges granted to members of this group.
    pub flags: FlagMap,
}

/// One player's membership in one region.
///
/// A player holds at most one membership row per region, and may optionally
/// sit in exactly one of the region's groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Store-assigned unique id.
    pub id: MemberId,
    /// Region this membership applies to.
    pub region: RegionId,
    /// The player this row grants privileges to.
    pub player: PlayerId,
    /// Group assignment, or [`GroupId::NONE`] when ungrouped.
    pub group: GroupId,
    /// Member-level privileges; overridden by the group's flags when grouped.
    pub flags: FlagMap,
}

impl Member {
    /// True when this member sits in no group.
    pub fn is_ungrouped(&self) -> bool {
        self.group.is_none()
    }
}
