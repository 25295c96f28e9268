//! Player identity records.

use serde::{Deserialize, Serialize};

use crate::ids::{GroupId, PlayerId, PlayerRecordId};

/// How claim text (enter/leave messages, management prompts) is surfaced to
/// a player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UiPreference {
    /// Interactive clickable menus.
    #[default]
    Interactive,
    /// Plain chat text only.
    PlainText,
    /// Suppress claim messages entirely.
    Silent,
}

/// Last-known identity and preferences of a player seen by this deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Store-assigned row id.
    pub id: PlayerRecordId,
    /// Stable platform identity.
    pub uuid: PlayerId,
    /// Display name at last login; refreshed on join.
    pub name: String,
    /// How claim text is presented to this player.
    pub ui: UiPreference,
    /// Group whose title the player currently displays, or
    /// [`GroupId::NONE`] for no title.
    pub title_group: GroupId,
}
