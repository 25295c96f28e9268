//! Cache lifecycle events.
//!
//! Host-server plumbing (border-cross detection, map renderers) subscribes
//! to hear about record changes and generation republications. Delivery is
//! best-effort: a lagging or absent subscriber never blocks or fails the
//! cache.

use serde::{Deserialize, Serialize};

use freehold_types::RegionId;

/// Notification published by the region cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheEvent {
    /// A region record was inserted or replaced in the flat indices.
    RegionUpserted { id: RegionId },
    /// A region record was removed from the flat indices.
    RegionRemoved { id: RegionId },
    /// A derived generation (hierarchy forest + sector grid) was published.
    Rebuilt { regions: usize },
}
