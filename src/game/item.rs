//! Ground Items
//!
//! Items lying in the world. The payload is an opaque JSON string owned by
//! the inventory collaborator; the simulation only tracks where it lies and
//! for how long.

use std::fmt;
use serde::{Serialize, Deserialize};

use crate::core::geometry::check_radius_collision;
use crate::core::vec3::Vec3;

/// Default pickup reach.
pub const DEFAULT_PICKUP_RADIUS: f32 = 2.0;

/// Ground item identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item_{}", self.0)
    }
}

/// An item on the ground.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundItem {
    /// Unique id
    pub id: ItemId,
    /// Where it lies
    pub position: Vec3,
    /// Opaque item description
    pub item_json: String,
    /// World clock time it was dropped
    pub dropped_at: f64,
}

impl GroundItem {
    /// True if `position` is close enough to pick this item up.
    #[inline]
    pub fn in_reach(&self, position: Vec3, pickup_radius: f32) -> bool {
        check_radius_collision(self.position, pickup_radius, position)
    }

    /// True once the item has lain for `lifetime` seconds.
    #[inline]
    pub fn is_expired(&self, now: f64, lifetime: f64) -> bool {
        now - self.dropped_at >= lifetime
    }
}
