//! Tile coordinates and tile-space constants.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Size of the tile coordinate space in which feature geometries live.
pub const EXTENT_UINT: u32 = 4096;
pub const EXTENT_SINT: i32 = EXTENT_UINT as i32;
pub const EXTENT: f64 = EXTENT_UINT as f64;

pub const MAX_ZOOM: u8 = 32;

#[derive(
    Ord, PartialOrd, Eq, PartialEq, Hash, Copy, Clone, Debug, Default, Serialize, Deserialize,
)]
pub struct ZoomLevel(u8);

impl ZoomLevel {
    pub const fn new(z: u8) -> Self {
        ZoomLevel(z)
    }

    pub fn is_root(self) -> bool {
        self.0 == 0
    }
}

impl std::ops::Add<u8> for ZoomLevel {
    type Output = ZoomLevel;

    fn add(self, rhs: u8) -> Self::Output {
        let zoom_level = self.0.checked_add(rhs).expect("zoom level overflowed");
        ZoomLevel(zoom_level)
    }
}

impl std::ops::Sub<u8> for ZoomLevel {
    type Output = ZoomLevel;

    fn sub(self, rhs: u8) -> Self::Output {
        let zoom_level = self.0.checked_sub(rhs).expect("zoom level underflowed");
        ZoomLevel(zoom_level)
    }
}

impl Display for ZoomLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for ZoomLevel {
    fn from(zoom_level: u8) -> Self {
        ZoomLevel(zoom_level)
    }
}

impl From<ZoomLevel> for u8 {
    fn from(zoom_level: ZoomLevel) -> Self {
        zoom_level.0
    }
}

/// The canonical id of a tile: zoom level plus x/y position within that level.
///
/// Buckets use the canonical id for pattern zoom keys and for choosing the
/// tessellation precision of a build pass.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct CanonicalTileId {
    pub x: u32,
    pub y: u32,
    pub z: ZoomLevel,
}

impl CanonicalTileId {
    pub fn new(x: u32, y: u32, z: ZoomLevel) -> Self {
        Self { x, y, z }
    }

    /// The zoom level below this tile's, saturating at the root.
    pub fn min_pattern_zoom(&self) -> ZoomLevel {
        if self.z.is_root() {
            self.z
        } else {
            self.z - 1
        }
    }

    /// The zoom level above this tile's, saturating at [`MAX_ZOOM`].
    pub fn max_pattern_zoom(&self) -> ZoomLevel {
        if u8::from(self.z) >= MAX_ZOOM - 1 {
            self.z
        } else {
            self.z + 1
        }
    }
}

impl From<(u32, u32, ZoomLevel)> for CanonicalTileId {
    fn from((x, y, z): (u32, u32, ZoomLevel)) -> Self {
        CanonicalTileId { x, y, z }
    }
}

impl Display for CanonicalTileId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "C(x={x},y={y},z={z})", x = self.x, y = self.y, z = self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::{CanonicalTileId, ZoomLevel};

    #[test]
    fn pattern_zoom_keys_clamp_at_bounds() {
        let root: CanonicalTileId = (0, 0, ZoomLevel::default()).into();
        assert_eq!(root.min_pattern_zoom(), ZoomLevel::new(0));
        assert_eq!(root.max_pattern_zoom(), ZoomLevel::new(1));

        let mid: CanonicalTileId = (4, 7, ZoomLevel::new(5)).into();
        assert_eq!(mid.min_pattern_zoom(), ZoomLevel::new(4));
        assert_eq!(mid.max_pattern_zoom(), ZoomLevel::new(6));
    }
}
