//! Atlas positions of pattern and icon images.
//!
//! Atlas packing itself happens elsewhere; buckets only consume the resulting
//! rectangles when patching pattern attributes.

use std::collections::HashMap;

/// Position of one image within the atlas texture, in atlas pixels, including
/// a one pixel padding ring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImagePosition {
    pub pixel_ratio: f32,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl ImagePosition {
    pub const PADDING: u16 = 1;

    pub fn tl(&self) -> [u16; 2] {
        [self.x + Self::PADDING, self.y + Self::PADDING]
    }

    pub fn br(&self) -> [u16; 2] {
        [
            self.x + self.width - Self::PADDING,
            self.y + self.height - Self::PADDING,
        ]
    }

    pub fn tlbr(&self) -> [f32; 4] {
        let tl = self.tl();
        let br = self.br();
        [tl[0] as f32, tl[1] as f32, br[0] as f32, br[1] as f32]
    }

    pub fn display_size(&self) -> [f32; 2] {
        [
            (self.width - Self::PADDING * 2) as f32 / self.pixel_ratio,
            (self.height - Self::PADDING * 2) as f32 / self.pixel_ratio,
        ]
    }
}

pub type ImagePositions = HashMap<String, ImagePosition>;
