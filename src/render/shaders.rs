//! Vertex and metadata layouts as consumed by the shaders.

use bytemuck_derive::{Pod, Zeroable};
use cint::{Alpha, EncodedSrgb};

pub type Vec2f32 = [f32; 2];
pub type Vec4f32 = [f32; 4];

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ShaderVertex {
    pub position: Vec2f32,
    pub normal: Vec2f32,
}

impl ShaderVertex {
    pub fn new(position: Vec2f32, normal: Vec2f32) -> Self {
        Self { position, normal }
    }
}

impl Default for ShaderVertex {
    fn default() -> Self {
        ShaderVertex::new([0.0, 0.0], [0.0, 0.0])
    }
}

/// Per-feature styling attributes. One entry per index so that data-driven
/// values can be patched in place without re-tessellation.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ShaderFeatureStyle {
    pub color: Vec4f32,
    /// Atlas rectangle (tl.x, tl.y, br.x, br.y) of the feature's pattern
    /// image, or zeroes when the feature has none.
    pub pattern: Vec4f32,
}

impl From<Alpha<EncodedSrgb<f32>>> for ShaderFeatureStyle {
    fn from(color: Alpha<EncodedSrgb<f32>>) -> Self {
        Self {
            color: [color.color.r, color.color.g, color.color.b, color.alpha],
            pattern: [0.0; 4],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ShaderLayerMetadata {
    pub z_index: f32,
}

impl ShaderLayerMetadata {
    pub fn new(z_index: f32) -> Self {
        Self { z_index }
    }
}
