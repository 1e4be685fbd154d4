//! Tessellation for lines and polygons.

use lyon::{
    math::Point,
    path::Path,
    tessellation::{
        FillVertex, FillVertexConstructor, StrokeVertex, StrokeVertexConstructor,
    },
};

use crate::{coords::ZoomLevel, render::ShaderVertex};

pub const DEFAULT_TOLERANCE: f32 = 0.02;

/// Vertex buffers index data type.
pub type IndexDataType = u32; // Must match INDEX_FORMAT

/// Constructor for Fill and Stroke vertices.
pub struct VertexConstructor {}

impl FillVertexConstructor<ShaderVertex> for VertexConstructor {
    fn new_vertex(&mut self, vertex: FillVertex) -> ShaderVertex {
        ShaderVertex::new(vertex.position().to_array(), [0.0, 0.0])
    }
}

impl StrokeVertexConstructor<ShaderVertex> for VertexConstructor {
    fn new_vertex(&mut self, vertex: StrokeVertex) -> ShaderVertex {
        ShaderVertex::new(
            vertex.position_on_path().to_array(),
            vertex.normal().to_array(),
        )
    }
}

/// Controls how finely curves and joins are subdivided, per zoom level.
/// Deeper tiles cover less ground per unit, so they tolerate coarser
/// subdivision in tile space.
#[derive(Debug, Clone, Copy)]
pub struct SubdivisionGranularity {
    base_tolerance: f32,
}

impl SubdivisionGranularity {
    pub fn new(base_tolerance: f32) -> Self {
        Self { base_tolerance }
    }

    pub fn tolerance_at(&self, zoom: ZoomLevel) -> f32 {
        let halvings = u8::from(zoom).min(4) as i32;
        self.base_tolerance / (1 << halvings) as f32
    }
}

impl Default for SubdivisionGranularity {
    fn default() -> Self {
        Self {
            base_tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// Build a lyon path from a feature's rings or lines. Returns `None` for
/// degenerate geometry which would contribute no area or length.
pub fn build_path(geometry: &[Vec<Point>], close: bool) -> Option<Path> {
    let min_points = if close { 3 } else { 2 };
    let mut builder = Path::builder();
    let mut any = false;

    for ring in geometry {
        if ring.len() < min_points {
            continue;
        }
        builder.begin(ring[0]);
        for coordinate in &ring[1..] {
            builder.line_to(*coordinate);
        }
        builder.end(close);
        any = true;
    }

    if any {
        Some(builder.build())
    } else {
        None
    }
}
