//! Build-side storage: growable vertex/index/attribute arrays.

use lyon::tessellation::VertexBuffers;

use crate::{
    render::shaders::{ShaderFeatureStyle, ShaderVertex},
    tessellation::IndexDataType,
};

/// The CPU-resident arrays a bucket fills during population. Append-only
/// while building; never shared between buckets.
///
/// Indices are padded up to `wgpu::COPY_BUFFER_ALIGNMENT` when the build pass
/// finishes; `usable_indices` tracks how many of them are real.
#[derive(Clone, Debug, Default)]
pub struct ArrayGroup {
    pub buffer: VertexBuffers<ShaderVertex, IndexDataType>,
    usable_indices: u32,
    /// Holds for each feature the count of indices.
    feature_indices: Vec<u32>,
    /// One style entry per index, so data-driven values can be patched
    /// without touching geometry.
    feature_metadata: Vec<ShaderFeatureStyle>,
    current_index: usize,
}

impl ArrayGroup {
    pub fn new() -> Self {
        Self {
            buffer: VertexBuffers::new(),
            usable_indices: 0,
            feature_indices: Vec::new(),
            feature_metadata: Vec::new(),
            current_index: 0,
        }
    }

    /// Drop everything from a previous build pass.
    pub fn clear(&mut self) {
        self.buffer.vertices.clear();
        self.buffer.indices.clear();
        self.feature_indices.clear();
        self.feature_metadata.clear();
        self.usable_indices = 0;
        self.current_index = 0;
    }

    /// Close the current feature: record how many indices it appended and
    /// seed its per-index style slots.
    pub fn end_feature(&mut self, style: ShaderFeatureStyle) {
        let next_index = self.buffer.indices.len();
        let indices = (next_index - self.current_index) as u32;
        self.feature_indices.push(indices);
        self.feature_metadata
            .extend(std::iter::repeat(style).take(indices as usize));
        self.current_index = next_index;
    }

    /// Finish the build pass: remember the usable index count and pad the
    /// index array to `wgpu::COPY_BUFFER_ALIGNMENT`.
    pub fn finish(&mut self) {
        self.usable_indices = self.buffer.indices.len() as u32;

        let align = wgpu::COPY_BUFFER_ALIGNMENT;
        let stride = std::mem::size_of::<IndexDataType>() as wgpu::BufferAddress;
        let unpadded_bytes = self.buffer.indices.len() as wgpu::BufferAddress * stride;
        let padding_bytes = (align - unpadded_bytes % align) % align;
        let overpad = padding_bytes.div_ceil(stride);

        for _ in 0..overpad {
            self.buffer.indices.push(0);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.vertices.is_empty()
    }

    pub fn usable_indices(&self) -> u32 {
        self.usable_indices
    }

    pub fn feature_indices(&self) -> &[u32] {
        &self.feature_indices
    }

    pub fn feature_metadata(&self) -> &[ShaderFeatureStyle] {
        &self.feature_metadata
    }

    /// Overwrite the style slots of the feature at `ordinal` (its position in
    /// population order). Returns the patched slot range, empty if the
    /// feature appended no geometry.
    pub fn patch_feature(
        &mut self,
        ordinal: usize,
        style: ShaderFeatureStyle,
    ) -> std::ops::Range<usize> {
        let start: u32 = self.feature_indices[..ordinal].iter().sum();
        let count = self.feature_indices[ordinal];
        let range = start as usize..(start + count) as usize;
        for slot in &mut self.feature_metadata[range.clone()] {
            *slot = style;
        }
        range
    }
}
