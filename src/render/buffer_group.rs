//! Render-side storage: the GPU mirror of an [`ArrayGroup`].

use std::ops::Range;

use crate::{
    buckets::array_group::ArrayGroup,
    render::{
        shaders::{ShaderFeatureStyle, ShaderLayerMetadata, ShaderVertex},
        BackingBufferDescriptor, BufferUsage, UploadContext,
    },
    tessellation::IndexDataType,
};

#[derive(Debug)]
struct BackingBuffer<B> {
    /// The internal structure which is used for storage
    inner: B,
    /// The size of the `inner` buffer
    inner_size: wgpu::BufferAddress,
}

impl<B> BackingBuffer<B> {
    fn new(descriptor: BackingBufferDescriptor<B>) -> Self {
        Self {
            inner: descriptor.buffer,
            inner_size: descriptor.inner_size,
        }
    }
}

/// GPU-resident counterpart of one bucket's [`ArrayGroup`]. Created once on
/// first upload and immutable in shape afterwards; only attribute values may
/// be patched.
#[derive(Debug)]
pub struct BufferGroup<B> {
    vertices: BackingBuffer<B>,
    indices: BackingBuffer<B>,
    layer_metadata: BackingBuffer<B>,
    feature_metadata: BackingBuffer<B>,
    usable_indices: u32,
}

impl<B> BufferGroup<B> {
    /// One-time transform from the build-side layout to the render-side
    /// layout: allocate exact-fit buffers and write every region.
    pub fn from_arrays<C: UploadContext<B>>(
        context: &C,
        arrays: &ArrayGroup,
        layer_metadata: ShaderLayerMetadata,
    ) -> Self {
        let vertices_size = (arrays.buffer.vertices.len() * std::mem::size_of::<ShaderVertex>())
            as wgpu::BufferAddress;
        let indices_size = (arrays.buffer.indices.len() * std::mem::size_of::<IndexDataType>())
            as wgpu::BufferAddress;
        let layer_metadata_size = std::mem::size_of::<ShaderLayerMetadata>() as wgpu::BufferAddress;
        let feature_metadata_size = (arrays.feature_metadata().len()
            * std::mem::size_of::<ShaderFeatureStyle>())
            as wgpu::BufferAddress;

        debug_assert_eq!(
            vertices_size % wgpu::COPY_BUFFER_ALIGNMENT,
            0,
            "ShaderVertex stride must keep writes aligned"
        );
        debug_assert_eq!(
            indices_size % wgpu::COPY_BUFFER_ALIGNMENT,
            0,
            "indices must be padded by ArrayGroup::finish"
        );

        let group = Self {
            vertices: BackingBuffer::new(context.create_buffer(
                "bucket vertices",
                BufferUsage::Vertex,
                vertices_size,
            )),
            indices: BackingBuffer::new(context.create_buffer(
                "bucket indices",
                BufferUsage::Index,
                indices_size,
            )),
            layer_metadata: BackingBuffer::new(context.create_buffer(
                "bucket layer metadata",
                BufferUsage::Vertex,
                layer_metadata_size,
            )),
            feature_metadata: BackingBuffer::new(context.create_buffer(
                "bucket feature metadata",
                BufferUsage::Vertex,
                feature_metadata_size,
            )),
            usable_indices: arrays.usable_indices(),
        };

        context.write_buffer(
            &group.vertices.inner,
            0,
            bytemuck::cast_slice(&arrays.buffer.vertices),
        );
        context.write_buffer(
            &group.indices.inner,
            0,
            bytemuck::cast_slice(&arrays.buffer.indices),
        );
        context.write_buffer(
            &group.layer_metadata.inner,
            0,
            bytemuck::cast_slice(&[layer_metadata]),
        );
        context.write_buffer(
            &group.feature_metadata.inner,
            0,
            bytemuck::cast_slice(arrays.feature_metadata()),
        );

        group
    }

    /// Patch a contiguous range of per-feature style slots. Values only; the
    /// shape of the group never changes after creation.
    pub fn patch_feature_metadata<C: UploadContext<B>>(
        &self,
        context: &C,
        feature_metadata: &[ShaderFeatureStyle],
        slots: Range<usize>,
    ) {
        if slots.is_empty() {
            return;
        }
        let stride = std::mem::size_of::<ShaderFeatureStyle>();
        let offset = (slots.start * stride) as wgpu::BufferAddress;
        debug_assert!(
            (slots.end * stride) as wgpu::BufferAddress <= self.feature_metadata.inner_size,
            "patch range exceeds the buffer created at upload"
        );

        context.write_buffer(
            &self.feature_metadata.inner,
            offset,
            bytemuck::cast_slice(&feature_metadata[slots]),
        );
    }

    /// The draw range: indices beyond it are alignment padding.
    pub fn indices_range(&self) -> Range<u32> {
        0..self.usable_indices
    }

    pub fn vertices(&self) -> &B {
        &self.vertices.inner
    }

    pub fn indices(&self) -> &B {
        &self.indices.inner
    }

    pub fn layer_metadata(&self) -> &B {
        &self.layer_metadata.inner
    }

    pub fn feature_metadata(&self) -> &B {
        &self.feature_metadata.inner
    }
}
