//! Render-context resource abstractions.
//!
//! GPU access is kept behind small traits so that everything up to the actual
//! draw call can run (and be tested) without a device.

pub mod buffer_group;
pub mod image_atlas;
pub mod shaders;

pub use shaders::ShaderVertex;

/// What a backing buffer is bound as during rendering.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BufferUsage {
    Vertex,
    Index,
}

/// Describes a GPU buffer together with its allocated size.
pub struct BackingBufferDescriptor<B> {
    /// The buffer which is used
    pub(crate) buffer: B,
    /// The size of buffer
    pub(crate) inner_size: wgpu::BufferAddress,
}

impl<B> BackingBufferDescriptor<B> {
    pub fn new(buffer: B, inner_size: wgpu::BufferAddress) -> Self {
        Self { buffer, inner_size }
    }
}

/// The render context's buffer allocation and upload surface. Implemented for
/// wgpu in production and for plain memory in tests.
pub trait UploadContext<B> {
    fn create_buffer(
        &self,
        label: &'static str,
        usage: BufferUsage,
        size: wgpu::BufferAddress,
    ) -> BackingBufferDescriptor<B>;

    fn write_buffer(&self, buffer: &B, offset: wgpu::BufferAddress, data: &[u8]);
}

/// Live wgpu device and queue of the render context.
pub struct RenderResources<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
}

impl UploadContext<wgpu::Buffer> for RenderResources<'_> {
    fn create_buffer(
        &self,
        label: &'static str,
        usage: BufferUsage,
        size: wgpu::BufferAddress,
    ) -> BackingBufferDescriptor<wgpu::Buffer> {
        let usage = match usage {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Index => wgpu::BufferUsages::INDEX,
        } | wgpu::BufferUsages::COPY_DST;

        let descriptor = wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage,
            mapped_at_creation: false,
        };
        BackingBufferDescriptor::new(self.device.create_buffer(&descriptor), size)
    }

    fn write_buffer(&self, buffer: &wgpu::Buffer, offset: wgpu::BufferAddress, data: &[u8]) {
        // write_buffer() is the preferred upload path:
        // https://toji.github.io/webgpu-best-practices/buffer-uploads.html#when-in-doubt-writebuffer
        self.queue.write_buffer(buffer, offset, data)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{cell::RefCell, collections::HashMap};

    use super::{BackingBufferDescriptor, BufferUsage, UploadContext};

    /// A fake GPU buffer: an id plus a size bound which writes are checked
    /// against.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TestBuffer {
        pub id: usize,
        pub size: wgpu::BufferAddress,
    }

    /// Records every write so tests can assert on upload behavior.
    #[derive(Default)]
    pub struct TestUploadContext {
        next_id: RefCell<usize>,
        pub writes: RefCell<HashMap<usize, Vec<(wgpu::BufferAddress, Vec<u8>)>>>,
    }

    impl TestUploadContext {
        pub fn total_writes(&self) -> usize {
            self.writes.borrow().values().map(Vec::len).sum()
        }

        pub fn writes_to(&self, buffer: &TestBuffer) -> Vec<(wgpu::BufferAddress, Vec<u8>)> {
            self.writes
                .borrow()
                .get(&buffer.id)
                .cloned()
                .unwrap_or_default()
        }
    }

    impl UploadContext<TestBuffer> for TestUploadContext {
        fn create_buffer(
            &self,
            _label: &'static str,
            _usage: BufferUsage,
            size: wgpu::BufferAddress,
        ) -> BackingBufferDescriptor<TestBuffer> {
            let mut next_id = self.next_id.borrow_mut();
            let buffer = TestBuffer {
                id: *next_id,
                size,
            };
            *next_id += 1;
            BackingBufferDescriptor::new(buffer, size)
        }

        fn write_buffer(&self, buffer: &TestBuffer, offset: wgpu::BufferAddress, data: &[u8]) {
            if offset + data.len() as wgpu::BufferAddress > buffer.size {
                panic!("write out of bounds");
            }
            self.writes
                .borrow_mut()
                .entry(buffer.id)
                .or_default()
                .push((offset, data.to_vec()));
        }
    }
}
