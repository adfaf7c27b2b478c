//! Traits abstracting the GPU operations the batching engine performs.

use crate::gpu_types::*;
use std::ops::Range;
use wgpu::{BufferDescriptor, IndexFormat};

/// Buffer creation and upload.
///
/// Methods take `&self` and return owned wrapper types, so the trait is
/// object-safe and mock implementations can record through interior mutability.
///
/// # Example
///
/// ```rust,no_run
/// use tessera_test_utils::RenderContext;
/// use wgpu::{BufferDescriptor, BufferUsages};
///
/// fn upload(ctx: &dyn RenderContext, data: &[u8]) {
///     let buffer = ctx.create_buffer(&BufferDescriptor {
///         label: None,
///         size: data.len() as u64,
///         usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
///         mapped_at_creation: false,
///     });
///     ctx.write_buffer(&buffer, 0, data);
/// }
/// ```
pub trait RenderContext: Send + Sync {
    /// Create a GPU buffer.
    fn create_buffer(&self, desc: &BufferDescriptor) -> GpuBuffer;

    /// Create a GPU buffer, returning `None` if the device cannot allocate it.
    ///
    /// Used for per-frame buffers whose allocation failure should drop the
    /// frame rather than abort.
    fn try_create_buffer(&self, desc: &BufferDescriptor) -> Option<GpuBuffer>;

    /// Write data to a buffer.
    ///
    /// For real buffers, this maps to `queue.write_buffer()`.
    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]);

    /// Release a buffer's memory immediately instead of waiting for the last handle to drop.
    fn destroy_buffer(&self, buffer: &GpuBuffer);
}

/// The render pass commands issued when drawing batched ops.
pub trait RenderPassRecorder {
    fn set_pipeline(&mut self, pipeline: &GpuRenderPipeline);

    fn set_bind_group(&mut self, index: u32, bind_group: &GpuBindGroup);

    fn set_index_buffer(&mut self, buffer: &GpuBuffer, format: IndexFormat);

    /// Bind `buffer` to vertex slot `slot`, starting `offset` bytes in.
    fn set_vertex_buffer(&mut self, slot: u32, buffer: &GpuBuffer, offset: u64);

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>);

    fn draw_indexed_indirect(&mut self, indirect_buffer: &GpuBuffer, indirect_offset: u64);

    fn multi_draw_indexed_indirect(
        &mut self,
        indirect_buffer: &GpuBuffer,
        indirect_offset: u64,
        count: u32,
    );
}

impl RenderPassRecorder for wgpu::RenderPass<'_> {
    fn set_pipeline(&mut self, pipeline: &GpuRenderPipeline) {
        if let Some(pipeline) = pipeline.as_wgpu() {
            wgpu::RenderPass::set_pipeline(self, pipeline);
        }
    }

    fn set_bind_group(&mut self, index: u32, bind_group: &GpuBindGroup) {
        if let Some(bind_group) = bind_group.as_wgpu() {
            wgpu::RenderPass::set_bind_group(self, index, bind_group, &[]);
        }
    }

    fn set_index_buffer(&mut self, buffer: &GpuBuffer, format: IndexFormat) {
        if let Some(buffer) = buffer.as_wgpu() {
            wgpu::RenderPass::set_index_buffer(self, buffer.slice(..), format);
        }
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: &GpuBuffer, offset: u64) {
        if let Some(buffer) = buffer.as_wgpu() {
            wgpu::RenderPass::set_vertex_buffer(self, slot, buffer.slice(offset..));
        }
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        wgpu::RenderPass::draw_indexed(self, indices, base_vertex, instances);
    }

    fn draw_indexed_indirect(&mut self, indirect_buffer: &GpuBuffer, indirect_offset: u64) {
        if let Some(buffer) = indirect_buffer.as_wgpu() {
            wgpu::RenderPass::draw_indexed_indirect(self, buffer, indirect_offset);
        }
    }

    fn multi_draw_indexed_indirect(
        &mut self,
        indirect_buffer: &GpuBuffer,
        indirect_offset: u64,
        count: u32,
    ) {
        if let Some(buffer) = indirect_buffer.as_wgpu() {
            wgpu::RenderPass::multi_draw_indexed_indirect(self, buffer, indirect_offset, count);
        }
    }
}
