//! Indirect draw commands and the buffer that carries them.
//!
//! Without `INDIRECT_FIRST_INSTANCE` wgpu rejects a non-zero
//! `first_instance` in a command; callers write zero and rebind the instance
//! buffer at an offset instead.

use std::marker::PhantomData;

use bytemuck::{Pod, Zeroable};
use tessera_test_utils::{GpuBuffer, RenderContext};

/// Indirect draw command for indexed geometry, laid out as
/// `wgpu::RenderPass::draw_indexed_indirect` expects.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct DrawIndexedIndirect {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}

static_assertions::assert_eq_size!(DrawIndexedIndirect, [u8; 20]);

impl DrawIndexedIndirect {
    pub const fn new(
        index_count: u32,
        instance_count: u32,
        first_index: u32,
        base_vertex: i32,
        first_instance: u32,
    ) -> Self {
        Self {
            index_count,
            instance_count,
            first_index,
            base_vertex,
            first_instance,
        }
    }
}

/// Marker trait for indirect draw command types.
pub trait IndirectCommand: Pod + Zeroable + Default {
    /// Size of a single command in bytes.
    const SIZE: u64;
}

impl IndirectCommand for DrawIndexedIndirect {
    const SIZE: u64 = std::mem::size_of::<Self>() as u64;
}

/// A typed GPU buffer of indirect commands.
pub struct IndirectBuffer<T: IndirectCommand> {
    buffer: GpuBuffer,
    capacity: usize,
    _marker: PhantomData<T>,
}

impl<T: IndirectCommand> IndirectBuffer<T> {
    /// Allocate room for `capacity` commands. Returns `None` if the device
    /// cannot allocate the buffer.
    pub fn try_new(ctx: &dyn RenderContext, label: Option<&str>, capacity: usize) -> Option<Self> {
        let buffer = ctx.try_create_buffer(&wgpu::BufferDescriptor {
            label,
            size: Self::bytes_for(capacity),
            usage: wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })?;
        Some(Self {
            buffer,
            capacity,
            _marker: PhantomData,
        })
    }

    /// Bytes needed for `capacity` commands.
    pub fn bytes_for(capacity: usize) -> u64 {
        T::SIZE * capacity as u64
    }

    pub fn buffer(&self) -> &GpuBuffer {
        &self.buffer
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Byte offset of the command at `index`.
    pub fn offset_of(&self, index: usize) -> u64 {
        T::SIZE * index as u64
    }

    /// Write `commands` starting at index 0.
    pub fn write(&self, ctx: &dyn RenderContext, commands: &[T]) {
        debug_assert!(
            commands.len() <= self.capacity,
            "indirect write exceeds capacity: {} > {}",
            commands.len(),
            self.capacity
        );
        ctx.write_buffer(&self.buffer, 0, bytemuck::cast_slice(commands));
    }

    pub fn destroy(&self, ctx: &dyn RenderContext) {
        ctx.destroy_buffer(&self.buffer);
    }
}
