//! Mock implementations of the GPU boundary for testing.
//!
//! [`MockRenderContext`] keeps the bytes written to every buffer so tests can
//! decode uploaded instances and indirect commands. [`MockRenderPass`]
//! records each pass command in order.

use crate::{gpu_types::*, render_context::*};
use parking_lot::Mutex;
use std::ops::Range;
use wgpu::*;

/// Records a GPU operation call for verification in tests.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    CreateBuffer {
        buffer_id: usize,
        label: Option<String>,
        size: u64,
        usage: BufferUsages,
    },
    /// A `try_create_buffer` call that was configured to fail.
    FailedBufferCreate {
        label: Option<String>,
        size: u64,
    },
    WriteBuffer {
        buffer_id: usize,
        offset: u64,
        size: usize,
    },
    DestroyBuffer {
        buffer_id: usize,
    },
}

#[derive(Debug, Clone)]
struct MockBuffer {
    label: Option<String>,
    data: Vec<u8>,
    destroyed: bool,
}

/// Mock implementation of [`RenderContext`].
///
/// Uses `parking_lot::Mutex` for interior mutability, since the trait
/// requires `Send + Sync`.
///
/// # Example
///
/// ```rust
/// use tessera_test_utils::{MockRenderContext, RenderContext};
/// use wgpu::*;
///
/// let mock = MockRenderContext::new();
/// mock.fail_buffers_labeled("big");
///
/// let big = mock.try_create_buffer(&BufferDescriptor {
///     label: Some("big"),
///     size: 1 << 30,
///     usage: BufferUsages::VERTEX,
///     mapped_at_creation: false,
/// });
/// assert!(big.is_none());
/// ```
pub struct MockRenderContext {
    calls: Mutex<Vec<RenderCall>>,
    buffers: Mutex<Vec<MockBuffer>>,
    failing_labels: Mutex<Vec<String>>,
}

impl MockRenderContext {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            buffers: Mutex::new(Vec::new()),
            failing_labels: Mutex::new(Vec::new()),
        }
    }

    /// Make every later `try_create_buffer` with this label return `None`.
    pub fn fail_buffers_labeled(&self, label: &str) {
        self.failing_labels.lock().push(label.to_string());
    }

    /// Undo all [`fail_buffers_labeled`](Self::fail_buffers_labeled) calls.
    pub fn clear_failures(&self) {
        self.failing_labels.lock().clear();
    }

    /// Get a copy of all recorded calls (for test assertions).
    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().clone()
    }

    pub fn count_buffer_creates(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, RenderCall::CreateBuffer { .. }))
            .count()
    }

    pub fn count_buffer_writes(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, RenderCall::WriteBuffer { .. }))
            .count()
    }

    pub fn count_buffer_destroys(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| matches!(call, RenderCall::DestroyBuffer { .. }))
            .count()
    }

    /// Number of buffers created with `label`.
    pub fn count_buffers_labeled(&self, label: &str) -> usize {
        self.buffers
            .lock()
            .iter()
            .filter(|b| b.label.as_deref() == Some(label))
            .count()
    }

    /// Buffers created and not yet destroyed.
    pub fn live_buffer_count(&self) -> usize {
        self.buffers.lock().iter().filter(|b| !b.destroyed).count()
    }

    /// Current contents of a mock buffer.
    pub fn buffer_data(&self, buffer: &GpuBuffer) -> Option<Vec<u8>> {
        let id = buffer.mock_id()?;
        self.buffers.lock().get(id).map(|b| b.data.clone())
    }

    /// Contents of the most recently created buffer with `label`.
    pub fn latest_buffer_data(&self, label: &str) -> Option<Vec<u8>> {
        self.buffers
            .lock()
            .iter()
            .rev()
            .find(|b| b.label.as_deref() == Some(label))
            .map(|b| b.data.clone())
    }

    pub fn is_destroyed(&self, buffer: &GpuBuffer) -> bool {
        buffer
            .mock_id()
            .and_then(|id| self.buffers.lock().get(id).map(|b| b.destroyed))
            .unwrap_or(false)
    }

    /// Clear recorded calls (useful between test steps).
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    /// Get total number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn alloc(&self, desc: &BufferDescriptor) -> GpuBuffer {
        let mut buffers = self.buffers.lock();
        let id = buffers.len();
        let label = desc.label.map(|s| s.to_string());
        buffers.push(MockBuffer {
            label: label.clone(),
            data: vec![0; desc.size as usize],
            destroyed: false,
        });
        self.calls.lock().push(RenderCall::CreateBuffer {
            buffer_id: id,
            label,
            size: desc.size,
            usage: desc.usage,
        });
        GpuBuffer::mock(id, desc.size)
    }
}

impl Default for MockRenderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderContext for MockRenderContext {
    fn create_buffer(&self, desc: &BufferDescriptor) -> GpuBuffer {
        self.alloc(desc)
    }

    fn try_create_buffer(&self, desc: &BufferDescriptor) -> Option<GpuBuffer> {
        let fails = desc
            .label
            .is_some_and(|l| self.failing_labels.lock().iter().any(|f| f == l));
        if fails {
            self.calls.lock().push(RenderCall::FailedBufferCreate {
                label: desc.label.map(|s| s.to_string()),
                size: desc.size,
            });
            return None;
        }
        Some(self.alloc(desc))
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) {
        let Some(buffer_id) = buffer.mock_id() else {
            return;
        };
        if let Some(mock) = self.buffers.lock().get_mut(buffer_id) {
            let start = offset as usize;
            let end = start + data.len();
            if mock.data.len() < end {
                mock.data.resize(end, 0);
            }
            mock.data[start..end].copy_from_slice(data);
        }
        self.calls.lock().push(RenderCall::WriteBuffer {
            buffer_id,
            offset,
            size: data.len(),
        });
    }

    fn destroy_buffer(&self, buffer: &GpuBuffer) {
        let Some(buffer_id) = buffer.mock_id() else {
            return;
        };
        if let Some(mock) = self.buffers.lock().get_mut(buffer_id) {
            mock.destroyed = true;
        }
        self.calls
            .lock()
            .push(RenderCall::DestroyBuffer { buffer_id });
    }
}

/// A render pass command recorded by [`MockRenderPass`].
#[derive(Debug, Clone, PartialEq)]
pub enum PassCall {
    SetPipeline {
        pipeline_id: Option<usize>,
    },
    SetBindGroup {
        index: u32,
        bind_group_id: Option<usize>,
    },
    SetIndexBuffer {
        buffer_id: Option<usize>,
        format: IndexFormat,
    },
    SetVertexBuffer {
        slot: u32,
        buffer_id: Option<usize>,
        offset: u64,
    },
    DrawIndexed {
        indices: Range<u32>,
        base_vertex: i32,
        instances: Range<u32>,
    },
    DrawIndexedIndirect {
        buffer_id: Option<usize>,
        offset: u64,
    },
    MultiDrawIndexedIndirect {
        buffer_id: Option<usize>,
        offset: u64,
        count: u32,
    },
}

impl PassCall {
    /// True for any call that submits geometry.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            PassCall::DrawIndexed { .. }
                | PassCall::DrawIndexedIndirect { .. }
                | PassCall::MultiDrawIndexedIndirect { .. }
        )
    }
}

/// Mock render pass that records commands in issue order.
#[derive(Debug, Default)]
pub struct MockRenderPass {
    calls: Vec<PassCall>,
}

impl MockRenderPass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &[PassCall] {
        &self.calls
    }

    /// Calls that submit geometry, in order.
    pub fn draw_calls(&self) -> Vec<&PassCall> {
        self.calls.iter().filter(|c| c.is_draw()).collect()
    }

    pub fn count_draws(&self) -> usize {
        self.calls.iter().filter(|c| c.is_draw()).count()
    }

    /// `SetVertexBuffer` calls for `slot`, in order.
    pub fn vertex_bindings(&self, slot: u32) -> Vec<&PassCall> {
        self.calls
            .iter()
            .filter(|c| matches!(c, PassCall::SetVertexBuffer { slot: s, .. } if *s == slot))
            .collect()
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }
}

impl RenderPassRecorder for MockRenderPass {
    fn set_pipeline(&mut self, pipeline: &GpuRenderPipeline) {
        self.calls.push(PassCall::SetPipeline {
            pipeline_id: pipeline.mock_id(),
        });
    }

    fn set_bind_group(&mut self, index: u32, bind_group: &GpuBindGroup) {
        self.calls.push(PassCall::SetBindGroup {
            index,
            bind_group_id: bind_group.mock_id(),
        });
    }

    fn set_index_buffer(&mut self, buffer: &GpuBuffer, format: IndexFormat) {
        self.calls.push(PassCall::SetIndexBuffer {
            buffer_id: buffer.mock_id(),
            format,
        });
    }

    fn set_vertex_buffer(&mut self, slot: u32, buffer: &GpuBuffer, offset: u64) {
        self.calls.push(PassCall::SetVertexBuffer {
            slot,
            buffer_id: buffer.mock_id(),
            offset,
        });
    }

    fn draw_indexed(&mut self, indices: Range<u32>, base_vertex: i32, instances: Range<u32>) {
        self.calls.push(PassCall::DrawIndexed {
            indices,
            base_vertex,
            instances,
        });
    }

    fn draw_indexed_indirect(&mut self, indirect_buffer: &GpuBuffer, indirect_offset: u64) {
        self.calls.push(PassCall::DrawIndexedIndirect {
            buffer_id: indirect_buffer.mock_id(),
            offset: indirect_offset,
        });
    }

    fn multi_draw_indexed_indirect(
        &mut self,
        indirect_buffer: &GpuBuffer,
        indirect_offset: u64,
        count: u32,
    ) {
        self.calls.push(PassCall::MultiDrawIndexedIndirect {
            buffer_id: indirect_buffer.mock_id(),
            offset: indirect_offset,
            count,
        });
    }
}
