//! GPU resource wrappers that can be real or mock.
//!
//! Users hold owned wrappers, which are cheap to clone since `wgpu` handles
//! are reference counted internally.

/// Wrapper around a GPU buffer that can be real or mock.
#[derive(Clone, Debug)]
pub struct GpuBuffer {
    inner: GpuBufferInner,
}

#[derive(Clone, Debug)]
enum GpuBufferInner {
    Real(wgpu::Buffer),
    #[cfg(feature = "mock")]
    Mock { id: usize, size: u64 },
}

impl GpuBuffer {
    /// Create from real WGPU buffer
    pub fn from_wgpu(buffer: wgpu::Buffer) -> Self {
        Self {
            inner: GpuBufferInner::Real(buffer),
        }
    }

    /// Create mock buffer (for testing)
    #[cfg(feature = "mock")]
    pub fn mock(id: usize, size: u64) -> Self {
        Self {
            inner: GpuBufferInner::Mock { id, size },
        }
    }

    /// The underlying `wgpu::Buffer`, or `None` for a mock buffer.
    pub fn as_wgpu(&self) -> Option<&wgpu::Buffer> {
        match &self.inner {
            GpuBufferInner::Real(buffer) => Some(buffer),
            #[cfg(feature = "mock")]
            GpuBufferInner::Mock { .. } => None,
        }
    }

    pub fn size(&self) -> u64 {
        match &self.inner {
            GpuBufferInner::Real(buffer) => buffer.size(),
            #[cfg(feature = "mock")]
            GpuBufferInner::Mock { size, .. } => *size,
        }
    }

    /// True if both wrappers refer to the same underlying buffer.
    pub fn same_buffer(&self, other: &GpuBuffer) -> bool {
        match (&self.inner, &other.inner) {
            (GpuBufferInner::Real(a), GpuBufferInner::Real(b)) => a == b,
            #[cfg(feature = "mock")]
            (GpuBufferInner::Mock { id: a, .. }, GpuBufferInner::Mock { id: b, .. }) => a == b,
            #[cfg(feature = "mock")]
            _ => false,
        }
    }

    /// Check if this is a mock (useful in tests)
    #[cfg(feature = "mock")]
    pub fn is_mock(&self) -> bool {
        matches!(self.inner, GpuBufferInner::Mock { .. })
    }

    /// Get mock ID (for test assertions)
    #[cfg(feature = "mock")]
    pub fn mock_id(&self) -> Option<usize> {
        match &self.inner {
            GpuBufferInner::Mock { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// Wrapper around a GPU render pipeline that can be real or mock.
#[derive(Clone, Debug)]
pub struct GpuRenderPipeline {
    inner: GpuRenderPipelineInner,
}

#[derive(Clone, Debug)]
enum GpuRenderPipelineInner {
    Real(wgpu::RenderPipeline),
    #[cfg(feature = "mock")]
    Mock { id: usize },
}

impl GpuRenderPipeline {
    pub fn from_wgpu(pipeline: wgpu::RenderPipeline) -> Self {
        Self {
            inner: GpuRenderPipelineInner::Real(pipeline),
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock(id: usize) -> Self {
        Self {
            inner: GpuRenderPipelineInner::Mock { id },
        }
    }

    pub fn as_wgpu(&self) -> Option<&wgpu::RenderPipeline> {
        match &self.inner {
            GpuRenderPipelineInner::Real(pipeline) => Some(pipeline),
            #[cfg(feature = "mock")]
            GpuRenderPipelineInner::Mock { .. } => None,
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock_id(&self) -> Option<usize> {
        match &self.inner {
            GpuRenderPipelineInner::Mock { id } => Some(*id),
            _ => None,
        }
    }
}

/// Wrapper around a GPU bind group that can be real or mock.
#[derive(Clone, Debug)]
pub struct GpuBindGroup {
    inner: GpuBindGroupInner,
}

#[derive(Clone, Debug)]
enum GpuBindGroupInner {
    Real(wgpu::BindGroup),
    #[cfg(feature = "mock")]
    Mock { id: usize },
}

impl GpuBindGroup {
    pub fn from_wgpu(bind_group: wgpu::BindGroup) -> Self {
        Self {
            inner: GpuBindGroupInner::Real(bind_group),
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock(id: usize) -> Self {
        Self {
            inner: GpuBindGroupInner::Mock { id },
        }
    }

    pub fn as_wgpu(&self) -> Option<&wgpu::BindGroup> {
        match &self.inner {
            GpuBindGroupInner::Real(bind_group) => Some(bind_group),
            #[cfg(feature = "mock")]
            GpuBindGroupInner::Mock { .. } => None,
        }
    }

    #[cfg(feature = "mock")]
    pub fn mock_id(&self) -> Option<usize> {
        match &self.inner {
            GpuBindGroupInner::Mock { id } => Some(*id),
            _ => None,
        }
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;

    #[test]
    fn test_mock_buffer_identity() {
        let a = GpuBuffer::mock(1, 64);
        let b = GpuBuffer::mock(1, 64);
        let c = GpuBuffer::mock(2, 64);
        assert!(a.same_buffer(&b));
        assert!(!a.same_buffer(&c));
        assert_eq!(a.size(), 64);
        assert!(a.as_wgpu().is_none());
    }
}
