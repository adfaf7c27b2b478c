//! wgpu device glue.
//!
//! [`GraphicsContext`] owns the wgpu instance, adapter, device and queue and
//! implements [`RenderContext`] so the engine can run on a real device.

use crate::features::InstancedCaps;
use std::sync::Arc;
use tessera_test_utils::{GpuBuffer, RenderContext};

/// Failure to bring up a wgpu device.
#[derive(Debug)]
pub enum GraphicsError {
    AdapterNotFound(wgpu::RequestAdapterError),
    DeviceCreation(wgpu::RequestDeviceError),
}

impl std::fmt::Display for GraphicsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphicsError::AdapterNotFound(e) => write!(f, "failed to find a suitable GPU adapter: {e}"),
            GraphicsError::DeviceCreation(e) => write!(f, "failed to create device: {e}"),
        }
    }
}

impl std::error::Error for GraphicsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GraphicsError::AdapterNotFound(e) => Some(e),
            GraphicsError::DeviceCreation(e) => Some(e),
        }
    }
}

/// Configuration for creating a [`GraphicsContext`].
#[derive(Debug, Clone)]
pub struct GraphicsContextDescriptor {
    pub backends: wgpu::Backends,
    pub power_preference: wgpu::PowerPreference,
    pub force_fallback_adapter: bool,
    /// Raw wgpu features to request when the adapter has them, such as
    /// `INDIRECT_FIRST_INSTANCE`.
    pub requested_features: wgpu::Features,
    pub limits: wgpu::Limits,
    pub label: Option<&'static str>,
}

impl Default for GraphicsContextDescriptor {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            requested_features: wgpu::Features::INDIRECT_FIRST_INSTANCE,
            limits: wgpu::Limits::default(),
            label: None,
        }
    }
}

impl GraphicsContextDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backends(mut self, backends: wgpu::Backends) -> Self {
        self.backends = backends;
        self
    }

    pub fn with_fallback_adapter(mut self, force: bool) -> Self {
        self.force_fallback_adapter = force;
        self
    }

    pub fn with_limits(mut self, limits: wgpu::Limits) -> Self {
        self.limits = limits;
        self
    }
}

/// A shared wgpu device.
///
/// ```rust,no_run
/// use tessera_instanced::GraphicsContext;
///
/// let ctx = GraphicsContext::new_owned_sync().expect("no GPU");
/// let caps = ctx.caps();
/// ```
pub struct GraphicsContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

impl GraphicsContext {
    pub async fn new_owned() -> Result<Arc<Self>, GraphicsError> {
        Self::new_owned_with_descriptor(GraphicsContextDescriptor::default()).await
    }

    /// Blocks the current thread until the context is created.
    pub fn new_owned_sync() -> Result<Arc<Self>, GraphicsError> {
        pollster::block_on(Self::new_owned())
    }

    pub async fn new_owned_with_descriptor(
        descriptor: GraphicsContextDescriptor,
    ) -> Result<Arc<Self>, GraphicsError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: descriptor.backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: descriptor.power_preference,
                compatible_surface: None,
                force_fallback_adapter: descriptor.force_fallback_adapter,
            })
            .await
            .map_err(GraphicsError::AdapterNotFound)?;

        let available = adapter.features() & descriptor.requested_features;
        let missing = descriptor.requested_features - available;
        if !missing.is_empty() {
            tracing::warn!("Some requested GPU features are not available: {:?}", missing);
        }

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                required_features: available,
                required_limits: descriptor.limits.clone(),
                label: descriptor.label,
                ..Default::default()
            })
            .await
            .map_err(GraphicsError::DeviceCreation)?;

        tracing::info!(
            "Created graphics context on {} with features: {:?}",
            adapter.get_info().name,
            available
        );

        Ok(Arc::new(Self {
            instance,
            adapter,
            device,
            queue,
        }))
    }

    pub fn info(&self) -> wgpu::AdapterInfo {
        self.adapter.get_info()
    }

    pub fn limits(&self) -> wgpu::Limits {
        self.device.limits()
    }

    /// What the instanced engine can use on this device.
    pub fn caps(&self) -> InstancedCaps {
        InstancedCaps::from_wgpu(
            self.device.features(),
            self.adapter.get_downlevel_capabilities().flags,
            &self.device.limits(),
        )
    }
}

impl RenderContext for GraphicsContext {
    fn create_buffer(&self, desc: &wgpu::BufferDescriptor) -> GpuBuffer {
        GpuBuffer::from_wgpu(self.device.create_buffer(desc))
    }

    fn try_create_buffer(&self, desc: &wgpu::BufferDescriptor) -> Option<GpuBuffer> {
        if desc.size > self.device.limits().max_buffer_size {
            return None;
        }
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self.device.create_buffer(desc);
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            tracing::warn!("Buffer {:?} allocation failed: {err}", desc.label);
            return None;
        }
        Some(GpuBuffer::from_wgpu(buffer))
    }

    fn write_buffer(&self, buffer: &GpuBuffer, offset: u64, data: &[u8]) {
        if let Some(buffer) = buffer.as_wgpu() {
            self.queue.write_buffer(buffer, offset, data);
        }
    }

    fn destroy_buffer(&self, buffer: &GpuBuffer) {
        if let Some(buffer) = buffer.as_wgpu() {
            buffer.destroy();
        }
    }
}
