//! The per-target engine: tracked ops, canonical geometry and the
//! record/flush lifecycle.
//!
//! ```text
//! Recording --begin_flush()--> Flushing --drop FlushScope--> Recording
//! ```
//!
//! Recording is `&mut InstancedRendering`; flushing is the [`FlushScope`]
//! that borrows it, so ops cannot be tracked mid-flush.

use crate::allocator::OpAllocator;
use crate::backend::{BackendKind, CanonicalGeometry, FlushStats, InstancedBackend, create_backend};
use crate::config::InstancedConfig;
use crate::error::FlushError;
use crate::features::{InstancedCaps, InstancedSupport};
use crate::op::{InstancedOp, OpRegistry, TrackedOp};
use crate::processor::{InstanceProcessor, ProgramKey, ShapeProcessor};
use crate::types::{Instance, ParamsTexel};
use parking_lot::Mutex;
use std::sync::Arc;
use tessera_core::profiling::{new_frame, profile_function, profile_scope};
use tessera_test_utils::{GpuBuffer, RenderContext, RenderPassRecorder};

/// How [`InstancedRendering::reset_gpu_resources`] releases GPU memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetType {
    /// Destroy buffers on the device.
    Destroy,
    /// The device is gone; drop handles without touching it.
    Abandon,
}

/// Binds the shape program for an op.
pub trait DrawPipeline {
    /// Set the pipeline and bind groups for `key`, with `params` bound
    /// wherever the program reads params texels. Returns `false` if no
    /// program is available, in which case the op is skipped.
    fn bind(
        &self,
        pass: &mut dyn RenderPassRecorder,
        key: &ProgramKey,
        params: Option<&GpuBuffer>,
    ) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Recording,
    Flushing,
}

/// Instanced rendering for one render target.
pub struct InstancedRendering {
    context: Arc<dyn RenderContext>,
    caps: InstancedCaps,
    config: InstancedConfig,
    processor: Box<dyn ShapeProcessor>,
    support: InstancedSupport,
    registry: Arc<Mutex<OpRegistry>>,
    canonical: Option<CanonicalGeometry>,
    params_buffer: Option<GpuBuffer>,
    backend: Box<dyn InstancedBackend>,
    state: State,
    last_stats: FlushStats,
}

impl InstancedRendering {
    const VERTEX_LABEL: &'static str = "tessera_shape_vertices";
    const INDEX_LABEL: &'static str = "tessera_shape_indices";
    const PARAMS_LABEL: &'static str = "tessera_params_buffer";

    pub fn new(context: Arc<dyn RenderContext>, caps: InstancedCaps, config: InstancedConfig) -> Self {
        Self::with_processor(context, caps, config, Box::new(InstanceProcessor))
    }

    pub fn with_processor(
        context: Arc<dyn RenderContext>,
        caps: InstancedCaps,
        config: InstancedConfig,
        processor: Box<dyn ShapeProcessor>,
    ) -> Self {
        let support = processor.check_support(&caps);
        let backend = create_backend(&caps, &config);
        tracing::info!("Creating instanced rendering: {support} support, {} backend", backend.kind());
        Self {
            context,
            caps,
            config,
            processor,
            support,
            registry: Arc::new(Mutex::new(OpRegistry::default())),
            canonical: None,
            params_buffer: None,
            backend,
            state: State::Recording,
            last_stats: FlushStats::default(),
        }
    }

    /// An allocator recording against this engine's caps and config.
    pub fn create_allocator(&self) -> OpAllocator {
        OpAllocator::with_processor(self.caps, self.config.clone(), self.processor.as_ref())
    }

    pub fn context(&self) -> &Arc<dyn RenderContext> {
        &self.context
    }

    pub fn caps(&self) -> &InstancedCaps {
        &self.caps
    }

    pub fn config(&self) -> &InstancedConfig {
        &self.config
    }

    pub fn support(&self) -> InstancedSupport {
        self.support
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn tracked_ops(&self) -> usize {
        self.registry.lock().len()
    }

    /// Params texels accumulated by the ops tracked so far.
    pub fn params(&self) -> Vec<ParamsTexel> {
        self.registry.lock().params.clone()
    }

    pub fn last_flush_stats(&self) -> FlushStats {
        self.last_stats
    }

    /// Seal `op` into the engine.
    ///
    /// The op's params move into the shared params array and each draw's
    /// instance is patched to index it. Returns `None` for an op that was
    /// merged away, or if the params array would outgrow the instance's
    /// params index.
    pub fn track(&mut self, mut op: InstancedOp) -> Option<TrackedOp> {
        debug_assert_eq!(self.state, State::Recording);
        if op.is_empty() {
            tracing::debug!("Refusing to track an empty op");
            return None;
        }

        let mut registry = self.registry.lock();
        let base = registry.params.len();
        if base + op.params().len() > Instance::PARAMS_IDX_MASK as usize + 1 {
            tracing::warn!("Params buffer full, refusing op with {} texels", op.params().len());
            return None;
        }
        let base = base as u32;
        for draw in op.draws_mut() {
            if let Some(offset) = draw.params_offset {
                draw.instance.set_params_idx(base + offset);
            }
        }
        let params = op.take_params();
        registry.params.extend(params);

        let slot = registry.insert(op);
        let tracked = registry
            .get(slot)
            .map(|op| TrackedOp::new(slot, &self.registry, op));
        if self.config.log_ops
            && let Some(tracked) = &tracked
        {
            tracing::trace!("Tracked op {:?}", tracked);
        }
        tracked
    }

    /// Upload this flush's instances, commands and params.
    ///
    /// Does nothing if no ops are tracked. Allocation failures are reported
    /// by [`FlushScope::error`] and turn every draw of the flush into a no-op.
    pub fn begin_flush(&mut self) -> FlushScope<'_> {
        profile_function!();
        debug_assert_eq!(self.state, State::Recording);
        self.state = State::Flushing;
        self.last_stats = FlushStats::default();

        let registry = self.registry.clone();
        let registry = registry.lock();
        if registry.is_empty() {
            return FlushScope {
                engine: self,
                active: false,
                error: None,
            };
        }

        self.ensure_canonical_geometry();
        let mut error = self.upload_params(&registry.params).err();
        if error.is_none() {
            profile_scope!("backend_begin_flush");
            let ops: Vec<_> = registry.in_order().collect();
            error = self.backend.on_begin_flush(self.context.as_ref(), &ops).err();
        }
        drop(registry);

        FlushScope {
            engine: self,
            active: true,
            error,
        }
    }

    /// Release every GPU resource, including the canonical geometry. Tracked
    /// ops survive and buffers are recreated on the next flush.
    pub fn reset_gpu_resources(&mut self, reset: ResetType) {
        debug_assert_eq!(self.state, State::Recording);
        let destroy = reset == ResetType::Destroy;
        let ctx = self.context.as_ref();
        if let Some(canonical) = self.canonical.take()
            && destroy
        {
            canonical.destroy(ctx);
        }
        if let Some(params) = self.params_buffer.take()
            && destroy
        {
            ctx.destroy_buffer(&params);
        }
        self.backend.on_reset_gpu_resources(ctx, reset);
        tracing::debug!("Reset instanced GPU resources ({reset:?})");
    }

    fn ensure_canonical_geometry(&mut self) {
        if self.canonical.is_some() {
            return;
        }
        let vertices: &[u8] = bytemuck::cast_slice(self.processor.vertex_data());
        let indices: &[u8] = bytemuck::cast_slice(self.processor.index_data());
        let vertex_buffer = self.context.create_buffer(&wgpu::BufferDescriptor {
            label: Some(Self::VERTEX_LABEL),
            size: vertices.len() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.context.write_buffer(&vertex_buffer, 0, vertices);
        let index_buffer = self.context.create_buffer(&wgpu::BufferDescriptor {
            label: Some(Self::INDEX_LABEL),
            size: indices.len() as u64,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.context.write_buffer(&index_buffer, 0, indices);
        tracing::debug!(
            "Created canonical geometry: {} vertices, {} indices",
            self.processor.vertex_data().len(),
            self.processor.index_data().len()
        );
        self.canonical = Some(CanonicalGeometry {
            vertex_buffer,
            index_buffer,
        });
    }

    fn upload_params(&mut self, params: &[ParamsTexel]) -> Result<(), FlushError> {
        self.params_buffer = None;
        if params.is_empty() {
            return Ok(());
        }
        let bytes: &[u8] = bytemuck::cast_slice(params);
        let Some(buffer) = self.context.try_create_buffer(&wgpu::BufferDescriptor {
            label: Some(Self::PARAMS_LABEL),
            size: bytes.len() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }) else {
            let err = FlushError::ParamsBufferAllocation {
                bytes: bytes.len() as u64,
            };
            tracing::warn!("{err}");
            return Err(err);
        };
        self.context.write_buffer(&buffer, 0, bytes);
        self.params_buffer = Some(buffer);
        Ok(())
    }

    fn end_flush(&mut self, flushed: bool) {
        profile_function!();
        debug_assert_eq!(self.state, State::Flushing);

        let mut registry = self.registry.lock();
        if flushed {
            self.last_stats = FlushStats {
                params_texels: registry.params.len() as u32,
                ..self.backend.stats()
            };
            tracing::debug!(
                "Flushed {} ops: {} instances, {} commands, {} draw calls",
                self.last_stats.ops,
                self.last_stats.instances,
                self.last_stats.commands,
                self.last_stats.draw_calls
            );
            new_frame();
        }

        // Submitted work may still reference the per-flush buffers, so only
        // the handles are dropped here.
        self.backend.on_end_flush();
        self.params_buffer = None;

        if registry.is_empty() {
            registry.params.clear();
        } else {
            tracing::warn!("Ending flush with {} ops still tracked", registry.len());
            debug_assert!(
                std::thread::panicking(),
                "every tracked op must be dropped before the flush ends"
            );
        }
        self.state = State::Recording;
    }
}

/// An in-progress flush. Dropping it ends the flush.
pub struct FlushScope<'a> {
    engine: &'a mut InstancedRendering,
    /// False if there was nothing to flush.
    active: bool,
    error: Option<FlushError>,
}

impl FlushScope<'_> {
    /// Bind the program for `op` and emit its draws. Each op rebinds its own
    /// vertex, index and instance buffers, so ops of one flush may be spread
    /// over several render passes.
    pub fn draw(&mut self, pass: &mut dyn RenderPassRecorder, pipeline: &dyn DrawPipeline, op: &TrackedOp) {
        if !self.active || self.error.is_some() {
            return;
        }
        let engine = &mut *self.engine;
        debug_assert!(op.belongs_to(&engine.registry), "op was tracked by another engine");
        let Some(canonical) = &engine.canonical else {
            return;
        };
        let key = engine.processor.program_key(op.info());
        if !pipeline.bind(pass, &key, engine.params_buffer.as_ref()) {
            tracing::debug!("No program for {:?}, skipping op", key.info);
            return;
        }
        engine.backend.on_draw(pass, canonical, op.slot());
    }

    /// Why this flush draws nothing, if it failed.
    pub fn error(&self) -> Option<FlushError> {
        self.error
    }

    /// Counters so far.
    pub fn stats(&self) -> FlushStats {
        FlushStats {
            params_texels: self.engine.registry.lock().params.len() as u32,
            ..self.engine.backend.stats()
        }
    }

    /// End the flush. Equivalent to dropping the scope.
    pub fn end(self) {}
}

impl Drop for FlushScope<'_> {
    fn drop(&mut self) {
        self.engine.end_flush(self.active && self.error.is_none());
    }
}
