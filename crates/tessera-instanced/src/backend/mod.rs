//! Per-flush GPU submission.
//!
//! Two backends are selected at runtime behind [`InstancedBackend`]:
//!
//! | Backend  | Draw strategy |
//! |----------|---------------|
//! | Direct   | `draw_indexed()` per geometry run |
//! | Indirect | One `DrawIndexedIndirect` per run, `multi_draw_indexed_indirect()` per op when allowed |
//!
//! Both pack one [`Instance`] per draw into a single instance buffer. A run is
//! a maximal sequence of consecutive draws within an op that share geometry,
//! so an op issues `1 + geometry_changes` commands.

mod direct;
mod indirect;

use crate::config::InstancedConfig;
use crate::engine::ResetType;
use crate::error::FlushError;
use crate::features::{InstancedCaps, InstancedFeatures};
use crate::op::InstancedOp;
use crate::types::{IndexRange, Instance};
use tessera_core::alloc::{HashMap, IndexSlot};
use tessera_core::profiling::profile_function;
use tessera_test_utils::{GpuBuffer, RenderContext, RenderPassRecorder};

/// Submission strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Instanced `draw_indexed()` calls. Needs nothing beyond instancing.
    Direct,
    /// Indirect commands. Needs `DRAW_INDIRECT`.
    Indirect,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Direct => write!(f, "Direct"),
            BackendKind::Indirect => write!(f, "Indirect"),
        }
    }
}

/// Pick the backend for a device. An override the device cannot honor falls
/// back to [`BackendKind::Direct`].
pub fn select_backend_kind(caps: &InstancedCaps, kind_override: Option<BackendKind>) -> BackendKind {
    let supported = if caps.has(InstancedFeatures::DRAW_INDIRECT) {
        BackendKind::Indirect
    } else {
        BackendKind::Direct
    };
    match kind_override {
        Some(BackendKind::Indirect) if supported == BackendKind::Direct => {
            tracing::warn!("Indirect backend requested but draw-indirect is unsupported, using Direct");
            BackendKind::Direct
        }
        Some(kind) => kind,
        None => supported,
    }
}

/// Counters from the last flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub ops: u32,
    pub instances: u32,
    /// Geometry runs, one command each.
    pub commands: u32,
    /// Native draw calls issued.
    pub draw_calls: u32,
    /// Times the instance buffer was bound to the instance slot.
    pub instance_rebinds: u32,
    pub params_texels: u32,
}

/// Canonical shape geometry, bound before every op.
pub(crate) struct CanonicalGeometry {
    pub(crate) vertex_buffer: GpuBuffer,
    pub(crate) index_buffer: GpuBuffer,
}

impl CanonicalGeometry {
    pub(crate) const VERTEX_SLOT: u32 = 0;

    pub(crate) fn bind(&self, pass: &mut dyn RenderPassRecorder) {
        pass.set_index_buffer(&self.index_buffer, wgpu::IndexFormat::Uint16);
        pass.set_vertex_buffer(Self::VERTEX_SLOT, &self.vertex_buffer, 0);
    }

    pub(crate) fn destroy(&self, ctx: &dyn RenderContext) {
        ctx.destroy_buffer(&self.vertex_buffer);
        ctx.destroy_buffer(&self.index_buffer);
    }
}

/// Consecutive draws of one op sharing geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Run {
    pub(crate) geometry: IndexRange,
    pub(crate) first_instance: u32,
    pub(crate) instance_count: u32,
}

/// Where an op's runs and instances live in the per-flush buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OpRecord {
    pub(crate) first_run: usize,
    pub(crate) run_count: usize,
    pub(crate) first_instance: u32,
}

/// Submits tracked ops to the GPU.
///
/// `on_begin_flush` lays out every op's instances and commands up front;
/// `on_draw` replays the grouping recorded for one op.
pub(crate) trait InstancedBackend: Send {
    fn kind(&self) -> BackendKind;

    fn on_begin_flush(
        &mut self,
        ctx: &dyn RenderContext,
        ops: &[(IndexSlot, &InstancedOp)],
    ) -> Result<(), FlushError>;

    /// Does nothing if the per-flush buffers failed to allocate.
    fn on_draw(&mut self, pass: &mut dyn RenderPassRecorder, geometry: &CanonicalGeometry, slot: IndexSlot);

    fn on_end_flush(&mut self);

    fn on_reset_gpu_resources(&mut self, ctx: &dyn RenderContext, reset: ResetType);

    fn stats(&self) -> FlushStats;
}

/// Create the backend for `caps`, honoring `config.backend_override`.
pub(crate) fn create_backend(caps: &InstancedCaps, config: &InstancedConfig) -> Box<dyn InstancedBackend> {
    let kind = select_backend_kind(caps, config.backend_override);

    tracing::info!("Creating instanced backend: {kind}");

    match kind {
        BackendKind::Direct => Box::new(direct::DirectBackend::new(caps)),
        BackendKind::Indirect => Box::new(indirect::IndirectBackend::new(caps)),
    }
}

/// Instance buffer and run layout shared by both backends.
pub(crate) struct InstanceStream {
    base_instance: bool,
    buffer: Option<GpuBuffer>,
    runs: Vec<Run>,
    records: HashMap<IndexSlot, OpRecord>,
    bound_offset: Option<u64>,
    stats: FlushStats,
}

impl InstanceStream {
    const LABEL: &'static str = "tessera_instance_buffer";
    pub(crate) const INSTANCE_SLOT: u32 = 1;

    pub(crate) fn new(caps: &InstancedCaps) -> Self {
        Self {
            base_instance: caps.has(InstancedFeatures::BASE_INSTANCE),
            buffer: None,
            runs: Vec::new(),
            records: HashMap::new(),
            bound_offset: None,
            stats: FlushStats::default(),
        }
    }

    pub(crate) fn has_base_instance(&self) -> bool {
        self.base_instance
    }

    /// Group the ops into runs and upload their instances.
    pub(crate) fn prepare(
        &mut self,
        ctx: &dyn RenderContext,
        ops: &[(IndexSlot, &InstancedOp)],
    ) -> Result<(), FlushError> {
        profile_function!();
        self.release_handles();
        self.stats = FlushStats::default();

        let mut instances: Vec<Instance> = Vec::with_capacity(ops.iter().map(|(_, op)| op.num_draws()).sum());
        for (slot, op) in ops {
            let first_run = self.runs.len();
            let first_instance = instances.len() as u32;
            for draw in op.draws() {
                let index = instances.len() as u32;
                instances.push(draw.instance);
                let tail = self.runs[first_run..].last_mut();
                match tail {
                    Some(run) if run.geometry == draw.geometry => run.instance_count += 1,
                    _ => self.runs.push(Run {
                        geometry: draw.geometry,
                        first_instance: index,
                        instance_count: 1,
                    }),
                }
            }
            let run_count = self.runs.len() - first_run;
            debug_assert_eq!(run_count as u32, 1 + op.geometry_changes());
            self.records.insert(
                *slot,
                OpRecord {
                    first_run,
                    run_count,
                    first_instance,
                },
            );
        }

        self.stats.ops = ops.len() as u32;
        self.stats.instances = instances.len() as u32;
        self.stats.commands = self.runs.len() as u32;

        let bytes: &[u8] = bytemuck::cast_slice(&instances);
        let Some(buffer) = ctx.try_create_buffer(&wgpu::BufferDescriptor {
            label: Some(Self::LABEL),
            size: bytes.len() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }) else {
            let err = FlushError::InstanceBufferAllocation {
                bytes: bytes.len() as u64,
            };
            tracing::warn!("{err}");
            return Err(err);
        };
        ctx.write_buffer(&buffer, 0, bytes);
        self.buffer = Some(buffer);
        Ok(())
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.buffer.is_some()
    }

    pub(crate) fn record(&self, slot: IndexSlot) -> Option<OpRecord> {
        self.records.get(&slot).copied()
    }

    pub(crate) fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Forget the current instance-slot binding. Called at the start of each
    /// op, since consecutive ops may be drawn into different passes.
    pub(crate) fn begin_op(&mut self) {
        self.bound_offset = None;
    }

    /// Bind the instance buffer so instance 0 of the next draw is
    /// `base_instance`. Skips the call if that binding is already current.
    pub(crate) fn bind(&mut self, pass: &mut dyn RenderPassRecorder, base_instance: u32) {
        let Some(buffer) = &self.buffer else {
            return;
        };
        let offset = base_instance as u64 * std::mem::size_of::<Instance>() as u64;
        if self.bound_offset == Some(offset) {
            return;
        }
        pass.set_vertex_buffer(Self::INSTANCE_SLOT, buffer, offset);
        self.bound_offset = Some(offset);
        self.stats.instance_rebinds += 1;
    }

    pub(crate) fn count_draw_call(&mut self) {
        self.stats.draw_calls += 1;
    }

    pub(crate) fn stats(&self) -> FlushStats {
        self.stats
    }

    /// Drop the instance buffer, destroying it first if `destroy` is set.
    pub(crate) fn release(&mut self, ctx: &dyn RenderContext, destroy: bool) {
        if let Some(buffer) = &self.buffer
            && destroy
        {
            ctx.destroy_buffer(buffer);
        }
        self.release_handles();
    }

    /// Drop the instance buffer without destroying it. The device frees it
    /// once submitted work no longer references it.
    pub(crate) fn release_handles(&mut self) {
        self.buffer = None;
        self.runs.clear();
        self.records.clear();
        self.bound_offset = None;
    }
}
