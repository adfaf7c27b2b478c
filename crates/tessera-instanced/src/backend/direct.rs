//! Direct backend: one instanced `draw_indexed()` per geometry run.

use super::{BackendKind, CanonicalGeometry, FlushStats, InstanceStream, InstancedBackend};
use crate::engine::ResetType;
use crate::error::FlushError;
use crate::features::InstancedCaps;
use crate::op::InstancedOp;
use tessera_core::alloc::IndexSlot;
use tessera_core::profiling::profile_function;
use tessera_test_utils::{RenderContext, RenderPassRecorder};

pub(crate) struct DirectBackend {
    stream: InstanceStream,
}

impl DirectBackend {
    pub(crate) fn new(caps: &InstancedCaps) -> Self {
        Self {
            stream: InstanceStream::new(caps),
        }
    }
}

impl InstancedBackend for DirectBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Direct
    }

    fn on_begin_flush(
        &mut self,
        ctx: &dyn RenderContext,
        ops: &[(IndexSlot, &InstancedOp)],
    ) -> Result<(), FlushError> {
        self.stream.prepare(ctx, ops)
    }

    fn on_draw(&mut self, pass: &mut dyn RenderPassRecorder, geometry: &CanonicalGeometry, slot: IndexSlot) {
        profile_function!();
        if !self.stream.is_ready() {
            return;
        }
        let Some(record) = self.stream.record(slot) else {
            return;
        };
        geometry.bind(pass);
        self.stream.begin_op();
        debug_assert_eq!(self.stream.runs()[record.first_run].first_instance, record.first_instance);

        let base_instance = self.stream.has_base_instance();
        for i in record.first_run..record.first_run + record.run_count {
            let run = self.stream.runs()[i];
            let end = run.first_instance + run.instance_count;
            if base_instance {
                self.stream.bind(pass, 0);
                pass.draw_indexed(run.geometry.indices(), 0, run.first_instance..end);
            } else {
                // Emulate the base instance by offsetting the binding.
                self.stream.bind(pass, run.first_instance);
                pass.draw_indexed(run.geometry.indices(), 0, 0..run.instance_count);
            }
            self.stream.count_draw_call();
        }
    }

    fn on_end_flush(&mut self) {
        self.stream.release_handles();
    }

    fn on_reset_gpu_resources(&mut self, ctx: &dyn RenderContext, reset: ResetType) {
        self.stream.release(ctx, reset == ResetType::Destroy);
    }

    fn stats(&self) -> FlushStats {
        self.stream.stats()
    }
}
