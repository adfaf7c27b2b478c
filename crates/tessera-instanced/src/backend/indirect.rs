//! Indirect backend: one `DrawIndexedIndirect` command per geometry run.
//!
//! An op with several runs is drawn with a single `multi_draw_indexed_indirect()`
//! when the device supports it together with base instances; otherwise each
//! command is issued on its own.

use super::{BackendKind, CanonicalGeometry, FlushStats, InstanceStream, InstancedBackend};
use crate::engine::ResetType;
use crate::error::FlushError;
use crate::features::{InstancedCaps, InstancedFeatures};
use crate::indirect::{DrawIndexedIndirect, IndirectBuffer};
use crate::op::InstancedOp;
use tessera_core::alloc::IndexSlot;
use tessera_core::profiling::profile_function;
use tessera_test_utils::{RenderContext, RenderPassRecorder};

pub(crate) struct IndirectBackend {
    stream: InstanceStream,
    multi_draw: bool,
    commands: Option<IndirectBuffer<DrawIndexedIndirect>>,
}

impl IndirectBackend {
    const LABEL: &'static str = "tessera_indirect_buffer";

    pub(crate) fn new(caps: &InstancedCaps) -> Self {
        Self {
            stream: InstanceStream::new(caps),
            multi_draw: caps.has(InstancedFeatures::MULTI_DRAW_INDIRECT),
            commands: None,
        }
    }
}

impl InstancedBackend for IndirectBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Indirect
    }

    fn on_begin_flush(
        &mut self,
        ctx: &dyn RenderContext,
        ops: &[(IndexSlot, &InstancedOp)],
    ) -> Result<(), FlushError> {
        self.commands = None;
        self.stream.prepare(ctx, ops)?;

        let base_instance = self.stream.has_base_instance();
        let commands: Vec<DrawIndexedIndirect> = self
            .stream
            .runs()
            .iter()
            .map(|run| {
                DrawIndexedIndirect::new(
                    run.geometry.count as u32,
                    run.instance_count,
                    run.geometry.start as u32,
                    0,
                    if base_instance { run.first_instance } else { 0 },
                )
            })
            .collect();

        let Some(buffer) = IndirectBuffer::try_new(ctx, Some(Self::LABEL), commands.len()) else {
            let err = FlushError::IndirectBufferAllocation {
                bytes: IndirectBuffer::<DrawIndexedIndirect>::bytes_for(commands.len()),
            };
            tracing::warn!("{err}");
            return Err(err);
        };
        buffer.write(ctx, &commands);
        self.commands = Some(buffer);
        Ok(())
    }

    fn on_draw(&mut self, pass: &mut dyn RenderPassRecorder, geometry: &CanonicalGeometry, slot: IndexSlot) {
        profile_function!();
        let Some(commands) = &self.commands else {
            return;
        };
        if !self.stream.is_ready() {
            return;
        }
        let Some(record) = self.stream.record(slot) else {
            return;
        };
        geometry.bind(pass);
        self.stream.begin_op();

        let base_instance = self.stream.has_base_instance();
        if record.run_count > 1 && self.multi_draw && base_instance {
            self.stream.bind(pass, 0);
            pass.multi_draw_indexed_indirect(
                commands.buffer(),
                commands.offset_of(record.first_run),
                record.run_count as u32,
            );
            self.stream.count_draw_call();
            return;
        }

        for i in record.first_run..record.first_run + record.run_count {
            let base = if base_instance {
                0
            } else {
                self.stream.runs()[i].first_instance
            };
            self.stream.bind(pass, base);
            pass.draw_indexed_indirect(commands.buffer(), commands.offset_of(i));
            self.stream.count_draw_call();
        }
    }

    fn on_end_flush(&mut self) {
        self.commands = None;
        self.stream.release_handles();
    }

    fn on_reset_gpu_resources(&mut self, ctx: &dyn RenderContext, reset: ResetType) {
        if let Some(commands) = self.commands.take()
            && reset == ResetType::Destroy
        {
            commands.destroy(ctx);
        }
        self.stream.release(ctx, reset == ResetType::Destroy);
    }

    fn stats(&self) -> FlushStats {
        self.stream.stats()
    }
}
