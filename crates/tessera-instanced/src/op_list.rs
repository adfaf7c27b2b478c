//! Per-target op list.
//!
//! Ops stay mutable while they are pending, so a new op can be merged into a
//! recent one. Execution seals every pending op into the engine and draws
//! them in order.

use crate::backend::FlushStats;
use crate::engine::{DrawPipeline, InstancedRendering};
use crate::error::FlushError;
use crate::op::InstancedOp;
use tessera_core::profiling::profile_function;
use tessera_test_utils::RenderPassRecorder;

/// Where [`OpList::add`] put an op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Merged into the pending op at this index.
    Merged(usize),
    /// Appended as a new pending op at this index.
    Appended(usize),
}

pub struct OpList {
    engine: InstancedRendering,
    pending: Vec<InstancedOp>,
}

impl OpList {
    pub fn new(engine: InstancedRendering) -> Self {
        Self {
            engine,
            pending: Vec::new(),
        }
    }

    pub fn engine(&self) -> &InstancedRendering {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut InstancedRendering {
        &mut self.engine
    }

    pub fn pending(&self) -> &[InstancedOp] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Merge `op` into one of the most recent pending ops, or append it.
    ///
    /// Candidates are tried newest first. The search stops at the first
    /// candidate that overlaps `op` without merging, since drawing `op`
    /// before it would break paint order.
    pub fn add(&mut self, mut op: InstancedOp) -> AddOutcome {
        profile_function!();
        let config = self.engine.config();
        let lookback = config.op_list_lookback;
        let threshold = config.rect_merge_pixel_threshold;
        let log_ops = config.log_ops;

        for (index, candidate) in self.pending.iter_mut().enumerate().rev().take(lookback) {
            if candidate.try_combine(&mut op, threshold) {
                if log_ops {
                    tracing::trace!("Merged op into pending op {index}: {} draws", candidate.num_draws());
                }
                return AddOutcome::Merged(index);
            }
            if candidate.bounds().intersects(op.bounds()) {
                break;
            }
        }

        self.pending.push(op);
        AddOutcome::Appended(self.pending.len() - 1)
    }

    /// Seal, flush and draw every pending op, leaving the list empty.
    pub fn execute(
        &mut self,
        pass: &mut dyn RenderPassRecorder,
        pipeline: &dyn DrawPipeline,
    ) -> Result<FlushStats, FlushError> {
        profile_function!();
        let tracked: Vec<_> = self
            .pending
            .drain(..)
            .filter_map(|op| self.engine.track(op))
            .collect();

        let mut flush = self.engine.begin_flush();
        if let Some(err) = flush.error() {
            drop(tracked);
            return Err(err);
        }
        for op in &tracked {
            flush.draw(pass, pipeline, op);
        }
        drop(tracked);
        flush.end();
        Ok(self.engine.last_flush_stats())
    }
}
