//! Instanced shape batching.
//!
//! Turns requests to draw rects, ovals, round rects and double round rects
//! into batched instanced draws over a small set of canonical geometry.
//!
//! The flow for one frame:
//!
//! 1. [`OpAllocator`] records shapes into mutable [`InstancedOp`]s, choosing
//!    the antialiasing mode, the canonical-square matrix and the geometry range.
//! 2. [`OpList`] merges compatible ops within a bounded lookback window.
//! 3. [`InstancedRendering::track`] seals each op into a [`TrackedOp`].
//! 4. [`InstancedRendering::begin_flush`] uploads instances and commands,
//!    [`FlushScope::draw`] emits native draws per op, and dropping the scope
//!    releases the per-flush buffers.
//!
//! Unsupported requests return `None` from the recording calls; callers fall
//! back to a non-instanced path.

mod allocator;
mod backend;
mod config;
mod context;
mod engine;
mod error;
mod features;
mod indirect;
mod op;
mod op_list;
mod paint;
mod processor;
mod types;

pub use allocator::{OpAllocator, TargetInfo};
pub use backend::{BackendKind, FlushStats, select_backend_kind};
pub use config::InstancedConfig;
pub use context::{GraphicsContext, GraphicsContextDescriptor, GraphicsError};
pub use engine::{DrawPipeline, FlushScope, InstancedRendering, ResetType};
pub use error::FlushError;
pub use features::{InstancedCaps, InstancedFeatures, InstancedSupport};
pub use indirect::{DrawIndexedIndirect, IndirectBuffer, IndirectCommand};
pub use op::{DrawPool, InstancedOp, TrackedOp};
pub use op_list::{AddOutcome, OpList};
pub use paint::{Color, Paint, ProcessorFlags, ProcessorSet, SrgbFlags};
pub use processor::{
    INDEX_DATA, InstanceProcessor, NUM_ATTRIBS, ProgramKey, ShapeProcessor, ShapeVertex,
    VERTEX_DATA, index_range_name, instance_layout,
};
pub use types::{
    AaType, AntiAlias, Draw, IndexRange, Instance, OpInfo, ParamsTexel, ShapeFlags, ShapeType,
};

// Re-export the geometry the recording API is written against.
pub use tessera_core::geometry::{Corner, Matrix, RRect, RRectType, Rect};
