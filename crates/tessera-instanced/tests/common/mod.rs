#![allow(dead_code)]

use std::cell::RefCell;
use std::sync::Arc;

use tessera_instanced::{
    AntiAlias, Color, DrawIndexedIndirect, DrawPipeline, Instance, InstancedCaps, InstancedConfig,
    InstancedFeatures, InstancedOp, InstancedRendering, Matrix, OpAllocator, Paint, ProgramKey,
    Rect, TargetInfo,
};
use tessera_test_utils::{
    GpuBindGroup, GpuBuffer, GpuRenderPipeline, MockRenderContext, RenderPassRecorder,
};

pub const BASIC: InstancedFeatures =
    InstancedFeatures::INSTANCED_DRAW.union(InstancedFeatures::SHADER_DERIVATIVES);

pub fn engine_with(features: InstancedFeatures) -> (Arc<MockRenderContext>, InstancedRendering) {
    tessera_core::logging::init_with_filter("warn,tessera_instanced=debug");
    let ctx = Arc::new(MockRenderContext::new());
    let engine = InstancedRendering::new(ctx.clone(), InstancedCaps::new(features), InstancedConfig::default());
    (ctx, engine)
}

pub fn allocator() -> OpAllocator {
    OpAllocator::new(InstancedCaps::new(BASIC), InstancedConfig::default())
}

pub fn white() -> Paint {
    Paint::new(Color::WHITE)
}

pub fn single() -> TargetInfo {
    TargetInfo::single_sampled()
}

pub fn coverage_rect(alloc: &OpAllocator, rect: Rect) -> InstancedOp {
    alloc
        .record_rect(&rect, &Matrix::IDENTITY, white(), AntiAlias::On, &single())
        .expect("rect records")
}

pub fn coverage_oval(alloc: &OpAllocator, oval: Rect) -> InstancedOp {
    alloc
        .record_oval(&oval, &Matrix::IDENTITY, white(), AntiAlias::On, &single())
        .expect("oval records")
}

/// Two merged ops: two framed rects, then an oval followed by a framed rect.
pub fn two_ops(alloc: &OpAllocator) -> (InstancedOp, InstancedOp) {
    let mut first = coverage_rect(alloc, Rect::from_ltrb(0.0, 0.0, 10.0, 10.0));
    let mut b = coverage_rect(alloc, Rect::from_ltrb(20.0, 0.0, 30.0, 10.0));
    assert!(first.try_combine(&mut b, 65536.0));

    let mut second = coverage_oval(alloc, Rect::from_ltrb(0.0, 40.0, 10.0, 50.0));
    let mut d = coverage_rect(alloc, Rect::from_ltrb(20.0, 40.0, 30.0, 50.0));
    assert!(second.try_combine(&mut d, 65536.0));
    (first, second)
}

/// Binds a mock pipeline and records every program key it was asked for.
pub struct RecordingPipeline {
    pub pipeline: GpuRenderPipeline,
    pub params_group: GpuBindGroup,
    pub keys: RefCell<Vec<ProgramKey>>,
    pub accept: bool,
}

impl Default for RecordingPipeline {
    fn default() -> Self {
        Self {
            pipeline: GpuRenderPipeline::mock(1),
            params_group: GpuBindGroup::mock(2),
            keys: RefCell::new(Vec::new()),
            accept: true,
        }
    }
}

impl RecordingPipeline {
    /// A pipeline with no program for any key.
    pub fn refusing() -> Self {
        Self {
            accept: false,
            ..Self::default()
        }
    }
}

impl DrawPipeline for RecordingPipeline {
    fn bind(&self, pass: &mut dyn RenderPassRecorder, key: &ProgramKey, params: Option<&GpuBuffer>) -> bool {
        if !self.accept {
            return false;
        }
        self.keys.borrow_mut().push(*key);
        pass.set_pipeline(&self.pipeline);
        if params.is_some() {
            pass.set_bind_group(0, &self.params_group);
        }
        true
    }
}

pub fn uploaded_instances(ctx: &MockRenderContext) -> Vec<Instance> {
    let bytes = ctx
        .latest_buffer_data("tessera_instance_buffer")
        .expect("instance buffer uploaded");
    bytemuck::pod_collect_to_vec(&bytes)
}

pub fn uploaded_commands(ctx: &MockRenderContext) -> Vec<DrawIndexedIndirect> {
    let bytes = ctx
        .latest_buffer_data("tessera_indirect_buffer")
        .expect("indirect buffer uploaded");
    bytemuck::pod_collect_to_vec(&bytes)
}
