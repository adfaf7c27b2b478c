mod common;

use common::*;
use tessera_instanced::{
    AaType, AntiAlias, InstancedCaps, InstancedConfig, InstancedFeatures, Matrix, OpAllocator,
    ShapeFlags, TargetInfo,
};
use tessera_instanced::Rect;
use tessera_test_utils::MockRenderPass;

fn multisampled_caps() -> InstancedCaps {
    InstancedCaps::new(
        BASIC | InstancedFeatures::SAMPLE_LOCATIONS | InstancedFeatures::SAMPLE_VARIABLES,
    )
}

#[test]
fn test_plain_rect_without_aa() {
    let alloc = allocator();
    let op = alloc
        .record_rect(
            &Rect::from_ltrb(0.0, 0.0, 10.0, 10.0),
            &Matrix::IDENTITY,
            white(),
            AntiAlias::Off,
            &TargetInfo::single_sampled(),
        )
        .expect("rect records");

    assert_eq!(op.info().aa_type(), AaType::None);
    assert_eq!(op.info().shape_types(), ShapeFlags::RECT);
    assert_eq!(op.num_draws(), 1);
    assert_eq!(op.draws()[0].instance.shape_matrix, [5.0, 0.0, 5.0, 0.0, 5.0, 5.0]);
}

#[test]
fn test_rotated_rect_uses_coverage_on_single_sampled_target() {
    let alloc = allocator();
    let op = alloc
        .record_rect(
            &Rect::from_ltrb(0.0, 0.0, 10.0, 10.0),
            &Matrix::rotate_deg(45.0),
            white(),
            AntiAlias::On,
            &TargetInfo::single_sampled(),
        )
        .expect("rotation keeps right angles");
    assert_eq!(op.info().aa_type(), AaType::Coverage);
}

#[test]
fn test_rotated_rect_uses_msaa_on_multisampled_target() {
    let alloc = OpAllocator::new(multisampled_caps(), InstancedConfig::default());
    let op = alloc
        .record_rect(
            &Rect::from_ltrb(0.0, 0.0, 10.0, 10.0),
            &Matrix::rotate_deg(45.0),
            white(),
            AntiAlias::On,
            &TargetInfo::multisampled(),
        )
        .expect("msaa available");
    assert_eq!(op.info().aa_type(), AaType::Msaa);
}

#[test]
fn test_skewed_rect_without_msaa_is_rejected() {
    let alloc = allocator();
    let skew = Matrix::from_affine([1.0, 0.5, 0.0, 0.0, 1.0, 0.0]);
    let op = alloc.record_rect(
        &Rect::from_ltrb(0.0, 0.0, 10.0, 10.0),
        &skew,
        white(),
        AntiAlias::On,
        &TargetInfo::single_sampled(),
    );
    assert!(op.is_none());
}

#[test]
fn test_small_disjoint_rects_merge() {
    let alloc = allocator();
    let mut a = coverage_rect(&alloc, Rect::from_ltrb(0.0, 0.0, 10.0, 10.0));
    let mut b = coverage_rect(&alloc, Rect::from_ltrb(100.0, 100.0, 110.0, 110.0));
    let (a_bounds, b_bounds) = (*a.bounds(), *b.bounds());

    assert!(a.try_combine(&mut b, 65536.0));
    assert_eq!(a.num_draws(), 2);
    assert_eq!(*a.bounds(), a_bounds.union(&b_bounds));
    assert_eq!(a.geometry_changes(), 0);
    assert!(b.is_empty());
}

#[test]
fn test_large_rect_refuses_oval() {
    let alloc = allocator();
    let big = Rect::from_ltrb(0.0, 0.0, 300.0, 300.0);
    let oval = Rect::from_ltrb(400.0, 0.0, 410.0, 10.0);

    let mut rect_op = coverage_rect(&alloc, big);
    let mut oval_op = coverage_oval(&alloc, oval);
    assert!(rect_op.pixel_load() > 65536.0);
    assert!(!rect_op.try_combine(&mut oval_op, 65536.0));

    let mut rect_op = coverage_rect(&alloc, big);
    let mut oval_op = coverage_oval(&alloc, oval);
    assert!(!oval_op.try_combine(&mut rect_op, 65536.0));
    assert_eq!(rect_op.num_draws(), 1);
    assert_eq!(oval_op.num_draws(), 1);
}

#[test]
fn test_large_rects_still_merge_with_rects() {
    let alloc = allocator();
    let mut a = coverage_rect(&alloc, Rect::from_ltrb(0.0, 0.0, 300.0, 300.0));
    let mut b = coverage_rect(&alloc, Rect::from_ltrb(400.0, 0.0, 700.0, 300.0));
    assert!(a.try_combine(&mut b, 65536.0));
}

#[test]
fn test_empty_flush_allocates_nothing() {
    let (ctx, mut engine) = engine_with(BASIC);
    let mut pass = MockRenderPass::new();
    {
        let flush = engine.begin_flush();
        assert!(flush.error().is_none());
        flush.end();
    }
    assert_eq!(ctx.count_buffer_creates(), 0);
    assert_eq!(pass.count_draws(), 0);

    // Back in recording: ops can be tracked and flushed again.
    let alloc = engine.create_allocator();
    let op = engine
        .track(coverage_rect(&alloc, Rect::from_ltrb(0.0, 0.0, 10.0, 10.0)))
        .expect("tracks");
    let pipeline = RecordingPipeline::default();
    let mut flush = engine.begin_flush();
    flush.draw(&mut pass, &pipeline, &op);
    drop(op);
    flush.end();
    assert_eq!(pass.count_draws(), 1);
}
