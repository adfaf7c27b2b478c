//! Recording of shape draw requests into [`InstancedOp`]s.
//!
//! Every instance is drawn by transforming canonical geometry that spans the
//! square [-1, +1]². Recording computes that transform, the device bounds,
//! the antialiasing mode and any round-rect params the shader needs.

use crate::config::InstancedConfig;
use crate::features::{InstancedCaps, InstancedFeatures, InstancedSupport};
use crate::op::{DrawPool, InstancedOp};
use crate::paint::Paint;
use crate::processor::{InstanceProcessor, ShapeProcessor};
use crate::types::{AaType, AntiAlias, Draw, IndexRange, Instance, OpInfo, ShapeType};
use parking_lot::Mutex;
use std::sync::Arc;
use tessera_core::geometry::{Corner, Matrix, RRect, RRectType, Rect};
use tessera_core::profiling::profile_function;

/// What the recorder needs to know about the render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TargetInfo {
    pub multisampled: bool,
    /// Raster sample count differs from the color sample count.
    pub mixed_sampled: bool,
    pub floating_point: bool,
}

impl TargetInfo {
    pub fn single_sampled() -> Self {
        Self::default()
    }

    pub fn multisampled() -> Self {
        Self {
            multisampled: true,
            ..Default::default()
        }
    }

    pub fn mixed_sampled() -> Self {
        Self {
            multisampled: true,
            mixed_sampled: true,
            ..Default::default()
        }
    }

    pub fn with_floating_point(mut self, on: bool) -> Self {
        self.floating_point = on;
        self
    }
}

/// Turns shapes, transforms and paints into ops.
///
/// Requests the device cannot draw return `None` and the reason is logged at
/// `debug`; callers fall back to a non-instanced path.
pub struct OpAllocator {
    caps: InstancedCaps,
    config: InstancedConfig,
    support: InstancedSupport,
    pool: Arc<Mutex<DrawPool>>,
}

impl OpAllocator {
    pub fn new(caps: InstancedCaps, config: InstancedConfig) -> Self {
        Self::with_processor(caps, config, &InstanceProcessor)
    }

    pub fn with_processor(
        caps: InstancedCaps,
        config: InstancedConfig,
        processor: &dyn ShapeProcessor,
    ) -> Self {
        let support = processor.check_support(&caps);
        tracing::debug!("Creating op allocator: {support} support");
        Self {
            caps,
            config,
            support,
            pool: DrawPool::new_shared(),
        }
    }

    pub fn support(&self) -> InstancedSupport {
        self.support
    }

    pub fn config(&self) -> &InstancedConfig {
        &self.config
    }

    /// Draw storage shared by the ops this allocator creates.
    pub fn pool(&self) -> &Arc<Mutex<DrawPool>> {
        &self.pool
    }

    pub fn record_rect(
        &self,
        rect: &Rect,
        view: &Matrix,
        paint: Paint,
        aa: AntiAlias,
        target: &TargetInfo,
    ) -> Option<InstancedOp> {
        self.record_rect_with_local_rect(rect, view, paint, rect, aa, target)
    }

    /// `local_rect` is the rect's coordinate space as seen by local-coord processors.
    pub fn record_rect_with_local_rect(
        &self,
        rect: &Rect,
        view: &Matrix,
        paint: Paint,
        local_rect: &Rect,
        aa: AntiAlias,
        target: &TargetInfo,
    ) -> Option<InstancedOp> {
        profile_function!();
        let mut op = self.record_shape(ShapeType::Rect, rect, view, &paint, local_rect, aa, target)?;
        op.single_draw_mut().geometry = InstanceProcessor::index_range_for_rect(op.info().aa_type());
        self.log_op("rect", &op);
        Some(op)
    }

    /// Maps the rect's local coords through `local_matrix`. Perspective local
    /// matrices are not supported.
    pub fn record_rect_with_local_matrix(
        &self,
        rect: &Rect,
        view: &Matrix,
        paint: Paint,
        local_matrix: &Matrix,
        aa: AntiAlias,
        target: &TargetInfo,
    ) -> Option<InstancedOp> {
        profile_function!();
        if local_matrix.has_perspective() {
            tracing::debug!("Rejecting rect: perspective local matrix");
            return None;
        }
        let mut op = self.record_shape(ShapeType::Rect, rect, view, &paint, rect, aa, target)?;
        op.single_draw_mut().instance.info |= Instance::LOCAL_MATRIX_FLAG;
        op.info_mut().set_has_local_matrix(true);
        op.append_params_texel(
            local_matrix.scale_x(),
            local_matrix.skew_x(),
            local_matrix.trans_x(),
            0.0,
        );
        op.append_params_texel(
            local_matrix.skew_y(),
            local_matrix.scale_y(),
            local_matrix.trans_y(),
            0.0,
        );
        op.single_draw_mut().geometry = InstanceProcessor::index_range_for_rect(op.info().aa_type());
        self.log_op("rect", &op);
        Some(op)
    }

    pub fn record_oval(
        &self,
        oval: &Rect,
        view: &Matrix,
        paint: Paint,
        aa: AntiAlias,
        target: &TargetInfo,
    ) -> Option<InstancedOp> {
        profile_function!();
        let mut op = self.record_shape(ShapeType::Oval, oval, view, &paint, oval, aa, target)?;
        let geometry = InstanceProcessor::index_range_for_oval(
            op.info().aa_type(),
            op.bounds(),
            self.config.large_oval_area,
        );
        op.single_draw_mut().geometry = geometry;
        self.log_op("oval", &op);
        Some(op)
    }

    /// Round rects that degenerate to a rect or an oval are recorded as one.
    pub fn record_rrect(
        &self,
        rrect: &RRect,
        view: &Matrix,
        paint: Paint,
        aa: AntiAlias,
        target: &TargetInfo,
    ) -> Option<InstancedOp> {
        profile_function!();
        let ty = match rrect.ty() {
            RRectType::Empty => {
                tracing::debug!("Rejecting round rect: empty");
                return None;
            }
            RRectType::Rect => return self.record_rect(rrect.rect(), view, paint, aa, target),
            RRectType::Oval => return self.record_oval(rrect.rect(), view, paint, aa, target),
            RRectType::Simple => ShapeType::SimpleRRect,
            RRectType::NinePatch => ShapeType::NinePatch,
            RRectType::Complex => ShapeType::ComplexRRect,
        };
        let mut op = self.record_shape(ty, rrect.rect(), view, &paint, rrect.rect(), aa, target)?;
        append_rrect_params(&mut op, rrect);
        op.single_draw_mut().geometry = InstanceProcessor::index_range_for_rrect(op.info().aa_type());
        self.log_op("rrect", &op);
        Some(op)
    }

    /// The region between `outer` and `inner`. `inner` may be at most a simple
    /// round rect.
    pub fn record_drrect(
        &self,
        outer: &RRect,
        inner: &RRect,
        view: &Matrix,
        paint: Paint,
        aa: AntiAlias,
        target: &TargetInfo,
    ) -> Option<InstancedOp> {
        profile_function!();
        let inner_ty = match inner.ty() {
            RRectType::NinePatch | RRectType::Complex => {
                tracing::debug!("Rejecting double round rect: inner shape is {:?}", inner.ty());
                return None;
            }
            RRectType::Empty => return self.record_rrect(outer, view, paint, aa, target),
            RRectType::Rect => ShapeType::Rect,
            RRectType::Oval => ShapeType::Oval,
            RRectType::Simple => ShapeType::SimpleRRect,
        };
        let outer_ty = match outer.ty() {
            RRectType::Empty => {
                tracing::debug!("Rejecting double round rect: empty outer");
                return None;
            }
            RRectType::Rect => ShapeType::Rect,
            RRectType::Oval => ShapeType::Oval,
            RRectType::Simple => ShapeType::SimpleRRect,
            RRectType::NinePatch => ShapeType::NinePatch,
            RRectType::Complex => ShapeType::ComplexRRect,
        };

        // The shader reads the outer rect from the local rect.
        let mut op = self.record_shape(outer_ty, outer.rect(), view, &paint, outer.rect(), aa, target)?;
        append_rrect_params(&mut op, outer);

        op.info_mut().add_inner_shape_types(inner_ty.flag());
        op.single_draw_mut().instance.set_inner_shape_type(inner_ty);
        let r = inner.rect();
        op.append_params_texel(r.left, r.top, r.right, r.bottom);
        append_rrect_params(&mut op, inner);

        op.single_draw_mut().geometry = InstanceProcessor::index_range_for_rrect(op.info().aa_type());
        self.log_op("drrect", &op);
        Some(op)
    }

    /// Pick the antialiasing strategy for a draw, or `None` if no strategy
    /// the device supports can honor the request.
    pub fn select_antialias_mode(
        &self,
        view: &Matrix,
        aa: AntiAlias,
        target: &TargetInfo,
    ) -> Option<AaType> {
        if !target.multisampled || self.caps.has(InstancedFeatures::MULTISAMPLE_DISABLE) {
            if aa == AntiAlias::Off {
                return Some(AaType::None);
            }
            let coverage_usable = !target.multisampled || target.mixed_sampled;
            if coverage_usable && view.preserves_right_angles() {
                return Some(AaType::Coverage);
            }
        }

        if target.multisampled && self.support >= InstancedSupport::Multisampled {
            if !target.mixed_sampled {
                return Some(AaType::Msaa);
            }
            if self.support >= InstancedSupport::MixedSampled {
                return Some(AaType::MixedSamples);
            }
        }

        None
    }

    #[allow(clippy::too_many_arguments)]
    fn record_shape(
        &self,
        ty: ShapeType,
        bounds: &Rect,
        view: &Matrix,
        paint: &Paint,
        local_rect: &Rect,
        aa: AntiAlias,
        target: &TargetInfo,
    ) -> Option<InstancedOp> {
        if self.support == InstancedSupport::None {
            tracing::debug!("Rejecting {ty:?}: instanced rendering unsupported");
            return None;
        }
        if target.floating_point && self.caps.has(InstancedFeatures::AVOID_FLOAT_TARGETS) {
            tracing::debug!("Rejecting {ty:?}: floating point target");
            return None;
        }
        if !bounds.is_finite() || !view.is_finite() {
            tracing::debug!("Rejecting {ty:?}: non-finite geometry");
            return None;
        }
        let Some(aa_type) = self.select_antialias_mode(view, aa, target) else {
            tracing::debug!("Rejecting {ty:?}: no antialiasing mode for {aa:?} on {target:?}");
            return None;
        };

        let mut instance = Instance {
            color: paint.color.to_bits(),
            local_rect: local_rect.as_array(),
            ..Default::default()
        };
        instance.set_shape_type(ty);

        let mut info = OpInfo::default();
        info.set_aa_type(aa_type);
        info.set_shape_types(ty.flag());
        info.set_cannot_discard(true);
        info.set_uses_local_coords(paint.processors.uses_local_coords());
        info.set_cannot_tweak_alpha_for_coverage(paint.processors.cannot_tweak_alpha_for_coverage());

        // Canonical square [-1, +1]² to shape bounds.
        let sx = 0.5 * bounds.width();
        let sy = 0.5 * bounds.height();
        let cx = sx + bounds.left;
        let cy = sy + bounds.top;

        let persp_row;
        let dev_bounds;
        if !view.has_perspective() {
            let m = [
                sx * view.scale_x(),
                sy * view.skew_x(),
                cx * view.scale_x() + cy * view.skew_x() + view.trans_x(),
                sx * view.skew_y(),
                sy * view.scale_y(),
                cx * view.skew_y() + cy * view.scale_y() + view.trans_y(),
            ];
            instance.shape_matrix = m;

            let hw = m[0].abs() + m[1].abs();
            let hh = m[3].abs() + m[4].abs();
            dev_bounds = Rect::from_ltrb(m[2] - hw, m[5] - hh, m[2] + hw, m[5] + hh);

            info.set_non_square(is_non_square(&m, 2.0 * hw, 2.0 * hh));
            persp_row = None;
        } else {
            let mut shape_matrix = *view;
            shape_matrix.pre_translate(cx, cy);
            shape_matrix.pre_scale(sx, sy);
            let r = shape_matrix.to_row_major();
            instance.shape_matrix = [r[0], r[1], r[2], r[3], r[4], r[5]];
            instance.info |= Instance::PERSPECTIVE_FLAG;
            info.set_has_perspective(true);
            info.set_non_square(true);

            dev_bounds = view.map_rect_bounds(bounds);
            persp_row = Some([r[6], r[7], r[8]]);
        }

        if !dev_bounds.is_finite() {
            tracing::debug!("Rejecting {ty:?}: device bounds are not finite");
            return None;
        }

        let draw = Draw {
            instance,
            geometry: IndexRange::default(),
            params_offset: None,
        };
        let mut op = InstancedOp::new(self.pool.clone(), paint, draw);
        *op.info_mut() = info;
        let zero_area = bounds.is_empty() || dev_bounds.is_empty();
        op.set_bounds(dev_bounds, aa_type == AaType::Coverage, zero_area);
        if let Some([p0, p1, p2]) = persp_row {
            op.append_params_texel(p0, p1, p2, 0.0);
        }
        Some(op)
    }

    fn log_op(&self, kind: &str, op: &InstancedOp) {
        if self.config.log_ops {
            tracing::trace!(
                "Recorded {kind}: aa={:?} bounds={:?} geometry={:?} params={}",
                op.info().aa_type(),
                op.bounds(),
                op.draws().first().map(|d| d.geometry),
                op.params().len()
            );
        }
    }
}

/// Whether the affine shape matrix `m` maps the canonical square to anything
/// but a square. The tolerances are in device pixels and must not drift, since
/// they pick between circle and ellipse coverage math.
fn is_non_square(m: &[f32; 6], dev_width: f32, dev_height: f32) -> bool {
    (dev_height - dev_width).abs() > 0.5
        || (m[0] * m[3] + m[1] * m[4]).abs() > 1e-3
        || (m[0] * m[0] + m[1] * m[1] - m[3] * m[3] - m[4] * m[4]).abs() > 1e-2
}

/// Append the texels that describe a round rect's corner radii.
fn append_rrect_params(op: &mut InstancedOp, rrect: &RRect) {
    let w = rrect.width();
    let h = rrect.height();
    match rrect.ty() {
        RRectType::Simple => {
            let r = rrect.simple_radii();
            op.append_params_texel(r.x, r.y, w, h);
        }
        RRectType::NinePatch => {
            let tl = rrect.radii(Corner::TopLeft);
            let br = rrect.radii(Corner::BottomRight);
            op.append_params_texel(tl.x * 2.0 / w, br.x * 2.0 / w, tl.y * 2.0 / h, br.y * 2.0 / h);
        }
        RRectType::Complex => {
            let tl = rrect.radii(Corner::TopLeft);
            let tr = rrect.radii(Corner::TopRight);
            let br = rrect.radii(Corner::BottomRight);
            let bl = rrect.radii(Corner::BottomLeft);
            op.append_params_texel(tl.x * 2.0 / w, bl.x * 2.0 / w, tr.x * 2.0 / w, br.x * 2.0 / w);
            op.append_params_texel(tl.y * 2.0 / h, tr.y * 2.0 / h, bl.y * 2.0 / h, br.y * 2.0 / h);
        }
        RRectType::Empty | RRectType::Rect | RRectType::Oval => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::Color;
    use crate::types::ShapeFlags;
    use glam::Vec2;

    fn allocator() -> OpAllocator {
        OpAllocator::new(InstancedCaps::default(), InstancedConfig::default())
    }

    fn paint() -> Paint {
        Paint::new(Color::WHITE)
    }

    #[test]
    fn test_axis_aligned_rect_matrix_and_bounds() {
        let alloc = allocator();
        let op = alloc
            .record_rect(
                &Rect::from_ltrb(10.0, 20.0, 30.0, 60.0),
                &Matrix::IDENTITY,
                paint(),
                AntiAlias::Off,
                &TargetInfo::single_sampled(),
            )
            .unwrap();
        let inst = op.draws()[0].instance;
        assert_eq!(inst.shape_matrix, [10.0, 0.0, 20.0, 0.0, 20.0, 40.0]);
        assert_eq!(*op.bounds(), Rect::from_ltrb(10.0, 20.0, 30.0, 60.0));
        assert_eq!(op.pixel_load(), 800.0);
        assert!(op.info().non_square());
        assert_eq!(op.info().aa_type(), AaType::None);
        assert_eq!(op.info().shape_types(), ShapeFlags::RECT);
    }

    #[test]
    fn test_coverage_outsets_bounds() {
        let alloc = allocator();
        let op = alloc
            .record_oval(
                &Rect::from_ltrb(0.0, 0.0, 10.0, 10.0),
                &Matrix::IDENTITY,
                paint(),
                AntiAlias::On,
                &TargetInfo::single_sampled(),
            )
            .unwrap();
        assert_eq!(op.info().aa_type(), AaType::Coverage);
        assert_eq!(*op.bounds(), Rect::from_ltrb(-0.5, -0.5, 10.5, 10.5));
        assert!(!op.info().non_square());
    }

    #[test]
    fn test_perspective_pushes_row_texel() {
        let alloc = allocator();
        let view = Matrix::from_row_major([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.001, 0.0, 1.0]);
        let rect = Rect::from_ltrb(0.0, 0.0, 100.0, 100.0);
        let op = alloc
            .record_rect(&rect, &view, paint(), AntiAlias::Off, &TargetInfo::single_sampled())
            .unwrap();
        let draw = op.draws()[0];
        assert!(draw.instance.has_perspective());
        assert!(op.info().has_perspective());
        assert!(op.info().non_square());
        assert_eq!(draw.params_offset, Some(0));
        let p = op.params()[0];
        // Third row of view * translate(50, 50) * scale(50, 50).
        assert!((p.x - 0.05).abs() < 1e-6);
        assert_eq!(p.y, 0.0);
        assert!((p.z - 1.05).abs() < 1e-6);
        for corner in rect.corners() {
            assert!(op.bounds().contains_point(view.map_point(corner)));
        }
    }

    #[test]
    fn test_local_matrix_texels() {
        let alloc = allocator();
        let local = Matrix::from_affine([2.0, 0.5, 3.0, 0.25, 4.0, 5.0]);
        let op = alloc
            .record_rect_with_local_matrix(
                &Rect::from_ltrb(0.0, 0.0, 1.0, 1.0),
                &Matrix::IDENTITY,
                paint(),
                &local,
                AntiAlias::Off,
                &TargetInfo::single_sampled(),
            )
            .unwrap();
        assert!(op.draws()[0].instance.has_local_matrix());
        assert!(op.info().has_local_matrix());
        assert_eq!(op.params()[0].as_array(), [2.0, 0.5, 3.0, 0.0]);
        assert_eq!(op.params()[1].as_array(), [0.25, 4.0, 5.0, 0.0]);

        let persp = Matrix::from_row_major([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.1, 0.0, 1.0]);
        assert!(
            alloc
                .record_rect_with_local_matrix(
                    &Rect::from_ltrb(0.0, 0.0, 1.0, 1.0),
                    &Matrix::IDENTITY,
                    paint(),
                    &persp,
                    AntiAlias::Off,
                    &TargetInfo::single_sampled(),
                )
                .is_none()
        );
    }

    #[test]
    fn test_rrect_params_by_type() {
        let alloc = allocator();
        let rect = Rect::from_ltrb(0.0, 0.0, 40.0, 20.0);
        let target = TargetInfo::single_sampled();

        let simple = RRect::new_rect_xy(rect, 4.0, 2.0);
        let op = alloc
            .record_rrect(&simple, &Matrix::IDENTITY, paint(), AntiAlias::Off, &target)
            .unwrap();
        assert_eq!(op.params()[0].as_array(), [4.0, 2.0, 40.0, 20.0]);
        assert_eq!(op.draws()[0].instance.shape_type(), Some(ShapeType::SimpleRRect));

        let nine = RRect::new_nine_patch(rect, 2.0, 4.0, 6.0, 8.0);
        let op = alloc
            .record_rrect(&nine, &Matrix::IDENTITY, paint(), AntiAlias::Off, &target)
            .unwrap();
        assert_eq!(op.params().len(), 1);
        assert_eq!(op.params()[0].as_array(), [0.1, 0.3, 0.4, 0.8]);

        let complex = RRect::new_rect_radii(
            rect,
            [
                Vec2::new(2.0, 2.0),
                Vec2::new(4.0, 4.0),
                Vec2::new(6.0, 6.0),
                Vec2::new(8.0, 8.0),
            ],
        );
        let op = alloc
            .record_rrect(&complex, &Matrix::IDENTITY, paint(), AntiAlias::Off, &target)
            .unwrap();
        assert_eq!(op.params().len(), 2);
        assert_eq!(op.params()[0].as_array(), [0.1, 0.4, 0.2, 0.3]);
        assert_eq!(op.params()[1].as_array(), [0.2, 0.4, 0.8, 0.6]);
    }

    #[test]
    fn test_degenerate_rrects_delegate() {
        let alloc = allocator();
        let target = TargetInfo::single_sampled();
        let rect = Rect::from_ltrb(0.0, 0.0, 10.0, 10.0);
        let op = alloc
            .record_rrect(&RRect::new_rect(rect), &Matrix::IDENTITY, paint(), AntiAlias::Off, &target)
            .unwrap();
        assert_eq!(op.info().shape_types(), ShapeFlags::RECT);
        assert!(op.params().is_empty());
        let op = alloc
            .record_rrect(&RRect::new_oval(rect), &Matrix::IDENTITY, paint(), AntiAlias::Off, &target)
            .unwrap();
        assert_eq!(op.info().shape_types(), ShapeFlags::OVAL);
        assert!(
            alloc
                .record_rrect(&RRect::new_rect(Rect::EMPTY), &Matrix::IDENTITY, paint(), AntiAlias::Off, &target)
                .is_none()
        );
    }

    #[test]
    fn test_drrect_inner_texels() {
        let alloc = allocator();
        let target = TargetInfo::single_sampled();
        let outer = RRect::new_rect_xy(Rect::from_ltrb(0.0, 0.0, 100.0, 100.0), 10.0, 10.0);
        let inner = RRect::new_rect_xy(Rect::from_ltrb(10.0, 10.0, 90.0, 90.0), 5.0, 5.0);
        let op = alloc
            .record_drrect(&outer, &inner, &Matrix::IDENTITY, paint(), AntiAlias::Off, &target)
            .unwrap();
        assert_eq!(op.info().inner_shape_types(), ShapeFlags::SIMPLE_RRECT);
        assert_eq!(op.draws()[0].instance.inner_shape_type(), ShapeType::SimpleRRect);
        let texels: Vec<_> = op.params().iter().map(|t| t.as_array()).collect();
        assert_eq!(
            texels,
            vec![
                [10.0, 10.0, 100.0, 100.0],
                [10.0, 10.0, 90.0, 90.0],
                [5.0, 5.0, 80.0, 80.0],
            ]
        );
        assert_eq!(op.draws()[0].params_offset, Some(0));

        let nine = RRect::new_nine_patch(Rect::from_ltrb(10.0, 10.0, 90.0, 90.0), 1.0, 2.0, 3.0, 4.0);
        assert!(
            alloc
                .record_drrect(&outer, &nine, &Matrix::IDENTITY, paint(), AntiAlias::Off, &target)
                .is_none()
        );

        let empty = RRect::new_rect(Rect::EMPTY);
        let op = alloc
            .record_drrect(&outer, &empty, &Matrix::IDENTITY, paint(), AntiAlias::Off, &target)
            .unwrap();
        assert!(op.info().inner_shape_types().is_empty());
    }

    #[test]
    fn test_float_target_rejected_when_avoided() {
        let caps = InstancedCaps::new(
            InstancedCaps::default().features | InstancedFeatures::AVOID_FLOAT_TARGETS,
        );
        let alloc = OpAllocator::new(caps, InstancedConfig::default());
        let target = TargetInfo::single_sampled().with_floating_point(true);
        let rect = Rect::from_ltrb(0.0, 0.0, 10.0, 10.0);
        assert!(alloc.record_rect(&rect, &Matrix::IDENTITY, paint(), AntiAlias::On, &target).is_none());
        assert!(
            allocator()
                .record_rect(&rect, &Matrix::IDENTITY, paint(), AntiAlias::On, &target)
                .is_some()
        );
    }

    #[test]
    fn test_antialias_mode_ladder() {
        let basic = allocator();
        let skew = Matrix::from_affine([1.0, 0.5, 0.0, 0.0, 1.0, 0.0]);
        let single = TargetInfo::single_sampled();
        assert_eq!(basic.select_antialias_mode(&Matrix::IDENTITY, AntiAlias::Off, &single), Some(AaType::None));
        assert_eq!(basic.select_antialias_mode(&Matrix::IDENTITY, AntiAlias::On, &single), Some(AaType::Coverage));
        assert_eq!(basic.select_antialias_mode(&skew, AntiAlias::On, &single), None);
        // Basic support cannot draw to a multisampled target at all.
        assert_eq!(
            basic.select_antialias_mode(&Matrix::IDENTITY, AntiAlias::Off, &TargetInfo::multisampled()),
            None
        );

        let full = OpAllocator::new(InstancedCaps::new(InstancedFeatures::all()), InstancedConfig::default());
        assert_eq!(full.support(), InstancedSupport::MixedSampled);
        assert_eq!(
            full.select_antialias_mode(&Matrix::IDENTITY, AntiAlias::Off, &TargetInfo::multisampled()),
            Some(AaType::None)
        );
        assert_eq!(
            full.select_antialias_mode(&skew, AntiAlias::On, &TargetInfo::mixed_sampled()),
            Some(AaType::MixedSamples)
        );
        assert_eq!(
            full.select_antialias_mode(&Matrix::IDENTITY, AntiAlias::On, &TargetInfo::mixed_sampled()),
            Some(AaType::Coverage)
        );
    }

    #[test]
    fn test_non_square_tolerances() {
        let square = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        assert!(!is_non_square(&square, 2.0, 2.0));
        // Device height minus width, in pixels.
        assert!(!is_non_square(&square, 2.0, 2.49));
        assert!(is_non_square(&square, 2.0, 2.51));
        assert!(is_non_square(&square, 2.51, 2.0));
        // Off-diagonal term of the row dot product.
        assert!(!is_non_square(&[1.0, 0.0, 0.0, 0.0009, 1.0, 0.0], 2.0, 2.0018));
        assert!(is_non_square(&[1.0, 0.0, 0.0, 0.0011, 1.0, 0.0], 2.0, 2.0022));
        // Squared row lengths.
        assert!(!is_non_square(&[1.0, 0.0, 0.0, 0.0, 1.004, 0.0], 2.0, 2.008));
        assert!(is_non_square(&[1.0, 0.0, 0.0, 0.0, 1.006, 0.0], 2.0, 2.012));
    }

    #[test]
    fn test_recorded_squares_stay_square() {
        let alloc = allocator();
        let single = TargetInfo::single_sampled();
        let square = Rect::from_ltrb(0.0, 0.0, 10.0, 10.0);
        let op = alloc
            .record_oval(&square, &Matrix::rotate_deg(30.0), paint(), AntiAlias::On, &single)
            .unwrap();
        assert!(!op.info().non_square());

        let tall = Rect::from_ltrb(0.0, 0.0, 10.0, 10.6);
        let op = alloc
            .record_oval(&tall, &Matrix::IDENTITY, paint(), AntiAlias::On, &single)
            .unwrap();
        assert!(op.info().non_square());
    }
}
