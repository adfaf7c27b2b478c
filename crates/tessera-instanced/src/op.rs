//! Batched draw ops.
//!
//! An [`InstancedOp`] is mutable: the allocator fills it and other ops may be
//! merged into it. Handing it to [`InstancedRendering::track`] seals it into a
//! [`TrackedOp`], whose draws can no longer change.
//!
//! [`InstancedRendering::track`]: crate::InstancedRendering::track

use crate::paint::{Paint, ProcessorSet, SrgbFlags};
use crate::types::{Draw, OpInfo, ParamsTexel};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tessera_core::alloc::{IndexSlot, SparseSet};
use tessera_core::geometry::Rect;

/// Recycled draw storage shared by every op from one allocator.
#[derive(Debug, Default)]
pub struct DrawPool {
    free: Vec<Vec<Draw>>,
    allocations: usize,
}

impl DrawPool {
    const MAX_POOLED: usize = 256;

    pub fn new_shared() -> Arc<Mutex<DrawPool>> {
        Arc::new(Mutex::new(DrawPool::default()))
    }

    fn take(&mut self) -> Vec<Draw> {
        self.free.pop().unwrap_or_else(|| {
            self.allocations += 1;
            Vec::with_capacity(1)
        })
    }

    fn give(&mut self, mut draws: Vec<Draw>) {
        if self.free.len() < Self::MAX_POOLED {
            draws.clear();
            self.free.push(draws);
        }
    }

    /// Vectors waiting for reuse.
    pub fn pooled(&self) -> usize {
        self.free.len()
    }

    /// Vectors allocated because the pool was empty.
    pub fn allocations(&self) -> usize {
        self.allocations
    }
}

/// Draw list that returns its storage to the pool on drop.
struct PooledDraws {
    draws: Vec<Draw>,
    pool: Arc<Mutex<DrawPool>>,
}

impl PooledDraws {
    fn new(pool: Arc<Mutex<DrawPool>>) -> Self {
        let draws = pool.lock().take();
        Self { draws, pool }
    }
}

impl Drop for PooledDraws {
    fn drop(&mut self) {
        self.pool.lock().give(std::mem::take(&mut self.draws));
    }
}

/// A mutable batch of instanced draws.
pub struct InstancedOp {
    info: OpInfo,
    processors: ProcessorSet,
    srgb: SrgbFlags,
    bounds: Rect,
    zero_area: bool,
    pixel_load: f32,
    geometry_changes: u32,
    draws: PooledDraws,
    params: Vec<ParamsTexel>,
}

impl std::fmt::Debug for InstancedOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstancedOp")
            .field("info", &self.info)
            .field("bounds", &self.bounds)
            .field("draws", &self.draws.draws.len())
            .field("params", &self.params.len())
            .field("pixel_load", &self.pixel_load)
            .field("geometry_changes", &self.geometry_changes)
            .finish()
    }
}

impl InstancedOp {
    pub(crate) fn new(pool: Arc<Mutex<DrawPool>>, paint: &Paint, draw: Draw) -> Self {
        let mut draws = PooledDraws::new(pool);
        draws.draws.push(draw);
        Self {
            info: OpInfo::default(),
            processors: paint.processors,
            srgb: paint.srgb,
            bounds: Rect::EMPTY,
            zero_area: false,
            pixel_load: 0.0,
            geometry_changes: 0,
            draws,
            params: Vec::new(),
        }
    }

    pub fn info(&self) -> OpInfo {
        self.info
    }

    pub(crate) fn info_mut(&mut self) -> &mut OpInfo {
        &mut self.info
    }

    pub fn processors(&self) -> &ProcessorSet {
        &self.processors
    }

    pub fn srgb_flags(&self) -> SrgbFlags {
        self.srgb
    }

    /// Device-space bounds, outset for coverage AA.
    pub fn bounds(&self) -> &Rect {
        &self.bounds
    }

    /// True if the recorded shape had no area.
    pub fn is_zero_area(&self) -> bool {
        self.zero_area
    }

    pub(crate) fn set_bounds(&mut self, bounds: Rect, aa_bloat: bool, zero_area: bool) {
        self.bounds = if aa_bloat { bounds.outset(0.5, 0.5) } else { bounds };
        self.zero_area = zero_area;
        self.pixel_load = self.bounds.width() * self.bounds.height();
    }

    pub fn pixel_load(&self) -> f32 {
        self.pixel_load
    }

    pub fn num_draws(&self) -> usize {
        self.draws.draws.len()
    }

    /// Number of adjacent draw pairs whose geometry differs.
    pub fn geometry_changes(&self) -> u32 {
        self.geometry_changes
    }

    pub fn draws(&self) -> &[Draw] {
        &self.draws.draws
    }

    pub(crate) fn draws_mut(&mut self) -> &mut [Draw] {
        &mut self.draws.draws
    }

    pub fn params(&self) -> &[ParamsTexel] {
        &self.params
    }

    pub(crate) fn take_params(&mut self) -> Vec<ParamsTexel> {
        std::mem::take(&mut self.params)
    }

    /// True once the op's draws were merged into another op.
    pub fn is_empty(&self) -> bool {
        self.draws.draws.is_empty()
    }

    pub(crate) fn single_draw_mut(&mut self) -> &mut Draw {
        debug_assert_eq!(self.draws.draws.len(), 1);
        &mut self.draws.draws[0]
    }

    /// Append a texel for the op's only draw. The first texel becomes the
    /// draw's params index.
    pub(crate) fn append_params_texel(&mut self, x: f32, y: f32, z: f32, w: f32) {
        debug_assert_eq!(self.draws.draws.len(), 1);
        let idx = self.params.len() as u32;
        if let Some(draw) = self.draws.draws.first_mut() {
            draw.params_offset.get_or_insert(idx);
        }
        self.params.push(ParamsTexel::new(x, y, z, w));
        self.info.set_has_params(true);
    }

    /// Merge `that` into `self` if both can be drawn by one program without
    /// breaking paint order or the batching heuristics.
    ///
    /// On success `that` is left empty and can no longer be tracked.
    pub fn try_combine(&mut self, that: &mut InstancedOp, rect_merge_pixel_threshold: f32) -> bool {
        if self.is_empty() || that.is_empty() {
            return false;
        }
        if !OpInfo::can_combine(self.info, that.info)
            || self.processors != that.processors
            || self.srgb != that.srgb
        {
            return false;
        }
        if (self.processors.requires_barrier_on_overlap()
            || that.processors.requires_barrier_on_overlap())
            && self.bounds.intersects(&that.bounds)
        {
            return false;
        }

        let combined = self.info | that.info;
        if !combined.is_simple_rects() {
            // Large rects slow down a mixed-shape program more than the saved
            // draw call is worth.
            if self.info.is_simple_rects() && self.pixel_load > rect_merge_pixel_threshold {
                return false;
            }
            if that.info.is_simple_rects() && that.pixel_load > rect_merge_pixel_threshold {
                return false;
            }
        }

        self.bounds = self.bounds.union(&that.bounds);
        self.info = combined;
        self.pixel_load += that.pixel_load;
        self.zero_area &= that.zero_area;

        self.geometry_changes += that.geometry_changes;
        if let (Some(tail), Some(head)) = (self.draws.draws.last(), that.draws.draws.first())
            && tail.geometry != head.geometry
        {
            self.geometry_changes += 1;
        }

        let base = self.params.len() as u32;
        self.draws
            .draws
            .extend(that.draws.draws.drain(..).map(|mut draw| {
                draw.params_offset = draw.params_offset.map(|off| off + base);
                draw
            }));
        self.params.append(&mut that.params);

        that.bounds = Rect::EMPTY;
        that.pixel_load = 0.0;
        that.geometry_changes = 0;
        true
    }
}

/// Ops sealed into an engine, in append order.
#[derive(Default)]
pub(crate) struct OpRegistry {
    ops: SparseSet<InstancedOp>,
    order: Vec<IndexSlot>,
    pub(crate) params: Vec<ParamsTexel>,
}

impl OpRegistry {
    pub(crate) fn insert(&mut self, op: InstancedOp) -> IndexSlot {
        let slot = self.ops.push(op);
        self.order.push(slot);
        slot
    }

    pub(crate) fn remove(&mut self, slot: IndexSlot) -> Option<InstancedOp> {
        let op = self.ops.remove(slot);
        if self.ops.is_empty() {
            self.order.clear();
        }
        op
    }

    pub(crate) fn get(&self, slot: IndexSlot) -> Option<&InstancedOp> {
        self.ops.get(slot)
    }

    pub(crate) fn len(&self) -> usize {
        self.ops.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Live ops in the order they were tracked.
    pub(crate) fn in_order(&self) -> impl Iterator<Item = (IndexSlot, &InstancedOp)> {
        self.order
            .iter()
            .filter_map(|slot| self.ops.get(*slot).map(|op| (*slot, op)))
    }
}

/// An op sealed into an engine.
///
/// Its draws are owned by the engine until this handle is dropped, which
/// unregisters the op and returns its draw storage to the pool.
pub struct TrackedOp {
    slot: IndexSlot,
    registry: Weak<Mutex<OpRegistry>>,
    info: OpInfo,
    bounds: Rect,
    num_draws: usize,
    geometry_changes: u32,
}

impl TrackedOp {
    pub(crate) fn new(slot: IndexSlot, registry: &Arc<Mutex<OpRegistry>>, op: &InstancedOp) -> Self {
        Self {
            slot,
            registry: Arc::downgrade(registry),
            info: op.info(),
            bounds: *op.bounds(),
            num_draws: op.num_draws(),
            geometry_changes: op.geometry_changes(),
        }
    }

    pub(crate) fn slot(&self) -> IndexSlot {
        self.slot
    }

    pub(crate) fn belongs_to(&self, registry: &Arc<Mutex<OpRegistry>>) -> bool {
        std::ptr::eq(self.registry.as_ptr(), Arc::as_ptr(registry))
    }

    pub fn info(&self) -> OpInfo {
        self.info
    }

    pub fn bounds(&self) -> &Rect {
        &self.bounds
    }

    pub fn num_draws(&self) -> usize {
        self.num_draws
    }

    pub fn geometry_changes(&self) -> u32 {
        self.geometry_changes
    }
}

impl std::fmt::Debug for TrackedOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedOp")
            .field("slot", &self.slot)
            .field("info", &self.info)
            .field("num_draws", &self.num_draws)
            .finish()
    }
}

impl Drop for TrackedOp {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().remove(self.slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paint::{Color, ProcessorFlags};
    use crate::types::{AaType, IndexRange, Instance, ShapeFlags};

    fn op(pool: &Arc<Mutex<DrawPool>>, bounds: Rect, shapes: ShapeFlags, geometry: IndexRange) -> InstancedOp {
        let draw = Draw {
            instance: Instance::default(),
            geometry,
            params_offset: None,
        };
        let mut op = InstancedOp::new(pool.clone(), &Paint::new(Color::WHITE), draw);
        op.info_mut().set_aa_type(AaType::Coverage);
        op.info_mut().set_shape_types(shapes);
        op.info_mut().set_cannot_discard(true);
        op.set_bounds(bounds, false, false);
        op
    }

    #[test]
    fn test_combine_sums_and_unions() {
        let pool = DrawPool::new_shared();
        let mut a = op(&pool, Rect::from_ltrb(0.0, 0.0, 10.0, 10.0), ShapeFlags::RECT, IndexRange::new(0, 6));
        let mut b = op(&pool, Rect::from_ltrb(20.0, 20.0, 30.0, 30.0), ShapeFlags::RECT, IndexRange::new(0, 6));
        assert!(a.try_combine(&mut b, 65536.0));
        assert_eq!(a.num_draws(), 2);
        assert_eq!(a.geometry_changes(), 0);
        assert_eq!(*a.bounds(), Rect::from_ltrb(0.0, 0.0, 30.0, 30.0));
        assert_eq!(a.pixel_load(), 200.0);
        assert!(b.is_empty());
        assert!(!a.try_combine(&mut b, 65536.0));
    }

    #[test]
    fn test_geometry_change_counted_at_boundary() {
        let pool = DrawPool::new_shared();
        let mut a = op(&pool, Rect::from_ltrb(0.0, 0.0, 10.0, 10.0), ShapeFlags::RECT, IndexRange::new(6, 30));
        let mut b = op(&pool, Rect::from_ltrb(0.0, 0.0, 10.0, 10.0), ShapeFlags::OVAL, IndexRange::new(126, 66));
        let mut c = op(&pool, Rect::from_ltrb(0.0, 0.0, 10.0, 10.0), ShapeFlags::OVAL, IndexRange::new(126, 66));
        assert!(b.try_combine(&mut c, 65536.0));
        assert_eq!(b.geometry_changes(), 0);
        assert!(a.try_combine(&mut b, 65536.0));
        assert_eq!(a.geometry_changes(), 1);
        assert_eq!(a.num_draws(), 3);
    }

    #[test]
    fn test_barrier_blocks_overlapping_merge() {
        let pool = DrawPool::new_shared();
        let paint = Paint::new(Color::WHITE)
            .with_processors(ProcessorSet::new(1, ProcessorFlags::REQUIRES_BARRIER_ON_OVERLAP));
        let make = |bounds: Rect| {
            let draw = Draw {
                instance: Instance::default(),
                geometry: IndexRange::new(0, 6),
                params_offset: None,
            };
            let mut op = InstancedOp::new(pool.clone(), &paint, draw);
            op.info_mut().set_shape_types(ShapeFlags::RECT);
            op.set_bounds(bounds, false, false);
            op
        };
        let mut a = make(Rect::from_ltrb(0.0, 0.0, 10.0, 10.0));
        let mut b = make(Rect::from_ltrb(5.0, 5.0, 15.0, 15.0));
        let mut c = make(Rect::from_ltrb(50.0, 50.0, 60.0, 60.0));
        assert!(!a.try_combine(&mut b, 65536.0));
        assert!(a.try_combine(&mut c, 65536.0));
    }

    #[test]
    fn test_params_offsets_rebased_on_merge() {
        let pool = DrawPool::new_shared();
        let mut a = op(&pool, Rect::from_ltrb(0.0, 0.0, 10.0, 10.0), ShapeFlags::SIMPLE_RRECT, IndexRange::new(258, 78));
        a.append_params_texel(1.0, 1.0, 10.0, 10.0);
        let mut b = op(&pool, Rect::from_ltrb(0.0, 0.0, 10.0, 10.0), ShapeFlags::SIMPLE_RRECT, IndexRange::new(258, 78));
        b.append_params_texel(2.0, 2.0, 10.0, 10.0);
        assert!(a.try_combine(&mut b, 65536.0));
        assert_eq!(a.draws()[0].params_offset, Some(0));
        assert_eq!(a.draws()[1].params_offset, Some(1));
        assert_eq!(a.params()[1], ParamsTexel::new(2.0, 2.0, 10.0, 10.0));
        assert!(b.params().is_empty());
    }

    #[test]
    fn test_draw_storage_returns_to_pool() {
        let pool = DrawPool::new_shared();
        {
            let _a = op(&pool, Rect::from_ltrb(0.0, 0.0, 1.0, 1.0), ShapeFlags::RECT, IndexRange::new(0, 6));
            let _b = op(&pool, Rect::from_ltrb(0.0, 0.0, 1.0, 1.0), ShapeFlags::RECT, IndexRange::new(0, 6));
            assert_eq!(pool.lock().pooled(), 0);
        }
        assert_eq!(pool.lock().pooled(), 2);
        let _c = op(&pool, Rect::from_ltrb(0.0, 0.0, 1.0, 1.0), ShapeFlags::RECT, IndexRange::new(0, 6));
        assert_eq!(pool.lock().pooled(), 1);
        assert_eq!(pool.lock().allocations(), 2);
    }

    #[test]
    fn test_registry_order_skips_removed() {
        let pool = DrawPool::new_shared();
        let mut reg = OpRegistry::default();
        let a = reg.insert(op(&pool, Rect::from_ltrb(0.0, 0.0, 1.0, 1.0), ShapeFlags::RECT, IndexRange::new(0, 6)));
        let b = reg.insert(op(&pool, Rect::from_ltrb(0.0, 0.0, 1.0, 1.0), ShapeFlags::OVAL, IndexRange::new(36, 42)));
        assert!(reg.remove(a).is_some());
        let order: Vec<_> = reg.in_order().map(|(slot, _)| slot).collect();
        assert_eq!(order, vec![b]);
        reg.remove(b);
        assert!(reg.is_empty());
        assert_eq!(reg.in_order().count(), 0);
    }
}
