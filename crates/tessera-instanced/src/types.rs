//! Fixed-layout data shared by the recorder, the backends and the shaders.
//!
//! [`Instance`] and [`ParamsTexel`] are uploaded verbatim; [`OpInfo`] doubles
//! as part of the program cache key. Bit positions are part of the contract
//! with the shader and must not move.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use std::ops::Range;

/// Kind of shape an instance draws.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeType {
    Rect = 0,
    Oval = 1,
    SimpleRRect = 2,
    NinePatch = 3,
    ComplexRRect = 4,
}

impl ShapeType {
    pub const LAST: ShapeType = ShapeType::ComplexRRect;

    pub fn flag(self) -> ShapeFlags {
        ShapeFlags::from_bits_retain(1 << self as u8)
    }

    pub fn from_bits(bits: u32) -> Option<ShapeType> {
        match bits {
            0 => Some(ShapeType::Rect),
            1 => Some(ShapeType::Oval),
            2 => Some(ShapeType::SimpleRRect),
            3 => Some(ShapeType::NinePatch),
            4 => Some(ShapeType::ComplexRRect),
            _ => None,
        }
    }
}

bitflags! {
    /// Set of [`ShapeType`]s, one bit per type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ShapeFlags: u8 {
        const RECT = 1 << ShapeType::Rect as u8;
        const OVAL = 1 << ShapeType::Oval as u8;
        const SIMPLE_RRECT = 1 << ShapeType::SimpleRRect as u8;
        const NINE_PATCH = 1 << ShapeType::NinePatch as u8;
        const COMPLEX_RRECT = 1 << ShapeType::ComplexRRect as u8;
        const RRECT = Self::SIMPLE_RRECT.bits() | Self::NINE_PATCH.bits() | Self::COMPLEX_RRECT.bits();
    }
}

/// Whether the caller asked for antialiasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AntiAlias {
    Off,
    On,
}

/// Antialiasing strategy chosen for an op.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AaType {
    #[default]
    None = 0,
    /// Analytic coverage computed in the fragment shader.
    Coverage = 1,
    Msaa = 2,
    MixedSamples = 3,
}

impl AaType {
    /// True for strategies that rely on multisampled rasterization.
    pub fn is_hw(self) -> bool {
        matches!(self, AaType::Msaa | AaType::MixedSamples)
    }

    fn from_bits(bits: u32) -> AaType {
        match bits {
            1 => AaType::Coverage,
            2 => AaType::Msaa,
            3 => AaType::MixedSamples,
            _ => AaType::None,
        }
    }
}

/// Aggregate description of an op, packed into 32 bits.
///
/// | bits   | field                            |
/// |--------|----------------------------------|
/// | 0..8   | [`AaType`]                       |
/// | 8..16  | shape types ([`ShapeFlags`])     |
/// | 16..24 | inner shape types                |
/// | 24     | has perspective                  |
/// | 25     | has local matrix                 |
/// | 26     | has params                       |
/// | 27     | non-square                       |
/// | 28     | uses local coords                |
/// | 29     | cannot tweak alpha for coverage  |
/// | 30     | cannot discard                   |
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OpInfo(u32);

impl OpInfo {
    const AA_MASK: u32 = 0xff;
    const SHAPE_SHIFT: u32 = 8;
    const INNER_SHIFT: u32 = 16;
    pub const PERSPECTIVE: u32 = 1 << 24;
    pub const LOCAL_MATRIX: u32 = 1 << 25;
    pub const HAS_PARAMS: u32 = 1 << 26;
    pub const NON_SQUARE: u32 = 1 << 27;
    pub const USES_LOCAL_COORDS: u32 = 1 << 28;
    pub const CANNOT_TWEAK_ALPHA_FOR_COVERAGE: u32 = 1 << 29;
    pub const CANNOT_DISCARD: u32 = 1 << 30;

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub fn aa_type(self) -> AaType {
        AaType::from_bits(self.0 & Self::AA_MASK)
    }

    pub fn set_aa_type(&mut self, aa: AaType) {
        self.0 = (self.0 & !Self::AA_MASK) | aa as u32;
    }

    pub fn shape_types(self) -> ShapeFlags {
        ShapeFlags::from_bits_retain((self.0 >> Self::SHAPE_SHIFT) as u8)
    }

    pub fn set_shape_types(&mut self, flags: ShapeFlags) {
        self.0 = (self.0 & !(0xff << Self::SHAPE_SHIFT)) | ((flags.bits() as u32) << Self::SHAPE_SHIFT);
    }

    pub fn inner_shape_types(self) -> ShapeFlags {
        ShapeFlags::from_bits_retain((self.0 >> Self::INNER_SHIFT) as u8)
    }

    pub fn add_inner_shape_types(&mut self, flags: ShapeFlags) {
        self.0 |= (flags.bits() as u32) << Self::INNER_SHIFT;
    }

    fn flag(self, bit: u32) -> bool {
        self.0 & bit != 0
    }

    fn set_flag(&mut self, bit: u32, on: bool) {
        if on {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }

    pub fn has_perspective(self) -> bool {
        self.flag(Self::PERSPECTIVE)
    }

    pub fn set_has_perspective(&mut self, on: bool) {
        self.set_flag(Self::PERSPECTIVE, on);
    }

    pub fn has_local_matrix(self) -> bool {
        self.flag(Self::LOCAL_MATRIX)
    }

    pub fn set_has_local_matrix(&mut self, on: bool) {
        self.set_flag(Self::LOCAL_MATRIX, on);
    }

    pub fn has_params(self) -> bool {
        self.flag(Self::HAS_PARAMS)
    }

    pub fn set_has_params(&mut self, on: bool) {
        self.set_flag(Self::HAS_PARAMS, on);
    }

    pub fn non_square(self) -> bool {
        self.flag(Self::NON_SQUARE)
    }

    pub fn set_non_square(&mut self, on: bool) {
        self.set_flag(Self::NON_SQUARE, on);
    }

    pub fn uses_local_coords(self) -> bool {
        self.flag(Self::USES_LOCAL_COORDS)
    }

    pub fn set_uses_local_coords(&mut self, on: bool) {
        self.set_flag(Self::USES_LOCAL_COORDS, on);
    }

    pub fn cannot_tweak_alpha_for_coverage(self) -> bool {
        self.flag(Self::CANNOT_TWEAK_ALPHA_FOR_COVERAGE)
    }

    pub fn set_cannot_tweak_alpha_for_coverage(&mut self, on: bool) {
        self.set_flag(Self::CANNOT_TWEAK_ALPHA_FOR_COVERAGE, on);
    }

    pub fn cannot_discard(self) -> bool {
        self.flag(Self::CANNOT_DISCARD)
    }

    pub fn set_cannot_discard(&mut self, on: bool) {
        self.set_flag(Self::CANNOT_DISCARD, on);
    }

    /// Only rect shapes and no inner shapes.
    pub fn is_simple_rects(self) -> bool {
        ShapeFlags::RECT.contains(self.shape_types()) && self.inner_shape_types().is_empty()
    }

    /// Whether two ops may share a program, and so be merged by OR-ing their info.
    pub fn can_combine(a: OpInfo, b: OpInfo) -> bool {
        a.aa_type() == b.aa_type()
            && a.cannot_discard() == b.cannot_discard()
            && a.inner_shape_types().is_empty() == b.inner_shape_types().is_empty()
    }

    pub fn union(self, other: OpInfo) -> OpInfo {
        OpInfo(self.0 | other.0)
    }
}

impl std::ops::BitOr for OpInfo {
    type Output = OpInfo;

    fn bitor(self, rhs: OpInfo) -> OpInfo {
        self.union(rhs)
    }
}

impl std::fmt::Debug for OpInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpInfo")
            .field("aa", &self.aa_type())
            .field("shapes", &self.shape_types())
            .field("inner", &self.inner_shape_types())
            .field("perspective", &self.has_perspective())
            .field("local_matrix", &self.has_local_matrix())
            .field("params", &self.has_params())
            .field("non_square", &self.non_square())
            .field("local_coords", &self.uses_local_coords())
            .field("cannot_tweak_alpha", &self.cannot_tweak_alpha_for_coverage())
            .field("cannot_discard", &self.cannot_discard())
            .finish()
    }
}

/// Per-shape GPU record, 48 bytes.
///
/// `info` layout: bits 29..32 shape type, 27..29 inner shape type, bit 26
/// perspective, bit 25 local matrix, bits 0..25 index of the first params texel.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Instance {
    pub info: u32,
    /// Maps the canonical square [-1, +1]² to device space, row-major 2x3.
    pub shape_matrix: [f32; 6],
    /// RGBA8, red in the low byte.
    pub color: u32,
    /// Local rect `[l, t, r, b]` for texture coordinates.
    pub local_rect: [f32; 4],
}

static_assertions::assert_eq_size!(Instance, [u8; 48]);

impl Instance {
    pub const SHAPE_TYPE_BIT: u32 = 29;
    pub const INNER_SHAPE_TYPE_BIT: u32 = 27;
    pub const PERSPECTIVE_FLAG: u32 = 1 << 26;
    pub const LOCAL_MATRIX_FLAG: u32 = 1 << 25;
    pub const PARAMS_IDX_MASK: u32 = (1 << 25) - 1;

    pub fn shape_type(&self) -> Option<ShapeType> {
        ShapeType::from_bits(self.info >> Self::SHAPE_TYPE_BIT)
    }

    pub fn set_shape_type(&mut self, ty: ShapeType) {
        self.info = (self.info & !(0x7 << Self::SHAPE_TYPE_BIT)) | ((ty as u32) << Self::SHAPE_TYPE_BIT);
    }

    /// Inner shapes are limited to rect, oval and simple round rect.
    pub fn inner_shape_type(&self) -> ShapeType {
        ShapeType::from_bits((self.info >> Self::INNER_SHAPE_TYPE_BIT) & 0x3).unwrap_or(ShapeType::Rect)
    }

    pub fn set_inner_shape_type(&mut self, ty: ShapeType) {
        debug_assert!(ty as u8 <= ShapeType::SimpleRRect as u8);
        self.info = (self.info & !(0x3 << Self::INNER_SHAPE_TYPE_BIT))
            | (((ty as u32) & 0x3) << Self::INNER_SHAPE_TYPE_BIT);
    }

    pub fn has_perspective(&self) -> bool {
        self.info & Self::PERSPECTIVE_FLAG != 0
    }

    pub fn has_local_matrix(&self) -> bool {
        self.info & Self::LOCAL_MATRIX_FLAG != 0
    }

    pub fn params_idx(&self) -> u32 {
        self.info & Self::PARAMS_IDX_MASK
    }

    pub fn set_params_idx(&mut self, idx: u32) {
        debug_assert!(idx <= Self::PARAMS_IDX_MASK);
        self.info = (self.info & !Self::PARAMS_IDX_MASK) | (idx & Self::PARAMS_IDX_MASK);
    }
}

/// Auxiliary float4 referenced from an [`Instance`] by index.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct ParamsTexel {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

static_assertions::assert_eq_size!(ParamsTexel, [u8; 16]);

impl ParamsTexel {
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub fn as_array(&self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }
}

/// A range of the canonical index buffer selecting one shape variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IndexRange {
    pub start: u16,
    pub count: u16,
}

impl IndexRange {
    pub const fn new(start: u16, count: u16) -> Self {
        Self { start, count }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn end(&self) -> u32 {
        self.start as u32 + self.count as u32
    }

    /// As the `indices` argument of an indexed draw.
    pub fn indices(&self) -> Range<u32> {
        self.start as u32..self.end()
    }
}

/// One shape instance within an op.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Draw {
    pub instance: Instance,
    pub geometry: IndexRange,
    /// First params texel of this draw within its op's params, if any.
    pub params_offset: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_flags_match_types() {
        assert_eq!(ShapeType::Rect.flag(), ShapeFlags::RECT);
        assert_eq!(ShapeType::ComplexRRect.flag(), ShapeFlags::COMPLEX_RRECT);
        assert_eq!(ShapeType::LAST as u8, 4);
        assert!(ShapeFlags::RRECT.contains(ShapeFlags::NINE_PATCH));
    }

    #[test]
    fn test_op_info_bit_positions() {
        let mut info = OpInfo::default();
        info.set_aa_type(AaType::Msaa);
        info.set_shape_types(ShapeFlags::OVAL);
        info.add_inner_shape_types(ShapeFlags::RECT);
        info.set_cannot_discard(true);
        info.set_has_params(true);
        assert_eq!(info.bits(), 2 | (0x2 << 8) | (0x1 << 16) | (1 << 26) | (1 << 30));
        assert_eq!(info.aa_type(), AaType::Msaa);
        assert_eq!(info.shape_types(), ShapeFlags::OVAL);
        assert!(!info.is_simple_rects());
    }

    #[test]
    fn test_can_combine_rules() {
        let mut a = OpInfo::default();
        a.set_aa_type(AaType::Coverage);
        a.set_cannot_discard(true);
        a.set_shape_types(ShapeFlags::RECT);
        let mut b = a;
        b.set_shape_types(ShapeFlags::OVAL);
        assert!(OpInfo::can_combine(a, b));

        let mut c = a;
        c.set_aa_type(AaType::None);
        assert!(!OpInfo::can_combine(a, c));

        let mut d = a;
        d.add_inner_shape_types(ShapeFlags::SIMPLE_RRECT);
        assert!(!OpInfo::can_combine(a, d));
        assert!(!OpInfo::can_combine(d, a));

        let mut e = a;
        e.set_cannot_discard(false);
        assert!(!OpInfo::can_combine(a, e));
    }

    #[test]
    fn test_instance_info_word() {
        let mut inst = Instance::default();
        inst.set_shape_type(ShapeType::NinePatch);
        inst.set_inner_shape_type(ShapeType::SimpleRRect);
        inst.info |= Instance::PERSPECTIVE_FLAG;
        inst.set_params_idx(1234);
        assert_eq!(inst.shape_type(), Some(ShapeType::NinePatch));
        assert_eq!(inst.inner_shape_type(), ShapeType::SimpleRRect);
        assert!(inst.has_perspective());
        assert!(!inst.has_local_matrix());
        assert_eq!(inst.params_idx(), 1234);
        assert_eq!(inst.info >> 29, 3);
    }

    #[test]
    fn test_instance_layout() {
        assert_eq!(std::mem::size_of::<Instance>(), 48);
        assert_eq!(std::mem::offset_of!(Instance, shape_matrix), 4);
        assert_eq!(std::mem::offset_of!(Instance, color), 28);
        assert_eq!(std::mem::offset_of!(Instance, local_rect), 32);
    }

    #[test]
    fn test_index_range_indices() {
        let r = IndexRange::new(36, 42);
        assert_eq!(r.indices(), 36..78);
        assert!(!r.is_empty());
    }
}
