//! The shape program's view of the engine.
//!
//! Owns the canonical geometry every instance is drawn from, picks the index
//! range for a shape and AA mode, derives program keys from [`OpInfo`] and
//! grades device support.

use crate::features::{InstancedCaps, InstancedFeatures, InstancedSupport};
use crate::types::{AaType, IndexRange, OpInfo};
use bytemuck::{Pod, Zeroable};
use tessera_core::geometry::Rect;

/// Vertex of the canonical geometry.
///
/// `attrs` tells the shader which ring or corner a vertex belongs to: `-1`
/// marks outer-ring vertices, `0` inner-ring vertices, and for cornered rects
/// the low two bits select the corner.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ShapeVertex {
    pub x: f32,
    pub y: f32,
    pub attrs: i32,
}

static_assertions::assert_eq_size!(ShapeVertex, [u8; 12]);

impl ShapeVertex {
    pub const fn new(x: f32, y: f32, attrs: i32) -> Self {
        Self { x, y, attrs }
    }

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRS: &[wgpu::VertexAttribute] = &wgpu::vertex_attr_array![
            0 => Float32x2, // shape coords
            1 => Sint32,    // vertex attrs
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ShapeVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: ATTRS,
        }
    }
}

/// Vertex attributes the shape program reads, across both vertex buffers.
pub const NUM_ATTRIBS: u32 = 7;

/// Layout of [`Instance`](crate::Instance) on vertex slot 1.
pub fn instance_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRS: &[wgpu::VertexAttribute] = &wgpu::vertex_attr_array![
        2 => Uint32,    // info
        3 => Float32x3, // shape matrix row 0
        4 => Float32x3, // shape matrix row 1
        5 => Unorm8x4,  // color
        6 => Float32x4, // local rect
    ];
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<crate::Instance>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: ATTRS,
    }
}

pub const VERTEX_DATA: [ShapeVertex; 81] = [
    // Rect; 4..8 are the inset ring of the framed rect.
    ShapeVertex::new(1.0, 1.0, -1),
    ShapeVertex::new(-1.0, 1.0, -1),
    ShapeVertex::new(-1.0, -1.0, -1),
    ShapeVertex::new(1.0, -1.0, -1),
    ShapeVertex::new(1.0, 1.0, 0),
    ShapeVertex::new(-1.0, 1.0, 0),
    ShapeVertex::new(-1.0, -1.0, 0),
    ShapeVertex::new(1.0, -1.0, 0),
    // Octagon ring around the unit circle; 24 is the fan center.
    ShapeVertex::new(1.0, 0.0, 0),
    ShapeVertex::new(1.0, 0.414214, -1),
    ShapeVertex::new(0.707106, 0.707106, 0),
    ShapeVertex::new(0.414214, 1.0, -1),
    ShapeVertex::new(0.0, 1.0, 0),
    ShapeVertex::new(-0.414214, 1.0, -1),
    ShapeVertex::new(-0.707106, 0.707106, 0),
    ShapeVertex::new(-1.0, 0.414214, -1),
    ShapeVertex::new(-1.0, 0.0, 0),
    ShapeVertex::new(-1.0, -0.414214, -1),
    ShapeVertex::new(-0.707106, -0.707106, 0),
    ShapeVertex::new(-0.414214, -1.0, -1),
    ShapeVertex::new(0.0, -1.0, 0),
    ShapeVertex::new(0.414214, -1.0, -1),
    ShapeVertex::new(0.707106, -0.707106, 0),
    ShapeVertex::new(1.0, -0.414214, -1),
    ShapeVertex::new(0.0, 0.0, -1),
    // Rect with disjoint corner segments; 37..41 fan centers, 41..49 inset ring.
    ShapeVertex::new(1.0, 0.5, 3),
    ShapeVertex::new(1.0, 1.0, 3),
    ShapeVertex::new(0.5, 1.0, 3),
    ShapeVertex::new(-0.5, 1.0, 2),
    ShapeVertex::new(-1.0, 1.0, 2),
    ShapeVertex::new(-1.0, 0.5, 2),
    ShapeVertex::new(-1.0, -0.5, 0),
    ShapeVertex::new(-1.0, -1.0, 0),
    ShapeVertex::new(-0.5, -1.0, 0),
    ShapeVertex::new(0.5, -1.0, 1),
    ShapeVertex::new(1.0, -1.0, 1),
    ShapeVertex::new(1.0, -0.5, 1),
    ShapeVertex::new(0.0, 0.0, 3),
    ShapeVertex::new(0.0, 0.0, 2),
    ShapeVertex::new(0.0, 0.0, 0),
    ShapeVertex::new(0.0, 0.0, 1),
    ShapeVertex::new(0.75, 0.5, 3),
    ShapeVertex::new(0.5, 0.75, 3),
    ShapeVertex::new(-0.5, 0.75, 2),
    ShapeVertex::new(-0.75, 0.5, 2),
    ShapeVertex::new(-0.75, -0.5, 0),
    ShapeVertex::new(-0.5, -0.75, 0),
    ShapeVertex::new(0.5, -0.75, 1),
    ShapeVertex::new(0.75, -0.5, 1),
    // 16-gon ring around the unit circle.
    ShapeVertex::new(1.0, 0.0, 0),
    ShapeVertex::new(1.0, 0.198913, -1),
    ShapeVertex::new(0.923879, 0.382683, 0),
    ShapeVertex::new(0.84776, 0.566455, -1),
    ShapeVertex::new(0.707106, 0.707106, 0),
    ShapeVertex::new(0.566455, 0.84776, -1),
    ShapeVertex::new(0.382683, 0.923879, 0),
    ShapeVertex::new(0.198913, 1.0, -1),
    ShapeVertex::new(0.0, 1.0, 0),
    ShapeVertex::new(-0.198913, 1.0, -1),
    ShapeVertex::new(-0.382683, 0.923879, 0),
    ShapeVertex::new(-0.566455, 0.84776, -1),
    ShapeVertex::new(-0.707106, 0.707106, 0),
    ShapeVertex::new(-0.84776, 0.566455, -1),
    ShapeVertex::new(-0.923879, 0.382683, 0),
    ShapeVertex::new(-1.0, 0.198913, -1),
    ShapeVertex::new(-1.0, 0.0, 0),
    ShapeVertex::new(-1.0, -0.198913, -1),
    ShapeVertex::new(-0.923879, -0.382683, 0),
    ShapeVertex::new(-0.84776, -0.566455, -1),
    ShapeVertex::new(-0.707106, -0.707106, 0),
    ShapeVertex::new(-0.566455, -0.84776, -1),
    ShapeVertex::new(-0.382683, -0.923879, 0),
    ShapeVertex::new(-0.198913, -1.0, -1),
    ShapeVertex::new(-0.0, -1.0, 0),
    ShapeVertex::new(0.198913, -1.0, -1),
    ShapeVertex::new(0.382683, -0.923879, 0),
    ShapeVertex::new(0.566455, -0.84776, -1),
    ShapeVertex::new(0.707106, -0.707106, 0),
    ShapeVertex::new(0.84776, -0.566455, -1),
    ShapeVertex::new(0.923879, -0.382683, 0),
    ShapeVertex::new(1.0, -0.198913, -1),
];

pub const INDEX_DATA: [u16; 474] = [
    // basic rect
    0, 1, 2,
    0, 2, 3,
    // framed rect (coverage)
    0, 1, 5,
    5, 4, 0,
    1, 2, 6,
    6, 5, 1,
    2, 3, 7,
    7, 6, 2,
    3, 0, 4,
    4, 7, 3,
    4, 5, 6,
    6, 7, 4,
    // octagons
    10, 8, 9,
    12, 10, 11,
    14, 12, 13,
    16, 14, 15,
    18, 16, 17,
    20, 18, 19,
    22, 20, 21,
    8, 22, 23,
    8, 10, 12,
    12, 14, 16,
    16, 18, 20,
    20, 22, 8,
    8, 12, 16,
    16, 20, 8,
    // octagons, fanned interior (mixed samples)
    10, 8, 9,
    12, 10, 11,
    14, 12, 13,
    16, 14, 15,
    18, 16, 17,
    20, 18, 19,
    22, 20, 21,
    8, 22, 23,
    24, 8, 10,
    12, 24, 10,
    24, 12, 14,
    16, 24, 14,
    24, 16, 18,
    20, 24, 18,
    24, 20, 22,
    8, 24, 22,
    // disjoint octagons (coverage)
    8, 22, 23,
    9, 8, 23,
    10, 8, 9,
    11, 10, 9,
    12, 10, 11,
    13, 12, 11,
    14, 12, 13,
    15, 14, 13,
    16, 14, 15,
    17, 16, 15,
    18, 16, 17,
    19, 18, 17,
    20, 18, 19,
    21, 20, 19,
    22, 20, 21,
    23, 22, 21,
    22, 8, 10,
    10, 12, 14,
    14, 16, 18,
    18, 20, 22,
    22, 10, 14,
    14, 18, 22,
    // cornered rect
    27, 25, 26,
    30, 28, 29,
    33, 31, 32,
    36, 34, 35,
    25, 27, 28,
    28, 30, 31,
    31, 33, 34,
    34, 36, 25,
    25, 28, 31,
    31, 34, 25,
    // cornered rect, fanned interior (mixed samples)
    27, 25, 26,
    30, 28, 29,
    33, 31, 32,
    36, 34, 35,
    27, 37, 25,
    28, 37, 27,
    30, 38, 28,
    31, 38, 30,
    33, 39, 31,
    34, 39, 33,
    36, 40, 34,
    25, 40, 36,
    // cornered framed rect (coverage)
    41, 25, 26,
    42, 41, 26,
    27, 42, 26,
    43, 28, 29,
    44, 43, 29,
    30, 44, 29,
    45, 31, 32,
    46, 45, 32,
    33, 46, 32,
    47, 34, 35,
    48, 47, 35,
    36, 48, 35,
    27, 28, 42,
    42, 28, 43,
    30, 31, 44,
    44, 31, 45,
    33, 34, 46,
    46, 34, 47,
    36, 25, 48,
    48, 25, 41,
    41, 42, 43,
    43, 44, 45,
    45, 46, 47,
    47, 48, 41,
    41, 43, 45,
    45, 47, 41,
    // disjoint 16-gons (large coverage ovals)
    49, 79, 80,
    50, 49, 80,
    51, 49, 50,
    52, 51, 50,
    53, 51, 52,
    54, 53, 52,
    55, 53, 54,
    56, 55, 54,
    57, 55, 56,
    58, 57, 56,
    59, 57, 58,
    60, 59, 58,
    61, 59, 60,
    62, 61, 60,
    63, 61, 62,
    64, 63, 62,
    65, 63, 64,
    66, 65, 64,
    67, 65, 66,
    68, 67, 66,
    69, 67, 68,
    70, 69, 68,
    71, 69, 70,
    72, 71, 70,
    73, 71, 72,
    74, 73, 72,
    75, 73, 74,
    76, 75, 74,
    77, 75, 76,
    78, 77, 76,
    79, 77, 78,
    80, 79, 78,
    49, 51, 53,
    53, 55, 57,
    57, 59, 61,
    61, 63, 65,
    65, 67, 69,
    69, 71, 73,
    73, 75, 77,
    77, 79, 49,
    49, 53, 57,
    57, 61, 65,
    65, 69, 73,
    73, 77, 49,
    49, 57, 65,
    65, 73, 49,
];

const RECT: IndexRange = IndexRange::new(0, 3 * 2);
const FRAMED_RECT: IndexRange = IndexRange::new(6, 3 * 10);
const OCTAGONS: IndexRange = IndexRange::new(36, 3 * 14);
const OCTAGONS_FANNED: IndexRange = IndexRange::new(78, 3 * 16);
const DISJOINT_OCTAGONS: IndexRange = IndexRange::new(126, 3 * 22);
const CORNERED_RECT: IndexRange = IndexRange::new(192, 3 * 10);
const CORNERED_RECT_FANNED: IndexRange = IndexRange::new(222, 3 * 12);
const CORNERED_FRAMED_RECT: IndexRange = IndexRange::new(258, 3 * 26);
const DISJOINT_16GONS: IndexRange = IndexRange::new(336, 3 * 46);

static_assertions::const_assert_eq!(DISJOINT_16GONS.start as usize + DISJOINT_16GONS.count as usize, INDEX_DATA.len());

/// Debug name of a canonical index range.
pub fn index_range_name(range: IndexRange) -> &'static str {
    match range.start {
        0 => "basic_rect",
        6 => "coverage_rect",
        36 => "basic_oval",
        78 => "mixed_samples_oval",
        126 => "coverage_oval",
        192 => "basic_round_rect",
        222 => "mixed_samples_round_rect",
        258 => "coverage_round_rect",
        336 => "coverage_large_oval",
        _ => "unknown",
    }
}

/// Key identifying the shape program variant an op needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramKey {
    pub info: OpInfo,
    pub uses_sample_locations: bool,
}

impl ProgramKey {
    pub fn bits(&self) -> u64 {
        self.info.bits() as u64 | (self.uses_sample_locations as u64) << 32
    }
}

/// Program-side collaborator of the engine.
pub trait ShapeProcessor: Send + Sync {
    /// Grade what the device can run.
    fn check_support(&self, caps: &InstancedCaps) -> InstancedSupport;

    fn program_key(&self, info: OpInfo) -> ProgramKey;

    fn vertex_data(&self) -> &[ShapeVertex];

    fn index_data(&self) -> &[u16];
}

/// The standard shape processor.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstanceProcessor;

impl InstanceProcessor {
    pub fn index_range_for_rect(aa: AaType) -> IndexRange {
        match aa {
            AaType::Coverage => FRAMED_RECT,
            AaType::None | AaType::Msaa | AaType::MixedSamples => RECT,
        }
    }

    /// `large_oval_area` is compared against the device bounds area.
    pub fn index_range_for_oval(aa: AaType, dev_bounds: &Rect, large_oval_area: f32) -> IndexRange {
        if aa == AaType::Coverage && dev_bounds.width() * dev_bounds.height() >= large_oval_area {
            return DISJOINT_16GONS;
        }
        match aa {
            AaType::None | AaType::Msaa => OCTAGONS,
            AaType::Coverage => DISJOINT_OCTAGONS,
            AaType::MixedSamples => OCTAGONS_FANNED,
        }
    }

    pub fn index_range_for_rrect(aa: AaType) -> IndexRange {
        match aa {
            AaType::None | AaType::Msaa => CORNERED_RECT,
            AaType::Coverage => CORNERED_FRAMED_RECT,
            AaType::MixedSamples => CORNERED_RECT_FANNED,
        }
    }
}

impl ShapeProcessor for InstanceProcessor {
    fn check_support(&self, caps: &InstancedCaps) -> InstancedSupport {
        if !caps.has(InstancedFeatures::INSTANCED_DRAW) || caps.max_vertex_attributes < NUM_ATTRIBS {
            return InstancedSupport::None;
        }
        if !caps.has(
            InstancedFeatures::SAMPLE_LOCATIONS
                | InstancedFeatures::SAMPLE_VARIABLES
                | InstancedFeatures::SHADER_DERIVATIVES,
        ) {
            return InstancedSupport::Basic;
        }
        if !caps.has(InstancedFeatures::RASTER_SAMPLES | InstancedFeatures::SAMPLE_MASK_OVERRIDE_COVERAGE) {
            return InstancedSupport::Multisampled;
        }
        InstancedSupport::MixedSampled
    }

    fn program_key(&self, info: OpInfo) -> ProgramKey {
        let aa = info.aa_type();
        ProgramKey {
            info,
            uses_sample_locations: (aa.is_hw() && !info.is_simple_rects()) || aa == AaType::MixedSamples,
        }
    }

    fn vertex_data(&self) -> &[ShapeVertex] {
        &VERTEX_DATA
    }

    fn index_data(&self) -> &[u16] {
        &INDEX_DATA
    }
}
