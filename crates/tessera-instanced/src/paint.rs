//! Paint state consumed by the recorder.
//!
//! The engine treats the processor set as opaque: it only compares sets for
//! equality and reads the few analysis bits that affect batching.

use bitflags::bitflags;

/// Packed RGBA8 color, red in the low byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color(u32);

impl Color {
    pub const TRANSPARENT: Color = Color::from_rgba8(0, 0, 0, 0);
    pub const BLACK: Color = Color::from_rgba8(0, 0, 0, 255);
    pub const WHITE: Color = Color::from_rgba8(255, 255, 255, 255);

    pub const fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self(r as u32 | (g as u32) << 8 | (b as u32) << 16 | (a as u32) << 24)
    }

    /// Components are clamped to [0, 1] and rounded.
    pub fn from_rgba_f32(r: f32, g: f32, b: f32, a: f32) -> Self {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::from_rgba8(q(r), q(g), q(b), q(a))
    }

    pub const fn to_bits(self) -> u32 {
        self.0
    }

    pub const fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn is_opaque(self) -> bool {
        self.alpha() == 255
    }
}

bitflags! {
    /// Analysis results of a processor set that matter for batching.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ProcessorFlags: u8 {
        /// Some processor samples with local coordinates.
        const USES_LOCAL_COORDS = 1 << 0;
        /// The blend reads the destination, so overlapping draws need a barrier.
        const REQUIRES_BARRIER_ON_OVERLAP = 1 << 1;
        /// Coverage cannot be folded into alpha.
        const CANNOT_TWEAK_ALPHA_FOR_COVERAGE = 1 << 2;
    }
}

/// Fragment processors and blend applied to an op, identified by `key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ProcessorSet {
    key: u64,
    flags: ProcessorFlags,
}

impl ProcessorSet {
    pub const fn new(key: u64, flags: ProcessorFlags) -> Self {
        Self { key, flags }
    }

    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn flags(&self) -> ProcessorFlags {
        self.flags
    }

    pub fn uses_local_coords(&self) -> bool {
        self.flags.contains(ProcessorFlags::USES_LOCAL_COORDS)
    }

    pub fn requires_barrier_on_overlap(&self) -> bool {
        self.flags.contains(ProcessorFlags::REQUIRES_BARRIER_ON_OVERLAP)
    }

    pub fn cannot_tweak_alpha_for_coverage(&self) -> bool {
        self.flags
            .contains(ProcessorFlags::CANNOT_TWEAK_ALPHA_FOR_COVERAGE)
    }
}

bitflags! {
    /// sRGB handling requested by the paint.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SrgbFlags: u8 {
        const DISABLE_OUTPUT_CONVERSION = 1 << 0;
        const ALLOW_INPUTS = 1 << 1;
    }
}

/// Everything about a draw request except its geometry and transform.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Paint {
    pub color: Color,
    pub processors: ProcessorSet,
    pub srgb: SrgbFlags,
}

impl Paint {
    pub fn new(color: Color) -> Self {
        Self {
            color,
            ..Default::default()
        }
    }

    pub fn with_processors(mut self, processors: ProcessorSet) -> Self {
        self.processors = processors;
        self
    }

    pub fn with_srgb(mut self, srgb: SrgbFlags) -> Self {
        self.srgb = srgb;
        self
    }
}
