//! Device capabilities relevant to instanced shape rendering.

use bitflags::bitflags;

bitflags! {
    /// Device and shader features the engine can take advantage of.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InstancedFeatures: u32 {
        /// Instanced draws plus everything the shape program needs: flat
        /// interpolation, integer attributes and params reads from the vertex stage.
        const INSTANCED_DRAW = 1 << 0;

        /// Programmable sample locations.
        const SAMPLE_LOCATIONS = 1 << 1;
        /// Per-sample shader variables (sample id, sample mask).
        const SAMPLE_VARIABLES = 1 << 2;
        /// Fragment derivatives.
        const SHADER_DERIVATIVES = 1 << 3;
        /// Raster sample count independent of the color target (mixed samples).
        const RASTER_SAMPLES = 1 << 4;
        /// Writing the sample mask overrides coverage.
        const SAMPLE_MASK_OVERRIDE_COVERAGE = 1 << 5;

        /// Indexed indirect draws.
        const DRAW_INDIRECT = 1 << 6;
        /// Several indirect draws in one call.
        const MULTI_DRAW_INDIRECT = 1 << 7;
        /// Non-zero first instance in draw commands.
        const BASE_INSTANCE = 1 << 8;

        /// Multisampling can be switched off per draw on a multisampled target.
        const MULTISAMPLE_DISABLE = 1 << 9;
        /// Instanced draws to floating-point targets are slow or broken.
        const AVOID_FLOAT_TARGETS = 1 << 10;
    }
}

/// Capability snapshot consulted when recording and when selecting a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstancedCaps {
    pub features: InstancedFeatures,
    pub max_vertex_attributes: u32,
}

impl Default for InstancedCaps {
    fn default() -> Self {
        Self {
            features: InstancedFeatures::INSTANCED_DRAW | InstancedFeatures::SHADER_DERIVATIVES,
            max_vertex_attributes: 16,
        }
    }
}

impl InstancedCaps {
    pub fn new(features: InstancedFeatures) -> Self {
        Self {
            features,
            ..Default::default()
        }
    }

    pub fn with_max_vertex_attributes(mut self, count: u32) -> Self {
        self.max_vertex_attributes = count;
        self
    }

    pub fn has(&self, feature: InstancedFeatures) -> bool {
        self.features.contains(feature)
    }

    /// Derive caps from what a wgpu device exposes.
    ///
    /// wgpu has no sample-location or mixed-sample controls, so a wgpu device
    /// tops out at [`InstancedSupport::Basic`].
    pub fn from_wgpu(
        features: wgpu::Features,
        downlevel: wgpu::DownlevelFlags,
        limits: &wgpu::Limits,
    ) -> Self {
        let mut caps = InstancedFeatures::SHADER_DERIVATIVES;
        if downlevel.contains(wgpu::DownlevelFlags::VERTEX_STORAGE) {
            caps |= InstancedFeatures::INSTANCED_DRAW;
        }
        if downlevel.contains(wgpu::DownlevelFlags::INDIRECT_EXECUTION) {
            caps |= InstancedFeatures::DRAW_INDIRECT | InstancedFeatures::MULTI_DRAW_INDIRECT;
        }
        if features.contains(wgpu::Features::INDIRECT_FIRST_INSTANCE) {
            caps |= InstancedFeatures::BASE_INSTANCE;
        }
        Self {
            features: caps,
            max_vertex_attributes: limits.max_vertex_attributes,
        }
    }
}

/// How much of the instanced pipeline a device supports, in increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InstancedSupport {
    None,
    /// Non-AA and coverage AA.
    Basic,
    /// Adds MSAA.
    Multisampled,
    /// Adds mixed samples.
    MixedSampled,
}

impl std::fmt::Display for InstancedSupport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstancedSupport::None => write!(f, "none"),
            InstancedSupport::Basic => write!(f, "basic"),
            InstancedSupport::Multisampled => write!(f, "multisampled"),
            InstancedSupport::MixedSampled => write!(f, "mixed-sampled"),
        }
    }
}
