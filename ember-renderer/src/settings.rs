//! Renderer-wide constants and quality settings. The constants below are
//! compiled into the shader sources and the uniform block layouts; changing
//! any of them is an ABI break between the CPU and every shader.

use serde::{Deserialize, Serialize};

/// Maximum amount of point lights in a scene. Extra lights are ignored.
pub const MAX_POINT_LIGHTS: usize = 50;
/// Maximum amount of spot lights in a scene. Extra lights are ignored.
pub const MAX_SPOT_LIGHTS: usize = 50;
/// Maximum amount of directional lights in a scene.
pub const MAX_DIRECTIONAL_LIGHTS: usize = 1;
/// Maximum amount of bones of a skinned mesh.
pub const MAX_BONES: usize = 100;

/// Amount of cascade splits of the directional shadow map.
pub const CSM_CASCADE_COUNT: usize = 4;
/// Amount of rendered cascade slices: the splits plus a catch-all slice that
/// covers `last_split..far`.
pub const CSM_SLICE_COUNT: usize = CSM_CASCADE_COUNT + 1;
/// Amount of cascade matrix slots allocated in the lights uniform block.
/// Deliberately generous; slots beyond [`CSM_SLICE_COUNT`] stay unused.
pub const CSM_MATRIX_SLOTS: usize = 12;
/// Default widening factor of the cascade depth range, so casters behind a
/// frustum slice still end up in its shadow map.
pub const CSM_DEFAULT_Z_MULTIPLIER: f32 = 10.0;

/// Side length of one directional cascade layer.
pub const DIRECTIONAL_SHADOW_MAP_SIZE: usize = 4096;
/// Side length of one spot shadow layer.
pub const SPOT_SHADOW_MAP_SIZE: usize = 1024;
/// Side length of one point shadow cube face.
pub const POINT_SHADOW_MAP_SIZE: usize = 1024;

/// Amount of mips in the bloom chain.
pub const BLOOM_MIP_COUNT: usize = 5;
/// Work-group tile side of the bloom compute shaders.
pub const BLOOM_TILE_SIZE: u32 = 8;

/// Scale of the point-light influence radius: `radius = threshold * sqrt(intensity)`.
/// The lighting shader uses the radius as an early-out.
pub const LIGHT_THRESHOLD: f32 = 30.0;

/// Side length of the environment cube map derived from the equirectangular
/// source.
pub const ENVIRONMENT_MAP_SIZE: usize = 512;
/// Side length of the irradiance cube map.
pub const IRRADIANCE_MAP_SIZE: usize = 32;
/// Side length of mip 0 of the prefiltered radiance cube map.
pub const PREFILTER_MAP_SIZE: usize = 128;
/// Amount of mips of the prefiltered radiance cube map; mip `m` is convolved
/// at roughness `m / (count - 1)`.
pub const PREFILTER_MIP_COUNT: usize = 5;
/// Side length of the BRDF lookup table.
pub const BRDF_LUT_SIZE: usize = 512;

/// Uniform buffer binding points shared by every shader.
pub mod uniform_binding {
    pub const CAMERA: u32 = 0;
    pub const MODEL: u32 = 1;
    pub const LIGHTS: u32 = 2;
    pub const MATERIAL: u32 = 4;
    pub const SKINNING: u32 = 5;
}

/// Texture units of the deferred lighting shader and the material maps.
pub mod texture_binding {
    pub const MATERIAL_ALBEDO: u32 = 0;
    pub const MATERIAL_METALLIC: u32 = 1;
    pub const MATERIAL_ROUGHNESS: u32 = 2;
    pub const MATERIAL_NORMAL: u32 = 3;
    pub const MATERIAL_AMBIENT_OCCLUSION: u32 = 4;
    pub const MATERIAL_EMISSIVE: u32 = 5;

    pub const GBUFFER_NORMAL: u32 = 5;
    pub const GBUFFER_ALBEDO: u32 = 6;
    pub const GBUFFER_METALLIC_ROUGHNESS_REFLECTANCE: u32 = 7;
    pub const GBUFFER_AMBIENT_OCCLUSION: u32 = 8;
    pub const GBUFFER_EMISSIVE: u32 = 9;
    pub const GBUFFER_DEPTH: u32 = 10;

    pub const SKYBOX_IRRADIANCE: u32 = 12;
    pub const SKYBOX_PREFILTER: u32 = 13;
    pub const SKYBOX_BRDF_LUT: u32 = 14;

    pub const SHADOW_DIRECTIONAL: u32 = 15;
    pub const SHADOW_SPOT: u32 = 16;
    pub const SHADOW_POINT: u32 = 17;

    /// HDR input of the tone mapper.
    pub const TONE_MAPPING_HDR: u32 = 10;
    /// Bloom input of the tone mapper.
    pub const TONE_MAPPING_BLOOM: u32 = 1;
}

/// User-tweakable renderer settings.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualitySettings {
    /// Widening factor of the cascade depth ranges.
    pub csm_z_multiplier: f32,
    /// Whether the AABB gizmos of flagged renderers are drawn.
    pub draw_aabb_gizmos: bool,
    /// Whether post-processing (bloom + tone mapping) runs.
    pub use_post_process: bool,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self {
            csm_z_multiplier: CSM_DEFAULT_Z_MULTIPLIER,
            draw_aabb_gizmos: false,
            use_post_process: true,
        }
    }
}
