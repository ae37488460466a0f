//! The lights and shadows manager. Per frame it snapshots the scene lights,
//! renders every shadow-casting light's depth into its reserved layer and
//! only then writes the lights uniform block, so the matrices computed
//! during the shadow pass are in the block before the lighting shader
//! samples it.

use crate::{
    renderer::{
        shadow::{
            csm::{split_distances, CsmRenderer},
            point::PointShadowMapRenderer,
            spot::{spot_light_camera, SpotShadowMapRenderer},
            ShadowRenderContext,
        },
        ubo::{
            DirectionalLightData, LightsUniformData, PointLightData, SpotLightData,
        },
    },
    scene::{
        light::{Light, LightKind},
        Scene,
    },
    settings::{
        texture_binding, CSM_CASCADE_COUNT, MAX_DIRECTIONAL_LIGHTS, MAX_POINT_LIGHTS,
        MAX_SPOT_LIGHTS,
    },
};
use ember_graphics::{
    core::log::Log, error::FrameworkError, state::PipelineState, stats::RenderPassStatistics,
};
use nalgebra::{Matrix4, Vector3};

/// Per-frame snapshot of the scene lights, position paired with the light.
#[derive(Default)]
pub(crate) struct CollectedLights {
    pub point: Vec<(Vector3<f32>, Light)>,
    pub spot: Vec<(Vector3<f32>, Light)>,
    pub directional: Vec<Light>,
}

pub(crate) fn collect_lights(scene: &Scene) -> CollectedLights {
    let mut collected = CollectedLights::default();

    for (_, entity) in scene.entities() {
        let Some(light) = entity.light.as_ref() else {
            continue;
        };
        match light.kind {
            LightKind::Point => collected
                .point
                .push((entity.world_position(), light.clone())),
            LightKind::Spot { .. } => collected
                .spot
                .push((entity.world_position(), light.clone())),
            LightKind::Directional { .. } => collected.directional.push(light.clone()),
        }
    }

    if collected.point.len() > MAX_POINT_LIGHTS {
        Log::warning(format!(
            "Scene has {} point lights, only the first {MAX_POINT_LIGHTS} are rendered.",
            collected.point.len()
        ));
    }
    if collected.spot.len() > MAX_SPOT_LIGHTS {
        Log::warning(format!(
            "Scene has {} spot lights, only the first {MAX_SPOT_LIGHTS} are rendered.",
            collected.spot.len()
        ));
    }
    if collected.directional.len() > MAX_DIRECTIONAL_LIGHTS {
        Log::warning(format!(
            "Scene has {} directional lights, only {MAX_DIRECTIONAL_LIGHTS} is supported.",
            collected.directional.len()
        ));
    }

    collected
}

/// Serializes the snapshot into the lights block, with the cutoff cosines
/// precomputed and the point radii derived from the intensity.
pub(crate) fn pack_lights(
    collected: &CollectedLights,
    spot_matrices: &[Matrix4<f32>],
    directional_matrices: &[Matrix4<f32>],
    cascade_distances: [f32; CSM_CASCADE_COUNT],
) -> LightsUniformData {
    let mut data = LightsUniformData {
        point_count: collected.point.len().min(MAX_POINT_LIGHTS) as u32,
        spot_count: collected.spot.len().min(MAX_SPOT_LIGHTS) as u32,
        directional_count: collected.directional.len().min(MAX_DIRECTIONAL_LIGHTS) as u32,
        spot_light_space_matrices: spot_matrices.to_vec(),
        directional_light_space_matrices: directional_matrices.to_vec(),
        ..Default::default()
    };

    for (position, light) in collected.point.iter().take(MAX_POINT_LIGHTS) {
        data.point_lights.push(PointLightData {
            color: light.base.color.srgb_to_linear_f32().xyz(),
            intensity: light.base.intensity,
            position: *position,
            radius: light.radius(),
            is_casting_shadow: light.base.cast_shadow,
        });
    }

    for (position, light) in collected.spot.iter().take(MAX_SPOT_LIGHTS) {
        let LightKind::Spot {
            direction,
            cutoff,
            outer_cutoff,
        } = light.kind
        else {
            continue;
        };
        data.spot_lights.push(SpotLightData {
            color: light.base.color.srgb_to_linear_f32().xyz(),
            intensity: light.base.intensity,
            position: *position,
            cutoff_cos: cutoff.cos(),
            direction: direction
                .try_normalize(f32::EPSILON)
                .unwrap_or_else(|| -Vector3::z()),
            outer_cutoff_cos: outer_cutoff.cos(),
            is_casting_shadow: light.base.cast_shadow,
        });
    }

    if let Some(light) = collected.directional.first() {
        if let LightKind::Directional { direction, .. } = light.kind {
            data.directional = DirectionalLightData {
                color: light.base.color.srgb_to_linear_f32().xyz(),
                intensity: light.base.intensity,
                direction: direction
                    .try_normalize(f32::EPSILON)
                    .unwrap_or_else(|| -Vector3::y()),
                is_casting_shadow: light.base.cast_shadow,
                cascade_count: CSM_CASCADE_COUNT as i32,
                cascade_plane_distances: cascade_distances,
            };
        }
    }

    data
}

/// See module docs.
pub struct LightManager {
    csm: CsmRenderer,
    spot_shadows: SpotShadowMapRenderer,
    point_shadows: PointShadowMapRenderer,
}

impl LightManager {
    pub fn new(state: &PipelineState) -> Result<Self, FrameworkError> {
        Ok(Self {
            csm: CsmRenderer::new(state)?,
            spot_shadows: SpotShadowMapRenderer::new(state)?,
            point_shadows: PointShadowMapRenderer::new(state)?,
        })
    }

    /// Snapshots the lights, renders every shadow map and uploads the lights
    /// block - in that order.
    pub(crate) fn begin_frame(
        &mut self,
        ctx: &ShadowRenderContext,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let mut stats = RenderPassStatistics::default();

        let collected = collect_lights(ctx.scene);

        // Directional cascades.
        let mut cascade_distances = [0.0; CSM_CASCADE_COUNT];
        let mut directional_matrices = Vec::new();
        if let Some(light) = collected.directional.first() {
            if let LightKind::Directional {
                direction,
                z_cascade_multiplier,
            } = light.kind
            {
                cascade_distances = split_distances(ctx.viewport_camera);
                if light.base.cast_shadow {
                    stats += self.csm.render(ctx, direction, z_cascade_multiplier)?;
                    directional_matrices = self
                        .csm
                        .cascades()
                        .iter()
                        .map(|cascade| cascade.view_projection)
                        .collect();
                }
            }
        }

        // Spot maps, one layer per light.
        let spot_count = collected.spot.len().min(MAX_SPOT_LIGHTS);
        let mut spot_matrices = vec![Matrix4::identity(); spot_count];
        for (i, (position, light)) in collected.spot.iter().take(MAX_SPOT_LIGHTS).enumerate() {
            if !light.base.cast_shadow {
                continue;
            }
            let LightKind::Spot {
                direction,
                outer_cutoff,
                ..
            } = light.kind
            else {
                continue;
            };
            let light_camera = spot_light_camera(*position, direction, outer_cutoff, &light.base);
            let (matrix, spot_stats) = self.spot_shadows.render(ctx, i, &light_camera)?;
            spot_matrices[i] = matrix;
            stats += spot_stats;
        }

        // Point cubes, six faces per light.
        for (i, (position, light)) in collected.point.iter().take(MAX_POINT_LIGHTS).enumerate() {
            if !light.base.cast_shadow {
                continue;
            }
            stats += self
                .point_shadows
                .render(ctx, i, *position, &light.base)?;
        }

        // The block is written only now, after the shadow matrices exist.
        let data = pack_lights(
            &collected,
            &spot_matrices,
            &directional_matrices,
            cascade_distances,
        );
        ctx.ubos.update_lights(ctx.state, &data);

        Ok(stats)
    }

    /// Binds the three shadow atlases at their fixed units (15..17).
    pub fn bind_shadow_maps(&self, state: &PipelineState) {
        self.csm
            .texture()
            .bind(state, texture_binding::SHADOW_DIRECTIONAL);
        self.spot_shadows
            .texture()
            .bind(state, texture_binding::SHADOW_SPOT);
        self.point_shadows
            .texture()
            .bind(state, texture_binding::SHADOW_POINT);
    }

    pub fn csm(&self) -> &CsmRenderer {
        &self.csm
    }
}

#[cfg(test)]
mod test {
    use super::{collect_lights, pack_lights, CollectedLights};
    use crate::{
        scene::{light::Light, Scene},
        settings::{CSM_CASCADE_COUNT, LIGHT_THRESHOLD, MAX_POINT_LIGHTS},
    };
    use ember_core::pool::Handle;
    use nalgebra::Vector3;

    #[test]
    fn empty_scene_has_zero_counts() {
        let scene = Scene::new();
        let collected = collect_lights(&scene);
        let data = pack_lights(&collected, &[], &[], [0.0; CSM_CASCADE_COUNT]);
        assert_eq!(data.point_count, 0);
        assert_eq!(data.spot_count, 0);
        assert_eq!(data.directional_count, 0);
    }

    #[test]
    fn excess_point_lights_are_clamped() {
        let mut scene = Scene::new();
        for i in 0..MAX_POINT_LIGHTS + 1 {
            let entity = scene.create_entity(format!("light{i}"), Handle::NONE);
            scene.entity_mut(entity).light = Some(Light::point());
        }
        scene.update_world_matrices();

        let collected = collect_lights(&scene);
        assert_eq!(collected.point.len(), MAX_POINT_LIGHTS + 1);

        let data = pack_lights(&collected, &[], &[], [0.0; CSM_CASCADE_COUNT]);
        assert_eq!(data.point_count, MAX_POINT_LIGHTS as u32);
        assert_eq!(data.point_lights.len(), MAX_POINT_LIGHTS);
    }

    #[test]
    fn spot_cutoffs_are_uploaded_as_cosines() {
        let mut collected = CollectedLights::default();
        collected.spot.push((
            Vector3::zeros(),
            Light::spot(Vector3::new(0.0, 0.0, -1.0), 0.5, 0.8),
        ));
        let data = pack_lights(&collected, &[], &[], [0.0; CSM_CASCADE_COUNT]);
        assert!((data.spot_lights[0].cutoff_cos - 0.5f32.cos()).abs() < 1e-6);
        assert!((data.spot_lights[0].outer_cutoff_cos - 0.8f32.cos()).abs() < 1e-6);
    }

    #[test]
    fn point_light_radius_is_packed() {
        let mut collected = CollectedLights::default();
        let mut light = Light::point();
        light.base.intensity = 100.0;
        collected.point.push((Vector3::zeros(), light));
        let data = pack_lights(&collected, &[], &[], [0.0; CSM_CASCADE_COUNT]);
        assert_eq!(data.point_lights[0].radius, LIGHT_THRESHOLD * 10.0);
    }

    #[test]
    fn directional_light_is_normalized() {
        let mut collected = CollectedLights::default();
        collected
            .directional
            .push(Light::directional(Vector3::new(0.0, -2.0, 0.0)));
        let data = pack_lights(&collected, &[], &[], [1.0, 2.0, 5.0, 25.0]);
        assert_eq!(data.directional_count, 1);
        assert_eq!(data.directional.direction, Vector3::new(0.0, -1.0, 0.0));
        assert_eq!(data.directional.cascade_plane_distances, [1.0, 2.0, 5.0, 25.0]);
    }
}
