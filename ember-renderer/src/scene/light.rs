//! Light sources. One tagged type per the whole family; the renderer only
//! ever needs the packed GPU data and a shadow camera per light, so a small
//! enum beats a trait hierarchy here.

use crate::settings::LIGHT_THRESHOLD;
use ember_graphics::core::color::Color;
use nalgebra::Vector3;

/// Fields shared by every light variant.
#[derive(Clone, Debug, PartialEq)]
pub struct BaseLight {
    pub color: Color,
    pub intensity: f32,
    pub cast_shadow: bool,
    /// Near plane of the light's shadow camera.
    pub near: f32,
    /// Far plane of the light's shadow camera.
    pub far: f32,
}

impl Default for BaseLight {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            intensity: 1.0,
            cast_shadow: false,
            near: 0.1,
            far: 100.0,
        }
    }
}

/// Variant-specific light data.
#[derive(Clone, Debug, PartialEq)]
pub enum LightKind {
    /// Sun-like light. `direction` is world-space and normalized by the
    /// light manager.
    Directional {
        direction: Vector3<f32>,
        /// Widening factor of the cascade depth ranges for this light.
        z_cascade_multiplier: f32,
    },
    /// Cone light. Cutoff angles are half-angles in radians; the cosines are
    /// precomputed on the CPU before the upload.
    Spot {
        direction: Vector3<f32>,
        cutoff: f32,
        outer_cutoff: f32,
    },
    /// Omnidirectional light; the position comes from the owning entity.
    Point,
}

/// See module docs.
#[derive(Clone, Debug, PartialEq)]
pub struct Light {
    pub base: BaseLight,
    pub kind: LightKind,
}

impl Light {
    pub fn directional(direction: Vector3<f32>) -> Self {
        Self {
            base: Default::default(),
            kind: LightKind::Directional {
                direction,
                z_cascade_multiplier: crate::settings::CSM_DEFAULT_Z_MULTIPLIER,
            },
        }
    }

    pub fn spot(direction: Vector3<f32>, cutoff: f32, outer_cutoff: f32) -> Self {
        Self {
            base: Default::default(),
            kind: LightKind::Spot {
                direction,
                cutoff,
                outer_cutoff,
            },
        }
    }

    pub fn point() -> Self {
        Self {
            base: Default::default(),
            kind: LightKind::Point,
        }
    }

    /// Influence radius of a point light; the lighting shader skips
    /// fragments outside of it.
    pub fn radius(&self) -> f32 {
        LIGHT_THRESHOLD * self.base.intensity.max(0.0).sqrt()
    }
}

#[cfg(test)]
mod test {
    use super::Light;
    use crate::settings::LIGHT_THRESHOLD;

    #[test]
    fn point_light_radius_scales_with_intensity() {
        let mut light = Light::point();
        light.base.intensity = 100.0;
        assert_eq!(light.radius(), LIGHT_THRESHOLD * 10.0);

        light.base.intensity = 0.0;
        assert_eq!(light.radius(), 0.0);
    }
}
