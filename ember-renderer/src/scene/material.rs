//! Surface materials. A material carries the PBR scalar factors, optional
//! texture maps for each channel and the routing decision between the
//! deferred and the forward path.

use crate::{
    renderer::ubo::Std140Writer,
    resource::texture::Texture,
    settings::texture_binding,
};
use bitflags::bitflags;
use ember_graphics::{core::color::Color, state::PipelineState};
use std::{cell::RefCell, rc::Rc};

/// Rendering path of a material.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum MaterialType {
    /// Fully opaque, rendered through the G-buffer.
    #[default]
    Opaque,
    /// Rendered in the forward overlay (translucent or unlit surfaces).
    Lit,
}

bitflags! {
    /// Which texture maps the material carries. Mirrored into the material
    /// uniform block so the shader can branch per channel.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
    pub struct MaterialMaps: u32 {
        const ALBEDO = 0b0000_0001;
        const METALLIC = 0b0000_0010;
        const ROUGHNESS = 0b0000_0100;
        const NORMAL = 0b0000_1000;
        const AMBIENT_OCCLUSION = 0b0001_0000;
        const EMISSIVE = 0b0010_0000;
    }
}

/// See module docs.
#[derive(Clone)]
pub struct Material {
    pub material_type: MaterialType,
    pub albedo_color: Color,
    pub emissive_color: Color,
    pub metallic: f32,
    pub roughness: f32,
    pub reflectance: f32,
    pub ambient_occlusion: f32,
    pub emissive_strength: f32,
    pub albedo_map: Option<Rc<RefCell<Texture>>>,
    pub metallic_map: Option<Rc<RefCell<Texture>>>,
    pub roughness_map: Option<Rc<RefCell<Texture>>>,
    pub normal_map: Option<Rc<RefCell<Texture>>>,
    pub ambient_occlusion_map: Option<Rc<RefCell<Texture>>>,
    pub emissive_map: Option<Rc<RefCell<Texture>>>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            material_type: MaterialType::Opaque,
            albedo_color: Color::WHITE,
            emissive_color: Color::BLACK,
            metallic: 0.0,
            roughness: 1.0,
            reflectance: 0.5,
            ambient_occlusion: 1.0,
            emissive_strength: 0.0,
            albedo_map: None,
            metallic_map: None,
            roughness_map: None,
            normal_map: None,
            ambient_occlusion_map: None,
            emissive_map: None,
        }
    }
}

impl Material {
    /// Which maps are present and uploaded.
    pub fn maps(&self) -> MaterialMaps {
        fn present(map: &Option<Rc<RefCell<Texture>>>) -> bool {
            map.as_ref()
                .map_or(false, |t| t.borrow().gpu_texture().is_some())
        }

        let mut maps = MaterialMaps::empty();
        maps.set(MaterialMaps::ALBEDO, present(&self.albedo_map));
        maps.set(MaterialMaps::METALLIC, present(&self.metallic_map));
        maps.set(MaterialMaps::ROUGHNESS, present(&self.roughness_map));
        maps.set(MaterialMaps::NORMAL, present(&self.normal_map));
        maps.set(
            MaterialMaps::AMBIENT_OCCLUSION,
            present(&self.ambient_occlusion_map),
        );
        maps.set(MaterialMaps::EMISSIVE, present(&self.emissive_map));
        maps
    }

    /// Serializes the material block (binding point 4):
    ///
    /// ```glsl
    /// layout(std140) uniform MaterialData {
    ///     vec4 albedoColor;
    ///     vec4 emissiveColor;
    ///     float metallic;
    ///     float roughness;
    ///     float reflectance;
    ///     float ambientOcclusion;
    ///     float emissiveStrength;
    ///     uint textureMaps;
    /// };
    /// ```
    pub fn write_uniforms(&self) -> Vec<u8> {
        let mut writer = Std140Writer::with_capacity(64);
        writer.write_vec4(&self.albedo_color.srgb_to_linear_f32());
        writer.write_vec4(&self.emissive_color.srgb_to_linear_f32());
        writer.write_f32(self.metallic);
        writer.write_f32(self.roughness);
        writer.write_f32(self.reflectance);
        writer.write_f32(self.ambient_occlusion);
        writer.write_f32(self.emissive_strength);
        writer.write_u32(self.maps().bits());
        writer.finish()
    }

    /// Binds the present texture maps to their fixed units (0..5). Channels
    /// without a map keep whatever texture is bound; the shader never samples
    /// them because the corresponding bit is unset.
    pub fn bind_textures(&self, state: &PipelineState) {
        let bindings = [
            (&self.albedo_map, texture_binding::MATERIAL_ALBEDO),
            (&self.metallic_map, texture_binding::MATERIAL_METALLIC),
            (&self.roughness_map, texture_binding::MATERIAL_ROUGHNESS),
            (&self.normal_map, texture_binding::MATERIAL_NORMAL),
            (
                &self.ambient_occlusion_map,
                texture_binding::MATERIAL_AMBIENT_OCCLUSION,
            ),
            (&self.emissive_map, texture_binding::MATERIAL_EMISSIVE),
        ];

        for (map, unit) in bindings {
            if let Some(map) = map {
                if let Some(gpu) = map.borrow().gpu_texture() {
                    gpu.bind(state, unit);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::{Material, MaterialMaps, MaterialType};

    #[test]
    fn material_defaults() {
        let material = Material::default();
        assert_eq!(material.material_type, MaterialType::Opaque);
        assert_eq!(material.roughness, 1.0);
        assert_eq!(material.reflectance, 0.5);
        assert_eq!(material.maps(), MaterialMaps::empty());
    }

    #[test]
    fn material_uniform_block_layout() {
        // 2 x vec4 + 5 floats + uint, padded to a 16-byte boundary.
        let bytes = Material::default().write_uniforms();
        assert_eq!(bytes.len(), 64);
    }

    #[test]
    fn material_maps_reported_only_when_uploaded() {
        use crate::resource::texture::Texture;
        use std::{cell::RefCell, rc::Rc};

        let material = Material {
            // In-memory only: no GPU handle yet, so the bit must stay unset.
            albedo_map: Some(Rc::new(RefCell::new(
                Texture::from_rgba8(1, 1, vec![0; 4]).unwrap(),
            ))),
            ..Default::default()
        };
        assert_eq!(material.maps(), MaterialMaps::empty());
    }
}
