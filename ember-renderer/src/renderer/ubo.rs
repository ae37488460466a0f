//! CPU writers and GPU storage of the engine's uniform blocks. The byte
//! layouts here are a hard ABI shared with every shader source; the tests at
//! the bottom pin the sizes and the load-bearing offsets.
//!
//! All five blocks are declared `std140` in GLSL, so the writer below bakes
//! exactly the alignment rules those declarations imply: scalars at 4 bytes,
//! vec3/vec4/mat4 at 16, a 16-byte stride for float arrays, and every struct
//! padded out to a 16-byte boundary.

use crate::settings::{
    uniform_binding, CSM_MATRIX_SLOTS, MAX_BONES, MAX_DIRECTIONAL_LIGHTS, MAX_POINT_LIGHTS,
    MAX_SPOT_LIGHTS,
};
use ember_graphics::{
    buffer::{BufferUsage, UniformBufferObject},
    core::array_as_u8_slice,
    error::FrameworkError,
    state::PipelineState,
};
use nalgebra::{Matrix4, Vector3, Vector4};

/// Byte writer for the uniform blocks of this renderer. Not a general
/// serializer: it only covers the handful of field shapes the five blocks
/// are made of.
#[derive(Default)]
pub struct Std140Writer {
    bytes: Vec<u8>,
}

impl Std140Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
        }
    }

    fn align(&mut self, alignment: usize) {
        let remainder = self.bytes.len() % alignment;
        if remainder > 0 {
            self.bytes.resize(self.bytes.len() + alignment - remainder, 0);
        }
    }

    pub fn write_f32(&mut self, value: f32) {
        self.align(4);
        self.bytes.extend_from_slice(&value.to_ne_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.align(4);
        self.bytes.extend_from_slice(&value.to_ne_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.align(4);
        self.bytes.extend_from_slice(&value.to_ne_bytes());
    }

    /// Booleans are four-byte integers on the GPU side.
    pub fn write_bool(&mut self, value: bool) {
        self.write_i32(if value { 1 } else { 0 });
    }

    /// A vec3 aligns to 16 bytes but occupies only 12; a following scalar
    /// packs into the remaining lane, which the camera block relies on.
    pub fn write_vec3(&mut self, value: &Vector3<f32>) {
        self.align(16);
        self.bytes.extend_from_slice(array_as_u8_slice(value.as_slice()));
    }

    pub fn write_vec4(&mut self, value: &Vector4<f32>) {
        self.align(16);
        self.bytes.extend_from_slice(array_as_u8_slice(value.as_slice()));
    }

    /// Column-major, matching both nalgebra and GLSL.
    pub fn write_mat4(&mut self, value: &Matrix4<f32>) {
        self.align(16);
        self.bytes.extend_from_slice(array_as_u8_slice(value.as_slice()));
    }

    /// A `float name[N]` array: every element sits on its own 16-byte slot.
    pub fn write_f32_array(&mut self, values: &[f32]) {
        for value in values {
            self.align(16);
            self.write_f32(*value);
        }
    }

    /// Pads the struct that just ended out to its 16-byte boundary.
    pub fn end_struct(&mut self) {
        self.align(16);
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Closes the block (blocks end 16-aligned) and returns the bytes.
    pub fn finish(mut self) -> Vec<u8> {
        self.align(16);
        self.bytes
    }
}

/// Contents of the camera block (binding point 0).
#[derive(Clone, Debug, PartialEq)]
pub struct CameraUniformData {
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub inv_view: Matrix4<f32>,
    pub inv_projection: Matrix4<f32>,
    pub position: Vector3<f32>,
    pub near: f32,
    pub far: f32,
}

impl CameraUniformData {
    /// Builds the block from view/projection, inverting with an identity
    /// fallback on singular matrices.
    pub fn new(
        view: Matrix4<f32>,
        projection: Matrix4<f32>,
        position: Vector3<f32>,
        near: f32,
        far: f32,
    ) -> Self {
        Self {
            view,
            projection,
            inv_view: view.try_inverse().unwrap_or_else(Matrix4::identity),
            inv_projection: projection.try_inverse().unwrap_or_else(Matrix4::identity),
            position,
            near,
            far,
        }
    }

    pub fn write(&self) -> Vec<u8> {
        let mut writer = Std140Writer::with_capacity(4 * 64 + 32);
        writer.write_mat4(&self.view);
        writer.write_mat4(&self.projection);
        writer.write_mat4(&self.inv_view);
        writer.write_mat4(&self.inv_projection);
        writer.write_vec3(&self.position);
        writer.write_f32(self.near);
        writer.write_f32(self.far);
        writer.finish()
    }
}

/// Contents of the model block (binding point 1).
#[derive(Clone, Debug, PartialEq)]
pub struct ModelUniformData {
    pub model: Matrix4<f32>,
    pub inverse_transpose_model: Matrix4<f32>,
    /// Object identifier for picking passes; zero means "nothing".
    pub mesh_render_index: u32,
}

impl ModelUniformData {
    /// Builds the block from a world matrix. The normal matrix falls back to
    /// identity when the world matrix is singular.
    pub fn new(model: Matrix4<f32>, mesh_render_index: u32) -> Self {
        Self {
            model,
            inverse_transpose_model: model
                .try_inverse()
                .map(|m| m.transpose())
                .unwrap_or_else(Matrix4::identity),
            mesh_render_index,
        }
    }

    pub fn write(&self) -> Vec<u8> {
        let mut writer = Std140Writer::with_capacity(2 * 64 + 16);
        writer.write_mat4(&self.model);
        writer.write_mat4(&self.inverse_transpose_model);
        writer.write_u32(self.mesh_render_index);
        writer.finish()
    }
}

/// One point light as the lights block stores it.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct PointLightData {
    pub color: Vector3<f32>,
    pub intensity: f32,
    pub position: Vector3<f32>,
    /// `LIGHT_THRESHOLD * sqrt(intensity)`, the shader's early-out radius.
    pub radius: f32,
    pub is_casting_shadow: bool,
}

impl PointLightData {
    fn write(&self, writer: &mut Std140Writer) {
        writer.write_vec3(&self.color);
        writer.write_f32(self.intensity);
        writer.write_vec3(&self.position);
        writer.write_f32(self.radius);
        writer.write_bool(self.is_casting_shadow);
        writer.end_struct();
    }
}

/// One spot light as the lights block stores it. Cutoffs are cosines,
/// precomputed on the CPU.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct SpotLightData {
    pub color: Vector3<f32>,
    pub intensity: f32,
    pub position: Vector3<f32>,
    pub cutoff_cos: f32,
    pub direction: Vector3<f32>,
    pub outer_cutoff_cos: f32,
    pub is_casting_shadow: bool,
}

impl SpotLightData {
    fn write(&self, writer: &mut Std140Writer) {
        writer.write_vec3(&self.color);
        writer.write_f32(self.intensity);
        writer.write_vec3(&self.position);
        writer.write_f32(self.cutoff_cos);
        writer.write_vec3(&self.direction);
        writer.write_f32(self.outer_cutoff_cos);
        writer.write_bool(self.is_casting_shadow);
        writer.end_struct();
    }
}

/// The directional light as the lights block stores it.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct DirectionalLightData {
    pub color: Vector3<f32>,
    pub intensity: f32,
    pub direction: Vector3<f32>,
    pub is_casting_shadow: bool,
    pub cascade_count: i32,
    /// View-space far distance of each cascade split.
    pub cascade_plane_distances: [f32; crate::settings::CSM_CASCADE_COUNT],
}

impl DirectionalLightData {
    fn write(&self, writer: &mut Std140Writer) {
        writer.write_vec3(&self.color);
        writer.write_f32(self.intensity);
        writer.write_vec3(&self.direction);
        writer.write_bool(self.is_casting_shadow);
        writer.write_i32(self.cascade_count);
        writer.write_f32_array(&self.cascade_plane_distances);
        writer.end_struct();
    }
}

/// Contents of the lights block (binding point 2). Arrays are fixed-size;
/// the counts select the live prefix.
#[derive(Clone, Debug, Default)]
pub struct LightsUniformData {
    pub point_count: u32,
    pub spot_count: u32,
    pub directional_count: u32,
    pub point_lights: Vec<PointLightData>,
    pub spot_lights: Vec<SpotLightData>,
    pub directional: DirectionalLightData,
    pub spot_light_space_matrices: Vec<Matrix4<f32>>,
    pub directional_light_space_matrices: Vec<Matrix4<f32>>,
}

impl LightsUniformData {
    /// Serializes the whole block. Field order is part of the ABI: counts,
    /// the three light arrays, the shadow matrices, and the trailing
    /// directional count. Unused array slots are zero-filled; shader
    /// fixed-size arrays are always written in full.
    pub fn write(&self) -> Vec<u8> {
        let mut writer = Std140Writer::with_capacity(LIGHTS_BLOCK_SIZE);

        writer.write_u32(self.point_count);
        writer.write_u32(self.spot_count);

        let empty_point = PointLightData::default();
        for i in 0..MAX_POINT_LIGHTS {
            self.point_lights.get(i).unwrap_or(&empty_point).write(&mut writer);
        }

        let empty_spot = SpotLightData::default();
        for i in 0..MAX_SPOT_LIGHTS {
            self.spot_lights.get(i).unwrap_or(&empty_spot).write(&mut writer);
        }

        self.directional.write(&mut writer);

        let zero = Matrix4::zeros();
        for i in 0..MAX_SPOT_LIGHTS {
            writer.write_mat4(self.spot_light_space_matrices.get(i).unwrap_or(&zero));
        }
        for i in 0..CSM_MATRIX_SLOTS {
            writer.write_mat4(
                self.directional_light_space_matrices.get(i).unwrap_or(&zero),
            );
        }

        writer.write_u32(self.directional_count);
        writer.finish()
    }
}

/// Expected byte size of the lights block; pinned by a test below and by the
/// GLSL declaration.
pub const LIGHTS_BLOCK_SIZE: usize = 16 // counts + array padding
    + MAX_POINT_LIGHTS * 48
    + MAX_SPOT_LIGHTS * 64
    + MAX_DIRECTIONAL_LIGHTS * 112
    + MAX_SPOT_LIGHTS * 64
    + CSM_MATRIX_SLOTS * 64
    + 16; // trailing directional count + padding

/// GPU storage of all five uniform blocks, bound once at startup to their
/// fixed binding points.
pub struct UniformBlocks {
    camera: UniformBufferObject,
    model: UniformBufferObject,
    lights: UniformBufferObject,
    material: UniformBufferObject,
    skinning: UniformBufferObject,
}

impl UniformBlocks {
    pub fn new(state: &PipelineState) -> Result<Self, FrameworkError> {
        let blocks = Self {
            camera: UniformBufferObject::new(state, 4 * 64 + 32, BufferUsage::DynamicDraw)?,
            model: UniformBufferObject::new(state, 2 * 64 + 16, BufferUsage::StreamDraw)?,
            lights: UniformBufferObject::new(state, LIGHTS_BLOCK_SIZE, BufferUsage::DynamicDraw)?,
            material: UniformBufferObject::new(state, 64, BufferUsage::StreamDraw)?,
            skinning: UniformBufferObject::new(state, MAX_BONES * 64, BufferUsage::StreamDraw)?,
        };
        blocks.bind_all(state);
        Ok(blocks)
    }

    /// (Re)binds every block to its binding point.
    pub fn bind_all(&self, state: &PipelineState) {
        self.camera.bind(state, uniform_binding::CAMERA);
        self.model.bind(state, uniform_binding::MODEL);
        self.lights.bind(state, uniform_binding::LIGHTS);
        self.material.bind(state, uniform_binding::MATERIAL);
        self.skinning.bind(state, uniform_binding::SKINNING);
    }

    pub fn update_camera(&self, state: &PipelineState, data: &CameraUniformData) {
        self.camera.write_data(state, &data.write());
    }

    pub fn update_model(&self, state: &PipelineState, data: &ModelUniformData) {
        self.model.write_data(state, &data.write());
    }

    pub fn update_lights(&self, state: &PipelineState, data: &LightsUniformData) {
        self.lights.write_data(state, &data.write());
    }

    pub fn update_material(&self, state: &PipelineState, bytes: &[u8]) {
        self.material.write_data(state, bytes);
    }

    /// Uploads a bone palette, padding the rest of the fixed-size array with
    /// identity so stale bones from a previous draw can never leak through.
    pub fn update_skinning(&self, state: &PipelineState, palette: &[Matrix4<f32>]) {
        let count = palette.len().min(MAX_BONES);
        let mut writer = Std140Writer::with_capacity(MAX_BONES * 64);
        for matrix in &palette[..count] {
            writer.write_mat4(matrix);
        }
        let identity = Matrix4::identity();
        for _ in count..MAX_BONES {
            writer.write_mat4(&identity);
        }
        self.skinning.write_data(state, &writer.finish());
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::settings::CSM_CASCADE_COUNT;
    use ember_graphics::core::transmute_slice;

    #[test]
    fn writer_packs_scalar_after_vec3() {
        let mut writer = Std140Writer::new();
        writer.write_vec3(&Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(writer.len(), 12);
        writer.write_f32(4.0);
        assert_eq!(writer.len(), 16);

        let finished = writer.finish();
        let floats: &[f32] = transmute_slice(&finished);
        assert_eq!(floats, &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn writer_f32_array_has_vec4_stride() {
        let mut writer = Std140Writer::new();
        writer.write_f32_array(&[1.0, 2.0]);
        let finished = writer.finish();
        let floats: &[f32] = transmute_slice(&finished);
        assert_eq!(floats, &[1.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn camera_block_layout() {
        let data = CameraUniformData::new(
            Matrix4::identity(),
            Matrix4::identity(),
            Vector3::new(1.0, 2.0, 3.0),
            0.1,
            100.0,
        );
        let bytes = data.write();
        // Four matrices, then vec3 + two packed floats padded to 16.
        assert_eq!(bytes.len(), 4 * 64 + 32);

        let floats: &[f32] = transmute_slice(&bytes);
        assert_eq!(floats[64], 1.0); // position.x
        assert_eq!(floats[67], 0.1); // near packs right after the vec3
        assert_eq!(floats[68], 100.0); // far
    }

    #[test]
    fn camera_block_singular_matrix_falls_back_to_identity() {
        let data = CameraUniformData::new(
            Matrix4::zeros(),
            Matrix4::identity(),
            Vector3::zeros(),
            0.1,
            10.0,
        );
        assert_eq!(data.inv_view, Matrix4::identity());
    }

    #[test]
    fn model_block_layout() {
        let data = ModelUniformData::new(Matrix4::identity(), 7);
        let bytes = data.write();
        assert_eq!(bytes.len(), 2 * 64 + 16);
        let words: &[u32] = transmute_slice(&bytes);
        assert_eq!(words[32], 7);
    }

    #[test]
    fn model_block_singular_world_matrix() {
        let data = ModelUniformData::new(Matrix4::zeros(), 1);
        assert_eq!(data.inverse_transpose_model, Matrix4::identity());
    }

    #[test]
    fn point_light_element_size() {
        let mut writer = Std140Writer::new();
        PointLightData::default().write(&mut writer);
        assert_eq!(writer.len(), 48);
    }

    #[test]
    fn spot_light_element_size() {
        let mut writer = Std140Writer::new();
        SpotLightData::default().write(&mut writer);
        assert_eq!(writer.len(), 64);
    }

    #[test]
    fn directional_light_element_size() {
        let mut writer = Std140Writer::new();
        DirectionalLightData::default().write(&mut writer);
        assert_eq!(writer.len(), 112);
    }

    #[test]
    fn lights_block_size_is_pinned() {
        let bytes = LightsUniformData::default().write();
        assert_eq!(bytes.len(), LIGHTS_BLOCK_SIZE);
    }

    #[test]
    fn lights_block_counts_and_prefix() {
        let data = LightsUniformData {
            point_count: 2,
            spot_count: 1,
            directional_count: 1,
            point_lights: vec![
                PointLightData {
                    intensity: 5.0,
                    ..Default::default()
                },
                PointLightData::default(),
            ],
            ..Default::default()
        };
        let bytes = data.write();
        assert_eq!(bytes.len(), LIGHTS_BLOCK_SIZE);

        let words: &[u32] = transmute_slice(&bytes);
        assert_eq!(words[0], 2);
        assert_eq!(words[1], 1);

        let floats: &[f32] = transmute_slice(&bytes);
        // First point light starts at byte 16; intensity is its fourth float.
        assert_eq!(floats[4 + 3], 5.0);
    }

    #[test]
    fn directional_cascade_distances_have_vec4_stride() {
        let data = DirectionalLightData {
            cascade_plane_distances: [1.0, 2.0, 3.0, 4.0],
            cascade_count: CSM_CASCADE_COUNT as i32,
            ..Default::default()
        };
        let mut writer = Std140Writer::new();
        data.write(&mut writer);
        let bytes = writer.finish();
        let floats: &[f32] = transmute_slice(&bytes);
        // Array base is at byte 48 = float 12; std140 stride is 16 bytes.
        assert_eq!(floats[12], 1.0);
        assert_eq!(floats[16], 2.0);
        assert_eq!(floats[20], 3.0);
        assert_eq!(floats[24], 4.0);
    }

    #[test]
    fn skinned_palette_upload_is_64_bytes_per_bone() {
        let mut writer = Std140Writer::new();
        for _ in 0..50 {
            writer.write_mat4(&Matrix4::identity());
        }
        assert_eq!(writer.len(), 50 * 64);
    }
}
