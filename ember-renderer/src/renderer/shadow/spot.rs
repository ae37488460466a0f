//! Spot light shadow maps: one 1024x1024 layer of a depth array per light,
//! rendered from a perspective camera sitting at the light.

use crate::{
    renderer::{
        meshes_drawer::MeshDrawContext,
        shadow::{light_camera_up, ShadowRenderContext},
        ubo::CameraUniformData,
    },
    scene::{camera::Camera, light::BaseLight},
    settings::{MAX_SPOT_LIGHTS, SPOT_SHADOW_MAP_SIZE},
};
use ember_graphics::{
    core::color::Color,
    error::FrameworkError,
    framebuffer::{Attachment, FrameBuffer},
    gpu_texture::{
        GpuTexture, GpuTextureDescriptor, GpuTextureKind, MagnificationFilter,
        MinificationFilter, PixelKind, WrapMode,
    },
    state::PipelineState,
    stats::RenderPassStatistics,
    ElementRange,
};
use ember_math::Rect;
use nalgebra::{Matrix4, Vector2, Vector3};
use std::rc::Rc;

/// Builds the perspective shadow camera of a spot light. The field of view
/// covers the outer cone.
pub(crate) fn spot_light_camera(
    position: Vector3<f32>,
    direction: Vector3<f32>,
    outer_cutoff: f32,
    base: &BaseLight,
) -> Camera {
    let front = direction
        .try_normalize(f32::EPSILON)
        .unwrap_or_else(|| -Vector3::z());
    let up = light_camera_up(front);
    Camera {
        position,
        front,
        up,
        right: front.cross(&up).normalize(),
        fov: (outer_cutoff * 2.0).min(std::f32::consts::PI - 0.01),
        near: base.near,
        far: base.far,
        is_orthographic: false,
        ..Default::default()
    }
}

/// See module docs.
pub struct SpotShadowMapRenderer {
    shadow_map: Rc<GpuTexture>,
    framebuffer: FrameBuffer,
    size: usize,
}

impl SpotShadowMapRenderer {
    pub fn new(state: &PipelineState) -> Result<Self, FrameworkError> {
        let shadow_map = Rc::new(GpuTexture::new(
            state,
            GpuTextureDescriptor {
                kind: GpuTextureKind::Rectangle2DArray {
                    width: SPOT_SHADOW_MAP_SIZE,
                    height: SPOT_SHADOW_MAP_SIZE,
                    depth: MAX_SPOT_LIGHTS,
                },
                pixel_kind: PixelKind::D32F,
                min_filter: MinificationFilter::Nearest,
                mag_filter: MagnificationFilter::Nearest,
                s_wrap_mode: WrapMode::ClampToBorder,
                t_wrap_mode: WrapMode::ClampToBorder,
                r_wrap_mode: WrapMode::ClampToBorder,
                mip_count: 1,
                data: None,
            },
        )?);
        shadow_map.set_border_color(Color::WHITE);

        let framebuffer =
            FrameBuffer::new(state, Some(Attachment::depth(shadow_map.clone())), vec![])?;

        Ok(Self {
            shadow_map,
            framebuffer,
            size: SPOT_SHADOW_MAP_SIZE,
        })
    }

    /// The depth array; layer `i` belongs to spot light `i`.
    pub fn texture(&self) -> &Rc<GpuTexture> {
        &self.shadow_map
    }

    /// Renders one spot light into its layer and returns its light-space
    /// matrix.
    pub(crate) fn render(
        &mut self,
        ctx: &ShadowRenderContext,
        layer: usize,
        light_camera: &Camera,
    ) -> Result<(Matrix4<f32>, RenderPassStatistics), FrameworkError> {
        let mut stats = RenderPassStatistics::default();

        let viewport = Rect::new(0, 0, self.size as i32, self.size as i32);
        let map_size = Vector2::new(self.size as f32, self.size as f32);

        let view = light_camera.view_matrix();
        let projection = light_camera.projection_matrix(map_size);
        let light_space_matrix = projection * view;

        self.framebuffer.set_depth_attachment_layer(layer as u32);
        self.framebuffer.clear(viewport, None, Some(1.0), None);

        ctx.ubos.update_camera(
            ctx.state,
            &CameraUniformData::new(
                view,
                projection,
                light_camera.position,
                light_camera.near,
                light_camera.far,
            ),
        );

        let frustum = light_camera.frustum(1.0);

        stats += ctx.drawer.render_static(MeshDrawContext {
            state: ctx.state,
            scene: ctx.scene,
            ubos: ctx.ubos,
            framebuffer: &self.framebuffer,
            viewport,
            program: &ctx.depth_static.program,
            draw_params: *ctx.depth_static.draw_parameters(),
            frustum: &frustum,
            camera_is_orthographic: false,
            material_filter: None,
            bind_material: false,
            element_range: ElementRange::Full,
        })?;

        stats += ctx.drawer.render_skinned(MeshDrawContext {
            state: ctx.state,
            scene: ctx.scene,
            ubos: ctx.ubos,
            framebuffer: &self.framebuffer,
            viewport,
            program: &ctx.depth_skinned.program,
            draw_params: *ctx.depth_skinned.draw_parameters(),
            frustum: &frustum,
            camera_is_orthographic: false,
            material_filter: None,
            bind_material: false,
            element_range: ElementRange::Full,
        })?;

        Ok((light_space_matrix, stats))
    }
}

#[cfg(test)]
mod test {
    use super::spot_light_camera;
    use crate::scene::light::BaseLight;
    use nalgebra::Vector3;

    #[test]
    fn spot_camera_looks_along_the_light() {
        let camera = spot_light_camera(
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::new(0.0, 0.0, -2.0),
            0.5,
            &BaseLight::default(),
        );
        assert_eq!(camera.position, Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(camera.front, Vector3::new(0.0, 0.0, -1.0));
        assert!((camera.fov - 1.0).abs() < 1e-6);
        assert!(camera.front.dot(&camera.right).abs() < 1e-6);
    }
}
