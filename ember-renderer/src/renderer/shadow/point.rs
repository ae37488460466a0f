//! Point light shadow maps. Each light owns one slice of a cube map array;
//! the fragment shader writes the linear distance from the light into an
//! R32F color attachment, with a shared scratch depth texture providing the
//! z-test. The lighting shader then reconstructs occlusion with a single
//! distance compare, no per-face matrices needed.

use crate::{
    renderer::{
        meshes_drawer::MeshDrawContext,
        shadow::{CubeMapFaceDescriptor, ShadowRenderContext},
        ubo::CameraUniformData,
    },
    scene::{camera::Camera, light::BaseLight},
    settings::{MAX_POINT_LIGHTS, POINT_SHADOW_MAP_SIZE},
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
use nalgebra::{Vector2, Vector3};
use std::rc::Rc;

/// See module docs.
pub struct PointShadowMapRenderer {
    cube_array: Rc<GpuTexture>,
    framebuffer: FrameBuffer,
    faces: [CubeMapFaceDescriptor; 6],
    size: usize,
}

impl PointShadowMapRenderer {
    pub fn new(state: &PipelineState) -> Result<Self, FrameworkError> {
        let cube_array = Rc::new(GpuTexture::new(
            state,
            GpuTextureDescriptor {
                kind: GpuTextureKind::CubeArray {
                    size: POINT_SHADOW_MAP_SIZE,
                    depth: MAX_POINT_LIGHTS,
                },
                pixel_kind: PixelKind::R32F,
                min_filter: MinificationFilter::Linear,
                mag_filter: MagnificationFilter::Linear,
                s_wrap_mode: WrapMode::ClampToEdge,
                t_wrap_mode: WrapMode::ClampToEdge,
                r_wrap_mode: WrapMode::ClampToEdge,
                mip_count: 1,
                data: None,
            },
        )?);

        // Scratch depth buffer reused by every face render.
        let scratch_depth = Rc::new(GpuTexture::new(
            state,
            GpuTextureDescriptor {
                kind: GpuTextureKind::Rectangle {
                    width: POINT_SHADOW_MAP_SIZE,
                    height: POINT_SHADOW_MAP_SIZE,
                },
                pixel_kind: PixelKind::D32F,
                min_filter: MinificationFilter::Linear,
                mag_filter: MagnificationFilter::Linear,
                s_wrap_mode: WrapMode::ClampToEdge,
                t_wrap_mode: WrapMode::ClampToEdge,
                r_wrap_mode: WrapMode::ClampToEdge,
                mip_count: 1,
                data: None,
            },
        )?);

        let framebuffer = FrameBuffer::new(
            state,
            Some(Attachment::depth(scratch_depth)),
            vec![Attachment::color(cube_array.clone())],
        )?;

        Ok(Self {
            cube_array,
            framebuffer,
            faces: CubeMapFaceDescriptor::cube_faces(),
            size: POINT_SHADOW_MAP_SIZE,
        })
    }

    /// The cube array of radial distances; cube `i` belongs to point light `i`.
    pub fn texture(&self) -> &Rc<GpuTexture> {
        &self.cube_array
    }

    /// Renders the six faces of one point light's cube.
    pub(crate) fn render(
        &mut self,
        ctx: &ShadowRenderContext,
        cube_index: usize,
        light_position: Vector3<f32>,
        base: &BaseLight,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let mut stats = RenderPassStatistics::default();

        let viewport = Rect::new(0, 0, self.size as i32, self.size as i32);
        let map_size = Vector2::new(self.size as f32, self.size as f32);

        for face in self.faces.iter() {
            let layer = (cube_index * 6 + face.face.index()) as u32;
            self.framebuffer.set_color_attachment_layer(0, 0, layer);
            // Distances clear to "infinitely far".
            self.framebuffer
                .clear(viewport, Some(Color::WHITE), Some(1.0), None);

            let light_camera = Camera {
                position: light_position,
                front: face.look,
                up: face.up,
                right: face.look.cross(&face.up).normalize(),
                fov: std::f32::consts::FRAC_PI_2,
                near: base.near,
                far: base.far,
                is_orthographic: false,
                ..Default::default()
            };

            let view = light_camera.view_matrix();
            let projection = light_camera.projection_matrix(map_size);

            ctx.ubos.update_camera(
                ctx.state,
                &CameraUniformData::new(
                    view,
                    projection,
                    light_position,
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
                program: &ctx.depth_point_static.program,
                draw_params: *ctx.depth_point_static.draw_parameters(),
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
                program: &ctx.depth_point_skinned.program,
                draw_params: *ctx.depth_point_skinned.draw_parameters(),
                frustum: &frustum,
                camera_is_orthographic: false,
                material_filter: None,
                bind_material: false,
                element_range: ElementRange::Full,
            })?;
        }

        Ok(stats)
    }
}
