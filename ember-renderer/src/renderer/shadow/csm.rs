//! Cascaded shadow maps for the directional light. The view frustum is
//! split at fixed fractions of the far plane; each slice gets a tightly
//! fitted orthographic light camera rendered into one layer of a depth
//! array texture. One extra slice past the last split catches everything
//! up to the far plane.

use crate::{
    renderer::{
        meshes_drawer::MeshDrawContext,
        shadow::{light_camera_up, ShadowRenderContext},
        ubo::CameraUniformData,
    },
    scene::camera::Camera,
    settings::{CSM_CASCADE_COUNT, CSM_SLICE_COUNT, DIRECTIONAL_SHADOW_MAP_SIZE},
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
use nalgebra::{Matrix4, Vector2, Vector3, Vector4};
use std::rc::Rc;

/// One rendered cascade slice.
#[derive(Clone, Debug, Default)]
pub struct Cascade {
    pub view_projection: Matrix4<f32>,
    /// View-space far distance of the slice.
    pub z_far: f32,
}

/// Split distances of the view frustum, as fractions of the far plane.
pub(crate) fn split_distances(camera: &Camera) -> [f32; CSM_CASCADE_COUNT] {
    [
        camera.far / 100.0,
        camera.far / 50.0,
        camera.far / 20.0,
        camera.far / 4.0,
    ]
}

/// World-space corners of the frustum slice described by the given
/// view/projection pair, obtained by unprojecting the NDC cube. Falls back
/// to identity on a singular matrix.
pub(crate) fn frustum_corners(
    projection: &Matrix4<f32>,
    view: &Matrix4<f32>,
) -> [Vector3<f32>; 8] {
    let inverse = (projection * view)
        .try_inverse()
        .unwrap_or_else(Matrix4::identity);

    let mut corners = [Vector3::zeros(); 8];
    let mut i = 0;
    for x in [-1.0f32, 1.0] {
        for y in [-1.0f32, 1.0] {
            for z in [-1.0f32, 1.0] {
                let corner = inverse * Vector4::new(x, y, z, 1.0);
                corners[i] = corner.xyz() / corner.w;
                i += 1;
            }
        }
    }
    corners
}

/// Fits an orthographic light camera around one frustum slice: average the
/// slice corners to a center, place the camera at `center + lightDir`
/// looking along `-lightDir`, and wrap the corners in a light-space box.
/// The depth extents are widened by `z_multiplier` so casters behind the
/// slice still reach the map.
pub(crate) fn fit_cascade_camera(
    view_camera: &Camera,
    slice_near: f32,
    slice_far: f32,
    light_direction: Vector3<f32>,
    z_multiplier: f32,
    viewport_size: Vector2<f32>,
) -> Camera {
    let aspect = if viewport_size.y > 0.0 {
        viewport_size.x / viewport_size.y
    } else {
        1.0
    };
    let slice_projection =
        Matrix4::new_perspective(aspect, view_camera.fov, slice_near, slice_far);
    let corners = frustum_corners(&slice_projection, &view_camera.view_matrix());

    let center = corners.iter().sum::<Vector3<f32>>() / corners.len() as f32;

    let direction = light_direction
        .try_normalize(f32::EPSILON)
        .unwrap_or_else(|| -Vector3::y());
    let front = -direction;
    let up = light_camera_up(front);

    let mut light_camera = Camera {
        position: center + direction,
        front,
        up,
        right: front.cross(&up).normalize(),
        is_orthographic: true,
        ..Default::default()
    };

    let light_view = light_camera.view_matrix();
    let mut min = Vector3::repeat(f32::MAX);
    let mut max = Vector3::repeat(-f32::MAX);
    for corner in corners {
        let v = light_view * Vector4::new(corner.x, corner.y, corner.z, 1.0);
        min = min.inf(&v.xyz());
        max = max.sup(&v.xyz());
    }

    if min.z < 0.0 {
        min.z *= z_multiplier;
    } else {
        min.z /= z_multiplier;
    }
    if max.z < 0.0 {
        max.z /= z_multiplier;
    } else {
        max.z *= z_multiplier;
    }

    light_camera.left_right = Vector2::new(min.x, max.x);
    light_camera.bottom_top = Vector2::new(min.y, max.y);
    light_camera.near = min.z;
    light_camera.far = max.z;
    light_camera
}

/// See module docs.
pub struct CsmRenderer {
    shadow_map: Rc<GpuTexture>,
    framebuffer: FrameBuffer,
    cascades: [Cascade; CSM_SLICE_COUNT],
    size: usize,
}

impl CsmRenderer {
    pub fn new(state: &PipelineState) -> Result<Self, FrameworkError> {
        let shadow_map = Rc::new(GpuTexture::new(
            state,
            GpuTextureDescriptor {
                kind: GpuTextureKind::Rectangle2DArray {
                    width: DIRECTIONAL_SHADOW_MAP_SIZE,
                    height: DIRECTIONAL_SHADOW_MAP_SIZE,
                    depth: CSM_SLICE_COUNT,
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
        // Samples outside the atlas must decode as "not in shadow".
        shadow_map.set_border_color(Color::WHITE);

        let framebuffer =
            FrameBuffer::new(state, Some(Attachment::depth(shadow_map.clone())), vec![])?;

        Ok(Self {
            shadow_map,
            framebuffer,
            cascades: Default::default(),
            size: DIRECTIONAL_SHADOW_MAP_SIZE,
        })
    }

    /// The depth array; layer `i` is cascade slice `i`.
    pub fn texture(&self) -> &Rc<GpuTexture> {
        &self.shadow_map
    }

    pub fn cascades(&self) -> &[Cascade] {
        &self.cascades
    }

    /// Renders every cascade slice of the directional light.
    pub(crate) fn render(
        &mut self,
        ctx: &ShadowRenderContext,
        light_direction: Vector3<f32>,
        z_multiplier: f32,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let mut stats = RenderPassStatistics::default();

        let splits = split_distances(ctx.viewport_camera);
        let viewport = Rect::new(0, 0, self.size as i32, self.size as i32);

        for slice in 0..CSM_SLICE_COUNT {
            let slice_near = if slice == 0 {
                ctx.viewport_camera.near
            } else {
                splits[slice - 1]
            };
            let slice_far = if slice < CSM_CASCADE_COUNT {
                splits[slice]
            } else {
                ctx.viewport_camera.far
            };

            let light_camera = fit_cascade_camera(
                ctx.viewport_camera,
                slice_near,
                slice_far,
                light_direction,
                z_multiplier,
                ctx.viewport_size,
            );

            let view = light_camera.view_matrix();
            let projection = light_camera.projection_matrix(ctx.viewport_size);
            self.cascades[slice] = Cascade {
                view_projection: projection * view,
                z_far: slice_far,
            };

            self.framebuffer.set_depth_attachment_layer(slice as u32);
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

            stats += ctx.drawer.render_static(MeshDrawContext {
                state: ctx.state,
                scene: ctx.scene,
                ubos: ctx.ubos,
                framebuffer: &self.framebuffer,
                viewport,
                program: &ctx.depth_static.program,
                draw_params: *ctx.depth_static.draw_parameters(),
                frustum: &light_camera.frustum(1.0),
                camera_is_orthographic: true,
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
                frustum: &light_camera.frustum(1.0),
                camera_is_orthographic: true,
                material_filter: None,
                bind_material: false,
                element_range: ElementRange::Full,
            })?;
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod test {
    use super::{fit_cascade_camera, frustum_corners, split_distances};
    use crate::scene::camera::Camera;
    use nalgebra::{Matrix4, Vector2, Vector3};

    #[test]
    fn split_distances_are_fixed_fractions() {
        let camera = Camera {
            far: 100.0,
            ..Default::default()
        };
        assert_eq!(split_distances(&camera), [1.0, 2.0, 5.0, 25.0]);
    }

    #[test]
    fn frustum_corners_identity_is_ndc_cube() {
        let corners = frustum_corners(&Matrix4::identity(), &Matrix4::identity());
        assert!(corners.iter().any(|c| *c == Vector3::new(-1.0, -1.0, -1.0)));
        assert!(corners.iter().any(|c| *c == Vector3::new(1.0, 1.0, 1.0)));
    }

    #[test]
    fn frustum_corners_singular_matrix_falls_back() {
        let corners = frustum_corners(&Matrix4::zeros(), &Matrix4::identity());
        assert!(corners.iter().all(|c| c.iter().all(|v| v.is_finite())));
    }

    #[test]
    fn cascade_camera_is_offset_along_the_light_ray() {
        let view_camera = Camera::look_at(
            Vector3::new(0.0, 5.0, 5.0),
            Vector3::zeros(),
            Vector3::y(),
        );
        let light_camera = fit_cascade_camera(
            &view_camera,
            0.1,
            1.0,
            Vector3::new(0.0, -1.0, 0.0),
            10.0,
            Vector2::new(800.0, 800.0),
        );

        assert!(light_camera.is_orthographic);
        // Sits at center + lightDir and looks back along -lightDir.
        assert_eq!(light_camera.front, Vector3::new(0.0, 1.0, 0.0));
        let corners = frustum_corners(
            &Matrix4::new_perspective(1.0, view_camera.fov, 0.1, 1.0),
            &view_camera.view_matrix(),
        );
        let center = corners.iter().sum::<Vector3<f32>>() / 8.0;
        assert!((light_camera.position - (center - Vector3::y())).norm() < 1e-4);
    }

    #[test]
    fn cascade_camera_box_encloses_slice() {
        let view_camera = Camera::look_at(
            Vector3::new(0.0, 5.0, 5.0),
            Vector3::zeros(),
            Vector3::y(),
        );
        let light_camera = fit_cascade_camera(
            &view_camera,
            0.1,
            1.0,
            Vector3::new(0.0, -1.0, 0.0),
            10.0,
            Vector2::new(800.0, 800.0),
        );

        let light_view = light_camera.view_matrix();
        let corners = frustum_corners(
            &Matrix4::new_perspective(1.0, view_camera.fov, 0.1, 1.0),
            &view_camera.view_matrix(),
        );
        for corner in corners {
            let v = light_view.transform_point(&nalgebra::Point3::from(corner));
            assert!(v.x >= light_camera.left_right.x - 1e-3);
            assert!(v.x <= light_camera.left_right.y + 1e-3);
            assert!(v.y >= light_camera.bottom_top.x - 1e-3);
            assert!(v.y <= light_camera.bottom_top.y + 1e-3);
        }
    }

    #[test]
    fn cascade_depth_range_is_widened() {
        let view_camera = Camera::look_at(
            Vector3::new(0.0, 5.0, 5.0),
            Vector3::zeros(),
            Vector3::y(),
        );
        let narrow = fit_cascade_camera(
            &view_camera,
            0.1,
            1.0,
            Vector3::new(0.0, -1.0, 0.0),
            1.0,
            Vector2::new(800.0, 800.0),
        );
        let widened = fit_cascade_camera(
            &view_camera,
            0.1,
            1.0,
            Vector3::new(0.0, -1.0, 0.0),
            10.0,
            Vector2::new(800.0, 800.0),
        );
        assert!(widened.far - widened.near > narrow.far - narrow.near);
    }
}
