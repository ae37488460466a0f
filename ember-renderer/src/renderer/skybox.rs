//! Skybox IBL preprocessing. From one equirectangular HDR source the parser
//! derives the four textures the lighting pass consumes: the environment
//! cube map, its irradiance convolution, the GGX-prefiltered radiance chain
//! and the split-sum BRDF lookup table. All four are regenerated whenever
//! the source changes; when any of them is missing the lighting pass simply
//! runs without ambient contribution.

use crate::{
    resource::{model::Model, shader::RenderShader},
    settings::{
        texture_binding, BRDF_LUT_SIZE, ENVIRONMENT_MAP_SIZE, IRRADIANCE_MAP_SIZE,
        PREFILTER_MAP_SIZE, PREFILTER_MIP_COUNT,
    },
};
use ember_graphics::{
    error::FrameworkError,
    framebuffer::{Attachment, FrameBuffer},
    gpu_texture::{
        GpuTexture, GpuTextureDescriptor, GpuTextureKind, MagnificationFilter,
        MinificationFilter, PixelKind, WrapMode,
    },
    state::PipelineState,
    CompareFunc, DrawParameters, ElementRange,
};
use ember_math::Rect;
use nalgebra::{Matrix4, Point3};
use std::rc::Rc;

use super::shadow::CubeMapFaceDescriptor;

/// The four derived GPU textures of a processed skybox.
pub struct SkyboxMaps {
    pub environment: Rc<GpuTexture>,
    pub irradiance: Rc<GpuTexture>,
    pub prefiltered: Rc<GpuTexture>,
    pub brdf_lut: Rc<GpuTexture>,
}

impl SkyboxMaps {
    /// Binds the IBL inputs of the lighting shader at units 12..14.
    pub fn bind(&self, state: &PipelineState) {
        self.irradiance
            .bind(state, texture_binding::SKYBOX_IRRADIANCE);
        self.prefiltered
            .bind(state, texture_binding::SKYBOX_PREFILTER);
        self.brdf_lut.bind(state, texture_binding::SKYBOX_BRDF_LUT);
    }
}

fn make_cube_texture(
    state: &PipelineState,
    size: usize,
    mip_count: usize,
) -> Result<Rc<GpuTexture>, FrameworkError> {
    Ok(Rc::new(GpuTexture::new(
        state,
        GpuTextureDescriptor {
            kind: GpuTextureKind::Cube { size },
            pixel_kind: PixelKind::RGB16F,
            min_filter: if mip_count > 1 {
                MinificationFilter::LinearMipMapLinear
            } else {
                MinificationFilter::Linear
            },
            mag_filter: MagnificationFilter::Linear,
            s_wrap_mode: WrapMode::ClampToEdge,
            t_wrap_mode: WrapMode::ClampToEdge,
            r_wrap_mode: WrapMode::ClampToEdge,
            mip_count,
            data: None,
        },
    )?))
}

/// Projection shared by every cube capture: 90 degrees, square.
fn capture_projection() -> Matrix4<f32> {
    Matrix4::new_perspective(1.0, std::f32::consts::FRAC_PI_2, 0.1, 10.0)
}

fn capture_view(face: &CubeMapFaceDescriptor) -> Matrix4<f32> {
    Matrix4::look_at_rh(
        &Point3::origin(),
        &Point3::from(face.look),
        &face.up,
    )
}

/// See module docs.
pub struct SkyboxParser {
    equirect_to_cube: RenderShader,
    irradiance_convolution: RenderShader,
    prefilter: RenderShader,
    brdf: RenderShader,
}

impl SkyboxParser {
    pub fn new(state: &PipelineState) -> Result<Self, FrameworkError> {
        let cube_params = DrawParameters {
            cull_face: None,
            depth_test: Some(CompareFunc::LessOrEqual),
            depth_write: false,
            blend: None,
            ..Default::default()
        };

        let equirect_to_cube = RenderShader::new(
            state,
            "EquirectangularToCubeMap",
            include_str!("shaders/cube_capture.vert"),
            include_str!("shaders/equirect_to_cubemap.frag"),
            cube_params,
        )?;
        equirect_to_cube.program.set_i32("equirectangularMap", 0);

        let irradiance_convolution = RenderShader::new(
            state,
            "IrradianceConvolution",
            include_str!("shaders/cube_capture.vert"),
            include_str!("shaders/irradiance_convolution.frag"),
            cube_params,
        )?;
        irradiance_convolution.program.set_i32("environmentMap", 0);

        let prefilter = RenderShader::new(
            state,
            "PrefilterEnvironmentMap",
            include_str!("shaders/cube_capture.vert"),
            include_str!("shaders/prefilter.frag"),
            cube_params,
        )?;
        prefilter.program.set_i32("environmentMap", 0);

        let brdf = RenderShader::new(
            state,
            "PrecomputeBrdf",
            include_str!("shaders/fullscreen.vert"),
            include_str!("shaders/brdf.frag"),
            DrawParameters {
                cull_face: None,
                depth_test: None,
                depth_write: false,
                blend: None,
                ..Default::default()
            },
        )?;

        Ok(Self {
            equirect_to_cube,
            irradiance_convolution,
            prefilter,
            brdf,
        })
    }

    /// Derives all four IBL textures from the given equirectangular map.
    pub fn process(
        &self,
        state: &PipelineState,
        equirect: &GpuTexture,
        cube: &Model,
        quad: &Model,
    ) -> Result<SkyboxMaps, FrameworkError> {
        let environment = make_cube_texture(state, ENVIRONMENT_MAP_SIZE, 1)?;
        self.render_cube_faces(
            state,
            &self.equirect_to_cube,
            equirect,
            &environment,
            ENVIRONMENT_MAP_SIZE,
            cube,
        )?;

        let irradiance = make_cube_texture(state, IRRADIANCE_MAP_SIZE, 1)?;
        self.render_cube_faces(
            state,
            &self.irradiance_convolution,
            &environment,
            &irradiance,
            IRRADIANCE_MAP_SIZE,
            cube,
        )?;

        let prefiltered = self.prefilter_environment(state, &environment, cube)?;
        let brdf_lut = self.compute_brdf_lut(state, quad)?;

        Ok(SkyboxMaps {
            environment,
            irradiance,
            prefiltered,
            brdf_lut,
        })
    }

    /// Renders a unit cube six times, once per face, sampling `source`.
    fn render_cube_faces(
        &self,
        state: &PipelineState,
        shader: &RenderShader,
        source: &GpuTexture,
        target: &Rc<GpuTexture>,
        size: usize,
        cube: &Model,
    ) -> Result<(), FrameworkError> {
        let framebuffer =
            FrameBuffer::new(state, None, vec![Attachment::color(target.clone())])?;

        let viewport = Rect::new(0, 0, size as i32, size as i32);
        let projection = capture_projection();

        shader.bind(state);
        shader.program.set_matrix4("projection", &projection);
        source.bind(state, 0);

        for face in CubeMapFaceDescriptor::cube_faces() {
            framebuffer.set_cubemap_face(0, face.face, 0);
            framebuffer.clear(viewport, Some(Default::default()), None, None);

            shader.program.set_matrix4("view", &capture_view(&face));

            framebuffer.draw(
                cube.geometry(),
                viewport,
                &shader.program,
                shader.draw_parameters(),
                ElementRange::Full,
            )?;
        }

        shader.unbind(state);
        Ok(())
    }

    /// Importance-samples GGX into the mip chain: mip `m` is convolved at
    /// roughness `m / (mip_count - 1)`.
    fn prefilter_environment(
        &self,
        state: &PipelineState,
        environment: &Rc<GpuTexture>,
        cube: &Model,
    ) -> Result<Rc<GpuTexture>, FrameworkError> {
        let prefiltered = make_cube_texture(state, PREFILTER_MAP_SIZE, PREFILTER_MIP_COUNT)?;

        let framebuffer =
            FrameBuffer::new(state, None, vec![Attachment::color(prefiltered.clone())])?;

        let projection = capture_projection();
        self.prefilter.bind(state);
        self.prefilter.program.set_matrix4("projection", &projection);
        environment.bind(state, 0);

        for mip in 0..PREFILTER_MIP_COUNT {
            let mip_size = (PREFILTER_MAP_SIZE >> mip).max(1);
            let viewport = Rect::new(0, 0, mip_size as i32, mip_size as i32);
            let roughness = mip as f32 / (PREFILTER_MIP_COUNT - 1) as f32;
            self.prefilter.program.set_f32("roughness", roughness);

            for face in CubeMapFaceDescriptor::cube_faces() {
                framebuffer.set_cubemap_face(0, face.face, mip as u32);
                framebuffer.clear(viewport, Some(Default::default()), None, None);

                self.prefilter.program.set_matrix4("view", &capture_view(&face));

                framebuffer.draw(
                    cube.geometry(),
                    viewport,
                    &self.prefilter.program,
                    self.prefilter.draw_parameters(),
                    ElementRange::Full,
                )?;
            }
        }

        self.prefilter.unbind(state);
        Ok(prefiltered)
    }

    /// Precomputes the split-sum geometry/Fresnel integral into an RG16F
    /// quad: x = NdotV, y = roughness.
    fn compute_brdf_lut(
        &self,
        state: &PipelineState,
        quad: &Model,
    ) -> Result<Rc<GpuTexture>, FrameworkError> {
        let brdf_lut = Rc::new(GpuTexture::new(
            state,
            GpuTextureDescriptor {
                kind: GpuTextureKind::Rectangle {
                    width: BRDF_LUT_SIZE,
                    height: BRDF_LUT_SIZE,
                },
                pixel_kind: PixelKind::RG16F,
                min_filter: MinificationFilter::Linear,
                mag_filter: MagnificationFilter::Linear,
                s_wrap_mode: WrapMode::ClampToEdge,
                t_wrap_mode: WrapMode::ClampToEdge,
                r_wrap_mode: WrapMode::ClampToEdge,
                mip_count: 1,
                data: None,
            },
        )?);

        let framebuffer =
            FrameBuffer::new(state, None, vec![Attachment::color(brdf_lut.clone())])?;

        let viewport = Rect::new(0, 0, BRDF_LUT_SIZE as i32, BRDF_LUT_SIZE as i32);
        framebuffer.clear(viewport, Some(Default::default()), None, None);

        framebuffer.draw(
            quad.geometry(),
            viewport,
            &self.brdf.program,
            self.brdf.draw_parameters(),
            ElementRange::Full,
        )?;

        Ok(brdf_lut)
    }
}

/// Draws the environment cube map as the scene background with a
/// less-or-equal depth function, so it fills exactly the untouched pixels.
pub struct SkyboxRenderer {
    shader: RenderShader,
}

impl SkyboxRenderer {
    pub fn new(state: &PipelineState) -> Result<Self, FrameworkError> {
        let shader = RenderShader::new(
            state,
            "Skybox",
            include_str!("shaders/skybox.vert"),
            include_str!("shaders/skybox.frag"),
            DrawParameters {
                cull_face: None,
                depth_test: Some(CompareFunc::LessOrEqual),
                depth_write: false,
                blend: None,
                ..Default::default()
            },
        )?;
        shader.program.set_i32("cubemapTexture", 0);

        Ok(Self { shader })
    }

    pub fn render(
        &self,
        state: &PipelineState,
        framebuffer: &FrameBuffer,
        viewport: Rect<i32>,
        environment: &GpuTexture,
        cube: &Model,
    ) -> Result<(), FrameworkError> {
        environment.bind(state, 0);
        framebuffer.draw(
            cube.geometry(),
            viewport,
            &self.shader.program,
            self.shader.draw_parameters(),
            ElementRange::Full,
        )?;
        self.shader.unbind(state);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::capture_view;
    use crate::renderer::shadow::CubeMapFaceDescriptor;
    use nalgebra::{Point3, Vector3};

    #[test]
    fn capture_views_look_along_their_faces() {
        for face in CubeMapFaceDescriptor::cube_faces() {
            let view = capture_view(&face);
            // The face direction lands on the negative Z axis of eye space.
            let eye = view.transform_point(&Point3::from(face.look));
            assert!((eye.coords - Vector3::new(0.0, 0.0, -1.0)).norm() < 1e-5);
        }
    }
}
