//! The viewport render loop. Per viewport per frame: scene graph update and
//! snapshots, shadow maps, deferred geometry, deferred lighting, forward
//! overlay (translucents, skybox, gizmos) and post-processing into the
//! viewport's output texture.

pub mod bloom;
pub mod brdf;
pub mod gbuffer;
pub mod light_manager;
pub mod meshes_drawer;
pub mod shadow;
pub mod skybox;
pub mod tonemap;
pub mod ubo;
pub mod viewport;

use crate::{
    renderer::{
        bloom::BloomPass,
        light_manager::LightManager,
        meshes_drawer::{MeshDrawContext, MeshesDrawer},
        shadow::ShadowRenderContext,
        skybox::{SkyboxMaps, SkyboxParser, SkyboxRenderer},
        tonemap::ToneMapping,
        ubo::{CameraUniformData, UniformBlocks},
        viewport::Viewport,
    },
    resource::{model::Model, shader::RenderShader},
    scene::{camera::Camera, material::MaterialType, Scene},
    settings::{texture_binding, QualitySettings},
};
use ember_graphics::{
    core::{color::Color, log::Log},
    error::FrameworkError,
    state::{PipelineState, SharedPipelineState},
    stats::RenderPassStatistics,
    BlendFactor, BlendFunc, BlendParameters, CompareFunc, DrawParameters, ElementRange,
};
use ember_math::Rect;
use nalgebra::Vector2;

/// The set of built-in shader programs of the pipeline.
struct RendererShaders {
    gbuffer: RenderShader,
    gbuffer_skinned: RenderShader,
    deferred_lighting: RenderShader,
    forward: RenderShader,
    gizmo: RenderShader,
    depth_static: RenderShader,
    depth_skinned: RenderShader,
    depth_point_static: RenderShader,
    depth_point_skinned: RenderShader,
}

impl RendererShaders {
    fn new(state: &PipelineState) -> Result<Self, FrameworkError> {
        let geometry_params = DrawParameters::default();

        let gbuffer = RenderShader::new(
            state,
            "GBuffer",
            include_str!("shaders/gbuffer.vert"),
            include_str!("shaders/gbuffer.frag"),
            geometry_params,
        )?;
        let gbuffer_skinned = RenderShader::new(
            state,
            "GBufferSkinned",
            include_str!("shaders/gbuffer_skinned.vert"),
            include_str!("shaders/gbuffer.frag"),
            geometry_params,
        )?;

        let deferred_lighting = RenderShader::new(
            state,
            "DeferredLighting",
            include_str!("shaders/fullscreen.vert"),
            include_str!("shaders/deferred_lighting.frag"),
            DrawParameters {
                cull_face: None,
                depth_test: None,
                depth_write: false,
                blend: None,
                ..Default::default()
            },
        )?;

        let forward = RenderShader::new(
            state,
            "Forward",
            include_str!("shaders/gbuffer.vert"),
            include_str!("shaders/forward.frag"),
            DrawParameters {
                depth_test: Some(CompareFunc::Less),
                depth_write: true,
                blend: Some(BlendParameters {
                    func: BlendFunc::new(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )?;

        let gizmo = RenderShader::new(
            state,
            "Gizmo",
            include_str!("shaders/gizmo.vert"),
            include_str!("shaders/gizmo.frag"),
            DrawParameters {
                cull_face: None,
                depth_test: Some(CompareFunc::Less),
                depth_write: false,
                blend: None,
                ..Default::default()
            },
        )?;

        let depth_params = DrawParameters {
            depth_test: Some(CompareFunc::Less),
            depth_write: true,
            blend: None,
            ..Default::default()
        };
        let depth_static = RenderShader::new(
            state,
            "Depth",
            include_str!("shaders/depth.vert"),
            include_str!("shaders/depth.frag"),
            depth_params,
        )?;
        let depth_skinned = RenderShader::new(
            state,
            "DepthSkinned",
            include_str!("shaders/depth_skinned.vert"),
            include_str!("shaders/depth.frag"),
            depth_params,
        )?;
        let depth_point_static = RenderShader::new(
            state,
            "DepthPoint",
            include_str!("shaders/depth.vert"),
            include_str!("shaders/depth_point.frag"),
            depth_params,
        )?;
        let depth_point_skinned = RenderShader::new(
            state,
            "DepthPointSkinned",
            include_str!("shaders/depth_skinned.vert"),
            include_str!("shaders/depth_point.frag"),
            depth_params,
        )?;

        for shader in [&gbuffer, &gbuffer_skinned, &forward] {
            bind_material_samplers(shader);
        }

        Ok(Self {
            gbuffer,
            gbuffer_skinned,
            deferred_lighting,
            forward,
            gizmo,
            depth_static,
            depth_skinned,
            depth_point_static,
            depth_point_skinned,
        })
    }
}

/// Routes the material sampler uniforms of a geometry shader to the fixed
/// material texture units (0..5).
fn bind_material_samplers(shader: &RenderShader) {
    let program = &shader.program;
    program.set_i32("albedoMap", texture_binding::MATERIAL_ALBEDO as i32);
    program.set_i32("metallicMap", texture_binding::MATERIAL_METALLIC as i32);
    program.set_i32("roughnessMap", texture_binding::MATERIAL_ROUGHNESS as i32);
    program.set_i32("normalMap", texture_binding::MATERIAL_NORMAL as i32);
    program.set_i32(
        "ambientOcclusionMap",
        texture_binding::MATERIAL_AMBIENT_OCCLUSION as i32,
    );
    program.set_i32("emissiveMap", texture_binding::MATERIAL_EMISSIVE as i32);
}

/// See module docs.
pub struct Renderer {
    state: SharedPipelineState,
    ubos: UniformBlocks,
    shaders: RendererShaders,
    meshes_drawer: MeshesDrawer,
    light_manager: LightManager,
    skybox_parser: SkyboxParser,
    skybox_renderer: SkyboxRenderer,
    bloom_pass: BloomPass,
    tone_mapping: ToneMapping,
    quad: Model,
    cube: Model,
    skybox_maps: Option<SkyboxMaps>,
    processed_skybox_revision: u64,
    pub clear_color: Color,
    pub settings: QualitySettings,
}

impl Renderer {
    /// Creates the renderer over an initialized pipeline state. Allocates
    /// every shared GPU resource (shaders, shadow atlases, uniform blocks).
    pub fn new(state: SharedPipelineState) -> Result<Self, FrameworkError> {
        let ubos = UniformBlocks::new(&state)?;
        let shaders = RendererShaders::new(&state)?;
        let light_manager = LightManager::new(&state)?;
        let skybox_parser = SkyboxParser::new(&state)?;
        let skybox_renderer = SkyboxRenderer::new(&state)?;
        let bloom_pass = BloomPass::new(&state)?;
        let tone_mapping = ToneMapping::new(&state)?;
        let quad = Model::quad(&state)?;
        let cube = Model::cube(&state)?;

        bind_lighting_samplers(&shaders.deferred_lighting);

        Ok(Self {
            state,
            ubos,
            shaders,
            meshes_drawer: MeshesDrawer::new(),
            light_manager,
            skybox_parser,
            skybox_renderer,
            bloom_pass,
            tone_mapping,
            quad,
            cube,
            skybox_maps: None,
            processed_skybox_revision: 0,
            clear_color: Color::from_rgba(30, 30, 30, 255),
            settings: QualitySettings::default(),
        })
    }

    pub fn pipeline_state(&self) -> &SharedPipelineState {
        &self.state
    }

    pub fn light_manager(&self) -> &LightManager {
        &self.light_manager
    }

    pub fn meshes_drawer(&self) -> &MeshesDrawer {
        &self.meshes_drawer
    }

    /// The derived IBL maps of the current skybox, if it has been processed.
    pub fn skybox_maps(&self) -> Option<&SkyboxMaps> {
        self.skybox_maps.as_ref()
    }

    fn bind_camera(&self, camera: &Camera, viewport_size: Vector2<f32>) {
        let view = camera.view_matrix();
        let projection = camera.projection_matrix(viewport_size);
        self.ubos.update_camera(
            &self.state,
            &CameraUniformData::new(view, projection, camera.position, camera.near, camera.far),
        );
    }

    fn process_skybox(&mut self, scene: &Scene) {
        if scene.skybox.revision() == self.processed_skybox_revision {
            return;
        }
        self.processed_skybox_revision = scene.skybox.revision();
        self.skybox_maps = None;

        let Some(equirect) = scene.skybox.equirect() else {
            return;
        };
        let Some(gpu) = equirect.borrow().gpu_texture().cloned() else {
            Log::warning("Skybox source is not uploaded; IBL maps were not generated.");
            return;
        };

        match self
            .skybox_parser
            .process(&self.state, &gpu, &self.cube, &self.quad)
        {
            Ok(maps) => self.skybox_maps = Some(maps),
            Err(e) => Log::err(format!("Failed to process the skybox: {e}")),
        }
    }

    /// Renders one frame of the scene into the viewport's output texture.
    pub fn render_viewport(
        &mut self,
        scene: &mut Scene,
        viewport: &mut Viewport,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let mut stats = RenderPassStatistics::default();

        let size = viewport.size();
        if size.x <= 0 || size.y <= 0 {
            return Ok(stats);
        }
        let size_f = Vector2::new(size.x as f32, size.y as f32);
        let rect = Rect::new(0, 0, size.x, size.y);

        // Begin frame: world matrices, snapshots, octree, skybox, shadows.
        scene.update_world_matrices();
        self.meshes_drawer.begin_frame(scene);
        self.process_skybox(scene);

        viewport.ensure_data(&self.state)?;

        let shadow_ctx = ShadowRenderContext {
            state: &self.state,
            scene,
            drawer: &self.meshes_drawer,
            ubos: &self.ubos,
            depth_static: &self.shaders.depth_static,
            depth_skinned: &self.shaders.depth_skinned,
            depth_point_static: &self.shaders.depth_point_static,
            depth_point_skinned: &self.shaders.depth_point_skinned,
            viewport_camera: &viewport.camera,
            viewport_size: size_f,
        };
        stats += self.light_manager.begin_frame(&shadow_ctx)?;

        // The shadow passes re-bound the camera block; restore the viewport
        // camera before the geometry pass.
        self.bind_camera(&viewport.camera, size_f);
        let frustum = viewport.camera.frustum(viewport.aspect());
        let camera_is_orthographic = viewport.camera.is_orthographic;

        let data = viewport.data.as_ref().unwrap();

        // Deferred geometry pass.
        data.gbuffer.framebuffer().clear(
            rect,
            Some(Color::TRANSPARENT),
            Some(1.0),
            Some(0),
        );

        stats += self.meshes_drawer.render_static(MeshDrawContext {
            state: &self.state,
            scene,
            ubos: &self.ubos,
            framebuffer: data.gbuffer.framebuffer(),
            viewport: rect,
            program: &self.shaders.gbuffer.program,
            draw_params: *self.shaders.gbuffer.draw_parameters(),
            frustum: &frustum,
            camera_is_orthographic,
            material_filter: Some(MaterialType::Opaque),
            bind_material: true,
            element_range: ElementRange::Full,
        })?;

        stats += self.meshes_drawer.render_skinned(MeshDrawContext {
            state: &self.state,
            scene,
            ubos: &self.ubos,
            framebuffer: data.gbuffer.framebuffer(),
            viewport: rect,
            program: &self.shaders.gbuffer_skinned.program,
            draw_params: *self.shaders.gbuffer_skinned.draw_parameters(),
            frustum: &frustum,
            camera_is_orthographic,
            material_filter: None,
            bind_material: true,
            element_range: ElementRange::Full,
        })?;

        // Copy the geometry depth into the forward target, then run the
        // lighting pass: a full-screen quad over the G-buffer.
        data.gbuffer.framebuffer().blit_to(
            &data.forward_framebuffer,
            0,
            0,
            size.x,
            size.y,
            0,
            0,
            size.x,
            size.y,
            false,
            true,
            true,
        );
        data.forward_framebuffer
            .clear(rect, Some(self.clear_color), None, None);

        data.gbuffer.bind_textures(&self.state);
        self.light_manager.bind_shadow_maps(&self.state);
        let use_ibl = if let Some(maps) = self.skybox_maps.as_ref() {
            maps.bind(&self.state);
            true
        } else {
            false
        };
        self.shaders.deferred_lighting.program.set_bool("useIbl", use_ibl);

        stats += data.forward_framebuffer.draw(
            self.quad.geometry(),
            rect,
            &self.shaders.deferred_lighting.program,
            self.shaders.deferred_lighting.draw_parameters(),
            ElementRange::Full,
        )?;
        self.shaders.deferred_lighting.unbind(&self.state);

        // Forward overlay: translucent/unlit materials, then the skybox,
        // then editor gizmos. Depth comes from the geometry pass.
        stats += self.meshes_drawer.render_static(MeshDrawContext {
            state: &self.state,
            scene,
            ubos: &self.ubos,
            framebuffer: &data.forward_framebuffer,
            viewport: rect,
            program: &self.shaders.forward.program,
            draw_params: *self.shaders.forward.draw_parameters(),
            frustum: &frustum,
            camera_is_orthographic,
            material_filter: Some(MaterialType::Lit),
            bind_material: true,
            element_range: ElementRange::Full,
        })?;
        self.shaders.forward.unbind(&self.state);

        if let Some(maps) = self.skybox_maps.as_ref() {
            self.skybox_renderer.render(
                &self.state,
                &data.forward_framebuffer,
                rect,
                &maps.environment,
                &self.cube,
            )?;
        }

        if viewport.is_editor && self.settings.draw_aabb_gizmos {
            self.shaders
                .gizmo
                .program
                .set_vector3("color", &nalgebra::Vector3::new(0.0, 1.0, 0.0));
            stats += self.meshes_drawer.draw_aabb_gizmos(
                MeshDrawContext {
                    state: &self.state,
                    scene,
                    ubos: &self.ubos,
                    framebuffer: &data.forward_framebuffer,
                    viewport: rect,
                    program: &self.shaders.gizmo.program,
                    draw_params: *self.shaders.gizmo.draw_parameters(),
                    frustum: &frustum,
                    camera_is_orthographic,
                    material_filter: None,
                    bind_material: false,
                    element_range: ElementRange::Full,
                },
                &self.cube,
            )?;
        }

        // Post-processing: bloom, then tone mapping into the output.
        if viewport.use_post_process && self.settings.use_post_process {
            self.bloom_pass
                .compute(&self.state, data.hdr_texture(), &data.bloom);
            stats += self.tone_mapping.render(
                &self.state,
                &data.output_framebuffer,
                rect,
                data.hdr_texture(),
                data.bloom.bloomed_texture(),
                &self.quad,
            )?;
        } else {
            data.forward_framebuffer.blit_to(
                &data.output_framebuffer,
                0,
                0,
                size.x,
                size.y,
                0,
                0,
                size.x,
                size.y,
                true,
                false,
                false,
            );
        }

        Ok(stats)
    }
}

/// Routes the G-buffer, IBL and shadow samplers of the lighting shader to
/// their fixed units. Done once; the values never change.
fn bind_lighting_samplers(shader: &RenderShader) {
    let program = &shader.program;
    program.set_i32("gNormal", texture_binding::GBUFFER_NORMAL as i32);
    program.set_i32("gAlbedo", texture_binding::GBUFFER_ALBEDO as i32);
    program.set_i32(
        "gMetallicRoughnessReflectance",
        texture_binding::GBUFFER_METALLIC_ROUGHNESS_REFLECTANCE as i32,
    );
    program.set_i32(
        "gAmbientOcclusion",
        texture_binding::GBUFFER_AMBIENT_OCCLUSION as i32,
    );
    program.set_i32("gEmissive", texture_binding::GBUFFER_EMISSIVE as i32);
    program.set_i32("gDepth", texture_binding::GBUFFER_DEPTH as i32);

    program.set_i32("irradianceMap", texture_binding::SKYBOX_IRRADIANCE as i32);
    program.set_i32("prefilterMap", texture_binding::SKYBOX_PREFILTER as i32);
    program.set_i32("brdfLUT", texture_binding::SKYBOX_BRDF_LUT as i32);

    program.set_i32(
        "dirLightShadowMap",
        texture_binding::SHADOW_DIRECTIONAL as i32,
    );
    program.set_i32("spotLightShadowArray", texture_binding::SHADOW_SPOT as i32);
    program.set_i32(
        "pointLightCubemapArrayDistance",
        texture_binding::SHADOW_POINT as i32,
    );
}
