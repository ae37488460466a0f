//! G-buffer layout:
//!
//! RT0: RGB16F  - world-space normal (xyz)
//! RT1: RGB16F  - albedo (xyz)
//! RT2: RGB16F  - metallic (x) + roughness (y) + reflectance (z)
//! RT3: RG16F   - ambient occlusion (x)
//! RT4: RGBA16F - emissive
//! D:   D32FS8  - depth, shared with the forward pass

use crate::settings::texture_binding;
use ember_graphics::{
    error::FrameworkError,
    framebuffer::{Attachment, FrameBuffer},
    gpu_texture::{
        GpuTexture, GpuTextureDescriptor, GpuTextureKind, MagnificationFilter,
        MinificationFilter, PixelKind, WrapMode,
    },
    state::PipelineState,
};
use std::rc::Rc;

fn make_render_target(
    state: &PipelineState,
    width: usize,
    height: usize,
    pixel_kind: PixelKind,
) -> Result<Rc<GpuTexture>, FrameworkError> {
    Ok(Rc::new(GpuTexture::new(
        state,
        GpuTextureDescriptor {
            kind: GpuTextureKind::Rectangle { width, height },
            pixel_kind,
            min_filter: MinificationFilter::Nearest,
            mag_filter: MagnificationFilter::Nearest,
            s_wrap_mode: WrapMode::ClampToEdge,
            t_wrap_mode: WrapMode::ClampToEdge,
            r_wrap_mode: WrapMode::ClampToEdge,
            mip_count: 1,
            data: None,
        },
    )?))
}

/// See module docs.
pub struct GBuffer {
    framebuffer: FrameBuffer,
    pub width: i32,
    pub height: i32,
}

impl GBuffer {
    pub fn new(state: &PipelineState, width: usize, height: usize) -> Result<Self, FrameworkError> {
        let normal = make_render_target(state, width, height, PixelKind::RGB16F)?;
        let albedo = make_render_target(state, width, height, PixelKind::RGB16F)?;
        let metallic_roughness_reflectance =
            make_render_target(state, width, height, PixelKind::RGB16F)?;
        let ambient_occlusion = make_render_target(state, width, height, PixelKind::RG16F)?;
        let emissive = make_render_target(state, width, height, PixelKind::RGBA16F)?;
        let depth = make_render_target(state, width, height, PixelKind::D32FS8)?;

        let framebuffer = FrameBuffer::new(
            state,
            Some(Attachment::depth_stencil(depth)),
            vec![
                Attachment::color(normal),
                Attachment::color(albedo),
                Attachment::color(metallic_roughness_reflectance),
                Attachment::color(ambient_occlusion),
                Attachment::color(emissive),
            ],
        )?;

        Ok(Self {
            framebuffer,
            width: width as i32,
            height: height as i32,
        })
    }

    pub fn framebuffer(&self) -> &FrameBuffer {
        &self.framebuffer
    }

    pub fn normal_texture(&self) -> &Rc<GpuTexture> {
        &self.framebuffer.color_attachments()[0].texture
    }

    pub fn albedo_texture(&self) -> &Rc<GpuTexture> {
        &self.framebuffer.color_attachments()[1].texture
    }

    pub fn metallic_roughness_reflectance_texture(&self) -> &Rc<GpuTexture> {
        &self.framebuffer.color_attachments()[2].texture
    }

    pub fn ambient_occlusion_texture(&self) -> &Rc<GpuTexture> {
        &self.framebuffer.color_attachments()[3].texture
    }

    pub fn emissive_texture(&self) -> &Rc<GpuTexture> {
        &self.framebuffer.color_attachments()[4].texture
    }

    pub fn depth_texture(&self) -> &Rc<GpuTexture> {
        &self.framebuffer.depth_attachment().unwrap().texture
    }

    /// Binds the six G-buffer channels at their fixed units (5..10) for the
    /// deferred lighting shader.
    pub fn bind_textures(&self, state: &PipelineState) {
        self.normal_texture()
            .bind(state, texture_binding::GBUFFER_NORMAL);
        self.albedo_texture()
            .bind(state, texture_binding::GBUFFER_ALBEDO);
        self.metallic_roughness_reflectance_texture()
            .bind(state, texture_binding::GBUFFER_METALLIC_ROUGHNESS_REFLECTANCE);
        self.ambient_occlusion_texture()
            .bind(state, texture_binding::GBUFFER_AMBIENT_OCCLUSION);
        self.emissive_texture()
            .bind(state, texture_binding::GBUFFER_EMISSIVE);
        self.depth_texture()
            .bind(state, texture_binding::GBUFFER_DEPTH);
    }
}
