//! Tone mapping: the ACES curve (Narkowicz fit) applied over the HDR color
//! target plus the bloom result. The final pass of a frame.

use crate::{
    resource::{model::Model, shader::RenderShader},
    settings::texture_binding,
};
use ember_graphics::{
    error::FrameworkError,
    framebuffer::FrameBuffer,
    gpu_texture::GpuTexture,
    state::PipelineState,
    stats::{DrawCallStatistics, RenderPassStatistics},
    DrawParameters, ElementRange,
};
use ember_math::Rect;

/// See module docs.
pub struct ToneMapping {
    shader: RenderShader,
}

impl ToneMapping {
    pub fn new(state: &PipelineState) -> Result<Self, FrameworkError> {
        let shader = RenderShader::new(
            state,
            "ToneMapping",
            include_str!("shaders/fullscreen.vert"),
            include_str!("shaders/tonemap.frag"),
            DrawParameters {
                cull_face: None,
                depth_test: None,
                depth_write: false,
                blend: None,
                ..Default::default()
            },
        )?;

        shader
            .program
            .set_i32("hdrImage", texture_binding::TONE_MAPPING_HDR as i32);
        shader
            .program
            .set_i32("bloomBlur", texture_binding::TONE_MAPPING_BLOOM as i32);

        Ok(Self { shader })
    }

    pub fn render(
        &self,
        state: &PipelineState,
        output: &FrameBuffer,
        viewport: Rect<i32>,
        hdr_frame: &GpuTexture,
        bloom: &GpuTexture,
        quad: &Model,
    ) -> Result<RenderPassStatistics, FrameworkError> {
        let mut stats = RenderPassStatistics::default();

        hdr_frame.bind(state, texture_binding::TONE_MAPPING_HDR);
        bloom.bind(state, texture_binding::TONE_MAPPING_BLOOM);

        let draw: DrawCallStatistics = output.draw(
            quad.geometry(),
            viewport,
            &self.shader.program,
            self.shader.draw_parameters(),
            ElementRange::Full,
        )?;
        stats += draw;
        self.shader.unbind(state);

        Ok(stats)
    }
}
