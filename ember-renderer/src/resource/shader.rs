//! A shader resource pairs a GPU program with the pipeline state it was
//! authored with. Authoring a material is a state decision, not a call-site
//! decision: binding the shader applies its recorded state, so a forgotten
//! `glEnable` can never leak between passes.

use ember_graphics::{
    error::FrameworkError, gpu_program::GpuProgram, state::PipelineState, DrawParameters,
};

/// See module docs.
pub struct RenderShader {
    pub program: GpuProgram,
    draw_parameters: DrawParameters,
}

impl RenderShader {
    pub fn new(
        state: &PipelineState,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
        draw_parameters: DrawParameters,
    ) -> Result<Self, FrameworkError> {
        Ok(Self {
            program: GpuProgram::from_source(state, name, vertex_source, fragment_source)?,
            draw_parameters,
        })
    }

    /// The pipeline state recorded at creation; draw calls pass it through.
    pub fn draw_parameters(&self) -> &DrawParameters {
        &self.draw_parameters
    }

    /// Makes the program current and applies the recorded pipeline state.
    pub fn bind(&self, state: &PipelineState) {
        state.apply_draw_parameters(&self.draw_parameters);
        state.set_program(Some(self.program.id()));
    }

    /// Resets blending and face culling; the depth state stays as the shader
    /// dictated.
    pub fn unbind(&self, state: &PipelineState) {
        state.set_blend(false);
        state.set_culling(false);
    }
}
