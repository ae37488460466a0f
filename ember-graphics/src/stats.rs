//! Pipeline statistics: counters of the work the facade actually sent to the
//! driver during a frame. Useful to verify that state caching works and to
//! assert draw-call budgets in benchmarks.

use std::fmt::{Display, Formatter};
use std::ops::AddAssign;

/// GPU pipeline counters, reset once per frame.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct PipelineStatistics {
    /// Amount of texture bindings that actually reached the driver.
    pub texture_binding_changes: usize,
    /// Amount of VAO bindings that actually reached the driver.
    pub vao_binding_changes: usize,
    /// Amount of VBO bindings that actually reached the driver.
    pub vbo_binding_changes: usize,
    /// Amount of program bindings that actually reached the driver.
    pub program_binding_changes: usize,
    /// Amount of framebuffer bindings that actually reached the driver.
    pub framebuffer_binding_changes: usize,
    /// Amount of blend state changes that actually reached the driver.
    pub blend_state_changes: usize,
    /// Amount of uniform values that actually reached the driver.
    pub uniform_value_changes: usize,
    /// Amount of draw calls issued.
    pub draw_calls: usize,
}

impl AddAssign for PipelineStatistics {
    fn add_assign(&mut self, rhs: Self) {
        self.texture_binding_changes += rhs.texture_binding_changes;
        self.vao_binding_changes += rhs.vao_binding_changes;
        self.vbo_binding_changes += rhs.vbo_binding_changes;
        self.program_binding_changes += rhs.program_binding_changes;
        self.framebuffer_binding_changes += rhs.framebuffer_binding_changes;
        self.blend_state_changes += rhs.blend_state_changes;
        self.uniform_value_changes += rhs.uniform_value_changes;
        self.draw_calls += rhs.draw_calls;
    }
}

impl Display for PipelineStatistics {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pipeline state changes:\n\
            \tTextures: {},\n\
            \tVAO: {},\n\
            \tVBO: {},\n\
            \tPrograms: {},\n\
            \tFBO: {},\n\
            \tBlend: {},\n\
            \tUniforms: {},\n\
            \tDraw calls: {}",
            self.texture_binding_changes,
            self.vao_binding_changes,
            self.vbo_binding_changes,
            self.program_binding_changes,
            self.framebuffer_binding_changes,
            self.blend_state_changes,
            self.uniform_value_changes,
            self.draw_calls,
        )
    }
}

/// Statistics of a single draw call.
#[derive(Debug, Copy, Clone, Default)]
pub struct DrawCallStatistics {
    /// Amount of rendered elements (triangles or lines).
    pub triangles: usize,
}

/// Cumulative statistics of a whole render pass.
#[derive(Debug, Copy, Clone, Default)]
pub struct RenderPassStatistics {
    /// Total amount of draw calls in the pass.
    pub draw_calls: usize,
    /// Total amount of rendered elements in the pass.
    pub triangles_rendered: usize,
}

impl AddAssign for RenderPassStatistics {
    fn add_assign(&mut self, rhs: Self) {
        self.draw_calls += rhs.draw_calls;
        self.triangles_rendered += rhs.triangles_rendered;
    }
}

impl AddAssign<DrawCallStatistics> for RenderPassStatistics {
    fn add_assign(&mut self, rhs: DrawCallStatistics) {
        self.draw_calls += 1;
        self.triangles_rendered += rhs.triangles;
    }
}
