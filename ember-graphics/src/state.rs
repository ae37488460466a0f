//! The GL pipeline state facade. Every GL call of the engine goes through
//! this type; it shadows the full fixed-function state and skips calls that
//! would not change anything on the driver side.

use crate::{
    core::{color::Color, log::Log},
    BlendEquation, BlendFactor, BlendFunc, BlendMode, ColorMask, CompareFunc, CullFace, FrontFace,
    PolygonFace, PolygonFillMode,
};
use crate::{stats::PipelineStatistics, DrawParameters};
use ember_math::Rect;
use glow::HasContext;
use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

pub(crate) trait ToGlConstant {
    fn into_gl(self) -> u32;
}

impl ToGlConstant for PolygonFace {
    fn into_gl(self) -> u32 {
        match self {
            Self::Front => glow::FRONT,
            Self::Back => glow::BACK,
            Self::FrontAndBack => glow::FRONT_AND_BACK,
        }
    }
}

impl ToGlConstant for PolygonFillMode {
    fn into_gl(self) -> u32 {
        match self {
            Self::Point => glow::POINT,
            Self::Line => glow::LINE,
            Self::Fill => glow::FILL,
        }
    }
}

impl ToGlConstant for BlendMode {
    fn into_gl(self) -> u32 {
        match self {
            Self::Add => glow::FUNC_ADD,
            Self::Subtract => glow::FUNC_SUBTRACT,
            Self::ReverseSubtract => glow::FUNC_REVERSE_SUBTRACT,
            Self::Min => glow::MIN,
            Self::Max => glow::MAX,
        }
    }
}

impl ToGlConstant for BlendFactor {
    fn into_gl(self) -> u32 {
        match self {
            Self::Zero => glow::ZERO,
            Self::One => glow::ONE,
            Self::SrcColor => glow::SRC_COLOR,
            Self::OneMinusSrcColor => glow::ONE_MINUS_SRC_COLOR,
            Self::DstColor => glow::DST_COLOR,
            Self::OneMinusDstColor => glow::ONE_MINUS_DST_COLOR,
            Self::SrcAlpha => glow::SRC_ALPHA,
            Self::OneMinusSrcAlpha => glow::ONE_MINUS_SRC_ALPHA,
            Self::DstAlpha => glow::DST_ALPHA,
            Self::OneMinusDstAlpha => glow::ONE_MINUS_DST_ALPHA,
            Self::ConstantColor => glow::CONSTANT_COLOR,
            Self::OneMinusConstantColor => glow::ONE_MINUS_CONSTANT_COLOR,
            Self::ConstantAlpha => glow::CONSTANT_ALPHA,
            Self::OneMinusConstantAlpha => glow::ONE_MINUS_CONSTANT_ALPHA,
            Self::SrcAlphaSaturate => glow::SRC_ALPHA_SATURATE,
        }
    }
}

impl ToGlConstant for CompareFunc {
    fn into_gl(self) -> u32 {
        match self {
            Self::Never => glow::NEVER,
            Self::Less => glow::LESS,
            Self::Equal => glow::EQUAL,
            Self::LessOrEqual => glow::LEQUAL,
            Self::Greater => glow::GREATER,
            Self::NotEqual => glow::NOTEQUAL,
            Self::GreaterOrEqual => glow::GEQUAL,
            Self::Always => glow::ALWAYS,
        }
    }
}

impl ToGlConstant for CullFace {
    fn into_gl(self) -> u32 {
        match self {
            Self::Back => glow::BACK,
            Self::Front => glow::FRONT,
        }
    }
}

impl ToGlConstant for FrontFace {
    fn into_gl(self) -> u32 {
        match self {
            Self::CounterClockwise => glow::CCW,
            Self::Clockwise => glow::CW,
        }
    }
}

/// Flavor of the underlying GL context.
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq)]
pub enum GlKind {
    OpenGL,
    OpenGLES,
}

#[derive(Copy, Clone)]
struct TextureBinding {
    target: u32,
    texture: Option<glow::Texture>,
}

#[derive(Copy, Clone)]
struct TextureUnit {
    bindings: [TextureBinding; 6],
}

impl Default for TextureUnit {
    fn default() -> Self {
        Self {
            bindings: [
                TextureBinding {
                    target: glow::TEXTURE_2D,
                    texture: None,
                },
                TextureBinding {
                    target: glow::TEXTURE_3D,
                    texture: None,
                },
                TextureBinding {
                    target: glow::TEXTURE_2D_ARRAY,
                    texture: None,
                },
                TextureBinding {
                    target: glow::TEXTURE_CUBE_MAP,
                    texture: None,
                },
                TextureBinding {
                    target: glow::TEXTURE_CUBE_MAP_ARRAY,
                    texture: None,
                },
                TextureBinding {
                    target: glow::TEXTURE_1D,
                    texture: None,
                },
            ],
        }
    }
}

#[derive(Default)]
struct TextureUnitsStorage {
    active_unit: u32,
    units: [TextureUnit; 32],
}

pub(crate) struct InnerState {
    blend: bool,

    depth_test: bool,
    depth_write: bool,
    depth_func: CompareFunc,

    color_write: ColorMask,
    cull_face: CullFace,
    culling: bool,
    front_face: FrontFace,
    clear_color: Color,
    clear_depth: f32,
    clear_stencil: i32,

    polygon_face: PolygonFace,
    polygon_fill_mode: PolygonFillMode,

    framebuffer: Option<glow::Framebuffer>,
    viewport: Rect<i32>,

    blend_func: BlendFunc,
    blend_equation: BlendEquation,

    program: Option<glow::Program>,
    texture_units_storage: TextureUnitsStorage,

    vao: Option<glow::VertexArray>,
    vbo: Option<glow::Buffer>,

    frame_statistics: PipelineStatistics,
    gl_kind: GlKind,
}

impl InnerState {
    fn new(gl_kind: GlKind) -> Self {
        Self {
            blend: false,
            depth_test: false,
            depth_write: true,
            depth_func: Default::default(),
            color_write: Default::default(),
            cull_face: CullFace::Back,
            culling: false,
            front_face: Default::default(),
            clear_color: Color::from_rgba(0, 0, 0, 0),
            clear_depth: 1.0,
            clear_stencil: 0,
            polygon_face: Default::default(),
            polygon_fill_mode: Default::default(),
            framebuffer: None,
            viewport: Rect::new(0, 0, 1, 1),
            blend_func: Default::default(),
            blend_equation: Default::default(),
            program: Default::default(),
            texture_units_storage: Default::default(),
            vao: Default::default(),
            vbo: Default::default(),
            frame_statistics: Default::default(),
            gl_kind,
        }
    }
}

/// Shared reference to the pipeline state.
pub type SharedPipelineState = Rc<PipelineState>;

/// See module docs.
pub struct PipelineState {
    pub gl: glow::Context,
    pub(crate) state: RefCell<InnerState>,
    this: RefCell<Option<Weak<PipelineState>>>,
}

impl PipelineState {
    /// Wraps an existing GL context. The context must be current on the
    /// calling thread and stay current for the lifetime of the facade;
    /// creating it (glutin, SDL, EGL...) is the host's concern.
    pub fn new(gl: glow::Context, gl_kind: GlKind) -> SharedPipelineState {
        unsafe {
            gl.depth_func(CompareFunc::default().into_gl());
        }

        let state = Self {
            gl,
            state: RefCell::new(InnerState::new(gl_kind)),
            this: Default::default(),
        };

        let shared = SharedPipelineState::new(state);
        *shared.this.borrow_mut() = Some(Rc::downgrade(&shared));

        Log::info("GL pipeline state initialized.");

        shared
    }

    pub fn weak(&self) -> Weak<Self> {
        self.this.borrow().as_ref().unwrap().clone()
    }

    pub fn gl_kind(&self) -> GlKind {
        self.state.borrow().gl_kind
    }

    pub fn set_polygon_fill_mode(
        &self,
        polygon_face: PolygonFace,
        polygon_fill_mode: PolygonFillMode,
    ) {
        let mut state = self.state.borrow_mut();
        if state.polygon_fill_mode != polygon_fill_mode || state.polygon_face != polygon_face {
            state.polygon_fill_mode = polygon_fill_mode;
            state.polygon_face = polygon_face;

            unsafe {
                self.gl.polygon_mode(
                    state.polygon_face.into_gl(),
                    state.polygon_fill_mode.into_gl(),
                )
            }
        }
    }

    pub fn set_framebuffer(&self, framebuffer: Option<glow::Framebuffer>) {
        let mut state = self.state.borrow_mut();
        if state.framebuffer != framebuffer {
            state.framebuffer = framebuffer;

            state.frame_statistics.framebuffer_binding_changes += 1;

            unsafe {
                self.gl
                    .bind_framebuffer(glow::FRAMEBUFFER, state.framebuffer)
            }
        }
    }

    pub fn set_viewport(&self, viewport: Rect<i32>) {
        let mut state = self.state.borrow_mut();
        if state.viewport != viewport {
            state.viewport = viewport;

            unsafe {
                self.gl.viewport(
                    state.viewport.x(),
                    state.viewport.y(),
                    state.viewport.w(),
                    state.viewport.h(),
                );
            }
        }
    }

    pub fn set_blend(&self, blend: bool) {
        let mut state = self.state.borrow_mut();
        if state.blend != blend {
            state.blend = blend;

            state.frame_statistics.blend_state_changes += 1;

            unsafe {
                if state.blend {
                    self.gl.enable(glow::BLEND);
                } else {
                    self.gl.disable(glow::BLEND);
                }
            }
        }
    }

    pub fn set_depth_test(&self, depth_test: bool) {
        let mut state = self.state.borrow_mut();
        if state.depth_test != depth_test {
            state.depth_test = depth_test;

            unsafe {
                if state.depth_test {
                    self.gl.enable(glow::DEPTH_TEST);
                } else {
                    self.gl.disable(glow::DEPTH_TEST);
                }
            }
        }
    }

    pub fn set_depth_write(&self, depth_write: bool) {
        let mut state = self.state.borrow_mut();
        if state.depth_write != depth_write {
            state.depth_write = depth_write;

            unsafe {
                self.gl.depth_mask(state.depth_write);
            }
        }
    }

    pub fn set_depth_func(&self, depth_func: CompareFunc) {
        let mut state = self.state.borrow_mut();
        if state.depth_func != depth_func {
            state.depth_func = depth_func;

            unsafe {
                self.gl.depth_func(depth_func.into_gl());
            }
        }
    }

    pub fn set_color_write(&self, color_write: ColorMask) {
        let mut state = self.state.borrow_mut();
        if state.color_write != color_write {
            state.color_write = color_write;

            unsafe {
                self.gl.color_mask(
                    state.color_write.red,
                    state.color_write.green,
                    state.color_write.blue,
                    state.color_write.alpha,
                );
            }
        }
    }

    pub fn set_cull_face(&self, cull_face: CullFace) {
        let mut state = self.state.borrow_mut();
        if state.cull_face != cull_face {
            state.cull_face = cull_face;

            unsafe { self.gl.cull_face(state.cull_face.into_gl()) }
        }
    }

    pub fn set_culling(&self, culling: bool) {
        let mut state = self.state.borrow_mut();
        if state.culling != culling {
            state.culling = culling;

            unsafe {
                if state.culling {
                    self.gl.enable(glow::CULL_FACE);
                } else {
                    self.gl.disable(glow::CULL_FACE);
                }
            }
        }
    }

    pub fn set_front_face(&self, front_face: FrontFace) {
        let mut state = self.state.borrow_mut();
        if state.front_face != front_face {
            state.front_face = front_face;

            unsafe { self.gl.front_face(front_face.into_gl()) }
        }
    }

    pub fn set_clear_color(&self, color: Color) {
        let mut state = self.state.borrow_mut();
        if state.clear_color != color {
            state.clear_color = color;

            let rgba = color.as_frgba();
            unsafe {
                self.gl.clear_color(rgba.x, rgba.y, rgba.z, rgba.w);
            }
        }
    }

    pub fn set_clear_depth(&self, depth: f32) {
        let mut state = self.state.borrow_mut();
        if (state.clear_depth - depth).abs() > f32::EPSILON {
            state.clear_depth = depth;

            unsafe {
                self.gl.clear_depth_f32(depth);
            }
        }
    }

    pub fn set_clear_stencil(&self, stencil: i32) {
        let mut state = self.state.borrow_mut();
        if state.clear_stencil != stencil {
            state.clear_stencil = stencil;

            unsafe {
                self.gl.clear_stencil(stencil);
            }
        }
    }

    pub fn set_blend_func(&self, func: BlendFunc) {
        let mut state = self.state.borrow_mut();
        if state.blend_func != func {
            state.blend_func = func;

            unsafe {
                self.gl.blend_func_separate(
                    state.blend_func.sfactor.into_gl(),
                    state.blend_func.dfactor.into_gl(),
                    state.blend_func.alpha_sfactor.into_gl(),
                    state.blend_func.alpha_dfactor.into_gl(),
                );
            }
        }
    }

    pub fn set_blend_equation(&self, equation: BlendEquation) {
        let mut state = self.state.borrow_mut();
        if state.blend_equation != equation {
            state.blend_equation = equation;

            unsafe {
                self.gl.blend_equation_separate(
                    state.blend_equation.rgb.into_gl(),
                    state.blend_equation.alpha.into_gl(),
                );
            }
        }
    }

    pub fn set_program(&self, program: Option<glow::Program>) {
        let mut state = self.state.borrow_mut();
        if state.program != program {
            state.program = program;

            state.frame_statistics.program_binding_changes += 1;

            unsafe {
                self.gl.use_program(state.program);
            }
        }
    }

    pub fn set_texture(&self, unit_index: u32, target: u32, texture: Option<glow::Texture>) {
        unsafe fn bind_texture(
            gl: &glow::Context,
            target: u32,
            texture: Option<glow::Texture>,
            unit_index: u32,
            active_unit: &mut u32,
        ) {
            if *active_unit != unit_index {
                *active_unit = unit_index;
                gl.active_texture(glow::TEXTURE0 + unit_index);
            }
            gl.bind_texture(target, texture);
        }

        unsafe {
            let mut state_guard = self.state.borrow_mut();
            let state = &mut *state_guard;

            let unit = &mut state.texture_units_storage.units[unit_index as usize];
            let active_unit = &mut state.texture_units_storage.active_unit;
            for binding in unit.bindings.iter_mut() {
                if binding.target == target {
                    if binding.texture != texture {
                        binding.texture = texture;
                        bind_texture(&self.gl, binding.target, texture, unit_index, active_unit);
                        state.frame_statistics.texture_binding_changes += 1;
                    }
                } else if binding.texture.is_some() {
                    binding.texture = None;
                    bind_texture(&self.gl, binding.target, None, unit_index, active_unit);
                    state.frame_statistics.texture_binding_changes += 1;
                }
            }
        }
    }

    pub fn set_vertex_array_object(&self, vao: Option<glow::VertexArray>) {
        let mut state = self.state.borrow_mut();
        if state.vao != vao {
            state.vao = vao;

            state.frame_statistics.vao_binding_changes += 1;

            unsafe {
                self.gl.bind_vertex_array(state.vao);
            }
        }
    }

    pub fn set_vertex_buffer_object(&self, vbo: Option<glow::Buffer>) {
        let mut state = self.state.borrow_mut();
        if state.vbo != vbo {
            state.vbo = vbo;

            state.frame_statistics.vbo_binding_changes += 1;

            unsafe {
                self.gl.bind_buffer(glow::ARRAY_BUFFER, state.vbo);
            }
        }
    }

    /// Applies a full set of drawing parameters. Absent blend/cull options
    /// disable the corresponding hardware state, so a pass never inherits
    /// stale state.
    pub fn apply_draw_parameters(&self, draw_params: &DrawParameters) {
        if let Some(ref blend_params) = draw_params.blend {
            self.set_blend_func(blend_params.func);
            self.set_blend_equation(blend_params.equation);
            self.set_blend(true);
        } else {
            self.set_blend(false);
        }

        if let Some(depth_func) = draw_params.depth_test {
            self.set_depth_func(depth_func);
            self.set_depth_test(true);
        } else {
            self.set_depth_test(false);
        }
        self.set_depth_write(draw_params.depth_write);
        self.set_color_write(draw_params.color_write);

        if let Some(cull_face) = draw_params.cull_face {
            self.set_cull_face(cull_face);
            self.set_culling(true);
        } else {
            self.set_culling(false);
        }
        self.set_front_face(draw_params.front_face);
    }

    /// Issues a memory barrier covering every access kind. Required between
    /// compute dispatches that read each other's image stores.
    pub fn memory_barrier(&self) {
        unsafe {
            self.gl.memory_barrier(glow::ALL_BARRIER_BITS);
        }
    }

    pub fn blit_framebuffer(
        &self,
        source: Option<glow::Framebuffer>,
        dest: Option<glow::Framebuffer>,
        src_x0: i32,
        src_y0: i32,
        src_x1: i32,
        src_y1: i32,
        dst_x0: i32,
        dst_y0: i32,
        dst_x1: i32,
        dst_y1: i32,
        copy_color: bool,
        copy_depth: bool,
        copy_stencil: bool,
    ) {
        let mut mask = 0;
        if copy_color {
            mask |= glow::COLOR_BUFFER_BIT;
        }
        if copy_depth {
            mask |= glow::DEPTH_BUFFER_BIT;
        }
        if copy_stencil {
            mask |= glow::STENCIL_BUFFER_BIT;
        }

        unsafe {
            self.gl.bind_framebuffer(glow::READ_FRAMEBUFFER, source);
            self.gl.bind_framebuffer(glow::DRAW_FRAMEBUFFER, dest);
            self.gl.blit_framebuffer(
                src_x0,
                src_y0,
                src_x1,
                src_y1,
                dst_x0,
                dst_y0,
                dst_x1,
                dst_y1,
                mask,
                glow::NEAREST,
            );
        }

        // The scratch bindings above bypass the cache.
        self.invalidate_framebuffer_binding();
    }

    fn invalidate_framebuffer_binding(&self) {
        let mut state = self.state.borrow_mut();
        state.framebuffer = None;
        unsafe {
            self.gl.bind_framebuffer(glow::FRAMEBUFFER, None);
        }
    }

    pub fn flush(&self) {
        unsafe {
            self.gl.flush();
        }
    }

    pub fn finish(&self) {
        unsafe {
            self.gl.finish();
        }
    }

    /// Forgets every cached binding. Must be called when an external party
    /// (UI library, capture tool) touched the context behind our back.
    pub fn invalidate_resource_bindings_cache(&self) {
        let mut state = self.state.borrow_mut();
        state.texture_units_storage = Default::default();
        state.program = Default::default();
        state.frame_statistics = Default::default();
    }

    pub(crate) fn on_draw_call(&self) {
        self.state.borrow_mut().frame_statistics.draw_calls += 1;
    }

    pub(crate) fn on_uniform_change(&self) {
        self.state.borrow_mut().frame_statistics.uniform_value_changes += 1;
    }

    /// Returns the statistics gathered since the last call and resets them.
    pub fn pipeline_statistics(&self) -> PipelineStatistics {
        let mut state = self.state.borrow_mut();
        std::mem::take(&mut state.frame_statistics)
    }
}
