//! Shader program wrappers. A program memoizes both uniform locations and
//! the last value written to every uniform, so redundant `glUniform*` calls
//! never reach the driver. Unknown uniform names warn once and then become
//! no-ops, because shipping shaders may elide uniforms the CPU still sets.

use crate::{
    core::log::{Log, MessageKind},
    error::FrameworkError,
    gpu_texture::GpuTexture,
    state::{GlKind, PipelineState, SharedPipelineState},
};
use fxhash::FxHashMap;
use glow::HasContext;
use nalgebra::{Matrix3, Matrix4, Vector2, Vector3, Vector4};
use std::{cell::RefCell, marker::PhantomData, rc::Weak};

/// Location of a uniform in a particular program.
#[derive(Clone, Debug)]
pub struct UniformLocation {
    pub(crate) id: glow::UniformLocation,
    // Force compiler to not implement Send and Sync, because OpenGL is not thread-safe.
    thread_mark: PhantomData<*const u8>,
}

/// A uniform value, used for redundant-write elimination.
#[derive(Clone, PartialEq, Debug)]
pub enum UniformValue {
    Bool(bool),
    Int(i32),
    UInt(u32),
    Float(f32),
    Vector2(Vector2<f32>),
    Vector3(Vector3<f32>),
    Vector4(Vector4<f32>),
    Matrix3(Matrix3<f32>),
    Matrix4(Matrix4<f32>),
}

/// Access mode of an image binding in a compute shader.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ImageAccess {
    Read,
    Write,
    ReadWrite,
}

impl ImageAccess {
    fn into_gl(self) -> u32 {
        match self {
            Self::Read => glow::READ_ONLY,
            Self::Write => glow::WRITE_ONLY,
            Self::ReadWrite => glow::READ_WRITE,
        }
    }
}

fn prepare_source_code(code: &str, gl_kind: GlKind) -> String {
    let mut full_source_code = "#version 450 core\n".to_owned();

    if gl_kind == GlKind::OpenGLES {
        full_source_code += r#"
            precision highp float;
            precision highp int;
            precision highp sampler2D;
            precision highp sampler2DArray;
            precision highp samplerCube;
            precision highp samplerCubeArray;
        "#;
    }

    full_source_code += code;
    full_source_code
}

unsafe fn create_shader(
    state: &PipelineState,
    name: String,
    actual_type: u32,
    source: &str,
) -> Result<glow::Shader, FrameworkError> {
    let merged_source = prepare_source_code(source, state.gl_kind());

    let shader = state
        .gl
        .create_shader(actual_type)
        .map_err(FrameworkError::Internal)?;
    state.gl.shader_source(shader, &merged_source);
    state.gl.compile_shader(shader);

    let status = state.gl.get_shader_compile_status(shader);
    let compilation_message = state.gl.get_shader_info_log(shader);

    if !status {
        Log::writeln(
            MessageKind::Error,
            format!("Failed to compile {name} shader: {compilation_message}"),
        );
        state.gl.delete_shader(shader);
        Err(FrameworkError::ShaderCompilationFailed {
            shader_name: name,
            error_message: compilation_message,
        })
    } else {
        if !compilation_message.is_empty()
            && !compilation_message.chars().all(|c| c.is_whitespace())
        {
            Log::writeln(
                MessageKind::Warning,
                format!("Shader {name} compiled with warnings:\n{compilation_message}"),
            );
        }

        Ok(shader)
    }
}

unsafe fn link_program(
    state: &PipelineState,
    name: &str,
    program: glow::Program,
) -> Result<(), FrameworkError> {
    state.gl.link_program(program);
    let status = state.gl.get_program_link_status(program);
    let link_message = state.gl.get_program_info_log(program);

    if !status {
        Log::writeln(
            MessageKind::Error,
            format!("Failed to link {name} shader: {link_message}"),
        );
        state.gl.delete_program(program);
        Err(FrameworkError::ShaderLinkingFailed {
            shader_name: name.to_owned(),
            error_message: link_message,
        })
    } else {
        Ok(())
    }
}

/// A linked graphics (or compute) shader program. See module docs.
pub struct GpuProgram {
    state: Weak<PipelineState>,
    id: glow::Program,
    uniform_locations: RefCell<FxHashMap<String, Option<UniformLocation>>>,
    uniform_values: RefCell<FxHashMap<String, UniformValue>>,
    // Force compiler to not implement Send and Sync, because OpenGL is not thread-safe.
    thread_mark: PhantomData<*const u8>,
}

impl GpuProgram {
    /// Creates a program from vertex and fragment shader sources.
    pub fn from_source(
        state: &PipelineState,
        name: &str,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<GpuProgram, FrameworkError> {
        unsafe {
            let vertex_shader = create_shader(
                state,
                format!("{name}_VertexShader"),
                glow::VERTEX_SHADER,
                vertex_source,
            )?;
            let fragment_shader = create_shader(
                state,
                format!("{name}_FragmentShader"),
                glow::FRAGMENT_SHADER,
                fragment_source,
            )?;
            let program = state
                .gl
                .create_program()
                .map_err(FrameworkError::Internal)?;
            state.gl.attach_shader(program, vertex_shader);
            state.gl.delete_shader(vertex_shader);
            state.gl.attach_shader(program, fragment_shader);
            state.gl.delete_shader(fragment_shader);
            link_program(state, name, program)?;

            Ok(Self {
                state: state.weak(),
                id: program,
                uniform_locations: Default::default(),
                uniform_values: Default::default(),
                thread_mark: PhantomData,
            })
        }
    }

    /// Creates a compute program from a single compute shader source.
    pub fn from_compute_source(
        state: &PipelineState,
        name: &str,
        compute_source: &str,
    ) -> Result<GpuProgram, FrameworkError> {
        unsafe {
            let compute_shader = create_shader(
                state,
                format!("{name}_ComputeShader"),
                glow::COMPUTE_SHADER,
                compute_source,
            )?;
            let program = state
                .gl
                .create_program()
                .map_err(FrameworkError::Internal)?;
            state.gl.attach_shader(program, compute_shader);
            state.gl.delete_shader(compute_shader);
            link_program(state, name, program)?;

            Ok(Self {
                state: state.weak(),
                id: program,
                uniform_locations: Default::default(),
                uniform_values: Default::default(),
                thread_mark: PhantomData,
            })
        }
    }

    pub fn id(&self) -> glow::Program {
        self.id
    }

    fn bind(&self) -> SharedPipelineState {
        let state = self.state.upgrade().unwrap();
        state.set_program(Some(self.id));
        state
    }

    /// Looks up (and caches) the location of a uniform. Unknown names are
    /// reported once and remembered as absent.
    pub fn uniform_location(&self, name: &str) -> Option<UniformLocation> {
        let mut locations = self.uniform_locations.borrow_mut();
        if let Some(cached) = locations.get(name) {
            return cached.clone();
        }

        let state = self.state.upgrade().unwrap();
        let location = unsafe {
            state
                .gl
                .get_uniform_location(self.id, name)
                .map(|id| UniformLocation {
                    id,
                    thread_mark: PhantomData,
                })
        };

        if location.is_none() {
            Log::warning(format!(
                "Unable to find uniform \"{name}\", all writes to it will be ignored."
            ));
        }

        locations.insert(name.to_owned(), location.clone());
        location
    }

    /// Looks up the index of a named uniform block.
    pub fn uniform_block_index(&self, name: &str) -> Option<u32> {
        let state = self.state.upgrade().unwrap();
        unsafe { state.gl.get_uniform_block_index(self.id, name) }
    }

    /// Routes a named uniform block to the given buffer binding point.
    pub fn bind_uniform_block(&self, name: &str, binding_point: u32) {
        if let Some(index) = self.uniform_block_index(name) {
            let state = self.state.upgrade().unwrap();
            unsafe {
                state.gl.uniform_block_binding(self.id, index, binding_point);
            }
        } else {
            Log::warning(format!(
                "Unable to find uniform block \"{name}\", it will not be bound."
            ));
        }
    }

    /// Returns the location to write to, or `None` when the write can be
    /// elided: either the uniform does not exist, or the cached value equals
    /// the new one.
    fn prepare_set(&self, name: &str, value: &UniformValue) -> Option<UniformLocation> {
        let location = self.uniform_location(name)?;

        let mut values = self.uniform_values.borrow_mut();
        match values.get(name) {
            Some(old) if old == value => return None,
            _ => {
                values.insert(name.to_owned(), value.clone());
            }
        }

        Some(location)
    }

    /// Sets a uniform by name, skipping the driver call when the cached value
    /// matches.
    pub fn set_uniform(&self, name: &str, value: UniformValue) {
        let Some(location) = self.prepare_set(name, &value) else {
            return;
        };

        let state = self.bind();
        state.on_uniform_change();
        unsafe {
            match value {
                UniformValue::Bool(v) => state
                    .gl
                    .uniform_1_i32(Some(&location.id), if v { 1 } else { 0 }),
                UniformValue::Int(v) => state.gl.uniform_1_i32(Some(&location.id), v),
                UniformValue::UInt(v) => state.gl.uniform_1_u32(Some(&location.id), v),
                UniformValue::Float(v) => state.gl.uniform_1_f32(Some(&location.id), v),
                UniformValue::Vector2(v) => {
                    state.gl.uniform_2_f32(Some(&location.id), v.x, v.y)
                }
                UniformValue::Vector3(v) => {
                    state.gl.uniform_3_f32(Some(&location.id), v.x, v.y, v.z)
                }
                UniformValue::Vector4(v) => state
                    .gl
                    .uniform_4_f32(Some(&location.id), v.x, v.y, v.z, v.w),
                UniformValue::Matrix3(v) => state.gl.uniform_matrix_3_f32_slice(
                    Some(&location.id),
                    false,
                    v.as_slice(),
                ),
                UniformValue::Matrix4(v) => state.gl.uniform_matrix_4_f32_slice(
                    Some(&location.id),
                    false,
                    v.as_slice(),
                ),
            }
        }
    }

    #[inline]
    pub fn set_bool(&self, name: &str, value: bool) {
        self.set_uniform(name, UniformValue::Bool(value));
    }

    #[inline]
    pub fn set_i32(&self, name: &str, value: i32) {
        self.set_uniform(name, UniformValue::Int(value));
    }

    #[inline]
    pub fn set_u32(&self, name: &str, value: u32) {
        self.set_uniform(name, UniformValue::UInt(value));
    }

    #[inline]
    pub fn set_f32(&self, name: &str, value: f32) {
        self.set_uniform(name, UniformValue::Float(value));
    }

    #[inline]
    pub fn set_vector2(&self, name: &str, value: &Vector2<f32>) {
        self.set_uniform(name, UniformValue::Vector2(*value));
    }

    #[inline]
    pub fn set_vector3(&self, name: &str, value: &Vector3<f32>) {
        self.set_uniform(name, UniformValue::Vector3(*value));
    }

    #[inline]
    pub fn set_vector4(&self, name: &str, value: &Vector4<f32>) {
        self.set_uniform(name, UniformValue::Vector4(*value));
    }

    #[inline]
    pub fn set_matrix3(&self, name: &str, value: &Matrix3<f32>) {
        self.set_uniform(name, UniformValue::Matrix3(*value));
    }

    #[inline]
    pub fn set_matrix4(&self, name: &str, value: &Matrix4<f32>) {
        self.set_uniform(name, UniformValue::Matrix4(*value));
    }

    /// Sets an array of matrices. Arrays bypass the value cache - palettes
    /// change every frame and comparing them would cost more than the upload.
    pub fn set_matrix4_array(&self, name: &str, value: &[Matrix4<f32>]) {
        if value.is_empty() {
            return;
        }
        let Some(location) = self.uniform_location(name) else {
            return;
        };
        let state = self.bind();
        state.on_uniform_change();
        unsafe {
            state.gl.uniform_matrix_4_f32_slice(
                Some(&location.id),
                false,
                std::slice::from_raw_parts(value.as_ptr() as *const f32, value.len() * 16),
            );
        }
    }

    /// Binds a texture image for load/store access in a compute shader.
    pub fn bind_image(
        &self,
        unit: u32,
        texture: &GpuTexture,
        level: i32,
        layered: bool,
        layer: i32,
        access: ImageAccess,
    ) {
        let state = self.bind();
        let format = texture.pixel_kind().pixel_descriptor().internal_format;
        unsafe {
            state.gl.bind_image_texture(
                unit,
                Some(texture.id()),
                level,
                layered,
                layer,
                access.into_gl(),
                format,
            );
        }
    }

    /// Launches the compute work groups. The caller is responsible for
    /// issuing a memory barrier before the results are sampled.
    pub fn dispatch_compute(&self, groups_x: u32, groups_y: u32, groups_z: u32) {
        let state = self.bind();
        unsafe {
            state.gl.dispatch_compute(groups_x, groups_y, groups_z);
        }
    }
}

impl Drop for GpuProgram {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            unsafe {
                state.gl.delete_program(self.id);
            }
        }
    }
}
