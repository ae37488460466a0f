//! GPU uniform buffer objects: the backing storage of the engine's uniform
//! blocks (camera, model, lights, material, skinning).

use crate::{error::FrameworkError, state::PipelineState};
use glow::HasContext;
use std::{cell::Cell, marker::PhantomData, rc::Weak};

/// Usage hint of a buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Uploaded once.
    StaticDraw,
    /// Rewritten up to once per frame.
    DynamicDraw,
    /// Rewritten many times per frame (per-draw model block).
    StreamDraw,
}

impl BufferUsage {
    fn into_gl(self) -> u32 {
        match self {
            Self::StaticDraw => glow::STATIC_DRAW,
            Self::DynamicDraw => glow::DYNAMIC_DRAW,
            Self::StreamDraw => glow::STREAM_DRAW,
        }
    }
}

/// A GPU buffer bound to the `UNIFORM_BUFFER` target.
pub struct UniformBufferObject {
    state: Weak<PipelineState>,
    id: glow::Buffer,
    size: Cell<usize>,
    usage: BufferUsage,
    // Force compiler to not implement Send and Sync, because OpenGL is not thread-safe.
    thread_mark: PhantomData<*const u8>,
}

impl UniformBufferObject {
    /// Allocates a buffer of the given size. Allocation failure is fatal for
    /// the renderer, the error must reach the host.
    pub fn new(
        state: &PipelineState,
        size: usize,
        usage: BufferUsage,
    ) -> Result<Self, FrameworkError> {
        unsafe {
            let id = state.gl.create_buffer().map_err(FrameworkError::Internal)?;
            state.gl.bind_buffer(glow::UNIFORM_BUFFER, Some(id));
            state
                .gl
                .buffer_data_size(glow::UNIFORM_BUFFER, size as i32, usage.into_gl());
            state.gl.bind_buffer(glow::UNIFORM_BUFFER, None);

            Ok(Self {
                state: state.weak(),
                id,
                size: Cell::new(size),
                usage,
                thread_mark: PhantomData,
            })
        }
    }

    /// Uploads the bytes, reallocating when the data outgrows the buffer.
    pub fn write_data(&self, state: &PipelineState, data: &[u8]) {
        unsafe {
            state.gl.bind_buffer(glow::UNIFORM_BUFFER, Some(self.id));
            if data.len() > self.size.get() {
                state
                    .gl
                    .buffer_data_u8_slice(glow::UNIFORM_BUFFER, data, self.usage.into_gl());
                self.size.set(data.len());
            } else {
                state.gl.buffer_sub_data_u8_slice(glow::UNIFORM_BUFFER, 0, data);
            }
            state.gl.bind_buffer(glow::UNIFORM_BUFFER, None);
        }
    }

    /// Binds the whole buffer to the given uniform binding point.
    pub fn bind(&self, state: &PipelineState, binding_point: u32) {
        unsafe {
            state
                .gl
                .bind_buffer_base(glow::UNIFORM_BUFFER, binding_point, Some(self.id));
        }
    }

    /// Size of the buffer in bytes.
    pub fn size(&self) -> usize {
        self.size.get()
    }
}

impl Drop for UniformBufferObject {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            unsafe {
                state.gl.delete_buffer(self.id);
            }
        }
    }
}
