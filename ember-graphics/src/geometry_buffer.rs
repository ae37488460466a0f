//! Geometry buffer: a VAO with one interleaved vertex buffer and an index
//! buffer. Models upload once and stay immutable; dynamic geometry (debug
//! lines) rewrites its buffers each frame.

use crate::{
    core::array_as_u8_slice,
    error::FrameworkError,
    state::PipelineState,
    ElementKind,
};
use glow::HasContext;
use std::{cell::Cell, marker::PhantomData, rc::Weak};

/// Usage hint of a geometry buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GeometryBufferKind {
    /// Uploaded once, drawn many times.
    StaticDraw,
    /// Rewritten frequently.
    DynamicDraw,
}

impl GeometryBufferKind {
    fn into_gl(self) -> u32 {
        match self {
            Self::StaticDraw => glow::STATIC_DRAW,
            Self::DynamicDraw => glow::DYNAMIC_DRAW,
        }
    }
}

/// Data type and arity of a vertex attribute.
#[derive(Copy, Clone)]
pub enum AttributeKind {
    Float,
    Float2,
    Float3,
    Float4,
    /// Four signed integers, passed to the shader as `ivec4` (bone indices).
    Int4,
    UnsignedByte4,
}

impl AttributeKind {
    pub fn size_bytes(self) -> usize {
        match self {
            AttributeKind::Float => size_of::<f32>(),
            AttributeKind::Float2 => size_of::<f32>() * 2,
            AttributeKind::Float3 => size_of::<f32>() * 3,
            AttributeKind::Float4 => size_of::<f32>() * 4,
            AttributeKind::Int4 => size_of::<i32>() * 4,
            AttributeKind::UnsignedByte4 => size_of::<u8>() * 4,
        }
    }

    fn length(self) -> i32 {
        match self {
            AttributeKind::Float => 1,
            AttributeKind::Float2 => 2,
            AttributeKind::Float3 => 3,
            AttributeKind::Float4 | AttributeKind::Int4 | AttributeKind::UnsignedByte4 => 4,
        }
    }

    fn get_type(self) -> u32 {
        match self {
            AttributeKind::Float
            | AttributeKind::Float2
            | AttributeKind::Float3
            | AttributeKind::Float4 => glow::FLOAT,
            AttributeKind::Int4 => glow::INT,
            AttributeKind::UnsignedByte4 => glow::UNSIGNED_BYTE,
        }
    }

    fn is_integer(self) -> bool {
        matches!(self, AttributeKind::Int4)
    }
}

/// One vertex attribute of an interleaved vertex layout.
pub struct AttributeDefinition {
    /// Attribute location in the shader.
    pub location: u32,
    /// Data type and arity.
    pub kind: AttributeKind,
    /// Whether integer data is normalized into `[0; 1]`.
    pub normalized: bool,
}

/// Describes the vertex buffer of a geometry buffer to create.
pub struct GeometryBufferDescriptor<'a> {
    pub usage: GeometryBufferKind,
    pub attributes: &'a [AttributeDefinition],
    /// Interleaved vertex data.
    pub vertex_data: &'a [u8],
    /// Size of a single vertex in bytes.
    pub vertex_size: usize,
    /// Flat index list; interpreted per [`ElementKind`].
    pub indices: &'a [u32],
    pub element_kind: ElementKind,
}

/// See module docs.
pub struct GeometryBuffer {
    state: Weak<PipelineState>,
    vertex_array_object: glow::VertexArray,
    vertex_buffer_object: glow::Buffer,
    element_buffer_object: glow::Buffer,
    usage: GeometryBufferKind,
    pub(crate) element_count: Cell<usize>,
    pub(crate) element_kind: ElementKind,
    // Force compiler to not implement Send and Sync, because OpenGL is not thread-safe.
    thread_mark: PhantomData<*const u8>,
}

impl GeometryBuffer {
    pub fn new(
        state: &PipelineState,
        desc: GeometryBufferDescriptor,
    ) -> Result<Self, FrameworkError> {
        debug_assert_eq!(
            desc.vertex_size,
            desc.attributes
                .iter()
                .map(|a| a.kind.size_bytes())
                .sum::<usize>()
        );

        unsafe {
            let vao = state
                .gl
                .create_vertex_array()
                .map_err(FrameworkError::Internal)?;
            let vbo = state.gl.create_buffer().map_err(FrameworkError::Internal)?;
            let ebo = state.gl.create_buffer().map_err(FrameworkError::Internal)?;

            state.set_vertex_array_object(Some(vao));
            state.set_vertex_buffer_object(Some(vbo));

            state
                .gl
                .buffer_data_u8_slice(glow::ARRAY_BUFFER, desc.vertex_data, desc.usage.into_gl());

            let mut offset = 0usize;
            for attribute in desc.attributes {
                if attribute.kind.is_integer() {
                    state.gl.vertex_attrib_pointer_i32(
                        attribute.location,
                        attribute.kind.length(),
                        attribute.kind.get_type(),
                        desc.vertex_size as i32,
                        offset as i32,
                    );
                } else {
                    state.gl.vertex_attrib_pointer_f32(
                        attribute.location,
                        attribute.kind.length(),
                        attribute.kind.get_type(),
                        attribute.normalized,
                        desc.vertex_size as i32,
                        offset as i32,
                    );
                }
                state.gl.enable_vertex_attrib_array(attribute.location);
                offset += attribute.kind.size_bytes();
            }

            // The element buffer binding is part of the VAO state.
            state.gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ebo));
            state.gl.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                array_as_u8_slice(desc.indices),
                desc.usage.into_gl(),
            );

            state.set_vertex_array_object(None);

            Ok(Self {
                state: state.weak(),
                vertex_array_object: vao,
                vertex_buffer_object: vbo,
                element_buffer_object: ebo,
                usage: desc.usage,
                element_count: Cell::new(
                    desc.indices.len() / desc.element_kind.index_per_element(),
                ),
                element_kind: desc.element_kind,
                thread_mark: PhantomData,
            })
        }
    }

    /// Rewrites the vertex buffer. Only valid for dynamic buffers.
    pub fn set_vertex_data(&self, state: &PipelineState, data: &[u8]) {
        debug_assert_eq!(self.usage, GeometryBufferKind::DynamicDraw);
        unsafe {
            state.set_vertex_buffer_object(Some(self.vertex_buffer_object));
            state
                .gl
                .buffer_data_u8_slice(glow::ARRAY_BUFFER, data, self.usage.into_gl());
        }
    }

    /// Rewrites the index buffer. Only valid for dynamic buffers.
    pub fn set_indices(&self, state: &PipelineState, indices: &[u32]) {
        debug_assert_eq!(self.usage, GeometryBufferKind::DynamicDraw);
        unsafe {
            state.set_vertex_array_object(Some(self.vertex_array_object));
            state.gl.buffer_data_u8_slice(
                glow::ELEMENT_ARRAY_BUFFER,
                array_as_u8_slice(indices),
                self.usage.into_gl(),
            );
        }
        self.element_count
            .set(indices.len() / self.element_kind.index_per_element());
    }

    /// Amount of elements (triangles or lines) in the buffer.
    pub fn element_count(&self) -> usize {
        self.element_count.get()
    }

    pub(crate) fn vertex_array_object(&self) -> glow::VertexArray {
        self.vertex_array_object
    }

    pub(crate) fn mode(&self) -> u32 {
        match self.element_kind {
            ElementKind::Triangle => glow::TRIANGLES,
            ElementKind::Line => glow::LINES,
        }
    }
}

impl Drop for GeometryBuffer {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            unsafe {
                state.gl.delete_buffer(self.vertex_buffer_object);
                state.gl.delete_buffer(self.element_buffer_object);
                state.gl.delete_vertex_array(self.vertex_array_object);
            }
        }
    }
}
