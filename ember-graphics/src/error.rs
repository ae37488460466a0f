//! Errors that the graphics layer can produce.

use std::fmt::{Display, Formatter};

/// Set of possible errors of the graphics layer. Shader and framebuffer
/// construction errors are recoverable (the caller falls back or skips),
/// everything context-related is fatal for the renderer.
#[derive(Debug)]
pub enum FrameworkError {
    /// Compilation of a shader has failed.
    ShaderCompilationFailed {
        /// Name of the shader.
        shader_name: String,
        /// Compilation error message from the driver.
        error_message: String,
    },
    /// Linking a shader program has failed.
    ShaderLinkingFailed {
        /// Name of the shader.
        shader_name: String,
        /// Linking error message from the driver.
        error_message: String,
    },
    /// A hardware or driver limit was hit.
    NotEnoughResources(String),
    /// The framebuffer is incomplete and cannot be used for rendering.
    FailedToConstructFBO,
    /// An element range of a draw call exceeds the index buffer.
    InvalidElementRange {
        /// First element.
        start: usize,
        /// Last element.
        end: usize,
        /// Total amount of elements in the buffer.
        total: usize,
    },
    /// Internal driver error (buffer/texture/program object allocation).
    Internal(String),
    /// Arbitrary error.
    Custom(String),
}

impl Display for FrameworkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameworkError::ShaderCompilationFailed {
                shader_name,
                error_message,
            } => {
                write!(
                    f,
                    "Compilation of \"{shader_name}\" shader has failed: {error_message}",
                )
            }
            FrameworkError::ShaderLinkingFailed {
                shader_name,
                error_message,
            } => {
                write!(
                    f,
                    "Linking of \"{shader_name}\" shader has failed: {error_message}",
                )
            }
            FrameworkError::NotEnoughResources(v) => {
                write!(f, "Not enough resources: {v}")
            }
            FrameworkError::FailedToConstructFBO => {
                write!(f, "Failed to construct a framebuffer, it is incomplete")
            }
            FrameworkError::InvalidElementRange { start, end, total } => {
                write!(f, "Invalid element range [{start}..{end}] out of {total}")
            }
            FrameworkError::Internal(v) => {
                write!(f, "Internal graphics error: {v}")
            }
            FrameworkError::Custom(v) => {
                write!(f, "Custom error: {v}")
            }
        }
    }
}

impl std::error::Error for FrameworkError {}

impl From<String> for FrameworkError {
    fn from(v: String) -> Self {
        Self::Internal(v)
    }
}
