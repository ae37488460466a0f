//! The Ember RHI: a single facade over the GPU. All state changes, resource
//! creation and draw calls go through [`state::PipelineState`] which caches
//! GL state to elide redundant driver calls. The facade is synchronous and
//! must be used from the thread that owns the GL context.

#![allow(clippy::too_many_arguments)]

pub use ember_core as core;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumString, VariantNames};

pub mod buffer;
pub mod error;
pub mod framebuffer;
pub mod geometry_buffer;
pub mod gpu_program;
pub mod gpu_texture;
pub mod state;
pub mod stats;

/// A set of possible polygon filling modes.
#[derive(
    Copy, Clone, PartialOrd, PartialEq, Hash, Debug, Eq, Serialize, Deserialize, Default,
)]
pub enum PolygonFillMode {
    /// Only vertices of polygons are rendered.
    Point,
    /// Only edges of polygons are rendered using 1px lines. Used for
    /// wireframe drawing (AABB gizmos).
    Line,
    /// The entire polygon surface is rendered. This is the default mode.
    #[default]
    Fill,
}

/// Defines a polygon face. Used for polygon fill mode and face culling.
#[derive(
    Copy, Clone, PartialOrd, PartialEq, Hash, Debug, Eq, Serialize, Deserialize, Default,
)]
pub enum PolygonFace {
    /// Only front faces.
    Front,
    /// Only back faces.
    Back,
    /// Both back and front faces.
    #[default]
    FrontAndBack,
}

/// A function used to compare two values. Used for depth testing.
#[derive(
    Copy,
    Clone,
    PartialOrd,
    PartialEq,
    Eq,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Debug,
    AsRefStr,
    EnumString,
    VariantNames,
    Default,
)]
pub enum CompareFunc {
    /// Never passes.
    Never,
    /// Passes if the incoming value is less than the stored value.
    Less,
    /// Passes if the incoming value is equal to the stored value.
    Equal,
    /// Passes if the incoming value is less than or equal to the stored value.
    #[default]
    LessOrEqual,
    /// Passes if the incoming value is greater than the stored value.
    Greater,
    /// Passes if the incoming value is not equal to the stored value.
    NotEqual,
    /// Passes if the incoming value is greater than or equal to the stored value.
    GreaterOrEqual,
    /// Always passes.
    Always,
}

/// Source or destination data for one operand of the blending equation.
#[derive(
    Copy,
    Clone,
    Hash,
    PartialOrd,
    PartialEq,
    Eq,
    Ord,
    Serialize,
    Deserialize,
    Debug,
    AsRefStr,
    EnumString,
    VariantNames,
    Default,
)]
pub enum BlendFactor {
    #[default]
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DstColor,
    OneMinusDstColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DstAlpha,
    OneMinusDstAlpha,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
    SrcAlphaSaturate,
}

/// Operation used in the blending equation.
#[derive(
    Copy, Clone, Hash, PartialOrd, PartialEq, Eq, Ord, Serialize, Deserialize, Debug, Default,
)]
pub enum BlendMode {
    /// `Source + Dest`. This is the default operation.
    #[default]
    Add,
    /// `Source - Dest`.
    Subtract,
    /// `Dest - Source`.
    ReverseSubtract,
    /// `min(Source, Dest)`.
    Min,
    /// `max(Source, Dest)`.
    Max,
}

/// Blending equation with separate modes for the RGB and alpha parts.
#[derive(
    Copy, Clone, Default, PartialOrd, PartialEq, Ord, Eq, Hash, Serialize, Deserialize, Debug,
)]
pub struct BlendEquation {
    /// Operation for the RGB part.
    pub rgb: BlendMode,
    /// Operation for the alpha part.
    pub alpha: BlendMode,
}

/// Blending function: sources of data for both operands of the blending
/// equation, separately for the RGB and alpha parts.
#[derive(Copy, Clone, PartialOrd, PartialEq, Ord, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct BlendFunc {
    /// Source factor (RGB part).
    pub sfactor: BlendFactor,
    /// Destination factor (RGB part).
    pub dfactor: BlendFactor,
    /// Source factor (alpha part).
    pub alpha_sfactor: BlendFactor,
    /// Destination factor (alpha part).
    pub alpha_dfactor: BlendFactor,
}

impl BlendFunc {
    /// Creates a blending function where RGB and alpha use the same factors.
    pub fn new(sfactor: BlendFactor, dfactor: BlendFactor) -> Self {
        Self {
            sfactor,
            dfactor,
            alpha_sfactor: sfactor,
            alpha_dfactor: dfactor,
        }
    }
}

impl Default for BlendFunc {
    fn default() -> Self {
        Self {
            sfactor: BlendFactor::One,
            dfactor: BlendFactor::Zero,
            alpha_sfactor: BlendFactor::One,
            alpha_dfactor: BlendFactor::Zero,
        }
    }
}

/// Blending parameters: the function and the equation.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct BlendParameters {
    /// Blending function, see [`BlendFunc`].
    pub func: BlendFunc,
    /// Blending equation, see [`BlendEquation`].
    pub equation: BlendEquation,
}

/// A mask that defines which color channels are written to a framebuffer.
#[derive(Copy, Clone, PartialOrd, PartialEq, Hash, Debug, Eq, Serialize, Deserialize)]
pub struct ColorMask {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
    pub alpha: bool,
}

impl Default for ColorMask {
    fn default() -> Self {
        Self {
            red: true,
            green: true,
            blue: true,
            alpha: true,
        }
    }
}

impl ColorMask {
    /// Creates a color mask where all channels have the given value.
    pub fn all(value: bool) -> Self {
        Self {
            red: value,
            green: value,
            blue: value,
            alpha: value,
        }
    }
}

/// A face side to cull.
#[derive(
    Copy, Clone, PartialOrd, PartialEq, Hash, Debug, Eq, Serialize, Deserialize, Default,
)]
pub enum CullFace {
    /// Cull only back faces.
    #[default]
    Back,
    /// Cull only front faces.
    Front,
}

/// Winding order that defines the front face of a polygon.
#[derive(
    Copy, Clone, PartialOrd, PartialEq, Hash, Debug, Eq, Serialize, Deserialize, Default,
)]
pub enum FrontFace {
    /// Counter-clockwise winding. This is the GL default.
    #[default]
    CounterClockwise,
    /// Clockwise winding.
    Clockwise,
}

/// A set of drawing parameters used during a draw call. Defines the whole
/// fixed-function pipeline state at once, so a pass cannot inherit stale
/// state from a previous one.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct DrawParameters {
    /// Optional face culling; [`None`] disables culling.
    pub cull_face: Option<CullFace>,
    /// Front face winding order.
    pub front_face: FrontFace,
    /// Color write mask.
    pub color_write: ColorMask,
    /// Whether depth values are written to the depth buffer.
    pub depth_write: bool,
    /// Depth test options; [`None`] disables the depth test.
    pub depth_test: Option<CompareFunc>,
    /// Blending options; [`None`] disables blending.
    pub blend: Option<BlendParameters>,
}

impl Default for DrawParameters {
    fn default() -> Self {
        Self {
            cull_face: Some(CullFace::Back),
            front_face: Default::default(),
            color_write: Default::default(),
            depth_write: true,
            depth_test: Some(CompareFunc::Less),
            blend: None,
        }
    }
}

/// A range of elements (triangles or lines) to draw in a draw call.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum ElementRange {
    /// All available elements. This is the default option.
    #[default]
    Full,
    /// A specific range of elements.
    Specific {
        /// Offset (in elements) from the beginning of the buffer.
        offset: usize,
        /// Total count of elements to draw.
        count: usize,
    },
}

/// Element kind of geometry.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ElementKind {
    /// Triangles.
    Triangle,
    /// Lines.
    Line,
}

impl ElementKind {
    pub(crate) fn index_per_element(self) -> usize {
        match self {
            ElementKind::Triangle => 3,
            ElementKind::Line => 2,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn draw_parameters_default() {
        let params = DrawParameters::default();
        assert_eq!(params.cull_face, Some(CullFace::Back));
        assert_eq!(params.depth_test, Some(CompareFunc::Less));
        assert!(params.depth_write);
        assert!(params.blend.is_none());
        assert_eq!(params.color_write, ColorMask::all(true));
    }

    #[test]
    fn blend_func_same_factors() {
        let func = BlendFunc::new(BlendFactor::SrcAlpha, BlendFactor::OneMinusSrcAlpha);
        assert_eq!(func.sfactor, func.alpha_sfactor);
        assert_eq!(func.dfactor, func.alpha_dfactor);
    }
}
