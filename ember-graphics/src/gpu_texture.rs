//! GPU texture wrapper. Besides plain rectangles it supports the array and
//! cube-array targets the shadow atlases are built from, and cube maps with
//! explicit mip chains for IBL prefiltering.

use crate::{
    core::{color::Color, log::Log},
    error::FrameworkError,
    state::{PipelineState, SharedPipelineState},
};
use glow::HasContext;
use std::{marker::PhantomData, rc::Weak};

/// Shape of a texture.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GpuTextureKind {
    /// 1D texture.
    Line { length: usize },
    /// 2D texture.
    Rectangle { width: usize, height: usize },
    /// Array of 2D textures; `depth` is the amount of layers.
    Rectangle2DArray {
        width: usize,
        height: usize,
        depth: usize,
    },
    /// Cube map of six square faces.
    Cube { size: usize },
    /// Array of cube maps; `depth` is the amount of cubes (the GL layer
    /// count is six times larger).
    CubeArray { size: usize, depth: usize },
    /// 3D texture.
    Volume {
        width: usize,
        height: usize,
        depth: usize,
    },
}

impl GpuTextureKind {
    pub(crate) fn gl_texture_target(&self) -> u32 {
        match self {
            Self::Line { .. } => glow::TEXTURE_1D,
            Self::Rectangle { .. } => glow::TEXTURE_2D,
            Self::Rectangle2DArray { .. } => glow::TEXTURE_2D_ARRAY,
            Self::Cube { .. } => glow::TEXTURE_CUBE_MAP,
            Self::CubeArray { .. } => glow::TEXTURE_CUBE_MAP_ARRAY,
            Self::Volume { .. } => glow::TEXTURE_3D,
        }
    }
}

/// Pixel format of a texture. The set covers exactly what the render
/// pipeline needs: G-buffer and HDR targets, shadow depth, IBL maps and the
/// bloom chain.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PixelKind {
    R8,
    RGB8,
    RGBA8,
    SRGBA8,
    R16F,
    RG16F,
    RGB16F,
    RGBA16F,
    R32F,
    RGB32F,
    RGBA32F,
    D16,
    D32F,
    D24S8,
    D32FS8,
}

pub(crate) struct PixelDescriptor {
    pub data_type: u32,
    pub format: u32,
    pub internal_format: u32,
}

impl PixelKind {
    pub(crate) fn pixel_descriptor(self) -> PixelDescriptor {
        let (data_type, format, internal_format) = match self {
            Self::R8 => (glow::UNSIGNED_BYTE, glow::RED, glow::R8),
            Self::RGB8 => (glow::UNSIGNED_BYTE, glow::RGB, glow::RGB8),
            Self::RGBA8 => (glow::UNSIGNED_BYTE, glow::RGBA, glow::RGBA8),
            Self::SRGBA8 => (glow::UNSIGNED_BYTE, glow::RGBA, glow::SRGB8_ALPHA8),
            Self::R16F => (glow::FLOAT, glow::RED, glow::R16F),
            Self::RG16F => (glow::HALF_FLOAT, glow::RG, glow::RG16F),
            Self::RGB16F => (glow::HALF_FLOAT, glow::RGB, glow::RGB16F),
            Self::RGBA16F => (glow::HALF_FLOAT, glow::RGBA, glow::RGBA16F),
            Self::R32F => (glow::FLOAT, glow::RED, glow::R32F),
            Self::RGB32F => (glow::FLOAT, glow::RGB, glow::RGB32F),
            Self::RGBA32F => (glow::FLOAT, glow::RGBA, glow::RGBA32F),
            Self::D16 => (
                glow::UNSIGNED_SHORT,
                glow::DEPTH_COMPONENT,
                glow::DEPTH_COMPONENT16,
            ),
            Self::D32F => (
                glow::FLOAT,
                glow::DEPTH_COMPONENT,
                glow::DEPTH_COMPONENT32F,
            ),
            Self::D24S8 => (
                glow::UNSIGNED_INT_24_8,
                glow::DEPTH_STENCIL,
                glow::DEPTH24_STENCIL8,
            ),
            Self::D32FS8 => (
                glow::FLOAT_32_UNSIGNED_INT_24_8_REV,
                glow::DEPTH_STENCIL,
                glow::DEPTH32F_STENCIL8,
            ),
        };
        PixelDescriptor {
            data_type,
            format,
            internal_format,
        }
    }

    /// Whether the format carries depth (and possibly stencil) data. Depth
    /// formats attach to the depth slot of a framebuffer, everything else to
    /// a color slot.
    pub fn is_depth(self) -> bool {
        matches!(self, Self::D16 | Self::D32F | Self::D24S8 | Self::D32FS8)
    }

    /// Whether the format carries a stencil part.
    pub fn is_depth_stencil(self) -> bool {
        matches!(self, Self::D24S8 | Self::D32FS8)
    }

    fn bytes_per_pixel(self) -> usize {
        match self {
            Self::R8 => 1,
            Self::R16F | Self::D16 => 2,
            Self::RGB8 => 3,
            Self::RGBA8 | Self::SRGBA8 | Self::RG16F | Self::R32F | Self::D32F | Self::D24S8 => 4,
            Self::RGB16F => 6,
            Self::RGBA16F | Self::D32FS8 => 8,
            Self::RGB32F => 12,
            Self::RGBA32F => 16,
        }
    }

    pub(crate) fn unpack_alignment(self) -> i32 {
        match self {
            Self::R8 | Self::RGB8 => 1,
            Self::R16F | Self::D16 | Self::RGB16F => 2,
            _ => 4,
        }
    }
}

/// Returns the size in bytes of a 2D image with the given format.
pub fn image_2d_size_bytes(pixel_kind: PixelKind, width: usize, height: usize) -> usize {
    width * height * pixel_kind.bytes_per_pixel()
}

/// Minification filter of a texture.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum MinificationFilter {
    Nearest,
    NearestMipMapNearest,
    NearestMipMapLinear,
    #[default]
    Linear,
    LinearMipMapNearest,
    LinearMipMapLinear,
}

impl MinificationFilter {
    fn into_gl_value(self) -> i32 {
        (match self {
            Self::Nearest => glow::NEAREST,
            Self::NearestMipMapNearest => glow::NEAREST_MIPMAP_NEAREST,
            Self::NearestMipMapLinear => glow::NEAREST_MIPMAP_LINEAR,
            Self::Linear => glow::LINEAR,
            Self::LinearMipMapNearest => glow::LINEAR_MIPMAP_NEAREST,
            Self::LinearMipMapLinear => glow::LINEAR_MIPMAP_LINEAR,
        }) as i32
    }
}

/// Magnification filter of a texture.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum MagnificationFilter {
    Nearest,
    #[default]
    Linear,
}

impl MagnificationFilter {
    fn into_gl_value(self) -> i32 {
        (match self {
            Self::Nearest => glow::NEAREST,
            Self::Linear => glow::LINEAR,
        }) as i32
    }
}

/// Wrapping mode of a texture coordinate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum WrapMode {
    #[default]
    Repeat,
    ClampToEdge,
    /// Samples outside the texture decode as the border color. Shadow maps
    /// use a white border so off-atlas samples read as "not in shadow".
    ClampToBorder,
    MirroredRepeat,
}

impl WrapMode {
    fn into_gl_value(self) -> i32 {
        (match self {
            Self::Repeat => glow::REPEAT,
            Self::ClampToEdge => glow::CLAMP_TO_EDGE,
            Self::ClampToBorder => glow::CLAMP_TO_BORDER,
            Self::MirroredRepeat => glow::MIRRORED_REPEAT,
        }) as i32
    }
}

/// A face of a cube map.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CubeMapFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeMapFace {
    pub(crate) fn into_gl(self) -> u32 {
        match self {
            Self::PositiveX => glow::TEXTURE_CUBE_MAP_POSITIVE_X,
            Self::NegativeX => glow::TEXTURE_CUBE_MAP_NEGATIVE_X,
            Self::PositiveY => glow::TEXTURE_CUBE_MAP_POSITIVE_Y,
            Self::NegativeY => glow::TEXTURE_CUBE_MAP_NEGATIVE_Y,
            Self::PositiveZ => glow::TEXTURE_CUBE_MAP_POSITIVE_Z,
            Self::NegativeZ => glow::TEXTURE_CUBE_MAP_NEGATIVE_Z,
        }
    }

    /// Index of the face inside a cube (or a cube-array slice).
    pub fn index(self) -> usize {
        match self {
            Self::PositiveX => 0,
            Self::NegativeX => 1,
            Self::PositiveY => 2,
            Self::NegativeY => 3,
            Self::PositiveZ => 4,
            Self::NegativeZ => 5,
        }
    }
}

/// Descriptor of a texture to create.
pub struct GpuTextureDescriptor<'a> {
    pub kind: GpuTextureKind,
    pub pixel_kind: PixelKind,
    pub min_filter: MinificationFilter,
    pub mag_filter: MagnificationFilter,
    pub s_wrap_mode: WrapMode,
    pub t_wrap_mode: WrapMode,
    pub r_wrap_mode: WrapMode,
    /// Amount of mip levels to allocate. Must be at least 1.
    pub mip_count: usize,
    /// Optional initial contents of mip 0 (cube faces ordered +X, -X, +Y,
    /// -Y, +Z, -Z). Render targets pass [`None`].
    pub data: Option<&'a [u8]>,
}

impl Default for GpuTextureDescriptor<'_> {
    fn default() -> Self {
        Self {
            kind: GpuTextureKind::Rectangle {
                width: 1,
                height: 1,
            },
            pixel_kind: PixelKind::RGBA8,
            min_filter: Default::default(),
            mag_filter: Default::default(),
            s_wrap_mode: Default::default(),
            t_wrap_mode: Default::default(),
            r_wrap_mode: Default::default(),
            mip_count: 1,
            data: None,
        }
    }
}

/// See module docs.
pub struct GpuTexture {
    state: Weak<PipelineState>,
    texture: glow::Texture,
    kind: GpuTextureKind,
    pixel_kind: PixelKind,
    // Force compiler to not implement Send and Sync, because OpenGL is not thread-safe.
    thread_mark: PhantomData<*const u8>,
}

struct TempBinding {
    state: SharedPipelineState,
    target: u32,
}

impl TempBinding {
    fn new(state: SharedPipelineState, texture: &GpuTexture) -> Self {
        let target = texture.kind.gl_texture_target();
        // The last unit serves as a scratch slot for mutations.
        let unit = 31;
        state.set_texture(unit, target, Some(texture.texture));
        Self { state, target }
    }
}

impl GpuTexture {
    /// Creates a new GPU texture. Allocates every requested mip level of
    /// every layer/face; only mip 0 can be seeded with data.
    pub fn new(
        state: &PipelineState,
        desc: GpuTextureDescriptor,
    ) -> Result<Self, FrameworkError> {
        let texture = unsafe {
            state
                .gl
                .create_texture()
                .map_err(FrameworkError::Internal)?
        };

        let result = Self {
            state: state.weak(),
            texture,
            kind: desc.kind,
            pixel_kind: desc.pixel_kind,
            thread_mark: PhantomData,
        };

        let shared = state.weak().upgrade().unwrap();
        let binding = TempBinding::new(shared, &result);
        let target = binding.target;
        let gl = &binding.state.gl;

        let PixelDescriptor {
            data_type,
            format,
            internal_format,
        } = desc.pixel_kind.pixel_descriptor();

        unsafe {
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, desc.pixel_kind.unpack_alignment());

            let mip_count = desc.mip_count.max(1);
            for mip in 0..mip_count {
                let data = if mip == 0 { desc.data } else { None };
                match desc.kind {
                    GpuTextureKind::Line { length } => {
                        let length = (length >> mip).max(1);
                        gl.tex_image_1d(
                            target,
                            mip as i32,
                            internal_format as i32,
                            length as i32,
                            0,
                            format,
                            data_type,
                            glow::PixelUnpackData::Slice(data),
                        );
                    }
                    GpuTextureKind::Rectangle { width, height } => {
                        let width = (width >> mip).max(1);
                        let height = (height >> mip).max(1);
                        gl.tex_image_2d(
                            target,
                            mip as i32,
                            internal_format as i32,
                            width as i32,
                            height as i32,
                            0,
                            format,
                            data_type,
                            glow::PixelUnpackData::Slice(data),
                        );
                    }
                    GpuTextureKind::Cube { size } => {
                        let size = (size >> mip).max(1);
                        let bytes_per_face =
                            image_2d_size_bytes(desc.pixel_kind, size, size);
                        for face in 0..6usize {
                            let face_data = data.map(|data| {
                                &data[face * bytes_per_face..(face + 1) * bytes_per_face]
                            });
                            gl.tex_image_2d(
                                glow::TEXTURE_CUBE_MAP_POSITIVE_X + face as u32,
                                mip as i32,
                                internal_format as i32,
                                size as i32,
                                size as i32,
                                0,
                                format,
                                data_type,
                                glow::PixelUnpackData::Slice(face_data),
                            );
                        }
                    }
                    GpuTextureKind::Rectangle2DArray {
                        width,
                        height,
                        depth,
                    } => {
                        let width = (width >> mip).max(1);
                        let height = (height >> mip).max(1);
                        gl.tex_image_3d(
                            target,
                            mip as i32,
                            internal_format as i32,
                            width as i32,
                            height as i32,
                            depth as i32,
                            0,
                            format,
                            data_type,
                            glow::PixelUnpackData::Slice(data),
                        );
                    }
                    GpuTextureKind::CubeArray { size, depth } => {
                        let size = (size >> mip).max(1);
                        gl.tex_image_3d(
                            target,
                            mip as i32,
                            internal_format as i32,
                            size as i32,
                            size as i32,
                            (depth * 6) as i32,
                            0,
                            format,
                            data_type,
                            glow::PixelUnpackData::Slice(data),
                        );
                    }
                    GpuTextureKind::Volume {
                        width,
                        height,
                        depth,
                    } => {
                        let width = (width >> mip).max(1);
                        let height = (height >> mip).max(1);
                        let depth = (depth >> mip).max(1);
                        gl.tex_image_3d(
                            target,
                            mip as i32,
                            internal_format as i32,
                            width as i32,
                            height as i32,
                            depth as i32,
                            0,
                            format,
                            data_type,
                            glow::PixelUnpackData::Slice(data),
                        );
                    }
                }
            }

            gl.tex_parameter_i32(
                target,
                glow::TEXTURE_MIN_FILTER,
                desc.min_filter.into_gl_value(),
            );
            gl.tex_parameter_i32(
                target,
                glow::TEXTURE_MAG_FILTER,
                desc.mag_filter.into_gl_value(),
            );
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_S, desc.s_wrap_mode.into_gl_value());
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_T, desc.t_wrap_mode.into_gl_value());
            gl.tex_parameter_i32(target, glow::TEXTURE_WRAP_R, desc.r_wrap_mode.into_gl_value());
            gl.tex_parameter_i32(target, glow::TEXTURE_BASE_LEVEL, 0);
            gl.tex_parameter_i32(
                target,
                glow::TEXTURE_MAX_LEVEL,
                mip_count.saturating_sub(1) as i32,
            );
        }

        Ok(result)
    }

    /// Binds the texture to the given sampler unit.
    pub fn bind(&self, state: &PipelineState, sampler_index: u32) {
        state.set_texture(
            sampler_index,
            self.kind.gl_texture_target(),
            Some(self.texture),
        );
    }

    /// Unbinds the texture from the given sampler unit.
    pub fn unbind(&self, state: &PipelineState, sampler_index: u32) {
        state.set_texture(sampler_index, self.kind.gl_texture_target(), None);
    }

    /// Sets the border color used by [`WrapMode::ClampToBorder`].
    pub fn set_border_color(&self, color: Color) {
        if let Some(state) = self.state.upgrade() {
            let binding = TempBinding::new(state, self);
            let frgba = color.as_frgba();
            let color = [frgba.x, frgba.y, frgba.z, frgba.w];
            unsafe {
                binding.state.gl.tex_parameter_f32_slice(
                    binding.target,
                    glow::TEXTURE_BORDER_COLOR,
                    &color,
                );
            }
        }
    }

    /// Re-uploads mip 0 of the whole texture. Size and format must match the
    /// descriptor the texture was created with.
    pub fn set_data(&self, data: &[u8]) -> Result<(), FrameworkError> {
        let state = self
            .state
            .upgrade()
            .ok_or_else(|| FrameworkError::Custom("Pipeline state is gone".to_string()))?;

        let expected = self.mip0_size_bytes();
        if data.len() != expected {
            return Err(FrameworkError::Custom(format!(
                "Invalid texture data size: expected {expected} bytes, got {}",
                data.len()
            )));
        }

        let binding = TempBinding::new(state, self);
        let gl = &binding.state.gl;
        let PixelDescriptor {
            data_type,
            format,
            internal_format,
        } = self.pixel_kind.pixel_descriptor();

        unsafe {
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, self.pixel_kind.unpack_alignment());
            match self.kind {
                GpuTextureKind::Rectangle { width, height } => {
                    gl.tex_image_2d(
                        binding.target,
                        0,
                        internal_format as i32,
                        width as i32,
                        height as i32,
                        0,
                        format,
                        data_type,
                        glow::PixelUnpackData::Slice(Some(data)),
                    );
                }
                GpuTextureKind::Cube { size } => {
                    let bytes_per_face = image_2d_size_bytes(self.pixel_kind, size, size);
                    for face in 0..6usize {
                        gl.tex_image_2d(
                            glow::TEXTURE_CUBE_MAP_POSITIVE_X + face as u32,
                            0,
                            internal_format as i32,
                            size as i32,
                            size as i32,
                            0,
                            format,
                            data_type,
                            glow::PixelUnpackData::Slice(Some(
                                &data[face * bytes_per_face..(face + 1) * bytes_per_face],
                            )),
                        );
                    }
                }
                _ => {
                    return Err(FrameworkError::Custom(
                        "set_data supports only rectangle and cube textures".to_string(),
                    ))
                }
            }
        }

        Ok(())
    }

    fn mip0_size_bytes(&self) -> usize {
        match self.kind {
            GpuTextureKind::Line { length } => length * self.pixel_kind.bytes_per_pixel(),
            GpuTextureKind::Rectangle { width, height } => {
                image_2d_size_bytes(self.pixel_kind, width, height)
            }
            GpuTextureKind::Rectangle2DArray {
                width,
                height,
                depth,
            } => image_2d_size_bytes(self.pixel_kind, width, height) * depth,
            GpuTextureKind::Cube { size } => image_2d_size_bytes(self.pixel_kind, size, size) * 6,
            GpuTextureKind::CubeArray { size, depth } => {
                image_2d_size_bytes(self.pixel_kind, size, size) * 6 * depth
            }
            GpuTextureKind::Volume {
                width,
                height,
                depth,
            } => image_2d_size_bytes(self.pixel_kind, width, height) * depth,
        }
    }

    pub fn kind(&self) -> GpuTextureKind {
        self.kind
    }

    pub fn pixel_kind(&self) -> PixelKind {
        self.pixel_kind
    }

    pub fn id(&self) -> glow::Texture {
        self.texture
    }
}

impl Drop for GpuTexture {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            unsafe {
                state.gl.delete_texture(self.texture);
            }
        } else {
            // Out-of-order teardown at process exit: the context died first,
            // its resources died with it.
            Log::warning("GPU texture outlived the pipeline state.");
        }
    }
}
