//! Framebuffer wrapper. Color attachments are automatically joined into the
//! draw-buffer list; depth and stencil attachments are not. Array textures
//! and cube maps can be re-pointed at a single layer/face between passes,
//! which is how the shadow atlases and the IBL maps are filled.

use crate::{
    core::color::Color,
    error::FrameworkError,
    geometry_buffer::GeometryBuffer,
    gpu_program::GpuProgram,
    gpu_texture::{image_2d_size_bytes, CubeMapFace, GpuTexture, GpuTextureKind},
    state::{PipelineState, SharedPipelineState},
    stats::DrawCallStatistics,
    ColorMask, DrawParameters, ElementRange,
};
use ember_math::Rect;
use glow::{HasContext, PixelPackData};
use std::rc::{Rc, Weak};

/// Kind of a framebuffer attachment.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AttachmentKind {
    Color,
    Depth,
    DepthStencil,
}

/// A texture attached to a framebuffer. The framebuffer shares ownership so
/// that a texture can back several framebuffers (the forward pass reuses the
/// G-buffer depth).
pub struct Attachment {
    pub kind: AttachmentKind,
    pub texture: Rc<GpuTexture>,
}

impl Attachment {
    pub fn color(texture: Rc<GpuTexture>) -> Self {
        Self {
            kind: AttachmentKind::Color,
            texture,
        }
    }

    pub fn depth(texture: Rc<GpuTexture>) -> Self {
        Self {
            kind: AttachmentKind::Depth,
            texture,
        }
    }

    pub fn depth_stencil(texture: Rc<GpuTexture>) -> Self {
        Self {
            kind: AttachmentKind::DepthStencil,
            texture,
        }
    }
}

/// Selects what [`FrameBuffer::read_pixels`] reads.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReadTarget {
    Depth,
    Color(usize),
}

/// See module docs.
pub struct FrameBuffer {
    state: Weak<PipelineState>,
    fbo: Option<glow::Framebuffer>,
    depth_attachment: Option<Attachment>,
    color_attachments: Vec<Attachment>,
}

unsafe fn set_attachment(
    state: &PipelineState,
    gl_attachment_kind: u32,
    texture: &GpuTexture,
) {
    match texture.kind() {
        GpuTextureKind::Line { .. } => {
            state.gl.framebuffer_texture(
                glow::FRAMEBUFFER,
                gl_attachment_kind,
                Some(texture.id()),
                0,
            );
        }
        GpuTextureKind::Rectangle { .. } => {
            state.gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                gl_attachment_kind,
                glow::TEXTURE_2D,
                Some(texture.id()),
                0,
            );
        }
        GpuTextureKind::Cube { .. } => {
            state.gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                gl_attachment_kind,
                glow::TEXTURE_CUBE_MAP_POSITIVE_X,
                Some(texture.id()),
                0,
            );
        }
        GpuTextureKind::Rectangle2DArray { .. }
        | GpuTextureKind::CubeArray { .. }
        | GpuTextureKind::Volume { .. } => {
            state.gl.framebuffer_texture_layer(
                glow::FRAMEBUFFER,
                gl_attachment_kind,
                Some(texture.id()),
                0,
                0,
            );
        }
    }
}

fn depth_attachment_point(attachment: &Attachment) -> u32 {
    match attachment.kind {
        AttachmentKind::Color => panic!("Attempt to use a color attachment as depth!"),
        AttachmentKind::Depth => glow::DEPTH_ATTACHMENT,
        AttachmentKind::DepthStencil => glow::DEPTH_STENCIL_ATTACHMENT,
    }
}

impl FrameBuffer {
    pub fn new(
        state: &PipelineState,
        depth_attachment: Option<Attachment>,
        color_attachments: Vec<Attachment>,
    ) -> Result<Self, FrameworkError> {
        unsafe {
            let fbo = state
                .gl
                .create_framebuffer()
                .map_err(FrameworkError::Internal)?;

            state.set_framebuffer(Some(fbo));

            if let Some(depth_attachment) = depth_attachment.as_ref() {
                set_attachment(
                    state,
                    depth_attachment_point(depth_attachment),
                    &depth_attachment.texture,
                );
            }

            let mut color_buffers = Vec::new();
            for (i, color_attachment) in color_attachments.iter().enumerate() {
                assert_eq!(color_attachment.kind, AttachmentKind::Color);
                let color_attachment_kind = glow::COLOR_ATTACHMENT0 + i as u32;
                set_attachment(state, color_attachment_kind, &color_attachment.texture);
                color_buffers.push(color_attachment_kind);
            }

            if color_buffers.is_empty() {
                state.gl.draw_buffers(&[glow::NONE])
            } else {
                state.gl.draw_buffers(&color_buffers);
            }

            if state.gl.check_framebuffer_status(glow::FRAMEBUFFER) != glow::FRAMEBUFFER_COMPLETE {
                return Err(FrameworkError::FailedToConstructFBO);
            }

            state.set_framebuffer(None);

            Ok(Self {
                state: state.weak(),
                fbo: Some(fbo),
                depth_attachment,
                color_attachments,
            })
        }
    }

    /// Wraps the default framebuffer (the window surface).
    pub fn backbuffer(state: &PipelineState) -> Self {
        Self {
            state: state.weak(),
            fbo: None,
            depth_attachment: None,
            color_attachments: Default::default(),
        }
    }

    /// `None` only for the back buffer.
    pub fn id(&self) -> Option<glow::Framebuffer> {
        self.fbo
    }

    pub fn color_attachments(&self) -> &[Attachment] {
        &self.color_attachments
    }

    pub fn depth_attachment(&self) -> Option<&Attachment> {
        self.depth_attachment.as_ref()
    }

    fn state(&self) -> SharedPipelineState {
        self.state.upgrade().expect("Pipeline state must be alive!")
    }

    /// Points the given color attachment at a single face of its cube map.
    pub fn set_cubemap_face(&self, attachment_index: usize, face: CubeMapFace, mip: u32) {
        let state = self.state();

        unsafe {
            state.set_framebuffer(self.fbo);

            let attachment = &self.color_attachments[attachment_index];
            state.gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0 + attachment_index as u32,
                face.into_gl(),
                Some(attachment.texture.id()),
                mip as i32,
            );
        }
    }

    /// Points the given color attachment at a single layer of its array
    /// texture. For cube arrays the layer is `cube_index * 6 + face_index`.
    pub fn set_color_attachment_layer(&self, attachment_index: usize, mip: u32, layer: u32) {
        let state = self.state();

        unsafe {
            state.set_framebuffer(self.fbo);

            let attachment = &self.color_attachments[attachment_index];
            state.gl.framebuffer_texture_layer(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0 + attachment_index as u32,
                Some(attachment.texture.id()),
                mip as i32,
                layer as i32,
            );
        }
    }

    /// Points the depth attachment at a single layer of its array texture.
    pub fn set_depth_attachment_layer(&self, layer: u32) {
        let state = self.state();

        unsafe {
            state.set_framebuffer(self.fbo);

            let attachment = self
                .depth_attachment
                .as_ref()
                .expect("Framebuffer has no depth attachment!");
            state.gl.framebuffer_texture_layer(
                glow::FRAMEBUFFER,
                depth_attachment_point(attachment),
                Some(attachment.texture.id()),
                0,
                layer as i32,
            );
        }
    }

    /// Binds the framebuffer, sets the viewport and clears the requested
    /// buffers - exactly in that order.
    pub fn clear(
        &self,
        viewport: Rect<i32>,
        color: Option<Color>,
        depth: Option<f32>,
        stencil: Option<i32>,
    ) {
        let state = self.state();

        state.set_framebuffer(self.id());
        state.set_viewport(viewport);

        unsafe {
            // Direct route for the default framebuffer.
            if self.fbo.is_none() {
                let mut mask = 0;

                if let Some(color) = color {
                    state.set_color_write(ColorMask::default());
                    state.set_clear_color(color);
                    mask |= glow::COLOR_BUFFER_BIT;
                }
                if let Some(depth) = depth {
                    state.set_depth_write(true);
                    state.set_clear_depth(depth);
                    mask |= glow::DEPTH_BUFFER_BIT;
                }
                if let Some(stencil) = stencil {
                    state.set_clear_stencil(stencil);
                    mask |= glow::STENCIL_BUFFER_BIT;
                }

                state.gl.clear(mask);
                return;
            }

            // Typed clears for the attachments of a custom framebuffer.
            if let Some(depth_stencil) = self.depth_attachment.as_ref() {
                state.set_depth_write(true);

                match depth_stencil.kind {
                    AttachmentKind::Color => unreachable!("depth cannot be color!"),
                    AttachmentKind::DepthStencil => match (depth, stencil) {
                        (Some(depth), Some(stencil)) => {
                            state.gl.clear_buffer_depth_stencil(
                                glow::DEPTH_STENCIL,
                                0,
                                depth,
                                stencil,
                            );
                        }
                        (Some(depth), None) => {
                            state.gl.clear_buffer_f32_slice(glow::DEPTH, 0, &[depth]);
                        }
                        (None, Some(stencil)) => {
                            state
                                .gl
                                .clear_buffer_i32_slice(glow::STENCIL, 0, &[stencil]);
                        }
                        (None, None) => {}
                    },
                    AttachmentKind::Depth => {
                        if let Some(depth) = depth {
                            state.gl.clear_buffer_f32_slice(glow::DEPTH, 0, &[depth]);
                        }
                    }
                }
            }

            if let Some(color) = color {
                state.set_color_write(ColorMask::default());

                let frgba = color.as_frgba();
                for i in 0..self.color_attachments.len() {
                    state.gl.clear_buffer_f32_slice(
                        glow::COLOR,
                        i as u32,
                        &[frgba.x, frgba.y, frgba.z, frgba.w],
                    );
                }
            }
        }
    }

    /// Draws indexed geometry into the framebuffer with the given pipeline
    /// state applied for this call only.
    pub fn draw(
        &self,
        geometry: &GeometryBuffer,
        viewport: Rect<i32>,
        program: &GpuProgram,
        params: &DrawParameters,
        element_range: ElementRange,
    ) -> Result<DrawCallStatistics, FrameworkError> {
        let state = self.state();

        state.set_framebuffer(self.id());
        state.set_viewport(viewport);
        state.apply_draw_parameters(params);
        state.set_program(Some(program.id()));

        let (offset, element_count) = match element_range {
            ElementRange::Full => (0, geometry.element_count.get()),
            ElementRange::Specific { offset, count } => (offset, count),
        };

        let last_element_index = offset + element_count;
        if last_element_index > geometry.element_count.get() {
            return Err(FrameworkError::InvalidElementRange {
                start: offset,
                end: last_element_index,
                total: geometry.element_count.get(),
            });
        }

        let index_per_element = geometry.element_kind.index_per_element();
        let start_index = offset * index_per_element;
        let index_count = element_count * index_per_element;

        unsafe {
            if index_count > 0 {
                state.set_vertex_array_object(Some(geometry.vertex_array_object()));

                let indices = (start_index * size_of::<u32>()) as i32;
                state.gl.draw_elements(
                    geometry.mode(),
                    index_count as i32,
                    glow::UNSIGNED_INT,
                    indices,
                );
                state.on_draw_call();
            }
        }

        Ok(DrawCallStatistics {
            triangles: element_count,
        })
    }

    /// Copies a region into another framebuffer.
    pub fn blit_to(
        &self,
        dest: &FrameBuffer,
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
        let state = self.state();
        state.blit_framebuffer(
            self.id(),
            dest.id(),
            src_x0,
            src_y0,
            src_x1,
            src_y1,
            dst_x0,
            dst_y0,
            dst_x1,
            dst_y1,
            copy_color,
            copy_depth,
            copy_stencil,
        );
    }

    /// Reads back the pixels of a rectangular attachment. Returns [`None`]
    /// for non-rectangular attachments or when the target is absent.
    pub fn read_pixels(&self, read_target: ReadTarget) -> Option<Vec<u8>> {
        let state = self.state();
        state.set_framebuffer(self.id());

        let texture = match read_target {
            ReadTarget::Depth => &self.depth_attachment.as_ref()?.texture,
            ReadTarget::Color(index) => {
                unsafe {
                    state
                        .gl
                        .read_buffer(glow::COLOR_ATTACHMENT0 + index as u32);
                }
                &self.color_attachments.get(index)?.texture
            }
        };

        if let GpuTextureKind::Rectangle { width, height } = texture.kind() {
            let pixel_kind = texture.pixel_kind();
            let pixel_info = pixel_kind.pixel_descriptor();
            let mut buffer = vec![0; image_2d_size_bytes(pixel_kind, width, height)];
            unsafe {
                state.gl.read_pixels(
                    0,
                    0,
                    width as i32,
                    height as i32,
                    pixel_info.format,
                    pixel_info.data_type,
                    PixelPackData::Slice(Some(buffer.as_mut_slice())),
                );
            }
            Some(buffer)
        } else {
            None
        }
    }
}

impl Drop for FrameBuffer {
    fn drop(&mut self) {
        if let Some(state) = self.state.upgrade() {
            unsafe {
                if let Some(id) = self.fbo {
                    state.gl.delete_framebuffer(id);
                }
            }
        }
    }
}
