//! A viewport: the camera, the output texture and every intermediate render
//! target needed to draw one frame. Targets are allocated on first use and
//! whenever the size changes.

use crate::{
    renderer::{bloom::BloomRenderTarget, gbuffer::GBuffer},
    scene::camera::Camera,
};
use ember_graphics::{
    error::FrameworkError,
    framebuffer::{Attachment, FrameBuffer},
    gpu_texture::{
        GpuTexture, GpuTextureDescriptor, GpuTextureKind, MagnificationFilter,
        MinificationFilter, PixelKind, WrapMode,
    },
    state::PipelineState,
};
use nalgebra::Vector2;
use std::rc::Rc;

fn make_render_target(
    state: &PipelineState,
    width: usize,
    height: usize,
    pixel_kind: PixelKind,
) -> Result<Rc<GpuTexture>, FrameworkError> {
    Ok(Rc::new(GpuTexture::new(
        state,
        GpuTextureDescriptor {
            kind: GpuTextureKind::Rectangle { width, height },
            pixel_kind,
            min_filter: MinificationFilter::Nearest,
            mag_filter: MagnificationFilter::Nearest,
            s_wrap_mode: WrapMode::ClampToEdge,
            t_wrap_mode: WrapMode::ClampToEdge,
            r_wrap_mode: WrapMode::ClampToEdge,
            mip_count: 1,
            data: None,
        },
    )?))
}

/// The per-viewport render targets.
pub struct ViewportData {
    pub(crate) gbuffer: GBuffer,
    /// HDR color target of the lighting and forward passes. Its depth buffer
    /// receives a copy of the G-buffer depth, so the overlay is depth-tested
    /// against the geometry while the lighting shader samples the original.
    pub(crate) forward_framebuffer: FrameBuffer,
    pub(crate) bloom: BloomRenderTarget,
    /// LDR output of the tone mapper.
    pub(crate) output_framebuffer: FrameBuffer,
    output_texture: Rc<GpuTexture>,
}

impl ViewportData {
    pub(crate) fn new(
        state: &PipelineState,
        width: usize,
        height: usize,
    ) -> Result<Self, FrameworkError> {
        let gbuffer = GBuffer::new(state, width, height)?;

        let hdr_texture = make_render_target(state, width, height, PixelKind::RGBA16F)?;
        let forward_depth = make_render_target(state, width, height, PixelKind::D32FS8)?;
        let forward_framebuffer = FrameBuffer::new(
            state,
            Some(Attachment::depth_stencil(forward_depth)),
            vec![Attachment::color(hdr_texture)],
        )?;

        let output_texture = make_render_target(state, width, height, PixelKind::RGBA8)?;
        let output_framebuffer = FrameBuffer::new(
            state,
            None,
            vec![Attachment::color(output_texture.clone())],
        )?;

        Ok(Self {
            gbuffer,
            forward_framebuffer,
            bloom: BloomRenderTarget::new(state, width, height)?,
            output_framebuffer,
            output_texture,
        })
    }

    /// The HDR color target of the forward pass.
    pub fn hdr_texture(&self) -> &Rc<GpuTexture> {
        &self.forward_framebuffer.color_attachments()[0].texture
    }

    /// The final LDR image of the frame.
    pub fn output_texture(&self) -> &Rc<GpuTexture> {
        &self.output_texture
    }
}

/// See module docs.
pub struct Viewport {
    pub camera: Camera,
    size: Vector2<i32>,
    /// Editor viewports draw gizmos in the forward overlay.
    pub is_editor: bool,
    /// Whether bloom and tone mapping run; without them the HDR frame is
    /// copied to the output as-is.
    pub use_post_process: bool,
    pub(crate) data: Option<ViewportData>,
}

impl Viewport {
    pub fn new(camera: Camera, size: Vector2<i32>) -> Self {
        Self {
            camera,
            size,
            is_editor: false,
            use_post_process: true,
            data: None,
        }
    }

    pub fn size(&self) -> Vector2<i32> {
        self.size
    }

    /// Width / height; 1.0 for degenerate sizes.
    pub fn aspect(&self) -> f32 {
        if self.size.y > 0 {
            self.size.x as f32 / self.size.y as f32
        } else {
            1.0
        }
    }

    /// Changes the viewport size, dropping the render targets so they get
    /// reallocated on the next frame.
    pub fn resize(&mut self, size: Vector2<i32>) {
        if self.size != size {
            self.size = size;
            self.data = None;
        }
    }

    /// The final image of the last rendered frame, if any.
    pub fn output_texture(&self) -> Option<&Rc<GpuTexture>> {
        self.data.as_ref().map(|data| data.output_texture())
    }

    pub(crate) fn ensure_data(
        &mut self,
        state: &PipelineState,
    ) -> Result<&ViewportData, FrameworkError> {
        if self.data.is_none() {
            self.data = Some(ViewportData::new(
                state,
                self.size.x.max(1) as usize,
                self.size.y.max(1) as usize,
            )?);
        }
        Ok(self.data.as_ref().unwrap())
    }
}

#[cfg(test)]
mod test {
    use super::Viewport;
    use crate::scene::camera::Camera;
    use nalgebra::Vector2;

    #[test]
    fn viewport_aspect() {
        let viewport = Viewport::new(Camera::default(), Vector2::new(800, 600));
        assert!((viewport.aspect() - 800.0 / 600.0).abs() < 1e-6);

        let degenerate = Viewport::new(Camera::default(), Vector2::new(100, 0));
        assert_eq!(degenerate.aspect(), 1.0);
    }

    #[test]
    fn viewport_resize_drops_targets() {
        let mut viewport = Viewport::new(Camera::default(), Vector2::new(800, 600));
        assert!(viewport.output_texture().is_none());
        viewport.resize(Vector2::new(640, 480));
        assert_eq!(viewport.size(), Vector2::new(640, 480));
    }
}
