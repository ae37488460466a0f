//! CPU-side texture resource with the three-state lifecycle: decoded bytes
//! can be produced on any thread, but the GPU handle is created only on the
//! render thread. Transitions are monotonic until the resource is dropped.

use ember_graphics::{
    core::{array_as_u8_slice, log::Log},
    error::FrameworkError,
    gpu_texture::{
        GpuTexture, GpuTextureDescriptor, GpuTextureKind, MagnificationFilter,
        MinificationFilter, PixelKind, WrapMode,
    },
    state::PipelineState,
};
use nalgebra::Vector2;
use std::rc::Rc;

/// Lifecycle state of a texture resource.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ResourceState {
    /// Nothing is loaded.
    Unloaded,
    /// Pixel data sits in CPU memory.
    LoadedInMemory,
    /// A GPU handle exists; the CPU copy has been released.
    LoadedInInterface,
}

/// Pixel layout of the CPU copy.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TextureFormat {
    Rgba8,
    /// Linear 32-bit floats, the decoded form of an equirectangular HDR map.
    Rgb32F,
}

impl TextureFormat {
    fn gpu_pixel_kind(self) -> PixelKind {
        match self {
            Self::Rgba8 => PixelKind::RGBA8,
            Self::Rgb32F => PixelKind::RGB32F,
        }
    }
}

struct CpuImage {
    width: u32,
    height: u32,
    format: TextureFormat,
    bytes: Vec<u8>,
}

/// See module docs.
pub struct Texture {
    cpu: Option<CpuImage>,
    gpu: Option<Rc<GpuTexture>>,
}

impl Texture {
    /// An empty, unloaded texture.
    pub fn unloaded() -> Self {
        Self {
            cpu: None,
            gpu: None,
        }
    }

    /// Wraps already-decoded RGBA8 pixels.
    pub fn from_rgba8(width: u32, height: u32, bytes: Vec<u8>) -> Result<Self, FrameworkError> {
        if bytes.len() != (width * height * 4) as usize {
            return Err(FrameworkError::Custom(format!(
                "RGBA8 texture {width}x{height} requires {} bytes, got {}",
                width * height * 4,
                bytes.len()
            )));
        }
        Ok(Self {
            cpu: Some(CpuImage {
                width,
                height,
                format: TextureFormat::Rgba8,
                bytes,
            }),
            gpu: None,
        })
    }

    /// Decodes an equirectangular Radiance HDR image into linear floats.
    /// This is CPU-only work and may run on a worker thread.
    pub fn from_hdr_bytes(bytes: &[u8]) -> Result<Self, FrameworkError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| FrameworkError::Custom(format!("Failed to decode HDR image: {e}")))?;
        let image = image.to_rgb32f();
        let (width, height) = (image.width(), image.height());
        let pixels = image.into_raw();

        Ok(Self {
            cpu: Some(CpuImage {
                width,
                height,
                format: TextureFormat::Rgb32F,
                bytes: array_as_u8_slice(pixels.as_slice()).to_vec(),
            }),
            gpu: None,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ResourceState {
        if self.gpu.is_some() {
            ResourceState::LoadedInInterface
        } else if self.cpu.is_some() {
            ResourceState::LoadedInMemory
        } else {
            ResourceState::Unloaded
        }
    }

    /// Size in pixels; zero while unloaded.
    pub fn size(&self) -> Vector2<u32> {
        if let Some(cpu) = self.cpu.as_ref() {
            Vector2::new(cpu.width, cpu.height)
        } else if let Some(gpu) = self.gpu.as_ref() {
            match gpu.kind() {
                GpuTextureKind::Rectangle { width, height } => {
                    Vector2::new(width as u32, height as u32)
                }
                _ => Vector2::new(0, 0),
            }
        } else {
            Vector2::new(0, 0)
        }
    }

    /// Uploads the CPU copy to the GPU and releases it. Must run on the
    /// render thread. A no-op when already uploaded, an error when nothing
    /// is loaded.
    pub fn create_in_interface(&mut self, state: &PipelineState) -> Result<(), FrameworkError> {
        if self.gpu.is_some() {
            return Ok(());
        }

        let Some(cpu) = self.cpu.take() else {
            return Err(FrameworkError::Custom(
                "Attempt to upload an unloaded texture".to_string(),
            ));
        };

        let gpu = GpuTexture::new(
            state,
            GpuTextureDescriptor {
                kind: GpuTextureKind::Rectangle {
                    width: cpu.width as usize,
                    height: cpu.height as usize,
                },
                pixel_kind: cpu.format.gpu_pixel_kind(),
                min_filter: MinificationFilter::Linear,
                mag_filter: MagnificationFilter::Linear,
                s_wrap_mode: WrapMode::Repeat,
                t_wrap_mode: WrapMode::Repeat,
                r_wrap_mode: WrapMode::Repeat,
                mip_count: 1,
                data: Some(&cpu.bytes),
            },
        );

        match gpu {
            Ok(texture) => {
                self.gpu = Some(Rc::new(texture));
                Ok(())
            }
            Err(e) => {
                // Keep the CPU copy so a later retry is possible.
                Log::err(format!("Failed to upload a texture: {e}"));
                self.cpu = Some(cpu);
                Err(e)
            }
        }
    }

    /// The GPU handle; present only in [`ResourceState::LoadedInInterface`].
    pub fn gpu_texture(&self) -> Option<&Rc<GpuTexture>> {
        self.gpu.as_ref()
    }
}

#[cfg(test)]
mod test {
    use super::{ResourceState, Texture};

    #[test]
    fn texture_lifecycle_states() {
        let unloaded = Texture::unloaded();
        assert_eq!(unloaded.state(), ResourceState::Unloaded);

        let loaded = Texture::from_rgba8(2, 2, vec![0; 16]).unwrap();
        assert_eq!(loaded.state(), ResourceState::LoadedInMemory);
        assert_eq!(loaded.size().x, 2);
    }

    #[test]
    fn texture_rejects_wrong_size() {
        assert!(Texture::from_rgba8(2, 2, vec![0; 15]).is_err());
    }
}
