//! Bloom: a threshold filter followed by a fixed five-mip down-sample chain
//! (13-tap partial convolution) and a progressive 3x3 tent up-sample, all in
//! compute shaders with 8x8 tiles. A memory barrier separates every
//! dispatch, since each one samples what the previous one stored.

use crate::settings::{BLOOM_MIP_COUNT, BLOOM_TILE_SIZE};
use ember_graphics::{
    error::FrameworkError,
    gpu_program::{GpuProgram, ImageAccess},
    gpu_texture::{
        GpuTexture, GpuTextureDescriptor, GpuTextureKind, MagnificationFilter,
        MinificationFilter, PixelKind, WrapMode,
    },
    state::PipelineState,
};
use nalgebra::Vector2;
use std::rc::Rc;

/// One level of the bloom chain.
pub struct BloomMip {
    pub texture: Rc<GpuTexture>,
    pub size: Vector2<f32>,
}

/// The textures the bloom pass works on, sized relative to one viewport.
pub struct BloomRenderTarget {
    threshold_texture: Rc<GpuTexture>,
    mip_chain: Vec<BloomMip>,
    width: usize,
    height: usize,
}

fn make_bloom_texture(
    state: &PipelineState,
    width: usize,
    height: usize,
) -> Result<Rc<GpuTexture>, FrameworkError> {
    Ok(Rc::new(GpuTexture::new(
        state,
        GpuTextureDescriptor {
            kind: GpuTextureKind::Rectangle { width, height },
            pixel_kind: PixelKind::RGBA32F,
            min_filter: MinificationFilter::Linear,
            mag_filter: MagnificationFilter::Linear,
            s_wrap_mode: WrapMode::ClampToEdge,
            t_wrap_mode: WrapMode::ClampToEdge,
            r_wrap_mode: WrapMode::ClampToEdge,
            mip_count: 1,
            data: None,
        },
    )?))
}

impl BloomRenderTarget {
    pub fn new(
        state: &PipelineState,
        width: usize,
        height: usize,
    ) -> Result<Self, FrameworkError> {
        let threshold_texture = make_bloom_texture(state, width, height)?;

        let mut mip_chain = Vec::with_capacity(BLOOM_MIP_COUNT);
        let mut mip_width = width;
        let mut mip_height = height;
        for _ in 0..BLOOM_MIP_COUNT {
            mip_width = (mip_width / 2).max(1);
            mip_height = (mip_height / 2).max(1);
            mip_chain.push(BloomMip {
                texture: make_bloom_texture(state, mip_width, mip_height)?,
                size: Vector2::new(mip_width as f32, mip_height as f32),
            });
        }

        Ok(Self {
            threshold_texture,
            mip_chain,
            width,
            height,
        })
    }

    /// The final up-sampled result, mip 0 of the chain.
    pub fn bloomed_texture(&self) -> &Rc<GpuTexture> {
        &self.mip_chain[0].texture
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }
}

fn group_count(pixels: f32) -> u32 {
    (pixels / BLOOM_TILE_SIZE as f32).ceil() as u32
}

/// See module docs.
pub struct BloomPass {
    threshold_filter: GpuProgram,
    down_sample: GpuProgram,
    up_sample: GpuProgram,
}

impl BloomPass {
    pub fn new(state: &PipelineState) -> Result<Self, FrameworkError> {
        let threshold_filter = GpuProgram::from_compute_source(
            state,
            "BloomThreshold",
            include_str!("shaders/bloom_threshold.comp"),
        )?;
        let down_sample = GpuProgram::from_compute_source(
            state,
            "BloomDownSample",
            include_str!("shaders/bloom_downsample.comp"),
        )?;
        let up_sample = GpuProgram::from_compute_source(
            state,
            "BloomUpSample",
            include_str!("shaders/bloom_upsample.comp"),
        )?;

        down_sample.set_i32("currentMip", 0);
        up_sample.set_i32("currentMip", 0);

        Ok(Self {
            threshold_filter,
            down_sample,
            up_sample,
        })
    }

    /// Runs the whole chain over the given HDR frame.
    pub fn compute(
        &self,
        state: &PipelineState,
        hdr_frame: &GpuTexture,
        target: &BloomRenderTarget,
    ) {
        self.threshold(state, hdr_frame, target);
        self.down_sampling(state, target);
        self.up_sampling(state, target);
    }

    fn threshold(&self, state: &PipelineState, hdr_frame: &GpuTexture, target: &BloomRenderTarget) {
        self.threshold_filter
            .bind_image(0, hdr_frame, 0, false, 0, ImageAccess::Read);
        self.threshold_filter.bind_image(
            1,
            &target.threshold_texture,
            0,
            false,
            0,
            ImageAccess::Write,
        );
        self.threshold_filter.dispatch_compute(
            group_count(target.width as f32),
            group_count(target.height as f32),
            1,
        );
        state.memory_barrier();
    }

    fn down_sampling(&self, state: &PipelineState, target: &BloomRenderTarget) {
        let mut source = &target.threshold_texture;
        for mip in target.mip_chain.iter() {
            source.bind(state, 0);
            self.down_sample
                .bind_image(1, &mip.texture, 0, false, 0, ImageAccess::ReadWrite);
            self.down_sample.set_vector2(
                "uTexelSize",
                &Vector2::new(1.0 / mip.size.x, 1.0 / mip.size.y),
            );
            self.down_sample
                .dispatch_compute(group_count(mip.size.x), group_count(mip.size.y), 1);
            state.memory_barrier();

            source = &mip.texture;
        }
    }

    fn up_sampling(&self, state: &PipelineState, target: &BloomRenderTarget) {
        self.up_sample.set_f32("bloomIntensity", 1.0);

        for i in (1..target.mip_chain.len()).rev() {
            let mip = &target.mip_chain[i];
            let next_mip = &target.mip_chain[i - 1];

            mip.texture.bind(state, 0);
            self.up_sample
                .bind_image(1, &next_mip.texture, 0, false, 0, ImageAccess::ReadWrite);
            self.up_sample.set_vector2(
                "uTexelSize",
                &Vector2::new(1.0 / next_mip.size.x, 1.0 / next_mip.size.y),
            );
            self.up_sample.dispatch_compute(
                group_count(next_mip.size.x),
                group_count(next_mip.size.y),
                1,
            );
            state.memory_barrier();
        }
    }
}

#[cfg(test)]
mod test {
    use super::group_count;
    use crate::settings::BLOOM_TILE_SIZE;

    #[test]
    fn group_count_covers_every_pixel() {
        assert_eq!(group_count(8.0), 1);
        assert_eq!(group_count(9.0), 2);
        assert_eq!(group_count(1280.0), 1280 / BLOOM_TILE_SIZE);
        assert_eq!(group_count(1.0), 1);
    }
}
