//! CPU-side BRDF lookup-table generation. The render loop derives the LUT
//! on the GPU (see the skybox parser); this module produces the same table
//! on the CPU, which is useful for offline baking and for validating the
//! split-sum integral without a GL context.

use bytemuck::{Pod, Zeroable};
use ember_graphics::{
    core::array_as_u8_slice,
    error::FrameworkError,
    gpu_texture::{
        GpuTexture, GpuTextureDescriptor, GpuTextureKind, MagnificationFilter,
        MinificationFilter, PixelKind, WrapMode,
    },
    state::PipelineState,
};
use half::f16;
use nalgebra::{Vector2, Vector3};

fn radical_inverse_vd_c(mut bits: u32) -> f32 {
    bits = bits.rotate_right(16);
    bits = ((bits & 0x55555555) << 1) | ((bits & 0xAAAAAAAA) >> 1);
    bits = ((bits & 0x33333333) << 2) | ((bits & 0xCCCCCCCC) >> 2);
    bits = ((bits & 0x0F0F0F0F) << 4) | ((bits & 0xF0F0F0F0) >> 4);
    bits = ((bits & 0x00FF00FF) << 8) | ((bits & 0xFF00FF00) >> 8);
    bits as f32 * 2.328_306_4e-10
}

fn hammersley(i: usize, n: usize) -> Vector2<f32> {
    Vector2::new(i as f32 / n as f32, radical_inverse_vd_c(i as u32))
}

fn importance_sample_ggx(x_i: Vector2<f32>, roughness: f32, n: Vector3<f32>) -> Vector3<f32> {
    let a = roughness * roughness;

    let phi = 2.0 * std::f32::consts::PI * x_i.x;
    let cos_theta = ((1.0 - x_i.y) / (1.0 + (a * a - 1.0) * x_i.y)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();

    // from spherical coordinates to cartesian coordinates
    let h = Vector3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta);

    // from tangent-space vector to world-space sample vector
    let up = if n.z.abs() < 0.999 {
        Vector3::new(0.0, 0.0, 1.0)
    } else {
        Vector3::new(1.0, 0.0, 0.0)
    };
    let tangent = up.cross(&n).normalize();
    let bitangent = n.cross(&tangent);

    (tangent * h.x + bitangent * h.y + n * h.z).normalize()
}

fn geometry_schlick_ggx(n_dot_v: f32, roughness: f32) -> f32 {
    let a = roughness;
    let k = (a * a) / 2.0;

    n_dot_v / (n_dot_v * (1.0 - k) + k)
}

fn geometry_smith(roughness: f32, n_dot_v: f32, n_dot_l: f32) -> f32 {
    geometry_schlick_ggx(n_dot_v, roughness) * geometry_schlick_ggx(n_dot_l, roughness)
}

fn integrate_brdf(n_dot_v: f32, roughness: f32, samples: usize) -> Vector2<f32> {
    let v = Vector3::new((1.0 - n_dot_v * n_dot_v).sqrt(), 0.0, n_dot_v);

    let mut a = 0.0;
    let mut b = 0.0;

    let n = Vector3::new(0.0, 0.0, 1.0);

    for i in 0..samples {
        let x_i = hammersley(i, samples);
        let h = importance_sample_ggx(x_i, roughness, n);
        let l = (2.0 * v.dot(&h) * h - v).normalize();

        let n_dot_l = l.z.max(0.0);
        let n_dot_h = h.z.max(0.0);
        let v_dot_h = v.dot(&h).max(0.0);
        let n_dot_v = n.dot(&v).max(0.0);

        if n_dot_l > 0.0 {
            let g = geometry_smith(roughness, n_dot_v, n_dot_l);

            let g_vis = (g * v_dot_h) / (n_dot_h * n_dot_v);
            let fc = (1.0 - v_dot_h).powf(5.0);

            a += (1.0 - fc) * g_vis;
            b += fc * g_vis;
        }
    }

    Vector2::new(a / samples as f32, b / samples as f32)
}

/// One RG16F texel of the lookup table.
#[derive(Default, Copy, Clone, Pod, Zeroable)]
#[repr(C)]
pub struct Pixel {
    pub x: f16,
    pub y: f16,
}

/// Integrates the split-sum table on the CPU: x = NdotV, y = roughness.
pub fn make_brdf_lut_image(size: usize, sample_count: usize) -> Vec<Pixel> {
    let mut pixels = vec![Pixel::default(); size * size];

    for y in 0..size {
        for x in 0..size {
            let n_dot_v = (x as f32 + 0.5) * (1.0 / size as f32);
            let roughness = (y as f32 + 0.5) * (1.0 / size as f32);
            let pair = integrate_brdf(n_dot_v, roughness, sample_count);
            let pixel = &mut pixels[y * size + x];
            pixel.x = f16::from_f32(pair.x);
            pixel.y = f16::from_f32(pair.y);
        }
    }

    pixels
}

/// Uploads a CPU-integrated lookup table as an RG16F texture.
pub fn generate_brdf_lut_texture(
    state: &PipelineState,
    size: usize,
    sample_count: usize,
) -> Result<GpuTexture, FrameworkError> {
    let pixels = make_brdf_lut_image(size, sample_count);
    GpuTexture::new(
        state,
        GpuTextureDescriptor {
            kind: GpuTextureKind::Rectangle {
                width: size,
                height: size,
            },
            pixel_kind: PixelKind::RG16F,
            min_filter: MinificationFilter::Linear,
            mag_filter: MagnificationFilter::Linear,
            s_wrap_mode: WrapMode::ClampToEdge,
            t_wrap_mode: WrapMode::ClampToEdge,
            r_wrap_mode: WrapMode::ClampToEdge,
            mip_count: 1,
            data: Some(array_as_u8_slice(&pixels)),
        },
    )
}

#[cfg(test)]
mod test {
    use super::{integrate_brdf, make_brdf_lut_image};

    #[test]
    fn brdf_integral_is_bounded() {
        for (n_dot_v, roughness) in [(0.1, 0.1), (0.5, 0.5), (0.9, 0.9), (0.99, 0.05)] {
            let pair = integrate_brdf(n_dot_v, roughness, 64);
            assert!(pair.x.is_finite() && pair.y.is_finite());
            assert!((0.0..=1.5).contains(&pair.x));
            assert!((0.0..=1.0).contains(&pair.y));
        }
    }

    #[test]
    fn brdf_lut_image_has_expected_size() {
        let pixels = make_brdf_lut_image(8, 16);
        assert_eq!(pixels.len(), 64);
        // Smooth surfaces at grazing angles keep a strong Fresnel term.
        assert!(pixels.iter().any(|p| p.x.to_f32() > 0.0));
    }
}
