//! Shadow map renderers: cascaded maps for the directional light, a 2D
//! array for spot lights and a cube array storing radial distance for point
//! lights.

pub mod csm;
pub mod point;
pub mod spot;

use crate::{
    renderer::{meshes_drawer::MeshesDrawer, ubo::UniformBlocks},
    resource::shader::RenderShader,
    scene::{camera::Camera, Scene},
};
use ember_graphics::{gpu_texture::CubeMapFace, state::PipelineState};
use nalgebra::{Vector2, Vector3};

/// Everything a shadow pass needs from the renderer.
pub(crate) struct ShadowRenderContext<'a> {
    pub state: &'a PipelineState,
    pub scene: &'a Scene,
    pub drawer: &'a MeshesDrawer,
    pub ubos: &'a UniformBlocks,
    pub depth_static: &'a RenderShader,
    pub depth_skinned: &'a RenderShader,
    pub depth_point_static: &'a RenderShader,
    pub depth_point_skinned: &'a RenderShader,
    pub viewport_camera: &'a Camera,
    pub viewport_size: Vector2<f32>,
}

/// Up vector for a light camera looking along `direction`: world Y, or
/// world Z when the direction is (nearly) vertical.
pub(crate) fn light_camera_up(direction: Vector3<f32>) -> Vector3<f32> {
    if direction.dot(&Vector3::y()).abs() > 0.99 {
        Vector3::z()
    } else {
        Vector3::y()
    }
}

/// A cube map face together with the camera basis used to render into it.
/// The +Y face uses up = +Z, -Y uses up = -Z, the four side faces use
/// up = -Y, per the GL cube map convention.
pub struct CubeMapFaceDescriptor {
    pub face: CubeMapFace,
    pub look: Vector3<f32>,
    pub up: Vector3<f32>,
}

impl CubeMapFaceDescriptor {
    pub fn cube_faces() -> [Self; 6] {
        [
            CubeMapFaceDescriptor {
                face: CubeMapFace::PositiveX,
                look: Vector3::new(1.0, 0.0, 0.0),
                up: Vector3::new(0.0, -1.0, 0.0),
            },
            CubeMapFaceDescriptor {
                face: CubeMapFace::NegativeX,
                look: Vector3::new(-1.0, 0.0, 0.0),
                up: Vector3::new(0.0, -1.0, 0.0),
            },
            CubeMapFaceDescriptor {
                face: CubeMapFace::PositiveY,
                look: Vector3::new(0.0, 1.0, 0.0),
                up: Vector3::new(0.0, 0.0, 1.0),
            },
            CubeMapFaceDescriptor {
                face: CubeMapFace::NegativeY,
                look: Vector3::new(0.0, -1.0, 0.0),
                up: Vector3::new(0.0, 0.0, -1.0),
            },
            CubeMapFaceDescriptor {
                face: CubeMapFace::PositiveZ,
                look: Vector3::new(0.0, 0.0, 1.0),
                up: Vector3::new(0.0, -1.0, 0.0),
            },
            CubeMapFaceDescriptor {
                face: CubeMapFace::NegativeZ,
                look: Vector3::new(0.0, 0.0, -1.0),
                up: Vector3::new(0.0, -1.0, 0.0),
            },
        ]
    }
}

#[cfg(test)]
mod test {
    use super::{light_camera_up, CubeMapFaceDescriptor};
    use nalgebra::Vector3;

    #[test]
    fn light_up_vector_avoids_degenerate_basis() {
        assert_eq!(
            light_camera_up(Vector3::new(0.0, -1.0, 0.0)),
            Vector3::z()
        );
        assert_eq!(
            light_camera_up(Vector3::new(1.0, 0.0, 0.0)),
            Vector3::y()
        );
    }

    #[test]
    fn cube_faces_bases_are_orthogonal() {
        for face in CubeMapFaceDescriptor::cube_faces() {
            assert!(face.look.dot(&face.up).abs() < 1e-6);
            assert!((face.look.norm() - 1.0).abs() < 1e-6);
            assert!((face.up.norm() - 1.0).abs() < 1e-6);
        }
    }
}
