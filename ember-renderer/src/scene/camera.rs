//! Camera: a position with an orthonormal basis and a projection. Shadow
//! passes reuse the same type for their light cameras, with the orthographic
//! box set from the fitted cascade bounds.

use ember_math::frustum::Frustum;
use nalgebra::{Matrix4, Point3, Vector2, Vector3};

/// See module docs.
#[derive(Clone, Debug, PartialEq)]
pub struct Camera {
    pub position: Vector3<f32>,
    pub front: Vector3<f32>,
    pub up: Vector3<f32>,
    pub right: Vector3<f32>,
    /// Vertical field of view in radians. Ignored by orthographic cameras.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub is_orthographic: bool,
    /// `(left, right)` of the orthographic box.
    pub left_right: Vector2<f32>,
    /// `(bottom, top)` of the orthographic box.
    pub bottom_top: Vector2<f32>,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vector3::zeros(),
            front: -Vector3::z(),
            up: Vector3::y(),
            right: Vector3::x(),
            fov: 60.0f32.to_radians(),
            near: 0.1,
            far: 1000.0,
            is_orthographic: false,
            left_right: Vector2::new(-10.0, 10.0),
            bottom_top: Vector2::new(-10.0, 10.0),
        }
    }
}

impl Camera {
    /// A camera at `position` looking at `target`. The right vector is
    /// derived from the front/up pair.
    pub fn look_at(position: Vector3<f32>, target: Vector3<f32>, up: Vector3<f32>) -> Self {
        let front = (target - position)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(|| -Vector3::z());
        let right = front
            .cross(&up)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vector3::x);
        let up = right.cross(&front);
        Self {
            position,
            front,
            up,
            right,
            ..Default::default()
        }
    }

    /// View matrix: look-at from the position along the front vector.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(
            &Point3::from(self.position),
            &Point3::from(self.position + self.front),
            &self.up,
        )
    }

    /// Projection matrix for a viewport of the given pixel size.
    pub fn projection_matrix(&self, viewport_size: Vector2<f32>) -> Matrix4<f32> {
        if self.is_orthographic {
            Matrix4::new_orthographic(
                self.left_right.x,
                self.left_right.y,
                self.bottom_top.x,
                self.bottom_top.y,
                self.near,
                self.far,
            )
        } else {
            let aspect = if viewport_size.y > 0.0 {
                viewport_size.x / viewport_size.y
            } else {
                1.0
            };
            Matrix4::new_perspective(aspect, self.fov, self.near, self.far)
        }
    }

    /// View-projection matrix for a viewport of the given pixel size.
    pub fn view_projection_matrix(&self, viewport_size: Vector2<f32>) -> Matrix4<f32> {
        self.projection_matrix(viewport_size) * self.view_matrix()
    }

    /// The culling frustum; falls back to the default frustum when the basis
    /// is degenerate.
    pub fn frustum(&self, aspect: f32) -> Frustum {
        if self.is_orthographic {
            Frustum::from_orthographic(
                self.position,
                self.front,
                self.right,
                self.up,
                aspect,
                self.near,
                self.far,
            )
        } else {
            Frustum::from_perspective(
                self.position,
                self.front,
                self.right,
                self.up,
                self.fov,
                aspect,
                self.near,
                self.far,
            )
        }
        .unwrap_or_default()
    }
}

#[cfg(test)]
mod test {
    use super::Camera;
    use nalgebra::{Point3, Vector2, Vector3, Vector4};

    #[test]
    fn camera_look_at_builds_orthonormal_basis() {
        let camera = Camera::look_at(
            Vector3::new(0.0, 5.0, 5.0),
            Vector3::zeros(),
            Vector3::y(),
        );
        assert!((camera.front.norm() - 1.0).abs() < 1e-5);
        assert!(camera.front.dot(&camera.right).abs() < 1e-5);
        assert!(camera.front.dot(&camera.up).abs() < 1e-5);
        assert!(camera.right.dot(&camera.up).abs() < 1e-5);
    }

    #[test]
    fn camera_view_matrix_moves_world_into_eye_space() {
        let camera = Camera::look_at(
            Vector3::new(0.0, 0.0, 3.0),
            Vector3::zeros(),
            Vector3::y(),
        );
        let view = camera.view_matrix();
        let origin = view.transform_point(&Point3::new(0.0, 0.0, 0.0));
        // The origin sits three units in front of the camera (negative Z).
        assert!((origin.z + 3.0).abs() < 1e-5);
    }

    #[test]
    fn camera_perspective_projects_inside_ndc() {
        let camera = Camera::look_at(
            Vector3::new(0.0, 0.0, 3.0),
            Vector3::zeros(),
            Vector3::y(),
        );
        let vp = camera.view_projection_matrix(Vector2::new(800.0, 600.0));
        let clip = vp * Vector4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip / clip.w;
        assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0 && ndc.z.abs() <= 1.0);
    }

    #[test]
    fn camera_orthographic_box() {
        let camera = Camera {
            is_orthographic: true,
            left_right: Vector2::new(-2.0, 2.0),
            bottom_top: Vector2::new(-1.0, 1.0),
            near: 0.1,
            far: 10.0,
            ..Default::default()
        };
        let projection = camera.projection_matrix(Vector2::new(100.0, 100.0));
        let corner = projection * Vector4::new(2.0, 1.0, -10.0, 1.0);
        assert!((corner.x - 1.0).abs() < 1e-5);
        assert!((corner.y - 1.0).abs() < 1e-5);
    }
}
