use crate::{aabb::AxisAlignedBoundingBox, plane::Plane};
use nalgebra::Vector3;

/// A camera frustum as six planes with inward-facing normals. Built
/// geometrically from the camera basis: the near/far planes are offset along
/// the view direction, the side planes are spanned by cross products of the
/// corner rays with the basis vectors.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Frustum {
    /// 0 - left, 1 - right, 2 - top, 3 - bottom, 4 - far, 5 - near
    pub planes: [Plane; 6],
}

impl Default for Frustum {
    #[inline]
    fn default() -> Self {
        Self::from_perspective(
            Vector3::zeros(),
            -Vector3::z(),
            Vector3::x(),
            Vector3::y(),
            std::f32::consts::FRAC_PI_2,
            1.0,
            0.01,
            1024.0,
        )
        .unwrap()
    }
}

impl Frustum {
    pub const LEFT: usize = 0;
    pub const RIGHT: usize = 1;
    pub const TOP: usize = 2;
    pub const BOTTOM: usize = 3;
    pub const FAR: usize = 4;
    pub const NEAR: usize = 5;

    /// Builds the frustum of a perspective camera. `fov_y` is the vertical
    /// field of view in radians. Returns `None` when the basis is degenerate.
    #[inline]
    pub fn from_perspective(
        position: Vector3<f32>,
        front: Vector3<f32>,
        right: Vector3<f32>,
        up: Vector3<f32>,
        fov_y: f32,
        aspect: f32,
        z_near: f32,
        z_far: f32,
    ) -> Option<Self> {
        let half_v_side = z_far * (fov_y * 0.5).tan();
        Self::from_basis(position, front, right, up, half_v_side, aspect, z_near, z_far)
    }

    /// Builds the frustum of an orthographic camera. The half-height is
    /// derived from the full far distance.
    #[inline]
    pub fn from_orthographic(
        position: Vector3<f32>,
        front: Vector3<f32>,
        right: Vector3<f32>,
        up: Vector3<f32>,
        aspect: f32,
        z_near: f32,
        z_far: f32,
    ) -> Option<Self> {
        let half_v_side = z_far * 0.5;
        Self::from_basis(position, front, right, up, half_v_side, aspect, z_near, z_far)
    }

    fn from_basis(
        position: Vector3<f32>,
        front: Vector3<f32>,
        right: Vector3<f32>,
        up: Vector3<f32>,
        half_v_side: f32,
        aspect: f32,
        z_near: f32,
        z_far: f32,
    ) -> Option<Self> {
        let half_h_side = half_v_side * aspect;
        let front_mult_far = front.scale(z_far);

        let near = Plane::from_normal_and_point(&front, &(position + front.scale(z_near)))?;
        let far = Plane::from_normal_and_point(&(-front), &(position + front_mult_far))?;
        let right_plane = Plane::from_normal_and_point(
            &(front_mult_far - right.scale(half_h_side)).cross(&up),
            &position,
        )?;
        let left_plane = Plane::from_normal_and_point(
            &up.cross(&(front_mult_far + right.scale(half_h_side))),
            &position,
        )?;
        let top = Plane::from_normal_and_point(
            &right.cross(&(front_mult_far - up.scale(half_v_side))),
            &position,
        )?;
        let bottom = Plane::from_normal_and_point(
            &(front_mult_far + up.scale(half_v_side)).cross(&right),
            &position,
        )?;

        Some(Self {
            planes: [left_plane, right_plane, top, bottom, far, near],
        })
    }

    #[inline]
    pub fn planes(&self) -> &[Plane] {
        &self.planes
    }

    /// Positive-vertex test: for each plane, project the box half-extents
    /// onto the plane normal and reject once the whole box lies behind it.
    #[inline]
    pub fn is_on_frustum(&self, aabb: &AxisAlignedBoundingBox) -> bool {
        let center = aabb.center();
        let extents = aabb.half_extents();

        for plane in self.planes.iter() {
            let r = extents.x * plane.normal.x.abs()
                + extents.y * plane.normal.y.abs()
                + extents.z * plane.normal.z.abs();

            if plane.dot(&center) < -r {
                return false;
            }
        }

        true
    }

    #[inline]
    pub fn is_contains_point(&self, pt: Vector3<f32>) -> bool {
        for plane in self.planes.iter() {
            if plane.dot(&pt) < 0.0 {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod test {
    use super::Frustum;
    use crate::aabb::AxisAlignedBoundingBox;
    use nalgebra::Vector3;

    fn look_down_negative_z() -> Frustum {
        Frustum::from_perspective(
            Vector3::zeros(),
            -Vector3::z(),
            Vector3::x(),
            Vector3::y(),
            std::f32::consts::FRAC_PI_2,
            1.0,
            0.1,
            100.0,
        )
        .unwrap()
    }

    #[test]
    fn frustum_accepts_box_in_view() {
        let frustum = look_down_negative_z();
        let aabb = AxisAlignedBoundingBox::from_center_half_extents(
            Vector3::new(0.0, 0.0, -10.0),
            Vector3::new(0.5, 0.5, 0.5),
        );
        assert!(frustum.is_on_frustum(&aabb));
    }

    #[test]
    fn frustum_rejects_box_behind_camera() {
        let frustum = look_down_negative_z();
        let aabb = AxisAlignedBoundingBox::from_center_half_extents(
            Vector3::new(0.0, 0.0, 10.0),
            Vector3::new(0.5, 0.5, 0.5),
        );
        assert!(!frustum.is_on_frustum(&aabb));
    }

    #[test]
    fn frustum_rejects_box_beyond_far() {
        let frustum = look_down_negative_z();
        let aabb = AxisAlignedBoundingBox::from_center_half_extents(
            Vector3::new(0.0, 0.0, -200.0),
            Vector3::new(0.5, 0.5, 0.5),
        );
        assert!(!frustum.is_on_frustum(&aabb));
    }

    #[test]
    fn frustum_rejects_box_off_to_the_side() {
        let frustum = look_down_negative_z();
        let aabb = AxisAlignedBoundingBox::from_center_half_extents(
            Vector3::new(100.0, 0.0, -10.0),
            Vector3::new(0.5, 0.5, 0.5),
        );
        assert!(!frustum.is_on_frustum(&aabb));
    }

    #[test]
    fn frustum_accepts_straddling_box() {
        let frustum = look_down_negative_z();
        // The box center sits outside the left plane, but its extents reach in.
        let aabb = AxisAlignedBoundingBox::from_center_half_extents(
            Vector3::new(-11.0, 0.0, -10.0),
            Vector3::new(2.0, 2.0, 2.0),
        );
        assert!(frustum.is_on_frustum(&aabb));
    }

    #[test]
    fn frustum_contains_point_inside_cone() {
        let frustum = look_down_negative_z();
        assert!(frustum.is_contains_point(Vector3::new(0.0, 0.0, -1.0)));
        assert!(!frustum.is_contains_point(Vector3::new(0.0, 0.0, 1.0)));
    }

    #[test]
    fn frustum_orthographic_accepts_in_box() {
        let frustum = Frustum::from_orthographic(
            Vector3::zeros(),
            -Vector3::z(),
            Vector3::x(),
            Vector3::y(),
            1.0,
            0.1,
            100.0,
        )
        .unwrap();
        let aabb = AxisAlignedBoundingBox::from_center_half_extents(
            Vector3::new(0.0, 0.0, -50.0),
            Vector3::new(1.0, 1.0, 1.0),
        );
        assert!(frustum.is_on_frustum(&aabb));
    }

    #[test]
    fn frustum_degenerate_basis_returns_none() {
        assert!(Frustum::from_perspective(
            Vector3::zeros(),
            Vector3::zeros(),
            Vector3::zeros(),
            Vector3::zeros(),
            1.0,
            1.0,
            0.1,
            100.0,
        )
        .is_none());
    }
}
