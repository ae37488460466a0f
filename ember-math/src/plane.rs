use nalgebra::Vector3;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Plane {
    pub normal: Vector3<f32>,
    pub d: f32,
}

impl Default for Plane {
    #[inline]
    fn default() -> Self {
        Plane {
            normal: Vector3::new(0.0, 1.0, 0.0),
            d: 0.0,
        }
    }
}

impl Plane {
    /// Creates a plane from a point and a normal vector at that point.
    /// May fail if the normal is a degenerated vector.
    #[inline]
    pub fn from_normal_and_point(normal: &Vector3<f32>, point: &Vector3<f32>) -> Option<Self> {
        normal
            .try_normalize(f32::EPSILON)
            .map(|normalized_normal| Self {
                normal: normalized_normal,
                d: -point.dot(&normalized_normal),
            })
    }

    /// Signed distance from the point to the plane; positive on the side the
    /// normal points to.
    #[inline]
    pub fn dot(&self, point: &Vector3<f32>) -> f32 {
        self.normal.dot(point) + self.d
    }

    #[inline]
    pub fn distance(&self, point: &Vector3<f32>) -> f32 {
        self.dot(point).abs()
    }
}

#[cfg(test)]
mod test {
    use super::Plane;
    use nalgebra::Vector3;

    #[test]
    fn plane_from_normal_and_point() {
        let plane = Plane::from_normal_and_point(
            &Vector3::new(0.0, 10.0, 0.0),
            &Vector3::new(0.0, 3.0, 0.0),
        )
        .unwrap();
        assert_eq!(plane.normal, Vector3::new(0.0, 1.0, 0.0));
        assert_eq!(plane.d, -3.0);

        // Degenerated normal case.
        assert!(Plane::from_normal_and_point(
            &Vector3::new(0.0, 0.0, 0.0),
            &Vector3::new(0.0, 0.0, 0.0),
        )
        .is_none());
    }

    #[test]
    fn plane_signed_distance() {
        let plane = Plane::from_normal_and_point(
            &Vector3::new(0.0, 0.0, 1.0),
            &Vector3::new(0.0, 0.0, 0.0),
        )
        .unwrap();
        assert_eq!(plane.dot(&Vector3::new(0.0, 0.0, 2.0)), 2.0);
        assert_eq!(plane.dot(&Vector3::new(0.0, 0.0, -2.0)), -2.0);
        assert_eq!(plane.distance(&Vector3::new(1.0, 1.0, -2.0)), 2.0);
    }
}
