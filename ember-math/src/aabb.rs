use crate::Matrix4Ext;
use nalgebra::{Matrix4, Vector3};

/// An axis-aligned bounding box stored as min/max corners. The default box
/// is inverted (min = +MAX, max = -MAX) so that adding the first point
/// collapses it onto that point.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AxisAlignedBoundingBox {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl Default for AxisAlignedBoundingBox {
    #[inline]
    fn default() -> Self {
        Self {
            min: Vector3::new(f32::MAX, f32::MAX, f32::MAX),
            max: Vector3::new(-f32::MAX, -f32::MAX, -f32::MAX),
        }
    }
}

impl AxisAlignedBoundingBox {
    /// A box centered at the origin with a side length of one.
    #[inline]
    pub const fn unit() -> Self {
        Self::from_min_max(Vector3::new(-0.5, -0.5, -0.5), Vector3::new(0.5, 0.5, 0.5))
    }

    #[inline]
    pub const fn from_min_max(min: Vector3<f32>, max: Vector3<f32>) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn from_radius(radius: f32) -> Self {
        Self {
            min: Vector3::new(-radius, -radius, -radius),
            max: Vector3::new(radius, radius, radius),
        }
    }

    /// Builds a box from a center point and half-extents on each axis.
    #[inline]
    pub fn from_center_half_extents(center: Vector3<f32>, half_extents: Vector3<f32>) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    #[inline]
    pub fn from_points(points: &[Vector3<f32>]) -> Self {
        let mut aabb = AxisAlignedBoundingBox::default();
        for pt in points {
            aabb.add_point(*pt);
        }
        aabb
    }

    /// Grows the box to enclose the given point.
    #[inline]
    pub fn add_point(&mut self, a: Vector3<f32>) {
        if a.x < self.min.x {
            self.min.x = a.x;
        }
        if a.y < self.min.y {
            self.min.y = a.y;
        }
        if a.z < self.min.z {
            self.min.z = a.z;
        }

        if a.x > self.max.x {
            self.max.x = a.x;
        }
        if a.y > self.max.y {
            self.max.y = a.y;
        }
        if a.z > self.max.z {
            self.max.z = a.z;
        }
    }

    /// Grows the box to enclose another box.
    #[inline]
    pub fn add_box(&mut self, other: Self) {
        self.add_point(other.min);
        self.add_point(other.max);
    }

    #[inline]
    pub fn corners(&self) -> [Vector3<f32>; 8] {
        [
            Vector3::new(self.min.x, self.min.y, self.min.z),
            Vector3::new(self.min.x, self.min.y, self.max.z),
            Vector3::new(self.max.x, self.min.y, self.max.z),
            Vector3::new(self.max.x, self.min.y, self.min.z),
            Vector3::new(self.min.x, self.max.y, self.min.z),
            Vector3::new(self.min.x, self.max.y, self.max.z),
            Vector3::new(self.max.x, self.max.y, self.max.z),
            Vector3::new(self.max.x, self.max.y, self.min.z),
        ]
    }

    #[inline]
    pub fn center(&self) -> Vector3<f32> {
        (self.max + self.min).scale(0.5)
    }

    #[inline]
    pub fn half_extents(&self) -> Vector3<f32> {
        (self.max - self.min).scale(0.5)
    }

    #[inline]
    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    #[inline]
    pub fn invalidate(&mut self) {
        *self = Default::default();
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.max.x >= self.min.x && self.max.y >= self.min.y && self.max.z >= self.min.z
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.max == self.min
    }

    #[inline]
    pub fn is_contains_point(&self, point: Vector3<f32>) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Checks whether the other box lies entirely inside this one. Containment
    /// implies intersection.
    #[inline]
    pub fn is_contains_aabb(&self, other: &Self) -> bool {
        self.min.x <= other.min.x
            && self.max.x >= other.max.x
            && self.min.y <= other.min.y
            && self.max.y >= other.max.y
            && self.min.z <= other.min.z
            && self.max.z >= other.max.z
    }

    #[inline]
    pub fn is_intersects_aabb(&self, other: &Self) -> bool {
        let self_center = self.center();
        let self_half_extents = self.half_extents();

        let other_half_extents = other.half_extents();
        let other_center = other.center();

        if (self_center.x - other_center.x).abs() > (self_half_extents.x + other_half_extents.x) {
            return false;
        }

        if (self_center.y - other_center.y).abs() > (self_half_extents.y + other_half_extents.y) {
            return false;
        }

        if (self_center.z - other_center.z).abs() > (self_half_extents.z + other_half_extents.z) {
            return false;
        }

        true
    }

    /// Transforms the box by an affine matrix, returning the axis-aligned
    /// enclosure of the transformed (oriented) box: each world half-extent is
    /// the sum of the absolute projections of the three scaled basis columns.
    ///
    /// # References
    ///
    /// Transforming Axis-Aligned Bounding Boxes by Jim Arvo, "Graphics Gems",
    /// Academic Press, 1990.
    #[inline]
    #[must_use]
    pub fn transform(&self, m: &Matrix4<f32>) -> AxisAlignedBoundingBox {
        let basis = m.basis();

        let mut transformed = Self {
            min: m.position(),
            max: m.position(),
        };

        for i in 0..3 {
            for j in 0..3 {
                let a = basis[(i, j)] * self.min[j];
                let b = basis[(i, j)] * self.max[j];
                if a < b {
                    transformed.min[i] += a;
                    transformed.max[i] += b;
                } else {
                    transformed.min[i] += b;
                    transformed.max[i] += a;
                }
            }
        }

        transformed
    }
}

#[cfg(test)]
mod test {
    use super::AxisAlignedBoundingBox;
    use nalgebra::{Matrix4, Vector3};

    #[test]
    fn test_aabb_transform_identity() {
        let aabb = AxisAlignedBoundingBox::from_min_max(
            Vector3::new(-1.0, -2.0, -3.0),
            Vector3::new(4.0, 5.0, 6.0),
        );
        let transformed = aabb.transform(&Matrix4::identity());
        assert_eq!(transformed, aabb);
    }

    #[test]
    fn test_aabb_transform_translation_scale() {
        let aabb = AxisAlignedBoundingBox::from_min_max(
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 1.0, 1.0),
        );

        let transform = Matrix4::new_translation(&Vector3::new(1.0, 1.0, 1.0))
            * Matrix4::new_nonuniform_scaling(&Vector3::new(2.0, 2.0, 2.0));

        let transformed = aabb.transform(&transform);

        assert_eq!(transformed.min, Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(transformed.max, Vector3::new(3.0, 3.0, 3.0));
    }

    #[test]
    fn test_aabb_transform_rotation_encloses() {
        // A unit box rotated 45 degrees about Y must grow to sqrt(2) on X/Z.
        let aabb = AxisAlignedBoundingBox::unit();
        let transform =
            Matrix4::from_euler_angles(0.0, std::f32::consts::FRAC_PI_4, 0.0);
        let transformed = aabb.transform(&transform);
        let expected = std::f32::consts::SQRT_2 * 0.5;
        assert!((transformed.max.x - expected).abs() < 1e-5);
        assert!((transformed.max.z - expected).abs() < 1e-5);
        assert!((transformed.max.y - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_aabb_contains_implies_intersects() {
        let outer = AxisAlignedBoundingBox::from_radius(2.0);
        let inner = AxisAlignedBoundingBox::from_radius(1.0);
        assert!(outer.is_contains_aabb(&inner));
        assert!(outer.is_intersects_aabb(&inner));
        assert!(!inner.is_contains_aabb(&outer));
        assert!(inner.is_intersects_aabb(&outer));
    }

    #[test]
    fn test_aabb_intersects_symmetric() {
        let mut a = AxisAlignedBoundingBox::unit();
        let b = AxisAlignedBoundingBox::unit();
        assert!(a.is_intersects_aabb(&b));
        assert!(b.is_intersects_aabb(&a));

        a.min += Vector3::new(10.0, 0.0, 0.0);
        a.max += Vector3::new(10.0, 0.0, 0.0);
        assert!(!a.is_intersects_aabb(&b));
        assert!(!b.is_intersects_aabb(&a));
    }

    #[test]
    fn test_aabb_add_point() {
        let mut aabb = AxisAlignedBoundingBox::default();
        assert!(!aabb.is_valid());
        aabb.add_point(Vector3::new(-1.0, -1.0, -1.0));
        aabb.add_point(Vector3::new(1.0, 1.0, 1.0));
        assert!(aabb.is_valid());
        assert_eq!(aabb.center(), Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(aabb.half_extents(), Vector3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_aabb_from_center_half_extents() {
        let aabb = AxisAlignedBoundingBox::from_center_half_extents(
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::new(0.5, 0.5, 0.5),
        );
        assert_eq!(aabb.min, Vector3::new(0.5, 1.5, 2.5));
        assert_eq!(aabb.max, Vector3::new(1.5, 2.5, 3.5));
    }
}
