//! Math utilities for the Ember rendering engine: axis-aligned bounding
//! boxes, planes, camera frusta and the spatial octree used for culling.

pub mod aabb;
pub mod frustum;
pub mod octree;
pub mod plane;

use nalgebra::{Matrix3, Matrix4, Scalar, Vector2, Vector3};
use num_traits::NumAssign;

/// A 2D rectangle with position and size. Used for viewports and scissor
/// boxes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Rect<T>
where
    T: Scalar,
{
    /// Position of the rectangle (top-left corner).
    pub position: Vector2<T>,
    /// Size of the rectangle.
    pub size: Vector2<T>,
}

impl<T> Rect<T>
where
    T: Scalar + NumAssign + Copy,
{
    /// Creates a new rectangle.
    #[inline]
    pub fn new(x: T, y: T, w: T, h: T) -> Self {
        Self {
            position: Vector2::new(x, y),
            size: Vector2::new(w, h),
        }
    }

    /// X coordinate of the origin.
    #[inline]
    pub fn x(&self) -> T {
        self.position.x
    }

    /// Y coordinate of the origin.
    #[inline]
    pub fn y(&self) -> T {
        self.position.y
    }

    /// Width of the rectangle.
    #[inline]
    pub fn w(&self) -> T {
        self.size.x
    }

    /// Height of the rectangle.
    #[inline]
    pub fn h(&self) -> T {
        self.size.y
    }
}

/// Convenience accessors for the basis vectors and position stored in a
/// 4x4 column-major transform.
pub trait Matrix4Ext<T: Scalar> {
    fn side(&self) -> Vector3<T>;
    fn up(&self) -> Vector3<T>;
    fn look(&self) -> Vector3<T>;
    fn position(&self) -> Vector3<T>;
    fn basis(&self) -> Matrix3<T>;
}

impl<T: Scalar + Default + Copy + Clone> Matrix4Ext<T> for Matrix4<T> {
    #[inline]
    fn side(&self) -> Vector3<T> {
        Vector3::new(self[0], self[1], self[2])
    }

    #[inline]
    fn up(&self) -> Vector3<T> {
        Vector3::new(self[4], self[5], self[6])
    }

    #[inline]
    fn look(&self) -> Vector3<T> {
        Vector3::new(self[8], self[9], self[10])
    }

    #[inline]
    fn position(&self) -> Vector3<T> {
        Vector3::new(self[12], self[13], self[14])
    }

    #[inline]
    fn basis(&self) -> Matrix3<T> {
        self.fixed_resize::<3, 3>(T::default())
    }
}
