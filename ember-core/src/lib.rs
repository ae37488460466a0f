//! Shared core for the Ember rendering engine: logging, colors, the
//! generational object pool and a few byte-level helpers used by the
//! GPU upload paths.

pub use lazy_static;
pub use nalgebra as algebra;
pub use parking_lot;

pub mod color;
pub mod log;
pub mod pool;

use bytemuck::Pod;

/// "Transmutes" an array of any sized type to a slice of bytes.
pub fn array_as_u8_slice<T: Sized + Pod>(v: &[T]) -> &'_ [u8] {
    // SAFETY: It is safe to reinterpret data to read it.
    unsafe { std::slice::from_raw_parts(v.as_ptr() as *const u8, std::mem::size_of_val(v)) }
}

/// "Transmutes" a value of any sized type to a slice of bytes.
pub fn value_as_u8_slice<T: Sized + Pod>(v: &T) -> &'_ [u8] {
    // SAFETY: It is safe to reinterpret data to read it.
    unsafe { std::slice::from_raw_parts(v as *const T as *const u8, std::mem::size_of::<T>()) }
}

/// "Transmutes" an array of any sized type to a slice of some other type.
pub fn transmute_slice<T: Sized, U: Sized>(v: &[T]) -> &'_ [U] {
    // SAFETY: It is safe to reinterpret data to read it.
    unsafe {
        std::slice::from_raw_parts(
            v.as_ptr() as *const U,
            std::mem::size_of_val(v) / std::mem::size_of::<U>(),
        )
    }
}
