//! The rendering core of the Ember engine: a deferred PBR pipeline with
//! cascaded/spot/point shadow maps, image-based lighting from an
//! equirectangular HDR skybox, compute-shader bloom and ACES tone mapping,
//! driven per viewport over an octree-culled scene graph.
//!
//! The crate is layered bottom-up:
//!
//! * [`ember_graphics`] (re-exported as [`graphics`]) is the single GPU
//!   facade; nothing else touches GL.
//! * [`resource`] holds geometry, meshes, textures and shader programs.
//! * [`scene`] is the entity graph with cameras, lights and materials.
//! * [`renderer`] orchestrates the per-frame passes.

pub use ember_core as core;
pub use ember_graphics as graphics;
pub use ember_math as math;

pub mod renderer;
pub mod resource;
pub mod scene;
pub mod settings;
