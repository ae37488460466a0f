//! Render resources: geometry, meshes with skeletons, textures and shader
//! programs with their recorded pipeline state.

pub mod mesh;
pub mod model;
pub mod shader;
pub mod texture;
