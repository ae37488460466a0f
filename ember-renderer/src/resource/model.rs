//! GPU-side mesh geometry. A [`Model`] owns its vertex/index buffers and a
//! local-space bounding box; once uploaded it is immutable.

use crate::settings::MAX_BONES;
use bytemuck::{Pod, Zeroable};
use ember_graphics::{
    core::array_as_u8_slice,
    error::FrameworkError,
    geometry_buffer::{
        AttributeDefinition, AttributeKind, GeometryBuffer, GeometryBufferDescriptor,
        GeometryBufferKind,
    },
    state::PipelineState,
    ElementKind,
};
use ember_math::aabb::AxisAlignedBoundingBox;
use nalgebra::{Vector2, Vector3};

/// A single vertex. Bone indices use `-1` as the "unused slot" sentinel.
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub tangent: [f32; 3],
    pub bitangent: [f32; 3],
    pub bone_indices: [i32; 4],
    pub bone_weights: [f32; 4],
}

impl Default for Vertex {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            normal: [0.0, 1.0, 0.0],
            uv: [0.0; 2],
            tangent: [1.0, 0.0, 0.0],
            bitangent: [0.0, 0.0, 1.0],
            bone_indices: [-1; 4],
            bone_weights: [0.0; 4],
        }
    }
}

impl Vertex {
    /// A plain unskinned vertex.
    pub fn simple(position: Vector3<f32>, normal: Vector3<f32>, uv: Vector2<f32>) -> Self {
        Self {
            position: position.into(),
            normal: normal.into(),
            uv: uv.into(),
            ..Default::default()
        }
    }

    fn layout() -> [AttributeDefinition; 7] {
        [
            AttributeDefinition {
                location: 0,
                kind: AttributeKind::Float3,
                normalized: false,
            },
            AttributeDefinition {
                location: 1,
                kind: AttributeKind::Float3,
                normalized: false,
            },
            AttributeDefinition {
                location: 2,
                kind: AttributeKind::Float2,
                normalized: false,
            },
            AttributeDefinition {
                location: 3,
                kind: AttributeKind::Float3,
                normalized: false,
            },
            AttributeDefinition {
                location: 4,
                kind: AttributeKind::Float3,
                normalized: false,
            },
            AttributeDefinition {
                location: 5,
                kind: AttributeKind::Int4,
                normalized: false,
            },
            AttributeDefinition {
                location: 6,
                kind: AttributeKind::Float4,
                normalized: false,
            },
        ]
    }

    /// Checks that every referenced bone index fits the palette.
    pub fn is_valid_for_palette(&self) -> bool {
        self.bone_indices
            .iter()
            .all(|i| *i < 0 || (*i as usize) < MAX_BONES)
    }
}

/// See module docs.
pub struct Model {
    geometry: GeometryBuffer,
    local_aabb: AxisAlignedBoundingBox,
}

impl Model {
    /// Uploads the given vertices and triangle indices to the GPU. Must run
    /// on the thread that owns the GL context.
    pub fn new(
        state: &PipelineState,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<Self, FrameworkError> {
        let mut local_aabb = AxisAlignedBoundingBox::default();
        for vertex in vertices {
            local_aabb.add_point(Vector3::from(vertex.position));
        }

        let geometry = GeometryBuffer::new(
            state,
            GeometryBufferDescriptor {
                usage: GeometryBufferKind::StaticDraw,
                attributes: &Vertex::layout(),
                vertex_data: array_as_u8_slice(vertices),
                vertex_size: size_of::<Vertex>(),
                indices,
                element_kind: ElementKind::Triangle,
            },
        )?;

        Ok(Self {
            geometry,
            local_aabb,
        })
    }

    /// Local-space bounding box of the geometry.
    pub fn local_aabb(&self) -> AxisAlignedBoundingBox {
        self.local_aabb
    }

    pub fn geometry(&self) -> &GeometryBuffer {
        &self.geometry
    }

    /// A unit cube centered at the origin.
    pub fn cube(state: &PipelineState) -> Result<Self, FrameworkError> {
        let (vertices, indices) = make_cube_data();
        Self::new(state, &vertices, &indices)
    }

    /// A unit quad in the XY plane, used by the full-screen passes.
    pub fn quad(state: &PipelineState) -> Result<Self, FrameworkError> {
        let vertices = [
            Vertex::simple(
                Vector3::new(-1.0, -1.0, 0.0),
                Vector3::z(),
                Vector2::new(0.0, 0.0),
            ),
            Vertex::simple(
                Vector3::new(1.0, -1.0, 0.0),
                Vector3::z(),
                Vector2::new(1.0, 0.0),
            ),
            Vertex::simple(
                Vector3::new(1.0, 1.0, 0.0),
                Vector3::z(),
                Vector2::new(1.0, 1.0),
            ),
            Vertex::simple(
                Vector3::new(-1.0, 1.0, 0.0),
                Vector3::z(),
                Vector2::new(0.0, 1.0),
            ),
        ];
        let indices = [0, 1, 2, 0, 2, 3];
        Self::new(state, &vertices, &indices)
    }
}

fn make_cube_data() -> (Vec<Vertex>, Vec<u32>) {
    let positions = [
        // +X
        [
            Vector3::new(0.5, -0.5, -0.5),
            Vector3::new(0.5, 0.5, -0.5),
            Vector3::new(0.5, 0.5, 0.5),
            Vector3::new(0.5, -0.5, 0.5),
        ],
        // -X
        [
            Vector3::new(-0.5, -0.5, 0.5),
            Vector3::new(-0.5, 0.5, 0.5),
            Vector3::new(-0.5, 0.5, -0.5),
            Vector3::new(-0.5, -0.5, -0.5),
        ],
        // +Y
        [
            Vector3::new(-0.5, 0.5, -0.5),
            Vector3::new(-0.5, 0.5, 0.5),
            Vector3::new(0.5, 0.5, 0.5),
            Vector3::new(0.5, 0.5, -0.5),
        ],
        // -Y
        [
            Vector3::new(-0.5, -0.5, 0.5),
            Vector3::new(-0.5, -0.5, -0.5),
            Vector3::new(0.5, -0.5, -0.5),
            Vector3::new(0.5, -0.5, 0.5),
        ],
        // +Z
        [
            Vector3::new(-0.5, -0.5, 0.5),
            Vector3::new(0.5, -0.5, 0.5),
            Vector3::new(0.5, 0.5, 0.5),
            Vector3::new(-0.5, 0.5, 0.5),
        ],
        // -Z
        [
            Vector3::new(0.5, -0.5, -0.5),
            Vector3::new(-0.5, -0.5, -0.5),
            Vector3::new(-0.5, 0.5, -0.5),
            Vector3::new(0.5, 0.5, -0.5),
        ],
    ];
    let normals = [
        Vector3::x(),
        -Vector3::x(),
        Vector3::y(),
        -Vector3::y(),
        Vector3::z(),
        -Vector3::z(),
    ];
    let uvs = [
        Vector2::new(0.0, 0.0),
        Vector2::new(1.0, 0.0),
        Vector2::new(1.0, 1.0),
        Vector2::new(0.0, 1.0),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (face, face_positions) in positions.iter().enumerate() {
        let base = vertices.len() as u32;
        for (corner, position) in face_positions.iter().enumerate() {
            vertices.push(Vertex::simple(*position, normals[face], uvs[corner]));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    (vertices, indices)
}

#[cfg(test)]
mod test {
    use super::{make_cube_data, Vertex};
    use crate::settings::MAX_BONES;

    #[test]
    fn vertex_default_has_unused_bones() {
        let vertex = Vertex::default();
        assert_eq!(vertex.bone_indices, [-1; 4]);
        assert!(vertex.is_valid_for_palette());
    }

    #[test]
    fn vertex_bone_indices_validation() {
        let mut vertex = Vertex::default();
        vertex.bone_indices = [0, 5, MAX_BONES as i32 - 1, -1];
        assert!(vertex.is_valid_for_palette());
        vertex.bone_indices = [MAX_BONES as i32, -1, -1, -1];
        assert!(!vertex.is_valid_for_palette());
    }

    #[test]
    fn cube_data_shape() {
        let (vertices, indices) = make_cube_data();
        assert_eq!(vertices.len(), 24);
        assert_eq!(indices.len(), 36);
        assert!(indices.iter().all(|i| (*i as usize) < vertices.len()));
    }

    #[test]
    fn vertex_size_is_stable() {
        // The interleaved layout the geometry buffer is built with.
        assert_eq!(size_of::<Vertex>(), (3 + 3 + 2 + 3 + 3 + 4 + 4) * 4);
    }
}
