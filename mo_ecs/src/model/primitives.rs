use bevy_math::prelude::*;
use vulkano::buffer::BufferContents;
use vulkano::pipeline::graphics::vertex_input::Vertex;

/// Vertex layout consumed by the G-buffer and shadow pipelines. Field names match the
/// vertex shader inputs.
#[derive(BufferContents, Vertex, Clone, Copy, Debug, PartialEq)]
#[repr(C)]
pub struct StaticVertex {
    #[format(R32G32B32_SFLOAT)]
    pub position: [f32; 3],
    #[format(R32G32B32_SFLOAT)]
    pub normal: [f32; 3],
    #[format(R32G32B32_SFLOAT)]
    pub tangent: [f32; 3],
    #[format(R32G32B32_SFLOAT)]
    pub bitangent: [f32; 3],
    #[format(R32G32_SFLOAT)]
    pub uv: [f32; 2],
}

/// Index range of one drawable mesh inside a model's shared buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshDesc {
    pub index_count: u32,
    pub first_index: u32,
    pub vertex_offset: i32,
    pub material_index: usize,
}

/// CPU-side geometry, uploaded with [`crate::model::Model::from_geometry`].
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    pub vertices: Vec<StaticVertex>,
    pub indices: Vec<u32>,
    pub meshes: Vec<MeshDesc>,
}

impl Geometry {
    /// Appends `other` as new meshes, offsetting their ranges and materials.
    pub fn append(&mut self, other: Geometry, material_offset: usize) {
        let first_index = self.indices.len() as u32;
        let vertex_offset = self.vertices.len() as i32;
        self.meshes.extend(other.meshes.into_iter().map(|mesh| MeshDesc {
            first_index: mesh.first_index + first_index,
            vertex_offset: mesh.vertex_offset + vertex_offset,
            material_index: mesh.material_index + material_offset,
            ..mesh
        }));
        self.vertices.extend(other.vertices);
        self.indices.extend(other.indices);
    }

    fn single_mesh(vertices: Vec<StaticVertex>, indices: Vec<u32>) -> Self {
        let meshes = vec![MeshDesc {
            index_count: indices.len() as u32,
            first_index: 0,
            vertex_offset: 0,
            material_index: 0,
        }];
        Self {
            vertices,
            indices,
            meshes,
        }
    }
}

/// Pushes one quad facing `normal`. `tangent x bitangent` must equal `normal` so the
/// winding comes out counter-clockwise seen from the front.
fn push_face(
    vertices: &mut Vec<StaticVertex>,
    indices: &mut Vec<u32>,
    center: Vec3,
    normal: Vec3,
    tangent: Vec3,
    bitangent: Vec3,
    half_extent: Vec2,
) {
    let base = vertices.len() as u32;
    let corners = [
        (Vec2::new(-1.0, -1.0), [0.0, 1.0]),
        (Vec2::new(1.0, -1.0), [1.0, 1.0]),
        (Vec2::new(1.0, 1.0), [1.0, 0.0]),
        (Vec2::new(-1.0, 1.0), [0.0, 0.0]),
    ];
    for (corner, uv) in corners {
        let position = center
            + tangent * corner.x * half_extent.x
            + bitangent * corner.y * half_extent.y;
        vertices.push(StaticVertex {
            position: position.into(),
            normal: normal.into(),
            tangent: tangent.into(),
            bitangent: bitangent.into(),
            uv,
        });
    }
    indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
}

/// Axis-aligned cube of edge length `size` centered at the origin.
pub fn cube(size: f32) -> Geometry {
    let half = size * 0.5;
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, tangent, bitangent) in faces {
        push_face(
            &mut vertices,
            &mut indices,
            normal * half,
            normal,
            tangent,
            bitangent,
            Vec2::splat(half),
        );
    }
    Geometry::single_mesh(vertices, indices)
}

/// Upward facing square in the XZ plane.
pub fn plane(size: f32) -> Geometry {
    let mut vertices = Vec::with_capacity(4);
    let mut indices = Vec::with_capacity(6);
    push_face(
        &mut vertices,
        &mut indices,
        Vec3::ZERO,
        Vec3::Y,
        Vec3::X,
        Vec3::NEG_Z,
        Vec2::splat(size * 0.5),
    );
    Geometry::single_mesh(vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_front_faces_outward(geometry: &Geometry) {
        for triangle in geometry.indices.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| {
                let v = geometry.vertices[triangle[i] as usize];
                (Vec3::from(v.position), Vec3::from(v.normal))
            });
            let face_normal = (b.0 - a.0).cross(c.0 - a.0).normalize();
            assert!(
                face_normal.dot(a.1) > 0.99,
                "triangle {triangle:?} winds against its normal"
            );
        }
    }

    #[test]
    fn cube_has_four_vertices_per_face() {
        let cube = cube(2.0);
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        assert_eq!(cube.meshes[0].index_count, 36);
        assert!(
            cube.vertices
                .iter()
                .all(|v| Vec3::from(v.position).abs().max_element() == 1.0)
        );
    }

    #[test]
    fn cube_winding_and_tangent_frames_are_consistent() {
        let cube = cube(1.0);
        assert_front_faces_outward(&cube);
        for v in &cube.vertices {
            let (n, t, b) = (Vec3::from(v.normal), Vec3::from(v.tangent), Vec3::from(v.bitangent));
            assert!(t.cross(b).abs_diff_eq(n, 1e-6));
            assert_eq!(n.dot(t), 0.0);
        }
    }

    #[test]
    fn plane_faces_up() {
        let plane = plane(10.0);
        assert_front_faces_outward(&plane);
        assert!(plane.vertices.iter().all(|v| v.position[1] == 0.0));
    }

    #[test]
    fn append_offsets_ranges_and_materials() {
        let mut geometry = cube(1.0);
        geometry.append(plane(4.0), 1);

        assert_eq!(geometry.meshes.len(), 2);
        let plane_mesh = geometry.meshes[1];
        assert_eq!(plane_mesh.first_index, 36);
        assert_eq!(plane_mesh.vertex_offset, 24);
        assert_eq!(plane_mesh.material_index, 1);
        assert_eq!(geometry.indices.len(), 42);
    }
}
