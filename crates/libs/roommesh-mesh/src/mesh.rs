/// A vertex position in the shared room coordinate space.
pub type Vertex = [f32; 3];

/// Three indices into a mesh's vertex list.
pub type Triangle = [u32; 3];

/// One surface of scanned room geometry.
///
/// Indices are not validated against the vertex list; a mesh is carried as
/// observed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub triangles: Vec<Triangle>,
}

/// Uniform scale followed by a translation, used to move locally observed
/// geometry into the shared coordinate space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale: f32,
    pub translation: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self { scale: 1.0, translation: [0.0; 3] };

    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        Self { scale: 1.0, translation: [x, y, z] }
    }

    pub fn apply(&self, point: Vertex) -> Vertex {
        [
            point[0] * self.scale + self.translation[0],
            point[1] * self.scale + self.translation[1],
            point[2] * self.scale + self.translation[2],
        ]
    }
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>, triangles: Vec<Triangle>) -> Self {
        Self { vertices, triangles }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.triangles.is_empty()
    }

    /// Copy of this mesh with every vertex mapped through `transform`.
    pub fn transformed(&self, transform: &Transform) -> Self {
        Self {
            vertices: self.vertices.iter().map(|v| transform.apply(*v)).collect(),
            triangles: self.triangles.clone(),
        }
    }

    /// Axis-aligned box between `min` and `max`, two triangles per face.
    pub fn cuboid(min: Vertex, max: Vertex) -> Self {
        let [x0, y0, z0] = min;
        let [x1, y1, z1] = max;
        let vertices = vec![
            [x0, y0, z0],
            [x1, y0, z0],
            [x1, y1, z0],
            [x0, y1, z0],
            [x0, y0, z1],
            [x1, y0, z1],
            [x1, y1, z1],
            [x0, y1, z1],
        ];
        let triangles = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [3, 6, 2],
            [3, 7, 6],
            [0, 4, 7],
            [0, 7, 3],
            [1, 2, 6],
            [1, 6, 5],
        ];
        Self { vertices, triangles }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuboid_has_closed_faces() {
        let mesh = Mesh::cuboid([0.0; 3], [1.0; 3]);
        assert_eq!(mesh.vertices.len(), 8);
        assert_eq!(mesh.triangles.len(), 12);
        assert!(mesh.triangles.iter().flatten().all(|&i| (i as usize) < mesh.vertices.len()));
    }

    #[test]
    fn transform_moves_vertices_only() {
        let mesh = Mesh::new(vec![[1.0, 2.0, 3.0]], vec![[0, 0, 0]]);
        let moved = mesh.transformed(&Transform { scale: 2.0, translation: [1.0, 0.0, -1.0] });
        assert_eq!(moved.vertices, vec![[3.0, 4.0, 5.0]]);
        assert_eq!(moved.triangles, mesh.triangles);
    }

    #[test]
    fn identity_transform_is_noop() {
        let mesh = Mesh::cuboid([-1.0; 3], [1.0; 3]);
        assert_eq!(mesh.transformed(&Transform::IDENTITY), mesh);
    }
}
