//! Scanning collaborator.

use async_trait::async_trait;
use roommesh_mesh::{Mesh, Transform};

#[derive(Debug, thiserror::Error)]
#[error("scan failed: {0}")]
pub struct SourceError(pub String);

/// Produces freshly observed geometry, already in the shared coordinate
/// space.
#[async_trait]
pub trait MeshSource: Send + Sync {
    async fn capture(&self) -> Result<Vec<Mesh>, SourceError>;
}

/// Fixed geometry observed from a fixed device pose.
#[derive(Debug, Clone, Default)]
pub struct StaticMeshSource {
    meshes: Vec<Mesh>,
    pose: Transform,
}

impl StaticMeshSource {
    pub fn new(meshes: Vec<Mesh>) -> Self {
        Self { meshes, pose: Transform::IDENTITY }
    }

    pub fn with_pose(mut self, pose: Transform) -> Self {
        self.pose = pose;
        self
    }
}

#[async_trait]
impl MeshSource for StaticMeshSource {
    async fn capture(&self) -> Result<Vec<Mesh>, SourceError> {
        Ok(self.meshes.iter().map(|mesh| mesh.transformed(&self.pose)).collect())
    }
}
