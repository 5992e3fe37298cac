//! Persistence collaborator: named mesh collections.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use roommesh_mesh::{codec, CodecError, Mesh};

const EXTENSION: &str = "mesh";

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("invalid mesh name '{0}'")]
    InvalidName(String),

    #[error("mesh file {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("mesh file {path} is corrupt: {source}")]
    Corrupt { path: PathBuf, source: CodecError },

    #[error("can't encode mesh '{name}': {source}")]
    Encode { name: String, source: CodecError },
}

#[async_trait]
pub trait MeshRepository: Send + Sync {
    /// Load `name`. A name that was never saved loads as no meshes.
    async fn load(&self, name: &str) -> Result<Vec<Mesh>, RepositoryError>;

    async fn save(&self, name: &str, meshes: &[Mesh]) -> Result<(), RepositoryError>;
}

/// One codec-encoded `<name>.mesh` file per name under a directory.
#[derive(Debug, Clone)]
pub struct FileMeshRepository {
    dir: PathBuf,
}

impl FileMeshRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf, RepositoryError> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\', '\0']);
        if !valid {
            return Err(RepositoryError::InvalidName(name.to_string()));
        }
        Ok(self.dir.join(format!("{name}.{EXTENSION}")))
    }
}

#[async_trait]
impl MeshRepository for FileMeshRepository {
    async fn load(&self, name: &str) -> Result<Vec<Mesh>, RepositoryError> {
        let path = self.path_for(name)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::info!("repository: no saved mesh at {}", path.display());
                return Ok(Vec::new());
            }
            Err(source) => return Err(RepositoryError::Io { path, source }),
        };
        let meshes =
            codec::decode(&bytes).map_err(|source| RepositoryError::Corrupt {
                path: path.clone(),
                source,
            })?;
        log::info!("repository: loaded {} meshes from {}", meshes.len(), path.display());
        Ok(meshes)
    }

    async fn save(&self, name: &str, meshes: &[Mesh]) -> Result<(), RepositoryError> {
        let path = self.path_for(name)?;
        let bytes = codec::try_encode(meshes)
            .map_err(|source| RepositoryError::Encode { name: name.to_string(), source })?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| RepositoryError::Io { path: self.dir.clone(), source })?;

        // Write aside and rename so a crash never leaves a half-written file.
        let staging = path.with_extension(format!("{EXTENSION}.tmp"));
        tokio::fs::write(&staging, bytes)
            .await
            .map_err(|source| RepositoryError::Io { path: staging.clone(), source })?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|source| RepositoryError::Io { path: path.clone(), source })?;
        log::info!("repository: saved {} meshes to {}", meshes.len(), path.display());
        Ok(())
    }
}

/// In-memory repository.
#[derive(Debug, Default)]
pub struct MemoryMeshRepository {
    entries: Mutex<HashMap<String, Vec<Mesh>>>,
}

impl MemoryMeshRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(name: &str, meshes: Vec<Mesh>) -> Self {
        let repository = Self::new();
        repository.put(name, meshes);
        repository
    }

    pub fn put(&self, name: &str, meshes: Vec<Mesh>) {
        self.lock().insert(name.to_string(), meshes);
    }

    pub fn get(&self, name: &str) -> Option<Vec<Mesh>> {
        self.lock().get(name).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Mesh>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl MeshRepository for MemoryMeshRepository {
    async fn load(&self, name: &str) -> Result<Vec<Mesh>, RepositoryError> {
        Ok(self.get(name).unwrap_or_default())
    }

    async fn save(&self, name: &str, meshes: &[Mesh]) -> Result<(), RepositoryError> {
        self.put(name, meshes.to_vec());
        Ok(())
    }
}
