//! # roommesh-mesh
//!
//! Shared room geometry for the roommesh synchronization protocol.
//!
//! This crate holds the three pieces every other roommesh component touches:
//!
//! - [`Mesh`]: one surface: vertex positions plus triangle index triples
//! - [`codec`]: the compact binary form a mesh collection travels in
//! - [`MeshStore`]: the versioned holder of the current serialized blob
//!
//! ## Blob Format v1
//!
//! ```text
//! [magic:4][version:1][mesh_count:4] then per mesh:
//!   [vertex_count:4][triangle_count:4][vertices: 3 x f32 each][triangles: 3 x u32 each]
//! ```
//!
//! All integers and floats are little-endian. An empty collection encodes to
//! the 9-byte header alone.
//!
//! ## Example
//!
//! ```rust
//! use roommesh_mesh::{codec, Mesh, MeshStore};
//!
//! let mesh = Mesh::new(
//!     vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
//!     vec![[0, 1, 2]],
//! );
//! let store = MeshStore::new();
//! let version = store.replace_meshes(&[mesh.clone()]).unwrap();
//! assert_eq!(version, 1);
//! assert_eq!(store.meshes().unwrap(), vec![mesh]);
//! assert_eq!(codec::decode(&store.get()).unwrap().len(), 1);
//! ```

pub mod codec;
pub mod mesh;
pub mod store;

pub use codec::CodecError;
pub use mesh::{Mesh, Transform, Triangle, Vertex};
pub use store::{MeshBlob, MeshSnapshot, MeshStore};

/// Blob format magic prefix.
pub const MAGIC: &[u8; 4] = b"RMSH";

/// Current blob format version.
pub const FORMAT_VERSION: u8 = 0x01;
