//! Mesh collection encode/decode.
//!
//! The format is internal to roommesh; the only contract is that
//! `decode(&encode(meshes)) == meshes`.

use crate::mesh::{Mesh, Triangle, Vertex};
use crate::{FORMAT_VERSION, MAGIC};

/// Blob header size: 4 (magic) + 1 (version) + 4 (mesh_count) = 9
pub const HEADER_SIZE: usize = 9;

const MESH_HEADER_SIZE: usize = 8;
const VERTEX_SIZE: usize = 12;
const TRIANGLE_SIZE: usize = 12;

/// Errors from decoding a mesh blob. Any of these means the whole payload is
/// unusable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("blob too short: {0} bytes (minimum {HEADER_SIZE})")]
    TooShort(usize),

    #[error("invalid magic (expected 'RMSH')")]
    InvalidMagic,

    #[error("unsupported blob version: {0}")]
    UnsupportedVersion(u8),

    #[error("truncated blob: mesh {mesh} needs {needed} more bytes, {available} available")]
    Truncated { mesh: usize, needed: usize, available: usize },

    #[error("{0} trailing bytes after last mesh")]
    TrailingBytes(usize),

    #[error("mesh too large to encode: {0} elements")]
    TooLarge(usize),
}

/// Encode a mesh collection. The empty collection encodes to the header alone.
///
/// Counts are written as `u32` without checking; [`try_encode`] is the
/// checked form used for anything that gets stored or served.
pub fn encode(meshes: &[Mesh]) -> Vec<u8> {
    let body: usize = meshes
        .iter()
        .map(|m| {
            MESH_HEADER_SIZE + m.vertices.len() * VERTEX_SIZE + m.triangles.len() * TRIANGLE_SIZE
        })
        .sum();
    let mut buf = Vec::with_capacity(HEADER_SIZE + body);
    buf.extend_from_slice(MAGIC);
    buf.push(FORMAT_VERSION);
    buf.extend_from_slice(&(meshes.len() as u32).to_le_bytes());

    for mesh in meshes {
        buf.extend_from_slice(&(mesh.vertices.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(mesh.triangles.len() as u32).to_le_bytes());
        for vertex in &mesh.vertices {
            for component in vertex {
                buf.extend_from_slice(&component.to_le_bytes());
            }
        }
        for triangle in &mesh.triangles {
            for index in triangle {
                buf.extend_from_slice(&index.to_le_bytes());
            }
        }
    }
    buf
}

/// Encode, refusing collections whose counts do not fit the 32-bit fields.
pub fn try_encode(meshes: &[Mesh]) -> Result<Vec<u8>, CodecError> {
    if meshes.len() > u32::MAX as usize {
        return Err(CodecError::TooLarge(meshes.len()));
    }
    for mesh in meshes {
        let largest = mesh.vertices.len().max(mesh.triangles.len());
        if largest > u32::MAX as usize {
            return Err(CodecError::TooLarge(largest));
        }
    }
    Ok(encode(meshes))
}

/// Decode a blob produced by [`encode`].
pub fn decode(data: &[u8]) -> Result<Vec<Mesh>, CodecError> {
    if data.len() < HEADER_SIZE {
        return Err(CodecError::TooShort(data.len()));
    }
    if &data[..4] != MAGIC.as_slice() {
        return Err(CodecError::InvalidMagic);
    }
    if data[4] != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(data[4]));
    }

    let mut reader = Reader { data, pos: 5 };
    let count = reader.u32(0)? as usize;

    // Every mesh needs at least its own header, so a count larger than the
    // remaining bytes allow is rejected before allocating.
    let max_meshes = reader.remaining() / MESH_HEADER_SIZE;
    if count > max_meshes {
        return Err(CodecError::Truncated {
            mesh: max_meshes,
            needed: (count - max_meshes) * MESH_HEADER_SIZE,
            available: reader.remaining() % MESH_HEADER_SIZE,
        });
    }

    let mut meshes = Vec::with_capacity(count);
    for index in 0..count {
        let vertex_count = reader.u32(index)? as usize;
        let triangle_count = reader.u32(index)? as usize;
        let needed = vertex_count
            .saturating_mul(VERTEX_SIZE)
            .saturating_add(triangle_count.saturating_mul(TRIANGLE_SIZE));
        reader.require(index, needed)?;

        let mut vertices: Vec<Vertex> = Vec::with_capacity(vertex_count);
        for _ in 0..vertex_count {
            vertices.push([reader.f32(index)?, reader.f32(index)?, reader.f32(index)?]);
        }
        let mut triangles: Vec<Triangle> = Vec::with_capacity(triangle_count);
        for _ in 0..triangle_count {
            triangles.push([reader.u32(index)?, reader.u32(index)?, reader.u32(index)?]);
        }
        meshes.push(Mesh { vertices, triangles });
    }

    if reader.remaining() != 0 {
        return Err(CodecError::TrailingBytes(reader.remaining()));
    }
    Ok(meshes)
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn require(&self, mesh: usize, needed: usize) -> Result<(), CodecError> {
        let available = self.remaining();
        if needed > available {
            return Err(CodecError::Truncated { mesh, needed, available });
        }
        Ok(())
    }

    fn take4(&mut self, mesh: usize) -> Result<[u8; 4], CodecError> {
        self.require(mesh, 4)?;
        let mut out = [0u8; 4];
        out.copy_from_slice(&self.data[self.pos..self.pos + 4]);
        self.pos += 4;
        Ok(out)
    }

    fn u32(&mut self, mesh: usize) -> Result<u32, CodecError> {
        self.take4(mesh).map(u32::from_le_bytes)
    }

    fn f32(&mut self, mesh: usize) -> Result<f32, CodecError> {
        self.take4(mesh).map(f32::from_le_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Mesh {
        Mesh::new(vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]], vec![[0, 1, 2]])
    }

    #[test]
    fn empty_collection_is_header_only() {
        let encoded = encode(&[]);
        assert_eq!(encoded.len(), HEADER_SIZE);
        assert_eq!(&encoded[..4], MAGIC);
        assert_eq!(decode(&encoded).expect("decode empty"), Vec::<Mesh>::new());
    }

    #[test]
    fn roundtrip_multiple_meshes() {
        let meshes = vec![
            triangle(),
            Mesh::cuboid([-2.5, 0.0, -1.0], [2.5, 3.0, 1.0]),
            Mesh::default(),
        ];
        let decoded = decode(&encode(&meshes)).expect("decode failed");
        assert_eq!(decoded, meshes);
    }

    #[test]
    fn encoded_size_is_exact() {
        let encoded = encode(&[triangle()]);
        assert_eq!(encoded.len(), HEADER_SIZE + 8 + 3 * 12 + 12);
    }

    #[test]
    fn decode_too_short() {
        assert_eq!(decode(b"RMSH"), Err(CodecError::TooShort(4)));
        assert_eq!(decode(&[]), Err(CodecError::TooShort(0)));
    }

    #[test]
    fn decode_bad_magic() {
        let mut encoded = encode(&[triangle()]);
        encoded[0] = b'X';
        assert_eq!(decode(&encoded), Err(CodecError::InvalidMagic));
    }

    #[test]
    fn decode_bad_version() {
        let mut encoded = encode(&[]);
        encoded[4] = 0x7f;
        assert_eq!(decode(&encoded), Err(CodecError::UnsupportedVersion(0x7f)));
    }

    #[test]
    fn decode_truncated_payload() {
        let encoded = encode(&[triangle(), triangle()]);
        for cut in HEADER_SIZE..encoded.len() {
            let err = decode(&encoded[..cut]).expect_err("truncated blob must not decode");
            assert!(matches!(err, CodecError::Truncated { .. }), "cut {cut}: {err:?}");
        }
    }

    #[test]
    fn decode_rejects_absurd_mesh_count() {
        let mut encoded = encode(&[]);
        encoded[5..9].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(decode(&encoded), Err(CodecError::Truncated { .. })));
    }

    #[test]
    fn decode_rejects_absurd_vertex_count() {
        let mut encoded = encode(&[Mesh::default()]);
        encoded[9..13].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(decode(&encoded), Err(CodecError::Truncated { mesh: 0, .. })));
    }

    #[test]
    fn decode_trailing_bytes() {
        let mut encoded = encode(&[triangle()]);
        encoded.extend_from_slice(&[0, 0]);
        assert_eq!(decode(&encoded), Err(CodecError::TrailingBytes(2)));
    }

    #[test]
    fn try_encode_matches_encode() {
        let meshes = vec![triangle()];
        assert_eq!(try_encode(&meshes).expect("encode"), encode(&meshes));
    }
}
