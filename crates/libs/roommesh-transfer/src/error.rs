use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use roommesh_mesh::CodecError;

use crate::endpoint::{EndpointParseError, TransferEndpoint};

/// Errors from serving or fetching a mesh.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransferError {
    #[error("couldn't bind transfer listener on <{addr}>: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("couldn't connect to <{endpoint}>: {source}")]
    Connect { endpoint: TransferEndpoint, source: io::Error },

    #[error("transfer with <{peer}> failed: {source}")]
    Io { peer: String, source: io::Error },

    #[error("fetch from <{endpoint}> timed out after {after:?}")]
    Timeout { endpoint: TransferEndpoint, after: Duration },

    #[error("received mesh is unusable: {0}")]
    Decode(#[from] CodecError),

    #[error("invalid endpoint: {0}")]
    Endpoint(#[from] EndpointParseError),
}

impl TransferError {
    /// Returns `true` for failures a later attempt may not hit.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Io { .. } | Self::Timeout { .. })
    }
}
