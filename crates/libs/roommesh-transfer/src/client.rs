use std::time::Duration;

use roommesh_mesh::{codec, MeshBlob, MeshStore};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use crate::endpoint::TransferEndpoint;
use crate::error::TransferError;

const READ_CHUNK: usize = 16 * 1024;

/// What a completed fetch did to the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The peer sent a usable blob, now installed at `version`.
    Installed { version: u64, bytes: usize },
    /// The peer's store was empty; nothing changed locally.
    Empty,
}

/// Pulls a peer's mesh over one transfer connection.
///
/// Without a timeout a peer that never closes keeps the fetch pending
/// forever; callers that care set one with [`TransferClient::with_timeout`].
#[derive(Debug, Clone, Default)]
pub struct TransferClient {
    timeout: Option<Duration>,
}

impl TransferClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    /// Read everything the peer at `endpoint` sends until it closes.
    pub async fn fetch(&self, endpoint: &TransferEndpoint) -> Result<MeshBlob, TransferError> {
        match self.timeout {
            Some(after) => tokio::time::timeout(after, read_all(endpoint))
                .await
                .map_err(|_| TransferError::Timeout { endpoint: endpoint.clone(), after })?,
            None => read_all(endpoint).await,
        }
    }

    /// Fetch and check that a non-empty payload decodes. An empty payload is
    /// returned as is.
    pub async fn fetch_checked(
        &self,
        endpoint: &TransferEndpoint,
    ) -> Result<MeshBlob, TransferError> {
        let blob = self.fetch(endpoint).await?;
        if !blob.is_empty() {
            codec::decode(&blob)?;
        }
        Ok(blob)
    }

    /// Fetch, check the payload decodes, and install it into `store`.
    ///
    /// A payload that does not decode is discarded whole and the store keeps
    /// its previous blob.
    pub async fn fetch_into(
        &self,
        endpoint: &TransferEndpoint,
        store: &MeshStore,
    ) -> Result<FetchOutcome, TransferError> {
        let blob = self.fetch_checked(endpoint).await?;
        if blob.is_empty() {
            log::info!("transfer_client: <{}> had no mesh", endpoint);
            return Ok(FetchOutcome::Empty);
        }
        let bytes = blob.len();
        let version = store.replace(blob);
        log::info!(
            "transfer_client: installed {} bytes from <{}> as v{}",
            bytes,
            endpoint,
            version
        );
        Ok(FetchOutcome::Installed { version, bytes })
    }
}

async fn read_all(endpoint: &TransferEndpoint) -> Result<MeshBlob, TransferError> {
    let mut stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
        .await
        .map_err(|source| TransferError::Connect { endpoint: endpoint.clone(), source })?;
    log::debug!("transfer_client: connected to <{}>", endpoint);

    let mut received = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|source| TransferError::Io { peer: endpoint.to_string(), source })?;
        if read == 0 {
            break;
        }
        received.extend_from_slice(&chunk[..read]);
    }
    log::debug!("transfer_client: <{}> closed after {} bytes", endpoint, received.len());
    Ok(MeshBlob::from(received))
}
