use std::net::SocketAddr;

use roommesh_mesh::{MeshSnapshot, MeshStore};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::endpoint::TransferEndpoint;
use crate::error::TransferError;

/// Listener that streams a store's current blob to every peer that connects.
///
/// The blob sent is whatever the store holds at the moment the connection
/// is accepted.
pub struct TransferServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    store: MeshStore,
}

impl TransferServer {
    /// Bind `addr`. Port 0 picks a fresh ephemeral port. Failing to bind is
    /// the only fatal server error.
    pub async fn bind(addr: SocketAddr, store: MeshStore) -> Result<Self, TransferError> {
        let listener =
            TcpListener::bind(addr).await.map_err(|source| TransferError::Bind { addr, source })?;
        let local_addr =
            listener.local_addr().map_err(|source| TransferError::Bind { addr, source })?;
        log::info!("transfer_server: listen on <{}>", local_addr);
        Ok(Self { listener, local_addr, store })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Endpoint to announce, reachable at `advertise_host` on the bound port.
    pub fn endpoint(&self, advertise_host: &str) -> TransferEndpoint {
        TransferEndpoint::new(advertise_host, self.local_addr.port())
    }

    /// Serve a single peer, then stop listening. Returns the bytes written.
    pub async fn serve_once(self) -> Result<usize, TransferError> {
        let (stream, peer) = self.listener.accept().await.map_err(|source| TransferError::Io {
            peer: self.local_addr.to_string(),
            source,
        })?;
        drop(self.listener);
        log::info!(
            "transfer_server: one-shot client <{}> connected to <{}>",
            peer,
            self.local_addr
        );
        write_snapshot(stream, peer, self.store.snapshot()).await
    }

    /// Accept and serve peers until `cancel` fires. Every connection runs on
    /// its own task, so a stalled peer never holds up the next accept. A
    /// failed connection is logged and dropped.
    pub async fn serve_repeatedly(self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            log::info!(
                                "transfer_server: client <{}> connected to <{}>",
                                peer,
                                self.local_addr
                            );
                            let snapshot = self.store.snapshot();
                            let cancel = cancel.child_token();
                            tokio::spawn(async move {
                                tokio::select! {
                                    _ = cancel.cancelled() => {
                                        log::debug!(
                                            "transfer_server: abandoned transfer to <{}>",
                                            peer
                                        );
                                    }
                                    result = write_snapshot(stream, peer, snapshot) => {
                                        if let Err(err) = result {
                                            log::warn!("transfer_server: {}", err);
                                        }
                                    }
                                }
                            });
                        }
                        Err(err) => {
                            log::warn!(
                                "transfer_server: accept failed on <{}>: {}",
                                self.local_addr,
                                err
                            );
                        }
                    }
                }
            }
        }
        log::info!("transfer_server: stopped listening on <{}>", self.local_addr);
    }

    /// Run [`TransferServer::serve_repeatedly`] on a background task.
    pub fn spawn(self) -> ServerHandle {
        let cancel = CancellationToken::new();
        let local_addr = self.local_addr;
        let task = tokio::spawn(self.serve_repeatedly(cancel.clone()));
        ServerHandle { local_addr, cancel, task }
    }
}

async fn write_snapshot(
    mut stream: TcpStream,
    peer: SocketAddr,
    snapshot: MeshSnapshot,
) -> Result<usize, TransferError> {
    let io_err = |source: std::io::Error| TransferError::Io { peer: peer.to_string(), source };
    stream.write_all(&snapshot.blob).await.map_err(io_err)?;
    stream.flush().await.map_err(io_err)?;
    stream.shutdown().await.map_err(io_err)?;
    log::info!(
        "transfer_server: sent v{} ({} bytes) to <{}>",
        snapshot.version,
        snapshot.blob.len(),
        peer
    );
    Ok(snapshot.blob.len())
}

/// A standing server running in the background.
pub struct ServerHandle {
    local_addr: SocketAddr,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn endpoint(&self, advertise_host: &str) -> TransferEndpoint {
        TransferEndpoint::new(advertise_host, self.local_addr.port())
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop accepting, abandon in-flight connections and wait for the
    /// listener to close.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        let _ = (&mut self.task).await;
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
