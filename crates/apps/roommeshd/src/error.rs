use roommesh_mesh::CodecError;
use roommesh_signal::SignalError;
use roommesh_transfer::TransferError;

use crate::config::ConfigError;
use crate::repository::RepositoryError;
use crate::scanner::SourceError;
use crate::session::SessionError;

/// Errors surfaced by the sync orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("signaling: {0}")]
    Signal(#[from] SignalError),

    #[error("transfer: {0}")]
    Transfer(#[from] TransferError),

    #[error("session: {0}")]
    Session(#[from] SessionError),

    #[error("repository: {0}")]
    Repository(#[from] RepositoryError),

    #[error("scanner: {0}")]
    Source(#[from] SourceError),

    #[error("mesh: {0}")]
    Codec(#[from] CodecError),

    #[error("config: {0}")]
    Config(#[from] ConfigError),
}

impl SyncError {
    /// Only a standing transfer server that cannot bind stops the
    /// orchestrator; everything else degrades to a stale mesh.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Transfer(TransferError::Bind { .. }) | Self::Config(_))
    }
}
