//! Room mesh sync daemon.
//!
//! Keeps one authoritative room mesh on a coordinator and fans it out to
//! every viewer in the same signaling room. It provides:
//!
//! - **Role resolution** from device capabilities ([`role`])
//! - **The sync state machine** driven by signaling events ([`sync`])
//! - **Collaborator seams** for persistence, scanning and display
//!   ([`repository`], [`scanner`], [`presenter`])
//! - **An in-process simulation** of a whole room over a [`LocalBus`]
//!   ([`simulate`])
//!
//! # Roles
//!
//! - Coordinator: owns the authoritative mesh, serves it, announces changes
//! - Scanner: captures geometry and pushes it to the coordinator
//! - Viewer: pulls whatever the coordinator announces and displays it
//!
//! A desktop starts provisional and becomes coordinator only if it creates
//! the room; otherwise it joins as a viewer.
//!
//! [`LocalBus`]: roommesh_signal::LocalBus

pub mod config;
pub mod error;
pub mod presenter;
pub mod repository;
pub mod role;
pub mod scanner;
pub mod session;
pub mod simulate;
pub mod sync;

pub use config::{ConfigError, DaemonConfig, SyncSettings};
pub use error::SyncError;
pub use presenter::{spawn_display_loop, LogPresenter, MeshPresenter};
pub use repository::{FileMeshRepository, MemoryMeshRepository, MeshRepository, RepositoryError};
pub use role::{detect_device, resolve, CapabilityProbe, DeviceKind, Role, StaticProbe};
pub use scanner::{MeshSource, SourceError, StaticMeshSource};
pub use session::{Session, SessionError, SessionRole, SyncState};
pub use sync::{SyncDeps, SyncHandle, SyncOrchestrator, SyncStats, SyncStatus};
