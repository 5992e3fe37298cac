//! Bulk mesh transfer channel.
//!
//! A transfer is one TCP connection carrying one [`MeshBlob`]: the server
//! writes every byte of its store's current blob, then closes. There is no
//! framing; orderly close marks end of data. A receiver that sees zero
//! bytes treats the sender's store as empty.
//!
//! - [`TransferServer`]: binds a listener; serves either a single peer
//!   ([`TransferServer::serve_once`]) or every peer until cancelled
//!   ([`TransferServer::serve_repeatedly`]), one task per connection
//! - [`TransferClient`]: connects to a [`TransferEndpoint`], reads to end
//!   of stream and installs the result into a [`MeshStore`]
//!
//! [`MeshBlob`]: roommesh_mesh::MeshBlob
//! [`MeshStore`]: roommesh_mesh::MeshStore

pub mod client;
pub mod endpoint;
pub mod error;
pub mod server;

pub use client::{FetchOutcome, TransferClient};
pub use endpoint::{local_ip_address, EndpointParseError, TransferEndpoint};
pub use error::TransferError;
pub use server::{ServerHandle, TransferServer};
