//! Signaling message handlers, one per [`MessageTag`].
//!
//! Handlers run on the event loop and must not wait on the network: every
//! transfer they start is spawned under the current room's cancel token.

use std::collections::HashMap;
use std::sync::Arc;

use roommesh_signal::{MessageTag, ParticipantId, SignalMessage, Target};
use roommesh_transfer::{FetchOutcome, TransferEndpoint, TransferError};

use super::{Handler, SyncOrchestrator};
use crate::error::SyncError;
use crate::role::Role;

pub(super) fn table() -> HashMap<MessageTag, Handler> {
    let mut table: HashMap<MessageTag, Handler> = HashMap::new();
    table.insert(MessageTag::RequestPull, on_request_pull);
    table.insert(MessageTag::OfferMesh, on_offer_mesh);
    table.insert(MessageTag::AnnounceEndpoint, on_announce_endpoint);
    table
}

/// Coordinator: answer a viewer with the standing server's endpoint.
fn on_request_pull(
    orch: &mut SyncOrchestrator,
    from: ParticipantId,
    message: SignalMessage,
) -> Result<(), SyncError> {
    let SignalMessage::RequestPull { requester } = message else {
        return Ok(());
    };
    if !orch.in_role(Role::Coordinator) {
        log::debug!("sync({}): ignoring pull request from {}", orch.session.id(), from);
        return Ok(());
    }
    let Some(endpoint) = orch.coordinator_endpoint() else {
        log::warn!(
            "sync({}): pull request from {} but no transfer server",
            orch.session.id(),
            from
        );
        return Ok(());
    };
    log::debug!("sync({}): pointing {} at <{}>", orch.session.id(), requester, endpoint);
    orch.channel.send(
        Target::Participant(requester),
        &SignalMessage::AnnounceEndpoint { endpoint: endpoint.to_string() },
    )?;
    Ok(())
}

/// Coordinator: pull a scanner's freshly captured mesh. The announce watcher
/// picks up the resulting version bump.
fn on_offer_mesh(
    orch: &mut SyncOrchestrator,
    from: ParticipantId,
    message: SignalMessage,
) -> Result<(), SyncError> {
    let SignalMessage::OfferMesh { endpoint } = message else {
        return Ok(());
    };
    if !orch.in_role(Role::Coordinator) {
        log::debug!("sync({}): ignoring offer from {}", orch.session.id(), from);
        return Ok(());
    }
    let endpoint: TransferEndpoint = endpoint.parse().map_err(TransferError::from)?;
    let Some(cancel) = orch.room_cancel() else {
        return Ok(());
    };
    let id = orch.session.id();
    let client = orch.client.clone();
    let store = orch.store.clone();
    let stats = Arc::clone(&orch.handle.stats);
    log::info!("sync({}): pulling offer from {} at <{}>", id, from, endpoint);
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {
                log::debug!("sync({}): offer fetch from <{}> abandoned", id, endpoint);
            }
            fetched = client.fetch_into(&endpoint, &store) => match fetched {
                Ok(FetchOutcome::Installed { .. } | FetchOutcome::Empty) => {
                    stats.record_completed();
                }
                Err(err) => {
                    stats.record_failed();
                    log::warn!("sync({}): offer fetch from <{}>: {}", id, endpoint, err);
                }
            }
        }
    });
    Ok(())
}

/// Viewer: fetch from the announced endpoint. Only the newest announcement's
/// fetch may install; older ones finishing late are discarded.
fn on_announce_endpoint(
    orch: &mut SyncOrchestrator,
    from: ParticipantId,
    message: SignalMessage,
) -> Result<(), SyncError> {
    let SignalMessage::AnnounceEndpoint { endpoint } = message else {
        return Ok(());
    };
    if !orch.in_role(Role::Viewer) {
        log::debug!("sync({}): ignoring announcement from {}", orch.session.id(), from);
        return Ok(());
    }
    let endpoint: TransferEndpoint = endpoint.parse().map_err(TransferError::from)?;
    let Some(cancel) = orch.room_cancel() else {
        return Ok(());
    };
    let seq = orch.gate.next();
    let id = orch.session.id();
    let client = orch.client.clone();
    let store = orch.store.clone();
    let gate = Arc::clone(&orch.gate);
    let stats = Arc::clone(&orch.handle.stats);
    tokio::spawn(async move {
        let fetched = tokio::select! {
            _ = cancel.cancelled() => return,
            fetched = client.fetch_checked(&endpoint) => fetched,
        };
        let blob = match fetched {
            Ok(blob) => blob,
            Err(err) => {
                stats.record_failed();
                log::warn!("sync({}): fetch from <{}>: {}", id, endpoint, err);
                return;
            }
        };
        if blob.is_empty() {
            log::info!("sync({}): <{}> had no mesh", id, endpoint);
            stats.record_completed();
            return;
        }
        match gate.install_if_current(seq, &store, blob) {
            Some(version) => {
                stats.record_completed();
                log::info!("sync({}): installed v{} from <{}>", id, version, endpoint);
            }
            None => {
                stats.record_discarded();
                log::debug!("sync({}): stale fetch #{} from <{}> discarded", id, seq, endpoint);
            }
        }
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_tag_has_a_handler() {
        let table = table();
        for tag in MessageTag::ALL {
            assert!(table.contains_key(&tag), "missing handler for {tag}");
        }
    }
}
