//! Dispatcher (spec §4.4): validates and routes a decoded [`Packet`] to a
//! handler, honoring duplicate suppression and the transfer state machine.

use badgelink_wire::{Packet, Request, StatusCode};

use crate::collaborators::{AppStore, Filesystem, SettingsStore};
use crate::handlers;
use crate::transfer::{Direction, TransferState};
use crate::xfer_engine;

/// What the session should do after dispatching one packet.
pub enum DispatchOutcome {
    /// Stale sequence number, integrity failure, or an explicit abort: no
    /// bytes go back on the wire.
    Silent,
    Respond(Packet),
    /// A `StartApp` request succeeded; respond, then (after the drain
    /// delay) reboot with the given argument.
    RespondThenReboot(Packet, u32),
}

/// `true` iff `seq` is stale relative to `expected`, per the modular
/// comparison in spec §3.
#[must_use]
pub fn is_stale(seq: u32, expected: u32) -> bool {
    seq.wrapping_sub(expected) >= 0x8000_0000
}

#[allow(clippy::too_many_arguments)]
pub fn dispatch<AS, FS, SS>(
    packet: Packet,
    expected_sequence: &mut u32,
    transfer: &mut TransferState<AS::Handle, FS::File>,
    app_store: &mut AS,
    filesystem: &mut FS,
    settings: &mut SS,
    max_entries: usize,
    max_chunk: usize,
) -> DispatchOutcome
where
    AS: AppStore,
    FS: Filesystem,
    SS: SettingsStore,
{
    let (sequence, body) = match packet {
        Packet::Sync { sequence, ok: true } => {
            *expected_sequence = sequence.wrapping_add(1);
            return DispatchOutcome::Respond(Packet::Sync { sequence, ok: true });
        }
        Packet::Sync { ok: false, .. } => {
            return DispatchOutcome::Respond(Packet::status(StatusCode::Malformed));
        }
        Packet::Response { .. } => {
            return DispatchOutcome::Respond(Packet::status(StatusCode::Malformed));
        }
        Packet::Request { sequence, body } => (sequence, body),
    };

    if is_stale(sequence, *expected_sequence) {
        log::trace!("dropping stale sequence {sequence}, expected {expected_sequence}");
        return DispatchOutcome::Silent;
    }
    *expected_sequence = sequence.wrapping_add(1);

    if transfer.is_active() {
        match &body {
            Request::UploadChunk(chunk) => {
                return if transfer.direction() == Some(Direction::Upload) {
                    let status = xfer_engine::handle_upload_chunk(transfer, app_store, filesystem, chunk)
                        .unwrap_or(StatusCode::IllegalState);
                    DispatchOutcome::Respond(Packet::status(status))
                } else {
                    xfer_engine::abort_active(transfer, app_store, filesystem);
                    DispatchOutcome::Respond(Packet::status(StatusCode::IllegalState))
                };
            }
            Request::XferCtrl(ctrl) => {
                return match xfer_engine::handle_xfer_ctrl(
                    transfer, app_store, filesystem, *ctrl, max_chunk,
                ) {
                    Some((status, body)) => DispatchOutcome::Respond(Packet::Response { status, body }),
                    None => DispatchOutcome::Silent,
                };
            }
            _ => {
                log::warn!("request received mid-transfer, aborting abnormally");
                xfer_engine::abort_active(transfer, app_store, filesystem);
            }
        }
    }

    match body {
        Request::UploadChunk(_) | Request::XferCtrl(_) => {
            DispatchOutcome::Respond(Packet::status(StatusCode::IllegalState))
        }
        Request::StartApp { slug, arg } => {
            let outcome = handlers::start_app::handle(app_store, slug.as_str(), arg);
            let response = Packet::status(outcome.status);
            if outcome.reboot_requested {
                DispatchOutcome::RespondThenReboot(response, arg)
            } else {
                DispatchOutcome::Respond(response)
            }
        }
        Request::SettingsAction(req) => {
            let (status, body) = handlers::settings::handle(&req, settings, max_entries);
            DispatchOutcome::Respond(Packet::Response { status, body })
        }
        Request::AppStoreAction(req) => {
            let (status, body) = handlers::appstore::handle(&req, app_store, transfer, max_entries);
            DispatchOutcome::Respond(Packet::Response { status, body })
        }
        Request::FsAction(req) => {
            let (status, body) = handlers::fs::handle(&req, filesystem, transfer, max_entries);
            DispatchOutcome::Respond(Packet::Response { status, body })
        }
    }
}
