//! The `Session` facade (spec §9 Design Note: "an implementation should
//! encapsulate \[the reference source's global mutable singletons\] in a
//! single Session object whose methods are the only mutators").

use std::sync::mpsc::{Receiver, SyncSender};
use std::time::Duration;

use badgelink_wire::{frame_decode, frame_encode};

use crate::collaborators::{AppStore, Filesystem, Reboot, SettingsStore};
use crate::dispatcher::{self, DispatchOutcome};
use crate::error::SessionError;
use crate::reassembler::Reassembler;
use crate::transfer::TransferState;

/// Delivers complete, ready-to-send frames to the transport.
pub trait Transmit {
    fn send(&mut self, frame: &[u8]);
}

/// Creates the bounded single-producer, single-consumer fragment queue: the
/// transport's receive callback holds the [`SyncSender`] half, `Session`
/// holds the [`Receiver`] half (spec §5, §9).
#[must_use]
pub fn channel(capacity: usize) -> (SyncSender<Vec<u8>>, Receiver<Vec<u8>>) {
    std::sync::mpsc::sync_channel(capacity)
}

/// Approximate delay after a successful `StartApp` response, to let it
/// drain off the wire before the device reboots (spec §4.5/§5).
const REBOOT_DRAIN_DELAY: Duration = Duration::from_millis(200);

/// The session engine: one shared buffer, one transfer descriptor, one
/// expected-sequence counter, all owned exclusively by whichever thread
/// calls [`Session::run_forever`] or [`Session::push_fragment`].
///
/// `CAP` bounds both the reassembly buffer and, indirectly, the largest
/// chunk and list-page sizes the engine will produce (spec I6).
pub struct Session<AS, FS, SS, RB, TX, const CAP: usize>
where
    AS: AppStore,
    FS: Filesystem,
    SS: SettingsStore,
    RB: Reboot,
    TX: Transmit,
{
    reassembler: Reassembler<CAP>,
    expected_sequence: u32,
    transfer: TransferState<AS::Handle, FS::File>,
    app_store: AS,
    filesystem: FS,
    settings: SS,
    reboot: RB,
    transmit: TX,
    receiver: Receiver<Vec<u8>>,
    max_entries: usize,
    max_chunk: usize,
}

impl<AS, FS, SS, RB, TX, const CAP: usize> Session<AS, FS, SS, RB, TX, CAP>
where
    AS: AppStore,
    FS: Filesystem,
    SS: SettingsStore,
    RB: Reboot,
    TX: Transmit,
{
    pub fn new(
        app_store: AS,
        filesystem: FS,
        settings: SS,
        reboot: RB,
        transmit: TX,
        receiver: Receiver<Vec<u8>>,
    ) -> Result<Self, SessionError> {
        // A frame needs room for at least a 1-byte packet tag, a 4-byte
        // CRC trailer, and the COBS overhead byte.
        const MIN_CAP: usize = 6;
        if CAP < MIN_CAP {
            return Err(SessionError::BufferTooSmall {
                needed: MIN_CAP,
                capacity: CAP,
            });
        }
        Ok(Self {
            reassembler: Reassembler::new(),
            expected_sequence: 0,
            transfer: TransferState::Idle,
            app_store,
            filesystem,
            settings,
            reboot,
            transmit,
            receiver,
            max_entries: 16,
            max_chunk: CAP.saturating_sub(32),
        })
    }

    /// Feeds one transport fragment through reassembly, dispatch, and
    /// (where a response is due) encoding back out through `transmit`.
    ///
    /// # Errors
    /// Returns [`SessionError::FragmentTooLarge`] if `fragment` alone could
    /// never fit the shared buffer, regardless of framing.
    pub fn push_fragment(&mut self, fragment: &[u8]) -> Result<(), SessionError> {
        if fragment.len() > CAP {
            return Err(SessionError::FragmentTooLarge {
                len: fragment.len(),
                capacity: CAP,
            });
        }

        // Collect into an owned buffer first so the callback below borrows
        // only a local value, not `self` -- `self.reassembler` is already
        // mutably borrowed for the duration of this call.
        let mut frames: Vec<Vec<u8>> = Vec::new();
        self.reassembler
            .push_fragment(fragment, |frame| frames.push(frame.to_vec()));

        for mut frame in frames {
            self.handle_frame(&mut frame);
        }
        Ok(())
    }

    fn handle_frame(&mut self, frame: &mut [u8]) {
        let packet = match frame_decode(frame) {
            Ok(packet) => packet,
            Err(err) => {
                log::warn!("discarding frame: {err}");
                return;
            }
        };

        let outcome = dispatcher::dispatch(
            packet,
            &mut self.expected_sequence,
            &mut self.transfer,
            &mut self.app_store,
            &mut self.filesystem,
            &mut self.settings,
            self.max_entries,
            self.max_chunk,
        );

        match outcome {
            DispatchOutcome::Silent => {}
            DispatchOutcome::Respond(packet) => self.transmit.send(&frame_encode(&packet)),
            DispatchOutcome::RespondThenReboot(packet, arg) => {
                self.transmit.send(&frame_encode(&packet));
                std::thread::sleep(REBOOT_DRAIN_DELAY);
                self.reboot.request_reboot(arg);
            }
        }
    }

    /// Blocks on the fragment queue until the sending half is dropped,
    /// dispatching each fragment as it arrives. This is the session task's
    /// whole run loop (spec §5: "blocking dequeue with no timeout").
    pub fn run_forever(&mut self) {
        while let Ok(fragment) = self.receiver.recv() {
            if let Err(err) = self.push_fragment(&fragment) {
                log::warn!("fragment dropped: {err}");
            }
        }
    }
}
