//! The BadgeLink session engine: byte-stream reassembly, packet dispatch,
//! duplicate suppression, and the upload/download transfer state machine,
//! built on top of `badgelink-wire`'s frame and packet codecs.
//!
//! The engine never touches flash, a filesystem, or NVS directly; it calls
//! out through the [`collaborators`] traits, which a production embedder
//! implements against the real hardware.

pub mod collaborators;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod reassembler;
pub mod session;
pub mod transfer;
pub mod xfer_engine;

pub use collaborators::{
    AppStore, AppStoreEntryInfo, FileIo, Filesystem, FsDirEntry, FsError, FsStatInfo, Reboot,
    SettingsEntryInfo, SettingsStore, SettingsValueData,
};
pub use dispatcher::{dispatch, is_stale, DispatchOutcome};
pub use error::SessionError;
pub use reassembler::Reassembler;
pub use session::{channel, Session, Transmit};
pub use transfer::{Direction, DownloadDescriptor, TransferState, UploadDescriptor};
