//! Traits the session engine calls out to. Production embedders implement
//! these against real flash, a real filesystem, and a real NVS-style
//! settings store; `badgelink-session`'s test suite implements them
//! in-memory (see the `support` module under `tests/`).

use std::error::Error as StdError;

use badgelink_wire::SettingsValueType;
use thiserror::Error;

/// A single entry returned by [`AppStore::entry_info`] / app-store listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppStoreEntryInfo {
    pub slug: String,
    pub title: String,
    pub version: u32,
    pub size: u32,
}

/// The image store behind the `AppStoreAction` request group.
///
/// `Handle` is an opaque, `Copy` reference to an open or enumerated entry;
/// the session engine never inspects it, only threads it back through later
/// calls.
pub trait AppStore {
    type Error: StdError + 'static;
    type Handle: Copy;

    fn exists(&self, slug: &str) -> bool;
    fn open(&mut self, slug: &str) -> Option<Self::Handle>;
    fn delete(&mut self, slug: &str) -> Result<(), Self::Error>;

    /// Creates a new entry and erases its storage page-aligned for
    /// `size` bytes. Returns `Ok(None)` when the store has insufficient
    /// free space (mapped to `StatusCode::NoSpace`), not an error.
    fn create(
        &mut self,
        slug: &str,
        title: &str,
        version: u32,
        size: u32,
    ) -> Result<Option<Self::Handle>, Self::Error>;

    fn erase(&mut self, handle: Self::Handle, offset: u32, len: u32) -> Result<(), Self::Error>;
    fn write(&mut self, handle: Self::Handle, offset: u32, buf: &[u8]) -> Result<(), Self::Error>;
    fn read(&mut self, handle: Self::Handle, offset: u32, buf: &mut [u8]) -> Result<usize, Self::Error>;
    fn entry_info(&self, handle: Self::Handle) -> Option<AppStoreEntryInfo>;

    /// Yields the next handle in enumeration order after `prev`, or the
    /// first handle when `prev` is `None`.
    fn next_entry(&self, prev: Option<Self::Handle>) -> Option<Self::Handle>;

    fn total_bytes(&self) -> u32;
    fn free_bytes(&self) -> u32;

    /// Selects `handle` as the app to launch on next boot. Returns `false`
    /// if the handle is not a valid, bootable entry.
    fn boot_select(&mut self, handle: Self::Handle, arg: u32) -> bool;
}

/// POSIX-like error classification returned by [`Filesystem`] operations,
/// distinct from an opaque backend I/O failure.
#[derive(Debug, Error)]
pub enum FsError<E> {
    #[error("no such file or directory")]
    NotFound,
    #[error("entry already exists")]
    Exists,
    #[error("is a directory")]
    IsDir,
    #[error("not a directory")]
    IsFile,
    #[error("directory not empty")]
    NotEmpty,
    #[error(transparent)]
    Backend(E),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsDirEntry {
    pub name: String,
    pub is_dir: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStatInfo {
    pub size: u32,
    pub mtime: i64,
    pub ctime: i64,
    pub atime: i64,
    pub is_dir: bool,
}

/// An open file handle, read and written at absolute offsets (the session
/// engine never assumes a file cursor survives across requests).
pub trait FileIo {
    type Error: StdError + 'static;

    fn read_at(&mut self, offset: u32, buf: &mut [u8]) -> Result<usize, Self::Error>;
    fn write_at(&mut self, offset: u32, buf: &[u8]) -> Result<(), Self::Error>;
}

pub trait Filesystem {
    type Error: StdError + 'static;
    type File: FileIo<Error = Self::Error>;
    type DirIter: Iterator<Item = FsDirEntry>;

    fn list_dir(&mut self, path: &str) -> Result<Self::DirIter, FsError<Self::Error>>;
    fn stat(&mut self, path: &str) -> Result<FsStatInfo, FsError<Self::Error>>;
    fn mkdir(&mut self, path: &str) -> Result<(), FsError<Self::Error>>;
    fn rmdir(&mut self, path: &str) -> Result<(), FsError<Self::Error>>;
    fn unlink(&mut self, path: &str) -> Result<(), FsError<Self::Error>>;

    /// Opens `path` for writing, creating or truncating it (`"w+b"`).
    fn create(&mut self, path: &str) -> Result<Self::File, FsError<Self::Error>>;

    /// Opens `path` for reading (`"rb"`).
    fn open(&mut self, path: &str) -> Result<Self::File, FsError<Self::Error>>;
}

/// A typed settings value, independent of wire representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsValueData {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    Str(String),
    Blob(Vec<u8>),
}

impl SettingsValueData {
    #[must_use]
    pub const fn value_type(&self) -> SettingsValueType {
        match self {
            Self::U8(_) => SettingsValueType::U8,
            Self::I8(_) => SettingsValueType::I8,
            Self::U16(_) => SettingsValueType::U16,
            Self::I16(_) => SettingsValueType::I16,
            Self::U32(_) => SettingsValueType::U32,
            Self::I32(_) => SettingsValueType::I32,
            Self::U64(_) => SettingsValueType::U64,
            Self::I64(_) => SettingsValueType::I64,
            Self::Str(_) => SettingsValueType::Str,
            Self::Blob(_) => SettingsValueType::Blob,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsEntryInfo {
    pub namespace: String,
    pub key: String,
    pub value_type: SettingsValueType,
}

/// The namespaced key-value settings store behind `NvsAction`.
pub trait SettingsStore {
    type Error: StdError + 'static;
    type Iter: Iterator<Item = SettingsEntryInfo>;

    fn get(&mut self, namespace: &str, key: &str) -> Result<Option<SettingsValueData>, Self::Error>;
    fn set(&mut self, namespace: &str, key: &str, value: &SettingsValueData) -> Result<(), Self::Error>;

    /// Returns whether an entry was actually present and removed.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<bool, Self::Error>;

    /// Iterates entries, optionally restricted to one namespace.
    fn iter(&mut self, namespace: Option<&str>) -> Result<Self::Iter, Self::Error>;
}

/// Device reboot, invoked by the start-application handler after its
/// response has had time to drain.
pub trait Reboot {
    fn request_reboot(&mut self, arg: u32);
}
