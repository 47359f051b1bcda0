//! The BadgeLink message schema.
//!
//! This module is a narrow, hand-rolled stand-in for the protocol-buffers
//! codec the original firmware generates from its `.proto` schema. The
//! session engine in `badgelink-session` depends only on the shapes defined
//! here and on the [`Encode`]/[`Decode`] traits, so a production embedder
//! can swap this module out for a generated nanopb/micropb codec without
//! touching the dispatcher or transfer engine.

use crate::decode::{decode_vec, Decode, DecodeError, DecodeErrorKind, DecodeWithLength};
use crate::encode::Encode;
use crate::string::FixedString;

/// Maximum length of an application-image slug, including the firmware's
/// title field, a settings namespace/key, and a filesystem path.
pub const SLUG_LEN: usize = 32;
pub const NAMESPACE_LEN: usize = 16;
pub const KEY_LEN: usize = 16;
pub const PATH_LEN: usize = 256;
pub const DIRENT_NAME_LEN: usize = 64;
pub const SETTINGS_STRING_LEN: usize = 128;

/// Wire-stable response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatusCode {
    Ok = 0,
    NotSupported = 1,
    NotFound = 2,
    Malformed = 3,
    InternalError = 4,
    IllegalState = 5,
    NoSpace = 6,
    NotEmpty = 7,
    IsFile = 8,
    IsDir = 9,
    Exists = 10,
}

impl Encode for StatusCode {
    fn size(&self) -> usize {
        1
    }
    fn encode(&self, data: &mut [u8]) {
        data[0] = *self as u8;
    }
}

impl Decode for StatusCode {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(match u8::decode(data)? {
            0 => Self::Ok,
            1 => Self::NotSupported,
            2 => Self::NotFound,
            3 => Self::Malformed,
            4 => Self::InternalError,
            5 => Self::IllegalState,
            6 => Self::NoSpace,
            7 => Self::NotEmpty,
            8 => Self::IsFile,
            9 => Self::IsDir,
            10 => Self::Exists,
            value => {
                return Err(DecodeError::new::<Self>(DecodeErrorKind::UnexpectedTag {
                    value,
                    expected: &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10],
                }))
            }
        })
    }
}

/// Transfer control request, valid only while a transfer is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum XferCtrl {
    Continue = 0,
    Abort = 1,
    Finish = 2,
}

impl Encode for XferCtrl {
    fn size(&self) -> usize {
        1
    }
    fn encode(&self, data: &mut [u8]) {
        data[0] = *self as u8;
    }
}

impl Decode for XferCtrl {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(match u8::decode(data)? {
            0 => Self::Continue,
            1 => Self::Abort,
            2 => Self::Finish,
            value => {
                return Err(DecodeError::new::<Self>(DecodeErrorKind::UnexpectedTag {
                    value,
                    expected: &[0, 1, 2],
                }))
            }
        })
    }
}

/// One packet's worth of transfer payload, bounded by the responding side's
/// chunk capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub position: u32,
    pub data: Vec<u8>,
}

impl Encode for Chunk {
    fn size(&self) -> usize {
        4 + 2 + self.data.len()
    }
    fn encode(&self, data: &mut [u8]) {
        let mut w = crate::encode::MessageEncoder::new(data);
        w.write(&self.position);
        w.write(&(self.data.len() as u16));
        w.write(&self.data);
    }
}

impl Decode for Chunk {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let position = u32::decode(data)?;
        let len = u16::decode(data)? as usize;
        let payload = Vec::<u8>::decode_with_len(data, len)?;
        Ok(Self {
            position,
            data: payload,
        })
    }
}

// --- Application-image store -------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AppStoreActionType {
    List = 0,
    Delete = 1,
    Upload = 2,
    Download = 3,
    Stat = 4,
    Crc32 = 5,
    Usage = 6,
}

impl Encode for AppStoreActionType {
    fn size(&self) -> usize {
        1
    }
    fn encode(&self, data: &mut [u8]) {
        data[0] = *self as u8;
    }
}

impl Decode for AppStoreActionType {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(match u8::decode(data)? {
            0 => Self::List,
            1 => Self::Delete,
            2 => Self::Upload,
            3 => Self::Download,
            4 => Self::Stat,
            5 => Self::Crc32,
            6 => Self::Usage,
            value => {
                return Err(DecodeError::new::<Self>(DecodeErrorKind::UnexpectedTag {
                    value,
                    expected: &[0, 1, 2, 3, 4, 5, 6],
                }))
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppStoreMetadata {
    pub slug: FixedString<SLUG_LEN>,
    pub title: FixedString<SLUG_LEN>,
    pub version: u32,
    pub size: u32,
}

impl Encode for AppStoreMetadata {
    fn size(&self) -> usize {
        SLUG_LEN + SLUG_LEN + 4 + 4
    }
    fn encode(&self, data: &mut [u8]) {
        let mut w = crate::encode::MessageEncoder::new(data);
        w.write(&self.slug);
        w.write(&self.title);
        w.write(&self.version);
        w.write(&self.size);
    }
}

impl Decode for AppStoreMetadata {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            slug: Decode::decode(data)?,
            title: Decode::decode(data)?,
            version: Decode::decode(data)?,
            size: Decode::decode(data)?,
        })
    }
}

/// The identifying part of an app-store request: either nothing (List,
/// Usage), a slug (Delete, Download, Stat, Crc32), or full metadata for a
/// new file (Upload).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppStoreId {
    None,
    Slug(FixedString<SLUG_LEN>),
    NewFile(AppStoreMetadata),
}

impl Encode for AppStoreId {
    fn size(&self) -> usize {
        1 + match self {
            Self::None => 0,
            Self::Slug(s) => s.size(),
            Self::NewFile(m) => m.size(),
        }
    }
    fn encode(&self, data: &mut [u8]) {
        let mut w = crate::encode::MessageEncoder::new(data);
        match self {
            Self::None => w.write(&0u8),
            Self::Slug(s) => {
                w.write(&1u8);
                w.write(s);
            }
            Self::NewFile(m) => {
                w.write(&2u8);
                w.write(m);
            }
        }
    }
}

impl Decode for AppStoreId {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(match u8::decode(data)? {
            0 => Self::None,
            1 => Self::Slug(Decode::decode(data)?),
            2 => Self::NewFile(Decode::decode(data)?),
            value => {
                return Err(DecodeError::new::<Self>(DecodeErrorKind::UnexpectedTag {
                    value,
                    expected: &[0, 1, 2],
                }))
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppStoreActionReq {
    pub action: AppStoreActionType,
    pub list_offset: u32,
    pub id: AppStoreId,
    pub crc32: u32,
}

impl Encode for AppStoreActionReq {
    fn size(&self) -> usize {
        1 + 4 + self.id.size() + 4
    }
    fn encode(&self, data: &mut [u8]) {
        let mut w = crate::encode::MessageEncoder::new(data);
        w.write(&self.action);
        w.write(&self.list_offset);
        w.write(&self.id);
        w.write(&self.crc32);
    }
}

impl Decode for AppStoreActionReq {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            action: Decode::decode(data)?,
            list_offset: Decode::decode(data)?,
            id: Decode::decode(data)?,
            crc32: Decode::decode(data)?,
        })
    }
}

// --- Filesystem -----------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FsActionType {
    List = 0,
    Delete = 1,
    Mkdir = 2,
    Upload = 3,
    Download = 4,
    Stat = 5,
    Rmdir = 6,
}

impl Encode for FsActionType {
    fn size(&self) -> usize {
        1
    }
    fn encode(&self, data: &mut [u8]) {
        data[0] = *self as u8;
    }
}

impl Decode for FsActionType {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(match u8::decode(data)? {
            0 => Self::List,
            1 => Self::Delete,
            2 => Self::Mkdir,
            3 => Self::Upload,
            4 => Self::Download,
            5 => Self::Stat,
            6 => Self::Rmdir,
            value => {
                return Err(DecodeError::new::<Self>(DecodeErrorKind::UnexpectedTag {
                    value,
                    expected: &[0, 1, 2, 3, 4, 5, 6],
                }))
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsActionReq {
    pub action: FsActionType,
    pub path: FixedString<PATH_LEN>,
    pub list_offset: u32,
    pub size: u32,
    pub crc32: u32,
}

impl Encode for FsActionReq {
    fn size(&self) -> usize {
        1 + PATH_LEN + 4 + 4 + 4
    }
    fn encode(&self, data: &mut [u8]) {
        let mut w = crate::encode::MessageEncoder::new(data);
        w.write(&self.action);
        w.write(&self.path);
        w.write(&self.list_offset);
        w.write(&self.size);
        w.write(&self.crc32);
    }
}

impl Decode for FsActionReq {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            action: Decode::decode(data)?,
            path: Decode::decode(data)?,
            list_offset: Decode::decode(data)?,
            size: Decode::decode(data)?,
            crc32: Decode::decode(data)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsDirent {
    pub name: FixedString<DIRENT_NAME_LEN>,
    pub is_dir: bool,
}

impl Encode for FsDirent {
    fn size(&self) -> usize {
        DIRENT_NAME_LEN + 1
    }
    fn encode(&self, data: &mut [u8]) {
        let mut w = crate::encode::MessageEncoder::new(data);
        w.write(&self.name);
        w.write(&self.is_dir);
    }
}

impl Decode for FsDirent {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            name: Decode::decode(data)?,
            is_dir: Decode::decode(data)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStat {
    pub size: u32,
    pub mtime: i64,
    pub ctime: i64,
    pub atime: i64,
    pub is_dir: bool,
}

impl Encode for FsStat {
    fn size(&self) -> usize {
        4 + 8 + 8 + 8 + 1
    }
    fn encode(&self, data: &mut [u8]) {
        let mut w = crate::encode::MessageEncoder::new(data);
        w.write(&self.size);
        w.write(&self.mtime);
        w.write(&self.ctime);
        w.write(&self.atime);
        w.write(&self.is_dir);
    }
}

impl Decode for FsStat {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            size: Decode::decode(data)?,
            mtime: Decode::decode(data)?,
            ctime: Decode::decode(data)?,
            atime: Decode::decode(data)?,
            is_dir: Decode::decode(data)?,
        })
    }
}

// --- Settings store (NVS) ---------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SettingsActionType {
    List = 0,
    Read = 1,
    Write = 2,
    Delete = 3,
}

impl Encode for SettingsActionType {
    fn size(&self) -> usize {
        1
    }
    fn encode(&self, data: &mut [u8]) {
        data[0] = *self as u8;
    }
}

impl Decode for SettingsActionType {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(match u8::decode(data)? {
            0 => Self::List,
            1 => Self::Read,
            2 => Self::Write,
            3 => Self::Delete,
            value => {
                return Err(DecodeError::new::<Self>(DecodeErrorKind::UnexpectedTag {
                    value,
                    expected: &[0, 1, 2, 3],
                }))
            }
        })
    }
}

/// The declared type of a settings value, independent of which union arm
/// (`numeric`/`string`/`blob`) is actually populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SettingsValueType {
    U8 = 0,
    I8 = 1,
    U16 = 2,
    I16 = 3,
    U32 = 4,
    I32 = 5,
    U64 = 6,
    I64 = 7,
    Str = 8,
    Blob = 9,
}

impl SettingsValueType {
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::U8 | Self::I8 | Self::U16 | Self::I16 | Self::U32 | Self::I32 | Self::U64 | Self::I64
        )
    }
}

impl Encode for SettingsValueType {
    fn size(&self) -> usize {
        1
    }
    fn encode(&self, data: &mut [u8]) {
        data[0] = *self as u8;
    }
}

impl Decode for SettingsValueType {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(match u8::decode(data)? {
            0 => Self::U8,
            1 => Self::I8,
            2 => Self::U16,
            3 => Self::I16,
            4 => Self::U32,
            5 => Self::I32,
            6 => Self::U64,
            7 => Self::I64,
            8 => Self::Str,
            9 => Self::Blob,
            value => {
                return Err(DecodeError::new::<Self>(DecodeErrorKind::UnexpectedTag {
                    value,
                    expected: &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9],
                }))
            }
        })
    }
}

/// The value union's populated arm, independent of the declared
/// [`SettingsValueType`] width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsValuePayload {
    Numeric(i64),
    Str(FixedString<SETTINGS_STRING_LEN>),
    Blob(Vec<u8>),
}

impl SettingsValuePayload {
    #[must_use]
    pub const fn matches_type(&self, ty: SettingsValueType) -> bool {
        match self {
            Self::Numeric(_) => ty.is_numeric(),
            Self::Str(_) => matches!(ty, SettingsValueType::Str),
            Self::Blob(_) => matches!(ty, SettingsValueType::Blob),
        }
    }
}

impl Encode for SettingsValuePayload {
    fn size(&self) -> usize {
        1 + match self {
            Self::Numeric(_) => 8,
            Self::Str(s) => s.size(),
            Self::Blob(b) => 2 + b.len(),
        }
    }
    fn encode(&self, data: &mut [u8]) {
        let mut w = crate::encode::MessageEncoder::new(data);
        match self {
            Self::Numeric(n) => {
                w.write(&0u8);
                w.write(n);
            }
            Self::Str(s) => {
                w.write(&1u8);
                w.write(s);
            }
            Self::Blob(b) => {
                w.write(&2u8);
                w.write(&(b.len() as u16));
                w.write(b);
            }
        }
    }
}

impl Decode for SettingsValuePayload {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(match u8::decode(data)? {
            0 => Self::Numeric(Decode::decode(data)?),
            1 => Self::Str(Decode::decode(data)?),
            2 => {
                let len = u16::decode(data)? as usize;
                Self::Blob(Vec::<u8>::decode_with_len(data, len)?)
            }
            value => {
                return Err(DecodeError::new::<Self>(DecodeErrorKind::UnexpectedTag {
                    value,
                    expected: &[0, 1, 2],
                }))
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsValue {
    pub ty: SettingsValueType,
    pub payload: SettingsValuePayload,
}

impl Encode for SettingsValue {
    fn size(&self) -> usize {
        self.ty.size() + self.payload.size()
    }
    fn encode(&self, data: &mut [u8]) {
        let mut w = crate::encode::MessageEncoder::new(data);
        w.write(&self.ty);
        w.write(&self.payload);
    }
}

impl Decode for SettingsValue {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            ty: Decode::decode(data)?,
            payload: Decode::decode(data)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsEntry {
    pub namespace: FixedString<NAMESPACE_LEN>,
    pub key: FixedString<KEY_LEN>,
    pub ty: SettingsValueType,
}

impl Encode for SettingsEntry {
    fn size(&self) -> usize {
        NAMESPACE_LEN + KEY_LEN + 1
    }
    fn encode(&self, data: &mut [u8]) {
        let mut w = crate::encode::MessageEncoder::new(data);
        w.write(&self.namespace);
        w.write(&self.key);
        w.write(&self.ty);
    }
}

impl Decode for SettingsEntry {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            namespace: Decode::decode(data)?,
            key: Decode::decode(data)?,
            ty: Decode::decode(data)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsActionReq {
    pub action: SettingsActionType,
    pub namespace: FixedString<NAMESPACE_LEN>,
    pub key: FixedString<KEY_LEN>,
    pub list_offset: u32,
    pub read_type: SettingsValueType,
    pub wdata: Option<SettingsValue>,
}

impl Encode for SettingsActionReq {
    fn size(&self) -> usize {
        1 + NAMESPACE_LEN
            + KEY_LEN
            + 4
            + 1
            + 1
            + self.wdata.as_ref().map_or(0, Encode::size)
    }
    fn encode(&self, data: &mut [u8]) {
        let mut w = crate::encode::MessageEncoder::new(data);
        w.write(&self.action);
        w.write(&self.namespace);
        w.write(&self.key);
        w.write(&self.list_offset);
        w.write(&self.read_type);
        w.write(&self.wdata.is_some());
        if let Some(wdata) = &self.wdata {
            w.write(wdata);
        }
    }
}

impl Decode for SettingsActionReq {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let action = Decode::decode(data)?;
        let namespace = Decode::decode(data)?;
        let key = Decode::decode(data)?;
        let list_offset = Decode::decode(data)?;
        let read_type = Decode::decode(data)?;
        let has_wdata = bool::decode(data)?;
        let wdata = if has_wdata {
            Some(Decode::decode(data)?)
        } else {
            None
        };
        Ok(Self {
            action,
            namespace,
            key,
            list_offset,
            read_type,
            wdata,
        })
    }
}

// --- Top-level request / response / packet ---------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    StartApp {
        slug: FixedString<SLUG_LEN>,
        arg: u32,
    },
    SettingsAction(SettingsActionReq),
    AppStoreAction(AppStoreActionReq),
    FsAction(FsActionReq),
    UploadChunk(Chunk),
    XferCtrl(XferCtrl),
}

impl Request {
    const TAG_START_APP: u8 = 0;
    const TAG_SETTINGS: u8 = 1;
    const TAG_APP_STORE: u8 = 2;
    const TAG_FS: u8 = 3;
    const TAG_UPLOAD_CHUNK: u8 = 4;
    const TAG_XFER_CTRL: u8 = 5;
}

impl Encode for Request {
    fn size(&self) -> usize {
        1 + match self {
            Self::StartApp { slug, arg } => slug.size() + arg.size(),
            Self::SettingsAction(r) => r.size(),
            Self::AppStoreAction(r) => r.size(),
            Self::FsAction(r) => r.size(),
            Self::UploadChunk(c) => c.size(),
            Self::XferCtrl(c) => c.size(),
        }
    }
    fn encode(&self, data: &mut [u8]) {
        let mut w = crate::encode::MessageEncoder::new(data);
        match self {
            Self::StartApp { slug, arg } => {
                w.write(&Self::TAG_START_APP);
                w.write(slug);
                w.write(arg);
            }
            Self::SettingsAction(r) => {
                w.write(&Self::TAG_SETTINGS);
                w.write(r);
            }
            Self::AppStoreAction(r) => {
                w.write(&Self::TAG_APP_STORE);
                w.write(r);
            }
            Self::FsAction(r) => {
                w.write(&Self::TAG_FS);
                w.write(r);
            }
            Self::UploadChunk(c) => {
                w.write(&Self::TAG_UPLOAD_CHUNK);
                w.write(c);
            }
            Self::XferCtrl(c) => {
                w.write(&Self::TAG_XFER_CTRL);
                w.write(c);
            }
        }
    }
}

impl Decode for Request {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(match u8::decode(data)? {
            Self::TAG_START_APP => Self::StartApp {
                slug: Decode::decode(data)?,
                arg: Decode::decode(data)?,
            },
            Self::TAG_SETTINGS => Self::SettingsAction(Decode::decode(data)?),
            Self::TAG_APP_STORE => Self::AppStoreAction(Decode::decode(data)?),
            Self::TAG_FS => Self::FsAction(Decode::decode(data)?),
            Self::TAG_UPLOAD_CHUNK => Self::UploadChunk(Decode::decode(data)?),
            Self::TAG_XFER_CTRL => Self::XferCtrl(Decode::decode(data)?),
            value => {
                return Err(DecodeError::new::<Self>(DecodeErrorKind::UnexpectedTag {
                    value,
                    expected: &[0, 1, 2, 3, 4, 5],
                }))
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsePayload {
    AppStoreList {
        entries: Vec<AppStoreMetadata>,
        total: u32,
    },
    AppStoreMetadata(AppStoreMetadata),
    AppStoreUsage {
        total_bytes: u32,
        used_bytes: u32,
    },
    FsList {
        entries: Vec<FsDirent>,
        total: u32,
    },
    FsStat(FsStat),
    Crc32 {
        size: u32,
        crc32: u32,
    },
    DownloadChunk(Chunk),
    SettingsValue(SettingsValue),
    SettingsEntries {
        entries: Vec<SettingsEntry>,
        total: u32,
    },
}

impl ResponsePayload {
    const TAG_APP_STORE_LIST: u8 = 0;
    const TAG_APP_STORE_METADATA: u8 = 1;
    const TAG_APP_STORE_USAGE: u8 = 2;
    const TAG_FS_LIST: u8 = 3;
    const TAG_FS_STAT: u8 = 4;
    const TAG_CRC32: u8 = 5;
    const TAG_DOWNLOAD_CHUNK: u8 = 6;
    const TAG_SETTINGS_VALUE: u8 = 7;
    const TAG_SETTINGS_ENTRIES: u8 = 8;
}

impl Encode for ResponsePayload {
    fn size(&self) -> usize {
        1 + match self {
            Self::AppStoreList { entries, .. } => {
                2 + 4 + entries.iter().map(Encode::size).sum::<usize>()
            }
            Self::AppStoreMetadata(m) => m.size(),
            Self::AppStoreUsage { .. } => 8,
            Self::FsList { entries, .. } => 2 + 4 + entries.iter().map(Encode::size).sum::<usize>(),
            Self::FsStat(s) => s.size(),
            Self::Crc32 { .. } => 8,
            Self::DownloadChunk(c) => c.size(),
            Self::SettingsValue(v) => v.size(),
            Self::SettingsEntries { entries, .. } => {
                2 + 4 + entries.iter().map(Encode::size).sum::<usize>()
            }
        }
    }

    fn encode(&self, data: &mut [u8]) {
        let mut w = crate::encode::MessageEncoder::new(data);
        match self {
            Self::AppStoreList { entries, total } => {
                w.write(&Self::TAG_APP_STORE_LIST);
                w.write(&(entries.len() as u16));
                for e in entries {
                    w.write(e);
                }
                w.write(total);
            }
            Self::AppStoreMetadata(m) => {
                w.write(&Self::TAG_APP_STORE_METADATA);
                w.write(m);
            }
            Self::AppStoreUsage {
                total_bytes,
                used_bytes,
            } => {
                w.write(&Self::TAG_APP_STORE_USAGE);
                w.write(total_bytes);
                w.write(used_bytes);
            }
            Self::FsList { entries, total } => {
                w.write(&Self::TAG_FS_LIST);
                w.write(&(entries.len() as u16));
                for e in entries {
                    w.write(e);
                }
                w.write(total);
            }
            Self::FsStat(s) => {
                w.write(&Self::TAG_FS_STAT);
                w.write(s);
            }
            Self::Crc32 { size, crc32 } => {
                w.write(&Self::TAG_CRC32);
                w.write(size);
                w.write(crc32);
            }
            Self::DownloadChunk(c) => {
                w.write(&Self::TAG_DOWNLOAD_CHUNK);
                w.write(c);
            }
            Self::SettingsValue(v) => {
                w.write(&Self::TAG_SETTINGS_VALUE);
                w.write(v);
            }
            Self::SettingsEntries { entries, total } => {
                w.write(&Self::TAG_SETTINGS_ENTRIES);
                w.write(&(entries.len() as u16));
                for e in entries {
                    w.write(e);
                }
                w.write(total);
            }
        }
    }
}

impl Decode for ResponsePayload {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(match u8::decode(data)? {
            Self::TAG_APP_STORE_LIST => {
                let len = u16::decode(data)? as usize;
                let entries = decode_vec::<AppStoreMetadata>(data, len)?;
                let total = Decode::decode(data)?;
                Self::AppStoreList { entries, total }
            }
            Self::TAG_APP_STORE_METADATA => Self::AppStoreMetadata(Decode::decode(data)?),
            Self::TAG_APP_STORE_USAGE => Self::AppStoreUsage {
                total_bytes: Decode::decode(data)?,
                used_bytes: Decode::decode(data)?,
            },
            Self::TAG_FS_LIST => {
                let len = u16::decode(data)? as usize;
                let entries = decode_vec::<FsDirent>(data, len)?;
                let total = Decode::decode(data)?;
                Self::FsList { entries, total }
            }
            Self::TAG_FS_STAT => Self::FsStat(Decode::decode(data)?),
            Self::TAG_CRC32 => Self::Crc32 {
                size: Decode::decode(data)?,
                crc32: Decode::decode(data)?,
            },
            Self::TAG_DOWNLOAD_CHUNK => Self::DownloadChunk(Decode::decode(data)?),
            Self::TAG_SETTINGS_VALUE => Self::SettingsValue(Decode::decode(data)?),
            Self::TAG_SETTINGS_ENTRIES => {
                let len = u16::decode(data)? as usize;
                let entries = decode_vec::<SettingsEntry>(data, len)?;
                let total = Decode::decode(data)?;
                Self::SettingsEntries { entries, total }
            }
            value => {
                return Err(DecodeError::new::<Self>(DecodeErrorKind::UnexpectedTag {
                    value,
                    expected: &[0, 1, 2, 3, 4, 5, 6, 7, 8],
                }))
            }
        })
    }
}

/// The only on-wire message shape: a handshake, a request, or a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Sync { sequence: u32, ok: bool },
    Request { sequence: u32, body: Request },
    Response {
        status: StatusCode,
        body: Option<ResponsePayload>,
    },
}

impl Packet {
    const TAG_SYNC: u8 = 0;
    const TAG_REQUEST: u8 = 1;
    const TAG_RESPONSE: u8 = 2;

    #[must_use]
    pub fn response_ok(body: Option<ResponsePayload>) -> Self {
        Self::Response {
            status: StatusCode::Ok,
            body,
        }
    }

    #[must_use]
    pub fn status(status: StatusCode) -> Self {
        Self::Response { status, body: None }
    }
}

impl Encode for Packet {
    fn size(&self) -> usize {
        1 + match self {
            Self::Sync { ok, .. } => 4 + ok.size(),
            Self::Request { body, .. } => 4 + body.size(),
            Self::Response { status, body } => {
                status.size() + 1 + body.as_ref().map_or(0, Encode::size)
            }
        }
    }

    fn encode(&self, data: &mut [u8]) {
        let mut w = crate::encode::MessageEncoder::new(data);
        match self {
            Self::Sync { sequence, ok } => {
                w.write(&Self::TAG_SYNC);
                w.write(sequence);
                w.write(ok);
            }
            Self::Request { sequence, body } => {
                w.write(&Self::TAG_REQUEST);
                w.write(sequence);
                w.write(body);
            }
            Self::Response { status, body } => {
                w.write(&Self::TAG_RESPONSE);
                w.write(status);
                w.write(&body.is_some());
                if let Some(body) = body {
                    w.write(body);
                }
            }
        }
    }
}

impl Decode for Packet {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(match u8::decode(data)? {
            Self::TAG_SYNC => Self::Sync {
                sequence: Decode::decode(data)?,
                ok: Decode::decode(data)?,
            },
            Self::TAG_REQUEST => Self::Request {
                sequence: Decode::decode(data)?,
                body: Decode::decode(data)?,
            },
            Self::TAG_RESPONSE => {
                let status = Decode::decode(data)?;
                let has_body = bool::decode(data)?;
                let body = if has_body {
                    Some(Decode::decode(data)?)
                } else {
                    None
                };
                Self::Response { status, body }
            }
            value => {
                return Err(DecodeError::new::<Self>(DecodeErrorKind::UnexpectedTag {
                    value,
                    expected: &[0, 1, 2],
                }))
            }
        })
    }
}
