//! Application-image store handler (spec §4.5).

use badgelink_wire::{
    AppStoreActionReq, AppStoreActionType, AppStoreId, AppStoreMetadata as WireMetadata,
    ResponsePayload, StatusCode,
};

use crate::collaborators::AppStore;
use crate::transfer::{DownloadDescriptor, TransferState, UploadDescriptor};

/// Mirrors the original firmware's `SPI_FLASH_MMU_PAGE_SIZE`.
const FLASH_PAGE_SIZE: u32 = 0x10000;

fn round_up_to_page(size: u32) -> u32 {
    size.div_ceil(FLASH_PAGE_SIZE) * FLASH_PAGE_SIZE
}

#[must_use]
fn wire_metadata(info: &crate::collaborators::AppStoreEntryInfo) -> Option<WireMetadata> {
    Some(WireMetadata {
        slug: badgelink_wire::FixedString::new(&info.slug).ok()?,
        title: badgelink_wire::FixedString::new(&info.title).ok()?,
        version: info.version,
        size: info.size,
    })
}

pub fn handle<AS: AppStore, FH>(
    req: &AppStoreActionReq,
    store: &mut AS,
    transfer: &mut TransferState<AS::Handle, FH>,
    max_entries: usize,
) -> (StatusCode, Option<ResponsePayload>) {
    match req.action {
        AppStoreActionType::List => {
            let mut total = 0u32;
            let mut entries = Vec::new();
            let mut cursor = None;
            while let Some(handle) = store.next_entry(cursor) {
                if let Some(info) = store.entry_info(handle) {
                    if total >= req.list_offset && entries.len() < max_entries {
                        if let Some(meta) = wire_metadata(&info) {
                            entries.push(meta);
                        }
                    }
                    total += 1;
                }
                cursor = Some(handle);
            }
            (StatusCode::Ok, Some(ResponsePayload::AppStoreList { entries, total }))
        }
        AppStoreActionType::Usage => (
            StatusCode::Ok,
            Some(ResponsePayload::AppStoreUsage {
                total_bytes: store.total_bytes(),
                used_bytes: store.total_bytes().saturating_sub(store.free_bytes()),
            }),
        ),
        AppStoreActionType::Delete => {
            let AppStoreId::Slug(slug) = &req.id else {
                return (StatusCode::Malformed, None);
            };
            if !store.exists(slug.as_str()) {
                return (StatusCode::NotFound, None);
            }
            match store.delete(slug.as_str()) {
                Ok(()) => (StatusCode::Ok, None),
                Err(err) => {
                    log::warn!("app-store delete failed: {err}");
                    (StatusCode::InternalError, None)
                }
            }
        }
        AppStoreActionType::Stat => {
            let AppStoreId::Slug(slug) = &req.id else {
                return (StatusCode::Malformed, None);
            };
            let Some(handle) = store.open(slug.as_str()) else {
                return (StatusCode::NotFound, None);
            };
            let Some(info) = store.entry_info(handle) else {
                return (StatusCode::NotFound, None);
            };
            match wire_metadata(&info) {
                Some(meta) => (StatusCode::Ok, Some(ResponsePayload::AppStoreMetadata(meta))),
                None => (StatusCode::InternalError, None),
            }
        }
        AppStoreActionType::Crc32 => {
            let AppStoreId::Slug(slug) = &req.id else {
                return (StatusCode::Malformed, None);
            };
            let Some(handle) = store.open(slug.as_str()) else {
                return (StatusCode::NotFound, None);
            };
            let Some(info) = store.entry_info(handle) else {
                return (StatusCode::NotFound, None);
            };
            match read_whole_via_store(store, handle, info.size) {
                Ok(contents) => {
                    let crc32 = badgelink_wire::crc::checksum(&contents);
                    (StatusCode::Ok, Some(ResponsePayload::Crc32 { size: info.size, crc32 }))
                }
                Err(err) => {
                    log::warn!("app-store CRC read failed: {err}");
                    (StatusCode::InternalError, None)
                }
            }
        }
        AppStoreActionType::Upload => {
            let AppStoreId::NewFile(meta) = &req.id else {
                return (StatusCode::Malformed, None);
            };
            match store.create(meta.slug.as_str(), meta.title.as_str(), meta.version, meta.size) {
                Ok(Some(handle)) => {
                    if let Err(err) = store.erase(handle, 0, round_up_to_page(meta.size)) {
                        log::warn!("app-store erase failed: {err}");
                        let _ = store.delete(meta.slug.as_str());
                        return (StatusCode::InternalError, None);
                    }
                    *transfer = TransferState::UploadingAppStore(UploadDescriptor {
                        handle,
                        position: 0,
                        size: meta.size,
                        expected_crc32: req.crc32,
                        path: None,
                    });
                    (StatusCode::Ok, None)
                }
                Ok(None) => (StatusCode::NoSpace, None),
                Err(err) => {
                    log::warn!("app-store create failed: {err}");
                    (StatusCode::InternalError, None)
                }
            }
        }
        AppStoreActionType::Download => {
            let AppStoreId::Slug(slug) = &req.id else {
                return (StatusCode::Malformed, None);
            };
            let Some(handle) = store.open(slug.as_str()) else {
                return (StatusCode::NotFound, None);
            };
            let Some(info) = store.entry_info(handle) else {
                return (StatusCode::NotFound, None);
            };
            match read_whole_via_store(store, handle, info.size) {
                Ok(contents) => {
                    let crc32 = badgelink_wire::crc::checksum(&contents);
                    *transfer = TransferState::DownloadingAppStore(DownloadDescriptor {
                        handle,
                        position: 0,
                        size: info.size,
                    });
                    (StatusCode::Ok, Some(ResponsePayload::Crc32 { size: info.size, crc32 }))
                }
                Err(err) => {
                    log::warn!("app-store download precompute failed: {err}");
                    (StatusCode::InternalError, None)
                }
            }
        }
    }
}

fn read_whole_via_store<AS: AppStore>(
    store: &mut AS,
    handle: AS::Handle,
    size: u32,
) -> Result<Vec<u8>, AS::Error> {
    let mut buf = vec![0u8; size as usize];
    let mut pos = 0usize;
    while pos < buf.len() {
        let n = store.read(handle, pos as u32, &mut buf[pos..])?;
        if n == 0 {
            break;
        }
        pos += n;
    }
    buf.truncate(pos);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_rounding() {
        assert_eq!(round_up_to_page(1), FLASH_PAGE_SIZE);
        assert_eq!(round_up_to_page(FLASH_PAGE_SIZE), FLASH_PAGE_SIZE);
        assert_eq!(round_up_to_page(FLASH_PAGE_SIZE + 1), FLASH_PAGE_SIZE * 2);
    }
}
