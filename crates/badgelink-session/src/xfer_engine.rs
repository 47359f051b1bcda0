//! Transfer engine (spec §4.6): enforces the upload/download state machine
//! once a transfer has been started by an app-store or filesystem handler.

use badgelink_wire::{Chunk, ResponsePayload, StatusCode, XferCtrl};

use crate::collaborators::{AppStore, FileIo, Filesystem};
use crate::transfer::{Direction, TransferState};

/// Deletes/closes the backend resource behind whatever transfer is active,
/// if any. Used both for explicit aborts and for abnormal termination.
pub fn abort_active<AS: AppStore, FS: Filesystem>(
    transfer: &mut TransferState<AS::Handle, FS::File>,
    app_store: &mut AS,
    filesystem: &mut FS,
) {
    match transfer.take() {
        TransferState::Idle => {}
        TransferState::UploadingAppStore(desc) => {
            if let Some(info) = app_store.entry_info(desc.handle) {
                if let Err(err) = app_store.delete(&info.slug) {
                    log::warn!("failed to delete aborted app-store upload: {err}");
                }
            }
        }
        TransferState::UploadingFs(desc) => {
            if let Some(path) = &desc.path {
                if let Err(err) = filesystem.unlink(path) {
                    log::warn!("failed to delete aborted fs upload {path}: {err}");
                }
            }
        }
        // Downloads never hold exclusive storage that must be rolled back;
        // closing is implicit once the handle is dropped.
        TransferState::DownloadingAppStore(_) | TransferState::DownloadingFs(_) => {}
    }
}

/// Handles an `UploadChunk` request while a transfer is active.
///
/// Returns `None` when no transfer is active or the wrong direction is
/// active; the caller (the dispatcher) is responsible for aborting
/// abnormally and responding `IllegalState` in that case.
pub fn handle_upload_chunk<AS: AppStore, FS: Filesystem>(
    transfer: &mut TransferState<AS::Handle, FS::File>,
    app_store: &mut AS,
    filesystem: &mut FS,
    chunk: &Chunk,
) -> Option<StatusCode> {
    if transfer.direction() != Some(Direction::Upload) {
        return None;
    }

    let status = match transfer {
        TransferState::UploadingAppStore(desc) => {
            if chunk.position != desc.position
                || u64::from(chunk.position) + chunk.data.len() as u64 > u64::from(desc.size)
            {
                Some(StatusCode::IllegalState)
            } else {
                match app_store.write(desc.handle, desc.position, &chunk.data) {
                    Ok(()) => {
                        desc.position += chunk.data.len() as u32;
                        Some(StatusCode::Ok)
                    }
                    Err(err) => {
                        log::warn!("app-store upload write failed: {err}");
                        Some(StatusCode::InternalError)
                    }
                }
            }
        }
        TransferState::UploadingFs(desc) => {
            if chunk.position != desc.position
                || u64::from(chunk.position) + chunk.data.len() as u64 > u64::from(desc.size)
            {
                Some(StatusCode::IllegalState)
            } else {
                match desc.handle.write_at(desc.position, &chunk.data) {
                    Ok(()) => {
                        desc.position += chunk.data.len() as u32;
                        Some(StatusCode::Ok)
                    }
                    Err(err) => {
                        log::warn!("fs upload write failed: {err}");
                        Some(StatusCode::InternalError)
                    }
                }
            }
        }
        _ => unreachable!("direction checked above"),
    };

    // Only a pos/size violation aborts the transfer outright; a backend
    // write failure leaves it active so the host can retry the chunk
    // (original_source/components/badgelink/badgelink_appfs.c:64-73,
    // badgelink_fs.c:58-72 — both report the error status with no stop call).
    if status == Some(StatusCode::IllegalState) {
        abort_active(transfer, app_store, filesystem);
    }
    status
}

/// Re-reads the full contents just written during an upload and compares
/// its CRC-32 against the host-declared value (spec: "not derived from the
/// bytes the host sent, so it detects silent storage corruption").
fn verify_upload_crc(data: &[u8], expected: u32) -> bool {
    badgelink_wire::crc::checksum(data) == expected
}

fn read_whole<E: std::error::Error>(
    mut read_at: impl FnMut(u32, &mut [u8]) -> Result<usize, E>,
    size: u32,
) -> Result<Vec<u8>, E> {
    let mut buf = vec![0u8; size as usize];
    let mut pos = 0usize;
    while pos < buf.len() {
        let n = read_at(pos as u32, &mut buf[pos..])?;
        if n == 0 {
            break;
        }
        pos += n;
    }
    buf.truncate(pos);
    Ok(buf)
}

/// Handles an `XferCtrl` request while a transfer is active, for a
/// `max_chunk`-byte download page size. Returns `None` when no transfer is
/// active (caller emits `IllegalState`).
pub fn handle_xfer_ctrl<AS: AppStore, FS: Filesystem>(
    transfer: &mut TransferState<AS::Handle, FS::File>,
    app_store: &mut AS,
    filesystem: &mut FS,
    ctrl: XferCtrl,
    max_chunk: usize,
) -> Option<(StatusCode, Option<ResponsePayload>)> {
    if !transfer.is_active() {
        return None;
    }

    match ctrl {
        XferCtrl::Abort => {
            abort_active(transfer, app_store, filesystem);
            None
        }
        XferCtrl::Continue => match transfer.direction() {
            Some(Direction::Upload) => {
                // Continue is not meaningful while uploading; treat like
                // any other mismatched request (I3/I4: abort abnormally).
                abort_active(transfer, app_store, filesystem);
                Some((StatusCode::IllegalState, None))
            }
            Some(Direction::Download) => {
                let (position, data) = match transfer {
                    TransferState::DownloadingAppStore(desc) => {
                        let remaining = (desc.size - desc.position).min(max_chunk as u32);
                        let mut buf = vec![0u8; remaining as usize];
                        match app_store.read(desc.handle, desc.position, &mut buf) {
                            Ok(n) => {
                                buf.truncate(n);
                                let position = desc.position;
                                desc.position += n as u32;
                                (position, buf)
                            }
                            Err(err) => {
                                log::warn!("app-store download read failed: {err}");
                                abort_active(transfer, app_store, filesystem);
                                return Some((StatusCode::InternalError, None));
                            }
                        }
                    }
                    TransferState::DownloadingFs(desc) => {
                        let remaining = (desc.size - desc.position).min(max_chunk as u32);
                        let mut buf = vec![0u8; remaining as usize];
                        match desc.handle.read_at(desc.position, &mut buf) {
                            Ok(n) => {
                                buf.truncate(n);
                                let position = desc.position;
                                desc.position += n as u32;
                                (position, buf)
                            }
                            Err(err) => {
                                log::warn!("fs download read failed: {err}");
                                abort_active(transfer, app_store, filesystem);
                                return Some((StatusCode::InternalError, None));
                            }
                        }
                    }
                    _ => unreachable!("direction checked above"),
                };
                Some((
                    StatusCode::Ok,
                    Some(ResponsePayload::DownloadChunk(Chunk { position, data })),
                ))
            }
            None => unreachable!("is_active checked above"),
        },
        XferCtrl::Finish => {
            let direction = transfer.direction();
            match direction {
                Some(Direction::Upload) => {
                    let desc = transfer.take();
                    match desc {
                        TransferState::UploadingAppStore(d) => {
                            let slug = app_store.entry_info(d.handle).map(|info| info.slug);
                            if d.position != d.size {
                                if let Some(slug) = &slug {
                                    let _ = app_store.delete(slug);
                                }
                                Some((StatusCode::IllegalState, None))
                            } else {
                                let verify = read_whole(
                                    |offset, buf| app_store.read(d.handle, offset, buf),
                                    d.size,
                                );
                                match verify {
                                    Ok(contents) if verify_upload_crc(&contents, d.expected_crc32) => {
                                        Some((StatusCode::Ok, None))
                                    }
                                    result => {
                                        if let Err(err) = &result {
                                            log::warn!("failed to re-read upload for CRC check: {err}");
                                        } else {
                                            log::warn!("upload CRC mismatch, deleting partial file");
                                        }
                                        if let Some(slug) = &slug {
                                            let _ = app_store.delete(slug);
                                        }
                                        Some((StatusCode::InternalError, None))
                                    }
                                }
                            }
                        }
                        TransferState::UploadingFs(mut d) => {
                            if d.position != d.size {
                                if let Some(path) = &d.path {
                                    let _ = filesystem.unlink(path);
                                }
                                Some((StatusCode::IllegalState, None))
                            } else {
                                let verify = read_whole(|offset, buf| d.handle.read_at(offset, buf), d.size);
                                match verify {
                                    Ok(contents) if verify_upload_crc(&contents, d.expected_crc32) => {
                                        Some((StatusCode::Ok, None))
                                    }
                                    result => {
                                        if let Err(err) = &result {
                                            log::warn!("failed to re-read upload for CRC check: {err}");
                                        } else {
                                            log::warn!("upload CRC mismatch, deleting partial file");
                                        }
                                        if let Some(path) = &d.path {
                                            let _ = filesystem.unlink(path);
                                        }
                                        Some((StatusCode::InternalError, None))
                                    }
                                }
                            }
                        }
                        _ => unreachable!("direction checked above"),
                    }
                }
                Some(Direction::Download) => {
                    let desc = transfer.take();
                    let (position, size) = match desc {
                        TransferState::DownloadingAppStore(d) => (d.position, d.size),
                        TransferState::DownloadingFs(d) => (d.position, d.size),
                        _ => unreachable!("direction checked above"),
                    };
                    if position == size {
                        Some((StatusCode::Ok, None))
                    } else {
                        Some((StatusCode::IllegalState, None))
                    }
                }
                None => unreachable!("is_active checked above"),
            }
        }
    }
}
