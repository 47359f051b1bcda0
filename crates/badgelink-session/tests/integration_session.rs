//! End-to-end coverage of the dispatcher and transfer engine, driven the
//! way a real transport would: COBS/CRC-framed bytes in, framed bytes out.

mod support;

use std::cell::RefCell;
use std::rc::Rc;

use badgelink_session::{channel, AppStore, Session, Transmit};
use badgelink_wire::{
    frame_decode, frame_encode, AppStoreActionReq, AppStoreActionType, AppStoreId,
    AppStoreMetadata, Chunk, FixedString, FsActionReq, FsActionType, Packet, Request,
    ResponsePayload, SettingsActionReq, SettingsActionType, SettingsValue, SettingsValuePayload,
    SettingsValueType, StatusCode, XferCtrl,
};

use support::{MockAppStore, MockFilesystem, MockReboot, MockSettingsStore};

const CAP: usize = 512;

#[derive(Clone, Default)]
struct TestTransmit {
    sent: Rc<RefCell<Vec<Vec<u8>>>>,
}

impl Transmit for TestTransmit {
    fn send(&mut self, frame: &[u8]) {
        self.sent.borrow_mut().push(frame.to_vec());
    }
}

/// Drives a `Session` over framed bytes without spinning up the
/// `std::thread` + `mpsc` plumbing `run_forever` expects: `push_fragment`
/// is called directly, one whole frame at a time.
struct Harness {
    session: Session<MockAppStore, MockFilesystem, MockSettingsStore, MockReboot, TestTransmit, CAP>,
    sent: Rc<RefCell<Vec<Vec<u8>>>>,
    sequence: u32,
}

impl Harness {
    fn new(app_store: MockAppStore, filesystem: MockFilesystem, settings: MockSettingsStore, reboot: MockReboot) -> Self {
        let (_sender, receiver) = channel(4);
        let transmit = TestTransmit::default();
        let sent = transmit.sent.clone();
        let session = Session::new(app_store, filesystem, settings, reboot, transmit, receiver)
            .expect("512 bytes comfortably clears the minimum buffer");
        Self {
            session,
            sent,
            sequence: 0,
        }
    }

    /// Sends a `Sync` handshake and consumes its echo, establishing sequence 0.
    fn sync(&mut self) {
        let frame = frame_encode(&Packet::Sync { sequence: 0, ok: true });
        self.session.push_fragment(&frame).unwrap();
        let echoed = self.take_one();
        assert_eq!(echoed, Packet::Sync { sequence: 0, ok: true });
        self.sequence = 1;
    }

    /// Sends one request and returns the single response packet it produced,
    /// or `None` if the dispatcher stayed silent.
    fn request(&mut self, body: Request) -> Option<Packet> {
        let sequence = self.sequence;
        self.sequence += 1;
        let frame = frame_encode(&Packet::Request { sequence, body });
        self.session.push_fragment(&frame).unwrap();
        self.take()
    }

    fn take(&mut self) -> Option<Packet> {
        let mut sent = self.sent.borrow_mut();
        if sent.is_empty() {
            return None;
        }
        let mut frame = sent.remove(0);
        Some(frame_decode(&mut frame).expect("every response this engine emits is well-formed"))
    }

    fn take_one(&mut self) -> Packet {
        self.take().expect("expected exactly one response frame")
    }

    fn assert_silent(&mut self) {
        assert!(self.sent.borrow().is_empty(), "expected no response frame");
    }
}

fn upload_request(path: &str, size: u32, crc32: u32) -> Request {
    Request::FsAction(FsActionReq {
        action: FsActionType::Upload,
        path: FixedString::new(path).unwrap(),
        list_offset: 0,
        size,
        crc32,
    })
}

#[test]
fn sync_then_echo_establishes_sequence() {
    let mut h = Harness::new(
        MockAppStore::default(),
        MockFilesystem::default(),
        MockSettingsStore::default(),
        MockReboot::default(),
    );
    h.sync();
}

#[test]
fn duplicate_sequence_after_sync_is_dropped_silently() {
    let mut h = Harness::new(
        MockAppStore::default(),
        MockFilesystem::default(),
        MockSettingsStore::default(),
        MockReboot::default(),
    );
    h.sync();

    // Replay sequence 0 (already consumed by the Sync handshake) as a
    // stray request: the dispatcher must drop it without responding.
    let frame = frame_encode(&Packet::Request {
        sequence: 0,
        body: Request::FsAction(FsActionReq {
            action: FsActionType::Stat,
            path: FixedString::new("/dup.txt").unwrap(),
            list_offset: 0,
            size: 0,
            crc32: 0,
        }),
    });
    h.session.push_fragment(&frame).unwrap();
    h.assert_silent();
}

#[test]
fn upload_with_correct_crc_persists_the_file() {
    let filesystem = MockFilesystem::default();
    let mut h = Harness::new(
        MockAppStore::default(),
        filesystem.clone(),
        MockSettingsStore::default(),
        MockReboot::default(),
    );
    h.sync();

    let content = b"hello, badge!".to_vec();
    let crc32 = badgelink_wire::crc::checksum(&content);

    let resp = h
        .request(upload_request("/apps/note.txt", content.len() as u32, crc32))
        .unwrap();
    assert_eq!(resp, Packet::status(StatusCode::Ok));

    let resp = h
        .request(Request::UploadChunk(Chunk {
            position: 0,
            data: content.clone(),
        }))
        .unwrap();
    assert_eq!(resp, Packet::status(StatusCode::Ok));

    let resp = h.request(Request::XferCtrl(XferCtrl::Finish)).unwrap();
    assert_eq!(resp, Packet::status(StatusCode::Ok));

    assert_eq!(filesystem.get("/apps/note.txt"), Some(content));
}

#[test]
fn upload_with_wrong_crc_is_rejected_and_file_deleted() {
    let filesystem = MockFilesystem::default();
    let mut h = Harness::new(
        MockAppStore::default(),
        filesystem.clone(),
        MockSettingsStore::default(),
        MockReboot::default(),
    );
    h.sync();

    let content = b"corrupted?".to_vec();
    let wrong_crc = badgelink_wire::crc::checksum(&content).wrapping_add(1);

    h.request(upload_request("/apps/bad.txt", content.len() as u32, wrong_crc))
        .unwrap();
    h.request(Request::UploadChunk(Chunk {
        position: 0,
        data: content,
    }))
    .unwrap();

    let resp = h.request(Request::XferCtrl(XferCtrl::Finish)).unwrap();
    assert_eq!(resp, Packet::status(StatusCode::InternalError));
    assert!(!filesystem.contains("/apps/bad.txt"));
}

#[test]
fn chunk_at_wrong_position_aborts_the_upload() {
    let filesystem = MockFilesystem::default();
    let mut h = Harness::new(
        MockAppStore::default(),
        filesystem.clone(),
        MockSettingsStore::default(),
        MockReboot::default(),
    );
    h.sync();

    h.request(upload_request("/apps/partial.txt", 10, 0xDEAD_BEEF))
        .unwrap();

    let resp = h
        .request(Request::UploadChunk(Chunk {
            position: 5,
            data: vec![1, 2, 3],
        }))
        .unwrap();
    assert_eq!(resp, Packet::status(StatusCode::IllegalState));
    assert!(!filesystem.contains("/apps/partial.txt"));

    // The engine is back at Idle: an ordinary request works again.
    let resp = h
        .request(Request::FsAction(FsActionReq {
            action: FsActionType::Stat,
            path: FixedString::new("/apps/partial.txt").unwrap(),
            list_offset: 0,
            size: 0,
            crc32: 0,
        }))
        .unwrap();
    assert_eq!(resp, Packet::status(StatusCode::NotFound));
}

#[test]
fn download_streams_chunks_then_finishes() {
    let filesystem = MockFilesystem::default();
    let content = b"stored on the device".to_vec();
    filesystem.put("/apps/readme.txt", content.clone());

    let mut h = Harness::new(
        MockAppStore::default(),
        filesystem,
        MockSettingsStore::default(),
        MockReboot::default(),
    );
    h.sync();

    let resp = h
        .request(Request::FsAction(FsActionReq {
            action: FsActionType::Download,
            path: FixedString::new("/apps/readme.txt").unwrap(),
            list_offset: 0,
            size: 0,
            crc32: 0,
        }))
        .unwrap();
    let expected_crc32 = badgelink_wire::crc::checksum(&content);
    assert_eq!(
        resp,
        Packet::Response {
            status: StatusCode::Ok,
            body: Some(ResponsePayload::Crc32 {
                size: content.len() as u32,
                crc32: expected_crc32,
            }),
        }
    );

    let resp = h.request(Request::XferCtrl(XferCtrl::Continue)).unwrap();
    assert_eq!(
        resp,
        Packet::Response {
            status: StatusCode::Ok,
            body: Some(ResponsePayload::DownloadChunk(Chunk {
                position: 0,
                data: content,
            })),
        }
    );

    let resp = h.request(Request::XferCtrl(XferCtrl::Finish)).unwrap();
    assert_eq!(resp, Packet::status(StatusCode::Ok));
}

#[test]
fn abort_mid_upload_is_silent_and_cleans_up() {
    let filesystem = MockFilesystem::default();
    let mut h = Harness::new(
        MockAppStore::default(),
        filesystem.clone(),
        MockSettingsStore::default(),
        MockReboot::default(),
    );
    h.sync();

    h.request(upload_request("/apps/abandoned.txt", 4, 0)).unwrap();
    assert!(filesystem.contains("/apps/abandoned.txt"));

    let resp = h.request(Request::XferCtrl(XferCtrl::Abort));
    assert_eq!(resp, None);
    assert!(!filesystem.contains("/apps/abandoned.txt"));

    // The transfer slot is free again: a fresh upload is accepted rather
    // than bouncing off the still-active previous transfer.
    let resp = h.request(upload_request("/apps/second.txt", 0, 0)).unwrap();
    assert_eq!(resp, Packet::status(StatusCode::Ok));
}

#[test]
fn settings_write_read_delete_roundtrip() {
    let settings = MockSettingsStore::default();
    let mut h = Harness::new(
        MockAppStore::default(),
        MockFilesystem::default(),
        settings.clone(),
        MockReboot::default(),
    );
    h.sync();

    let write = Request::SettingsAction(SettingsActionReq {
        action: SettingsActionType::Write,
        namespace: FixedString::new("wifi").unwrap(),
        key: FixedString::new("ssid").unwrap(),
        list_offset: 0,
        read_type: SettingsValueType::Str,
        wdata: Some(SettingsValue {
            ty: SettingsValueType::Str,
            payload: SettingsValuePayload::Str(FixedString::new("my-network").unwrap()),
        }),
    });
    let resp = h.request(write).unwrap();
    assert_eq!(resp, Packet::status(StatusCode::Ok));
    assert!(settings.get_raw("wifi", "ssid").is_some());

    let read = Request::SettingsAction(SettingsActionReq {
        action: SettingsActionType::Read,
        namespace: FixedString::new("wifi").unwrap(),
        key: FixedString::new("ssid").unwrap(),
        list_offset: 0,
        read_type: SettingsValueType::Str,
        wdata: None,
    });
    let resp = h.request(read).unwrap();
    assert_eq!(
        resp,
        Packet::Response {
            status: StatusCode::Ok,
            body: Some(ResponsePayload::SettingsValue(SettingsValue {
                ty: SettingsValueType::Str,
                payload: SettingsValuePayload::Str(FixedString::new("my-network").unwrap()),
            })),
        }
    );

    let delete = Request::SettingsAction(SettingsActionReq {
        action: SettingsActionType::Delete,
        namespace: FixedString::new("wifi").unwrap(),
        key: FixedString::new("ssid").unwrap(),
        list_offset: 0,
        read_type: SettingsValueType::Str,
        wdata: None,
    });
    let resp = h.request(delete).unwrap();
    assert_eq!(resp, Packet::status(StatusCode::Ok));
    assert!(settings.get_raw("wifi", "ssid").is_none());
}

#[test]
fn settings_write_type_mismatch_is_malformed() {
    let mut h = Harness::new(
        MockAppStore::default(),
        MockFilesystem::default(),
        MockSettingsStore::default(),
        MockReboot::default(),
    );
    h.sync();

    let write = Request::SettingsAction(SettingsActionReq {
        action: SettingsActionType::Write,
        namespace: FixedString::new("wifi").unwrap(),
        key: FixedString::new("ssid").unwrap(),
        list_offset: 0,
        read_type: SettingsValueType::Str,
        wdata: Some(SettingsValue {
            ty: SettingsValueType::U32,
            payload: SettingsValuePayload::Str(FixedString::new("not-a-number").unwrap()),
        }),
    });
    let resp = h.request(write).unwrap();
    assert_eq!(resp, Packet::status(StatusCode::Malformed));
}

#[test]
fn app_store_upload_then_download_roundtrip() {
    let app_store = MockAppStore::with_total_bytes(1_000_000);
    let mut h = Harness::new(
        app_store,
        MockFilesystem::default(),
        MockSettingsStore::default(),
        MockReboot::default(),
    );
    h.sync();

    let content = b"#!/bin/badge-app\n".to_vec();
    let crc32 = badgelink_wire::crc::checksum(&content);

    let upload = Request::AppStoreAction(AppStoreActionReq {
        action: AppStoreActionType::Upload,
        list_offset: 0,
        id: AppStoreId::NewFile(AppStoreMetadata {
            slug: FixedString::new("launcher").unwrap(),
            title: FixedString::new("Launcher").unwrap(),
            version: 1,
            size: content.len() as u32,
        }),
        crc32,
    });
    let resp = h.request(upload).unwrap();
    assert_eq!(resp, Packet::status(StatusCode::Ok));

    let resp = h
        .request(Request::UploadChunk(Chunk {
            position: 0,
            data: content.clone(),
        }))
        .unwrap();
    assert_eq!(resp, Packet::status(StatusCode::Ok));

    let resp = h.request(Request::XferCtrl(XferCtrl::Finish)).unwrap();
    assert_eq!(resp, Packet::status(StatusCode::Ok));

    let usage = h
        .request(Request::AppStoreAction(AppStoreActionReq {
            action: AppStoreActionType::Usage,
            list_offset: 0,
            id: AppStoreId::None,
            crc32: 0,
        }))
        .unwrap();
    assert_eq!(
        usage,
        Packet::Response {
            status: StatusCode::Ok,
            body: Some(ResponsePayload::AppStoreUsage {
                total_bytes: 1_000_000,
                used_bytes: content.len() as u32,
            }),
        }
    );

    let download = h
        .request(Request::AppStoreAction(AppStoreActionReq {
            action: AppStoreActionType::Download,
            list_offset: 0,
            id: AppStoreId::Slug(FixedString::new("launcher").unwrap()),
            crc32: 0,
        }))
        .unwrap();
    assert_eq!(
        download,
        Packet::Response {
            status: StatusCode::Ok,
            body: Some(ResponsePayload::Crc32 {
                size: content.len() as u32,
                crc32,
            }),
        }
    );

    let chunk = h.request(Request::XferCtrl(XferCtrl::Continue)).unwrap();
    assert_eq!(
        chunk,
        Packet::Response {
            status: StatusCode::Ok,
            body: Some(ResponsePayload::DownloadChunk(Chunk {
                position: 0,
                data: content,
            })),
        }
    );
    let resp = h.request(Request::XferCtrl(XferCtrl::Finish)).unwrap();
    assert_eq!(resp, Packet::status(StatusCode::Ok));
}

#[test]
fn start_app_unknown_slug_is_not_found() {
    let reboot = MockReboot::default();
    let mut h = Harness::new(
        MockAppStore::default(),
        MockFilesystem::default(),
        MockSettingsStore::default(),
        reboot.clone(),
    );
    h.sync();

    let resp = h
        .request(Request::StartApp {
            slug: FixedString::new("my-app").unwrap(),
            arg: 7,
        })
        .unwrap();
    assert_eq!(resp, Packet::status(StatusCode::NotFound));
    assert_eq!(reboot.requested(), None);
}

#[test]
fn start_app_schedules_a_reboot() {
    let mut app_store = MockAppStore::default();
    app_store
        .create("my-app", "My App", 1, 0)
        .unwrap();
    let reboot = MockReboot::default();
    let mut h = Harness::new(
        app_store,
        MockFilesystem::default(),
        MockSettingsStore::default(),
        reboot.clone(),
    );
    h.sync();

    let resp = h
        .request(Request::StartApp {
            slug: FixedString::new("my-app").unwrap(),
            arg: 7,
        })
        .unwrap();
    assert_eq!(resp, Packet::status(StatusCode::Ok));
    assert_eq!(reboot.requested(), Some(7));
}
