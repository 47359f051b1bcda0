//! Settings-store (NVS) handler (spec §4.5).
//!
//! Resolves the Open Question from spec §9: the list handler's total count
//! reflects every matching entry, while the returned page holds only
//! `max_entries` items starting at `list_offset`.

use badgelink_wire::{
    ResponsePayload, SettingsActionReq, SettingsActionType, SettingsEntry, SettingsValue as WireValue,
    SettingsValuePayload as WirePayload, SettingsValueType as WireType, StatusCode,
};

use crate::collaborators::{SettingsEntryInfo, SettingsStore, SettingsValueData};

fn to_wire_value(value: &SettingsValueData) -> WireValue {
    let ty = value.value_type();
    let payload = match value {
        SettingsValueData::U8(v) => WirePayload::Numeric(i64::from(*v)),
        SettingsValueData::I8(v) => WirePayload::Numeric(i64::from(*v)),
        SettingsValueData::U16(v) => WirePayload::Numeric(i64::from(*v)),
        SettingsValueData::I16(v) => WirePayload::Numeric(i64::from(*v)),
        SettingsValueData::U32(v) => WirePayload::Numeric(i64::from(*v)),
        SettingsValueData::I32(v) => WirePayload::Numeric(i64::from(*v)),
        SettingsValueData::U64(v) => WirePayload::Numeric(*v as i64),
        SettingsValueData::I64(v) => WirePayload::Numeric(*v),
        SettingsValueData::Str(s) => {
            match badgelink_wire::FixedString::new(s.as_str()) {
                Ok(fixed) => WirePayload::Str(fixed),
                Err(_) => WirePayload::Str(badgelink_wire::FixedString::default()),
            }
        }
        SettingsValueData::Blob(b) => WirePayload::Blob(b.clone()),
    };
    WireValue { ty, payload }
}

fn from_wire_value(value: &WireValue) -> Option<SettingsValueData> {
    Some(match (&value.ty, &value.payload) {
        (WireType::U8, WirePayload::Numeric(n)) => SettingsValueData::U8(*n as u8),
        (WireType::I8, WirePayload::Numeric(n)) => SettingsValueData::I8(*n as i8),
        (WireType::U16, WirePayload::Numeric(n)) => SettingsValueData::U16(*n as u16),
        (WireType::I16, WirePayload::Numeric(n)) => SettingsValueData::I16(*n as i16),
        (WireType::U32, WirePayload::Numeric(n)) => SettingsValueData::U32(*n as u32),
        (WireType::I32, WirePayload::Numeric(n)) => SettingsValueData::I32(*n as i32),
        (WireType::U64, WirePayload::Numeric(n)) => SettingsValueData::U64(*n as u64),
        (WireType::I64, WirePayload::Numeric(n)) => SettingsValueData::I64(*n),
        (WireType::Str, WirePayload::Str(s)) => SettingsValueData::Str(s.as_str().to_owned()),
        (WireType::Blob, WirePayload::Blob(b)) => SettingsValueData::Blob(b.clone()),
        _ => return None,
    })
}

fn to_wire_entry(info: &SettingsEntryInfo) -> Option<SettingsEntry> {
    Some(SettingsEntry {
        namespace: badgelink_wire::FixedString::new(info.namespace.as_str()).ok()?,
        key: badgelink_wire::FixedString::new(info.key.as_str()).ok()?,
        ty: info.value_type,
    })
}

pub fn handle<S: SettingsStore>(
    req: &SettingsActionReq,
    store: &mut S,
    max_entries: usize,
) -> (StatusCode, Option<ResponsePayload>) {
    match req.action {
        SettingsActionType::List => {
            let namespace = if req.namespace.is_empty() {
                None
            } else {
                Some(req.namespace.as_str())
            };
            let iter = match store.iter(namespace) {
                Ok(iter) => iter,
                Err(err) => {
                    log::warn!("settings iteration failed: {err}");
                    return (StatusCode::InternalError, None);
                }
            };
            let mut total = 0u32;
            let mut entries = Vec::new();
            for (idx, info) in iter.enumerate() {
                total += 1;
                if idx >= req.list_offset as usize && entries.len() < max_entries {
                    if let Some(entry) = to_wire_entry(&info) {
                        entries.push(entry);
                    }
                }
            }
            (
                StatusCode::Ok,
                Some(ResponsePayload::SettingsEntries { entries, total }),
            )
        }
        SettingsActionType::Read => {
            if req.namespace.is_empty() || req.key.is_empty() {
                return (StatusCode::Malformed, None);
            }
            match store.get(req.namespace.as_str(), req.key.as_str()) {
                Ok(Some(value)) => (
                    StatusCode::Ok,
                    Some(ResponsePayload::SettingsValue(to_wire_value(&value))),
                ),
                Ok(None) => (StatusCode::NotFound, None),
                Err(err) => {
                    log::warn!("settings read failed: {err}");
                    (StatusCode::InternalError, None)
                }
            }
        }
        SettingsActionType::Write => {
            if req.namespace.is_empty() || req.key.is_empty() {
                return (StatusCode::Malformed, None);
            }
            let Some(wdata) = &req.wdata else {
                return (StatusCode::Malformed, None);
            };
            if !wdata.payload.matches_type(wdata.ty) {
                return (StatusCode::Malformed, None);
            }
            let Some(value) = from_wire_value(wdata) else {
                return (StatusCode::Malformed, None);
            };
            match store.set(req.namespace.as_str(), req.key.as_str(), &value) {
                Ok(()) => (StatusCode::Ok, None),
                Err(err) => {
                    log::warn!("settings write failed: {err}");
                    (StatusCode::InternalError, None)
                }
            }
        }
        SettingsActionType::Delete => {
            if req.namespace.is_empty() || req.key.is_empty() {
                return (StatusCode::Malformed, None);
            }
            match store.delete(req.namespace.as_str(), req.key.as_str()) {
                Ok(true) => (StatusCode::Ok, None),
                Ok(false) => (StatusCode::NotFound, None),
                Err(err) => {
                    log::warn!("settings delete failed: {err}");
                    (StatusCode::InternalError, None)
                }
            }
        }
    }
}
