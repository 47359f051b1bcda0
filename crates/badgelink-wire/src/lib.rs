//! Wire-level building blocks for the BadgeLink serial protocol: COBS
//! framing, a CRC-32 integrity trailer, and the message schema exchanged
//! once a frame has been delimited and verified.
//!
//! This crate has no knowledge of sessions, sequence numbers, or transfer
//! state; see `badgelink-session` for the engine built on top of it.

pub mod cobs;
pub mod crc;
pub mod decode;
pub mod encode;
pub mod packet;
pub mod string;

pub use decode::{decode_vec, Decode, DecodeError, DecodeErrorKind, DecodeWithLength};
pub use encode::{Encode, MessageEncoder};
pub use packet::{
    AppStoreActionReq, AppStoreActionType, AppStoreId, AppStoreMetadata, Chunk, FsActionReq,
    FsActionType, FsDirent, FsStat, Packet, Request, ResponsePayload, SettingsActionReq,
    SettingsActionType, SettingsEntry, SettingsValue, SettingsValuePayload, SettingsValueType,
    StatusCode, XferCtrl, DIRENT_NAME_LEN, KEY_LEN, NAMESPACE_LEN, PATH_LEN, SETTINGS_STRING_LEN,
    SLUG_LEN,
};
pub use string::{FixedString, FixedStringSizeError};

/// Serializes `packet` into a complete, CRC-checked, COBS-framed byte
/// sequence ready to write to the wire.
///
/// Pipeline: schema encode, append a little-endian CRC-32 trailer over that
/// encoding, then COBS-encode the whole thing (terminating zero included).
#[must_use]
pub fn frame_encode(packet: &Packet) -> Vec<u8> {
    let body_len = packet.size();
    let mut plain = vec![0u8; body_len + 4];
    packet.encode(&mut plain[..body_len]);
    let crc = crc::checksum(&plain[..body_len]);
    plain[body_len..].copy_from_slice(&crc.to_le_bytes());
    cobs::encode(&plain)
}

/// Error produced while decoding a complete on-wire frame.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameDecodeError {
    #[error("COBS frame too short to contain a CRC-32 trailer")]
    TooShort,
    #[error("CRC-32 mismatch: frame claimed 0x{claimed:08x}, computed 0x{computed:08x}")]
    CrcMismatch { claimed: u32, computed: u32 },
    #[error(transparent)]
    Schema(#[from] DecodeError),
    #[error(transparent)]
    Trailing(#[from] TrailingBytesError),
}

/// Extra bytes remained after a [`Packet`] was fully decoded.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{0} trailing byte(s) left after decoding the packet body")]
pub struct TrailingBytesError(pub usize);

/// Decodes a COBS-framed, CRC-checked buffer (including its terminating
/// zero) back into a [`Packet`].
///
/// `buf` is decoded in place by [`cobs::decode_in_place`]; its contents are
/// consumed by this call.
pub fn frame_decode(buf: &mut [u8]) -> Result<Packet, FrameDecodeError> {
    let len = cobs::decode_in_place(buf);
    let plain = &buf[..len];
    if plain.len() < 4 {
        return Err(FrameDecodeError::TooShort);
    }
    let (body, trailer) = plain.split_at(plain.len() - 4);
    let claimed = u32::from_le_bytes(trailer.try_into().unwrap());
    let computed = crc::checksum(body);
    if claimed != computed {
        return Err(FrameDecodeError::CrcMismatch { claimed, computed });
    }
    let mut cursor = body;
    let packet = Packet::decode(&mut cursor)?;
    if !cursor.is_empty() {
        return Err(FrameDecodeError::Trailing(TrailingBytesError(cursor.len())));
    }
    Ok(packet)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_roundtrip() {
        let packet = Packet::Sync {
            sequence: 5,
            ok: true,
        };
        let mut framed = frame_encode(&packet);
        assert_eq!(*framed.last().unwrap(), 0);
        let decoded = frame_decode(&mut framed).unwrap();
        assert_eq!(decoded, packet);
    }

    #[test]
    fn corrupted_frame_fails_crc() {
        let packet = Packet::status(StatusCode::Ok);
        let mut framed = frame_encode(&packet);
        // Flip a bit inside the encoded (but not yet terminating-zero) body.
        framed[0] ^= 0xFF;
        let err = frame_decode(&mut framed);
        assert!(matches!(err, Err(FrameDecodeError::CrcMismatch { .. })) || matches!(err, Err(FrameDecodeError::Schema(_))) || matches!(err, Err(FrameDecodeError::TooShort)));
    }

    #[test]
    fn empty_frame_is_too_short() {
        let mut buf = vec![0u8];
        assert_eq!(frame_decode(&mut buf), Err(FrameDecodeError::TooShort));
    }
}
