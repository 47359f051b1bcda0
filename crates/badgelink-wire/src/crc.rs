use crc::Crc;

/// CRC-32/ISO-HDLC (the same polynomial used by zlib's `crc32`), little-endian
/// on the wire, initial value 0, as specified for the BadgeLink integrity
/// trailer.
pub const BADGELINK_CRC32: Crc<u32> = Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);

/// Computes the CRC-32/ISO-HDLC checksum of `data`.
#[must_use]
pub fn checksum(data: &[u8]) -> u32 {
    BADGELINK_CRC32.checksum(data)
}
