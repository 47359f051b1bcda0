use std::{
    fmt,
    ops::Deref,
    str::{self, FromStr},
};

use crate::decode::{Decode, DecodeError, DecodeErrorKind};
use crate::encode::Encode;

/// A UTF-8 string stored in a fixed-size, null-terminated `N`-byte field, as
/// the firmware's `char slug[32]`-style fields are on the wire.
///
/// The logical string may be at most `N - 1` bytes long; the remaining bytes
/// (at least one) are always zero, so the field can be read back as a C
/// string by a client that does not otherwise know its length.
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct FixedString<const N: usize>([u8; N]);

impl<const N: usize> FixedString<N> {
    /// # Errors
    /// Returns [`FixedStringSizeError`] if `s` does not fit within `N - 1`
    /// bytes (room is always reserved for a null terminator).
    pub fn new(s: impl AsRef<str>) -> Result<Self, FixedStringSizeError> {
        let s = s.as_ref();
        let len = s.len();
        if len >= N {
            return Err(FixedStringSizeError {
                input_size: len,
                max_size: N - 1,
            });
        }
        let mut buf = [0u8; N];
        buf[..len].copy_from_slice(s.as_bytes());
        Ok(Self(buf))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(N);
        // SAFETY: construction only ever copies valid UTF-8 into the prefix.
        unsafe { str::from_utf8_unchecked(&self.0[..len]) }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }
}

impl<const N: usize> Default for FixedString<N> {
    fn default() -> Self {
        Self([0; N])
    }
}

impl<const N: usize> Deref for FixedString<N> {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl<const N: usize> AsRef<str> for FixedString<N> {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl<const N: usize> TryFrom<&str> for FixedString<N> {
    type Error = FixedStringSizeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl<const N: usize> FromStr for FixedString<N> {
    type Err = FixedStringSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<const N: usize> fmt::Display for FixedString<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.as_str().fmt(f)
    }
}

impl<const N: usize> Encode for FixedString<N> {
    fn size(&self) -> usize {
        N
    }

    fn encode(&self, data: &mut [u8]) {
        data[..N].copy_from_slice(&self.0);
    }
}

impl<const N: usize> Decode for FixedString<N> {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let bytes = <[u8; N]>::decode(data)?;
        let nul = bytes
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| DecodeError::new::<Self>(DecodeErrorKind::UnterminatedString))?;
        str::from_utf8(&bytes[..nul]).map_err(|e| DecodeError::new::<Self>(e.into()))?;
        Ok(Self(bytes))
    }
}

/// Returned when a [`FixedString`] cannot hold the requested contents.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FixedStringSizeError {
    pub input_size: usize,
    pub max_size: usize,
}

impl fmt::Display for FixedStringSizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "string of {} bytes exceeds the maximum of {} bytes",
            self.input_size, self.max_size
        )
    }
}

impl std::error::Error for FixedStringSizeError {}

#[cfg(test)]
mod tests {
    use super::FixedString;
    use crate::{decode::Decode, encode::Encode};

    #[test]
    fn roundtrip() {
        let s: FixedString<8> = FixedString::new("hi").unwrap();
        let mut buf = [0xFFu8; 8];
        s.encode(&mut buf);
        assert_eq!(&buf[..3], b"hi\0");

        let mut cursor = &buf[..];
        let decoded = FixedString::<8>::decode(&mut cursor).unwrap();
        assert_eq!(decoded.as_str(), "hi");
    }

    #[test]
    fn too_long() {
        assert!(FixedString::<4>::new("abcd").is_err());
        assert!(FixedString::<4>::new("abc").is_ok());
    }

    #[test]
    fn empty_is_empty() {
        let s: FixedString<8> = FixedString::new("").unwrap();
        assert!(s.is_empty());
    }
}
