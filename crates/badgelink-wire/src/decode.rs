use std::str::Utf8Error;

use thiserror::Error;

/// Error produced while decoding a value from a byte cursor.
#[derive(Debug, Error, PartialEq, Eq)]
pub struct DecodeError {
    kind: DecodeErrorKind,
    type_name: &'static str,
}

impl DecodeError {
    pub fn new<T>(kind: DecodeErrorKind) -> Self {
        Self {
            kind,
            type_name: std::any::type_name::<T>(),
        }
    }

    pub const fn kind(&self) -> DecodeErrorKind {
        self.kind
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to decode {}: {}", self.type_name, self.kind)
    }
}

#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeErrorKind {
    #[error("buffer ran out before a complete value could be read")]
    UnexpectedEnd,

    #[error("unexpected tag byte 0x{value:02x}, expected one of: {expected:x?}")]
    UnexpectedTag { value: u8, expected: &'static [u8] },

    #[error("string ran past its fixed capacity without a null terminator")]
    UnterminatedString,

    #[error(transparent)]
    Utf8Error(#[from] Utf8Error),

    #[error("trailing bytes left over after decoding a fixed-size packet")]
    TrailingBytes,
}

/// A type that can be reconstructed (decoded) from a cursor over raw bytes.
///
/// Implementations consume exactly the bytes they need from the front of
/// `data`, advancing it past the decoded representation.
pub trait Decode {
    /// # Errors
    /// Returns a [`DecodeError`] if `data` is malformed or too short.
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError>
    where
        Self: Sized;
}

/// A type decoded given an externally-known element count, e.g. a `Vec<T>`
/// whose length is carried by an enclosing field rather than self-described.
pub trait DecodeWithLength {
    /// # Errors
    /// Returns a [`DecodeError`] if `data` is malformed or too short.
    fn decode_with_len(data: &mut &[u8], len: usize) -> Result<Self, DecodeError>
    where
        Self: Sized;
}

impl Decode for () {
    fn decode(_data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(())
    }
}

macro_rules! impl_decode_for_primitive {
    ($($t:ty),*) => {
        $(
            impl Decode for $t {
                fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
                    let bytes = data
                        .get(..size_of::<Self>())
                        .ok_or_else(|| DecodeError::new::<Self>(DecodeErrorKind::UnexpectedEnd))?;
                    *data = &data[size_of::<Self>()..];
                    Ok(Self::from_le_bytes(bytes.try_into().unwrap()))
                }
            }
        )*
    };
}

impl_decode_for_primitive!(u8, u16, u32, u64, i8, i16, i32, i64);

impl Decode for bool {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(u8::decode(data)? != 0)
    }
}

impl<const N: usize> Decode for [u8; N] {
    fn decode(data: &mut &[u8]) -> Result<Self, DecodeError> {
        let bytes = data
            .get(..N)
            .ok_or_else(|| DecodeError::new::<Self>(DecodeErrorKind::UnexpectedEnd))?;
        *data = &data[N..];
        Ok(bytes.try_into().unwrap())
    }
}

/// Decodes `len` consecutive elements into a `Vec<T>`.
///
/// This is a free function rather than a blanket `DecodeWithLength` impl
/// because that would conflict with the byte-slice fast path below (`u8`
/// already implements [`Decode`]).
pub fn decode_vec<T: Decode>(data: &mut &[u8], len: usize) -> Result<Vec<T>, DecodeError> {
    let mut vec = Vec::with_capacity(len);
    for _ in 0..len {
        vec.push(T::decode(data)?);
    }
    Ok(vec)
}

impl DecodeWithLength for Vec<u8> {
    fn decode_with_len(data: &mut &[u8], len: usize) -> Result<Self, DecodeError> {
        let bytes = data
            .get(..len)
            .ok_or_else(|| DecodeError::new::<Self>(DecodeErrorKind::UnexpectedEnd))?;
        *data = &data[len..];
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_roundtrip() {
        let buf = 0xDEAD_BEEFu32.to_le_bytes();
        let mut cursor = &buf[..];
        assert_eq!(u32::decode(&mut cursor).unwrap(), 0xDEAD_BEEF);
        assert!(cursor.is_empty());
    }

    #[test]
    fn unexpected_end() {
        let buf = [0u8; 2];
        let mut cursor = &buf[..];
        assert_eq!(
            u32::decode(&mut cursor).unwrap_err().kind(),
            DecodeErrorKind::UnexpectedEnd
        );
    }
}
