//! Serial-type codes and the typed values they decode to.
//!
//! A serial type is a non-negative integer naming both the on-disk
//! representation and the byte length of one column value within a record.

use crate::error::SerialTypeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialType {
    Null,
    I8,
    I16,
    I24,
    I32,
    I48,
    I64,
    F64,
    Zero,
    One,
    Reserved,
    Blob(usize),
    Text(usize),
}

impl SerialType {
    /// Maps a raw serial-type code (the decoded value of the header varint)
    /// to its meaning. Reserved codes 10 and 11 are accepted (they decode to
    /// null, per the "never appear in a well-formed file but might in
    /// transient ones" note) rather than rejected, since this tool operates
    /// on adversarial, possibly-transient files by design.
    pub fn from_code(code: i64) -> Result<Self, SerialTypeError> {
        match code {
            0 => Ok(SerialType::Null),
            1 => Ok(SerialType::I8),
            2 => Ok(SerialType::I16),
            3 => Ok(SerialType::I24),
            4 => Ok(SerialType::I32),
            5 => Ok(SerialType::I48),
            6 => Ok(SerialType::I64),
            7 => Ok(SerialType::F64),
            8 => Ok(SerialType::Zero),
            9 => Ok(SerialType::One),
            10 | 11 => Ok(SerialType::Reserved),
            n if n >= 12 && n % 2 == 0 => Ok(SerialType::Blob(((n - 12) / 2) as usize)),
            n if n >= 13 && n % 2 == 1 => Ok(SerialType::Text(((n - 13) / 2) as usize)),
            n => Err(SerialTypeError::UnknownCode(n)),
        }
    }

    /// The number of bytes this serial type occupies in a record body,
    /// independent of whether those bytes are actually present.
    pub fn declared_len(&self) -> usize {
        match self {
            SerialType::Null
            | SerialType::Zero
            | SerialType::One
            | SerialType::Reserved => 0,
            SerialType::I8 => 1,
            SerialType::I16 => 2,
            SerialType::I24 => 3,
            SerialType::I32 => 4,
            SerialType::I48 => 6,
            SerialType::I64 | SerialType::F64 => 8,
            SerialType::Blob(n) | SerialType::Text(n) => *n,
        }
    }

    /// Decodes a value of this serial type from the front of `body`.
    ///
    /// Ground truth (`extract.py`'s `parse_serial_type`) decodes the fixed
    /// 1/2/4/8-byte integer and float fields with `struct.unpack`, which
    /// raises when the slice is short — caught by the caller and treated as
    /// a rejected record. Blob, text, and the i24/i48 fields are decoded by
    /// plain slicing / `int.from_bytes`, which never raises: a short slice
    /// there just yields whatever bytes are actually available (for i24/i48
    /// this means the available bytes are reinterpreted as a *narrower*
    /// signed integer, not a fixed-width field padded with assumed zeros).
    /// This method mirrors that split: `Err` for a short i8/i16/i32/i64/f64
    /// field (the caller rejects the whole record), best-effort truncation
    /// for everything else.
    pub fn decode(&self, body: &[u8]) -> Result<(Value, usize), SerialTypeError> {
        Ok(match self {
            SerialType::Null => (Value::Null, 0),
            SerialType::Zero => (Value::Integer(0), 0),
            SerialType::One => (Value::Integer(1), 0),
            SerialType::Reserved => (Value::Null, 0),
            SerialType::I8 => {
                let b = *body.first().ok_or(SerialTypeError::BodyTruncated(1))?;
                (Value::Integer(b as i8 as i64), 1)
            }
            SerialType::I16 => {
                let slice = body.get(..2).ok_or(SerialTypeError::BodyTruncated(2))?;
                (Value::Integer(be_signed(slice)), 2)
            }
            SerialType::I24 => {
                let have = body.len().min(3);
                (Value::Integer(be_signed(&body[..have])), have)
            }
            SerialType::I32 => {
                let slice = body.get(..4).ok_or(SerialTypeError::BodyTruncated(4))?;
                (Value::Integer(be_signed(slice)), 4)
            }
            SerialType::I48 => {
                let have = body.len().min(6);
                (Value::Integer(be_signed(&body[..have])), have)
            }
            SerialType::I64 => {
                let slice = body.get(..8).ok_or(SerialTypeError::BodyTruncated(8))?;
                (Value::Integer(be_signed(slice)), 8)
            }
            SerialType::F64 => {
                let slice = body.get(..8).ok_or(SerialTypeError::BodyTruncated(8))?;
                let mut buf = [0u8; 8];
                buf.copy_from_slice(slice);
                (Value::Float(f64::from_be_bytes(buf)), 8)
            }
            SerialType::Blob(n) => {
                let have = body.len().min(*n);
                (Value::Blob(body[..have].to_vec()), have)
            }
            SerialType::Text(n) => {
                let have = body.len().min(*n);
                (Value::Text(String::from_utf8_lossy(&body[..have]).into_owned()), have)
            }
        })
    }
}

/// Sign-extends a big-endian two's-complement integer taken from `slice`,
/// whose own length (1–8 bytes) is the width being interpreted — matching
/// Python's `int.from_bytes(slice, 'big', signed=True)`, which reinterprets
/// however many bytes it is actually given rather than assuming a fixed
/// declared width padded with zeros. Callers that need a *fixed* width
/// (i16/i32/i64) pass a slice already checked to be exactly that long; i24/
/// i48 callers pass whatever is available, which may be shorter than 3/6
/// bytes on a truncated cell.
fn be_signed(slice: &[u8]) -> i64 {
    if slice.is_empty() {
        return 0;
    }
    let sign_bit_set = slice[0] & 0x80 != 0;
    let mut buf = [if sign_bit_set { 0xFFu8 } else { 0x00 }; 8];
    let dest_start = 8 - slice.len();
    buf[dest_start..].copy_from_slice(slice);
    i64::from_be_bytes(buf)
}

/// A single recovered column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Value {
    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            _ => None,
        }
    }
}
