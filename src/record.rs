//! Record header / body decoding.
//!
//! A record is a header-length varint, followed by one serial-type varint per
//! column until the header length is exhausted, followed by the column
//! values themselves in the same order.

use crate::error::RecordError;
use crate::serial_type::{SerialType, Value};
use crate::varint::Varint;

/// A fully decoded record: an ordered tuple of column values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    pub values: Vec<Value>,
}

impl Record {
    /// Decodes a record from `payload`, which must be exactly
    /// `payload_length` bytes of cell payload (no overflow bytes — decoding
    /// overflow pages is out of scope).
    ///
    /// Returns `Err` when the record is malformed in a way the forensic
    /// contract says to reject outright: the declared header length exceeds
    /// the payload, a varint in the header is truncated, a serial-type code
    /// in the header is not assigned a meaning, or a fixed-width i8/i16/i32/
    /// i64/f64 value runs off the end of the payload (ground truth decodes
    /// those with a bounds-checked unpack that raises on a short slice).
    /// A short blob, text, i24, or i48 field is not one of these faults: it
    /// decodes to a best-effort value instead; see `SerialType::decode`.
    pub fn decode(payload: &[u8]) -> Result<Self, RecordError> {
        let payload_length = payload.len();

        let header_len_varint = Varint::read(payload).map_err(RecordError::from)?;
        let header_length = header_len_varint.value as usize;

        if header_length > payload_length {
            return Err(RecordError::HeaderLongerThanPayload {
                header_length,
                payload_length,
            });
        }

        let mut offset = header_len_varint.bytes_read as usize;
        let mut serial_types = Vec::new();
        while offset < header_length {
            let st_varint = Varint::read(&payload[offset..]).map_err(RecordError::from)?;
            offset += st_varint.bytes_read as usize;
            serial_types.push(SerialType::from_code(st_varint.value as i64).map_err(RecordError::from)?);
        }

        let mut body_offset = header_length;
        let mut values = Vec::with_capacity(serial_types.len());
        for serial_type in serial_types {
            let remaining = if body_offset < payload.len() {
                &payload[body_offset..]
            } else {
                &[]
            };
            let (value, consumed) = serial_type.decode(remaining).map_err(RecordError::from)?;
            values.push(value);
            body_offset += consumed;
        }

        Ok(Record { values })
    }
}
