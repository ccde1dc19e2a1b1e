//! SQLite's big-endian, 1-to-9-byte variable-length unsigned integer.
//!
//! A varint consists of zero or more bytes with the high bit set, followed by
//! a single byte with the high bit clear, or nine bytes total, whichever is
//! shorter. The lower seven bits of each of the first eight bytes and all
//! eight bits of the ninth contribute to the reconstructed value. No sign
//! interpretation happens here; that is the serial-type decoder's job.

use crate::error::VarintError;

/// A decoded varint: its value and how many bytes of the input it consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Varint {
    pub value: u64,
    pub bytes_read: u8,
}

impl Varint {
    /// Reads a varint from `bytes` starting at offset 0. Consumes at most 9
    /// bytes. Fails with `Truncated` if the slice ends before a terminating
    /// byte (high bit clear) is seen within the first 8 bytes, or if the
    /// ninth byte itself is missing.
    pub fn read(bytes: &[u8]) -> Result<Self, VarintError> {
        let mut value: u64 = 0;

        for i in 0..8 {
            let byte = *bytes.get(i).ok_or(VarintError::Truncated)?;
            value = (value << 7) | (byte & 0x7F) as u64;
            if byte & 0x80 == 0 {
                return Ok(Varint {
                    value,
                    bytes_read: (i + 1) as u8,
                });
            }
        }

        // Ninth byte contributes all 8 bits and always terminates the varint.
        let ninth = *bytes.get(8).ok_or(VarintError::Truncated)?;
        value = (value << 8) | ninth as u64;
        Ok(Varint {
            value,
            bytes_read: 9,
        })
    }

    /// Encodes `value` into its big-endian varint byte representation. Used
    /// by the SQLite image writer, which needs to lay recovered records back
    /// out onto disk in the same format this module reads.
    pub fn encode(value: u64) -> Vec<u8> {
        // Values up to 2^56 - 1 fit the ordinary 7-bits-per-byte encoding;
        // above that the ninth byte carries the low 8 bits verbatim and the
        // first eight bytes carry the remaining 56 bits, mirroring the
        // asymmetry in `read`.
        if value < (1 << 56) {
            let mut groups = Vec::new();
            let mut remaining = value;
            loop {
                groups.push((remaining & 0x7F) as u8);
                remaining >>= 7;
                if remaining == 0 {
                    break;
                }
            }
            groups.reverse();
            let last = groups.len() - 1;
            groups
                .iter()
                .enumerate()
                .map(|(i, g)| if i == last { *g } else { g | 0x80 })
                .collect()
        } else {
            let high56 = value >> 8;
            let low8 = (value & 0xFF) as u8;
            let mut bytes = Vec::with_capacity(9);
            for shift in (0..8).rev() {
                let group = ((high56 >> (shift * 7)) & 0x7F) as u8;
                bytes.push(group | 0x80);
            }
            bytes.push(low8);
            bytes
        }
    }
}
