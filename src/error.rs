use thiserror::Error;

/// Fatal conditions detected while reading the 100-byte file header. Anything
/// in this enum aborts the run; everything else in the core is best-effort.
#[derive(Error, Debug)]
pub enum HeaderError {
    #[error("file is only {0} bytes, need at least 100 for a SQLite header")]
    Truncated(usize),
    #[error("bad magic bytes, not a SQLite 3 database")]
    BadMagic,
}

/// Errors produced while reading a varint. Both variants are recoverable at
/// the cell level: the caller discards the cell and moves on.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarintError {
    #[error("varint truncated before a terminating byte was found")]
    Truncated,
}

/// Errors produced while turning a serial-type code and a byte slice into a
/// typed value.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialTypeError {
    #[error("serial type code {0} is not assigned a meaning")]
    UnknownCode(i64),
    /// A fixed-width integer or float field (the types SQLite itself decodes
    /// with a bounds-checked unpack rather than a bare byte slice) ran short.
    /// Unlike a blob/text/i24/i48 field, this is not a best-effort
    /// truncation: the whole record is rejected.
    #[error("{0}-byte value ran off the end of the payload")]
    BodyTruncated(usize),
}

/// Errors produced while decoding a record header + body. All variants cause
/// the whole record to be rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    #[error("declared header length {header_length} exceeds payload length {payload_length}")]
    HeaderLongerThanPayload {
        header_length: usize,
        payload_length: usize,
    },
    #[error("varint in record header was truncated")]
    Varint(#[from] VarintError),
    #[error("serial type error: {0}")]
    SerialType(#[from] SerialTypeError),
}
