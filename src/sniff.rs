//! Pure byte-signature lookup for recognizing image blobs recovered from
//! BLOB columns. Stateless; matches only at offset 0 of the blob.

const SIGNATURES: &[(&[u8], &str)] = &[
    (&[0xFF, 0xD8, 0xFF], "jpg"),
    (&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A], "png"),
    (b"GIF87a", "gif"),
    (b"GIF89a", "gif"),
    (b"BM", "bmp"),
    (&[0x49, 0x49, 0x2A, 0x00], "tif"), // little-endian
    (&[0x4D, 0x4D, 0x00, 0x2A], "tif"), // big-endian
    (&[0x00, 0x00, 0x01, 0x00], "ico"),
];

/// Returns the image format tag recognized at the start of `blob`, if any.
pub fn sniff(blob: &[u8]) -> Option<&'static str> {
    SIGNATURES
        .iter()
        .find(|(sig, _)| blob.starts_with(sig))
        .map(|(_, fmt)| *fmt)
}
