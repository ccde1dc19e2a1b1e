//! Consumers of the recovery driver's flat tuple stream: a delimited tabular
//! text renderer and a from-scratch SQLite image renderer. Both honor the
//! sink contract from the spec (pad to max arity, leave blob presentation to
//! the sink) and can optionally spill recognized image blobs out to files.

use crate::header::{HEADER_LEN, MAGIC};
use crate::record::Record;
use crate::serial_type::Value;
use crate::sniff;
use crate::varint::Varint;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Options shared by both renderers.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub extract_images: Option<std::path::PathBuf>,
}

/// Tracks sequential image filenames across a single write pass.
struct ImageExtractor<'a> {
    dir: &'a Path,
    next_index: u32,
}

impl<'a> ImageExtractor<'a> {
    fn new(dir: &'a Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating image output directory {}", dir.display()))?;
        Ok(Self { dir, next_index: 1 })
    }

    /// If `blob` is recognized by the sniffer, writes it out and returns the
    /// filename it was saved as.
    fn try_extract(&mut self, blob: &[u8]) -> Result<Option<String>> {
        let Some(fmt) = sniff::sniff(blob) else {
            return Ok(None);
        };
        let filename = format!("image_{}.{fmt}", self.next_index);
        let path = self.dir.join(&filename);
        fs::write(&path, blob).with_context(|| format!("writing {}", path.display()))?;
        self.next_index += 1;
        Ok(Some(filename))
    }
}

fn render_value(value: &Value, extractor: &mut Option<ImageExtractor>) -> Result<String> {
    Ok(match value {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => {
            if let Some(extractor) = extractor {
                if let Some(filename) = extractor.try_extract(b)? {
                    filename
                } else {
                    hex::encode(b)
                }
            } else {
                hex::encode(b)
            }
        }
    })
}

/// Minimal, dependency-free hex encoding; kept local since it is the only
/// place in the crate that needs it.
mod hex {
    pub fn encode(bytes: &[u8]) -> String {
        let mut s = String::with_capacity(bytes.len() * 2);
        for b in bytes {
            s.push_str(&format!("{b:02x}"));
        }
        s
    }
}

/// Writes `records` as delimited tabular text to `path`. The header row
/// names columns `field1..fieldN` where `N` is the max arity across all
/// records, and every row is padded with empty fields up to that width.
pub fn write_text(
    path: &Path,
    records: &[Record],
    delimiter: char,
    options: &WriteOptions,
) -> Result<()> {
    let max_arity = records.iter().map(|r| r.values.len()).max().unwrap_or(0);
    let mut out = fs::File::create(path)
        .with_context(|| format!("creating output file {}", path.display()))?;

    let mut extractor = match &options.extract_images {
        Some(dir) => Some(ImageExtractor::new(dir)?),
        None => None,
    };

    let header: Vec<String> = (1..=max_arity).map(|i| format!("field{i}")).collect();
    writeln!(out, "{}", join(&header, delimiter))?;

    for record in records {
        let mut fields = Vec::with_capacity(max_arity);
        for value in &record.values {
            fields.push(quote_if_needed(render_value(value, &mut extractor)?, delimiter));
        }
        for _ in record.values.len()..max_arity {
            fields.push(String::new());
        }
        writeln!(out, "{}", join(&fields, delimiter))?;
    }

    Ok(())
}

fn join(fields: &[String], delimiter: char) -> String {
    fields
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(&delimiter.to_string())
}

fn quote_if_needed(field: String, delimiter: char) -> String {
    if field.contains(delimiter) || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field
    }
}

/// Builds a standalone, openable single-table SQLite database file named
/// `recovered_data` out of the recovered tuples. Lays records out as
/// table-leaf pages and, if more than one leaf page is needed, a single
/// table-interior root page pointing at them — the minimal two-level b-tree
/// shape. This writer never balances or splits pages the way a live SQLite
/// instance does; the full row set is known up front, so there's nothing to
/// rebalance.
pub fn write_sqlite_image(
    path: &Path,
    records: &[Record],
    options: &WriteOptions,
) -> Result<()> {
    const PAGE_SIZE: usize = 4096;

    let max_arity = records.iter().map(|r| r.values.len()).max().unwrap_or(0);
    let mut extractor = match &options.extract_images {
        Some(dir) => Some(ImageExtractor::new(dir)?),
        None => None,
    };

    // Encode every row's payload up front so we know how many fit per page.
    let mut payloads = Vec::with_capacity(records.len());
    for record in records {
        payloads.push(encode_record_payload(record, max_arity, &mut extractor)?);
    }

    let rows_per_page = pack_rows_into_leaf_pages(&payloads, PAGE_SIZE);

    // Only the physical page 1 shares its space with the 100-byte file
    // header. When there's a single leaf page it IS page 1; when an interior
    // root is needed, the root takes page 1 instead and every leaf is a full
    // PAGE_SIZE page starting at page 2.
    let pages: Vec<Vec<u8>> = if rows_per_page.len() <= 1 {
        vec![render_leaf_page(rows_per_page.first().map_or(&[], |v| v.as_slice()), PAGE_SIZE, true)]
    } else {
        let leaves: Vec<Vec<u8>> = rows_per_page
            .iter()
            .map(|rows| render_leaf_page(rows, PAGE_SIZE, false))
            .collect();
        let root = build_interior_root_page(&leaves, PAGE_SIZE);
        let mut all = Vec::with_capacity(leaves.len() + 1);
        all.push(root);
        all.extend(leaves);
        all
    };

    let mut out = fs::File::create(path)
        .with_context(|| format!("creating output file {}", path.display()))?;

    write_file_header(&mut out, PAGE_SIZE as u32, pages.len() as u32)?;
    // Page 1's buffer is already `PAGE_SIZE - HEADER_LEN` bytes, so writing
    // it directly after the file header lines every later page up on a
    // `PAGE_SIZE` boundary.
    for page in &pages {
        out.write_all(page)?;
    }

    Ok(())
}

fn encode_record_payload(
    record: &Record,
    max_arity: usize,
    extractor: &mut Option<ImageExtractor>,
) -> Result<Vec<u8>> {
    let mut header = Vec::new();
    let mut body = Vec::new();

    for i in 0..max_arity {
        match record.values.get(i) {
            None | Some(Value::Null) => {
                header.push(0u8); // serial type 0: null
            }
            Some(Value::Integer(n)) => encode_integer(*n, &mut header, &mut body),
            Some(Value::Float(f)) => {
                header.extend(Varint::encode(7));
                body.extend_from_slice(&f.to_be_bytes());
            }
            Some(Value::Text(s)) => {
                let bytes = s.as_bytes();
                header.extend(Varint::encode((bytes.len() * 2 + 13) as u64));
                body.extend_from_slice(bytes);
            }
            Some(Value::Blob(b)) => {
                // Sniff before encoding so an extracted image's filename
                // replaces the raw bytes in the rebuilt database too.
                let rendered: Vec<u8> = match extractor {
                    Some(ex) => match ex.try_extract(b)? {
                        Some(filename) => filename.into_bytes(),
                        None => b.clone(),
                    },
                    None => b.clone(),
                };
                header.extend(Varint::encode((rendered.len() * 2 + 12) as u64));
                body.extend_from_slice(&rendered);
            }
        }
    }

    // The header-length varint encodes `header.len()` plus its own
    // encoded size, which is a fixed point: growing the candidate length
    // can itself push the varint across a size boundary (e.g. declaring
    // 16382 fits in 2 bytes, but 16382 + 2 = 16384 needs 3). Iterate until
    // the assumed varint length stops changing rather than guessing once.
    let mut varint_len = 1usize;
    let header_length = loop {
        let candidate = header.len() + varint_len;
        let actual_len = Varint::encode(candidate as u64).len();
        if actual_len == varint_len {
            break candidate;
        }
        varint_len = actual_len;
    };
    let mut payload = Varint::encode(header_length as u64);
    payload.extend(header);
    payload.extend(body);
    Ok(payload)
}

fn encode_integer(n: i64, header: &mut Vec<u8>, body: &mut Vec<u8>) {
    if n == 0 {
        header.push(8);
    } else if n == 1 {
        header.push(9);
    } else if let Ok(v) = i8::try_from(n) {
        header.push(1);
        body.push(v as u8);
    } else if let Ok(v) = i16::try_from(n) {
        header.extend(Varint::encode(2));
        body.extend_from_slice(&v.to_be_bytes());
    } else if (-(1 << 23)..(1 << 23)).contains(&n) {
        header.extend(Varint::encode(3));
        let bytes = (n as i32).to_be_bytes();
        body.extend_from_slice(&bytes[1..4]);
    } else if let Ok(v) = i32::try_from(n) {
        header.extend(Varint::encode(4));
        body.extend_from_slice(&v.to_be_bytes());
    } else if (-(1i64 << 47)..(1i64 << 47)).contains(&n) {
        header.extend(Varint::encode(5));
        let bytes = n.to_be_bytes();
        body.extend_from_slice(&bytes[2..8]);
    } else {
        header.extend(Varint::encode(6));
        body.extend_from_slice(&n.to_be_bytes());
    }
}

/// Groups already-encoded row payloads into as many table-leaf pages' worth
/// of rows as needed, using sequential rowids starting at 1. Conservatively
/// assumes the worst case (first page reserves `HEADER_LEN` bytes for the
/// file header) so a page never overflows regardless of whether it ends up
/// rendered as page 1 directly or demoted behind an interior root.
fn pack_rows_into_leaf_pages<'a>(payloads: &'a [Vec<u8>], page_size: usize) -> Vec<Vec<(u64, &'a Vec<u8>)>> {
    let mut pages: Vec<Vec<(u64, &Vec<u8>)>> = Vec::new();
    let mut current_rows: Vec<(u64, &Vec<u8>)> = Vec::new();
    let mut rowid: u64 = 1;

    let usable = page_size - HEADER_LEN;

    let cell_len = |payload: &[u8], rowid: u64| -> usize {
        Varint::encode(payload.len() as u64).len() + Varint::encode(rowid).len() + payload.len()
    };

    let mut used = 8usize; // leaf page header
    for payload in payloads {
        let needed = cell_len(payload, rowid) + 2; // + cell pointer entry
        if used + needed > usable && !current_rows.is_empty() {
            pages.push(std::mem::take(&mut current_rows));
            used = 8;
        }
        current_rows.push((rowid, payload));
        used += needed;
        rowid += 1;
    }
    if !current_rows.is_empty() || pages.is_empty() {
        pages.push(current_rows);
    }
    pages
}

fn render_leaf_page(rows: &[(u64, &Vec<u8>)], page_size: usize, header_offset: bool) -> Vec<u8> {
    let mut page = vec![0u8; if header_offset { page_size - HEADER_LEN } else { page_size }];
    page[0] = 0x0D;
    page[3..5].copy_from_slice(&(rows.len() as u16).to_be_bytes());

    let mut cursor = page.len();
    let mut pointers = Vec::with_capacity(rows.len());
    for (rowid, payload) in rows {
        let mut cell = Varint::encode(payload.len() as u64);
        cell.extend(Varint::encode(*rowid));
        cell.extend_from_slice(payload);
        cursor -= cell.len();
        page[cursor..cursor + cell.len()].copy_from_slice(&cell);
        pointers.push(cursor as u16);
    }
    for (i, ptr) in pointers.iter().enumerate() {
        let slot = 8 + i * 2;
        page[slot..slot + 2].copy_from_slice(&ptr.to_be_bytes());
    }
    page
}

/// Builds the single table-interior root page referencing every leaf page
/// that follows it, keyed by each leaf's maximum rowid plus a right-most
/// pointer to the final leaf.
fn build_interior_root_page(leaves: &[Vec<u8>], page_size: usize) -> Vec<u8> {
    // Leaves occupy physical pages 2..=leaves.len()+1 (1-based), since the
    // interior root itself is page 1.
    let mut page = vec![0u8; page_size - HEADER_LEN];
    page[0] = 0x05;
    let num_cells = (leaves.len() - 1) as u16; // last leaf is the right-most pointer
    page[3..5].copy_from_slice(&num_cells.to_be_bytes());

    let mut rowid: u64 = 0;
    let mut max_rowids = Vec::with_capacity(leaves.len());
    for leaf in leaves {
        let count = u16::from_be_bytes([leaf[3], leaf[4]]) as u64;
        rowid += count;
        max_rowids.push(rowid);
    }

    let mut cursor = page.len();
    let mut pointers = Vec::new();
    for (i, max_rowid) in max_rowids.iter().enumerate().take(leaves.len() - 1) {
        let child_page = (i + 2) as u32; // 1-based physical page number
        let mut cell = child_page.to_be_bytes().to_vec();
        cell.extend(Varint::encode(*max_rowid));
        cursor -= cell.len();
        page[cursor..cursor + cell.len()].copy_from_slice(&cell);
        pointers.push(cursor as u16);
    }
    for (i, ptr) in pointers.iter().enumerate() {
        let slot = 12 + i * 2;
        page[slot..slot + 2].copy_from_slice(&ptr.to_be_bytes());
    }

    let right_most_page = (leaves.len() + 1) as u32;
    page[8..12].copy_from_slice(&right_most_page.to_be_bytes());

    page
}

fn write_file_header(out: &mut fs::File, page_size: u32, db_size_in_pages: u32) -> Result<()> {
    let mut header = vec![0u8; HEADER_LEN];
    header[0..16].copy_from_slice(MAGIC);
    let page_size_field: u16 = if page_size == 65536 { 1 } else { page_size as u16 };
    header[16..18].copy_from_slice(&page_size_field.to_be_bytes());
    header[18] = 1; // file format write version: legacy
    header[19] = 1; // file format read version: legacy
    header[21] = 64; // max embedded payload fraction, must be 64
    header[22] = 32; // min embedded payload fraction, must be 32
    header[23] = 32; // leaf payload fraction, must be 32
    header[28..32].copy_from_slice(&db_size_in_pages.to_be_bytes());
    header[44..48].copy_from_slice(&4u32.to_be_bytes()); // schema format 4
    header[56..60].copy_from_slice(&1u32.to_be_bytes()); // UTF-8
    out.write_all(&header)?;
    Ok(())
}
