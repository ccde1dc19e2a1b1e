//! Page classification and cell-pointer traversal for table B-tree pages.

use crate::record::Record;
use crate::varint::Varint;
use log::debug;

const PAGE_TYPE_TABLE_INTERIOR: u8 = 0x05;
const PAGE_TYPE_TABLE_LEAF: u8 = 0x0D;

/// Resolves the §9 open question about how table-interior cells are laid
/// out. `Heuristic` mirrors the distilled reference implementation (reads
/// payload-length / left-child / rowid / payload, same as a leaf cell);
/// `Canonical` reads the real SQLite interior-cell format (bare 4-byte
/// left-child pointer + rowid varint, no payload) and therefore never emits
/// a record from an interior cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellLayout {
    #[default]
    Heuristic,
    Canonical,
}

/// Parses one page of `image` at `page_index` (0-based) and appends every
/// record it can recover to `out`. Never fails: an empty slice, an
/// unrecognized page type, an out-of-bounds cell pointer, or a malformed cell
/// all just mean fewer records come out the other end.
pub fn parse_page(image: &[u8], page_index: usize, page_size: usize, layout: CellLayout, out: &mut Vec<Record>) {
    let start = page_index * page_size;
    if start >= image.len() {
        return;
    }
    let end = (start + page_size).min(image.len());
    let page = &image[start..end];
    if page.is_empty() {
        return;
    }

    let page_type = page[0];
    let is_interior = match page_type {
        PAGE_TYPE_TABLE_LEAF => false,
        PAGE_TYPE_TABLE_INTERIOR => true,
        _ => return,
    };

    if page.len() < 5 {
        return;
    }
    let num_cells = u16::from_be_bytes([page[3], page[4]]) as usize;
    let pointer_array_start = if is_interior { 12 } else { 8 };

    debug!(
        "page {page_index}: type={page_type:#04x} cells={num_cells} interior={is_interior}"
    );

    for i in 0..num_cells {
        let slot = pointer_array_start + 2 * i;
        if slot + 2 > page.len() {
            continue;
        }
        let cell_offset = u16::from_be_bytes([page[slot], page[slot + 1]]) as usize;
        if cell_offset >= page.len() {
            continue;
        }

        if let Some(record) = parse_cell(&page[cell_offset..], is_interior, layout) {
            out.push(record);
        }
    }
}

/// Parses a single cell starting at `cell`, the page-relative byte offset
/// named by a cell pointer. Returns `None` on any fault, which the caller
/// treats as "skip this cell".
fn parse_cell(cell: &[u8], is_interior: bool, layout: CellLayout) -> Option<Record> {
    if is_interior && layout == CellLayout::Canonical {
        // The canonical table-interior cell carries no payload at all: it is
        // purely a left-child pointer and a key, so there is nothing here to
        // recover as a record.
        return None;
    }

    let mut offset = 0usize;

    let payload_length = Varint::read(&cell[offset..]).ok()?;
    offset += payload_length.bytes_read as usize;

    if is_interior {
        // Heuristic layout: treat the left-child pointer as a varint too,
        // same shape as a leaf cell. Value is discarded; see module docs.
        let left_child = Varint::read(cell.get(offset..)?).ok()?;
        offset += left_child.bytes_read as usize;
    }

    let rowid = Varint::read(cell.get(offset..)?).ok()?;
    offset += rowid.bytes_read as usize;

    // `payload_length` is an attacker-controlled varint (up to 2^64 - 1), so
    // `offset + payload_length` must never be computed with unchecked usize
    // arithmetic: a single crafted cell would overflow it. Ground truth
    // (`extract.py:117`, `page_data[cell_offset:cell_offset+payload_length]`)
    // is a plain Python slice, which silently clamps to whatever bytes are
    // actually available rather than rejecting the cell — so mirror that by
    // truncating to the available tail instead of bailing with `?`.
    let payload_length = payload_length.value as usize;
    let available = cell.get(offset..).unwrap_or(&[]);
    let take = payload_length.min(available.len());
    let payload = &available[..take];

    Record::decode(payload).ok()
}
