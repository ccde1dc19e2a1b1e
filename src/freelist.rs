//! Free-list trunk/leaf traversal.
//!
//! The free list is a singly linked chain of "trunk" pages; each trunk page
//! also lists a batch of "leaf" page numbers that carry no free-list
//! structure of their own but often still hold the last cell content written
//! to them before they were unlinked.

use log::warn;
use std::collections::HashSet;

/// The result of walking the free list: the page indices visited (trunk and
/// leaf alike, 0-based, in visit order) plus any diagnostics collected along
/// the way. Diagnostics are informational; the walker always returns
/// whatever pages it managed to collect before stopping.
#[derive(Debug, Default)]
pub struct FreelistWalk {
    pub pages: Vec<usize>,
    pub diagnostics: Vec<String>,
}

/// Walks the free list starting at `trunk_page` (1-based, as stored in the
/// header; 0 means "no free list"). Stops once `total_pages` page numbers
/// have been collected, the trunk chain terminates (next-trunk == 0), or a
/// trunk page is out of bounds or too short to read its own header.
pub fn walk(image: &[u8], page_size: usize, trunk_page: u32, total_pages: u32) -> FreelistWalk {
    let mut result = FreelistWalk::default();
    if trunk_page == 0 {
        return result;
    }

    let mut visited_trunks: HashSet<u32> = HashSet::new();
    let mut next_trunk = trunk_page;
    let mut collected: u32 = 0;

    while next_trunk != 0 && collected < total_pages {
        if !visited_trunks.insert(next_trunk) {
            result.diagnostics.push(format!(
                "free-list trunk page {next_trunk} revisited; stopping to avoid a cycle"
            ));
            break;
        }

        let trunk_offset = (next_trunk as usize - 1) * page_size;
        if trunk_offset + page_size > image.len() {
            result.diagnostics.push(format!(
                "free-list trunk page {next_trunk} is out of bounds of the file"
            ));
            break;
        }
        let trunk = &image[trunk_offset..trunk_offset + page_size];
        result.pages.push(next_trunk as usize - 1);

        if trunk.len() < 8 {
            result.diagnostics.push(format!(
                "free-list trunk page {next_trunk} is too short to read its header"
            ));
            break;
        }

        let following_trunk = u32::from_be_bytes([trunk[0], trunk[1], trunk[2], trunk[3]]);
        let leaf_count = u32::from_be_bytes([trunk[4], trunk[5], trunk[6], trunk[7]]);

        let mut stopped_short = false;
        for i in 0..leaf_count {
            if collected >= total_pages {
                break;
            }
            let slot = 8 + 4 * i as usize;
            if slot + 4 > trunk.len() {
                result.diagnostics.push(format!(
                    "free-list trunk page {next_trunk} truncated before leaf slot {i}"
                ));
                stopped_short = true;
                break;
            }
            let leaf = u32::from_be_bytes([
                trunk[slot],
                trunk[slot + 1],
                trunk[slot + 2],
                trunk[slot + 3],
            ]);
            if leaf == 0 {
                continue;
            }
            result.pages.push(leaf as usize - 1);
            collected += 1;
        }

        if stopped_short {
            break;
        }

        next_trunk = following_trunk;
    }

    for d in &result.diagnostics {
        warn!("{d}");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trunk_page(page_size: usize, next_trunk: u32, leaves: &[u32]) -> Vec<u8> {
        let mut page = vec![0u8; page_size];
        page[0..4].copy_from_slice(&next_trunk.to_be_bytes());
        page[4..8].copy_from_slice(&(leaves.len() as u32).to_be_bytes());
        for (i, leaf) in leaves.iter().enumerate() {
            let slot = 8 + 4 * i;
            page[slot..slot + 4].copy_from_slice(&leaf.to_be_bytes());
        }
        page
    }

    #[test]
    fn no_free_list_when_trunk_is_zero() {
        let image = vec![0u8; 4096];
        let w = walk(&image, 4096, 0, 0);
        assert!(w.pages.is_empty());
    }

    #[test]
    fn single_trunk_with_two_leaves() {
        let page_size = 512;
        let mut image = vec![0u8; page_size * 4];
        // Trunk is page 2 (1-based) -> offset page_size.
        let trunk = trunk_page(page_size, 0, &[3, 4]);
        image[page_size..page_size * 2].copy_from_slice(&trunk);

        let w = walk(&image, page_size, 2, 2);
        // 0-based: trunk page index 1, leaves at indices 2 and 3.
        assert_eq!(w.pages, vec![1, 2, 3]);
        assert!(w.diagnostics.is_empty());
    }

    #[test]
    fn chained_trunks_are_followed() {
        let page_size = 512;
        let mut image = vec![0u8; page_size * 5];
        let trunk1 = trunk_page(page_size, 3, &[4]);
        let trunk2 = trunk_page(page_size, 0, &[5]);
        image[0..page_size].copy_from_slice(&trunk1);
        image[page_size * 2..page_size * 3].copy_from_slice(&trunk2);

        let w = walk(&image, page_size, 1, 2);
        assert_eq!(w.pages, vec![0, 3, 2, 4]);
    }

    #[test]
    fn out_of_bounds_trunk_emits_diagnostic_and_stops() {
        let page_size = 512;
        let image = vec![0u8; page_size];
        let w = walk(&image, page_size, 50, 10);
        assert!(w.pages.is_empty());
        assert_eq!(w.diagnostics.len(), 1);
    }

    #[test]
    fn truncated_trunk_page_keeps_already_collected_pages() {
        let page_size = 512;
        let mut image = vec![0u8; page_size];
        // Only 6 bytes available: not enough for the 8-byte trunk header.
        image.truncate(6);
        let w = walk(&image, page_size, 1, 5);
        assert!(w.pages.is_empty()); // trunk page itself is out of bounds
        assert_eq!(w.diagnostics.len(), 1);
    }

    #[test]
    fn declared_total_bounds_collection_even_with_more_leaves_present() {
        let page_size = 512;
        let mut image = vec![0u8; page_size * 2];
        let trunk = trunk_page(page_size, 0, &[2, 3, 4]);
        image[0..page_size].copy_from_slice(&trunk);

        let w = walk(&image, page_size, 1, 1);
        // Trunk page + exactly one leaf, even though three were listed.
        assert_eq!(w.pages, vec![0, 1]);
    }
}
