//! Snapshot state block and its constituent value types (§3, §4.1).

use super::extent::ExtentList;

/// Sentinel offset meaning "no such locator" — an empty tree, or an
/// extent list that has never been written to disk.
pub const INVALID_OFFSET: u64 = u64::MAX;

/// Maximum encoded cookie size in bytes (§4.2, §6).
pub const MAX_ADDR_COOKIE: usize = 256;

/// The current on-disk snapshot encoding version.
pub const CURRENT_VERSION: u32 = 1;

/// A locator for a single on-disk object: its offset, size, and checksum.
/// `offset == INVALID_OFFSET` means "nothing stored here".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locator {
    pub offset: u64,
    pub size: u32,
    pub cksum: u32,
}

impl Locator {
    /// The empty/sentinel locator.
    pub fn invalid() -> Self {
        Self { offset: INVALID_OFFSET, size: 0, cksum: 0 }
    }

    /// Whether this locator points at a real on-disk object.
    pub fn is_valid(&self) -> bool {
        self.offset != INVALID_OFFSET
    }
}

impl Default for Locator {
    fn default() -> Self {
        Self::invalid()
    }
}

/// One of the three extent-list handles (`alloc`, `avail`, `discard`) carried
/// by a snapshot state block: a name tag, a file locator, and — when loaded —
/// the in-memory range data.
#[derive(Debug, Clone)]
pub struct ExtentListHandle {
    pub name: &'static str,
    pub locator: Locator,
    pub ranges: Option<ExtentList>,
}

impl ExtentListHandle {
    fn new(name: &'static str) -> Self {
        Self { name, locator: Locator::invalid(), ranges: None }
    }

    /// Returns the in-memory ranges, loading an empty list if none is present
    /// yet (the common case for a freshly initialized live handle).
    pub fn ranges_or_empty(&mut self) -> &mut ExtentList {
        self.ranges.get_or_insert_with(ExtentList::new)
    }

    /// Discards the in-memory range data, keeping only the on-disk locator.
    pub fn release(&mut self) {
        self.ranges = None;
    }
}

/// A snapshot's complete on-disk-addressable state: the root page locator,
/// the three extent-list handles, the file size the snapshot is self-contained
/// against, and a monotone write generation.
#[derive(Debug, Clone)]
pub struct SnapshotStateBlock {
    pub version: u32,
    pub root: Locator,
    pub alloc: ExtentListHandle,
    pub avail: ExtentListHandle,
    pub discard: ExtentListHandle,
    pub file_size: u64,
    pub write_gen: u64,
}

impl SnapshotStateBlock {
    /// Builds a zeroed state block with all locators set to the sentinel, per
    /// §4.1 (the non-locking part of `snap_init`: zero the state block, set
    /// `root_offset`/extent-list offsets to `INVALID_OFFSET`, and set the
    /// extent-list name tags).
    pub fn zeroed() -> Self {
        Self {
            version: CURRENT_VERSION,
            root: Locator::invalid(),
            alloc: ExtentListHandle::new("alloc"),
            avail: ExtentListHandle::new("avail"),
            discard: ExtentListHandle::new("discard"),
            file_size: 0,
            write_gen: 0,
        }
    }

    /// True if this snapshot has no root page (an empty tree).
    pub fn is_empty_tree(&self) -> bool {
        !self.root.is_valid()
    }
}

impl Default for SnapshotStateBlock {
    fn default() -> Self {
        Self::zeroed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_state_block_has_sentinel_locators() {
        let state = SnapshotStateBlock::zeroed();
        assert!(!state.root.is_valid());
        assert!(!state.alloc.locator.is_valid());
        assert!(!state.avail.locator.is_valid());
        assert!(!state.discard.locator.is_valid());
    }

    #[test]
    fn test_zeroed_state_block_has_name_tags() {
        let state = SnapshotStateBlock::zeroed();
        assert_eq!(state.alloc.name, "alloc");
        assert_eq!(state.avail.name, "avail");
        assert_eq!(state.discard.name, "discard");
    }

    #[test]
    fn test_empty_tree_detection() {
        let mut state = SnapshotStateBlock::zeroed();
        assert!(state.is_empty_tree());
        state.root = Locator { offset: 0, size: 4096, cksum: 1 };
        assert!(!state.is_empty_tree());
    }

    #[test]
    fn test_ranges_or_empty_lazily_initializes() {
        let mut handle = ExtentListHandle::new("alloc");
        assert!(handle.ranges.is_none());
        handle.ranges_or_empty().insert(crate::block::extent::Extent::new(0, 10));
        assert!(handle.ranges.is_some());
        handle.release();
        assert!(handle.ranges.is_none());
    }
}
