//! Disjoint-range extent lists.
//!
//! An extent list is a set of disjoint half-open byte ranges `[start, start+len)`
//! over file space, maintained as `alloc` (added this epoch), `avail` (free for
//! allocation), or `discard` (freed this epoch). Adjacent-and-touching ranges are
//! coalesced on insert so the set stays minimal.
//!
//! Backed by a `BTreeSet<Extent>` ordered by start offset, the same sorted-collection
//! idiom as the document index (binary-search insert, deterministic iteration order).

use std::collections::BTreeSet;

use super::errors::{BlockError, BlockResult};

/// A single half-open byte range `[start, start + len)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Extent {
    pub start: u64,
    pub len: u64,
}

impl Extent {
    /// Creates a new extent. Panics if `len == 0`; zero-length ranges cannot be
    /// tracked and callers must never construct one.
    pub fn new(start: u64, len: u64) -> Self {
        assert!(len > 0, "extent length must be nonzero");
        Self { start, len }
    }

    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.start + self.len
    }

    fn overlaps(&self, other: &Extent) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    fn touches(&self, other: &Extent) -> bool {
        self.end() == other.start || other.end() == self.start
    }
}

/// A disjoint set of extents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtentList {
    ranges: BTreeSet<Extent>,
}

impl ExtentList {
    /// Creates an empty extent list.
    pub fn new() -> Self {
        Self { ranges: BTreeSet::new() }
    }

    /// Returns true if the list tracks no ranges.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of disjoint ranges currently tracked (after coalescing).
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    /// Iterates ranges in ascending offset order.
    pub fn iter(&self) -> impl Iterator<Item = &Extent> {
        self.ranges.iter()
    }

    /// Total number of bytes tracked across all ranges.
    pub fn total_bytes(&self) -> u64 {
        self.ranges.iter().map(|e| e.len).sum()
    }

    /// Inserts a range, coalescing with any touching or overlapping neighbors.
    ///
    /// Overlap with an existing range is tolerated by folding both into a single
    /// coalesced range: the allocator above is expected not to double-allocate,
    /// but coalescing keeps the invariant (disjoint, minimal) intact regardless.
    pub fn insert(&mut self, extent: Extent) {
        let mut merged = extent;
        let mut keep = Vec::new();
        for existing in self.ranges.iter() {
            if existing.overlaps(&merged) || existing.touches(&merged) {
                let start = merged.start.min(existing.start);
                let end = merged.end().max(existing.end());
                merged = Extent::new(start, end - start);
            } else {
                keep.push(*existing);
            }
        }
        self.ranges = keep.into_iter().collect();
        self.ranges.insert(merged);
    }

    /// Allocates and removes `len` bytes from the list, preferring the lowest
    /// offset available (first-fit over the sorted set). Returns `None` if no
    /// range is large enough.
    pub fn allocate(&mut self, len: u64) -> Option<Extent> {
        let candidate = *self.ranges.iter().find(|e| e.len >= len)?;
        self.ranges.remove(&candidate);
        let taken = Extent::new(candidate.start, len);
        if candidate.len > len {
            self.ranges.insert(Extent::new(candidate.start + len, candidate.len - len));
        }
        Some(taken)
    }

    /// Frees `extent` back into the list (alias for `insert`, named for call-site
    /// clarity at free points).
    pub fn free(&mut self, extent: Extent) {
        self.insert(extent);
    }

    /// Removes exactly `extent` from the list. Fails with `CORRUPT` if `extent`
    /// is not covered by a single tracked range (the caller is expected to only
    /// ever remove ranges it previously observed via `iter`/`allocate`).
    pub fn remove(&mut self, extent: Extent) -> BlockResult<()> {
        let covering = *self
            .ranges
            .iter()
            .find(|e| e.start <= extent.start && extent.end() <= e.end())
            .ok_or_else(|| {
                BlockError::corrupt(format!(
                    "extent [{}, {}) not found in list",
                    extent.start,
                    extent.end()
                ))
            })?;
        self.ranges.remove(&covering);
        if covering.start < extent.start {
            self.ranges.insert(Extent::new(covering.start, extent.start - covering.start));
        }
        if extent.end() < covering.end() {
            self.ranges.insert(Extent::new(extent.end(), covering.end() - extent.end()));
        }
        Ok(())
    }

    /// Returns true if no range in `self` overlaps any range in `other`.
    pub fn is_disjoint_from(&self, other: &ExtentList) -> bool {
        for a in &self.ranges {
            for b in &other.ranges {
                if a.overlaps(b) {
                    return false;
                }
            }
        }
        true
    }

    /// Merges `other` into `self` (union of two disjoint sets). Fails with
    /// `CORRUPT` if the two lists are not actually disjoint, since a merge that
    /// silently dropped or double-counted a byte would violate the core
    /// conservation invariant.
    pub fn merge(&mut self, other: &ExtentList) -> BlockResult<()> {
        if !self.is_disjoint_from(other) {
            return Err(BlockError::corrupt("merge of overlapping extent lists"));
        }
        for e in &other.ranges {
            self.insert(*e);
        }
        Ok(())
    }

    /// Intersects `self` and `other`, moving the overlap out of both and into a
    /// freshly returned `ExtentList`. Used by reuse-match: ranges present on both
    /// a snapshot's `alloc` and `discard` lists were allocated and freed within
    /// the same epoch and are immediately reusable.
    pub fn match_and_move(&mut self, other: &mut ExtentList) -> ExtentList {
        let mut moved = ExtentList::new();
        let a: Vec<Extent> = self.ranges.iter().copied().collect();
        for ea in a {
            let b: Vec<Extent> = other.ranges.iter().copied().collect();
            for eb in b {
                let lo = ea.start.max(eb.start);
                let hi = ea.end().min(eb.end());
                if lo < hi {
                    let overlap = Extent::new(lo, hi - lo);
                    // Both sides must still contain the overlap; ignore if a
                    // prior iteration of this same pass already consumed it.
                    if self.remove(overlap).is_ok() && other.remove(overlap).is_ok() {
                        moved.insert(overlap);
                    }
                }
            }
        }
        moved
    }

    /// Trims trailing ranges that reach `file_size` (the tail of the file),
    /// shrinking the highest range if it runs past `file_size`. Returns the
    /// number of bytes removed.
    pub fn truncate_tail(&mut self, file_size: u64) -> u64 {
        let mut removed = 0u64;
        loop {
            let Some(last) = self.ranges.iter().next_back().copied() else {
                break;
            };
            if last.start >= file_size {
                self.ranges.remove(&last);
                removed += last.len;
            } else if last.end() > file_size {
                self.ranges.remove(&last);
                removed += last.end() - file_size;
                self.ranges.insert(Extent::new(last.start, file_size - last.start));
                break;
            } else {
                break;
            }
        }
        removed
    }

    /// Highest exclusive end offset reached by any tracked range, or 0 if empty.
    pub fn max_end(&self) -> u64 {
        self.ranges.iter().next_back().map(|e| e.end()).unwrap_or(0)
    }

    /// Serializes to a simple binary form: a `u32` count followed by
    /// `(start: u64, len: u64)` pairs in ascending order, trailed by a CRC32
    /// over the preceding bytes. Mirrors the length-prefixed record layout used
    /// elsewhere in this codebase's on-disk formats.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.ranges.len() * 16 + 4);
        buf.extend_from_slice(&(self.ranges.len() as u32).to_le_bytes());
        for e in &self.ranges {
            buf.extend_from_slice(&e.start.to_le_bytes());
            buf.extend_from_slice(&e.len.to_le_bytes());
        }
        let cksum = super::checksum::compute_checksum(&buf);
        buf.extend_from_slice(&cksum.to_le_bytes());
        buf
    }

    /// Inverse of `encode`. Fails with `CORRUPT` on a truncated buffer or a
    /// checksum mismatch.
    pub fn decode(bytes: &[u8]) -> BlockResult<Self> {
        if bytes.len() < 8 {
            return Err(BlockError::corrupt("extent list buffer too short"));
        }
        let (body, trailer) = bytes.split_at(bytes.len() - 4);
        let expected = u32::from_le_bytes(trailer.try_into().unwrap());
        if super::checksum::compute_checksum(body) != expected {
            return Err(BlockError::corrupt("extent list checksum mismatch"));
        }
        if body.len() < 4 {
            return Err(BlockError::corrupt("extent list buffer too short"));
        }
        let count = u32::from_le_bytes(body[0..4].try_into().unwrap()) as usize;
        let mut cursor = 4usize;
        let mut list = ExtentList::new();
        for _ in 0..count {
            if cursor + 16 > body.len() {
                return Err(BlockError::corrupt("extent list truncated"));
            }
            let start = u64::from_le_bytes(body[cursor..cursor + 8].try_into().unwrap());
            let len = u64::from_le_bytes(body[cursor + 8..cursor + 16].try_into().unwrap());
            cursor += 16;
            list.ranges.insert(Extent::new(start, len));
        }
        Ok(list)
    }
}
