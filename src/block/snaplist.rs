//! Snapshot list entries and their lifecycle flags (§4.5, §9).
//!
//! A snapshot list is the ordered sequence of named snapshots the caller
//! passes into `snapshot()`: each entry carries a raw cookie (or none, for a
//! brand-new entry), a set of [`SnapFlags`] describing what should happen to
//! it, and — while `snapshot()` is running — transient ownership of the
//! historical [`SnapshotStateBlock`] it decodes to.
//!
//! `SnapFlags` is a bitmask rather than a tagged enum: a real snapshot list
//! entry can be `ADD` on first creation and later gain `UPDATE` once a
//! neighboring delete forces it to be rewritten, so the three states are not
//! mutually exclusive in practice. `bitflags` keeps that shape explicit while
//! giving each flag a real name instead of a bare `u8`.

use bitflags::bitflags;

use super::errors::{BlockError, BlockResult};
use super::types::SnapshotStateBlock;

bitflags! {
    /// Lifecycle flags for a single snapshot list entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SnapFlags: u8 {
        /// This entry is new; its cookie does not exist on disk yet.
        const ADD = 0b001;
        /// This entry should be removed once `snapshot()` completes.
        const DELETE = 0b010;
        /// This entry survives but must be rewritten (its extent lists changed
        /// as a result of a neighboring delete).
        const UPDATE = 0b100;
    }
}

impl SnapFlags {
    /// Validates that the flag combination is one `snapshot()` can act on:
    /// `ADD` and `DELETE` together make no sense (a brand-new entry cannot
    /// simultaneously be marked for removal).
    pub fn validate(self) -> BlockResult<()> {
        if self.contains(SnapFlags::ADD) && self.contains(SnapFlags::DELETE) {
            return Err(BlockError::invalid_argument(
                "snapshot list entry cannot be both ADD and DELETE",
            ));
        }
        Ok(())
    }
}

/// One entry in a snapshot list passed to `snapshot()`.
pub struct SnapshotListEntry {
    pub name: String,
    /// The entry's encoded cookie, if it already exists on disk.
    pub raw_cookie: Option<Vec<u8>>,
    pub flags: SnapFlags,
    /// Historical state loaded transiently during `snapshot()` processing;
    /// always `None` outside of an in-flight `snapshot()` call.
    pub historical: Option<Box<SnapshotStateBlock>>,
}

impl SnapshotListEntry {
    /// Builds a brand-new entry to be added by the next `snapshot()` call.
    pub fn new_add(name: impl Into<String>) -> Self {
        Self { name: name.into(), raw_cookie: None, flags: SnapFlags::ADD, historical: None }
    }

    /// Builds an entry referencing an existing on-disk snapshot, unmarked.
    pub fn existing(name: impl Into<String>, raw_cookie: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            raw_cookie: Some(raw_cookie),
            flags: SnapFlags::empty(),
            historical: None,
        }
    }

    /// Marks this entry for deletion during the next `snapshot()` call.
    pub fn mark_delete(&mut self) {
        self.flags.insert(SnapFlags::DELETE);
    }

    /// Marks this entry as needing a rewritten cookie, without changing
    /// whether it is also scheduled for deletion.
    pub fn mark_update(&mut self) {
        self.flags.insert(SnapFlags::UPDATE);
    }

    pub fn is_add(&self) -> bool {
        self.flags.contains(SnapFlags::ADD)
    }

    pub fn is_delete(&self) -> bool {
        self.flags.contains(SnapFlags::DELETE)
    }

    pub fn is_update(&self) -> bool {
        self.flags.contains(SnapFlags::UPDATE)
    }

    /// Releases transiently-loaded historical state. Safe to call whether or
    /// not state was ever loaded; always called before returning from
    /// `snapshot()`, on every path including errors.
    pub fn drop_historical(&mut self) {
        self.historical = None;
    }
}
