//! blocksnap - snapshot lifecycle engine for a block-addressed B-tree storage file.
//!
//! The [`block`] module is the whole crate: a live handle over a backing
//! file ([`block::BlockObject`]), the cookie codec for its on-disk snapshot
//! state, the disjoint-extent-list bookkeeping that tracks free space across
//! snapshots, and the create-and-process path that folds deleted snapshots
//! into their successors.

pub mod block;
pub mod observability;
