//! The live block object (§4.1, §5).
//!
//! `BlockObject` is the handle callers hold open against a single backing
//! file: it owns the I/O backend, the live extent-list/root state once
//! loaded, and the short-lived `live_lock` that serializes mutation of that
//! state against concurrent readers. It does not itself enforce
//! single-writer discipline for `snapshot()` calls — per §5, that is the
//! caller's responsibility, the same way `ApiHandler`'s `Mutex<()>` protects
//! shared fields without pretending to be a full request scheduler.

use std::sync::Mutex;

use super::errors::{BlockError, BlockResult};
use super::io::BlockBackend;
use super::types::SnapshotStateBlock;
use super::verify::{NullVerifyHooks, VerifyHooks};

/// A live handle onto a block-addressed B-tree storage file.
pub struct BlockObject {
    pub(crate) name: String,
    pub(crate) verify: bool,
    pub(crate) io: Box<dyn BlockBackend>,
    pub(crate) hooks: Box<dyn VerifyHooks>,
    /// Serializes mutation of `live` and the file size across the load,
    /// unload, and snapshot-process paths.
    pub(crate) live_lock: Mutex<()>,
    pub(crate) live_loaded: bool,
    pub(crate) live: SnapshotStateBlock,
}

impl BlockObject {
    /// Initializes a block object against `io`, with verification disabled
    /// and the default no-op verify hooks (§4.1's non-locking `snap_init`
    /// plus its locking counterpart: the live state starts zeroed and
    /// unloaded, and `live_lock` starts unlocked).
    pub fn new(name: impl Into<String>, io: Box<dyn BlockBackend>) -> Self {
        Self {
            name: name.into(),
            verify: false,
            io,
            hooks: Box::new(NullVerifyHooks),
            live_lock: Mutex::new(()),
            live_loaded: false,
            live: SnapshotStateBlock::zeroed(),
        }
    }

    /// Enables verification and installs `hooks` to be called during
    /// load/unload.
    pub fn with_verify(mut self, hooks: Box<dyn VerifyHooks>) -> Self {
        self.verify = true;
        self.hooks = hooks;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_loaded(&self) -> bool {
        self.live_loaded
    }

    /// Returns a snapshot of the live state block. Errors if nothing is
    /// loaded.
    pub fn live_state(&self) -> BlockResult<SnapshotStateBlock> {
        if !self.live_loaded {
            return Err(BlockError::not_loaded(format!("{}: no snapshot loaded", self.name)));
        }
        Ok(self.live.clone())
    }
}

/// Initializes a snapshot state block (§4.1), one of the four required entry
/// points to the engine (§6).
///
/// When `is_live` is true, this is also the only place `live_loaded` is
/// check-and-set: `live_lock` is held just long enough to fail with
/// `ALREADY_LOADED` if a snapshot is already live, or else mark it live. The
/// lock is released before the state block itself is zeroed, so a failed call
/// never touches the previous live state.
pub fn snap_init(obj: &mut BlockObject, is_live: bool) -> BlockResult<()> {
    if is_live {
        let _guard = obj.live_lock.lock().expect("live lock poisoned");
        if obj.live_loaded {
            return Err(BlockError::already_loaded(format!("{}: snapshot already loaded", obj.name)));
        }
        obj.live_loaded = true;
    }
    obj.live = SnapshotStateBlock::zeroed();
    Ok(())
}
