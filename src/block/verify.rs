//! Verification hook seam (§4.8).
//!
//! The snapshot engine calls out to a verifier at four points in the
//! load/unload lifecycle. Production code runs with [`NullVerifyHooks`];
//! a real verifier (consistency checker, fsck-style walker) can be plugged
//! in without the snapshot engine knowing the difference, the same way the
//! recovery path takes a `StorageApply` implementation.

use super::errors::BlockResult;
use super::types::SnapshotStateBlock;

/// Hooks invoked around snapshot load/unload, giving a verifier a chance to
/// inspect on-disk state before or after the engine mutates it.
pub trait VerifyHooks: Send + Sync {
    /// Called just before a snapshot's cookie is decoded and its state loaded.
    fn pre_load(&self, _name: &str) -> BlockResult<()> {
        Ok(())
    }

    /// Called after a snapshot's state has been loaded into memory.
    fn post_load(&self, _name: &str, _state: &SnapshotStateBlock) -> BlockResult<()> {
        Ok(())
    }

    /// Called just before a live snapshot's in-memory state is released.
    fn pre_unload(&self, _name: &str) -> BlockResult<()> {
        Ok(())
    }

    /// Verifies an on-disk payload against its expected checksum/shape before
    /// it is trusted by the caller.
    fn verify_dsk(&self, _name: &str, _data: &[u8]) -> BlockResult<()> {
        Ok(())
    }
}

/// The default, no-op verifier. Used whenever the caller has not configured
/// a consistency checker.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullVerifyHooks;

impl VerifyHooks for NullVerifyHooks {}
