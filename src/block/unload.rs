//! Snapshot unload (§4.4).
//!
//! Releases the live snapshot's in-memory extent-list ranges and clears
//! `live_loaded`, returning the object to the state `snapshot_load` found it
//! in. Errors if nothing is currently loaded. `live_loaded` is mutated under
//! `live_lock` (§5), the same as the check-and-set in `snap_init`.

use super::errors::{BlockError, BlockResult};
use super::object::BlockObject;

/// Releases the live snapshot state of `obj`.
pub fn snapshot_unload(obj: &mut BlockObject) -> BlockResult<()> {
    {
        let guard = obj.live_lock.lock().expect("live lock poisoned");
        if !obj.live_loaded {
            return Err(BlockError::not_loaded(format!("{}: no snapshot loaded to unload", obj.name)));
        }
        obj.live_loaded = false;
        drop(guard);
    }

    if obj.verify {
        obj.hooks.pre_unload(&obj.name)?;
    }

    obj.live.alloc.release();
    obj.live.avail.release();
    obj.live.discard.release();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::io::mock::MockBlockIo;
    use crate::block::load::snapshot_load;

    fn loaded_object() -> BlockObject {
        let mut obj = BlockObject::new("test.db", Box::new(MockBlockIo::new(4096)));
        snapshot_load(&mut obj, None, false).unwrap();
        obj
    }

    #[test]
    fn test_unload_clears_loaded_flag() {
        let mut obj = loaded_object();
        snapshot_unload(&mut obj).unwrap();
        assert!(!obj.is_loaded());
    }

    #[test]
    fn test_unload_releases_extent_ranges() {
        let mut obj = loaded_object();
        obj.live.avail.ranges_or_empty();
        assert!(obj.live.avail.ranges.is_some());

        snapshot_unload(&mut obj).unwrap();
        assert!(obj.live.avail.ranges.is_none());
    }

    #[test]
    fn test_unload_without_load_errors() {
        let mut obj = BlockObject::new("test.db", Box::new(MockBlockIo::new(4096)));
        let err = snapshot_unload(&mut obj).unwrap_err();
        assert_eq!(err.code().code(), "BLOCK_NOT_LOADED");
    }

    #[test]
    fn test_unload_then_reload_succeeds() {
        let mut obj = loaded_object();
        snapshot_unload(&mut obj).unwrap();

        snapshot_load(&mut obj, None, false).unwrap();
        assert!(obj.is_loaded());
    }
}
