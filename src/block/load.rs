//! Snapshot load (§4.3).
//!
//! Initializes the live snapshot (§4.1's locking `snap_init`), then — if a
//! cookie was supplied — decodes it into the live state block, optionally
//! reading its avail extent list and truncating the file to the snapshot's
//! last known size when the snapshot is being opened for writing. Any
//! failure along the way clears `live_loaded` again, leaving the object
//! exactly as it was before the call.

use super::cookie;
use super::errors::BlockResult;
use super::extent::ExtentList;
use super::object::{snap_init, BlockObject};

/// Loads `raw_cookie` as the live snapshot state of `obj`. `None` means no
/// cookie is present — the live snapshot is simply empty (§4.3 step 2).
///
/// When `writable` is true, the avail extent list is read into memory (it is
/// the only list a writer needs before its first allocation) and the backing
/// file is truncated to the snapshot's recorded `file_size`, discarding any
/// bytes written after that snapshot was taken.
pub fn snapshot_load(obj: &mut BlockObject, raw_cookie: Option<&[u8]>, writable: bool) -> BlockResult<()> {
    snap_init(obj, true)?;

    let raw_cookie = match raw_cookie {
        Some(bytes) => bytes,
        None => return Ok(()),
    };

    if let Err(e) = load_cookie(obj, raw_cookie, writable) {
        obj.live_loaded = false;
        return Err(e);
    }
    Ok(())
}

fn load_cookie(obj: &mut BlockObject, raw_cookie: &[u8], writable: bool) -> BlockResult<()> {
    if obj.verify {
        obj.hooks.pre_load(&obj.name)?;
    }

    let mut state = cookie::decode(raw_cookie)
        .map_err(|e| e.with_details(format!("loading snapshot for {}", obj.name)))?;

    if obj.verify {
        obj.hooks.post_load(&obj.name, &state)?;
    }

    if writable {
        if state.avail.locator.is_valid() {
            let bytes = obj
                .io
                .read_off(state.avail.locator.offset, state.avail.locator.size as usize)?;
            let ranges = ExtentList::decode(&bytes)
                .map_err(|e| e.with_details(format!("{}: avail extent list corrupt", obj.name)))?;
            state.avail.ranges = Some(ranges);
        } else {
            state.avail.ranges = Some(ExtentList::new());
        }

        obj.io.truncate(state.file_size)?;
    }

    obj.live = state;
    Ok(())
}
