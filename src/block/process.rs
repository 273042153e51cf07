//! Create-and-process path (§4.5) and snapshot-update (§4.6).
//!
//! This is the core of the subsystem: given a new root page and an ordered
//! snapshot list, write the root, fold deleted snapshots into their
//! successors, rewrite whichever surviving snapshots changed as a result,
//! finalize the live snapshot, and fsync. Single-writer discipline is the
//! caller's responsibility (§4.5.1); `live_lock` here only protects the live
//! extent lists and `file_size` against concurrent readers.
//!
//! The guarded section (§4.5.4-4.5.7) operates through [`LiveCtx`], a bundle
//! of the individual fields it needs (`live`, `io`, `name`, `verify`)
//! borrowed directly off `BlockObject` alongside `live_lock`'s guard: since
//! each field is borrowed by its own projection rather than through another
//! `&mut BlockObject`, the borrows stay disjoint from the lock itself.

use super::checksum::compute_checksum;
use super::cookie;
use super::errors::{BlockError, BlockResult};
use super::extent::{Extent, ExtentList};
use super::io::BlockBackend;
use super::log;
use super::object::BlockObject;
use super::snaplist::SnapshotListEntry;
use super::types::{ExtentListHandle, Locator, SnapshotStateBlock, CURRENT_VERSION};

/// Runs one create-and-process round against `obj`'s live snapshot.
///
/// `root_buf`, if present, is written as the new root page. `snaps` is
/// mutated in place: historical entries marked `DELETE` are folded into
/// their successor, surviving entries that changed as a result gain
/// `UPDATE` and a fresh `raw_cookie`, and the single `ADD` entry (always
/// last) receives the cookie for the new live snapshot.
pub fn snapshot(
    obj: &mut BlockObject,
    root_buf: Option<&[u8]>,
    snaps: &mut [SnapshotListEntry],
) -> BlockResult<()> {
    if !obj.live_loaded {
        return Err(BlockError::not_loaded(format!("{}: no live snapshot loaded", obj.name)));
    }
    validate_snapshot_list(snaps)?;

    write_new_root(obj, root_buf)?;

    let found = load_historical_state(obj, snaps)?;

    {
        let _guard = obj.live_lock.lock().expect("live lock poisoned");
        let mut ctx = LiveCtx { live: &mut obj.live, io: obj.io.as_ref(), verify: obj.verify };

        if found {
            run_deletion_and_merge(&mut ctx, &obj.name, snaps)?;
            rewrite_updated(&mut ctx, snaps)?;
        }
        finalize_live(&mut ctx, &obj.name, snaps)?;
    }

    for entry in snaps.iter_mut() {
        entry.drop_historical();
    }

    obj.io.fsync()?;
    log::create(&obj.name, snaps.len());
    Ok(())
}

/// The fields a guarded create-and-process step needs, borrowed disjointly
/// off `BlockObject` from `live_lock`'s guard.
struct LiveCtx<'a> {
    live: &'a mut SnapshotStateBlock,
    io: &'a dyn BlockBackend,
    verify: bool,
}

fn validate_snapshot_list(snaps: &[SnapshotListEntry]) -> BlockResult<()> {
    if snaps.is_empty() {
        return Err(BlockError::invalid_argument("snapshot list must have at least one entry"));
    }
    for entry in snaps {
        entry.flags.validate()?;
    }
    let add_count = snaps.iter().filter(|s| s.is_add()).count();
    if add_count != 1 {
        return Err(BlockError::invalid_argument(
            "snapshot list must contain exactly one ADD entry",
        ));
    }
    if !snaps.last().unwrap().is_add() {
        return Err(BlockError::invalid_argument("the ADD entry must be the last entry"));
    }
    Ok(())
}

fn write_new_root(obj: &mut BlockObject, root_buf: Option<&[u8]>) -> BlockResult<()> {
    match root_buf {
        Some(buf) if !buf.is_empty() => {
            let offset = allocate_live(&mut obj.live, obj.io.as_ref(), buf.len() as u64)?;
            obj.io.write_off(offset, buf)?;
            obj.live.root = Locator { offset, size: buf.len() as u32, cksum: compute_checksum(buf) };
        }
        Some(_) => return Err(BlockError::invalid_argument("root buffer must not be empty")),
        None => obj.live.root = Locator::invalid(),
    }
    obj.live.version = CURRENT_VERSION;
    Ok(())
}

/// §4.5.3: load historical state for entries that need it ahead of the lock.
fn load_historical_state(obj: &mut BlockObject, snaps: &mut [SnapshotListEntry]) -> BlockResult<bool> {
    let mut found = false;
    for i in 0..snaps.len() {
        if snaps[i].is_add() {
            continue;
        }
        let predecessor_deleted = i > 0 && snaps[i - 1].is_delete();
        let needs_load = snaps[i].is_delete() || i == 0 || predecessor_deleted;
        if needs_load {
            load_one_historical(obj.io.as_ref(), &mut snaps[i])?;
            found = true;
        }
    }
    Ok(found)
}

fn load_one_historical(io: &dyn BlockBackend, entry: &mut SnapshotListEntry) -> BlockResult<()> {
    let raw = entry
        .raw_cookie
        .as_ref()
        .ok_or_else(|| BlockError::invalid_argument(format!("{}: historical entry has no cookie", entry.name)))?;
    let mut state = cookie::decode(raw)
        .map_err(|e| e.with_details(format!("decoding cookie for {}", entry.name)))?;

    state.alloc.ranges = Some(read_extent_list(io, &state.alloc.locator)?);
    state.discard.ranges = Some(read_extent_list(io, &state.discard.locator)?);
    // avail contents are not needed: only its on-disk locator is released.

    entry.historical = Some(Box::new(state));
    Ok(())
}

fn read_extent_list(io: &dyn BlockBackend, locator: &Locator) -> BlockResult<ExtentList> {
    if !locator.is_valid() {
        return Ok(ExtentList::new());
    }
    let bytes = io.read_off(locator.offset, locator.size as usize)?;
    ExtentList::decode(&bytes)
}

/// §4.5.5: iterate DELETE entries in order, folding each into its successor.
fn run_deletion_and_merge(ctx: &mut LiveCtx<'_>, name: &str, snaps: &mut [SnapshotListEntry]) -> BlockResult<()> {
    for i in 0..snaps.len() {
        if !snaps[i].is_delete() {
            continue;
        }

        let a_state = snaps[i].historical.take().ok_or_else(|| {
            BlockError::invalid_argument(format!("{}: DELETE entry missing loaded state", snaps[i].name))
        })?;

        free_root_ordinary(ctx, &a_state)?;
        return_extent_storage_to_avail(ctx, &a_state)?;

        let successor_is_live = snaps[i + 1].is_add();
        if successor_is_live {
            merge_into_handle(&mut ctx.live.alloc, a_state.alloc.ranges.as_ref().unwrap())?;
            merge_into_handle(&mut ctx.live.discard, a_state.discard.ranges.as_ref().unwrap())?;
            reuse_match_live(ctx)?;
            log::delete(name, &snaps[i].name);
            continue;
        }

        let mut b_state = snaps[i + 1].historical.take().ok_or_else(|| {
            BlockError::invalid_argument(format!("{}: missing loaded successor state", snaps[i].name))
        })?;

        merge_into_handle(&mut b_state.alloc, a_state.alloc.ranges.as_ref().unwrap())?;
        merge_into_handle(&mut b_state.discard, a_state.discard.ranges.as_ref().unwrap())?;

        log::delete(name, &snaps[i].name);

        if snaps[i + 1].is_delete() {
            // Leave B for the loop to pick up when it reaches i+1; the run of
            // deletes aggregates transitively, earlier into later.
            snaps[i + 1].historical = Some(b_state);
        } else {
            reuse_match(&mut b_state)?;
            return_extent_storage_to_avail(ctx, &b_state)?;
            snaps[i + 1].mark_update();
            snaps[i + 1].historical = Some(b_state);
        }
    }
    Ok(())
}

fn merge_into_handle(handle: &mut ExtentListHandle, source: &ExtentList) -> BlockResult<()> {
    handle.ranges_or_empty().merge(source)
}

/// Reuse-match: ranges present on both `alloc` and `discard` were allocated
/// and freed inside the window `state` now represents, so they move to
/// `avail`.
fn reuse_match(state: &mut SnapshotStateBlock) -> BlockResult<()> {
    let mut alloc = state.alloc.ranges.take().unwrap_or_default();
    let mut discard = state.discard.ranges.take().unwrap_or_default();
    let moved = alloc.match_and_move(&mut discard);
    state.alloc.ranges = Some(alloc);
    state.discard.ranges = Some(discard);
    state.avail.ranges_or_empty().merge(&moved)
}

/// Same reuse-match as [`reuse_match`], applied to the live snapshot's own
/// alloc/discard/avail instead of a standalone historical state block: a
/// DELETE entry whose successor is the live ADD still needs ranges it both
/// allocated and freed reclaimed into avail, the same as any other successor.
fn reuse_match_live(ctx: &mut LiveCtx<'_>) -> BlockResult<()> {
    let mut alloc = ctx.live.alloc.ranges.take().unwrap_or_default();
    let mut discard = ctx.live.discard.ranges.take().unwrap_or_default();
    let moved = alloc.match_and_move(&mut discard);
    ctx.live.alloc.ranges = Some(alloc);
    ctx.live.discard.ranges = Some(discard);
    ctx.live.avail.ranges_or_empty().merge(&moved)
}

fn free_root_ordinary(ctx: &mut LiveCtx<'_>, state: &SnapshotStateBlock) -> BlockResult<()> {
    if state.root.is_valid() {
        ctx.io.free_tracked(state.root.offset, state.root.size as u64)?;
        let extent = Extent::new(state.root.offset, state.root.size as u64);
        ctx.live.discard.ranges_or_empty().free(extent);
    }
    Ok(())
}

/// Returns the on-disk storage backing a retired state block's three extent
/// lists directly to live avail: that storage was never itself tracked on
/// any alloc list, so it is reclaimable without going through discard.
fn return_extent_storage_to_avail(ctx: &mut LiveCtx<'_>, state: &SnapshotStateBlock) -> BlockResult<()> {
    for locator in [&state.alloc.locator, &state.avail.locator, &state.discard.locator] {
        if locator.is_valid() {
            ctx.io.free_untracked(locator.offset, locator.size as u64)?;
            ctx.live
                .avail
                .ranges_or_empty()
                .free(Extent::new(locator.offset, locator.size as u64));
        }
    }
    Ok(())
}

/// §4.5.6: rewrite every surviving entry marked UPDATE.
fn rewrite_updated(ctx: &mut LiveCtx<'_>, snaps: &mut [SnapshotListEntry]) -> BlockResult<()> {
    for i in 0..snaps.len() {
        if !snaps[i].is_update() {
            continue;
        }
        let mut state = snaps[i].historical.take().ok_or_else(|| {
            BlockError::invalid_argument(format!("{}: UPDATE entry missing state", snaps[i].name))
        })?;
        let raw = snapshot_update(ctx, &mut state)?;
        snaps[i].raw_cookie = Some(raw);
    }
    Ok(())
}

/// §4.5.7: truncate live avail, persist the live state, release alloc/discard.
fn finalize_live(ctx: &mut LiveCtx<'_>, name: &str, snaps: &mut [SnapshotListEntry]) -> BlockResult<()> {
    let add_idx = snaps.len() - 1;

    let file_size_now = ctx.io.size()?;
    let removed = ctx.live.avail.ranges_or_empty().truncate_tail(file_size_now);
    if removed > 0 {
        log::truncate(name, file_size_now, file_size_now - removed);
    }

    let raw = finalize_live_state(ctx)?;
    snaps[add_idx].raw_cookie = Some(raw);

    ctx.live.alloc.release();
    ctx.live.discard.release();
    Ok(())
}

/// Allocates space for a tracked write (root pages) from the live
/// free-space pool, extending the file past its current end if nothing
/// fits, and records the allocation on live `alloc`.
fn allocate_live(live: &mut SnapshotStateBlock, io: &dyn BlockBackend, len: u64) -> BlockResult<u64> {
    if let Some(extent) = live.avail.ranges_or_empty().allocate(len) {
        live.alloc.ranges_or_empty().free(extent);
        return Ok(extent.start);
    }
    let offset = io.size()?;
    live.alloc.ranges_or_empty().free(Extent::new(offset, len));
    Ok(offset)
}

/// Allocates space for the extent lists' own on-disk storage. This storage
/// is never tracked on any alloc list (§4.8's "two kinds of free" note): it
/// is reclaimed directly into avail when the snapshot holding it is deleted.
fn allocate_untracked(ctx: &mut LiveCtx<'_>, len: u64) -> BlockResult<u64> {
    if let Some(extent) = ctx.live.avail.ranges_or_empty().allocate(len) {
        return Ok(extent.start);
    }
    ctx.io.size()
}

fn write_extent_list(ctx: &mut LiveCtx<'_>, ranges: &ExtentList) -> BlockResult<Locator> {
    let bytes = ranges.encode();
    let offset = allocate_untracked(ctx, bytes.len() as u64)?;
    ctx.io.write_off(offset, &bytes)?;
    Ok(Locator { offset, size: bytes.len() as u32, cksum: compute_checksum(&bytes) })
}

fn check_disjoint(alloc: &ExtentList, discard: &ExtentList) -> BlockResult<()> {
    if !alloc.is_disjoint_from(discard) {
        return Err(BlockError::corrupt("alloc/discard overlap before snapshot-update"));
    }
    Ok(())
}

/// §4.6, applied to a standalone historical state block.
fn snapshot_update(ctx: &mut LiveCtx<'_>, state: &mut SnapshotStateBlock) -> BlockResult<Vec<u8>> {
    if ctx.verify {
        let empty = ExtentList::new();
        check_disjoint(
            state.alloc.ranges.as_ref().unwrap_or(&empty),
            state.discard.ranges.as_ref().unwrap_or(&empty),
        )?;
    }

    let alloc_ranges = state.alloc.ranges.get_or_insert_with(ExtentList::new).clone();
    state.alloc.locator = write_extent_list(ctx, &alloc_ranges)?;
    let avail_ranges = state.avail.ranges.get_or_insert_with(ExtentList::new).clone();
    state.avail.locator = write_extent_list(ctx, &avail_ranges)?;
    let discard_ranges = state.discard.ranges.get_or_insert_with(ExtentList::new).clone();
    state.discard.locator = write_extent_list(ctx, &discard_ranges)?;

    state.file_size = ctx.io.size()?;
    cookie::encode(state)
}

/// §4.6, applied to the live state block directly.
fn finalize_live_state(ctx: &mut LiveCtx<'_>) -> BlockResult<Vec<u8>> {
    if ctx.verify {
        let empty = ExtentList::new();
        check_disjoint(
            ctx.live.alloc.ranges.as_ref().unwrap_or(&empty),
            ctx.live.discard.ranges.as_ref().unwrap_or(&empty),
        )?;
    }

    let alloc_ranges = ctx.live.alloc.ranges.take().unwrap_or_default();
    let loc = write_extent_list(ctx, &alloc_ranges)?;
    ctx.live.alloc.ranges = Some(alloc_ranges);
    ctx.live.alloc.locator = loc;

    let avail_ranges = ctx.live.avail.ranges.take().unwrap_or_default();
    let loc = write_extent_list(ctx, &avail_ranges)?;
    ctx.live.avail.ranges = Some(avail_ranges);
    ctx.live.avail.locator = loc;

    let discard_ranges = ctx.live.discard.ranges.take().unwrap_or_default();
    let loc = write_extent_list(ctx, &discard_ranges)?;
    ctx.live.discard.ranges = Some(discard_ranges);
    ctx.live.discard.locator = loc;

    ctx.live.file_size = ctx.io.size()?;
    cookie::encode(ctx.live)
}
