//! End-to-end scenario tests against the real file-backed collaborator
//! (`FileBlockIo`), as opposed to the in-memory mock used by the unit tests
//! co-located under `src/block/`.

use std::io::{Seek, SeekFrom, Write};

use blocksnap::block::{cookie, BlockObject, FileBlockIo, SnapshotListEntry, SnapshotStateBlock};

fn object_at(path: &std::path::Path) -> BlockObject {
    let io = FileBlockIo::open(path).expect("open backing file");
    BlockObject::new("scenario.db", Box::new(io))
}

/// S1: load with no cookie present, readonly = false. Expect
/// `dsk.size = 0`, file unchanged, `live_loaded = true`, and unload succeeds.
#[test]
fn s1_empty_snapshot_load_and_unload() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let mut obj = object_at(tmp.path());

    blocksnap::block::snapshot_load(&mut obj, None, false).unwrap();
    assert!(obj.is_loaded());
    assert!(obj.live_state().unwrap().is_empty_tree());
    assert_eq!(obj.live_state().unwrap().file_size, 0);

    blocksnap::block::snapshot_unload(&mut obj).unwrap();
    assert!(!obj.is_loaded());
}

/// S2: starting from empty-loaded live state, create the first snapshot.
/// Expect a non-empty raw cookie whose decoded root size/checksum match the
/// written root page, and whose file_size matches the file length after
/// fsync.
#[test]
fn s2_create_first_snapshot() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let mut obj = object_at(tmp.path());

    blocksnap::block::snapshot_load(&mut obj, None, true).unwrap();

    let root = vec![b'R'; 4096];
    let mut snaps = vec![SnapshotListEntry::new_add("s1")];
    blocksnap::block::snapshot(&mut obj, Some(&root), &mut snaps).unwrap();

    let s1_raw = snaps[0].raw_cookie.as_ref().expect("s1 cookie written");
    assert!(!s1_raw.is_empty());

    let decoded = cookie::decode(s1_raw).unwrap();
    assert_eq!(decoded.root.size, 4096);
    assert_ne!(decoded.root.cksum, 0);

    let mut file = std::fs::File::open(tmp.path()).unwrap();
    let len = file.seek(SeekFrom::End(0)).unwrap();
    assert_eq!(decoded.file_size, len);
}

fn create_chain(obj: &mut BlockObject, names: &[&str]) -> Vec<SnapshotListEntry> {
    let mut history: Vec<SnapshotListEntry> = Vec::new();
    for name in names {
        let mut snaps: Vec<SnapshotListEntry> = history
            .iter()
            .map(|e| SnapshotListEntry::existing(e.name.clone(), e.raw_cookie.clone().unwrap()))
            .collect();
        snaps.push(SnapshotListEntry::new_add(*name));
        let root = vec![b'X'; 512];
        blocksnap::block::snapshot(obj, Some(&root), &mut snaps).unwrap();
        history = snaps;
    }
    history
}

fn loaded_object(path: &std::path::Path) -> BlockObject {
    let mut obj = object_at(path);
    blocksnap::block::snapshot_load(&mut obj, None, true).unwrap();
    obj
}

/// S3: three snapshots exist; deleting the middle one folds it into its
/// surviving successor, which is rewritten (UPDATE) with a fresh cookie.
#[test]
fn s3_delete_middle_folds_into_successor() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let mut obj = loaded_object(tmp.path());
    let mut history = create_chain(&mut obj, &["s1", "s2", "s3"]);

    let s2_raw_before = history[1].raw_cookie.clone().unwrap();
    let s3_raw_before = history[2].raw_cookie.clone().unwrap();

    history[1].mark_delete();
    history.push(SnapshotListEntry::new_add("s4"));
    let root = vec![b'Y'; 512];
    blocksnap::block::snapshot(&mut obj, Some(&root), &mut history).unwrap();

    assert!(history[1].is_delete());
    assert!(history[2].is_update());
    let s3_raw_after = history[2].raw_cookie.clone().unwrap();
    assert_ne!(s3_raw_after, s3_raw_before, "s3's cookie must be rewritten after absorbing s2");
    assert_eq!(
        history[1].raw_cookie.as_ref().unwrap(),
        &s2_raw_before,
        "a DELETE entry's own cookie is left stale; the caller drops it from the persisted list"
    );
}

/// S4: deleting the last historical snapshot before the new ADD folds its
/// alloc/discard straight into the live state rather than a historical
/// successor.
#[test]
fn s4_delete_last_folds_into_live() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let mut obj = loaded_object(tmp.path());
    let mut history = create_chain(&mut obj, &["s1", "s2"]);

    // s2's own root page was allocated during s2's creation, so it shows up
    // on s2's own alloc list; deleting s2 with the live ADD as its successor
    // merges that range into live alloc while also freeing the root into
    // live discard, so the same range briefly straddles both.
    let s2_root = cookie::decode(history[1].raw_cookie.as_ref().unwrap()).unwrap().root;

    history[1].mark_delete();
    history.push(SnapshotListEntry::new_add("s3"));
    let root = vec![b'Z'; 512];
    blocksnap::block::snapshot(&mut obj, Some(&root), &mut history).unwrap();

    assert!(history[1].is_delete());
    let s3 = history.last().unwrap();
    assert!(s3.is_add());
    let decoded = cookie::decode(s3.raw_cookie.as_ref().unwrap()).unwrap();
    assert_eq!(decoded.root.size, 512);

    // Reuse-match on the live lists must reclaim the allocated-then-freed
    // range into avail rather than leaving it stuck across alloc/discard.
    let live = obj.live_state().unwrap();
    let avail = live.avail.ranges.as_ref().expect("avail ranges retained after finalize");
    assert!(
        avail
            .iter()
            .any(|e| e.start <= s2_root.offset && s2_root.offset + s2_root.size as u64 <= e.end()),
        "s2's root range should have been reclaimed into live avail by reuse-match, got {:?}",
        avail.iter().collect::<Vec<_>>()
    );
}

/// S5: a consecutive run of deletes aggregates transitively into the first
/// surviving successor, which only gets rewritten once.
#[test]
fn s5_delete_run_aggregates_transitively() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    let mut obj = loaded_object(tmp.path());
    let mut history = create_chain(&mut obj, &["s1", "s2", "s3"]);

    history[0].mark_delete();
    history[1].mark_delete();
    history.push(SnapshotListEntry::new_add("s4"));
    let root = vec![b'W'; 512];
    blocksnap::block::snapshot(&mut obj, Some(&root), &mut history).unwrap();

    assert!(history[0].is_delete());
    assert!(history[1].is_delete());
    assert!(history[2].is_update());
    assert!(!history[2].is_delete());
}

/// S6: a file whose physical length overshoots the snapshot's recorded
/// `file_size` (a simulated crash tail) is truncated back on a writable
/// load, and left untouched on a readonly load.
#[test]
fn s6_load_then_truncate() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    {
        let mut file = tmp.reopen().unwrap();
        file.write_all(&vec![0u8; 8192 + 4096]).unwrap();
    }

    let mut state = SnapshotStateBlock::zeroed();
    state.file_size = 8192;
    let raw = cookie::encode(&state).unwrap();

    let mut obj = object_at(tmp.path());
    blocksnap::block::snapshot_load(&mut obj, Some(&raw), true).unwrap();

    let len = std::fs::metadata(tmp.path()).unwrap().len();
    assert_eq!(len, 8192, "writable load must truncate the crash tail");
}

#[test]
fn s6_readonly_load_leaves_file_untouched() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    {
        let mut file = tmp.reopen().unwrap();
        file.write_all(&vec![0u8; 8192 + 4096]).unwrap();
    }

    let mut state = SnapshotStateBlock::zeroed();
    state.file_size = 8192;
    let raw = cookie::encode(&state).unwrap();

    let mut obj = object_at(tmp.path());
    blocksnap::block::snapshot_load(&mut obj, Some(&raw), false).unwrap();

    let len = std::fs::metadata(tmp.path()).unwrap().len();
    assert_eq!(len, 8192 + 4096, "readonly load must not modify the file");
}
