//! Block-addressed snapshot subsystem.
//!
//! A block object owns one backing file addressed in byte offsets. Its
//! on-disk state is a small set of named snapshots, each described by a
//! compact cookie: a root page locator plus three extent lists (`alloc`,
//! `avail`, `discard`) tracking which byte ranges a snapshot introduced,
//! has free to allocate from, and retired. Creating a new snapshot
//! (`process::snapshot`) folds any snapshots marked for deletion into their
//! successors and finalizes the live state; loading (`load::snapshot_load`)
//! and unloading (`unload::snapshot_unload`) bring a snapshot's state in and
//! out of memory.

pub mod checksum;
pub mod cookie;
pub mod debug;
pub mod errors;
pub mod extent;
pub mod io;
pub mod load;
pub mod log;
pub mod object;
pub mod process;
pub mod snaplist;
pub mod types;
pub mod unload;
pub mod verify;

pub use debug::format_cookie;
pub use errors::{BlockError, BlockErrorCode, BlockResult, Severity};
pub use extent::{Extent, ExtentList};
pub use io::{BlockBackend, BlockIo, FileBlockIo, FileIo};
pub use load::snapshot_load;
pub use object::{snap_init, BlockObject};
pub use process::snapshot;
pub use snaplist::{SnapFlags, SnapshotListEntry};
pub use types::{ExtentListHandle, Locator, SnapshotStateBlock, INVALID_OFFSET, MAX_ADDR_COOKIE};
pub use unload::snapshot_unload;
pub use verify::{NullVerifyHooks, VerifyHooks};
