//! Logging glue into the shared structured logger (§2.1).
//!
//! Thin wrappers around [`crate::observability::Logger`], called at the same
//! points the original engine emits verbose trace lines: snapshot load,
//! delete, create, and truncate. A logging call is best-effort; it never
//! returns a [`super::errors::BlockResult`] and never gates correctness.

use crate::observability::Logger;

pub fn load(name: &str, readonly: bool) {
    Logger::info(
        "block_snapshot_load",
        &[("name", name), ("readonly", if readonly { "true" } else { "false" })],
    );
}

pub fn unload(name: &str) {
    Logger::info("block_snapshot_unload", &[("name", name)]);
}

pub fn create(name: &str, snapshot_count: usize) {
    Logger::info(
        "block_snapshot_create",
        &[("name", name), ("snapshot_count", &snapshot_count.to_string())],
    );
}

pub fn delete(name: &str, deleted: &str) {
    Logger::info("block_snapshot_delete", &[("name", name), ("deleted", deleted)]);
}

pub fn truncate(name: &str, old_size: u64, new_size: u64) {
    Logger::info(
        "block_file_truncate",
        &[("name", name), ("old_size", &old_size.to_string()), ("new_size", &new_size.to_string())],
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_calls_do_not_panic() {
        load("test.db", true);
        unload("test.db");
        create("test.db", 3);
        delete("test.db", "s2");
        truncate("test.db", 8192, 4096);
    }
}
