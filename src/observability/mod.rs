//! Structured logging.
//!
//! `block::log` is the only caller: a handful of best-effort call sites at
//! load, unload, create, and truncate. Kept as its own module rather than
//! folded into `block` because it carries no dependency on block's types and
//! could back other subsystems the same way.

mod logger;

pub use logger::{Logger, Severity};
