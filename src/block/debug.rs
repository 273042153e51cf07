//! Human-readable cookie rendering (§4.7).
//!
//! A pure diagnostic function with no side effects: given an encoded cookie,
//! render its fields the way an operator dumping a snapshot block would want
//! to see them. Not used on any hot path.

use super::cookie;
use super::types::Locator;

fn format_locator(label: &str, locator: &Locator) -> String {
    if locator.is_valid() {
        format!("{label}=[offset={}, size={}, cksum={:#010x}]", locator.offset, locator.size, locator.cksum)
    } else {
        format!("{label}=[Empty]")
    }
}

/// Decodes `raw_cookie` and renders it as a single human-readable line.
/// Returns the decode error's display text, prefixed, if the cookie is
/// malformed.
pub fn format_cookie(raw_cookie: &[u8]) -> String {
    let state = match cookie::decode(raw_cookie) {
        Ok(state) => state,
        Err(e) => return format!("<invalid cookie: {e}>"),
    };

    format!(
        "version={} {} {} {} {} file_size={} write_gen={}",
        state.version,
        format_locator("root", &state.root),
        format_locator("alloc", &state.alloc.locator),
        format_locator("avail", &state.avail.locator),
        format_locator("discard", &state.discard.locator),
        state.file_size,
        state.write_gen,
    )
}
