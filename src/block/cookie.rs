//! Address-cookie codec (§4.2).
//!
//! Serializes a [`SnapshotStateBlock`] to/from a compact, fixed-field binary
//! cookie bounded by [`MAX_ADDR_COOKIE`]. Sentinel offsets (`INVALID_OFFSET`)
//! are encoded as a distinguished zero form: every on-disk offset is stored as
//! `offset + 1`, so `0` decodes back to the sentinel and no real offset can
//! collide with it.
//!
//! Round-trip law: `decode(encode(s)) == s` for every legal `s`.

use super::errors::{BlockError, BlockResult};
use super::types::{ExtentListHandle, Locator, SnapshotStateBlock, INVALID_OFFSET, MAX_ADDR_COOKIE};

fn encode_offset(offset: u64) -> u64 {
    if offset == INVALID_OFFSET {
        0
    } else {
        offset + 1
    }
}

fn decode_offset(encoded: u64) -> BlockResult<u64> {
    if encoded == 0 {
        Ok(INVALID_OFFSET)
    } else {
        encoded
            .checked_sub(1)
            .ok_or_else(|| BlockError::corrupt("cookie offset underflow"))
    }
}

fn write_locator(buf: &mut Vec<u8>, locator: &Locator) {
    buf.extend_from_slice(&encode_offset(locator.offset).to_le_bytes());
    buf.extend_from_slice(&locator.size.to_le_bytes());
    buf.extend_from_slice(&locator.cksum.to_le_bytes());
}

fn read_locator(bytes: &[u8], cursor: &mut usize) -> BlockResult<Locator> {
    if *cursor + 16 > bytes.len() {
        return Err(BlockError::corrupt("cookie truncated reading locator"));
    }
    let offset = decode_offset(u64::from_le_bytes(bytes[*cursor..*cursor + 8].try_into().unwrap()))?;
    let size = u32::from_le_bytes(bytes[*cursor + 8..*cursor + 12].try_into().unwrap());
    let cksum = u32::from_le_bytes(bytes[*cursor + 12..*cursor + 16].try_into().unwrap());
    *cursor += 16;
    Ok(Locator { offset, size, cksum })
}

/// Serializes `state` into a cookie. Never exceeds [`MAX_ADDR_COOKIE`] bytes.
pub fn encode(state: &SnapshotStateBlock) -> BlockResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(96);
    buf.extend_from_slice(&state.version.to_le_bytes());
    write_locator(&mut buf, &state.root);
    write_locator(&mut buf, &state.alloc.locator);
    write_locator(&mut buf, &state.avail.locator);
    write_locator(&mut buf, &state.discard.locator);
    buf.extend_from_slice(&state.file_size.to_le_bytes());
    buf.extend_from_slice(&state.write_gen.to_le_bytes());

    let cksum = super::checksum::compute_checksum(&buf);
    buf.extend_from_slice(&cksum.to_le_bytes());

    if buf.len() > MAX_ADDR_COOKIE {
        return Err(BlockError::invalid_argument(format!(
            "encoded cookie of {} bytes exceeds MAX_ADDR_COOKIE ({})",
            buf.len(),
            MAX_ADDR_COOKIE
        )));
    }
    Ok(buf)
}

/// Parses a cookie produced by [`encode`]. The extent-list handles are
/// returned with only their locators populated; in-memory range data, if
/// needed, is read from disk separately by the load/process paths.
pub fn decode(bytes: &[u8]) -> BlockResult<SnapshotStateBlock> {
    if bytes.len() < 4 {
        return Err(BlockError::corrupt("cookie too short"));
    }
    let (body, trailer) = bytes.split_at(bytes.len() - 4);
    let expected = u32::from_le_bytes(trailer.try_into().unwrap());
    if super::checksum::compute_checksum(body) != expected {
        return Err(BlockError::corrupt("cookie checksum mismatch"));
    }

    let mut cursor = 0usize;
    if body.len() < 4 {
        return Err(BlockError::corrupt("cookie truncated reading version"));
    }
    let version = u32::from_le_bytes(body[0..4].try_into().unwrap());
    cursor += 4;

    let root = read_locator(body, &mut cursor)?;
    let alloc_loc = read_locator(body, &mut cursor)?;
    let avail_loc = read_locator(body, &mut cursor)?;
    let discard_loc = read_locator(body, &mut cursor)?;

    if cursor + 16 > body.len() {
        return Err(BlockError::corrupt("cookie truncated reading tail"));
    }
    let file_size = u64::from_le_bytes(body[cursor..cursor + 8].try_into().unwrap());
    let write_gen = u64::from_le_bytes(body[cursor + 8..cursor + 16].try_into().unwrap());

    let mut state = SnapshotStateBlock::zeroed();
    state.version = version;
    state.root = root;
    state.alloc = ExtentListHandle { name: "alloc", locator: alloc_loc, ranges: None };
    state.avail = ExtentListHandle { name: "avail", locator: avail_loc, ranges: None };
    state.discard = ExtentListHandle { name: "discard", locator: discard_loc, ranges: None };
    state.file_size = file_size;
    state.write_gen = write_gen;

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locators_eq(a: &Locator, b: &Locator) -> bool {
        a.offset == b.offset && a.size == b.size && a.cksum == b.cksum
    }

    #[test]
    fn test_round_trip_empty_state() {
        let state = SnapshotStateBlock::zeroed();
        let bytes = encode(&state).unwrap();
        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded.version, state.version);
        assert!(locators_eq(&decoded.root, &state.root));
        assert!(locators_eq(&decoded.alloc.locator, &state.alloc.locator));
        assert!(locators_eq(&decoded.avail.locator, &state.avail.locator));
        assert!(locators_eq(&decoded.discard.locator, &state.discard.locator));
        assert_eq!(decoded.file_size, state.file_size);
        assert_eq!(decoded.write_gen, state.write_gen);
    }

    #[test]
    fn test_round_trip_populated_state() {
        let mut state = SnapshotStateBlock::zeroed();
        state.root = Locator { offset: 4096, size: 8192, cksum: 0xDEADBEEF };
        state.alloc.locator = Locator { offset: 100, size: 64, cksum: 7 };
        state.avail.locator = Locator { offset: 200, size: 64, cksum: 8 };
        state.discard.locator = Locator { offset: 300, size: 64, cksum: 9 };
        state.file_size = 1 << 20;
        state.write_gen = 42;

        let bytes = encode(&state).unwrap();
        let decoded = decode(&bytes).unwrap();

        assert!(locators_eq(&decoded.root, &state.root));
        assert!(locators_eq(&decoded.alloc.locator, &state.alloc.locator));
        assert_eq!(decoded.file_size, state.file_size);
        assert_eq!(decoded.write_gen, state.write_gen);
    }

    #[test]
    fn test_cookie_within_max_size() {
        let state = SnapshotStateBlock::zeroed();
        let bytes = encode(&state).unwrap();
        assert!(bytes.len() <= MAX_ADDR_COOKIE);
    }

    #[test]
    fn test_decode_rejects_corrupt_checksum() {
        let state = SnapshotStateBlock::zeroed();
        let mut bytes = encode(&state).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let err = decode(&bytes).unwrap_err();
        assert_eq!(err.code().code(), "BLOCK_CORRUPT");
    }

    #[test]
    fn test_decode_rejects_truncated_buffer() {
        let state = SnapshotStateBlock::zeroed();
        let bytes = encode(&state).unwrap();
        let truncated = &bytes[..bytes.len() / 2];
        assert!(decode(truncated).is_err());
    }

    #[test]
    fn test_invalid_offset_round_trips_through_zero_form() {
        assert_eq!(encode_offset(INVALID_OFFSET), 0);
        assert_eq!(decode_offset(0).unwrap(), INVALID_OFFSET);
        assert_eq!(decode_offset(encode_offset(123)).unwrap(), 123);
    }
}
