//! CRC32 checksum computation for block-subsystem on-disk payloads.
//!
//! Used to validate extent-list buffers and root-page reads, the same way the
//! document storage subsystem validates its records.

use crc32fast::Hasher;

/// Computes a CRC32 checksum over the provided data. Deterministic: identical
/// input always produces identical output.
pub fn compute_checksum(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Verifies that the computed checksum matches the expected checksum.
pub fn verify_checksum(data: &[u8], expected: u32) -> bool {
    compute_checksum(data) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_deterministic() {
        let data = b"root page payload";
        assert_eq!(compute_checksum(data), compute_checksum(data));
    }

    #[test]
    fn test_checksum_detects_corruption() {
        let mut data = vec![0xAA, 0xBB, 0xCC, 0xDD];
        let original = compute_checksum(&data);
        data[1] ^= 0x01;
        assert_ne!(original, compute_checksum(&data));
    }

    #[test]
    fn test_verify_checksum() {
        let data = b"extent list bytes";
        let cksum = compute_checksum(data);
        assert!(verify_checksum(data, cksum));
        assert!(!verify_checksum(data, cksum ^ 1));
    }
}
