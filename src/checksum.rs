//! The metadata checksum contract named in spec.md §6:
//! `(bytes, len, seed) → u32`, stable across superblock versions.
//!
//! `original_source/src/H5Fsuper.c` calls `H5_checksum_metadata` at its
//! superblock-checksum sites but the algorithm body (lookup3, in HDF5's real
//! source tree) wasn't part of the retrieved slice and no checksum crate
//! appears anywhere in the example pack. This is a self-consistent
//! Jenkins-style one-at-a-time 32-bit mix: round-trips within this crate
//! (`decode(encode(x))`'s checksum re-verifies) but is not claimed to match
//! any particular HDF5 build bit-for-bit. See DESIGN.md.

pub fn checksum_metadata(bytes: &[u8], seed: u32) -> u32 {
    let mut hash = seed;
    for &b in bytes {
        hash = hash.wrapping_add(b as u32);
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash = hash.wrapping_add(hash << 15);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_and_seed_sensitive() {
        let a = checksum_metadata(b"hello world", 0);
        let b = checksum_metadata(b"hello world", 0);
        assert_eq!(a, b);
        assert_ne!(a, checksum_metadata(b"hello world", 1));
    }

    #[test]
    fn empty_input_is_just_the_seed_mix() {
        let a = checksum_metadata(b"", 42);
        let b = checksum_metadata(b"", 42);
        assert_eq!(a, b);
    }
}
