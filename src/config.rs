//! Plain-struct stand-in for the external property-list store (spec.md §6).
//! The core only ever reads a fixed, known set of keys — user-block size,
//! superblock version, address/size byte counts, symbol-leaf rank, B-tree
//! ranks, SOHM index count — so a typed struct serves that role instead of
//! a stringly-keyed bag, the same choice `peinit`'s config types make for
//! their own fixed field sets.

use crate::superblock::{HDF5_BTREE_ISTORE_IK_DEF, HDF5_SUPERBLOCK_VERSION_LATEST, NUM_BTREE_ID};
use crate::width::Width;

/// Options consulted by [`crate::superblock::Superblock::init`] (the
/// create path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCreateOptions {
    pub user_block_size: u64,
    pub super_vers: u8,
    pub sizeof_addr: Width,
    pub sizeof_size: Width,
    pub sym_leaf_k: u16,
    pub btree_k: [u16; NUM_BTREE_ID],
    pub sohm_nindexes: u8,
}

impl Default for FileCreateOptions {
    fn default() -> Self {
        let w = Width::new(8).unwrap();
        FileCreateOptions {
            user_block_size: 0,
            super_vers: HDF5_SUPERBLOCK_VERSION_LATEST,
            sizeof_addr: w,
            sizeof_size: w,
            sym_leaf_k: 4,
            btree_k: [16, HDF5_BTREE_ISTORE_IK_DEF],
            sohm_nindexes: 0,
        }
    }
}

/// Which [`crate::addr::FileDriver`] variant to open a file through, plus
/// the handful of access-time knobs the core consults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverKind {
    Sec2,
    Family { member_size: u64 },
    Multi,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAccessOptions {
    pub driver: DriverKind,
    pub sizeof_addr: Width,
}

impl Default for FileAccessOptions {
    fn default() -> Self {
        FileAccessOptions { driver: DriverKind::Sec2, sizeof_addr: Width::new(8).unwrap() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_defaults_match_the_latest_superblock_version() {
        let opts = FileCreateOptions::default();
        assert_eq!(opts.super_vers, HDF5_SUPERBLOCK_VERSION_LATEST);
        assert!(opts.sym_leaf_k > 0);
        assert!(opts.btree_k.iter().all(|&k| k > 0));
    }
}
