//! Stand-ins for the collaborators spec.md §1 and §6 name as external and
//! out of scope: the object-header/message subsystem, the B-tree/array
//! layer, and the shared-object-header-message table. XFER and SUPER only
//! ever see these through the traits below; the `Mock*` implementations
//! exist so the core's round-trip and end-to-end properties (spec.md §8)
//! can be exercised without pulling in real object-header or B-tree code.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::ndcopy::copy_nd;
use crate::width::{Address, Width};

/// A handle to an open object, as handed back by the object-header layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectLocation {
    pub header_addr: Address,
}

impl ObjectLocation {
    /// Decodes the fixed-width root-group object entry (spec.md §4.3): in
    /// the real format this is a full symbol-table-entry record; the only
    /// part this core depends on is the header address, so that's all the
    /// stand-in carries.
    pub fn decode(width: Width, buf: &[u8]) -> Result<Self> {
        Ok(ObjectLocation { header_addr: Address::decode(width, buf)? })
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        self.header_addr.encode(out);
    }
}

/// Shared-object-header-message table info recorded in the superblock
/// extension for `super_vers >= 2` files, per spec.md §4.3/§8 scenario 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SohmInfo {
    pub nindexes: u8,
}

pub trait ObjectHeaderStore {
    fn open(&self, loc: Address) -> Result<ObjectLocation>;
    fn close(&self, loc: &ObjectLocation);
    fn create(&mut self) -> Result<ObjectLocation>;
}

pub trait SharedMessageTable {
    fn get_info(&self, ext_loc: Address) -> Result<SohmInfo>;
    fn put_info(&mut self, ext_loc: Address, info: SohmInfo);
}

/// The B-tree/array layer's transfer contract (spec.md §6): `arr_read` and
/// `arr_write` take the same four shape parameters HDF5's real
/// `H5F_arr_read`/`H5F_arr_write` do (`mem_shape`, `mem_size`, `mem_off`,
/// `file_off`) plus the element size; `layout`/`filters`/`efl` are elided
/// since they belong to the out-of-scope chunked-storage/datatype layers.
pub trait ArrayStore {
    fn arr_read(
        &self,
        mem_shape: &[u64],
        mem_size: &[u64],
        mem_off: &[u64],
        file_off: &[u64],
        elmt_size: usize,
        out_buf: &mut [u8],
    ) -> Result<()>;

    fn arr_write(
        &mut self,
        mem_shape: &[u64],
        mem_size: &[u64],
        mem_off: &[u64],
        file_off: &[u64],
        elmt_size: usize,
        in_buf: &[u8],
    ) -> Result<()>;
}

/// A deterministic in-memory object-header store for tests: `create`
/// hands back increasing fake addresses, `open`/`close` are no-ops beyond
/// bookkeeping.
#[derive(Debug, Default)]
pub struct MockObjectHeaderStore {
    next: u64,
    width: Width,
}

impl MockObjectHeaderStore {
    pub fn new(width: Width) -> Self {
        MockObjectHeaderStore { next: 1, width }
    }
}

impl ObjectHeaderStore for MockObjectHeaderStore {
    fn open(&self, loc: Address) -> Result<ObjectLocation> {
        if loc.is_undef() {
            return Err(Error::CantOpen("object header address is UNDEF".into()));
        }
        Ok(ObjectLocation { header_addr: loc })
    }

    fn close(&self, _loc: &ObjectLocation) {}

    fn create(&mut self) -> Result<ObjectLocation> {
        let addr = Address::from_u64(self.width, self.next);
        self.next += 8;
        Ok(ObjectLocation { header_addr: addr })
    }
}

#[derive(Debug, Default)]
pub struct MockSharedMessageTable {
    table: HashMap<u64, SohmInfo>,
}

impl SharedMessageTable for MockSharedMessageTable {
    fn get_info(&self, ext_loc: Address) -> Result<SohmInfo> {
        let key = ext_loc.to_u64()?;
        self.table.get(&key).copied().ok_or_else(|| Error::CantGet("no SOHM info recorded at this address".into()))
    }

    fn put_info(&mut self, ext_loc: Address, info: SohmInfo) {
        if let Ok(key) = ext_loc.to_u64() {
            self.table.insert(key, info);
        }
    }
}

/// A flat in-memory dataset store: `total_extent` is the dataset's full
/// shape in elements, addressed row-major.
#[derive(Debug)]
pub struct MockArrayStore {
    total_extent: Vec<u64>,
    elmt_size: usize,
    data: Vec<u8>,
}

impl MockArrayStore {
    pub fn new(total_extent: Vec<u64>, elmt_size: usize) -> Self {
        let total: u64 = total_extent.iter().product();
        MockArrayStore { total_extent, elmt_size, data: vec![0u8; total as usize * elmt_size] }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl MockArrayStore {
    /// A `file_off` of all zeros requesting every element the backing
    /// extent holds: valid regardless of how many dimensions the caller's
    /// `mem_shape` uses to describe that same element count (the direct
    /// path and the single-pass reshape case in [`crate::xfer`] both
    /// address a full read/write this way).
    fn is_full_span(&self, shape: &[u64], off: &[u64]) -> bool {
        off.iter().all(|&o| o == 0) && shape.iter().product::<u64>() == self.total_extent.iter().product::<u64>()
    }
}

impl ArrayStore for MockArrayStore {
    fn arr_read(
        &self,
        mem_shape: &[u64],
        mem_size: &[u64],
        mem_off: &[u64],
        file_off: &[u64],
        elmt_size: usize,
        out_buf: &mut [u8],
    ) -> Result<()> {
        if elmt_size != self.elmt_size {
            return Err(Error::BadValue("element size mismatch against the backing array store".into()));
        }
        if self.is_full_span(mem_shape, file_off) {
            out_buf.copy_from_slice(&self.data);
            return Ok(());
        }
        copy_nd(out_buf, mem_size, mem_off, &self.data, &self.total_extent, file_off, mem_shape, elmt_size)
    }

    fn arr_write(
        &mut self,
        mem_shape: &[u64],
        mem_size: &[u64],
        mem_off: &[u64],
        file_off: &[u64],
        elmt_size: usize,
        in_buf: &[u8],
    ) -> Result<()> {
        if elmt_size != self.elmt_size {
            return Err(Error::BadValue("element size mismatch against the backing array store".into()));
        }
        if self.is_full_span(mem_shape, file_off) {
            self.data.copy_from_slice(in_buf);
            return Ok(());
        }
        copy_nd(&mut self.data, &self.total_extent, file_off, in_buf, mem_size, mem_off, mem_shape, elmt_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_array_store_round_trips_a_full_write_read() {
        let mut store = MockArrayStore::new(vec![4, 4], 4);
        let data: Vec<u8> = (0u32..16).flat_map(|v| v.to_le_bytes()).collect();
        store.arr_write(&[4, 4], &[4, 4], &[0, 0], &[0, 0], 4, &data).unwrap();
        let mut out = vec![0u8; 16 * 4];
        store.arr_read(&[4, 4], &[4, 4], &[0, 0], &[0, 0], 4, &mut out).unwrap();
        assert_eq!(out, data);
    }
}
