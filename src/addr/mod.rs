//! The pluggable address-space driver abstraction (ADDR).
//!
//! Every byte of the file moves through a `dyn FileDriver`: the rest of the
//! crate never touches `std::fs::File` directly. The trait shape mirrors
//! `erofs-sys`'s `trait Backend` (`superblock/{file,mem}.rs`) generalized
//! from "read-only, one backing file" to "read/write, pluggable address
//! space" per spec.md §4.1.

mod family;
mod memory;
mod multi;
mod sec2;

pub use family::FamilyDriver;
pub use memory::MemoryDriver;
pub use multi::MultiDriver;
pub use sec2::Sec2Driver;

use crate::error::Result;
use crate::width::{Address, Width};

/// Tags a byte range with its purpose; the multi-kind driver partitions the
/// address space by this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AllocKind {
    Super,
    BTree,
    Draw,
    GHeap,
    LHeap,
    OHdr,
}

pub const ALL_KINDS: [AllocKind; 6] = [
    AllocKind::Super,
    AllocKind::BTree,
    AllocKind::Draw,
    AllocKind::GHeap,
    AllocKind::LHeap,
    AllocKind::OHdr,
];

/// Stand-in for the external property-list store's transfer properties.
/// The core never inspects this today; it exists so driver call sites keep
/// the shape spec.md §4.1 gives them.
#[derive(Debug, Clone, Copy, Default)]
pub struct Dxpl;

/// Capability set every address-space backend implements.
pub trait FileDriver: std::fmt::Debug {
    fn read(&mut self, kind: AllocKind, dxpl: Dxpl, off: Address, len: u64, out: &mut [u8]) -> Result<()>;
    fn write(&mut self, kind: AllocKind, dxpl: Dxpl, off: Address, len: u64, buf: &[u8]) -> Result<()>;

    fn get_eof(&self) -> Result<Address>;
    fn get_eoa(&self, kind: AllocKind) -> Address;
    fn set_eoa(&mut self, kind: AllocKind, addr: Address) -> Result<()>;

    fn allocate(&mut self, kind: AllocKind, len: u64) -> Result<Address>;

    fn sb_size(&self) -> u64;
    fn sb_encode(&self, name: &mut [u8; 8], out: &mut Vec<u8>) -> Result<()>;
    fn sb_decode(&mut self, name: &[u8; 8], buf: &[u8]) -> Result<()>;

    fn addr_width(&self) -> Width;
}

pub(crate) fn read_exact_at(
    file: &mut std::fs::File,
    off: u64,
    buf: &mut [u8],
) -> Result<()> {
    use std::io::{Read, Seek, SeekFrom};
    file.seek(SeekFrom::Start(off))?;
    file.read_exact(buf)?;
    Ok(())
}

pub(crate) fn write_all_at(file: &mut std::fs::File, off: u64, buf: &[u8]) -> Result<()> {
    use std::io::{Seek, SeekFrom, Write};
    file.seek(SeekFrom::Start(off))?;
    file.write_all(buf)?;
    Ok(())
}

/// Bumps a driver's EOA for `kind` and restores it on drop unless
/// [`EoaGuard::commit`] is called — the scoped-restore idiom spec.md §5
/// requires around every speculative `set_eoa`.
pub struct EoaGuard<'a> {
    driver: &'a mut dyn FileDriver,
    kind: AllocKind,
    saved: Address,
    committed: bool,
}

impl<'a> EoaGuard<'a> {
    pub fn new(driver: &'a mut dyn FileDriver, kind: AllocKind) -> Self {
        let saved = driver.get_eoa(kind);
        EoaGuard { driver, kind, saved, committed: false }
    }

    pub fn driver_mut(&mut self) -> &mut dyn FileDriver {
        self.driver
    }

    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl<'a> Drop for EoaGuard<'a> {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = self.driver.set_eoa(self.kind, self.saved) {
                log::error!("failed to restore eoa for {:?} after failed probe: {e}", self.kind);
            }
        }
    }
}
