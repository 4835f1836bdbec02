//! Multi-kind driver: routes each [`AllocKind`] to its own backing file,
//! each with an independent address subspace starting at zero.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use super::{read_exact_at, write_all_at, AllocKind, Dxpl, FileDriver, ALL_KINDS};
use crate::error::{Error, Result};
use crate::width::{Address, Width};

const NAME_TAG: &[u8; 8] = b"NCSAmult";

#[derive(Debug)]
pub struct MultiDriver {
    dir: PathBuf,
    name_for: BTreeMap<AllocKind, String>,
    files: BTreeMap<AllocKind, File>,
    eoa: BTreeMap<AllocKind, Address>,
    width: Width,
}

fn suffix(kind: AllocKind) -> &'static str {
    match kind {
        AllocKind::Super => "super",
        AllocKind::BTree => "btree",
        AllocKind::Draw => "raw",
        AllocKind::GHeap => "gheap",
        AllocKind::LHeap => "lheap",
        AllocKind::OHdr => "ohdr",
    }
}

impl MultiDriver {
    pub fn create(dir: impl Into<PathBuf>, stem: &str, width: Width) -> Result<Self> {
        let dir = dir.into();
        let mut name_for = BTreeMap::new();
        let mut files = BTreeMap::new();
        let mut eoa = BTreeMap::new();
        for kind in ALL_KINDS {
            let name = format!("{stem}-{}.h5", suffix(kind));
            let path = dir.join(&name);
            let f = OpenOptions::new().read(true).write(true).create(true).truncate(true).open(&path)?;
            name_for.insert(kind, name);
            files.insert(kind, f);
            eoa.insert(kind, Address::zero(width));
        }
        Ok(MultiDriver { dir, name_for, files, eoa, width })
    }

    /// An empty shell with no backing files open yet: the member names and
    /// files are only known once [`FileDriver::sb_decode`] reads them back
    /// out of the driver-info block, so opening an existing multi-kind file
    /// must not eagerly (re)create any member, unlike `create`.
    pub fn open(dir: impl Into<PathBuf>, width: Width) -> Result<Self> {
        Ok(MultiDriver { dir: dir.into(), name_for: BTreeMap::new(), files: BTreeMap::new(), eoa: BTreeMap::new(), width })
    }

    fn file_mut(&mut self, kind: AllocKind) -> Result<&mut File> {
        self.files.get_mut(&kind).ok_or_else(|| Error::BadValue(format!("no backing file for {kind:?}")))
    }
}

impl FileDriver for MultiDriver {
    fn read(&mut self, kind: AllocKind, _dxpl: Dxpl, off: Address, len: u64, out: &mut [u8]) -> Result<()> {
        let off = off.to_u64()?;
        let f = self.file_mut(kind)?;
        read_exact_at(f, off, out)?;
        let _ = len;
        Ok(())
    }

    fn write(&mut self, kind: AllocKind, _dxpl: Dxpl, off: Address, len: u64, buf: &[u8]) -> Result<()> {
        let off = off.to_u64()?;
        let f = self.file_mut(kind)?;
        write_all_at(f, off, buf)?;
        let _ = len;
        Ok(())
    }

    fn get_eof(&self) -> Result<Address> {
        let mut max = 0u64;
        for f in self.files.values() {
            max = max.max(f.metadata()?.len());
        }
        Ok(Address::from_u64(self.width, max))
    }

    fn get_eoa(&self, kind: AllocKind) -> Address {
        self.eoa.get(&kind).copied().unwrap_or_else(|| Address::undef(self.width))
    }

    fn set_eoa(&mut self, kind: AllocKind, addr: Address) -> Result<()> {
        self.eoa.insert(kind, addr);
        Ok(())
    }

    fn allocate(&mut self, kind: AllocKind, len: u64) -> Result<Address> {
        let cur = self.get_eoa(kind).to_u64()?;
        let next = match cur.checked_add(len) {
            Some(v) => v,
            None => {
                log::warn!("multi: allocate({kind:?}, {len}) exhausted that kind's address space");
                return Ok(Address::undef(self.width));
            }
        };
        self.set_eoa(kind, Address::from_u64(self.width, next))?;
        Ok(Address::from_u64(self.width, cur))
    }

    fn sb_size(&self) -> u64 {
        // one u16 length-prefix + name bytes, per kind, in ALL_KINDS order
        ALL_KINDS.iter().map(|k| 2 + self.name_for[k].len() as u64).sum()
    }

    fn sb_encode(&self, name: &mut [u8; 8], out: &mut Vec<u8>) -> Result<()> {
        name.copy_from_slice(NAME_TAG);
        for kind in ALL_KINDS {
            let n = &self.name_for[&kind];
            out.extend_from_slice(&(n.len() as u16).to_le_bytes());
            out.extend_from_slice(n.as_bytes());
        }
        Ok(())
    }

    fn sb_decode(&mut self, name: &[u8; 8], buf: &[u8]) -> Result<()> {
        if name != NAME_TAG {
            return Err(Error::CantOpen(format!(
                "driver-info block names the {:?} driver, not the multi driver",
                String::from_utf8_lossy(name)
            )));
        }
        let mut cursor = 0usize;
        for kind in ALL_KINDS {
            if cursor + 2 > buf.len() {
                return Err(Error::Truncated);
            }
            let len = u16::from_le_bytes(buf[cursor..cursor + 2].try_into().unwrap()) as usize;
            cursor += 2;
            if cursor + len > buf.len() {
                return Err(Error::Truncated);
            }
            let name = String::from_utf8_lossy(&buf[cursor..cursor + len]).into_owned();
            cursor += len;
            let path = self.dir.join(&name);
            let f = OpenOptions::new().read(true).write(true).create(true).open(&path)?;
            self.name_for.insert(kind, name);
            self.files.insert(kind, f);
            self.eoa.entry(kind).or_insert_with(|| Address::zero(self.width));
        }
        Ok(())
    }

    fn addr_width(&self) -> Width {
        self.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_kind_gets_its_own_file_and_eoa() {
        let dir = tempfile::tempdir().unwrap();
        let mut d = MultiDriver::create(dir.path(), "img", Width::new(8).unwrap()).unwrap();
        let a = d.allocate(AllocKind::BTree, 8).unwrap();
        let b = d.allocate(AllocKind::Draw, 8).unwrap();
        assert_eq!(a.to_u64().unwrap(), 0);
        assert_eq!(b.to_u64().unwrap(), 0);
        d.write(AllocKind::BTree, Dxpl, a, 4, b"btre").unwrap();
        d.write(AllocKind::Draw, Dxpl, b, 4, b"draw").unwrap();
        let mut out = [0u8; 4];
        d.read(AllocKind::BTree, Dxpl, a, 4, &mut out).unwrap();
        assert_eq!(&out, b"btre");
    }

    #[test]
    fn wrong_driver_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let d = MultiDriver::create(dir.path(), "img", Width::new(8).unwrap()).unwrap();
        let mut name = [0u8; 8];
        let mut payload = Vec::new();
        d.sb_encode(&mut name, &mut payload).unwrap();
        assert_eq!(&name, NAME_TAG);

        let mut other = MultiDriver::create(dir.path(), "img2", Width::new(8).unwrap()).unwrap();
        assert!(other.sb_decode(b"NCSAfami", &payload).is_err());
    }
}
