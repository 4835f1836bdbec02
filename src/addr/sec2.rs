//! Single-POSIX-file driver, the default address-space backend.
//!
//! Grounded in `peerofs::build::Builder` (buffered, seek-based writes) and
//! `peerofs::dump` (mmap-backed reads); this driver does both, since
//! spec.md's ADDR contract is read/write, unlike EROFS's read-only image.

use std::fs::{File, OpenOptions};

use super::{read_exact_at, write_all_at, AllocKind, Dxpl, FileDriver};
use crate::error::{Error, Result};
use crate::width::{Address, Width};

#[derive(Debug)]
pub struct Sec2Driver {
    file: File,
    width: Width,
    eoa: Address,
}

impl Sec2Driver {
    pub fn create(path: impl AsRef<std::path::Path>, width: Width) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).create(true).truncate(true).open(path)?;
        Ok(Sec2Driver { file, width, eoa: Address::zero(width) })
    }

    pub fn open(path: impl AsRef<std::path::Path>, width: Width) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Sec2Driver { file, width, eoa: Address::zero(width) })
    }
}

impl FileDriver for Sec2Driver {
    fn read(&mut self, _kind: AllocKind, _dxpl: Dxpl, off: Address, len: u64, out: &mut [u8]) -> Result<()> {
        if out.len() as u64 != len {
            return Err(Error::BadValue("buffer length does not match requested read length".into()));
        }
        let off = off.to_u64()?;
        let eoa = self.eoa.to_u64()?;
        if off.checked_add(len).map(|e| e > eoa).unwrap_or(true) {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "read would cross end-of-allocated address",
            )));
        }
        read_exact_at(&mut self.file, off, out)?;
        log::trace!("sec2: read {len} bytes @ {off:#x}");
        Ok(())
    }

    fn write(&mut self, _kind: AllocKind, _dxpl: Dxpl, off: Address, len: u64, buf: &[u8]) -> Result<()> {
        if buf.len() as u64 != len {
            return Err(Error::BadValue("buffer length does not match requested write length".into()));
        }
        let off = off.to_u64()?;
        write_all_at(&mut self.file, off, buf)?;
        log::trace!("sec2: wrote {len} bytes @ {off:#x}");
        Ok(())
    }

    fn get_eof(&self) -> Result<Address> {
        let len = self.file.metadata()?.len();
        Ok(Address::from_u64(self.width, len))
    }

    fn get_eoa(&self, _kind: AllocKind) -> Address {
        self.eoa
    }

    fn set_eoa(&mut self, _kind: AllocKind, addr: Address) -> Result<()> {
        self.eoa = addr;
        Ok(())
    }

    fn allocate(&mut self, kind: AllocKind, len: u64) -> Result<Address> {
        let cur = self.eoa.to_u64()?;
        let next = match cur.checked_add(len) {
            Some(v) => v,
            None => {
                log::warn!("sec2: allocate({kind:?}, {len}) exhausted the address space");
                return Ok(Address::undef(self.width));
            }
        };
        self.set_eoa(kind, Address::from_u64(self.width, next))?;
        Ok(Address::from_u64(self.width, cur))
    }

    fn sb_size(&self) -> u64 {
        0
    }

    fn sb_encode(&self, name: &mut [u8; 8], _out: &mut Vec<u8>) -> Result<()> {
        name.fill(0);
        Ok(())
    }

    fn sb_decode(&mut self, _name: &[u8; 8], _buf: &[u8]) -> Result<()> {
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
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.bin");
        let width = Width::new(8).unwrap();
        let mut d = Sec2Driver::create(&path, width).unwrap();
        let a = d.allocate(AllocKind::Draw, 8).unwrap();
        d.write(AllocKind::Draw, Dxpl, a, 8, b"deadbeef").unwrap();
        let mut out = [0u8; 8];
        d.read(AllocKind::Draw, Dxpl, a, 8, &mut out).unwrap();
        assert_eq!(&out, b"deadbeef");
    }
}
