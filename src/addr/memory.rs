//! In-memory driver used by unit tests and by callers that want a scratch
//! file without touching the filesystem at all.
//!
//! Grounded in `erofs-sys::superblock::mem`, which backs a whole
//! filesystem view with an in-memory byte slice instead of a real file.

use super::{AllocKind, Dxpl, FileDriver};
use crate::error::{Error, Result};
use crate::width::{Address, Width};

#[derive(Debug)]
pub struct MemoryDriver {
    buf: Vec<u8>,
    eoa: Address,
    width: Width,
}

impl MemoryDriver {
    pub fn new(width: Width) -> Self {
        MemoryDriver { buf: Vec::new(), eoa: Address::zero(width), width }
    }

    pub fn with_capacity(width: Width, cap: usize) -> Self {
        MemoryDriver { buf: Vec::with_capacity(cap), eoa: Address::zero(width), width }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl FileDriver for MemoryDriver {
    fn read(&mut self, _kind: AllocKind, _dxpl: Dxpl, off: Address, len: u64, out: &mut [u8]) -> Result<()> {
        let off = off.to_u64()?;
        let end = off.checked_add(len).ok_or_else(|| Error::BadRange("read range overflow".into()))?;
        if end > self.buf.len() as u64 || out.len() as u64 != len {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "short read past end-of-allocated memory buffer",
            )));
        }
        out.copy_from_slice(&self.buf[off as usize..end as usize]);
        Ok(())
    }

    fn write(&mut self, _kind: AllocKind, _dxpl: Dxpl, off: Address, len: u64, buf: &[u8]) -> Result<()> {
        let off = off.to_u64()?;
        let end = off.checked_add(len).ok_or_else(|| Error::BadRange("write range overflow".into()))?;
        if buf.len() as u64 != len {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                "short write to in-memory driver",
            )));
        }
        if end as usize > self.buf.len() {
            self.buf.resize(end as usize, 0);
        }
        self.buf[off as usize..end as usize].copy_from_slice(buf);
        Ok(())
    }

    fn get_eof(&self) -> Result<Address> {
        Ok(Address::from_u64(self.width, self.buf.len() as u64))
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
        let next = cur.checked_add(len).ok_or_else(|| Error::BadRange("allocate overflow".into()))?;
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
    fn allocate_bumps_eoa_and_read_back_round_trips() {
        let mut d = MemoryDriver::new(Width::new(8).unwrap());
        let a = d.allocate(AllocKind::Draw, 16).unwrap();
        assert_eq!(a.to_u64().unwrap(), 0);
        d.write(AllocKind::Draw, Dxpl, a, 4, b"ABCD").unwrap();
        let mut out = [0u8; 4];
        d.read(AllocKind::Draw, Dxpl, a, 4, &mut out).unwrap();
        assert_eq!(&out, b"ABCD");
    }

    #[test]
    fn read_past_eoa_is_io_error() {
        let mut d = MemoryDriver::new(Width::new(8).unwrap());
        let mut out = [0u8; 4];
        assert!(d.read(AllocKind::Draw, Dxpl, Address::zero(Width::new(8).unwrap()), 4, &mut out).is_err());
    }
}
