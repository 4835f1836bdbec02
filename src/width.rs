//! Width-parameterized unsigned integers.
//!
//! Both the address type (A) and the length type (L) in the format are
//! "an unsigned integer of width `sizeof_addr`/`sizeof_size` bytes", where
//! the width is one of `{2, 4, 8, 16, 32}` and chosen once per file. A
//! `u64` can't carry a 32-byte value losslessly, so we keep the raw
//! little-endian bytes around and only materialize a `u64` (or fail) when
//! an operation actually needs to do arithmetic with the value — this is
//! the resolution to Open Question (b) in spec.md: 16/32-byte widths
//! round-trip through decode/encode but are refused by allocation paths.

use crate::error::{Error, Result};

pub const MAX_WIDTH: usize = 32;

/// One of the five on-disk widths permitted for addresses and lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Width(u8);

impl Width {
    pub fn new(bytes: u8) -> Result<Self> {
        match bytes {
            2 | 4 | 8 | 16 | 32 => Ok(Width(bytes)),
            other => Err(Error::BadValue(format!("unsupported width {other}"))),
        }
    }

    pub fn bytes(self) -> usize {
        self.0 as usize
    }
}

impl Default for Width {
    fn default() -> Self {
        Width(8)
    }
}

/// A width-parameterized unsigned integer, stored as little-endian bytes.
///
/// `UNDEF` is "all-ones of that width", matching the format's sentinel for
/// "no address" / "no value".
#[derive(Clone, Copy)]
pub struct WideUint {
    bytes: [u8; MAX_WIDTH],
    width: Width,
}

impl WideUint {
    pub fn undef(width: Width) -> Self {
        let mut bytes = [0u8; MAX_WIDTH];
        bytes[..width.bytes()].fill(0xff);
        WideUint { bytes, width }
    }

    pub fn zero(width: Width) -> Self {
        WideUint { bytes: [0; MAX_WIDTH], width }
    }

    pub fn from_u64(width: Width, value: u64) -> Self {
        let mut bytes = [0u8; MAX_WIDTH];
        bytes[..8].copy_from_slice(&value.to_le_bytes());
        WideUint { bytes, width }
    }

    pub fn width(self) -> Width {
        self.width
    }

    pub fn is_undef(self) -> bool {
        self.bytes[..self.width.bytes()].iter().all(|b| *b == 0xff)
    }

    /// Materialize as a `u64`, failing if the value doesn't fit (only
    /// possible for the 16/32-byte widths).
    pub fn to_u64(self) -> Result<u64> {
        let w = self.width.bytes();
        if w > 8 && self.bytes[8..w].iter().any(|b| *b != 0) {
            return Err(Error::Unsupported("address/length exceeds 64 bits"));
        }
        let mut buf = [0u8; 8];
        buf[..w.min(8)].copy_from_slice(&self.bytes[..w.min(8)]);
        Ok(u64::from_le_bytes(buf))
    }

    pub fn decode(width: Width, buf: &[u8]) -> Result<Self> {
        let w = width.bytes();
        if buf.len() < w {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "short read decoding width-parameterized integer",
            )));
        }
        let mut bytes = [0u8; MAX_WIDTH];
        bytes[..w].copy_from_slice(&buf[..w]);
        Ok(WideUint { bytes, width })
    }

    pub fn encode(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.bytes[..self.width.bytes()]);
    }

    /// Signed delta `self - other`, used by the base-relocation rule. Both
    /// operands must fit in 64 bits.
    pub fn signed_delta(self, other: Self) -> Result<i128> {
        Ok(self.to_u64()? as i128 - other.to_u64()? as i128)
    }

    pub fn apply_delta(self, delta: i128) -> Result<Self> {
        let v = self.to_u64()? as i128 + delta;
        if v < 0 {
            return Err(Error::BadRange("address underflow applying base delta".into()));
        }
        Ok(WideUint::from_u64(self.width, v as u64))
    }
}

impl std::fmt::Debug for WideUint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_undef() {
            write!(f, "UNDEF")
        } else {
            match self.to_u64() {
                Ok(v) => write!(f, "{v:#x}"),
                Err(_) => write!(f, "<wide:{:?}>", &self.bytes[..self.width.bytes()]),
            }
        }
    }
}

impl PartialEq for WideUint {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width && self.bytes[..self.width.bytes()] == other.bytes[..other.width.bytes()]
    }
}
impl Eq for WideUint {}

impl PartialOrd for WideUint {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for WideUint {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Both operands are expected to share a width within one file; if
        // materializing as u64 fails (a >64-bit value), fall back to a
        // lexicographic compare of the little-endian bytes reversed.
        match (self.to_u64(), other.to_u64()) {
            (Ok(a), Ok(b)) => a.cmp(&b),
            _ => {
                let w = self.width.bytes().max(other.width.bytes());
                self.bytes[..w].iter().rev().cmp(other.bytes[..w].iter().rev())
            }
        }
    }
}

/// Address in the logical format address space.
pub type Address = WideUint;
/// Length in bytes, same width family as [`Address`].
pub type Length = WideUint;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undef_is_all_ones_of_width() {
        let w = Width::new(4).unwrap();
        let u = WideUint::undef(w);
        assert!(u.is_undef());
        assert_eq!(u.to_u64().unwrap(), 0xffff_ffff);
    }

    #[test]
    fn round_trip_32_byte_width_lossless() {
        let w = Width::new(32).unwrap();
        let mut bytes = [0u8; MAX_WIDTH];
        bytes[31] = 0x01; // a value with a nonzero high byte, doesn't fit u64
        let u = WideUint { bytes, width: w };
        let mut out = Vec::new();
        u.encode(&mut out);
        let back = WideUint::decode(w, &out).unwrap();
        assert_eq!(back, u);
        assert!(back.to_u64().is_err());
    }

    #[test]
    fn from_u64_round_trips_through_encode_decode() {
        let w = Width::new(8).unwrap();
        let u = WideUint::from_u64(w, 0x1234_5678_9abc_def0);
        let mut out = Vec::new();
        u.encode(&mut out);
        assert_eq!(WideUint::decode(w, &out).unwrap().to_u64().unwrap(), 0x1234_5678_9abc_def0);
    }
}
