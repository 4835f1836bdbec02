//! The superblock engine (SUPER): locates, decodes, initializes, and
//! encodes the format preamble and the optional driver-info block.
//!
//! Grounded line-for-line in `examples/original_source/src/H5Fsuper.c`'s
//! `H5F_locate_signature`, `H5F_read_superblock`, and
//! `H5F_init_superblock`/`H5F_write_superblock`, with the on-disk integer
//! parsing done the way `peerofs/src/superblock.rs` reads its own fixed
//! header: `byteorder::{ReadBytesExt, LittleEndian}` over a `Cursor`.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::addr::{AllocKind, Dxpl, EoaGuard, FileDriver};
use crate::checksum::checksum_metadata;
use crate::error::{Error, Result};
use crate::external::ObjectHeaderStore;
use crate::external::ObjectLocation;
use crate::external::{SharedMessageTable, SohmInfo};
use crate::width::{Address, Width};

pub const SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', 0x0D, 0x0A, 0x1A, 0x0A];

pub const HDF5_SUPERBLOCK_VERSION_LATEST: u8 = 2;
pub const HDF5_FREESPACE_VERSION: u8 = 0;
pub const HDF5_OBJECTDIR_VERSION: u8 = 0;
pub const HDF5_SHAREDHEADER_VERSION: u8 = 0;
pub const HDF5_DRIVERINFO_VERSION_LATEST: u8 = 0;
pub const HDF5_BTREE_ISTORE_IK_DEF: u16 = 32;

pub const BTREE_ID_SNODE: usize = 0;
pub const BTREE_ID_ISTORE: usize = 1;
pub const NUM_BTREE_ID: usize = 2;

/// The driver-info block (spec.md §6): a 16-byte header plus
/// driver-private payload, handed to [`crate::addr::FileDriver::sb_decode`]
/// after the 8-byte name tag is read back out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverInfo {
    pub version: u8,
    pub name: [u8; 8],
    pub payload: Vec<u8>,
}

impl DriverInfo {
    fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + self.payload.len());
        out.push(self.version);
        out.extend_from_slice(&[0, 0, 0]);
        out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.name);
        out.extend_from_slice(&self.payload);
        out
    }
}

/// The decoded format preamble, spec.md §3's "File container" shape minus
/// the driver reference and property lists (those live one layer up, in
/// whatever owns the open `FileDriver`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    pub super_vers: u8,
    pub freespace_vers: u8,
    pub obj_dir_vers: u8,
    pub share_head_vers: u8,
    pub sizeof_addr: Width,
    pub sizeof_size: Width,
    pub sym_leaf_k: u16,
    pub btree_k: [u16; NUM_BTREE_ID],
    pub consist_flags: u32,
    pub super_addr: Address,
    pub base_addr: Address,
    pub extension_addr: Address,
    pub stored_eoa: Address,
    pub driver_addr: Address,
    pub root_entry: ObjectLocation,
    /// SOHM info recovered through the extension object on decode, or
    /// recorded there on init; `None` when no extension is in play or the
    /// shared-message table has nothing recorded for it.
    pub sohm_info: Option<SohmInfo>,
}

impl Superblock {
    /// The superblock-extension address, only meaningful for `super_vers
    /// >= 2`, per spec.md §3's "`extension_addr` defined iff `super_vers >=
    /// 2`" invariant.
    pub fn extension(&self) -> Option<Address> {
        if self.super_vers >= 2 && !self.extension_addr.is_undef() {
            Some(self.extension_addr)
        } else {
            None
        }
    }

    /// Scans for the 8-byte signature at offset 0 and at every power of two
    /// from `2^9` up to the smallest `2^n` strictly greater than EOF. A miss
    /// at any single candidate is swallowed (logged, not propagated); only
    /// exhausting every candidate raises [`Error::NotHdf5`], per spec.md §7.
    pub fn locate(driver: &mut dyn FileDriver) -> Result<Address> {
        let eof = driver.get_eof()?.to_u64()?;
        let width = driver.addr_width();

        let mut candidates = vec![0u64];
        let mut n = 9u32;
        loop {
            let off = 1u64 << n;
            candidates.push(off);
            if off > eof {
                break;
            }
            n += 1;
        }

        // A freshly opened driver's EOA starts at zero, which would reject
        // every probe read below against a real single-file driver; raise
        // it to EOF for the duration of the scan and restore it unless a
        // signature is actually found (decode is what commits the real
        // value once it's known).
        let mut guard = EoaGuard::new(driver, AllocKind::Super);
        guard.driver_mut().set_eoa(AllocKind::Super, Address::from_u64(width, eof))?;
        let driver = guard.driver_mut();

        for cand in candidates {
            let mut sig = [0u8; 8];
            let hit = driver
                .read(AllocKind::Super, Dxpl, Address::from_u64(width, cand), 8, &mut sig)
                .map(|()| sig == SIGNATURE)
                .unwrap_or(false);
            if hit {
                return Ok(Address::from_u64(width, cand));
            }
            log::trace!("no HDF5 signature at candidate offset {cand:#x}");
        }
        Err(Error::NotHdf5)
    }

    /// Reads the fixed-size prefix and the version-specific variable body
    /// starting at `super_addr`, applies the base-relocation rule, verifies
    /// the checksum for `super_vers >= 2`, and checks for truncation.
    pub fn decode(
        driver: &mut dyn FileDriver,
        super_addr: Address,
        object_store: &dyn ObjectHeaderStore,
        sohm_table: &dyn SharedMessageTable,
    ) -> Result<(Superblock, Option<DriverInfo>)> {
        let probe_width = driver.addr_width();
        let eof = driver.get_eof()?.to_u64()?;

        // Same reasoning as `locate`: every read below must clear a real
        // driver's EOA bound. Committed once `stored_eoa` is known, at the
        // very end of a successful decode; any early return restores the
        // driver's pre-decode EOA via `Drop`.
        let mut guard = EoaGuard::new(driver, AllocKind::Super);
        guard.driver_mut().set_eoa(AllocKind::Super, Address::from_u64(probe_width, eof))?;
        let driver = guard.driver_mut();

        let mut cursor = super_addr.to_u64()?;
        let mut checksummed = Vec::new();

        let mut prefix = [0u8; 9];
        driver.read(AllocKind::Super, Dxpl, Address::from_u64(probe_width, cursor), 9, &mut prefix)?;
        if prefix[..8] != SIGNATURE {
            return Err(Error::NotHdf5);
        }
        let super_vers = prefix[8];
        if super_vers > HDF5_SUPERBLOCK_VERSION_LATEST {
            return Err(Error::BadValue(format!("unsupported superblock version {super_vers}")));
        }
        cursor += 9;
        checksummed.extend_from_slice(&prefix);

        let mut common = [0u8; 15];
        driver.read(AllocKind::Super, Dxpl, Address::from_u64(probe_width, cursor), 15, &mut common)?;
        cursor += 15;
        checksummed.extend_from_slice(&common);

        let mut c = Cursor::new(&common[..]);
        let freespace_vers = c.read_u8()?;
        let obj_dir_vers = c.read_u8()?;
        let _reserved = c.read_u8()?;
        let share_head_vers = c.read_u8()?;
        let sizeof_addr = Width::new(c.read_u8()?)?;
        let sizeof_size = Width::new(c.read_u8()?)?;
        let _reserved = c.read_u8()?;
        let sym_leaf_k = c.read_u16::<LittleEndian>()?;
        let btree_snode = c.read_u16::<LittleEndian>()?;
        let consist_flags = c.read_u32::<LittleEndian>()?;

        if freespace_vers != HDF5_FREESPACE_VERSION {
            return Err(Error::BadValue(format!("unrecognized freespace version {freespace_vers}")));
        }
        if obj_dir_vers != HDF5_OBJECTDIR_VERSION {
            return Err(Error::BadValue(format!("unrecognized object-directory version {obj_dir_vers}")));
        }
        if share_head_vers != HDF5_SHAREDHEADER_VERSION {
            return Err(Error::BadValue(format!("unrecognized shared-header version {share_head_vers}")));
        }
        if sym_leaf_k == 0 {
            return Err(Error::BadValue("sym_leaf_k must be nonzero".into()));
        }
        if btree_snode == 0 {
            return Err(Error::BadValue("btree_k[SNODE] must be nonzero".into()));
        }

        let btree_istore = if super_vers >= 1 {
            let extra_len = if super_vers == 1 { 4 } else { 2 };
            let mut extra = vec![0u8; extra_len];
            driver.read(AllocKind::Super, Dxpl, Address::from_u64(probe_width, cursor), extra_len as u64, &mut extra)?;
            cursor += extra_len as u64;
            checksummed.extend_from_slice(&extra);
            u16::from_le_bytes([extra[0], extra[1]])
        } else {
            HDF5_BTREE_ISTORE_IK_DEF
        };
        if btree_istore == 0 {
            return Err(Error::BadValue("btree_k[ISTORE] must be nonzero".into()));
        }

        let addr_w = sizeof_addr.bytes();
        let mut addrs = vec![0u8; addr_w * 4];
        driver.read(AllocKind::Super, Dxpl, Address::from_u64(probe_width, cursor), (addr_w * 4) as u64, &mut addrs)?;
        cursor += (addr_w * 4) as u64;
        checksummed.extend_from_slice(&addrs);

        let base_addr = Address::decode(sizeof_addr, &addrs[0..addr_w])?;
        let second_slot = Address::decode(sizeof_addr, &addrs[addr_w..2 * addr_w])?;
        let mut stored_eoa = Address::decode(sizeof_addr, &addrs[2 * addr_w..3 * addr_w])?;
        let driver_addr = Address::decode(sizeof_addr, &addrs[3 * addr_w..4 * addr_w])?;

        let mut root_buf = vec![0u8; addr_w];
        driver.read(AllocKind::Super, Dxpl, Address::from_u64(probe_width, cursor), addr_w as u64, &mut root_buf)?;
        cursor += addr_w as u64;
        checksummed.extend_from_slice(&root_buf);
        let root_entry = ObjectLocation::decode(sizeof_addr, &root_buf)?;

        let stored_checksum = if super_vers >= 2 {
            let mut cbuf = [0u8; 4];
            driver.read(AllocKind::Super, Dxpl, Address::from_u64(probe_width, cursor), 4, &mut cbuf)?;
            cursor += 4;
            Some(u32::from_le_bytes(cbuf))
        } else {
            None
        };
        let _ = cursor;

        let extension_addr = if super_vers >= 2 { second_slot } else { Address::undef(sizeof_addr) };

        // Extension step (spec.md §4.3): the extension object is opened
        // transiently to pull its SOHM info and never closed here — it
        // isn't tracked against the container's open-object count.
        let sohm_info = if super_vers >= 2 && !extension_addr.is_undef() {
            object_store.open(extension_addr).ok().and_then(|ext_loc| sohm_table.get_info(ext_loc.header_addr).ok())
        } else {
            None
        };

        let driver_info = if !driver_addr.is_undef() {
            let mut header = [0u8; 16];
            driver.read(AllocKind::Super, Dxpl, driver_addr, 16, &mut header)?;
            let di_version = header[0];
            let drv_variable_size = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
            let mut name = [0u8; 8];
            name.copy_from_slice(&header[8..16]);

            let payload_addr = Address::from_u64(sizeof_addr, driver_addr.to_u64()? + 16);
            let mut payload = vec![0u8; drv_variable_size as usize];
            driver.read(AllocKind::Super, Dxpl, payload_addr, drv_variable_size as u64, &mut payload)?;

            driver.sb_decode(&name, &payload)?;

            if super_vers >= 2 {
                checksummed.extend_from_slice(&header);
                checksummed.extend_from_slice(&payload);
            }
            Some(DriverInfo { version: di_version, name, payload })
        } else {
            None
        };

        if let Some(stored) = stored_checksum {
            let computed = checksum_metadata(&checksummed, 0);
            if computed != stored {
                return Err(Error::BadValue("superblock checksum mismatch".into()));
            }
        }

        if super_addr != base_addr {
            let delta = super_addr.signed_delta(base_addr)?;
            stored_eoa = stored_eoa.apply_delta(delta)?;
        }
        let base_addr = super_addr;

        let eof = driver.get_eof()?.to_u64()?;
        if eof < stored_eoa.to_u64()? {
            return Err(Error::Truncated);
        }

        driver.set_eoa(AllocKind::Super, stored_eoa)?;
        guard.commit();

        let sb = Superblock {
            super_vers,
            freespace_vers,
            obj_dir_vers,
            share_head_vers,
            sizeof_addr,
            sizeof_size,
            sym_leaf_k,
            btree_k: [btree_snode, btree_istore],
            consist_flags,
            super_addr,
            base_addr,
            extension_addr,
            stored_eoa,
            driver_addr,
            root_entry,
            sohm_info,
        };
        Ok((sb, driver_info))
    }

    /// Creates a fresh superblock: allocates `base_addr + superblock_size +
    /// driver_size` as a single request, requiring the driver hand back
    /// address 0, per spec.md §4.3's Init step.
    pub fn init(
        driver: &mut dyn FileDriver,
        opts: &crate::config::FileCreateOptions,
        driver_info: Option<&DriverInfo>,
        object_store: &mut dyn ObjectHeaderStore,
        sohm_table: &mut dyn SharedMessageTable,
    ) -> Result<Superblock> {
        let width = opts.sizeof_addr;
        let base_addr = Address::from_u64(width, opts.user_block_size);

        let superblock_size = Self::body_len(opts.super_vers, width.bytes()) as u64;
        let driver_payload_len = driver_info.map(|di| di.payload.len()).unwrap_or(0);
        let driver_size = if driver_payload_len > 0 { 16 + driver_payload_len as u64 } else { 0 };

        let total = opts
            .user_block_size
            .checked_add(superblock_size)
            .and_then(|v| v.checked_add(driver_size))
            .ok_or_else(|| Error::CantInit("superblock + driver-info size overflows u64".into()))?;

        let first = driver.allocate(AllocKind::Super, total)?;
        if first.to_u64()? != 0 {
            return Err(Error::CantInit("driver did not hand back address 0 for the first allocation".into()));
        }

        let root_entry = object_store.create()?;

        let mut extension_addr = Address::undef(width);
        let mut sohm_info = None;
        if opts.sohm_nindexes > 0 {
            let ext = object_store.create()?;
            extension_addr = ext.header_addr;
            let info = SohmInfo { nindexes: opts.sohm_nindexes };
            sohm_table.put_info(extension_addr, info);
            sohm_info = Some(info);
        }

        let driver_addr =
            if driver_size > 0 { Address::from_u64(width, opts.user_block_size + superblock_size) } else { Address::undef(width) };

        Ok(Superblock {
            super_vers: opts.super_vers,
            freespace_vers: HDF5_FREESPACE_VERSION,
            obj_dir_vers: HDF5_OBJECTDIR_VERSION,
            share_head_vers: HDF5_SHAREDHEADER_VERSION,
            sizeof_addr: width,
            sizeof_size: opts.sizeof_size,
            sym_leaf_k: opts.sym_leaf_k,
            btree_k: opts.btree_k,
            consist_flags: 0x03,
            super_addr: base_addr,
            base_addr,
            extension_addr,
            stored_eoa: Address::from_u64(width, total),
            driver_addr,
            root_entry,
            sohm_info,
        })
    }

    /// Inverse of [`Superblock::decode`]: for `super_vers >= 2`, computes
    /// the checksum over the superblock bytes (excluding the trailing 4)
    /// extended over the driver-info block when present, then issues one
    /// contiguous write at `super_addr`.
    pub fn encode(&self, driver: &mut dyn FileDriver, driver_info: Option<&DriverInfo>) -> Result<()> {
        let width = self.sizeof_addr;
        let mut buf = Vec::new();
        buf.extend_from_slice(&SIGNATURE);
        buf.push(self.super_vers);
        buf.push(self.freespace_vers);
        buf.push(self.obj_dir_vers);
        buf.push(0);
        buf.push(self.share_head_vers);
        buf.push(width.bytes() as u8);
        buf.push(self.sizeof_size.bytes() as u8);
        buf.push(0);
        buf.write_u16::<LittleEndian>(self.sym_leaf_k)?;
        buf.write_u16::<LittleEndian>(self.btree_k[BTREE_ID_SNODE])?;
        buf.write_u32::<LittleEndian>(self.consist_flags)?;
        if self.super_vers >= 1 {
            buf.write_u16::<LittleEndian>(self.btree_k[BTREE_ID_ISTORE])?;
            if self.super_vers == 1 {
                buf.extend_from_slice(&[0, 0]);
            }
        }
        self.base_addr.encode(&mut buf);
        let second_slot = if self.super_vers >= 2 { self.extension_addr } else { Address::undef(width) };
        second_slot.encode(&mut buf);
        self.stored_eoa.encode(&mut buf);
        self.driver_addr.encode(&mut buf);
        self.root_entry.encode(&mut buf);

        if self.super_vers >= 2 {
            let mut to_checksum = buf.clone();
            if let Some(di) = driver_info {
                to_checksum.extend_from_slice(&di.encode());
            }
            let checksum = checksum_metadata(&to_checksum, 0);
            buf.write_u32::<LittleEndian>(checksum)?;
        }

        if let Some(di) = driver_info {
            buf.extend_from_slice(&di.encode());
        }

        driver.write(AllocKind::Super, Dxpl, self.super_addr, buf.len() as u64, &buf)
    }

    fn body_len(super_vers: u8, addr_w: usize) -> usize {
        let prefix = 9;
        let common = 15;
        let version_extra = if super_vers == 1 { 4 } else if super_vers >= 2 { 2 } else { 0 };
        let addrs = addr_w * 4;
        let root_entry = addr_w;
        let checksum = if super_vers >= 2 { 4 } else { 0 };
        prefix + common + version_extra + addrs + root_entry + checksum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::addr::MemoryDriver;
    use crate::config::FileCreateOptions;
    use crate::external::{MockObjectHeaderStore, MockSharedMessageTable};

    fn fresh_driver() -> MemoryDriver {
        MemoryDriver::new(Width::new(8).unwrap())
    }

    #[test]
    fn init_then_locate_then_decode_round_trips_version_0() {
        let mut driver = fresh_driver();
        let opts = FileCreateOptions { super_vers: 0, ..FileCreateOptions::default() };
        let mut store = MockObjectHeaderStore::new(opts.sizeof_addr);
        let mut sohm = MockSharedMessageTable::default();
        let sb = Superblock::init(&mut driver, &opts, None, &mut store, &mut sohm).unwrap();
        sb.encode(&mut driver, None).unwrap();

        let located = Superblock::locate(&mut driver).unwrap();
        assert_eq!(located, sb.super_addr);
        let (decoded, di) = Superblock::decode(&mut driver, located, &store, &sohm).unwrap();
        assert!(di.is_none());
        assert_eq!(decoded, sb);
    }

    #[test]
    fn version_2_round_trip_recovers_sohm_info_through_the_extension() {
        let mut driver = fresh_driver();
        let opts = FileCreateOptions { super_vers: 2, sohm_nindexes: 1, ..FileCreateOptions::default() };
        let mut store = MockObjectHeaderStore::new(opts.sizeof_addr);
        let mut sohm = MockSharedMessageTable::default();
        let sb = Superblock::init(&mut driver, &opts, None, &mut store, &mut sohm).unwrap();
        assert!(sb.extension().is_some());
        assert_eq!(sb.sohm_info, Some(SohmInfo { nindexes: 1 }));
        sb.encode(&mut driver, None).unwrap();

        let located = Superblock::locate(&mut driver).unwrap();
        let (decoded, _) = Superblock::decode(&mut driver, located, &store, &sohm).unwrap();
        assert_eq!(decoded, sb);
        assert_eq!(decoded.sohm_info, Some(SohmInfo { nindexes: 1 }));
    }

    #[test]
    fn signature_at_non_power_of_two_offset_is_not_found() {
        let mut driver = fresh_driver();
        driver.write(AllocKind::Super, Dxpl, Address::from_u64(Width::new(8).unwrap(), 256), 8, &SIGNATURE).unwrap();
        assert!(matches!(Superblock::locate(&mut driver), Err(Error::NotHdf5)));
    }

    #[test]
    fn truncated_file_is_rejected() {
        let mut driver = fresh_driver();
        let opts = FileCreateOptions::default();
        let mut store = MockObjectHeaderStore::new(opts.sizeof_addr);
        let mut sohm = MockSharedMessageTable::default();
        let mut sb = Superblock::init(&mut driver, &opts, None, &mut store, &mut sohm).unwrap();
        sb.stored_eoa = sb.stored_eoa.apply_delta(1024).unwrap();
        sb.encode(&mut driver, None).unwrap();
        assert!(matches!(Superblock::decode(&mut driver, sb.super_addr, &store, &sohm), Err(Error::Truncated)));
    }

    #[test]
    fn base_relocation_shifts_stored_eoa_by_signed_delta() {
        let mut driver = fresh_driver();
        let opts = FileCreateOptions::default();
        let mut store = MockObjectHeaderStore::new(opts.sizeof_addr);
        let mut sohm = MockSharedMessageTable::default();
        let sb = Superblock::init(&mut driver, &opts, None, &mut store, &mut sohm).unwrap();
        sb.encode(&mut driver, None).unwrap();

        // Simulate a 2048-byte header concatenated in front of the file by
        // shifting every byte down and re-probing from the new offset.
        let width = opts.sizeof_addr;
        let raw = driver.as_bytes().to_vec();
        let mut shifted = MemoryDriver::new(width);
        let prefix = vec![0u8; 2048];
        shifted.write(AllocKind::Super, Dxpl, Address::from_u64(width, 0), 2048, &prefix).unwrap();
        shifted.write(AllocKind::Super, Dxpl, Address::from_u64(width, 2048), raw.len() as u64, &raw).unwrap();

        let located = Superblock::locate(&mut shifted).unwrap();
        assert_eq!(located.to_u64().unwrap(), 2048);
        let (decoded, _) = Superblock::decode(&mut shifted, located, &store, &sohm).unwrap();
        assert_eq!(decoded.base_addr.to_u64().unwrap(), 2048);
        assert_eq!(decoded.stored_eoa.to_u64().unwrap(), sb.stored_eoa.to_u64().unwrap() + 2048);
    }

    #[test]
    fn reopening_a_real_sec2_file_locates_and_decodes_the_superblock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("container.h5");
        let width = Width::new(8).unwrap();

        let mut driver = crate::addr::Sec2Driver::create(&path, width).unwrap();
        let opts = FileCreateOptions { super_vers: 2, sohm_nindexes: 1, ..FileCreateOptions::default() };
        let mut store = MockObjectHeaderStore::new(opts.sizeof_addr);
        let mut sohm = MockSharedMessageTable::default();
        let sb = Superblock::init(&mut driver, &opts, None, &mut store, &mut sohm).unwrap();
        sb.encode(&mut driver, None).unwrap();
        drop(driver);

        // A reopened driver's EOA starts at zero; `locate`/`decode` must
        // raise it themselves rather than rely on state carried over from
        // `create`, which is the bug this test guards against.
        let mut reopened = crate::addr::Sec2Driver::open(&path, width).unwrap();
        let located = Superblock::locate(&mut reopened).unwrap();
        let (decoded, _) = Superblock::decode(&mut reopened, located, &store, &sohm).unwrap();
        assert_eq!(decoded.super_addr, sb.super_addr);
        assert_eq!(decoded.sohm_info, Some(SohmInfo { nindexes: 1 }));
    }
}
