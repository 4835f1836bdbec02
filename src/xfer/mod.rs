//! The transfer pipeline (XFER): turns a pair of dataspaces into passes
//! over the external array-read/array-write interface, stripmined to a
//! caller-supplied buffer budget, with a direct-path shortcut when no
//! reshaping is needed.
//!
//! Grounded in spec.md §4.4; the four internal primitives (`fgath`,
//! `fscat`, `mgath`, `mscat`) are implemented and unit-tested against the
//! literal stripmine arithmetic even though today's supported selection
//! set (`ALL`/`ALL` only, see [`crate::dataspace`]) never drives the
//! multi-pass loop at runtime — every `ALL`/`ALL` transfer either matches
//! shape (direct path) or is a single-pass reshape (spec.md §8 scenario 5).
//! The stripmined loop is ready for the day `POINTS`/`HYPERSLABS` land.

use crate::dataspace::Dataspace;
use crate::error::{Error, Result};
use crate::external::ArrayStore;
use crate::ndcopy::copy_nd;

fn inner_product(size: &[u64]) -> u64 {
    size.get(1..).map(|rest| rest.iter().product::<u64>()).unwrap_or(1).max(1)
}

/// Largest `nelmts <= desired_nelmts` that is a multiple of `acc = ∏_{i>=1}
/// size[i]`; `0` signals the buffer can't hold even one slab row.
pub fn stripmine(desired_nelmts: u64, size: &[u64]) -> u64 {
    let acc = inner_product(size);
    if desired_nelmts < acc {
        return 0;
    }
    (desired_nelmts / acc) * acc
}

/// Reads one pass of `nelmts` elements starting at linear element `start`
/// out of the file-side hyperslab `(offset, size)`, via the external array
/// store.
pub fn fgath(
    store: &dyn ArrayStore,
    size: &[u64],
    offset: &[i64],
    start: u64,
    nelmts: u64,
    elmt_size: usize,
    buf: &mut [u8],
) -> Result<()> {
    let acc = inner_product(size);
    if start % acc != 0 || nelmts % acc != 0 {
        return Err(Error::BadValue("fgath: start/nelmts not aligned to the inner-dimension stride".into()));
    }
    let (adj_offset, adj_size) = adjust_slowest_axis(size, offset, start, nelmts, acc)?;
    let zero = vec![0u64; size.len()];
    store.arr_read(&adj_size, &adj_size, &zero, &adj_offset, elmt_size, buf)
}

/// Writes one pass of `nelmts` elements starting at linear element `start`
/// into the file-side hyperslab `(offset, size)`.
pub fn fscat(
    store: &mut dyn ArrayStore,
    size: &[u64],
    offset: &[i64],
    start: u64,
    nelmts: u64,
    elmt_size: usize,
    buf: &[u8],
) -> Result<()> {
    let acc = inner_product(size);
    if start % acc != 0 || nelmts % acc != 0 {
        return Err(Error::BadValue("fscat: start/nelmts not aligned to the inner-dimension stride".into()));
    }
    let (adj_offset, adj_size) = adjust_slowest_axis(size, offset, start, nelmts, acc)?;
    let zero = vec![0u64; size.len()];
    store.arr_write(&adj_size, &adj_size, &zero, &adj_offset, elmt_size, buf)
}

fn adjust_slowest_axis(size: &[u64], offset: &[i64], start: u64, nelmts: u64, acc: u64) -> Result<(Vec<u64>, Vec<u64>)> {
    if size.is_empty() || offset.len() != size.len() {
        return Err(Error::BadValue("hyperslab offset/size rank mismatch".into()));
    }
    let shifted = offset[0].checked_add((start / acc) as i64).ok_or_else(|| Error::BadRange("hyperslab offset overflow".into()))?;
    if shifted < 0 {
        return Err(Error::BadRange("hyperslab offset went negative".into()));
    }
    let mut adj_offset = vec![shifted as u64];
    adj_offset.extend(offset[1..].iter().map(|&o| o.max(0) as u64));
    let mut adj_size = size.to_vec();
    adj_size[0] = nelmts / acc;
    Ok((adj_offset, adj_size))
}

/// Gathers one pass out of the application buffer `mem_buf` (shape
/// `mem_size`, selection origin `mem_offset`) into a tightly packed
/// transfer buffer, via an N-dimensional rectangular copy.
pub fn mgath(
    mem_buf: &[u8],
    mem_size: &[u64],
    mem_offset: &[u64],
    start: u64,
    nelmts: u64,
    elmt_size: usize,
    out_buf: &mut [u8],
) -> Result<()> {
    let acc = inner_product(mem_size);
    if start % acc != 0 || nelmts % acc != 0 {
        return Err(Error::BadValue("mgath: start/nelmts not aligned to the inner-dimension stride".into()));
    }
    let mut block = mem_size.to_vec();
    block[0] = nelmts / acc;
    let mut src_off = mem_offset.to_vec();
    src_off[0] += start / acc;
    let dst_off = vec![0u64; block.len()];
    copy_nd(out_buf, &block, &dst_off, mem_buf, mem_size, &src_off, &block, elmt_size)
}

/// Scatters one pass out of a tightly packed transfer buffer into the
/// application buffer `mem_buf`.
pub fn mscat(
    transfer_buf: &[u8],
    mem_size: &[u64],
    mem_offset: &[u64],
    start: u64,
    nelmts: u64,
    elmt_size: usize,
    mem_buf: &mut [u8],
) -> Result<()> {
    let acc = inner_product(mem_size);
    if start % acc != 0 || nelmts % acc != 0 {
        return Err(Error::BadValue("mscat: start/nelmts not aligned to the inner-dimension stride".into()));
    }
    let mut block = mem_size.to_vec();
    block[0] = nelmts / acc;
    let mut dst_off = mem_offset.to_vec();
    dst_off[0] += start / acc;
    let src_off = vec![0u64; block.len()];
    copy_nd(mem_buf, mem_size, &dst_off, transfer_buf, &block, &src_off, &block, elmt_size)
}

fn check_all_selection_compatible(file_space: &Dataspace, mem_space: &Dataspace) -> Result<u64> {
    let file_total = file_space.selected_len()?;
    let mem_total = mem_space.selected_len()?;
    if file_total != mem_total {
        return Err(Error::BadValue("file and memory selections designate a different element count".into()));
    }
    Ok(file_total)
}

/// Reads `file_space`'s selection into `buf_out`, shaped per `mem_space`.
pub fn read(
    file_space: &Dataspace,
    mem_space: &Dataspace,
    elmt_size: usize,
    desired_nelmts: u64,
    store: &dyn ArrayStore,
    buf_out: &mut [u8],
) -> Result<()> {
    let total = check_all_selection_compatible(file_space, mem_space)?;
    if total as usize * elmt_size != buf_out.len() {
        return Err(Error::BadValue("output buffer size does not match the selected element count".into()));
    }
    if file_space.extent.size == mem_space.extent.size {
        let shape = &file_space.extent.size;
        let zero = vec![0u64; shape.len()];
        return store.arr_read(shape, shape, &zero, &zero, elmt_size, buf_out);
    }
    if total > desired_nelmts {
        return Err(Error::Unsupported("shape change mid-transfer exceeds the stripmine buffer budget"));
    }
    let flat = [total];
    store.arr_read(&flat, &flat, &[0], &[0], elmt_size, buf_out)
}

/// Writes `buf_in` (shaped per `mem_space`) into `file_space`'s selection.
pub fn write(
    file_space: &Dataspace,
    mem_space: &Dataspace,
    elmt_size: usize,
    desired_nelmts: u64,
    store: &mut dyn ArrayStore,
    buf_in: &[u8],
) -> Result<()> {
    let total = check_all_selection_compatible(file_space, mem_space)?;
    if total as usize * elmt_size != buf_in.len() {
        return Err(Error::BadValue("input buffer size does not match the selected element count".into()));
    }
    if file_space.extent.size == mem_space.extent.size {
        let shape = &file_space.extent.size;
        let zero = vec![0u64; shape.len()];
        return store.arr_write(shape, shape, &zero, &zero, elmt_size, buf_in);
    }
    if total > desired_nelmts {
        return Err(Error::Unsupported("shape change mid-transfer exceeds the stripmine buffer budget"));
    }
    let flat = [total];
    store.arr_write(&flat, &flat, &[0], &[0], elmt_size, buf_in)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataspace::Dataspace;
    use crate::external::MockArrayStore;

    #[test]
    fn stripmine_returns_largest_aligned_multiple() {
        let size = [4u64, 4, 4]; // acc = 16
        assert_eq!(stripmine(100, &size), 96);
        assert_eq!(stripmine(16, &size), 16);
    }

    #[test]
    fn stripmine_signals_zero_when_buffer_too_small_for_one_row() {
        let size = [4u64, 4, 4];
        assert_eq!(stripmine(8, &size), 0);
    }

    #[test]
    fn fgath_adjusts_the_slowest_axis_by_start_over_acc() {
        let mut store = MockArrayStore::new(vec![4, 4], 4);
        let data: Vec<u8> = (0u32..16).flat_map(|v| v.to_le_bytes()).collect();
        store.arr_write(&[4, 4], &[4, 4], &[0, 0], &[0, 0], 4, &data).unwrap();

        let mut buf = vec![0u8; 2 * 4 * 4];
        fgath(&store, &[4, 4], &[0, 0], 8, 8, 4, &mut buf).unwrap();
        assert_eq!(buf, data[32..]);
    }

    #[test]
    fn mgath_then_mscat_round_trips_a_pass() {
        let mem_size = [4u64, 4];
        let mem_buf: Vec<u8> = (0u8..16).collect();
        let mut pass = vec![0u8; 8];
        mgath(&mem_buf, &mem_size, &[0, 0], 8, 8, 1, &mut pass).unwrap();
        assert_eq!(pass, &mem_buf[8..16]);

        let mut dst = vec![0u8; 16];
        mscat(&pass, &mem_size, &[0, 0], 8, 8, 1, &mut dst).unwrap();
        assert_eq!(&dst[8..16], &pass[..]);
        assert_eq!(&dst[..8], &[0u8; 8]);
    }

    #[test]
    fn read_takes_the_direct_path_when_shapes_match() {
        let mut store = MockArrayStore::new(vec![4, 4], 4);
        let data: Vec<u8> = (0u32..16).flat_map(|v| v.to_le_bytes()).collect();
        store.arr_write(&[4, 4], &[4, 4], &[0, 0], &[0, 0], 4, &data).unwrap();

        let ds = Dataspace::all(vec![4, 4]);
        let mut out = vec![0u8; 16 * 4];
        read(&ds, &ds, 4, 1024, &store, &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn read_with_mismatched_rank_within_budget_reshapes() {
        let mut store = MockArrayStore::new(vec![2, 8], 1);
        let data: Vec<u8> = (0u8..16).collect();
        store.arr_write(&[2, 8], &[2, 8], &[0, 0], &[0, 0], 1, &data).unwrap();

        let file_space = Dataspace::all(vec![2, 8]);
        let mem_space = Dataspace::all(vec![4, 2, 2]);
        let mut out = vec![0u8; 16];
        read(&file_space, &mem_space, 1, 64, &store, &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn read_with_mismatched_rank_exceeding_budget_is_unsupported() {
        let store = MockArrayStore::new(vec![2, 8], 1);
        let file_space = Dataspace::all(vec![2, 8]);
        let mem_space = Dataspace::all(vec![4, 2, 2]);
        let mut out = vec![0u8; 16];
        let err = read(&file_space, &mem_space, 1, 4, &store, &mut out).unwrap_err();
        assert!(matches!(err, Error::Unsupported(_)));
    }
}
