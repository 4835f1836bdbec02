//! N-dimensional rectangular copy between two flat byte buffers, each
//! addressed as a row-major array of a given virtual shape.
//!
//! Used by XFER's memory-gather/memory-scatter (the "final copy" spec.md
//! §4.4 describes) and by the in-crate mock array store that stands in for
//! the external B-tree/array layer during tests.

use crate::error::{Error, Result};

fn row_major_strides(shape: &[u64]) -> Vec<u64> {
    let r = shape.len();
    let mut strides = vec![1u64; r];
    for i in (0..r.saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * shape[i + 1];
    }
    strides
}

/// Copies a `block`-shaped rectangular region at `src_off` within a
/// row-major array of `src_shape`, into the same-shaped region at
/// `dst_off` within a row-major array of `dst_shape`. All of `dst_shape`,
/// `src_shape`, `dst_off`, `src_off`, `block` must share one rank.
pub fn copy_nd(
    dst: &mut [u8],
    dst_shape: &[u64],
    dst_off: &[u64],
    src: &[u8],
    src_shape: &[u64],
    src_off: &[u64],
    block: &[u64],
    elem_size: usize,
) -> Result<()> {
    let rank = block.len();
    if [dst_shape.len(), src_shape.len(), dst_off.len(), src_off.len()].iter().any(|&l| l != rank) {
        return Err(Error::BadValue("rank mismatch in N-dimensional copy".into()));
    }
    if rank == 0 {
        dst[..elem_size].copy_from_slice(&src[..elem_size]);
        return Ok(());
    }

    let dst_strides = row_major_strides(dst_shape);
    let src_strides = row_major_strides(src_shape);
    let outer_dims = &block[..rank - 1];
    let outer_total: u64 = outer_dims.iter().product::<u64>().max(1).min(u64::MAX);
    let outer_total = if rank == 1 { 1 } else { outer_total };
    let inner_elems = block[rank - 1];
    let inner_bytes = inner_elems as usize * elem_size;

    let mut idx = vec![0u64; rank - 1];
    for linear in 0..outer_total {
        let mut rem = linear;
        for d in (0..rank - 1).rev() {
            let dim = outer_dims[d].max(1);
            idx[d] = rem % dim;
            rem /= dim;
        }

        let mut dst_base = (dst_off[rank - 1]) * dst_strides[rank - 1];
        let mut src_base = (src_off[rank - 1]) * src_strides[rank - 1];
        for d in 0..rank - 1 {
            dst_base += (dst_off[d] + idx[d]) * dst_strides[d];
            src_base += (src_off[d] + idx[d]) * src_strides[d];
        }

        let dst_byte = dst_base as usize * elem_size;
        let src_byte = src_base as usize * elem_size;
        dst[dst_byte..dst_byte + inner_bytes].copy_from_slice(&src[src_byte..src_byte + inner_bytes]);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_a_full_2d_block() {
        // 4x4 of u32-sized elements, copy the whole thing.
        let elem = 4;
        let shape = [4u64, 4];
        let mut src = vec![0u8; 16 * elem];
        for (i, v) in (0u32..16).enumerate() {
            src[i * elem..i * elem + elem].copy_from_slice(&v.to_le_bytes());
        }
        let mut dst = vec![0u8; 16 * elem];
        copy_nd(&mut dst, &shape, &[0, 0], &src, &shape, &[0, 0], &shape, elem).unwrap();
        assert_eq!(dst, src);
    }

    #[test]
    fn copies_a_sub_rectangle_with_offsets() {
        let elem = 1;
        // 4x4 source, copy the inner 2x2 at (1,1) into a 2x2 dest at (0,0).
        let src_shape = [4u64, 4];
        let mut src = vec![0u8; 16];
        for i in 0..16u8 {
            src[i as usize] = i;
        }
        let dst_shape = [2u64, 2];
        let mut dst = vec![0u8; 4];
        copy_nd(&mut dst, &dst_shape, &[0, 0], &src, &src_shape, &[1, 1], &[2, 2], elem).unwrap();
        // row 1: indices 5,6 ; row 2: indices 9,10
        assert_eq!(dst, vec![5, 6, 9, 10]);
    }

    #[test]
    fn rank_mismatch_is_rejected() {
        let res = copy_nd(&mut [0u8; 4], &[2, 2], &[0, 0], &[0u8; 4], &[2, 2], &[0, 0], &[2], 1);
        assert!(res.is_err());
    }
}
