//! Dataspaces and hyperslabs (spec.md §3): the shape XFER reads selections
//! out of. The B-tree/object-header externals this crate stubs out in
//! [`crate::external`] are the only other consumers of these types.

use crate::error::{Error, Result};

/// The extent of a dataspace: a rank and a per-dimension size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extent {
    pub size: Vec<u64>,
}

impl Extent {
    pub fn new(size: Vec<u64>) -> Self {
        Extent { size }
    }

    pub fn rank(&self) -> usize {
        self.size.len()
    }

    pub fn element_count(&self) -> Result<u64> {
        self.size.iter().try_fold(1u64, |acc, &s| {
            acc.checked_mul(s).ok_or_else(|| Error::BadRange("extent element count overflows u64".into()))
        })
    }
}

/// A regular N-dimensional strided selection: origin, count, stride,
/// sample. Only `sample == 1` everywhere is implemented; anything else
/// fails with `Unsupported`, per spec.md §3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hyperslab {
    pub offset: Vec<i64>,
    pub count: Vec<u64>,
    pub stride: Vec<u64>,
    pub sample: Vec<u64>,
}

impl Hyperslab {
    pub fn full_extent(extent: &Extent) -> Self {
        let r = extent.rank();
        Hyperslab {
            offset: vec![0; r],
            count: extent.size.clone(),
            stride: vec![1; r],
            sample: vec![1; r],
        }
    }

    pub fn rank(&self) -> usize {
        self.count.len()
    }

    pub fn is_unit_sample(&self) -> bool {
        self.sample.iter().all(|&s| s == 1)
    }

    pub fn selected_len(&self) -> Result<u64> {
        self.count.iter().try_fold(1u64, |acc, &c| {
            acc.checked_mul(c).ok_or_else(|| Error::BadRange("hyperslab element count overflows u64".into()))
        })
    }
}

/// What part of the extent is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    None,
    All,
    Points(Vec<Vec<i64>>),
    Hyperslab(Hyperslab),
}

/// A dataspace: extent plus selection, spec.md §3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataspace {
    pub extent: Extent,
    pub selection: Selection,
}

impl Dataspace {
    pub fn all(size: Vec<u64>) -> Self {
        Dataspace { extent: Extent::new(size), selection: Selection::All }
    }

    pub fn none(size: Vec<u64>) -> Self {
        Dataspace { extent: Extent::new(size), selection: Selection::None }
    }

    pub fn rank(&self) -> usize {
        self.extent.rank()
    }

    /// Number of elements the current selection designates. `NONE` and the
    /// as-yet-unimplemented `POINTS`/`HYPERSLABS` selections fail, per
    /// spec.md §4.4's selection-handling rules.
    pub fn selected_len(&self) -> Result<u64> {
        match &self.selection {
            Selection::All => self.extent.element_count(),
            Selection::None => Err(Error::BadValue("NONE selection has no elements to transfer".into())),
            Selection::Points(_) => Err(Error::Unsupported("POINTS selection is not implemented")),
            Selection::Hyperslab(_) => Err(Error::Unsupported("HYPERSLABS selection is not implemented")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_selection_counts_the_whole_extent() {
        let ds = Dataspace::all(vec![4, 4]);
        assert_eq!(ds.selected_len().unwrap(), 16);
    }

    #[test]
    fn none_selection_is_bad_value() {
        let ds = Dataspace::none(vec![4, 4]);
        assert!(matches!(ds.selected_len(), Err(Error::BadValue(_))));
    }

    #[test]
    fn hyperslab_and_points_selections_are_unsupported() {
        let hs = Hyperslab::full_extent(&Extent::new(vec![4, 4]));
        let ds = Dataspace { extent: Extent::new(vec![4, 4]), selection: Selection::Hyperslab(hs) };
        assert!(matches!(ds.selected_len(), Err(Error::Unsupported(_))));
        let ds = Dataspace { extent: Extent::new(vec![4]), selection: Selection::Points(vec![]) };
        assert!(matches!(ds.selected_len(), Err(Error::Unsupported(_))));
    }
}
