//! Strided array metadata and the two storage flavours built on it.
//!
//! [`ArrayView`] never owns what it points at, [`DataBlock`] either owns a copy
//! or borrows a [`Buffer`]. Both describe their elements with a shape and
//! per-axis strides counted in elements.

mod block;
mod buffer;
mod slice;
mod view;

pub use block::{strides_c, strides_fortran, DataBlock, Memory};
pub use buffer::Buffer;
pub use slice::{Selector, Slice};
pub use view::{ArrayView, Owner, OwnerKind};

use crate::error::{MapError, Result};

/// Number of elements described by `shape`. A 0-dimensional shape holds one.
pub(crate) fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Checks that shape and strides agree and that every addressed element lies
/// inside a buffer of `len` elements when starting from `offset`.
///
/// Returns the element count.
pub(crate) fn check_layout(
    len: usize,
    offset: usize,
    shape: &[usize],
    strides: &[isize],
) -> Result<usize> {
    if shape.len() != strides.len() {
        return Err(MapError::invalid_value(format!(
            "Size of shape vector (== {}) does not agree with the size of the strides vector (== {}).",
            shape.len(),
            strides.len()
        )));
    }

    let size = element_count(shape);
    if size == 0 {
        return Ok(0);
    }

    let overflow = || MapError::invalid_value("Strided layout overflows the address range");
    let start = isize::try_from(offset).map_err(|_| overflow())?;
    let mut lowest = start;
    let mut highest = start;
    for (&extent, &stride) in shape.iter().zip(strides) {
        let last = isize::try_from(extent - 1).map_err(|_| overflow())?;
        let reach = last.checked_mul(stride).ok_or_else(overflow)?;
        if reach < 0 {
            lowest = lowest.checked_add(reach).ok_or_else(overflow)?;
        } else {
            highest = highest.checked_add(reach).ok_or_else(overflow)?;
        }
    }

    if lowest < 0 || highest >= isize::try_from(len).map_err(|_| overflow())? {
        return Err(MapError::invalid_value(format!(
            "Layout with shape {:?}, strides {:?} and offset {} addresses elements outside \
             of a buffer of {} elements",
            shape, strides, offset, len
        )));
    }
    Ok(size)
}

/// Row-major contiguity: scanning from the last axis to the first, every
/// stride equals the product of the extents of the axes after it.
pub(crate) fn is_c_contiguous(shape: &[usize], strides: &[isize]) -> bool {
    if shape.len() == 1 {
        return true;
    }
    let mut expected: isize = 1;
    for (&extent, &stride) in shape.iter().zip(strides).rev() {
        if stride != expected {
            return false;
        }
        expected = expected.saturating_mul(extent as isize);
    }
    true
}

/// Column-major contiguity, the mirror image of [`is_c_contiguous`].
pub(crate) fn is_fortran_contiguous(shape: &[usize], strides: &[isize]) -> bool {
    if shape.len() == 1 {
        return true;
    }
    let mut expected: isize = 1;
    for (&extent, &stride) in shape.iter().zip(strides) {
        if stride != expected {
            return false;
        }
        expected = expected.saturating_mul(extent as isize);
    }
    true
}

/// Offset of the element at row-major position `linear`.
///
/// The caller guarantees `linear < element_count(shape)`.
pub(crate) fn linear_offset(offset: usize, shape: &[usize], strides: &[isize], linear: usize) -> usize {
    let mut rest = linear;
    let mut position = offset as isize;
    for (&extent, &stride) in shape.iter().zip(strides).rev() {
        let index = rest % extent;
        rest /= extent;
        position += index as isize * stride;
    }
    position as usize
}

/// Offset of the element addressed by a full multi-index.
pub(crate) fn index_offset(
    offset: usize,
    shape: &[usize],
    strides: &[isize],
    index: &[usize],
) -> Result<usize> {
    if index.len() != shape.len() {
        return Err(MapError::invalid_value(format!(
            "Index {:?} has {} components, but the array has {} dimensions",
            index,
            index.len(),
            shape.len()
        )));
    }
    let mut position = offset as isize;
    for (axis, ((&i, &extent), &stride)) in index.iter().zip(shape).zip(strides).enumerate() {
        if i >= extent {
            return Err(MapError::invalid_value(format!(
                "Index {} is out of range for axis {} of extent {}",
                i, axis, extent
            )));
        }
        position += i as isize * stride;
    }
    Ok(position as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_mismatch() {
        let err = check_layout(4, 0, &[2], &[1, 2]).unwrap_err();
        assert!(matches!(err, MapError::InvalidValue(_)));
    }

    #[test]
    fn layout_bounds() {
        assert_eq!(check_layout(4, 0, &[2, 2], &[2, 1]), Ok(4));
        assert!(check_layout(3, 0, &[2, 2], &[2, 1]).is_err());
        assert!(check_layout(4, 0, &[4], &[-1]).is_err());
        assert_eq!(check_layout(4, 3, &[4], &[-1]), Ok(4));
        assert_eq!(check_layout(0, 0, &[0, 3], &[3, 1]), Ok(0));
    }

    #[test]
    fn zero_dimensional_layout_has_one_element() {
        assert_eq!(check_layout(1, 0, &[], &[]), Ok(1));
        assert!(is_c_contiguous(&[], &[]));
    }

    #[test]
    fn linear_offsets_follow_row_major_order() {
        // 2x3 array stored column-major
        let shape = [2, 3];
        let strides = [1, 2];
        let offsets: Vec<usize> = (0..6).map(|i| linear_offset(0, &shape, &strides, i)).collect();
        assert_eq!(offsets, vec![0, 2, 4, 1, 3, 5]);
    }

    #[test]
    fn multi_index_offsets() -> Result<()> {
        assert_eq!(index_offset(0, &[2, 3], &[3, 1], &[1, 2])?, 5);
        assert!(index_offset(0, &[2, 3], &[3, 1], &[2, 0]).is_err());
        assert!(index_offset(0, &[2, 3], &[3, 1], &[1]).is_err());
        Ok(())
    }
}
