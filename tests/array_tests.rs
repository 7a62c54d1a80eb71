use proptest::prelude::*;
use sovran_pathmap::{
    strides_c, strides_fortran, ArrayView, Buffer, DataBlock, MapError, Memory, Owner, OwnerKind,
    PathMap, Selector, Slice,
};
use std::rc::Rc;

fn iota(n: usize) -> Buffer<f64> {
    Buffer::new((0..n).map(|i| i as f64).collect())
}

#[test]
fn test_correct_dimensionality() -> Result<(), MapError> {
    let data = Buffer::new(vec![1.0, 2.0, 3.0, 4.0]);
    let view = ArrayView::new(&data, vec![2, 2], vec![1, 2])?;
    assert_eq!(view.size(), data.len());
    Ok(())
}

#[test]
fn test_dimensionality_mismatch() {
    let data = Buffer::new(vec![1.0, 2.0, 3.0, 4.0]);
    let result = ArrayView::new(&data, vec![2], vec![1, 2]);
    assert!(matches!(result, Err(MapError::InvalidValue(_))));
}

#[test]
fn test_layout_outside_buffer() {
    let data = iota(4);
    assert!(ArrayView::new(&data, vec![5], vec![1]).is_err());
    assert!(ArrayView::new(&data, vec![2, 2], vec![3, 1]).is_err());
    assert!(ArrayView::new(&data, vec![2], vec![-1]).is_err());
}

#[test]
fn test_is_contiguous() -> Result<(), MapError> {
    let data = Buffer::new(vec![1.0; 1000]);
    let shape = vec![2, 50, 10];

    let c = ArrayView::new(&data, shape.clone(), vec![500, 10, 1])?;
    let fortran = ArrayView::new(&data, shape.clone(), vec![1, 2, 100])?;
    let flat = ArrayView::new(&data, vec![1000], vec![1])?;

    assert!(fortran.is_fortran_contiguous());
    assert!(!fortran.is_c_contiguous());
    assert!(!c.is_fortran_contiguous());
    assert!(c.is_c_contiguous());
    assert!(flat.is_fortran_contiguous());
    assert!(flat.is_c_contiguous());

    assert_eq!(strides_c(&shape), vec![500, 10, 1]);
    assert_eq!(strides_fortran(&shape), vec![1, 2, 100]);

    for stride in [2, 3, -1] {
        let offset = if stride < 0 { 9 } else { 0 };
        let view = ArrayView::with_offset(&data, offset, vec![10], vec![stride])?;
        assert!(view.is_c_contiguous() && view.is_fortran_contiguous());
    }
    Ok(())
}

#[test]
fn test_views_stored_in_a_map_share_memory() -> Result<(), MapError> {
    let data = iota(6);
    let map = PathMap::new();
    map.update("grid", ArrayView::new(&data, vec![2, 3], strides_c(&[2, 3]))?)?;

    let stored = map.get::<ArrayView<f64>>("grid")?;
    stored.set(&[0, 1], 10.0)?;
    assert_eq!(data.get(1)?, 10.0);

    data.set(5, -5.0)?;
    assert_eq!(map.with("grid", |v: &ArrayView<f64>| v.get(&[1, 2]))??, -5.0);
    Ok(())
}

#[test]
fn test_linear_index_follows_row_major_order() -> Result<(), MapError> {
    let data = iota(12);
    let fortran = ArrayView::new(&data, vec![3, 4], strides_fortran(&[3, 4]))?;
    for i in 0..3 {
        for j in 0..4 {
            assert_eq!(fortran.get_linear(i * 4 + j)?, fortran.get(&[i, j])?);
        }
    }
    assert!(matches!(fortran.get_linear(12), Err(MapError::InvalidValue(_))));
    Ok(())
}

#[test]
fn test_multi_axis_slicing() -> Result<(), MapError> {
    // 4x5 row-major
    let data = iota(20);
    let view = ArrayView::new(&data, vec![4, 5], strides_c(&[4, 5]))?;

    let block = view.slice(&[Slice::range(1, 3).into(), Slice::new(0, 5, 2)?.into()])?;
    assert_eq!(block.shape(), &[2, 3]);
    assert_eq!(block.to_vec()?, vec![5.0, 7.0, 9.0, 10.0, 12.0, 14.0]);

    // Slicing a slice
    let corner = block.slice(&[Selector::Index(1), Slice::at(2).into()])?;
    assert_eq!(corner.shape(), &[1]);
    assert_eq!(corner.get(&[0])?, 14.0);

    // Reversed rows
    let reversed = view.slice(&[Slice::with_bounds(None, None, -1)?.into(), Selector::Index(0)])?;
    assert_eq!(reversed.to_vec()?, vec![15.0, 10.0, 5.0, 0.0]);

    // Single element as a zero-dimensional view
    let scalar = view.slice(&[Selector::Index(3), Selector::Index(4)])?;
    assert_eq!(scalar.ndim(), 0);
    assert_eq!(scalar.size(), 1);
    assert_eq!(scalar.get(&[])?, 19.0);

    // Writes through a slice reach the buffer
    block.set(&[0, 0], -1.0)?;
    assert_eq!(data.get(5)?, -1.0);
    Ok(())
}

#[test]
fn test_invalid_slices() -> Result<(), MapError> {
    let data = iota(10);
    let view = ArrayView::from_buffer(&data);

    assert!(matches!(Slice::new(0, 4, 0), Err(MapError::InvalidValue(_))));
    assert!(view.slice(&[Slice::range(4, 4).into()]).is_err());
    assert!(view.slice(&[Slice::range(6, 4).into()]).is_err());
    assert!(view.slice(&[Slice::range(2, 11).into()]).is_err());
    assert!(view.slice(&[Selector::Index(10)]).is_err());
    Ok(())
}

#[test]
fn test_owner_back_reference() {
    let host: Rc<Vec<f64>> = Rc::new(vec![0.0; 3]);
    let mut view = ArrayView::from_buffer(&iota(3));
    view.reset_owner(Owner::new(OwnerKind::HostArray, &host));

    let sliced = view.slice(&[Slice::range(0, 2).into()]);
    let owner = sliced.as_ref().ok().and_then(|v| v.owner().cloned());
    assert!(owner.as_ref().is_some_and(Owner::is_alive));

    let upgraded = owner.as_ref().and_then(Owner::upgrade);
    assert!(upgraded.is_some_and(|any| any.downcast_ref::<Vec<f64>>().is_some()));

    drop(host);
    assert!(owner.is_some_and(|o| !o.is_alive()));
}

#[test]
fn test_borrowed_block_copies_share_memory() -> Result<(), MapError> {
    let data = iota(4);
    let mut block = DataBlock::from_buffer(&data, vec![2, 2], Memory::Borrowed)?;
    let copy = block.clone();

    block.set(3, 42.0)?;
    assert_eq!(copy.get(3)?, 42.0);
    assert_eq!(data.get(3)?, 42.0);
    assert_eq!(block, copy);
    Ok(())
}

#[test]
fn test_owned_block_copies_are_independent() -> Result<(), MapError> {
    let data = iota(4);
    let mut block = DataBlock::from_buffer(&data, vec![4], Memory::Owned)?;
    let copy = block.clone();

    block.set(0, 42.0)?;
    assert_eq!(copy.get(0)?, 0.0);
    assert_eq!(data.get(0)?, 0.0);
    assert_ne!(block, copy);
    Ok(())
}

#[test]
fn test_release() -> Result<(), MapError> {
    let mut owned = DataBlock::with_shape(vec![1i64, 2, 3, 4, 5, 6], vec![2, 3])?;
    assert_eq!(owned.strides(), &[3, 1]);
    assert_eq!(owned.release()?, vec![1, 2, 3, 4, 5, 6]);
    assert!(owned.is_released());
    assert!(matches!(owned.release(), Err(MapError::InvalidState(_))));
    assert!(matches!(owned.get(0), Err(MapError::InvalidState(_))));

    let data = Buffer::new(vec![true, false]);
    let mut borrowed = DataBlock::from_buffer(&data, vec![2], Memory::Borrowed)?;
    assert!(matches!(borrowed.release(), Err(MapError::InvalidState(_))));
    // The failed release leaves the block usable
    assert_eq!(borrowed.to_vec()?, vec![true, false]);
    Ok(())
}

#[test]
fn test_take_leaves_an_empty_block() -> Result<(), MapError> {
    let mut block = DataBlock::from_vec(vec![String::from("a"), String::from("b")]);
    let moved = block.take();
    assert_eq!(moved.to_vec()?, vec!["a", "b"]);
    assert_eq!(block.size(), 0);
    assert!(block.is_owned());
    Ok(())
}

#[test]
fn test_blocks_in_a_map() -> Result<(), MapError> {
    let data = iota(3);
    let map = PathMap::new();
    map.update("owned", DataBlock::from_buffer(&data, vec![3], Memory::Owned)?)?;
    map.update("borrowed", DataBlock::from_buffer(&data, vec![3], Memory::Borrowed)?)?;

    data.set(0, 9.0)?;
    assert_eq!(map.with("owned", |b: &DataBlock<f64>| b.get(0))??, 0.0);
    assert_eq!(map.with("borrowed", |b: &DataBlock<f64>| b.get(0))??, 9.0);

    let released = map.with_mut("owned", |b: &mut DataBlock<f64>| b.release())??;
    assert_eq!(released, vec![0.0, 1.0, 2.0]);
    assert!(map.with("owned", |b: &DataBlock<f64>| b.is_released())?);
    Ok(())
}

proptest! {
    #[test]
    fn canonical_strides_are_contiguous(shape in prop::collection::vec(2usize..5, 2..5)) {
        let size: usize = shape.iter().product();
        let data = iota(size);

        let c = ArrayView::new(&data, shape.clone(), strides_c(&shape)).unwrap();
        prop_assert!(c.is_c_contiguous());
        prop_assert!(!c.is_fortran_contiguous());
        prop_assert_eq!(c.to_vec().unwrap(), data.to_vec());

        let f = ArrayView::new(&data, shape.clone(), strides_fortran(&shape)).unwrap();
        prop_assert!(f.is_fortran_contiguous());
        prop_assert!(!f.is_c_contiguous());
    }

    #[test]
    fn slices_select_what_they_count(len in 1usize..40, start in 0usize..40, step in 1isize..5) {
        prop_assume!(start < len);
        let data = iota(len);
        let view = ArrayView::from_buffer(&data);
        let slice = Slice::with_bounds(Some(start), None, step).unwrap();

        let selected = view.slice(&[slice.into()]).unwrap();
        let expected: Vec<f64> = (start..len).step_by(step as usize).map(|i| i as f64).collect();
        prop_assert_eq!(selected.size(), slice.count(len).unwrap());
        prop_assert_eq!(selected.to_vec().unwrap(), expected);
    }
}
