use super::{check_layout, element_count, is_c_contiguous, is_fortran_contiguous, ArrayView, Buffer};
use crate::error::{MapError, Result};
use tracing::debug;

/// How a [`DataBlock`] relates to the memory it was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Memory {
    /// Copy the data into storage owned by the block
    Owned,
    /// Refer to the caller's buffer; the block never frees it
    Borrowed,
}

#[derive(Debug, Clone)]
enum Storage<T> {
    Owned(Vec<T>),
    Borrowed(Buffer<T>),
    Released,
}

/// A typed block of array data that either owns a copy or borrows a buffer.
///
/// Cloning a borrowed block shares the buffer, cloning an owned block
/// duplicates the elements.
#[derive(Debug, Clone)]
pub struct DataBlock<T> {
    storage: Storage<T>,
    shape: Vec<usize>,
    strides: Vec<isize>,
    size: usize,
}

/// Row-major (C) strides for `shape`: the last axis has unit stride.
pub fn strides_c(shape: &[usize]) -> Vec<isize> {
    let mut strides = vec![0; shape.len()];
    let mut acc: isize = 1;
    for (stride, &extent) in strides.iter_mut().zip(shape).rev() {
        *stride = acc;
        acc *= extent as isize;
    }
    strides
}

/// Column-major (Fortran) strides for `shape`: the first axis has unit stride.
pub fn strides_fortran(shape: &[usize]) -> Vec<isize> {
    let mut strides = vec![0; shape.len()];
    let mut acc: isize = 1;
    for (stride, &extent) in strides.iter_mut().zip(shape) {
        *stride = acc;
        acc *= extent as isize;
    }
    strides
}

impl<T> DataBlock<T> {
    /// One-dimensional block owning `data`.
    pub fn from_vec(data: Vec<T>) -> Self {
        let len = data.len();
        Self {
            storage: Storage::Owned(data),
            shape: vec![len],
            strides: vec![1],
            size: len,
        }
    }

    /// Owned block with the given shape and row-major strides.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidValue` if the length of `data` differs from
    /// the product of `shape`.
    pub fn with_shape(data: Vec<T>, shape: Vec<usize>) -> Result<Self> {
        let strides = strides_c(&shape);
        Self::with_layout(data, shape, strides)
    }

    /// Owned block with explicit shape and strides.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidValue` if the length of `data` differs from
    /// the product of `shape`, or shape and strides do not describe a layout
    /// inside `data`.
    pub fn with_layout(data: Vec<T>, shape: Vec<usize>, strides: Vec<isize>) -> Result<Self> {
        let expected = element_count(&shape);
        if data.len() != expected {
            return Err(MapError::invalid_value(format!(
                "Size of the data (== {}) does not agree with the total number of entries \
                 computed by the shape (== {}).",
                data.len(),
                expected
            )));
        }
        let size = check_layout(data.len(), 0, &shape, &strides)?;
        Ok(Self {
            storage: Storage::Owned(data),
            shape,
            strides,
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    /// Ownership of the storage, `None` once released
    pub fn memory(&self) -> Option<Memory> {
        match self.storage {
            Storage::Owned(_) => Some(Memory::Owned),
            Storage::Borrowed(_) => Some(Memory::Borrowed),
            Storage::Released => None,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self.storage, Storage::Owned(_))
    }

    pub fn is_released(&self) -> bool {
        matches!(self.storage, Storage::Released)
    }

    pub fn is_c_contiguous(&self) -> bool {
        is_c_contiguous(&self.shape, &self.strides)
    }

    pub fn is_fortran_contiguous(&self) -> bool {
        is_fortran_contiguous(&self.shape, &self.strides)
    }

    /// Moves the block out, leaving an empty owned block behind.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Hands the owned storage to the caller.
    ///
    /// Afterwards the block holds nothing and will not free anything.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidState` if the storage is borrowed or has
    /// already been released.
    pub fn release(&mut self) -> Result<Vec<T>> {
        match std::mem::replace(&mut self.storage, Storage::Released) {
            Storage::Owned(data) => {
                debug!(elements = data.len(), "releasing owned data block storage");
                Ok(data)
            }
            Storage::Borrowed(buffer) => {
                self.storage = Storage::Borrowed(buffer);
                Err(MapError::invalid_state(
                    "Cannot release data of a block which only borrows its memory",
                ))
            }
            Storage::Released => Err(MapError::invalid_state(
                "The data of this block has already been released",
            )),
        }
    }

    /// Runs a closure on the block's `size` elements in storage order.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidState` if the storage has been released and
    /// `MapError::StoreBusy` if a borrowed buffer is being written to.
    pub fn with_data<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&[T]) -> R,
    {
        let size = self.size;
        match &self.storage {
            Storage::Owned(data) => Ok(f(head(data, size))),
            Storage::Borrowed(buffer) => buffer.with(|data| f(head(data, size))),
            Storage::Released => Err(released()),
        }
    }

    /// Runs a closure on the elements in storage order with write access.
    ///
    /// # Errors
    ///
    /// Same conditions as [`DataBlock::with_data`].
    pub fn with_data_mut<F, R>(&mut self, f: F) -> Result<R>
    where
        F: FnOnce(&mut [T]) -> R,
    {
        let size = self.size;
        match &mut self.storage {
            Storage::Owned(data) => Ok(f(head_mut(data, size))),
            Storage::Borrowed(buffer) => buffer.with_mut(|data| f(head_mut(data, size))),
            Storage::Released => Err(released()),
        }
    }

    /// A view over the block's memory. Only borrowed blocks can be viewed,
    /// since owned storage is not shareable.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidState` unless the storage is borrowed.
    pub fn view(&self) -> Result<ArrayView<T>> {
        match &self.storage {
            Storage::Borrowed(buffer) => {
                ArrayView::new(buffer, self.shape.clone(), self.strides.clone())
            }
            _ => Err(MapError::invalid_state(
                "Only blocks borrowing their memory can be viewed",
            )),
        }
    }
}

impl<T: Clone> DataBlock<T> {
    /// Block over the first `product(shape)` elements of `buffer`, laid out
    /// row-major.
    ///
    /// With [`Memory::Borrowed`] the block aliases `buffer`; with
    /// [`Memory::Owned`] the elements are copied.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidValue` if `buffer` is too short for `shape`.
    pub fn from_buffer(buffer: &Buffer<T>, shape: Vec<usize>, memory: Memory) -> Result<Self> {
        let strides = strides_c(&shape);
        Self::from_buffer_with_strides(buffer, shape, strides, memory)
    }

    /// Like [`DataBlock::from_buffer`] with explicit strides.
    ///
    /// The strides must address the first `product(shape)` elements only;
    /// anything after them in `buffer` is not part of the block.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidValue` if the layout does not fit into those elements.
    pub fn from_buffer_with_strides(
        buffer: &Buffer<T>,
        shape: Vec<usize>,
        strides: Vec<isize>,
        memory: Memory,
    ) -> Result<Self> {
        let size = element_count(&shape);
        if buffer.len() < size {
            return Err(MapError::invalid_value(format!(
                "Buffer of {} elements is too short for shape {:?}",
                buffer.len(),
                shape
            )));
        }
        check_layout(size, 0, &shape, &strides)?;

        let storage = match memory {
            Memory::Borrowed => Storage::Borrowed(buffer.clone()),
            Memory::Owned => Storage::Owned(buffer.with(|data| data[..size].to_vec())?),
        };
        Ok(Self {
            storage,
            shape,
            strides,
            size,
        })
    }

    /// Copy of this block with the requested ownership.
    ///
    /// An owned source can only produce owned copies.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidState` if the source has been released or a
    /// borrowed copy of owned storage is requested.
    pub fn copy_as(&self, memory: Memory) -> Result<Self> {
        let storage = match (&self.storage, memory) {
            (Storage::Released, _) => return Err(released()),
            (Storage::Borrowed(buffer), Memory::Borrowed) => Storage::Borrowed(buffer.clone()),
            (_, Memory::Owned) => Storage::Owned(self.with_data(|data| data.to_vec())?),
            (Storage::Owned(_), Memory::Borrowed) => {
                return Err(MapError::invalid_state(
                    "Cannot borrow the storage owned by another block",
                ))
            }
        };
        Ok(Self {
            storage,
            shape: self.shape.clone(),
            strides: self.strides.clone(),
            size: self.size,
        })
    }

    /// Element at storage position `i`.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidValue` if `i` is out of range and
    /// `MapError::InvalidState` if the storage has been released.
    pub fn get(&self, i: usize) -> Result<T> {
        if i >= self.size {
            return Err(out_of_range(i, self.size));
        }
        self.with_data(|data| data.get(i).cloned())?
            .ok_or_else(|| out_of_range(i, self.size))
    }

    /// Overwrites the element at storage position `i`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`DataBlock::get`].
    pub fn set(&mut self, i: usize, value: T) -> Result<()> {
        let size = self.size;
        if i >= size {
            return Err(out_of_range(i, size));
        }
        self.with_data_mut(|data| match data.get_mut(i) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(out_of_range(i, size)),
        })?
    }

    /// Copies the elements out in storage order.
    ///
    /// # Errors
    ///
    /// Same conditions as [`DataBlock::with_data`].
    pub fn to_vec(&self) -> Result<Vec<T>> {
        self.with_data(<[T]>::to_vec)
    }
}

impl<T> Default for DataBlock<T> {
    /// An empty, owned, one-dimensional block.
    fn default() -> Self {
        Self::from_vec(Vec::new())
    }
}

impl<T: PartialEq> PartialEq for DataBlock<T> {
    fn eq(&self, other: &Self) -> bool {
        if self.shape != other.shape || self.strides != other.strides {
            return false;
        }
        let compared = self.with_data(|lhs| other.with_data(|rhs| lhs == rhs));
        matches!(compared, Ok(Ok(true)))
    }
}

impl<T> From<Vec<T>> for DataBlock<T> {
    fn from(data: Vec<T>) -> Self {
        Self::from_vec(data)
    }
}

fn head<T>(data: &[T], size: usize) -> &[T] {
    &data[..size.min(data.len())]
}

fn head_mut<T>(data: &mut [T], size: usize) -> &mut [T] {
    let end = size.min(data.len());
    &mut data[..end]
}

fn released() -> MapError {
    MapError::invalid_state("The data of this block has been released")
}

fn out_of_range(i: usize, size: usize) -> MapError {
    MapError::invalid_value(format!(
        "DataBlock index {} is out of range for {} elements",
        i, size
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_strides() {
        assert_eq!(strides_c(&[2, 3, 4]), vec![12, 4, 1]);
        assert_eq!(strides_fortran(&[2, 3, 4]), vec![1, 2, 6]);
        assert!(strides_c(&[]).is_empty());
    }

    #[test]
    fn from_vec_is_one_dimensional() -> Result<()> {
        let block = DataBlock::from_vec(vec![1i64, 2, 3]);
        assert_eq!(block.shape(), &[3]);
        assert_eq!(block.strides(), &[1]);
        assert_eq!(block.memory(), Some(Memory::Owned));
        assert_eq!(block.to_vec()?, vec![1, 2, 3]);
        Ok(())
    }

    #[test]
    fn shape_must_match_data() {
        let result = DataBlock::with_shape(vec![1.0, 2.0, 3.0], vec![2, 2]);
        assert!(matches!(result, Err(MapError::InvalidValue(_))));

        let result = DataBlock::with_layout(vec![1.0; 4], vec![2, 2], vec![2]);
        assert!(matches!(result, Err(MapError::InvalidValue(_))));
    }

    #[test]
    fn layouts_report_contiguity() -> Result<()> {
        let c = DataBlock::with_shape(vec![0.0; 6], vec![2, 3])?;
        assert!(c.is_c_contiguous());
        assert!(!c.is_fortran_contiguous());

        let f = DataBlock::with_layout(vec![0.0; 6], vec![2, 3], strides_fortran(&[2, 3]))?;
        assert!(f.is_fortran_contiguous());
        assert!(!f.is_c_contiguous());
        Ok(())
    }

    #[test]
    fn borrowed_clone_shares_memory() -> Result<()> {
        let buffer = Buffer::new(vec![1.0, 2.0, 3.0, 4.0]);
        let block = DataBlock::from_buffer(&buffer, vec![2, 2], Memory::Borrowed)?;
        let mut copy = block.clone();

        copy.set(0, 10.0)?;
        assert_eq!(block.get(0)?, 10.0);
        assert_eq!(buffer.get(0)?, 10.0);
        Ok(())
    }

    #[test]
    fn owned_clone_is_independent() -> Result<()> {
        let buffer = Buffer::new(vec![1.0, 2.0, 3.0, 4.0]);
        let block = DataBlock::from_buffer(&buffer, vec![4], Memory::Owned)?;
        let mut copy = block.clone();

        copy.set(0, 10.0)?;
        assert_eq!(block.get(0)?, 1.0);
        assert_eq!(buffer.get(0)?, 1.0);
        Ok(())
    }

    #[test]
    fn release_owned_once() -> Result<()> {
        let mut block = DataBlock::from_vec(vec![1i64, 2, 3]);
        assert_eq!(block.release()?, vec![1, 2, 3]);
        assert!(block.is_released());
        assert!(matches!(block.release(), Err(MapError::InvalidState(_))));
        assert!(matches!(block.get(0), Err(MapError::InvalidState(_))));
        Ok(())
    }

    #[test]
    fn release_borrowed_fails() -> Result<()> {
        let buffer = Buffer::new(vec![1i64, 2]);
        let mut block = DataBlock::from_buffer(&buffer, vec![2], Memory::Borrowed)?;
        assert!(matches!(block.release(), Err(MapError::InvalidState(_))));
        assert_eq!(block.memory(), Some(Memory::Borrowed));
        assert_eq!(block.get(1)?, 2);
        Ok(())
    }

    #[test]
    fn take_leaves_empty_husk() -> Result<()> {
        let mut block = DataBlock::from_vec(vec![1.0, 2.0]);
        let moved = block.take();
        assert_eq!(moved.to_vec()?, vec![1.0, 2.0]);
        assert_eq!(block.size(), 0);
        assert!(block.to_vec()?.is_empty());
        Ok(())
    }

    #[test]
    fn copy_as_respects_ownership() -> Result<()> {
        let buffer = Buffer::new(vec![1i64, 2]);
        let borrowed = DataBlock::from_buffer(&buffer, vec![2], Memory::Borrowed)?;
        let owned = borrowed.copy_as(Memory::Owned)?;
        buffer.set(0, 7)?;
        assert_eq!(owned.get(0)?, 1);
        assert_eq!(borrowed.copy_as(Memory::Borrowed)?.get(0)?, 7);
        assert!(owned.copy_as(Memory::Borrowed).is_err());
        Ok(())
    }

    #[test]
    fn borrowed_block_stops_at_its_size() -> Result<()> {
        let buffer = Buffer::new(vec![1i64, 2, 3, 4, 5, 6]);
        let mut block = DataBlock::from_buffer(&buffer, vec![2], Memory::Borrowed)?;
        assert_eq!(block.size(), 2);
        assert_eq!(block.get(1)?, 2);
        assert!(matches!(block.get(5), Err(MapError::InvalidValue(_))));
        assert!(matches!(block.set(2, 0), Err(MapError::InvalidValue(_))));
        assert_eq!(buffer.get(2)?, 3);

        assert_eq!(block.with_data(<[i64]>::len)?, 2);
        assert_eq!(block.with_data_mut(|data| data.len())?, 2);
        assert_eq!(block.to_vec()?, vec![1, 2]);

        let strided =
            DataBlock::from_buffer_with_strides(&buffer, vec![2], vec![4], Memory::Borrowed);
        assert!(matches!(strided, Err(MapError::InvalidValue(_))));
        Ok(())
    }

    #[test]
    fn borrowed_blocks_can_be_viewed() -> Result<()> {
        let buffer = Buffer::new(vec![1i64, 2, 3, 4]);
        let block = DataBlock::from_buffer(&buffer, vec![2, 2], Memory::Borrowed)?;
        let view = block.view()?;
        assert_eq!(view.get(&[1, 0])?, 3);
        assert!(DataBlock::from_vec(vec![1i64]).view().is_err());
        Ok(())
    }
}
