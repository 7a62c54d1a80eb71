use super::{
    check_layout, index_offset, is_c_contiguous, is_fortran_contiguous, linear_offset, Buffer,
    Selector, Slice,
};
use crate::error::{MapError, Result};
use std::any::Any;
use std::fmt;
use std::rc::{Rc, Weak};

/// What kind of object an [`Owner`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerKind {
    /// Nothing known about the owner
    Opaque,
    /// An array object of a host environment
    HostArray,
}

/// Back-reference to whatever object the viewed memory belongs to.
///
/// The reference is weak: holding an `Owner` never keeps the object alive.
#[derive(Clone)]
pub struct Owner {
    kind: OwnerKind,
    handle: Weak<dyn Any>,
}

impl Owner {
    pub fn new<A: Any>(kind: OwnerKind, owner: &Rc<A>) -> Self {
        let handle: Weak<A> = Rc::downgrade(owner);
        Self { kind, handle }
    }

    pub fn kind(&self) -> OwnerKind {
        self.kind
    }

    /// Returns the owner if it is still alive.
    pub fn upgrade(&self) -> Option<Rc<dyn Any>> {
        self.handle.upgrade()
    }

    pub fn is_alive(&self) -> bool {
        self.handle.strong_count() > 0
    }
}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owner")
            .field("kind", &self.kind)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Non-owning, strided view into a [`Buffer`].
///
/// The view addresses element `(i0, i1, ...)` at `offset + i0 * strides[0] +
/// i1 * strides[1] + ...`. Strides are counted in elements and may be negative,
/// in which case `offset` does not point at the first element in memory.
///
/// Cloning a view never copies elements: clones alias the same buffer.
#[derive(Debug, Clone)]
pub struct ArrayView<T> {
    buffer: Buffer<T>,
    offset: usize,
    shape: Vec<usize>,
    strides: Vec<isize>,
    size: usize,
    owner: Option<Owner>,
}

impl<T> ArrayView<T> {
    /// Views `buffer` from its first element with the given shape and strides.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidValue` if shape and strides differ in length or
    /// the layout addresses elements outside the buffer.
    pub fn new(buffer: &Buffer<T>, shape: Vec<usize>, strides: Vec<isize>) -> Result<Self> {
        Self::with_offset(buffer, 0, shape, strides)
    }

    /// Views `buffer` starting at element `offset`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ArrayView::new`].
    pub fn with_offset(
        buffer: &Buffer<T>,
        offset: usize,
        shape: Vec<usize>,
        strides: Vec<isize>,
    ) -> Result<Self> {
        let size = check_layout(buffer.len(), offset, &shape, &strides)?;
        Ok(Self {
            buffer: buffer.clone(),
            offset,
            shape,
            strides,
            size,
            owner: None,
        })
    }

    /// One-dimensional, unit-stride view over the whole buffer.
    pub fn from_buffer(buffer: &Buffer<T>) -> Self {
        let len = buffer.len();
        Self {
            buffer: buffer.clone(),
            offset: 0,
            shape: vec![len],
            strides: vec![1],
            size: len,
            owner: None,
        }
    }

    /// Total number of elements
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

    /// Position in the buffer that index `(0, 0, ...)` maps to
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The viewed memory
    pub fn buffer(&self) -> &Buffer<T> {
        &self.buffer
    }

    pub fn is_c_contiguous(&self) -> bool {
        is_c_contiguous(&self.shape, &self.strides)
    }

    pub fn is_fortran_contiguous(&self) -> bool {
        is_fortran_contiguous(&self.shape, &self.strides)
    }

    pub fn owner(&self) -> Option<&Owner> {
        self.owner.as_ref()
    }

    /// Replaces the owner back-reference.
    pub fn reset_owner(&mut self, owner: Owner) {
        self.owner = Some(owner);
    }

    /// Forgets the owner back-reference.
    pub fn clear_owner(&mut self) {
        self.owner = None;
    }

    /// Builds a new view selecting a part of this one.
    ///
    /// Each selector applies to one axis, starting with the first; axes
    /// without a selector are taken whole. A [`Selector::Index`] removes its
    /// axis from the result, a [`Selector::Slice`] keeps it.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidValue` if there are more selectors than axes,
    /// an index is out of range or a slice is empty or out of range. An axis
    /// of extent zero can only be taken whole.
    pub fn slice(&self, selectors: &[Selector]) -> Result<Self> {
        if selectors.len() > self.ndim() {
            return Err(MapError::invalid_value(format!(
                "Got {} selectors for an array with {} dimensions",
                selectors.len(),
                self.ndim()
            )));
        }

        let mut position = self.offset as isize;
        let mut shape = Vec::with_capacity(self.ndim());
        let mut strides = Vec::with_capacity(self.ndim());
        for (axis, (&extent, &stride)) in self.shape.iter().zip(&self.strides).enumerate() {
            match selectors.get(axis).copied().unwrap_or(Selector::all()) {
                Selector::Index(index) => {
                    if index >= extent {
                        return Err(MapError::invalid_value(format!(
                            "Index {} is out of range for axis {} of extent {}",
                            index, axis, extent
                        )));
                    }
                    position += index as isize * stride;
                }
                // A whole empty axis stays empty
                Selector::Slice(slice) if extent == 0 && slice == Slice::all() => {
                    shape.push(0);
                    strides.push(stride);
                }
                Selector::Slice(slice) => {
                    let (first, _, step) = slice.indices(extent)?;
                    position += first * stride;
                    shape.push(slice.count(extent)?);
                    strides.push(stride * step);
                }
            }
        }

        let size = shape.iter().product();
        Ok(Self {
            buffer: self.buffer.clone(),
            offset: position as usize,
            shape,
            strides,
            size,
            owner: self.owner.clone(),
        })
    }
}

impl<T: Clone> ArrayView<T> {
    /// Element at a full multi-index.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidValue` if the index has the wrong number of
    /// components or is out of range.
    pub fn get(&self, index: &[usize]) -> Result<T> {
        let at = index_offset(self.offset, &self.shape, &self.strides, index)?;
        self.buffer.get(at)
    }

    /// Overwrites the element at a full multi-index.
    ///
    /// # Errors
    ///
    /// Same conditions as [`ArrayView::get`].
    pub fn set(&self, index: &[usize], value: T) -> Result<()> {
        let at = index_offset(self.offset, &self.shape, &self.strides, index)?;
        self.buffer.set(at, value)
    }

    /// Element at position `i` of the row-major enumeration of the view.
    ///
    /// The linear index is unravelled into a multi-index first, so this works
    /// for any strided layout, not just contiguous ones.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidValue` if `i >= self.size()`.
    pub fn get_linear(&self, i: usize) -> Result<T> {
        let at = self.checked_linear(i)?;
        self.buffer.get(at)
    }

    /// Overwrites the element at row-major position `i`.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidValue` if `i >= self.size()`.
    pub fn set_linear(&self, i: usize, value: T) -> Result<()> {
        let at = self.checked_linear(i)?;
        self.buffer.set(at, value)
    }

    /// Copies the viewed elements out in row-major order.
    ///
    /// # Errors
    ///
    /// Returns `MapError::StoreBusy` if the buffer is being written to.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        self.buffer.with(|data| {
            (0..self.size)
                .map(|i| data[linear_offset(self.offset, &self.shape, &self.strides, i)].clone())
                .collect()
        })
    }

    fn checked_linear(&self, i: usize) -> Result<usize> {
        if i >= self.size {
            return Err(MapError::invalid_value(format!(
                "ArrayView index out of range: {}",
                i
            )));
        }
        Ok(linear_offset(self.offset, &self.shape, &self.strides, i))
    }
}

impl<T: PartialEq> PartialEq for ArrayView<T> {
    /// Views are equal if they agree in shape and strides and either point at
    /// the same memory or hold equal elements.
    fn eq(&self, other: &Self) -> bool {
        if self.size != other.size || self.shape != other.shape || self.strides != other.strides {
            return false;
        }
        if self.buffer.ptr_eq(&other.buffer) && self.offset == other.offset {
            return true;
        }

        let compared = self.buffer.with(|lhs| {
            other.buffer.with(|rhs| {
                (0..self.size).all(|i| {
                    let a = linear_offset(self.offset, &self.shape, &self.strides, i);
                    let b = linear_offset(other.offset, &other.shape, &other.strides, i);
                    lhs[a] == rhs[b]
                })
            })
        });
        matches!(compared, Ok(Ok(true)))
    }
}

impl<T> From<&Buffer<T>> for ArrayView<T> {
    fn from(buffer: &Buffer<T>) -> Self {
        Self::from_buffer(buffer)
    }
}
