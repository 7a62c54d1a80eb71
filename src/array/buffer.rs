use crate::error::{MapError, Result};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Externally managed element storage that views and borrowed blocks point into.
///
/// Cloning a `Buffer` clones the handle, not the elements: every clone refers to
/// the same memory, so a write through one is visible through all of them.
pub struct Buffer<T> {
    data: Rc<RefCell<Vec<T>>>,
    // Writers only ever see a slice, so the length is fixed at construction.
    len: usize,
}

impl<T> Buffer<T> {
    /// Wraps a vector into a shareable buffer.
    pub fn new(data: Vec<T>) -> Self {
        let len = data.len();
        Self {
            data: Rc::new(RefCell::new(data)),
            len,
        }
    }

    /// Number of elements in the buffer
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns true if both handles refer to the same memory.
    pub fn ptr_eq(&self, other: &Buffer<T>) -> bool {
        Rc::ptr_eq(&self.data, &other.data)
    }

    /// Runs a closure with read access to the elements.
    ///
    /// # Errors
    ///
    /// Returns `MapError::StoreBusy` if the buffer is being written to.
    pub fn with<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&[T]) -> R,
    {
        let data = self.data.try_borrow().map_err(|_| MapError::StoreBusy)?;
        Ok(f(&data))
    }

    /// Runs a closure with write access to the elements.
    ///
    /// # Errors
    ///
    /// Returns `MapError::StoreBusy` if the buffer is already borrowed.
    pub fn with_mut<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut [T]) -> R,
    {
        let mut data = self.data.try_borrow_mut().map_err(|_| MapError::StoreBusy)?;
        Ok(f(&mut data))
    }
}

impl<T: Clone> Buffer<T> {
    /// Builds a buffer holding a copy of the slice.
    pub fn from_slice(data: &[T]) -> Self {
        Self::new(data.to_vec())
    }

    /// Returns a copy of the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidValue` if the index is out of bounds.
    pub fn get(&self, index: usize) -> Result<T> {
        self.with(|data| data.get(index).cloned())?
            .ok_or_else(|| out_of_bounds(index, self.len()))
    }

    /// Overwrites the element at `index`.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidValue` if the index is out of bounds.
    pub fn set(&self, index: usize, value: T) -> Result<()> {
        let len = self.len();
        self.with_mut(|data| match data.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(out_of_bounds(index, len)),
        })?
    }

    /// Copies the elements out.
    ///
    /// # Panics
    ///
    /// Panics if called from inside a [`Buffer::with_mut`] closure on the same buffer.
    pub fn to_vec(&self) -> Vec<T> {
        self.data.borrow().clone()
    }
}

fn out_of_bounds(index: usize, len: usize) -> MapError {
    MapError::invalid_value(format!(
        "Buffer index {} is out of range for a buffer of {} elements",
        index, len
    ))
}

impl<T> Clone for Buffer<T> {
    fn clone(&self) -> Self {
        Self {
            data: Rc::clone(&self.data),
            len: self.len,
        }
    }
}

impl<T> From<Vec<T>> for Buffer<T> {
    fn from(data: Vec<T>) -> Self {
        Self::new(data)
    }
}

impl<T: fmt::Debug> fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data.try_borrow() {
            Ok(data) => f.debug_tuple("Buffer").field(&*data).finish(),
            Err(_) => f.write_str("Buffer(<borrowed>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_memory() -> Result<()> {
        let buffer = Buffer::new(vec![1i64, 2, 3]);
        let alias = buffer.clone();

        alias.set(1, 20)?;
        assert_eq!(buffer.get(1)?, 20);
        assert!(buffer.ptr_eq(&alias));
        Ok(())
    }

    #[test]
    fn out_of_bounds_access() {
        let buffer = Buffer::new(vec![1.0f64]);
        assert!(matches!(buffer.get(1), Err(MapError::InvalidValue(_))));
        assert!(matches!(buffer.set(3, 0.0), Err(MapError::InvalidValue(_))));
    }

    #[test]
    fn nested_write_is_reported() -> Result<()> {
        let buffer = Buffer::new(vec![1i64, 2]);
        let inner = buffer.with(|_| buffer.with_mut(|data| data[0] = 5))?;
        assert_eq!(inner, Err(MapError::StoreBusy));
        Ok(())
    }
}
