use crate::error::{MapError, Result};
use std::fmt;

/// Selection of a range of indices along one axis.
///
/// `start` and `stop` are optional; a missing bound is filled in from the
/// extent of the axis and the sign of `step` when [`Slice::indices`] is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slice {
    start: Option<usize>,
    stop: Option<usize>,
    step: isize,
}

impl Slice {
    /// Selects every element along the axis.
    pub const fn all() -> Self {
        Self {
            start: None,
            stop: None,
            step: 1,
        }
    }

    /// Selects the single element at `index`, keeping the axis.
    pub const fn at(index: usize) -> Self {
        Self {
            start: Some(index),
            stop: Some(index.saturating_add(1)),
            step: 1,
        }
    }

    /// Selects `start..stop` with unit step.
    pub const fn range(start: usize, stop: usize) -> Self {
        Self {
            start: Some(start),
            stop: Some(stop),
            step: 1,
        }
    }

    /// Selects `start..stop` in increments of `step`.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidValue` if `step` is zero.
    pub fn new(start: usize, stop: usize, step: isize) -> Result<Self> {
        Self::with_bounds(Some(start), Some(stop), step)
    }

    /// Like [`Slice::new`], but either bound may be left automatic.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidValue` if `step` is zero.
    pub fn with_bounds(start: Option<usize>, stop: Option<usize>, step: isize) -> Result<Self> {
        if step == 0 {
            return Err(MapError::invalid_value("Step cannot be zero."));
        }
        Ok(Self { start, stop, step })
    }

    pub fn start(&self) -> Option<usize> {
        self.start
    }

    pub fn stop(&self) -> Option<usize> {
        self.stop
    }

    pub fn step(&self) -> isize {
        self.step
    }

    /// Resolves the slice against an axis of extent `len`.
    ///
    /// Returns `(first, past_last, step)`. For negative steps `past_last` may
    /// be `-1`, meaning the range runs down to and including index 0.
    ///
    /// # Errors
    ///
    /// Returns `MapError::InvalidValue` if the range is empty or reaches
    /// beyond `0..len`.
    pub fn indices(&self, len: usize) -> Result<(isize, isize, isize)> {
        let len = to_isize(len)?;
        let past_last = match self.stop {
            Some(stop) => to_isize(stop)?,
            None if self.step > 0 => len,
            None => -1,
        };
        let first = match self.start {
            Some(start) => to_isize(start)?,
            None if self.step > 0 => 0,
            None => len - 1,
        };

        if first >= len || past_last > len {
            return Err(MapError::invalid_value(format!(
                "Slice {} goes beyond the valid index range {{0, {}}}.",
                self, len
            )));
        }
        let empty = if self.step > 0 {
            first >= past_last
        } else {
            first <= past_last
        };
        if empty {
            return Err(MapError::invalid_value(format!("Slice {} is empty.", self)));
        }
        Ok((first, past_last, self.step))
    }

    /// Number of elements selected from an axis of extent `len`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Slice::indices`].
    pub fn count(&self, len: usize) -> Result<usize> {
        let (first, past_last, step) = self.indices(len)?;
        let span = (past_last - first).unsigned_abs();
        let step = step.unsigned_abs();
        Ok(span.div_ceil(step))
    }
}

impl Default for Slice {
    fn default() -> Self {
        Self::all()
    }
}

impl fmt::Display for Slice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn bound(b: Option<usize>) -> String {
            b.map_or_else(|| "Auto".to_string(), |v| v.to_string())
        }
        write!(f, "({}, {}, {})", bound(self.start), bound(self.stop), self.step)
    }
}

fn to_isize(value: usize) -> Result<isize> {
    isize::try_from(value)
        .map_err(|_| MapError::invalid_value(format!("Index {} does not fit into isize", value)))
}

/// Per-axis selector used by [`ArrayView::slice`](crate::ArrayView::slice).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    /// Picks one index and removes the axis from the result
    Index(usize),
    /// Picks a range and keeps the axis
    Slice(Slice),
}

impl Selector {
    /// Selects the whole axis.
    pub const fn all() -> Self {
        Selector::Slice(Slice::all())
    }
}

impl From<usize> for Selector {
    fn from(index: usize) -> Self {
        Selector::Index(index)
    }
}

impl From<Slice> for Selector {
    fn from(slice: Slice) -> Self {
        Selector::Slice(slice)
    }
}
