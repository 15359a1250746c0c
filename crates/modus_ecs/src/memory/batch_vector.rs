//! # Batch Vector
//!
//! N parallel growable columns that always have the same length.
//!
//! ```text
//! column 0 (bool):   [a0, a1, a2, a3]
//! column 1 (usize):  [i0, i1, i2, i3]   <- one logical row = same index
//! column 2 (Bitset): [b0, b1, b2, b3]      across every column
//! ```
//!
//! Every operation that changes the length applies to all columns or to
//! none of them:
//!
//! - [`BatchVector::push_back`] reserves in every column before writing
//!   anything, so a type mismatch or allocation failure leaves no trace.
//! - [`BatchVector::push_default`] and [`BatchVector::resize`] run user
//!   `Default` impls; a panic part way rolls the already extended columns
//!   back before unwinding continues.
//!
//! Access is by `(column, row)` index or by element type. Indices stay valid
//! across growth; references do not, and the borrow checker enforces that.

use std::any::{type_name, Any};
use std::fmt;

use super::columns::{check_column, Column, ColumnSet, Row, Visit};
use crate::error::{EcsError, EcsResult};

/// Truncates every column back to `len` unless committed.
struct Rollback<'a> {
    columns: &'a mut [Box<dyn Column>],
    len: usize,
    committed: bool,
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if !self.committed {
            for column in self.columns.iter_mut() {
                column.truncate(self.len);
            }
        }
    }
}

/// Structure-of-arrays container with lockstep column lengths.
///
/// # Example
///
/// ```rust
/// use modus_ecs::memory::BatchVector;
///
/// let mut batch = BatchVector::new().with_column::<u32>().with_column::<f32>();
/// batch.push_back((7u32, 0.5f32)).unwrap();
/// batch.push_back((9u32, 1.5f32)).unwrap();
///
/// batch.swap(0, 1).unwrap();
/// assert_eq!(*batch.at::<u32>(0, 0).unwrap(), 9);
/// assert_eq!(*batch.at::<f32>(1, 0).unwrap(), 1.5);
/// ```
#[derive(Default)]
pub struct BatchVector {
    columns: Vec<Box<dyn Column>>,
    len: usize,
}

impl BatchVector {
    /// Creates an empty batch vector with no columns.
    #[must_use]
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            len: 0,
        }
    }

    /// Adds a column of `T`, returning `self` for chaining.
    #[must_use]
    pub fn with_column<T: Default + 'static>(mut self) -> Self {
        self.add_column::<T>();
        self
    }

    /// Adds a column of `T` filled with defaults up to the current length.
    ///
    /// # Returns
    ///
    /// The new column's index.
    pub fn add_column<T: Default + 'static>(&mut self) -> usize {
        let mut column: Vec<T> = Vec::with_capacity(self.len);
        column.resize_with(self.len, T::default);
        self.columns.push(Box::new(column));
        self.columns.len() - 1
    }

    /// Adds an already boxed column, filled with defaults up to the current
    /// length.
    pub(crate) fn add_boxed_column(&mut self, mut column: Box<dyn Column>) -> usize {
        column.clear();
        column.resize_default(self.len);
        self.columns.push(column);
        self.columns.len() - 1
    }

    /// Number of rows.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Checks if there are no rows.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of columns.
    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Rows every column can hold without reallocating.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.columns.iter().map(|c| c.capacity()).min().unwrap_or(0)
    }

    /// Element type name of each column.
    pub fn column_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.columns.iter().map(|c| c.element_name())
    }

    #[inline]
    fn debug_check_lengths(&self) {
        debug_assert!(
            self.columns.iter().all(|c| c.len() == self.len),
            "batch vector columns out of sync"
        );
    }

    #[inline]
    fn check_row(&self, pos: usize) -> EcsResult<()> {
        if pos < self.len {
            Ok(())
        } else {
            Err(EcsError::IndexOutOfRange {
                index: pos,
                len: self.len,
            })
        }
    }

    fn reserve_all(&mut self, additional: usize) -> EcsResult<()> {
        for column in &mut self.columns {
            column.try_reserve(additional)?;
        }
        Ok(())
    }

    /// Appends one row, one value per column.
    ///
    /// # Errors
    ///
    /// - [`EcsError::WidthMismatch`] if the row arity differs from the width
    /// - [`EcsError::ColumnMismatch`] if a value has the wrong type
    /// - [`EcsError::Allocation`] if a column cannot grow
    ///
    /// In every error case no column has been modified.
    pub fn push_back<R: Row>(&mut self, row: R) -> EcsResult<()> {
        if R::WIDTH != self.columns.len() {
            return Err(EcsError::WidthMismatch {
                expected: self.columns.len(),
                found: R::WIDTH,
            });
        }
        R::check(&self.columns)?;
        self.reserve_all(1)?;

        row.push_into(&mut self.columns);
        self.len += 1;
        self.debug_check_lengths();
        Ok(())
    }

    /// Appends one default-constructed row.
    ///
    /// # Errors
    ///
    /// [`EcsError::Allocation`] if a column cannot grow; nothing is appended.
    pub fn push_default(&mut self) -> EcsResult<()> {
        self.reserve_all(1)?;

        let mut guard = Rollback {
            columns: &mut self.columns,
            len: self.len,
            committed: false,
        };
        for column in guard.columns.iter_mut() {
            column.push_default();
        }
        guard.committed = true;
        drop(guard);

        self.len += 1;
        self.debug_check_lengths();
        Ok(())
    }

    /// Removes the last row.
    ///
    /// # Returns
    ///
    /// `false` if the batch was already empty.
    pub fn pop_back(&mut self) -> bool {
        if self.len == 0 {
            return false;
        }
        for column in &mut self.columns {
            column.pop_row();
        }
        self.len -= 1;
        true
    }

    /// Borrows a whole column.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] or [`EcsError::ColumnMismatch`].
    pub fn column<T: 'static>(&self, column: usize) -> EcsResult<&[T]> {
        check_column::<T>(&self.columns, column)?;
        self.columns[column]
            .as_any()
            .downcast_ref::<Vec<T>>()
            .map(Vec::as_slice)
            .ok_or(EcsError::ColumnMismatch {
                column,
                expected: type_name::<T>(),
                found: self.columns[column].element_name(),
            })
    }

    /// Mutably borrows a whole column.
    ///
    /// The slice cannot change length, so the columns stay in sync.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] or [`EcsError::ColumnMismatch`].
    pub fn column_mut<T: 'static>(&mut self, column: usize) -> EcsResult<&mut [T]> {
        check_column::<T>(&self.columns, column)?;
        let found = self.columns[column].element_name();
        self.columns[column]
            .as_any_mut()
            .downcast_mut::<Vec<T>>()
            .map(Vec::as_mut_slice)
            .ok_or(EcsError::ColumnMismatch {
                column,
                expected: type_name::<T>(),
                found,
            })
    }

    /// Index of the first column storing `T`.
    #[must_use]
    pub fn index_of<T: 'static>(&self) -> Option<usize> {
        self.columns.iter().position(|c| c.as_any().is::<Vec<T>>())
    }

    /// Reads one element by column index.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] for a bad row or column,
    /// [`EcsError::ColumnMismatch`] for the wrong type.
    #[inline]
    pub fn at<T: 'static>(&self, column: usize, pos: usize) -> EcsResult<&T> {
        self.check_row(pos)?;
        Ok(&self.column::<T>(column)?[pos])
    }

    /// Mutably borrows one element by column index.
    ///
    /// # Errors
    ///
    /// Same as [`BatchVector::at`].
    #[inline]
    pub fn at_mut<T: 'static>(&mut self, column: usize, pos: usize) -> EcsResult<&mut T> {
        self.check_row(pos)?;
        Ok(&mut self.column_mut::<T>(column)?[pos])
    }

    /// Mutably borrows one element without naming its type.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] for a bad row or column.
    pub fn at_any_mut(&mut self, column: usize, pos: usize) -> EcsResult<&mut dyn Any> {
        self.check_row(pos)?;
        let width = self.columns.len();
        self.columns
            .get_mut(column)
            .and_then(|c| c.row_any_mut(pos))
            .ok_or(EcsError::IndexOutOfRange {
                index: column,
                len: width,
            })
    }

    fn column_of<T: 'static>(&self) -> EcsResult<usize> {
        self.index_of::<T>().ok_or(EcsError::ColumnMismatch {
            column: self.columns.len(),
            expected: type_name::<T>(),
            found: "no such column",
        })
    }

    /// Reads one element from the first column storing `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] for a bad row,
    /// [`EcsError::ColumnMismatch`] if no column stores `T`.
    pub fn get<T: 'static>(&self, pos: usize) -> EcsResult<&T> {
        let column = self.column_of::<T>()?;
        self.at(column, pos)
    }

    /// Mutably borrows one element from the first column storing `T`.
    ///
    /// # Errors
    ///
    /// Same as [`BatchVector::get`].
    pub fn get_mut<T: 'static>(&mut self, pos: usize) -> EcsResult<&mut T> {
        let column = self.column_of::<T>()?;
        self.at_mut(column, pos)
    }

    /// Finds the first row whose value in `column` equals `value`.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] or [`EcsError::ColumnMismatch`].
    pub fn find<T: PartialEq + 'static>(
        &self,
        column: usize,
        value: &T,
    ) -> EcsResult<Option<usize>> {
        Ok(self.column::<T>(column)?.iter().position(|v| v == value))
    }

    /// Checks whether any row's value in `column` equals `value`.
    ///
    /// # Errors
    ///
    /// Same as [`BatchVector::find`].
    pub fn contains<T: PartialEq + 'static>(&self, column: usize, value: &T) -> EcsResult<bool> {
        Ok(self.find(column, value)?.is_some())
    }

    /// Swaps row `a` with row `b` in every column.
    ///
    /// Both positions are validated before any column is touched.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] if either position is invalid.
    pub fn swap(&mut self, a: usize, b: usize) -> EcsResult<()> {
        self.check_row(a)?;
        self.check_row(b)?;
        if a != b {
            for column in &mut self.columns {
                column.swap_rows(a, b);
            }
        }
        Ok(())
    }

    /// Removes a row, shifting later rows down.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] if `pos` is invalid.
    pub fn erase(&mut self, pos: usize) -> EcsResult<()> {
        self.check_row(pos)?;
        for column in &mut self.columns {
            column.remove_row(pos);
        }
        self.len -= 1;
        self.debug_check_lengths();
        Ok(())
    }

    /// Overwrites a row with default values.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] if `pos` is invalid.
    pub fn reset_row(&mut self, pos: usize) -> EcsResult<()> {
        self.check_row(pos)?;
        for column in &mut self.columns {
            column.reset_row(pos);
        }
        Ok(())
    }

    /// Grows (with defaults) or shrinks every column to `len` rows.
    ///
    /// # Errors
    ///
    /// [`EcsError::Allocation`] if a column cannot grow; nothing changes.
    pub fn resize(&mut self, len: usize) -> EcsResult<()> {
        if len <= self.len {
            for column in &mut self.columns {
                column.truncate(len);
            }
        } else {
            self.reserve_all(len - self.len)?;

            let mut guard = Rollback {
                columns: &mut self.columns,
                len: self.len,
                committed: false,
            };
            for column in guard.columns.iter_mut() {
                column.resize_default(len);
            }
            guard.committed = true;
        }

        self.len = len;
        self.debug_check_lengths();
        Ok(())
    }

    /// Reserves room for `additional` rows in every column.
    ///
    /// # Errors
    ///
    /// [`EcsError::Allocation`] if a column cannot grow.
    pub fn reserve(&mut self, additional: usize) -> EcsResult<()> {
        self.reserve_all(additional)
    }

    /// Removes every row, keeping the columns.
    pub fn clear(&mut self) {
        for column in &mut self.columns {
            column.clear();
        }
        self.len = 0;
    }

    /// Releases unused capacity in every column.
    pub fn shrink_to_fit(&mut self) {
        for column in &mut self.columns {
            column.shrink_to_fit();
        }
    }

    /// Borrows the columns selected by `Q` disjointly.
    ///
    /// Used to fetch columns once and then index many rows.
    pub fn columns_of<Q: ColumnSet>(&mut self) -> Option<Q::Columns<'_>> {
        Q::columns(&mut self.columns)
    }

    /// Invokes `visitor` with mutable references to the `Q` columns at `pos`.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] for a bad row,
    /// [`EcsError::ColumnMismatch`] if a type in `Q` has no column.
    pub fn expand<Q: ColumnSet>(
        &mut self,
        pos: usize,
        mut visitor: impl Visit<Q>,
    ) -> EcsResult<()> {
        self.check_row(pos)?;
        let missing = EcsError::ColumnMismatch {
            column: self.columns.len(),
            expected: type_name::<Q>(),
            found: "no such column",
        };
        let mut columns = Q::columns(&mut self.columns).ok_or(missing.clone())?;
        let refs = Q::row(&mut columns, pos).ok_or(missing)?;
        visitor.visit(pos, refs);
        Ok(())
    }
}

impl fmt::Debug for BatchVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchVector")
            .field("len", &self.len)
            .field("columns", &self.column_types().collect::<Vec<_>>())
            .finish()
    }
}
