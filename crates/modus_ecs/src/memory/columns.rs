//! # Columns
//!
//! Type-erased growable columns and the tuple traits that address several of
//! them at once.
//!
//! A [`Column`] is a `Vec<T>` seen through an object-safe interface so that a
//! [`BatchVector`](super::BatchVector) can hold columns of different element
//! types side by side. The tuple traits recover static types again:
//!
//! - [`Row`]: one value per column, pushed as a unit.
//! - [`ColumnSet`]: a subset of columns borrowed disjointly, by element type.
//! - [`Visit`]: a callback receiving `&mut` references into one row.

use std::any::{type_name, Any, TypeId};
use std::collections::TryReserveError;

use crate::error::{EcsError, EcsResult};

/// Object-safe view over a single `Vec<T>` column.
///
/// Row-level operations assume the caller has already bounds-checked the
/// positions; they panic on out-of-range input like `Vec` does.
pub trait Column: Any {
    /// Number of rows.
    fn len(&self) -> usize;

    /// Checks if the column has no rows.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rows the column can hold without reallocating.
    fn capacity(&self) -> usize;

    /// `TypeId` of the element type.
    fn element_type(&self) -> TypeId;

    /// Name of the element type.
    fn element_name(&self) -> &'static str;

    /// Reserves space for `additional` more rows.
    ///
    /// # Errors
    ///
    /// Returns the allocator's error if the reservation fails.
    fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError>;

    /// Appends a default-constructed row.
    fn push_default(&mut self);

    /// Removes the last row, if any.
    fn pop_row(&mut self);

    /// Shortens the column to `len` rows.
    fn truncate(&mut self, len: usize);

    /// Swaps two rows.
    fn swap_rows(&mut self, a: usize, b: usize);

    /// Removes a row, shifting later rows down.
    fn remove_row(&mut self, pos: usize);

    /// Overwrites a row with the default value.
    fn reset_row(&mut self, pos: usize);

    /// Grows or shrinks to `len` rows, filling with defaults.
    fn resize_default(&mut self, len: usize);

    /// Removes all rows.
    fn clear(&mut self);

    /// Releases unused capacity.
    fn shrink_to_fit(&mut self);

    /// Mutably borrows one element as `dyn Any`.
    fn row_any_mut(&mut self, pos: usize) -> Option<&mut dyn Any>;

    /// Upcast for downcasting to `Vec<T>`.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to `Vec<T>`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Default + 'static> Column for Vec<T> {
    #[inline]
    fn len(&self) -> usize {
        Vec::len(self)
    }

    #[inline]
    fn capacity(&self) -> usize {
        Vec::capacity(self)
    }

    fn element_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn element_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        Vec::try_reserve(self, additional)
    }

    #[inline]
    fn push_default(&mut self) {
        self.push(T::default());
    }

    fn pop_row(&mut self) {
        self.pop();
    }

    fn truncate(&mut self, len: usize) {
        Vec::truncate(self, len);
    }

    #[inline]
    fn swap_rows(&mut self, a: usize, b: usize) {
        self.swap(a, b);
    }

    fn remove_row(&mut self, pos: usize) {
        self.remove(pos);
    }

    #[inline]
    fn reset_row(&mut self, pos: usize) {
        self[pos] = T::default();
    }

    fn resize_default(&mut self, len: usize) {
        self.resize_with(len, T::default);
    }

    fn clear(&mut self) {
        Vec::clear(self);
    }

    fn shrink_to_fit(&mut self) {
        Vec::shrink_to_fit(self);
    }

    fn row_any_mut(&mut self, pos: usize) -> Option<&mut dyn Any> {
        self.get_mut(pos).map(|value| value as &mut dyn Any)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Checks that column `index` stores elements of type `T`.
///
/// # Errors
///
/// [`EcsError::IndexOutOfRange`] if there is no such column,
/// [`EcsError::ColumnMismatch`] if it holds another type.
pub(crate) fn check_column<T: 'static>(columns: &[Box<dyn Column>], index: usize) -> EcsResult<()> {
    let column = columns.get(index).ok_or(EcsError::IndexOutOfRange {
        index,
        len: columns.len(),
    })?;
    if column.as_any().is::<Vec<T>>() {
        Ok(())
    } else {
        Err(EcsError::ColumnMismatch {
            column: index,
            expected: type_name::<T>(),
            found: column.element_name(),
        })
    }
}

/// Stores `any` in `slot` if the slot is still free and `any` is a `Vec<T>`.
/// Otherwise hands `any` back for the next element type.
fn claim<'a, T: 'static>(
    slot: &mut Option<&'a mut [T]>,
    any: &'a mut dyn Any,
) -> Option<&'a mut dyn Any> {
    if slot.is_none() && any.is::<Vec<T>>() {
        *slot = any.downcast_mut::<Vec<T>>().map(Vec::as_mut_slice);
        None
    } else {
        Some(any)
    }
}

/// One value per column, pushed as a single row.
///
/// Implemented for tuples of up to eight elements; element `k` goes to
/// column `k`.
pub trait Row: 'static {
    /// Number of values in the row.
    const WIDTH: usize;

    /// Checks every column against the row's element types.
    ///
    /// # Errors
    ///
    /// [`EcsError::ColumnMismatch`] for the first column of the wrong type.
    fn check(columns: &[Box<dyn Column>]) -> EcsResult<()>;

    /// Pushes the values. Only called after [`Row::check`] succeeded and
    /// every column has reserved space, so it cannot fail part way.
    fn push_into(self, columns: &mut [Box<dyn Column>]);
}

/// A subset of columns addressed by element type.
///
/// Implemented for `()` and tuples of up to eight distinct element types.
pub trait ColumnSet: 'static {
    /// Disjoint mutable borrows of the selected columns.
    type Columns<'a>
    where
        Self: 'a;

    /// Mutable references into one row of the selected columns.
    type Refs<'a>
    where
        Self: 'a;

    /// Element types, in tuple order.
    fn type_ids() -> Vec<(TypeId, &'static str)>;

    /// Borrows, for each element type in tuple order, the first column of
    /// that type not already claimed by an earlier element.
    ///
    /// Returns `None` if some element finds no such column.
    fn columns(columns: &mut [Box<dyn Column>]) -> Option<Self::Columns<'_>>;

    /// Borrows one row out of previously fetched columns.
    fn row<'c, 'a: 'c>(columns: &'c mut Self::Columns<'a>, row: usize) -> Option<Self::Refs<'c>>;
}

/// Callback over one row of a [`ColumnSet`].
///
/// Implemented for closures taking the row index followed by one `&mut`
/// per element type, in tuple order:
///
/// ```rust,ignore
/// batch.expand::<(f32, u32)>(0, |row: usize, a: &mut f32, b: &mut u32| {
///     *a += *b as f32;
/// })?;
/// ```
pub trait Visit<Q: ColumnSet> {
    /// Invokes the callback.
    fn visit(&mut self, row: usize, refs: Q::Refs<'_>);
}

impl ColumnSet for () {
    type Columns<'a> = () where Self: 'a;
    type Refs<'a> = () where Self: 'a;

    fn type_ids() -> Vec<(TypeId, &'static str)> {
        Vec::new()
    }

    fn columns(_columns: &mut [Box<dyn Column>]) -> Option<Self::Columns<'_>> {
        Some(())
    }

    fn row<'c, 'a: 'c>(_columns: &'c mut Self::Columns<'a>, _row: usize) -> Option<Self::Refs<'c>> {
        Some(())
    }
}

impl<F> Visit<()> for F
where
    F: FnMut(usize),
{
    fn visit(&mut self, row: usize, _refs: <() as ColumnSet>::Refs<'_>) {
        (*self)(row);
    }
}

macro_rules! impl_tuples {
    ($width:literal; $($idx:tt $T:ident $slot:ident),+) => {
        impl<$($T: 'static),+> Row for ($($T,)+) {
            const WIDTH: usize = $width;

            fn check(columns: &[Box<dyn Column>]) -> EcsResult<()> {
                $( check_column::<$T>(columns, $idx)?; )+
                Ok(())
            }

            fn push_into(self, columns: &mut [Box<dyn Column>]) {
                $(
                    if let Some(column) = columns[$idx].as_any_mut().downcast_mut::<Vec<$T>>() {
                        column.push(self.$idx);
                    }
                )+
            }
        }

        impl<$($T: 'static),+> ColumnSet for ($($T,)+) {
            type Columns<'a> = ($(&'a mut [$T],)+) where Self: 'a;
            type Refs<'a> = ($(&'a mut $T,)+) where Self: 'a;

            fn type_ids() -> Vec<(TypeId, &'static str)> {
                vec![$((TypeId::of::<$T>(), type_name::<$T>())),+]
            }

            fn columns(columns: &mut [Box<dyn Column>]) -> Option<Self::Columns<'_>> {
                $( let mut $slot: Option<&mut [$T]> = None; )+
                for column in columns.iter_mut() {
                    let _unclaimed = Some(column.as_any_mut())
                        $(.and_then(|any| claim(&mut $slot, any)))+;
                }
                Some(($($slot?,)+))
            }

            fn row<'c, 'a: 'c>(
                columns: &'c mut Self::Columns<'a>,
                row: usize,
            ) -> Option<Self::Refs<'c>> {
                let ($($slot,)+) = columns;
                Some(($($slot.get_mut(row)?,)+))
            }
        }

        impl<Func, $($T: 'static),+> Visit<($($T,)+)> for Func
        where
            Func: FnMut(usize, $(&mut $T),+),
        {
            fn visit(&mut self, row: usize, refs: <($($T,)+) as ColumnSet>::Refs<'_>) {
                let ($($slot,)+) = refs;
                (*self)(row, $($slot),+);
            }
        }
    };
}

impl_tuples!(1; 0 A a);
impl_tuples!(2; 0 A a, 1 B b);
impl_tuples!(3; 0 A a, 1 B b, 2 C c);
impl_tuples!(4; 0 A a, 1 B b, 2 C c, 3 D d);
impl_tuples!(5; 0 A a, 1 B b, 2 C c, 3 D d, 4 E e);
impl_tuples!(6; 0 A a, 1 B b, 2 C c, 3 D d, 4 E e, 5 G g);
impl_tuples!(7; 0 A a, 1 B b, 2 C c, 3 D d, 4 E e, 5 G g, 6 H h);
impl_tuples!(8; 0 A a, 1 B b, 2 C c, 3 D d, 4 E e, 5 G g, 6 H h, 7 I i);

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<Box<dyn Column>> {
        vec![
            Box::new(vec![1.0f32, 2.0]),
            Box::new(vec![10u32, 20]),
            Box::new(vec![true, false]),
        ]
    }

    #[test]
    fn test_column_row_ops() {
        let mut column: Box<dyn Column> = Box::new(vec![1u8, 2, 3]);
        column.swap_rows(0, 2);
        column.reset_row(1);
        column.push_default();
        let values = column.as_any().downcast_ref::<Vec<u8>>().unwrap();
        assert_eq!(values, &vec![3, 0, 1, 0]);
        assert_eq!(column.element_type(), TypeId::of::<u8>());

        if let Some(value) = column.row_any_mut(0).and_then(|v| v.downcast_mut::<u8>()) {
            *value = 9;
        }
        assert!(column.row_any_mut(4).is_none());
        assert_eq!(column.as_any().downcast_ref::<Vec<u8>>().unwrap()[0], 9);
    }

    #[test]
    fn test_row_check() {
        let columns = columns();
        assert!(<(f32, u32, bool)>::check(&columns).is_ok());
        assert!(matches!(
            <(f32, bool, bool)>::check(&columns),
            Err(EcsError::ColumnMismatch { column: 1, .. })
        ));
    }

    #[test]
    fn test_column_set_disjoint_borrow() {
        let mut columns = columns();
        let mut set = <(u32, f32)>::columns(&mut columns).unwrap();
        let (count, value) = <(u32, f32)>::row(&mut set, 1).unwrap();
        *count += 1;
        *value *= 2.0;
        assert_eq!(set.0, &[10, 21]);
        assert_eq!(set.1, &[1.0, 4.0]);
    }

    #[test]
    fn test_column_set_missing_or_repeated_type() {
        let mut columns = columns();
        assert!(<(u64,)>::columns(&mut columns).is_none());
        assert!(<(u32, u32)>::columns(&mut columns).is_none());
        let mut set = <(u32,)>::columns(&mut columns).unwrap();
        assert!(<(u32,)>::row(&mut set, 2).is_none());
    }

    #[test]
    fn test_visit_closure() {
        let mut columns = columns();
        let mut set = <(f32, bool)>::columns(&mut columns).unwrap();
        let mut seen = Vec::new();
        let mut visitor = |row: usize, value: &mut f32, flag: &mut bool| {
            seen.push((row, *value, *flag));
            *flag = !*flag;
        };
        for row in 0..2 {
            let refs = <(f32, bool)>::row(&mut set, row).unwrap();
            Visit::<(f32, bool)>::visit(&mut visitor, row, refs);
        }
        assert_eq!(seen, vec![(0, 1.0, true), (1, 2.0, false)]);
    }
}
