//! # Components and Tags
//!
//! Components are plain data stored one column per type. Tags are zero-size
//! markers that only occupy a signature bit.

use std::any::{type_name, TypeId};

use crate::memory::ColumnSet;

/// Marker trait for ECS components.
///
/// Components must be:
/// - `Default`: slots are pre-constructed when storage grows, and a removed
///   component's slot is reset to the default value
/// - `'static`: columns are type-erased and recovered by `TypeId`
///
/// # Example
///
/// ```rust
/// use modus_ecs::Component;
///
/// #[derive(Clone, Copy, Debug, Default, PartialEq)]
/// struct Position {
///     x: f32,
///     y: f32,
/// }
///
/// impl Component for Position {}
/// ```
pub trait Component: Default + 'static {}

/// Marker trait for ECS tags.
///
/// A tag has no storage; adding it to an entity only sets a bit.
pub trait Tag: 'static {}

/// A tuple of component types.
///
/// Implemented for `()` and tuples of up to eight components. The tuple
/// order is the order in which callbacks receive the references.
pub trait ComponentSet: ColumnSet {}

/// A tuple of tag types.
///
/// Implemented for `()` and tuples of up to eight tags.
pub trait TagSet: 'static {
    /// Tag types, in tuple order.
    fn tag_ids() -> Vec<(TypeId, &'static str)>;
}

impl ComponentSet for () {}

impl TagSet for () {
    fn tag_ids() -> Vec<(TypeId, &'static str)> {
        Vec::new()
    }
}

macro_rules! impl_sets {
    ($($T:ident),+) => {
        impl<$($T: Component),+> ComponentSet for ($($T,)+) {}

        impl<$($T: Tag),+> TagSet for ($($T,)+) {
            fn tag_ids() -> Vec<(TypeId, &'static str)> {
                vec![$((TypeId::of::<$T>(), type_name::<$T>())),+]
            }
        }
    };
}

impl_sets!(A);
impl_sets!(A, B);
impl_sets!(A, B, C);
impl_sets!(A, B, C, D);
impl_sets!(A, B, C, D, E);
impl_sets!(A, B, C, D, E, G);
impl_sets!(A, B, C, D, E, G, H);
impl_sets!(A, B, C, D, E, G, H, I);
