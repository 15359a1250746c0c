//! # Signatures and Systems
//!
//! A [`Signature`] names a set of components and tags. A [`System`] pairs a
//! signature with per-manager state and an update callback.
//!
//! ```rust
//! use modus_ecs::{Component, Refs, Signature, System, Tag};
//!
//! #[derive(Default)]
//! struct Position(f32);
//! impl Component for Position {}
//!
//! #[derive(Default)]
//! struct Velocity(f32);
//! impl Component for Velocity {}
//!
//! struct Active;
//! impl Tag for Active {}
//!
//! struct Moving;
//! impl Signature for Moving {
//!     type Components = (Position, Velocity);
//!     type Tags = (Active,);
//! }
//!
//! #[derive(Default)]
//! struct Integrate {
//!     dt: f32,
//! }
//!
//! impl System for Integrate {
//!     type Signature = Moving;
//!
//!     fn update(&mut self, _entity: usize, (position, velocity): Refs<'_, Moving>) {
//!         position.0 += velocity.0 * self.dt;
//!     }
//! }
//! ```

use super::component::{ComponentSet, TagSet};
use crate::memory::ColumnSet;

/// A named set of components and tags.
///
/// Membership is unordered for matching purposes. The order of
/// `Components` only fixes the order in which callbacks receive references.
pub trait Signature: 'static {
    /// Required components.
    type Components: ComponentSet;
    /// Required tags.
    type Tags: TagSet;
}

/// References handed to callbacks for one entity matching `S`.
pub type Refs<'a, S> = <<S as Signature>::Components as ColumnSet>::Refs<'a>;

/// Components required by system `X`.
pub type SystemComponents<X> = <<X as System>::Signature as Signature>::Components;

/// A system: a signature plus state kept by each manager.
///
/// The state is created with `Default` when the manager is built. Inputs
/// that change between updates (a time step, say) are written into the
/// state through `Manager::system_mut` before calling `Manager::update`.
pub trait System: Default + 'static {
    /// Entities this system runs on.
    type Signature: Signature;

    /// Called once per matching entity.
    fn update(&mut self, entity: usize, components: Refs<'_, Self::Signature>);
}

/// Callback over one entity, with access to a system's state.
///
/// Implemented for closures taking the state, the entity index and one
/// `&mut` per component of the system's signature:
///
/// ```rust,ignore
/// manager.for_system::<Integrate>(
///     |state: &mut Integrate, _entity: usize, p: &mut Position, v: &mut Velocity| {
///         p.0 += v.0 * state.dt;
///     },
/// )?;
/// ```
pub trait VisitSystem<X, Q: ColumnSet> {
    /// Invokes the callback.
    fn visit(&mut self, system: &mut X, entity: usize, refs: Q::Refs<'_>);
}

impl<Func, X> VisitSystem<X, ()> for Func
where
    Func: FnMut(&mut X, usize),
{
    fn visit(&mut self, system: &mut X, entity: usize, _refs: <() as ColumnSet>::Refs<'_>) {
        (*self)(system, entity);
    }
}

macro_rules! impl_visit_system {
    ($($T:ident $slot:ident),+) => {
        impl<Func, X, $($T: 'static),+> VisitSystem<X, ($($T,)+)> for Func
        where
            Func: FnMut(&mut X, usize, $(&mut $T),+),
        {
            fn visit(
                &mut self,
                system: &mut X,
                entity: usize,
                refs: <($($T,)+) as ColumnSet>::Refs<'_>,
            ) {
                let ($($slot,)+) = refs;
                (*self)(system, entity, $($slot),+);
            }
        }
    };
}

impl_visit_system!(A a);
impl_visit_system!(A a, B b);
impl_visit_system!(A a, B b, C c);
impl_visit_system!(A a, B b, C c, D d);
impl_visit_system!(A a, B b, C c, D d, E e);
impl_visit_system!(A a, B b, C c, D d, E e, G g);
impl_visit_system!(A a, B b, C c, D d, E e, G g, H h);
impl_visit_system!(A a, B b, C c, D d, E e, G g, H h, I i);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::Component;

    #[derive(Default)]
    struct Counter(u32);
    impl Component for Counter {}

    struct Counted;
    impl Signature for Counted {
        type Components = (Counter,);
        type Tags = ();
    }

    #[derive(Default)]
    struct Tick {
        step: u32,
        seen: Vec<usize>,
    }

    impl System for Tick {
        type Signature = Counted;

        fn update(&mut self, entity: usize, (counter,): Refs<'_, Counted>) {
            counter.0 += self.step;
            self.seen.push(entity);
        }
    }

    #[test]
    fn test_system_update_direct() {
        let mut tick = Tick {
            step: 2,
            ..Tick::default()
        };
        let mut counter = Counter(1);
        tick.update(4, (&mut counter,));
        assert_eq!(counter.0, 3);
        assert_eq!(tick.seen, vec![4]);
    }

    #[test]
    fn test_visit_system_closure() {
        let mut tick = Tick::default();
        let mut counter = Counter(0);
        let mut visitor = |state: &mut Tick, entity: usize, counter: &mut Counter| {
            state.seen.push(entity);
            counter.0 = 7;
        };
        VisitSystem::<Tick, (Counter,)>::visit(&mut visitor, &mut tick, 1, (&mut counter,));
        assert_eq!(counter.0, 7);
        assert_eq!(tick.seen, vec![1]);
    }
}
