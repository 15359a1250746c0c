//! # Handles
//!
//! Generational references to entities that survive compaction.
//!
//! Entity indices change whenever [`Manager::apply_changes`] relocates
//! rows. A [`Handle`] instead names a handle slot, which the manager keeps
//! pointed at the entity's current index, plus the slot's generation when
//! the handle was issued. The generation is bumped whenever the slot's
//! occupant dies, so a handle to a dead entity can never resolve to the
//! slot's next occupant.
//!
//! Handles are plain `Copy` values. Every operation takes the manager
//! explicitly and checks both that the handle came from that manager and
//! that its generation is current.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use super::component::{Component, Tag};
use super::manager::Manager;
use super::system::{Signature, System};
use crate::error::EcsResult;

/// Identity of a manager, unique within the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ManagerId(u64);

impl ManagerId {
    /// Allocates a fresh id.
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Per-slot record kept by the manager.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HandleSlot {
    /// Index of the entity this slot currently refers to.
    pub entity: usize,
    /// Live generation of the slot.
    pub generation: u64,
}

/// Generational entity reference.
///
/// ## Memory Layout
///
/// ```text
/// ┌──────────────┬──────────────┬────────────┐
/// │ manager (64) │  slot (64)   │ gen (64)   │
/// └──────────────┴──────────────┴────────────┘
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    pub(crate) manager: ManagerId,
    pub(crate) slot: usize,
    pub(crate) generation: u64,
}

impl Handle {
    /// Manager that issued the handle.
    #[inline]
    #[must_use]
    pub const fn manager_id(&self) -> ManagerId {
        self.manager
    }

    /// Handle slot index.
    #[inline]
    #[must_use]
    pub const fn slot(&self) -> usize {
        self.slot
    }

    /// Generation the handle was issued with.
    #[inline]
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Checks that the handle belongs to `manager` and is not stale.
    #[inline]
    #[must_use]
    pub fn is_valid(&self, manager: &Manager) -> bool {
        manager.resolve(self).is_ok()
    }

    /// Current entity index of the referenced entity.
    ///
    /// # Errors
    ///
    /// [`EcsError::ForeignHandle`](crate::EcsError::ForeignHandle) or
    /// [`EcsError::StaleHandle`](crate::EcsError::StaleHandle).
    #[inline]
    pub fn entity(&self, manager: &Manager) -> EcsResult<usize> {
        manager.resolve(self)
    }

    /// Checks whether the entity is alive (not killed since the last
    /// compaction).
    ///
    /// # Errors
    ///
    /// Same as [`Handle::entity`].
    pub fn is_alive(&self, manager: &Manager) -> EcsResult<bool> {
        manager.is_alive(manager.resolve(self)?)
    }

    /// Flags the entity dead.
    ///
    /// The handle stays valid until the next compaction.
    ///
    /// # Errors
    ///
    /// Same as [`Handle::entity`].
    pub fn kill(&self, manager: &mut Manager) -> EcsResult<()> {
        let entity = manager.resolve(self)?;
        manager.kill(entity)
    }

    /// Adds tag `T`.
    ///
    /// # Errors
    ///
    /// Same as [`Manager::add_tag`], plus stale or foreign handles.
    pub fn add_tag<T: Tag>(&self, manager: &mut Manager) -> EcsResult<()> {
        let entity = manager.resolve(self)?;
        manager.add_tag::<T>(entity)
    }

    /// Removes tag `T`.
    ///
    /// # Errors
    ///
    /// Same as [`Manager::del_tag`], plus stale or foreign handles.
    pub fn del_tag<T: Tag>(&self, manager: &mut Manager) -> EcsResult<()> {
        let entity = manager.resolve(self)?;
        manager.del_tag::<T>(entity)
    }

    /// Checks for tag `T`.
    ///
    /// # Errors
    ///
    /// Same as [`Manager::has_tag`], plus stale or foreign handles.
    pub fn has_tag<T: Tag>(&self, manager: &Manager) -> EcsResult<bool> {
        manager.has_tag::<T>(manager.resolve(self)?)
    }

    /// Adds component `C` with the given value.
    ///
    /// # Errors
    ///
    /// Same as [`Manager::add_component`], plus stale or foreign handles.
    pub fn add_component<'m, C: Component>(
        &self,
        manager: &'m mut Manager,
        value: C,
    ) -> EcsResult<&'m mut C> {
        let entity = manager.resolve(self)?;
        manager.add_component(entity, value)
    }

    /// Adds component `C` with its default value.
    ///
    /// # Errors
    ///
    /// Same as [`Handle::add_component`].
    pub fn add_default_component<'m, C: Component>(
        &self,
        manager: &'m mut Manager,
    ) -> EcsResult<&'m mut C> {
        let entity = manager.resolve(self)?;
        manager.add_default_component::<C>(entity)
    }

    /// Removes component `C`.
    ///
    /// # Errors
    ///
    /// Same as [`Manager::del_component`], plus stale or foreign handles.
    pub fn del_component<C: Component>(&self, manager: &mut Manager) -> EcsResult<()> {
        let entity = manager.resolve(self)?;
        manager.del_component::<C>(entity)
    }

    /// Reads component `C`.
    ///
    /// # Errors
    ///
    /// Same as [`Manager::get_component`], plus stale or foreign handles.
    pub fn get_component<'m, C: Component>(&self, manager: &'m Manager) -> EcsResult<&'m C> {
        manager.get_component::<C>(manager.resolve(self)?)
    }

    /// Mutably borrows component `C`.
    ///
    /// # Errors
    ///
    /// Same as [`Handle::get_component`].
    pub fn get_component_mut<'m, C: Component>(
        &self,
        manager: &'m mut Manager,
    ) -> EcsResult<&'m mut C> {
        let entity = manager.resolve(self)?;
        manager.get_component_mut::<C>(entity)
    }

    /// Checks for component `C`.
    ///
    /// # Errors
    ///
    /// Same as [`Manager::has_component`], plus stale or foreign handles.
    pub fn has_component<C: Component>(&self, manager: &Manager) -> EcsResult<bool> {
        manager.has_component::<C>(manager.resolve(self)?)
    }

    /// Checks the entity against signature `S`.
    ///
    /// # Errors
    ///
    /// Same as [`Manager::matches_signature`], plus stale or foreign handles.
    pub fn matches_signature<S: Signature>(&self, manager: &Manager) -> EcsResult<bool> {
        manager.matches_signature::<S>(manager.resolve(self)?)
    }

    /// Checks the entity against the signature of system `X`.
    ///
    /// # Errors
    ///
    /// Same as [`Manager::matches_system`], plus stale or foreign handles.
    pub fn matches_system<X: System>(&self, manager: &Manager) -> EcsResult<bool> {
        manager.matches_system::<X>(manager.resolve(self)?)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            manager,
            slot,
            generation,
        } = self;
        write!(f, "Handle({}:{slot}v{generation})", manager.0)
    }
}
