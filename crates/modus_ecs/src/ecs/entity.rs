//! # Entity Metadata
//!
//! Entities are rows of the manager's metadata batch vector:
//!
//! ```text
//! column:   ALIVE    INDEX            HANDLE          SIGNATURE
//! type:     bool     usize            usize           Bitset
//!           alive?   component row    handle slot     component + tag bits
//! ```
//!
//! Compaction swaps whole metadata rows, so an entity carries its component
//! row and handle slot with it when it moves.

use super::component::{Component, Tag};
use super::handle::Handle;
use super::manager::Manager;
use super::system::{Signature, System};
use crate::error::EcsResult;
use crate::memory::Bitset;

/// Metadata column ids.
pub mod column {
    /// `bool`: entity is alive.
    pub const ALIVE: usize = 0;
    /// `usize`: row of the entity's components.
    pub const INDEX: usize = 1;
    /// `usize`: handle slot owned by the entity.
    pub const HANDLE: usize = 2;
    /// `Bitset`: component and tag bits currently set.
    pub const SIGNATURE: usize = 3;
}

/// Mutable view of one entity during [`Manager::for_entities_mut`].
///
/// Exposes per-entity operations only. Creating entities, compaction and
/// clearing need the manager itself, which stays borrowed for the whole
/// iteration.
#[derive(Debug)]
pub struct EntityMut<'m> {
    manager: &'m mut Manager,
    index: usize,
}

impl<'m> EntityMut<'m> {
    pub(crate) fn new(manager: &'m mut Manager, index: usize) -> Self {
        Self { manager, index }
    }

    /// Entity index.
    #[inline]
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Checks whether the entity is alive.
    ///
    /// # Errors
    ///
    /// See [`Manager::is_alive`].
    pub fn is_alive(&self) -> EcsResult<bool> {
        self.manager.is_alive(self.index)
    }

    /// Flags the entity dead.
    ///
    /// # Errors
    ///
    /// See [`Manager::kill`].
    pub fn kill(&mut self) -> EcsResult<()> {
        self.manager.kill(self.index)
    }

    /// Handle bound to the entity's current generation.
    ///
    /// # Errors
    ///
    /// See [`Manager::get_handle_of`].
    pub fn handle(&self) -> EcsResult<Handle> {
        self.manager.get_handle_of(self.index)
    }

    /// Component and tag bits.
    ///
    /// # Errors
    ///
    /// See [`Manager::signature_of`].
    pub fn signature(&self) -> EcsResult<&Bitset> {
        self.manager.signature_of(self.index)
    }

    /// Adds tag `T`.
    ///
    /// # Errors
    ///
    /// See [`Manager::add_tag`].
    pub fn add_tag<T: Tag>(&mut self) -> EcsResult<()> {
        self.manager.add_tag::<T>(self.index)
    }

    /// Removes tag `T`.
    ///
    /// # Errors
    ///
    /// See [`Manager::del_tag`].
    pub fn del_tag<T: Tag>(&mut self) -> EcsResult<()> {
        self.manager.del_tag::<T>(self.index)
    }

    /// Checks for tag `T`.
    ///
    /// # Errors
    ///
    /// See [`Manager::has_tag`].
    pub fn has_tag<T: Tag>(&self) -> EcsResult<bool> {
        self.manager.has_tag::<T>(self.index)
    }

    /// Adds component `C`.
    ///
    /// # Errors
    ///
    /// See [`Manager::add_component`].
    pub fn add_component<C: Component>(&mut self, value: C) -> EcsResult<&mut C> {
        self.manager.add_component(self.index, value)
    }

    /// Removes component `C`.
    ///
    /// # Errors
    ///
    /// See [`Manager::del_component`].
    pub fn del_component<C: Component>(&mut self) -> EcsResult<()> {
        self.manager.del_component::<C>(self.index)
    }

    /// Reads component `C`.
    ///
    /// # Errors
    ///
    /// See [`Manager::get_component`].
    pub fn get_component<C: Component>(&self) -> EcsResult<&C> {
        self.manager.get_component::<C>(self.index)
    }

    /// Mutably borrows component `C`.
    ///
    /// # Errors
    ///
    /// See [`Manager::get_component_mut`].
    pub fn get_component_mut<C: Component>(&mut self) -> EcsResult<&mut C> {
        self.manager.get_component_mut::<C>(self.index)
    }

    /// Checks for component `C`.
    ///
    /// # Errors
    ///
    /// See [`Manager::has_component`].
    pub fn has_component<C: Component>(&self) -> EcsResult<bool> {
        self.manager.has_component::<C>(self.index)
    }

    /// Checks against signature `S`.
    ///
    /// # Errors
    ///
    /// See [`Manager::matches_signature`].
    pub fn matches_signature<S: Signature>(&self) -> EcsResult<bool> {
        self.manager.matches_signature::<S>(self.index)
    }

    /// Checks against the signature of system `X`.
    ///
    /// # Errors
    ///
    /// See [`Manager::matches_system`].
    pub fn matches_system<X: System>(&self) -> EcsResult<bool> {
        self.manager.matches_system::<X>(self.index)
    }
}
