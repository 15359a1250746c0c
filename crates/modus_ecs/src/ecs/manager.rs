//! # Manager
//!
//! Owns every entity of one pool: metadata, component values, handle slots
//! and system state.
//!
//! ## Entity ranges
//!
//! ```text
//! 0            size          size_next          capacity
//! ├─ committed ──┼── pending ────┼──── unused ──────┤
//! ```
//!
//! - `[0, size)`: committed entities, visited by every iteration.
//! - `[size, size_next)`: created (or still dead-flagged) since the last
//!   [`Manager::apply_changes`]; addressable by index but not iterated.
//! - `[size_next, capacity)`: pre-constructed slots ready for reuse.
//!
//! ## Compaction
//!
//! Killing only clears the alive flag. [`Manager::apply_changes`] then
//! partitions `[0, size_next)` in place: alive rows to the front, dead rows
//! to the tail. Only metadata rows move; each row carries its component row
//! index and handle slot, so component values never move and handles are
//! rebound through the row's own slot index.

use std::any::{type_name, Any};
use std::sync::Arc;

use super::component::{Component, Tag};
use super::entity::{column, EntityMut};
use super::handle::{Handle, HandleSlot, ManagerId};
use super::registry::Registry;
use super::system::{Signature, System, SystemComponents, VisitSystem};
use crate::config::{EcsConfig, GrowthOptions};
use crate::error::{EcsError, EcsResult};
use crate::memory::{BatchVector, Bitset, ColumnSet, Visit};

/// Unwraps access to a metadata column whose layout the manager fixed
/// itself. Failure means the storage is corrupted.
#[track_caller]
fn intact<T>(result: EcsResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("entity storage corrupted: {err}"),
    }
}

/// `(entity, component row)` of every committed entity matching `bits`.
fn matching(
    entities: &BatchVector,
    size: usize,
    bits: Bitset,
) -> impl Iterator<Item = (usize, usize)> + '_ {
    let signatures = intact(entities.column::<Bitset>(column::SIGNATURE));
    let rows = intact(entities.column::<usize>(column::INDEX));
    signatures[..size]
        .iter()
        .zip(rows)
        .enumerate()
        .filter(move |(_, (signature, _))| signature.contains(&bits))
        .map(|(entity, (_, row))| (entity, *row))
}

/// Entity storage and dispatch for one registry.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use modus_ecs::{Component, Manager, RegistryBuilder, Signature};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Health(u32);
/// impl Component for Health {}
///
/// struct Living;
/// impl Signature for Living {
///     type Components = (Health,);
///     type Tags = ();
/// }
///
/// let registry = RegistryBuilder::new()
///     .component::<Health>()
///     .signature::<Living>()
///     .build()
///     .unwrap();
/// let mut manager = Manager::new(Arc::new(registry));
///
/// let handle = manager.create_handle().unwrap();
/// handle.add_component(&mut manager, Health(10)).unwrap();
/// manager.apply_changes();
///
/// manager
///     .for_matching::<Living>(|_entity: usize, health: &mut Health| health.0 -= 1)
///     .unwrap();
/// assert_eq!(handle.get_component::<Health>(&manager).unwrap(), &Health(9));
/// ```
#[derive(Debug)]
pub struct Manager {
    id: ManagerId,
    registry: Arc<Registry>,
    growth: GrowthOptions,
    capacity: usize,
    size: usize,
    size_next: usize,
    entities: BatchVector,
    components: BatchVector,
    handles: Vec<HandleSlot>,
    systems: Vec<Box<dyn Any>>,
}

impl Manager {
    /// Creates an empty manager. No storage is allocated until the first
    /// entity is created.
    #[must_use]
    pub fn new(registry: Arc<Registry>) -> Self {
        let mut components = BatchVector::new();
        for column in registry.make_columns() {
            components.add_boxed_column(column);
        }
        let entities = BatchVector::new()
            .with_column::<bool>()
            .with_column::<usize>()
            .with_column::<usize>()
            .with_column::<Bitset>();

        Self {
            id: ManagerId::next(),
            growth: *registry.growth(),
            capacity: 0,
            size: 0,
            size_next: 0,
            entities,
            components,
            handles: Vec::new(),
            systems: registry.make_states(),
            registry,
        }
    }

    /// Creates a manager with `capacity` slots allocated up front.
    ///
    /// # Errors
    ///
    /// [`EcsError::Allocation`] if the storage cannot be allocated.
    pub fn with_capacity(registry: Arc<Registry>, capacity: usize) -> EcsResult<Self> {
        let mut manager = Self::new(registry);
        manager.grow_to(capacity)?;
        Ok(manager)
    }

    /// Creates a manager from a loaded configuration. The configured growth
    /// policy replaces the registry's.
    ///
    /// # Errors
    ///
    /// [`EcsError::InvalidGrowth`] for unusable growth options,
    /// [`EcsError::Allocation`] if the initial storage cannot be allocated.
    pub fn with_config(registry: Arc<Registry>, config: &EcsConfig) -> EcsResult<Self> {
        config.growth.validate()?;
        let mut manager = Self::new(registry);
        manager.growth = config.growth;
        manager.grow_to(config.initial_capacity)?;
        Ok(manager)
    }

    /// Identity used to reject handles from other managers.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ManagerId {
        self.id
    }

    /// The registry this manager was built from.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Growth policy in effect.
    #[inline]
    #[must_use]
    pub const fn growth(&self) -> &GrowthOptions {
        &self.growth
    }

    /// Number of allocated slots.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of committed entities.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Number of committed plus pending entities.
    #[inline]
    #[must_use]
    pub const fn size_next(&self) -> usize {
        self.size_next
    }

    /// Entity metadata, one row per slot. See [`column`] for the layout.
    #[inline]
    #[must_use]
    pub const fn entities(&self) -> &BatchVector {
        &self.entities
    }

    /// Component values, one column per component id.
    #[inline]
    #[must_use]
    pub const fn components(&self) -> &BatchVector {
        &self.components
    }

    /// Handle slot records.
    #[inline]
    #[must_use]
    pub fn handles(&self) -> &[HandleSlot] {
        &self.handles
    }

    /// Number of entities in `[0, size_next)` not flagged dead.
    #[must_use]
    pub fn alive_count(&self) -> usize {
        intact(self.entities.column::<bool>(column::ALIVE))[..self.size_next]
            .iter()
            .filter(|alive| **alive)
            .count()
    }

    /// Grows every storage to `capacity` slots. Never shrinks.
    ///
    /// New slots are default-constructed and own the handle slot with the
    /// same index.
    ///
    /// # Errors
    ///
    /// [`EcsError::Allocation`] if any storage cannot grow; in that case
    /// nothing has been resized.
    pub fn grow_to(&mut self, capacity: usize) -> EcsResult<()> {
        let old = self.capacity;
        if capacity <= old {
            return Ok(());
        }
        let additional = capacity - old;
        self.entities.reserve(additional)?;
        self.components.reserve(additional)?;
        self.handles.try_reserve(additional)?;

        self.components.resize(capacity)?;
        for slot in old..capacity {
            self.entities.push_back((false, slot, slot, Bitset::EMPTY))?;
            self.handles.push(HandleSlot {
                entity: slot,
                generation: 0,
            });
        }
        self.capacity = capacity;

        tracing::debug!(
            manager = self.id.raw(),
            from = old,
            to = capacity,
            "manager grew"
        );
        Ok(())
    }

    #[inline]
    fn check_index(&self, entity: usize) -> EcsResult<()> {
        if entity < self.size_next {
            Ok(())
        } else {
            Err(EcsError::IndexOutOfRange {
                index: entity,
                len: self.size_next,
            })
        }
    }

    #[inline]
    fn component_row(&self, entity: usize) -> usize {
        *intact(self.entities.at::<usize>(column::INDEX, entity))
    }

    #[inline]
    fn handle_slot(&self, entity: usize) -> usize {
        *intact(self.entities.at::<usize>(column::HANDLE, entity))
    }

    #[inline]
    fn bits(&self, entity: usize) -> &Bitset {
        intact(self.entities.at::<Bitset>(column::SIGNATURE, entity))
    }

    #[inline]
    fn bits_mut(&mut self, entity: usize) -> &mut Bitset {
        intact(self.entities.at_mut::<Bitset>(column::SIGNATURE, entity))
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Creates an entity in the pending range.
    ///
    /// Grows the storage by the growth policy if every slot is in use.
    ///
    /// # Returns
    ///
    /// The new entity's index. It is not visited by iteration until the
    /// next [`Manager::apply_changes`].
    ///
    /// # Errors
    ///
    /// [`EcsError::Allocation`] if growth fails.
    pub fn new_entity(&mut self) -> EcsResult<usize> {
        if self.size_next >= self.capacity {
            let capacity = self.growth.calc_growth(self.capacity);
            self.grow_to(capacity)?;
        }

        let entity = self.size_next;
        *intact(self.entities.at_mut::<bool>(column::ALIVE, entity)) = true;
        intact(self.entities.at_mut::<Bitset>(column::SIGNATURE, entity)).reset();
        self.size_next += 1;
        Ok(entity)
    }

    /// Creates an entity and returns a handle to it.
    ///
    /// # Errors
    ///
    /// Same as [`Manager::new_entity`].
    pub fn create_handle(&mut self) -> EcsResult<Handle> {
        let entity = self.new_entity()?;
        self.get_handle_of(entity)
    }

    /// Handle bound to an existing entity's current generation.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] unless `entity < size_next`.
    pub fn get_handle_of(&self, entity: usize) -> EcsResult<Handle> {
        self.check_index(entity)?;
        let slot = self.handle_slot(entity);
        let record = self.handles[slot];
        debug_assert_eq!(record.entity, entity, "handle slot out of sync");
        Ok(Handle {
            manager: self.id,
            slot,
            generation: record.generation,
        })
    }

    /// Resolves a handle to its entity's current index.
    ///
    /// # Errors
    ///
    /// [`EcsError::ForeignHandle`] if another manager issued the handle,
    /// [`EcsError::StaleHandle`] if its entity has died since.
    pub fn resolve(&self, handle: &Handle) -> EcsResult<usize> {
        if handle.manager != self.id {
            return Err(EcsError::ForeignHandle);
        }
        match self.handles.get(handle.slot) {
            Some(record) if record.generation == handle.generation => Ok(record.entity),
            _ => Err(EcsError::StaleHandle {
                slot: handle.slot,
                generation: handle.generation,
            }),
        }
    }

    /// Checks whether an entity is alive.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] unless `entity < size_next`.
    pub fn is_alive(&self, entity: usize) -> EcsResult<bool> {
        self.check_index(entity)?;
        Ok(*intact(self.entities.at::<bool>(column::ALIVE, entity)))
    }

    /// Flags an entity dead. Storage is reclaimed by the next
    /// [`Manager::apply_changes`]; killing twice is the same as once.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] unless `entity < size_next`.
    pub fn kill(&mut self, entity: usize) -> EcsResult<()> {
        self.check_index(entity)?;
        *intact(self.entities.at_mut::<bool>(column::ALIVE, entity)) = false;
        Ok(())
    }

    /// Commits pending entities and reclaims dead ones.
    ///
    /// Partitions `[0, size_next)` so that alive entities come first, then
    /// sets `size == size_next == alive count`. For each relocated alive
    /// entity its handle slot is pointed at the new index. Every entity left
    /// in the dead tail has its handle generation bumped, its signature
    /// cleared and its component row reset to defaults.
    ///
    /// Entity indices taken before this call are meaningless afterwards;
    /// handles stay valid for survivors.
    ///
    /// ## Performance
    ///
    /// O(`size_next`), no allocation.
    pub fn apply_changes(&mut self) {
        let old_size_next = self.size_next;
        let mut relocated = 0usize;

        // [0, left) alive, [right, old_size_next) dead.
        let mut left = 0;
        let mut right = old_size_next;
        loop {
            {
                let alive = intact(self.entities.column::<bool>(column::ALIVE));
                while left < right && alive[left] {
                    left += 1;
                }
                while left < right && !alive[right - 1] {
                    right -= 1;
                }
            }
            if left >= right {
                break;
            }

            let from = right - 1;
            intact(self.entities.swap(left, from));
            let slot = self.handle_slot(left);
            self.handles[slot].entity = left;
            tracing::trace!(from, to = left, "relocated entity");

            relocated += 1;
            left += 1;
            right -= 1;
        }
        let new_size = left;

        for entity in new_size..old_size_next {
            let slot = self.handle_slot(entity);
            let row = self.component_row(entity);
            let record = &mut self.handles[slot];
            record.entity = entity;
            record.generation = record.generation.saturating_add(1);
            self.bits_mut(entity).reset();
            intact(self.components.reset_row(row));
        }

        self.size = new_size;
        self.size_next = new_size;

        tracing::debug!(
            manager = self.id.raw(),
            killed = old_size_next - new_size,
            relocated,
            size = new_size,
            "applied changes"
        );
    }

    /// Kills every entity and invalidates every handle issued so far.
    ///
    /// Keeps the allocated capacity.
    pub fn clear(&mut self) {
        intact(self.entities.column_mut::<bool>(column::ALIVE)).fill(false);
        intact(self.entities.column_mut::<Bitset>(column::SIGNATURE)).fill(Bitset::EMPTY);
        for (slot, row) in intact(self.entities.column_mut::<usize>(column::INDEX))
            .iter_mut()
            .enumerate()
        {
            *row = slot;
        }
        for (slot, handle) in intact(self.entities.column_mut::<usize>(column::HANDLE))
            .iter_mut()
            .enumerate()
        {
            *handle = slot;
        }
        for (slot, record) in self.handles.iter_mut().enumerate() {
            record.entity = slot;
            record.generation = record.generation.saturating_add(1);
        }
        for row in 0..self.capacity {
            intact(self.components.reset_row(row));
        }

        tracing::debug!(
            manager = self.id.raw(),
            dropped = self.size_next,
            "manager cleared"
        );
        self.size = 0;
        self.size_next = 0;
    }

    // =========================================================================
    // Tags and components
    // =========================================================================

    /// Adds tag `T` to an entity.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] or [`EcsError::UnregisteredTag`].
    pub fn add_tag<T: Tag>(&mut self, entity: usize) -> EcsResult<()> {
        self.check_index(entity)?;
        let bit = self.registry.tag_bit::<T>()?;
        self.bits_mut(entity).set(bit);
        Ok(())
    }

    /// Removes tag `T` from an entity.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] or [`EcsError::UnregisteredTag`].
    pub fn del_tag<T: Tag>(&mut self, entity: usize) -> EcsResult<()> {
        self.check_index(entity)?;
        let bit = self.registry.tag_bit::<T>()?;
        self.bits_mut(entity).clear(bit);
        Ok(())
    }

    /// Checks whether an entity has tag `T`.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] or [`EcsError::UnregisteredTag`].
    pub fn has_tag<T: Tag>(&self, entity: usize) -> EcsResult<bool> {
        self.check_index(entity)?;
        let bit = self.registry.tag_bit::<T>()?;
        Ok(self.bits(entity).read(bit))
    }

    /// Adds component `C` to an entity, overwriting any current value.
    ///
    /// # Returns
    ///
    /// The stored value.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] or [`EcsError::UnregisteredComponent`].
    pub fn add_component<C: Component>(&mut self, entity: usize, value: C) -> EcsResult<&mut C> {
        self.check_index(entity)?;
        let id = self.registry.component_id::<C>()?;
        let row = self.component_row(entity);
        self.bits_mut(entity).set(id);

        let slot = intact(self.components.at_mut::<C>(id, row));
        *slot = value;
        Ok(slot)
    }

    /// Adds component `C` with its default value.
    ///
    /// # Errors
    ///
    /// Same as [`Manager::add_component`].
    pub fn add_default_component<C: Component>(&mut self, entity: usize) -> EcsResult<&mut C> {
        self.add_component(entity, C::default())
    }

    /// Removes component `C` from an entity. The stored value is reset to
    /// its default.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] or [`EcsError::UnregisteredComponent`].
    pub fn del_component<C: Component>(&mut self, entity: usize) -> EcsResult<()> {
        self.check_index(entity)?;
        let id = self.registry.component_id::<C>()?;
        if self.bits_mut(entity).clear(id) {
            let row = self.component_row(entity);
            *intact(self.components.at_mut::<C>(id, row)) = C::default();
        }
        Ok(())
    }

    /// Reads component `C` of an entity.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`], [`EcsError::UnregisteredComponent`] or
    /// [`EcsError::MissingComponent`].
    pub fn get_component<C: Component>(&self, entity: usize) -> EcsResult<&C> {
        self.check_index(entity)?;
        let id = self.registry.component_id::<C>()?;
        if !self.bits(entity).read(id) {
            return Err(EcsError::MissingComponent(type_name::<C>()));
        }
        let row = self.component_row(entity);
        Ok(intact(self.components.at::<C>(id, row)))
    }

    /// Mutably borrows component `C` of an entity.
    ///
    /// # Errors
    ///
    /// Same as [`Manager::get_component`].
    pub fn get_component_mut<C: Component>(&mut self, entity: usize) -> EcsResult<&mut C> {
        self.check_index(entity)?;
        let id = self.registry.component_id::<C>()?;
        if !self.bits(entity).read(id) {
            return Err(EcsError::MissingComponent(type_name::<C>()));
        }
        let row = self.component_row(entity);
        Ok(intact(self.components.at_mut::<C>(id, row)))
    }

    /// Checks whether an entity has component `C`.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] or [`EcsError::UnregisteredComponent`].
    pub fn has_component<C: Component>(&self, entity: usize) -> EcsResult<bool> {
        self.check_index(entity)?;
        let id = self.registry.component_id::<C>()?;
        Ok(self.bits(entity).read(id))
    }

    // =========================================================================
    // Matching
    // =========================================================================

    /// Component and tag bits of an entity.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] unless `entity < size_next`.
    pub fn signature_of(&self, entity: usize) -> EcsResult<&Bitset> {
        self.check_index(entity)?;
        Ok(self.bits(entity))
    }

    /// Checks whether an entity has every bit of `bits`.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] unless `entity < size_next`.
    pub fn matches_bits(&self, entity: usize, bits: &Bitset) -> EcsResult<bool> {
        Ok(self.signature_of(entity)?.contains(bits))
    }

    /// Checks an entity against signature `S`.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] or [`EcsError::UnregisteredSignature`].
    pub fn matches_signature<S: Signature>(&self, entity: usize) -> EcsResult<bool> {
        let bits = self.registry.signature_bits::<S>()?;
        self.matches_bits(entity, bits)
    }

    /// Checks an entity against the signature of system `X`.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] or [`EcsError::UnregisteredSystem`].
    pub fn matches_system<X: System>(&self, entity: usize) -> EcsResult<bool> {
        let bits = self.registry.system_signature::<X>()?;
        self.matches_bits(entity, bits)
    }

    // =========================================================================
    // Systems
    // =========================================================================

    /// State of system `X`.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnregisteredSystem`] if `X` was not declared.
    pub fn system<X: System>(&self) -> EcsResult<&X> {
        let id = self.registry.system_id::<X>()?;
        self.systems[id]
            .downcast_ref::<X>()
            .ok_or(EcsError::UnregisteredSystem(type_name::<X>()))
    }

    /// Mutable state of system `X`.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnregisteredSystem`] if `X` was not declared.
    pub fn system_mut<X: System>(&mut self) -> EcsResult<&mut X> {
        let id = self.registry.system_id::<X>()?;
        self.systems[id]
            .downcast_mut::<X>()
            .ok_or(EcsError::UnregisteredSystem(type_name::<X>()))
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// Calls `f` with every committed entity index, in order.
    pub fn for_entities(&self, mut f: impl FnMut(usize)) {
        for entity in 0..self.size {
            f(entity);
        }
    }

    /// Calls `f` with a mutable view of every committed entity, in order.
    pub fn for_entities_mut(&mut self, mut f: impl FnMut(EntityMut<'_>)) {
        for entity in 0..self.size {
            f(EntityMut::new(self, entity));
        }
    }

    /// Calls `f` with the id and value of every component an entity has,
    /// in component id order.
    ///
    /// # Errors
    ///
    /// [`EcsError::IndexOutOfRange`] unless `entity < size_next`.
    pub fn for_components(
        &mut self,
        entity: usize,
        mut f: impl FnMut(usize, &mut dyn Any),
    ) -> EcsResult<()> {
        self.check_index(entity)?;
        let row = self.component_row(entity);
        let bits = *self.bits(entity);
        let component_count = self.registry.component_count();
        for id in bits.iter_ones().take_while(|bit| *bit < component_count) {
            f(id, self.components.at_any_mut(id, row)?);
        }
        Ok(())
    }

    /// Calls `visitor` for every committed entity matching signature `S`, in
    /// index order, with the entity index and one `&mut` per component of
    /// `S`.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnregisteredSignature`] if `S` was not declared.
    pub fn for_matching<S: Signature>(
        &mut self,
        mut visitor: impl Visit<S::Components>,
    ) -> EcsResult<()> {
        let bits = *self.registry.signature_bits::<S>()?;
        let Self {
            entities,
            components,
            size,
            ..
        } = self;

        let mut columns = components
            .columns_of::<S::Components>()
            .ok_or(EcsError::UnregisteredSignature(type_name::<S>()))?;
        for (entity, row) in matching(entities, *size, bits) {
            if let Some(refs) = <S::Components as ColumnSet>::row(&mut columns, row) {
                visitor.visit(entity, refs);
            }
        }
        Ok(())
    }

    /// Like [`Manager::for_matching`] over the signature of system `X`,
    /// also handing `visitor` the system's state.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnregisteredSystem`] if `X` was not declared.
    pub fn for_system<X: System>(
        &mut self,
        mut visitor: impl VisitSystem<X, SystemComponents<X>>,
    ) -> EcsResult<()> {
        let id = self.registry.system_id::<X>()?;
        let bits = *self.registry.system_signature::<X>()?;
        let Self {
            entities,
            components,
            systems,
            size,
            ..
        } = self;

        let unregistered = EcsError::UnregisteredSystem(type_name::<X>());
        let state = systems[id].downcast_mut::<X>().ok_or(unregistered.clone())?;
        let mut columns = components
            .columns_of::<SystemComponents<X>>()
            .ok_or(unregistered)?;
        for (entity, row) in matching(entities, *size, bits) {
            if let Some(refs) = <SystemComponents<X> as ColumnSet>::row(&mut columns, row) {
                visitor.visit(state, entity, refs);
            }
        }
        Ok(())
    }

    /// Runs [`System::update`] of `X` on every committed matching entity.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnregisteredSystem`] if `X` was not declared.
    pub fn update<X: System>(&mut self) -> EcsResult<()> {
        let id = self.registry.system_id::<X>()?;
        let bits = *self.registry.system_signature::<X>()?;
        let Self {
            entities,
            components,
            systems,
            size,
            ..
        } = self;

        let unregistered = EcsError::UnregisteredSystem(type_name::<X>());
        let state = systems[id].downcast_mut::<X>().ok_or(unregistered.clone())?;
        let mut columns = components
            .columns_of::<SystemComponents<X>>()
            .ok_or(unregistered)?;
        for (entity, row) in matching(entities, *size, bits) {
            if let Some(refs) = <SystemComponents<X> as ColumnSet>::row(&mut columns, row) {
                state.update(entity, refs);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Ratio;
    use crate::ecs::registry::RegistryBuilder;
    use crate::ecs::system::Refs;

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Position(i32);
    impl Component for Position {}

    #[derive(Clone, Copy, Debug, Default, PartialEq)]
    struct Velocity(i32);
    impl Component for Velocity {}

    #[derive(Debug, Default, PartialEq)]
    struct Name(String);
    impl Component for Name {}

    struct Frozen;
    impl Tag for Frozen {}

    struct Unknown;
    impl Tag for Unknown {}

    #[derive(Default)]
    struct Unregistered;
    impl Component for Unregistered {}

    struct Moving;
    impl Signature for Moving {
        type Components = (Position, Velocity);
        type Tags = ();
    }

    struct Still;
    impl Signature for Still {
        type Components = (Position,);
        type Tags = (Frozen,);
    }

    #[derive(Default)]
    struct Integrate {
        steps: u32,
    }

    impl System for Integrate {
        type Signature = Moving;

        fn update(&mut self, _entity: usize, (position, velocity): Refs<'_, Moving>) {
            position.0 += velocity.0;
            self.steps += 1;
        }
    }

    fn registry() -> Arc<Registry> {
        Arc::new(
            RegistryBuilder::new()
                .component::<Position>()
                .component::<Velocity>()
                .component::<Name>()
                .tag::<Frozen>()
                .signature::<Moving>()
                .signature::<Still>()
                .system::<Integrate>()
                .build()
                .unwrap(),
        )
    }

    fn manager() -> Manager {
        Manager::new(registry())
    }

    #[test]
    fn test_new_entity_grows_geometrically() {
        let mut manager = manager();
        assert_eq!(manager.capacity(), 0);

        assert_eq!(manager.new_entity().unwrap(), 0);
        assert_eq!(manager.capacity(), 10);
        for _ in 1..10 {
            manager.new_entity().unwrap();
        }
        assert_eq!(manager.capacity(), 10);

        assert_eq!(manager.new_entity().unwrap(), 10);
        assert_eq!(manager.capacity(), 30);
        assert_eq!(manager.size(), 0);
        assert_eq!(manager.size_next(), 11);
        assert_eq!(manager.entities().len(), 30);
        assert_eq!(manager.components().len(), 30);
        assert_eq!(manager.handles().len(), 30);
    }

    #[test]
    fn test_with_config_growth() {
        let config = EcsConfig {
            initial_capacity: 4,
            growth: GrowthOptions::new(2, Ratio::new(3, 2)),
        };
        let mut manager = Manager::with_config(registry(), &config).unwrap();
        assert_eq!(manager.capacity(), 4);
        for _ in 0..5 {
            manager.new_entity().unwrap();
        }
        // (4 + 2) * 3 / 2
        assert_eq!(manager.capacity(), 9);

        let bad = EcsConfig {
            initial_capacity: 0,
            growth: GrowthOptions::new(0, Ratio::new(2, 1)),
        };
        assert!(matches!(
            Manager::with_config(registry(), &bad),
            Err(EcsError::InvalidGrowth(_))
        ));
    }

    #[test]
    fn test_apply_changes_partitions() {
        let mut manager = manager();
        for _ in 0..6 {
            manager.new_entity().unwrap();
        }
        manager.kill(1).unwrap();
        manager.kill(3).unwrap();
        manager.kill(3).unwrap();
        assert_eq!(manager.alive_count(), 4);

        manager.apply_changes();
        assert_eq!(manager.size(), 4);
        assert_eq!(manager.size_next(), 4);
        for entity in 0..4 {
            assert!(manager.is_alive(entity).unwrap());
        }
        assert!(manager.is_alive(4).is_err());
    }

    #[test]
    fn test_apply_changes_edge_cases() {
        let mut manager = manager();
        manager.apply_changes();
        assert_eq!(manager.size(), 0);

        manager.new_entity().unwrap();
        manager.kill(0).unwrap();
        manager.apply_changes();
        assert_eq!(manager.size(), 0);

        for _ in 0..3 {
            manager.new_entity().unwrap();
        }
        manager.apply_changes();
        assert_eq!(manager.size(), 3);
        for entity in 0..3 {
            manager.kill(entity).unwrap();
        }
        manager.apply_changes();
        assert_eq!(manager.size(), 0);
    }

    #[test]
    fn test_handles_follow_relocation() {
        let mut manager = manager();
        let handles: Vec<Handle> = (0..5).map(|_| manager.create_handle().unwrap()).collect();
        for (value, handle) in handles.iter().enumerate() {
            handle.add_component(&mut manager, Position(value as i32)).unwrap();
        }

        handles[0].kill(&mut manager).unwrap();
        assert!(handles[0].is_valid(&manager));
        manager.apply_changes();

        assert!(!handles[0].is_valid(&manager));
        assert!(matches!(
            handles[0].entity(&manager),
            Err(EcsError::StaleHandle { .. })
        ));
        // The last entity filled the hole.
        assert_eq!(handles[4].entity(&manager).unwrap(), 0);
        for (value, handle) in handles.iter().enumerate().skip(1) {
            assert_eq!(
                handle.get_component::<Position>(&manager).unwrap(),
                &Position(value as i32)
            );
        }
    }

    #[test]
    fn test_reused_slot_gets_fresh_handle() {
        let mut manager = manager();
        let old = manager.create_handle().unwrap();
        old.add_component(&mut manager, Position(7)).unwrap();
        old.kill(&mut manager).unwrap();
        manager.apply_changes();

        let new = manager.create_handle().unwrap();
        assert_eq!(new.entity(&manager).unwrap(), 0);
        assert_eq!(new.slot(), old.slot());
        assert_ne!(new.generation(), old.generation());
        assert!(!old.is_valid(&manager));
        // Dead rows were reset.
        assert!(!new.has_component::<Position>(&manager).unwrap());
        assert_eq!(
            new.add_default_component::<Position>(&mut manager).unwrap(),
            &Position(0)
        );
    }

    #[test]
    fn test_generation_never_wraps() {
        let mut manager = manager();
        let entity = manager.new_entity().unwrap();
        let slot = manager.handle_slot(entity);
        manager.handles[slot].generation = u64::from(u32::MAX);

        let old = manager.get_handle_of(entity).unwrap();
        old.kill(&mut manager).unwrap();
        manager.apply_changes();

        let new = manager.create_handle().unwrap();
        assert_eq!(new.slot(), old.slot());
        assert_eq!(new.generation(), u64::from(u32::MAX) + 1);
        assert!(!old.is_valid(&manager));

        manager.clear();
        assert!(manager.handles()[slot].generation > new.generation());
    }

    #[test]
    fn test_foreign_handle() {
        let mut a = manager();
        let b = Manager::new(Arc::clone(a.registry()));
        let handle = a.create_handle().unwrap();
        assert!(matches!(handle.entity(&b), Err(EcsError::ForeignHandle)));
        assert!(!handle.is_valid(&b));
    }

    #[test]
    fn test_component_round_trip() {
        let mut manager = manager();
        let entity = manager.new_entity().unwrap();

        assert!(matches!(
            manager.get_component::<Position>(entity),
            Err(EcsError::MissingComponent(_))
        ));
        manager.add_component(entity, Position(3)).unwrap();
        manager.add_component(entity, Name("crate".into())).unwrap();
        assert_eq!(
            manager.get_component::<Position>(entity).unwrap(),
            &Position(3)
        );
        assert!(manager.has_component::<Name>(entity).unwrap());

        manager.get_component_mut::<Position>(entity).unwrap().0 = 4;
        assert_eq!(
            manager.get_component::<Position>(entity).unwrap(),
            &Position(4)
        );

        manager.del_component::<Name>(entity).unwrap();
        assert!(!manager.has_component::<Name>(entity).unwrap());
        assert_eq!(
            manager.components().at::<Name>(2, 0).unwrap(),
            &Name(String::new())
        );
    }

    #[test]
    fn test_tags() {
        let mut manager = manager();
        let entity = manager.new_entity().unwrap();
        manager.add_component(entity, Position(0)).unwrap();
        assert!(!manager.matches_signature::<Still>(entity).unwrap());

        manager.add_tag::<Frozen>(entity).unwrap();
        assert!(manager.has_tag::<Frozen>(entity).unwrap());
        assert!(manager.matches_signature::<Still>(entity).unwrap());
        assert_eq!(
            manager.signature_of(entity).unwrap().to_bit_string(4),
            "1001"
        );

        manager.del_tag::<Frozen>(entity).unwrap();
        assert!(!manager.matches_signature::<Still>(entity).unwrap());
    }

    #[test]
    fn test_checked_errors() {
        let mut manager = manager();
        assert!(matches!(
            manager.kill(0),
            Err(EcsError::IndexOutOfRange { index: 0, len: 0 })
        ));
        let entity = manager.new_entity().unwrap();
        assert!(matches!(
            manager.add_tag::<Unknown>(entity),
            Err(EcsError::UnregisteredTag(_))
        ));
        assert!(matches!(
            manager.add_component(entity, Unregistered),
            Err(EcsError::UnregisteredComponent(_))
        ));
        assert!(manager.signature_of(entity).unwrap().is_empty());
        assert!(manager.get_handle_of(1).is_err());
    }

    #[test]
    fn test_iteration_skips_pending() {
        let mut manager = manager();
        for _ in 0..3 {
            let entity = manager.new_entity().unwrap();
            manager.add_component(entity, Position(1)).unwrap();
            manager.add_component(entity, Velocity(2)).unwrap();
        }

        let mut seen = Vec::new();
        manager.for_entities(|entity| seen.push(entity));
        assert!(seen.is_empty());

        manager.apply_changes();
        manager.new_entity().unwrap();
        manager.for_entities(|entity| seen.push(entity));
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn test_dispatch_skips_pending() {
        let mut manager = manager();
        let committed = manager.new_entity().unwrap();
        manager.add_component(committed, Position(0)).unwrap();
        manager.add_component(committed, Velocity(1)).unwrap();
        manager.apply_changes();

        let pending = manager.new_entity().unwrap();
        manager.add_component(pending, Position(100)).unwrap();
        manager.add_component(pending, Velocity(1)).unwrap();
        assert!(manager.matches_signature::<Moving>(pending).unwrap());

        let mut seen = Vec::new();
        manager
            .for_matching::<Moving>(|entity: usize, _: &mut Position, _: &mut Velocity| {
                seen.push(entity);
            })
            .unwrap();
        assert_eq!(seen, vec![committed]);

        seen.clear();
        manager
            .for_system::<Integrate>(
                |_: &mut Integrate, entity: usize, _: &mut Position, _: &mut Velocity| {
                    seen.push(entity);
                },
            )
            .unwrap();
        assert_eq!(seen, vec![committed]);

        manager.update::<Integrate>().unwrap();
        assert_eq!(manager.system::<Integrate>().unwrap().steps, 1);
        assert_eq!(
            manager.get_component::<Position>(committed).unwrap(),
            &Position(1)
        );
        assert_eq!(
            manager.get_component::<Position>(pending).unwrap(),
            &Position(100)
        );

        manager.apply_changes();
        manager.update::<Integrate>().unwrap();
        assert_eq!(manager.system::<Integrate>().unwrap().steps, 3);
        assert_eq!(
            manager.get_component::<Position>(pending).unwrap(),
            &Position(101)
        );
    }

    #[test]
    fn test_for_matching_and_update() {
        let mut manager = manager();
        for value in 0..4 {
            let entity = manager.new_entity().unwrap();
            manager.add_component(entity, Position(value)).unwrap();
            if value % 2 == 0 {
                manager.add_component(entity, Velocity(10)).unwrap();
            }
        }
        manager.apply_changes();

        let mut seen = Vec::new();
        manager
            .for_matching::<Moving>(
                |entity: usize, position: &mut Position, velocity: &mut Velocity| {
                    seen.push((entity, position.0, velocity.0));
                },
            )
            .unwrap();
        assert_eq!(seen, vec![(0, 0, 10), (2, 2, 10)]);

        manager.update::<Integrate>().unwrap();
        manager.update::<Integrate>().unwrap();
        assert_eq!(manager.get_component::<Position>(2).unwrap(), &Position(22));
        assert_eq!(manager.get_component::<Position>(1).unwrap(), &Position(1));
        assert_eq!(manager.system::<Integrate>().unwrap().steps, 4);

        manager.system_mut::<Integrate>().unwrap().steps = 0;
        manager
            .for_system::<Integrate>(
                |state: &mut Integrate, _: usize, position: &mut Position, _: &mut Velocity| {
                    state.steps += 1;
                    position.0 = -1;
                },
            )
            .unwrap();
        assert_eq!(manager.system::<Integrate>().unwrap().steps, 2);
        assert_eq!(manager.get_component::<Position>(0).unwrap(), &Position(-1));
        assert!(manager.matches_system::<Integrate>(0).unwrap());
        assert!(!manager.matches_system::<Integrate>(1).unwrap());
    }

    #[test]
    fn test_for_entities_mut_and_components() {
        let mut manager = manager();
        for _ in 0..3 {
            manager.new_entity().unwrap();
        }
        manager.apply_changes();

        manager.for_entities_mut(|mut entity| {
            if entity.index() == 1 {
                entity.kill().unwrap();
            } else {
                entity.add_component(Position(entity.index() as i32)).unwrap();
                entity.add_tag::<Frozen>().unwrap();
            }
        });
        // Killed entities stay visible until compaction.
        assert_eq!(manager.size(), 3);
        assert!(!manager.is_alive(1).unwrap());

        manager.add_component(2, Name("two".into())).unwrap();
        let mut ids = Vec::new();
        manager
            .for_components(2, |id, value| {
                ids.push(id);
                if let Some(position) = value.downcast_mut::<Position>() {
                    position.0 = 20;
                }
            })
            .unwrap();
        assert_eq!(ids, vec![0, 2]);
        assert_eq!(manager.get_component::<Position>(2).unwrap(), &Position(20));

        manager.apply_changes();
        assert_eq!(manager.size(), 2);
    }

    #[test]
    fn test_clear_invalidates_handles() {
        let mut manager = manager();
        let handle = manager.create_handle().unwrap();
        handle.add_component(&mut manager, Position(5)).unwrap();
        manager.apply_changes();

        manager.clear();
        assert_eq!(manager.size(), 0);
        assert_eq!(manager.size_next(), 0);
        assert_eq!(manager.capacity(), 10);
        assert!(!handle.is_valid(&manager));

        let fresh = manager.create_handle().unwrap();
        assert!(fresh.is_valid(&manager));
        assert!(!fresh.has_component::<Position>(&manager).unwrap());
    }
}
