//! # Registry
//!
//! The closed vocabulary of a manager: tags, components, signatures and
//! systems, each assigned a dense id at build time.
//!
//! ## Bit layout
//!
//! ```text
//! bit:   0 .. C-1          C .. C+T-1
//!        components        tags
//! ```
//!
//! A component's bit is its declaration position among components. A tag's
//! bit is `component_count` plus its position among tags, whatever order
//! the builder calls were made in.
//!
//! Every signature's bitset is computed once in [`RegistryBuilder::build`],
//! which also rejects undeclared members, duplicates and registries wider
//! than a [`Bitset`].

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;

use super::component::{Component, Tag, TagSet};
use super::system::{Signature, System};
use crate::config::GrowthOptions;
use crate::error::{EcsError, EcsResult};
use crate::memory::{Bitset, Column, ColumnSet};

/// Creates an empty column for a component type.
type ColumnFactory = fn() -> Box<dyn Column>;

/// Creates the default state of a system.
type StateFactory = fn() -> Box<dyn Any>;

fn make_column<C: Component>() -> Box<dyn Column> {
    Box::new(Vec::<C>::new())
}

fn make_state<X: System>() -> Box<dyn Any> {
    Box::new(X::default())
}

/// What a registered type is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Tag(usize),
    Component(usize),
    Signature(usize),
    System(usize),
}

#[derive(Debug)]
struct TagEntry {
    name: &'static str,
}

#[derive(Debug)]
struct ComponentEntry {
    name: &'static str,
    make_column: ColumnFactory,
}

#[derive(Debug)]
struct SignatureEntry {
    name: &'static str,
    components: Vec<(TypeId, &'static str)>,
    tags: Vec<(TypeId, &'static str)>,
    bits: Bitset,
}

impl SignatureEntry {
    /// Computes the bitset from the declared members.
    fn resolve(&mut self, lookup: &HashMap<TypeId, Kind>, component_count: usize) -> EcsResult<()> {
        let mut bits = Bitset::EMPTY;
        for &(id, member) in &self.components {
            let bit = match lookup.get(&id) {
                Some(Kind::Component(index)) => *index,
                _ => return Err(EcsError::UnregisteredComponent(member)),
            };
            if !bits.set(bit) {
                return Err(EcsError::DuplicateMember {
                    signature: self.name,
                    member,
                });
            }
        }
        for &(id, member) in &self.tags {
            let bit = match lookup.get(&id) {
                Some(Kind::Tag(index)) => component_count + index,
                _ => return Err(EcsError::UnregisteredTag(member)),
            };
            if !bits.set(bit) {
                return Err(EcsError::DuplicateMember {
                    signature: self.name,
                    member,
                });
            }
        }
        self.bits = bits;
        Ok(())
    }
}

#[derive(Debug)]
struct SystemEntry {
    name: &'static str,
    signature: (TypeId, &'static str),
    signature_id: usize,
    make_state: StateFactory,
}

/// Collects declarations for a [`Registry`].
///
/// # Example
///
/// ```rust
/// use modus_ecs::{Component, RegistryBuilder, Signature, Tag};
///
/// #[derive(Default)]
/// struct Position(f32, f32);
/// impl Component for Position {}
///
/// struct Dead;
/// impl Tag for Dead {}
///
/// struct Corpse;
/// impl Signature for Corpse {
///     type Components = (Position,);
///     type Tags = (Dead,);
/// }
///
/// let registry = RegistryBuilder::new()
///     .tag::<Dead>()
///     .component::<Position>()
///     .signature::<Corpse>()
///     .build()
///     .unwrap();
///
/// assert_eq!(registry.component_bit::<Position>().unwrap(), 0);
/// assert_eq!(registry.tag_bit::<Dead>().unwrap(), 1);
/// assert_eq!(registry.signature_bits::<Corpse>().unwrap().to_bit_string(2), "11");
/// ```
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    order: Vec<(TypeId, &'static str)>,
    tags: Vec<(TypeId, TagEntry)>,
    components: Vec<(TypeId, ComponentEntry)>,
    signatures: Vec<(TypeId, SignatureEntry)>,
    systems: Vec<(TypeId, SystemEntry)>,
    growth: GrowthOptions,
}

impl RegistryBuilder {
    /// Creates an empty builder with default growth options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn declare<T: 'static>(&mut self) -> TypeId {
        let id = TypeId::of::<T>();
        self.order.push((id, type_name::<T>()));
        id
    }

    /// Maps every declared type to its kind and dense id.
    fn index(&self) -> EcsResult<HashMap<TypeId, Kind>> {
        let kinds = self
            .tags
            .iter()
            .enumerate()
            .map(|(i, (id, _))| (*id, Kind::Tag(i)))
            .chain(
                self.components
                    .iter()
                    .enumerate()
                    .map(|(i, (id, _))| (*id, Kind::Component(i))),
            )
            .chain(
                self.signatures
                    .iter()
                    .enumerate()
                    .map(|(i, (id, _))| (*id, Kind::Signature(i))),
            )
            .chain(
                self.systems
                    .iter()
                    .enumerate()
                    .map(|(i, (id, _))| (*id, Kind::System(i))),
            );

        let mut lookup = HashMap::with_capacity(self.order.len());
        for (id, kind) in kinds {
            if lookup.insert(id, kind).is_some() {
                let name = self
                    .order
                    .iter()
                    .find(|(declared, _)| *declared == id)
                    .map_or("<unknown>", |(_, name)| *name);
                return Err(EcsError::DuplicateRegistration(name));
            }
        }
        Ok(lookup)
    }

    /// Declares a tag.
    #[must_use]
    pub fn tag<T: Tag>(mut self) -> Self {
        let id = self.declare::<T>();
        self.tags.push((id, TagEntry { name: type_name::<T>() }));
        self
    }

    /// Declares a component.
    #[must_use]
    pub fn component<C: Component>(mut self) -> Self {
        let id = self.declare::<C>();
        self.components.push((
            id,
            ComponentEntry {
                name: type_name::<C>(),
                make_column: make_column::<C>,
            },
        ));
        self
    }

    /// Declares a signature. Its members must be declared too, in any order.
    #[must_use]
    pub fn signature<S: Signature>(mut self) -> Self {
        let id = self.declare::<S>();
        self.signatures.push((
            id,
            SignatureEntry {
                name: type_name::<S>(),
                components: <S::Components as ColumnSet>::type_ids(),
                tags: <S::Tags as TagSet>::tag_ids(),
                bits: Bitset::EMPTY,
            },
        ));
        self
    }

    /// Declares a system. Its signature must be declared too.
    #[must_use]
    pub fn system<X: System>(mut self) -> Self {
        let id = self.declare::<X>();
        self.systems.push((
            id,
            SystemEntry {
                name: type_name::<X>(),
                signature: (TypeId::of::<X::Signature>(), type_name::<X::Signature>()),
                signature_id: 0,
                make_state: make_state::<X>,
            },
        ));
        self
    }

    /// Sets the growth policy used by managers built from this registry.
    #[must_use]
    pub fn growth(mut self, growth: GrowthOptions) -> Self {
        self.growth = growth;
        self
    }

    /// Validates the declarations and computes signature bitsets.
    ///
    /// # Errors
    ///
    /// - [`EcsError::DuplicateRegistration`] if a type is declared twice
    /// - [`EcsError::TooManyBits`] if components plus tags exceed
    ///   [`Bitset::MAX_BITS`]
    /// - [`EcsError::UnregisteredComponent`] / [`EcsError::UnregisteredTag`]
    ///   if a signature names an undeclared member
    /// - [`EcsError::DuplicateMember`] if a signature names a member twice
    /// - [`EcsError::UnregisteredSignature`] if a system's signature is
    ///   undeclared
    /// - [`EcsError::InvalidGrowth`] for unusable growth options
    pub fn build(self) -> EcsResult<Registry> {
        self.growth.validate()?;
        let lookup = self.index()?;

        let Self {
            tags,
            components,
            mut signatures,
            mut systems,
            growth,
            ..
        } = self;

        let bit_width = components.len() + tags.len();
        if bit_width > Bitset::MAX_BITS {
            return Err(EcsError::TooManyBits {
                requested: bit_width,
                max: Bitset::MAX_BITS,
            });
        }

        let component_count = components.len();
        for (_, signature) in &mut signatures {
            signature.resolve(&lookup, component_count)?;
        }

        for (_, system) in &mut systems {
            let (id, name) = system.signature;
            system.signature_id = match lookup.get(&id) {
                Some(Kind::Signature(index)) => *index,
                _ => return Err(EcsError::UnregisteredSignature(name)),
            };
        }

        tracing::debug!(
            tags = tags.len(),
            components = component_count,
            signatures = signatures.len(),
            systems = systems.len(),
            bit_width,
            "registry built"
        );

        Ok(Registry {
            lookup,
            tags: tags.into_iter().map(|(_, entry)| entry).collect(),
            components: components.into_iter().map(|(_, entry)| entry).collect(),
            signatures: signatures.into_iter().map(|(_, entry)| entry).collect(),
            systems: systems.into_iter().map(|(_, entry)| entry).collect(),
            growth,
        })
    }
}

/// Validated, immutable type registry.
///
/// Shared by every manager configured with it, usually as `Arc<Registry>`.
#[derive(Debug)]
pub struct Registry {
    lookup: HashMap<TypeId, Kind>,
    tags: Vec<TagEntry>,
    components: Vec<ComponentEntry>,
    signatures: Vec<SignatureEntry>,
    systems: Vec<SystemEntry>,
    growth: GrowthOptions,
}

impl Registry {
    /// Starts a new registry declaration.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    #[inline]
    fn kind<T: 'static>(&self) -> Option<Kind> {
        self.lookup.get(&TypeId::of::<T>()).copied()
    }

    /// Number of declared tags.
    #[inline]
    #[must_use]
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }

    /// Number of declared components.
    #[inline]
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Number of declared signatures.
    #[inline]
    #[must_use]
    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    /// Number of declared systems.
    #[inline]
    #[must_use]
    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    /// Signature width: components plus tags.
    #[inline]
    #[must_use]
    pub fn bit_width(&self) -> usize {
        self.components.len() + self.tags.len()
    }

    /// Growth policy for managers built from this registry.
    #[inline]
    #[must_use]
    pub fn growth(&self) -> &GrowthOptions {
        &self.growth
    }

    /// Checks if `T` is a declared tag.
    #[must_use]
    pub fn has_tag<T: 'static>(&self) -> bool {
        matches!(self.kind::<T>(), Some(Kind::Tag(_)))
    }

    /// Checks if `C` is a declared component.
    #[must_use]
    pub fn has_component<C: 'static>(&self) -> bool {
        matches!(self.kind::<C>(), Some(Kind::Component(_)))
    }

    /// Checks if `S` is a declared signature.
    #[must_use]
    pub fn has_signature<S: 'static>(&self) -> bool {
        matches!(self.kind::<S>(), Some(Kind::Signature(_)))
    }

    /// Checks if `X` is a declared system.
    #[must_use]
    pub fn has_system<X: 'static>(&self) -> bool {
        matches!(self.kind::<X>(), Some(Kind::System(_)))
    }

    /// Position of `T` among tags.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnregisteredTag`] if `T` was not declared as a tag.
    pub fn tag_id<T: 'static>(&self) -> EcsResult<usize> {
        match self.kind::<T>() {
            Some(Kind::Tag(id)) => Ok(id),
            _ => Err(EcsError::UnregisteredTag(type_name::<T>())),
        }
    }

    /// Signature bit of tag `T`.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::tag_id`].
    #[inline]
    pub fn tag_bit<T: 'static>(&self) -> EcsResult<usize> {
        Ok(self.components.len() + self.tag_id::<T>()?)
    }

    /// Position of `C` among components; also its storage column.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnregisteredComponent`] if `C` was not declared as a
    /// component.
    pub fn component_id<C: 'static>(&self) -> EcsResult<usize> {
        match self.kind::<C>() {
            Some(Kind::Component(id)) => Ok(id),
            _ => Err(EcsError::UnregisteredComponent(type_name::<C>())),
        }
    }

    /// Signature bit of component `C`.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::component_id`].
    #[inline]
    pub fn component_bit<C: 'static>(&self) -> EcsResult<usize> {
        self.component_id::<C>()
    }

    /// Position of `S` among signatures.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnregisteredSignature`] if `S` was not declared.
    pub fn signature_id<S: 'static>(&self) -> EcsResult<usize> {
        match self.kind::<S>() {
            Some(Kind::Signature(id)) => Ok(id),
            _ => Err(EcsError::UnregisteredSignature(type_name::<S>())),
        }
    }

    /// Bitset of signature `S`.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::signature_id`].
    pub fn signature_bits<S: 'static>(&self) -> EcsResult<&Bitset> {
        let id = self.signature_id::<S>()?;
        Ok(&self.signatures[id].bits)
    }

    /// Bitset of the signature with the given id.
    #[must_use]
    pub fn signature_bits_by_id(&self, id: usize) -> Option<&Bitset> {
        self.signatures.get(id).map(|s| &s.bits)
    }

    /// Position of `X` among systems; also its state slot.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnregisteredSystem`] if `X` was not declared.
    pub fn system_id<X: 'static>(&self) -> EcsResult<usize> {
        match self.kind::<X>() {
            Some(Kind::System(id)) => Ok(id),
            _ => Err(EcsError::UnregisteredSystem(type_name::<X>())),
        }
    }

    /// Bitset of the signature system `X` runs on.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::system_id`].
    pub fn system_signature<X: 'static>(&self) -> EcsResult<&Bitset> {
        let id = self.system_id::<X>()?;
        Ok(&self.signatures[self.systems[id].signature_id].bits)
    }

    /// Name of the component with the given id.
    #[must_use]
    pub fn component_name(&self, id: usize) -> Option<&'static str> {
        self.components.get(id).map(|c| c.name)
    }

    /// Name of the tag with the given id.
    #[must_use]
    pub fn tag_name(&self, id: usize) -> Option<&'static str> {
        self.tags.get(id).map(|t| t.name)
    }

    /// Name of the signature with the given id.
    #[must_use]
    pub fn signature_name(&self, id: usize) -> Option<&'static str> {
        self.signatures.get(id).map(|s| s.name)
    }

    /// Name of the system with the given id.
    #[must_use]
    pub fn system_name(&self, id: usize) -> Option<&'static str> {
        self.systems.get(id).map(|s| s.name)
    }

    /// Empty component columns, in component id order.
    pub(crate) fn make_columns(&self) -> impl Iterator<Item = Box<dyn Column>> + '_ {
        self.components.iter().map(|c| (c.make_column)())
    }

    /// Default system states, in system id order.
    pub(crate) fn make_states(&self) -> Vec<Box<dyn Any>> {
        self.systems.iter().map(|s| (s.make_state)()).collect()
    }
}
