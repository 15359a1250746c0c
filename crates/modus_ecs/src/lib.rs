//! # MODUS ECS
//!
//! Data oriented Entity Component System with a registry validated at
//! startup and generational handles.
//!
//! - Tags, components, signatures and systems are declared once in a
//!   [`RegistryBuilder`]; every signature's bitset is computed there
//! - Components live in type-erased, lockstep columns ([`memory::BatchVector`])
//! - Entities are killed by flag and reclaimed by [`Manager::apply_changes`],
//!   which runs once per frame
//! - [`Handle`]s detect use after compaction instead of aliasing the slot's
//!   next occupant
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use modus_ecs::{Component, Manager, RegistryBuilder, Signature, Tag};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Position(f32);
//! impl Component for Position {}
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Velocity(f32);
//! impl Component for Velocity {}
//!
//! struct Dead;
//! impl Tag for Dead {}
//!
//! struct Moving;
//! impl Signature for Moving {
//!     type Components = (Position, Velocity);
//!     type Tags = ();
//! }
//!
//! let registry = RegistryBuilder::new()
//!     .component::<Position>()
//!     .component::<Velocity>()
//!     .tag::<Dead>()
//!     .signature::<Moving>()
//!     .build()?;
//! let mut manager = Manager::new(Arc::new(registry));
//!
//! let ship = manager.create_handle()?;
//! ship.add_component(&mut manager, Position(0.0))?;
//! ship.add_component(&mut manager, Velocity(2.0))?;
//! manager.apply_changes();
//!
//! manager.for_matching::<Moving>(|_: usize, p: &mut Position, v: &mut Velocity| p.0 += v.0)?;
//! assert_eq!(ship.get_component::<Position>(&manager)?, &Position(2.0));
//!
//! ship.kill(&mut manager)?;
//! manager.apply_changes();
//! assert!(!ship.is_valid(&manager));
//! # Ok::<(), modus_ecs::EcsError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;
pub mod memory;

pub use config::{EcsConfig, GrowthOptions, Ratio};
pub use ecs::{
    Component, ComponentSet, EntityMut, Handle, HandleSlot, Manager, ManagerId, Refs, Registry,
    RegistryBuilder, Signature, System, SystemComponents, Tag, TagSet, VisitSystem,
};
pub use error::{EcsError, EcsResult};
pub use memory::{BatchVector, Bitset, Visit};
