//! # Entity Component System
//!
//! Entities, tags, components and systems over a registry fixed at startup.
//!
//! ## Design Philosophy
//!
//! - The vocabulary of types is declared once and validated before any
//!   entity exists
//! - Components are stored in dense columns, one per type
//! - Entities are indices; handles add a generation counter
//! - Dead entities are reclaimed in one compaction pass per frame

pub mod component;
pub mod entity;
mod handle;
mod manager;
pub mod registry;
pub mod system;

pub use component::{Component, ComponentSet, Tag, TagSet};
pub use entity::EntityMut;
pub use handle::{Handle, HandleSlot, ManagerId};
pub use manager::Manager;
pub use registry::{Registry, RegistryBuilder};
pub use system::{Refs, Signature, System, SystemComponents, VisitSystem};
