//! # Memory Management
//!
//! Storage primitives used by the ECS:
//!
//! - [`BatchVector`]: structure-of-arrays columns kept in lockstep
//! - [`Bitset`]: fixed-width, allocation-free signature mask
//! - [`columns`]: the type-erased column and tuple traits behind them

mod batch_vector;
mod bitset;
pub mod columns;

pub use batch_vector::BatchVector;
pub use bitset::{Bitset, Ones};
pub use columns::{Column, ColumnSet, Row, Visit};
