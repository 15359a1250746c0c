//! # ECS Error Types
//!
//! All errors that can occur while configuring or driving a manager.

use std::collections::TryReserveError;

use thiserror::Error;

/// Errors that can occur in the ECS.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Component type was never declared in the registry.
    #[error("component not registered: {0}")]
    UnregisteredComponent(&'static str),

    /// Tag type was never declared in the registry.
    #[error("tag not registered: {0}")]
    UnregisteredTag(&'static str),

    /// Signature type was never declared in the registry.
    #[error("signature not registered: {0}")]
    UnregisteredSignature(&'static str),

    /// System type was never declared in the registry.
    #[error("system not registered: {0}")]
    UnregisteredSystem(&'static str),

    /// The same type was declared twice.
    #[error("type registered twice: {0}")]
    DuplicateRegistration(&'static str),

    /// A signature lists the same member type more than once.
    #[error("signature {signature} lists {member} more than once")]
    DuplicateMember {
        /// The offending signature.
        signature: &'static str,
        /// The repeated member type.
        member: &'static str,
    },

    /// More components and tags were declared than a signature can hold.
    #[error("too many signature bits: requested {requested}, max {max}")]
    TooManyBits {
        /// Components plus tags declared.
        requested: usize,
        /// Width of the signature bitset.
        max: usize,
    },

    /// Growth options would not grow the storage.
    #[error("invalid growth options: {0}")]
    InvalidGrowth(String),

    /// An entity or row index outside the valid range.
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of valid indices.
        len: usize,
    },

    /// The handle's generation no longer matches its slot.
    #[error("stale handle: slot {slot}, generation {generation}")]
    StaleHandle {
        /// Handle slot.
        slot: usize,
        /// Generation stored in the handle.
        generation: u64,
    },

    /// The handle was issued by a different manager.
    #[error("handle belongs to another manager")]
    ForeignHandle,

    /// The entity does not currently have the component.
    #[error("entity has no component {0}")]
    MissingComponent(&'static str),

    /// Typed column access used the wrong element type.
    #[error("column {column} holds {found}, not {expected}")]
    ColumnMismatch {
        /// Column index.
        column: usize,
        /// Requested element type.
        expected: &'static str,
        /// Actual element type.
        found: &'static str,
    },

    /// A pushed row has a different number of values than there are columns.
    #[error("row width mismatch: expected {expected}, found {found}")]
    WidthMismatch {
        /// Number of columns.
        expected: usize,
        /// Number of values in the row.
        found: usize,
    },

    /// Storage could not grow.
    #[error("allocation failed: {0}")]
    Allocation(#[from] TryReserveError),

    /// Configuration file could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;
