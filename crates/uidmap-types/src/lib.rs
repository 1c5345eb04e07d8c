//! Foundation types for the unique id map.
//!
//! The id map hands out compact integer identifiers for arbitrary string keys
//! so that custom content can be referenced cheaply over the wire and keep the
//! same number across restarts. This crate holds the types every other
//! `uidmap` crate shares.
//!
//! # Key Types
//!
//! - [`Identifier`] — an integer confined to `[MIN_ID, MAX_ID]`
//! - [`Binding`] — a `(key, id)` association
//! - [`TypeError`] — validation failures for the above

pub mod binding;
pub mod error;
pub mod identifier;

pub use binding::{validate_key, Binding};
pub use error::TypeError;
pub use identifier::{Identifier, CAPACITY, ID_MASK, MAX_ID, MIN_ID};
