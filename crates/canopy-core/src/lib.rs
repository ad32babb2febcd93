//! canopy-core
//!
//! Desired-state model for declarative resources: typed values, the
//! per-field constraint table, and the generic validation and diff passes.
//! No I/O and no async. This is the shared vocabulary of the other crates.

pub mod diff;
pub mod error;
pub mod key;
pub mod resource_id;
pub mod schema;
pub mod spec;
pub mod suppress;
pub mod validate;
pub mod value;

pub use crate::diff::FieldChange;
pub use crate::error::{CoreError, FieldError, ValidationError};
pub use crate::key::NaturalKey;
pub use crate::schema::{FieldKind, FieldSchema, Schema};
pub use crate::spec::ResourceSpec;
pub use crate::suppress::DiffSuppress;
pub use crate::validate::Validator;
pub use crate::value::Value;
