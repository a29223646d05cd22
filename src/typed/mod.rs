//! Typed schemas: declare fields once, get defaults, validators and data
//! post-processing derived from the declaration.
//!
//! A [`Schema`] is a list of [`Field`]s. Building it runs [`extract`], which
//! produces the nested defaults, the validators (a type check per field,
//! nested-object validators under the field's prefix, item validators for
//! collections of objects, then the field's embedded validators) and the
//! [`Spec`] tree. [`TypedSettings`] wires all of it into a [`Settings`]
//! object.
//!
//! [`Settings`]: crate::Settings

pub mod extract;
pub mod schema;
pub mod settings;
pub mod spec;

pub use extract::{extract, Extraction};
pub use schema::{Field, Schema, SchemaBuilder};
pub use settings::{Options, TypedSettings, TypedSettingsBuilder, TypedState};
pub use spec::{Spec, Transformer};
