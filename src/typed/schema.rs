//! Builder API for declaring typed settings schemas.

use super::extract::{extract, Extraction};
use crate::error::SchemaError;
use crate::types::TypeSpec;
use crate::validator::Validator;
use crate::value::ConfigValue;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;

/// One declared field: name, type, optional default, embedded validators
/// and the not-required marker.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    annotation: TypeSpec,
    default: Option<ConfigValue>,
    validators: Vec<Validator>,
    not_required: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, annotation: TypeSpec) -> Self {
        Self {
            name: name.into(),
            annotation,
            default: None,
            validators: Vec::new(),
            not_required: false,
        }
    }

    /// Value used when no source provides the field.
    pub fn default(mut self, value: impl Into<ConfigValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Attaches an unnamed validator; extraction binds it to this field.
    pub fn validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Allows the field to be absent without a default.
    pub fn not_required(mut self) -> Self {
        self.not_required = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn annotation(&self) -> &TypeSpec {
        &self.annotation
    }

    pub fn default_value(&self) -> Option<&ConfigValue> {
        self.default.as_ref()
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn is_not_required(&self) -> bool {
        self.not_required
    }
}

/// A named set of fields.
///
/// Schemas are built once and shared behind an `Arc`; nested-object fields
/// reference other schemas. Building runs extraction, so an invalid
/// declaration fails at definition time and the result is memoized.
///
/// # Example
/// ```
/// use tierconf::typed::{Field, Schema};
/// use tierconf::{TypeSpec, Validator};
///
/// let database = Schema::builder("Database")
///     .field(Field::new("host", TypeSpec::Str).default("server.com"))
///     .field(Field::new("port", TypeSpec::Int).validator(Validator::default().gt(999)))
///     .build()
///     .unwrap();
///
/// let app = Schema::builder("App")
///     .field(Field::new("database", TypeSpec::object(&database)))
///     .build()
///     .unwrap();
///
/// let extraction = app.extraction().unwrap();
/// assert!(extraction.defaults.contains_key("database"));
/// ```
pub struct Schema {
    name: String,
    fields: Vec<Field>,
    extraction: OnceCell<Extraction>,
}

impl Schema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Memoized extraction result.
    pub fn extraction(&self) -> Result<&Extraction, SchemaError> {
        if let Some(extraction) = self.extraction.get() {
            tracing::trace!(schema = %self.name, "reusing memoized extraction");
            return Ok(extraction);
        }
        self.extraction.get_or_try_init(|| extract(self))
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.fields == other.fields
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .finish()
    }
}

pub struct SchemaBuilder {
    name: String,
    fields: Vec<Field>,
}

impl SchemaBuilder {
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Validates the declaration and memoizes its extraction.
    pub fn build(self) -> Result<Arc<Schema>, SchemaError> {
        let schema = Arc::new(Schema {
            name: self.name,
            fields: self.fields,
            extraction: OnceCell::new(),
        });
        schema.extraction()?;
        Ok(schema)
    }
}
