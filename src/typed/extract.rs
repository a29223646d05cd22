//! Schema extraction: defaults, validators and the spec tree of a schema.
//!
//! Extraction walks every field depth-first:
//!
//! * nested-object fields contribute their schema's defaults under the
//!   field's name (an inline default on the outer field is merged over
//!   them) and their validators prefixed with the field's name, guarded so
//!   they only run when the value is a mapping. Their spec carries a
//!   transformer, so a partial mapping supplied by any source (including
//!   optional, not-required and union fields) is completed with those
//!   defaults;
//! * `list[Obj]`, `tuple[Obj]` and `dict[K, Obj]` fields get an item
//!   validator running the element schema's validators on every element,
//!   and an item spec whose transformer fills element defaults;
//! * every field gets a type-check validator, registered before the
//!   validators embedded in its declaration.

use super::schema::{Field, Schema};
use super::spec::{Spec, Transformer};
use crate::error::SchemaError;
use crate::merge::deep_merge;
use crate::types::TypeSpec;
use crate::validator::Validator;
use crate::value::{ConfigValue, Map};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Everything derived from one schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Extraction {
    /// Nested default values, lowest precedence
    pub defaults: Map,
    /// Generated and embedded validators in registration order
    pub validators: Vec<Validator>,
    /// Field name to spec
    pub spec: BTreeMap<String, Spec>,
}

/// Extracts `schema` from scratch.
///
/// The result is independent of any memoized extraction; running it twice
/// yields equal results.
pub fn extract(schema: &Schema) -> Result<Extraction, SchemaError> {
    let mut extraction = Extraction::default();
    let mut seen = BTreeSet::new();

    for field in schema.fields() {
        if !seen.insert(field.name().to_ascii_lowercase()) {
            return Err(SchemaError::DuplicateField {
                schema: schema.name().to_string(),
                field: field.name().to_string(),
            });
        }
        check_declaration(field)?;

        if let Some(default) = field_default(field)? {
            extraction.defaults.insert(field.name().to_string(), default);
        }
        extraction.validators.extend(field_validators(field)?);
        extraction
            .spec
            .insert(field.name().to_string(), field_spec(field)?);
    }

    tracing::debug!(
        schema = schema.name(),
        fields = schema.fields().len(),
        validators = extraction.validators.len(),
        "extracted schema"
    );
    Ok(extraction)
}

fn check_declaration(field: &Field) -> Result<(), SchemaError> {
    check_annotation(field.name(), field.annotation())?;

    if field.annotation().is_optional() && field.default_value().is_none() {
        return Err(SchemaError::OptionalWithoutDefault {
            field: field.name().to_string(),
        });
    }

    if let Some(default) = field.default_value() {
        if !field.annotation().matches(default) {
            return Err(SchemaError::InvalidDefault {
                field: field.name().to_string(),
                expected: field.annotation().to_string(),
                actual: default.to_string(),
            });
        }
    }

    for embedded in field.validators() {
        if !embedded.names().is_empty() {
            return Err(SchemaError::InvalidMetadata {
                field: field.name().to_string(),
                message: format!(
                    "embedded validators are bound to the field and cannot name keys ({})",
                    embedded.names().join(", ")
                ),
            });
        }
    }
    Ok(())
}

fn check_annotation(field: &str, annotation: &TypeSpec) -> Result<(), SchemaError> {
    let arity_error = |type_name: &str, count: usize| SchemaError::UnsupportedArity {
        field: field.to_string(),
        type_name: type_name.to_string(),
        count,
    };
    match annotation {
        TypeSpec::Opaque(name) => Err(SchemaError::UnsupportedType {
            field: field.to_string(),
            type_name: name.clone(),
        }),
        TypeSpec::List(args) if args.len() > 1 => Err(arity_error("list", args.len())),
        TypeSpec::Tuple(args) if args.len() > 1 => Err(arity_error("tuple", args.len())),
        TypeSpec::Dict(args) if !(args.is_empty() || args.len() == 2) => {
            Err(arity_error("dict", args.len()))
        }
        TypeSpec::List(args) | TypeSpec::Tuple(args) | TypeSpec::Dict(args) | TypeSpec::Union(args) => {
            args.iter().try_for_each(|arg| check_annotation(field, arg))
        }
        TypeSpec::Optional(inner) => check_annotation(field, inner),
        _ => Ok(()),
    }
}

/// Schema of a field whose value itself is a nested object. Unions and
/// optionals use their first object member.
fn nested_schema(annotation: &TypeSpec) -> Option<&Arc<Schema>> {
    annotation.object_members().into_iter().next()
}

/// Element schema of `list[Obj]`, `tuple[Obj]` or the value schema of
/// `dict[K, Obj]`.
fn element_schema(annotation: &TypeSpec) -> Option<(&Arc<Schema>, bool)> {
    match annotation {
        TypeSpec::List(args) | TypeSpec::Tuple(args) => {
            args.first().and_then(nested_schema).map(|schema| (schema, false))
        }
        TypeSpec::Dict(args) if args.len() == 2 => {
            nested_schema(&args[1]).map(|schema| (schema, true))
        }
        TypeSpec::Optional(inner) => element_schema(inner),
        _ => None,
    }
}

fn field_default(field: &Field) -> Result<Option<ConfigValue>, SchemaError> {
    let nested = match field.annotation() {
        TypeSpec::Object(schema) => Some(schema.extraction()?.defaults.clone()),
        _ => None,
    };

    match (field.default_value(), nested) {
        // the outer inline default wins over the nested schema's defaults
        (Some(ConfigValue::Object(inline)), Some(mut nested)) => {
            deep_merge(&mut nested, inline.clone());
            Ok(Some(ConfigValue::Object(nested)))
        }
        (Some(default), _) => Ok(Some(default.clone())),
        (None, Some(nested)) if !nested.is_empty() && !field.is_not_required() => {
            Ok(Some(ConfigValue::Object(nested)))
        }
        (None, _) => Ok(None),
    }
}

fn field_validators(field: &Field) -> Result<Vec<Validator>, SchemaError> {
    let name = field.name();
    let annotation = field.annotation();
    let mut validators = Vec::new();

    let mut type_check = Validator::new([name]).is_type_of(annotation.clone());
    if field.default_value().is_none() && !field.is_not_required() {
        type_check = type_check.must_exist(true);
    }
    validators.push(type_check);

    if let Some(schema) = nested_schema(annotation) {
        let mapping_guard = Validator::new([name])
            .must_exist(true)
            .is_type_of(TypeSpec::Dict(Vec::new()));
        validators.extend(
            schema
                .extraction()?
                .validators
                .iter()
                .map(|nested| nested.prefixed(name).guarded_by(mapping_guard.clone())),
        );
    }

    if let Some((schema, from_values)) = element_schema(annotation) {
        let mut items = Validator::new([name]).items(schema.extraction()?.validators.clone());
        if from_values {
            items = items.items_from_values();
        }
        validators.push(items);
    }

    validators.extend(
        field
            .validators()
            .iter()
            .map(|embedded| embedded.clone().bound_to(name)),
    );
    Ok(validators)
}

fn field_spec(field: &Field) -> Result<Spec, SchemaError> {
    let annotation = field.annotation();
    let mut spec = Spec::new(annotation.clone());

    if let Some(schema) = nested_schema(annotation) {
        spec = spec
            .with_properties(schema.extraction()?.spec.clone())
            .with_transformer(Transformer::new(schema));
    }
    if let Some((schema, _)) = element_schema(annotation) {
        let item = Spec::new(TypeSpec::object(schema))
            .with_properties(schema.extraction()?.spec.clone())
            .with_transformer(Transformer::new(schema));
        spec = spec.with_items(item);
    }
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationErrorKind;
    use crate::settings::Settings;
    use crate::validator::Operation;

    fn database() -> Arc<Schema> {
        Schema::builder("Database")
            .field(Field::new("host", TypeSpec::Str).default("server.com"))
            .field(Field::new("port", TypeSpec::Int).validator(Validator::default().gt(999)))
            .build()
            .unwrap()
    }

    fn settings_with(extraction: &Extraction, data: &str) -> Settings {
        let mut settings = Settings::new();
        settings.set_defaults(extraction.defaults.clone()).unwrap();
        settings.update(serde_json::from_str(data).unwrap()).unwrap();
        settings.validators_mut().extend(extraction.validators.clone());
        settings
    }

    #[test]
    fn test_type_check_precedes_embedded_validators() {
        let schema = Schema::builder("S")
            .field(Field::new("name", TypeSpec::Str).validator(Validator::default().ne("denied.com")))
            .build()
            .unwrap();
        let extraction = extract(&schema).unwrap();

        assert_eq!(extraction.validators.len(), 2);
        assert_eq!(
            extraction.validators[0].operations(),
            &[Operation::IsTypeOf(TypeSpec::Str)]
        );
        assert_eq!(extraction.validators[1].names(), &["name".to_string()]);
    }

    #[test]
    fn test_required_only_without_default() {
        let schema = Schema::builder("S")
            .field(Field::new("a", TypeSpec::Int))
            .field(Field::new("b", TypeSpec::Int).default(1i64))
            .field(Field::new("c", TypeSpec::Int).not_required())
            .build()
            .unwrap();
        let extraction = extract(&schema).unwrap();
        let required: Vec<_> = extraction
            .validators
            .iter()
            .map(|v| v.existence() == crate::validator::MustExist::Required)
            .collect();
        assert_eq!(required, vec![true, false, false]);
        assert_eq!(extraction.defaults.len(), 1);
    }

    #[test]
    fn test_nested_defaults_and_prefixed_validators() {
        let app = Schema::builder("App")
            .field(Field::new("database", TypeSpec::object(&database())))
            .build()
            .unwrap();
        let extraction = extract(&app).unwrap();

        let expected: Map = serde_json::from_str(r#"{"database": {"host": "server.com"}}"#).unwrap();
        assert_eq!(extraction.defaults, expected);
        assert!(extraction.spec["database"].properties.contains_key("port"));

        let settings = settings_with(&extraction, r#"{"database": {"port": 500}}"#);
        let err = settings.validate().unwrap_err();
        assert_eq!(err.key, "database.port");
        assert!(err.message.starts_with("database.port must gt 999"));
    }

    #[test]
    fn test_outer_inline_default_wins() {
        let app = Schema::builder("App")
            .field(
                Field::new("database", TypeSpec::object(&database()))
                    .default(serde_json::from_str::<ConfigValue>(r#"{"host": "inline.com", "port": 5432}"#).unwrap()),
            )
            .build()
            .unwrap();
        let extraction = extract(&app).unwrap();
        let expected: Map =
            serde_json::from_str(r#"{"database": {"host": "inline.com", "port": 5432}}"#).unwrap();
        assert_eq!(extraction.defaults, expected);
    }

    #[test]
    fn test_nested_validators_skip_non_mapping_values() {
        let credentials = Schema::builder("Credentials")
            .field(Field::new("user", TypeSpec::Str))
            .build()
            .unwrap();
        let app = Schema::builder("App")
            .field(Field::new("database", TypeSpec::object(&credentials)))
            .build()
            .unwrap();
        let extraction = extract(&app).unwrap();
        let settings = settings_with(&extraction, r#"{"database": "sqlite://"}"#);

        let failures = settings.validate_all(false).unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].key, "database");
    }

    #[test]
    fn test_list_of_objects_items_and_transformer() {
        let plugin = Schema::builder("Plugin")
            .field(Field::new("name", TypeSpec::Str))
            .field(Field::new("port", TypeSpec::Int).default(80i64).validator(Validator::default().gt(0)))
            .build()
            .unwrap();
        let app = Schema::builder("App")
            .field(Field::new("plugins", TypeSpec::list_of(TypeSpec::object(&plugin))).default(ConfigValue::Array(vec![])))
            .build()
            .unwrap();
        let extraction = extract(&app).unwrap();
        assert!(extraction.spec["plugins"].items.as_ref().unwrap().transformer.is_some());

        let settings = settings_with(&extraction, r#"{"plugins": [{"name": "a", "port": 1}, {"port": -1}]}"#);
        let failures = settings.validate_all(false).unwrap();
        let keys: Vec<_> = failures.iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["plugins.1.name"]);

        let settings = settings_with(&extraction, r#"{"plugins": [{"name": "a", "port": -1}]}"#);
        let err = settings.validate().unwrap_err();
        assert_eq!(err.key, "plugins.0.port");
        assert_eq!(err.kind, ValidationErrorKind::Operation);
    }

    #[test]
    fn test_dict_of_objects_uses_values() {
        let plugin = Schema::builder("Plugin")
            .field(Field::new("name", TypeSpec::Str))
            .build()
            .unwrap();
        let app = Schema::builder("App")
            .field(Field::new(
                "plugins",
                TypeSpec::dict_of(TypeSpec::Str, TypeSpec::object(&plugin)),
            ))
            .build()
            .unwrap();
        let extraction = extract(&app).unwrap();
        let settings = settings_with(&extraction, r#"{"plugins": {"auth": {}}}"#);
        let err = settings.validate().unwrap_err();
        assert_eq!(err.key, "plugins.auth.name");
    }

    #[test]
    fn test_union_with_object_only_checks_mappings() {
        let app = Schema::builder("App")
            .field(Field::new(
                "database",
                TypeSpec::union([TypeSpec::Str, TypeSpec::object(&database())]),
            ))
            .build()
            .unwrap();
        let extraction = extract(&app).unwrap();

        assert!(settings_with(&extraction, r#"{"database": "sqlite://"}"#).validate().is_ok());
        let err = settings_with(&extraction, r#"{"database": {"port": 1}}"#)
            .validate()
            .unwrap_err();
        assert_eq!(err.key, "database.port");
    }

    #[test]
    fn test_schema_errors() {
        let build = |field: Field| Schema::builder("S").field(field).build().unwrap_err();

        assert!(matches!(
            build(Field::new("a", TypeSpec::Opaque("Path".into()))),
            SchemaError::UnsupportedType { .. }
        ));
        assert!(matches!(
            build(Field::new("a", TypeSpec::optional(TypeSpec::Int))),
            SchemaError::OptionalWithoutDefault { .. }
        ));
        assert!(matches!(
            build(Field::new("a", TypeSpec::List(vec![TypeSpec::Int, TypeSpec::Str]))),
            SchemaError::UnsupportedArity { count: 2, .. }
        ));
        assert!(matches!(
            build(Field::new("a", TypeSpec::Dict(vec![TypeSpec::Str]))),
            SchemaError::UnsupportedArity { count: 1, .. }
        ));
        assert!(matches!(
            build(Field::new("a", TypeSpec::Int).default("x")),
            SchemaError::InvalidDefault { .. }
        ));
        assert!(matches!(
            build(Field::new("a", TypeSpec::Int).validator(Validator::new(["b"]).gt(1))),
            SchemaError::InvalidMetadata { .. }
        ));
        assert!(matches!(
            build(Field::new("a", TypeSpec::list_of(TypeSpec::Opaque("set".into())))),
            SchemaError::UnsupportedType { .. }
        ));

        let err = Schema::builder("S")
            .field(Field::new("a", TypeSpec::Int))
            .field(Field::new("A", TypeSpec::Str))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateField { .. }));
    }

    #[test]
    fn test_optional_with_none_default() {
        let schema = Schema::builder("S")
            .field(Field::new("token", TypeSpec::optional(TypeSpec::Str)).default(ConfigValue::Null))
            .build()
            .unwrap();
        let extraction = extract(&schema).unwrap();
        assert_eq!(extraction.defaults.get("token"), Some(&ConfigValue::Null));
        assert!(settings_with(&extraction, "{}").validate().is_ok());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let app = Schema::builder("App")
            .field(Field::new("database", TypeSpec::object(&database())))
            .field(Field::new("debug", TypeSpec::Bool).default(false))
            .build()
            .unwrap();
        assert_eq!(extract(&app).unwrap(), extract(&app).unwrap());
        assert_eq!(extract(&app).unwrap(), *app.extraction().unwrap());
    }
}
