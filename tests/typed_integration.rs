//! Integration tests for typed schemas and the typed settings wrapper.

use std::sync::Arc;
use tierconf::typed::{extract, Field, Options, Schema, TypedSettings, TypedState};
use tierconf::value::Map;
use tierconf::{
    ConfigError, ConfigValue, LayerPriority, SchemaError, SourceConfigLayer, TypeSpec,
    ValidationErrorKind, Validator,
};

fn database_schema() -> Arc<Schema> {
    Schema::builder("Database")
        .field(Field::new("host", TypeSpec::Str).default("server.com"))
        .field(Field::new("port", TypeSpec::Int).validator(Validator::default().gt(999)))
        .build()
        .unwrap()
}

fn app_schema() -> Arc<Schema> {
    Schema::builder("Settings")
        .field(Field::new("name", TypeSpec::Str).default("app"))
        .field(Field::new("database", TypeSpec::object(&database_schema())))
        .field(Field::new("tags", TypeSpec::list_of(TypeSpec::Str)))
        .field(Field::new("api_key", TypeSpec::Str).not_required())
        .build()
        .unwrap()
}

fn toml_map(text: &str) -> Map {
    toml::from_str(text).unwrap()
}

#[test]
fn test_nested_error_path_is_fully_qualified() {
    let err = TypedSettings::builder(&app_schema())
        .init("database.port", ConfigValue::from(500i64))
        .init("tags", ConfigValue::Array(vec![]))
        .build()
        .unwrap_err();

    let failure = err.as_validation().unwrap();
    assert_eq!(failure.key, "database.port");
    assert_eq!(failure.kind, ValidationErrorKind::Operation);
    assert_eq!(
        failure.message,
        "database.port must gt 999 but it is 500 in env development"
    );
}

#[test]
fn test_defaults_apply_and_pass_type_checks() {
    let typed = TypedSettings::builder(&app_schema())
        .init("database.port", ConfigValue::from(5432i64))
        .init("tags", ConfigValue::Array(vec![]))
        .build()
        .unwrap();

    assert_eq!(typed.state(), TypedState::Validated);
    assert_eq!(typed.get_string("name").unwrap(), Some("app".to_string()));
    assert_eq!(
        typed.get_string("database.host").unwrap(),
        Some("server.com".to_string())
    );
}

#[test]
fn test_missing_required_field_is_named() {
    let err = TypedSettings::builder(&app_schema())
        .init("database.port", ConfigValue::from(5432i64))
        .build()
        .unwrap_err();
    let failure = err.as_validation().unwrap();
    assert_eq!(failure.key, "tags");
    assert_eq!(failure.kind, ValidationErrorKind::Missing);
    assert!(failure.message.contains("tags"));
}

#[test]
fn test_empty_list_is_valid_for_required_list() {
    let schema = Schema::builder("S")
        .field(Field::new("hosts", TypeSpec::list_of(TypeSpec::Str)))
        .build()
        .unwrap();
    let typed = TypedSettings::builder(&schema)
        .init("hosts", ConfigValue::Array(vec![]))
        .build()
        .unwrap();
    assert_eq!(typed.get_array("hosts").unwrap(), Some(vec![]));
}

#[test]
fn test_not_required_field_is_absent_after_validation() {
    let typed = TypedSettings::builder(&app_schema())
        .init("database.port", ConfigValue::from(5432i64))
        .init("tags", ConfigValue::Array(vec![]))
        .build()
        .unwrap();
    let err = typed.attr("api_key").unwrap_err();
    assert!(matches!(err, ConfigError::KeyNotFound { .. }));
}

#[test]
fn test_eager_versus_deferred_validation() {
    let schema = Schema::builder("Site")
        .field(Field::new("name", TypeSpec::Str).validator(Validator::default().ne("denied.com")))
        .build()
        .unwrap();

    let eager = TypedSettings::builder(&schema)
        .init("name", ConfigValue::from("denied.com"))
        .build();
    assert!(eager.unwrap_err().is_validation_error());

    let mut deferred = TypedSettings::builder(&schema)
        .init("name", ConfigValue::from("denied.com"))
        .options(Options {
            trigger_validation: false,
            ..Options::default()
        })
        .build()
        .unwrap();
    assert_eq!(deferred.state(), TypedState::PendingValidation);
    let err = deferred.validate().unwrap_err();
    assert_eq!(err.key, "name");
    assert!(err.message.contains("denied.com"));
}

#[test]
fn test_type_failure_reported_before_embedded_constraint() {
    let schema = Schema::builder("S")
        .field(Field::new("port", TypeSpec::Int).validator(Validator::default().gt(999)))
        .build()
        .unwrap();
    let err = TypedSettings::builder(&schema)
        .init("port", ConfigValue::from("8080"))
        .build()
        .unwrap_err();
    let failure = err.as_validation().unwrap();
    assert!(failure.message.contains("is_type_of"), "{}", failure.message);
}

#[test]
fn test_list_of_objects_from_loader_gets_element_defaults() {
    let plugin = Schema::builder("Plugin")
        .field(Field::new("name", TypeSpec::Str))
        .field(Field::new("enabled", TypeSpec::Bool).default(true))
        .build()
        .unwrap();
    let schema = Schema::builder("App")
        .field(Field::new("plugins", TypeSpec::list_of(TypeSpec::object(&plugin))))
        .build()
        .unwrap();

    let raw = toml_map(
        r#"
        [[plugins]]
        name = "auth"

        [[plugins]]
        name = "cache"
        enabled = false
        "#,
    );
    let typed = TypedSettings::builder(&schema)
        .source(Box::new(SourceConfigLayer::new("app.toml", LayerPriority::ConfigFile, raw)))
        .build()
        .unwrap();

    assert_eq!(typed.get_bool("plugins.0.enabled").unwrap(), Some(true));
    assert_eq!(typed.get_bool("plugins.1.enabled").unwrap(), Some(false));

    let broken = toml_map(
        r#"
        [[plugins]]
        enabled = true
        "#,
    );
    let err = TypedSettings::builder(&schema)
        .source(Box::new(SourceConfigLayer::new("app.toml", LayerPriority::ConfigFile, broken)))
        .build()
        .unwrap_err();
    assert_eq!(err.as_validation().unwrap().key, "plugins.0.name");
}

#[test]
fn test_profile_specific_source() {
    let raw: Map = serde_yaml::from_str(
        r#"
default:
  database:
    port: 5432
production:
  database:
    port: 80
"#,
    )
    .unwrap();
    let schema = Schema::builder("Settings")
        .field(Field::new("database", TypeSpec::object(&database_schema())))
        .build()
        .unwrap();

    let build = |env: &str| {
        let mut builder = TypedSettings::builder(&schema).env(env);
        for layer in SourceConfigLayer::split_profiles("settings.yaml", LayerPriority::ConfigFile, raw.clone()) {
            builder = builder.source(Box::new(layer));
        }
        builder.build()
    };

    assert!(build("development").is_ok());
    let err = build("production").unwrap_err();
    let failure = err.as_validation().unwrap();
    assert_eq!(failure.env, "production");
    assert!(failure.message.ends_with("in env production"));
}

#[test]
fn test_schema_definition_errors_surface_at_build() {
    let err = Schema::builder("S")
        .field(Field::new("a", TypeSpec::optional(TypeSpec::Str)))
        .build()
        .unwrap_err();
    assert_eq!(
        err,
        SchemaError::OptionalWithoutDefault {
            field: "a".to_string()
        }
    );

    let err = Schema::builder("S")
        .field(Field::new("pairs", TypeSpec::List(vec![TypeSpec::Str, TypeSpec::Int])))
        .build()
        .unwrap_err();
    assert!(matches!(err, SchemaError::UnsupportedArity { .. }));
    assert!(ConfigError::from(err).is_schema_error());
}

#[test]
fn test_extraction_idempotent_for_nested_schema() {
    let schema = app_schema();
    let first = extract(&schema).unwrap();
    let second = extract(&schema).unwrap();
    assert_eq!(first, second);
    assert_eq!(&first, schema.extraction().unwrap());
}

#[test]
fn test_partial_mapping_gets_nested_defaults_for_every_object_form() {
    let forms = [
        Field::new("database", TypeSpec::optional(TypeSpec::object(&database_schema())))
            .default(ConfigValue::Null),
        Field::new("database", TypeSpec::object(&database_schema())).not_required(),
        Field::new(
            "database",
            TypeSpec::union([TypeSpec::Str, TypeSpec::object(&database_schema())]),
        ),
    ];

    for field in forms {
        let schema = Schema::builder("Settings").field(field).build().unwrap();
        let typed = TypedSettings::builder(&schema)
            .init("database.port", ConfigValue::from(5432i64))
            .build()
            .unwrap();
        assert_eq!(
            typed.get_string("database.host").unwrap(),
            Some("server.com".to_string()),
            "{:?}",
            schema.field("database")
        );
        assert_eq!(typed.get_int("database.port").unwrap(), Some(5432));
    }
}

#[test]
fn test_optional_object_left_unset_stays_none() {
    let schema = Schema::builder("Settings")
        .field(
            Field::new("database", TypeSpec::optional(TypeSpec::object(&database_schema())))
                .default(ConfigValue::Null),
        )
        .build()
        .unwrap();
    let typed = TypedSettings::builder(&schema).build().unwrap();
    assert_eq!(typed.get("database").unwrap(), Some(ConfigValue::Null));
}

#[test]
fn test_union_scalar_member_is_left_untouched() {
    let schema = Schema::builder("Settings")
        .field(Field::new(
            "database",
            TypeSpec::union([TypeSpec::Str, TypeSpec::object(&database_schema())]),
        ))
        .build()
        .unwrap();
    let typed = TypedSettings::builder(&schema)
        .init("database", ConfigValue::from("sqlite://memory"))
        .build()
        .unwrap();
    assert_eq!(
        typed.get_string("database").unwrap(),
        Some("sqlite://memory".to_string())
    );
}
