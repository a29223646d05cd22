//! # tierconf
//!
//! Layered, profile-aware configuration with typed schemas and declarative
//! validators.
//!
//! tierconf resolves configuration from several sources into one tree and
//! checks it against declared constraints. It does not read files or the
//! environment itself: loaders parse their format and hand the resulting
//! nested map over as a [`SourceConfigLayer`].
//!
//! ## Architecture Overview
//!
//! Each source is a layer with a precedence level. The precedence order
//! (highest to lowest) is:
//!
//! 1. **Explicit calls** - Values set directly via `set()` / `update()`
//! 2. **Construction-time values** - Values passed when building typed settings
//! 3. **Environment variables** - Values supplied by an environment loader
//! 4. **Configuration files** - Values supplied by a file loader
//! 5. **Key-value stores** - Values supplied by a remote loader
//! 6. **Default values** - Schema and `set_default()` values
//!
//! Layers may be bound to a profile (`development`, `production`, ...). The
//! view of a profile merges the shared layers, the layers of the `default`
//! profile and the layers of the profile itself. Nested mappings are always
//! deep-merged.
//!
//! ## Quick Start
//!
//! ```rust
//! use tierconf::{ConfigValue, LayerPriority, Settings, SourceConfigLayer, Validator};
//! use tierconf::value::Map;
//!
//! let mut settings = Settings::new();
//! settings.set_default("database.host", ConfigValue::from("localhost")).unwrap();
//!
//! let file: Map = serde_json::from_str(r#"{"database": {"port": 5432}}"#).unwrap();
//! settings.add_layer(Box::new(SourceConfigLayer::new("settings.json", LayerPriority::ConfigFile, file)));
//!
//! settings.validators_mut().register(Validator::new(["database.port"]).gt(1024));
//! settings.validate().unwrap();
//!
//! assert_eq!(settings.get_string("database.host").unwrap(), Some("localhost".to_string()));
//! ```
//!
//! ## Typed Schemas
//!
//! ```rust
//! use tierconf::typed::{Field, Schema, TypedSettings};
//! use tierconf::{ConfigValue, TypeSpec, Validator};
//!
//! let database = Schema::builder("Database")
//!     .field(Field::new("host", TypeSpec::Str).default("server.com"))
//!     .field(Field::new("port", TypeSpec::Int).validator(Validator::default().gt(999)))
//!     .build()
//!     .unwrap();
//! let app = Schema::builder("App")
//!     .field(Field::new("database", TypeSpec::object(&database)))
//!     .build()
//!     .unwrap();
//!
//! let err = TypedSettings::builder(&app)
//!     .init("database.port", ConfigValue::from(500i64))
//!     .build()
//!     .unwrap_err();
//! assert_eq!(err.as_validation().unwrap().key, "database.port");
//! ```
//!
//! ## Error Handling
//!
//! Operations return `ConfigResult<T>`, an alias for `Result<T, ConfigError>`.
//! Schema declaration mistakes surface as [`SchemaError`] when the schema is
//! built; bad data surfaces as [`ValidationError`] when validators run.
//!
//! ```rust
//! use tierconf::{ConfigError, Settings};
//!
//! let settings = Settings::new();
//! match settings.attr("nonexistent.key") {
//!     Ok(value) => println!("Value: {}", value),
//!     Err(ConfigError::KeyNotFound { key }) => println!("Key '{}' not found", key),
//!     Err(e) => println!("Error: {}", e),
//! }
//! ```

pub mod default_layer;
pub mod error;
pub mod hooks;
pub mod layer;
pub mod merge;
pub mod settings;
pub mod source_layer;
pub mod typed;
pub mod types;
pub mod validator;
pub mod value;

// Re-export main types for convenience
pub use default_layer::DefaultConfigLayer;
pub use error::{
    ConfigError, ConfigResult, ConfigResultExt, SchemaError, ValidationError, ValidationErrorKind,
};
pub use hooks::{HookArgs, HookReceiver, HookValue, HookedMethod, Hooks};
pub use layer::{ConfigLayer, LayerPriority};
pub use settings::Settings;
pub use source_layer::SourceConfigLayer;
pub use types::TypeSpec;
pub use validator::{MessageKind, MustExist, ValidateOptions, Validator, ValidatorList};
pub use value::ConfigValue;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
