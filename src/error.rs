//! Error types and utilities for tierconf configuration management.

/// Result type alias for tierconf operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Comprehensive error types for configuration operations.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Requested configuration key was not found
    #[error("Key not found: {key}")]
    KeyNotFound { key: String },

    /// Type conversion failed
    #[error("Type conversion error: cannot convert {from} to {to}")]
    TypeConversion { from: String, to: String },

    /// A schema declaration is invalid
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// Configuration data failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Deserialization operation failed
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::deserialization(err.to_string())
    }
}

impl ConfigError {
    /// Creates a new type conversion error.
    pub fn type_conversion(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::TypeConversion {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Creates a new key not found error.
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Creates a new deserialization error.
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }

    /// Creates a new invalid value error.
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue(message.into())
    }

    /// Returns true if this error is related to a missing key.
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, ConfigError::KeyNotFound { .. })
    }

    /// Returns true if this error is related to type conversion.
    pub fn is_type_conversion(&self) -> bool {
        matches!(self, ConfigError::TypeConversion { .. })
    }

    /// Returns true if this error comes from an invalid schema declaration.
    pub fn is_schema_error(&self) -> bool {
        matches!(self, ConfigError::Schema(_))
    }

    /// Returns true if this error comes from a failed validation pass.
    pub fn is_validation_error(&self) -> bool {
        matches!(self, ConfigError::Validation(_))
    }

    /// Returns the validation error, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            ConfigError::Validation(err) => Some(err),
            _ => None,
        }
    }
}

/// Errors raised while a schema is being declared or extracted.
///
/// These always point at a programming mistake in the schema, never at bad
/// configuration data, and are never retried.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    /// The annotation uses a type outside the supported set
    #[error("Field '{field}' uses unsupported type '{type_name}'")]
    UnsupportedType { field: String, type_name: String },

    /// `Optional[T]` declared without an explicit default
    #[error("Field '{field}' is Optional and must declare an explicit default (e.g. None)")]
    OptionalWithoutDefault { field: String },

    /// Enclosed collection with the wrong number of type arguments
    #[error("Field '{field}': '{type_name}' with {count} type arguments is not supported")]
    UnsupportedArity {
        field: String,
        type_name: String,
        count: usize,
    },

    /// Metadata attached to an annotated field cannot be used
    #[error("Field '{field}' has invalid annotated metadata: {message}")]
    InvalidMetadata { field: String, message: String },

    /// The declared default does not match the declared type
    #[error("Field '{field}' default {actual} is not a valid {expected}")]
    InvalidDefault {
        field: String,
        expected: String,
        actual: String,
    },

    /// The same field name is declared twice on one schema
    #[error("Schema '{schema}' declares field '{field}' more than once")]
    DuplicateField { schema: String, field: String },
}

/// What kind of check produced a [`ValidationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// A required key is absent
    Missing,
    /// A forbidden key is present
    Forbidden,
    /// An operation such as `gt` or `is_type_of` did not hold
    Operation,
    /// A condition callable returned false
    Condition,
    /// A combined (`|` / `&`) validator failed
    Combined,
    /// Several failures gathered by a collect-all pass
    Multiple,
}

/// A configuration value failed a validator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    /// Category of the failure
    pub kind: ValidationErrorKind,
    /// Fully qualified dotted key of the offending value
    pub key: String,
    /// Profile the value was checked in
    pub env: String,
    /// Human readable, fully rendered message
    pub message: String,
    /// Nested failures for combined and collect-all errors
    pub details: Vec<ValidationError>,
}

impl ValidationError {
    /// Creates a validation error without nested details.
    pub fn new(
        kind: ValidationErrorKind,
        key: impl Into<String>,
        env: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            key: key.into(),
            env: env.into(),
            message: message.into(),
            details: Vec::new(),
        }
    }

    /// Folds several failures of one pass into a single error.
    pub fn multiple(errors: Vec<ValidationError>) -> Self {
        let message = errors
            .iter()
            .map(|err| err.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        let env = errors.first().map(|err| err.env.clone()).unwrap_or_default();
        Self {
            kind: ValidationErrorKind::Multiple,
            key: String::new(),
            env,
            message,
            details: errors,
        }
    }

    /// Returns every leaf failure, flattening collect-all errors.
    pub fn failures(&self) -> Vec<&ValidationError> {
        if self.kind == ValidationErrorKind::Multiple {
            self.details.iter().flat_map(|err| err.failures()).collect()
        } else {
            vec![self]
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ConfigResultExt<T> {
    /// Prefixes the message of an invalid value or deserialization error.
    fn with_context<F>(self, f: F) -> ConfigResult<T>
    where
        F: FnOnce() -> String;
}

impl<T> ConfigResultExt<T> for ConfigResult<T> {
    fn with_context<F>(self, f: F) -> ConfigResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|err| match err {
            ConfigError::InvalidValue(message) => {
                ConfigError::InvalidValue(format!("{}: {}", f(), message))
            }
            ConfigError::Deserialization(message) => {
                ConfigError::Deserialization(format!("{}: {}", f(), message))
            }
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = ConfigError::key_not_found("test.key");
        assert!(matches!(error, ConfigError::KeyNotFound { .. }));

        let error = ConfigError::type_conversion("string", "int");
        assert!(matches!(error, ConfigError::TypeConversion { .. }));

        let error = ConfigError::invalid_value("bad");
        assert!(matches!(error, ConfigError::InvalidValue(_)));
    }

    #[test]
    fn test_error_display() {
        let error = ConfigError::key_not_found("database.host");
        assert_eq!(error.to_string(), "Key not found: database.host");

        let error = ConfigError::type_conversion("string", "integer");
        assert_eq!(
            error.to_string(),
            "Type conversion error: cannot convert string to integer"
        );
    }

    #[test]
    fn test_schema_error_display() {
        let error = SchemaError::UnsupportedArity {
            field: "hosts".to_string(),
            type_name: "list".to_string(),
            count: 2,
        };
        assert_eq!(
            error.to_string(),
            "Field 'hosts': 'list' with 2 type arguments is not supported"
        );

        let error: ConfigError = SchemaError::OptionalWithoutDefault {
            field: "timeout".to_string(),
        }
        .into();
        assert!(error.is_schema_error());
        assert!(error.to_string().contains("timeout"));
    }

    #[test]
    fn test_validation_error_transparent() {
        let inner = ValidationError::new(
            ValidationErrorKind::Missing,
            "port",
            "development",
            "port is required in env development",
        );
        let error: ConfigError = inner.clone().into();
        assert!(error.is_validation_error());
        assert_eq!(error.to_string(), "port is required in env development");
        assert_eq!(error.as_validation(), Some(&inner));
    }

    #[test]
    fn test_multiple_flattens_failures() {
        let a = ValidationError::new(ValidationErrorKind::Missing, "a", "dev", "a missing");
        let b = ValidationError::new(ValidationErrorKind::Operation, "b", "dev", "b bad");
        let nested = ValidationError::multiple(vec![a.clone()]);
        let all = ValidationError::multiple(vec![nested, b.clone()]);

        assert_eq!(all.kind, ValidationErrorKind::Multiple);
        assert_eq!(all.failures(), vec![&a, &b]);
        assert_eq!(all.message, "a missing; b bad");
    }

    #[test]
    fn test_config_result_ext() {
        let result: ConfigResult<String> = Err(ConfigError::invalid_value("out of range"));
        let result = result.with_context(|| "while reading port".to_string());
        match result {
            Err(ConfigError::InvalidValue(message)) => {
                assert_eq!(message, "while reading port: out of range");
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let result: ConfigResult<String> = Err(ConfigError::key_not_found("test.key"));
        let result = result.with_context(|| "ignored".to_string());
        assert!(matches!(result, Err(ConfigError::KeyNotFound { .. })));
    }
}
